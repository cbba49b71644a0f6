//! The builder body and every tagged union it holds.
//!
//! All types derive serde in the canonical object shape: camelCase keys and one discriminator
//! key per union variant.

mod body;
mod cert;
mod governance;
mod input;
mod mint;
mod output;
mod script;
mod withdrawal;

pub use body::*;
pub use cert::*;
pub use governance::*;
pub use input::*;
pub use mint::*;
pub use output::*;
pub use script::*;
pub use withdrawal::*;

pub(crate) use script::decode_hex;

/// Distinct voters in order of first appearance; votes of one voter share a redeemer.
pub fn distinct_voters(votes: &[Vote]) -> Vec<&Voter> {
    let mut out: Vec<&Voter> = vec![];

    for vote in votes {
        let voter = &vote.params().voter;

        if !out.contains(&voter) {
            out.push(voter);
        }
    }

    out
}
