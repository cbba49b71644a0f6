//! Canonical ordering of body entries before size estimation.
//!
//! Redeemer pointers are positions in the serialized sequences, so the body must be put in its
//! final order before the first draft and must stay that way while the fee converges.

use std::cmp::Ordering;

use crate::{
    address,
    model::{Credential, TxBuilderBody, TxInParameter, Vote, Voter, Withdrawal},
    Error,
};

pub trait OrderingPolicy: Send + Sync {
    fn order(&self, body: &mut TxBuilderBody) -> Result<(), Error>;
}

/// Leaves every sequence as declared.
///
/// Only usable for bodies without redeemers: the ledger re-sorts inputs, mints, withdrawals and
/// voters, which would leave declared redeemer pointers aimed at the wrong entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclaredOrdering;

impl OrderingPolicy for DeclaredOrdering {
    fn order(&self, body: &mut TxBuilderBody) -> Result<(), Error> {
        if body.has_redeemers() {
            return Err(Error::structural(
                "declared ordering can't be used with script redeemers",
            ));
        }

        Ok(())
    }
}

/// Sorting rules of the Conway ledger maps and sets.
///
/// Inputs, collaterals and reference inputs by `(tx hash, index)`; mints by policy id; withdrawals
/// and voters script credentials first, then by hash. Certificates keep declaration order. All
/// sorts are stable.
#[derive(Debug, Clone, Copy, Default)]
pub struct LedgerOrdering;

fn credential_key(cred: &Credential) -> (u8, &str) {
    match cred {
        Credential::ScriptHash(x) => (0, x),
        Credential::KeyHash(x) => (1, x),
    }
}

fn withdrawal_key(withdrawal: &Withdrawal) -> (u8, String) {
    match address::reward_credential(withdrawal.address()) {
        Ok(cred) => {
            let (kind, hash) = credential_key(&cred);
            (kind, hash.to_owned())
        }
        // unparseable addresses sort last and are rejected by the serializer
        Err(_) => (2, withdrawal.address().to_owned()),
    }
}

fn voter_key(voter: &Voter) -> (u8, u8, String) {
    match voter {
        Voter::ConstitutionalCommittee(cred) => {
            let (kind, hash) = credential_key(cred);
            (0, kind, hash.to_owned())
        }
        Voter::DRep(id) => match address::drep_credential(id) {
            Ok(cred) => {
                let (kind, hash) = credential_key(&cred);
                (1, kind, hash.to_owned())
            }
            Err(_) => (1, 2, id.clone()),
        },
        Voter::StakingPool(hash) => (2, 1, hash.clone()),
    }
}

fn outpoint_cmp(a: &TxInParameter, b: &TxInParameter) -> Ordering {
    a.outpoint().cmp(&b.outpoint())
}

impl OrderingPolicy for LedgerOrdering {
    fn order(&self, body: &mut TxBuilderBody) -> Result<(), Error> {
        body.inputs.sort_by(|a, b| outpoint_cmp(a.param(), b.param()));
        body.collaterals.sort_by(outpoint_cmp);
        body.reference_inputs.sort_by(outpoint_cmp);

        body.mints.sort_by(|a, b| a.policy_id().cmp(b.policy_id()));

        body.withdrawals.sort_by_cached_key(withdrawal_key);

        body.votes.sort_by_cached_key(|vote: &Vote| voter_key(&vote.params().voter));

        Ok(())
    }
}
