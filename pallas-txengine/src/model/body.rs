use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_with::{As, DisplayFromStr};

use super::{Certificate, MintItem, Output, Redeemer, TxIn, TxInParameter, Utxo, Vote, Withdrawal};
use crate::{params::Network, Error};

/// Transaction metadata value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metadatum {
    Int(#[serde(with = "As::<DisplayFromStr>")] i128),
    Bytes(String),
    Text(String),
    List(Vec<Metadatum>),
    Map(Vec<(Metadatum, Metadatum)>),
}

impl Metadatum {
    /// Maps arbitrary JSON onto metadata: numbers become ints, strings text, arrays lists and
    /// objects text-keyed maps.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, Error> {
        use serde_json::Value as Json;

        match json {
            Json::Number(x) => x
                .as_i64()
                .map(i128::from)
                .or_else(|| x.as_u64().map(i128::from))
                .map(Metadatum::Int)
                .ok_or_else(|| Error::structural(format!("metadata number {x} is not an integer"))),
            Json::String(x) => Ok(Metadatum::Text(x.clone())),
            Json::Array(items) => items
                .iter()
                .map(Self::from_json)
                .collect::<Result<_, _>>()
                .map(Metadatum::List),
            Json::Object(entries) => entries
                .iter()
                .map(|(k, v)| Ok((Metadatum::Text(k.clone()), Self::from_json(v)?)))
                .collect::<Result<_, Error>>()
                .map(Metadatum::Map),
            Json::Bool(_) | Json::Null => Err(Error::structural(format!(
                "metadata can't hold {json}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidityRange {
    #[serde(default, with = "As::<Option<DisplayFromStr>>")]
    pub invalid_before: Option<u64>,
    #[serde(default, with = "As::<Option<DisplayFromStr>>")]
    pub invalid_hereafter: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SelectionStrategy {
    #[default]
    Experimental,
    LargestFirst,
    KeepRelevant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionConfig {
    /// Base currency held in reserve by the experimental strategy.
    #[serde(with = "As::<DisplayFromStr>")]
    pub threshold: u64,
    pub strategy: SelectionStrategy,
    pub include_tx_fees: bool,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            threshold: 5_000_000,
            strategy: SelectionStrategy::Experimental,
            include_tx_fees: true,
        }
    }
}

/// Every intent declared for one transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TxBuilderBody {
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<Output>,
    /// Leftover value, managed by the balancing loop and serialized after `outputs`.
    pub change_output: Option<Output>,
    #[serde(with = "As::<DisplayFromStr>")]
    pub fee: u64,
    pub mints: Vec<MintItem>,
    pub change_address: Option<String>,
    pub metadata: BTreeMap<u64, Metadatum>,
    pub validity_range: ValidityRange,
    pub certificates: Vec<Certificate>,
    pub withdrawals: Vec<Withdrawal>,
    pub votes: Vec<Vote>,
    pub signing_key: Vec<String>,
    pub collaterals: Vec<TxInParameter>,
    pub required_signatures: Vec<String>,
    pub reference_inputs: Vec<TxInParameter>,
    pub network: Network,
    pub selection_config: SelectionConfig,
    /// Hex of unsubmitted transactions this one spends from.
    pub chained_txs: Vec<String>,
    pub inputs_for_evaluation: Vec<Utxo>,
    /// Candidate pool for coin selection.
    pub extra_inputs: Vec<Utxo>,
}

/// Redeemer purpose, as the ledger indexes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RedeemerTag {
    Spend,
    Mint,
    Cert,
    Reward,
    Vote,
}

impl TxBuilderBody {
    pub fn all_outputs(&self) -> impl Iterator<Item = &Output> {
        self.outputs.iter().chain(self.change_output.iter())
    }

    /// Every redeemer with its ledger pointer, in wire order.
    pub fn redeemers(&self) -> Vec<(RedeemerTag, u32, &Redeemer)> {
        let mut out = vec![];

        for (i, input) in self.inputs.iter().enumerate() {
            if let Some(r) = input.redeemer() {
                out.push((RedeemerTag::Spend, i as u32, r));
            }
        }

        for (i, policy) in super::mint_policies(&self.mints).into_iter().enumerate() {
            let first = self
                .mints
                .iter()
                .filter(|m| m.policy_id() == policy)
                .find_map(MintItem::redeemer);

            if let Some(r) = first {
                out.push((RedeemerTag::Mint, i as u32, r));
            }
        }

        for (i, cert) in self.certificates.iter().enumerate() {
            if let Some(r) = cert.redeemer() {
                out.push((RedeemerTag::Cert, i as u32, r));
            }
        }

        for (i, withdrawal) in self.withdrawals.iter().enumerate() {
            if let Some(r) = withdrawal.redeemer() {
                out.push((RedeemerTag::Reward, i as u32, r));
            }
        }

        for (i, vote) in super::distinct_voters(&self.votes).into_iter().enumerate() {
            let first = self
                .votes
                .iter()
                .filter(|v| v.params().voter == *vote)
                .find_map(Vote::redeemer);

            if let Some(r) = first {
                out.push((RedeemerTag::Vote, i as u32, r));
            }
        }

        out
    }

    pub fn has_redeemers(&self) -> bool {
        !self.redeemers().is_empty()
    }

    /// Rewrites the budget of the redeemer behind a ledger pointer.
    ///
    /// A mint pointer addresses a policy, so every mint item of that policy is updated.
    pub fn set_ex_units(
        &mut self,
        tag: RedeemerTag,
        index: u32,
        ex_units: super::ExUnits,
    ) -> Result<(), Error> {
        let index = index as usize;
        let missing = || Error::structural(format!("no {tag:?} redeemer at index {index}"));

        match tag {
            RedeemerTag::Spend => {
                let redeemer = self
                    .inputs
                    .get_mut(index)
                    .and_then(TxIn::redeemer_mut)
                    .ok_or_else(missing)?;

                redeemer.ex_units = ex_units;
            }
            RedeemerTag::Mint => {
                let policy = super::mint_policies(&self.mints)
                    .get(index)
                    .map(|x| x.to_string())
                    .ok_or_else(missing)?;

                for mint in self.mints.iter_mut().filter(|m| m.policy_id() == policy) {
                    if let Some(redeemer) = mint.redeemer_mut() {
                        redeemer.ex_units = ex_units;
                    }
                }
            }
            RedeemerTag::Cert => {
                let redeemer = self
                    .certificates
                    .get_mut(index)
                    .and_then(Certificate::redeemer_mut)
                    .ok_or_else(missing)?;

                redeemer.ex_units = ex_units;
            }
            RedeemerTag::Reward => {
                let redeemer = self
                    .withdrawals
                    .get_mut(index)
                    .and_then(Withdrawal::redeemer_mut)
                    .ok_or_else(missing)?;

                redeemer.ex_units = ex_units;
            }
            RedeemerTag::Vote => {
                let voter = super::distinct_voters(&self.votes)
                    .get(index)
                    .map(|x| (*x).clone())
                    .ok_or_else(missing)?;

                for vote in self.votes.iter_mut().filter(|v| v.params().voter == voter) {
                    if let Some(redeemer) = vote.redeemer_mut() {
                        redeemer.ex_units = ex_units;
                    }
                }
            }
        }

        Ok(())
    }
}
