use serde::{Deserialize, Serialize};
use serde_with::{As, DisplayFromStr};

use super::{Redeemer, ScriptSource, SimpleScriptSource};
use crate::value::{self, MintDelta};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MintItem {
    #[serde(rename = "plutusMint", rename_all = "camelCase")]
    Plutus {
        policy_id: String,
        asset_name: String,
        #[serde(with = "As::<DisplayFromStr>")]
        amount: i128,
        script_source: ScriptSource,
        redeemer: Redeemer,
    },
    #[serde(rename = "nativeMint", rename_all = "camelCase")]
    Native {
        policy_id: String,
        asset_name: String,
        #[serde(with = "As::<DisplayFromStr>")]
        amount: i128,
        script_source: SimpleScriptSource,
    },
}

impl MintItem {
    pub fn policy_id(&self) -> &str {
        match self {
            MintItem::Plutus { policy_id, .. } | MintItem::Native { policy_id, .. } => policy_id,
        }
    }

    pub fn asset_name(&self) -> &str {
        match self {
            MintItem::Plutus { asset_name, .. } | MintItem::Native { asset_name, .. } => asset_name,
        }
    }

    pub fn amount(&self) -> i128 {
        match self {
            MintItem::Plutus { amount, .. } | MintItem::Native { amount, .. } => *amount,
        }
    }

    pub fn unit(&self) -> String {
        value::unit(self.policy_id(), self.asset_name())
    }

    pub fn redeemer(&self) -> Option<&Redeemer> {
        match self {
            MintItem::Plutus { redeemer, .. } => Some(redeemer),
            MintItem::Native { .. } => None,
        }
    }

    pub fn redeemer_mut(&mut self) -> Option<&mut Redeemer> {
        match self {
            MintItem::Plutus { redeemer, .. } => Some(redeemer),
            MintItem::Native { .. } => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        match self {
            MintItem::Plutus { script_source, .. } => script_source.is_complete(),
            MintItem::Native { script_source, .. } => script_source.is_complete(),
        }
    }
}

pub fn mint_delta(mints: &[MintItem]) -> MintDelta {
    let mut delta = MintDelta::default();

    for mint in mints {
        delta.add(&mint.unit(), mint.amount());
    }

    delta
}

/// Distinct policies in order of first appearance.
pub fn mint_policies(mints: &[MintItem]) -> Vec<&str> {
    let mut out: Vec<&str> = vec![];

    for mint in mints {
        if !out.contains(&mint.policy_id()) {
            out.push(mint.policy_id());
        }
    }

    out
}
