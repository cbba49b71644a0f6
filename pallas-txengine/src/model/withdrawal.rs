use serde::{Deserialize, Serialize};
use serde_with::{As, DisplayFromStr};

use super::{Redeemer, ScriptSource, SimpleScriptSource};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Withdrawal {
    #[serde(rename = "pubKeyWithdrawal")]
    PubKey {
        address: String,
        #[serde(with = "As::<DisplayFromStr>")]
        coin: u64,
    },
    #[serde(rename = "scriptWithdrawal", rename_all = "camelCase")]
    Script {
        address: String,
        #[serde(with = "As::<DisplayFromStr>")]
        coin: u64,
        script_source: ScriptSource,
        redeemer: Redeemer,
    },
    #[serde(rename = "simpleScriptWithdrawal", rename_all = "camelCase")]
    SimpleScript {
        address: String,
        #[serde(with = "As::<DisplayFromStr>")]
        coin: u64,
        simple_script_source: SimpleScriptSource,
    },
}

impl Withdrawal {
    /// Reward address the coin is withdrawn from.
    pub fn address(&self) -> &str {
        match self {
            Withdrawal::PubKey { address, .. }
            | Withdrawal::Script { address, .. }
            | Withdrawal::SimpleScript { address, .. } => address,
        }
    }

    pub fn coin(&self) -> u64 {
        match self {
            Withdrawal::PubKey { coin, .. }
            | Withdrawal::Script { coin, .. }
            | Withdrawal::SimpleScript { coin, .. } => *coin,
        }
    }

    pub fn redeemer(&self) -> Option<&Redeemer> {
        match self {
            Withdrawal::Script { redeemer, .. } => Some(redeemer),
            _ => None,
        }
    }

    pub fn redeemer_mut(&mut self) -> Option<&mut Redeemer> {
        match self {
            Withdrawal::Script { redeemer, .. } => Some(redeemer),
            _ => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        match self {
            Withdrawal::PubKey { .. } => true,
            Withdrawal::Script { script_source, .. } => script_source.is_complete(),
            Withdrawal::SimpleScript {
                simple_script_source,
                ..
            } => simple_script_source.is_complete(),
        }
    }
}
