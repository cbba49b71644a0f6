use serde::{Deserialize, Serialize};

use super::{Anchor, Credential, RefTxIn, Redeemer, ScriptSource, SimpleScriptSource};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Voter {
    #[serde(rename = "constitutionalCommitteeHotCred")]
    ConstitutionalCommittee(Credential),
    /// Bech32 DRep id (CIP-105 or CIP-129).
    #[serde(rename = "dRepId")]
    DRep(String),
    #[serde(rename = "stakingPoolKeyHash")]
    StakingPool(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteKind {
    No,
    Yes,
    Abstain,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingProcedure {
    pub vote_kind: VoteKind,
    #[serde(default)]
    pub anchor: Option<Anchor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteParams {
    pub voter: Voter,
    pub gov_action_id: RefTxIn,
    pub voting_procedure: VotingProcedure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Vote {
    #[serde(rename = "basicVote")]
    Basic(VoteParams),
    #[serde(rename = "scriptVote", rename_all = "camelCase")]
    Script {
        vote: VoteParams,
        redeemer: Redeemer,
        script_source: ScriptSource,
    },
    #[serde(rename = "simpleScriptVote", rename_all = "camelCase")]
    SimpleScript {
        vote: VoteParams,
        simple_script_source: SimpleScriptSource,
    },
}

impl Vote {
    pub fn params(&self) -> &VoteParams {
        match self {
            Vote::Basic(vote) => vote,
            Vote::Script { vote, .. } | Vote::SimpleScript { vote, .. } => vote,
        }
    }

    pub fn redeemer(&self) -> Option<&Redeemer> {
        match self {
            Vote::Script { redeemer, .. } => Some(redeemer),
            _ => None,
        }
    }

    pub fn redeemer_mut(&mut self) -> Option<&mut Redeemer> {
        match self {
            Vote::Script { redeemer, .. } => Some(redeemer),
            _ => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        match self {
            Vote::Basic(_) => true,
            Vote::Script { script_source, .. } => script_source.is_complete(),
            Vote::SimpleScript {
                simple_script_source,
                ..
            } => simple_script_source.is_complete(),
        }
    }
}
