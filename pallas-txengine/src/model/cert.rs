use serde::{Deserialize, Serialize};
use serde_with::{As, DisplayFromStr};

use super::{Redeemer, ScriptSource, SimpleScriptSource};
use crate::params::ProtocolParams;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Credential {
    KeyHash(String),
    ScriptHash(String),
}

impl Credential {
    pub fn hash(&self) -> &str {
        match self {
            Credential::KeyHash(x) | Credential::ScriptHash(x) => x,
        }
    }

    pub fn is_script(&self) -> bool {
        matches!(self, Credential::ScriptHash(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anchor {
    pub anchor_url: String,
    pub anchor_data_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DRep {
    #[serde(rename = "dRepId")]
    DRepId(String),
    AlwaysAbstain,
    AlwaysNoConfidence,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolMetadata {
    pub url: String,
    pub hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Relay {
    SingleHostAddr {
        #[serde(default)]
        ipv4: Option<String>,
        #[serde(default)]
        ipv6: Option<String>,
        #[serde(default)]
        port: Option<u16>,
    },
    SingleHostName {
        hostname: String,
        #[serde(default)]
        port: Option<u16>,
    },
    #[serde(rename_all = "camelCase")]
    MultiHostName { dns_name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Margin {
    #[serde(with = "As::<DisplayFromStr>")]
    pub numerator: u64,
    #[serde(with = "As::<DisplayFromStr>")]
    pub denominator: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolParams {
    pub vrf_key_hash: String,
    /// Pool id, bech32 `pool1...` or hex key hash.
    pub operator: String,
    #[serde(with = "As::<DisplayFromStr>")]
    pub pledge: u64,
    #[serde(with = "As::<DisplayFromStr>")]
    pub cost: u64,
    pub margin: Margin,
    pub relays: Vec<Relay>,
    pub owners: Vec<String>,
    pub reward_address: String,
    #[serde(default)]
    pub metadata: Option<PoolMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CertificateType {
    #[serde(rename_all = "camelCase")]
    RegisterPool { pool_params: PoolParams },
    #[serde(rename_all = "camelCase")]
    RegisterStake { stake_key_address: String },
    #[serde(rename_all = "camelCase")]
    DelegateStake {
        stake_key_address: String,
        pool_id: String,
    },
    #[serde(rename_all = "camelCase")]
    DeregisterStake { stake_key_address: String },
    #[serde(rename_all = "camelCase")]
    RetirePool {
        pool_id: String,
        #[serde(with = "As::<DisplayFromStr>")]
        epoch: u64,
    },
    #[serde(rename_all = "camelCase")]
    VoteDelegation {
        stake_key_address: String,
        drep: DRep,
    },
    #[serde(rename_all = "camelCase")]
    StakeAndVoteDelegation {
        stake_key_address: String,
        pool_key_hash: String,
        drep: DRep,
    },
    #[serde(rename_all = "camelCase")]
    StakeRegistrationAndDelegation {
        stake_key_address: String,
        pool_key_hash: String,
        #[serde(with = "As::<DisplayFromStr>")]
        coin: u64,
    },
    #[serde(rename_all = "camelCase")]
    VoteRegistrationAndDelegation {
        stake_key_address: String,
        drep: DRep,
        #[serde(with = "As::<DisplayFromStr>")]
        coin: u64,
    },
    #[serde(rename_all = "camelCase")]
    StakeVoteRegistrationAndDelegation {
        stake_key_address: String,
        pool_key_hash: String,
        drep: DRep,
        #[serde(with = "As::<DisplayFromStr>")]
        coin: u64,
    },
    #[serde(rename_all = "camelCase")]
    CommitteeHotAuth {
        committee_cold_key_address: String,
        committee_hot_key_address: String,
    },
    #[serde(rename_all = "camelCase")]
    CommitteeColdResign {
        committee_cold_key_address: String,
        #[serde(default)]
        anchor: Option<Anchor>,
    },
    #[serde(rename = "dRepRegistration", rename_all = "camelCase")]
    DRepRegistration {
        drep_id: String,
        #[serde(with = "As::<DisplayFromStr>")]
        coin: u64,
        #[serde(default)]
        anchor: Option<Anchor>,
    },
    #[serde(rename = "dRepDeregistration", rename_all = "camelCase")]
    DRepDeregistration {
        drep_id: String,
        #[serde(with = "As::<DisplayFromStr>")]
        coin: u64,
    },
    #[serde(rename = "dRepUpdate", rename_all = "camelCase")]
    DRepUpdate {
        drep_id: String,
        #[serde(default)]
        anchor: Option<Anchor>,
    },
}

impl CertificateType {
    /// Coin locked by this certificate.
    pub fn deposit(&self, params: &ProtocolParams) -> u64 {
        match self {
            CertificateType::RegisterPool { .. } => params.pool_deposit,
            CertificateType::RegisterStake { .. } => params.key_deposit,
            CertificateType::StakeRegistrationAndDelegation { coin, .. }
            | CertificateType::VoteRegistrationAndDelegation { coin, .. }
            | CertificateType::StakeVoteRegistrationAndDelegation { coin, .. }
            | CertificateType::DRepRegistration { coin, .. } => *coin,
            _ => 0,
        }
    }

    /// Coin released by this certificate.
    pub fn refund(&self, params: &ProtocolParams) -> u64 {
        match self {
            CertificateType::DeregisterStake { .. } => params.key_deposit,
            CertificateType::DRepDeregistration { coin, .. } => *coin,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Certificate {
    #[serde(rename = "basicCertificate")]
    Basic(CertificateType),
    #[serde(rename = "scriptCertificate", rename_all = "camelCase")]
    Script {
        cert: CertificateType,
        redeemer: Redeemer,
        script_source: ScriptSource,
    },
    #[serde(rename = "simpleScriptCertificate", rename_all = "camelCase")]
    SimpleScript {
        cert: CertificateType,
        simple_script_source: SimpleScriptSource,
    },
}

impl Certificate {
    pub fn cert_type(&self) -> &CertificateType {
        match self {
            Certificate::Basic(cert) => cert,
            Certificate::Script { cert, .. } | Certificate::SimpleScript { cert, .. } => cert,
        }
    }

    pub fn redeemer_mut(&mut self) -> Option<&mut Redeemer> {
        match self {
            Certificate::Script { redeemer, .. } => Some(redeemer),
            _ => None,
        }
    }

    pub fn redeemer(&self) -> Option<&Redeemer> {
        match self {
            Certificate::Script { redeemer, .. } => Some(redeemer),
            _ => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        match self {
            Certificate::Basic(_) => true,
            Certificate::Script { script_source, .. } => script_source.is_complete(),
            Certificate::SimpleScript {
                simple_script_source,
                ..
            } => simple_script_source.is_complete(),
        }
    }
}
