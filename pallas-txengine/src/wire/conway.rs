//! Conversion of builder bodies into Conway ledger primitives.

use pallas_codec::utils::{Bytes, CborWrap, KeyValuePairs};
use pallas_crypto::hash::Hash;
use pallas_primitives::{
    conway::{
        Anchor as PallasAnchor, AuxiliaryData, Certificate as PallasCertificate,
        DRep as PallasDRep, DatumOption, GovActionId, Metadatum as PallasMetadatum, Mint,
        NativeScript, NetworkId, PlutusData, PlutusScript, PoolMetadata,
        PostAlonzoTransactionOutput, PseudoScript, PseudoTransactionOutput, RationalNumber,
        Relay as PallasRelay, ScriptRef, StakeCredential, TransactionBody, TransactionInput,
        TransactionOutput, Value as PallasValue, Vote as PallasVote, Voter as PallasVoter,
        VotingProcedure, VotingProcedures,
    },
    Fragment, NonEmptyKeyValuePairs, NonEmptySet, NonZeroInt, Nullable, PositiveCoin, Set,
};

use crate::{
    address,
    data::BuilderData,
    model::{
        decode_hex, distinct_voters, mint_policies, plutus_script_bytes, Anchor, Certificate,
        CertificateType, Credential, DRep, Metadatum, Output, OutputDatum, OutputScript, Relay,
        TxBuilderBody, TxInParameter, Vote, VoteKind, Voter,
    },
    value::Value,
    Error,
};

pub(crate) fn hash<const N: usize>(what: &str, text: &str) -> Result<Hash<N>, Error> {
    let bytes = decode_hex(what, text)?;

    if bytes.len() != N {
        return Err(Error::structural(format!(
            "{what} must be {N} bytes, got {}",
            bytes.len()
        )));
    }

    Ok(Hash::from(bytes.as_slice()))
}

fn coin(quantity: u128) -> Result<u64, Error> {
    u64::try_from(quantity).map_err(|_| Error::structural(format!("{quantity} exceeds a u64 coin")))
}

fn tx_input(tx_hash: &str, index: u32) -> Result<TransactionInput, Error> {
    Ok(TransactionInput {
        transaction_id: hash("tx hash", tx_hash)?,
        index: index.into(),
    })
}

fn inputs<'a>(
    params: impl Iterator<Item = &'a TxInParameter>,
) -> Result<Vec<TransactionInput>, Error> {
    params.map(|x| tx_input(&x.tx_hash, x.tx_index)).collect()
}

pub(crate) fn value(amount: &Value) -> Result<PallasValue, Error> {
    let lovelace = coin(amount.coin())?;

    let mut policies = vec![];

    for (policy, assets) in amount.policies() {
        let assets = assets
            .into_iter()
            .map(|(name, quantity)| {
                let quantity = PositiveCoin::try_from(coin(quantity)?)
                    .map_err(|_| Error::structural(format!("zero quantity of {policy}{name}")))?;

                Ok((Bytes::from(decode_hex("asset name", name)?), quantity))
            })
            .collect::<Result<Vec<_>, Error>>()?;

        if let Some(assets) = NonEmptyKeyValuePairs::from_vec(assets) {
            policies.push((hash("policy id", policy)?, assets));
        }
    }

    let out = match NonEmptyKeyValuePairs::from_vec(policies) {
        Some(multiasset) => PallasValue::Multiasset(lovelace, multiasset),
        None => PallasValue::Coin(lovelace),
    };

    Ok(out)
}

pub(crate) fn native_script(script_cbor: &str) -> Result<NativeScript, Error> {
    let bytes = decode_hex("native script", script_cbor)?;

    NativeScript::decode_fragment(&bytes)
        .map_err(|e| Error::structural(format!("native script: {e}")))
}

pub(crate) fn script_ref(script: &OutputScript) -> Result<ScriptRef, Error> {
    let out = match script {
        OutputScript::Native { script_cbor } => {
            PseudoScript::NativeScript(native_script(script_cbor)?)
        }
        OutputScript::Plutus {
            script_cbor,
            language_version,
        } => {
            let bytes = Bytes::from(plutus_script_bytes(script_cbor)?);

            match language_version.hash_tag() {
                1 => PseudoScript::PlutusV1Script(PlutusScript::<1>(bytes)),
                2 => PseudoScript::PlutusV2Script(PlutusScript::<2>(bytes)),
                _ => PseudoScript::PlutusV3Script(PlutusScript::<3>(bytes)),
            }
        }
    };

    Ok(out)
}

/// Raw CBOR payloads are decoded as given, so their definite or indefinite framing survives.
pub(crate) fn plutus_data(data: &BuilderData) -> Result<PlutusData, Error> {
    match data {
        BuilderData::Mesh(x) | BuilderData::Json(x) => Ok(x.into()),
        BuilderData::Cbor(_) => PlutusData::decode_fragment(&data.to_cbor()?)
            .map_err(|e| Error::structural(format!("plutus data: {e}"))),
    }
}

pub(crate) fn output(out: &Output) -> Result<TransactionOutput, Error> {
    let datum_option = match &out.datum {
        Some(OutputDatum::Hash(data)) | Some(OutputDatum::Embedded(data)) => {
            Some(DatumOption::Hash(hash("datum hash", &data.hash()?)?))
        }
        Some(OutputDatum::Inline(data)) => Some(DatumOption::Data(CborWrap(plutus_data(data)?))),
        None => None,
    };

    let script_ref = out
        .reference_script
        .as_ref()
        .map(script_ref)
        .transpose()?
        .map(CborWrap);

    Ok(PseudoTransactionOutput::PostAlonzo(
        PostAlonzoTransactionOutput {
            address: address::address_bytes(&out.address)?.into(),
            value: value(&out.amount)?,
            datum_option,
            script_ref,
        },
    ))
}

pub(crate) fn output_bytes(out: &Output) -> Result<Vec<u8>, Error> {
    output(out)?
        .encode_fragment()
        .map_err(|e| Error::Serializer(e.to_string()))
}

fn credential(cred: &Credential) -> Result<StakeCredential, Error> {
    let out = match cred {
        Credential::KeyHash(x) => StakeCredential::AddrKeyhash(hash("credential", x)?),
        Credential::ScriptHash(x) => StakeCredential::ScriptHash(hash("credential", x)?),
    };

    Ok(out)
}

fn drep(drep: &DRep) -> Result<PallasDRep, Error> {
    let out = match drep {
        DRep::DRepId(id) => match address::drep_credential(id)? {
            Credential::KeyHash(x) => PallasDRep::Key(hash("drep", &x)?),
            Credential::ScriptHash(x) => PallasDRep::Script(hash("drep", &x)?),
        },
        DRep::AlwaysAbstain => PallasDRep::Abstain,
        DRep::AlwaysNoConfidence => PallasDRep::NoConfidence,
    };

    Ok(out)
}

fn anchor(anchor: &Option<Anchor>) -> Result<Nullable<PallasAnchor>, Error> {
    let out = anchor
        .as_ref()
        .map(|x| {
            Ok::<_, Error>(PallasAnchor {
                url: x.anchor_url.clone(),
                content_hash: hash("anchor hash", &x.anchor_data_hash)?,
            })
        })
        .transpose()?;

    Ok(out.into())
}

fn pool(pool_id: &str) -> Result<Hash<28>, Error> {
    hash("pool id", &address::pool_key_hash(pool_id)?)
}

fn relay(relay: &Relay) -> Result<PallasRelay, Error> {
    let port = |port: &Option<u16>| Nullable::from(port.map(u32::from));

    let out = match relay {
        Relay::SingleHostAddr { ipv4, ipv6, port: p } => {
            let ipv4 = ipv4
                .as_ref()
                .map(|ip| {
                    ip.parse::<std::net::Ipv4Addr>()
                        .map(|ip| Bytes::from(ip.octets().to_vec()))
                        .map_err(|_| Error::structural(format!("relay ipv4 {ip}")))
                })
                .transpose()?;

            let ipv6 = ipv6
                .as_ref()
                .map(|ip| {
                    ip.parse::<std::net::Ipv6Addr>()
                        .map(|ip| Bytes::from(ip.octets().to_vec()))
                        .map_err(|_| Error::structural(format!("relay ipv6 {ip}")))
                })
                .transpose()?;

            PallasRelay::SingleHostAddr(port(p), Nullable::from(ipv4), Nullable::from(ipv6))
        }
        Relay::SingleHostName { hostname, port: p } => {
            PallasRelay::SingleHostName(port(p), hostname.clone())
        }
        Relay::MultiHostName { dns_name } => PallasRelay::MultiHostName(dns_name.clone()),
    };

    Ok(out)
}

fn certificate(cert: &CertificateType) -> Result<PallasCertificate, Error> {
    use CertificateType::*;

    let stake = |x: &str| -> Result<StakeCredential, Error> {
        credential(&address::reward_credential(x)?)
    };
    let cold = |x: &str| -> Result<StakeCredential, Error> {
        credential(&address::committee_cold_credential(x)?)
    };
    let drep_cred = |x: &str| -> Result<StakeCredential, Error> {
        credential(&address::drep_credential(x)?)
    };

    let out = match cert {
        RegisterStake { stake_key_address } => {
            PallasCertificate::StakeRegistration(stake(stake_key_address)?)
        }
        DeregisterStake { stake_key_address } => {
            PallasCertificate::StakeDeregistration(stake(stake_key_address)?)
        }
        DelegateStake {
            stake_key_address,
            pool_id,
        } => PallasCertificate::StakeDelegation(stake(stake_key_address)?, pool(pool_id)?),
        RegisterPool { pool_params: p } => {
            let pool_owners = p
                .owners
                .iter()
                .map(|x| hash("pool owner", x))
                .collect::<Result<Vec<_>, _>>()?;

            let relays = p.relays.iter().map(relay).collect::<Result<_, _>>()?;

            let pool_metadata = p
                .metadata
                .as_ref()
                .map(|meta| {
                    Ok::<_, Error>(PoolMetadata {
                        url: meta.url.clone(),
                        hash: hash("pool metadata hash", &meta.hash)?,
                    })
                })
                .transpose()?;

            PallasCertificate::PoolRegistration {
                operator: pool(&p.operator)?,
                vrf_keyhash: hash("vrf key hash", &p.vrf_key_hash)?,
                pledge: p.pledge,
                cost: p.cost,
                margin: RationalNumber {
                    numerator: p.margin.numerator,
                    denominator: p.margin.denominator,
                },
                reward_account: address::address_bytes(&p.reward_address)?.into(),
                pool_owners: Set::from(pool_owners),
                relays,
                pool_metadata: pool_metadata.into(),
            }
        }
        RetirePool { pool_id, epoch } => PallasCertificate::PoolRetirement(pool(pool_id)?, *epoch),
        VoteDelegation {
            stake_key_address,
            drep: d,
        } => PallasCertificate::VoteDeleg(stake(stake_key_address)?, drep(d)?),
        StakeAndVoteDelegation {
            stake_key_address,
            pool_key_hash,
            drep: d,
        } => PallasCertificate::StakeVoteDeleg(
            stake(stake_key_address)?,
            pool(pool_key_hash)?,
            drep(d)?,
        ),
        StakeRegistrationAndDelegation {
            stake_key_address,
            pool_key_hash,
            coin,
        } => PallasCertificate::StakeRegDeleg(
            stake(stake_key_address)?,
            pool(pool_key_hash)?,
            *coin,
        ),
        VoteRegistrationAndDelegation {
            stake_key_address,
            drep: d,
            coin,
        } => PallasCertificate::VoteRegDeleg(stake(stake_key_address)?, drep(d)?, *coin),
        StakeVoteRegistrationAndDelegation {
            stake_key_address,
            pool_key_hash,
            drep: d,
            coin,
        } => PallasCertificate::StakeVoteRegDeleg(
            stake(stake_key_address)?,
            pool(pool_key_hash)?,
            drep(d)?,
            *coin,
        ),
        CommitteeHotAuth {
            committee_cold_key_address,
            committee_hot_key_address,
        } => PallasCertificate::AuthCommitteeHot(
            cold(committee_cold_key_address)?,
            credential(&address::committee_hot_credential(
                committee_hot_key_address,
            )?)?,
        ),
        CommitteeColdResign {
            committee_cold_key_address,
            anchor: a,
        } => PallasCertificate::ResignCommitteeCold(cold(committee_cold_key_address)?, anchor(a)?),
        DRepRegistration {
            drep_id,
            coin,
            anchor: a,
        } => PallasCertificate::RegDRepCert(drep_cred(drep_id)?, *coin, anchor(a)?),
        DRepDeregistration { drep_id, coin } => {
            PallasCertificate::UnRegDRepCert(drep_cred(drep_id)?, *coin)
        }
        DRepUpdate { drep_id, anchor: a } => {
            PallasCertificate::UpdateDRepCert(drep_cred(drep_id)?, anchor(a)?)
        }
    };

    Ok(out)
}

pub(crate) fn voter(voter: &Voter) -> Result<PallasVoter, Error> {
    let out = match voter {
        Voter::ConstitutionalCommittee(Credential::KeyHash(x)) => {
            PallasVoter::ConstitutionalCommitteeKey(hash("voter", x)?)
        }
        Voter::ConstitutionalCommittee(Credential::ScriptHash(x)) => {
            PallasVoter::ConstitutionalCommitteeScript(hash("voter", x)?)
        }
        Voter::DRep(id) => match address::drep_credential(id)? {
            Credential::KeyHash(x) => PallasVoter::DRepKey(hash("voter", &x)?),
            Credential::ScriptHash(x) => PallasVoter::DRepScript(hash("voter", &x)?),
        },
        Voter::StakingPool(id) => PallasVoter::StakePoolKey(pool(id)?),
    };

    Ok(out)
}

fn voting_procedures(votes: &[Vote]) -> Result<Option<VotingProcedures>, Error> {
    let mut out = vec![];

    for who in distinct_voters(votes) {
        let cast = votes
            .iter()
            .map(Vote::params)
            .filter(|x| x.voter == *who)
            .map(|vote| {
                let action = GovActionId {
                    transaction_id: hash("gov action tx hash", &vote.gov_action_id.tx_hash)?,
                    action_index: vote.gov_action_id.tx_index,
                };

                let procedure = VotingProcedure {
                    vote: match vote.voting_procedure.vote_kind {
                        VoteKind::No => PallasVote::No,
                        VoteKind::Yes => PallasVote::Yes,
                        VoteKind::Abstain => PallasVote::Abstain,
                    },
                    anchor: anchor(&vote.voting_procedure.anchor)?,
                };

                Ok((action, procedure))
            })
            .collect::<Result<Vec<_>, Error>>()?;

        if let Some(cast) = NonEmptyKeyValuePairs::from_vec(cast) {
            out.push((voter(who)?, cast));
        }
    }

    Ok(NonEmptyKeyValuePairs::from_vec(out))
}

fn mint(body: &TxBuilderBody) -> Result<Option<Mint>, Error> {
    let mut out = vec![];

    for policy in mint_policies(&body.mints) {
        let mut assets: Vec<(&str, i128)> = vec![];

        for item in body.mints.iter().filter(|m| m.policy_id() == policy) {
            match assets.iter_mut().find(|(name, _)| *name == item.asset_name()) {
                Some((_, amount)) => *amount += item.amount(),
                None => assets.push((item.asset_name(), item.amount())),
            }
        }

        let assets = assets
            .into_iter()
            .map(|(name, amount)| {
                let amount = i64::try_from(amount)
                    .ok()
                    .and_then(|x| NonZeroInt::try_from(x).ok())
                    .ok_or_else(|| {
                        Error::structural(format!("mint quantity {amount} out of range"))
                    })?;

                Ok((Bytes::from(decode_hex("asset name", name)?), amount))
            })
            .collect::<Result<Vec<_>, Error>>()?;

        if let Some(assets) = NonEmptyKeyValuePairs::from_vec(assets) {
            out.push((hash("policy id", policy)?, assets));
        }
    }

    Ok(NonEmptyKeyValuePairs::from_vec(out))
}

fn metadatum(value: &Metadatum) -> Result<PallasMetadatum, Error> {
    let out = match value {
        Metadatum::Int(x) => {
            let x = i64::try_from(*x)
                .map_err(|_| Error::structural(format!("metadata integer {x} out of range")))?;
            PallasMetadatum::Int(x.into())
        }
        Metadatum::Bytes(x) => PallasMetadatum::Bytes(decode_hex("metadata bytes", x)?.into()),
        Metadatum::Text(x) => PallasMetadatum::Text(x.clone()),
        Metadatum::List(items) => {
            PallasMetadatum::Array(items.iter().map(metadatum).collect::<Result<_, _>>()?)
        }
        Metadatum::Map(entries) => PallasMetadatum::Map(KeyValuePairs::Def(
            entries
                .iter()
                .map(|(k, v)| Ok((metadatum(k)?, metadatum(v)?)))
                .collect::<Result<_, Error>>()?,
        )),
    };

    Ok(out)
}

/// Auxiliary data in its plain metadata form, `None` without metadata.
pub(crate) fn auxiliary_data(body: &TxBuilderBody) -> Result<Option<AuxiliaryData>, Error> {
    if body.metadata.is_empty() {
        return Ok(None);
    }

    let metadata = body
        .metadata
        .iter()
        .map(|(label, value)| Ok((*label, metadatum(value)?)))
        .collect::<Result<Vec<_>, Error>>()?;

    Ok(Some(AuxiliaryData::Shelley(KeyValuePairs::Def(metadata))))
}

pub(crate) fn body(
    body: &TxBuilderBody,
    script_data_hash: Option<Hash<32>>,
    aux_data_hash: Option<Hash<32>>,
) -> Result<TransactionBody, Error> {
    let outputs = body.all_outputs().map(output).collect::<Result<_, _>>()?;

    let certificates = body
        .certificates
        .iter()
        .map(|x| certificate(Certificate::cert_type(x)))
        .collect::<Result<Vec<_>, _>>()?;

    let withdrawals = body
        .withdrawals
        .iter()
        .map(|x| Ok((Bytes::from(address::address_bytes(x.address())?), x.coin())))
        .collect::<Result<Vec<_>, Error>>()?;

    let required_signers = body
        .required_signatures
        .iter()
        .map(|x| hash("required signer", x))
        .collect::<Result<Vec<_>, _>>()?;

    let network_id = NetworkId::try_from(body.network.network_id())
        .map_err(|_| Error::structural("unknown network id"))?;

    Ok(TransactionBody {
        inputs: Set::from(inputs(body.inputs.iter().map(|x| x.param()))?),
        outputs,
        fee: body.fee,
        ttl: body.validity_range.invalid_hereafter,
        certificates: NonEmptySet::from_vec(certificates),
        withdrawals: NonEmptyKeyValuePairs::from_vec(withdrawals),
        auxiliary_data_hash: aux_data_hash.map(|x| x.to_vec().into()),
        validity_interval_start: body.validity_range.invalid_before,
        mint: mint(body)?,
        script_data_hash,
        collateral: NonEmptySet::from_vec(inputs(body.collaterals.iter())?),
        required_signers: NonEmptySet::from_vec(required_signers),
        network_id: Some(network_id),
        collateral_return: None,
        total_collateral: None,
        reference_inputs: NonEmptySet::from_vec(inputs(body.reference_inputs.iter())?),
        voting_procedures: voting_procedures(&body.votes)?,
        proposal_procedures: None,
        treasury_value: None,
        donation: None,
    })
}
