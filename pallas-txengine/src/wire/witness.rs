//! Witness set assembly: signers, scripts, datums, redeemers and the script integrity hash.

use std::collections::BTreeSet;

use pallas_codec::minicbor::{self, Encoder};
use pallas_crypto::{
    hash::{Hash, Hasher},
    key::ed25519::SecretKey,
};
use pallas_primitives::{
    conway::{
        ExUnits as PallasExUnits, NativeScript, PlutusData, PlutusScript,
        Redeemer as PallasRedeemer, RedeemerTag as PallasRedeemerTag, Redeemers, TransactionBody,
        VKeyWitness, Voter as PallasVoter, WitnessSet,
    },
    MaybeIndefArray, NonEmptySet,
};
use pallas_traverse::ComputeHash;

use super::{conway, native};
use crate::{
    address,
    model::{
        decode_hex, plutus_script_bytes, Certificate, CertificateType, Credential, DatumSource,
        LanguageVersion, MintItem, OutputDatum, RedeemerTag, ScriptSource, SimpleScriptSource,
        TxBuilderBody, TxIn, Vote, Withdrawal,
    },
    params::CostModels,
    Error,
};

const VKEY_SIZE: usize = 32;
const SIGNATURE_SIZE: usize = 64;
const EMPTY_MAP: u8 = 0xa0;

#[derive(Debug, Default)]
pub(crate) struct Witnesses {
    native: Vec<NativeScript>,
    plutus: [Vec<Vec<u8>>; 3],
    datums: Vec<PlutusData>,
    redeemers: Option<Redeemers>,
    languages: BTreeSet<LanguageVersion>,
}

fn push_unique<T: PartialEq>(list: &mut Vec<T>, item: T) {
    if !list.contains(&item) {
        list.push(item);
    }
}

fn slot(version: LanguageVersion) -> usize {
    match version {
        LanguageVersion::V1 => 0,
        LanguageVersion::V2 => 1,
        LanguageVersion::V3 => 2,
    }
}

fn scripts<const N: usize>(list: Vec<Vec<u8>>) -> Option<NonEmptySet<PlutusScript<N>>> {
    NonEmptySet::from_vec(list.into_iter().map(|x| PlutusScript::<N>(x.into())).collect())
}

impl Witnesses {
    pub(crate) fn collect(body: &TxBuilderBody) -> Result<Self, Error> {
        let mut out = Self::default();

        for input in &body.inputs {
            match input {
                TxIn::Script { script_tx_in, .. } => {
                    out.plutus_source(&script_tx_in.script_source)?;

                    if let DatumSource::Provided { data } = &script_tx_in.datum_source {
                        push_unique(&mut out.datums, conway::plutus_data(data)?);
                    }
                }
                TxIn::SimpleScript {
                    simple_script_tx_in,
                    ..
                } => out.native_source(&simple_script_tx_in.simple_script_source)?,
                TxIn::PubKey { .. } => (),
            }
        }

        for mint in &body.mints {
            match mint {
                MintItem::Plutus { script_source, .. } => out.plutus_source(script_source)?,
                MintItem::Native { script_source, .. } => out.native_source(script_source)?,
            }
        }

        for cert in &body.certificates {
            match cert {
                Certificate::Script { script_source, .. } => out.plutus_source(script_source)?,
                Certificate::SimpleScript {
                    simple_script_source,
                    ..
                } => out.native_source(simple_script_source)?,
                Certificate::Basic(_) => (),
            }
        }

        for withdrawal in &body.withdrawals {
            match withdrawal {
                Withdrawal::Script { script_source, .. } => out.plutus_source(script_source)?,
                Withdrawal::SimpleScript {
                    simple_script_source,
                    ..
                } => out.native_source(simple_script_source)?,
                Withdrawal::PubKey { .. } => (),
            }
        }

        for vote in &body.votes {
            match vote {
                Vote::Script { script_source, .. } => out.plutus_source(script_source)?,
                Vote::SimpleScript {
                    simple_script_source,
                    ..
                } => out.native_source(simple_script_source)?,
                Vote::Basic(_) => (),
            }
        }

        for output in body.all_outputs() {
            if let Some(OutputDatum::Embedded(data)) = &output.datum {
                push_unique(&mut out.datums, conway::plutus_data(data)?);
            }
        }

        out.redeemers = redeemers(body)?;

        Ok(out)
    }

    fn plutus_source(&mut self, source: &ScriptSource) -> Result<(), Error> {
        match source {
            ScriptSource::Provided(x) => {
                let bytes = plutus_script_bytes(&x.script_cbor)?;
                push_unique(&mut self.plutus[slot(x.language_version)], bytes);
                self.languages.insert(x.language_version);
            }
            ScriptSource::Inline(x) => {
                if let Some(version) = x.language_version {
                    self.languages.insert(version);
                }
            }
        }

        Ok(())
    }

    fn native_source(&mut self, source: &SimpleScriptSource) -> Result<(), Error> {
        if let SimpleScriptSource::Provided(x) = source {
            push_unique(&mut self.native, conway::native_script(&x.script_cbor)?);
        }

        Ok(())
    }

    fn datum_set(&self) -> Option<NonEmptySet<PlutusData>> {
        NonEmptySet::from_vec(self.datums.clone())
    }

    /// Hash binding redeemers, datums and cost models; `None` when neither redeemers nor datums
    /// are present.
    pub(crate) fn script_data_hash(
        &self,
        cost_models: &CostModels,
    ) -> Result<Option<Hash<32>>, Error> {
        let datums = self.datum_set();

        if self.redeemers.is_none() && datums.is_none() {
            return Ok(None);
        }

        let mut preimage = vec![];

        match &self.redeemers {
            Some(redeemers) => {
                preimage.extend(minicbor::to_vec(redeemers)?);

                if let Some(datums) = &datums {
                    preimage.extend(minicbor::to_vec(datums)?);
                }

                preimage.extend(language_views(&self.languages, cost_models)?);
            }
            None => {
                preimage.push(EMPTY_MAP);

                if let Some(datums) = &datums {
                    preimage.extend(minicbor::to_vec(datums)?);
                }

                preimage.push(EMPTY_MAP);
            }
        }

        Ok(Some(Hasher::<256>::hash(&preimage)))
    }

    pub(crate) fn witness_set(self, vkeys: Vec<VKeyWitness>) -> WitnessSet {
        let plutus_data = self.datum_set();
        let [v1, v2, v3] = self.plutus;

        WitnessSet {
            vkeywitness: NonEmptySet::from_vec(vkeys),
            native_script: NonEmptySet::from_vec(self.native),
            bootstrap_witness: None,
            plutus_v1_script: scripts::<1>(v1),
            plutus_data,
            redeemer: self.redeemers,
            plutus_v2_script: scripts::<2>(v2),
            plutus_v3_script: scripts::<3>(v3),
        }
    }
}

fn redeemer_tag(tag: RedeemerTag) -> PallasRedeemerTag {
    match tag {
        RedeemerTag::Spend => PallasRedeemerTag::Spend,
        RedeemerTag::Mint => PallasRedeemerTag::Mint,
        RedeemerTag::Cert => PallasRedeemerTag::Cert,
        RedeemerTag::Reward => PallasRedeemerTag::Reward,
        RedeemerTag::Vote => PallasRedeemerTag::Vote,
    }
}

fn redeemers(body: &TxBuilderBody) -> Result<Option<Redeemers>, Error> {
    let all = body
        .redeemers()
        .into_iter()
        .map(|(tag, index, redeemer)| {
            Ok(PallasRedeemer {
                tag: redeemer_tag(tag),
                index,
                data: conway::plutus_data(&redeemer.data)?,
                ex_units: PallasExUnits {
                    mem: redeemer.ex_units.mem,
                    steps: redeemer.ex_units.steps,
                },
            })
        })
        .collect::<Result<Vec<_>, Error>>()?;

    if all.is_empty() {
        return Ok(None);
    }

    Ok(Some(Redeemers::List(MaybeIndefArray::Def(all))))
}

/// Cost model views of the used languages, keys in canonical order.
fn language_views(
    languages: &BTreeSet<LanguageVersion>,
    cost_models: &CostModels,
) -> Result<Vec<u8>, Error> {
    let canonical = [LanguageVersion::V2, LanguageVersion::V3, LanguageVersion::V1];
    let used: Vec<_> = canonical
        .into_iter()
        .filter(|x| languages.contains(x))
        .collect();

    let mut e = Encoder::new(Vec::new());
    e.map(used.len() as u64)?;

    for version in used {
        let costs = cost_models.get(version).unwrap_or(&[]);

        match version {
            LanguageVersion::V1 => {
                let mut inner = Encoder::new(Vec::new());
                inner.begin_array()?;
                for cost in costs {
                    inner.i64(*cost)?;
                }
                inner.end()?;

                e.bytes(&[0])?.bytes(&inner.into_writer())?;
            }
            LanguageVersion::V2 | LanguageVersion::V3 => {
                e.u8(version.hash_tag() - 1)?.array(costs.len() as u64)?;
                for cost in costs {
                    e.i64(*cost)?;
                }
            }
        }
    }

    Ok(e.into_writer())
}

fn key_of(cred: Credential) -> Option<String> {
    match cred {
        Credential::KeyHash(x) => Some(x),
        Credential::ScriptHash(_) => None,
    }
}

fn cert_signers(cert: &CertificateType, out: &mut BTreeSet<String>) -> Result<(), Error> {
    use CertificateType::*;

    match cert {
        RegisterStake { .. } => (),
        DeregisterStake { stake_key_address }
        | DelegateStake {
            stake_key_address, ..
        }
        | VoteDelegation {
            stake_key_address, ..
        }
        | StakeAndVoteDelegation {
            stake_key_address, ..
        }
        | StakeRegistrationAndDelegation {
            stake_key_address, ..
        }
        | VoteRegistrationAndDelegation {
            stake_key_address, ..
        }
        | StakeVoteRegistrationAndDelegation {
            stake_key_address, ..
        } => out.extend(key_of(address::reward_credential(stake_key_address)?)),
        RegisterPool { pool_params } => {
            out.insert(address::pool_key_hash(&pool_params.operator)?);
            out.extend(pool_params.owners.iter().cloned());
        }
        RetirePool { pool_id, .. } => {
            out.insert(address::pool_key_hash(pool_id)?);
        }
        CommitteeHotAuth {
            committee_cold_key_address,
            ..
        }
        | CommitteeColdResign {
            committee_cold_key_address,
            ..
        } => out.extend(key_of(address::committee_cold_credential(
            committee_cold_key_address,
        )?)),
        DRepRegistration { drep_id, .. }
        | DRepDeregistration { drep_id, .. }
        | DRepUpdate { drep_id, .. } => out.extend(key_of(address::drep_credential(drep_id)?)),
    }

    Ok(())
}

fn native_signers(source: &SimpleScriptSource, out: &mut BTreeSet<String>) -> Result<(), Error> {
    if let SimpleScriptSource::Provided(x) = source {
        out.extend(native::key_hashes(&x.script_cbor)?);
    }

    Ok(())
}

/// Key hashes expected to sign the finished transaction.
pub(crate) fn signers(body: &TxBuilderBody) -> Result<BTreeSet<String>, Error> {
    let mut out = BTreeSet::new();

    for input in &body.inputs {
        if let Some(address) = &input.param().address {
            out.extend(address::payment_key_hash(address)?);
        }

        if let TxIn::SimpleScript {
            simple_script_tx_in,
            ..
        } = input
        {
            native_signers(&simple_script_tx_in.simple_script_source, &mut out)?;
        }
    }

    for collateral in &body.collaterals {
        if let Some(address) = &collateral.address {
            out.extend(address::payment_key_hash(address)?);
        }
    }

    out.extend(body.required_signatures.iter().cloned());

    for withdrawal in &body.withdrawals {
        match withdrawal {
            Withdrawal::PubKey { address, .. } => {
                out.extend(key_of(address::reward_credential(address)?))
            }
            Withdrawal::SimpleScript {
                simple_script_source,
                ..
            } => native_signers(simple_script_source, &mut out)?,
            Withdrawal::Script { .. } => (),
        }
    }

    for cert in &body.certificates {
        match cert {
            Certificate::Basic(x) => cert_signers(x, &mut out)?,
            Certificate::SimpleScript {
                simple_script_source,
                ..
            } => native_signers(simple_script_source, &mut out)?,
            Certificate::Script { .. } => (),
        }
    }

    for vote in &body.votes {
        match vote {
            Vote::Basic(x) => match conway::voter(&x.voter)? {
                PallasVoter::ConstitutionalCommitteeKey(hash)
                | PallasVoter::DRepKey(hash)
                | PallasVoter::StakePoolKey(hash) => {
                    out.insert(hash.to_string());
                }
                PallasVoter::ConstitutionalCommitteeScript(_) | PallasVoter::DRepScript(_) => (),
            },
            Vote::SimpleScript {
                simple_script_source,
                ..
            } => native_signers(simple_script_source, &mut out)?,
            Vote::Script { .. } => (),
        }
    }

    for mint in &body.mints {
        if let MintItem::Native { script_source, .. } = mint {
            native_signers(script_source, &mut out)?;
        }
    }

    for key in signing_keys(body)? {
        out.insert(Hasher::<224>::hash(key.public_key().as_ref()).to_string());
    }

    Ok(out)
}

/// Signing keys of the body, accepting both raw and CBOR-prefixed hex.
pub(crate) fn signing_keys(body: &TxBuilderBody) -> Result<Vec<SecretKey>, Error> {
    body.signing_key
        .iter()
        .map(|text| {
            let text = text.strip_prefix("5820").unwrap_or(text);
            let bytes: [u8; 32] = decode_hex("signing key", text)?
                .try_into()
                .map_err(|_| Error::structural("signing key must be 32 bytes"))?;

            Ok(SecretKey::from(bytes))
        })
        .collect()
}

/// Zeroed witnesses, one per expected signer, so drafts weigh what the signed result will.
pub(crate) fn placeholder_vkeys(body: &TxBuilderBody) -> Result<Vec<VKeyWitness>, Error> {
    let out = signers(body)?
        .into_iter()
        .enumerate()
        .map(|(i, _)| {
            let mut vkey = vec![0u8; VKEY_SIZE];
            vkey[..8].copy_from_slice(&(i as u64).to_be_bytes());

            VKeyWitness {
                vkey: vkey.into(),
                signature: vec![0u8; SIGNATURE_SIZE].into(),
            }
        })
        .collect();

    Ok(out)
}

pub(crate) fn sign(
    body: &TxBuilderBody,
    tx_body: &TransactionBody,
) -> Result<Vec<VKeyWitness>, Error> {
    let hash = tx_body.compute_hash();

    let out = signing_keys(body)?
        .into_iter()
        .map(|key| VKeyWitness {
            vkey: key.public_key().as_ref().to_vec().into(),
            signature: key.sign(hash).as_ref().to_vec().into(),
        })
        .collect();

    Ok(out)
}
