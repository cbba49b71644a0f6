//! The fluent transaction builder and its completion session.

use tracing::debug;

use crate::{
    address,
    balance::{self, Balancer},
    fee,
    model::{
        Anchor, Certificate, CertificateType, DRep, DatumSource, Metadatum, MintItem, Output,
        OutputDatum, OutputScript, Redeemer, ScriptSource, ScriptTxIn, SelectionConfig,
        SimpleScriptSource, SimpleScriptTxIn, TxBuilderBody, TxIn, TxInParameter, Utxo, Vote,
        VoteParams, Voter, Withdrawal,
    },
    order::{LedgerOrdering, OrderingPolicy},
    params::{EngineConfig, Network, ProtocolParams},
    provider::{BoxError, Evaluator, Resolver, TxSerializer},
    resolve,
    value::{self, Value},
    Error,
};

const TX_HASH_HEX_LEN: usize = 64;
const HASH28_HEX_LEN: usize = 56;
const MAX_ASSET_NAME_HEX_LEN: usize = 64;

fn check_hex(what: &str, text: &str, len: Option<usize>) -> Result<(), Error> {
    if text.len() % 2 != 0 || !text.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::structural(format!("{what} {text:?} is not hex")));
    }

    match len {
        Some(len) if text.len() != len => Err(Error::structural(format!(
            "{what} {text:?} must be {} bytes",
            len / 2
        ))),
        _ => Ok(()),
    }
}

/// Checks a transaction hash and folds it to lowercase, the form used to compare inputs.
fn check_tx_hash(text: &mut String) -> Result<(), Error> {
    check_hex("tx hash", text, Some(TX_HASH_HEX_LEN))?;
    text.make_ascii_lowercase();
    Ok(())
}

fn check_hash28(what: &str, text: &str) -> Result<(), Error> {
    check_hex(what, text, Some(HASH28_HEX_LEN))
}

fn check_script_cbor(text: &str) -> Result<(), Error> {
    if text.is_empty() {
        return Err(Error::structural("script code is empty"));
    }

    check_hex("script code", text, None)
}

fn check_param(param: &mut TxInParameter) -> Result<(), Error> {
    check_tx_hash(&mut param.tx_hash)?;

    if let Some(address) = &param.address {
        address::parse_address(address)?;
    }

    Ok(())
}

fn check_script_hash(hash: &mut Option<String>) -> Result<(), Error> {
    if let Some(hash) = hash {
        check_hash28("script hash", hash)?;
        hash.make_ascii_lowercase();
    }

    Ok(())
}

fn check_script_source(source: &mut ScriptSource) -> Result<(), Error> {
    match source {
        ScriptSource::Provided(x) => check_script_cbor(&x.script_cbor),
        ScriptSource::Inline(x) => {
            check_tx_hash(&mut x.ref_tx_in.tx_hash)?;
            check_script_hash(&mut x.script_hash)
        }
    }
}

fn check_simple_script_source(source: &mut SimpleScriptSource) -> Result<(), Error> {
    match source {
        SimpleScriptSource::Provided(x) => check_script_cbor(&x.script_cbor),
        SimpleScriptSource::Inline(x) => {
            check_tx_hash(&mut x.ref_tx_in.tx_hash)?;
            check_script_hash(&mut x.simple_script_hash)
        }
    }
}

fn check_data(data: &crate::data::BuilderData) -> Result<(), Error> {
    data.to_cbor().map(|_| ())
}

fn check_datum_source(source: &mut DatumSource) -> Result<(), Error> {
    match source {
        DatumSource::Provided { data } => check_data(data),
        DatumSource::Inline { tx_hash, .. } => check_tx_hash(tx_hash),
    }
}

fn check_redeemer(redeemer: &Redeemer) -> Result<(), Error> {
    check_data(&redeemer.data)
}

fn check_value(amount: &Value) -> Result<(), Error> {
    for unit in amount.units() {
        if unit == value::LOVELACE {
            continue;
        }

        let (Some(policy), Some(name)) = (value::policy_id_of(unit), value::asset_name_of(unit))
        else {
            return Err(Error::structural(format!("unit {unit:?} is not a policy and name")));
        };

        check_hash28("policy id", policy)?;
        check_asset_name(name)?;
    }

    Ok(())
}

fn check_asset_name(name: &str) -> Result<(), Error> {
    check_hex("asset name", name, None)?;

    if name.len() > MAX_ASSET_NAME_HEX_LEN {
        return Err(Error::structural(format!(
            "asset name {name} is longer than 32 bytes"
        )));
    }

    Ok(())
}

fn check_output(output: &Output) -> Result<(), Error> {
    address::parse_address(&output.address)?;
    check_value(&output.amount)?;

    if let Some(datum) = &output.datum {
        check_data(datum.data())?;
    }

    match &output.reference_script {
        Some(OutputScript::Plutus { script_cbor, .. }) => check_script_cbor(script_cbor),
        Some(OutputScript::Native { script_cbor }) => check_script_cbor(script_cbor),
        None => Ok(()),
    }
}

fn check_mint(policy_id: &str, asset_name: &str, amount: i128) -> Result<(), Error> {
    check_hash28("policy id", policy_id)?;
    check_asset_name(asset_name)?;

    if amount == 0 {
        return Err(Error::structural(format!(
            "mint of {policy_id}.{asset_name} has zero quantity"
        )));
    }

    Ok(())
}

fn check_anchor(anchor: &Option<Anchor>) -> Result<(), Error> {
    match anchor {
        Some(x) => check_hex("anchor data hash", &x.anchor_data_hash, Some(TX_HASH_HEX_LEN)),
        None => Ok(()),
    }
}

fn check_drep(drep: &DRep) -> Result<(), Error> {
    match drep {
        DRep::DRepId(id) => address::drep_credential(id).map(|_| ()),
        DRep::AlwaysAbstain | DRep::AlwaysNoConfidence => Ok(()),
    }
}

fn check_certificate(cert: &CertificateType) -> Result<(), Error> {
    use CertificateType::*;

    match cert {
        RegisterPool { pool_params } => {
            address::pool_key_hash(&pool_params.operator)?;
            check_hex("vrf key hash", &pool_params.vrf_key_hash, Some(TX_HASH_HEX_LEN))?;
            address::reward_credential(&pool_params.reward_address)?;

            for owner in &pool_params.owners {
                check_hash28("pool owner", owner)?;
            }

            if pool_params.margin.denominator == 0 {
                return Err(Error::structural("pool margin has a zero denominator"));
            }

            Ok(())
        }
        RegisterStake { stake_key_address } | DeregisterStake { stake_key_address } => {
            address::reward_credential(stake_key_address).map(|_| ())
        }
        DelegateStake {
            stake_key_address,
            pool_id,
        } => {
            address::reward_credential(stake_key_address)?;
            address::pool_key_hash(pool_id).map(|_| ())
        }
        RetirePool { pool_id, .. } => address::pool_key_hash(pool_id).map(|_| ()),
        VoteDelegation {
            stake_key_address,
            drep,
        }
        | VoteRegistrationAndDelegation {
            stake_key_address,
            drep,
            ..
        } => {
            address::reward_credential(stake_key_address)?;
            check_drep(drep)
        }
        StakeAndVoteDelegation {
            stake_key_address,
            pool_key_hash,
            drep,
        }
        | StakeVoteRegistrationAndDelegation {
            stake_key_address,
            pool_key_hash,
            drep,
            ..
        } => {
            address::reward_credential(stake_key_address)?;
            address::pool_key_hash(pool_key_hash)?;
            check_drep(drep)
        }
        StakeRegistrationAndDelegation {
            stake_key_address,
            pool_key_hash,
            ..
        } => {
            address::reward_credential(stake_key_address)?;
            address::pool_key_hash(pool_key_hash).map(|_| ())
        }
        CommitteeHotAuth {
            committee_cold_key_address,
            committee_hot_key_address,
        } => {
            address::committee_cold_credential(committee_cold_key_address)?;
            address::committee_hot_credential(committee_hot_key_address).map(|_| ())
        }
        CommitteeColdResign {
            committee_cold_key_address,
            anchor,
        } => {
            address::committee_cold_credential(committee_cold_key_address)?;
            check_anchor(anchor)
        }
        DRepRegistration { drep_id, anchor, .. } | DRepUpdate { drep_id, anchor } => {
            address::drep_credential(drep_id)?;
            check_anchor(anchor)
        }
        DRepDeregistration { drep_id, .. } => address::drep_credential(drep_id).map(|_| ()),
    }
}

fn check_vote(vote: &mut VoteParams) -> Result<(), Error> {
    match &vote.voter {
        Voter::ConstitutionalCommittee(cred) => check_hash28("committee credential", cred.hash())?,
        Voter::DRep(id) => {
            address::drep_credential(id)?;
        }
        Voter::StakingPool(hash) => {
            address::pool_key_hash(hash)?;
        }
    }

    check_tx_hash(&mut vote.gov_action_id.tx_hash)?;
    check_anchor(&vote.voting_procedure.anchor)
}

fn check_signing_key(key: &str) -> Result<(), Error> {
    let raw = key.strip_prefix("5820").unwrap_or(key);
    check_hex("signing key", raw, Some(64))
}

/// Re-runs every normalizer over a body that was assembled elsewhere, folding its hashes to
/// lowercase on the way.
pub fn validate_body(body: &mut TxBuilderBody) -> Result<(), Error> {
    for input in body.inputs.iter_mut() {
        match input {
            TxIn::PubKey { tx_in } => check_param(tx_in)?,
            TxIn::Script {
                tx_in,
                script_tx_in,
            } => {
                check_param(tx_in)?;
                check_script_source(&mut script_tx_in.script_source)?;
                check_datum_source(&mut script_tx_in.datum_source)?;
                check_redeemer(&script_tx_in.redeemer)?;
            }
            TxIn::SimpleScript {
                tx_in,
                simple_script_tx_in,
            } => {
                check_param(tx_in)?;
                check_simple_script_source(&mut simple_script_tx_in.simple_script_source)?;
            }
        }
    }

    for param in body
        .collaterals
        .iter_mut()
        .chain(body.reference_inputs.iter_mut())
    {
        check_param(param)?;
    }

    for output in &body.outputs {
        check_output(output)?;
    }

    for mint in body.mints.iter_mut() {
        check_mint(mint.policy_id(), mint.asset_name(), mint.amount())?;

        match mint {
            MintItem::Plutus {
                policy_id,
                asset_name,
                script_source,
                redeemer,
                ..
            } => {
                policy_id.make_ascii_lowercase();
                asset_name.make_ascii_lowercase();
                check_script_source(script_source)?;
                check_redeemer(redeemer)?;
            }
            MintItem::Native {
                policy_id,
                asset_name,
                script_source,
                ..
            } => {
                policy_id.make_ascii_lowercase();
                asset_name.make_ascii_lowercase();
                check_simple_script_source(script_source)?;
            }
        }
    }

    for cert in body.certificates.iter_mut() {
        check_certificate(cert.cert_type())?;

        match cert {
            Certificate::Basic(_) => (),
            Certificate::Script {
                script_source,
                redeemer,
                ..
            } => {
                check_script_source(script_source)?;
                check_redeemer(redeemer)?;
            }
            Certificate::SimpleScript {
                simple_script_source,
                ..
            } => check_simple_script_source(simple_script_source)?,
        }
    }

    for withdrawal in body.withdrawals.iter_mut() {
        address::reward_credential(withdrawal.address())?;

        match withdrawal {
            Withdrawal::PubKey { .. } => (),
            Withdrawal::Script {
                script_source,
                redeemer,
                ..
            } => {
                check_script_source(script_source)?;
                check_redeemer(redeemer)?;
            }
            Withdrawal::SimpleScript {
                simple_script_source,
                ..
            } => check_simple_script_source(simple_script_source)?,
        }
    }

    for vote in body.votes.iter_mut() {
        match vote {
            Vote::Basic(params) => check_vote(params)?,
            Vote::Script {
                vote,
                script_source,
                redeemer,
            } => {
                check_vote(vote)?;
                check_script_source(script_source)?;
                check_redeemer(redeemer)?;
            }
            Vote::SimpleScript {
                vote,
                simple_script_source,
            } => {
                check_vote(vote)?;
                check_simple_script_source(simple_script_source)?;
            }
        }
    }

    for hash in body.required_signatures.iter_mut() {
        check_hash28("required signer", hash)?;
        hash.make_ascii_lowercase();
    }

    for key in &body.signing_key {
        check_signing_key(key)?;
    }

    if let Some(address) = &body.change_address {
        address::parse_address(address)?;
    }

    Ok(())
}

fn resolver_error(what: &str) -> impl FnOnce(BoxError) -> Error + '_ {
    move |e| Error::IncompleteInfo {
        what: what.to_owned(),
        source: Some(e),
    }
}

/// Gives outputs that carry no base currency their minimum amount.
pub fn top_up_outputs(
    body: &mut TxBuilderBody,
    params: &ProtocolParams,
    serializer: &dyn TxSerializer,
) -> Result<(), Error> {
    for output in body.outputs.iter_mut() {
        if output.amount.coin() == 0 {
            let min = fee::min_lovelace(params, serializer, output)?;
            output.amount.set_coin(min as u128);
        }
    }

    Ok(())
}

/// Accumulates transaction intents and turns them into a balanced, signed transaction.
pub struct TxBuilder {
    body: TxBuilderBody,
    params: ProtocolParams,
    engine: EngineConfig,
    ordering: Box<dyn OrderingPolicy>,
    manual_fee: Option<u64>,
}

impl TxBuilder {
    pub fn new(params: ProtocolParams) -> Self {
        Self {
            body: TxBuilderBody::default(),
            params,
            engine: EngineConfig::default(),
            ordering: Box::new(LedgerOrdering),
            manual_fee: None,
        }
    }

    /// Starts from a body assembled elsewhere, typically decoded from its object form.
    pub fn from_body(mut body: TxBuilderBody, params: ProtocolParams) -> Result<Self, Error> {
        validate_body(&mut body)?;

        Ok(Self {
            body,
            ..Self::new(params)
        })
    }

    pub fn engine_config(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    pub fn ordering(mut self, ordering: impl OrderingPolicy + 'static) -> Self {
        self.ordering = Box::new(ordering);
        self
    }

    pub fn body(&self) -> &TxBuilderBody {
        &self.body
    }

    pub fn into_body(self) -> TxBuilderBody {
        self.body
    }

    pub fn params(&self) -> &ProtocolParams {
        &self.params
    }

    /// Discards every declared intent, keeping parameters and settings.
    pub fn reset(mut self) -> Self {
        self.body = TxBuilderBody::default();
        self.manual_fee = None;
        self
    }

    pub fn tx_in(mut self, mut param: TxInParameter) -> Result<Self, Error> {
        check_param(&mut param)?;

        self.body.inputs.push(TxIn::PubKey { tx_in: param });

        Ok(self)
    }

    /// Spends an output locked by a Plutus script.
    pub fn tx_in_script(
        mut self,
        mut param: TxInParameter,
        mut script_source: ScriptSource,
        mut datum_source: DatumSource,
        redeemer: Redeemer,
    ) -> Result<Self, Error> {
        check_param(&mut param)?;
        check_script_source(&mut script_source)?;
        check_datum_source(&mut datum_source)?;
        check_redeemer(&redeemer)?;

        self.body.inputs.push(TxIn::Script {
            tx_in: param,
            script_tx_in: ScriptTxIn {
                script_source,
                datum_source,
                redeemer,
            },
        });

        Ok(self)
    }

    pub fn tx_in_simple_script(
        mut self,
        mut param: TxInParameter,
        mut simple_script_source: SimpleScriptSource,
    ) -> Result<Self, Error> {
        check_param(&mut param)?;
        check_simple_script_source(&mut simple_script_source)?;

        self.body.inputs.push(TxIn::SimpleScript {
            tx_in: param,
            simple_script_tx_in: SimpleScriptTxIn {
                simple_script_source,
            },
        });

        Ok(self)
    }

    pub fn tx_in_collateral(mut self, mut param: TxInParameter) -> Result<Self, Error> {
        check_param(&mut param)?;

        param.script_size = Some(0);
        self.body.collaterals.push(param);

        Ok(self)
    }

    /// References an output without spending it.
    pub fn read_only_tx_in_reference(
        mut self,
        tx_hash: &str,
        tx_index: u32,
        script_size: Option<u64>,
    ) -> Result<Self, Error> {
        let mut param = TxInParameter::new(tx_hash, tx_index);
        check_tx_hash(&mut param.tx_hash)?;
        param.script_size = script_size;
        self.body.reference_inputs.push(param);

        Ok(self)
    }

    pub fn tx_out(mut self, output: Output) -> Result<Self, Error> {
        check_output(&output)?;
        self.body.outputs.push(output);
        Ok(self)
    }

    pub fn tx_out_datum(self, mut output: Output, datum: OutputDatum) -> Result<Self, Error> {
        output.datum = Some(datum);
        self.tx_out(output)
    }

    pub fn mint_plutus(
        mut self,
        policy_id: &str,
        asset_name: &str,
        amount: i128,
        mut script_source: ScriptSource,
        redeemer: Redeemer,
    ) -> Result<Self, Error> {
        check_mint(policy_id, asset_name, amount)?;
        check_script_source(&mut script_source)?;
        check_redeemer(&redeemer)?;

        self.body.mints.push(MintItem::Plutus {
            policy_id: policy_id.to_lowercase(),
            asset_name: asset_name.to_lowercase(),
            amount,
            script_source,
            redeemer,
        });

        Ok(self)
    }

    pub fn mint_native(
        mut self,
        policy_id: &str,
        asset_name: &str,
        amount: i128,
        mut script_source: SimpleScriptSource,
    ) -> Result<Self, Error> {
        check_mint(policy_id, asset_name, amount)?;
        check_simple_script_source(&mut script_source)?;

        self.body.mints.push(MintItem::Native {
            policy_id: policy_id.to_lowercase(),
            asset_name: asset_name.to_lowercase(),
            amount,
            script_source,
        });

        Ok(self)
    }

    pub fn certificate(mut self, cert: CertificateType) -> Result<Self, Error> {
        check_certificate(&cert)?;
        self.body.certificates.push(Certificate::Basic(cert));
        Ok(self)
    }

    pub fn certificate_script(
        mut self,
        cert: CertificateType,
        mut script_source: ScriptSource,
        redeemer: Redeemer,
    ) -> Result<Self, Error> {
        check_certificate(&cert)?;
        check_script_source(&mut script_source)?;
        check_redeemer(&redeemer)?;

        self.body.certificates.push(Certificate::Script {
            cert,
            redeemer,
            script_source,
        });

        Ok(self)
    }

    pub fn certificate_simple_script(
        mut self,
        cert: CertificateType,
        mut simple_script_source: SimpleScriptSource,
    ) -> Result<Self, Error> {
        check_certificate(&cert)?;
        check_simple_script_source(&mut simple_script_source)?;

        self.body.certificates.push(Certificate::SimpleScript {
            cert,
            simple_script_source,
        });

        Ok(self)
    }

    pub fn withdrawal(mut self, address: &str, coin: u64) -> Result<Self, Error> {
        address::reward_credential(address)?;

        self.body.withdrawals.push(Withdrawal::PubKey {
            address: address.to_owned(),
            coin,
        });

        Ok(self)
    }

    pub fn withdrawal_script(
        mut self,
        address: &str,
        coin: u64,
        mut script_source: ScriptSource,
        redeemer: Redeemer,
    ) -> Result<Self, Error> {
        address::reward_credential(address)?;
        check_script_source(&mut script_source)?;
        check_redeemer(&redeemer)?;

        self.body.withdrawals.push(Withdrawal::Script {
            address: address.to_owned(),
            coin,
            script_source,
            redeemer,
        });

        Ok(self)
    }

    pub fn withdrawal_simple_script(
        mut self,
        address: &str,
        coin: u64,
        mut simple_script_source: SimpleScriptSource,
    ) -> Result<Self, Error> {
        address::reward_credential(address)?;
        check_simple_script_source(&mut simple_script_source)?;

        self.body.withdrawals.push(Withdrawal::SimpleScript {
            address: address.to_owned(),
            coin,
            simple_script_source,
        });

        Ok(self)
    }

    pub fn vote(mut self, mut vote: VoteParams) -> Result<Self, Error> {
        check_vote(&mut vote)?;
        self.body.votes.push(Vote::Basic(vote));
        Ok(self)
    }

    pub fn vote_script(
        mut self,
        mut vote: VoteParams,
        mut script_source: ScriptSource,
        redeemer: Redeemer,
    ) -> Result<Self, Error> {
        check_vote(&mut vote)?;
        check_script_source(&mut script_source)?;
        check_redeemer(&redeemer)?;

        self.body.votes.push(Vote::Script {
            vote,
            redeemer,
            script_source,
        });

        Ok(self)
    }

    pub fn vote_simple_script(
        mut self,
        mut vote: VoteParams,
        mut simple_script_source: SimpleScriptSource,
    ) -> Result<Self, Error> {
        check_vote(&mut vote)?;
        check_simple_script_source(&mut simple_script_source)?;

        self.body.votes.push(Vote::SimpleScript {
            vote,
            simple_script_source,
        });

        Ok(self)
    }

    pub fn required_signer_hash(mut self, hash: &str) -> Result<Self, Error> {
        check_hash28("required signer", hash)?;
        self.body.required_signatures.push(hash.to_lowercase());
        Ok(self)
    }

    pub fn invalid_before(mut self, slot: u64) -> Self {
        self.body.validity_range.invalid_before = Some(slot);
        self
    }

    pub fn invalid_hereafter(mut self, slot: u64) -> Self {
        self.body.validity_range.invalid_hereafter = Some(slot);
        self
    }

    pub fn metadata_value(mut self, label: u64, json: &serde_json::Value) -> Result<Self, Error> {
        let value = Metadatum::from_json(json)?;
        self.body.metadata.insert(label, value);
        Ok(self)
    }

    /// Hex ed25519 secret key, bare or CBOR wrapped (`5820...`).
    pub fn signing_key(mut self, key: &str) -> Result<Self, Error> {
        check_signing_key(key)?;
        self.body.signing_key.push(key.to_owned());
        Ok(self)
    }

    pub fn change_address(mut self, address: &str) -> Result<Self, Error> {
        address::parse_address(address)?;
        self.body.change_address = Some(address.to_owned());
        Ok(self)
    }

    pub fn network(mut self, network: Network) -> Self {
        self.body.network = network;
        self
    }

    /// Candidate pool and strategy for coin selection.
    pub fn select_utxos_from(mut self, utxos: Vec<Utxo>, config: SelectionConfig) -> Self {
        self.body.extra_inputs = utxos;
        self.body.selection_config = config;
        self
    }

    pub fn chain_tx(mut self, tx_hex: &str) -> Result<Self, Error> {
        check_hex("chained transaction", tx_hex, None)?;
        self.body.chained_txs.push(tx_hex.to_owned());
        Ok(self)
    }

    pub fn input_for_evaluation(mut self, utxo: Utxo) -> Self {
        self.body.inputs_for_evaluation.push(utxo);
        self
    }

    /// Uses `fee` as is instead of converging on the minimum.
    pub fn set_fee(mut self, fee: u64) -> Self {
        self.manual_fee = Some(fee);
        self.body.fee = fee;
        self
    }

    fn balancer<'a>(&'a self, serializer: &'a dyn TxSerializer) -> Balancer<'a> {
        Balancer {
            params: &self.params,
            engine: &self.engine,
            serializer,
            ordering: self.ordering.as_ref(),
        }
    }

    fn prepare(
        &self,
        body: &mut TxBuilderBody,
        serializer: &dyn TxSerializer,
    ) -> Result<(), Error> {
        resolve::remove_duplicate_inputs(body);
        resolve::collect_reference_inputs(body);
        top_up_outputs(body, &self.params, serializer)?;
        self.ordering.order(body)?;

        Ok(())
    }

    fn finish(
        &mut self,
        body: TxBuilderBody,
        serializer: &dyn TxSerializer,
    ) -> Result<String, Error> {
        let tx = serializer.serialize(&body)?;

        self.balancer(serializer).verify(&tx, &body)?;

        debug!(
            fee = body.fee,
            inputs = body.inputs.len(),
            outputs = body.outputs.len() + body.change_output.iter().count(),
            "transaction balanced"
        );

        self.body = body;

        Ok(tx)
    }

    /// Resolves, funds, evaluates and balances the declared transaction, returning its signed hex.
    ///
    /// The balanced body replaces the declared one, so completing twice yields the same result.
    pub async fn complete(
        &mut self,
        resolver: &dyn Resolver,
        evaluator: Option<&dyn Evaluator>,
        serializer: &dyn TxSerializer,
    ) -> Result<String, Error> {
        let mut body = self.body.clone();
        validate_body(&mut body)?;

        resolve::remove_duplicate_inputs(&mut body);
        resolve::resolve_incomplete(&mut body, resolver).await?;

        if body.change_address.is_none() {
            let address = resolver
                .change_address()
                .await
                .map_err(resolver_error("change address"))?;

            body.change_address = Some(address);
        }

        let mut pool = if body.extra_inputs.is_empty() {
            resolver
                .list_wallet_utxos()
                .await
                .map_err(resolver_error("wallet utxos"))?
        } else {
            body.extra_inputs.clone()
        };

        if body.has_redeemers() && body.collaterals.is_empty() {
            let utxo = resolver
                .collateral()
                .await
                .map_err(resolver_error("collateral"))?;

            body.collaterals.push(TxInParameter::from(&utxo).script_size(0));
        }

        resolve::ensure_complete(&body)?;
        self.prepare(&mut body, serializer)?;

        let balancer = self.balancer(serializer);

        let body = match (self.manual_fee, evaluator) {
            (Some(fee), None) => balancer.with_fixed_fee(body, &mut pool, fee)?,
            (Some(fee), Some(evaluator)) => {
                let draft = balancer.with_fixed_fee(body.clone(), &mut pool, fee)?;

                if draft.has_redeemers() {
                    let bytes = serializer.serialize_draft(&draft)?;

                    let results = evaluator
                        .evaluate(
                            &bytes,
                            &balance::evaluation_context(&draft),
                            &draft.chained_txs,
                        )
                        .await
                        .map_err(|e| Error::Evaluation {
                            message: e.to_string(),
                            source: Some(e),
                        })?;

                    let mut evaluated = draft;
                    balance::apply_evaluation(
                        &mut evaluated,
                        &results,
                        self.engine.evaluation_multiplier,
                    )?;

                    balancer.with_fixed_fee(evaluated, &mut pool, fee)?
                } else {
                    draft
                }
            }
            (None, evaluator) => {
                balancer.initial_selection(&mut body, &mut pool)?;

                match evaluator {
                    Some(evaluator) => {
                        balancer
                            .converge_evaluated(body, &mut pool, evaluator)
                            .await?
                    }
                    None => balancer.converge(body, &mut pool)?,
                }
            }
        };

        self.finish(body, serializer)
    }

    /// Balances a body that needs nothing from the chain, without script evaluation.
    pub fn complete_sync(&mut self, serializer: &dyn TxSerializer) -> Result<String, Error> {
        let mut body = self.body.clone();
        validate_body(&mut body)?;

        resolve::remove_duplicate_inputs(&mut body);
        resolve::ensure_complete(&body)?;

        if body.change_address.is_none() {
            return Err(Error::incomplete("change address"));
        }

        self.prepare(&mut body, serializer)?;

        let mut pool = body.extra_inputs.clone();
        let balancer = self.balancer(serializer);

        let body = match self.manual_fee {
            Some(fee) => balancer.with_fixed_fee(body, &mut pool, fee)?,
            None => {
                balancer.initial_selection(&mut body, &mut pool)?;
                balancer.converge(body, &mut pool)?
            }
        };

        self.finish(body, serializer)
    }

    /// Serializes the body exactly as declared: no selection, no change, no fee search.
    pub fn complete_unbalanced(&mut self, serializer: &dyn TxSerializer) -> Result<String, Error> {
        let mut body = self.body.clone();
        validate_body(&mut body)?;

        resolve::remove_duplicate_inputs(&mut body);
        resolve::collect_reference_inputs(&mut body);

        let tx = serializer.serialize(&body)?;
        self.body = body;

        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PlutusData;

    const POLICY: &str = "baefdc6c5b191be372a794cd8d40d839ec0dbdd3c28957267dc81700";

    fn tx_hash() -> String {
        "aa".repeat(32)
    }

    #[test]
    fn rejects_short_tx_hash() {
        let err = TxBuilder::new(ProtocolParams::default())
            .tx_in(TxInParameter::new("abcd", 0))
            .err()
            .unwrap();

        assert!(matches!(err, Error::Structural(_)));
    }

    #[test]
    fn rejects_zero_mint() {
        let err = TxBuilder::new(ProtocolParams::default())
            .mint_native(POLICY, "61", 0, SimpleScriptSource::provided("8200581c00"))
            .err()
            .unwrap();

        assert!(matches!(err, Error::Structural(_)));
    }

    #[test]
    fn rejects_long_asset_names() {
        let name = "61".repeat(33);

        let err = TxBuilder::new(ProtocolParams::default())
            .mint_native(POLICY, &name, 1, SimpleScriptSource::provided("8200581c00"))
            .err()
            .unwrap();

        assert!(matches!(err, Error::Structural(_)));
    }

    #[test]
    fn rejects_empty_script_code() {
        let err = TxBuilder::new(ProtocolParams::default())
            .mint_plutus(
                POLICY,
                "61",
                1,
                ScriptSource::provided("", crate::model::LanguageVersion::V2),
                Redeemer::new(PlutusData::int(0)),
            )
            .err()
            .unwrap();

        assert!(matches!(err, Error::Structural(_)));
    }

    #[test]
    fn collateral_script_size_is_zero() {
        let builder = TxBuilder::new(ProtocolParams::default())
            .tx_in_collateral(TxInParameter::new(tx_hash(), 1))
            .unwrap();

        assert_eq!(builder.body().collaterals[0].script_size, Some(0));
    }

    #[test]
    fn reset_discards_intents() {
        let builder = TxBuilder::new(ProtocolParams::default())
            .tx_in(TxInParameter::new(tx_hash(), 0))
            .unwrap()
            .invalid_hereafter(100)
            .set_fee(200_000)
            .reset();

        assert_eq!(builder.body(), &TxBuilderBody::default());
    }

    #[test]
    fn metadata_accepts_arbitrary_json() {
        let builder = TxBuilder::new(ProtocolParams::default())
            .metadata_value(674, &serde_json::json!({ "msg": ["hello", 1] }))
            .unwrap();

        assert_eq!(
            builder.body().metadata[&674],
            Metadatum::Map(vec![(
                Metadatum::Text("msg".into()),
                Metadatum::List(vec![Metadatum::Text("hello".into()), Metadatum::Int(1)])
            )])
        );
    }

    #[test]
    fn signing_keys_may_carry_cbor_prefix() {
        let key = "11".repeat(32);

        assert!(TxBuilder::new(ProtocolParams::default())
            .signing_key(&format!("5820{key}"))
            .is_ok());

        assert!(TxBuilder::new(ProtocolParams::default())
            .signing_key("1234")
            .is_err());
    }
}
