//! Completeness checks and resolution of partially declared entries.

use std::collections::{BTreeSet, HashMap};

use pallas_codec::minicbor::{data::Type, Decoder};
use pallas_crypto::hash::Hasher;
use tracing::debug;

use crate::{
    model::{
        Certificate, InlineScript, InlineSimpleScript, LanguageVersion, MintItem, RefTxIn,
        ScriptSource, SimpleScriptSource, TxBuilderBody, TxIn, TxInParameter, Utxo, Vote,
        Withdrawal, NATIVE_SCRIPT_TAG,
    },
    provider::Resolver,
    Error,
};

pub fn is_input_complete(input: &TxIn) -> bool {
    match input {
        TxIn::PubKey { tx_in } => tx_in.is_complete(),
        TxIn::Script {
            tx_in,
            script_tx_in,
        } => tx_in.is_complete() && script_tx_in.script_source.is_complete(),
        TxIn::SimpleScript {
            tx_in,
            simple_script_tx_in,
        } => tx_in.is_complete() && simple_script_tx_in.simple_script_source.is_complete(),
    }
}

pub fn is_collateral_complete(collateral: &TxInParameter) -> bool {
    collateral.amount.is_some() && collateral.address.is_some()
}

/// Everything can be serialized without asking the chain.
pub fn is_body_complete(body: &TxBuilderBody) -> bool {
    body.inputs.iter().all(is_input_complete)
        && body.collaterals.iter().all(is_collateral_complete)
        && body.mints.iter().all(MintItem::is_complete)
        && body.certificates.iter().all(Certificate::is_complete)
        && body.withdrawals.iter().all(Withdrawal::is_complete)
        && body.votes.iter().all(Vote::is_complete)
}

/// Language and hash of a reference script as stored in an output (`[lang, script]`, optionally
/// wrapped in tag 24).
pub fn script_ref_info(script_ref: &str) -> Option<(Option<LanguageVersion>, String)> {
    let bytes = hex::decode(script_ref).ok()?;

    let mut d = Decoder::new(&bytes);

    let inner = if d.datatype().ok()? == Type::Tag {
        d.tag().ok()?;
        d.bytes().ok()?.to_vec()
    } else {
        bytes.clone()
    };

    let mut d = Decoder::new(&inner);
    d.array().ok()?;

    let (version, tag) = match d.u8().ok()? {
        0 => (None, NATIVE_SCRIPT_TAG),
        1 => (Some(LanguageVersion::V1), 1),
        2 => (Some(LanguageVersion::V2), 2),
        3 => (Some(LanguageVersion::V3), 3),
        _ => return None,
    };

    let script = match version {
        None => {
            let start = d.position();
            d.skip().ok()?;
            inner.get(start..d.position())?.to_vec()
        }
        Some(_) => d.bytes().ok()?.to_vec(),
    };

    Some((version, Hasher::<224>::hash_tagged(&script, tag).to_string()))
}

/// Outputs already looked up during one resolution pass.
struct UtxoCache<'a> {
    resolver: &'a dyn Resolver,
    known: HashMap<(String, u32), Utxo>,
}

impl<'a> UtxoCache<'a> {
    fn new(resolver: &'a dyn Resolver, body: &TxBuilderBody) -> Self {
        let known = body
            .extra_inputs
            .iter()
            .chain(body.inputs_for_evaluation.iter())
            .map(|x| ((x.input.tx_hash.clone(), x.input.output_index), x.clone()))
            .collect();

        Self { resolver, known }
    }

    async fn get(&mut self, tx_hash: &str, index: u32) -> Result<Utxo, Error> {
        let key = (tx_hash.to_owned(), index);

        if let Some(utxo) = self.known.get(&key) {
            return Ok(utxo.clone());
        }

        debug!(tx_hash, index, "resolving utxo");

        let utxo = self
            .resolver
            .resolve_utxo(tx_hash, index)
            .await
            .map_err(|e| Error::IncompleteInfo {
                what: format!("utxo {tx_hash}#{index}"),
                source: Some(e),
            })?;

        self.known.insert(key, utxo.clone());

        Ok(utxo)
    }

    async fn fill_param(&mut self, param: &mut TxInParameter) -> Result<(), Error> {
        if !param.is_complete() {
            let utxo = self.get(&param.tx_hash, param.tx_index).await?;
            param.fill_from(&utxo);
        }

        Ok(())
    }

    async fn fill_script(&mut self, source: &mut ScriptSource) -> Result<(), Error> {
        if let ScriptSource::Inline(inline) = source {
            if !source_is_complete(inline) {
                let utxo = self.get(&inline.ref_tx_in.tx_hash, inline.ref_tx_in.tx_index).await?;
                fill_inline_script(inline, &utxo)?;
            }
        }

        Ok(())
    }

    async fn fill_simple_script(&mut self, source: &mut SimpleScriptSource) -> Result<(), Error> {
        if let SimpleScriptSource::Inline(inline) = source {
            if inline.simple_script_hash.is_none() || inline.script_size.is_none() {
                let utxo = self.get(&inline.ref_tx_in.tx_hash, inline.ref_tx_in.tx_index).await?;
                fill_inline_simple_script(inline, &utxo)?;
            }
        }

        Ok(())
    }
}

fn source_is_complete(inline: &InlineScript) -> bool {
    inline.script_hash.is_some()
        && inline.script_size.is_some()
        && inline.language_version.is_some()
}

fn missing_script(reference: &RefTxIn) -> Error {
    Error::incomplete(format!(
        "reference script at {}#{}",
        reference.tx_hash, reference.tx_index
    ))
}

fn fill_inline_script(inline: &mut InlineScript, utxo: &Utxo) -> Result<(), Error> {
    let script_ref = utxo
        .output
        .script_ref
        .as_deref()
        .ok_or_else(|| missing_script(&inline.ref_tx_in))?;

    let (version, hash) = script_ref_info(script_ref).unzip();

    inline.script_size.get_or_insert(utxo.output.script_size());

    if inline.script_hash.is_none() {
        inline.script_hash = utxo.output.script_hash.clone().or(hash);
    }

    if inline.language_version.is_none() {
        inline.language_version = version.flatten();
    }

    if !source_is_complete(inline) {
        return Err(missing_script(&inline.ref_tx_in));
    }

    Ok(())
}

fn fill_inline_simple_script(inline: &mut InlineSimpleScript, utxo: &Utxo) -> Result<(), Error> {
    let script_ref = utxo
        .output
        .script_ref
        .as_deref()
        .ok_or_else(|| missing_script(&inline.ref_tx_in))?;

    inline.script_size.get_or_insert(utxo.output.script_size());

    if inline.simple_script_hash.is_none() {
        inline.simple_script_hash = utxo
            .output
            .script_hash
            .clone()
            .or_else(|| script_ref_info(script_ref).map(|(_, hash)| hash));
    }

    if inline.simple_script_hash.is_none() {
        return Err(missing_script(&inline.ref_tx_in));
    }

    Ok(())
}

/// Looks up every incomplete entry through the resolver, once per distinct output.
pub async fn resolve_incomplete(
    body: &mut TxBuilderBody,
    resolver: &dyn Resolver,
) -> Result<(), Error> {
    let mut cache = UtxoCache::new(resolver, body);

    for input in body.inputs.iter_mut() {
        if is_input_complete(input) {
            continue;
        }

        match input {
            TxIn::PubKey { tx_in } => cache.fill_param(tx_in).await?,
            TxIn::Script {
                tx_in,
                script_tx_in,
            } => {
                cache.fill_param(tx_in).await?;
                cache.fill_script(&mut script_tx_in.script_source).await?;
            }
            TxIn::SimpleScript {
                tx_in,
                simple_script_tx_in,
            } => {
                cache.fill_param(tx_in).await?;
                cache
                    .fill_simple_script(&mut simple_script_tx_in.simple_script_source)
                    .await?;
            }
        }
    }

    for collateral in body.collaterals.iter_mut() {
        if !is_collateral_complete(collateral) {
            let utxo = cache.get(&collateral.tx_hash, collateral.tx_index).await?;
            collateral.fill_from(&utxo);
        }

        collateral.script_size = Some(0);
    }

    for reference in body.reference_inputs.iter_mut() {
        if reference.script_size.is_none() {
            cache.fill_param(reference).await?;
        }
    }

    for mint in body.mints.iter_mut() {
        match mint {
            MintItem::Plutus { script_source, .. } => cache.fill_script(script_source).await?,
            MintItem::Native { script_source, .. } => {
                cache.fill_simple_script(script_source).await?
            }
        }
    }

    for cert in body.certificates.iter_mut() {
        match cert {
            Certificate::Basic(_) => (),
            Certificate::Script { script_source, .. } => cache.fill_script(script_source).await?,
            Certificate::SimpleScript {
                simple_script_source,
                ..
            } => cache.fill_simple_script(simple_script_source).await?,
        }
    }

    for withdrawal in body.withdrawals.iter_mut() {
        match withdrawal {
            Withdrawal::PubKey { .. } => (),
            Withdrawal::Script { script_source, .. } => cache.fill_script(script_source).await?,
            Withdrawal::SimpleScript {
                simple_script_source,
                ..
            } => cache.fill_simple_script(simple_script_source).await?,
        }
    }

    for vote in body.votes.iter_mut() {
        match vote {
            Vote::Basic(_) => (),
            Vote::Script { script_source, .. } => cache.fill_script(script_source).await?,
            Vote::SimpleScript {
                simple_script_source,
                ..
            } => cache.fill_simple_script(simple_script_source).await?,
        }
    }

    Ok(())
}

/// Fails with the first entry that still needs chain data.
pub fn ensure_complete(body: &TxBuilderBody) -> Result<(), Error> {
    if let Some(input) = body.inputs.iter().find(|x| !is_input_complete(x)) {
        let (hash, index) = input.param().outpoint();
        return Err(Error::incomplete(format!("input {hash}#{index}")));
    }

    if let Some(x) = body.collaterals.iter().find(|x| !is_collateral_complete(x)) {
        return Err(Error::incomplete(format!(
            "collateral {}#{}",
            x.tx_hash, x.tx_index
        )));
    }

    if !is_body_complete(body) {
        return Err(Error::incomplete("script reference"));
    }

    Ok(())
}

/// Drops repeated inputs and reference inputs, keeping the first declaration.
pub fn remove_duplicate_inputs(body: &mut TxBuilderBody) {
    let mut seen = BTreeSet::new();
    body.inputs.retain(|x| {
        let (hash, index) = x.param().outpoint();
        seen.insert((hash.to_owned(), index))
    });

    let mut seen = BTreeSet::new();
    body.reference_inputs.retain(|x| seen.insert((x.tx_hash.clone(), x.tx_index)));
}

/// Adds the outputs holding inline scripts as reference inputs, unless they are spent.
pub fn collect_reference_inputs(body: &mut TxBuilderBody) {
    let mut refs: Vec<(RefTxIn, Option<u64>)> = vec![];

    let script = |source: &ScriptSource| match source {
        ScriptSource::Inline(x) => Some((x.ref_tx_in.clone(), x.script_size)),
        ScriptSource::Provided(_) => None,
    };

    let simple = |source: &SimpleScriptSource| match source {
        SimpleScriptSource::Inline(x) => Some((x.ref_tx_in.clone(), x.script_size)),
        SimpleScriptSource::Provided(_) => None,
    };

    for input in &body.inputs {
        refs.extend(match input {
            TxIn::PubKey { .. } => None,
            TxIn::Script { script_tx_in, .. } => script(&script_tx_in.script_source),
            TxIn::SimpleScript {
                simple_script_tx_in,
                ..
            } => simple(&simple_script_tx_in.simple_script_source),
        });
    }

    for mint in &body.mints {
        refs.extend(match mint {
            MintItem::Plutus { script_source, .. } => script(script_source),
            MintItem::Native { script_source, .. } => simple(script_source),
        });
    }

    for cert in &body.certificates {
        refs.extend(match cert {
            Certificate::Basic(_) => None,
            Certificate::Script { script_source, .. } => script(script_source),
            Certificate::SimpleScript {
                simple_script_source,
                ..
            } => simple(simple_script_source),
        });
    }

    for withdrawal in &body.withdrawals {
        refs.extend(match withdrawal {
            Withdrawal::PubKey { .. } => None,
            Withdrawal::Script { script_source, .. } => script(script_source),
            Withdrawal::SimpleScript {
                simple_script_source,
                ..
            } => simple(simple_script_source),
        });
    }

    for vote in &body.votes {
        refs.extend(match vote {
            Vote::Basic(_) => None,
            Vote::Script { script_source, .. } => script(script_source),
            Vote::SimpleScript {
                simple_script_source,
                ..
            } => simple(simple_script_source),
        });
    }

    for (reference, size) in refs {
        let spent = body
            .inputs
            .iter()
            .any(|x| x.param().outpoint() == (reference.tx_hash.as_str(), reference.tx_index));

        let listed = body
            .reference_inputs
            .iter()
            .any(|x| x.outpoint() == (reference.tx_hash.as_str(), reference.tx_index));

        if spent || listed {
            continue;
        }

        let mut param = TxInParameter::new(reference.tx_hash, reference.tx_index);
        param.script_size = size;
        body.reference_inputs.push(param);
    }
}

/// Total size of the reference scripts the transaction touches, spent or referenced.
pub fn ref_script_size(body: &TxBuilderBody) -> u64 {
    let mut seen = BTreeSet::new();

    body.inputs
        .iter()
        .map(TxIn::param)
        .chain(body.reference_inputs.iter())
        .filter(|x| seen.insert((x.tx_hash.clone(), x.tx_index)))
        .map(|x| x.script_size.unwrap_or_default())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{DatumSource, Redeemer, ScriptTxIn},
        data::PlutusData,
        value::Value,
    };

    fn script_input(source: ScriptSource) -> TxIn {
        TxIn::Script {
            tx_in: TxInParameter::new("aa".repeat(32), 0)
                .amount(Value::lovelace(5_000_000))
                .address("addr")
                .script_size(0),
            script_tx_in: ScriptTxIn {
                script_source: source,
                datum_source: DatumSource::Inline {
                    tx_hash: "aa".repeat(32),
                    tx_index: 0,
                },
                redeemer: Redeemer::new(PlutusData::constr(0, [])),
            },
        }
    }

    #[test]
    fn pubkey_input_needs_script_size() {
        let partial = TxIn::PubKey {
            tx_in: TxInParameter::new("aa".repeat(32), 0)
                .amount(Value::lovelace(1))
                .address("addr"),
        };

        assert!(!is_input_complete(&partial));

        let full = TxIn::PubKey {
            tx_in: partial.param().clone().script_size(0),
        };

        assert!(is_input_complete(&full));
    }

    #[test]
    fn script_input_with_partial_inline_source_is_incomplete() {
        let mut inline = InlineScript {
            ref_tx_in: RefTxIn::new("bb".repeat(32), 1),
            script_hash: Some("cc".repeat(28)),
            script_size: None,
            language_version: Some(LanguageVersion::V2),
        };

        assert!(!is_input_complete(&script_input(ScriptSource::Inline(inline.clone()))));

        inline.script_size = Some(2000);
        assert!(is_input_complete(&script_input(ScriptSource::Inline(inline))));
    }

    #[test]
    fn reads_reference_script_info() {
        let script = "4d01000033222220051200120011";
        let script_ref = format!("82024e{script}");

        let (version, hash) = script_ref_info(&script_ref).unwrap();

        assert_eq!(version, Some(LanguageVersion::V2));
        assert_eq!(hash, crate::model::plutus_script_hash(script, 2).unwrap());

        let wrapped = format!("d81851{script_ref}");
        assert_eq!(script_ref_info(&wrapped).unwrap().1, hash);
    }

    #[test]
    fn inline_scripts_become_reference_inputs_once() {
        let mut inline = InlineScript {
            ref_tx_in: RefTxIn::new("bb".repeat(32), 1),
            script_hash: Some("cc".repeat(28)),
            script_size: Some(300),
            language_version: Some(LanguageVersion::V2),
        };

        let mut body = TxBuilderBody {
            inputs: vec![
                script_input(ScriptSource::Inline(inline.clone())),
                script_input(ScriptSource::Inline(inline.clone())),
            ],
            ..Default::default()
        };

        // the second input spends the output holding the script
        inline.ref_tx_in = RefTxIn::new("aa".repeat(32), 0);
        body.inputs.push(script_input(ScriptSource::Inline(inline)));

        collect_reference_inputs(&mut body);

        assert_eq!(body.reference_inputs.len(), 1);
        assert_eq!(body.reference_inputs[0].script_size, Some(300));
    }

    #[test]
    fn duplicate_inputs_are_dropped() {
        let mut body = TxBuilderBody {
            inputs: vec![
                script_input(ScriptSource::provided("00", LanguageVersion::V2)),
                script_input(ScriptSource::provided("00", LanguageVersion::V2)),
            ],
            ..Default::default()
        };

        remove_duplicate_inputs(&mut body);
        assert_eq!(body.inputs.len(), 1);
    }
}
