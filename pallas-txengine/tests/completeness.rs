mod common;

use common::*;
use pallas_txengine::{
    model::{
        LanguageVersion, Output, OutputScript, Redeemer, RefTxIn, ScriptSource, TxIn,
        TxInParameter, Utxo,
    },
    resolve, CborSerializer, Error, ErrorClass, TxBuilder, Value,
};
use pretty_assertions::assert_eq;

fn payment(input: TxInParameter) -> TxBuilder {
    TxBuilder::new(params())
        .tx_in(input)
        .unwrap()
        .tx_out(Output::new(address(2), Value::lovelace(2_000_000)))
        .unwrap()
}

#[tokio::test]
async fn bare_outpoints_are_resolved_once() {
    let resolver = MockResolver::default()
        .with_utxo(utxo(1, 0, 1, Value::lovelace(9_000_000)))
        .with_change(address(1));

    let mut builder = payment(TxInParameter::new(tx_hash(1), 0))
        .tx_in(TxInParameter::new(tx_hash(1), 0))
        .unwrap()
        .select_utxos_from(vec![], Default::default());

    builder
        .complete(&resolver, None, &CborSerializer::default())
        .await
        .unwrap();

    let body = builder.body();

    assert_eq!(body.inputs.len(), 1);
    assert_eq!(
        body.inputs[0].param().amount,
        Some(Value::lovelace(9_000_000))
    );
    assert_eq!(body.inputs[0].param().address, Some(address(1)));
    assert_eq!(body.change_address, Some(address(1)));
    assert_eq!(resolver.lookups(), vec![(tx_hash(1), 0)]);
}

#[tokio::test]
async fn unknown_outpoint_is_incomplete_info() {
    let resolver = MockResolver::default().with_change(address(1));

    let err = payment(TxInParameter::new(tx_hash(9), 3))
        .complete(&resolver, None, &CborSerializer::default())
        .await
        .unwrap_err();

    match &err {
        Error::IncompleteInfo { what, source } => {
            assert!(what.contains(&tx_hash(9)));
            assert!(source.is_some());
        }
        other => panic!("unexpected error {other}"),
    }

    assert_eq!(err.class(), ErrorClass::Input);
}

#[tokio::test]
async fn missing_change_address_comes_from_the_resolver() {
    let resolver = MockResolver::default();

    let err = payment(
        TxInParameter::new(tx_hash(1), 0)
            .amount(Value::lovelace(9_000_000))
            .address(address(1))
            .script_size(0),
    )
    .complete(&resolver, None, &CborSerializer::default())
    .await
    .unwrap_err();

    assert!(matches!(err, Error::IncompleteInfo { .. }));
}

#[test]
fn sync_completion_never_guesses() {
    let mut builder = payment(TxInParameter::new(tx_hash(1), 0))
        .change_address(&address(1))
        .unwrap();

    let err = builder
        .complete_sync(&CborSerializer::default())
        .unwrap_err();

    assert!(matches!(err, Error::IncompleteInfo { .. }));
    assert!(!resolve::is_body_complete(builder.body()));
}

#[tokio::test]
async fn reference_scripts_are_resolved_and_referenced() {
    let script = ALWAYS_SUCCEEDS;
    let script_hash = pallas_txengine::model::plutus_script_hash(script, 3).unwrap();

    let mut holder = utxo(4, 0, 3, Value::lovelace(20_000_000));
    holder.output.script_ref = Some(format!("82034e{}", &script[2..]));

    let locked = Utxo::new(tx_hash(2), 0, address(1), Value::lovelace(8_000_000));

    let resolver = MockResolver::default()
        .with_utxo(holder)
        .with_utxo(locked)
        .with_wallet(vec![utxo(5, 0, 1, Value::lovelace(30_000_000))])
        .with_change(address(1))
        .with_collateral(utxo(6, 0, 1, Value::lovelace(5_000_000)));

    let mut builder = TxBuilder::new(params())
        .tx_in_script(
            TxInParameter::new(tx_hash(2), 0),
            ScriptSource::inline(RefTxIn::new(tx_hash(4), 0)),
            pallas_txengine::model::DatumSource::Inline {
                tx_hash: tx_hash(2),
                tx_index: 0,
            },
            Redeemer::new(pallas_txengine::data::PlutusData::int(0)),
        )
        .unwrap()
        .tx_out(Output::new(address(2), Value::lovelace(2_000_000)))
        .unwrap();

    builder
        .complete(&resolver, None, &CborSerializer::default())
        .await
        .unwrap();

    let body = builder.body();

    let TxIn::Script { script_tx_in, .. } = &body.inputs[0] else {
        panic!("script input moved");
    };

    let ScriptSource::Inline(inline) = &script_tx_in.script_source else {
        panic!("source changed kind");
    };

    assert_eq!(inline.script_hash.as_deref(), Some(script_hash.as_str()));
    assert_eq!(inline.language_version, Some(LanguageVersion::V3));
    assert_eq!(inline.script_size, Some(17));

    assert!(body
        .reference_inputs
        .iter()
        .any(|x| x.outpoint() == (tx_hash(4).as_str(), 0)));

    assert_eq!(body.collaterals.len(), 1);
    assert!(resolve::ref_script_size(body) >= 17);
}

#[test]
fn reference_outputs_keep_their_script() {
    let out = Output::new(address(2), Value::lovelace(0)).reference_script(OutputScript::Plutus {
        script_cbor: ALWAYS_SUCCEEDS.into(),
        language_version: LanguageVersion::V3,
    });

    let mut builder = TxBuilder::new(params())
        .tx_in(
            TxInParameter::new(tx_hash(1), 0)
                .amount(Value::lovelace(50_000_000))
                .address(address(1))
                .script_size(0),
        )
        .unwrap()
        .tx_out(out)
        .unwrap()
        .change_address(&address(1))
        .unwrap();

    builder.complete_sync(&CborSerializer::default()).unwrap();

    // the zero-coin output was topped up to its minimum
    let topped = &builder.body().outputs[0];
    assert!(topped.amount.coin() > 0);
    assert!(topped.reference_script.is_some());
}
