mod common;

use bech32::{ToBase32, Variant};
use common::*;
use pallas_crypto::{hash::Hasher, key::ed25519::SecretKey};
use pallas_txengine::{
    balance::check_balance,
    data::PlutusData,
    model::{
        plutus_script_hash, ExUnits, LanguageVersion, Output, Redeemer, RedeemerTag,
        ScriptSource, SelectionConfig, SelectionStrategy, TxInParameter,
    },
    provider::TxSerializer,
    value::unit,
    CborSerializer, EngineConfig, Error, ErrorClass, TxBuilder, Value,
};
use pretty_assertions::assert_eq;

const SECRET: [u8; 32] = [7; 32];

/// Testnet enterprise address of the key used to sign.
fn signer_address() -> String {
    let key = SecretKey::from(SECRET);
    let hash = Hasher::<224>::hash(key.public_key().as_ref());

    let mut bytes = vec![0x60];
    bytes.extend_from_slice(hash.as_ref());

    bech32::encode("addr_test", bytes.to_base32(), Variant::Bech32).unwrap()
}

fn largest_first() -> SelectionConfig {
    SelectionConfig {
        strategy: SelectionStrategy::LargestFirst,
        ..Default::default()
    }
}

fn simple_payment() -> TxBuilder {
    TxBuilder::new(params())
        .tx_in(
            TxInParameter::new(tx_hash(1), 0)
                .amount(Value::lovelace(10_000_000))
                .address(signer_address())
                .script_size(0),
        )
        .unwrap()
        .tx_out(Output::new(address(2), Value::lovelace(2_000_000)))
        .unwrap()
        .change_address(&signer_address())
        .unwrap()
        .signing_key(&hex::encode(SECRET))
        .unwrap()
        .select_utxos_from(vec![], largest_first())
}

#[test]
fn single_input_payment_settles_on_the_linear_fee() {
    init_tracing();

    let serializer = CborSerializer::default();
    let mut builder = simple_payment();

    let tx = builder.complete_sync(&serializer).unwrap();
    let decoded = serializer.deserialize(&tx).unwrap();
    let body = builder.body();

    assert_eq!(decoded.fee, 44 * decoded.size as u64 + 155_381);
    assert_eq!(body.fee, decoded.fee);
    assert!((160_000..190_000).contains(&body.fee));

    let change = body.change_output.as_ref().unwrap();
    assert_eq!(change.address, signer_address());
    assert_eq!(
        change.amount,
        Value::lovelace(10_000_000 - 2_000_000 - body.fee as u128)
    );

    assert_eq!(decoded.inputs, vec![(tx_hash(1), 0)]);
    assert_eq!(decoded.outputs.len(), 2);

    check_balance(body, &params()).unwrap();
}

#[test]
fn completing_twice_gives_the_same_transaction() {
    let serializer = CborSerializer::default();
    let mut builder = simple_payment();

    let first = builder.complete_sync(&serializer).unwrap();
    let body = builder.body().clone();

    let second = builder.complete_sync(&serializer).unwrap();

    assert_eq!(first, second);
    assert_eq!(&body, builder.body());
}

#[test]
fn manual_fee_is_kept_as_given() {
    let serializer = CborSerializer::default();
    let mut builder = simple_payment().set_fee(250_000);

    let tx = builder.complete_sync(&serializer).unwrap();

    assert_eq!(serializer.deserialize(&tx).unwrap().fee, 250_000);
    assert_eq!(
        builder.body().change_output.as_ref().unwrap().amount,
        Value::lovelace(7_750_000)
    );
}

#[test]
fn pool_utxos_fund_a_short_body() {
    let serializer = CborSerializer::default();

    let pool = vec![
        utxo(3, 0, 1, Value::lovelace(3_000_000)),
        utxo(3, 1, 1, Value::lovelace(40_000_000)),
    ];

    let mut builder = TxBuilder::new(params())
        .tx_out(Output::new(address(2), Value::lovelace(12_000_000)))
        .unwrap()
        .change_address(&address(1))
        .unwrap()
        .select_utxos_from(pool, largest_first());

    builder.complete_sync(&serializer).unwrap();
    let body = builder.body();

    assert_eq!(body.inputs.len(), 1);
    assert_eq!(body.inputs[0].param().outpoint(), (tx_hash(3).as_str(), 1));

    check_balance(body, &params()).unwrap();
}

#[test]
fn insufficient_pool_is_an_input_error() {
    let serializer = CborSerializer::default();

    let mut builder = TxBuilder::new(params())
        .tx_out(Output::new(address(2), Value::lovelace(50_000_000)))
        .unwrap()
        .change_address(&address(1))
        .unwrap()
        .select_utxos_from(vec![utxo(3, 0, 1, Value::lovelace(3_000_000))], largest_first());

    let err = builder.complete_sync(&serializer).unwrap_err();

    assert!(matches!(err, Error::InsufficientFunds { .. }));
    assert_eq!(err.class(), ErrorClass::Input);
}

#[test]
fn one_iteration_is_not_enough_to_settle() {
    let serializer = CborSerializer::default();

    let mut builder = simple_payment().engine_config(EngineConfig {
        max_iterations: 1,
        ..Default::default()
    });

    let err = builder.complete_sync(&serializer).unwrap_err();

    assert!(matches!(err, Error::NonConvergence { iterations: 1, .. }));
    assert_eq!(err.class(), ErrorClass::Infrastructure);
}

fn plutus_mint(policy_id: &str) -> TxBuilder {
    TxBuilder::new(params())
        .mint_plutus(
            policy_id,
            "61",
            1,
            ScriptSource::provided(ALWAYS_SUCCEEDS, LanguageVersion::V3),
            Redeemer::new(PlutusData::constr(0, [])),
        )
        .unwrap()
        .tx_out(Output::new(
            address(2),
            Value::lovelace(2_000_000).with(&unit(policy_id, "61"), 1),
        ))
        .unwrap()
}

fn funded_resolver() -> MockResolver {
    MockResolver::default()
        .with_wallet(vec![utxo(5, 0, 1, Value::lovelace(20_000_000))])
        .with_change(address(1))
        .with_collateral(utxo(6, 0, 1, Value::lovelace(5_000_000)))
}

#[tokio::test]
async fn evaluated_budgets_reach_the_final_redeemer() {
    init_tracing();

    let policy_id = plutus_script_hash(ALWAYS_SUCCEEDS, 3).unwrap();
    let resolver = funded_resolver();
    let evaluator = MockEvaluator::new(RedeemerTag::Mint, 2001, 380_149);
    let serializer = CborSerializer::from_params(&params());

    let mut builder = plutus_mint(&policy_id);

    let tx = builder
        .complete(&resolver, Some(&evaluator), &serializer)
        .await
        .unwrap();

    let body = builder.body();

    assert_eq!(
        body.mints[0].redeemer().unwrap().ex_units,
        ExUnits {
            mem: 2001,
            steps: 380_149
        }
    );

    // [1, 0, 121([]), [2001, 380149]]
    assert!(tx.contains("840100d87980821907d11a0005ccf5"));
    assert!(evaluator.calls() >= 1);

    assert_eq!(body.collaterals.len(), 1);
    check_balance(body, &params()).unwrap();
}

#[tokio::test]
async fn evaluation_multiplier_rounds_down() {
    let policy_id = plutus_script_hash(ALWAYS_SUCCEEDS, 3).unwrap();
    let resolver = funded_resolver();
    let evaluator = MockEvaluator::new(RedeemerTag::Mint, 1001, 3);
    let serializer = CborSerializer::from_params(&params());

    let mut builder = plutus_mint(&policy_id).engine_config(EngineConfig {
        evaluation_multiplier: num_rational::Ratio::new(11, 10),
        ..Default::default()
    });

    builder
        .complete(&resolver, Some(&evaluator), &serializer)
        .await
        .unwrap();

    assert_eq!(
        builder.body().mints[0].redeemer().unwrap().ex_units,
        ExUnits { mem: 1101, steps: 3 }
    );
}

#[tokio::test]
async fn evaluator_failures_are_infrastructure_errors() {
    let policy_id = plutus_script_hash(ALWAYS_SUCCEEDS, 3).unwrap();
    let serializer = CborSerializer::from_params(&params());

    let err = plutus_mint(&policy_id)
        .complete(&funded_resolver(), Some(&MockEvaluator::failing()), &serializer)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Evaluation { .. }));
    assert_eq!(err.class(), ErrorClass::Infrastructure);
    assert!(err.to_string().contains("validator returned false"));
}

#[tokio::test]
async fn chained_transactions_reach_the_evaluator() {
    let policy_id = plutus_script_hash(ALWAYS_SUCCEEDS, 3).unwrap();
    let serializer = CborSerializer::from_params(&params());
    let parent = "84a0a0f5f6".to_owned();

    let converging = MockEvaluator::new(RedeemerTag::Mint, 2001, 380_149);

    plutus_mint(&policy_id)
        .chain_tx(&parent)
        .unwrap()
        .complete(&funded_resolver(), Some(&converging), &serializer)
        .await
        .unwrap();

    assert_eq!(converging.chained(), vec![parent.clone()]);

    let manual = MockEvaluator::new(RedeemerTag::Mint, 2001, 380_149);

    plutus_mint(&policy_id)
        .chain_tx(&parent)
        .unwrap()
        .set_fee(400_000)
        .complete(&funded_resolver(), Some(&manual), &serializer)
        .await
        .unwrap();

    assert_eq!(manual.calls(), 1);
    assert_eq!(manual.chained(), vec![parent]);
}
