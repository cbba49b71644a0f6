mod common;

use common::*;
use pallas_txengine::{
    balance::check_balance,
    model::{Output, SelectionConfig, SelectionStrategy, Utxo},
    value::unit,
    CborSerializer, Error, TxBuilder, Value,
};
use test_case::test_case;

fn token(name: &str) -> String {
    unit(POLICY, &hex::encode(name))
}

fn wallet() -> Vec<Utxo> {
    vec![
        utxo(1, 0, 1, Value::lovelace(5_000_000)),
        utxo(1, 1, 1, Value::lovelace(3_000_000).with(&token("alpha"), 40)),
        utxo(1, 2, 1, Value::lovelace(25_000_000)),
        utxo(
            1,
            3,
            1,
            Value::lovelace(2_000_000)
                .with(&token("alpha"), 10)
                .with(&token("beta"), 7),
        ),
        utxo(1, 4, 1, Value::lovelace(10_000_000)),
    ]
}

fn config(strategy: SelectionStrategy) -> SelectionConfig {
    SelectionConfig {
        strategy,
        ..Default::default()
    }
}

#[test_case(SelectionStrategy::LargestFirst)]
#[test_case(SelectionStrategy::KeepRelevant)]
#[test_case(SelectionStrategy::Experimental)]
fn token_payment_balances_with_every_strategy(strategy: SelectionStrategy) {
    let mut builder = TxBuilder::new(params())
        .tx_out(Output::new(
            address(2),
            Value::lovelace(4_000_000).with(&token("alpha"), 45),
        ))
        .unwrap()
        .change_address(&address(1))
        .unwrap()
        .select_utxos_from(wallet(), config(strategy));

    builder.complete_sync(&CborSerializer::default()).unwrap();

    let body = builder.body();
    check_balance(body, &params()).unwrap();

    let spent_alpha: u128 = body
        .inputs
        .iter()
        .filter_map(|x| x.param().amount.as_ref())
        .map(|x| x.get(&token("alpha")))
        .sum();

    assert!(spent_alpha >= 45);

    let change = body.change_output.as_ref().unwrap();
    assert_eq!(change.amount.get(&token("alpha")), spent_alpha - 45);
}

#[test]
fn keep_relevant_leaves_unrelated_tokens_alone() {
    let mut builder = TxBuilder::new(params())
        .tx_out(Output::new(
            address(2),
            Value::lovelace(2_000_000).with(&token("alpha"), 5),
        ))
        .unwrap()
        .change_address(&address(1))
        .unwrap()
        .select_utxos_from(wallet(), config(SelectionStrategy::KeepRelevant));

    builder.complete_sync(&CborSerializer::default()).unwrap();

    let change = builder.body().change_output.clone().unwrap();
    assert_eq!(change.amount.get(&token("beta")), 0);
}

#[test]
fn experimental_spares_collateral_sized_coins() {
    let mut builder = TxBuilder::new(params())
        .tx_out(Output::new(address(2), Value::lovelace(1_000_000)))
        .unwrap()
        .change_address(&address(1))
        .unwrap()
        .select_utxos_from(wallet(), config(SelectionStrategy::Experimental));

    builder.complete_sync(&CborSerializer::default()).unwrap();

    let spent: Vec<_> = builder
        .body()
        .inputs
        .iter()
        .map(|x| x.param().tx_index)
        .collect();

    assert!(!spent.contains(&0));
    assert!(!spent.contains(&4));
}

#[test]
fn missing_tokens_are_reported() {
    let mut builder = TxBuilder::new(params())
        .tx_out(Output::new(
            address(2),
            Value::lovelace(2_000_000).with(&token("gamma"), 1),
        ))
        .unwrap()
        .change_address(&address(1))
        .unwrap()
        .select_utxos_from(wallet(), config(SelectionStrategy::LargestFirst));

    let err = builder
        .complete_sync(&CborSerializer::default())
        .unwrap_err();

    let Error::InsufficientFunds { deficit } = err else {
        panic!("expected insufficient funds, got {err}");
    };

    assert_eq!(deficit.get(&token("gamma")), 1);
}
