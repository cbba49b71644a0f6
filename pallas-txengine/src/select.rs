//! Coin selection over a candidate pool.
//!
//! Every strategy first puts the pool in outpoint order and breaks ties on it, so the same pool
//! and deficit always yield the same selection.

use itertools::Itertools;
use num_rational::Ratio;
use tracing::{debug, warn};

use crate::{
    model::{SelectionConfig, SelectionStrategy, TxBuilderBody, Utxo},
    params::EngineConfig,
    value::{Value, LOVELACE},
    Error,
};

/// Pure-coin outputs of these sizes are usually someone's collateral.
const HELD_BACK_COINS: [u128; 2] = [5_000_000, 10_000_000];

/// Pool entries not already spent by the body.
pub fn unspent(pool: &[Utxo], body: &TxBuilderBody) -> Vec<Utxo> {
    pool.iter()
        .filter(|utxo| {
            !body
                .inputs
                .iter()
                .any(|input| input.param().outpoint() == utxo.outpoint())
        })
        .cloned()
        .collect()
}

/// The amount handed to the selector, with the fee estimate folded in when configured.
pub fn selection_target(deficit: &Value, config: &SelectionConfig, fee_estimate: u64) -> Value {
    if config.include_tx_fees && fee_estimate > 0 {
        deficit.plus(&Value::lovelace(fee_estimate as u128))
    } else {
        deficit.clone()
    }
}

/// Picks UTxOs from `pool` that together cover `deficit`.
pub fn select(
    pool: &[Utxo],
    deficit: &Value,
    config: &SelectionConfig,
    engine: &EngineConfig,
) -> Result<Vec<Utxo>, Error> {
    if deficit.is_empty() {
        return Ok(vec![]);
    }

    let pool: Vec<&Utxo> = pool
        .iter()
        .sorted_by(|a, b| a.outpoint().cmp(&b.outpoint()))
        .dedup_by(|a, b| a.outpoint() == b.outpoint())
        .collect();

    let picked = match config.strategy {
        SelectionStrategy::LargestFirst => largest_first(&pool, deficit),
        SelectionStrategy::KeepRelevant => {
            keep_relevant(&pool, deficit, engine.keep_relevant_overshoot)
        }
        SelectionStrategy::Experimental => experimental(&pool, deficit, config.threshold),
    };

    let total = picked
        .iter()
        .fold(Value::new(), |acc, x| acc.plus(&x.output.amount));

    if !total.covers(deficit) {
        return Err(Error::InsufficientFunds {
            deficit: total.shortfall(deficit),
        });
    }

    debug!(
        strategy = ?config.strategy,
        picked = picked.len(),
        %deficit,
        "coin selection"
    );

    Ok(picked.into_iter().cloned().collect())
}

/// Native asset units first, base currency last.
fn deficit_units(deficit: &Value) -> Vec<&str> {
    deficit
        .units()
        .filter(|u| *u != LOVELACE)
        .chain(deficit.units().filter(|u| *u == LOVELACE))
        .collect()
}

struct Picker<'a> {
    picked: Vec<&'a Utxo>,
    total: Value,
}

impl<'a> Picker<'a> {
    fn new() -> Self {
        Self {
            picked: vec![],
            total: Value::new(),
        }
    }

    fn is_picked(&self, utxo: &Utxo) -> bool {
        self.picked.iter().any(|x| x.outpoint() == utxo.outpoint())
    }

    /// Takes candidates in the given order until `unit` reaches `goal`.
    fn fill(&mut self, unit: &str, goal: u128, candidates: impl IntoIterator<Item = &'a Utxo>) {
        for utxo in candidates {
            if self.total.get(unit) >= goal {
                break;
            }

            if self.is_picked(utxo) {
                continue;
            }

            self.total.merge(&utxo.output.amount);
            self.picked.push(utxo);
        }
    }
}

fn largest_first<'a>(pool: &[&'a Utxo], deficit: &Value) -> Vec<&'a Utxo> {
    let mut picker = Picker::new();

    for unit in deficit_units(deficit) {
        let candidates = pool
            .iter()
            .filter(|x| x.output.amount.get(unit) > 0)
            .sorted_by(|a, b| {
                b.output
                    .amount
                    .get(unit)
                    .cmp(&a.output.amount.get(unit))
                    .then_with(|| a.outpoint().cmp(&b.outpoint()))
            })
            .copied()
            .collect_vec();

        picker.fill(unit, deficit.get(unit), candidates);
    }

    picker.picked
}

fn overshoot_goal(need: u128, overshoot: Ratio<u64>) -> u128 {
    let numer = *overshoot.numer() as u128;
    let denom = (*overshoot.denom() as u128).max(1);

    need.saturating_mul(numer)
        .div_ceil(denom)
        .max(need)
}

fn keep_relevant<'a>(
    pool: &[&'a Utxo],
    deficit: &Value,
    overshoot: Ratio<u64>,
) -> Vec<&'a Utxo> {
    let mut picker = Picker::new();

    for unit in deficit_units(deficit) {
        let goal = if unit == LOVELACE {
            overshoot_goal(deficit.get(unit), overshoot)
        } else {
            deficit.get(unit)
        };

        let candidates = pool
            .iter()
            .filter(|x| x.output.amount.get(unit) > 0)
            .sorted_by(|a, b| {
                a.output
                    .amount
                    .asset_count()
                    .cmp(&b.output.amount.asset_count())
                    .then_with(|| b.output.amount.get(unit).cmp(&a.output.amount.get(unit)))
                    .then_with(|| a.outpoint().cmp(&b.outpoint()))
            })
            .copied()
            .collect_vec();

        picker.fill(unit, goal, candidates);
    }

    picker.picked
}

fn is_held_back(utxo: &Utxo) -> bool {
    let amount = &utxo.output.amount;
    amount.has_only_coin() && HELD_BACK_COINS.contains(&amount.coin())
}

/// Pure-coin first, then single-asset, two-asset and the rest.
fn bucket(utxo: &Utxo) -> usize {
    utxo.output.amount.asset_count().min(3)
}

fn experimental<'a>(pool: &[&'a Utxo], deficit: &Value, threshold: u64) -> Vec<&'a Utxo> {
    let mut picker = Picker::new();

    for unit in deficit_units(deficit).into_iter().filter(|u| *u != LOVELACE) {
        let candidates = pool
            .iter()
            .filter(|x| x.output.amount.get(unit) > 0)
            .sorted_by(|a, b| {
                bucket(a)
                    .cmp(&bucket(b))
                    .then_with(|| b.output.amount.get(unit).cmp(&a.output.amount.get(unit)))
                    .then_with(|| a.outpoint().cmp(&b.outpoint()))
            })
            .copied()
            .collect_vec();

        picker.fill(unit, deficit.get(unit), candidates);
    }

    let goal = deficit.coin().saturating_add(threshold as u128);

    let (held, regular): (Vec<&Utxo>, Vec<&Utxo>) =
        pool.iter().copied().partition(|x| is_held_back(x));

    let regular = regular
        .into_iter()
        .sorted_by(|a, b| {
            bucket(a)
                .cmp(&bucket(b))
                .then_with(|| b.output.amount.coin().cmp(&a.output.amount.coin()))
                .then_with(|| a.outpoint().cmp(&b.outpoint()))
        })
        .collect_vec();

    picker.fill(LOVELACE, goal, regular);

    if picker.total.coin() < goal && !held.is_empty() {
        warn!(
            missing = %(goal - picker.total.coin()),
            "falling back to collateral sized utxos"
        );

        let held = held
            .into_iter()
            .sorted_by(|a, b| {
                b.output
                    .amount
                    .coin()
                    .cmp(&a.output.amount.coin())
                    .then_with(|| a.outpoint().cmp(&b.outpoint()))
            })
            .collect_vec();

        picker.fill(LOVELACE, goal, held);
    }

    picker.picked
}
