//! Fee formulas of the Conway ledger.

use num_rational::Ratio;

use crate::{
    model::{ExUnits, Output},
    params::{Price, ProtocolParams},
    provider::TxSerializer,
    Error,
};

/// Reference scripts are priced in tiers of this many bytes.
pub const REF_SCRIPT_TIER_SIZE: u64 = 25_600;

/// Hard ledger limit for the reference scripts touched by one transaction.
pub const MAX_REF_SCRIPT_SIZE: u64 = 204_800;

/// Bytes of ledger bookkeeping charged on top of every output's own size.
pub const UTXO_ENTRY_OVERHEAD: u64 = 160;

pub fn linear_fee(params: &ProtocolParams, tx_size: usize) -> u64 {
    params
        .min_fee_a
        .saturating_mul(tx_size as u64)
        .saturating_add(params.min_fee_b)
}

fn widen(price: &Price) -> Ratio<u128> {
    Ratio::new(*price.numer() as u128, *price.denom() as u128)
}

/// Execution cost of a set of redeemer budgets, rounded up.
pub fn script_fee<'a>(
    params: &ProtocolParams,
    budgets: impl IntoIterator<Item = &'a ExUnits>,
) -> u64 {
    let (mem, steps) = budgets
        .into_iter()
        .fold((0u128, 0u128), |(m, s), x| (m + x.mem as u128, s + x.steps as u128));

    let total = widen(&params.price_mem) * mem + widen(&params.price_step) * steps;

    u64::try_from(total.ceil().to_integer()).unwrap_or(u64::MAX)
}

/// Tiered reference script fee: every full tier costs 1.2 times the previous one per byte.
pub fn ref_script_fee(params: &ProtocolParams, total_size: u64) -> Result<u64, Error> {
    if total_size > MAX_REF_SCRIPT_SIZE {
        return Err(Error::structural(format!(
            "reference scripts total {total_size} bytes, above the {MAX_REF_SCRIPT_SIZE} byte limit"
        )));
    }

    let multiplier = Ratio::new(6u128, 5);
    let mut price = Ratio::from_integer(params.min_fee_ref_script_cost_per_byte as u128);
    let mut acc = Ratio::from_integer(0u128);
    let mut remaining = total_size;

    while remaining > 0 {
        let chunk = remaining.min(REF_SCRIPT_TIER_SIZE);
        acc += price * chunk as u128;
        price *= multiplier;
        remaining -= chunk;
    }

    Ok(u64::try_from(acc.floor().to_integer()).unwrap_or(u64::MAX))
}

/// Minimum fee of a transaction of `tx_size` bytes.
pub fn min_fee<'a>(
    params: &ProtocolParams,
    tx_size: usize,
    budgets: impl IntoIterator<Item = &'a ExUnits>,
    ref_script_size: u64,
) -> Result<u64, Error> {
    let fee = linear_fee(params, tx_size)
        .saturating_add(script_fee(params, budgets))
        .saturating_add(ref_script_fee(params, ref_script_size)?);

    Ok(fee)
}

pub fn min_utxo(params: &ProtocolParams, output_size: usize) -> u64 {
    (UTXO_ENTRY_OVERHEAD + output_size as u64).saturating_mul(params.coins_per_utxo_size)
}

/// Smallest base currency amount the output may carry.
///
/// The amount itself is part of the output bytes, so the estimate is refined a few times.
pub fn min_lovelace(
    params: &ProtocolParams,
    serializer: &dyn TxSerializer,
    output: &Output,
) -> Result<u64, Error> {
    let mut candidate = output.clone();
    let mut estimate = u64::try_from(output.amount.coin()).unwrap_or(u64::MAX);

    for _ in 0..3 {
        candidate.amount.set_coin(estimate as u128);
        estimate = min_utxo(params, serializer.output_size(&candidate)?);
    }

    Ok(estimate)
}
