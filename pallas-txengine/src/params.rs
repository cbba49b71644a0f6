//! Protocol parameters and engine settings.

use std::{fs, path::Path};

use num_rational::Ratio;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{model::LanguageVersion, Error};

/// Exact price per execution unit.
pub type Price = Ratio<u64>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Preprod,
    #[default]
    Preview,
    Testnet,
}

impl Network {
    pub fn network_id(&self) -> u8 {
        match self {
            Network::Mainnet => 1,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostModels {
    #[serde(default, alias = "PlutusV1")]
    pub plutus_v1: Option<Vec<i64>>,
    #[serde(default, alias = "PlutusV2")]
    pub plutus_v2: Option<Vec<i64>>,
    #[serde(default, alias = "PlutusV3")]
    pub plutus_v3: Option<Vec<i64>>,
}

impl CostModels {
    pub fn get(&self, version: LanguageVersion) -> Option<&[i64]> {
        match version {
            LanguageVersion::V1 => self.plutus_v1.as_deref(),
            LanguageVersion::V2 => self.plutus_v2.as_deref(),
            LanguageVersion::V3 => self.plutus_v3.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProtocolParams {
    pub min_fee_a: u64,
    pub min_fee_b: u64,
    pub coins_per_utxo_size: u64,
    #[serde(deserialize_with = "deserialize_price")]
    pub price_mem: Price,
    #[serde(deserialize_with = "deserialize_price")]
    pub price_step: Price,
    pub min_fee_ref_script_cost_per_byte: u64,
    pub max_tx_size: u64,
    pub max_val_size: u64,
    pub key_deposit: u64,
    pub pool_deposit: u64,
    pub drep_deposit: u64,
    pub collateral_percent: u64,
    pub max_collateral_inputs: u64,
    pub cost_models: CostModels,
}

impl Default for ProtocolParams {
    fn default() -> Self {
        Self {
            min_fee_a: 44,
            min_fee_b: 155_381,
            coins_per_utxo_size: 4310,
            price_mem: Ratio::new(577, 10_000),
            price_step: Ratio::new(721, 10_000_000),
            min_fee_ref_script_cost_per_byte: 15,
            max_tx_size: 16384,
            max_val_size: 5000,
            key_deposit: 2_000_000,
            pool_deposit: 500_000_000,
            drep_deposit: 500_000_000,
            collateral_percent: 150,
            max_collateral_inputs: 3,
            cost_models: CostModels::default(),
        }
    }
}

impl ProtocolParams {
    pub fn from_json_str(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();

        let json = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;

        Self::from_json_str(&json)
    }
}

/// Parses `"0.0577"`, `"577/10000"` or `7` into an exact ratio.
pub fn parse_price(text: &str) -> Option<Price> {
    let text = text.trim();

    if let Some((n, d)) = text.split_once('/') {
        let n: u64 = n.trim().parse().ok()?;
        let d: u64 = d.trim().parse().ok()?;

        return (d != 0).then(|| Ratio::new(n, d));
    }

    let (int, frac) = text.split_once('.').unwrap_or((text, ""));

    if frac.len() > 18 || !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let int: u64 = if int.is_empty() { 0 } else { int.parse().ok()? };
    let scale = 10u64.checked_pow(frac.len() as u32)?;
    let frac: u64 = if frac.is_empty() { 0 } else { frac.parse().ok()? };

    let numer = int.checked_mul(scale)?.checked_add(frac)?;

    Some(Ratio::new(numer, scale))
}

fn deserialize_price<'de, D>(deserializer: D) -> Result<Price, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    let text = match Raw::deserialize(deserializer)? {
        Raw::Text(x) => x,
        Raw::Number(x) => x.to_string(),
    };

    parse_price(&text)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid execution price {text}")))
}

/// Tunables of the balancing session that are not protocol parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound of fee convergence iterations, never above [`MAX_ITERATIONS`].
    pub max_iterations: usize,
    /// Applied to every evaluated execution budget, rounded down.
    pub evaluation_multiplier: Ratio<u64>,
    /// How far past the base currency deficit `keepRelevant` selection may reach.
    pub keep_relevant_overshoot: Ratio<u64>,
}

pub const MAX_ITERATIONS: usize = 10;

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_iterations: MAX_ITERATIONS,
            evaluation_multiplier: Ratio::from_integer(1),
            keep_relevant_overshoot: Ratio::new(6, 5),
        }
    }
}

impl EngineConfig {
    pub fn iteration_bound(&self) -> usize {
        self.max_iterations.clamp(1, MAX_ITERATIONS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("0.0577", 577, 10_000)]
    #[test_case("0.0000721", 721, 10_000_000)]
    #[test_case("577/10000", 577, 10_000)]
    #[test_case("15", 15, 1)]
    fn parses_exact_prices(text: &str, numer: u64, denom: u64) {
        assert_eq!(parse_price(text), Some(Ratio::new(numer, denom)));
    }

    #[test_case("1/0")]
    #[test_case("abc")]
    #[test_case("0.-1")]
    fn rejects_bad_prices(text: &str) {
        assert_eq!(parse_price(text), None);
    }

    #[test]
    fn loads_partial_json_over_defaults() {
        let params = ProtocolParams::from_json_str(
            r#"{ "minFeeA": 45, "priceMem": 0.0577, "priceStep": "0.0000721", "costModels": { "PlutusV2": [1, 2] } }"#,
        )
        .unwrap();

        assert_eq!(params.min_fee_a, 45);
        assert_eq!(params.min_fee_b, 155_381);
        assert_eq!(params.price_mem, Ratio::new(577, 10_000));
        assert_eq!(params.price_step, Ratio::new(721, 10_000_000));
        assert_eq!(
            params.cost_models.get(LanguageVersion::V2),
            Some([1i64, 2].as_slice())
        );
    }

    #[test]
    fn rejects_unreadable_json() {
        let err = ProtocolParams::from_json_str("{ \"minFeeA\": -1 }").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn iteration_bound_is_capped() {
        let config = EngineConfig {
            max_iterations: 50,
            ..Default::default()
        };

        assert_eq!(config.iteration_bound(), MAX_ITERATIONS);
    }
}
