//! Capabilities the engine consumes but does not implement.
//!
//! Resolution and evaluation usually sit behind a network round-trip, so they are async. The wire
//! serializer runs in-process and is called synchronously on every convergence step.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    model::{ExUnits, Output, RedeemerTag, TxBuilderBody, Utxo},
    value::Value,
    Error,
};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Chain index used to complete partially declared entries.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve_utxo(&self, tx_hash: &str, index: u32) -> Result<Utxo, BoxError>;

    async fn list_wallet_utxos(&self) -> Result<Vec<Utxo>, BoxError>;

    async fn change_address(&self) -> Result<String, BoxError>;

    async fn collateral(&self) -> Result<Utxo, BoxError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalResult {
    pub index: u32,
    pub tag: RedeemerTag,
    pub ex_units: ExUnits,
}

/// Runs every script of a draft transaction and reports its cost.
///
/// `chained_txs` are hex transactions not yet on chain whose outputs the draft may spend.
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(
        &self,
        draft_tx: &[u8],
        additional_utxos: &[Utxo],
        chained_txs: &[String],
    ) -> Result<Vec<EvalResult>, BoxError>;
}

/// The parts of an encoded transaction needed to verify a balanced build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedTx {
    pub inputs: Vec<(String, u32)>,
    pub outputs: Vec<(Vec<u8>, Value)>,
    pub fee: u64,
    pub mint: Vec<(String, i128)>,
    pub collaterals: Vec<(String, u32)>,
    pub reference_inputs: Vec<(String, u32)>,
    pub invalid_before: Option<u64>,
    pub invalid_hereafter: Option<u64>,
    pub size: usize,
}

/// Binary transaction codec.
pub trait TxSerializer: Send + Sync {
    /// Final transaction hex, witnessed by every signing key of the body.
    fn serialize(&self, body: &TxBuilderBody) -> Result<String, Error>;

    /// Transaction bytes padded with placeholder witnesses, sized like the signed result.
    fn serialize_draft(&self, body: &TxBuilderBody) -> Result<Vec<u8>, Error>;

    fn output_size(&self, output: &Output) -> Result<usize, Error>;

    fn deserialize(&self, tx_hex: &str) -> Result<DecodedTx, Error>;
}
