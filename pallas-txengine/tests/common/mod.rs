#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use bech32::{ToBase32, Variant};
use pallas_txengine::{
    model::{ExUnits, RedeemerTag, Utxo},
    provider::{BoxError, EvalResult, Evaluator, Resolver},
    ProtocolParams, Value,
};

pub const POLICY: &str = "baefdc6c5b191be372a794cd8d40d839ec0dbdd3c28957267dc81700";

/// Always-succeeds V3 validator, double wrapped the way compilers emit it.
pub const ALWAYS_SUCCEEDS: &str = "4e4d01000033222220051200120011";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn bech32(hrp: &str, header: u8, hash: u8) -> String {
    let mut bytes = vec![header];
    bytes.extend([hash; 28]);
    bech32::encode(hrp, bytes.to_base32(), Variant::Bech32).unwrap()
}

/// Enterprise testnet address paying to key hash `[hash; 28]`.
pub fn address(hash: u8) -> String {
    bech32("addr_test", 0x60, hash)
}

pub fn key_hash(hash: u8) -> String {
    hex::encode([hash; 28])
}

pub fn stake_address(hash: u8) -> String {
    bech32("stake_test", 0xe0, hash)
}

pub fn tx_hash(n: u8) -> String {
    hex::encode([n; 32])
}

pub fn utxo(n: u8, index: u32, owner: u8, amount: Value) -> Utxo {
    Utxo::new(tx_hash(n), index, address(owner), amount)
}

pub fn params() -> ProtocolParams {
    ProtocolParams::default()
}

#[derive(Default, Clone)]
pub struct MockResolver {
    pub utxos: HashMap<(String, u32), Utxo>,
    pub wallet: Vec<Utxo>,
    pub change: Option<String>,
    pub collateral: Option<Utxo>,
    pub lookups: Arc<Mutex<Vec<(String, u32)>>>,
}

impl MockResolver {
    pub fn with_utxo(mut self, utxo: Utxo) -> Self {
        let key = (utxo.input.tx_hash.clone(), utxo.input.output_index);
        self.utxos.insert(key, utxo);
        self
    }

    pub fn with_wallet(mut self, utxos: Vec<Utxo>) -> Self {
        self.wallet = utxos;
        self
    }

    pub fn with_change(mut self, address: String) -> Self {
        self.change = Some(address);
        self
    }

    pub fn with_collateral(mut self, utxo: Utxo) -> Self {
        self.collateral = Some(utxo);
        self
    }

    pub fn lookups(&self) -> Vec<(String, u32)> {
        self.lookups.lock().unwrap().clone()
    }
}

#[async_trait]
impl Resolver for MockResolver {
    async fn resolve_utxo(&self, tx_hash: &str, index: u32) -> Result<Utxo, BoxError> {
        let key = (tx_hash.to_owned(), index);
        self.lookups.lock().unwrap().push(key.clone());

        self.utxos
            .get(&key)
            .cloned()
            .ok_or_else(|| format!("unknown utxo {tx_hash}#{index}").into())
    }

    async fn list_wallet_utxos(&self) -> Result<Vec<Utxo>, BoxError> {
        Ok(self.wallet.clone())
    }

    async fn change_address(&self) -> Result<String, BoxError> {
        self.change.clone().ok_or_else(|| "no change address".into())
    }

    async fn collateral(&self) -> Result<Utxo, BoxError> {
        self.collateral.clone().ok_or_else(|| "no collateral".into())
    }
}

/// Reports the same budget for every redeemer of the draft it's handed.
#[derive(Clone)]
pub struct MockEvaluator {
    pub tag: RedeemerTag,
    pub ex_units: ExUnits,
    pub calls: Arc<Mutex<usize>>,
    pub chained: Arc<Mutex<Vec<String>>>,
    pub fail: bool,
}

impl MockEvaluator {
    pub fn new(tag: RedeemerTag, mem: u64, steps: u64) -> Self {
        Self {
            tag,
            ex_units: ExUnits { mem, steps },
            calls: Default::default(),
            chained: Default::default(),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(RedeemerTag::Spend, 0, 0)
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    /// Chained transactions handed over on the last call.
    pub fn chained(&self) -> Vec<String> {
        self.chained.lock().unwrap().clone()
    }
}

#[async_trait]
impl Evaluator for MockEvaluator {
    async fn evaluate(
        &self,
        _draft_tx: &[u8],
        _additional_utxos: &[Utxo],
        chained_txs: &[String],
    ) -> Result<Vec<EvalResult>, BoxError> {
        *self.calls.lock().unwrap() += 1;
        *self.chained.lock().unwrap() = chained_txs.to_vec();

        if self.fail {
            return Err("script failed: validator returned false".into());
        }

        Ok(vec![EvalResult {
            index: 0,
            tag: self.tag,
            ex_units: self.ex_units,
        }])
    }
}
