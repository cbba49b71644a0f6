use serde::{Deserialize, Serialize};
use serde_with::{As, DisplayFromStr};

use super::{Redeemer, ScriptSource, SimpleScriptSource, Utxo};
use crate::{data::BuilderData, value::Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxInParameter {
    pub tx_hash: String,
    pub tx_index: u32,
    #[serde(default)]
    pub amount: Option<Value>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default, with = "As::<Option<DisplayFromStr>>")]
    pub script_size: Option<u64>,
}

impl TxInParameter {
    pub fn new(tx_hash: impl Into<String>, tx_index: u32) -> Self {
        Self {
            tx_hash: tx_hash.into(),
            tx_index,
            amount: None,
            address: None,
            script_size: None,
        }
    }

    pub fn amount(mut self, amount: Value) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn script_size(mut self, size: u64) -> Self {
        self.script_size = Some(size);
        self
    }

    /// Amount, address and script size are all known.
    pub fn is_complete(&self) -> bool {
        self.amount.is_some() && self.address.is_some() && self.script_size.is_some()
    }

    pub fn outpoint(&self) -> (&str, u32) {
        (&self.tx_hash, self.tx_index)
    }

    /// Copies what the UTxO knows about this input.
    pub fn fill_from(&mut self, utxo: &Utxo) {
        self.amount = Some(utxo.output.amount.clone());
        self.address = Some(utxo.output.address.clone());
        self.script_size = Some(utxo.output.script_size());
    }
}

impl From<&Utxo> for TxInParameter {
    fn from(utxo: &Utxo) -> Self {
        let tx_hash = utxo.input.tx_hash.to_ascii_lowercase();
        let mut param = TxInParameter::new(tx_hash, utxo.input.output_index);
        param.fill_from(utxo);
        param
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatumSource {
    /// Datum supplied by the caller and embedded in the witness set.
    #[serde(rename = "providedDatumSource")]
    Provided { data: BuilderData },
    /// Datum already stored inline in the spent output.
    #[serde(rename = "inlineDatumSource", rename_all = "camelCase")]
    Inline { tx_hash: String, tx_index: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptTxIn {
    pub script_source: ScriptSource,
    pub datum_source: DatumSource,
    pub redeemer: Redeemer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleScriptTxIn {
    pub simple_script_source: SimpleScriptSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxIn {
    #[serde(rename = "pubKeyTxIn", rename_all = "camelCase")]
    PubKey { tx_in: TxInParameter },
    #[serde(rename = "scriptTxIn", rename_all = "camelCase")]
    Script {
        tx_in: TxInParameter,
        script_tx_in: ScriptTxIn,
    },
    #[serde(rename = "simpleScriptTxIn", rename_all = "camelCase")]
    SimpleScript {
        tx_in: TxInParameter,
        simple_script_tx_in: SimpleScriptTxIn,
    },
}

impl TxIn {
    pub fn param(&self) -> &TxInParameter {
        match self {
            TxIn::PubKey { tx_in } => tx_in,
            TxIn::Script { tx_in, .. } => tx_in,
            TxIn::SimpleScript { tx_in, .. } => tx_in,
        }
    }

    pub fn param_mut(&mut self) -> &mut TxInParameter {
        match self {
            TxIn::PubKey { tx_in } => tx_in,
            TxIn::Script { tx_in, .. } => tx_in,
            TxIn::SimpleScript { tx_in, .. } => tx_in,
        }
    }

    pub fn redeemer(&self) -> Option<&Redeemer> {
        match self {
            TxIn::Script { script_tx_in, .. } => Some(&script_tx_in.redeemer),
            _ => None,
        }
    }

    pub fn redeemer_mut(&mut self) -> Option<&mut Redeemer> {
        match self {
            TxIn::Script { script_tx_in, .. } => Some(&mut script_tx_in.redeemer),
            _ => None,
        }
    }
}
