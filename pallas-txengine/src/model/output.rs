use serde::{Deserialize, Serialize};

use super::LanguageVersion;
use crate::{data::BuilderData, value::Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputDatum {
    /// Only the datum hash goes into the output.
    Hash(BuilderData),
    Inline(BuilderData),
    /// Hash in the output, datum itself in the witness set.
    Embedded(BuilderData),
}

impl OutputDatum {
    pub fn data(&self) -> &BuilderData {
        match self {
            OutputDatum::Hash(x) | OutputDatum::Inline(x) | OutputDatum::Embedded(x) => x,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputScript {
    #[serde(rename_all = "camelCase")]
    Plutus {
        script_cbor: String,
        language_version: LanguageVersion,
    },
    #[serde(rename_all = "camelCase")]
    Native { script_cbor: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Output {
    pub address: String,
    pub amount: Value,
    #[serde(default)]
    pub datum: Option<OutputDatum>,
    #[serde(default)]
    pub reference_script: Option<OutputScript>,
}

impl Output {
    pub fn new(address: impl Into<String>, amount: Value) -> Self {
        Self {
            address: address.into(),
            amount,
            datum: None,
            reference_script: None,
        }
    }

    pub fn datum(mut self, datum: OutputDatum) -> Self {
        self.datum = Some(datum);
        self
    }

    pub fn reference_script(mut self, script: OutputScript) -> Self {
        self.reference_script = Some(script);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtxoInput {
    pub tx_hash: String,
    pub output_index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtxoOutput {
    pub address: String,
    pub amount: Value,
    #[serde(default)]
    pub data_hash: Option<String>,
    #[serde(default)]
    pub plutus_data: Option<String>,
    /// Hex CBOR of the reference script held by the output.
    #[serde(default)]
    pub script_ref: Option<String>,
    #[serde(default)]
    pub script_hash: Option<String>,
}

/// An unspent output as reported by a chain index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub input: UtxoInput,
    pub output: UtxoOutput,
}

impl Utxo {
    pub fn new(
        tx_hash: impl Into<String>,
        index: u32,
        address: impl Into<String>,
        amount: Value,
    ) -> Self {
        Self {
            input: UtxoInput {
                tx_hash: tx_hash.into(),
                output_index: index,
            },
            output: UtxoOutput {
                address: address.into(),
                amount,
                data_hash: None,
                plutus_data: None,
                script_ref: None,
                script_hash: None,
            },
        }
    }

    pub fn outpoint(&self) -> (&str, u32) {
        (&self.input.tx_hash, self.input.output_index)
    }
}

impl UtxoOutput {
    /// Byte size of the reference script, zero when there is none.
    pub fn script_size(&self) -> u64 {
        self.script_ref
            .as_ref()
            .map(|x| x.len() as u64 / 2)
            .unwrap_or_default()
    }
}
