use pallas_codec::minicbor::{data::Type, Decoder};
use pallas_crypto::hash::Hasher;
use serde::{Deserialize, Serialize};
use serde_with::{As, DisplayFromStr};

use crate::{data::BuilderData, Error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageVersion {
    V1,
    V2,
    V3,
}

impl LanguageVersion {
    /// Prefix byte used when hashing a script of this language.
    pub fn hash_tag(&self) -> u8 {
        match self {
            LanguageVersion::V1 => 1,
            LanguageVersion::V2 => 2,
            LanguageVersion::V3 => 3,
        }
    }
}

pub const NATIVE_SCRIPT_TAG: u8 = 0;

/// Pointer to an output of a previous transaction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefTxIn {
    pub tx_hash: String,
    pub tx_index: u32,
}

impl RefTxIn {
    pub fn new(tx_hash: impl Into<String>, tx_index: u32) -> Self {
        Self {
            tx_hash: tx_hash.into(),
            tx_index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvidedScript {
    pub script_cbor: String,
    pub language_version: LanguageVersion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineScript {
    pub ref_tx_in: RefTxIn,
    #[serde(default)]
    pub script_hash: Option<String>,
    #[serde(default, with = "As::<Option<DisplayFromStr>>")]
    pub script_size: Option<u64>,
    #[serde(default)]
    pub language_version: Option<LanguageVersion>,
}

/// Where a Plutus script comes from: embedded in the witness set or referenced on-chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScriptSource {
    #[serde(rename = "providedScriptSource")]
    Provided(ProvidedScript),
    #[serde(rename = "inlineScriptSource")]
    Inline(InlineScript),
}

impl ScriptSource {
    pub fn provided(script_cbor: impl Into<String>, version: LanguageVersion) -> Self {
        Self::Provided(ProvidedScript {
            script_cbor: script_cbor.into(),
            language_version: version,
        })
    }

    pub fn inline(ref_tx_in: RefTxIn) -> Self {
        Self::Inline(InlineScript {
            ref_tx_in,
            script_hash: None,
            script_size: None,
            language_version: None,
        })
    }

    /// Hash, size and version all known, or the script is embedded.
    pub fn is_complete(&self) -> bool {
        match self {
            Self::Provided(_) => true,
            Self::Inline(x) => {
                x.script_hash.is_some() && x.script_size.is_some() && x.language_version.is_some()
            }
        }
    }

    pub fn version(&self) -> Option<LanguageVersion> {
        match self {
            Self::Provided(x) => Some(x.language_version),
            Self::Inline(x) => x.language_version,
        }
    }

    pub fn script_hash(&self) -> Result<Option<String>, Error> {
        match self {
            Self::Provided(x) => {
                plutus_script_hash(&x.script_cbor, x.language_version.hash_tag()).map(Some)
            }
            Self::Inline(x) => Ok(x.script_hash.clone()),
        }
    }

    pub fn reference(&self) -> Option<&RefTxIn> {
        match self {
            Self::Provided(_) => None,
            Self::Inline(x) => Some(&x.ref_tx_in),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvidedSimpleScript {
    pub script_cbor: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineSimpleScript {
    pub ref_tx_in: RefTxIn,
    #[serde(default)]
    pub simple_script_hash: Option<String>,
    #[serde(default, with = "As::<Option<DisplayFromStr>>")]
    pub script_size: Option<u64>,
}

/// Where a native (timelock / multisig) script comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimpleScriptSource {
    #[serde(rename = "providedSimpleScriptSource")]
    Provided(ProvidedSimpleScript),
    #[serde(rename = "inlineSimpleScriptSource")]
    Inline(InlineSimpleScript),
}

impl SimpleScriptSource {
    pub fn provided(script_cbor: impl Into<String>) -> Self {
        Self::Provided(ProvidedSimpleScript {
            script_cbor: script_cbor.into(),
        })
    }

    pub fn inline(ref_tx_in: RefTxIn) -> Self {
        Self::Inline(InlineSimpleScript {
            ref_tx_in,
            simple_script_hash: None,
            script_size: None,
        })
    }

    pub fn is_complete(&self) -> bool {
        match self {
            Self::Provided(_) => true,
            Self::Inline(x) => x.simple_script_hash.is_some() && x.script_size.is_some(),
        }
    }

    pub fn script_hash(&self) -> Result<Option<String>, Error> {
        match self {
            Self::Provided(x) => {
                let bytes = decode_hex("native script", &x.script_cbor)?;
                Ok(Some(
                    Hasher::<224>::hash_tagged(&bytes, NATIVE_SCRIPT_TAG).to_string(),
                ))
            }
            Self::Inline(x) => Ok(x.simple_script_hash.clone()),
        }
    }

    pub fn reference(&self) -> Option<&RefTxIn> {
        match self {
            Self::Provided(_) => None,
            Self::Inline(x) => Some(&x.ref_tx_in),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExUnits {
    #[serde(with = "As::<DisplayFromStr>")]
    pub mem: u64,
    #[serde(with = "As::<DisplayFromStr>")]
    pub steps: u64,
}

/// Budget assumed for a redeemer until the evaluator reports the real cost.
pub const DEFAULT_REDEEMER_BUDGET: ExUnits = ExUnits {
    mem: 7_000_000,
    steps: 3_000_000_000,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Redeemer {
    pub data: BuilderData,
    pub ex_units: ExUnits,
}

impl Redeemer {
    pub fn new(data: impl Into<BuilderData>) -> Self {
        Self {
            data: data.into(),
            ex_units: DEFAULT_REDEEMER_BUDGET,
        }
    }

    pub fn with_ex_units(mut self, ex_units: ExUnits) -> Self {
        self.ex_units = ex_units;
        self
    }
}

pub(crate) fn decode_hex(what: &str, text: &str) -> Result<Vec<u8>, Error> {
    hex::decode(text).map_err(|e| Error::structural(format!("{what} {text:?}: {e}")))
}

/// Bytes that go into the witness set for a Plutus script.
///
/// Compiled validators usually come wrapped once in a CBOR bytestring; a second wrapping layer is
/// stripped so both forms hash the same way.
pub fn plutus_script_bytes(script_cbor: &str) -> Result<Vec<u8>, Error> {
    let bytes = decode_hex("plutus script", script_cbor)?;

    Ok(unwrap_bytestring(&bytes)
        .filter(|inner| unwrap_bytestring(inner).is_some())
        .unwrap_or(bytes))
}

fn unwrap_bytestring(bytes: &[u8]) -> Option<Vec<u8>> {
    let mut d = Decoder::new(bytes);

    if d.datatype().ok()? != Type::Bytes {
        return None;
    }

    let inner = d.bytes().ok()?.to_vec();

    (d.position() == bytes.len()).then_some(inner)
}

pub fn plutus_script_hash(script_cbor: &str, tag: u8) -> Result<String, Error> {
    let bytes = plutus_script_bytes(script_cbor)?;
    Ok(Hasher::<224>::hash_tagged(&bytes, tag).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_source_needs_hash_size_and_version() {
        let mut source = InlineScript {
            ref_tx_in: RefTxIn::new("aa".repeat(32), 0),
            script_hash: Some("bb".repeat(28)),
            script_size: Some(100),
            language_version: None,
        };

        assert!(!ScriptSource::Inline(source.clone()).is_complete());

        source.language_version = Some(LanguageVersion::V2);
        assert!(ScriptSource::Inline(source).is_complete());
    }

    #[test]
    fn double_wrapped_scripts_hash_like_single_wrapped() {
        let single = "4d01000033222220051200120011";
        let double = format!("4e{single}");

        assert_eq!(
            plutus_script_hash(single, 2).unwrap(),
            plutus_script_hash(&double, 2).unwrap()
        );
    }

    #[test]
    fn native_script_hash_uses_zero_tag() {
        // sig script for a key hash
        let script = format!("8200581c{}", "11".repeat(28));
        let source = SimpleScriptSource::provided(&script);

        let expected = Hasher::<224>::hash_tagged(&hex::decode(&script).unwrap(), 0).to_string();
        assert_eq!(source.script_hash().unwrap(), Some(expected));
    }
}
