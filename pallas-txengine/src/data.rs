//! Plutus data in one canonical form, with decoders from every supported encoding.

use pallas_codec::minicbor::Decoder;
use pallas_crypto::hash::Hasher;
use pallas_primitives::{
    self as primitives, BigInt, BoundedBytes, Fragment, Int, KeyValuePairs, MaybeIndefArray,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value as Json};

use crate::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PlutusData {
    Constr { tag: u64, fields: Vec<PlutusData> },
    Map(Vec<(PlutusData, PlutusData)>),
    List(Vec<PlutusData>),
    Int(i128),
    Bytes(Vec<u8>),
}

impl PlutusData {
    pub fn constr(tag: u64, fields: impl IntoIterator<Item = PlutusData>) -> Self {
        Self::Constr {
            tag,
            fields: fields.into_iter().collect(),
        }
    }

    pub fn int(value: impl Into<i128>) -> Self {
        Self::Int(value.into())
    }

    pub fn bytes(value: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(value.into())
    }

    pub fn list(items: impl IntoIterator<Item = PlutusData>) -> Self {
        Self::List(items.into_iter().collect())
    }

    pub fn map(entries: impl IntoIterator<Item = (PlutusData, PlutusData)>) -> Self {
        Self::Map(entries.into_iter().collect())
    }

    /// Appends a field to a constructor, ignored for any other shape.
    pub fn field(mut self, item: PlutusData) -> Self {
        if let Self::Constr { fields, .. } = &mut self {
            fields.push(item);
        }

        self
    }

    /// Decodes the cardano "detailed schema" JSON representation.
    pub fn from_json(json: &Json) -> Result<Self, Error> {
        let object = json
            .as_object()
            .ok_or_else(|| Error::structural(format!("plutus data must be an object: {json}")))?;

        if let Some(tag) = object.get("constructor") {
            let tag = tag
                .as_u64()
                .ok_or_else(|| Error::structural("constructor index must be an integer"))?;

            let fields = object
                .get("fields")
                .and_then(Json::as_array)
                .ok_or_else(|| Error::structural("constructor without a fields list"))?
                .iter()
                .map(Self::from_json)
                .collect::<Result<_, _>>()?;

            return Ok(Self::Constr { tag, fields });
        }

        if let Some(int) = object.get("int") {
            return json_int(int).map(Self::Int);
        }

        if let Some(bytes) = object.get("bytes") {
            let text = bytes
                .as_str()
                .ok_or_else(|| Error::structural("bytes must be a hex string"))?;

            return hex::decode(text)
                .map(Self::Bytes)
                .map_err(|e| Error::structural(format!("bytes {text}: {e}")));
        }

        if let Some(list) = object.get("list") {
            let items = list
                .as_array()
                .ok_or_else(|| Error::structural("list must be an array"))?
                .iter()
                .map(Self::from_json)
                .collect::<Result<_, _>>()?;

            return Ok(Self::List(items));
        }

        if let Some(map) = object.get("map") {
            let entries = map
                .as_array()
                .ok_or_else(|| Error::structural("map must be an array of k/v pairs"))?
                .iter()
                .map(|entry| {
                    let k = entry
                        .get("k")
                        .ok_or_else(|| Error::structural("map entry without k"))?;
                    let v = entry
                        .get("v")
                        .ok_or_else(|| Error::structural("map entry without v"))?;

                    Ok((Self::from_json(k)?, Self::from_json(v)?))
                })
                .collect::<Result<_, Error>>()?;

            return Ok(Self::Map(entries));
        }

        Err(Error::structural(format!("unknown plutus data shape: {json}")))
    }

    pub fn to_json(&self) -> Json {
        match self {
            Self::Constr { tag, fields } => json!({
                "constructor": tag,
                "fields": fields.iter().map(Self::to_json).collect::<Vec<_>>(),
            }),
            Self::Map(entries) => json!({
                "map": entries
                    .iter()
                    .map(|(k, v)| json!({ "k": k.to_json(), "v": v.to_json() }))
                    .collect::<Vec<_>>(),
            }),
            Self::List(items) => json!({
                "list": items.iter().map(Self::to_json).collect::<Vec<_>>(),
            }),
            Self::Int(x) => match (i64::try_from(*x), u64::try_from(*x)) {
                (Ok(x), _) => json!({ "int": x }),
                (_, Ok(x)) => json!({ "int": x }),
                _ => json!({ "int": x.to_string() }),
            },
            Self::Bytes(x) => json!({ "bytes": hex::encode(x) }),
        }
    }

    pub fn from_cbor(bytes: &[u8]) -> Result<Self, Error> {
        let mut d = Decoder::new(bytes);
        let data: primitives::PlutusData = d
            .decode()
            .map_err(|e| Error::structural(format!("plutus data: {e}")))?;

        if d.position() != bytes.len() {
            return Err(Error::structural("trailing bytes after plutus data"));
        }

        Self::try_from(&data)
    }

    pub fn from_cbor_hex(text: &str) -> Result<Self, Error> {
        let bytes =
            hex::decode(text).map_err(|e| Error::structural(format!("plutus data hex: {e}")))?;

        Self::from_cbor(&bytes)
    }

    pub fn to_cbor(&self) -> Vec<u8> {
        // writing into a Vec can't fail
        primitives::PlutusData::from(self)
            .encode_fragment()
            .unwrap_or_default()
    }
}

fn json_int(json: &Json) -> Result<i128, Error> {
    if let Some(x) = json.as_i64() {
        return Ok(x.into());
    }

    if let Some(x) = json.as_u64() {
        return Ok(x.into());
    }

    json.as_str()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::structural(format!("invalid integer {json}")))
}

fn constr_tag(index: u64) -> (u64, Option<u64>) {
    match index {
        0..=6 => (121 + index, None),
        7..=127 => (1280 + index - 7, None),
        _ => (102, Some(index)),
    }
}

fn constr_index(constr: &primitives::Constr<primitives::PlutusData>) -> Result<u64, Error> {
    match (constr.tag, constr.any_constructor) {
        (tag @ 121..=127, _) => Ok(tag - 121),
        (tag @ 1280..=1400, _) => Ok(tag - 1280 + 7),
        (102, Some(index)) => Ok(index),
        (tag, _) => Err(Error::structural(format!("unexpected constructor tag {tag}"))),
    }
}

/// Lists and constructor fields go out indefinite, the empty ones definite.
fn array(items: &[PlutusData]) -> MaybeIndefArray<primitives::PlutusData> {
    let items: Vec<_> = items.iter().map(primitives::PlutusData::from).collect();

    if items.is_empty() {
        MaybeIndefArray::Def(items)
    } else {
        MaybeIndefArray::Indef(items)
    }
}

fn bignum(value: u128) -> BoundedBytes {
    let raw = value.to_be_bytes();
    let first = raw.iter().position(|b| *b != 0).unwrap_or(raw.len() - 1);

    BoundedBytes::from(raw[first..].to_vec())
}

fn from_bignum(bytes: &[u8]) -> Result<u128, Error> {
    let significant: Vec<_> = bytes.iter().skip_while(|b| **b == 0).collect();

    if significant.len() > 16 {
        return Err(Error::structural("big integer out of range"));
    }

    Ok(significant
        .into_iter()
        .fold(0u128, |acc, b| (acc << 8) | *b as u128))
}

impl From<&PlutusData> for primitives::PlutusData {
    fn from(value: &PlutusData) -> Self {
        match value {
            PlutusData::Constr { tag, fields } => {
                let (tag, any_constructor) = constr_tag(*tag);

                primitives::PlutusData::Constr(primitives::Constr {
                    tag,
                    any_constructor,
                    fields: array(fields),
                })
            }
            PlutusData::Map(entries) => primitives::PlutusData::Map(KeyValuePairs::Def(
                entries.iter().map(|(k, v)| (k.into(), v.into())).collect(),
            )),
            PlutusData::List(items) => primitives::PlutusData::Array(array(items)),
            PlutusData::Int(x) => {
                let int = match Int::try_from(*x) {
                    Ok(int) => BigInt::Int(int),
                    Err(_) if *x > 0 => BigInt::BigUInt(bignum(x.unsigned_abs())),
                    Err(_) => BigInt::BigNInt(bignum(x.unsigned_abs() - 1)),
                };

                primitives::PlutusData::BigInt(int)
            }
            PlutusData::Bytes(x) => primitives::PlutusData::BoundedBytes(x.clone().into()),
        }
    }
}

impl TryFrom<&primitives::PlutusData> for PlutusData {
    type Error = Error;

    fn try_from(value: &primitives::PlutusData) -> Result<Self, Self::Error> {
        let list = |items: &[primitives::PlutusData]| {
            items.iter().map(Self::try_from).collect::<Result<Vec<_>, _>>()
        };

        match value {
            primitives::PlutusData::Constr(x) => Ok(Self::Constr {
                tag: constr_index(x)?,
                fields: list(&x.fields)?,
            }),
            primitives::PlutusData::Map(entries) => entries
                .iter()
                .map(|(k, v)| Ok((Self::try_from(k)?, Self::try_from(v)?)))
                .collect::<Result<_, Error>>()
                .map(Self::Map),
            primitives::PlutusData::Array(items) => list(items).map(Self::List),
            primitives::PlutusData::BigInt(BigInt::Int(x)) => Ok(Self::Int(i128::from(*x))),
            primitives::PlutusData::BigInt(BigInt::BigUInt(x)) => {
                let x = from_bignum(x)?;
                i128::try_from(x)
                    .map(Self::Int)
                    .map_err(|_| Error::structural("big integer out of range"))
            }
            primitives::PlutusData::BigInt(BigInt::BigNInt(x)) => {
                let x = from_bignum(x)?;
                i128::try_from(x)
                    .map(|x| Self::Int(-x - 1))
                    .map_err(|_| Error::structural("big integer out of range"))
            }
            primitives::PlutusData::BoundedBytes(x) => Ok(Self::Bytes(x.to_vec())),
        }
    }
}

impl Serialize for PlutusData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PlutusData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = Json::deserialize(deserializer)?;
        Self::from_json(&json).map_err(serde::de::Error::custom)
    }
}

/// Datum or redeemer payload, remembering the encoding it was supplied in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BuilderData {
    /// Built in code out of [`PlutusData`] values.
    Mesh(PlutusData),
    /// Decoded from the detailed-schema JSON.
    Json(PlutusData),
    /// Raw CBOR, kept byte for byte.
    Cbor(String),
}

impl BuilderData {
    pub fn from_json(json: &Json) -> Result<Self, Error> {
        PlutusData::from_json(json).map(Self::Json)
    }

    /// Takes a hex CBOR payload, refusing anything that is not valid plutus data.
    pub fn from_cbor_hex(text: &str) -> Result<Self, Error> {
        PlutusData::from_cbor_hex(text)?;
        Ok(Self::Cbor(text.to_lowercase()))
    }

    pub fn to_plutus_data(&self) -> Result<PlutusData, Error> {
        match self {
            Self::Mesh(x) | Self::Json(x) => Ok(x.clone()),
            Self::Cbor(x) => PlutusData::from_cbor_hex(x),
        }
    }

    pub fn to_cbor(&self) -> Result<Vec<u8>, Error> {
        match self {
            Self::Mesh(x) | Self::Json(x) => Ok(x.to_cbor()),
            Self::Cbor(x) => {
                hex::decode(x).map_err(|e| Error::structural(format!("plutus data hex: {e}")))
            }
        }
    }

    /// Blake2b-256 of the wire encoding.
    pub fn hash(&self) -> Result<String, Error> {
        let bytes = self.to_cbor()?;
        Ok(Hasher::<256>::hash(&bytes).to_string())
    }
}

impl From<PlutusData> for BuilderData {
    fn from(value: PlutusData) -> Self {
        Self::Mesh(value)
    }
}
