//! Multi-asset values with exact integer arithmetic.
//!
//! A unit is either [`LOVELACE`] or the concatenation of a hex policy id (56 chars) and a hex
//! asset name (up to 64 chars). A missing unit always reads as zero and zero entries are never
//! stored, so two values with the same holdings compare equal.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_with::{serde_as, DisplayFromStr};

pub const LOVELACE: &str = "lovelace";

pub const POLICY_ID_HEX_LEN: usize = 56;

/// Builds the unit identifier of a native asset.
pub fn unit(policy_id: &str, asset_name: &str) -> String {
    format!("{policy_id}{asset_name}")
}

/// Policy id part of a unit, `None` for the base currency.
pub fn policy_id_of(unit: &str) -> Option<&str> {
    if unit == LOVELACE || unit.len() < POLICY_ID_HEX_LEN {
        return None;
    }

    unit.get(..POLICY_ID_HEX_LEN)
}

pub fn asset_name_of(unit: &str) -> Option<&str> {
    policy_id_of(unit).and_then(|_| unit.get(POLICY_ID_HEX_LEN..))
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub unit: String,
    #[serde_as(as = "DisplayFromStr")]
    pub quantity: u128,
}

impl Asset {
    pub fn new(unit: impl Into<String>, quantity: u128) -> Self {
        Self {
            unit: unit.into(),
            quantity,
        }
    }

    pub fn lovelace(quantity: u128) -> Self {
        Self::new(LOVELACE, quantity)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Value(BTreeMap<String, u128>);

impl Value {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lovelace(quantity: u128) -> Self {
        Self::new().with(LOVELACE, quantity)
    }

    pub fn from_assets<'a>(assets: impl IntoIterator<Item = &'a Asset>) -> Self {
        let mut value = Self::new();

        for asset in assets {
            value.insert(&asset.unit, asset.quantity);
        }

        value
    }

    pub fn with(mut self, unit: &str, quantity: u128) -> Self {
        self.insert(unit, quantity);
        self
    }

    /// Adds `quantity` of `unit` to this value.
    pub fn insert(&mut self, unit: &str, quantity: u128) {
        if quantity == 0 {
            return;
        }

        let entry = self.0.entry(unit.to_owned()).or_default();
        *entry = entry.saturating_add(quantity);
    }

    pub fn get(&self, unit: &str) -> u128 {
        self.0.get(unit).copied().unwrap_or_default()
    }

    pub fn coin(&self) -> u128 {
        self.get(LOVELACE)
    }

    pub fn set_coin(&mut self, quantity: u128) {
        if quantity == 0 {
            self.0.remove(LOVELACE);
        } else {
            self.0.insert(LOVELACE.to_owned(), quantity);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u128)> {
        self.0.iter().map(|(unit, q)| (unit.as_str(), *q))
    }

    pub fn units(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of distinct native assets, the base currency excluded.
    pub fn asset_count(&self) -> usize {
        self.0.keys().filter(|u| u.as_str() != LOVELACE).count()
    }

    pub fn has_only_coin(&self) -> bool {
        self.asset_count() == 0
    }

    pub fn merge(&mut self, other: &Value) {
        for (unit, quantity) in other.iter() {
            self.insert(unit, quantity);
        }
    }

    pub fn plus(&self, other: &Value) -> Value {
        let mut out = self.clone();
        out.merge(other);
        out
    }

    /// `self - other`, or `None` if any unit would go negative.
    pub fn checked_sub(&self, other: &Value) -> Option<Value> {
        let mut out = self.clone();

        for (unit, quantity) in other.iter() {
            let have = out.get(unit);
            let left = have.checked_sub(quantity)?;

            if left == 0 {
                out.0.remove(unit);
            } else {
                out.0.insert(unit.to_owned(), left);
            }
        }

        Some(out)
    }

    /// Per-unit amount by which `self` falls short of `required`.
    pub fn shortfall(&self, required: &Value) -> Value {
        let mut out = Value::new();

        for (unit, needed) in required.iter() {
            out.insert(unit, needed.saturating_sub(self.get(unit)));
        }

        out
    }

    pub fn covers(&self, required: &Value) -> bool {
        self.shortfall(required).is_empty()
    }

    pub fn to_assets(&self) -> Vec<Asset> {
        self.iter().map(|(u, q)| Asset::new(u, q)).collect()
    }

    /// Native assets grouped by policy id, in policy order.
    pub fn policies(&self) -> BTreeMap<&str, Vec<(&str, u128)>> {
        let mut out: BTreeMap<&str, Vec<(&str, u128)>> = BTreeMap::new();

        for (unit, quantity) in self.iter() {
            if let (Some(policy), Some(name)) = (policy_id_of(unit), asset_name_of(unit)) {
                out.entry(policy).or_default().push((name, quantity));
            }
        }

        out
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("nothing");
        }

        let parts: Vec<_> = self.iter().map(|(u, q)| format!("{q} {u}")).collect();
        f.write_str(&parts.join(", "))
    }
}

impl FromIterator<Asset> for Value {
    fn from_iter<T: IntoIterator<Item = Asset>>(iter: T) -> Self {
        let mut value = Value::new();

        for asset in iter {
            value.insert(&asset.unit, asset.quantity);
        }

        value
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_assets().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let assets = Vec::<Asset>::deserialize(deserializer)?;
        Ok(assets.into_iter().collect())
    }
}

/// Signed per-unit totals of minted (positive) and burned (negative) quantities.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MintDelta(BTreeMap<String, i128>);

impl MintDelta {
    pub fn add(&mut self, unit: &str, quantity: i128) {
        let entry = self.0.entry(unit.to_owned()).or_default();
        *entry = entry.saturating_add(quantity);

        if *entry == 0 {
            self.0.remove(unit);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Splits the delta into what enters the transaction and what leaves it.
    pub fn split(&self) -> (Value, Value) {
        let mut minted = Value::new();
        let mut burned = Value::new();

        for (unit, quantity) in &self.0 {
            if *quantity > 0 {
                minted.insert(unit, quantity.unsigned_abs());
            } else {
                burned.insert(unit, quantity.unsigned_abs());
            }
        }

        (minted, burned)
    }
}
