//! Address and governance id decoding.

use bech32::FromBase32;
use pallas_addresses::{Address, ShelleyPaymentPart, StakePayload};

use crate::{model::Credential, Error};

/// Decodes a bech32 or hex address.
pub fn parse_address(text: &str) -> Result<Address, Error> {
    let parsed = match hex::decode(text) {
        Ok(bytes) => Address::from_bytes(&bytes),
        Err(_) => Address::from_bech32(text),
    };

    parsed.map_err(|e| Error::structural(format!("address {text}: {e}")))
}

pub fn address_bytes(text: &str) -> Result<Vec<u8>, Error> {
    parse_address(text).map(|x| x.to_vec())
}

/// Payment key hash of a Shelley address, `None` for script-locked or Byron addresses.
pub fn payment_key_hash(text: &str) -> Result<Option<String>, Error> {
    match parse_address(text)? {
        Address::Shelley(x) => match x.payment() {
            ShelleyPaymentPart::Key(hash) => Ok(Some(hash.to_string())),
            ShelleyPaymentPart::Script(_) => Ok(None),
        },
        _ => Ok(None),
    }
}

/// Credential behind a reward address.
pub fn reward_credential(text: &str) -> Result<Credential, Error> {
    match parse_address(text)? {
        Address::Stake(x) => match x.payload() {
            StakePayload::Stake(hash) => Ok(Credential::KeyHash(hash.to_string())),
            StakePayload::Script(hash) => Ok(Credential::ScriptHash(hash.to_string())),
        },
        _ => Err(Error::structural(format!("{text} is not a reward address"))),
    }
}

fn decode_bech32(text: &str) -> Result<(String, Vec<u8>), Error> {
    let (hrp, data, _) =
        bech32::decode(text).map_err(|e| Error::structural(format!("bech32 {text}: {e}")))?;

    let bytes = Vec::<u8>::from_base32(&data)
        .map_err(|e| Error::structural(format!("bech32 {text}: {e}")))?;

    Ok((hrp, bytes))
}

fn is_hash28(text: &str) -> bool {
    text.len() == 56 && text.chars().all(|c| c.is_ascii_hexdigit())
}

/// Governance credential from a CIP-105 or CIP-129 identifier.
///
/// `prefix` is the key-hash flavour of the human readable part (`drep`, `cc_cold`, `cc_hot`);
/// the `_script` variant and the 29-byte CIP-129 form with a header byte are accepted too.
fn governance_credential(text: &str, prefix: &str) -> Result<Credential, Error> {
    let (hrp, bytes) = decode_bech32(text)?;
    let script_hrp = format!("{prefix}_script");

    let (is_script, hash) = match bytes.len() {
        28 if hrp == prefix || hrp == format!("{prefix}_vkh") => (false, bytes),
        28 if hrp == script_hrp => (true, bytes),
        29 if hrp == prefix => match bytes[0] & 0x0f {
            0x02 => (false, bytes[1..].to_vec()),
            0x03 => (true, bytes[1..].to_vec()),
            other => {
                return Err(Error::structural(format!(
                    "{text}: unknown credential type {other}"
                )))
            }
        },
        _ => return Err(Error::structural(format!("{text} is not a {prefix} id"))),
    };

    let hash = hex::encode(hash);

    Ok(if is_script {
        Credential::ScriptHash(hash)
    } else {
        Credential::KeyHash(hash)
    })
}

pub fn drep_credential(drep_id: &str) -> Result<Credential, Error> {
    governance_credential(drep_id, "drep")
}

/// Committee cold credential, also accepting a bare hex key hash.
pub fn committee_cold_credential(text: &str) -> Result<Credential, Error> {
    if is_hash28(text) {
        return Ok(Credential::KeyHash(text.to_lowercase()));
    }

    governance_credential(text, "cc_cold")
}

pub fn committee_hot_credential(text: &str) -> Result<Credential, Error> {
    if is_hash28(text) {
        return Ok(Credential::KeyHash(text.to_lowercase()));
    }

    governance_credential(text, "cc_hot")
}

/// Pool key hash from a `pool1...` id or hex.
pub fn pool_key_hash(text: &str) -> Result<String, Error> {
    if is_hash28(text) {
        return Ok(text.to_lowercase());
    }

    match decode_bech32(text)? {
        (hrp, bytes) if hrp == "pool" && bytes.len() == 28 => Ok(hex::encode(bytes)),
        _ => Err(Error::structural(format!("{text} is not a pool id"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bech32::{ToBase32, Variant};

    fn bech(hrp: &str, bytes: &[u8]) -> String {
        bech32::encode(hrp, bytes.to_base32(), Variant::Bech32).unwrap()
    }

    #[test]
    fn drep_ids_in_both_formats() {
        let hash = [0xabu8; 28];

        let legacy = bech("drep", &hash);
        assert_eq!(
            drep_credential(&legacy).unwrap(),
            Credential::KeyHash(hex::encode(hash))
        );

        let mut cip129 = vec![0x23];
        cip129.extend_from_slice(&hash);
        assert_eq!(
            drep_credential(&bech("drep", &cip129)).unwrap(),
            Credential::ScriptHash(hex::encode(hash))
        );

        assert!(drep_credential(&bech("pool", &hash)).is_err());
    }

    #[test]
    fn pool_ids() {
        let hash = [0x01u8; 28];

        assert_eq!(pool_key_hash(&bech("pool", &hash)).unwrap(), hex::encode(hash));
        assert_eq!(pool_key_hash(&hex::encode(hash)).unwrap(), hex::encode(hash));
    }

    #[test]
    fn reward_addresses() {
        let mut raw = vec![0xe0];
        raw.extend_from_slice(&[0x22; 28]);
        let key = bech("stake_test", &raw);

        raw[0] = 0xf0;
        let script = bech("stake_test", &raw);

        assert!(!reward_credential(&key).unwrap().is_script());
        assert!(reward_credential(&script).unwrap().is_script());
    }

    #[test]
    fn payment_key_hash_of_enterprise_address() {
        let mut raw = vec![0x60];
        raw.extend_from_slice(&[0x33; 28]);
        let addr = bech("addr_test", &raw);

        assert_eq!(
            payment_key_hash(&addr).unwrap(),
            Some(hex::encode([0x33u8; 28]))
        );

        raw[0] = 0x70;
        let script = bech("addr_test", &raw);

        assert_eq!(payment_key_hash(&script).unwrap(), None);
    }
}
