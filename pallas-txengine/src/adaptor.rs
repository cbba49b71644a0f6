//! Canonical object form of a builder body.
//!
//! The object form is plain JSON: camelCase keys, one discriminator key per tagged union and
//! decimal strings for every quantity, so values beyond 2^53 survive any JSON consumer.

use serde::Deserialize;
use serde_json::Value as Json;

use crate::{model::TxBuilderBody, Error};

pub fn to_obj(body: &TxBuilderBody) -> Json {
    // every field serializes to plain JSON
    serde_json::to_value(body).unwrap_or(Json::Null)
}

/// Rebuilds a body from its object form; malformed objects are [`Error::Structural`].
pub fn from_obj(obj: &Json) -> Result<TxBuilderBody, Error> {
    TxBuilderBody::deserialize(obj).map_err(|e| Error::structural(format!("body object: {e}")))
}

pub fn to_json_string(body: &TxBuilderBody) -> String {
    to_obj(body).to_string()
}

pub fn from_json_str(text: &str) -> Result<TxBuilderBody, Error> {
    let obj: Json =
        serde_json::from_str(text).map_err(|e| Error::structural(format!("body json: {e}")))?;

    from_obj(&obj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data::{BuilderData, PlutusData},
        model::{
            DatumSource, LanguageVersion, MintItem, Output, OutputDatum, Redeemer, RefTxIn,
            ScriptSource, ScriptTxIn, TxIn, TxInParameter, Vote, VoteKind, VoteParams, Voter,
            VotingProcedure, Withdrawal,
        },
        value::Value,
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample() -> TxBuilderBody {
        TxBuilderBody {
            inputs: vec![TxIn::Script {
                tx_in: TxInParameter::new("aa".repeat(32), 1).amount(Value::lovelace(5)),
                script_tx_in: ScriptTxIn {
                    script_source: ScriptSource::inline(RefTxIn::new("bb".repeat(32), 0)),
                    datum_source: DatumSource::Provided {
                        data: BuilderData::Json(PlutusData::int(42)),
                    },
                    redeemer: Redeemer::new(PlutusData::constr(0, [PlutusData::bytes([1, 2])])),
                },
            }],
            outputs: vec![Output::new("addr_test", Value::lovelace(u64::MAX as u128 * 3))
                .datum(OutputDatum::Inline(BuilderData::Cbor("d87980".into())))],
            fee: 170_000,
            mints: vec![MintItem::Plutus {
                policy_id: "cc".repeat(28),
                asset_name: "61".into(),
                amount: -1,
                script_source: ScriptSource::provided("4e4d01", LanguageVersion::V3),
                redeemer: Redeemer::new(PlutusData::int(0)),
            }],
            withdrawals: vec![Withdrawal::PubKey {
                address: "stake_test".into(),
                coin: 10,
            }],
            votes: vec![Vote::Basic(VoteParams {
                voter: Voter::StakingPool("dd".repeat(28)),
                gov_action_id: RefTxIn::new("ee".repeat(32), 2),
                voting_procedure: VotingProcedure {
                    vote_kind: VoteKind::Abstain,
                    anchor: None,
                },
            })],
            ..Default::default()
        }
    }

    #[test]
    fn round_trips_through_object_form() {
        let body = sample();
        assert_eq!(from_obj(&to_obj(&body)).unwrap(), body);
        assert_eq!(from_json_str(&to_json_string(&body)).unwrap(), body);
    }

    #[test]
    fn unions_carry_one_discriminator() {
        let obj = to_obj(&sample());

        let input = &obj["inputs"][0];
        assert!(input.get("scriptTxIn").is_some());
        assert!(input["scriptTxIn"]["scriptTxIn"]["scriptSource"]
            .get("inlineScriptSource")
            .is_some());

        assert!(obj["mints"][0].get("plutusMint").is_some());
        assert!(obj["withdrawals"][0].get("pubKeyWithdrawal").is_some());
        assert!(obj["votes"][0].get("basicVote").is_some());
    }

    #[test]
    fn quantities_are_decimal_strings() {
        let obj = to_obj(&sample());

        assert_eq!(obj["fee"], json!("170000"));
        assert_eq!(obj["mints"][0]["plutusMint"]["amount"], json!("-1"));
        assert_eq!(
            obj["outputs"][0]["amount"][0]["quantity"],
            json!("55340232221128654845")
        );
        assert_eq!(obj["withdrawals"][0]["pubKeyWithdrawal"]["coin"], json!("10"));
    }

    #[test]
    fn absent_optionals_are_null() {
        let obj = to_obj(&sample());
        assert_eq!(obj["changeAddress"], Json::Null);
        assert_eq!(obj["outputs"][0]["referenceScript"], Json::Null);
    }

    #[test]
    fn malformed_objects_are_structural() {
        let err = from_obj(&json!({ "inputs": [{ "unknownTxIn": {} }] })).unwrap_err();
        assert!(matches!(err, Error::Structural(_)));

        let err = from_obj(&json!({ "fee": 12 })).unwrap_err();
        assert!(matches!(err, Error::Structural(_)));
    }
}
