//! Reads back the parts of a transaction the balancer verifies.

use pallas_traverse::{MultiEraInput, MultiEraTx};

use crate::{
    model::decode_hex,
    provider::DecodedTx,
    value::{unit, Value},
    Error,
};

fn refs(inputs: Vec<MultiEraInput>) -> Vec<(String, u32)> {
    inputs
        .iter()
        .map(|x| (x.hash().to_string(), x.index() as u32))
        .collect()
}

pub(crate) fn decode_tx(tx_hex: &str) -> Result<DecodedTx, Error> {
    let bytes = decode_hex("transaction", tx_hex)?;
    let tx = MultiEraTx::decode(&bytes)?;

    let mut outputs = vec![];

    for output in tx.outputs() {
        let address = output
            .address()
            .map_err(|e| Error::Serializer(format!("output address: {e}")))?
            .to_vec();

        let value = output.value();
        let mut amount = Value::lovelace(value.coin() as u128);

        for policy in value.assets() {
            let policy_id = policy.policy().to_string();

            for asset in policy.assets() {
                let quantity = asset.output_coin().unwrap_or_default();
                amount.insert(&unit(&policy_id, &hex::encode(asset.name())), quantity as u128);
            }
        }

        outputs.push((address, amount));
    }

    let mint = tx
        .mints()
        .iter()
        .flat_map(|policy| {
            let policy_id = policy.policy().to_string();

            policy
                .assets()
                .into_iter()
                .map(move |asset| (unit(&policy_id, &hex::encode(asset.name())), asset.any_coin()))
        })
        .collect();

    Ok(DecodedTx {
        inputs: refs(tx.inputs()),
        outputs,
        fee: tx.fee().unwrap_or_default(),
        mint,
        collaterals: refs(tx.collateral()),
        reference_inputs: refs(tx.reference_inputs()),
        invalid_before: tx.validity_start(),
        invalid_hereafter: tx.ttl(),
        size: bytes.len(),
    })
}
