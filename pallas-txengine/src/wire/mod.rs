//! Conway-era CBOR codec for builder bodies.

mod conway;
mod decode;
mod native;
mod witness;

use pallas_primitives::{
    conway::{TransactionBody, Tx, VKeyWitness},
    Fragment,
};
use pallas_traverse::{ComputeHash, MultiEraTx};
use tracing::trace;

use crate::{
    model::{decode_hex, Output, TxBuilderBody},
    params::{CostModels, ProtocolParams},
    provider::{DecodedTx, TxSerializer},
    Error,
};

use witness::Witnesses;

/// Serializer producing Conway ledger primitives; needs the cost models to commit script data.
#[derive(Debug, Clone, Default)]
pub struct CborSerializer {
    cost_models: CostModels,
}

impl CborSerializer {
    pub fn new(cost_models: CostModels) -> Self {
        Self { cost_models }
    }

    pub fn from_params(params: &ProtocolParams) -> Self {
        Self::new(params.cost_models.clone())
    }

    fn build(
        &self,
        body: &TxBuilderBody,
        vkeys: impl FnOnce(&TransactionBody) -> Result<Vec<VKeyWitness>, Error>,
    ) -> Result<Vec<u8>, Error> {
        let witnesses = Witnesses::collect(body)?;
        let script_data_hash = witnesses.script_data_hash(&self.cost_models)?;

        let auxiliary_data = conway::auxiliary_data(body)?;
        let aux_hash = auxiliary_data.as_ref().map(|x| x.compute_hash());

        let transaction_body = conway::body(body, script_data_hash, aux_hash)?;
        let vkeys = vkeys(&transaction_body)?;
        let signatures = vkeys.len();

        let tx = Tx {
            transaction_body,
            transaction_witness_set: witnesses.witness_set(vkeys),
            success: true,
            auxiliary_data: auxiliary_data.into(),
        };

        let out = tx
            .encode_fragment()
            .map_err(|e| Error::Serializer(e.to_string()))?;

        trace!(size = out.len(), witnesses = signatures, "encoded transaction");

        Ok(out)
    }
}

impl TxSerializer for CborSerializer {
    fn serialize(&self, body: &TxBuilderBody) -> Result<String, Error> {
        let bytes = self.build(body, |tx_body| witness::sign(body, tx_body))?;
        Ok(hex::encode(bytes))
    }

    fn serialize_draft(&self, body: &TxBuilderBody) -> Result<Vec<u8>, Error> {
        self.build(body, |_| witness::placeholder_vkeys(body))
    }

    fn output_size(&self, output: &Output) -> Result<usize, Error> {
        Ok(conway::output_bytes(output)?.len())
    }

    fn deserialize(&self, tx_hex: &str) -> Result<DecodedTx, Error> {
        decode::decode_tx(tx_hex)
    }
}

/// Blake2b-256 of the encoded body of a transaction, hex encoded.
pub fn tx_hash(tx_hex: &str) -> Result<String, Error> {
    let bytes = decode_hex("transaction", tx_hex)?;
    let tx = MultiEraTx::decode(&bytes)?;

    Ok(tx.hash().to_string())
}
