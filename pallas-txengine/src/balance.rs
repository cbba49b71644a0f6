//! Fee and balance convergence.
//!
//! The fee depends on the transaction size, which depends on the change output, which depends on
//! the fee. [`step`] measures one assumed fee; [`Balancer`] iterates it until the fee settles.

use num_rational::Ratio;
use tracing::{debug, trace, warn};

use crate::{
    fee,
    model::{mint_delta, ExUnits, Output, TxBuilderBody, TxIn, TxInParameter, Utxo},
    order::OrderingPolicy,
    params::{EngineConfig, ProtocolParams},
    provider::{EvalResult, Evaluator, TxSerializer},
    resolve::ref_script_size,
    select,
    value::{Value, LOVELACE},
    Error,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// The body balances for the assumed fee; `computed_fee` is what its draft actually costs.
    Converging {
        body: TxBuilderBody,
        computed_fee: u64,
    },
    /// Inputs don't cover outputs, fee and change for the assumed fee.
    NeedsFunds { deficit: Value },
}

/// Everything entering the transaction: inputs, withdrawals, refunds and minted assets.
pub fn consumed(body: &TxBuilderBody, params: &ProtocolParams) -> Result<Value, Error> {
    let mut total = Value::new();

    for input in &body.inputs {
        let param = input.param();

        let amount = param.amount.as_ref().ok_or_else(|| {
            Error::incomplete(format!("amount of input {}#{}", param.tx_hash, param.tx_index))
        })?;

        total.merge(amount);
    }

    let withdrawn: u128 = body.withdrawals.iter().map(|x| x.coin() as u128).sum();

    let refunds: u128 = body
        .certificates
        .iter()
        .map(|x| x.cert_type().refund(params) as u128)
        .sum();

    total.insert(LOVELACE, withdrawn + refunds);

    let (minted, _) = mint_delta(&body.mints).split();
    total.merge(&minted);

    Ok(total)
}

/// Everything leaving the transaction except the change: declared outputs, deposits, burned
/// assets and the fee of the body.
pub fn produced(body: &TxBuilderBody, params: &ProtocolParams) -> Value {
    let mut total = Value::new();

    for output in &body.outputs {
        total.merge(&output.amount);
    }

    let deposits: u128 = body
        .certificates
        .iter()
        .map(|x| x.cert_type().deposit(params) as u128)
        .sum();

    total.insert(LOVELACE, deposits + body.fee as u128);

    let (_, burned) = mint_delta(&body.mints).split();
    total.merge(&burned);

    total
}

/// Fails unless consumed value equals produced value plus change, in every unit.
pub fn check_balance(body: &TxBuilderBody, params: &ProtocolParams) -> Result<(), Error> {
    let consumed = consumed(body, params)?;

    let mut produced = produced(body, params);

    if let Some(change) = &body.change_output {
        produced.merge(&change.amount);
    }

    if consumed != produced {
        return Err(Error::structural(format!(
            "transaction does not balance: consumes {consumed}, produces {produced}"
        )));
    }

    Ok(())
}

/// Rebuilds the change output for `fee` and measures the resulting draft.
pub fn step(
    body: &TxBuilderBody,
    fee: u64,
    params: &ProtocolParams,
    serializer: &dyn TxSerializer,
) -> Result<Step, Error> {
    let mut draft = body.clone();
    draft.fee = fee;
    draft.change_output = None;

    let consumed = consumed(&draft, params)?;
    let produced = produced(&draft, params);

    let Some(leftover) = consumed.checked_sub(&produced) else {
        return Ok(Step::NeedsFunds {
            deficit: consumed.shortfall(&produced),
        });
    };

    if !leftover.is_empty() {
        let address = draft
            .change_address
            .clone()
            .ok_or_else(|| Error::incomplete("change address"))?;

        let change = Output::new(address, leftover);
        let min = fee::min_lovelace(params, serializer, &change)? as u128;

        if change.amount.coin() < min {
            return Ok(Step::NeedsFunds {
                deficit: Value::lovelace(min - change.amount.coin()),
            });
        }

        draft.change_output = Some(change);
    }

    let size = serializer.serialize_draft(&draft)?.len();

    let budgets: Vec<ExUnits> = draft.redeemers().iter().map(|(_, _, r)| r.ex_units).collect();

    let computed_fee = fee::min_fee(params, size, &budgets, ref_script_size(&draft))?;

    Ok(Step::Converging {
        body: draft,
        computed_fee,
    })
}

fn scale(units: u64, multiplier: Ratio<u64>) -> u64 {
    let numer = *multiplier.numer() as u128;
    let denom = (*multiplier.denom() as u128).max(1);

    u64::try_from(units as u128 * numer / denom).unwrap_or(u64::MAX)
}

/// Writes evaluated budgets back onto the redeemers, scaled and rounded down.
pub fn apply_evaluation(
    body: &mut TxBuilderBody,
    results: &[EvalResult],
    multiplier: Ratio<u64>,
) -> Result<(), Error> {
    for result in results {
        let ex_units = ExUnits {
            mem: scale(result.ex_units.mem, multiplier),
            steps: scale(result.ex_units.steps, multiplier),
        };

        trace!(tag = ?result.tag, index = result.index, ?ex_units, "evaluated redeemer");

        body.set_ex_units(result.tag, result.index, ex_units)?;
    }

    Ok(())
}

/// UTxOs the evaluator can't know about: explicit evaluation context plus spent pool entries.
pub fn evaluation_context(body: &TxBuilderBody) -> Vec<Utxo> {
    let mut out = body.inputs_for_evaluation.clone();

    for utxo in &body.extra_inputs {
        let spent = body
            .inputs
            .iter()
            .any(|x| x.param().outpoint() == utxo.outpoint());

        let known = out.iter().any(|x| x.outpoint() == utxo.outpoint());

        if spent && !known {
            out.push(utxo.clone());
        }
    }

    out
}

/// A settled fee: the new one is the assumed one, or the assumed one already covers it.
fn is_settled(iteration: usize, assumed: u64, computed: u64) -> bool {
    computed == assumed || (computed < assumed && iteration > 0)
}

/// Session-wide collaborators of the convergence loop.
pub struct Balancer<'a> {
    pub params: &'a ProtocolParams,
    pub engine: &'a EngineConfig,
    pub serializer: &'a dyn TxSerializer,
    pub ordering: &'a dyn OrderingPolicy,
}

impl<'a> Balancer<'a> {
    /// Selects from `pool` to cover `deficit` and spends the picked UTxOs.
    pub fn fund(
        &self,
        body: &mut TxBuilderBody,
        pool: &mut Vec<Utxo>,
        deficit: &Value,
    ) -> Result<(), Error> {
        let candidates = select::unspent(pool, body);
        let picked = select::select(&candidates, deficit, &body.selection_config, self.engine)?;

        pool.retain(|x| !picked.iter().any(|p| p.outpoint() == x.outpoint()));

        for utxo in &picked {
            body.inputs.push(TxIn::PubKey {
                tx_in: TxInParameter::from(utxo),
            });
        }

        self.ordering.order(body)
    }

    /// First selection pass, before any fee is known.
    ///
    /// Covers the plain value deficit, padded with a fee estimate taken from the unbalanced
    /// draft when the selection config asks for it.
    pub fn initial_selection(
        &self,
        body: &mut TxBuilderBody,
        pool: &mut Vec<Utxo>,
    ) -> Result<(), Error> {
        let mut unpaid = body.clone();
        unpaid.fee = 0;
        unpaid.change_output = None;

        let deficit = consumed(&unpaid, self.params)?.shortfall(&produced(&unpaid, self.params));

        if deficit.is_empty() {
            return Ok(());
        }

        let estimate = if body.selection_config.include_tx_fees {
            let size = self.serializer.serialize_draft(&unpaid)?.len();
            let budgets: Vec<ExUnits> =
                unpaid.redeemers().iter().map(|(_, _, r)| r.ex_units).collect();

            fee::min_fee(self.params, size, &budgets, ref_script_size(&unpaid))?
        } else {
            0
        };

        let target = select::selection_target(&deficit, &body.selection_config, estimate);

        self.fund(body, pool, &target)
    }

    /// Drafts `body` at `fee`, selecting more inputs for as long as it doesn't balance.
    pub fn draft(
        &self,
        body: &mut TxBuilderBody,
        fee: u64,
        pool: &mut Vec<Utxo>,
    ) -> Result<(TxBuilderBody, u64), Error> {
        loop {
            match step(body, fee, self.params, self.serializer)? {
                Step::Converging { body, computed_fee } => return Ok((body, computed_fee)),
                Step::NeedsFunds { deficit } => {
                    debug!(%deficit, fee, "body needs more funds");
                    self.fund(body, pool, &deficit)?;
                }
            }
        }
    }

    /// Iterates the fee without script evaluation.
    pub fn converge(
        &self,
        mut body: TxBuilderBody,
        pool: &mut Vec<Utxo>,
    ) -> Result<TxBuilderBody, Error> {
        let mut assumed = 0;

        for iteration in 0..self.engine.iteration_bound() {
            let (draft, computed) = self.draft(&mut body, assumed, pool)?;

            debug!(iteration, assumed_fee = assumed, computed_fee = computed, "fee iteration");

            if is_settled(iteration, assumed, computed) {
                return Ok(draft);
            }

            assumed = computed;
        }

        Err(Error::NonConvergence {
            iterations: self.engine.iteration_bound(),
            last_fee: assumed,
        })
    }

    /// Iterates the fee, re-evaluating scripts on every draft that carries redeemers.
    pub async fn converge_evaluated(
        &self,
        mut body: TxBuilderBody,
        pool: &mut Vec<Utxo>,
        evaluator: &dyn Evaluator,
    ) -> Result<TxBuilderBody, Error> {
        let mut assumed = 0;

        for iteration in 0..self.engine.iteration_bound() {
            let (mut draft, mut computed) = self.draft(&mut body, assumed, pool)?;

            if draft.has_redeemers() {
                let bytes = self.serializer.serialize_draft(&draft)?;
                let context = evaluation_context(&draft);

                let results = evaluator
                    .evaluate(&bytes, &context, &draft.chained_txs)
                    .await
                    .map_err(|e| Error::Evaluation {
                        message: e.to_string(),
                        source: Some(e),
                    })?;

                apply_evaluation(&mut body, &results, self.engine.evaluation_multiplier)?;
                (draft, computed) = self.draft(&mut body, assumed, pool)?;
            }

            debug!(iteration, assumed_fee = assumed, computed_fee = computed, "fee iteration");

            if is_settled(iteration, assumed, computed) {
                return Ok(draft);
            }

            assumed = computed;
        }

        Err(Error::NonConvergence {
            iterations: self.engine.iteration_bound(),
            last_fee: assumed,
        })
    }

    /// Balances around a caller-chosen fee instead of iterating.
    pub fn with_fixed_fee(
        &self,
        mut body: TxBuilderBody,
        pool: &mut Vec<Utxo>,
        fee: u64,
    ) -> Result<TxBuilderBody, Error> {
        let (draft, computed) = self.draft(&mut body, fee, pool)?;

        if computed > fee {
            warn!(fee, minimum = computed, "manual fee is below the minimum");
        }

        Ok(draft)
    }

    /// Decodes the final transaction and checks it against the balanced body.
    pub fn verify(&self, tx_hex: &str, body: &TxBuilderBody) -> Result<(), Error> {
        let decoded = self.serializer.deserialize(tx_hex)?;

        if decoded.fee != body.fee {
            return Err(Error::Serializer(format!(
                "encoded fee {} differs from balanced fee {}",
                decoded.fee, body.fee
            )));
        }

        if decoded.inputs.len() != body.inputs.len() {
            return Err(Error::Serializer(format!(
                "encoded {} inputs, body has {}",
                decoded.inputs.len(),
                body.inputs.len()
            )));
        }

        let encoded = decoded
            .outputs
            .iter()
            .fold(Value::new(), |acc, (_, x)| acc.plus(x));

        let expected = body
            .all_outputs()
            .fold(Value::new(), |acc, x| acc.plus(&x.amount));

        if encoded != expected {
            return Err(Error::Serializer(format!(
                "encoded outputs hold {encoded}, body outputs hold {expected}"
            )));
        }

        if decoded.size > self.params.max_tx_size as usize {
            return Err(Error::structural(format!(
                "transaction is {} bytes, above the {} byte limit",
                decoded.size, self.params.max_tx_size
            )));
        }

        check_balance(body, self.params)
    }
}
