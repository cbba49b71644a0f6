use std::convert::Infallible;

use pallas_codec::minicbor;
use thiserror::Error;

use crate::{provider::BoxError, value::Value};

/// Coarse classification of an [`Error`] for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The declared transaction, its funds or its configuration need fixing.
    Input,
    /// Something outside the caller's declaration failed.
    Infrastructure,
}

#[derive(Debug, Error)]
pub enum Error {
    /// A declared entry is missing a field required for its variant, or one of its fields has
    /// the wrong shape (bad hex, unknown address, zero mint quantity, ...).
    #[error("malformed entry: {0}")]
    Structural(String),

    /// An entry could not be completed because the resolver was unable to supply the missing
    /// UTxO or address.
    #[error("incomplete {what}")]
    IncompleteInfo {
        what: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The candidate pool can't cover the outstanding value.
    #[error("insufficient funds, missing {deficit}")]
    InsufficientFunds { deficit: Value },

    /// The fee never settled within the iteration bound.
    #[error("fee did not converge after {iterations} iterations (last fee {last_fee})")]
    NonConvergence { iterations: usize, last_fee: u64 },

    /// The script evaluator rejected the draft transaction.
    #[error("script evaluation failed: {message}")]
    Evaluation {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The wire codec could not encode or decode a transaction.
    #[error("wire serialization failed: {0}")]
    Serializer(String),

    #[error("invalid protocol parameters: {0}")]
    Config(String),
}

impl Error {
    pub fn structural(msg: impl Into<String>) -> Self {
        Self::Structural(msg.into())
    }

    pub fn incomplete(what: impl Into<String>) -> Self {
        Self::IncompleteInfo {
            what: what.into(),
            source: None,
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Error::Structural(_)
            | Error::IncompleteInfo { .. }
            | Error::InsufficientFunds { .. }
            | Error::Config(_) => ErrorClass::Input,
            Error::NonConvergence { .. } | Error::Evaluation { .. } | Error::Serializer(_) => {
                ErrorClass::Infrastructure
            }
        }
    }
}

impl From<minicbor::encode::Error<Infallible>> for Error {
    fn from(value: minicbor::encode::Error<Infallible>) -> Self {
        Error::Serializer(value.to_string())
    }
}

impl From<minicbor::decode::Error> for Error {
    fn from(value: minicbor::decode::Error) -> Self {
        Error::Serializer(value.to_string())
    }
}

impl From<pallas_traverse::Error> for Error {
    fn from(value: pallas_traverse::Error) -> Self {
        Error::Serializer(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_caller_errors() {
        assert_eq!(Error::structural("x").class(), ErrorClass::Input);
        assert_eq!(Error::incomplete("x").class(), ErrorClass::Input);
        assert_eq!(
            Error::InsufficientFunds {
                deficit: Value::lovelace(1)
            }
            .class(),
            ErrorClass::Input
        );
    }

    #[test]
    fn classifies_infrastructure_errors() {
        let err = Error::NonConvergence {
            iterations: 10,
            last_fee: 170_000,
        };

        assert_eq!(err.class(), ErrorClass::Infrastructure);
        assert_eq!(
            err.to_string(),
            "fee did not converge after 10 iterations (last fee 170000)"
        );
    }
}
