//! Cardano transaction construction and balancing.
//!
//! Intents are declared on a [`TxBuilder`], completed from a chain index, funded by coin
//! selection and balanced by a bounded fee convergence loop before being serialized.

pub mod adaptor;
pub mod address;
pub mod balance;
pub mod builder;
pub mod data;
pub mod error;
pub mod fee;
pub mod model;
pub mod order;
pub mod params;
pub mod provider;
pub mod resolve;
pub mod select;
pub mod value;
pub mod wire;

pub use builder::TxBuilder;
pub use error::{Error, ErrorClass};
pub use params::{EngineConfig, Network, ProtocolParams};
pub use value::{Asset, Value};
pub use wire::CborSerializer;
