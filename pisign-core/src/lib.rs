//! pisign core library exports

pub mod config;
pub mod signature;

pub use config::SigningConfig;
pub use signature::{SignError, Signer, Verdict, Verifier};
