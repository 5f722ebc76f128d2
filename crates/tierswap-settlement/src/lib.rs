//! Post-execution verification for the swap pipeline.
//!
//! Two components live here: the event verifier, which reconciles the
//! confirmed receipt against the locally predicted tier and risk, and the
//! markout verifier, which runs the deferred, block-height-gated toxicity
//! check.

use thiserror::Error;
use tierswap_delivery::DeliveryError;
use tierswap_storage::StorageError;

pub mod events;
pub mod markout;

pub use events::EventVerifier;
pub use markout::{MarkoutChain, MarkoutConfig, MarkoutVerifier};

#[derive(Debug, Error)]
pub enum SettlementError {
	#[error("Verification failed: {0}")]
	VerificationFailed(String),
	#[error("Markout check failed: {0}")]
	Markout(String),
	#[error("Delivery error during settlement: {0}")]
	Delivery(#[from] DeliveryError),
	#[error("Storage error during settlement: {0}")]
	Storage(#[from] StorageError),
}

impl SettlementError {
	pub fn is_transient(&self) -> bool {
		match self {
			SettlementError::Delivery(e) => e.is_transient(),
			_ => false,
		}
	}
}
