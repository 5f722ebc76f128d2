//! Signing for the swap pipeline.
//!
//! The pipeline owns exactly one signer per running instance; concurrent
//! pipelines that share a signer must serialize submissions (the delivery
//! service enforces this), so the account layer itself stays stateless.

use async_trait::async_trait;
use thiserror::Error;
use tierswap_types::{Address, Signature, Transaction};

pub mod implementations {
	pub mod local;
}

#[derive(Debug, Error)]
pub enum AccountError {
	#[error("Signing failed: {0}")]
	SigningFailed(String),
	#[error("Invalid key: {0}")]
	InvalidKey(String),
}

/// Interface every signer implementation provides.
#[async_trait]
pub trait AccountInterface: Send + Sync {
	/// The address transactions are sent from.
	async fn address(&self) -> Result<Address, AccountError>;

	/// Signs a transaction without submitting it.
	async fn sign_transaction(&self, tx: &Transaction) -> Result<Signature, AccountError>;
}

/// Service wrapper over the configured signer implementation.
pub struct AccountService {
	provider: Box<dyn AccountInterface>,
}

impl AccountService {
	pub fn new(provider: Box<dyn AccountInterface>) -> Self {
		Self { provider }
	}

	pub async fn get_address(&self) -> Result<Address, AccountError> {
		self.provider.address().await
	}

	pub async fn sign(&self, tx: &Transaction) -> Result<Signature, AccountError> {
		self.provider.sign_transaction(tx).await
	}
}
