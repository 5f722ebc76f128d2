//! Transaction execution for the swap pipeline.
//!
//! Every mutating call follows the same discipline: a non-mutating simulation
//! first (revert reasons are decoded structurally and nothing is submitted),
//! then submission, then bounded receipt polling. A receipt with failure
//! status is fatal for the attempt; a missing receipt within the budget is
//! surfaced as a timeout the caller resolves, never retried blindly.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tierswap_account::AccountService;
use tierswap_types::{Transaction, TransactionHash, TransactionRecord, TxStatus};
use tracing::{debug, info};

pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
}
pub mod revert;

pub use revert::RevertReason;

/// Errors from the delivery layer.
#[derive(Debug, Error)]
pub enum DeliveryError {
	/// Transport or provider failure; carries the underlying RPC error.
	#[error("Network error: {0}")]
	Network(String),
	/// The pre-submission simulation reverted; nothing was submitted.
	#[error("Simulation reverted: {reason}")]
	SimulationReverted { reason: RevertReason },
	/// The transaction was included and reverted on-chain.
	#[error("Transaction {hash} reverted in block {block_number}")]
	Reverted {
		hash: TransactionHash,
		block_number: u64,
	},
	/// No receipt within the confirmation budget. The transaction may still
	/// land; resubmission is the caller's decision.
	#[error("No receipt for {hash} within {budget_secs}s")]
	ConfirmationTimeout {
		hash: TransactionHash,
		budget_secs: u64,
	},
	/// Signing failure from the account layer.
	#[error("Signing error: {0}")]
	Signing(String),
}

impl DeliveryError {
	/// Whether the failure is transient: worth rebuilding/retrying rather
	/// than abandoning the intent. Callers branch on this instead of
	/// inspecting provider-specific error shapes.
	pub fn is_transient(&self) -> bool {
		match self {
			DeliveryError::Network(_) => true,
			DeliveryError::ConfirmationTimeout { .. } => true,
			DeliveryError::SimulationReverted { reason } => reason.is_transient(),
			DeliveryError::Reverted { .. } => false,
			DeliveryError::Signing(_) => false,
		}
	}
}

/// Interface every transaction-delivery implementation provides.
#[async_trait]
pub trait DeliveryInterface: Send + Sync {
	/// Executes a non-mutating call (state read or submission dry run).
	/// A revert surfaces as `SimulationReverted` with the decoded reason.
	async fn call(&self, tx: &Transaction) -> Result<Vec<u8>, DeliveryError>;

	/// Submits a signed transaction to the network.
	async fn submit(
		&self,
		tx: Transaction,
		signature: &tierswap_types::Signature,
	) -> Result<TransactionHash, DeliveryError>;

	/// Polls for the receipt at `poll_interval` until `timeout` elapses.
	/// Returns a record whose status is `Confirmed`, `Reverted`, or
	/// `TimedOut`; never errors on timeout.
	async fn wait_for_receipt(
		&self,
		hash: &TransactionHash,
		poll_interval: Duration,
		timeout: Duration,
	) -> Result<TransactionRecord, DeliveryError>;

	/// Fetches the receipt if one exists.
	async fn get_receipt(
		&self,
		hash: &TransactionHash,
	) -> Result<Option<TransactionRecord>, DeliveryError>;

	/// Current chain head height.
	async fn block_number(&self) -> Result<u64, DeliveryError>;
}

/// Execution budgets for one transaction.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionBudget {
	pub poll_interval: Duration,
	pub confirmation_timeout: Duration,
}

impl Default for ExecutionBudget {
	fn default() -> Self {
		Self {
			poll_interval: Duration::from_secs(1),
			confirmation_timeout: Duration::from_secs(180),
		}
	}
}

/// Service orchestrating simulate → sign → submit → confirm for one signer.
///
/// Submissions are serialized through an async lock: pipelines may run
/// concurrently, but two in-flight transactions from the same signer would
/// race on the nonce stream.
pub struct DeliveryService {
	implementation: Box<dyn DeliveryInterface>,
	account: Arc<AccountService>,
	budget: ExecutionBudget,
	submit_lock: tokio::sync::Mutex<()>,
}

impl DeliveryService {
	pub fn new(
		implementation: Box<dyn DeliveryInterface>,
		account: Arc<AccountService>,
		budget: ExecutionBudget,
	) -> Self {
		Self {
			implementation,
			account,
			budget,
			submit_lock: tokio::sync::Mutex::new(()),
		}
	}

	/// Non-mutating read call.
	pub async fn read(&self, tx: &Transaction) -> Result<Vec<u8>, DeliveryError> {
		self.implementation.call(tx).await
	}

	/// Dry-runs a transaction without submitting it.
	pub async fn simulate(&self, tx: &Transaction) -> Result<Vec<u8>, DeliveryError> {
		self.implementation.call(tx).await
	}

	/// Full execution cycle: simulate, sign, submit, await the receipt.
	///
	/// Simulation reverts fail fast with the decoded reason and submit
	/// nothing. A `Reverted` or `TimedOut` record is mapped to the matching
	/// error so callers get the taxonomy without inspecting statuses.
	pub async fn execute(&self, tx: Transaction) -> Result<TransactionRecord, DeliveryError> {
		self.simulate(&tx).await?;
		debug!("Simulation passed, submitting");

		let signature = self
			.account
			.sign(&tx)
			.await
			.map_err(|e| DeliveryError::Signing(e.to_string()))?;

		let hash = {
			let _guard = self.submit_lock.lock().await;
			self.implementation.submit(tx, &signature).await?
		};
		info!(tx_hash = %hash, "Submitted transaction");

		let record = self
			.implementation
			.wait_for_receipt(&hash, self.budget.poll_interval, self.budget.confirmation_timeout)
			.await?;

		match record.status {
			TxStatus::Reverted => Err(DeliveryError::Reverted {
				hash: record.hash.clone(),
				block_number: record.block_number.unwrap_or(0),
			}),
			TxStatus::TimedOut => Err(DeliveryError::ConfirmationTimeout {
				hash: record.hash.clone(),
				budget_secs: self.budget.confirmation_timeout.as_secs(),
			}),
			_ => Ok(record),
		}
	}

	pub async fn get_receipt(
		&self,
		hash: &TransactionHash,
	) -> Result<Option<TransactionRecord>, DeliveryError> {
		self.implementation.get_receipt(hash).await
	}

	pub async fn block_number(&self) -> Result<u64, DeliveryError> {
		self.implementation.block_number().await
	}

	/// Address the service signs and submits from.
	pub async fn sender(&self) -> Result<tierswap_types::Address, DeliveryError> {
		self.account
			.get_address()
			.await
			.map_err(|e| DeliveryError::Signing(e.to_string()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn transient_classification_follows_the_taxonomy() {
		assert!(DeliveryError::Network("rpc hiccup".into()).is_transient());
		assert!(DeliveryError::ConfirmationTimeout {
			hash: TransactionHash(vec![0u8; 32]),
			budget_secs: 180,
		}
		.is_transient());

		// An expired deadline is rebuildable; any other revert is not.
		assert!(DeliveryError::SimulationReverted {
			reason: RevertReason::DeadlinePassed,
		}
		.is_transient());
		assert!(!DeliveryError::SimulationReverted {
			reason: RevertReason::Message("insufficient output".into()),
		}
		.is_transient());

		assert!(!DeliveryError::Reverted {
			hash: TransactionHash(vec![0u8; 32]),
			block_number: 1,
		}
		.is_transient());
	}
}
