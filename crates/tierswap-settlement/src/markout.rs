//! Deferred markout verification.
//!
//! After a swap confirms, enough blocks must elapse before realized price
//! drift means anything. The verifier gates on block depth, then drives the
//! hook's markout check: a simulation first to read rho, then the real call,
//! which on-chain may slash the agent when the drift is adverse. The decision
//! is recorded and final per swap id; re-invocation returns the recorded
//! decision without another mutating call.

use alloy_primitives::{B256, I256, U256};
use alloy_sol_types::{sol, SolCall, SolValue};
use async_trait::async_trait;
use std::sync::Arc;
use tierswap_delivery::{DeliveryError, DeliveryService};
use tierswap_storage::StorageService;
use tierswap_types::{
	Address, MarkoutDecision, MarkoutVerification, Transaction, TransactionRecord,
};
use tracing::{debug, info};

use crate::SettlementError;

sol! {
	/// Markout entry point on the fee hook. Mutating: a failing health check
	/// may slash the agent's bond in the same call.
	interface IMarkoutHook {
		function checkMarkout(bytes32 swapId) external returns (int256 rho);
	}
}

/// The chain seam the verifier drives reads and the markout call through.
#[async_trait]
pub trait MarkoutChain: Send + Sync {
	async fn read(&self, tx: &Transaction) -> Result<Vec<u8>, DeliveryError>;
	async fn execute(&self, tx: Transaction) -> Result<TransactionRecord, DeliveryError>;
	async fn block_number(&self) -> Result<u64, DeliveryError>;
}

#[async_trait]
impl MarkoutChain for DeliveryService {
	async fn read(&self, tx: &Transaction) -> Result<Vec<u8>, DeliveryError> {
		DeliveryService::read(self, tx).await
	}

	async fn execute(&self, tx: Transaction) -> Result<TransactionRecord, DeliveryError> {
		DeliveryService::execute(self, tx).await
	}

	async fn block_number(&self) -> Result<u64, DeliveryError> {
		DeliveryService::block_number(self).await
	}
}

#[async_trait]
impl<T: MarkoutChain + ?Sized> MarkoutChain for Arc<T> {
	async fn read(&self, tx: &Transaction) -> Result<Vec<u8>, DeliveryError> {
		(**self).read(tx).await
	}

	async fn execute(&self, tx: Transaction) -> Result<TransactionRecord, DeliveryError> {
		(**self).execute(tx).await
	}

	async fn block_number(&self) -> Result<u64, DeliveryError> {
		(**self).block_number().await
	}
}

/// Static configuration of the markout verifier.
#[derive(Debug, Clone)]
pub struct MarkoutConfig {
	pub chain_id: u64,
	/// Hook exposing the markout check.
	pub hook: Address,
	/// Gas limit for the mutating markout call.
	pub gas_limit: u64,
	/// Blocks that must elapse after the swap before checking.
	pub confirmation_depth: u64,
	/// Health threshold on rho, wad-scaled and signed. Drift strictly below
	/// flags the swap; at or above is healthy.
	pub health_threshold: i128,
}

/// Block-height-gated, idempotent markout verifier.
pub struct MarkoutVerifier<C: MarkoutChain> {
	chain: C,
	storage: Arc<StorageService>,
	config: MarkoutConfig,
}

const NAMESPACE: &str = "markout";

impl<C: MarkoutChain> MarkoutVerifier<C> {
	pub fn new(chain: C, storage: Arc<StorageService>, config: MarkoutConfig) -> Self {
		Self {
			chain,
			storage,
			config,
		}
	}

	/// Earliest block at which a swap included at `swap_block` can be checked.
	pub fn earliest_check_block(&self, swap_block: u64) -> u64 {
		swap_block + self.config.confirmation_depth
	}

	/// Runs (or replays) the markout check for one swap.
	///
	/// Before the confirmation depth is reached this returns `Pending` and
	/// performs no mutating call. Once a final decision has been recorded,
	/// every later invocation returns it verbatim; the chain is not touched
	/// again, so the on-chain slashing path cannot re-trigger.
	pub async fn check(
		&self,
		swap_id: [u8; 32],
		swap_block: u64,
	) -> Result<MarkoutVerification, SettlementError> {
		let id = hex::encode(swap_id);

		if let Ok(recorded) = self
			.storage
			.retrieve::<MarkoutVerification>(NAMESPACE, &id)
			.await
		{
			if recorded.decision.is_final() {
				debug!(swap_id = %id, decision = ?recorded.decision, "Markout already decided");
				return Ok(recorded);
			}
		}

		let current_block = self.chain.block_number().await?;
		if current_block < self.earliest_check_block(swap_block) {
			debug!(
				swap_id = %id,
				current_block,
				earliest = self.earliest_check_block(swap_block),
				"Markout still pending"
			);
			return Ok(MarkoutVerification {
				swap_id,
				swap_block,
				checked_at_block: current_block,
				rho: None,
				decision: MarkoutDecision::Pending,
			});
		}

		let tx = Transaction {
			to: self.config.hook.clone(),
			data: IMarkoutHook::checkMarkoutCall {
				swapId: B256::from(swap_id),
			}
			.abi_encode(),
			value: U256::ZERO,
			chain_id: self.config.chain_id,
			nonce: None,
			gas_limit: self.config.gas_limit,
			max_fee_per_gas: None,
			max_priority_fee_per_gas: None,
		};

		// Read rho from a dry run, then fire the real call so the hook's
		// state transition (including slashing) happens on-chain.
		let bytes = self.chain.read(&tx).await?;
		let rho_raw = I256::abi_decode(&bytes, true)
			.map_err(|e| SettlementError::Markout(format!("rho response: {}", e)))?;
		let rho = i128::try_from(rho_raw)
			.map_err(|_| SettlementError::Markout(format!("rho {} out of range", rho_raw)))?;

		self.chain.execute(tx).await?;

		let decision = if rho < self.config.health_threshold {
			MarkoutDecision::SlashEligible
		} else {
			MarkoutDecision::Healthy
		};

		let verification = MarkoutVerification {
			swap_id,
			swap_block,
			checked_at_block: current_block,
			rho: Some(rho),
			decision,
		};
		self.storage.store(NAMESPACE, &id, &verification).await?;
		info!(swap_id = %id, rho, decision = ?decision, "Markout decided");

		Ok(verification)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicU64, Ordering};
	use tierswap_storage::implementations::memory::MemoryStorage;
	use tierswap_types::{TransactionHash, TxStatus};

	struct MockChain {
		block: AtomicU64,
		rho: i128,
		reads: AtomicU64,
		executes: AtomicU64,
	}

	impl MockChain {
		fn new(block: u64, rho: i128) -> Self {
			Self {
				block: AtomicU64::new(block),
				rho,
				reads: AtomicU64::new(0),
				executes: AtomicU64::new(0),
			}
		}
	}

	#[async_trait]
	impl MarkoutChain for MockChain {
		async fn read(&self, _tx: &Transaction) -> Result<Vec<u8>, DeliveryError> {
			self.reads.fetch_add(1, Ordering::SeqCst);
			Ok(I256::try_from(self.rho).unwrap().abi_encode())
		}

		async fn execute(&self, _tx: Transaction) -> Result<TransactionRecord, DeliveryError> {
			self.executes.fetch_add(1, Ordering::SeqCst);
			Ok(TransactionRecord {
				hash: TransactionHash(vec![0x01; 32]),
				status: TxStatus::Confirmed,
				block_number: Some(self.block.load(Ordering::SeqCst)),
				gas_used: Some(80_000),
				logs: vec![],
			})
		}

		async fn block_number(&self) -> Result<u64, DeliveryError> {
			Ok(self.block.load(Ordering::SeqCst))
		}
	}

	fn config() -> MarkoutConfig {
		MarkoutConfig {
			chain_id: 31337,
			hook: Address(vec![0xee; 20]),
			gas_limit: 300_000,
			confirmation_depth: 10,
			health_threshold: 200_000_000_000_000_000, // 0.2
		}
	}

	fn verifier(chain: MockChain) -> MarkoutVerifier<MockChain> {
		MarkoutVerifier::new(
			chain,
			Arc::new(StorageService::new(Box::new(MemoryStorage::new()))),
			config(),
		)
	}

	const SWAP_ID: [u8; 32] = [0x42; 32];

	#[tokio::test]
	async fn too_shallow_returns_pending_without_mutating() {
		// Swap at block 100, head at 103: three confirmations of ten.
		let v = verifier(MockChain::new(103, 500_000_000_000_000_000));
		let result = v.check(SWAP_ID, 100).await.unwrap();

		assert_eq!(result.decision, MarkoutDecision::Pending);
		assert_eq!(result.rho, None);
		assert_eq!(v.chain.reads.load(Ordering::SeqCst), 0);
		assert_eq!(v.chain.executes.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn healthy_rho_above_threshold() {
		let v = verifier(MockChain::new(111, 500_000_000_000_000_000));
		let result = v.check(SWAP_ID, 100).await.unwrap();

		assert_eq!(result.decision, MarkoutDecision::Healthy);
		assert_eq!(result.rho, Some(500_000_000_000_000_000));
		assert_eq!(v.chain.executes.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn low_rho_is_slash_eligible() {
		let v = verifier(MockChain::new(111, 100_000_000_000_000_000));
		let result = v.check(SWAP_ID, 100).await.unwrap();
		assert_eq!(result.decision, MarkoutDecision::SlashEligible);
	}

	#[tokio::test]
	async fn negative_rho_is_slash_eligible() {
		let v = verifier(MockChain::new(111, -300_000_000_000_000_000));
		let result = v.check(SWAP_ID, 100).await.unwrap();
		assert_eq!(result.decision, MarkoutDecision::SlashEligible);
	}

	#[tokio::test]
	async fn rho_exactly_at_threshold_is_healthy() {
		let v = verifier(MockChain::new(111, 200_000_000_000_000_000));
		let result = v.check(SWAP_ID, 100).await.unwrap();
		assert_eq!(result.decision, MarkoutDecision::Healthy);
	}

	#[tokio::test]
	async fn decision_is_idempotent_and_never_rechecked() {
		let v = verifier(MockChain::new(111, 500_000_000_000_000_000));
		let first = v.check(SWAP_ID, 100).await.unwrap();
		let second = v.check(SWAP_ID, 100).await.unwrap();

		assert_eq!(first.decision, second.decision);
		assert_eq!(first.rho, second.rho);
		// The mutating call ran exactly once.
		assert_eq!(v.chain.executes.load(Ordering::SeqCst), 1);
		assert_eq!(v.chain.reads.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn pending_converges_to_final_once_deep_enough() {
		let chain = MockChain::new(105, 100_000_000_000_000_000);
		let v = verifier(chain);

		let early = v.check(SWAP_ID, 100).await.unwrap();
		assert_eq!(early.decision, MarkoutDecision::Pending);

		v.chain.block.store(120, Ordering::SeqCst);
		let late = v.check(SWAP_ID, 100).await.unwrap();
		assert_eq!(late.decision, MarkoutDecision::SlashEligible);
	}
}
