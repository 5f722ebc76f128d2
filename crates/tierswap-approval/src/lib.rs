//! Token-approval orchestration for the swap pipeline.
//!
//! Before the router can pull an ERC-20 input, two authorizations must hold:
//! an ERC-20 allowance from the owner to the delegation contract, and a
//! bounded, expiring grant from the delegation contract to the router. The
//! orchestrator brings both up to date with the minimum number of
//! transactions: a step whose allowance already suffices submits nothing.
//!
//! State is tracked in memory for one run only and moves forward only; a
//! failure at the delegation step never re-runs an ERC-20 approve that
//! already succeeded in the same run. Nothing is cached across runs, so
//! externally changed allowances are picked up by the next run's queries.

use alloy_primitives::{
	aliases::{U160, U48},
	U256,
};
use alloy_sol_types::{sol, SolCall, SolValue};
use async_trait::async_trait;
use thiserror::Error;
use tierswap_delivery::{DeliveryError, DeliveryService};
use tierswap_types::{Address, ApprovalState, Transaction, TransactionHash, TransactionRecord};
use tracing::{debug, info};

sol! {
	interface IERC20 {
		function allowance(address owner, address spender) external view returns (uint256 remaining);
		function approve(address spender, uint256 amount) external returns (bool ok);
		function balanceOf(address account) external view returns (uint256 balance);
	}

	/// Permit2-style allowance delegation.
	interface IAllowanceTransfer {
		function allowance(address user, address token, address spender) external view returns (uint160 amount, uint48 expiration, uint48 nonce);
		function approve(address token, address spender, uint160 amount, uint48 expiration) external;
	}
}

#[derive(Debug, Error)]
pub enum ApprovalError {
	/// Owner does not hold the input amount. Fatal for this attempt.
	#[error("Insufficient balance of {token}: have {balance}, need {required}")]
	InsufficientBalance {
		token: Address,
		balance: U256,
		required: U256,
	},
	#[error("Approval transaction failed: {0}")]
	Delivery(#[from] DeliveryError),
	#[error("Approval encoding failed: {0}")]
	Encoding(String),
}

impl ApprovalError {
	pub fn is_transient(&self) -> bool {
		match self {
			ApprovalError::Delivery(e) => e.is_transient(),
			_ => false,
		}
	}
}

/// The delivery seam the orchestrator drives transactions through.
///
/// Narrow on purpose so tests can count submissions without a network.
#[async_trait]
pub trait ApprovalExecutor: Send + Sync {
	async fn read(&self, tx: &Transaction) -> Result<Vec<u8>, DeliveryError>;
	async fn execute(&self, tx: Transaction) -> Result<TransactionRecord, DeliveryError>;
}

#[async_trait]
impl ApprovalExecutor for DeliveryService {
	async fn read(&self, tx: &Transaction) -> Result<Vec<u8>, DeliveryError> {
		DeliveryService::read(self, tx).await
	}

	async fn execute(&self, tx: Transaction) -> Result<TransactionRecord, DeliveryError> {
		DeliveryService::execute(self, tx).await
	}
}

#[async_trait]
impl<T: ApprovalExecutor + ?Sized> ApprovalExecutor for std::sync::Arc<T> {
	async fn read(&self, tx: &Transaction) -> Result<Vec<u8>, DeliveryError> {
		(**self).read(tx).await
	}

	async fn execute(&self, tx: Transaction) -> Result<TransactionRecord, DeliveryError> {
		(**self).execute(tx).await
	}
}

/// Static configuration of one orchestrator instance.
#[derive(Debug, Clone)]
pub struct ApprovalConfig {
	pub chain_id: u64,
	/// The allowance-delegation contract (Permit2-style).
	pub permit2: Address,
	/// The router the delegation grant authorizes.
	pub router: Address,
	/// Gas limit for approval transactions.
	pub gas_limit: u64,
	/// Lifetime of the bounded delegation grant.
	pub delegation_expiry_secs: u64,
}

/// Per-run approval state. Starts at `Unknown` on every run and only moves
/// forward; completed steps are skipped when the run is resumed after a
/// downstream failure.
#[derive(Debug, Clone)]
pub struct ApprovalRun {
	pub erc20: ApprovalState,
	pub delegation: ApprovalState,
	/// Hashes of the approval transactions this run submitted.
	pub submitted: Vec<TransactionHash>,
	/// True when the input was native and the whole component was skipped.
	pub skipped_native: bool,
}

impl ApprovalRun {
	pub fn new() -> Self {
		Self {
			erc20: ApprovalState::Unknown,
			delegation: ApprovalState::Unknown,
			submitted: Vec::new(),
			skipped_native: false,
		}
	}
}

impl Default for ApprovalRun {
	fn default() -> Self {
		Self::new()
	}
}

/// Brings the approval chain for one (owner, token) up to date.
pub struct ApprovalOrchestrator<E: ApprovalExecutor> {
	executor: E,
	config: ApprovalConfig,
}

impl<E: ApprovalExecutor> ApprovalOrchestrator<E> {
	pub fn new(executor: E, config: ApprovalConfig) -> Self {
		Self { executor, config }
	}

	/// Runs the full state machine from scratch.
	pub async fn ensure(
		&self,
		owner: &Address,
		token: &Address,
		amount: U256,
		now: u64,
	) -> Result<ApprovalRun, ApprovalError> {
		let mut run = ApprovalRun::new();
		self.ensure_with(&mut run, owner, token, amount, now).await?;
		Ok(run)
	}

	/// Runs the state machine, resuming from whatever `run` already records.
	/// Calling again after a delegation-step failure re-checks only the
	/// delegation; a completed ERC-20 approve is never re-submitted.
	pub async fn ensure_with(
		&self,
		run: &mut ApprovalRun,
		owner: &Address,
		token: &Address,
		amount: U256,
		now: u64,
	) -> Result<(), ApprovalError> {
		if token.is_native() {
			debug!("Native-asset input, approvals not required");
			run.skipped_native = true;
			run.erc20 = ApprovalState::Sufficient;
			run.delegation = ApprovalState::Sufficient;
			return Ok(());
		}

		if run.erc20 != ApprovalState::Sufficient {
			self.ensure_erc20(run, owner, token, amount).await?;
		}

		if run.delegation != ApprovalState::Sufficient {
			self.ensure_delegation(run, owner, token, amount, now).await?;
		}

		Ok(())
	}

	/// Steps 1 and 2: ERC-20 allowance to the delegation contract.
	async fn ensure_erc20(
		&self,
		run: &mut ApprovalRun,
		owner: &Address,
		token: &Address,
		amount: U256,
	) -> Result<(), ApprovalError> {
		let allowance = self
			.read_erc20_allowance(owner, token, &self.config.permit2)
			.await?;

		if allowance >= amount {
			debug!(token = %token, "ERC-20 allowance sufficient, skipping approve");
			run.erc20 = ApprovalState::Sufficient;
			return Ok(());
		}
		run.erc20 = ApprovalState::Insufficient;

		// Approving without funds would only waste gas later.
		let balance = self.read_balance(owner, token).await?;
		if balance < amount {
			return Err(ApprovalError::InsufficientBalance {
				token: token.clone(),
				balance,
				required: amount,
			});
		}

		// Unbounded approval to the delegation contract: one transaction
		// covers every future swap through it.
		let data = IERC20::approveCall {
			spender: self.config.permit2.to_alloy(),
			amount: U256::MAX,
		}
		.abi_encode();

		let record = self
			.executor
			.execute(self.transaction(token.clone(), data))
			.await?;
		info!(token = %token, tx_hash = %record.hash, "ERC-20 approve confirmed");
		run.submitted.push(record.hash);
		run.erc20 = ApprovalState::Sufficient;
		Ok(())
	}

	/// Steps 3 and 4: delegation grant from the delegation contract to the
	/// router, bounded in amount and time.
	async fn ensure_delegation(
		&self,
		run: &mut ApprovalRun,
		owner: &Address,
		token: &Address,
		amount: U256,
		now: u64,
	) -> Result<(), ApprovalError> {
		let (granted, expiration) = self.read_delegation(owner, token).await?;

		if amount.bit_len() > 160 {
			return Err(ApprovalError::Encoding(
				"amount exceeds uint160".to_string(),
			));
		}
		let required = U160::from_be_slice(&amount.to_be_bytes::<32>()[12..]);

		if granted >= required && expiration > U48::from(now) {
			debug!(token = %token, "Delegation grant sufficient, skipping approve");
			run.delegation = ApprovalState::Sufficient;
			return Ok(());
		}
		run.delegation = ApprovalState::Insufficient;

		let expiry = U48::from(now + self.config.delegation_expiry_secs);

		let data = IAllowanceTransfer::approveCall {
			token: token.to_alloy(),
			spender: self.config.router.to_alloy(),
			amount: required,
			expiration: expiry,
		}
		.abi_encode();

		let record = self
			.executor
			.execute(self.transaction(self.config.permit2.clone(), data))
			.await?;
		info!(token = %token, tx_hash = %record.hash, "Delegation approve confirmed");
		run.submitted.push(record.hash);
		run.delegation = ApprovalState::Sufficient;
		Ok(())
	}

	async fn read_erc20_allowance(
		&self,
		owner: &Address,
		token: &Address,
		spender: &Address,
	) -> Result<U256, ApprovalError> {
		let data = IERC20::allowanceCall {
			owner: owner.to_alloy(),
			spender: spender.to_alloy(),
		}
		.abi_encode();

		let bytes = self
			.executor
			.read(&self.transaction(token.clone(), data))
			.await?;
		U256::abi_decode(&bytes, true)
			.map_err(|e| ApprovalError::Encoding(format!("allowance response: {}", e)))
	}

	async fn read_balance(&self, owner: &Address, token: &Address) -> Result<U256, ApprovalError> {
		let data = IERC20::balanceOfCall {
			account: owner.to_alloy(),
		}
		.abi_encode();

		let bytes = self
			.executor
			.read(&self.transaction(token.clone(), data))
			.await?;
		U256::abi_decode(&bytes, true)
			.map_err(|e| ApprovalError::Encoding(format!("balance response: {}", e)))
	}

	async fn read_delegation(
		&self,
		owner: &Address,
		token: &Address,
	) -> Result<(U160, U48), ApprovalError> {
		let data = IAllowanceTransfer::allowanceCall {
			user: owner.to_alloy(),
			token: token.to_alloy(),
			spender: self.config.router.to_alloy(),
		}
		.abi_encode();

		let bytes = self
			.executor
			.read(&self.transaction(self.config.permit2.clone(), data))
			.await?;
		let (amount, expiration, _nonce) = <(U160, U48, U48)>::abi_decode_params(&bytes, true)
			.map_err(|e| ApprovalError::Encoding(format!("delegation response: {}", e)))?;
		Ok((amount, expiration))
	}

	fn transaction(&self, to: Address, data: Vec<u8>) -> Transaction {
		Transaction {
			to,
			data,
			value: U256::ZERO,
			chain_id: self.config.chain_id,
			nonce: None,
			gas_limit: self.config.gas_limit,
			max_fee_per_gas: None,
			max_priority_fee_per_gas: None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Mutex;
	use tierswap_types::TxStatus;

	fn addr(last: u8) -> Address {
		let mut bytes = vec![0u8; 20];
		bytes[19] = last;
		Address(bytes)
	}

	/// Scripted chain state: answers allowance/balance reads and records
	/// every submitted transaction.
	struct MockChain {
		erc20_allowance: Mutex<U256>,
		balance: U256,
		delegation_amount: Mutex<U160>,
		delegation_expiration: U48,
		executed: Mutex<Vec<Vec<u8>>>,
		fail_delegation_approve: Mutex<bool>,
	}

	impl MockChain {
		fn new(erc20_allowance: U256, balance: U256, delegation_amount: U160) -> Self {
			Self {
				erc20_allowance: Mutex::new(erc20_allowance),
				balance,
				delegation_amount: Mutex::new(delegation_amount),
				delegation_expiration: U48::from(2_000_000_000u64),
				executed: Mutex::new(Vec::new()),
				fail_delegation_approve: Mutex::new(false),
			}
		}

		fn executed_count(&self) -> usize {
			self.executed.lock().unwrap().len()
		}
	}

	#[async_trait]
	impl ApprovalExecutor for MockChain {
		async fn read(&self, tx: &Transaction) -> Result<Vec<u8>, DeliveryError> {
			let selector = &tx.data[..4];
			if selector == IERC20::allowanceCall::SELECTOR.as_slice() {
				return Ok(self.erc20_allowance.lock().unwrap().abi_encode());
			}
			if selector == IERC20::balanceOfCall::SELECTOR.as_slice() {
				return Ok(self.balance.abi_encode());
			}
			if selector == IAllowanceTransfer::allowanceCall::SELECTOR.as_slice() {
				let triple = (
					*self.delegation_amount.lock().unwrap(),
					self.delegation_expiration,
					U48::from(0u64),
				);
				return Ok(triple.abi_encode_params());
			}
			panic!("unexpected read selector");
		}

		async fn execute(&self, tx: Transaction) -> Result<TransactionRecord, DeliveryError> {
			let selector: [u8; 4] = tx.data[..4].try_into().unwrap();
			if selector == IAllowanceTransfer::approveCall::SELECTOR
				&& *self.fail_delegation_approve.lock().unwrap()
			{
				return Err(DeliveryError::Network("delegation approve failed".into()));
			}

			self.executed.lock().unwrap().push(tx.data.clone());

			// Mirror the state transition the transaction would cause.
			if selector == IERC20::approveCall::SELECTOR {
				*self.erc20_allowance.lock().unwrap() = U256::MAX;
			} else if selector == IAllowanceTransfer::approveCall::SELECTOR {
				*self.delegation_amount.lock().unwrap() = U160::MAX;
			}

			Ok(TransactionRecord {
				hash: TransactionHash(vec![self.executed_count() as u8; 32]),
				status: TxStatus::Confirmed,
				block_number: Some(100),
				gas_used: Some(50_000),
				logs: vec![],
			})
		}
	}

	fn config() -> ApprovalConfig {
		ApprovalConfig {
			chain_id: 31337,
			permit2: addr(0xf2),
			router: addr(0xe0),
			gas_limit: 120_000,
			delegation_expiry_secs: 30 * 24 * 3600,
		}
	}

	const NOW: u64 = 1_700_000_000;

	#[tokio::test]
	async fn sufficient_allowances_submit_nothing() {
		let chain = MockChain::new(U256::MAX, U256::MAX, U160::MAX);
		let orchestrator = ApprovalOrchestrator::new(chain, config());

		let run = orchestrator
			.ensure(&addr(1), &addr(2), U256::from(1_000u64), NOW)
			.await
			.unwrap();

		assert_eq!(run.erc20, ApprovalState::Sufficient);
		assert_eq!(run.delegation, ApprovalState::Sufficient);
		assert!(run.submitted.is_empty());
		assert_eq!(orchestrator.executor.executed_count(), 0);
	}

	#[tokio::test]
	async fn missing_allowances_submit_both_steps() {
		let chain = MockChain::new(U256::ZERO, U256::MAX, U160::ZERO);
		let orchestrator = ApprovalOrchestrator::new(chain, config());

		let run = orchestrator
			.ensure(&addr(1), &addr(2), U256::from(1_000u64), NOW)
			.await
			.unwrap();

		assert_eq!(run.submitted.len(), 2);
		assert_eq!(orchestrator.executor.executed_count(), 2);
	}

	#[tokio::test]
	async fn native_input_skips_everything() {
		let chain = MockChain::new(U256::ZERO, U256::ZERO, U160::ZERO);
		let orchestrator = ApprovalOrchestrator::new(chain, config());

		let run = orchestrator
			.ensure(&addr(1), &Address::zero(), U256::from(1_000u64), NOW)
			.await
			.unwrap();

		assert!(run.skipped_native);
		assert!(run.submitted.is_empty());
	}

	#[tokio::test]
	async fn insufficient_balance_is_fatal() {
		let chain = MockChain::new(U256::ZERO, U256::from(10u64), U160::ZERO);
		let orchestrator = ApprovalOrchestrator::new(chain, config());

		let err = orchestrator
			.ensure(&addr(1), &addr(2), U256::from(1_000u64), NOW)
			.await
			.unwrap_err();

		assert!(matches!(err, ApprovalError::InsufficientBalance { .. }));
		assert!(!err.is_transient());
		assert_eq!(orchestrator.executor.executed_count(), 0);
	}

	#[tokio::test]
	async fn delegation_failure_does_not_redo_erc20_step() {
		let chain = MockChain::new(U256::ZERO, U256::MAX, U160::ZERO);
		*chain.fail_delegation_approve.lock().unwrap() = true;
		let orchestrator = ApprovalOrchestrator::new(chain, config());

		let mut run = ApprovalRun::new();
		let err = orchestrator
			.ensure_with(&mut run, &addr(1), &addr(2), U256::from(1_000u64), NOW)
			.await
			.unwrap_err();
		assert!(err.is_transient());
		// ERC-20 approve went through and is recorded as done.
		assert_eq!(run.erc20, ApprovalState::Sufficient);
		assert_eq!(run.delegation, ApprovalState::Insufficient);
		assert_eq!(orchestrator.executor.executed_count(), 1);

		// Resume: only the delegation step runs.
		*orchestrator.executor.fail_delegation_approve.lock().unwrap() = false;
		orchestrator
			.ensure_with(&mut run, &addr(1), &addr(2), U256::from(1_000u64), NOW)
			.await
			.unwrap();
		assert_eq!(run.delegation, ApprovalState::Sufficient);
		assert_eq!(orchestrator.executor.executed_count(), 2);
	}

	#[tokio::test]
	async fn expired_delegation_triggers_step_four_only() {
		let mut chain = MockChain::new(U256::MAX, U256::MAX, U160::MAX);
		chain.delegation_expiration = U48::from(NOW - 1);
		let orchestrator = ApprovalOrchestrator::new(chain, config());

		let run = orchestrator
			.ensure(&addr(1), &addr(2), U256::from(1_000u64), NOW)
			.await
			.unwrap();

		assert_eq!(run.erc20, ApprovalState::Sufficient);
		assert_eq!(run.submitted.len(), 1);
	}
}
