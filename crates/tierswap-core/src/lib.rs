//! The swap pipeline engine.
//!
//! One `execute` call runs the strictly sequential stage chain for a single
//! intent: pool read → risk score → tier prediction → plan build → approvals
//! → simulate/submit/confirm → receipt reconciliation → report. The deferred
//! markout check is scheduled as its own task; it is block-height gated and
//! must not hold the swap path open.
//!
//! Multiple pipelines may run concurrently, but they share one signer here,
//! so submissions serialize inside the delivery service.

use alloy_primitives::U256;
use std::sync::Arc;
use thiserror::Error;
use tierswap_account::{implementations::local::LocalWallet, AccountService};
use tierswap_approval::{ApprovalConfig, ApprovalError, ApprovalOrchestrator};
use tierswap_config::{wad_from_fraction, wad_from_signed_fraction, Config};
use tierswap_delivery::{
	implementations::evm::alloy::AlloyDelivery, DeliveryError, DeliveryService, ExecutionBudget,
};
use tierswap_order::{ActionPlanBuilder, OrderError, PoolSettings};
use tierswap_risk::{FeeTierResolver, RiskError, RiskParams, RiskScorer, TierThresholds};
use tierswap_settlement::{
	EventVerifier, MarkoutConfig, MarkoutVerifier, SettlementError,
};
use tierswap_storage::{
	implementations::file::FileStorage, StorageError, StorageService,
};
use tierswap_types::{
	Address, ApprovalEvent, DeliveryEvent, EventBus, FeeTier, MarkoutEvent, MarkoutVerification,
	PipelineEvent, RiskEvent, SwapIntent, SwapReport, Transaction, VerificationEvent,
	VerificationOutcome, FEE_DENOMINATOR,
};
use tracing::{error, info, warn};
use uuid::Uuid;

mod pool;

pub use pool::PoolReader;

/// Poll cadence for the deferred markout task, roughly one block.
const MARKOUT_POLL_SECS: u64 = 12;

/// Errors surfaced by the pipeline, one variant per stage so the failing
/// stage is visible without parsing messages.
#[derive(Debug, Error)]
pub enum PipelineError {
	#[error("Risk stage: {0}")]
	Risk(#[from] RiskError),
	#[error("Plan stage: {0}")]
	Order(#[from] OrderError),
	#[error("Approval stage: {0}")]
	Approval(#[from] ApprovalError),
	#[error("Execution stage: {0}")]
	Delivery(#[from] DeliveryError),
	#[error("Verification stage: {0}")]
	Settlement(#[from] SettlementError),
	#[error("Storage: {0}")]
	Storage(#[from] StorageError),
	#[error("Pool read: {0}")]
	PoolRead(String),
	#[error("Configuration: {0}")]
	Config(String),
}

impl PipelineError {
	/// Whether the caller may rebuild and retry. Fatal errors (bad intent,
	/// reverts, invariant violations) stay fatal.
	pub fn is_transient(&self) -> bool {
		match self {
			PipelineError::Approval(e) => e.is_transient(),
			PipelineError::Delivery(e) => e.is_transient(),
			PipelineError::Settlement(e) => e.is_transient(),
			_ => false,
		}
	}
}

/// The assembled pipeline for one chain, one pool family, one signer.
pub struct SwapPipeline {
	scorer: RiskScorer,
	resolver: FeeTierResolver,
	plan_builder: ActionPlanBuilder,
	approvals: ApprovalOrchestrator<Arc<DeliveryService>>,
	delivery: Arc<DeliveryService>,
	pool_reader: PoolReader,
	event_verifier: EventVerifier,
	markout: Arc<MarkoutVerifier<Arc<DeliveryService>>>,
	storage: Arc<StorageService>,
	event_bus: EventBus,
	router: Address,
	pool_manager: Address,
	chain_id: u64,
	swap_gas_limit: u64,
	bonded: bool,
}

impl SwapPipeline {
	/// Runs the full sequential pipeline for one intent and returns the
	/// upward-facing report. Pure-computation failures surface before any
	/// network call; network stages carry their stage name in the error.
	pub async fn execute(&self, intent: SwapIntent) -> Result<SwapReport, PipelineError> {
		let attempt_id = Uuid::new_v4().to_string();
		info!(
			attempt_id = %attempt_id,
			amount_in = %intent.amount_in,
			token_in = %intent.token_in,
			token_out = %intent.token_out,
			"Starting swap attempt"
		);

		// Everything checkable offline fails here, before the first RPC.
		self.plan_builder.validate_intent(&intent)?;

		let pool_key = self.plan_builder.pool_key(&intent);
		let pool_state = self.pool_reader.read(&pool_key).await?;

		let metrics = self
			.scorer
			.score(intent.amount_in, U256::from(pool_state.liquidity))?;
		let tier_expected = self.resolver.resolve(metrics.combined_risk, self.bonded)?;
		info!(
			attempt_id = %attempt_id,
			combined_risk = %metrics.combined_risk,
			tier = %tier_expected,
			"Risk scored"
		);
		self.publish(PipelineEvent::Risk(RiskEvent::Scored {
			attempt_id: attempt_id.clone(),
			metrics: metrics.clone(),
			tier_expected,
		}));

		let now = unix_now();
		let plan = self.plan_builder.build(&intent, &pool_state, now)?;

		let owner = self.delivery.sender().await?;
		let run = self
			.approvals
			.ensure(&owner, &intent.token_in, intent.amount_in, now)
			.await?;
		if run.submitted.is_empty() {
			self.publish(PipelineEvent::Approval(ApprovalEvent::AlreadySufficient {
				attempt_id: attempt_id.clone(),
				step: "all".to_string(),
			}));
		} else {
			for hash in &run.submitted {
				self.publish(PipelineEvent::Approval(ApprovalEvent::ApprovalSubmitted {
					attempt_id: attempt_id.clone(),
					step: "approval".to_string(),
					tx_hash: hash.clone(),
				}));
			}
		}
		self.publish(PipelineEvent::Approval(ApprovalEvent::Completed {
			attempt_id: attempt_id.clone(),
		}));

		let tx = Transaction {
			to: self.router.clone(),
			data: plan.command.clone(),
			value: plan.value,
			chain_id: self.chain_id,
			nonce: None,
			gas_limit: self.swap_gas_limit,
			max_fee_per_gas: None,
			max_priority_fee_per_gas: None,
		};

		let record = match self.delivery.execute(tx).await {
			Ok(record) => record,
			Err(e) => {
				self.publish(PipelineEvent::Delivery(DeliveryEvent::TransactionFailed {
					attempt_id: attempt_id.clone(),
					error: e.to_string(),
				}));
				return Err(e.into());
			}
		};
		let block_number = record.block_number.unwrap_or(0);
		self.publish(PipelineEvent::Delivery(DeliveryEvent::TransactionConfirmed {
			attempt_id: attempt_id.clone(),
			tx_hash: record.hash.clone(),
			block_number,
		}));

		let verification =
			self.event_verifier
				.verify(&record, tier_expected, metrics.combined_risk);
		self.publish(PipelineEvent::Verification(VerificationEvent::Reconciled {
			attempt_id: attempt_id.clone(),
			outcome: verification.clone(),
		}));

		let (tier_actual, fee_bps_actual, swap_id) = match &verification {
			VerificationOutcome::Verified { record } | VerificationOutcome::Anomaly { record, .. } => (
				FeeTier::from_fee_bps(record.fee_bps_actual),
				Some(record.fee_bps_actual),
				Some(record.swap_id),
			),
			VerificationOutcome::EventNotFound => (None, None, None),
		};

		// The emitted fee wins when present; the prediction fills in when
		// the event was missing.
		let fee_bps = fee_bps_actual.unwrap_or_else(|| tier_expected.fee_bps());
		let fee_amount = intent.amount_in * U256::from(fee_bps) / U256::from(FEE_DENOMINATOR);
		let net_amount = intent.amount_in - fee_amount;

		let report = SwapReport {
			attempt_id: attempt_id.clone(),
			risk_metrics: metrics,
			tier_expected,
			tier_actual,
			fee_amount,
			net_amount,
			tx_hash: record.hash.clone(),
			block_number,
			swap_id,
			verification,
		};

		self.storage.store("reports", &attempt_id, &report).await?;

		if let Some(swap_id) = swap_id {
			// Index the inclusion block by swap id so deferred checks can be
			// replayed without the original report.
			self.storage
				.store("swaps", &hex::encode(swap_id), &block_number)
				.await?;
			self.schedule_markout(swap_id, block_number);
		} else {
			warn!(attempt_id = %attempt_id, "No swap id; markout check not scheduled");
		}

		info!(
			attempt_id = %attempt_id,
			tx_hash = %report.tx_hash,
			block_number,
			"Swap attempt finished"
		);
		Ok(report)
	}

	/// Spawns the deferred markout task for a confirmed swap. The task
	/// sleeps on block height, then drives the verifier once; the verifier's
	/// own gating and idempotence make late or duplicate wakeups harmless.
	pub fn schedule_markout(&self, swap_id: [u8; 32], swap_block: u64) {
		let markout = self.markout.clone();
		let delivery = self.delivery.clone();
		let event_bus = self.event_bus.clone();
		let earliest = markout.earliest_check_block(swap_block);

		self.publish(PipelineEvent::Markout(MarkoutEvent::Scheduled {
			swap_id,
			earliest_block: earliest,
		}));

		tokio::spawn(async move {
			loop {
				match delivery.block_number().await {
					Ok(block) if block >= earliest => break,
					Ok(_) => {}
					Err(e) => {
						warn!("Markout block poll failed: {}", e);
					}
				}
				tokio::time::sleep(std::time::Duration::from_secs(MARKOUT_POLL_SECS)).await;
			}

			match markout.check(swap_id, swap_block).await {
				Ok(verification) => {
					event_bus
						.publish(PipelineEvent::Markout(MarkoutEvent::Checked {
							swap_id,
							decision: verification.decision,
						}))
						.ok();
				}
				Err(e) => {
					error!(
						swap_id = %hex::encode(swap_id),
						"Markout check failed: {}",
						e
					);
				}
			}
		});
	}

	/// Manually runs (or replays) the markout check for a recorded swap.
	pub async fn markout_check(
		&self,
		swap_id: [u8; 32],
		swap_block: u64,
	) -> Result<MarkoutVerification, PipelineError> {
		Ok(self.markout.check(swap_id, swap_block).await?)
	}

	/// Initializes the pool for a token pair if it does not exist yet.
	///
	/// The simulation outcome is inspected structurally: an
	/// `AlreadyInitialized` revert means the pool exists and is success,
	/// not an error to string-match around. Returns true when this call
	/// created the pool.
	pub async fn initialize_pool(
		&self,
		token_a: &Address,
		token_b: &Address,
		sqrt_price_x96: U256,
	) -> Result<bool, PipelineError> {
		let key = self.plan_builder.pool_key_for_pair(token_a, token_b);
		let data = tierswap_order::actions::encode_initialize(&key, sqrt_price_x96)?;
		let tx = Transaction {
			to: self.pool_manager.clone(),
			data,
			value: U256::ZERO,
			chain_id: self.chain_id,
			nonce: None,
			gas_limit: self.swap_gas_limit,
			max_fee_per_gas: None,
			max_priority_fee_per_gas: None,
		};

		match self.delivery.execute(tx).await {
			Ok(record) => {
				info!(tx_hash = %record.hash, "Pool initialized");
				Ok(true)
			}
			Err(DeliveryError::SimulationReverted { reason }) if reason.is_benign() => {
				info!("Pool already initialized, nothing to do");
				Ok(false)
			}
			Err(e) => Err(e.into()),
		}
	}

	/// Markout check by swap id alone, using the recorded inclusion block.
	pub async fn markout_status(
		&self,
		swap_id: [u8; 32],
	) -> Result<MarkoutVerification, PipelineError> {
		let swap_block: u64 = self
			.storage
			.retrieve("swaps", &hex::encode(swap_id))
			.await?;
		self.markout_check(swap_id, swap_block).await
	}

	pub fn event_bus(&self) -> &EventBus {
		&self.event_bus
	}

	pub fn storage(&self) -> &Arc<StorageService> {
		&self.storage
	}

	fn publish(&self, event: PipelineEvent) {
		self.event_bus.publish(event).ok();
	}
}

fn unix_now() -> u64 {
	std::time::SystemTime::now()
		.duration_since(std::time::UNIX_EPOCH)
		.unwrap()
		.as_secs()
}

/// Assembles a pipeline from configuration.
pub struct PipelineBuilder {
	config: Config,
}

impl PipelineBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	pub async fn build(self) -> Result<SwapPipeline, PipelineError> {
		let config = self.config;

		let parse_addr = |name: &str, s: &str| {
			Address::from_hex(s)
				.map_err(|e| PipelineError::Config(format!("contracts.{}: {}", name, e)))
		};
		let router = parse_addr("router", &config.contracts.router)?;
		let permit2 = parse_addr("permit2", &config.contracts.permit2)?;
		let hook = parse_addr("hook", &config.contracts.hook)?;
		let state_view = parse_addr("state_view", &config.contracts.state_view)?;
		let pool_manager = parse_addr("pool_manager", &config.contracts.pool_manager)?;

		let wallet = LocalWallet::new(&config.account.private_key)
			.map_err(|e| PipelineError::Config(format!("account: {}", e)))?;
		let signer = wallet.signer();
		let account = Arc::new(AccountService::new(Box::new(wallet)));

		let implementation =
			AlloyDelivery::new(&config.chain.rpc_url, config.chain.chain_id, signer).await?;
		let delivery = Arc::new(DeliveryService::new(
			Box::new(implementation),
			account,
			ExecutionBudget {
				poll_interval: std::time::Duration::from_secs(
					config.execution.poll_interval_secs,
				),
				confirmation_timeout: std::time::Duration::from_secs(
					config.execution.confirmation_timeout_secs,
				),
			},
		));

		let scorer = RiskScorer::new(
			RiskParams::new(
				U256::from(wad_from_fraction(config.risk.k)),
				U256::from(wad_from_fraction(config.risk.weight_impact)),
				U256::from(wad_from_fraction(config.risk.weight_stress)),
			)?,
		);
		let resolver = FeeTierResolver::new(TierThresholds {
			partner_max: U256::from(wad_from_fraction(config.risk.partner_max)),
			retail_max: U256::from(wad_from_fraction(config.risk.retail_max)),
			elevated_max: U256::from(wad_from_fraction(config.risk.elevated_max)),
		})?;

		let plan_builder = ActionPlanBuilder::new(
			PoolSettings {
				fee: config.pool.fee,
				tick_spacing: config.pool.tick_spacing,
				hooks: hook.clone(),
			},
			config.execution.deadline_secs,
		);

		let approvals = ApprovalOrchestrator::new(
			delivery.clone(),
			ApprovalConfig {
				chain_id: config.chain.chain_id,
				permit2,
				router: router.clone(),
				gas_limit: config.execution.approval_gas_limit,
				delegation_expiry_secs: config.execution.delegation_expiry_secs,
			},
		);

		let storage = Arc::new(StorageService::new(Box::new(FileStorage::new(
			config.storage.path.clone().into(),
		))));

		let event_verifier = EventVerifier::new(
			hook.clone(),
			U256::from(wad_from_fraction(config.execution.risk_epsilon)),
		);

		let markout = Arc::new(MarkoutVerifier::new(
			delivery.clone(),
			storage.clone(),
			MarkoutConfig {
				chain_id: config.chain.chain_id,
				hook: hook.clone(),
				gas_limit: config.markout.gas_limit,
				confirmation_depth: config.markout.confirmation_depth,
				health_threshold: wad_from_signed_fraction(config.markout.health_threshold),
			},
		));

		let pool_reader = PoolReader::new(
			delivery.clone(),
			state_view,
			hook,
			config.chain.chain_id,
		);

		Ok(SwapPipeline {
			scorer,
			resolver,
			plan_builder,
			approvals,
			delivery,
			pool_reader,
			event_verifier,
			markout,
			storage,
			event_bus: EventBus::new(1000),
			router,
			pool_manager,
			chain_id: config.chain.chain_id,
			swap_gas_limit: config.execution.gas_limit,
			bonded: config.risk.bonded,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::aliases::{I24, U160, U24, U48};
	use alloy_primitives::B256;
	use alloy_sol_types::{SolCall, SolEvent, SolValue};
	use async_trait::async_trait;
	use std::sync::atomic::{AtomicU64, Ordering};
	use std::sync::Arc;
	use tierswap_delivery::{DeliveryInterface, RevertReason};
	use tierswap_order::PoolSettings;
	use tierswap_settlement::events::SwapRecorded;
	use tierswap_storage::implementations::memory::MemoryStorage;
	use tierswap_types::{
		LogEntry, Signature, TransactionHash, TransactionRecord, TxStatus,
	};

	fn addr(last: u8) -> Address {
		let mut bytes = vec![0u8; 20];
		bytes[19] = last;
		Address(bytes)
	}

	fn state_view() -> Address {
		addr(0xa2)
	}
	fn router() -> Address {
		addr(0xa3)
	}
	fn permit2() -> Address {
		addr(0xa4)
	}
	fn hook() -> Address {
		addr(0xa5)
	}
	fn token_in() -> Address {
		addr(0x01)
	}
	fn token_out() -> Address {
		addr(0x02)
	}

	const CHAIN_ID: u64 = 31337;
	const SWAP_BLOCK: u64 = 1234;
	const TEST_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

	/// Scripted chain: answers every read the pipeline makes and returns a
	/// receipt carrying the hook's swap record.
	struct MockNetwork {
		/// Shared so tests keep a handle after the mock moves into the
		/// delivery service.
		submits: Arc<AtomicU64>,
		/// When set, the swap simulation reverts with this reason.
		fail_simulation: Option<RevertReason>,
		/// Risk the "hook" reports in the emitted record, wad.
		emitted_risk: U256,
		emitted_fee_bps: u32,
	}

	impl MockNetwork {
		fn healthy() -> Self {
			Self {
				submits: Arc::new(AtomicU64::new(0)),
				fail_simulation: None,
				// Matches the local prediction for the scenario amount.
				emitted_risk: U256::from(400_000_000_000_000_000u64),
				emitted_fee_bps: 6000,
			}
		}

		fn swap_log(&self) -> LogEntry {
			let ev = SwapRecorded {
				swapId: B256::from([0x11; 32]),
				poolId: B256::from([0x22; 32]),
				sender: addr(0x33).to_alloy(),
				agentId: U256::from(7u64),
				sqrtPriceBefore: U160::from(1u64) << 96,
				sqrtPriceAfter: (U160::from(1u64) << 96) + U160::from(1u64),
				feeBps: U24::from(self.emitted_fee_bps),
				combinedRisk: self.emitted_risk,
			};
			LogEntry {
				address: hook(),
				topics: ev.encode_topics().iter().map(|t| t.0 .0).collect(),
				data: ev.encode_data(),
			}
		}
	}

	#[async_trait]
	impl DeliveryInterface for MockNetwork {
		async fn call(&self, tx: &Transaction) -> Result<Vec<u8>, DeliveryError> {
			let selector = &tx.data[..4];

			if tx.to == state_view() {
				if selector == crate::pool::IStateView::getSlot0Call::SELECTOR.as_slice() {
					return Ok((
						U160::from(1u64) << 96,
						I24::ZERO,
						U24::ZERO,
						U24::ZERO,
					)
						.abi_encode_params());
				}
				if selector == crate::pool::IStateView::getLiquidityCall::SELECTOR.as_slice() {
					return Ok(1_000_994_340_808_720u128.abi_encode());
				}
			}

			if tx.to == token_in() {
				// ERC-20 allowance and balance both maxed: the approval
				// stage must submit nothing.
				return Ok(U256::MAX.abi_encode());
			}

			if tx.to == permit2() {
				return Ok((U160::MAX, U48::MAX, U48::from(0u64)).abi_encode_params());
			}

			if tx.to == router() {
				return match &self.fail_simulation {
					Some(reason) => Err(DeliveryError::SimulationReverted {
						reason: reason.clone(),
					}),
					None => Ok(Vec::new()),
				};
			}

			panic!("unexpected call target {}", tx.to);
		}

		async fn submit(
			&self,
			_tx: Transaction,
			_signature: &Signature,
		) -> Result<TransactionHash, DeliveryError> {
			self.submits.fetch_add(1, Ordering::SeqCst);
			Ok(TransactionHash(vec![0xab; 32]))
		}

		async fn wait_for_receipt(
			&self,
			hash: &TransactionHash,
			_poll_interval: std::time::Duration,
			_timeout: std::time::Duration,
		) -> Result<TransactionRecord, DeliveryError> {
			Ok(TransactionRecord {
				hash: hash.clone(),
				status: TxStatus::Confirmed,
				block_number: Some(SWAP_BLOCK),
				gas_used: Some(400_000),
				logs: vec![self.swap_log()],
			})
		}

		async fn get_receipt(
			&self,
			_hash: &TransactionHash,
		) -> Result<Option<TransactionRecord>, DeliveryError> {
			Ok(None)
		}

		async fn block_number(&self) -> Result<u64, DeliveryError> {
			Ok(SWAP_BLOCK)
		}
	}

	fn pipeline_over(network: MockNetwork) -> SwapPipeline {
		let wallet = LocalWallet::new(TEST_KEY).unwrap();
		let account = Arc::new(AccountService::new(Box::new(wallet)));
		let delivery = Arc::new(DeliveryService::new(
			Box::new(network),
			account,
			ExecutionBudget::default(),
		));
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));

		let plan_builder = ActionPlanBuilder::new(
			PoolSettings {
				fee: 0x800000,
				tick_spacing: 60,
				hooks: hook(),
			},
			3600,
		);

		SwapPipeline {
			scorer: RiskScorer::new(RiskParams::default()),
			resolver: FeeTierResolver::new(TierThresholds::default()).unwrap(),
			plan_builder,
			approvals: ApprovalOrchestrator::new(
				delivery.clone(),
				ApprovalConfig {
					chain_id: CHAIN_ID,
					permit2: permit2(),
					router: router(),
					gas_limit: 120_000,
					delegation_expiry_secs: 30 * 24 * 3600,
				},
			),
			delivery: delivery.clone(),
			pool_reader: PoolReader::new(delivery.clone(), state_view(), hook(), CHAIN_ID),
			event_verifier: EventVerifier::new(
				hook(),
				U256::from(50_000_000_000_000_000u64),
			),
			markout: Arc::new(MarkoutVerifier::new(
				delivery.clone(),
				storage.clone(),
				MarkoutConfig {
					chain_id: CHAIN_ID,
					hook: hook(),
					gas_limit: 300_000,
					confirmation_depth: 10,
					health_threshold: 200_000_000_000_000_000,
				},
			)),
			storage,
			event_bus: EventBus::new(100),
			router: router(),
			pool_manager: addr(0xa1),
			chain_id: CHAIN_ID,
			swap_gas_limit: 1_500_000,
			bonded: false,
		}
	}

	fn intent() -> SwapIntent {
		SwapIntent {
			amount_in: U256::from(10u64).pow(U256::from(15u32)),
			token_in: token_in(),
			token_out: token_out(),
			agent_id: U256::from(7u64),
			proof: vec![0xaa],
			slippage_bps: 50,
			deadline_secs: 0,
		}
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn full_pipeline_produces_verified_report() {
		let pipeline = pipeline_over(MockNetwork::healthy());
		let report = pipeline.execute(intent()).await.unwrap();

		assert_eq!(report.tier_expected, FeeTier::Elevated);
		assert_eq!(report.tier_actual, Some(FeeTier::Elevated));
		assert!(matches!(
			report.verification,
			VerificationOutcome::Verified { .. }
		));
		assert_eq!(report.block_number, SWAP_BLOCK);
		assert_eq!(report.swap_id, Some([0x11; 32]));

		// 1e15 at 6000 hundredths of a bp.
		assert_eq!(report.fee_amount, U256::from(6_000_000_000_000u64));
		assert_eq!(
			report.net_amount,
			U256::from(10u64).pow(U256::from(15u32)) - report.fee_amount
		);

		// Report and swap index were persisted.
		let stored: SwapReport = pipeline
			.storage
			.retrieve("reports", &report.attempt_id)
			.await
			.unwrap();
		assert_eq!(stored.attempt_id, report.attempt_id);
		let indexed: u64 = pipeline
			.storage
			.retrieve("swaps", &hex::encode([0x11u8; 32]))
			.await
			.unwrap();
		assert_eq!(indexed, SWAP_BLOCK);
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn sufficient_allowances_mean_exactly_one_submission() {
		let network = MockNetwork::healthy();
		let submits = network.submits.clone();
		let pipeline = pipeline_over(network);

		pipeline.execute(intent()).await.unwrap();

		// Only the swap itself was submitted; approvals stayed silent.
		assert_eq!(submits.load(Ordering::SeqCst), 1);
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn fee_mismatch_surfaces_as_anomaly_not_failure() {
		let mut network = MockNetwork::healthy();
		network.emitted_fee_bps = 15000;
		let pipeline = pipeline_over(network);

		let report = pipeline.execute(intent()).await.unwrap();
		assert!(matches!(
			report.verification,
			VerificationOutcome::Anomaly { .. }
		));
		assert_eq!(report.tier_actual, Some(FeeTier::Toxic));
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn expired_deadline_classifies_as_transient() {
		let mut network = MockNetwork::healthy();
		network.fail_simulation = Some(RevertReason::DeadlinePassed);
		let pipeline = pipeline_over(network);

		let err = pipeline.execute(intent()).await.unwrap_err();
		assert!(err.is_transient());
		assert!(matches!(
			err,
			PipelineError::Delivery(DeliveryError::SimulationReverted { .. })
		));
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn unknown_revert_is_fatal() {
		let mut network = MockNetwork::healthy();
		network.fail_simulation = Some(RevertReason::Message("pool paused".to_string()));
		let pipeline = pipeline_over(network);

		let err = pipeline.execute(intent()).await.unwrap_err();
		assert!(!err.is_transient());
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn zero_amount_fails_before_any_network_call() {
		let pipeline = pipeline_over(MockNetwork::healthy());
		let mut bad = intent();
		bad.amount_in = U256::ZERO;

		let err = pipeline.execute(bad).await.unwrap_err();
		assert!(matches!(err, PipelineError::Order(_)));
		assert!(!err.is_transient());
	}
}
