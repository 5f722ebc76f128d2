//! Configuration types for the swap pipeline.
//!
//! Fractions (risk weights, tier thresholds, the markout health threshold)
//! are written as plain decimals in TOML and converted to wad fixed point at
//! the boundary; addresses stay strings here and are parsed once at pipeline
//! construction.

use serde::{Deserialize, Serialize};

/// Complete pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	pub chain: ChainConfig,
	pub account: AccountConfig,
	pub contracts: ContractsConfig,
	#[serde(default)]
	pub pool: PoolConfig,
	#[serde(default)]
	pub risk: RiskConfig,
	#[serde(default)]
	pub execution: ExecutionConfig,
	#[serde(default)]
	pub markout: MarkoutSection,
	#[serde(default)]
	pub storage: StorageSection,
	#[serde(default)]
	pub api: ApiConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChainConfig {
	/// HTTP RPC endpoint.
	pub rpc_url: String,
	pub chain_id: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
	/// Hex private key; usually `${TIERSWAP_PRIVATE_KEY}` in the file.
	pub private_key: String,
}

/// Addresses of the externally owned contracts the pipeline talks to.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContractsConfig {
	/// Pool manager (pool state, initialize entry point).
	pub pool_manager: String,
	/// State-view lens for pool reads.
	pub state_view: String,
	/// Router accepting the encoded action bundle.
	pub router: String,
	/// Allowance-delegation contract.
	pub permit2: String,
	/// Dynamic-fee hook; emits the swap record and runs the markout check.
	pub hook: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolConfig {
	/// Pool fee field. Dynamic-fee pools use the flag value.
	#[serde(default = "default_pool_fee")]
	pub fee: u32,
	#[serde(default = "default_tick_spacing")]
	pub tick_spacing: i32,
}

fn default_pool_fee() -> u32 {
	// Dynamic-fee flag: the hook decides the fee per swap.
	0x800000
}

fn default_tick_spacing() -> i32 {
	60
}

impl Default for PoolConfig {
	fn default() -> Self {
		Self {
			fee: default_pool_fee(),
			tick_spacing: default_tick_spacing(),
		}
	}
}

/// Risk-curve parameters, all fractions except `k` (token units).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RiskConfig {
	/// Price-impact curve parameter in whole token units.
	#[serde(default = "default_k")]
	pub k: f64,
	#[serde(default = "default_weight_impact")]
	pub weight_impact: f64,
	#[serde(default = "default_weight_stress")]
	pub weight_stress: f64,
	#[serde(default = "default_partner_max")]
	pub partner_max: f64,
	#[serde(default = "default_retail_max")]
	pub retail_max: f64,
	#[serde(default = "default_elevated_max")]
	pub elevated_max: f64,
	/// Whether this agent holds a partner bond. Supplied externally; the
	/// hook checks the real bond on-chain.
	#[serde(default)]
	pub bonded: bool,
}

fn default_k() -> f64 {
	100.0
}
fn default_weight_impact() -> f64 {
	0.6
}
fn default_weight_stress() -> f64 {
	0.4
}
fn default_partner_max() -> f64 {
	0.1
}
fn default_retail_max() -> f64 {
	0.3
}
fn default_elevated_max() -> f64 {
	0.7
}

impl Default for RiskConfig {
	fn default() -> Self {
		Self {
			k: default_k(),
			weight_impact: default_weight_impact(),
			weight_stress: default_weight_stress(),
			partner_max: default_partner_max(),
			retail_max: default_retail_max(),
			elevated_max: default_elevated_max(),
			bonded: false,
		}
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutionConfig {
	/// Deadline window for built plans.
	#[serde(default = "default_deadline_secs")]
	pub deadline_secs: u64,
	/// Gas limit for the swap transaction.
	#[serde(default = "default_swap_gas_limit")]
	pub gas_limit: u64,
	/// Gas limit for approval transactions.
	#[serde(default = "default_approval_gas_limit")]
	pub approval_gas_limit: u64,
	/// Receipt poll interval.
	#[serde(default = "default_poll_interval_secs")]
	pub poll_interval_secs: u64,
	/// Receipt budget before a submission is declared unresolved.
	#[serde(default = "default_confirmation_timeout_secs")]
	pub confirmation_timeout_secs: u64,
	/// Tolerance on the combined-risk reconciliation, as a fraction.
	#[serde(default = "default_risk_epsilon")]
	pub risk_epsilon: f64,
	/// Lifetime of the bounded delegation grant.
	#[serde(default = "default_delegation_expiry_secs")]
	pub delegation_expiry_secs: u64,
}

fn default_deadline_secs() -> u64 {
	3600
}
fn default_swap_gas_limit() -> u64 {
	1_500_000
}
fn default_approval_gas_limit() -> u64 {
	120_000
}
fn default_poll_interval_secs() -> u64 {
	1
}
fn default_confirmation_timeout_secs() -> u64 {
	180
}
fn default_risk_epsilon() -> f64 {
	0.05
}
fn default_delegation_expiry_secs() -> u64 {
	30 * 24 * 3600
}

impl Default for ExecutionConfig {
	fn default() -> Self {
		Self {
			deadline_secs: default_deadline_secs(),
			gas_limit: default_swap_gas_limit(),
			approval_gas_limit: default_approval_gas_limit(),
			poll_interval_secs: default_poll_interval_secs(),
			confirmation_timeout_secs: default_confirmation_timeout_secs(),
			risk_epsilon: default_risk_epsilon(),
			delegation_expiry_secs: default_delegation_expiry_secs(),
		}
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MarkoutSection {
	/// Blocks that must elapse after the swap before checking.
	#[serde(default = "default_confirmation_depth")]
	pub confirmation_depth: u64,
	/// Health threshold on rho as a (signed) fraction.
	#[serde(default = "default_health_threshold")]
	pub health_threshold: f64,
	/// Gas limit for the markout call.
	#[serde(default = "default_markout_gas_limit")]
	pub gas_limit: u64,
}

fn default_confirmation_depth() -> u64 {
	10
}
fn default_health_threshold() -> f64 {
	0.2
}
fn default_markout_gas_limit() -> u64 {
	300_000
}

impl Default for MarkoutSection {
	fn default() -> Self {
		Self {
			confirmation_depth: default_confirmation_depth(),
			health_threshold: default_health_threshold(),
			gas_limit: default_markout_gas_limit(),
		}
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageSection {
	#[serde(default = "default_storage_path")]
	pub path: String,
}

fn default_storage_path() -> String {
	"./data/tierswap".to_string()
}

impl Default for StorageSection {
	fn default() -> Self {
		Self {
			path: default_storage_path(),
		}
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	#[serde(default = "default_http_port")]
	pub http_port: u16,
}

fn default_http_port() -> u16 {
	8080
}

impl Default for ApiConfig {
	fn default() -> Self {
		Self {
			http_port: default_http_port(),
		}
	}
}

/// Converts a configured fraction to wad fixed point.
pub fn wad_from_fraction(fraction: f64) -> u128 {
	(fraction * 1e18) as u128
}

/// Converts a configured signed fraction to wad fixed point.
pub fn wad_from_signed_fraction(fraction: f64) -> i128 {
	(fraction * 1e18) as i128
}
