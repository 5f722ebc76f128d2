//! Core swap domain types: intents, pool snapshots, risk metrics, fee tiers,
//! action plans, and the on-chain swap record.
//!
//! The locally computed risk metrics and tier are a prediction; the hook
//! recomputes both on-chain and the emitted `SwapRecord` is authoritative.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::{Address, TransactionHash};

/// Fee denominator used by the pool: fees are expressed in hundredths of a
/// basis point (1_000_000 = 100%).
pub const FEE_DENOMINATOR: u64 = 1_000_000;

/// A caller-supplied request to swap `amount_in` of `token_in` for
/// `token_out`, carrying the agent identity the hook prices risk against.
///
/// Immutable once built; validated before any network call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapIntent {
	/// Input amount in the token's smallest unit.
	pub amount_in: U256,
	/// Input token; the zero address denotes the native asset.
	pub token_in: Address,
	/// Output token.
	pub token_out: Address,
	/// Agent identity forwarded to the hook.
	pub agent_id: U256,
	/// Opaque eligibility proof forwarded to the hook; may be empty.
	pub proof: Vec<u8>,
	/// Slippage tolerance in basis points applied to the spot-price quote.
	pub slippage_bps: u16,
	/// Deadline window in seconds from plan-build time.
	pub deadline_secs: u64,
}

/// Identifying key of a pool: the token pair plus fee/spacing/hook settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolKey {
	/// Lower-sorted currency of the pair.
	pub currency0: Address,
	/// Higher-sorted currency of the pair.
	pub currency1: Address,
	/// Pool fee setting; dynamic-fee pools carry the dynamic-fee flag here.
	pub fee: u32,
	pub tick_spacing: i32,
	/// Hook contract attached to the pool.
	pub hooks: Address,
}

/// Read-only snapshot of pool state, fetched fresh per swap.
///
/// Never mutated locally. Staleness is expected and tolerated: it only
/// affects the locally predicted score, not the on-chain outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolState {
	pub liquidity: u128,
	pub sqrt_price_x96: U256,
	pub tick: i32,
	pub fee: u32,
	pub tick_spacing: i32,
	pub hook_address: Address,
}

/// Derived risk metrics, all wad-scaled (1e18 = 1.0). Stateless; recomputed
/// on every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskMetrics {
	/// Fraction of price movement the swap causes, in [0, 1).
	pub price_impact: U256,
	/// Swap size relative to pool liquidity, capped at 1.0.
	pub liquidity_stress: U256,
	/// Weighted blend of impact and stress, in [0, 1).
	pub combined_risk: U256,
}

impl RiskMetrics {
	pub fn zero() -> Self {
		Self {
			price_impact: U256::ZERO,
			liquidity_stress: U256::ZERO,
			combined_risk: U256::ZERO,
		}
	}
}

/// Named fee bracket selected per swap from the combined risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeeTier {
	/// Bonded partners under the partner risk ceiling.
	Partner,
	/// Ordinary flow.
	Retail,
	/// Elevated-risk flow.
	Elevated,
	/// Flow priced as adversarial.
	Toxic,
}

impl FeeTier {
	/// The tier's fee, in hundredths of a basis point.
	pub fn fee_bps(&self) -> u32 {
		match self {
			FeeTier::Partner => 500,
			FeeTier::Retail => 3000,
			FeeTier::Elevated => 6000,
			FeeTier::Toxic => 15000,
		}
	}

	/// Reverse lookup from an on-chain fee value.
	pub fn from_fee_bps(fee_bps: u32) -> Option<Self> {
		match fee_bps {
			500 => Some(FeeTier::Partner),
			3000 => Some(FeeTier::Retail),
			6000 => Some(FeeTier::Elevated),
			15000 => Some(FeeTier::Toxic),
			_ => None,
		}
	}
}

impl std::fmt::Display for FeeTier {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let name = match self {
			FeeTier::Partner => "PARTNER",
			FeeTier::Retail => "RETAIL",
			FeeTier::Elevated => "ELEVATED",
			FeeTier::Toxic => "TOXIC",
		};
		write!(f, "{}", name)
	}
}

/// Allowance state for one (owner, token, spender) triple.
///
/// Only moves forward during a single orchestration run and is never cached
/// across runs; every run starts from `Unknown` and re-queries the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalState {
	Unknown,
	Insufficient,
	Sufficient,
}

/// The kind of a single pool operation inside an action plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
	/// Exact-input single-hop swap through the pool.
	SwapExactInSingle,
	/// Settle the accrued debt in the input currency.
	SettleAll,
	/// Collect the accrued credit in the output currency.
	TakeAll,
}

/// One encoded pool operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
	pub kind: ActionKind,
	/// ABI-encoded action parameters.
	pub params: Vec<u8>,
}

/// Ordered, encoded sequence of pool operations submitted as one atomic
/// router transaction. Immutable once built; one plan per swap attempt.
///
/// Order is load-bearing: the settle action must precede the take action to
/// match the pool's debt-before-credit accounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionPlan {
	pub actions: Vec<Action>,
	/// Full router calldata wrapping the actions.
	pub command: Vec<u8>,
	/// Native value to attach (non-zero only for native-asset input).
	pub value: U256,
	/// Absolute unix deadline baked into the router call.
	pub deadline: u64,
	/// Minimum acceptable output after slippage.
	pub amount_out_minimum: U256,
}

/// The authoritative swap record decoded from the hook's receipt log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRecord {
	pub swap_id: [u8; 32],
	pub pool_id: [u8; 32],
	pub sender: Address,
	pub agent_id: U256,
	pub sqrt_price_before: U256,
	pub sqrt_price_after: U256,
	/// Fee the hook actually charged, in hundredths of a basis point.
	pub fee_bps_actual: u32,
	/// Combined risk the hook actually computed, wad-scaled.
	pub combined_risk_actual: U256,
}

/// Result of reconciling the receipt against the local prediction.
///
/// `EventNotFound` and `Anomaly` are warnings, not failures: the swap itself
/// succeeded, and callers use them for auditing and alerting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum VerificationOutcome {
	/// Record present and within tolerance of the prediction.
	Verified { record: SwapRecord },
	/// No matching event in the receipt.
	EventNotFound,
	/// Record present but outside tolerance of the prediction.
	Anomaly {
		record: SwapRecord,
		expected_fee_bps: u32,
		expected_risk: U256,
		detail: String,
	},
}

/// The upward-facing response for one executed swap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapReport {
	/// Local attempt identifier (uuid). The on-chain swap id, when the
	/// record was found, is the authoritative name for the swap.
	pub attempt_id: String,
	pub risk_metrics: RiskMetrics,
	pub tier_expected: FeeTier,
	/// Tier the hook actually applied, when the record was found.
	pub tier_actual: Option<FeeTier>,
	/// Fee amount implied by the actual (or else expected) tier.
	pub fee_amount: U256,
	/// Input net of the fee.
	pub net_amount: U256,
	pub tx_hash: TransactionHash,
	pub block_number: u64,
	/// On-chain swap id, when the record was found.
	pub swap_id: Option<[u8; 32]>,
	pub verification: VerificationOutcome,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fee_tier_values() {
		assert_eq!(FeeTier::Partner.fee_bps(), 500);
		assert_eq!(FeeTier::Retail.fee_bps(), 3000);
		assert_eq!(FeeTier::Elevated.fee_bps(), 6000);
		assert_eq!(FeeTier::Toxic.fee_bps(), 15000);
	}

	#[test]
	fn fee_tier_reverse_lookup() {
		for tier in [
			FeeTier::Partner,
			FeeTier::Retail,
			FeeTier::Elevated,
			FeeTier::Toxic,
		] {
			assert_eq!(FeeTier::from_fee_bps(tier.fee_bps()), Some(tier));
		}
		assert_eq!(FeeTier::from_fee_bps(1234), None);
	}
}
