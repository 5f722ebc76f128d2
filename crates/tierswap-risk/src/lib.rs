//! Risk scoring and fee-tier resolution for the swap pipeline.
//!
//! Both components are pure: no I/O, no clocks, no hidden state. The scores
//! computed here are a prediction of what the fee hook will compute on-chain
//! from the same inputs; the hook's result is authoritative.
//!
//! All fractional quantities are wad-scaled fixed point (1e18 = 1.0).

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tierswap_types::{FeeTier, RiskMetrics};

/// Wad scale: 1e18 represents 1.0.
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000u64, 0, 0, 0]);

/// Errors that can occur during risk scoring or tier resolution.
#[derive(Debug, Error)]
pub enum RiskError {
	/// Pool snapshot unusable for scoring (zero liquidity).
	#[error("Invalid pool state: {0}")]
	InvalidPoolState(String),
	/// Swap size too large for fixed-point scoring.
	#[error("Amount out of range for risk scoring")]
	AmountOutOfRange,
	/// Parameter set rejected at construction.
	#[error("Invalid risk parameters: {0}")]
	InvalidParams(String),
	/// A score or threshold left its contractual range. Programmer error;
	/// surfaced loudly, never clamped.
	#[error("Invariant violation: {0}")]
	InvariantViolation(String),
}

/// Immutable risk-curve parameters.
///
/// `k` shapes the price-impact curve; the weights blend impact and stress
/// into the combined score and must sum to exactly 1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskParams {
	/// Price-impact curve parameter, wad-scaled.
	pub k: U256,
	/// Weight of price impact in the combined score, wad-scaled.
	pub weight_impact: U256,
	/// Weight of liquidity stress in the combined score, wad-scaled.
	pub weight_stress: U256,
}

impl RiskParams {
	pub fn new(k: U256, weight_impact: U256, weight_stress: U256) -> Result<Self, RiskError> {
		if k.is_zero() {
			return Err(RiskError::InvalidParams("k must be positive".to_string()));
		}
		if weight_impact + weight_stress != WAD {
			return Err(RiskError::InvalidParams(
				"weights must sum to 1.0".to_string(),
			));
		}
		Ok(Self {
			k,
			weight_impact,
			weight_stress,
		})
	}
}

impl Default for RiskParams {
	/// K = 100.0, weights 0.6 impact / 0.4 stress: liquidity stress
	/// dominates for small pools and large trades.
	fn default() -> Self {
		Self {
			k: WAD * U256::from(100u64),
			weight_impact: U256::from(600_000_000_000_000_000u64),
			weight_stress: U256::from(400_000_000_000_000_000u64),
		}
	}
}

/// Pure risk scorer: pool state + swap size in, wad-scaled metrics out.
#[derive(Debug, Clone)]
pub struct RiskScorer {
	params: RiskParams,
}

impl RiskScorer {
	pub fn new(params: RiskParams) -> Self {
		Self { params }
	}

	/// Computes the risk metrics for a swap of `amount_in` against a pool
	/// holding `pool_liquidity`.
	///
	/// `price_impact = amount_in / (amount_in + k)` is monotonically
	/// increasing and asymptotic to 1.0; `liquidity_stress` is the swap size
	/// relative to liquidity, hard-capped at 1.0. Zero `amount_in` is valid
	/// and yields all-zero metrics; zero liquidity is an error.
	pub fn score(&self, amount_in: U256, pool_liquidity: U256) -> Result<RiskMetrics, RiskError> {
		if pool_liquidity.is_zero() {
			return Err(RiskError::InvalidPoolState(
				"pool has zero liquidity".to_string(),
			));
		}
		if amount_in.is_zero() {
			return Ok(RiskMetrics::zero());
		}

		let scaled = amount_in
			.checked_mul(WAD)
			.ok_or(RiskError::AmountOutOfRange)?;

		let price_impact = scaled / (amount_in + self.params.k);

		let liquidity_stress = (scaled / pool_liquidity).min(WAD);

		let combined_risk = (self.params.weight_impact * price_impact
			+ self.params.weight_stress * liquidity_stress)
			/ WAD;

		Ok(RiskMetrics {
			price_impact,
			liquidity_stress,
			combined_risk,
		})
	}
}

/// Immutable tier boundaries, wad-scaled. All bounds are exclusive upper
/// limits: a score exactly at a boundary falls into the lower-risk tier's
/// neighbour above it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierThresholds {
	/// Ceiling for PARTNER (bonded callers only).
	pub partner_max: U256,
	/// Ceiling for RETAIL.
	pub retail_max: U256,
	/// Ceiling for ELEVATED; everything at or above is TOXIC.
	pub elevated_max: U256,
}

impl Default for TierThresholds {
	fn default() -> Self {
		Self {
			partner_max: U256::from(100_000_000_000_000_000u64),
			retail_max: U256::from(300_000_000_000_000_000u64),
			elevated_max: U256::from(700_000_000_000_000_000u64),
		}
	}
}

/// Pure, total resolver from a combined risk score to a fee tier.
#[derive(Debug, Clone)]
pub struct FeeTierResolver {
	thresholds: TierThresholds,
}

impl FeeTierResolver {
	pub fn new(thresholds: TierThresholds) -> Result<Self, RiskError> {
		if !(thresholds.partner_max < thresholds.retail_max
			&& thresholds.retail_max < thresholds.elevated_max
			&& thresholds.elevated_max < WAD)
		{
			return Err(RiskError::InvalidParams(
				"tier thresholds must be strictly increasing and below 1.0".to_string(),
			));
		}
		Ok(Self { thresholds })
	}

	/// Resolves a combined risk score to a tier. PARTNER additionally
	/// requires the externally supplied bonded flag.
	///
	/// A score outside [0, 1.0) is a contract bug upstream and is surfaced
	/// as an invariant violation rather than clamped into a tier.
	pub fn resolve(&self, combined_risk: U256, bonded: bool) -> Result<FeeTier, RiskError> {
		if combined_risk >= WAD {
			return Err(RiskError::InvariantViolation(format!(
				"combined risk {} outside [0, 1.0)",
				combined_risk
			)));
		}

		if bonded && combined_risk < self.thresholds.partner_max {
			return Ok(FeeTier::Partner);
		}
		if combined_risk < self.thresholds.retail_max {
			return Ok(FeeTier::Retail);
		}
		if combined_risk < self.thresholds.elevated_max {
			return Ok(FeeTier::Elevated);
		}
		Ok(FeeTier::Toxic)
	}
}
