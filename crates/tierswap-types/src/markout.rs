//! Deferred markout verification types.
//!
//! Markout is a delayed measurement of post-swap price drift used to detect
//! adversarial flow after the fact. The check is gated on block depth and its
//! decision, once made, is final for that swap id.

use serde::{Deserialize, Serialize};

/// Terminal and non-terminal markout states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkoutDecision {
	/// Not enough blocks have elapsed since the swap. Expected state, not an
	/// error; checking in this state performs no mutating call.
	Pending,
	/// Realized drift at or above the health threshold.
	Healthy,
	/// Realized drift below the health threshold; the swap is flagged.
	SlashEligible,
}

impl MarkoutDecision {
	/// True once the decision can no longer change.
	pub fn is_final(&self) -> bool {
		!matches!(self, MarkoutDecision::Pending)
	}
}

/// State of one swap's markout verification.
///
/// Created lazily on the first check attempt. Re-computable while `Pending`,
/// but converges: once a final decision exists it is recorded and every later
/// check returns the recorded decision without touching the chain again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkoutVerification {
	pub swap_id: [u8; 32],
	/// Block the swap was included in.
	pub swap_block: u64,
	/// Block height at the most recent check.
	pub checked_at_block: u64,
	/// Realized drift, wad-scaled and signed; present once computed.
	pub rho: Option<i128>,
	pub decision: MarkoutDecision,
}
