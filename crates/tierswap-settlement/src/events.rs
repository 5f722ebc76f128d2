//! Receipt-log reconciliation against the predicted tier and risk.
//!
//! The hook emits one `SwapRecorded` event per swap; the verifier finds it,
//! decodes it, and compares the fee and risk the hook actually applied to the
//! local prediction. A missing event and an out-of-tolerance record are both
//! surfaced, never swallowed, but neither fails the swap: the transaction
//! already confirmed.

use alloy_primitives::{B256, U256};
use alloy_sol_types::{sol, SolEvent};
use tierswap_types::{
	Address, FeeTier, SwapRecord, TransactionRecord, VerificationOutcome,
};
use tracing::{debug, warn};

sol! {
	/// Emitted by the fee hook for every swap it prices.
	event SwapRecorded(
		bytes32 indexed swapId,
		bytes32 indexed poolId,
		address indexed sender,
		uint256 agentId,
		uint160 sqrtPriceBefore,
		uint160 sqrtPriceAfter,
		uint24 feeBps,
		uint256 combinedRisk
	);
}

/// Verifies the hook's emitted record against the local prediction.
#[derive(Debug, Clone)]
pub struct EventVerifier {
	/// The hook contract expected to emit the record.
	hook_address: Address,
	/// Tolerance on the combined-risk comparison, wad-scaled. The pool may
	/// move between the local state read and execution, so the risk the hook
	/// computed can legitimately differ a little.
	risk_epsilon: U256,
}

impl EventVerifier {
	pub fn new(hook_address: Address, risk_epsilon: U256) -> Self {
		Self {
			hook_address,
			risk_epsilon,
		}
	}

	/// Scans the receipt for this hook's swap record and reconciles it.
	///
	/// Logs that are structurally not the target event (wrong emitter, wrong
	/// topic, undecodable body) are skipped per entry; finding none at all is
	/// the distinct `EventNotFound` outcome.
	pub fn verify(
		&self,
		record: &TransactionRecord,
		expected_tier: FeeTier,
		expected_risk: U256,
	) -> VerificationOutcome {
		let swap_record = match self.find_record(record) {
			Some(r) => r,
			None => {
				warn!(tx_hash = %record.hash, "No swap record emitted by hook");
				return VerificationOutcome::EventNotFound;
			}
		};

		let expected_fee_bps = expected_tier.fee_bps();

		// The hook recomputes the tier deterministically, so the fee must
		// match exactly once the tier matches; only the risk score gets the
		// epsilon.
		if swap_record.fee_bps_actual != expected_fee_bps {
			let detail = format!(
				"fee mismatch: hook charged {} bps, expected tier {} ({} bps)",
				swap_record.fee_bps_actual, expected_tier, expected_fee_bps
			);
			warn!(swap_id = %hex::encode(swap_record.swap_id), "{}", detail);
			return VerificationOutcome::Anomaly {
				record: swap_record,
				expected_fee_bps,
				expected_risk,
				detail,
			};
		}

		let drift = swap_record.combined_risk_actual.abs_diff(expected_risk);
		if drift > self.risk_epsilon {
			let detail = format!(
				"risk drift {} exceeds tolerance {}",
				drift, self.risk_epsilon
			);
			warn!(swap_id = %hex::encode(swap_record.swap_id), "{}", detail);
			return VerificationOutcome::Anomaly {
				record: swap_record,
				expected_fee_bps,
				expected_risk,
				detail,
			};
		}

		debug!(swap_id = %hex::encode(swap_record.swap_id), "Swap record verified");
		VerificationOutcome::Verified {
			record: swap_record,
		}
	}

	/// Finds and decodes the first matching swap record in the receipt.
	fn find_record(&self, record: &TransactionRecord) -> Option<SwapRecord> {
		for log in &record.logs {
			if log.address != self.hook_address {
				continue;
			}
			let Some(topic0) = log.topics.first() else {
				continue;
			};
			if B256::from(*topic0) != SwapRecorded::SIGNATURE_HASH {
				continue;
			}

			let topics: Vec<B256> = log.topics.iter().map(|t| B256::from(*t)).collect();
			match SwapRecorded::decode_raw_log(topics, &log.data, true) {
				Ok(ev) => {
					return Some(SwapRecord {
						swap_id: ev.swapId.0,
						pool_id: ev.poolId.0,
						sender: Address::from(ev.sender),
						agent_id: ev.agentId,
						sqrt_price_before: U256::from(ev.sqrtPriceBefore),
						sqrt_price_after: U256::from(ev.sqrtPriceAfter),
						fee_bps_actual: ev.feeBps.to::<u32>(),
						combined_risk_actual: ev.combinedRisk,
					});
				}
				Err(e) => {
					// Matching topic but undecodable body: not our event
					// after all, keep scanning.
					debug!("Skipping undecodable log: {}", e);
					continue;
				}
			}
		}
		None
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::aliases::{U160, U24};
	use tierswap_types::{LogEntry, TransactionHash, TxStatus};

	fn addr(last: u8) -> Address {
		let mut bytes = vec![0u8; 20];
		bytes[19] = last;
		Address(bytes)
	}

	fn hook() -> Address {
		addr(0xee)
	}

	fn wad(f: f64) -> U256 {
		U256::from((f * 1e18) as u128)
	}

	fn swap_log(emitter: &Address, fee_bps: u32, combined_risk: U256) -> LogEntry {
		let ev = SwapRecorded {
			swapId: B256::from([0x11; 32]),
			poolId: B256::from([0x22; 32]),
			sender: addr(0x33).to_alloy(),
			agentId: U256::from(7u64),
			sqrtPriceBefore: U160::from(1u64) << 96,
			sqrtPriceAfter: (U160::from(1u64) << 96) + U160::from(1_000u64),
			feeBps: U24::from(fee_bps),
			combinedRisk: combined_risk,
		};
		LogEntry {
			address: emitter.clone(),
			topics: ev.encode_topics().iter().map(|t| t.0 .0).collect(),
			data: ev.encode_data(),
		}
	}

	fn receipt(logs: Vec<LogEntry>) -> TransactionRecord {
		TransactionRecord {
			hash: TransactionHash(vec![0xab; 32]),
			status: TxStatus::Confirmed,
			block_number: Some(1234),
			gas_used: Some(200_000),
			logs,
		}
	}

	fn verifier() -> EventVerifier {
		EventVerifier::new(hook(), wad(0.05))
	}

	#[test]
	fn matching_record_verifies() {
		let record = receipt(vec![swap_log(&hook(), 6000, wad(0.40))]);
		let outcome = verifier().verify(&record, FeeTier::Elevated, wad(0.39));
		match outcome {
			VerificationOutcome::Verified { record } => {
				assert_eq!(record.fee_bps_actual, 6000);
				assert_eq!(record.agent_id, U256::from(7u64));
			}
			other => panic!("expected Verified, got {:?}", other),
		}
	}

	#[test]
	fn missing_event_is_event_not_found() {
		let outcome = verifier().verify(&receipt(vec![]), FeeTier::Retail, wad(0.1));
		assert!(matches!(outcome, VerificationOutcome::EventNotFound));
	}

	#[test]
	fn foreign_emitter_is_skipped() {
		let record = receipt(vec![swap_log(&addr(0x99), 6000, wad(0.4))]);
		let outcome = verifier().verify(&record, FeeTier::Elevated, wad(0.4));
		assert!(matches!(outcome, VerificationOutcome::EventNotFound));
	}

	#[test]
	fn garbage_log_alongside_real_one_is_tolerated() {
		let garbage = LogEntry {
			address: hook(),
			topics: vec![[0x00; 32]],
			data: vec![0xff; 7],
		};
		let record = receipt(vec![garbage, swap_log(&hook(), 3000, wad(0.12))]);
		let outcome = verifier().verify(&record, FeeTier::Retail, wad(0.12));
		assert!(matches!(outcome, VerificationOutcome::Verified { .. }));
	}

	#[test]
	fn fee_mismatch_is_an_anomaly() {
		let record = receipt(vec![swap_log(&hook(), 15000, wad(0.4))]);
		let outcome = verifier().verify(&record, FeeTier::Elevated, wad(0.4));
		match outcome {
			VerificationOutcome::Anomaly {
				expected_fee_bps, ..
			} => assert_eq!(expected_fee_bps, 6000),
			other => panic!("expected Anomaly, got {:?}", other),
		}
	}

	#[test]
	fn risk_drift_beyond_epsilon_is_an_anomaly() {
		let record = receipt(vec![swap_log(&hook(), 6000, wad(0.55))]);
		let outcome = verifier().verify(&record, FeeTier::Elevated, wad(0.40));
		assert!(matches!(outcome, VerificationOutcome::Anomaly { .. }));
	}

	#[test]
	fn risk_drift_within_epsilon_verifies() {
		let record = receipt(vec![swap_log(&hook(), 6000, wad(0.42))]);
		let outcome = verifier().verify(&record, FeeTier::Elevated, wad(0.40));
		assert!(matches!(outcome, VerificationOutcome::Verified { .. }));
	}
}
