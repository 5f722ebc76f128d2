//! Structural decoding of revert payloads.
//!
//! Conditions the pipeline reacts to (an expired deadline, a pool that is
//! already initialized) are matched on their custom-error selectors, never on
//! error-message substrings.

use alloy_sol_types::{sol, SolError};

sol! {
	/// Router rejected the bundle because its deadline had passed.
	error DeadlinePassed();
	/// Pool manager rejected an initialize for an existing pool.
	error AlreadyInitialized();
	/// Pool accounting rejected the swap output floor.
	error TooLittleReceived(uint256 minAmountOutReceived, uint256 amountReceived);
	/// Standard Solidity require(reason) wrapper.
	error Error(string reason);
}

/// A decoded revert payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevertReason {
	/// The plan's deadline expired before inclusion. Transient: rebuild the
	/// plan with a fresh deadline and retry.
	DeadlinePassed,
	/// The pool already exists. Benign when racing an initialize.
	AlreadyInitialized,
	/// Output fell below the plan's floor.
	TooLittleReceived { minimum: String, received: String },
	/// A require(reason) string, surfaced verbatim.
	Message(String),
	/// Unrecognized revert data, hex-encoded for the log.
	Raw(String),
	/// Revert with no data at all.
	Empty,
}

impl RevertReason {
	/// Decodes raw revert data into a typed reason. Total: anything
	/// unrecognized lands in `Raw`/`Empty` rather than failing.
	pub fn decode(data: &[u8]) -> Self {
		if data.is_empty() {
			return RevertReason::Empty;
		}
		if data.len() >= 4 {
			let selector: [u8; 4] = data[..4].try_into().unwrap();
			if selector == DeadlinePassed::SELECTOR {
				return RevertReason::DeadlinePassed;
			}
			if selector == AlreadyInitialized::SELECTOR {
				return RevertReason::AlreadyInitialized;
			}
			if selector == TooLittleReceived::SELECTOR {
				if let Ok(e) = TooLittleReceived::abi_decode(data, true) {
					return RevertReason::TooLittleReceived {
						minimum: e.minAmountOutReceived.to_string(),
						received: e.amountReceived.to_string(),
					};
				}
			}
			if selector == Error::SELECTOR {
				if let Ok(e) = Error::abi_decode(data, true) {
					return RevertReason::Message(e.reason);
				}
			}
		}
		RevertReason::Raw(format!("0x{}", hex::encode(data)))
	}

	/// An expired deadline is the only revert worth retrying: the plan is
	/// rebuilt with a fresh deadline. Everything else is fatal for the
	/// attempt.
	pub fn is_transient(&self) -> bool {
		matches!(self, RevertReason::DeadlinePassed)
	}

	/// True for reverts that signal the desired state already exists.
	pub fn is_benign(&self) -> bool {
		matches!(self, RevertReason::AlreadyInitialized)
	}
}

impl std::fmt::Display for RevertReason {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			RevertReason::DeadlinePassed => write!(f, "deadline passed"),
			RevertReason::AlreadyInitialized => write!(f, "already initialized"),
			RevertReason::TooLittleReceived { minimum, received } => {
				write!(f, "too little received (minimum {}, got {})", minimum, received)
			}
			RevertReason::Message(reason) => write!(f, "{}", reason),
			RevertReason::Raw(data) => write!(f, "unrecognized revert {}", data),
			RevertReason::Empty => write!(f, "revert without data"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn decodes_deadline_passed_by_selector() {
		let data = DeadlinePassed {}.abi_encode();
		let reason = RevertReason::decode(&data);
		assert_eq!(reason, RevertReason::DeadlinePassed);
		assert!(reason.is_transient());
		assert!(!reason.is_benign());
	}

	#[test]
	fn decodes_already_initialized_by_selector() {
		let data = AlreadyInitialized {}.abi_encode();
		let reason = RevertReason::decode(&data);
		assert_eq!(reason, RevertReason::AlreadyInitialized);
		assert!(reason.is_benign());
		assert!(!reason.is_transient());
	}

	#[test]
	fn decodes_require_message() {
		let data = Error {
			reason: "insufficient balance".to_string(),
		}
		.abi_encode();
		let reason = RevertReason::decode(&data);
		assert_eq!(
			reason,
			RevertReason::Message("insufficient balance".to_string())
		);
		assert!(!reason.is_transient());
	}

	#[test]
	fn unknown_selector_is_raw_not_an_error() {
		let reason = RevertReason::decode(&[0x12, 0x34, 0x56, 0x78]);
		assert!(matches!(reason, RevertReason::Raw(_)));
	}

	#[test]
	fn empty_data_is_empty() {
		assert_eq!(RevertReason::decode(&[]), RevertReason::Empty);
	}
}
