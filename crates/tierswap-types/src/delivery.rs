//! Transaction delivery types for the swap pipeline.
//!
//! A submitted transaction is tracked as a `TransactionRecord` from the moment
//! it enters the mempool until it is confirmed, reverted, or the confirmation
//! budget runs out.

use crate::Address;

/// Blockchain transaction hash representation.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TransactionHash(pub Vec<u8>);

impl std::fmt::Display for TransactionHash {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "0x{}", hex::encode(&self.0))
	}
}

/// Terminal and non-terminal states of a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TxStatus {
	/// Submitted, no receipt yet.
	Pending,
	/// Receipt present with success status.
	Confirmed,
	/// Receipt present with failure status. Fatal for the attempt.
	Reverted,
	/// No receipt within the confirmation budget. Transient; the caller
	/// decides whether to resubmit.
	TimedOut,
}

/// A single log entry from a transaction receipt.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LogEntry {
	/// Emitting contract address.
	pub address: Address,
	/// Indexed topics, topic0 first.
	pub topics: Vec<[u8; 32]>,
	/// ABI-encoded non-indexed data.
	pub data: Vec<u8>,
}

/// Full record of a submitted transaction.
///
/// Created at submission time and finalized at confirmation or timeout.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TransactionRecord {
	pub hash: TransactionHash,
	pub status: TxStatus,
	/// Inclusion block, present once a receipt exists.
	pub block_number: Option<u64>,
	/// Gas consumed, present once a receipt exists.
	pub gas_used: Option<u64>,
	/// Receipt logs; empty until confirmed.
	pub logs: Vec<LogEntry>,
}

impl TransactionRecord {
	/// A fresh record for a transaction that just entered the mempool.
	pub fn pending(hash: TransactionHash) -> Self {
		Self {
			hash,
			status: TxStatus::Pending,
			block_number: None,
			gas_used: None,
			logs: Vec::new(),
		}
	}
}
