//! Pipeline events and the broadcast event bus.
//!
//! Each stage of a swap attempt publishes an event as it completes, allowing
//! observers (the service log, tests) to follow a swap without coupling to
//! the pipeline's internals.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::{
	FeeTier, MarkoutDecision, RiskMetrics, TransactionHash, VerificationOutcome,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
	Risk(RiskEvent),
	Approval(ApprovalEvent),
	Delivery(DeliveryEvent),
	Verification(VerificationEvent),
	Markout(MarkoutEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RiskEvent {
	Scored {
		attempt_id: String,
		metrics: RiskMetrics,
		tier_expected: FeeTier,
	},
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ApprovalEvent {
	/// Allowance already sufficient; nothing was submitted.
	AlreadySufficient { attempt_id: String, step: String },
	ApprovalSubmitted {
		attempt_id: String,
		step: String,
		tx_hash: TransactionHash,
	},
	Completed { attempt_id: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DeliveryEvent {
	SimulationPassed { attempt_id: String },
	TransactionPending {
		attempt_id: String,
		tx_hash: TransactionHash,
	},
	TransactionConfirmed {
		attempt_id: String,
		tx_hash: TransactionHash,
		block_number: u64,
	},
	TransactionFailed { attempt_id: String, error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum VerificationEvent {
	Reconciled {
		attempt_id: String,
		outcome: VerificationOutcome,
	},
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MarkoutEvent {
	Scheduled { swap_id: [u8; 32], earliest_block: u64 },
	Checked {
		swap_id: [u8; 32],
		decision: MarkoutDecision,
	},
}

/// Broadcast-based event bus shared by the pipeline stages.
///
/// Cloning creates another handle to the same underlying channel; each
/// subscriber receives every event published after it subscribed.
pub struct EventBus {
	sender: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event to all current subscribers. A send error only
	/// means nobody is listening, which is not a failure for the pipeline.
	pub fn publish(
		&self,
		event: PipelineEvent,
	) -> Result<(), broadcast::error::SendError<PipelineEvent>> {
		self.sender.send(event)?;
		Ok(())
	}
}

impl Clone for EventBus {
	fn clone(&self) -> Self {
		Self {
			sender: self.sender.clone(),
		}
	}
}
