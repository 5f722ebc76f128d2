//! Alloy-based EVM delivery implementation.
//!
//! Uses an HTTP provider with a wallet filler: the provider signs and fills
//! nonce/fee fields at submission, while the gas limit always comes from the
//! caller-built transaction.

use crate::{DeliveryError, DeliveryInterface, RevertReason};
use alloy_network::EthereumWallet;
use alloy_primitives::FixedBytes;
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_signer_local::PrivateKeySigner;
use alloy_transport_http::Http;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tierswap_types::{
	Address, LogEntry, Signature, Transaction, TransactionHash, TransactionRecord, TxStatus,
};

/// Truncates a transaction hash for log lines.
fn truncate_hash(hash: &TransactionHash) -> String {
	let hash_str = hex::encode(&hash.0);
	if hash_str.len() <= 8 {
		hash_str
	} else {
		format!("{}..", &hash_str[..8])
	}
}

/// Alloy-backed delivery for EVM chains.
pub struct AlloyDelivery {
	provider: Arc<dyn Provider<Http<reqwest::Client>> + Send + Sync>,
	_chain_id: u64,
}

impl AlloyDelivery {
	/// Connects an HTTP provider with the signing wallet attached.
	pub async fn new(
		rpc_url: &str,
		chain_id: u64,
		signer: PrivateKeySigner,
	) -> Result<Self, DeliveryError> {
		let url = rpc_url
			.parse()
			.map_err(|e| DeliveryError::Network(format!("Invalid RPC URL: {}", e)))?;

		let wallet = EthereumWallet::from(signer);

		let provider = ProviderBuilder::new()
			.with_recommended_fillers()
			.wallet(wallet)
			.on_http(url);

		Ok(Self {
			provider: Arc::new(provider),
			_chain_id: chain_id,
		})
	}

	fn record_from_receipt(
		receipt: alloy_rpc_types::TransactionReceipt,
	) -> TransactionRecord {
		let status = if receipt.status() {
			TxStatus::Confirmed
		} else {
			TxStatus::Reverted
		};
		let logs = receipt
			.inner
			.logs()
			.iter()
			.map(|log| LogEntry {
				address: Address::from(log.inner.address),
				topics: log.inner.data.topics().iter().map(|t| t.0).collect(),
				data: log.inner.data.data.to_vec(),
			})
			.collect();

		TransactionRecord {
			hash: TransactionHash(receipt.transaction_hash.0.to_vec()),
			status,
			block_number: receipt.block_number,
			gas_used: Some(receipt.gas_used as u64),
			logs,
		}
	}
}

#[async_trait]
impl DeliveryInterface for AlloyDelivery {
	async fn call(&self, tx: &Transaction) -> Result<Vec<u8>, DeliveryError> {
		let request: TransactionRequest = tx.clone().into();

		match self.provider.call(&request).await {
			Ok(bytes) => Ok(bytes.to_vec()),
			Err(e) => {
				// A revert comes back as an RPC error carrying the revert
				// data; everything else is a transport problem.
				if let Some(resp) = e.as_error_resp() {
					if let Some(data) = resp.as_revert_data() {
						return Err(DeliveryError::SimulationReverted {
							reason: RevertReason::decode(&data),
						});
					}
				}
				Err(DeliveryError::Network(format!("Call failed: {}", e)))
			}
		}
	}

	async fn submit(
		&self,
		tx: Transaction,
		_signature: &Signature,
	) -> Result<TransactionHash, DeliveryError> {
		let request: TransactionRequest = tx.into();

		// The provider's wallet filler signs at submission.
		let pending_tx = self
			.provider
			.send_transaction(request)
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to send transaction: {}", e)))?;

		let tx_hash = *pending_tx.tx_hash();
		let hash = TransactionHash(tx_hash.0.to_vec());
		tracing::debug!(tx_hash = %truncate_hash(&hash), "Transaction accepted by node");

		Ok(hash)
	}

	async fn wait_for_receipt(
		&self,
		hash: &TransactionHash,
		poll_interval: Duration,
		timeout: Duration,
	) -> Result<TransactionRecord, DeliveryError> {
		let start_time = tokio::time::Instant::now();

		tracing::info!(
			tx_hash = %truncate_hash(hash),
			"Waiting for receipt (timeout: {}s)",
			timeout.as_secs()
		);

		loop {
			if start_time.elapsed() > timeout {
				let mut record = TransactionRecord::pending(hash.clone());
				record.status = TxStatus::TimedOut;
				return Ok(record);
			}

			match self.get_receipt(hash).await? {
				Some(record) => return Ok(record),
				None => {
					tokio::time::sleep(poll_interval).await;
				}
			}
		}
	}

	async fn get_receipt(
		&self,
		hash: &TransactionHash,
	) -> Result<Option<TransactionRecord>, DeliveryError> {
		let tx_hash = FixedBytes::<32>::from_slice(&hash.0);

		let receipt = self
			.provider
			.get_transaction_receipt(tx_hash)
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get receipt: {}", e)))?;

		Ok(receipt.map(Self::record_from_receipt))
	}

	async fn block_number(&self) -> Result<u64, DeliveryError> {
		self.provider
			.get_block_number()
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get block number: {}", e)))
	}
}
