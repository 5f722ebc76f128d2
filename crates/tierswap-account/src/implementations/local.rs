//! Local private-key wallet on Alloy's signer.
//!
//! Suitable for agent deployments where the key lives in the environment;
//! anything custodial sits behind the same `AccountInterface`.

use crate::{AccountError, AccountInterface};
use alloy_consensus::TxEip1559;
use alloy_network::TxSigner;
use alloy_primitives::{Bytes, TxKind};
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use tierswap_types::{Address, Signature, Transaction};

/// Wallet holding a single locally managed private key.
pub struct LocalWallet {
	signer: PrivateKeySigner,
}

impl LocalWallet {
	/// Creates a wallet from a hex-encoded private key (0x prefix optional).
	pub fn new(private_key_hex: &str) -> Result<Self, AccountError> {
		let signer = private_key_hex
			.parse::<PrivateKeySigner>()
			.map_err(|e| AccountError::InvalidKey(format!("Invalid private key: {}", e)))?;
		Ok(Self { signer })
	}

	/// Exposes the underlying signer for providers that sign at submission.
	pub fn signer(&self) -> PrivateKeySigner {
		self.signer.clone()
	}
}

#[async_trait]
impl AccountInterface for LocalWallet {
	async fn address(&self) -> Result<Address, AccountError> {
		Ok(Address::from(self.signer.address()))
	}

	async fn sign_transaction(&self, tx: &Transaction) -> Result<Signature, AccountError> {
		if tx.to.0.len() != 20 {
			return Err(AccountError::SigningFailed(
				"Invalid recipient address length".to_string(),
			));
		}

		let mut typed = TxEip1559 {
			chain_id: tx.chain_id,
			nonce: tx.nonce.unwrap_or(0),
			gas_limit: tx.gas_limit,
			max_fee_per_gas: tx.max_fee_per_gas.unwrap_or(0),
			max_priority_fee_per_gas: tx.max_priority_fee_per_gas.unwrap_or(0),
			to: TxKind::Call(tx.to.to_alloy()),
			value: tx.value,
			access_list: Default::default(),
			input: Bytes::from(tx.data.clone()),
		};

		let signature = self
			.signer
			.sign_transaction(&mut typed)
			.await
			.map_err(|e| AccountError::SigningFailed(format!("Failed to sign: {}", e)))?;

		Ok(signature.into())
	}
}
