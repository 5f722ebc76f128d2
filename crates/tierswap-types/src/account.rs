//! Account and transaction types shared across the swap pipeline.
//!
//! Addresses and signatures are stored as raw bytes at the crate boundaries;
//! alloy-native types are produced on demand where calldata is assembled.

use alloy_primitives::{Address as AlloyAddress, Bytes, PrimitiveSignature, U256};
use alloy_rpc_types::TransactionRequest;
use thiserror::Error;

/// Errors produced when parsing address material from configuration or input.
#[derive(Debug, Error)]
pub enum AddressError {
	#[error("Invalid hex in address '{0}'")]
	InvalidHex(String),
	#[error("Address must be 20 bytes, got {0}")]
	InvalidLength(usize),
}

/// Blockchain address representation.
///
/// Stored as raw bytes; always 20 bytes once validated through `from_hex`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Address(pub Vec<u8>);

impl Address {
	/// The zero address, used to denote the chain's native asset.
	pub fn zero() -> Self {
		Address(vec![0u8; 20])
	}

	/// Parses a 0x-prefixed (or bare) hex string into a checked address.
	pub fn from_hex(s: &str) -> Result<Self, AddressError> {
		let raw = s.trim_start_matches("0x");
		let bytes = hex::decode(raw).map_err(|_| AddressError::InvalidHex(s.to_string()))?;
		if bytes.len() != 20 {
			return Err(AddressError::InvalidLength(bytes.len()));
		}
		Ok(Address(bytes))
	}

	/// True when this address denotes the native asset (all zero bytes).
	pub fn is_native(&self) -> bool {
		self.0.iter().all(|b| *b == 0)
	}

	/// Converts to the alloy address type for calldata assembly.
	///
	/// Callers must only invoke this on validated 20-byte addresses.
	pub fn to_alloy(&self) -> AlloyAddress {
		let mut bytes = [0u8; 20];
		bytes.copy_from_slice(&self.0[..20]);
		AlloyAddress::from(bytes)
	}
}

impl From<AlloyAddress> for Address {
	fn from(addr: AlloyAddress) -> Self {
		Address(addr.as_slice().to_vec())
	}
}

impl std::fmt::Display for Address {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "0x{}", hex::encode(&self.0))
	}
}

/// Cryptographic signature in the standard Ethereum (r, s, v) layout.
#[derive(Debug, Clone)]
pub struct Signature(pub Vec<u8>);

impl From<PrimitiveSignature> for Signature {
	fn from(sig: PrimitiveSignature) -> Self {
		let mut bytes = Vec::with_capacity(65);
		bytes.extend_from_slice(&sig.r().to_be_bytes::<32>());
		bytes.extend_from_slice(&sig.s().to_be_bytes::<32>());
		bytes.push(if sig.v() { 28 } else { 27 });
		Signature(bytes)
	}
}

/// Blockchain transaction representation.
///
/// EIP-1559 shaped; the gas limit is always an explicit caller-supplied upper
/// bound, never estimated on the submitter's behalf.
#[derive(Debug, Clone)]
pub struct Transaction {
	/// Recipient contract address.
	pub to: Address,
	/// Calldata.
	pub data: Vec<u8>,
	/// Value in native currency.
	pub value: U256,
	/// Chain ID for replay protection.
	pub chain_id: u64,
	/// Nonce (filled by the provider when None).
	pub nonce: Option<u64>,
	/// Explicit gas limit.
	pub gas_limit: u64,
	/// Maximum fee per gas (filled by the provider when None).
	pub max_fee_per_gas: Option<u128>,
	/// Maximum priority fee per gas (filled by the provider when None).
	pub max_priority_fee_per_gas: Option<u128>,
}

impl From<Transaction> for TransactionRequest {
	fn from(tx: Transaction) -> Self {
		TransactionRequest {
			chain_id: Some(tx.chain_id),
			to: Some(alloy_primitives::TxKind::Call(tx.to.to_alloy())),
			value: Some(tx.value),
			nonce: tx.nonce,
			gas: Some(tx.gas_limit),
			max_fee_per_gas: tx.max_fee_per_gas,
			max_priority_fee_per_gas: tx.max_priority_fee_per_gas,
			input: alloy_rpc_types::TransactionInput {
				input: Some(Bytes::from(tx.data)),
				data: None,
			},
			..Default::default()
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn address_hex_round_trip() {
		let addr = Address::from_hex("0x000000000000000000000000000000000000dEaD").unwrap();
		assert_eq!(addr.to_string(), "0x000000000000000000000000000000000000dead");
		assert!(!addr.is_native());
	}

	#[test]
	fn address_rejects_bad_length() {
		assert!(matches!(
			Address::from_hex("0x1234"),
			Err(AddressError::InvalidLength(2))
		));
	}

	#[test]
	fn zero_address_is_native() {
		assert!(Address::zero().is_native());
	}
}
