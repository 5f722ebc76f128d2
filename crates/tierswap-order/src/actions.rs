//! ABI encoding for the router action bundle and the hook payload.
//!
//! One swap rides through the router as a single `execute` call carrying a
//! command byte, the packed action identifiers, and one ABI-encoded parameter
//! blob per action.

use alloy_primitives::{
	aliases::{I24, U24},
	keccak256, Bytes, U256,
};
use alloy_sol_types::{sol, SolCall, SolValue};
use tierswap_types::{Action, ActionKind, Address, PoolKey};

use crate::OrderError;

/// Router command selecting the pool-actions dispatcher.
pub const COMMAND_POOL_ACTIONS: u8 = 0x10;

/// Action identifier for an exact-input single-hop swap.
pub const ACTION_SWAP_EXACT_IN_SINGLE: u8 = 0x06;
/// Action identifier for settling the full open debt in a currency.
pub const ACTION_SETTLE_ALL: u8 = 0x0c;
/// Action identifier for taking the full open credit in a currency.
pub const ACTION_TAKE_ALL: u8 = 0x0f;

sol! {
	/// Pool identification key as the pool manager hashes it.
	struct PoolKeyAbi {
		address currency0;
		address currency1;
		uint24 fee;
		int24 tickSpacing;
		address hooks;
	}

	/// Parameters of the exact-input single-hop swap action.
	struct ExactInSingleAbi {
		PoolKeyAbi poolKey;
		bool zeroForOne;
		uint128 amountIn;
		uint128 amountOutMinimum;
		bytes hookData;
	}

	/// Router entry point accepting the encoded action bundle.
	interface IActionRouter {
		function execute(bytes commands, bytes[] inputs, uint256 deadline) external payable;
	}

	/// Pool manager initialize entry point (pool creation is externally
	/// owned; the pipeline only encodes the call for setup tooling).
	interface IPoolManager {
		function initialize(PoolKeyAbi key, uint160 sqrtPriceX96) external returns (int24 tick);
	}
}

/// Wire identifier of an action.
pub fn action_wire_id(kind: ActionKind) -> u8 {
	match kind {
		ActionKind::SwapExactInSingle => ACTION_SWAP_EXACT_IN_SINGLE,
		ActionKind::SettleAll => ACTION_SETTLE_ALL,
		ActionKind::TakeAll => ACTION_TAKE_ALL,
	}
}

fn pool_key_abi(key: &PoolKey) -> Result<PoolKeyAbi, OrderError> {
	Ok(PoolKeyAbi {
		currency0: key.currency0.to_alloy(),
		currency1: key.currency1.to_alloy(),
		fee: U24::try_from(key.fee)
			.map_err(|_| OrderError::Encoding(format!("fee {} exceeds uint24", key.fee)))?,
		tickSpacing: I24::try_from(key.tick_spacing).map_err(|_| {
			OrderError::Encoding(format!("tick spacing {} exceeds int24", key.tick_spacing))
		})?,
		hooks: key.hooks.to_alloy(),
	})
}

/// Pool id as the pool manager derives it: keccak of the ABI-encoded key.
pub fn pool_id(key: &PoolKey) -> Result<[u8; 32], OrderError> {
	Ok(keccak256(pool_key_abi(key)?.abi_encode()).0)
}

/// Encodes the hook payload `(uint256 agentId, bytes proof)`.
///
/// The hook decodes this on-chain to attribute the swap to an agent and to
/// check partner eligibility; the proof may be empty.
pub fn encode_hook_payload(agent_id: U256, proof: &[u8]) -> Vec<u8> {
	(agent_id, Bytes::copy_from_slice(proof)).abi_encode_params()
}

/// Decodes a hook payload back into `(agentId, proof)`. Exact inverse of
/// `encode_hook_payload`.
pub fn decode_hook_payload(data: &[u8]) -> Result<(U256, Vec<u8>), OrderError> {
	let (agent_id, proof) = <(U256, Bytes)>::abi_decode_params(data, true)
		.map_err(|e| OrderError::Encoding(format!("hook payload: {}", e)))?;
	Ok((agent_id, proof.to_vec()))
}

/// Encodes the exact-input single-hop swap action parameters.
pub fn encode_swap_exact_in_single(
	pool_key: &PoolKey,
	zero_for_one: bool,
	amount_in: U256,
	amount_out_minimum: U256,
	agent_id: U256,
	proof: &[u8],
) -> Result<Vec<u8>, OrderError> {
	let amount_in: u128 = amount_in
		.try_into()
		.map_err(|_| OrderError::Encoding("amount_in exceeds uint128".to_string()))?;
	let amount_out_minimum: u128 = amount_out_minimum
		.try_into()
		.map_err(|_| OrderError::Encoding("amount_out_minimum exceeds uint128".to_string()))?;

	let params = ExactInSingleAbi {
		poolKey: pool_key_abi(pool_key)?,
		zeroForOne: zero_for_one,
		amountIn: amount_in,
		amountOutMinimum: amount_out_minimum,
		hookData: encode_hook_payload(agent_id, proof).into(),
	};
	Ok(params.abi_encode())
}

/// Encodes the settle-all action parameters `(currency, maxAmount)`.
pub fn encode_settle_all(currency: &Address, max_amount: U256) -> Vec<u8> {
	(currency.to_alloy(), max_amount).abi_encode_params()
}

/// Encodes the take-all action parameters `(currency, minAmount)`.
pub fn encode_take_all(currency: &Address, min_amount: U256) -> Vec<u8> {
	(currency.to_alloy(), min_amount).abi_encode_params()
}

/// Encodes the pool manager `initialize` call for one pool key.
pub fn encode_initialize(key: &PoolKey, sqrt_price_x96: U256) -> Result<Vec<u8>, OrderError> {
	if sqrt_price_x96.bit_len() > 160 {
		return Err(OrderError::Encoding(
			"sqrt price exceeds uint160".to_string(),
		));
	}
	let sqrt_price =
		alloy_primitives::aliases::U160::from_be_slice(&sqrt_price_x96.to_be_bytes::<32>()[12..]);

	Ok(IPoolManager::initializeCall {
		key: pool_key_abi(key)?,
		sqrtPriceX96: sqrt_price,
	}
	.abi_encode())
}

/// Wraps the ordered actions into the router `execute` calldata.
pub fn encode_execute(actions: &[Action], deadline: u64) -> Vec<u8> {
	let ids: Vec<u8> = actions.iter().map(|a| action_wire_id(a.kind)).collect();
	let params: Vec<Bytes> = actions
		.iter()
		.map(|a| Bytes::copy_from_slice(&a.params))
		.collect();

	let input = (Bytes::from(ids), params).abi_encode_params();

	IActionRouter::executeCall {
		commands: vec![COMMAND_POOL_ACTIONS].into(),
		inputs: vec![input.into()],
		deadline: U256::from(deadline),
	}
	.abi_encode()
}
