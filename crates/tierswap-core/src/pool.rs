//! Pool-state reads through the state-view lens contract.
//!
//! Snapshots are fetched fresh for every swap and never cached: a stale
//! snapshot only skews the locally predicted score, while the hook prices
//! the swap from live state.

use alloy_primitives::U256;
use alloy_sol_types::{sol, SolCall};
use std::sync::Arc;
use tierswap_delivery::DeliveryService;
use tierswap_order::actions::pool_id;
use tierswap_types::{Address, PoolKey, PoolState, Transaction};

use crate::PipelineError;

sol! {
	/// Read-only pool state lens.
	interface IStateView {
		function getSlot0(bytes32 poolId) external view returns (uint160 sqrtPriceX96, int24 tick, uint24 protocolFee, uint24 lpFee);
		function getLiquidity(bytes32 poolId) external view returns (uint128 liquidity);
	}
}

/// Gas ceiling for view calls; generous, never charged.
const READ_GAS_LIMIT: u64 = 500_000;

pub struct PoolReader {
	delivery: Arc<DeliveryService>,
	state_view: Address,
	hook: Address,
	chain_id: u64,
}

impl PoolReader {
	pub fn new(
		delivery: Arc<DeliveryService>,
		state_view: Address,
		hook: Address,
		chain_id: u64,
	) -> Self {
		Self {
			delivery,
			state_view,
			hook,
			chain_id,
		}
	}

	/// Fetches a fresh snapshot of the pool behind `key`.
	pub async fn read(&self, key: &PoolKey) -> Result<PoolState, PipelineError> {
		let id = pool_id(key)?;

		let slot0_bytes = self
			.delivery
			.read(&self.view_call(IStateView::getSlot0Call { poolId: id.into() }.abi_encode()))
			.await?;
		let slot0 = IStateView::getSlot0Call::abi_decode_returns(&slot0_bytes, true)
			.map_err(|e| PipelineError::PoolRead(format!("slot0 response: {}", e)))?;

		let liquidity_bytes = self
			.delivery
			.read(&self.view_call(
				IStateView::getLiquidityCall { poolId: id.into() }.abi_encode(),
			))
			.await?;
		let liquidity = IStateView::getLiquidityCall::abi_decode_returns(&liquidity_bytes, true)
			.map_err(|e| PipelineError::PoolRead(format!("liquidity response: {}", e)))?;

		let tick = i32::try_from(slot0.tick)
			.map_err(|_| PipelineError::PoolRead("tick out of range".to_string()))?;

		Ok(PoolState {
			liquidity: liquidity.liquidity,
			sqrt_price_x96: U256::from(slot0.sqrtPriceX96),
			tick,
			fee: key.fee,
			tick_spacing: key.tick_spacing,
			hook_address: self.hook.clone(),
		})
	}

	fn view_call(&self, data: Vec<u8>) -> Transaction {
		Transaction {
			to: self.state_view.clone(),
			data,
			value: U256::ZERO,
			chain_id: self.chain_id,
			nonce: None,
			gas_limit: READ_GAS_LIMIT,
			max_fee_per_gas: None,
			max_priority_fee_per_gas: None,
		}
	}
}
