//! Swap intent validation and action-plan construction.
//!
//! The builder turns a validated `SwapIntent` plus a fresh pool snapshot into
//! the ordered action list and router calldata for one atomic swap
//! transaction. Building is pure: no I/O, no clocks (the caller supplies the
//! current time), and the produced plan is immutable.

use alloy_primitives::U256;
use thiserror::Error;
use tierswap_types::{
	Action, ActionKind, ActionPlan, Address, PoolKey, PoolState, SwapIntent,
};

pub mod actions;

use actions::{encode_execute, encode_settle_all, encode_swap_exact_in_single, encode_take_all};

/// Errors raised while validating an intent or assembling a plan.
#[derive(Debug, Error)]
pub enum OrderError {
	/// Malformed swap intent. Fatal; never retried.
	#[error("Invalid swap intent: {0}")]
	InvalidIntent(String),
	/// Parameters that cannot be represented in the pool's encoding.
	#[error("Encoding failed: {0}")]
	Encoding(String),
}

/// Pool-level settings the builder stamps into every pool key.
#[derive(Debug, Clone)]
pub struct PoolSettings {
	/// Fee field of the pool key; dynamic-fee pools carry the flag value.
	pub fee: u32,
	pub tick_spacing: i32,
	/// The fee hook attached to the pool.
	pub hooks: Address,
}

/// Builds action plans for swaps against one configured pool family.
#[derive(Debug, Clone)]
pub struct ActionPlanBuilder {
	pool: PoolSettings,
	/// Deadline window in seconds applied when the intent does not carry one.
	default_deadline_secs: u64,
}

impl ActionPlanBuilder {
	pub fn new(pool: PoolSettings, default_deadline_secs: u64) -> Self {
		Self {
			pool,
			default_deadline_secs,
		}
	}

	/// Validates the parts of an intent that can be checked without touching
	/// the network. Fails before any RPC call is made.
	pub fn validate_intent(&self, intent: &SwapIntent) -> Result<(), OrderError> {
		if intent.amount_in.is_zero() {
			return Err(OrderError::InvalidIntent("amount_in is zero".to_string()));
		}
		if intent.token_in.0.len() != 20 {
			return Err(OrderError::InvalidIntent(format!(
				"token_in is {} bytes, expected 20",
				intent.token_in.0.len()
			)));
		}
		if intent.token_out.0.len() != 20 {
			return Err(OrderError::InvalidIntent(format!(
				"token_out is {} bytes, expected 20",
				intent.token_out.0.len()
			)));
		}
		if intent.token_in == intent.token_out {
			return Err(OrderError::InvalidIntent(
				"token_in and token_out are the same currency".to_string(),
			));
		}
		if intent.slippage_bps >= 10_000 {
			return Err(OrderError::InvalidIntent(format!(
				"slippage {} bps is not below 100%",
				intent.slippage_bps
			)));
		}
		Ok(())
	}

	/// Derives the pool key for an intent: currencies sorted ascending, pool
	/// settings stamped in.
	pub fn pool_key(&self, intent: &SwapIntent) -> PoolKey {
		self.pool_key_for_pair(&intent.token_in, &intent.token_out)
	}

	/// Pool key for an arbitrary token pair.
	pub fn pool_key_for_pair(&self, token_a: &Address, token_b: &Address) -> PoolKey {
		let (currency0, currency1) = if token_a.0 < token_b.0 {
			(token_a.clone(), token_b.clone())
		} else {
			(token_b.clone(), token_a.clone())
		};
		PoolKey {
			currency0,
			currency1,
			fee: self.pool.fee,
			tick_spacing: self.pool.tick_spacing,
			hooks: self.pool.hooks.clone(),
		}
	}

	/// Builds the complete plan for one swap attempt.
	///
	/// The action order is load-bearing: the swap accrues a debt in the input
	/// currency and a credit in the output currency, and the pool's
	/// accounting requires settling the debt before collecting the credit.
	pub fn build(
		&self,
		intent: &SwapIntent,
		pool_state: &PoolState,
		now: u64,
	) -> Result<ActionPlan, OrderError> {
		self.validate_intent(intent)?;

		let pool_key = self.pool_key(intent);
		let zero_for_one = intent.token_in == pool_key.currency0;

		let amount_out_minimum =
			minimum_output(intent, pool_state.sqrt_price_x96, zero_for_one)?;

		let swap_params = encode_swap_exact_in_single(
			&pool_key,
			zero_for_one,
			intent.amount_in,
			amount_out_minimum,
			intent.agent_id,
			&intent.proof,
		)?;
		let settle_params = encode_settle_all(&intent.token_in, intent.amount_in);
		let take_params = encode_take_all(&intent.token_out, amount_out_minimum);

		let actions = vec![
			Action {
				kind: ActionKind::SwapExactInSingle,
				params: swap_params,
			},
			Action {
				kind: ActionKind::SettleAll,
				params: settle_params,
			},
			Action {
				kind: ActionKind::TakeAll,
				params: take_params,
			},
		];

		let window = if intent.deadline_secs > 0 {
			intent.deadline_secs
		} else {
			self.default_deadline_secs
		};
		let deadline = now + window;

		let command = encode_execute(&actions, deadline);

		// Native-asset input rides along as transaction value; ERC-20 input
		// is pulled by the router through the allowance chain.
		let value = if intent.token_in.is_native() {
			intent.amount_in
		} else {
			U256::ZERO
		};

		Ok(ActionPlan {
			actions,
			command,
			value,
			deadline,
			amount_out_minimum,
		})
	}
}

/// Spot-price estimate of the swap output with the slippage tolerance
/// applied.
///
/// This is a quote, not AMM math: tick traversal is the pool's business. The
/// estimate prices the input at the current sqrt price and the slippage
/// tolerance absorbs both pool movement and the rounding here.
fn minimum_output(
	intent: &SwapIntent,
	sqrt_price_x96: U256,
	zero_for_one: bool,
) -> Result<U256, OrderError> {
	if sqrt_price_x96.is_zero() {
		return Err(OrderError::InvalidIntent(
			"pool reports zero price".to_string(),
		));
	}

	let sqrt_price = u256_to_f64(sqrt_price_x96) / 2f64.powi(96);
	let price = sqrt_price * sqrt_price;
	let amount_in = u256_to_f64(intent.amount_in);

	let expected_out = if zero_for_one {
		amount_in * price
	} else {
		amount_in / price
	};

	let tolerance = (10_000 - intent.slippage_bps) as f64 / 10_000.0;
	let min_out = expected_out * tolerance;
	if !min_out.is_finite() || min_out < 0.0 || min_out >= u128::MAX as f64 {
		return Err(OrderError::Encoding(
			"minimum output not representable".to_string(),
		));
	}

	Ok(U256::from(min_out as u128))
}

fn u256_to_f64(value: U256) -> f64 {
	value
		.as_limbs()
		.iter()
		.rev()
		.fold(0.0, |acc, &limb| acc * 2f64.powi(64) + limb as f64)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn addr(last: u8) -> Address {
		let mut bytes = vec![0u8; 20];
		bytes[19] = last;
		Address(bytes)
	}

	fn intent(amount_in: U256) -> SwapIntent {
		SwapIntent {
			amount_in,
			token_in: addr(1),
			token_out: addr(2),
			agent_id: U256::from(7u64),
			proof: vec![0xaa, 0xbb],
			slippage_bps: 50,
			deadline_secs: 0,
		}
	}

	fn pool_state() -> PoolState {
		PoolState {
			liquidity: 1_000_994_340_808_720,
			sqrt_price_x96: U256::from(1u64) << 96,
			tick: 0,
			fee: 0x800000,
			tick_spacing: 60,
			hook_address: addr(0xee),
		}
	}

	fn builder() -> ActionPlanBuilder {
		ActionPlanBuilder::new(
			PoolSettings {
				fee: 0x800000,
				tick_spacing: 60,
				hooks: addr(0xee),
			},
			3600,
		)
	}

	#[test]
	fn actions_are_ordered_swap_settle_take() {
		let plan = builder()
			.build(&intent(U256::from(10u64).pow(U256::from(15u32))), &pool_state(), 1_700_000_000)
			.unwrap();
		let kinds: Vec<ActionKind> = plan.actions.iter().map(|a| a.kind).collect();
		assert_eq!(
			kinds,
			vec![
				ActionKind::SwapExactInSingle,
				ActionKind::SettleAll,
				ActionKind::TakeAll
			]
		);
	}

	#[test]
	fn deadline_uses_default_window() {
		let plan = builder()
			.build(&intent(U256::from(1000u64)), &pool_state(), 1_700_000_000)
			.unwrap();
		assert_eq!(plan.deadline, 1_700_000_000 + 3600);
	}

	#[test]
	fn deadline_prefers_intent_window() {
		let mut i = intent(U256::from(1000u64));
		i.deadline_secs = 60;
		let plan = builder().build(&i, &pool_state(), 1_700_000_000).unwrap();
		assert_eq!(plan.deadline, 1_700_000_060);
	}

	#[test]
	fn zero_amount_is_rejected() {
		let err = builder()
			.build(&intent(U256::ZERO), &pool_state(), 0)
			.unwrap_err();
		assert!(matches!(err, OrderError::InvalidIntent(_)));
	}

	#[test]
	fn identical_currencies_are_rejected() {
		let mut i = intent(U256::from(1u64));
		i.token_out = i.token_in.clone();
		assert!(matches!(
			builder().build(&i, &pool_state(), 0),
			Err(OrderError::InvalidIntent(_))
		));
	}

	#[test]
	fn malformed_address_is_rejected() {
		let mut i = intent(U256::from(1u64));
		i.token_out = Address(vec![1, 2, 3]);
		assert!(matches!(
			builder().build(&i, &pool_state(), 0),
			Err(OrderError::InvalidIntent(_))
		));
	}

	#[test]
	fn currencies_sort_into_pool_key() {
		let mut i = intent(U256::from(1u64));
		i.token_in = addr(9);
		i.token_out = addr(3);
		let key = builder().pool_key(&i);
		assert_eq!(key.currency0, addr(3));
		assert_eq!(key.currency1, addr(9));
	}

	#[test]
	fn native_input_carries_value() {
		let mut i = intent(U256::from(5000u64));
		i.token_in = Address::zero();
		let plan = builder().build(&i, &pool_state(), 1_700_000_000).unwrap();
		assert_eq!(plan.value, U256::from(5000u64));
	}

	#[test]
	fn erc20_input_carries_no_value() {
		let plan = builder()
			.build(&intent(U256::from(5000u64)), &pool_state(), 1_700_000_000)
			.unwrap();
		assert_eq!(plan.value, U256::ZERO);
	}

	#[test]
	fn minimum_output_applies_slippage_at_unit_price() {
		// sqrt price 2^96 means a 1:1 spot price; 50 bps slippage leaves
		// 99.5% of the input as the floor.
		let amount = U256::from(10u64).pow(U256::from(18u32));
		let plan = builder()
			.build(&intent(amount), &pool_state(), 1_700_000_000)
			.unwrap();
		let lo = U256::from(994_000_000_000_000_000u64);
		let hi = U256::from(996_000_000_000_000_000u64);
		assert!(plan.amount_out_minimum >= lo && plan.amount_out_minimum <= hi);
	}
}
