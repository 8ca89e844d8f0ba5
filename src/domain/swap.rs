use alloy::primitives::{Address, Bytes, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Wallet balance for one reward token, independent of claim state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalletHolding {
    pub token: Address,
    pub symbol: String,
    pub decimals: u8,
    pub wallet_balance: U256,
}

/// Token that passed price screening and may be converted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwapCandidate {
    pub token: Address,
    pub decimals: u8,
    pub symbol: String,
    pub amount_in: U256,
    pub price_usd: Decimal,
}

impl SwapCandidate {
    pub fn usd_value(&self) -> Decimal {
        super::units::to_decimal_units(self.amount_in, self.decimals) * self.price_usd
    }
}

/// Aggregator quote. Only lives for one plan build.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub buy_amount: U256,
    /// Estimated price impact as a fraction (0.01 = 1%).
    pub price_impact: Decimal,
    pub router_target: Address,
    pub router_data: Bytes,
    /// Spender the aggregator expects to be approved, when it reports one.
    pub allowance_target: Option<Address>,
}

/// Opaque router call carried by a swap leg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouterCall {
    pub target: Address,
    pub data: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum LegKind {
    /// Executor forwards `encoded_call` to an aggregator router.
    Aggregator = 0,
}

impl LegKind {
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

/// Unit submitted to the on-chain swap executor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwapLeg {
    pub kind: LegKind,
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: U256,
    pub min_amount_out: U256,
    pub encoded_call: RouterCall,
    pub symbol: String,
}

/// Ordered legs submitted atomically in one executor call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SwapPlan {
    pub legs: Vec<SwapLeg>,
}

impl SwapPlan {
    pub fn new(legs: Vec<SwapLeg>) -> Self {
        Self { legs }
    }

    pub fn len(&self) -> usize {
        self.legs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.legs.is_empty()
    }

    /// Execution batches of at most `size` legs, in plan order.
    pub fn batches(&self, size: usize) -> impl Iterator<Item = &[SwapLeg]> {
        self.legs.chunks(size.max(1))
    }
}
