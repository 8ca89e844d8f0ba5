#![allow(dead_code)]

use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reward_sweep::adapters::contracts::{IRewardDistributor, ISwapExecutor, IERC20};
use reward_sweep::adapters::{
    ChainClient, LegSimulator, PriceSource, QuoteRequest, QuoteSource, RewardLedger, SubmitError,
    TokenInfo, TxReceipt, TxRequest, TxSender,
};
use reward_sweep::domain::{
    ClaimDescriptor, ClaimReading, Epoch, Quote, RewardClaim, SwapLeg, EPOCH_DURATION_SECS,
};
use reward_sweep::strategy::{
    CancelFlag, ClaimerConfig, Collaborators, OrchestratorConfig, PlannerConfig, PriceResolver,
    RewardToken, SlippageConfig, SwapSettings, SweepOrchestrator,
};
use reward_sweep::{Result, SweepError};

pub const CHAIN_ID: u64 = 8453;

pub fn wallet() -> Address {
    Address::repeat_byte(0xaa)
}

pub fn distributor() -> Address {
    Address::repeat_byte(0xd1)
}

pub fn executor() -> Address {
    Address::repeat_byte(0xe1)
}

pub fn target() -> Address {
    Address::repeat_byte(0xee)
}

pub fn router() -> Address {
    Address::repeat_byte(0x0e)
}

pub fn token(n: u8) -> Address {
    Address::with_last_byte(n)
}

pub fn epoch(week: u64) -> Epoch {
    Epoch(EPOCH_DURATION_SECS * (2900 + week))
}

/// Whole tokens at 18 decimals.
pub fn units(whole: u64) -> U256 {
    U256::from(whole) * U256::from(10u64).pow(U256::from(18u64))
}

/// Mutable chain state shared by the fake reader and the fake sender.
#[derive(Debug, Clone)]
pub struct ChainState {
    pub native_balance: U256,
    pub gas_price: u128,
    pub previews: HashMap<(Address, Epoch), U256>,
    pub distributor_balances: HashMap<Address, U256>,
    pub wallet_balances: HashMap<Address, U256>,
    pub allowances: HashMap<Address, U256>,
    pub token_info: HashMap<Address, TokenInfo>,
    pub total_staked: U256,
    pub has_claim_many: bool,
    pub fail_claim_reads: bool,
    /// Two tokens whose swaps revert when executed in the same call.
    pub conflicting: Option<(Address, Address)>,
}

impl Default for ChainState {
    fn default() -> Self {
        Self {
            native_balance: units(1),
            gas_price: 1_000_000_000,
            previews: HashMap::new(),
            distributor_balances: HashMap::new(),
            wallet_balances: HashMap::new(),
            allowances: HashMap::new(),
            token_info: HashMap::new(),
            total_staked: units(1_000),
            has_claim_many: true,
            fail_claim_reads: false,
            conflicting: None,
        }
    }
}

pub type SharedState = Arc<Mutex<ChainState>>;

pub struct FakeChain {
    state: SharedState,
}

#[async_trait]
impl ChainClient for FakeChain {
    fn chain_id(&self) -> u64 {
        CHAIN_ID
    }

    async fn native_balance(&self, _owner: Address) -> Result<U256> {
        Ok(self.state.lock().unwrap().native_balance)
    }

    async fn gas_price(&self) -> Result<u128> {
        Ok(self.state.lock().unwrap().gas_price)
    }

    async fn read_claim_state(
        &self,
        _wallet: Address,
        _distributor: Address,
        descriptors: &[ClaimDescriptor],
    ) -> Result<Vec<Option<ClaimReading>>> {
        let state = self.state.lock().unwrap();
        if state.fail_claim_reads {
            return Err(SweepError::Rpc("multicall reverted".to_string()));
        }
        Ok(descriptors
            .iter()
            .map(|d| {
                Some(ClaimReading {
                    preview: state
                        .previews
                        .get(&(d.token, d.epoch))
                        .copied()
                        .unwrap_or_default(),
                    distributor_balance: state
                        .distributor_balances
                        .get(&d.token)
                        .copied()
                        .unwrap_or_default(),
                })
            })
            .collect())
    }

    async fn balances(&self, _owner: Address, tokens: &[Address]) -> Result<Vec<U256>> {
        let state = self.state.lock().unwrap();
        Ok(tokens
            .iter()
            .map(|t| state.wallet_balances.get(t).copied().unwrap_or_default())
            .collect())
    }

    async fn allowances(
        &self,
        _owner: Address,
        _spender: Address,
        tokens: &[Address],
    ) -> Result<Vec<U256>> {
        let state = self.state.lock().unwrap();
        Ok(tokens
            .iter()
            .map(|t| state.allowances.get(t).copied().unwrap_or_default())
            .collect())
    }

    async fn token_info(&self, tokens: &[Address]) -> Result<Vec<Option<TokenInfo>>> {
        let state = self.state.lock().unwrap();
        Ok(tokens.iter().map(|t| state.token_info.get(t).cloned()).collect())
    }

    async fn total_staked(&self, _distributor: Address) -> Result<U256> {
        Ok(self.state.lock().unwrap().total_staked)
    }

    async fn has_selector(&self, _contract: Address, _selector: [u8; 4]) -> Result<bool> {
        Ok(self.state.lock().unwrap().has_claim_many)
    }

    async fn estimate_gas(&self, _from: Address, _tx: &TxRequest) -> Result<u64> {
        Ok(100_000)
    }

    async fn call(&self, _from: Address, _tx: &TxRequest) -> Result<Bytes> {
        Ok(Bytes::new())
    }
}

/// Records every transaction and applies its effect to the shared state.
pub struct FakeSender {
    state: SharedState,
    sent: Mutex<Vec<TxRequest>>,
    scripted: Mutex<HashMap<usize, SubmitError>>,
    cancel_after: Mutex<Option<(usize, CancelFlag)>>,
    delay: Mutex<Duration>,
}

impl FakeSender {
    fn new(state: SharedState) -> Self {
        Self {
            state,
            sent: Mutex::new(Vec::new()),
            scripted: Mutex::new(HashMap::new()),
            cancel_after: Mutex::new(None),
            delay: Mutex::new(Duration::ZERO),
        }
    }

    /// Make the `index`-th send (0-based) fail with `error`.
    pub fn fail_at(&self, index: usize, error: SubmitError) {
        self.scripted.lock().unwrap().insert(index, error);
    }

    pub fn reject_at(&self, index: usize) {
        self.fail_at(index, SubmitError::UserRejected("User rejected the request".to_string()));
    }

    /// Trip `flag` once `count` transactions have been sent.
    pub fn cancel_after(&self, count: usize, flag: CancelFlag) {
        *self.cancel_after.lock().unwrap() = Some((count, flag));
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn sent(&self) -> Vec<TxRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn claim_many_calls(&self) -> Vec<IRewardDistributor::claimManyCall> {
        self.sent()
            .iter()
            .filter_map(|tx| IRewardDistributor::claimManyCall::abi_decode(&tx.data).ok())
            .collect()
    }

    pub fn single_claims(&self) -> Vec<IRewardDistributor::claimCall> {
        self.sent()
            .iter()
            .filter_map(|tx| IRewardDistributor::claimCall::abi_decode(&tx.data).ok())
            .collect()
    }

    /// Tokens an `approve` was sent for, in order.
    pub fn approvals(&self) -> Vec<Address> {
        self.sent()
            .iter()
            .filter(|tx| IERC20::approveCall::abi_decode(&tx.data).is_ok())
            .map(|tx| tx.to)
            .collect()
    }

    pub fn swap_batches(&self) -> Vec<ISwapExecutor::executeSwapsCall> {
        self.sent()
            .iter()
            .filter_map(|tx| ISwapExecutor::executeSwapsCall::abi_decode(&tx.data).ok())
            .collect()
    }

    fn apply(&self, tx: &TxRequest) -> std::result::Result<(), String> {
        let mut state = self.state.lock().unwrap();
        if let Ok(call) = IRewardDistributor::claimManyCall::abi_decode(&tx.data) {
            let pairs: Vec<(Address, Epoch)> = call
                .tokens
                .iter()
                .zip(&call.epochs)
                .map(|(t, e)| (*t, Epoch(e.to::<u64>())))
                .collect();
            return apply_claims(&mut state, &pairs);
        }
        if let Ok(call) = IRewardDistributor::claimCall::abi_decode(&tx.data) {
            return apply_claims(&mut state, &[(call.token, Epoch(call.epoch.to::<u64>()))]);
        }
        if let Ok(call) = IERC20::approveCall::abi_decode(&tx.data) {
            state.allowances.insert(tx.to, call.amount);
            return Ok(());
        }
        if let Ok(call) = ISwapExecutor::executeSwapsCall::abi_decode(&tx.data) {
            let tokens: Vec<Address> = call.steps.iter().map(|s| s.tokenIn).collect();
            if conflicts(&state, &tokens) {
                return Err("execution reverted: shared pool drained".to_string());
            }
            for step in call.steps {
                let held = state.wallet_balances.entry(step.tokenIn).or_default();
                *held = held.saturating_sub(step.amountIn);
                let out = state.wallet_balances.entry(step.tokenOut).or_default();
                *out = out.saturating_add(step.minAmountOut);
            }
            return Ok(());
        }
        Err("unknown calldata".to_string())
    }
}

fn conflicts(state: &ChainState, tokens: &[Address]) -> bool {
    state
        .conflicting
        .is_some_and(|(a, b)| tokens.contains(&a) && tokens.contains(&b))
}

fn apply_claims(state: &mut ChainState, pairs: &[(Address, Epoch)]) -> std::result::Result<(), String> {
    let mut needed: HashMap<Address, U256> = HashMap::new();
    for key in pairs {
        let preview = state.previews.get(key).copied().unwrap_or_default();
        *needed.entry(key.0).or_default() += preview;
    }
    for (token, amount) in &needed {
        let balance = state.distributor_balances.get(token).copied().unwrap_or_default();
        if balance < *amount {
            return Err("ERC20: transfer amount exceeds balance".to_string());
        }
    }
    for key in pairs {
        if let Some(preview) = state.previews.remove(key) {
            *state.distributor_balances.entry(key.0).or_default() -= preview;
            *state.wallet_balances.entry(key.0).or_default() += preview;
        }
    }
    Ok(())
}

fn tx_hash(index: usize) -> TxHash {
    TxHash::left_padding_from(&(index as u64 + 1).to_be_bytes())
}

#[async_trait]
impl TxSender for FakeSender {
    fn name(&self) -> &str {
        "fake"
    }

    async fn send_and_confirm(
        &self,
        tx: &TxRequest,
    ) -> std::result::Result<TxReceipt, SubmitError> {
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let index = {
            let mut sent = self.sent.lock().unwrap();
            sent.push(tx.clone());
            sent.len() - 1
        };
        if let Some((count, flag)) = self.cancel_after.lock().unwrap().as_ref() {
            if index + 1 >= *count {
                flag.cancel();
            }
        }

        if let Some(error) = self.scripted.lock().unwrap().remove(&index) {
            return Err(error);
        }
        match self.apply(tx) {
            Ok(()) => Ok(TxReceipt {
                tx_hash: tx_hash(index),
                block_number: Some(100 + index as u64),
                gas_used: 90_000,
            }),
            Err(reason) => Err(SubmitError::Reverted {
                tx_hash: tx_hash(index),
                reason,
            }),
        }
    }
}

pub struct FakeLedger {
    claims: Vec<RewardClaim>,
}

#[async_trait]
impl RewardLedger for FakeLedger {
    async fn pending_claims(&self, _wallet: Address) -> Result<Vec<RewardClaim>> {
        Ok(self.claims.clone())
    }
}

pub struct StaticPrices {
    prices: HashMap<Address, Decimal>,
}

#[async_trait]
impl PriceSource for StaticPrices {
    fn name(&self) -> &str {
        "static"
    }

    async fn prices(&self, _chain_id: u64, tokens: &[Address]) -> Result<HashMap<Address, Decimal>> {
        Ok(tokens
            .iter()
            .filter_map(|t| self.prices.get(t).map(|p| (*t, *p)))
            .collect())
    }
}

/// Quotes 1:1 with a configurable impact per token.
pub struct FakeQuotes {
    failing: HashSet<Address>,
    impacts: HashMap<Address, Decimal>,
    pub requests: Mutex<Vec<QuoteRequest>>,
}

#[async_trait]
impl QuoteSource for FakeQuotes {
    async fn quote(&self, request: &QuoteRequest) -> Result<Quote> {
        self.requests.lock().unwrap().push(request.clone());
        if self.failing.contains(&request.sell_token) {
            return Err(SweepError::Quote("no route".to_string()));
        }
        Ok(Quote {
            buy_amount: request.sell_amount,
            price_impact: self
                .impacts
                .get(&request.sell_token)
                .copied()
                .unwrap_or_default(),
            router_target: router(),
            router_data: Bytes::from(request.sell_token.to_vec()),
            allowance_target: None,
        })
    }
}

/// Reverts any group containing a poisoned input token.
pub struct FakeSimulator {
    state: SharedState,
    poisoned: HashSet<Address>,
    calls: AtomicUsize,
}

impl FakeSimulator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LegSimulator for FakeSimulator {
    async fn simulate(&self, _from: Address, legs: &[SwapLeg]) -> std::result::Result<(), String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(leg) = legs.iter().find(|leg| self.poisoned.contains(&leg.token_in)) {
            return Err(format!("execution reverted: {} transfer hook", leg.symbol));
        }
        let tokens: Vec<Address> = legs.iter().map(|leg| leg.token_in).collect();
        if conflicts(&self.state.lock().unwrap(), &tokens) {
            return Err("execution reverted: shared pool drained".to_string());
        }
        Ok(())
    }
}

/// Declarative setup for one orchestrator run.
pub struct Scenario {
    pub state: ChainState,
    pub claims: Vec<RewardClaim>,
    pub prices: HashMap<Address, Decimal>,
    pub failing_quotes: HashSet<Address>,
    pub impacts: HashMap<Address, Decimal>,
    pub poisoned: HashSet<Address>,
    pub signer: Option<Address>,
    /// Reward tokens known from configuration rather than the ledger.
    pub reward_tokens: Vec<RewardToken>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            state: ChainState::default(),
            claims: Vec::new(),
            prices: HashMap::new(),
            failing_quotes: HashSet::new(),
            impacts: HashMap::new(),
            poisoned: HashSet::new(),
            signer: Some(wallet()),
            reward_tokens: Vec::new(),
        }
    }
}

impl Scenario {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&mut self, token: Address, symbol: &str) {
        self.state.token_info.entry(token).or_insert_with(|| TokenInfo {
            decimals: 18,
            symbol: symbol.to_string(),
        });
    }

    /// A pending, fully funded reward of `amount` for `epoch`.
    pub fn reward(&mut self, token: Address, symbol: &str, epoch: Epoch, amount: U256) -> &mut Self {
        self.register(token, symbol);
        self.claims.push(RewardClaim {
            token,
            epoch,
            raw_amount: amount,
            decimals: 18,
            symbol: symbol.to_string(),
            source_price_usd: None,
        });
        self.state.previews.insert((token, epoch), amount);
        *self.state.distributor_balances.entry(token).or_default() += amount;
        self
    }

    /// A configured reward token already sitting in the wallet, with no ledger row.
    pub fn holding(&mut self, token: Address, symbol: &str, balance: U256) -> &mut Self {
        self.register(token, symbol);
        if !self.reward_tokens.iter().any(|t| t.address == token) {
            self.reward_tokens.push(RewardToken {
                address: token,
                symbol: symbol.to_string(),
                decimals: 18,
            });
        }
        self.state.wallet_balances.insert(token, balance);
        self
    }

    pub fn price(&mut self, token: Address, usd: Decimal) -> &mut Self {
        self.prices.insert(token, usd);
        self
    }

    pub fn distributor_balance(&mut self, token: Address, balance: U256) -> &mut Self {
        self.state.distributor_balances.insert(token, balance);
        self
    }

    pub fn config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            distributor: distributor(),
            executor: executor(),
            claim: ClaimerConfig::default(),
            planner: PlannerConfig {
                quote_batch_size: 5,
                quote_batch_delay_ms: 0,
            },
            slippage: SlippageConfig::default(),
            swap: SwapSettings::default(),
            reward_tokens: self.reward_tokens.clone(),
        }
    }

    pub fn build(&self) -> Harness {
        let state: SharedState = Arc::new(Mutex::new(self.state.clone()));
        let sender = Arc::new(FakeSender::new(state.clone()));
        let quotes = Arc::new(FakeQuotes {
            failing: self.failing_quotes.clone(),
            impacts: self.impacts.clone(),
            requests: Mutex::new(Vec::new()),
        });
        let simulator = Arc::new(FakeSimulator {
            state: state.clone(),
            poisoned: self.poisoned.clone(),
            calls: AtomicUsize::new(0),
        });

        let collaborators = Collaborators {
            chain: Arc::new(FakeChain {
                state: state.clone(),
            }),
            sender: sender.clone(),
            ledger: Arc::new(FakeLedger {
                claims: self.claims.clone(),
            }),
            prices: PriceResolver::new(
                Arc::new(StaticPrices {
                    prices: self.prices.clone(),
                }),
                None,
            ),
            quotes: quotes.clone(),
            simulator: simulator.clone(),
            signer: self.signer,
        };

        Harness {
            state,
            sender,
            quotes,
            simulator,
            orchestrator: Arc::new(SweepOrchestrator::new(collaborators, self.config())),
        }
    }
}

pub struct Harness {
    pub state: SharedState,
    pub sender: Arc<FakeSender>,
    pub quotes: Arc<FakeQuotes>,
    pub simulator: Arc<FakeSimulator>,
    pub orchestrator: Arc<SweepOrchestrator>,
}

impl Harness {
    pub fn wallet_balance(&self, token: Address) -> U256 {
        self.state
            .lock()
            .unwrap()
            .wallet_balances
            .get(&token)
            .copied()
            .unwrap_or_default()
    }

    pub fn chain(&self) -> FakeChain {
        FakeChain {
            state: self.state.clone(),
        }
    }
}
