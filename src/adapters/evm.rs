//! alloy-backed chain client.

use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use super::contracts::{bytecode_has_selector, IRewardDistributor, Multicall3, IERC20};
use super::traits::{ChainClient, TokenInfo, TxRequest};
use crate::domain::{ClaimDescriptor, ClaimReading};
use crate::error::{Result, SweepError};

const MULTICALL_BATCH_SIZE: usize = 200;

/// Build an HTTP provider, with a wallet filler when a signer is given.
pub fn connect_provider(rpc_url: &str, signer: Option<PrivateKeySigner>) -> Result<DynProvider> {
    let url = rpc_url
        .parse()
        .map_err(|e| SweepError::InvalidConfig(format!("Invalid RPC URL: {}", e)))?;
    let provider = match signer {
        Some(signer) => ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(url)
            .erased(),
        None => ProviderBuilder::new().connect_http(url).erased(),
    };
    Ok(provider)
}

pub fn parse_signer(private_key: &str) -> Result<PrivateKeySigner> {
    private_key
        .trim()
        .parse()
        .map_err(|e| SweepError::Wallet(format!("Invalid private key: {}", e)))
}

fn rpc_err(context: &str, err: impl std::fmt::Display) -> SweepError {
    SweepError::Rpc(format!("{}: {}", context, err))
}

pub struct EvmChainClient {
    provider: DynProvider,
    chain_id: u64,
    multicall: Address,
}

impl EvmChainClient {
    /// Connect and check that the node serves the expected chain.
    pub async fn connect(
        provider: DynProvider,
        expected_chain_id: u64,
        multicall: Address,
    ) -> Result<Self> {
        let chain_id = provider
            .get_chain_id()
            .await
            .map_err(|e| rpc_err("Failed to read chain id", e))?;
        if chain_id != expected_chain_id {
            return Err(SweepError::UnsupportedNetwork(chain_id));
        }
        Ok(Self {
            provider,
            chain_id,
            multicall,
        })
    }

    pub fn provider(&self) -> &DynProvider {
        &self.provider
    }

    /// Run calls through Multicall3 in bounded chunks, returning `None` for failed calls.
    async fn aggregate(&self, calls: Vec<Multicall3::Call3>) -> Result<Vec<Option<Bytes>>> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }
        let multicall = Multicall3::new(self.multicall, self.provider.clone());
        let mut out = Vec::with_capacity(calls.len());
        for chunk in calls.chunks(MULTICALL_BATCH_SIZE) {
            let results = multicall
                .aggregate3(chunk.to_vec())
                .call()
                .await
                .map_err(|e| rpc_err("Multicall failed", e))?;
            if results.len() != chunk.len() {
                return Err(SweepError::Rpc(format!(
                    "Multicall returned {} results for {} calls",
                    results.len(),
                    chunk.len()
                )));
            }
            out.extend(results.into_iter().map(|r| {
                if r.success {
                    Some(r.returnData)
                } else {
                    None
                }
            }));
        }
        Ok(out)
    }

    fn request(from: Address, tx: &TxRequest) -> TransactionRequest {
        let mut request = TransactionRequest::default()
            .with_from(from)
            .with_to(tx.to)
            .with_input(tx.data.clone());
        if let Some(gas_limit) = tx.gas_limit {
            request = request.with_gas_limit(gas_limit);
        }
        request
    }
}

fn call3(target: Address, data: Vec<u8>) -> Multicall3::Call3 {
    Multicall3::Call3 {
        target,
        allowFailure: true,
        callData: data.into(),
    }
}

#[async_trait]
impl ChainClient for EvmChainClient {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn native_balance(&self, owner: Address) -> Result<U256> {
        self.provider
            .get_balance(owner)
            .await
            .map_err(|e| rpc_err("Failed to read native balance", e))
    }

    async fn gas_price(&self) -> Result<u128> {
        self.provider
            .get_gas_price()
            .await
            .map_err(|e| rpc_err("Failed to read gas price", e))
    }

    #[instrument(skip(self, descriptors), fields(count = descriptors.len()))]
    async fn read_claim_state(
        &self,
        wallet: Address,
        distributor: Address,
        descriptors: &[ClaimDescriptor],
    ) -> Result<Vec<Option<ClaimReading>>> {
        let mut calls = Vec::with_capacity(descriptors.len() * 2);
        for d in descriptors {
            calls.push(call3(
                distributor,
                IRewardDistributor::previewClaimCall {
                    account: wallet,
                    token: d.token,
                    epoch: d.epoch.as_u256(),
                }
                .abi_encode(),
            ));
            calls.push(call3(
                d.token,
                IERC20::balanceOfCall { owner: distributor }.abi_encode(),
            ));
        }

        let raw = self.aggregate(calls).await?;
        let readings = raw
            .chunks(2)
            .zip(descriptors)
            .map(|(pair, d)| {
                let preview = pair[0]
                    .as_ref()
                    .and_then(|data| IRewardDistributor::previewClaimCall::abi_decode_returns(data).ok());
                let balance = pair[1]
                    .as_ref()
                    .and_then(|data| IERC20::balanceOfCall::abi_decode_returns(data).ok());
                match (preview, balance) {
                    (Some(preview), Some(distributor_balance)) => Some(ClaimReading {
                        preview,
                        distributor_balance,
                    }),
                    _ => {
                        warn!(token = %d.token, epoch = %d.epoch, "claim state read failed");
                        None
                    }
                }
            })
            .collect();
        Ok(readings)
    }

    async fn balances(&self, owner: Address, tokens: &[Address]) -> Result<Vec<U256>> {
        let data = IERC20::balanceOfCall { owner }.abi_encode();
        let calls = tokens.iter().map(|t| call3(*t, data.clone())).collect();
        let raw = self.aggregate(calls).await?;
        Ok(raw
            .into_iter()
            .zip(tokens)
            .map(|(r, token)| {
                r.and_then(|data| IERC20::balanceOfCall::abi_decode_returns(&data).ok())
                    .unwrap_or_else(|| {
                        debug!(%token, "balanceOf failed, treating as zero");
                        U256::ZERO
                    })
            })
            .collect())
    }

    async fn allowances(
        &self,
        owner: Address,
        spender: Address,
        tokens: &[Address],
    ) -> Result<Vec<U256>> {
        let data = IERC20::allowanceCall { owner, spender }.abi_encode();
        let calls = tokens.iter().map(|t| call3(*t, data.clone())).collect();
        let raw = self.aggregate(calls).await?;
        Ok(raw
            .into_iter()
            .map(|r| {
                r.and_then(|data| IERC20::allowanceCall::abi_decode_returns(&data).ok())
                    .unwrap_or(U256::ZERO)
            })
            .collect())
    }

    async fn token_info(&self, tokens: &[Address]) -> Result<Vec<Option<TokenInfo>>> {
        let mut calls = Vec::with_capacity(tokens.len() * 2);
        for token in tokens {
            calls.push(call3(*token, IERC20::decimalsCall {}.abi_encode()));
            calls.push(call3(*token, IERC20::symbolCall {}.abi_encode()));
        }
        let raw = self.aggregate(calls).await?;
        Ok(raw
            .chunks(2)
            .map(|pair| {
                let decimals = pair[0]
                    .as_ref()
                    .and_then(|data| IERC20::decimalsCall::abi_decode_returns(data).ok())?;
                let symbol = pair[1]
                    .as_ref()
                    .and_then(|data| IERC20::symbolCall::abi_decode_returns(data).ok())
                    .unwrap_or_default();
                Some(TokenInfo { decimals, symbol })
            })
            .collect())
    }

    async fn total_staked(&self, distributor: Address) -> Result<U256> {
        let tx = TxRequest::new(
            distributor,
            IRewardDistributor::totalStakedCall {}.abi_encode(),
            "totalStaked",
        );
        let data = self.call(Address::ZERO, &tx).await?;
        IRewardDistributor::totalStakedCall::abi_decode_returns(&data)
            .map_err(|e| rpc_err("Failed to decode totalStaked", e))
    }

    async fn has_selector(&self, contract: Address, selector: [u8; 4]) -> Result<bool> {
        let code = self
            .provider
            .get_code_at(contract)
            .await
            .map_err(|e| rpc_err("Failed to read contract code", e))?;
        Ok(bytecode_has_selector(&code, selector))
    }

    async fn estimate_gas(&self, from: Address, tx: &TxRequest) -> Result<u64> {
        self.provider
            .estimate_gas(Self::request(from, tx))
            .await
            .map_err(|e| rpc_err(&format!("Gas estimation failed for {}", tx.label), e))
    }

    async fn call(&self, from: Address, tx: &TxRequest) -> Result<Bytes> {
        self.provider
            .call(Self::request(from, tx))
            .await
            .map_err(|e| SweepError::Simulation(e.to_string()))
    }
}
