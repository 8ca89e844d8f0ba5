pub mod aggregator;
pub mod contracts;
pub mod evm;
pub mod ledger;
pub mod prices;
pub mod senders;
pub mod traits;

pub use aggregator::ZeroExQuoteSource;
pub use evm::{connect_provider, parse_signer, EvmChainClient};
pub use ledger::HttpRewardLedger;
pub use prices::{HttpPriceSource, PublicIndexPriceSource};
pub use senders::{LegacyGasSender, ProviderSender};
pub use traits::{
    ChainClient, LegSimulator, PriceSource, QuoteRequest, QuoteSource, RewardLedger, SubmitError, TokenInfo,
    TxReceipt, TxRequest, TxSender,
};
