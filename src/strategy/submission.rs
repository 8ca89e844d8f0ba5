//! Ordered fallback chain of submission strategies. First success wins.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::adapters::{SubmitError, TxReceipt, TxRequest, TxSender};

pub struct SubmissionChain {
    senders: Vec<Arc<dyn TxSender>>,
}

impl SubmissionChain {
    pub fn new(senders: Vec<Arc<dyn TxSender>>) -> Self {
        Self { senders }
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

#[async_trait]
impl TxSender for SubmissionChain {
    fn name(&self) -> &str {
        "chain"
    }

    /// Tries each sender in order. Only pre-broadcast failures move on to the next
    /// sender; anything that may have reached the network is returned as-is.
    async fn send_and_confirm(&self, tx: &TxRequest) -> Result<TxReceipt, SubmitError> {
        let mut last_error = None;
        for sender in &self.senders {
            match sender.send_and_confirm(tx).await {
                Ok(receipt) => {
                    info!(sender = sender.name(), tx_hash = %receipt.tx_hash, label = %tx.label, "transaction confirmed");
                    return Ok(receipt);
                }
                Err(err) if err.falls_through() => {
                    warn!(sender = sender.name(), label = %tx.label, error = %err, "submission strategy failed, trying next");
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_error.unwrap_or_else(|| {
            SubmitError::PreBroadcast("no submission strategies configured".to_string())
        }))
    }
}
