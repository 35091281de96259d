//! Nonce allocation for the shared signing account.
//!
//! The chain's pending nonce is authoritative: other processes or manual interventions may
//! submit for the same account, so every allocation re-queries it. The query and the hand-out
//! happen under the sequence lock, which makes allocation order equal lock acquisition order.
//!
//! A node may not count a just-broadcast transaction as pending yet. To keep two concurrent
//! callers from receiving the same nonce in that window, the allocator also remembers
//! `last + 1` as a floor. Any failed attempt drops the floor so the chain's view wins again
//! and no gap is introduced.

use std::sync::Arc;

use crate::blockchain::client::ChainClient;
use crate::blockchain::signer::SignerContext;
use crate::blockchain::types::BlockchainResult;
use crate::observability::metrics;

/// Hands out nonces for the signer, one allocation at a time.
#[derive(Clone)]
pub struct NonceAllocator {
    client: Arc<dyn ChainClient>,
    signer: Arc<SignerContext>,
}

impl NonceAllocator {
    pub fn new(client: Arc<dyn ChainClient>, signer: Arc<SignerContext>) -> Self {
        Self { client, signer }
    }

    /// Allocate the next nonce.
    ///
    /// Fails if the pending nonce cannot be read from the chain.
    pub async fn next_nonce(&self) -> BlockchainResult<u64> {
        let mut state = self.signer.lock_sequence().await;
        let address = self.signer.address();

        let pending = self.client.pending_nonce(address).await?;
        let nonce = match state.floor {
            Some(floor) if floor > pending => {
                tracing::debug!(
                    %address,
                    pending,
                    floor,
                    "Chain has not caught up with local allocations, using floor"
                );
                floor
            }
            _ => pending,
        };

        state.floor = Some(nonce + 1);
        metrics::record_nonce(nonce);
        tracing::debug!(%address, nonce, "Nonce allocated");

        Ok(nonce)
    }

    /// Forget the local floor after any attempt failed.
    ///
    /// The floor is cleared whichever allocation set it: if an older nonce failed while a
    /// newer one is in flight, the chain's pending nonce points back at the failed one and the
    /// next allocation fills that gap.
    pub async fn invalidate(&self) {
        let mut state = self.signer.lock_sequence().await;
        if let Some(floor) = state.floor.take() {
            tracing::debug!(address = %self.signer.address(), floor, "Nonce floor reset");
        }
    }
}

impl std::fmt::Debug for NonceAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceAllocator")
            .field("address", &self.signer.address())
            .finish()
    }
}
