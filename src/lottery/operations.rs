//! Lottery use cases expressed as coordinated transactions.
//!
//! Each operation encodes one contract call and hands the coordinator a closure that stamps
//! the allocated `TxParams` onto it and submits. Confirmation is left to the caller except in
//! `draw`, which must see the state transition mined before it can post results.

use std::sync::Arc;
use std::time::Duration;

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, U256};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolCall;
use tokio_util::sync::CancellationToken;

use crate::blockchain::{
    ChainClient, ConfirmationStatus, EstimationPayload, SubmittedTx, TransactionCoordinator,
    TxMonitor,
};
use crate::config::LotteryConfig;
use crate::lottery::contracts::{ILOTToken, ILotteryManager, ISimpleRollout, LotteryState};
use crate::lottery::types::{DeployedContract, LotteryError, LotteryResult, Stablecoin, BET_NUMBERS};

/// Submits lottery contract operations through the shared coordinator.
#[derive(Clone)]
pub struct LotteryOperations {
    coordinator: TransactionCoordinator,
    monitor: TxMonitor,
    token: Option<Address>,
    rollout: Option<Address>,
    simulate: bool,
}

impl LotteryOperations {
    pub fn new(
        coordinator: TransactionCoordinator,
        monitor: TxMonitor,
        config: &LotteryConfig,
    ) -> LotteryResult<Self> {
        Ok(Self {
            coordinator,
            monitor,
            token: parse_optional_address("token_contract_address", &config.token_contract_address)?,
            rollout: parse_optional_address("rollout_contract_address", &config.rollout_contract_address)?,
            simulate: false,
        })
    }

    /// Simulate every call for its gas limit instead of relying on usage history.
    ///
    /// State transitions are always simulated.
    pub fn with_simulation(mut self, simulate: bool) -> Self {
        self.simulate = simulate;
        self
    }

    pub fn coordinator(&self) -> &TransactionCoordinator {
        &self.coordinator
    }

    /// Deploy a contract from creation bytecode followed by ABI-encoded constructor arguments.
    pub async fn deploy_contract(
        &self,
        cancel: &CancellationToken,
        bytecode: Bytes,
        constructor_args: Bytes,
    ) -> LotteryResult<DeployedContract> {
        let code: Bytes = [bytecode.as_ref(), constructor_args.as_ref()].concat().into();
        let payload = EstimationPayload::deploy(code.clone());
        let client = self.coordinator.client().clone();

        let tx = self
            .coordinator
            .run_transaction(cancel, self.simulate.then_some(&payload), |params| {
                let request = params.apply(TransactionRequest::default().with_deploy_code(code.clone()));
                submit(client.clone(), request)
            })
            .await?;

        let address = self.coordinator.signer().address().create(tx.nonce);
        tracing::info!(contract = %address, tx_hash = %tx.tx_hash, "Contract deployment submitted");
        Ok(DeployedContract { address, tx })
    }

    /// Record a bet of `amount` on `numbers` for the lottery at `lottery`.
    pub async fn record_bet(
        &self,
        cancel: &CancellationToken,
        lottery: Address,
        amount: U256,
        numbers: &[U256],
    ) -> LotteryResult<SubmittedTx> {
        if numbers.len() != BET_NUMBERS {
            return Err(LotteryError::InvalidBet(format!(
                "must contain exactly {} numbers, got {}",
                BET_NUMBERS,
                numbers.len()
            )));
        }
        let token = self.require(self.token, "token_contract_address")?;
        let input = ILOTToken::buyCall {
            placeAddr: lottery,
            _amount: amount,
            target: numbers.to_vec(),
        }
        .abi_encode();

        let tx = self.call(cancel, token, input.into()).await?;
        tracing::info!(lottery = %lottery, tx_hash = %tx.tx_hash, "Bet submitted");
        Ok(tx)
    }

    /// Move the lottery manager at `lottery` into `state`.
    pub async fn transition_state(
        &self,
        cancel: &CancellationToken,
        lottery: Address,
        state: LotteryState,
    ) -> LotteryResult<SubmittedTx> {
        let input = ILotteryManager::transStateCall { state: state.as_u8() }.abi_encode();
        let tx = self.call_with(cancel, lottery, input.into(), true).await?;
        tracing::info!(lottery = %lottery, state = ?state, tx_hash = %tx.tx_hash, "State transition submitted");
        Ok(tx)
    }

    /// Post draw results to the lottery manager.
    pub async fn rollout(
        &self,
        cancel: &CancellationToken,
        lottery: Address,
        results: Vec<U256>,
    ) -> LotteryResult<SubmittedTx> {
        let input = ILotteryManager::rolloutCallbackCall { results }.abi_encode();
        self.call(cancel, lottery, input.into()).await
    }

    /// Ask the randomness contract to roll for `lottery`.
    pub async fn request_rollout(
        &self,
        cancel: &CancellationToken,
        lottery: Address,
    ) -> LotteryResult<SubmittedTx> {
        let rollout = self.require(self.rollout, "rollout_contract_address")?;
        let input = ISimpleRollout::rolloutCallCall { rolloutcb: lottery }.abi_encode();
        self.call(cancel, rollout, input.into()).await
    }

    /// Draw: ensure the lottery is in the rollout state, then post `results`.
    ///
    /// The state transition is waited on before results are posted.
    pub async fn draw(
        &self,
        cancel: &CancellationToken,
        lottery: Address,
        results: Vec<U256>,
        confirmation_timeout: Duration,
    ) -> LotteryResult<SubmittedTx> {
        let state = self.current_state(lottery).await?;
        if state != LotteryState::Rollout {
            let transition = self
                .transition_state(cancel, lottery, LotteryState::Rollout)
                .await?;
            match self
                .monitor
                .wait_for_confirmation(transition.tx_hash, confirmation_timeout)
                .await?
            {
                ConfirmationStatus::Confirmed { .. } => {}
                other => {
                    return Err(LotteryError::TransitionFailed {
                        tx_hash: transition.tx_hash,
                        status: format!("{:?}", other),
                    })
                }
            }
        }

        let tx = self.rollout(cancel, lottery, results).await?;
        tracing::info!(lottery = %lottery, tx_hash = %tx.tx_hash, "Draw results submitted");
        Ok(tx)
    }

    /// Register or update a stablecoin accepted by the LOT token.
    pub async fn set_stablecoin(
        &self,
        cancel: &CancellationToken,
        coin: &Stablecoin,
    ) -> LotteryResult<SubmittedTx> {
        let token = self.require(self.token, "token_contract_address")?;
        let input = ILOTToken::setStablecoinCall {
            stablecoin: coin.address,
            name: coin.name.clone(),
            rate: coin.rate,
            receiver: coin.receiver,
        }
        .abi_encode();
        let tx = self.call(cancel, token, input.into()).await?;
        tracing::info!(stablecoin = %coin.address, name = %coin.name, tx_hash = %tx.tx_hash, "Stablecoin update submitted");
        Ok(tx)
    }

    pub async fn remove_stablecoin(
        &self,
        cancel: &CancellationToken,
        coin: Address,
    ) -> LotteryResult<SubmittedTx> {
        let token = self.require(self.token, "token_contract_address")?;
        let input = ILOTToken::removeStablecoinCall { stablecoin: coin }.abi_encode();
        self.call(cancel, token, input.into()).await
    }

    /// Read the lifecycle state of the lottery manager at `lottery`.
    pub async fn current_state(&self, lottery: Address) -> LotteryResult<LotteryState> {
        let payload = EstimationPayload::call(lottery, ILotteryManager::getStateCall {}.abi_encode());
        let output = self.coordinator.client().call(&payload).await?;
        let raw = ILotteryManager::getStateCall::abi_decode_returns(&output)
            .map_err(|e| LotteryError::Decode(e.to_string()))?;
        LotteryState::try_from(raw).map_err(LotteryError::UnknownState)
    }

    /// Wait for `tx` using the configured confirmation depth.
    pub async fn confirm(&self, tx: &SubmittedTx, max_wait: Duration) -> LotteryResult<ConfirmationStatus> {
        Ok(self.monitor.wait_for_confirmation(tx.tx_hash, max_wait).await?)
    }

    async fn call(
        &self,
        cancel: &CancellationToken,
        to: Address,
        input: Bytes,
    ) -> LotteryResult<SubmittedTx> {
        self.call_with(cancel, to, input, self.simulate).await
    }

    async fn call_with(
        &self,
        cancel: &CancellationToken,
        to: Address,
        input: Bytes,
        simulate: bool,
    ) -> LotteryResult<SubmittedTx> {
        let payload = EstimationPayload::call(to, input.clone());
        let client = self.coordinator.client().clone();

        let tx = self
            .coordinator
            .run_transaction(cancel, simulate.then_some(&payload), |params| {
                let request = params.apply(
                    TransactionRequest::default()
                        .with_to(to)
                        .with_input(input.clone()),
                );
                submit(client.clone(), request)
            })
            .await?;
        Ok(tx)
    }

    fn require(&self, address: Option<Address>, field: &'static str) -> LotteryResult<Address> {
        address.ok_or(LotteryError::NotConfigured(field))
    }
}

async fn submit(
    client: Arc<dyn ChainClient>,
    request: TransactionRequest,
) -> crate::blockchain::BlockchainResult<alloy::primitives::TxHash> {
    client.submit(request).await
}

fn parse_optional_address(field: &'static str, value: &str) -> LotteryResult<Option<Address>> {
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| LotteryError::InvalidAddress {
            field,
            value: value.to_string(),
        })
}

impl std::fmt::Debug for LotteryOperations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LotteryOperations")
            .field("token", &self.token)
            .field("rollout", &self.rollout)
            .field("simulate", &self.simulate)
            .finish()
    }
}
