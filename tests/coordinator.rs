mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use common::{coordinator, submit_plain, MockChain};
use lottery_chain::blockchain::BlockchainError;
use lottery_chain::config::TransactionConfig;

fn out_of_gas() -> BlockchainError {
    BlockchainError::Submission("execution reverted: ran out of gas".to_string())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_runs_get_distinct_contiguous_nonces() {
    let chain = Arc::new(MockChain::new(5));
    let coordinator = coordinator(chain.clone(), &TransactionConfig::default());
    let cancel = CancellationToken::new();

    let mut handles = Vec::new();
    for _ in 0..20 {
        let coordinator = coordinator.clone();
        let chain = chain.clone();
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            coordinator
                .run_transaction(&cancel, None, |params| submit_plain(chain.clone(), params))
                .await
        }));
    }

    let mut nonces = Vec::new();
    for handle in handles {
        let tx = handle.await.unwrap().unwrap();
        assert_eq!(tx.attempts, 1);
        nonces.push(tx.nonce);
    }
    nonces.sort_unstable();
    assert_eq!(nonces, (5..25).collect::<Vec<_>>());
    assert_eq!(chain.accepted_nonces(), nonces);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_lagging_node_still_yields_distinct_nonces() {
    let chain = Arc::new(MockChain::new(0).lagging());
    let coordinator = coordinator(chain.clone(), &TransactionConfig::default());
    let cancel = CancellationToken::new();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let coordinator = coordinator.clone();
        let chain = chain.clone();
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            coordinator
                .run_transaction(&cancel, None, |params| submit_plain(chain.clone(), params))
                .await
        }));
    }

    let mut nonces = Vec::new();
    for handle in handles {
        nonces.push(handle.await.unwrap().unwrap().nonce);
    }
    nonces.sort_unstable();
    assert_eq!(nonces, (0..10).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_nonce_too_low_then_success() {
    let chain = Arc::new(MockChain::new(7));
    chain.script_submit_errors([BlockchainError::Submission(
        "nonce too low: next nonce 8, tx nonce 7".to_string(),
    )]);
    let coordinator = coordinator(chain.clone(), &TransactionConfig::default());

    let tx = coordinator
        .run_transaction(&CancellationToken::new(), None, |params| {
            submit_plain(chain.clone(), params)
        })
        .await
        .unwrap();

    assert_eq!(tx.attempts, 2);
    assert_eq!(tx.nonce, 7);
    assert_eq!(chain.attempts().len(), 2);
    assert_eq!(chain.nonce_queries.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_typed_sequence_conflict_is_retried() {
    let chain = Arc::new(MockChain::new(0));
    chain.script_submit_errors([BlockchainError::SequenceConflict("stale".to_string())]);
    let coordinator = coordinator(chain.clone(), &TransactionConfig::default());

    let tx = coordinator
        .run_transaction(&CancellationToken::new(), None, |params| {
            submit_plain(chain.clone(), params)
        })
        .await
        .unwrap();
    assert_eq!(tx.attempts, 2);
}

#[tokio::test]
async fn test_out_of_gas_raises_limit_each_attempt() {
    let config = TransactionConfig {
        max_attempts: 4,
        gas_limit_safety_factor: 1.5,
        min_gas_limit: 1_000_000,
        default_gas_limit: 2_000_000,
        ..TransactionConfig::default()
    };
    let chain = Arc::new(MockChain::new(0));
    chain.script_submit_errors((0..4).map(|_| out_of_gas()));
    let coordinator = coordinator(chain.clone(), &config);

    let err = coordinator
        .run_transaction(&CancellationToken::new(), None, |params| {
            submit_plain(chain.clone(), params)
        })
        .await
        .unwrap_err();

    match err {
        BlockchainError::RetriesExhausted { attempts, last_error } => {
            assert_eq!(attempts, 4);
            assert!(last_error.to_string().contains("ran out of gas"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let limits: Vec<u64> = chain.attempts().iter().map(|tx| tx.gas.unwrap()).collect();
    assert_eq!(limits, vec![2_000_000, 3_000_000, 4_500_000, 6_750_000]);
    assert_eq!(coordinator.signer().current_gas_limit().await, 10_125_000);
}

#[tokio::test]
async fn test_out_of_gas_limit_clamped_to_floor() {
    let config = TransactionConfig {
        min_gas_limit: 1_000_000,
        default_gas_limit: 100_000,
        ..TransactionConfig::default()
    };
    let chain = Arc::new(MockChain::new(0));
    chain.script_submit_errors([out_of_gas()]);
    let coordinator = coordinator(chain.clone(), &config);

    let tx = coordinator
        .run_transaction(&CancellationToken::new(), None, |params| {
            submit_plain(chain.clone(), params)
        })
        .await
        .unwrap();

    let limits: Vec<u64> = chain.attempts().iter().map(|tx| tx.gas.unwrap()).collect();
    assert_eq!(limits, vec![1_000_000, 1_500_000]);
    assert_eq!(tx.gas_limit, 1_500_000);
    assert_eq!(tx.attempts, 2);
}

#[tokio::test]
async fn test_retries_exhausted_wraps_last_error() {
    let chain = Arc::new(MockChain::new(0));
    chain.script_submit_errors((0..3).map(|i| {
        BlockchainError::Submission(format!("insufficient funds for gas * price + value ({i})"))
    }));
    let coordinator = coordinator(chain.clone(), &TransactionConfig::default());

    let err = coordinator
        .run_transaction(&CancellationToken::new(), None, |params| {
            submit_plain(chain.clone(), params)
        })
        .await
        .unwrap_err();

    match err {
        BlockchainError::RetriesExhausted { attempts, last_error } => {
            assert_eq!(attempts, 3);
            assert!(last_error.to_string().contains("(2)"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(chain.attempts().len(), 3);
    assert!(chain.submitted().is_empty());
}

#[tokio::test]
async fn test_failed_attempts_leave_no_nonce_gap() {
    let chain = Arc::new(MockChain::new(3));
    chain.script_submit_errors([BlockchainError::Submission("connection reset".to_string())]);
    let coordinator = coordinator(chain.clone(), &TransactionConfig::default());
    let cancel = CancellationToken::new();

    let first = coordinator
        .run_transaction(&cancel, None, |params| submit_plain(chain.clone(), params))
        .await
        .unwrap();
    let second = coordinator
        .run_transaction(&cancel, None, |params| submit_plain(chain.clone(), params))
        .await
        .unwrap();

    assert_eq!(first.nonce, 3);
    assert_eq!(first.attempts, 2);
    assert_eq!(second.nonce, 4);
    assert_eq!(chain.accepted_nonces(), vec![3, 4]);
}

#[tokio::test]
async fn test_operation_cancelled_error_is_terminal() {
    let chain = Arc::new(MockChain::new(0));
    chain.script_submit_errors([BlockchainError::Cancelled]);
    let coordinator = coordinator(chain.clone(), &TransactionConfig::default());

    let err = coordinator
        .run_transaction(&CancellationToken::new(), None, |params| {
            submit_plain(chain.clone(), params)
        })
        .await
        .unwrap_err();

    assert!(matches!(err, BlockchainError::Cancelled));
    assert_eq!(chain.attempts().len(), 1);
}

#[tokio::test]
async fn test_cancelled_before_allocation() {
    let chain = Arc::new(MockChain::new(0));
    let coordinator = coordinator(chain.clone(), &TransactionConfig::default());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = coordinator
        .run_transaction(&cancel, None, |params| submit_plain(chain.clone(), params))
        .await
        .unwrap_err();

    assert!(matches!(err, BlockchainError::Cancelled));
    assert!(chain.attempts().is_empty());
    assert_eq!(chain.nonce_queries.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cancel_during_operation_releases_nonce() {
    let chain = Arc::new(MockChain::new(9));
    let coordinator = coordinator(chain.clone(), &TransactionConfig::default());
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = coordinator
        .run_transaction(&cancel, None, |_params| {
            std::future::pending::<lottery_chain::blockchain::BlockchainResult<_>>()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, BlockchainError::Cancelled));

    let tx = coordinator
        .run_transaction(&CancellationToken::new(), None, |params| {
            submit_plain(chain.clone(), params)
        })
        .await
        .unwrap();
    assert_eq!(tx.nonce, 9);
}

#[tokio::test]
async fn test_nonce_query_failure_is_setup_error() {
    let chain = Arc::new(MockChain::new(0));
    chain.fail_nonce_queries("connection refused");
    let coordinator = coordinator(chain.clone(), &TransactionConfig::default());

    let err = coordinator
        .run_transaction(&CancellationToken::new(), None, |params| {
            submit_plain(chain.clone(), params)
        })
        .await
        .unwrap_err();

    match err {
        BlockchainError::Setup(inner) => assert!(matches!(*inner, BlockchainError::Rpc(_))),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(chain.attempts().is_empty());
}

#[tokio::test]
async fn test_gas_price_ceiling_is_setup_error() {
    let chain = Arc::new(MockChain::new(0).with_gas_price(1_000 * common::GWEI));
    let coordinator = coordinator(chain.clone(), &TransactionConfig::default());

    let err = coordinator
        .run_transaction(&CancellationToken::new(), None, |params| {
            submit_plain(chain.clone(), params)
        })
        .await
        .unwrap_err();

    match err {
        BlockchainError::Setup(inner) => {
            assert!(matches!(*inner, BlockchainError::GasPriceTooHigh { max_gwei: 500, .. }))
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(chain.attempts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_slow_gas_query_skips_no_nonce() {
    let chain = Arc::new(MockChain::new(9).with_price_delay(Duration::from_millis(200)));
    let coordinator = coordinator(chain.clone(), &TransactionConfig::default());
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = coordinator
        .run_transaction(&cancel, None, |params| submit_plain(chain.clone(), params))
        .await
        .unwrap_err();
    assert!(matches!(err, BlockchainError::Cancelled));
    assert!(chain.attempts().is_empty());

    let tx = coordinator
        .run_transaction(&CancellationToken::new(), None, |params| {
            submit_plain(chain.clone(), params)
        })
        .await
        .unwrap();
    assert_eq!(tx.nonce, 9);
    assert_eq!(chain.accepted_nonces(), vec![9]);
}

#[tokio::test]
async fn test_older_failure_lets_next_allocation_fill_gap() {
    let chain = Arc::new(MockChain::new(0));
    let coordinator = coordinator(chain.clone(), &TransactionConfig::default());
    let nonces = coordinator.nonces();

    let older = nonces.next_nonce().await.unwrap();
    let newer = nonces.next_nonce().await.unwrap();
    assert_eq!((older, newer), (0, 1));

    // the attempt holding the older nonce fails while the newer one is still in flight
    nonces.invalidate().await;
    assert_eq!(nonces.next_nonce().await.unwrap(), older);
}
