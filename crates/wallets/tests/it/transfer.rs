use crate::utils::{GAS_PRICE, GAS_USED, KEY_A, MockToken, RECIPIENT, TestWallet, tx, wait_for};
use alloy_primitives::{Address, U256, address, utils::parse_ether};
use scol_config::NetworkConfig;
use scol_wallets::{
    Balance, OutcomeStatus, Settlement, TransferForm, TransferState, TransportError, WalletError,
};
use std::time::Duration;
use tokio::sync::broadcast;

const USDT: Address = address!("0xdAC17F958D2ee523a2206206994597C13D831ec7");

fn drain(rx: &mut broadcast::Receiver<TransferState>) -> Vec<TransferState> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

#[tokio::test]
async fn native_transfer_end_to_end() {
    crate::init_tracing();
    let t = TestWallet::new();
    let address = t.wallet.create_random().await.unwrap();
    t.chain.fund(address, parse_ether("10").unwrap());
    t.wallet.refresh_balance().await;
    let before = t.wallet.balance().value().unwrap();
    t.history.set_page(address, vec![tx("0x01", "transfer")]);

    t.wallet.set_native_form(TransferForm::new(RECIPIENT, "1.5"));
    let mut rx = t.wallet.subscribe_transfers();
    let confirmation = t.wallet.send_native().await.unwrap();

    let hash = confirmation.hash;
    assert_eq!(
        drain(&mut rx),
        [
            TransferState::Validating,
            TransferState::Submitting,
            TransferState::AwaitingConfirmation(hash),
            TransferState::Settled(Settlement::Success(hash)),
            TransferState::Idle,
        ]
    );
    assert_eq!(t.wallet.transfer_state(), TransferState::Idle);
    assert!(!t.wallet.is_busy());
    assert!(!t.wallet.is_processing());

    let after = t.wallet.balance().value().unwrap();
    let amount = parse_ether("1.5").unwrap();
    assert!(before - after >= amount);
    assert_eq!(before - after, amount + confirmation.fee());
    assert_eq!(confirmation.fee(), U256::from(GAS_USED) * U256::from(GAS_PRICE));
    assert_eq!(t.chain.balance_of(RECIPIENT.parse().unwrap()), amount);

    assert_eq!(t.wallet.native_form(), TransferForm::default());
    assert_eq!(t.wallet.history(), [tx("0x01", "transfer")]);
    assert_eq!(t.wallet.notifier().message().as_deref(), Some("Transaction confirmed"));
    let outcome = t.wallet.notifier().outcome().unwrap();
    assert_eq!(outcome.status, OutcomeStatus::Success);
    assert_eq!(outcome.title, "Confirmation successful");
}

#[tokio::test]
async fn invalid_recipient_never_submits() {
    let t = TestWallet::new();
    t.funded(KEY_A, "10").await;
    let balance = t.wallet.balance();
    let form = TransferForm::new("0x1111", "1");
    t.wallet.set_native_form(form.clone());

    let mut rx = t.wallet.subscribe_transfers();
    let err = t.wallet.send_native().await.unwrap_err();
    assert!(matches!(err, WalletError::InvalidRecipient(_)), "{err}");

    assert_eq!(drain(&mut rx), [TransferState::Validating, TransferState::Idle]);
    assert!(t.chain.sent().is_empty());
    assert_eq!(t.wallet.balance(), balance);
    assert_eq!(t.wallet.native_form(), form);
    assert!(!t.wallet.is_busy());
    assert_eq!(t.wallet.notifier().message().as_deref(), Some("Invalid recipient address"));
    let outcome = t.wallet.notifier().outcome().unwrap();
    assert_eq!(outcome.status, OutcomeStatus::Failure);
    assert_eq!(outcome.description, "The recipient address is not valid.");
}

#[tokio::test]
async fn invalid_amounts_are_rejected() {
    let t = TestWallet::new();
    t.funded(KEY_A, "10").await;
    for amount in ["", "0", "-1", "abc", "1.0000000000000000001"] {
        t.wallet.set_native_form(TransferForm::new(RECIPIENT, amount));
        let err = t.wallet.send_native().await.unwrap_err();
        assert!(matches!(err, WalletError::InvalidAmount(_)), "{amount}: {err}");
    }
    assert!(t.chain.sent().is_empty());
    assert_eq!(t.wallet.notifier().message().as_deref(), Some("Invalid amount"));
}

#[tokio::test]
async fn transfer_requires_rpc_and_wallet() {
    let t = TestWallet::new();
    let mut rx = t.wallet.subscribe_transfers();
    let err = t.wallet.send_native().await.unwrap_err();
    assert!(matches!(err, WalletError::PreconditionFailed(_)), "{err}");
    assert_eq!(t.wallet.notifier().message().as_deref(), Some("Configure RPC and wallet"));
    assert_eq!(t.wallet.notifier().outcome().unwrap().status, OutcomeStatus::Failure);
    assert!(drain(&mut rx).is_empty());

    t.funded(KEY_A, "1").await;
    t.wallet.set_network(NetworkConfig { rpc_url: Some("  ".into()), ..t.wallet.network() })
        .await
        .unwrap();
    let err = t.wallet.send_native().await.unwrap_err();
    assert!(matches!(err, WalletError::PreconditionFailed(_)), "{err}");
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn second_submission_is_rejected_while_busy() {
    let t = TestWallet::new();
    t.funded(KEY_A, "10").await;
    t.chain.deploy(USDT, MockToken::new("USDT", 6));
    t.wallet.add_token(&USDT.to_string()).await.unwrap();
    t.wallet.set_token_form(USDT, TransferForm::new(RECIPIENT, "1")).unwrap();
    t.chain.hold_confirmations();

    t.wallet.set_native_form(TransferForm::new(RECIPIENT, "1"));
    let wallet = t.wallet.clone();
    let first = tokio::spawn(async move { wallet.send_native().await });

    let wallet = t.wallet.clone();
    wait_for(
        move || matches!(wallet.transfer_state(), TransferState::AwaitingConfirmation(_)),
        Duration::from_secs(5),
    )
    .await;
    assert!(t.wallet.is_busy());
    assert!(t.wallet.is_processing());

    let err = t.wallet.send_native().await.unwrap_err();
    assert!(matches!(err, WalletError::TransferBusy), "{err}");
    let err = t.wallet.send_token(USDT).await.unwrap_err();
    assert!(matches!(err, WalletError::TransferBusy), "{err}");
    assert!(matches!(t.wallet.transfer_state(), TransferState::AwaitingConfirmation(_)));
    assert_eq!(t.chain.sent().len(), 1);

    t.chain.release_confirmation();
    let confirmation = first.await.unwrap().unwrap();
    assert_eq!(t.chain.sent()[0].hash, confirmation.hash);
    assert_eq!(t.chain.sent().len(), 1);
    assert!(!t.wallet.is_busy());
    assert_eq!(t.wallet.transfer_state(), TransferState::Idle);
}

#[tokio::test]
async fn transport_errors_are_surfaced_verbatim() {
    let t = TestWallet::new();
    t.funded(KEY_A, "10").await;
    t.chain.fail_sends(TransportError::new("nonce too low"));
    let form = TransferForm::new(RECIPIENT, "1");
    t.wallet.set_native_form(form.clone());

    let mut rx = t.wallet.subscribe_transfers();
    let err = t.wallet.send_native().await.unwrap_err();
    assert_eq!(err.to_string(), "nonce too low");
    assert_eq!(
        drain(&mut rx),
        [
            TransferState::Validating,
            TransferState::Submitting,
            TransferState::Settled(Settlement::Failure("nonce too low".into())),
            TransferState::Idle,
        ]
    );
    assert_eq!(t.wallet.notifier().message().as_deref(), Some("nonce too low"));
    let outcome = t.wallet.notifier().outcome().unwrap();
    assert_eq!(outcome.title, "Confirmation failed");
    assert_eq!(outcome.description, "nonce too low");
    // nothing is rolled back or cleared
    assert_eq!(t.wallet.native_form(), form);
    assert!(!t.wallet.is_busy());
}

#[tokio::test]
async fn opaque_errors_fall_back_to_a_generic_message() {
    let t = TestWallet::new();
    t.funded(KEY_A, "10").await;
    t.chain.fail_confirmations(TransportError::opaque());
    t.wallet.set_native_form(TransferForm::new(RECIPIENT, "1"));

    let err = t.wallet.send_native().await.unwrap_err();
    assert!(matches!(err, WalletError::Transport(_)), "{err}");
    assert_eq!(t.wallet.notifier().message().as_deref(), Some("Error sending SCOL"));
    assert_eq!(t.wallet.notifier().outcome().unwrap().description, "Error sending SCOL");
}

#[tokio::test]
async fn reverted_transactions_fail() {
    let t = TestWallet::new();
    t.funded(KEY_A, "10").await;
    t.chain.revert_all();
    t.wallet.set_native_form(TransferForm::new(RECIPIENT, "1"));

    let mut rx = t.wallet.subscribe_transfers();
    t.wallet.send_native().await.unwrap_err();
    let states = drain(&mut rx);
    assert!(matches!(
        &states[3],
        TransferState::Settled(Settlement::Failure(message)) if message.ends_with("reverted")
    ));
    assert_eq!(t.wallet.notifier().outcome().unwrap().status, OutcomeStatus::Failure);
    assert_eq!(t.wallet.transfer_state(), TransferState::Idle);
}

#[tokio::test]
async fn token_transfer_end_to_end() {
    let t = TestWallet::new();
    let owner = t.funded(KEY_A, "1").await;
    t.chain.deploy(USDT, MockToken::new("USDT", 6));
    t.chain.set_token_balance(USDT, owner, U256::from(5_000_000));
    t.wallet.add_token(&USDT.to_string()).await.unwrap();
    let calls = t.history.calls().len();

    t.wallet.set_token_form(USDT, TransferForm::new(RECIPIENT, "1.25")).unwrap();
    let mut rx = t.wallet.subscribe_transfers();
    let confirmation = t.wallet.send_token(USDT).await.unwrap();

    let sent = t.chain.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].token, Some(USDT));
    assert_eq!(sent[0].amount, U256::from(1_250_000));
    assert_eq!(drain(&mut rx).last(), Some(&TransferState::Idle));

    let token = t.wallet.tokens().get(&USDT).cloned().unwrap();
    assert_eq!(token.balance, U256::from(3_750_000));
    assert!(token.form.is_empty());
    assert_eq!(t.history.calls().len(), calls + 1);
    assert_eq!(t.wallet.notifier().message().as_deref(), Some("Transfer confirmed"));
    assert!(t.wallet.notifier().outcome().unwrap().is_success());
    assert_eq!(confirmation.hash, sent[0].hash);
    // the native balance only paid the fee
    assert!(matches!(t.wallet.balance(), Balance::Known(_)));
}

#[tokio::test(start_paused = true)]
async fn settled_token_balance_outlives_older_refreshes() {
    let t = TestWallet::new();
    let owner = t.funded(KEY_A, "1").await;
    t.chain.deploy(USDT, MockToken::new("USDT", 6));
    t.chain.set_token_balance(USDT, owner, U256::from(5_000_000));
    t.wallet.add_token(&USDT.to_string()).await.unwrap();

    // a full refresh reads the old balance and answers after the transfer settled
    t.chain.delay_next_read(owner, Duration::from_millis(500));
    let transfer = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        t.wallet.set_token_form(USDT, TransferForm::new(RECIPIENT, "1.25")).unwrap();
        t.wallet.send_token(USDT).await
    };
    let ((), sent) = tokio::join!(t.wallet.refresh_tokens(), transfer);
    sent.unwrap();

    assert_eq!(t.wallet.tokens().get(&USDT).unwrap().balance, U256::from(3_750_000));
}

#[tokio::test]
async fn token_amounts_use_the_token_precision() {
    let t = TestWallet::new();
    let owner = t.funded(KEY_A, "1").await;
    t.chain.deploy(USDT, MockToken::new("USDT", 6));
    t.chain.set_token_balance(USDT, owner, U256::from(5_000_000));
    t.wallet.add_token(&USDT.to_string()).await.unwrap();

    t.wallet.set_token_form(USDT, TransferForm::new(RECIPIENT, "0.0000001")).unwrap();
    let err = t.wallet.send_token(USDT).await.unwrap_err();
    assert!(matches!(err, WalletError::InvalidAmount(_)), "{err}");

    let err = t.wallet.send_token(Address::ZERO).await.unwrap_err();
    assert!(matches!(err, WalletError::InvalidAddress(_)), "{err}");
    assert_eq!(t.wallet.notifier().message().as_deref(), Some("Token not tracked"));
    assert!(t.chain.sent().is_empty());
}
