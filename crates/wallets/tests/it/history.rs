use crate::utils::{KEY_A, KEY_B, MockChain, TestWallet, tx};
use alloy_primitives::Address;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use parking_lot::Mutex;
use scol_config::NetworkConfig;
use scol_wallets::{ChainClient, ExplorerClient, TransportError, Wallet, utils::create_private_key_signer};
use serde_json::json;
use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

fn address_of(key: &str) -> Address {
    create_private_key_signer(key).unwrap().address()
}

#[tokio::test(start_paused = true)]
async fn stale_history_is_discarded() {
    let t = TestWallet::new();
    let (a, b) = (address_of(KEY_A), address_of(KEY_B));
    t.history.set_page(a, vec![tx("0xaa", "transfer")]);
    t.history.set_page(b, vec![tx("0xbb", "approve")]);
    t.history.set_delay(a, Duration::from_millis(500));

    // B is imported while A's history is still loading
    let import_b = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        t.wallet.import_private_key(KEY_B).await
    };
    let (first, second) = tokio::join!(t.wallet.import_private_key(KEY_A), import_b);
    assert_eq!(first.unwrap(), a);
    assert_eq!(second.unwrap(), b);

    let calls: Vec<_> = t.history.calls().into_iter().map(|(_, address, _)| address).collect();
    assert_eq!(calls, [a, b]);
    assert_eq!(t.wallet.address(), Some(b));
    assert_eq!(t.wallet.history(), [tx("0xbb", "approve")]);
}

#[tokio::test]
async fn failed_refresh_keeps_the_cache() {
    let t = TestWallet::new();
    let address = address_of(KEY_A);
    t.history.set_page(address, vec![tx("0x01", "transfer"), tx("0x02", "TX")]);
    t.wallet.import_private_key(KEY_A).await.unwrap();
    assert_eq!(t.wallet.history().len(), 2);

    t.history.set_failing(true);
    t.wallet.refresh_history().await;
    assert_eq!(t.wallet.history().len(), 2);
    // refresh failures are only logged
    assert_eq!(t.wallet.notifier().message().as_deref(), Some("Wallet imported from private key"));
}

#[tokio::test]
async fn missing_explorer_skips_history() {
    let t = TestWallet::with_network(NetworkConfig {
        rpc_url: Some("http://localhost:8545".to_string()),
        explorer_url: Some(" ".to_string()),
        ..Default::default()
    });
    t.wallet.import_private_key(KEY_A).await.unwrap();
    assert!(t.history.calls().is_empty());
    assert!(t.wallet.history().is_empty());
}

#[tokio::test]
async fn history_is_cleared_without_an_explorer() {
    let t = TestWallet::new();
    let a = address_of(KEY_A);
    t.history.set_page(a, vec![tx("0xaa", "transfer")]);
    t.wallet.import_private_key(KEY_A).await.unwrap();
    assert_eq!(t.wallet.history(), [tx("0xaa", "transfer")]);

    t.wallet.set_network(NetworkConfig { explorer_url: None, ..t.wallet.network() }).await.unwrap();
    assert!(t.wallet.history().is_empty());

    let b = t.wallet.import_private_key(KEY_B).await.unwrap();
    assert_eq!(t.wallet.address(), Some(b));
    assert!(t.wallet.history().is_empty());
    assert_eq!(t.history.calls().len(), 1);
}

#[derive(Clone, Default)]
struct Explorer {
    failing: Arc<AtomicBool>,
    requests: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

async fn transactions(
    State(explorer): State<Explorer>,
    Path(address): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    explorer.requests.lock().push((address.clone(), query.get("items_count").cloned()));
    if explorer.failing.load(Ordering::SeqCst) {
        return (StatusCode::SERVICE_UNAVAILABLE, "maintenance").into_response();
    }
    Json(json!({
        "items": [
            {
                "hash": "0x9c",
                "from": { "hash": address },
                "to": { "hash": "0x1111111111111111111111111111111111111111" },
                "method": "transfer",
                "type": 2,
                "block_number": 120,
                "timestamp": "2024-05-01T12:00:00.000000Z"
            },
            { "hash": "0x9b", "from": { "hash": address }, "to": null, "method": null, "type": null }
        ],
        "next_page_params": null
    }))
    .into_response()
}

async fn spawn_explorer(explorer: Explorer) -> SocketAddr {
    let app = Router::new()
        .route("/api/v2/addresses/{address}/transactions", get(transactions))
        .with_state(explorer);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    addr
}

#[tokio::test(flavor = "multi_thread")]
async fn loads_history_from_an_explorer() {
    crate::init_tracing();
    let explorer = Explorer::default();
    let addr = spawn_explorer(explorer.clone()).await;

    let chain = Arc::new(MockChain::default());
    let wallet = Wallet::builder()
        .network(NetworkConfig {
            rpc_url: Some("http://localhost:8545".to_string()),
            explorer_url: Some(format!("http://{addr}/")),
            ..Default::default()
        })
        .connector(move |_: &str| -> Result<Arc<dyn ChainClient>, TransportError> {
            Ok(chain.clone())
        })
        .history_source(ExplorerClient::default())
        .build()
        .unwrap();

    let address = wallet.import_private_key(KEY_A).await.unwrap();
    assert_eq!(*explorer.requests.lock(), [(address.to_string(), Some("20".to_string()))]);

    let history = wallet.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].hash, "0x9c");
    assert_eq!(history[0].label, "transfer");
    assert_eq!(history[0].from.as_deref(), Some(address.to_string().as_str()));
    assert_eq!(history[0].block_number, Some(120));
    assert!(history[0].timestamp.is_some());
    assert_eq!(history[0].explorer_link(&format!("http://{addr}")), format!("http://{addr}/tx/0x9c"));
    assert_eq!(history[1].label, "TX");
    assert_eq!(history[1].to, None);

    explorer.failing.store(true, Ordering::SeqCst);
    wallet.refresh_history().await;
    assert_eq!(explorer.requests.lock().len(), 2);
    assert_eq!(wallet.history(), history);
}
