//! Shared utilities for integration tests: a scripted vendor endpoint and a
//! service instance bound to an ephemeral port.

use std::net::SocketAddr;
use std::sync::Arc;

use esa_renew::config::ServiceConfig;
use esa_renew::jobs::{JobStore, MemoryJobStore};
use esa_renew::{HttpServer, Shutdown};
use serde_json::json;
use tokio::net::TcpListener;
use wiremock::matchers::{body_string_contains, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Vendor mock that knows one running instance and accepts every renewal.
pub async fn start_vendor() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_string_contains("Action=QueryAvailableInstances"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Success": true,
            "Data": {"InstanceList": [{
                "Region": "cn-hangzhou",
                "EndTime": "2030-06-30T16:00:00Z",
                "Status": "Running",
                "RenewStatus": "ManualRenewal",
                "SubscriptionType": "Subscription"
            }]}
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(body_string_contains("Action=RenewInstance"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Success": true,
            "Data": {"OrderId": "230000000001"}
        })))
        .mount(&server)
        .await;

    server
}

/// A running service plus handles the tests inspect.
pub struct TestService {
    pub addr: SocketAddr,
    pub store: MemoryJobStore,
    pub shutdown: Shutdown,
}

impl TestService {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for TestService {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Boot the service against `vendor` with a fast countdown.
pub async fn start_service(vendor: &MockServer) -> TestService {
    let store = MemoryJobStore::new();
    start_service_over(vendor, store.clone(), Arc::new(store)).await
}

/// Boot the service on `backing`, a store layered over `store`.
pub async fn start_service_over(
    vendor: &MockServer,
    store: MemoryJobStore,
    backing: Arc<dyn JobStore>,
) -> TestService {
    let mut config = ServiceConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.vendor.endpoint = vendor.uri();
    config.jobs.tick_interval_ms = 1;

    let server = HttpServer::with_store(config, backing).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestService { addr, store, shutdown }
}

/// Count vendor requests for one action.
#[allow(dead_code)]
pub async fn vendor_calls(vendor: &MockServer, action: &str) -> usize {
    let needle = format!("Action={}", action);
    vendor
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| String::from_utf8_lossy(&r.body).contains(&needle))
        .count()
}
