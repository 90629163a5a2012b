//! Integration tests for the public fetcher API with a custom transport

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use cachedfetch::transport::TransportError;
use cachedfetch::{
    CachedFetcher, FetchOutcome, FetcherConfig, RequestDescriptor, Transport, TransportRequest,
    TransportResponse,
};

/// Answers with the requested URL and a running call number
#[derive(Default)]
struct EchoTransport {
    calls: AtomicUsize,
}

#[async_trait]
impl Transport for EchoTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(TransportResponse {
            status: 200,
            body: json!({ "url": request.url, "call": call })
                .to_string()
                .into_bytes(),
        })
    }
}

fn search(term: &str) -> RequestDescriptor {
    RequestDescriptor::new("https://api.example.com/search")
        .query("q", term)
        .query("limit", 10)
}

#[tokio::test(start_paused = true)]
async fn test_cache_is_keyed_by_effective_url() {
    let transport = Arc::new(EchoTransport::default());
    let fetcher = CachedFetcher::with_transport(transport.clone(), FetcherConfig::default());

    let rust = fetcher.fetch(search("rust")).await.unwrap();
    let go = fetcher.fetch(search("go")).await.unwrap();
    let rust_again = fetcher.fetch(search("rust")).await.unwrap();

    assert_eq!(
        rust.data().unwrap()["url"],
        json!("https://api.example.com/search?limit=10&q=rust")
    );
    assert_eq!(go.data().unwrap()["call"], json!(2));
    assert!(rust_again.is_cached());
    assert_eq!(rust_again.data(), rust.data());
    assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_custom_ttl_is_honoured() {
    let transport = Arc::new(EchoTransport::default());
    let config = FetcherConfig::default().with_ttl(Duration::from_secs(30));
    let fetcher = CachedFetcher::with_transport(transport.clone(), config);

    fetcher.fetch(search("rust")).await.unwrap();
    tokio::time::advance(Duration::from_secs(29)).await;
    assert!(fetcher.fetch(search("rust")).await.unwrap().is_cached());

    tokio::time::advance(Duration::from_secs(1)).await;
    let outcome = fetcher.fetch(search("rust")).await.unwrap();
    assert!(matches!(outcome, FetchOutcome::Fetched(_)));
    assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_refetch_replays_last_descriptor_and_updates_cache() {
    let transport = Arc::new(EchoTransport::default());
    let fetcher = CachedFetcher::with_transport(transport.clone(), FetcherConfig::default());

    fetcher.fetch(search("rust")).await.unwrap();
    fetcher.fetch(search("go")).await.unwrap();
    let refetched = fetcher.refetch().await.unwrap();

    assert_eq!(
        refetched.data().unwrap()["url"],
        json!("https://api.example.com/search?limit=10&q=go")
    );
    let cached = fetcher.cached(&search("go")).unwrap().expect("entry present");
    assert_eq!(cached.data["call"], json!(3));
    assert_eq!(fetcher.state().data, refetched.into_data());
}
