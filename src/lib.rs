//! cachedfetch library
//!
//! A JSON fetcher that memoizes responses in memory for a fixed TTL and keeps
//! at most one cancellable request in flight.

pub mod cache;
pub mod cli;
pub mod config;
pub mod fetcher;
pub mod request;
pub mod transport;

pub use config::FetcherConfig;
pub use fetcher::{CachedFetcher, FetchError, FetchOutcome, FetchState};
pub use request::{Method, QueryValue, RequestDescriptor};
pub use transport::{ReqwestTransport, Transport, TransportRequest, TransportResponse};
