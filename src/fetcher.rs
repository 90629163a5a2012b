//! Cached, cancellable JSON fetcher
//!
//! `CachedFetcher` owns one response cache and at most one in-flight request.
//! Every new `fetch` or `refetch` aborts whatever request is still
//! outstanding, so only the most recent invocation can update the observable
//! `FetchState`. Aborted requests resolve to `FetchOutcome::Canceled` rather
//! than an error.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use futures::future::{AbortHandle, Abortable, Aborted};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::{CachedData, ResponseCache};
use crate::config::FetcherConfig;
use crate::request::{RequestDescriptor, RequestError};
use crate::transport::{
    elapsed_ms, ReqwestTransport, Transport, TransportError, TransportResponse,
};

/// Errors surfaced by `fetch` and `refetch`
///
/// Cancellation is deliberately absent: an aborted request is reported as
/// `FetchOutcome::Canceled`.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The descriptor could not be turned into a request
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] RequestError),

    /// The server answered with a non-2xx status
    #[error("HTTP error {status} for {url}")]
    Http { status: u16, url: String },

    /// The transport failed before a response was available
    #[error("{0}")]
    Network(#[from] TransportError),

    /// The response body was not valid JSON
    #[error("Failed to parse response from {url}: {reason}")]
    Parse { url: String, reason: String },

    /// `refetch` was called before any `fetch`
    #[error("Nothing to refetch: no request has been made yet")]
    NothingToRefetch,
}

/// How a fetch resolved
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Served from a fresh cache entry without a network call
    Cached(Value),
    /// Fetched from the network and stored in the cache
    Fetched(Value),
    /// Aborted by `cancel` or superseded by a newer request
    Canceled,
}

impl FetchOutcome {
    pub fn data(&self) -> Option<&Value> {
        match self {
            FetchOutcome::Cached(value) | FetchOutcome::Fetched(value) => Some(value),
            FetchOutcome::Canceled => None,
        }
    }

    pub fn into_data(self) -> Option<Value> {
        match self {
            FetchOutcome::Cached(value) | FetchOutcome::Fetched(value) => Some(value),
            FetchOutcome::Canceled => None,
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, FetchOutcome::Cached(_))
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, FetchOutcome::Canceled)
    }
}

/// Snapshot of the latest observable result
///
/// Errors do not clear `data`: after a failed refresh the previous payload
/// stays available alongside the error message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchState {
    /// Most recent successful payload
    pub data: Option<Value>,
    /// Message from the most recent failure, cleared by the next success
    pub error: Option<String>,
    /// Whether a network request is outstanding
    pub loading: bool,
    /// When data or error last changed
    pub updated_at: Option<DateTime<Utc>>,
}

/// The outstanding request, tagged so late completions can be recognised
#[derive(Debug)]
struct InFlight {
    handle: AbortHandle,
    generation: u64,
}

#[derive(Debug)]
struct FetcherState {
    cache: ResponseCache<Value>,
    in_flight: Option<InFlight>,
    generation: u64,
    last_request: Option<RequestDescriptor>,
    observed: FetchState,
}

impl FetcherState {
    fn abort_in_flight(&mut self) -> bool {
        match self.in_flight.take() {
            Some(in_flight) => {
                in_flight.handle.abort();
                true
            }
            None => false,
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|in_flight| in_flight.generation == generation)
    }

    fn record_success(&mut self, value: Value) {
        self.observed.data = Some(value);
        self.observed.error = None;
        self.observed.loading = false;
        self.observed.updated_at = Some(Utc::now());
    }

    fn record_failure(&mut self, error: &FetchError) {
        self.observed.error = Some(error.to_string());
        self.observed.loading = false;
        self.observed.updated_at = Some(Utc::now());
    }
}

/// Clears the in-flight slot if the fetch future is dropped mid-request
struct InFlightGuard<'a> {
    state: &'a Mutex<FetcherState>,
    generation: u64,
    armed: bool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.is_current(self.generation) {
            state.in_flight = None;
            state.observed.loading = false;
        }
    }
}

/// Fetches JSON through a `Transport`, caching results for the configured TTL
///
/// All methods take `&self`; state lives behind a mutex that is never held
/// across an await point, so a fetch can be canceled or superseded from
/// another branch of the same task.
pub struct CachedFetcher<T = ReqwestTransport> {
    transport: T,
    config: FetcherConfig,
    state: Mutex<FetcherState>,
}

impl CachedFetcher<ReqwestTransport> {
    /// Creates a fetcher backed by a reqwest client built from `config`
    pub fn new(config: FetcherConfig) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::with_transport(transport, config))
    }
}

impl<T: Transport> CachedFetcher<T> {
    /// Creates a fetcher using a custom transport
    pub fn with_transport(transport: T, config: FetcherConfig) -> Self {
        let state = FetcherState {
            cache: ResponseCache::new(config.ttl),
            in_flight: None,
            generation: 0,
            last_request: None,
            observed: FetchState::default(),
        };
        Self {
            transport,
            config,
            state: Mutex::new(state),
        }
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, FetcherState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a copy of the latest observable state
    pub fn state(&self) -> FetchState {
        self.lock().observed.clone()
    }

    /// Whether a network request is currently outstanding
    pub fn is_in_flight(&self) -> bool {
        self.lock().in_flight.is_some()
    }

    /// Fetches `descriptor`, serving a fresh cache entry when one exists
    ///
    /// Any request still in flight is aborted first.
    ///
    /// # Returns
    /// * `Ok(FetchOutcome::Cached)` - A fresh entry existed; no network call
    /// * `Ok(FetchOutcome::Fetched)` - The response was fetched and cached
    /// * `Ok(FetchOutcome::Canceled)` - The request was aborted before completing
    /// * `Err(FetchError)` - Invalid request, non-2xx status, network or parse failure
    pub async fn fetch(&self, descriptor: RequestDescriptor) -> Result<FetchOutcome, FetchError> {
        self.run(descriptor, false).await
    }

    /// Re-issues the most recent request, bypassing the cache
    ///
    /// The in-flight request, if any, is aborted. On success the new payload
    /// overwrites the cache entry for that URL.
    pub async fn refetch(&self) -> Result<FetchOutcome, FetchError> {
        let descriptor = self
            .lock()
            .last_request
            .clone()
            .ok_or(FetchError::NothingToRefetch)?;
        self.run(descriptor, true).await
    }

    /// Aborts the in-flight request, if any
    ///
    /// Idempotent. Data and error are left as they were.
    pub fn cancel(&self) {
        let mut state = self.lock();
        if state.abort_in_flight() {
            state.observed.loading = false;
            debug!("in-flight request canceled");
        }
    }

    /// Peeks at the cache without touching the network
    ///
    /// Expired entries are evicted by the lookup, same as in `fetch`.
    pub fn cached(
        &self,
        descriptor: &RequestDescriptor,
    ) -> Result<Option<CachedData<Value>>, FetchError> {
        let key = descriptor.effective_url()?;
        Ok(self.lock().cache.read(&key))
    }

    /// Drops the cache entry for `descriptor`, returning whether one existed
    pub fn invalidate(&self, descriptor: &RequestDescriptor) -> Result<bool, FetchError> {
        let key = descriptor.effective_url()?;
        Ok(self.lock().cache.invalidate(&key))
    }

    /// Drops every cache entry
    pub fn clear_cache(&self) {
        self.lock().cache.clear();
    }

    async fn run(
        &self,
        descriptor: RequestDescriptor,
        bypass_cache: bool,
    ) -> Result<FetchOutcome, FetchError> {
        let (request, registration, generation) = {
            let mut state = self.lock();
            if state.abort_in_flight() {
                debug!("superseding in-flight request");
            }
            state.last_request = Some(descriptor.clone());

            let request = match descriptor.to_transport_request(&self.config.default_content_type) {
                Ok(request) => request,
                Err(e) => {
                    let error = FetchError::from(e);
                    state.record_failure(&error);
                    return Err(error);
                }
            };

            if !bypass_cache {
                if let Some(cached) = state.cache.read(&request.url) {
                    debug!(url = %request.url, age_ms = elapsed_ms(cached.age), "cache hit");
                    state.record_success(cached.data.clone());
                    return Ok(FetchOutcome::Cached(cached.data));
                }
            }

            state.generation += 1;
            let generation = state.generation;
            let (handle, registration) = AbortHandle::new_pair();
            state.in_flight = Some(InFlight { handle, generation });
            state.observed.loading = true;

            debug!(method = %request.method, url = %request.url, bypass_cache, "fetching");
            (request, registration, generation)
        };

        let mut guard = InFlightGuard {
            state: &self.state,
            generation,
            armed: true,
        };

        let url = request.url.clone();
        let result = Abortable::new(self.transport.execute(request), registration).await;
        guard.armed = false;

        let mut state = self.lock();
        let response = match result {
            Err(Aborted) => {
                debug!(%url, "request aborted");
                return Ok(FetchOutcome::Canceled);
            }
            // Finished, but cancel or a newer fetch got there before we relocked
            Ok(_) if !state.is_current(generation) => {
                debug!(%url, "discarding superseded response");
                return Ok(FetchOutcome::Canceled);
            }
            Ok(response) => response,
        };
        state.in_flight = None;

        match parse_response(&url, response) {
            Ok(value) => {
                state.cache.write(url, value.clone());
                state.record_success(value.clone());
                Ok(FetchOutcome::Fetched(value))
            }
            Err(error) => {
                warn!(%url, %error, "fetch failed");
                state.record_failure(&error);
                Err(error)
            }
        }
    }
}

/// Turns a transport result into a JSON payload
///
/// An empty body (e.g. 204 or HEAD) parses as `null`.
fn parse_response(
    url: &str,
    response: Result<TransportResponse, TransportError>,
) -> Result<Value, FetchError> {
    let response = response?;

    if !response.is_success() {
        return Err(FetchError::Http {
            status: response.status,
            url: url.to_string(),
        });
    }

    if response.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }

    serde_json::from_slice(&response.body).map_err(|e| FetchError::Parse {
        url: url.to_string(),
        reason: e.to_string(),
    })
}
