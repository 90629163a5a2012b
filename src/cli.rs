//! Command-line interface parsing for cachedfetch
//!
//! This module handles parsing of CLI arguments using clap and turns them into
//! a `RequestDescriptor` plus a `FetcherConfig`.

use std::collections::BTreeMap;
use std::time::Duration;

use clap::Parser;
use serde_json::Value;
use thiserror::Error;

use crate::config::FetcherConfig;
use crate::request::{Method, QueryValue, RequestDescriptor, RequestError};

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// A header argument was not in `Name: value` form
    #[error("Invalid header: '{0}'. Expected 'Name: value'")]
    InvalidHeader(String),

    /// A query argument was not in `key=value` form
    #[error("Invalid query parameter: '{0}'. Expected 'key=value'")]
    InvalidQuery(String),

    /// `--query-json` was not a JSON object of scalars
    #[error("Invalid query JSON: {0}")]
    InvalidQueryJson(String),

    /// The body was not valid JSON
    #[error("Invalid JSON body: {0}")]
    InvalidBody(String),

    /// `--repeat` must be at least 1
    #[error("Invalid repeat count: must be at least 1")]
    InvalidRepeat,

    /// Method or URL rejected
    #[error(transparent)]
    InvalidRequest(#[from] RequestError),
}

/// cachedfetch - Fetch JSON from a URL through an in-memory response cache
#[derive(Parser, Debug)]
#[command(name = "cachedfetch")]
#[command(about = "Fetch JSON from a URL with a time-based response cache")]
#[command(version)]
pub struct Cli {
    /// URL to fetch
    pub url: String,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// Extra request header, repeatable
    ///
    /// Example: -H 'Accept: application/json'
    #[arg(short = 'H', long = "header", value_name = "NAME: VALUE")]
    pub headers: Vec<String>,

    /// Query parameter appended to the URL, repeatable
    ///
    /// Example: -q page=2 -q sort=name
    #[arg(short = 'q', long = "query", value_name = "KEY=VALUE")]
    pub query: Vec<String>,

    /// Query parameters as a JSON object of scalars, applied after --query
    ///
    /// Example: --query-json '{"page": 2, "sort": "name"}'
    #[arg(long, value_name = "JSON")]
    pub query_json: Option<String>,

    /// JSON request body
    #[arg(long, value_name = "JSON")]
    pub body: Option<String>,

    /// Bearer token sent in the Authorization header
    #[arg(long)]
    pub token: Option<String>,

    /// Cache time-to-live in seconds
    #[arg(long, value_name = "SECS", default_value_t = 300)]
    pub ttl: u64,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Issue the same fetch this many times (repeats are served from cache)
    #[arg(long, default_value_t = 1)]
    pub repeat: u32,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Parses a `Name: value` header argument
pub fn parse_header_arg(s: &str) -> Result<(String, String), CliError> {
    let (name, value) = s
        .split_once(':')
        .ok_or_else(|| CliError::InvalidHeader(s.to_string()))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(CliError::InvalidHeader(s.to_string()));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Parses a `key=value` query argument
///
/// Values are kept as strings so they serialize exactly as typed.
pub fn parse_query_arg(s: &str) -> Result<(String, QueryValue), CliError> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| CliError::InvalidQuery(s.to_string()))?;
    if key.is_empty() {
        return Err(CliError::InvalidQuery(s.to_string()));
    }
    Ok((key.to_string(), QueryValue::Str(value.to_string())))
}

/// Parses a `--query-json` object into query parameters
///
/// Values must be strings, numbers or booleans.
pub fn parse_query_json(s: &str) -> Result<BTreeMap<String, QueryValue>, CliError> {
    serde_json::from_str(s).map_err(|e| CliError::InvalidQueryJson(e.to_string()))
}

/// Everything the binary needs to run, derived from CLI arguments
#[derive(Debug, Clone)]
pub struct Invocation {
    pub descriptor: RequestDescriptor,
    pub config: FetcherConfig,
    pub repeat: u32,
}

impl Invocation {
    /// Validates the parsed CLI and builds the request and config
    ///
    /// # Returns
    /// * `Ok(Invocation)` if every argument is well-formed
    /// * `Err(CliError)` naming the first bad argument
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let method: Method = cli.method.parse()?;
        let mut descriptor = RequestDescriptor::new(cli.url.clone()).method(method);

        for header in &cli.headers {
            let (name, value) = parse_header_arg(header)?;
            descriptor = descriptor.header(name, value);
        }

        for param in &cli.query {
            let (key, value) = parse_query_arg(param)?;
            descriptor = descriptor.query(key, value);
        }

        if let Some(ref json) = cli.query_json {
            for (key, value) in parse_query_json(json)? {
                descriptor = descriptor.query(key, value);
            }
        }

        if let Some(ref body) = cli.body {
            let body: Value =
                serde_json::from_str(body).map_err(|e| CliError::InvalidBody(e.to_string()))?;
            descriptor = descriptor.json_body(body);
        }

        if let Some(ref token) = cli.token {
            descriptor = descriptor.bearer_token(token.clone());
        }

        // Reject a bad URL before any client is built
        descriptor.effective_url()?;

        if cli.repeat == 0 {
            return Err(CliError::InvalidRepeat);
        }

        let mut config = FetcherConfig::default().with_ttl(Duration::from_secs(cli.ttl));
        if let Some(secs) = cli.timeout {
            config = config.with_timeout(Duration::from_secs(secs));
        }

        Ok(Invocation {
            descriptor,
            config,
            repeat: cli.repeat,
        })
    }
}
