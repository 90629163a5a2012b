//! Integration tests for CLI argument handling
//!
//! Runs the binary only with arguments that fail or exit before any network I/O.

use std::process::Command;

/// Helper to run the CLI with given args and capture output
fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_cachedfetch"))
        .args(args)
        .output()
        .expect("Failed to execute cachedfetch")
}

#[test]
fn test_help_flag_exits_successfully() {
    let output = run_cli(&["--help"]);
    assert!(output.status.success(), "Expected --help to exit successfully");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("cachedfetch"), "Help should mention cachedfetch");
    assert!(stdout.contains("--ttl"), "Help should mention --ttl flag");
    assert!(stdout.contains("--query"), "Help should mention --query flag");
}

#[test]
fn test_missing_url_fails() {
    let output = run_cli(&[]);
    assert!(!output.status.success(), "Expected missing URL to fail");
}

#[test]
fn test_invalid_query_prints_error_and_exits() {
    let output = run_cli(&["https://api.example.com", "-q", "noequals"]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Invalid query parameter"),
        "Should print error message about the query: {}",
        stderr
    );
}

#[test]
fn test_invalid_url_prints_error_and_exits() {
    let output = run_cli(&["not a url"]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid URL"), "Unexpected stderr: {}", stderr);
}

#[test]
fn test_invalid_method_prints_error_and_exits() {
    let output = run_cli(&["https://api.example.com", "-X", "FETCH"]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Unsupported HTTP method"), "Unexpected stderr: {}", stderr);
}

#[cfg(test)]
mod unit_tests {
    //! Unit tests for CLI parsing that don't require running the binary

    use cachedfetch::cli::{parse_query_arg, Cli, Invocation};
    use cachedfetch::{Method, QueryValue};
    use clap::Parser;

    #[test]
    fn test_cli_collects_repeated_flags() {
        let cli = Cli::parse_from([
            "cachedfetch",
            "https://api.example.com",
            "-H",
            "Accept: application/json",
            "-H",
            "X-Request-Id: 42",
            "-q",
            "a=1",
            "-q",
            "b=2",
        ]);
        assert_eq!(cli.headers.len(), 2);
        assert_eq!(cli.query, vec!["a=1".to_string(), "b=2".to_string()]);
    }

    #[test]
    fn test_parse_query_arg_keeps_value_text() {
        let (key, value) = parse_query_arg("price=1.50").unwrap();
        assert_eq!(key, "price");
        assert_eq!(value, QueryValue::Str("1.50".to_string()));
    }

    #[test]
    fn test_invocation_defaults() {
        let cli = Cli::parse_from(["cachedfetch", "https://api.example.com/items"]);
        let invocation = Invocation::from_cli(&cli).unwrap();
        assert_eq!(invocation.descriptor.method, Method::Get);
        assert_eq!(invocation.repeat, 1);
        assert_eq!(invocation.config.ttl.as_secs(), 300);
        assert!(invocation.config.timeout.is_none());
    }
}
