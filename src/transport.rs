//! # Transport
//!
//! Submits batch scripts to the remote service and turns the HTTP exchange
//! into either the script's return value or a typed error.
//!
//! ## Design
//!
//! The layer is split along two traits so that the retry policy and the rate
//! gate can be tested without a network:
//!
//! - **`RemoteCall`**: exactly one attempt. `HttpRemote` is the real
//!   implementation, a blocking `reqwest` client posting the form fields the
//!   service expects.
//! - **`BatchExecutor`**: what the orchestrator talks to. `Transport`
//!   implements it by wrapping a `RemoteCall` with a fixed-interval rate gate
//!   and a bounded retry loop.
//!
//! ## Failure classification
//!
//! | Outcome of one attempt | Error | Retried |
//! |---|---|---|
//! | connect/read timeout, DNS, refused connection, non-2xx status | `Transport` | yes |
//! | body holds `{"error": {"error_code", "error_msg"}}` | `RemoteApplication` | yes |
//! | body is not JSON or has neither `response` nor `error` | `ProtocolViolation` | yes |
//! | `response` does not have the shape the script returns | `ProtocolViolation` | yes |
//!
//! When all attempts fail the error of the last attempt is returned.

use crate::analyzer;
use crate::config::{Credential, RetryPolicy, RunConfig, Timeouts};
use crate::error::{Error, Result};
use crate::script::{BatchScript, ScriptKind};
use governor::clock::{Clock, DefaultClock};
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use log::{debug, warn};
use serde_json::Value;
use std::thread;
use std::time::Duration;

/// Runs batch scripts against the remote service.
pub trait BatchExecutor {
    /// Returns the script's return value.
    fn execute(&self, script: &BatchScript) -> Result<Value>;
}

/// Form fields of one batch request.
#[derive(Debug, Clone, Copy)]
pub struct BatchRequest<'a> {
    pub code: &'a str,
    pub credential: &'a Credential,
    pub locale: &'a str,
    pub api_version: &'a str,
}

/// A single request attempt - allows mocking in tests
pub trait RemoteCall: Send + Sync {
    fn call(&self, request: &BatchRequest<'_>) -> Result<Value>;
}

/// `RemoteCall` over HTTPS with a blocking `reqwest` client.
pub struct HttpRemote {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl HttpRemote {
    /// Builds the client. The blocking client has no separate read timeout, so
    /// the whole request is bounded by connect + read.
    pub fn new(endpoint: &str, timeouts: Timeouts) -> Result<Self> {
        let mut builder = reqwest::blocking::Client::builder();
        if let Some(connect) = timeouts.connect {
            builder = builder.connect_timeout(connect);
        }
        let total = match (timeouts.connect, timeouts.read) {
            (Some(connect), Some(read)) => Some(connect + read),
            (None, Some(read)) => Some(read),
            (_, None) => None,
        };
        builder = builder.timeout(total);

        let client = builder.build().map_err(|e| Error::Transport {
            message: format!("cannot build HTTP client: {}", e),
        })?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }
}

impl RemoteCall for HttpRemote {
    fn call(&self, request: &BatchRequest<'_>) -> Result<Value> {
        let response = self
            .client
            .post(&self.endpoint)
            .form(&[
                ("access_token", request.credential.expose()),
                ("v", request.api_version),
                ("lang", request.locale),
                ("code", request.code),
            ])
            .send()?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(Error::Transport {
                message: format!("HTTP status {} from {}", status, self.endpoint),
            });
        }

        parse_envelope(&body)
    }
}

/// Extracts the `response` value from a batch response body.
pub fn parse_envelope(body: &str) -> Result<Value> {
    let mut envelope: Value = serde_json::from_str(body)
        .map_err(|e| Error::protocol(format!("response body is not JSON: {}", e)))?;

    if let Some(error) = envelope.get("error") {
        let code = error.get("error_code").and_then(Value::as_i64);
        let message = error.get("error_msg").and_then(Value::as_str);
        return match (code, message) {
            (Some(code), Some(message)) => Err(Error::RemoteApplication {
                code,
                message: message.to_string(),
            }),
            _ => Err(Error::protocol(format!("malformed error envelope: {}", error))),
        };
    }

    if let Some(errors) = envelope.get("execute_errors").and_then(Value::as_array) {
        for error in errors {
            warn!(
                "batch sub-call {} failed: {} {}",
                error.get("method").and_then(Value::as_str).unwrap_or("?"),
                error.get("error_code").and_then(Value::as_i64).unwrap_or_default(),
                error.get("error_msg").and_then(Value::as_str).unwrap_or_default(),
            );
        }
    }

    match envelope.get_mut("response") {
        Some(response) => Ok(response.take()),
        None => Err(Error::protocol(
            "response has neither a `response` nor an `error` field",
        )),
    }
}

/// Calls `attempt` until it succeeds, returns a non-retryable error, or the
/// policy's attempts are used up. The attempt number starts at 1.
pub fn with_retry<T, F>(policy: &RetryPolicy, mut attempt: F) -> Result<T>
where
    F: FnMut(u32) -> Result<T>,
{
    let attempts = policy.attempts.max(1);
    let mut number = 1;
    loop {
        match attempt(number) {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && number < attempts => {
                warn!(
                    "batch request failed (attempt {}/{}), retrying: {}",
                    number, attempts, err
                );
                if !policy.delay.is_zero() {
                    thread::sleep(policy.delay);
                }
                number += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Keeps a minimum interval between consecutive requests.
///
/// A GCRA limiter with a burst of one: the first request passes at once and
/// every later one waits out the remainder of the interval.
pub struct RateGate {
    limiter: Option<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl RateGate {
    /// A non-positive or non-finite rate disables the gate.
    pub fn per_second(rate: f64) -> Self {
        let quota = if rate.is_finite() && rate > 0.0 {
            Quota::with_period(Duration::from_secs_f64(1.0 / rate))
        } else {
            None
        };
        Self {
            limiter: quota.map(RateLimiter::direct),
        }
    }

    /// Blocks until a request may be sent and records it as sent.
    pub fn wait(&self) {
        let Some(limiter) = &self.limiter else {
            return;
        };
        while let Err(not_until) = limiter.check() {
            thread::sleep(not_until.wait_time_from(limiter.clock().now()));
        }
    }
}

/// `BatchExecutor` with rate limiting and retries.
pub struct Transport {
    remote: Box<dyn RemoteCall>,
    credential: Credential,
    locale: String,
    api_version: String,
    retry: RetryPolicy,
    gate: RateGate,
}

impl Transport {
    /// Creates an HTTP transport for the run described by `config`.
    pub fn from_config(config: &RunConfig) -> Result<Self> {
        let remote = HttpRemote::new(&config.endpoint, config.timeouts)?;
        Ok(Self::with_remote(Box::new(remote), config))
    }

    /// Creates a transport over a custom `RemoteCall`.
    pub fn with_remote(remote: Box<dyn RemoteCall>, config: &RunConfig) -> Self {
        Self {
            remote,
            credential: config.credential.clone(),
            locale: config.locale.clone(),
            api_version: config.api_version.clone(),
            retry: config.retry,
            gate: RateGate::per_second(config.requests_per_second),
        }
    }

    /// Submits raw script text, retrying until `check` accepts the response.
    pub fn execute_code<F>(&self, code: &str, check: F) -> Result<Value>
    where
        F: Fn(&Value) -> Result<()>,
    {
        let request = BatchRequest {
            code,
            credential: &self.credential,
            locale: &self.locale,
            api_version: &self.api_version,
        };
        debug!("submitting batch script ({} bytes)", code.len());

        with_retry(&self.retry, |_| {
            self.gate.wait();
            let value = self.remote.call(&request)?;
            check(&value)?;
            Ok(value)
        })
    }
}

impl BatchExecutor for Transport {
    fn execute(&self, script: &BatchScript) -> Result<Value> {
        let kind: ScriptKind = script.kind();
        self.execute_code(script.code(), |value| analyzer::check_response(kind, value))
    }
}
