//! Backend HTTP client.
//!
//! Blocking reqwest client (no Tokio runtime required). Every call takes a
//! base URL; [`RelayClient::with_fallback`] walks the configured candidates.

use std::time::{Duration, Instant};

use gridrelay_config::{FallbackPolicy, RelayConfig};
use gridrelay_protocol::{
    CommandsResponse, MappingResponse, ResultsReport, TemplateResponse, TemplateSheet,
};
use serde_json::Value;

/// Relay backend client (blocking).
#[derive(Clone)]
pub struct RelayClient {
    http: reqwest::blocking::Client,
    base_urls: Vec<String>,
    policy: FallbackPolicy,
    request_timeout: Duration,
    tick_budget: Duration,
}

/// Error type for backend operations.
#[derive(Debug)]
pub enum RelayError {
    /// Connection refused, DNS failure, timeout
    Network(String),
    /// HTTP error with status code
    Http(u16, String),
    /// Body was not the expected JSON
    Parse(String),
    /// Empty candidate list
    NoCandidates,
    /// Per-tick time budget spent before a candidate answered
    BudgetExhausted,
}

impl std::fmt::Display for RelayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayError::Network(msg) => write!(f, "Network error: {}", msg),
            RelayError::Http(code, msg) => write!(f, "HTTP {}: {}", code, msg),
            RelayError::Parse(msg) => write!(f, "Parse error: {}", msg),
            RelayError::NoCandidates => write!(f, "No backend URLs configured"),
            RelayError::BudgetExhausted => write!(f, "Tick budget exhausted before any backend answered"),
        }
    }
}

impl std::error::Error for RelayError {}

impl RelayError {
    pub fn status(&self) -> Option<u16> {
        match self {
            RelayError::Http(code, _) => Some(*code),
            _ => None,
        }
    }
}

impl RelayClient {
    pub fn new(config: &RelayConfig) -> Result<Self, RelayError> {
        let request_timeout = Duration::from_millis(config.request_timeout_ms);
        let http = reqwest::blocking::Client::builder()
            .user_agent(format!("gridrelay/{}", env!("CARGO_PKG_VERSION")))
            .timeout(request_timeout)
            .build()
            .map_err(|e| RelayError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_urls: config.base_urls.clone(),
            policy: config.fallback_policy,
            request_timeout,
            tick_budget: Duration::from_millis(config.tick_budget_ms),
        })
    }

    /// Candidate base URLs, in the order they are tried.
    pub fn base_urls(&self) -> &[String] {
        &self.base_urls
    }

    pub fn policy(&self) -> FallbackPolicy {
        self.policy
    }

    /// Pending commands for a session. A missing or non-array `commands`
    /// field is an empty batch.
    pub fn fetch_commands(&self, base: &str, session_id: &str) -> Result<Vec<Value>, RelayError> {
        self.fetch_commands_within(base, session_id, self.request_timeout)
    }

    fn fetch_commands_within(
        &self,
        base: &str,
        session_id: &str,
        timeout: Duration,
    ) -> Result<Vec<Value>, RelayError> {
        let url = format!("{}/spreadsheet/commands", base);
        let request = self.http.get(&url)
            .query(&[("sessionId", session_id)])
            .timeout(timeout);
        let resp = send(request)?;
        let body: CommandsResponse = resp.json().map_err(|e| RelayError::Parse(e.to_string()))?;
        Ok(body.commands)
    }

    /// Raw key mapping rows.
    pub fn fetch_mapping(&self, base: &str) -> Result<Value, RelayError> {
        let url = format!("{}/spreadsheet/mapping", base);
        let resp = send(self.http.get(&url))?;
        let body: MappingResponse = resp.json().map_err(|e| RelayError::Parse(e.to_string()))?;
        if !body.success {
            return Err(RelayError::Parse("mapping response has success=false".into()));
        }
        Ok(body.mapping)
    }

    /// Initial grid contents.
    pub fn fetch_template(&self, base: &str) -> Result<Vec<TemplateSheet>, RelayError> {
        let url = format!("{}/spreadsheet/get-template", base);
        let resp = send(self.http.get(&url))?;
        let body: TemplateResponse = resp.json().map_err(|e| RelayError::Parse(e.to_string()))?;
        match body.data {
            Some(doc) if body.success => Ok(doc.into_sheets()),
            _ => Err(RelayError::Parse("template response has no data".into())),
        }
    }

    /// Post the results of one applied batch.
    pub fn report_results(&self, base: &str, report: &ResultsReport) -> Result<(), RelayError> {
        let url = format!("{}/spreadsheet/results", base);
        send(self.http.post(&url).json(report))?;
        Ok(())
    }

    /// Run `op` against each candidate until one succeeds.
    pub fn with_fallback<T, F>(&self, op: F) -> Result<(String, T), RelayError>
    where
        F: FnMut(&str) -> Result<T, RelayError>,
    {
        first_success(&self.base_urls, self.policy, self.tick_budget, op)
    }

    /// One poll: fetch the session's commands from the first candidate that
    /// answers, each request capped by what is left of the tick budget.
    pub fn poll_commands(&self, session_id: &str) -> Result<(String, Vec<Value>), RelayError> {
        let started = Instant::now();
        self.with_fallback(|base| {
            let remaining = self.tick_budget.saturating_sub(started.elapsed());
            self.fetch_commands_within(base, session_id, remaining.min(self.request_timeout))
        })
    }
}

/// Try `candidates` in order under `policy`, stopping at the first success.
///
/// Returns the base URL that answered along with its value. When every
/// candidate fails, the last error is returned. The first candidate is
/// always tried; later ones only while `budget` has time left.
pub fn first_success<T, F>(
    candidates: &[String],
    policy: FallbackPolicy,
    budget: Duration,
    mut op: F,
) -> Result<(String, T), RelayError>
where
    F: FnMut(&str) -> Result<T, RelayError>,
{
    let started = Instant::now();
    let mut last_error = None;

    for (i, base) in candidates.iter().enumerate() {
        if i > 0 && started.elapsed() >= budget {
            log::debug!("Tick budget spent after {} candidate(s)", i);
            return Err(RelayError::BudgetExhausted);
        }
        match op(base) {
            Ok(value) => return Ok((base.clone(), value)),
            Err(e) => {
                if !should_advance(policy, i, &e) {
                    return Err(e);
                }
                log::debug!("Backend {} failed: {}", base, e);
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or(RelayError::NoCandidates))
}

fn should_advance(policy: FallbackPolicy, index: usize, error: &RelayError) -> bool {
    match policy {
        FallbackPolicy::AnyFailure => true,
        FallbackPolicy::NotFoundOnly => match error {
            RelayError::Network(_) | RelayError::Parse(_) => true,
            RelayError::Http(404, _) => index == 0,
            _ => false,
        },
    }
}

fn send(request: reqwest::blocking::RequestBuilder) -> Result<reqwest::blocking::Response, RelayError> {
    let response = request
        .send()
        .map_err(|e| RelayError::Network(e.to_string()))?;

    let status = response.status().as_u16();
    if !response.status().is_success() {
        let body = response.text().unwrap_or_default();
        return Err(RelayError::Http(status, body));
    }

    Ok(response)
}
