// Test mocks for the tracker pipeline.
//
// Four mocks matching the four trait boundaries:
// - MockSnapshotApi (SnapshotApi) — scripted poll responses
// - MockBackend (CompletionBackend) — scripted per-call completions
// - MockClock (Clock) — virtual time, recorded sleeps
// - MockHistory (PriceHistory) — HashMap-based price lookup
//
// No network, no database, no real sleeps: `cargo test` in seconds.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use brightdata_client::{BrightDataError, SnapshotBody};
use gemini_client::{CompletionBackend, GeminiError};

use crate::clock::Clock;
use crate::pricing::PriceHistory;
use crate::traits::SnapshotApi;

// ---------------------------------------------------------------------------
// MockClock
// ---------------------------------------------------------------------------

/// Virtual clock: `sleep` advances `now` instantly and records the duration.
pub struct MockClock {
    now: Mutex<DateTime<Utc>>,
    sleeps: Mutex<Vec<Duration>>,
}

impl MockClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero());
    }
}

// ---------------------------------------------------------------------------
// MockSnapshotApi
// ---------------------------------------------------------------------------

/// Scripted dataset API. Trigger calls hand out sequential snapshot ids;
/// poll responses are consumed from the queue in order.
pub struct MockSnapshotApi {
    snapshot_base: String,
    trigger_fails: bool,
    triggers: Mutex<u32>,
    polls: Mutex<VecDeque<Result<SnapshotBody, BrightDataError>>>,
    always_in_progress: bool,
}

impl MockSnapshotApi {
    pub fn new(snapshot_base: &str) -> Self {
        Self {
            snapshot_base: snapshot_base.to_string(),
            trigger_fails: false,
            triggers: Mutex::new(0),
            polls: Mutex::new(VecDeque::new()),
            always_in_progress: false,
        }
    }

    /// Every trigger responds without a snapshot id.
    pub fn failing_trigger() -> Self {
        Self {
            trigger_fails: true,
            ..Self::new("unused")
        }
    }

    pub fn poll_sequence(self, responses: Vec<Result<SnapshotBody, BrightDataError>>) -> Self {
        *self.polls.lock().unwrap() = responses.into();
        self
    }

    /// Report "running" forever (timeout tests).
    pub fn always_in_progress(mut self) -> Self {
        self.always_in_progress = true;
        self
    }

    pub fn trigger_count(&self) -> u32 {
        *self.triggers.lock().unwrap()
    }

    fn next_snapshot_id(&self) -> Result<String, BrightDataError> {
        if self.trigger_fails {
            return Err(BrightDataError::MissingSnapshot(
                r#"{"error":"dataset unavailable"}"#.to_string(),
            ));
        }
        let mut triggers = self.triggers.lock().unwrap();
        *triggers += 1;
        Ok(format!("{}-{}", self.snapshot_base, triggers))
    }
}

#[async_trait]
impl SnapshotApi for MockSnapshotApi {
    async fn trigger_discovery(
        &self,
        _dataset_id: &str,
        _keywords: &[String],
        _limit_per_input: u32,
    ) -> Result<String, BrightDataError> {
        self.next_snapshot_id()
    }

    async fn trigger_collection(
        &self,
        _dataset_id: &str,
        _inputs: &[Value],
    ) -> Result<String, BrightDataError> {
        self.next_snapshot_id()
    }

    async fn snapshot(&self, _snapshot_id: &str) -> Result<SnapshotBody, BrightDataError> {
        if let Some(response) = self.polls.lock().unwrap().pop_front() {
            return response;
        }
        if self.always_in_progress {
            return Ok(SnapshotBody::InProgress("running".to_string()));
        }
        panic!("MockSnapshotApi poll queue exhausted");
    }
}

// ---------------------------------------------------------------------------
// MockBackend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct BackendCall {
    pub model: String,
    pub prompt: String,
}

enum MockResponse {
    Ok(String),
    Err(GeminiError),
    RateLimited,
}

/// Scripted completion backend. Responses are consumed in call order;
/// every call is recorded for assertions on rotation behavior.
pub struct MockBackend {
    responses: Mutex<VecDeque<MockResponse>>,
    calls: Mutex<Vec<BackendCall>>,
    always_rate_limited: bool,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            always_rate_limited: false,
        }
    }

    pub fn respond_ok(self, text: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(MockResponse::Ok(text.to_string()));
        self
    }

    pub fn respond_err(self, err: GeminiError) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(MockResponse::Err(err));
        self
    }

    pub fn respond_rate_limited(self) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(MockResponse::RateLimited);
        self
    }

    /// Every call is rate limited (model-exhaustion tests).
    pub fn always_rate_limited(mut self) -> Self {
        self.always_rate_limited = true;
        self
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionBackend for MockBackend {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, GeminiError> {
        self.calls.lock().unwrap().push(BackendCall {
            model: model.to_string(),
            prompt: prompt.to_string(),
        });

        if self.always_rate_limited {
            return Err(GeminiError::RateLimited {
                model: model.to_string(),
            });
        }

        match self.responses.lock().unwrap().pop_front() {
            Some(MockResponse::Ok(text)) => Ok(text),
            Some(MockResponse::Err(err)) => Err(err),
            Some(MockResponse::RateLimited) => Err(GeminiError::RateLimited {
                model: model.to_string(),
            }),
            None => panic!("MockBackend response queue exhausted"),
        }
    }
}

// ---------------------------------------------------------------------------
// MockHistory
// ---------------------------------------------------------------------------

/// HashMap-backed price history. `failing()` simulates an unreachable
/// database so degradation paths can be exercised.
pub struct MockHistory {
    prices: HashMap<String, f64>,
    failing: bool,
}

impl MockHistory {
    pub fn new(entries: &[(&str, f64)]) -> Self {
        Self {
            prices: entries
                .iter()
                .map(|(k, p)| (k.to_string(), *p))
                .collect(),
            failing: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            prices: HashMap::new(),
            failing: true,
        }
    }
}

#[async_trait]
impl PriceHistory for MockHistory {
    async fn last_prices(&self, keys: &[String]) -> Result<HashMap<String, f64>> {
        if self.failing {
            bail!("connection refused");
        }
        Ok(keys
            .iter()
            .filter_map(|k| self.prices.get(k).map(|p| (k.clone(), *p)))
            .collect())
    }
}
