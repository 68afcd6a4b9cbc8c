use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use gemini_client::{strip_code_fences, truncate_to_char_boundary, CompletionBackend};
use shelfwatch_common::{Analysis, Provenance, ReviewRecord, Sentiment};

use crate::clock::Clock;

/// Review text beyond this many bytes adds tokens without adding signal.
const MAX_REVIEW_BYTES: usize = 500;

const PROMPT_HEADER: &str = r#"Analyze these product reviews. For EACH review, return a JSON array with one object per review containing:

- "index": the review number (1-based)
- "sentiment": exactly one of "Positive", "Neutral", or "Negative" based on the actual text tone (not just the star rating -- a 4-star review with complaints is Negative)
- "issues": array of specific product issues mentioned (e.g., "battery drains fast", "screen scratches easily"). Empty array if none.
- "themes": array of 1-3 topic tags (e.g., "build quality", "value for money", "customer service")
- "summary": one sentence summarizing the review

IMPORTANT: Return ONLY the JSON array, no markdown, no explanation.

Reviews to analyze:
"#;

#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub batch_size: usize,
    /// Models ranked by quota, highest first. Rotation advances only on a
    /// rate-limit signal and resets at each new batch.
    pub models: Vec<String>,
    pub inter_batch_delay: Duration,
    pub positive_min_rating: f64,
    pub neutral_min_rating: f64,
}

impl AnalyzerConfig {
    pub fn from_config(config: &shelfwatch_common::Config) -> Self {
        Self {
            batch_size: config.batch_size,
            models: config.models.clone(),
            inter_batch_delay: config.inter_batch_delay,
            positive_min_rating: config.positive_min_rating,
            neutral_min_rating: config.neutral_min_rating,
        }
    }
}

/// Outcome of one analysis pass: exactly one `Analysis` per input record,
/// in input order, plus provenance accounting.
#[derive(Debug, Default)]
pub struct AnalysisRun {
    pub results: Vec<Analysis>,
    pub ai_count: usize,
    pub fallback_count: usize,
    pub batches: usize,
}

impl AnalysisRun {
    /// Fraction of records with a usable AI result. An AI response whose
    /// sentiment could not be parsed landed as `Unknown` and does not count.
    pub fn coverage(&self) -> f64 {
        if self.results.is_empty() {
            return 0.0;
        }
        let covered = self
            .results
            .iter()
            .filter(|a| a.provenance == Provenance::Ai && a.sentiment != Sentiment::Unknown)
            .count();
        covered as f64 / self.results.len() as f64
    }
}

/// One element of the model's JSON array response.
#[derive(Debug, Deserialize)]
struct ResponseItem {
    index: Option<i64>,
    sentiment: Option<String>,
    #[serde(default)]
    issues: Vec<String>,
    #[serde(default)]
    themes: Vec<String>,
    summary: Option<String>,
}

impl ResponseItem {
    fn into_analysis(self) -> Analysis {
        let sentiment = match self.sentiment.as_deref() {
            Some(s) if s.eq_ignore_ascii_case("positive") => Sentiment::Positive,
            Some(s) if s.eq_ignore_ascii_case("neutral") => Sentiment::Neutral,
            Some(s) if s.eq_ignore_ascii_case("negative") => Sentiment::Negative,
            _ => Sentiment::Unknown,
        };
        Analysis {
            sentiment,
            issues: self.issues,
            themes: self.themes,
            summary: self.summary.unwrap_or_default(),
            provenance: Provenance::Ai,
        }
    }
}

/// Batches reviews through the ranked Gemini models, rotating on quota
/// errors and falling back to the rating heuristic per batch.
pub struct ReviewAnalyzer<'a> {
    backend: Option<&'a dyn CompletionBackend>,
    clock: &'a dyn Clock,
    config: AnalyzerConfig,
}

impl<'a> ReviewAnalyzer<'a> {
    /// `backend: None` runs the whole pass on the rating heuristic
    /// (no API key configured).
    pub fn new(
        backend: Option<&'a dyn CompletionBackend>,
        clock: &'a dyn Clock,
        config: AnalyzerConfig,
    ) -> Self {
        Self {
            backend,
            clock,
            config,
        }
    }

    pub async fn analyze(&self, records: &[ReviewRecord]) -> AnalysisRun {
        let mut run = AnalysisRun::default();
        if records.is_empty() {
            return run;
        }

        let batch_size = self.config.batch_size.max(1);
        let total_batches = records.len().div_ceil(batch_size);

        for (batch_num, batch) in records.chunks(batch_size).enumerate() {
            run.batches += 1;
            info!(
                batch = batch_num + 1,
                total_batches,
                reviews = batch.len(),
                "Analyzing batch"
            );

            let slots = match self.backend {
                Some(backend) => self.analyze_batch(backend, batch).await,
                None => vec![None; batch.len()],
            };

            for (slot, record) in slots.into_iter().zip(batch) {
                match slot {
                    Some(analysis) => {
                        run.ai_count += 1;
                        run.results.push(analysis);
                    }
                    None => {
                        run.fallback_count += 1;
                        run.results.push(self.fallback(record.rating));
                    }
                }
            }

            // Keep well under the per-minute request quota.
            if batch_num + 1 < total_batches {
                self.clock.sleep(self.config.inter_batch_delay).await;
            }
        }

        info!(
            ai = run.ai_count,
            fallback = run.fallback_count,
            coverage_pct = run.coverage() * 100.0,
            "Analysis pass complete"
        );
        run
    }

    /// One AI attempt for a batch. `None` slots are unmatched and get the
    /// fallback result from the caller.
    async fn analyze_batch(
        &self,
        backend: &dyn CompletionBackend,
        batch: &[ReviewRecord],
    ) -> Vec<Option<Analysis>> {
        let prompt = build_prompt(batch);
        match self.call_with_rotation(backend, &prompt).await {
            Some(items) => assign_slots(items, batch.len()),
            None => vec![None; batch.len()],
        }
    }

    /// Try each ranked model in order. A rate limit rotates to the next
    /// model; any other failure (including an unparseable response) abandons
    /// the batch.
    async fn call_with_rotation(
        &self,
        backend: &dyn CompletionBackend,
        prompt: &str,
    ) -> Option<Vec<ResponseItem>> {
        for model in &self.config.models {
            match backend.generate(model, prompt).await {
                Ok(text) => {
                    let cleaned = strip_code_fences(&text);
                    match serde_json::from_str::<Vec<ResponseItem>>(cleaned) {
                        Ok(items) => return Some(items),
                        Err(err) => {
                            warn!(model = %model, %err, "Unparseable model response, falling back");
                            return None;
                        }
                    }
                }
                Err(err) if err.is_rate_limited() => {
                    info!(model = %model, "Rate limited, rotating to next model");
                }
                Err(err) => {
                    warn!(model = %model, %err, "Model call failed, falling back");
                    return None;
                }
            }
        }
        warn!("All models rate limited, falling back for batch");
        None
    }

    /// Rating-only heuristic used when the AI backend is unavailable.
    fn fallback(&self, rating: Option<f64>) -> Analysis {
        let sentiment = match rating {
            Some(r) if r >= self.config.positive_min_rating => Sentiment::Positive,
            Some(r) if r >= self.config.neutral_min_rating => Sentiment::Neutral,
            Some(_) => Sentiment::Negative,
            None => Sentiment::Unknown,
        };
        Analysis {
            sentiment,
            issues: Vec::new(),
            themes: Vec::new(),
            summary: String::new(),
            provenance: Provenance::Fallback,
        }
    }
}

fn build_prompt(batch: &[ReviewRecord]) -> String {
    let mut prompt = String::from(PROMPT_HEADER);
    for (i, record) in batch.iter().enumerate() {
        let rating = record
            .rating
            .map(|r| format!("{r}/5"))
            .unwrap_or_else(|| "N/A".to_string());
        let text = truncate_to_char_boundary(&record.text, MAX_REVIEW_BYTES);
        prompt.push_str(&format!("\n[Review {}] (Rating: {rating})\n{text}\n", i + 1));
    }
    prompt
}

/// Place response items into batch slots. An in-range `index` claims its
/// slot; anything else goes to the next unfilled slot in batch order. A
/// filled slot is never overwritten, and surplus items are dropped.
fn assign_slots(items: Vec<ResponseItem>, batch_len: usize) -> Vec<Option<Analysis>> {
    let mut slots: Vec<Option<Analysis>> = vec![None; batch_len];
    for item in items {
        let explicit = item
            .index
            .filter(|&i| i >= 1 && i as usize <= batch_len)
            .map(|i| i as usize - 1);
        let target = match explicit {
            Some(slot) if slots[slot].is_none() => Some(slot),
            _ => slots.iter().position(Option::is_none),
        };
        match target {
            Some(slot) => slots[slot] = Some(item.into_analysis()),
            None => break,
        }
    }
    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockBackend, MockClock};
    use gemini_client::GeminiError;

    fn record(key: &str, rating: Option<f64>) -> ReviewRecord {
        ReviewRecord {
            row_key: key.to_string(),
            product_key: "B0100".to_string(),
            text: format!("review {key}"),
            rating,
        }
    }

    fn config(batch_size: usize) -> AnalyzerConfig {
        AnalyzerConfig {
            batch_size,
            models: vec!["flash-lite".into(), "flash".into(), "pro".into()],
            inter_batch_delay: Duration::from_secs(1),
            positive_min_rating: 4.0,
            neutral_min_rating: 3.0,
        }
    }

    fn ai_response(n: usize) -> String {
        let items: Vec<String> = (1..=n)
            .map(|i| {
                format!(
                    r#"{{"index":{i},"sentiment":"Positive","issues":[],"themes":["sound"],"summary":"Good."}}"#
                )
            })
            .collect();
        format!("[{}]", items.join(","))
    }

    #[tokio::test]
    async fn one_result_per_record_in_order() {
        let backend = MockBackend::new().respond_ok(&ai_response(2));
        let clock = MockClock::new();
        let analyzer = ReviewAnalyzer::new(Some(&backend), &clock, config(10));

        let records = vec![record("r1", Some(5.0)), record("r2", Some(1.0))];
        let run = analyzer.analyze(&records).await;

        assert_eq!(run.results.len(), 2);
        assert_eq!(run.ai_count, 2);
        assert!((run.coverage() - 1.0).abs() < f64::EPSILON);
        assert!(run.results.iter().all(|a| a.provenance == Provenance::Ai));
    }

    #[tokio::test]
    async fn rate_limit_rotates_to_next_model() {
        let backend = MockBackend::new()
            .respond_rate_limited()
            .respond_ok(&ai_response(1));
        let clock = MockClock::new();
        let analyzer = ReviewAnalyzer::new(Some(&backend), &clock, config(10));

        let run = analyzer.analyze(&[record("r1", Some(4.0))]).await;

        assert_eq!(run.ai_count, 1);
        let calls = backend.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].model, "flash-lite");
        assert_eq!(calls[1].model, "flash");
    }

    #[tokio::test]
    async fn all_models_rate_limited_falls_back_whole_batch() {
        let backend = MockBackend::new()
            .respond_rate_limited()
            .respond_rate_limited()
            .respond_rate_limited();
        let clock = MockClock::new();
        let analyzer = ReviewAnalyzer::new(Some(&backend), &clock, config(10));

        let records = vec![record("r1", Some(5.0)), record("r2", Some(2.0))];
        let run = analyzer.analyze(&records).await;

        assert_eq!(run.fallback_count, 2);
        assert!(run
            .results
            .iter()
            .all(|a| a.provenance == Provenance::Fallback));
    }

    #[tokio::test]
    async fn fatal_error_abandons_remaining_models() {
        let backend = MockBackend::new().respond_err(GeminiError::Api {
            status: 500,
            message: "internal".into(),
        });
        let clock = MockClock::new();
        let analyzer = ReviewAnalyzer::new(Some(&backend), &clock, config(10));

        let run = analyzer.analyze(&[record("r1", Some(2.0))]).await;

        assert_eq!(backend.calls().len(), 1);
        assert_eq!(run.fallback_count, 1);
        assert_eq!(run.results[0].sentiment, Sentiment::Negative);
    }

    #[tokio::test]
    async fn malformed_json_is_batch_fatal_not_a_crash() {
        let backend = MockBackend::new().respond_ok("this is not json");
        let clock = MockClock::new();
        let analyzer = ReviewAnalyzer::new(Some(&backend), &clock, config(10));

        let run = analyzer.analyze(&[record("r1", None)]).await;

        assert_eq!(run.fallback_count, 1);
        assert_eq!(run.results[0].sentiment, Sentiment::Unknown);
    }

    #[tokio::test]
    async fn code_fenced_response_is_accepted() {
        let fenced = format!("```json\n{}\n```", ai_response(1));
        let backend = MockBackend::new().respond_ok(&fenced);
        let clock = MockClock::new();
        let analyzer = ReviewAnalyzer::new(Some(&backend), &clock, config(10));

        let run = analyzer.analyze(&[record("r1", Some(5.0))]).await;
        assert_eq!(run.ai_count, 1);
    }

    #[tokio::test]
    async fn fallback_scenario_ratings_map_to_sentiment() {
        // batch_size=2, 3 records, every model call rate limited.
        let backend = MockBackend::new().always_rate_limited();
        let clock = MockClock::new();
        let analyzer = ReviewAnalyzer::new(Some(&backend), &clock, config(2));

        let records = vec![
            record("r1", Some(5.0)),
            record("r2", Some(2.0)),
            record("r3", None),
        ];
        let run = analyzer.analyze(&records).await;

        let sentiments: Vec<Sentiment> = run.results.iter().map(|a| a.sentiment).collect();
        assert_eq!(
            sentiments,
            vec![Sentiment::Positive, Sentiment::Negative, Sentiment::Unknown]
        );
        assert!(run
            .results
            .iter()
            .all(|a| a.provenance == Provenance::Fallback));
        assert_eq!(run.batches, 2);
    }

    #[tokio::test]
    async fn rotation_resets_between_batches() {
        // Batch 1: first model rate limited, second succeeds.
        // Batch 2 must start from the first model again.
        let backend = MockBackend::new()
            .respond_rate_limited()
            .respond_ok(&ai_response(1))
            .respond_ok(&ai_response(1));
        let clock = MockClock::new();
        let analyzer = ReviewAnalyzer::new(Some(&backend), &clock, config(1));

        let records = vec![record("r1", Some(4.0)), record("r2", Some(4.0))];
        let run = analyzer.analyze(&records).await;

        assert_eq!(run.ai_count, 2);
        let models: Vec<String> = backend.calls().iter().map(|c| c.model.clone()).collect();
        assert_eq!(models, vec!["flash-lite", "flash", "flash-lite"]);
    }

    #[tokio::test]
    async fn no_backend_means_fallback_only() {
        let clock = MockClock::new();
        let analyzer = ReviewAnalyzer::new(None, &clock, config(10));

        let run = analyzer.analyze(&[record("r1", Some(3.5))]).await;
        assert_eq!(run.fallback_count, 1);
        assert_eq!(run.results[0].sentiment, Sentiment::Neutral);
        assert!((run.coverage()).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn empty_input_makes_no_calls() {
        let backend = MockBackend::new();
        let clock = MockClock::new();
        let analyzer = ReviewAnalyzer::new(Some(&backend), &clock, config(10));

        let run = analyzer.analyze(&[]).await;
        assert!(run.results.is_empty());
        assert!(backend.calls().is_empty());
        assert_eq!(run.coverage(), 0.0);
    }

    #[tokio::test]
    async fn inter_batch_delay_between_batches_only() {
        let backend = MockBackend::new()
            .respond_ok(&ai_response(1))
            .respond_ok(&ai_response(1));
        let clock = MockClock::new();
        let analyzer = ReviewAnalyzer::new(Some(&backend), &clock, config(1));

        analyzer
            .analyze(&[record("r1", None), record("r2", None)])
            .await;
        // Two batches, one delay between them.
        assert_eq!(clock.sleeps().len(), 1);
    }

    #[tokio::test]
    async fn unparseable_sentiment_does_not_count_toward_coverage() {
        // "Mixed" is not a sentiment we accept; the slot stays AI-provenance
        // Unknown but must not inflate coverage.
        let response = r#"[
            {"index":1,"sentiment":"Mixed","issues":[],"themes":[],"summary":"Hmm."},
            {"index":2,"sentiment":"Positive","issues":[],"themes":[],"summary":"Good."}
        ]"#;
        let backend = MockBackend::new().respond_ok(response);
        let clock = MockClock::new();
        let analyzer = ReviewAnalyzer::new(Some(&backend), &clock, config(10));

        let records = vec![record("r1", Some(3.0)), record("r2", Some(5.0))];
        let run = analyzer.analyze(&records).await;

        assert_eq!(run.results[0].sentiment, Sentiment::Unknown);
        assert_eq!(run.results[0].provenance, Provenance::Ai);
        assert!((run.coverage() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn explicit_index_claims_its_slot() {
        let items: Vec<ResponseItem> = serde_json::from_str(
            r#"[{"index":2,"sentiment":"Negative","summary":"Bad."},
                {"index":1,"sentiment":"Positive","summary":"Good."}]"#,
        )
        .unwrap();
        let slots = assign_slots(items, 2);
        assert_eq!(slots[0].as_ref().unwrap().sentiment, Sentiment::Positive);
        assert_eq!(slots[1].as_ref().unwrap().sentiment, Sentiment::Negative);
    }

    #[test]
    fn invalid_index_assigns_positionally() {
        let items: Vec<ResponseItem> = serde_json::from_str(
            r#"[{"index":99,"sentiment":"Positive","summary":""},
                {"sentiment":"Negative","summary":""}]"#,
        )
        .unwrap();
        let slots = assign_slots(items, 3);
        assert_eq!(slots[0].as_ref().unwrap().sentiment, Sentiment::Positive);
        assert_eq!(slots[1].as_ref().unwrap().sentiment, Sentiment::Negative);
        assert!(slots[2].is_none());
    }

    #[test]
    fn duplicate_index_never_overwrites_a_filled_slot() {
        let items: Vec<ResponseItem> = serde_json::from_str(
            r#"[{"index":1,"sentiment":"Positive","summary":""},
                {"index":1,"sentiment":"Negative","summary":""}]"#,
        )
        .unwrap();
        let slots = assign_slots(items, 2);
        assert_eq!(slots[0].as_ref().unwrap().sentiment, Sentiment::Positive);
        // The duplicate lands in the next free slot instead.
        assert_eq!(slots[1].as_ref().unwrap().sentiment, Sentiment::Negative);
    }

    #[test]
    fn surplus_items_are_dropped() {
        let items: Vec<ResponseItem> = serde_json::from_str(
            r#"[{"index":1,"sentiment":"Positive","summary":""},
                {"index":2,"sentiment":"Neutral","summary":""},
                {"index":3,"sentiment":"Negative","summary":""}]"#,
        )
        .unwrap();
        let slots = assign_slots(items, 2);
        assert_eq!(slots.len(), 2);
        assert!(slots.iter().all(Option::is_some));
    }
}
