use std::collections::HashMap;

use serde_json::{json, Value};
use tracing::{info, warn};

use brightdata_client::{AMAZON_PRODUCTS_DATASET, AMAZON_REVIEWS_DATASET};
use gemini_client::CompletionBackend;
use shelfwatch_common::{
    AlertSummary, Config, EnrichedReview, PriceObservation, ProductRecord, ReviewRecord, Sentiment,
    ShelfwatchError,
};

use crate::analyzer::{AnalyzerConfig, ReviewAnalyzer};
use crate::assembler::assemble;
use crate::clock::Clock;
use crate::collector::{Collector, JobOutcome};
use crate::pricing::{self, PriceHistory};
use crate::quality::{self, QualityThresholds};
use crate::stats::TrackerStats;
use crate::traits::SnapshotApi;

/// Everything a run produces: the enriched record set for exporters, the
/// alert summary for the notifier, and the run accounting.
#[derive(Debug)]
pub struct RunOutput {
    pub enriched: Vec<EnrichedReview>,
    pub alerts: AlertSummary,
    pub stats: TrackerStats,
}

/// One end-to-end tracking run: discover products, collect their reviews,
/// analyze sentiment, detect price movement, merge.
pub struct Tracker<'a> {
    api: &'a dyn SnapshotApi,
    backend: Option<&'a dyn CompletionBackend>,
    history: Option<&'a dyn PriceHistory>,
    clock: &'a dyn Clock,
    config: Config,
}

impl<'a> Tracker<'a> {
    pub fn new(
        api: &'a dyn SnapshotApi,
        backend: Option<&'a dyn CompletionBackend>,
        history: Option<&'a dyn PriceHistory>,
        clock: &'a dyn Clock,
        config: Config,
    ) -> Self {
        Self {
            api,
            backend,
            history,
            clock,
            config,
        }
    }

    pub async fn run(&self) -> Result<RunOutput, ShelfwatchError> {
        let mut stats = TrackerStats::default();
        let started = self.clock.now();
        let collector = Collector::new(self.api, self.clock);

        // Product discovery is the prerequisite for everything downstream;
        // a terminal failure here ends the run.
        let products = self.collect_products(&collector, &mut stats).await?;

        let gate = QualityThresholds {
            min_records: self.config.min_records,
            min_price_rate: self.config.min_price_rate,
            min_rating_rate: self.config.min_rating_rate,
        };
        if !quality::products_acceptable(&products, &gate) {
            warn!("Product batch failed the quality gate, continuing with degraded data");
        }

        // Review collection degrades to an empty set; analysis and pricing
        // still run on whatever came back.
        let reviews = self.collect_reviews(&collector, &products, &mut stats).await;

        let analyzer = ReviewAnalyzer::new(
            self.backend,
            self.clock,
            AnalyzerConfig::from_config(&self.config),
        );
        let analysis = analyzer.analyze(&reviews).await;
        stats.batches = analysis.batches as u32;
        stats.ai_analyzed = analysis.ai_count as u32;
        stats.fallback_analyzed = analysis.fallback_count as u32;
        for result in &analysis.results {
            match result.sentiment {
                Sentiment::Positive => stats.positive += 1,
                Sentiment::Neutral => stats.neutral += 1,
                Sentiment::Negative => stats.negative += 1,
                Sentiment::Unknown => stats.unknown += 1,
            }
        }

        let deltas = self.detect_deltas(&products, &mut stats).await;
        let alerts = pricing::summarize(&deltas, self.config.top_drops);
        stats.price_drops = alerts.drops as u32;
        stats.price_increases = alerts.increases as u32;

        let enriched = assemble(&reviews, &analysis.results, &deltas);

        // Coverage is a metric unless the backend was supposed to carry the
        // run; a fallback-only run (no API key) is never gated on it.
        if self.backend.is_some() {
            quality::check_coverage(&analysis, self.config.min_ai_coverage)?;
        }

        stats.wait_secs = (self.clock.now() - started).num_seconds().max(0) as u32;

        Ok(RunOutput {
            enriched,
            alerts,
            stats,
        })
    }

    async fn collect_products(
        &self,
        collector: &Collector<'a>,
        stats: &mut TrackerStats,
    ) -> Result<Vec<ProductRecord>, ShelfwatchError> {
        info!(keywords = ?self.config.keywords, "Discovering products");
        let mut job = collector
            .submit_discovery(
                AMAZON_PRODUCTS_DATASET,
                &self.config.keywords,
                self.config.limit_per_keyword,
            )
            .await?;

        match collector
            .await_completion(&mut job, self.config.poll_interval, self.config.max_wait)
            .await
        {
            JobOutcome::Completed {
                successes,
                errors,
                polls,
            } => {
                stats.polls += polls;
                stats.product_errors = errors.len() as u32;
                let products: Vec<ProductRecord> = successes
                    .iter()
                    .filter_map(ProductRecord::from_item)
                    .collect();
                stats.products_collected = products.len() as u32;
                Ok(products)
            }
            JobOutcome::Failed { error, polls } => {
                stats.polls += polls;
                Err(ShelfwatchError::Collection(format!(
                    "product discovery failed: {error}"
                )))
            }
            JobOutcome::TimedOut { waited, polls } => {
                stats.polls += polls;
                Err(ShelfwatchError::Collection(format!(
                    "product discovery timed out after {}s",
                    waited.as_secs()
                )))
            }
        }
    }

    async fn collect_reviews(
        &self,
        collector: &Collector<'a>,
        products: &[ProductRecord],
        stats: &mut TrackerStats,
    ) -> Vec<ReviewRecord> {
        let inputs = review_inputs(products, self.config.top_n_products);
        if inputs.is_empty() {
            info!("No product URLs to collect reviews for");
            return Vec::new();
        }

        let mut job = match collector.submit(AMAZON_REVIEWS_DATASET, &inputs).await {
            Ok(job) => job,
            Err(err) => {
                warn!(%err, "Review submission failed, continuing without reviews");
                return Vec::new();
            }
        };

        match collector
            .await_completion(&mut job, self.config.poll_interval, self.config.max_wait)
            .await
        {
            JobOutcome::Completed {
                successes,
                errors,
                polls,
            } => {
                stats.polls += polls;
                stats.review_errors = errors.len() as u32;
                let reviews: Vec<ReviewRecord> = successes
                    .iter()
                    .enumerate()
                    .filter_map(|(i, item)| ReviewRecord::from_item(item, i))
                    .collect();
                stats.reviews_collected = reviews.len() as u32;
                reviews
            }
            JobOutcome::Failed { error, polls } => {
                stats.polls += polls;
                warn!(error = %error, "Review collection failed, continuing without reviews");
                Vec::new()
            }
            JobOutcome::TimedOut { waited, polls } => {
                stats.polls += polls;
                warn!(
                    waited_secs = waited.as_secs(),
                    "Review collection timed out, continuing without reviews"
                );
                Vec::new()
            }
        }
    }

    /// Delta detection degrades to nothing when history is unavailable:
    /// no DATABASE_URL, or a lookup failure mid-run.
    async fn detect_deltas(
        &self,
        products: &[ProductRecord],
        stats: &mut TrackerStats,
    ) -> Vec<shelfwatch_common::PriceDelta> {
        let Some(history) = self.history else {
            info!("No price history configured, skipping delta detection");
            return Vec::new();
        };

        let observations: Vec<PriceObservation> = products
            .iter()
            .filter_map(|p| {
                p.price.filter(|price| *price >= 0.0).map(|price| PriceObservation {
                    product_key: p.product_key.clone(),
                    price,
                    observed_at: self.clock.now(),
                })
            })
            .collect();
        if observations.is_empty() {
            return Vec::new();
        }

        let keys: Vec<String> = observations
            .iter()
            .map(|o| o.product_key.clone())
            .collect();
        let last_prices: HashMap<String, f64> = match history.last_prices(&keys).await {
            Ok(prices) => prices,
            Err(err) => {
                warn!(%err, "Price history lookup failed, skipping delta detection");
                return Vec::new();
            }
        };

        let deltas = pricing::detect(
            &observations,
            &last_prices,
            self.config.price_change_threshold,
        );
        stats.products_with_history = deltas.iter().filter(|d| d.previous.is_some()).count() as u32;
        deltas
    }
}

/// Inputs for the review scrape: the top N products by review count that
/// carry a URL.
fn review_inputs(products: &[ProductRecord], top_n: usize) -> Vec<Value> {
    let mut ranked: Vec<&ProductRecord> = products.iter().filter(|p| p.url.is_some()).collect();
    ranked.sort_by(|a, b| {
        b.reviews_count
            .unwrap_or(0.0)
            .total_cmp(&a.reviews_count.unwrap_or(0.0))
    });
    ranked
        .into_iter()
        .take(top_n)
        .filter_map(|p| p.url.as_ref())
        .map(|url| json!({ "url": url, "reviews_to_not_include": [] }))
        .collect()
}
