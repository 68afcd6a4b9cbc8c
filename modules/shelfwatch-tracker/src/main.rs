use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use brightdata_client::BrightDataClient;
use gemini_client::{CompletionBackend, GeminiClient};
use shelfwatch_common::Config;
use shelfwatch_tracker::clock::TokioClock;
use shelfwatch_tracker::pricing::{PostgresHistory, PriceHistory};
use shelfwatch_tracker::Tracker;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("shelfwatch_tracker=info".parse()?),
        )
        .init();

    info!("Shelfwatch tracker starting...");

    let config = Config::from_env();
    config.log_redacted();

    let api = BrightDataClient::new(config.brightdata_api_token.clone());

    let gemini = config.gemini_api_key.as_deref().map(GeminiClient::new);
    if gemini.is_none() {
        warn!("GEMINI_API_KEY not set, running rating-based fallback analysis only");
    }

    let history = match &config.database_url {
        Some(url) => match PostgresHistory::connect(url).await {
            Ok(history) => Some(history),
            Err(err) => {
                warn!(%err, "Could not connect to price history, delta detection disabled");
                None
            }
        },
        None => None,
    };

    let clock = TokioClock;
    let tracker = Tracker::new(
        &api,
        gemini.as_ref().map(|g| g as &dyn CompletionBackend),
        history.as_ref().map(|h| h as &dyn PriceHistory),
        &clock,
        config,
    );

    let output = tracker.run().await?;
    info!("{}", output.stats);

    if output.alerts.total_alerts > 0 {
        info!(
            drops = output.alerts.drops,
            increases = output.alerts.increases,
            "Price alerts ready for notifier"
        );
        for delta in &output.alerts.top_drops {
            info!(
                product = %delta.product_key,
                previous = ?delta.previous,
                current = delta.current,
                change_pct = delta.change_pct,
                "Top price drop"
            );
        }
    }

    info!(records = output.enriched.len(), "Enriched record set ready");
    Ok(())
}
