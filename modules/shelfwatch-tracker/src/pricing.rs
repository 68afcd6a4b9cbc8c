use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;
use tracing::{debug, info};

use shelfwatch_common::{AlertKind, AlertSummary, PriceDelta, PriceObservation};

/// Read-only lookup of the most recent known price per product key.
/// Absence of a key is a valid "no history" answer, not an error.
#[async_trait]
pub trait PriceHistory: Send + Sync {
    async fn last_prices(&self, keys: &[String]) -> Result<HashMap<String, f64>>;
}

/// Price history backed by the `amazon_products` table.
pub struct PostgresHistory {
    pool: PgPool,
}

impl PostgresHistory {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl PriceHistory for PostgresHistory {
    async fn last_prices(&self, keys: &[String]) -> Result<HashMap<String, f64>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT DISTINCT ON (asin)
                asin,
                best_price
            FROM amazon_products
            WHERE asin = ANY($1)
            ORDER BY asin, scraped_at DESC
            "#,
        )
        .bind(keys)
        .fetch_all(&self.pool)
        .await?;

        let mut prices = HashMap::with_capacity(rows.len());
        for row in rows {
            let asin: String = row.try_get("asin")?;
            let price: f64 = row.try_get("best_price")?;
            prices.insert(asin, price);
        }
        debug!(found = prices.len(), requested = keys.len(), "Fetched price history");
        Ok(prices)
    }
}

/// Compare current observations against the last known price per key.
///
/// Changes are rounded (2 decimals absolute, 1 decimal percent) before
/// classification; the threshold boundary is inclusive on both sides. A key
/// with no usable history gets `previous: None` and no alert.
pub fn detect(
    current: &[PriceObservation],
    history: &HashMap<String, f64>,
    threshold_pct: f64,
) -> Vec<PriceDelta> {
    current
        .iter()
        .map(|obs| {
            let previous = history
                .get(&obs.product_key)
                .copied()
                .filter(|p| *p > 0.0);

            match previous {
                Some(prev) => {
                    let change = round2(obs.price - prev);
                    let change_pct = round1((obs.price - prev) / prev * 100.0);
                    let alert = if change_pct <= -threshold_pct {
                        AlertKind::Drop
                    } else if change_pct >= threshold_pct {
                        AlertKind::Increase
                    } else {
                        AlertKind::None
                    };
                    PriceDelta {
                        product_key: obs.product_key.clone(),
                        previous: Some(prev),
                        current: obs.price,
                        change,
                        change_pct,
                        alert,
                    }
                }
                None => PriceDelta {
                    product_key: obs.product_key.clone(),
                    previous: None,
                    current: obs.price,
                    change: 0.0,
                    change_pct: 0.0,
                    alert: AlertKind::None,
                },
            }
        })
        .collect()
}

/// Alert counts plus the top `top_n` drops, most negative first.
pub fn summarize(deltas: &[PriceDelta], top_n: usize) -> AlertSummary {
    let drops = deltas.iter().filter(|d| d.alert == AlertKind::Drop).count();
    let increases = deltas
        .iter()
        .filter(|d| d.alert == AlertKind::Increase)
        .count();

    let mut top_drops: Vec<PriceDelta> = deltas
        .iter()
        .filter(|d| d.alert == AlertKind::Drop)
        .cloned()
        .collect();
    top_drops.sort_by(|a, b| a.change_pct.total_cmp(&b.change_pct));
    top_drops.truncate(top_n);

    let summary = AlertSummary {
        total_alerts: drops + increases,
        drops,
        increases,
        top_drops,
    };
    info!(
        drops = summary.drops,
        increases = summary.increases,
        "Price change summary"
    );
    summary
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}
