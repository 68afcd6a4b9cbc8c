use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// --- Review analysis ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
    Unknown,
}

/// Where an analysis came from: the AI backend or the rating heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Ai,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub sentiment: Sentiment,
    pub issues: Vec<String>,
    pub themes: Vec<String>,
    pub summary: String,
    pub provenance: Provenance,
}

impl Analysis {
    /// Neutral default for a record nothing matched.
    pub fn unknown() -> Self {
        Self {
            sentiment: Sentiment::Unknown,
            issues: Vec::new(),
            themes: Vec::new(),
            summary: String::new(),
            provenance: Provenance::Fallback,
        }
    }
}

/// One review to analyze. `row_key` is the stable identity used to merge
/// results back; `product_key` joins the review to its product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub row_key: String,
    pub product_key: String,
    pub text: String,
    pub rating: Option<f64>,
}

impl ReviewRecord {
    /// Build a record from a raw snapshot item. The review text lives under
    /// different field names depending on the dataset version; `position`
    /// backstops the row key when the item has no id of its own.
    pub fn from_item(item: &Value, position: usize) -> Option<Self> {
        const TEXT_FIELDS: &[&str] = &["review_text", "text", "body", "content", "review"];

        let text = TEXT_FIELDS
            .iter()
            .find_map(|f| item.get(f).and_then(Value::as_str))?
            .to_string();

        let product_key = item
            .get("asin")
            .or_else(|| item.get("parent_asin"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let row_key = item
            .get("review_id")
            .or_else(|| item.get("url"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{product_key}#{position}"));

        Some(Self {
            row_key,
            product_key,
            text,
            rating: numeric_field(item, &["rating"]),
        })
    }
}

// --- Products and prices ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub product_key: String,
    pub title: String,
    pub url: Option<String>,
    pub price: Option<f64>,
    pub rating: Option<f64>,
    pub reviews_count: Option<f64>,
}

impl ProductRecord {
    pub fn from_item(item: &Value) -> Option<Self> {
        const PRICE_FIELDS: &[&str] = &["best_price", "final_price", "price"];

        let product_key = item.get("asin").and_then(Value::as_str)?.to_string();
        Some(Self {
            product_key,
            title: item
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or("Unknown")
                .to_string(),
            url: item.get("url").and_then(Value::as_str).map(str::to_string),
            price: numeric_field(item, PRICE_FIELDS),
            rating: numeric_field(item, &["rating"]),
            reviews_count: numeric_field(item, &["reviews_count"]),
        })
    }
}

/// One price seen for a product at a point in time. Most-recent per key is
/// authoritative for delta detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub product_key: String,
    pub price: f64,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    None,
    Drop,
    Increase,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceDelta {
    pub product_key: String,
    /// Absent on the first-ever observation of this key.
    pub previous: Option<f64>,
    pub current: f64,
    pub change: f64,
    pub change_pct: f64,
    pub alert: AlertKind,
}

/// Counts plus top movers, handed to an external notifier as-is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertSummary {
    pub total_alerts: usize,
    pub drops: usize,
    pub increases: usize,
    /// Most negative change_pct first.
    pub top_drops: Vec<PriceDelta>,
}

// --- Merged output ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedReview {
    pub record: ReviewRecord,
    pub analysis: Analysis,
    pub price: Option<PriceDelta>,
}

/// Read a numeric field that may arrive as a JSON number or a string
/// (the scraper emits both, e.g. "4.5 out of 5" becomes "4.5").
fn numeric_field(item: &Value, fields: &[&str]) -> Option<f64> {
    fields.iter().find_map(|f| {
        let v = item.get(f)?;
        v.as_f64()
            .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
    })
}
