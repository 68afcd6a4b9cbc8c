use std::collections::HashMap;

use shelfwatch_common::{Analysis, EnrichedReview, PriceDelta, ReviewRecord};

/// Merge analyses and price deltas back onto the review set.
///
/// Pure, order-preserving join: analyses pair positionally (the analyzer
/// guarantees one per record in input order), deltas join by product key.
/// Every input row comes back exactly once; a row nothing matched keeps
/// neutral defaults.
pub fn assemble(
    reviews: &[ReviewRecord],
    analyses: &[Analysis],
    deltas: &[PriceDelta],
) -> Vec<EnrichedReview> {
    let by_product: HashMap<&str, &PriceDelta> = deltas
        .iter()
        .map(|d| (d.product_key.as_str(), d))
        .collect();

    reviews
        .iter()
        .enumerate()
        .map(|(i, record)| EnrichedReview {
            record: record.clone(),
            analysis: analyses.get(i).cloned().unwrap_or_else(Analysis::unknown),
            price: by_product.get(record.product_key.as_str()).map(|d| (*d).clone()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelfwatch_common::{AlertKind, Provenance, Sentiment};

    fn record(key: &str, product: &str) -> ReviewRecord {
        ReviewRecord {
            row_key: key.to_string(),
            product_key: product.to_string(),
            text: "text".to_string(),
            rating: Some(4.0),
        }
    }

    fn analysis(sentiment: Sentiment) -> Analysis {
        Analysis {
            sentiment,
            issues: vec![],
            themes: vec![],
            summary: String::new(),
            provenance: Provenance::Ai,
        }
    }

    fn delta(product: &str) -> PriceDelta {
        PriceDelta {
            product_key: product.to_string(),
            previous: Some(100.0),
            current: 85.0,
            change: -15.0,
            change_pct: -15.0,
            alert: AlertKind::Drop,
        }
    }

    #[test]
    fn preserves_order_without_duplicating_or_dropping() {
        let reviews = vec![
            record("r1", "B01"),
            record("r2", "B02"),
            record("r3", "B01"),
        ];
        let analyses = vec![
            analysis(Sentiment::Positive),
            analysis(Sentiment::Negative),
            analysis(Sentiment::Neutral),
        ];
        let enriched = assemble(&reviews, &analyses, &[delta("B01")]);

        assert_eq!(enriched.len(), 3);
        assert_eq!(enriched[0].record.row_key, "r1");
        assert_eq!(enriched[1].record.row_key, "r2");
        assert_eq!(enriched[2].record.row_key, "r3");
        assert_eq!(enriched[0].analysis.sentiment, Sentiment::Positive);
        assert_eq!(enriched[2].analysis.sentiment, Sentiment::Neutral);
    }

    #[test]
    fn deltas_join_by_product_key() {
        let reviews = vec![record("r1", "B01"), record("r2", "B02")];
        let analyses = vec![analysis(Sentiment::Positive), analysis(Sentiment::Positive)];
        let enriched = assemble(&reviews, &analyses, &[delta("B01")]);

        assert!(enriched[0].price.is_some());
        assert_eq!(enriched[0].price.as_ref().unwrap().alert, AlertKind::Drop);
        assert!(enriched[1].price.is_none());
    }

    #[test]
    fn missing_analysis_gets_neutral_defaults() {
        let reviews = vec![record("r1", "B01"), record("r2", "B01")];
        let analyses = vec![analysis(Sentiment::Positive)];
        let enriched = assemble(&reviews, &analyses, &[]);

        assert_eq!(enriched.len(), 2);
        assert_eq!(enriched[1].analysis.sentiment, Sentiment::Unknown);
        assert_eq!(enriched[1].analysis.provenance, Provenance::Fallback);
        assert!(enriched[1].price.is_none());
    }
}
