use tracing::warn;

use shelfwatch_common::{ProductRecord, ShelfwatchError};

use crate::analyzer::AnalysisRun;

#[derive(Debug, Clone)]
pub struct QualityThresholds {
    pub min_records: usize,
    pub min_price_rate: f64,
    pub min_rating_rate: f64,
}

/// Gate a product batch before it feeds the rest of the run: enough rows,
/// enough of them carrying usable prices and ratings.
pub fn products_acceptable(products: &[ProductRecord], thresholds: &QualityThresholds) -> bool {
    if products.is_empty() {
        warn!("Quality gate: no products collected");
        return false;
    }
    if products.len() < thresholds.min_records {
        warn!(
            count = products.len(),
            min = thresholds.min_records,
            "Quality gate: too few products"
        );
        return false;
    }

    let total = products.len() as f64;
    let price_rate = products.iter().filter(|p| p.price.is_some()).count() as f64 / total;
    if price_rate < thresholds.min_price_rate {
        warn!(
            price_rate,
            min = thresholds.min_price_rate,
            "Quality gate: too few valid prices"
        );
        return false;
    }

    let rating_rate = products.iter().filter(|p| p.rating.is_some()).count() as f64 / total;
    if rating_rate < thresholds.min_rating_rate {
        warn!(
            rating_rate,
            min = thresholds.min_rating_rate,
            "Quality gate: too few valid ratings"
        );
        return false;
    }

    true
}

/// Partial AI coverage is a metric, not a failure, until it drops below the
/// acceptance threshold; then the run fails loudly.
pub fn check_coverage(run: &AnalysisRun, min_coverage: f64) -> Result<(), ShelfwatchError> {
    if run.results.is_empty() {
        return Ok(());
    }
    let coverage = run.coverage();
    if coverage < min_coverage {
        return Err(ShelfwatchError::CoverageBelowThreshold {
            coverage: coverage * 100.0,
            required: min_coverage * 100.0,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelfwatch_common::{Analysis, Provenance, Sentiment};

    fn product(price: Option<f64>, rating: Option<f64>) -> ProductRecord {
        ProductRecord {
            product_key: "B01".to_string(),
            title: "Earbuds".to_string(),
            url: None,
            price,
            rating,
            reviews_count: None,
        }
    }

    fn thresholds() -> QualityThresholds {
        QualityThresholds {
            min_records: 2,
            min_price_rate: 0.5,
            min_rating_rate: 0.5,
        }
    }

    fn run_with_coverage(ai: usize, fallback: usize) -> AnalysisRun {
        let mut run = AnalysisRun::default();
        for _ in 0..ai {
            run.ai_count += 1;
            run.results.push(Analysis {
                sentiment: Sentiment::Positive,
                issues: vec![],
                themes: vec![],
                summary: String::new(),
                provenance: Provenance::Ai,
            });
        }
        for _ in 0..fallback {
            run.fallback_count += 1;
            run.results.push(Analysis::unknown());
        }
        run
    }

    #[test]
    fn rejects_too_few_products() {
        let products = vec![product(Some(9.99), Some(4.0))];
        assert!(!products_acceptable(&products, &thresholds()));
    }

    #[test]
    fn rejects_sparse_prices() {
        let products = vec![
            product(Some(9.99), Some(4.0)),
            product(None, Some(4.0)),
            product(None, Some(3.0)),
        ];
        assert!(!products_acceptable(&products, &thresholds()));
    }

    #[test]
    fn accepts_good_batch() {
        let products = vec![
            product(Some(9.99), Some(4.0)),
            product(Some(19.99), Some(3.5)),
            product(None, None),
        ];
        assert!(products_acceptable(&products, &thresholds()));
    }

    #[test]
    fn coverage_above_threshold_passes() {
        let run = run_with_coverage(3, 1);
        assert!(check_coverage(&run, 0.5).is_ok());
    }

    #[test]
    fn coverage_below_threshold_fails_loudly() {
        let run = run_with_coverage(1, 3);
        let err = check_coverage(&run, 0.5).unwrap_err();
        assert!(matches!(
            err,
            ShelfwatchError::CoverageBelowThreshold { .. }
        ));
    }

    #[test]
    fn empty_run_is_not_a_coverage_failure() {
        let run = AnalysisRun::default();
        assert!(check_coverage(&run, 0.5).is_ok());
    }
}
