//! Rendering-fit predicate: does a label or sentence fit its slot in the resume template?

pub mod metrics;

use metrics::FontMetricTable;

/// Supplied by the document side; both engines use it unchanged to gate typed or generated text.
pub trait FitPredicate: Send + Sync {
    fn fits(&self, text: &str, limit_em: f32) -> bool;
}

/// Measures text with static font metrics and compares it with the limit.
#[derive(Debug, Clone, Copy)]
pub struct MetricFit {
    metrics: &'static FontMetricTable,
}

impl MetricFit {
    pub fn width_em(&self, text: &str) -> f32 {
        self.metrics.measure_str(text.trim())
    }
}

impl Default for MetricFit {
    fn default() -> Self {
        Self {
            metrics: &metrics::ARIAL,
        }
    }
}

impl FitPredicate for MetricFit {
    fn fits(&self, text: &str, limit_em: f32) -> bool {
        self.width_em(text) <= limit_em
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FitLimits;

    #[test]
    fn test_short_skill_fits_default_limit() {
        let fit = MetricFit::default();
        assert!(fit.fits("PostgreSQL", FitLimits::default().skill_em));
    }

    #[test]
    fn test_long_skill_does_not_fit_default_limit() {
        let fit = MetricFit::default();
        assert!(!fit.fits(
            "Distributed Stream Processing Architecture",
            FitLimits::default().skill_em
        ));
    }

    #[test]
    fn test_surrounding_whitespace_is_ignored() {
        let fit = MetricFit::default();
        assert_eq!(fit.width_em("  Go  "), fit.width_em("Go"));
    }
}
