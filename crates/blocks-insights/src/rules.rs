//! Insight rule battery.
//!
//! A fixed, ordered set of independent predicates. Each rule produces zero
//! or one `Insight`. Evaluation order is `InsightRule::ALL`; it is also the
//! tie-break when two insights share actionability and confidence.
//!
//! ## Rules
//! | Rule | Category | Confidence | Actionable |
//! |------|----------|-----------:|:----------:|
//! | quality_value | opportunity | 85 | yes |
//! | cash_generators | opportunity | 75 | yes |
//! | percentile_leaders | opportunity | 70 | yes |
//! | high_leverage | risk | 80 | yes |
//! | weak_interest_coverage | risk | 65 | no |
//! | valuation_climate | trend | 60 | no |
//! | growth_climate | trend | 55 | no |
//! | extreme_returns | outlier | 50 | no |
//! | deep_value | outlier | 60 | yes |
//! | quality_discount | correlation | 70 | yes |
//! | growth_at_reasonable_price | correlation | 65 | yes |
//!
//! A missing metric value never satisfies a threshold.

use crate::insight::{Insight, InsightCategory};
use crate::stats::DerivedStats;
use crate::thresholds::InsightThresholds;
use blocks_metrics::{EntityBatch, EntityRow, MetricKey};

/// Rule id for the empty-batch insight.
pub const NO_DATA_RULE_ID: &str = "no_data";

/// Members of the rule battery, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InsightRule {
    QualityValue,
    CashGenerators,
    PercentileLeaders,
    HighLeverage,
    WeakInterestCoverage,
    ValuationClimate,
    GrowthClimate,
    ExtremeReturns,
    DeepValue,
    QualityDiscount,
    GrowthAtReasonablePrice,
}

impl InsightRule {
    pub const ALL: [InsightRule; 11] = [
        InsightRule::QualityValue,
        InsightRule::CashGenerators,
        InsightRule::PercentileLeaders,
        InsightRule::HighLeverage,
        InsightRule::WeakInterestCoverage,
        InsightRule::ValuationClimate,
        InsightRule::GrowthClimate,
        InsightRule::ExtremeReturns,
        InsightRule::DeepValue,
        InsightRule::QualityDiscount,
        InsightRule::GrowthAtReasonablePrice,
    ];

    pub fn id(self) -> &'static str {
        match self {
            InsightRule::QualityValue => "quality_value",
            InsightRule::CashGenerators => "cash_generators",
            InsightRule::PercentileLeaders => "percentile_leaders",
            InsightRule::HighLeverage => "high_leverage",
            InsightRule::WeakInterestCoverage => "weak_interest_coverage",
            InsightRule::ValuationClimate => "valuation_climate",
            InsightRule::GrowthClimate => "growth_climate",
            InsightRule::ExtremeReturns => "extreme_returns",
            InsightRule::DeepValue => "deep_value",
            InsightRule::QualityDiscount => "quality_discount",
            InsightRule::GrowthAtReasonablePrice => "growth_at_reasonable_price",
        }
    }

    pub fn category(self) -> InsightCategory {
        match self {
            InsightRule::QualityValue
            | InsightRule::CashGenerators
            | InsightRule::PercentileLeaders => InsightCategory::Opportunity,
            InsightRule::HighLeverage | InsightRule::WeakInterestCoverage => InsightCategory::Risk,
            InsightRule::ValuationClimate | InsightRule::GrowthClimate => InsightCategory::Trend,
            InsightRule::ExtremeReturns | InsightRule::DeepValue => InsightCategory::Outlier,
            InsightRule::QualityDiscount | InsightRule::GrowthAtReasonablePrice => {
                InsightCategory::Correlation
            }
        }
    }

    /// Fixed reliability score for the signal family.
    pub fn confidence(self) -> u8 {
        match self {
            InsightRule::QualityValue => 85,
            InsightRule::CashGenerators => 75,
            InsightRule::PercentileLeaders => 70,
            InsightRule::HighLeverage => 80,
            InsightRule::WeakInterestCoverage => 65,
            InsightRule::ValuationClimate => 60,
            InsightRule::GrowthClimate => 55,
            InsightRule::ExtremeReturns => 50,
            InsightRule::DeepValue => 60,
            InsightRule::QualityDiscount => 70,
            InsightRule::GrowthAtReasonablePrice => 65,
        }
    }

    pub fn actionable(self) -> bool {
        !matches!(
            self,
            InsightRule::WeakInterestCoverage
                | InsightRule::ValuationClimate
                | InsightRule::GrowthClimate
                | InsightRule::ExtremeReturns
        )
    }

    /// Metrics the rule reads from rows or batch statistics.
    ///
    /// `PercentileLeaders` reads whatever the percentile table ranked, so it
    /// has no fixed keys.
    pub fn metric_keys(self) -> &'static [MetricKey] {
        match self {
            InsightRule::QualityValue => &[
                MetricKey::ReturnOnCapital,
                MetricKey::EarningsYield,
                MetricKey::DebtToEquity,
            ],
            InsightRule::CashGenerators => &[MetricKey::FcfYield, MetricKey::OperatingMargin],
            InsightRule::PercentileLeaders => &[],
            InsightRule::HighLeverage => &[MetricKey::DebtToEquity],
            InsightRule::WeakInterestCoverage => &[MetricKey::InterestCoverage],
            InsightRule::ValuationClimate => &[MetricKey::PeRatio],
            InsightRule::GrowthClimate => &[MetricKey::RevenueGrowthYoy],
            InsightRule::ExtremeReturns => &[MetricKey::ReturnOnCapital],
            InsightRule::DeepValue => &[MetricKey::EarningsYield],
            InsightRule::QualityDiscount => &[MetricKey::GrossMargin, MetricKey::PeRatio],
            InsightRule::GrowthAtReasonablePrice => {
                &[MetricKey::RevenueGrowthYoy, MetricKey::EvToEbitda]
            }
        }
    }

    /// Evaluate the rule against a non-empty batch.
    pub fn evaluate(
        self,
        batch: &EntityBatch,
        stats: &DerivedStats,
        t: &InsightThresholds,
    ) -> Option<Insight> {
        match self {
            InsightRule::QualityValue => {
                let hits = matching(batch, |r| {
                    above(r, MetricKey::ReturnOnCapital, t.quality_min_return_on_capital)
                        && above(r, MetricKey::EarningsYield, t.quality_min_earnings_yield)
                        && below(r, MetricKey::DebtToEquity, t.quality_max_debt_to_equity)
                });
                self.grouped(
                    &hits,
                    t,
                    "High-quality businesses at fair prices",
                    "combine strong returns on capital with a high earnings yield and modest leverage",
                    format!(
                        "Return on capital > {:.0}%, earnings yield > {:.0}%, debt/equity < {:.1}.",
                        t.quality_min_return_on_capital * 100.0,
                        t.quality_min_earnings_yield * 100.0,
                        t.quality_max_debt_to_equity
                    ),
                    self.metric_keys().to_vec(),
                )
            }
            InsightRule::CashGenerators => {
                let hits = matching(batch, |r| {
                    above(r, MetricKey::FcfYield, t.cash_min_fcf_yield)
                        && above(r, MetricKey::OperatingMargin, t.cash_min_operating_margin)
                });
                self.grouped(
                    &hits,
                    t,
                    "Cash generators",
                    "pair a high free-cash-flow yield with healthy operating margins",
                    format!(
                        "FCF yield > {:.1}%, operating margin > {:.1}%.",
                        t.cash_min_fcf_yield, t.cash_min_operating_margin
                    ),
                    self.metric_keys().to_vec(),
                )
            }
            InsightRule::PercentileLeaders => {
                let table = stats.percentiles.as_ref()?;
                if table.metrics().len() < 2 {
                    return None;
                }
                let hits = matching(batch, |r| {
                    table.entity(&r.id).is_some_and(|ranks| {
                        table
                            .metrics()
                            .iter()
                            .all(|k| ranks.get(k).is_some_and(|p| *p >= t.leader_min_percentile))
                    })
                });
                self.grouped(
                    &hits,
                    t,
                    "Consistent leaders",
                    "rank in the top tier on every ranked metric",
                    format!(
                        "Percentile >= {} on all of: {}.",
                        t.leader_min_percentile,
                        join_keys(table.metrics())
                    ),
                    table.metrics().to_vec(),
                )
            }
            InsightRule::HighLeverage => {
                let hits = matching(batch, |r| {
                    above(r, MetricKey::DebtToEquity, t.risk_max_debt_to_equity)
                });
                self.grouped(
                    &hits,
                    t,
                    "Elevated leverage",
                    "carry debt well above their equity base",
                    format!("Debt/equity > {:.1}.", t.risk_max_debt_to_equity),
                    self.metric_keys().to_vec(),
                )
            }
            InsightRule::WeakInterestCoverage => {
                let hits = matching(batch, |r| {
                    below(r, MetricKey::InterestCoverage, t.risk_min_interest_coverage)
                });
                self.grouped(
                    &hits,
                    t,
                    "Thin interest coverage",
                    "earn barely enough to service their interest",
                    format!("Interest coverage < {:.1}x.", t.risk_min_interest_coverage),
                    self.metric_keys().to_vec(),
                )
            }
            InsightRule::ValuationClimate => {
                let summary = stats.batch.get(MetricKey::PeRatio)?;
                let mean = summary.positive_mean?;
                let bucket = if mean < t.valuation_attractive_pe {
                    "attractive"
                } else if mean < t.valuation_fair_pe {
                    "fair"
                } else {
                    "rich"
                };
                Some(self.batch_wide(
                    format!("Valuations look {}", bucket),
                    format!(
                        "Average P/E of {:.1} across {} with positive earnings.",
                        mean,
                        companies(summary.positive_count)
                    ),
                    format!(
                        "Attractive below {:.0}, fair below {:.0}, rich above.",
                        t.valuation_attractive_pe, t.valuation_fair_pe
                    ),
                    self.metric_keys().to_vec(),
                ))
            }
            InsightRule::GrowthClimate => {
                let summary = stats.batch.get(MetricKey::RevenueGrowthYoy)?;
                let bucket = if summary.mean > t.growth_expanding_pct {
                    "expanding"
                } else if summary.mean >= 0.0 {
                    "steady"
                } else {
                    "contracting"
                };
                Some(self.batch_wide(
                    format!("Revenue is {}", bucket),
                    format!(
                        "Average year-over-year revenue growth of {:.1}% across {}.",
                        summary.mean,
                        companies(summary.count)
                    ),
                    format!(
                        "Expanding above {:.0}%, steady at 0% or more, contracting below.",
                        t.growth_expanding_pct
                    ),
                    self.metric_keys().to_vec(),
                ))
            }
            InsightRule::ExtremeReturns => {
                let hits = matching(batch, |r| {
                    above(r, MetricKey::ReturnOnCapital, t.outlier_min_return_on_capital)
                });
                self.grouped(
                    &hits,
                    t,
                    "Extreme returns on capital",
                    "report returns on capital high enough to warrant a data check",
                    format!(
                        "Return on capital > {:.0}%. Small or negative working capital often inflates this ratio.",
                        t.outlier_min_return_on_capital * 100.0
                    ),
                    self.metric_keys().to_vec(),
                )
            }
            InsightRule::DeepValue => {
                let hits = matching(batch, |r| {
                    above(r, MetricKey::EarningsYield, t.outlier_min_earnings_yield)
                });
                self.grouped(
                    &hits,
                    t,
                    "Deep value outliers",
                    "trade at an unusually high earnings yield",
                    format!("Earnings yield > {:.0}%.", t.outlier_min_earnings_yield * 100.0),
                    self.metric_keys().to_vec(),
                )
            }
            InsightRule::QualityDiscount => {
                let hits = matching(batch, |r| {
                    above(r, MetricKey::GrossMargin, t.discount_min_gross_margin)
                        && between_open(r, MetricKey::PeRatio, 0.0, t.discount_max_pe)
                });
                self.grouped(
                    &hits,
                    t,
                    "Quality at a discount",
                    "have high gross margins yet trade at a low P/E",
                    format!(
                        "Gross margin > {:.0}% and 0 < P/E < {:.0}.",
                        t.discount_min_gross_margin, t.discount_max_pe
                    ),
                    self.metric_keys().to_vec(),
                )
            }
            InsightRule::GrowthAtReasonablePrice => {
                let hits = matching(batch, |r| {
                    above(r, MetricKey::RevenueGrowthYoy, t.garp_min_revenue_growth)
                        && between_open(r, MetricKey::EvToEbitda, 0.0, t.garp_max_ev_to_ebitda)
                });
                self.grouped(
                    &hits,
                    t,
                    "Growth at a reasonable price",
                    "grow revenue quickly without an EV/EBITDA premium",
                    format!(
                        "Revenue growth > {:.0}% and 0 < EV/EBITDA < {:.0}.",
                        t.garp_min_revenue_growth, t.garp_max_ev_to_ebitda
                    ),
                    self.metric_keys().to_vec(),
                )
            }
        }
    }

    /// Insight naming a group of matching tickers; `None` when nothing matched.
    fn grouped(
        self,
        hits: &[&str],
        t: &InsightThresholds,
        title: &str,
        predicate: &str,
        detail: String,
        metric_keys: Vec<MetricKey>,
    ) -> Option<Insight> {
        if hits.is_empty() {
            return None;
        }
        let sample: Vec<String> = hits
            .iter()
            .take(t.effective_sample_size())
            .map(|s| s.to_string())
            .collect();

        let mut summary = format!("{} {}: {}", companies(hits.len()), predicate, sample.join(", "));
        if hits.len() > sample.len() {
            summary.push_str(&format!(" (+{} more)", hits.len() - sample.len()));
        }

        Some(Insight {
            rule_id: self.id().to_string(),
            category: self.category(),
            title: title.to_string(),
            summary,
            detail,
            tickers: sample,
            metric_keys,
            confidence: self.confidence(),
            actionable: self.actionable(),
        })
    }

    /// Insight reported once for the whole batch.
    fn batch_wide(
        self,
        title: String,
        summary: String,
        detail: String,
        metric_keys: Vec<MetricKey>,
    ) -> Insight {
        Insight {
            rule_id: self.id().to_string(),
            category: self.category(),
            title,
            summary,
            detail,
            tickers: Vec::new(),
            metric_keys,
            confidence: self.confidence(),
            actionable: self.actionable(),
        }
    }
}

/// The single insight returned for an empty batch.
pub fn no_data_insight() -> Insight {
    Insight {
        rule_id: NO_DATA_RULE_ID.to_string(),
        category: InsightCategory::Risk,
        title: "No data available".to_string(),
        summary: "The current universe returned no rows, so no insights can be derived.".to_string(),
        detail: "Check the universe selection or run a fundamentals ingest.".to_string(),
        tickers: Vec::new(),
        metric_keys: Vec::new(),
        confidence: 0,
        actionable: false,
    }
}

// =============================================================================
// Predicate helpers
// =============================================================================

fn matching<'a>(batch: &'a EntityBatch, pred: impl Fn(&EntityRow) -> bool) -> Vec<&'a str> {
    batch
        .iter()
        .filter(|r| pred(*r))
        .map(|r| r.id.as_str())
        .collect()
}

fn above(row: &EntityRow, key: MetricKey, threshold: f64) -> bool {
    row.value(key).is_some_and(|v| v > threshold)
}

fn below(row: &EntityRow, key: MetricKey, threshold: f64) -> bool {
    row.value(key).is_some_and(|v| v < threshold)
}

fn between_open(row: &EntityRow, key: MetricKey, low: f64, high: f64) -> bool {
    row.value(key).is_some_and(|v| v > low && v < high)
}

fn companies(n: usize) -> String {
    if n == 1 {
        "1 company".to_string()
    } else {
        format!("{} companies", n)
    }
}

fn join_keys(keys: &[MetricKey]) -> String {
    keys.iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(rule: InsightRule, rows: Vec<EntityRow>) -> Option<Insight> {
        let batch = EntityBatch::new(rows).unwrap();
        let stats = DerivedStats::from_batch(&batch);
        rule.evaluate(&batch, &stats, &InsightThresholds::default())
    }

    #[test]
    fn test_quality_value_requires_all_three() {
        let insight = eval(
            InsightRule::QualityValue,
            vec![
                EntityRow::new("GOOD")
                    .with(MetricKey::ReturnOnCapital, 0.40)
                    .with(MetricKey::EarningsYield, 0.10)
                    .with(MetricKey::DebtToEquity, 0.3),
                EntityRow::new("LEVERED")
                    .with(MetricKey::ReturnOnCapital, 0.40)
                    .with(MetricKey::EarningsYield, 0.10)
                    .with(MetricKey::DebtToEquity, 1.5),
                EntityRow::new("NODEBTDATA")
                    .with(MetricKey::ReturnOnCapital, 0.40)
                    .with(MetricKey::EarningsYield, 0.10),
            ],
        )
        .unwrap();

        assert_eq!(insight.tickers, vec!["GOOD"]);
        assert_eq!(insight.category, InsightCategory::Opportunity);
        assert_eq!(insight.confidence, 85);
        assert!(insight.actionable);
        assert!(insight.summary.starts_with("1 company "));
    }

    #[test]
    fn test_no_match_produces_nothing() {
        let insight = eval(
            InsightRule::HighLeverage,
            vec![EntityRow::new("A").with(MetricKey::DebtToEquity, 0.5)],
        );
        assert!(insight.is_none());
    }

    #[test]
    fn test_sample_keeps_batch_order_and_counts_rest() {
        let rows: Vec<EntityRow> = ["T1", "T2", "T3", "T4", "T5", "T6", "T7"]
            .iter()
            .map(|id| EntityRow::new(*id).with(MetricKey::DebtToEquity, 5.0))
            .collect();
        let insight = eval(InsightRule::HighLeverage, rows).unwrap();

        assert_eq!(insight.tickers, vec!["T1", "T2", "T3", "T4", "T5"]);
        assert!(insight.summary.starts_with("7 companies"));
        assert!(insight.summary.ends_with("T1, T2, T3, T4, T5 (+2 more)"));
    }

    #[test]
    fn test_valuation_climate_buckets() {
        let insight = eval(
            InsightRule::ValuationClimate,
            vec![
                EntityRow::new("A").with(MetricKey::PeRatio, 10.0),
                EntityRow::new("B").with(MetricKey::PeRatio, 12.0),
                EntityRow::new("LOSS").with(MetricKey::PeRatio, -40.0),
            ],
        )
        .unwrap();
        assert_eq!(insight.title, "Valuations look attractive");
        assert!(insight.tickers.is_empty());
        assert!(!insight.actionable);

        let rich = eval(
            InsightRule::ValuationClimate,
            vec![EntityRow::new("A").with(MetricKey::PeRatio, 40.0)],
        )
        .unwrap();
        assert_eq!(rich.title, "Valuations look rich");
    }

    #[test]
    fn test_growth_climate_contracting() {
        let insight = eval(
            InsightRule::GrowthClimate,
            vec![
                EntityRow::new("A").with(MetricKey::RevenueGrowthYoy, -8.0),
                EntityRow::new("B").with(MetricKey::RevenueGrowthYoy, 2.0),
            ],
        )
        .unwrap();
        assert_eq!(insight.title, "Revenue is contracting");
    }

    #[test]
    fn test_outlier_stricter_than_opportunity() {
        // Earnings yield 0.12 passes the opportunity bar but not the outlier bar.
        let insight = eval(
            InsightRule::DeepValue,
            vec![
                EntityRow::new("CHEAP").with(MetricKey::EarningsYield, 0.12),
                EntityRow::new("VERYCHEAP").with(MetricKey::EarningsYield, 0.35),
            ],
        )
        .unwrap();
        assert_eq!(insight.tickers, vec!["VERYCHEAP"]);
    }

    #[test]
    fn test_quality_discount_ignores_negative_pe() {
        let insight = eval(
            InsightRule::QualityDiscount,
            vec![
                EntityRow::new("LOSS")
                    .with(MetricKey::GrossMargin, 70.0)
                    .with(MetricKey::PeRatio, -5.0),
                EntityRow::new("HIT")
                    .with(MetricKey::GrossMargin, 55.0)
                    .with(MetricKey::PeRatio, 11.0),
            ],
        )
        .unwrap();
        assert_eq!(insight.tickers, vec!["HIT"]);
        assert_eq!(insight.category, InsightCategory::Correlation);
    }

    #[test]
    fn test_percentile_leaders_needs_table() {
        assert!(
            eval(
                InsightRule::PercentileLeaders,
                vec![EntityRow::new("A").with(MetricKey::Roic, 20.0)]
            )
            .is_none()
        );
    }

    #[test]
    fn test_rule_ids_unique() {
        let mut ids: Vec<_> = InsightRule::ALL.iter().map(|r| r.id()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), InsightRule::ALL.len());
        assert!(!ids.contains(&NO_DATA_RULE_ID));
    }

    #[test]
    fn test_insight_lists_rule_metric_keys() {
        let insight = eval(
            InsightRule::HighLeverage,
            vec![EntityRow::new("A").with(MetricKey::DebtToEquity, 4.0)],
        )
        .unwrap();
        assert_eq!(insight.metric_keys, InsightRule::HighLeverage.metric_keys());
        assert!(InsightRule::PercentileLeaders.metric_keys().is_empty());
        assert!(
            InsightRule::ALL
                .iter()
                .filter(|r| **r != InsightRule::PercentileLeaders)
                .all(|r| !r.metric_keys().is_empty())
        );
    }
}
