//! Metric Catalog: static description of every fundamentals metric.
//!
//! ## Contents
//! - `MetricKey`: closed enumeration of fundamentals fields (snake_case wire names)
//! - `MetricSpec`: display label, format class, direction and category
//! - `MetricCatalog`: lookup table consumed by ranking, scoring and insight rules
//!
//! ## Configuration Errors
//! A metric referenced by a weighting or rule without a `MetricSpec` is a
//! configuration error. `MetricCatalog::get` fails fast with
//! `CatalogError::UnknownMetric`; it never falls back to a default direction.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Metric Key
// =============================================================================

/// Known fundamentals metric.
///
/// Frozen: wire names match the fundamentals fields served by the data service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKey {
    Ebit,
    EnterpriseValue,
    NetWorkingCapital,
    Revenue,
    RevenueGrowthYoy,
    GrossMargin,
    OperatingMargin,
    NetMargin,
    FreeCashFlow,
    FcfYield,
    TotalDebt,
    TotalEquity,
    DebtToEquity,
    InterestCoverage,
    BookValue,
    BookValuePerShare,
    MarketCap,
    Price,
    PeRatio,
    PbRatio,
    PsRatio,
    EvToEbitda,
    DividendYield,
    PayoutRatio,
    Eps,
    EpsGrowthYoy,
    EarningsYield,
    ReturnOnCapital,
    Roic,
}

impl MetricKey {
    /// Every key, in declaration order.
    pub const ALL: [MetricKey; 29] = [
        MetricKey::Ebit,
        MetricKey::EnterpriseValue,
        MetricKey::NetWorkingCapital,
        MetricKey::Revenue,
        MetricKey::RevenueGrowthYoy,
        MetricKey::GrossMargin,
        MetricKey::OperatingMargin,
        MetricKey::NetMargin,
        MetricKey::FreeCashFlow,
        MetricKey::FcfYield,
        MetricKey::TotalDebt,
        MetricKey::TotalEquity,
        MetricKey::DebtToEquity,
        MetricKey::InterestCoverage,
        MetricKey::BookValue,
        MetricKey::BookValuePerShare,
        MetricKey::MarketCap,
        MetricKey::Price,
        MetricKey::PeRatio,
        MetricKey::PbRatio,
        MetricKey::PsRatio,
        MetricKey::EvToEbitda,
        MetricKey::DividendYield,
        MetricKey::PayoutRatio,
        MetricKey::Eps,
        MetricKey::EpsGrowthYoy,
        MetricKey::EarningsYield,
        MetricKey::ReturnOnCapital,
        MetricKey::Roic,
    ];

    /// Wire name (snake_case).
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKey::Ebit => "ebit",
            MetricKey::EnterpriseValue => "enterprise_value",
            MetricKey::NetWorkingCapital => "net_working_capital",
            MetricKey::Revenue => "revenue",
            MetricKey::RevenueGrowthYoy => "revenue_growth_yoy",
            MetricKey::GrossMargin => "gross_margin",
            MetricKey::OperatingMargin => "operating_margin",
            MetricKey::NetMargin => "net_margin",
            MetricKey::FreeCashFlow => "free_cash_flow",
            MetricKey::FcfYield => "fcf_yield",
            MetricKey::TotalDebt => "total_debt",
            MetricKey::TotalEquity => "total_equity",
            MetricKey::DebtToEquity => "debt_to_equity",
            MetricKey::InterestCoverage => "interest_coverage",
            MetricKey::BookValue => "book_value",
            MetricKey::BookValuePerShare => "book_value_per_share",
            MetricKey::MarketCap => "market_cap",
            MetricKey::Price => "price",
            MetricKey::PeRatio => "pe_ratio",
            MetricKey::PbRatio => "pb_ratio",
            MetricKey::PsRatio => "ps_ratio",
            MetricKey::EvToEbitda => "ev_to_ebitda",
            MetricKey::DividendYield => "dividend_yield",
            MetricKey::PayoutRatio => "payout_ratio",
            MetricKey::Eps => "eps",
            MetricKey::EpsGrowthYoy => "eps_growth_yoy",
            MetricKey::EarningsYield => "earnings_yield",
            MetricKey::ReturnOnCapital => "return_on_capital",
            MetricKey::Roic => "roic",
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKey {
    type Err = MetricKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricKey::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| MetricKeyParseError(s.to_string()))
    }
}

/// Unknown metric name at a parsing boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown metric key: '{0}'")]
pub struct MetricKeyParseError(pub String);

// =============================================================================
// Metric Spec
// =============================================================================

/// Which end of the distribution is "better".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    HigherIsBetter,
    LowerIsBetter,
}

/// Display format class for a metric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatClass {
    Number,
    Percent,
    Ratio,
    Currency,
}

/// Field grouping used by pickers and the fields listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricCategory {
    Core,
    Revenue,
    Margins,
    CashFlow,
    Leverage,
    BookValue,
    Market,
    Valuation,
    Dividends,
    Earnings,
    Quality,
}

/// Static description of one metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSpec {
    pub key: MetricKey,
    pub direction: Direction,
    pub label: String,
    pub format: FormatClass,
    pub category: MetricCategory,
}

impl MetricSpec {
    pub fn new(
        key: MetricKey,
        direction: Direction,
        label: impl Into<String>,
        format: FormatClass,
        category: MetricCategory,
    ) -> Self {
        Self {
            key,
            direction,
            label: label.into(),
            format,
            category,
        }
    }
}

// =============================================================================
// Metric Catalog
// =============================================================================

/// Lookup table of metric specs.
///
/// BTreeMap keeps listing order deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricCatalog {
    specs: BTreeMap<MetricKey, MetricSpec>,
}

impl MetricCatalog {
    /// Empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with a spec for every `MetricKey`.
    pub fn builtin() -> Self {
        use Direction::{HigherIsBetter as Hi, LowerIsBetter as Lo};
        use FormatClass as F;
        use MetricCategory as C;
        use MetricKey as K;

        let rows = [
            (K::Ebit, Hi, "EBIT", F::Currency, C::Core),
            (K::EnterpriseValue, Lo, "Enterprise Value", F::Currency, C::Core),
            (K::NetWorkingCapital, Hi, "Net Working Capital", F::Currency, C::Core),
            (K::Revenue, Hi, "Revenue", F::Currency, C::Revenue),
            (K::RevenueGrowthYoy, Hi, "Revenue Growth (YoY)", F::Percent, C::Revenue),
            (K::GrossMargin, Hi, "Gross Margin", F::Percent, C::Margins),
            (K::OperatingMargin, Hi, "Operating Margin", F::Percent, C::Margins),
            (K::NetMargin, Hi, "Net Margin", F::Percent, C::Margins),
            (K::FreeCashFlow, Hi, "Free Cash Flow", F::Currency, C::CashFlow),
            (K::FcfYield, Hi, "FCF Yield", F::Percent, C::CashFlow),
            (K::TotalDebt, Lo, "Total Debt", F::Currency, C::Leverage),
            (K::TotalEquity, Hi, "Total Equity", F::Currency, C::Leverage),
            (K::DebtToEquity, Lo, "Debt / Equity", F::Ratio, C::Leverage),
            (K::InterestCoverage, Hi, "Interest Coverage", F::Ratio, C::Leverage),
            (K::BookValue, Hi, "Book Value", F::Currency, C::BookValue),
            (K::BookValuePerShare, Hi, "Book Value / Share", F::Currency, C::BookValue),
            (K::MarketCap, Hi, "Market Cap", F::Currency, C::Market),
            (K::Price, Lo, "Price", F::Currency, C::Market),
            (K::PeRatio, Lo, "P/E", F::Ratio, C::Valuation),
            (K::PbRatio, Lo, "P/B", F::Ratio, C::Valuation),
            (K::PsRatio, Lo, "P/S", F::Ratio, C::Valuation),
            (K::EvToEbitda, Lo, "EV / EBITDA", F::Ratio, C::Valuation),
            (K::DividendYield, Hi, "Dividend Yield", F::Percent, C::Dividends),
            (K::PayoutRatio, Lo, "Payout Ratio", F::Percent, C::Dividends),
            (K::Eps, Hi, "EPS", F::Currency, C::Earnings),
            (K::EpsGrowthYoy, Hi, "EPS Growth (YoY)", F::Percent, C::Earnings),
            (K::EarningsYield, Hi, "Earnings Yield", F::Ratio, C::Quality),
            (K::ReturnOnCapital, Hi, "Return on Capital", F::Ratio, C::Quality),
            (K::Roic, Hi, "ROIC", F::Percent, C::Quality),
        ];

        let mut catalog = Self::new();
        for (key, direction, label, format, category) in rows {
            catalog.insert(MetricSpec::new(key, direction, label, format, category));
        }
        catalog
    }

    /// Add or replace a spec.
    pub fn insert(&mut self, spec: MetricSpec) {
        self.specs.insert(spec.key, spec);
    }

    /// Narrow the catalog to the given keys (keys without a spec are ignored).
    pub fn with_only(&self, keys: &[MetricKey]) -> Self {
        let specs = self
            .specs
            .iter()
            .filter(|(k, _)| keys.contains(k))
            .map(|(k, s)| (*k, s.clone()))
            .collect();
        Self { specs }
    }

    /// Look up a spec; a missing spec is a configuration error.
    pub fn get(&self, key: MetricKey) -> Result<&MetricSpec, CatalogError> {
        self.specs.get(&key).ok_or(CatalogError::UnknownMetric(key))
    }

    /// Direction for a metric.
    pub fn direction(&self, key: MetricKey) -> Result<Direction, CatalogError> {
        self.get(key).map(|s| s.direction)
    }

    /// Fail on the first key without a spec.
    pub fn require_all(&self, keys: &[MetricKey]) -> Result<(), CatalogError> {
        for key in keys {
            self.get(*key)?;
        }
        Ok(())
    }

    pub fn contains(&self, key: MetricKey) -> bool {
        self.specs.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn specs(&self) -> impl Iterator<Item = &MetricSpec> {
        self.specs.values()
    }

    /// Specs grouped by category, each group in key order.
    pub fn by_category(&self) -> BTreeMap<MetricCategory, Vec<&MetricSpec>> {
        let mut groups: BTreeMap<MetricCategory, Vec<&MetricSpec>> = BTreeMap::new();
        for spec in self.specs.values() {
            groups.entry(spec.category).or_default().push(spec);
        }
        groups
    }
}

/// Catalog configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("No MetricSpec defined for metric '{0}'")]
    UnknownMetric(MetricKey),
}

// =============================================================================
// Tests
// =============================================================================
