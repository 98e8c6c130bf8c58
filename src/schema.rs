use crate::utils::{fiscal_year_from_period_end, parse_iso_date};
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::Add;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Statement {
    #[schemars(description = "Balance sheet (貸借対照表), instant values")]
    Bs,
    #[schemars(description = "Income statement (損益計算書), duration values")]
    Pl,
    #[schemars(description = "Cash flow statement (キャッシュ・フロー計算書), duration values")]
    Cf,
}

impl Statement {
    pub const ALL: [Statement; 3] = [Statement::Bs, Statement::Pl, Statement::Cf];

    pub fn keys(self) -> &'static [CanonicalKey] {
        match self {
            Statement::Bs => &BS_KEYS,
            Statement::Pl => &PL_KEYS,
            Statement::Cf => &CF_KEYS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Statement::Bs => "bs",
            Statement::Pl => "pl",
            Statement::Cf => "cf",
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The closed set of schema fields every source label is mapped onto.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalKey {
    TotalAssets,
    CurrentAssets,
    NoncurrentAssets,
    TotalLiabilities,
    CurrentLiabilities,
    TotalEquity,
    NetAssets,
    Revenue,
    GrossProfit,
    OperatingIncome,
    OrdinaryIncome,
    NetIncome,
    OperatingCf,
    InvestingCf,
    FinancingCf,
    FreeCashFlow,
}

pub const BS_KEYS: [CanonicalKey; 7] = [
    CanonicalKey::TotalAssets,
    CanonicalKey::CurrentAssets,
    CanonicalKey::NoncurrentAssets,
    CanonicalKey::TotalLiabilities,
    CanonicalKey::CurrentLiabilities,
    CanonicalKey::TotalEquity,
    CanonicalKey::NetAssets,
];

pub const PL_KEYS: [CanonicalKey; 5] = [
    CanonicalKey::Revenue,
    CanonicalKey::GrossProfit,
    CanonicalKey::OperatingIncome,
    CanonicalKey::OrdinaryIncome,
    CanonicalKey::NetIncome,
];

pub const CF_KEYS: [CanonicalKey; 4] = [
    CanonicalKey::OperatingCf,
    CanonicalKey::InvestingCf,
    CanonicalKey::FinancingCf,
    CanonicalKey::FreeCashFlow,
];

impl CanonicalKey {
    pub fn statement(self) -> Statement {
        match self {
            CanonicalKey::TotalAssets
            | CanonicalKey::CurrentAssets
            | CanonicalKey::NoncurrentAssets
            | CanonicalKey::TotalLiabilities
            | CanonicalKey::CurrentLiabilities
            | CanonicalKey::TotalEquity
            | CanonicalKey::NetAssets => Statement::Bs,
            CanonicalKey::Revenue
            | CanonicalKey::GrossProfit
            | CanonicalKey::OperatingIncome
            | CanonicalKey::OrdinaryIncome
            | CanonicalKey::NetIncome => Statement::Pl,
            CanonicalKey::OperatingCf
            | CanonicalKey::InvestingCf
            | CanonicalKey::FinancingCf
            | CanonicalKey::FreeCashFlow => Statement::Cf,
        }
    }

    /// Derived keys are computed during finalization and never extracted.
    pub fn is_derived(self) -> bool {
        matches!(self, CanonicalKey::FreeCashFlow)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CanonicalKey::TotalAssets => "total_assets",
            CanonicalKey::CurrentAssets => "current_assets",
            CanonicalKey::NoncurrentAssets => "noncurrent_assets",
            CanonicalKey::TotalLiabilities => "total_liabilities",
            CanonicalKey::CurrentLiabilities => "current_liabilities",
            CanonicalKey::TotalEquity => "total_equity",
            CanonicalKey::NetAssets => "net_assets",
            CanonicalKey::Revenue => "revenue",
            CanonicalKey::GrossProfit => "gross_profit",
            CanonicalKey::OperatingIncome => "operating_income",
            CanonicalKey::OrdinaryIncome => "ordinary_income",
            CanonicalKey::NetIncome => "net_income",
            CanonicalKey::OperatingCf => "operating_cf",
            CanonicalKey::InvestingCf => "investing_cf",
            CanonicalKey::FinancingCf => "financing_cf",
            CanonicalKey::FreeCashFlow => "free_cash_flow",
        }
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A monetary amount in yen. XBRL facts keep their integral/decimal shape;
/// PDF cells are always truncated to integers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Amount {
    Integer(i64),
    Decimal(f64),
}

impl Amount {
    pub fn as_f64(self) -> f64 {
        match self {
            Amount::Integer(v) => v as f64,
            Amount::Decimal(v) => v,
        }
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        match (self, rhs) {
            (Amount::Integer(a), Amount::Integer(b)) => match a.checked_add(b) {
                Some(sum) => Amount::Integer(sum),
                None => Amount::Decimal(a as f64 + b as f64),
            },
            (a, b) => Amount::Decimal(a.as_f64() + b.as_f64()),
        }
    }
}

impl From<i64> for Amount {
    fn from(value: i64) -> Self {
        Amount::Integer(value)
    }
}

/// The join key of a period: its end date, or `unknown` when an XBRL context
/// carried no usable period. Unknown sorts after every dated period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PeriodKey {
    Date(NaiveDate),
    Unknown,
}

impl PeriodKey {
    pub fn date(self) -> Option<NaiveDate> {
        match self {
            PeriodKey::Date(date) => Some(date),
            PeriodKey::Unknown => None,
        }
    }
}

impl From<NaiveDate> for PeriodKey {
    fn from(date: NaiveDate) -> Self {
        PeriodKey::Date(date)
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodKey::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            PeriodKey::Unknown => f.write_str("unknown"),
        }
    }
}

impl Serialize for PeriodKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PeriodKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        if text == "unknown" {
            return Ok(PeriodKey::Unknown);
        }
        parse_iso_date(&text)
            .map(PeriodKey::Date)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid period end: {}", text)))
    }
}

impl JsonSchema for PeriodKey {
    fn schema_name() -> String {
        "PeriodKey".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        String::json_schema(gen)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    Instant,
    Duration,
    Mixed,
    Unknown,
}

impl PeriodType {
    /// Combines the shape already recorded for a period with an incoming
    /// contribution: instant plus duration degrades to mixed, unknown is
    /// filled by whatever arrives.
    pub fn merge(self, incoming: PeriodType) -> PeriodType {
        match (self, incoming) {
            (current, next) if current == next => current,
            (PeriodType::Unknown, next) => next,
            (current, PeriodType::Unknown) => current,
            _ => PeriodType::Mixed,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct BalanceSheet {
    pub total_assets: Option<Amount>,
    pub current_assets: Option<Amount>,
    pub noncurrent_assets: Option<Amount>,
    pub total_liabilities: Option<Amount>,
    pub current_liabilities: Option<Amount>,
    pub total_equity: Option<Amount>,
    pub net_assets: Option<Amount>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct IncomeStatement {
    pub revenue: Option<Amount>,
    pub gross_profit: Option<Amount>,
    pub operating_income: Option<Amount>,
    pub ordinary_income: Option<Amount>,
    pub net_income: Option<Amount>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CashFlow {
    pub operating_cf: Option<Amount>,
    pub investing_cf: Option<Amount>,
    pub financing_cf: Option<Amount>,
    pub free_cash_flow: Option<Amount>,
}

/// The three statements of one period, addressed by [`CanonicalKey`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Statements {
    pub bs: BalanceSheet,
    pub pl: IncomeStatement,
    pub cf: CashFlow,
}

impl Statements {
    pub fn get(&self, key: CanonicalKey) -> Option<Amount> {
        match key {
            CanonicalKey::TotalAssets => self.bs.total_assets,
            CanonicalKey::CurrentAssets => self.bs.current_assets,
            CanonicalKey::NoncurrentAssets => self.bs.noncurrent_assets,
            CanonicalKey::TotalLiabilities => self.bs.total_liabilities,
            CanonicalKey::CurrentLiabilities => self.bs.current_liabilities,
            CanonicalKey::TotalEquity => self.bs.total_equity,
            CanonicalKey::NetAssets => self.bs.net_assets,
            CanonicalKey::Revenue => self.pl.revenue,
            CanonicalKey::GrossProfit => self.pl.gross_profit,
            CanonicalKey::OperatingIncome => self.pl.operating_income,
            CanonicalKey::OrdinaryIncome => self.pl.ordinary_income,
            CanonicalKey::NetIncome => self.pl.net_income,
            CanonicalKey::OperatingCf => self.cf.operating_cf,
            CanonicalKey::InvestingCf => self.cf.investing_cf,
            CanonicalKey::FinancingCf => self.cf.financing_cf,
            CanonicalKey::FreeCashFlow => self.cf.free_cash_flow,
        }
    }

    pub fn slot_mut(&mut self, key: CanonicalKey) -> &mut Option<Amount> {
        match key {
            CanonicalKey::TotalAssets => &mut self.bs.total_assets,
            CanonicalKey::CurrentAssets => &mut self.bs.current_assets,
            CanonicalKey::NoncurrentAssets => &mut self.bs.noncurrent_assets,
            CanonicalKey::TotalLiabilities => &mut self.bs.total_liabilities,
            CanonicalKey::CurrentLiabilities => &mut self.bs.current_liabilities,
            CanonicalKey::TotalEquity => &mut self.bs.total_equity,
            CanonicalKey::NetAssets => &mut self.bs.net_assets,
            CanonicalKey::Revenue => &mut self.pl.revenue,
            CanonicalKey::GrossProfit => &mut self.pl.gross_profit,
            CanonicalKey::OperatingIncome => &mut self.pl.operating_income,
            CanonicalKey::OrdinaryIncome => &mut self.pl.ordinary_income,
            CanonicalKey::NetIncome => &mut self.pl.net_income,
            CanonicalKey::OperatingCf => &mut self.cf.operating_cf,
            CanonicalKey::InvestingCf => &mut self.cf.investing_cf,
            CanonicalKey::FinancingCf => &mut self.cf.financing_cf,
            CanonicalKey::FreeCashFlow => &mut self.cf.free_cash_flow,
        }
    }

    pub fn set(&mut self, key: CanonicalKey, value: Option<Amount>) {
        *self.slot_mut(key) = value;
    }

    /// Copies every value present in `other` into a field that is still
    /// empty here. Populated fields are never overwritten.
    pub fn fill_missing_from(&mut self, other: &Statements) {
        for statement in Statement::ALL {
            for &key in statement.keys() {
                let slot = self.slot_mut(key);
                if slot.is_none() {
                    *slot = other.get(key);
                }
            }
        }
    }

    pub fn populated_count(&self) -> usize {
        Statement::ALL
            .iter()
            .flat_map(|s| s.keys().iter())
            .filter(|&&key| self.get(key).is_some())
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PeriodFinancial {
    pub period_end: PeriodKey,
    pub period_start: Option<NaiveDate>,
    pub period_type: PeriodType,
    pub fiscal_year: Option<i32>,
    #[serde(flatten)]
    pub statements: Statements,
    #[serde(default)]
    pub source_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_end_original: Option<PeriodKey>,
}

impl PeriodFinancial {
    pub fn new(
        period_end: PeriodKey,
        period_start: Option<NaiveDate>,
        period_type: PeriodType,
    ) -> Self {
        Self {
            period_end,
            period_start,
            period_type,
            fiscal_year: period_end.date().map(fiscal_year_from_period_end),
            statements: Statements::default(),
            source_ids: Vec::new(),
            period_end_original: None,
        }
    }

    pub fn value(&self, key: CanonicalKey) -> Option<Amount> {
        self.statements.get(key)
    }

    /// Re-keys the period onto a new end date, remembering the original.
    pub fn rekey(&mut self, period_end: NaiveDate) {
        if self.period_end_original.is_none() {
            self.period_end_original = Some(self.period_end);
        }
        self.period_end = PeriodKey::Date(period_end);
        self.fiscal_year = Some(fiscal_year_from_period_end(period_end));
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum SourceFile {
    #[serde(rename = "source_zip")]
    Zip(String),
    #[serde(rename = "source_pdf")]
    Pdf(String),
}

impl SourceFile {
    pub fn path(&self) -> &str {
        match self {
            SourceFile::Zip(path) | SourceFile::Pdf(path) => path,
        }
    }
}

/// Where a document came from upstream, as recorded by the collector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Provenance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_or_doc_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ParsedDocument {
    pub ticker: String,
    pub document_id: String,
    #[serde(flatten)]
    pub source_file: SourceFile,
    pub company_name: Option<String>,
    /// Sorted by `period_end`.
    pub periods: Vec<PeriodFinancial>,
    #[serde(flatten)]
    pub provenance: Provenance,
}

impl ParsedDocument {
    pub fn period(&self, period_end: PeriodKey) -> Option<&PeriodFinancial> {
        self.periods.iter().find(|p| p.period_end == period_end)
    }
}
