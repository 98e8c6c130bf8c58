use crate::schema::{PeriodFinancial, PeriodKey};
use crate::utils::month_end_before;
use chrono::{Datelike, NaiveDate};
use log::{info, warn};

/// The half-year end six months before a quarter-end date:
/// `03→09` and `06→12` of the prior year, `09→03` and `12→06`.
/// Other months have no mapping.
pub fn half_year_end(period_end: NaiveDate) -> Option<NaiveDate> {
    match period_end.month() {
        3 | 6 | 9 | 12 => month_end_before(period_end, 6),
        _ => None,
    }
}

/// Re-keys a half-year report's period that was tagged with the annual
/// fiscal-year-end date onto the true mid-year date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HalfYearPeriodCorrector {
    fiscal_year_end: NaiveDate,
}

impl HalfYearPeriodCorrector {
    pub fn new(fiscal_year_end: NaiveDate) -> Self {
        Self { fiscal_year_end }
    }

    pub fn fiscal_year_end(&self) -> NaiveDate {
        self.fiscal_year_end
    }

    /// Corrects the period ending on the fiscal-year-end date, if any, and
    /// returns `(original, corrected)`. A correction that would land on a
    /// period already present is skipped.
    pub fn apply(&self, periods: &mut Vec<PeriodFinancial>) -> Option<(NaiveDate, NaiveDate)> {
        let target = PeriodKey::Date(self.fiscal_year_end);
        let index = periods.iter().position(|p| p.period_end == target)?;

        let Some(corrected) = half_year_end(self.fiscal_year_end) else {
            warn!(
                "No half-year mapping for fiscal year end {}",
                self.fiscal_year_end
            );
            return None;
        };

        if periods
            .iter()
            .any(|p| p.period_end == PeriodKey::Date(corrected))
        {
            warn!(
                "Skipping half-year correction {} -> {}: period already present",
                self.fiscal_year_end, corrected
            );
            return None;
        }

        periods[index].rekey(corrected);
        periods.sort_by_key(|p| p.period_end);
        info!(
            "Half-year correction: {} -> {}",
            self.fiscal_year_end, corrected
        );
        Some((self.fiscal_year_end, corrected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PeriodType;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn period(end: NaiveDate) -> PeriodFinancial {
        PeriodFinancial::new(PeriodKey::Date(end), None, PeriodType::Instant)
    }

    #[test]
    fn test_quarter_map() {
        assert_eq!(half_year_end(date(2025, 3, 31)), Some(date(2024, 9, 30)));
        assert_eq!(half_year_end(date(2024, 12, 31)), Some(date(2024, 6, 30)));
        assert_eq!(half_year_end(date(2024, 6, 30)), Some(date(2023, 12, 31)));
        assert_eq!(half_year_end(date(2024, 9, 30)), Some(date(2024, 3, 31)));
        assert_eq!(half_year_end(date(2024, 5, 31)), None);
    }

    #[test]
    fn test_corrects_period_matching_fiscal_year_end() {
        let mut periods = vec![period(date(2024, 3, 31)), period(date(2025, 3, 31))];
        let corrector = HalfYearPeriodCorrector::new(date(2025, 3, 31));

        let applied = corrector.apply(&mut periods);
        assert_eq!(applied, Some((date(2025, 3, 31), date(2024, 9, 30))));

        let corrected = &periods[1];
        assert_eq!(corrected.period_end, PeriodKey::Date(date(2024, 9, 30)));
        assert_eq!(
            corrected.period_end_original,
            Some(PeriodKey::Date(date(2025, 3, 31)))
        );
        assert_eq!(corrected.fiscal_year, Some(2024));
        assert_eq!(periods[0].period_end_original, None);
    }

    #[test]
    fn test_leaves_other_periods_untouched() {
        let mut periods = vec![period(date(2024, 9, 30))];
        let corrector = HalfYearPeriodCorrector::new(date(2025, 3, 31));

        assert_eq!(corrector.apply(&mut periods), None);
        assert_eq!(periods[0].period_end, PeriodKey::Date(date(2024, 9, 30)));
        assert_eq!(periods[0].period_end_original, None);
    }

    #[test]
    fn test_skips_when_corrected_period_exists() {
        let mut periods = vec![period(date(2024, 9, 30)), period(date(2025, 3, 31))];
        let corrector = HalfYearPeriodCorrector::new(date(2025, 3, 31));

        assert_eq!(corrector.apply(&mut periods), None);
        assert_eq!(periods[1].period_end, PeriodKey::Date(date(2025, 3, 31)));
    }

    #[test]
    fn test_corrected_periods_stay_sorted() {
        let mut periods = vec![period(date(2024, 3, 31)), period(date(2024, 12, 31))];
        HalfYearPeriodCorrector::new(date(2024, 12, 31)).apply(&mut periods);
        assert_eq!(periods[0].period_end, PeriodKey::Date(date(2024, 3, 31)));
        assert_eq!(periods[1].period_end, PeriodKey::Date(date(2024, 6, 30)));

        let mut periods = vec![period(date(2024, 3, 31)), period(date(2024, 6, 30))];
        HalfYearPeriodCorrector::new(date(2024, 6, 30)).apply(&mut periods);
        assert_eq!(periods[0].period_end, PeriodKey::Date(date(2023, 12, 31)));
    }
}
