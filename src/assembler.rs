use crate::schema::{Amount, CanonicalKey, PeriodFinancial, PeriodKey, PeriodType};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

/// How a write into an already-populated cell is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    /// The first value recorded for a cell keeps it (PDF tables).
    FirstWins,
    /// A value replaces the stored one when its priority is `>=` the stored
    /// priority, so equal priorities favor the later value (XBRL facts).
    PriorityWins,
}

/// The period a single observation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservedPeriod {
    pub period_end: PeriodKey,
    pub period_start: Option<NaiveDate>,
    pub period_type: PeriodType,
}

/// Collects `(period, key, value, priority)` observations for one document
/// and turns them into finalized, sorted [`PeriodFinancial`] records.
///
/// The winning priority per cell lives here rather than on the record and is
/// dropped by [`PeriodFinancialAssembler::finish`].
#[derive(Debug)]
pub struct PeriodFinancialAssembler {
    policy: WritePolicy,
    periods: BTreeMap<PeriodKey, PeriodFinancial>,
    priorities: HashMap<(PeriodKey, CanonicalKey), i32>,
}

impl PeriodFinancialAssembler {
    pub fn new(policy: WritePolicy) -> Self {
        Self {
            policy,
            periods: BTreeMap::new(),
            priorities: HashMap::new(),
        }
    }

    /// Records one observation. Returns `true` if the value was stored.
    pub fn record(
        &mut self,
        period: &ObservedPeriod,
        key: CanonicalKey,
        value: Amount,
        priority: i32,
        source_id: &str,
    ) -> bool {
        let entry = self.periods.entry(period.period_end).or_insert_with(|| {
            PeriodFinancial::new(period.period_end, period.period_start, period.period_type)
        });

        if entry.period_start.is_none() && period.period_start.is_some() {
            entry.period_start = period.period_start;
        }
        entry.period_type = entry.period_type.merge(period.period_type);

        let slot = entry.statements.slot_mut(key);
        let stored = match self.policy {
            WritePolicy::FirstWins => {
                if slot.is_none() {
                    *slot = Some(value);
                    true
                } else {
                    false
                }
            }
            WritePolicy::PriorityWins => {
                let cell = (period.period_end, key);
                let wins = self
                    .priorities
                    .get(&cell)
                    .map_or(true, |existing| priority >= *existing);
                if wins {
                    *slot = Some(value);
                    self.priorities.insert(cell, priority);
                }
                wins
            }
        };

        if !source_id.is_empty() && !entry.source_ids.iter().any(|id| id == source_id) {
            entry.source_ids.push(source_id.to_string());
        }

        stored
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    /// Applies the derived fallbacks to every period and returns them sorted
    /// by `period_end`.
    pub fn finish(self) -> Vec<PeriodFinancial> {
        self.periods
            .into_values()
            .map(|mut period| {
                finalize(&mut period);
                period
            })
            .collect()
    }
}

/// Fills `total_assets` from its two components when it was not reported,
/// and computes `free_cash_flow`. Partial inputs never derive anything.
pub fn finalize(period: &mut PeriodFinancial) {
    let statements = &mut period.statements;

    if statements.bs.total_assets.is_none() {
        if let (Some(current), Some(noncurrent)) = (
            statements.bs.current_assets,
            statements.bs.noncurrent_assets,
        ) {
            statements.bs.total_assets = Some(current + noncurrent);
        }
    }

    if let (Some(operating), Some(investing)) =
        (statements.cf.operating_cf, statements.cf.investing_cf)
    {
        statements.cf.free_cash_flow = Some(operating + investing);
    }
}
