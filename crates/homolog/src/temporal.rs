//! Per-month choice between operational and maintenance parameters.
//!
//! All comparisons are month-granular: a window bound on 2025-03-20 covers
//! the whole of March.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

use crate::error::HomologError;
use crate::model::{
    Bound, CandidateRecord, EvaluatedLine, MaintenanceRecord, MaintenanceWindow, OperationalRecord,
    ParameterSource, ResolveSummary,
};
use crate::parse::IdentifierParser;

fn month_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?P<y>\d{4})-(?P<m>\d{2})$").expect("month regex"))
}

/// A calendar month, stored as its first day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EvaluationMonth(NaiveDate);

impl EvaluationMonth {
    /// Parse a strict `YYYY-MM` string.
    pub fn parse(input: &str) -> Result<Self, HomologError> {
        let invalid = || HomologError::InvalidMonth(input.to_string());
        let caps = month_re().captures(input).ok_or_else(invalid)?;
        let year: i32 = caps["y"].parse().map_err(|_| invalid())?;
        let month: u32 = caps["m"].parse().map_err(|_| invalid())?;
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(Self)
            .ok_or_else(invalid)
    }

    pub fn first_day(self) -> NaiveDate {
        self.0
    }

    /// The month a date falls in.
    pub fn of(date: NaiveDate) -> Self {
        Self(first_of_month(date))
    }
}

impl FromStr for EvaluationMonth {
    type Err = HomologError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for EvaluationMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m"))
    }
}

impl EvaluatedLine {
    /// Whether the resolved values differ from the operational ones.
    pub fn changed(&self) -> bool {
        self.source == ParameterSource::Maintenance
            && (self.resistance_ohm != self.operational_resistance_ohm
                || self.reactance_ohm != self.operational_reactance_ohm)
    }
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Whether a valid window covers `month`. Open bounds cover everything on
/// their side.
pub fn window_contains(window: &MaintenanceWindow, month: EvaluationMonth) -> bool {
    if !window.valid {
        return false;
    }
    let after_start = match window.start {
        Bound::Open => true,
        Bound::On(start) => month >= EvaluationMonth::of(start),
    };
    let before_end = match window.end {
        Bound::Open => true,
        Bound::On(end) => month <= EvaluationMonth::of(end),
    };
    after_start && before_end
}

/// Resolve one operational line. `None` when the line is not in service for
/// the month (invalid, or starts operating later).
pub fn resolve_line(
    month: EvaluationMonth,
    operational: &OperationalRecord,
    windows: &[&MaintenanceWindow],
) -> Option<EvaluatedLine> {
    if !operational.operational_valid {
        return None;
    }
    if let Some(start) = operational.operational_start_date {
        if EvaluationMonth::of(start) > month {
            return None;
        }
    }

    let active = windows.iter().find(|w| window_contains(w, month));

    let (resistance_ohm, reactance_ohm, source) = match active {
        Some(w) => (
            w.resistance_ohm.or(operational.resistance_ohm),
            w.reactance_ohm.or(operational.reactance_ohm),
            ParameterSource::Maintenance,
        ),
        None => (
            operational.resistance_ohm,
            operational.reactance_ohm,
            ParameterSource::Operational,
        ),
    };

    Some(EvaluatedLine {
        line_key: operational.line_name.clone(),
        month: month.first_day(),
        resistance_ohm,
        reactance_ohm,
        override_active: active.is_some(),
        source,
        operational_resistance_ohm: operational.resistance_ohm,
        operational_reactance_ohm: operational.reactance_ohm,
    })
}

/// Resolve every operational line for `month`. Output follows input order.
pub fn resolve_month(
    month: EvaluationMonth,
    operational: &[OperationalRecord],
    maintenance: &[MaintenanceRecord],
) -> (Vec<EvaluatedLine>, ResolveSummary) {
    let windows: Vec<MaintenanceWindow> = maintenance
        .iter()
        .filter(|rec| {
            if !rec.valid {
                log::debug!("maintenance window for '{}' marked invalid, skipped", rec.line_name);
            }
            rec.valid
        })
        .map(MaintenanceWindow::from)
        .collect();

    let mut by_line: HashMap<&str, Vec<&MaintenanceWindow>> = HashMap::new();
    for w in &windows {
        by_line.entry(w.line_key.trim()).or_default().push(w);
    }

    let mut summary = ResolveSummary::default();
    let mut evaluated = Vec::with_capacity(operational.len());

    for op in operational {
        let line_windows = by_line
            .get(op.line_name.trim())
            .map(Vec::as_slice)
            .unwrap_or_default();
        match resolve_line(month, op, line_windows) {
            Some(line) => {
                summary.evaluated += 1;
                if line.override_active {
                    summary.overridden += 1;
                }
                evaluated.push(line);
            }
            None => summary.dropped += 1,
        }
    }

    log::info!(
        "{month}: {} lines evaluated, {} with maintenance override, {} not in service",
        summary.evaluated,
        summary.overridden,
        summary.dropped
    );
    (evaluated, summary)
}

/// Turn resolved lines into a candidate pool. Lines whose name does not
/// parse are skipped.
pub fn candidates_from_evaluated(
    evaluated: &[EvaluatedLine],
    parser: &IdentifierParser,
) -> Vec<CandidateRecord> {
    evaluated
        .iter()
        .filter_map(|line| {
            let Some(parsed) = parser.parse(&line.line_key) else {
                log::debug!("operational name '{}' does not parse as {}", line.line_key, parser.grammar());
                return None;
            };
            Some(CandidateRecord {
                source_id: line.line_key.clone(),
                endpoint_a: parsed.endpoint_a,
                endpoint_b: parsed.endpoint_b,
                circuit: parsed.circuit,
                kind: parsed.kind,
                resistance_ohm: line.resistance_ohm,
                reactance_ohm: line.reactance_ohm,
                provenance: format!("{} {}", line.source, line.month.format("%Y-%m")),
            })
        })
        .collect()
}
