use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Parallel-circuit number. Absent is not the same as circuit 0.
pub type CircuitId = u32;

// ---------------------------------------------------------------------------
// Parsed identifiers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedEndpoint {
    pub bus_label: String,
    pub voltage_kv: Option<f64>,
}

impl ParsedEndpoint {
    pub fn new(bus_label: impl Into<String>, voltage_kv: Option<f64>) -> Self {
        Self {
            bus_label: bus_label.into(),
            voltage_kv,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentKind {
    Line,
    Transformer,
}

impl std::fmt::Display for EquipmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Line => write!(f, "line"),
            Self::Transformer => write!(f, "transformer"),
        }
    }
}

/// Structured fields extracted from a composite line name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedLine {
    pub endpoint_a: ParsedEndpoint,
    pub endpoint_b: ParsedEndpoint,
    pub circuit: Option<CircuitId>,
    pub kind: EquipmentKind,
}

impl ParsedLine {
    /// Line voltage, or the primary side of a transformer.
    pub fn nominal_voltage(&self) -> Option<f64> {
        match (self.endpoint_a.voltage_kv, self.endpoint_b.voltage_kv) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }
}

// ---------------------------------------------------------------------------
// Source records (handed over by the loaders)
// ---------------------------------------------------------------------------

/// System-operator registry row. Drives the matching loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    pub name: String,
    pub endpoint_a_raw: Option<String>,
    pub endpoint_b_raw: Option<String>,
    pub voltage_kv: Option<f64>,
    pub resistance_ohm: Option<f64>,
    pub reactance_ohm: Option<f64>,
}

/// Coordinator operational-database row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationalRecord {
    pub line_name: String,
    pub resistance_ohm: Option<f64>,
    pub reactance_ohm: Option<f64>,
    pub operational_valid: bool,
    pub operational_start_date: Option<NaiveDate>,
}

/// Coordinator maintenance-database row. A missing date is an open bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceRecord {
    pub line_name: String,
    pub valid: bool,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub resistance_ohm: Option<f64>,
    pub reactance_ohm: Option<f64>,
}

/// Specifications-registry line (already rolled up from its sections).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecLine {
    pub composite_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_center: Option<String>,
    pub voltage_kv: Option<f64>,
    pub resistance_ohm: Option<f64>,
    pub reactance_ohm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_reason: Option<String>,
}

/// Specifications-registry transformer with a synthetic endpoint pair
/// (`base_name` at each winding voltage).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformerSpec {
    pub base_name: String,
    pub voltage_primary: f64,
    pub voltage_secondary: f64,
    pub resistance_ohm: Option<f64>,
    pub reactance_ohm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impedance_issue: Option<String>,
}

/// Pre-loaded records for one run.
#[derive(Debug, Clone, Default)]
pub struct HomologInput {
    pub reference: Vec<ReferenceRecord>,
    pub operational: Vec<OperationalRecord>,
    pub maintenance: Vec<MaintenanceRecord>,
    pub spec_lines: Vec<SpecLine>,
    pub spec_transformers: Vec<TransformerSpec>,
}

// ---------------------------------------------------------------------------
// Candidate pool
// ---------------------------------------------------------------------------

/// One line/transformer of a non-reference source, ready to be searched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateRecord {
    pub source_id: String,
    pub endpoint_a: ParsedEndpoint,
    pub endpoint_b: ParsedEndpoint,
    pub circuit: Option<CircuitId>,
    pub kind: EquipmentKind,
    pub resistance_ohm: Option<f64>,
    pub reactance_ohm: Option<f64>,
    pub provenance: String,
}

impl CandidateRecord {
    pub fn nominal_voltage(&self) -> Option<f64> {
        match (self.endpoint_a.voltage_kv, self.endpoint_b.voltage_kv) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }
}

// ---------------------------------------------------------------------------
// Match results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
    Unmatched,
}

impl std::fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
            Self::Unmatched => write!(f, "unmatched"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub reference_id: String,
    pub matched_id: Option<String>,
    pub confidence: f64,
    pub sim_a: f64,
    pub sim_b: f64,
    pub orientation_swapped: bool,
    pub requires_review: bool,
    pub tier: ConfidenceTier,
    /// Other candidates that reached exactly the winning score.
    pub tied_candidates: usize,
    /// Position of the winning candidate in its pool.
    #[serde(skip)]
    pub candidate_index: Option<usize>,
}

// ---------------------------------------------------------------------------
// Temporal override
// ---------------------------------------------------------------------------

/// One side of a maintenance validity interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "bound", content = "date")]
pub enum Bound {
    Open,
    On(NaiveDate),
}

impl From<Option<NaiveDate>> for Bound {
    fn from(date: Option<NaiveDate>) -> Self {
        date.map_or(Bound::Open, Bound::On)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaintenanceWindow {
    pub line_key: String,
    pub start: Bound,
    pub end: Bound,
    pub valid: bool,
    pub resistance_ohm: Option<f64>,
    pub reactance_ohm: Option<f64>,
}

impl From<&MaintenanceRecord> for MaintenanceWindow {
    fn from(rec: &MaintenanceRecord) -> Self {
        Self {
            line_key: rec.line_name.clone(),
            start: rec.start_date.into(),
            end: rec.end_date.into(),
            valid: rec.valid,
            resistance_ohm: rec.resistance_ohm,
            reactance_ohm: rec.reactance_ohm,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterSource {
    Maintenance,
    Operational,
}

impl std::fmt::Display for ParameterSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Maintenance => write!(f, "maintenance"),
            Self::Operational => write!(f, "operational"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluatedLine {
    pub line_key: String,
    pub month: NaiveDate,
    pub resistance_ohm: Option<f64>,
    pub reactance_ohm: Option<f64>,
    pub override_active: bool,
    pub source: ParameterSource,
    pub operational_resistance_ohm: Option<f64>,
    pub operational_reactance_ohm: Option<f64>,
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HomologSummary {
    pub total: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub requires_review: usize,
    pub swapped: usize,
    pub exact_ties: usize,
    pub transformers: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolveSummary {
    pub evaluated: usize,
    pub overridden: usize,
    pub dropped: usize,
}

/// Electrical parameters taken from one source for one matched record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameters {
    pub resistance_ohm: Option<f64>,
    pub reactance_ohm: Option<f64>,
    pub provenance: String,
}

/// One reference record with its match in each candidate source.
#[derive(Debug, Clone, Serialize)]
pub struct HomologRow {
    pub reference_name: String,
    pub kind: Option<EquipmentKind>,
    pub circuit: Option<CircuitId>,
    pub reference: Parameters,
    pub operational: MatchResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operational_parameters: Option<Parameters>,
    pub specifications: MatchResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specifications_parameters: Option<Parameters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_issue: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HomologMeta {
    pub config_name: String,
    pub month: String,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HomologResult {
    pub meta: HomologMeta,
    pub operational_summary: HomologSummary,
    pub specifications_summary: HomologSummary,
    pub resolve_summary: ResolveSummary,
    pub rows: Vec<HomologRow>,
    pub evaluated: Vec<EvaluatedLine>,
}
