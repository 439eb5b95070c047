//! Report serialization: full result as JSON, one flat CSV line per
//! reference record.

use crate::error::HomologError;
use crate::model::{EvaluatedLine, HomologResult, HomologRow, MatchResult};

pub fn to_json(result: &HomologResult) -> Result<String, HomologError> {
    serde_json::to_string_pretty(result).map_err(|e| HomologError::Io(e.to_string()))
}

const ROW_HEADERS: &[&str] = &[
    "reference_name",
    "kind",
    "circuit",
    "reference_r_ohm",
    "reference_x_ohm",
    "operational_id",
    "operational_confidence",
    "operational_sim_a",
    "operational_sim_b",
    "operational_tier",
    "operational_swapped",
    "operational_r_ohm",
    "operational_x_ohm",
    "operational_provenance",
    "specifications_id",
    "specifications_confidence",
    "specifications_sim_a",
    "specifications_sim_b",
    "specifications_tier",
    "specifications_swapped",
    "specifications_r_ohm",
    "specifications_x_ohm",
    "specifications_provenance",
    "requires_review",
    "parse_issue",
];

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn match_cells(m: &MatchResult) -> [String; 6] {
    [
        m.matched_id.clone().unwrap_or_default(),
        format!("{:.2}", m.confidence),
        format!("{:.2}", m.sim_a),
        format!("{:.2}", m.sim_b),
        m.tier.to_string(),
        m.orientation_swapped.to_string(),
    ]
}

/// Flat CSV of homologation rows.
pub fn rows_to_csv(rows: &[HomologRow]) -> Result<String, HomologError> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(ROW_HEADERS)?;

    for row in rows {
        let op = row.operational_parameters.as_ref();
        let spec = row.specifications_parameters.as_ref();
        let mut record = vec![
            row.reference_name.clone(),
            opt(row.kind),
            opt(row.circuit),
            opt(row.reference.resistance_ohm),
            opt(row.reference.reactance_ohm),
        ];
        record.extend(match_cells(&row.operational));
        record.push(opt(op.and_then(|p| p.resistance_ohm)));
        record.push(opt(op.and_then(|p| p.reactance_ohm)));
        record.push(op.map(|p| p.provenance.clone()).unwrap_or_default());
        record.extend(match_cells(&row.specifications));
        record.push(opt(spec.and_then(|p| p.resistance_ohm)));
        record.push(opt(spec.and_then(|p| p.reactance_ohm)));
        record.push(spec.map(|p| p.provenance.clone()).unwrap_or_default());
        record.push((row.operational.requires_review || row.specifications.requires_review).to_string());
        record.push(row.parse_issue.clone().unwrap_or_default());
        wtr.write_record(&record)?;
    }

    finish(wtr)
}

/// CSV of resolved per-month line parameters.
pub fn evaluated_to_csv(lines: &[EvaluatedLine]) -> Result<String, HomologError> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record([
        "line",
        "month",
        "r_ohm",
        "x_ohm",
        "source",
        "override_active",
        "operational_r_ohm",
        "operational_x_ohm",
    ])?;
    for line in lines {
        wtr.write_record([
            line.line_key.clone(),
            line.month.format("%Y-%m").to_string(),
            opt(line.resistance_ohm),
            opt(line.reactance_ohm),
            line.source.to_string(),
            line.override_active.to_string(),
            opt(line.operational_resistance_ohm),
            opt(line.operational_reactance_ohm),
        ])?;
    }
    finish(wtr)
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String, HomologError> {
    let bytes = wtr.into_inner().map_err(|e| HomologError::Io(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| HomologError::Io(e.to_string()))
}
