use crate::config::HomologConfig;
use crate::error::HomologError;
use crate::matcher::{CandidatePool, MatchQuery, Matcher};
use crate::model::{
    CandidateRecord, CircuitId, EquipmentKind, EvaluatedLine, HomologInput, HomologMeta, HomologResult,
    HomologRow, MatchResult, ParsedEndpoint, ParsedLine, Parameters, ReferenceRecord,
    ResolveSummary,
};
use crate::normalize::Normalizer;
use crate::parse::{classify_kind, parse_endpoint, IdentifierParser, LineGrammar};
use crate::summary::summarize_rows;
use crate::temporal::{candidates_from_evaluated, resolve_month, EvaluationMonth};

/// Run homologation for one evaluation month. The month is validated before
/// anything else is touched.
pub fn run(config: &HomologConfig, month: &str, input: &HomologInput) -> Result<HomologResult, HomologError> {
    let month = EvaluationMonth::parse(month)?;
    let normalizer = Normalizer::new(config.abbreviation_table()?);
    let matcher = Matcher::new(config);

    let (evaluated, resolve_summary) = resolve_month(month, &input.operational, &input.maintenance);

    let arrow = IdentifierParser::new(LineGrammar::Arrow, &config.tolerance);
    let operational_pool = CandidatePool::new(candidates_from_evaluated(&evaluated, &arrow), &normalizer);
    let spec_pool = CandidatePool::new(spec_candidates(config, input), &normalizer);
    log::info!(
        "candidate pools: {} operational, {} specifications",
        operational_pool.len(),
        spec_pool.len()
    );

    let padded = IdentifierParser::new(LineGrammar::Padded, &config.tolerance);
    let prepared: Vec<PreparedReference> = input
        .reference
        .iter()
        .map(|rec| prepare_reference(rec, &padded, config.tolerance.transformer_gap_kv, &normalizer))
        .collect();
    let queries: Vec<MatchQuery> = prepared.iter().filter_map(|p| p.query.clone()).collect();

    let threads = config.parallel.threads;
    let mut operational_results = matcher
        .match_all_with_threads(&queries, &operational_pool, threads)?
        .into_iter();
    let mut spec_results = matcher
        .match_all_with_threads(&queries, &spec_pool, threads)?
        .into_iter();

    let mut rows = Vec::with_capacity(prepared.len());
    for (rec, prep) in input.reference.iter().zip(prepared) {
        let (operational, specifications) = if prep.query.is_some() {
            (
                operational_results.next().unwrap_or_else(|| Matcher::unmatched(&rec.name)),
                spec_results.next().unwrap_or_else(|| Matcher::unmatched(&rec.name)),
            )
        } else {
            (Matcher::unmatched(&rec.name), Matcher::unmatched(&rec.name))
        };

        rows.push(HomologRow {
            reference_name: rec.name.clone(),
            kind: prep.kind,
            circuit: prep.circuit,
            reference: Parameters {
                resistance_ohm: rec.resistance_ohm,
                reactance_ohm: rec.reactance_ohm,
                provenance: "reference".into(),
            },
            operational_parameters: matched_parameters(&operational, &operational_pool),
            operational,
            specifications_parameters: matched_parameters(&specifications, &spec_pool),
            specifications,
            parse_issue: prep.issue,
        });
    }

    let (operational_summary, specifications_summary) = summarize_rows(&rows);
    log::info!(
        "{month}: {} reference records, {} matched operational, {} matched specifications, {} need review",
        rows.len(),
        operational_summary.matched,
        specifications_summary.matched,
        operational_summary.requires_review + specifications_summary.requires_review
    );

    Ok(HomologResult {
        meta: HomologMeta {
            config_name: config.name.clone(),
            month: month.to_string(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        operational_summary,
        specifications_summary,
        resolve_summary,
        rows,
        evaluated,
    })
}

/// Temporal override resolution only.
pub fn resolve(month: &str, input: &HomologInput) -> Result<(Vec<EvaluatedLine>, ResolveSummary), HomologError> {
    let month = EvaluationMonth::parse(month)?;
    Ok(resolve_month(month, &input.operational, &input.maintenance))
}

// ---------------------------------------------------------------------------
// Reference side
// ---------------------------------------------------------------------------

struct PreparedReference {
    query: Option<MatchQuery>,
    kind: Option<EquipmentKind>,
    circuit: Option<CircuitId>,
    issue: Option<String>,
}

/// Endpoints come from the dedicated columns when present, otherwise from
/// the composite name. The circuit can only come from the name.
fn prepare_reference(
    rec: &ReferenceRecord,
    parser: &IdentifierParser,
    transformer_gap_kv: f64,
    normalizer: &Normalizer,
) -> PreparedReference {
    let parsed_name = parser.parse(&rec.name);

    let endpoints = match (&rec.endpoint_a_raw, &rec.endpoint_b_raw, &parsed_name) {
        (Some(a), Some(b), _) => Some((parse_endpoint(a), parse_endpoint(b))),
        (_, _, Some(p)) => Some((p.endpoint_a.clone(), p.endpoint_b.clone())),
        _ => None,
    };

    let usable = endpoints.filter(|(a, b)| !a.bus_label.is_empty() && !b.bus_label.is_empty());
    let Some((endpoint_a, endpoint_b)) = usable else {
        log::debug!("reference '{}' has no usable endpoints", rec.name);
        return PreparedReference {
            query: None,
            kind: None,
            circuit: None,
            issue: Some(format!("cannot parse endpoints from '{}'", rec.name)),
        };
    };

    let parsed = ParsedLine {
        kind: classify_kind(&endpoint_a, &endpoint_b, transformer_gap_kv),
        circuit: parsed_name.and_then(|p| p.circuit),
        endpoint_a,
        endpoint_b,
    };
    PreparedReference {
        query: Some(MatchQuery::from_parsed(&rec.name, &parsed, rec.voltage_kv, normalizer)),
        kind: Some(parsed.kind),
        circuit: parsed.circuit,
        issue: None,
    }
}

// ---------------------------------------------------------------------------
// Specifications side
// ---------------------------------------------------------------------------

fn spec_candidates(config: &HomologConfig, input: &HomologInput) -> Vec<CandidateRecord> {
    let dash = IdentifierParser::new(LineGrammar::DashKv, &config.tolerance);
    let mut pool = Vec::with_capacity(input.spec_lines.len() + input.spec_transformers.len());

    for line in &input.spec_lines {
        let Some(parsed) = dash.parse_with_voltage(&line.composite_name, line.voltage_kv) else {
            log::debug!("specifications line '{}' does not parse as {}", line.composite_name, dash.grammar());
            continue;
        };
        pool.push(CandidateRecord {
            source_id: line.composite_name.clone(),
            endpoint_a: parsed.endpoint_a,
            endpoint_b: parsed.endpoint_b,
            circuit: parsed.circuit,
            kind: parsed.kind,
            resistance_ohm: line.resistance_ohm,
            reactance_ohm: line.reactance_ohm,
            provenance: with_note("specifications line", line.missing_reason.as_deref()),
        });
    }

    for t in &input.spec_transformers {
        pool.push(CandidateRecord {
            source_id: format!("{} {}/{}", t.base_name, t.voltage_primary, t.voltage_secondary),
            endpoint_a: ParsedEndpoint::new(t.base_name.trim(), Some(t.voltage_primary)),
            endpoint_b: ParsedEndpoint::new(t.base_name.trim(), Some(t.voltage_secondary)),
            circuit: None,
            kind: EquipmentKind::Transformer,
            resistance_ohm: t.resistance_ohm,
            reactance_ohm: t.reactance_ohm,
            provenance: with_note("specifications transformer", t.impedance_issue.as_deref()),
        });
    }

    pool
}

fn with_note(provenance: &str, note: Option<&str>) -> String {
    match note {
        Some(note) => format!("{provenance} ({note})"),
        None => provenance.to_string(),
    }
}

fn matched_parameters(result: &MatchResult, pool: &CandidatePool) -> Option<Parameters> {
    let cand = pool.get(result.candidate_index?)?;
    Some(Parameters {
        resistance_ohm: cand.resistance_ohm,
        reactance_ohm: cand.reactance_ohm,
        provenance: cand.provenance.clone(),
    })
}
