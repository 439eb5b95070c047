use std::path::PathBuf;

use gridrecon_homolog::config::HomologConfig;
use gridrecon_homolog::export::{rows_to_csv, to_json};
use gridrecon_homolog::load::read_input;
use gridrecon_homolog::model::{ConfidenceTier, EquipmentKind, HomologResult, HomologRow};
use gridrecon_homolog::{resolve, run, HomologError};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_config() -> HomologConfig {
    let toml = std::fs::read_to_string(fixtures_dir().join("config.toml")).unwrap();
    HomologConfig::from_toml(&toml).unwrap()
}

fn load_and_run(month: &str) -> HomologResult {
    let config = load_config();
    let input = read_input(&config, &fixtures_dir()).unwrap();
    run(&config, month, &input).unwrap()
}

fn row<'a>(result: &'a HomologResult, prefix: &str) -> &'a HomologRow {
    result
        .rows
        .iter()
        .find(|r| r.reference_name.starts_with(prefix))
        .unwrap_or_else(|| panic!("no row starting with {prefix}"))
}

fn close(a: Option<f64>, b: f64) -> bool {
    a.is_some_and(|a| (a - b).abs() < 1e-9)
}

// -------------------------------------------------------------------------
// Full run
// -------------------------------------------------------------------------

#[test]
fn full_run_summaries() {
    let result = load_and_run("2025-06");

    assert_eq!(result.meta.config_name, "Norte Grande 2025");
    assert_eq!(result.meta.month, "2025-06");
    assert_eq!(result.rows.len(), 7);

    let op = &result.operational_summary;
    assert_eq!(op.total, 7);
    assert_eq!(op.matched, 4);
    assert_eq!(op.unmatched, 3);
    assert_eq!(op.high, 4);
    assert_eq!(op.requires_review, 0);
    assert_eq!(op.transformers, 1);

    let spec = &result.specifications_summary;
    assert_eq!(spec.matched, 5);
    assert_eq!(spec.unmatched, 2);

    assert_eq!(result.resolve_summary.evaluated, 6);
    assert_eq!(result.resolve_summary.overridden, 2);
    assert_eq!(result.resolve_summary.dropped, 2);
}

#[test]
fn abbreviated_reference_matches_circuit_and_override() {
    let result = load_and_run("2025-06");
    let r = row(&result, "D.ALMAGRO1");

    assert_eq!(r.kind, Some(EquipmentKind::Line));
    assert_eq!(r.circuit, Some(2));
    assert_eq!(
        r.operational.matched_id.as_deref(),
        Some("Carrera Pinto 220->Diego de Almagro 220 II")
    );
    assert!(r.operational.orientation_swapped);
    assert!(r.operational.confidence >= 90.0);
    assert!(r.operational.confidence <= r.operational.sim_a.min(r.operational.sim_b));

    // open-ended maintenance window: R replaced, X falls back to operational
    let op = r.operational_parameters.as_ref().unwrap();
    assert!(close(op.resistance_ohm, 2.40));
    assert!(close(op.reactance_ohm, 3.60));
    assert_eq!(op.provenance, "maintenance 2025-06");

    assert_eq!(
        r.specifications.matched_id.as_deref(),
        Some("DIEGO DE ALMAGRO - CARRERA PINTO 220KV C2")
    );
    let spec = r.specifications_parameters.as_ref().unwrap();
    assert!(close(spec.resistance_ohm, 1.10));
    assert!(close(spec.reactance_ohm, 3.30));
}

#[test]
fn expired_window_keeps_operational_values() {
    let result = load_and_run("2025-06");
    let r = row(&result, "PAPOSO");
    let op = r.operational_parameters.as_ref().unwrap();
    assert!(close(op.resistance_ohm, 2.10));
    assert_eq!(op.provenance, "operational 2025-06");

    // section roll-up with a missing per-km reactance
    let spec = r.specifications_parameters.as_ref().unwrap();
    assert!(close(spec.resistance_ohm, 2.0));
    assert_eq!(spec.reactance_ohm, None);
    assert!(spec.provenance.contains("missing x_per_km"));
}

#[test]
fn same_window_active_in_2024() {
    let result = load_and_run("2024-06");
    let r = row(&result, "PAPOSO");
    let op = r.operational_parameters.as_ref().unwrap();
    assert!(close(op.resistance_ohm, 9.90));
}

#[test]
fn transformer_matches_transformers_only() {
    let result = load_and_run("2025-06");
    let r = row(&result, "A.JAHUEL");

    assert_eq!(r.kind, Some(EquipmentKind::Transformer));
    assert_eq!(
        r.operational.matched_id.as_deref(),
        Some("Alto Jahuel 220->Alto Jahuel 154 I")
    );
    // window opening mid-month counts for the whole month
    assert!(close(r.operational_parameters.as_ref().unwrap().resistance_ohm, 0.50));

    assert_eq!(r.specifications.matched_id.as_deref(), Some("ALTO JAHUEL 220/154"));
    // R/X derived from the nameplate
    let spec = r.specifications_parameters.as_ref().unwrap();
    assert!(close(spec.resistance_ohm, 1.452));
}

#[test]
fn circuit_filter_picks_second_circuit() {
    let result = load_and_run("2025-06");
    let r = row(&result, "L.CHANGOS");
    assert_eq!(r.operational.matched_id.as_deref(), Some("Los Changos 220->Kapatur 220 II"));
    // invalid maintenance row ignored
    assert!(close(r.operational_parameters.as_ref().unwrap().resistance_ohm, 0.022));
    assert_eq!(
        r.specifications.matched_id.as_deref(),
        Some("LOS CHANGOS - KAPATUR 220KV C2")
    );
}

#[test]
fn line_not_yet_in_service_is_not_a_candidate() {
    let result = load_and_run("2025-06");
    let r = row(&result, "STA.ROSA");
    assert_eq!(r.operational.tier, ConfidenceTier::Unmatched);
    assert!(r.operational.matched_id.is_none());
    assert_eq!(
        r.specifications.matched_id.as_deref(),
        Some("SANTA ROSA - PUERTO VARAS 66KV")
    );

    let later = load_and_run("2026-02");
    let r = row(&later, "STA.ROSA");
    assert_eq!(r.operational.matched_id.as_deref(), Some("Santa Rosa 66->Puerto Varas 66"));
}

#[test]
fn unmatched_and_unparseable_rows_are_kept() {
    let result = load_and_run("2025-06");

    let r = row(&result, "MAITENCILLO");
    assert!(r.parse_issue.is_none());
    assert!(r.operational.matched_id.is_none());
    assert!(r.specifications.matched_id.is_none());

    let r = row(&result, "SIN NOMBRE");
    assert!(r.parse_issue.is_some());
    assert_eq!(r.kind, None);
    assert_eq!(r.specifications.tier, ConfidenceTier::Unmatched);
}

#[test]
fn single_worker_gives_same_rows() {
    let mut config = load_config();
    let input = read_input(&config, &fixtures_dir()).unwrap();
    let default_run = run(&config, "2025-06", &input).unwrap();

    config.parallel.threads = Some(1);
    let pinned = run(&config, "2025-06", &input).unwrap();

    let ids = |r: &HomologResult| -> Vec<Option<String>> {
        r.rows.iter().map(|row| row.operational.matched_id.clone()).collect()
    };
    assert_eq!(ids(&default_run), ids(&pinned));
}

// -------------------------------------------------------------------------
// Errors + output
// -------------------------------------------------------------------------

#[test]
fn invalid_month_rejected() {
    let config = load_config();
    let input = read_input(&config, &fixtures_dir()).unwrap();
    for bad in ["2025-13", "2025-6", "junio", ""] {
        let err = run(&config, bad, &input).unwrap_err();
        assert!(matches!(err, HomologError::InvalidMonth(_)), "{bad:?}");
    }
}

#[test]
fn resolve_only() {
    let config = load_config();
    let input = read_input(&config, &fixtures_dir()).unwrap();
    let (lines, summary) = resolve("2025-06", &input).unwrap();
    assert_eq!(lines.len(), 6);
    assert_eq!(summary.overridden, 2);
    assert!(lines.iter().all(|l| l.month.to_string() == "2025-06-01"));
}

#[test]
fn missing_source_file_is_io_error() {
    let config = HomologConfig::from_toml("[sources.reference]\nfile = \"nope.csv\"\n").unwrap();
    let err = read_input(&config, &fixtures_dir()).unwrap_err();
    assert!(matches!(err, HomologError::Io(_)));
}

#[test]
fn json_and_csv_output() {
    let result = load_and_run("2025-06");

    let json = to_json(&result).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["meta"]["month"], "2025-06");
    assert_eq!(value["rows"].as_array().unwrap().len(), 7);
    assert_eq!(value["rows"][2]["kind"], "transformer");

    let csv = rows_to_csv(&result.rows).unwrap();
    assert_eq!(csv.lines().count(), 8);
    assert!(csv.lines().nth(1).unwrap().starts_with("D.ALMAGRO1____220->CARRERA_PINTO_220_2de2,line,2,"));
}

#[test]
fn semicolon_export_in_temp_dir() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("ref.csv"),
        "nombre;resistencia_ohm;reactancia_ohm\nPAPOSO____220->TALTAL____220;1,5;4,5\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("op.csv"),
        "LinNom;LinR;LinX;LinFOpe\nTaltal 220->Paposo 220;1,6;4,6;T\n",
    )
    .unwrap();
    let config = HomologConfig::from_toml(
        "[sources.reference]\nfile = \"ref.csv\"\n[sources.operational]\nfile = \"op.csv\"\n",
    )
    .unwrap();

    let input = read_input(&config, dir.path()).unwrap();
    let result = run(&config, "2025-01", &input).unwrap();
    let r = &result.rows[0];
    assert_eq!(r.operational.matched_id.as_deref(), Some("Taltal 220->Paposo 220"));
    assert!(r.operational.orientation_swapped);
    assert!(close(r.reference.resistance_ohm, 1.5));
}
