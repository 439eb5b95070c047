//! CSV adapters: registry exports -> typed input records.
//!
//! Column names come from `sources.*.columns`. Cells that are empty, `NaN`
//! or `-` read as missing; a non-empty cell that does not parse is an error.

use std::path::Path;

use chrono::NaiveDate;

use crate::config::{
    HomologConfig, MaintenanceColumns, OperationalColumns, ReferenceColumns, SectionColumns,
    SpecLineColumns, TransformerColumns,
};
use crate::error::HomologError;
use crate::model::{
    HomologInput, MaintenanceRecord, OperationalRecord, ReferenceRecord, SpecLine, TransformerSpec,
};
use crate::sections::{rollup_sections, SectionRecord};
use crate::transformer::TransformerNameplate;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y", "%Y/%m/%d"];

// ---------------------------------------------------------------------------
// File + table plumbing
// ---------------------------------------------------------------------------

/// Read a file as UTF-8, falling back to Windows-1252 (Excel exports).
pub fn read_file_as_utf8(path: &Path) -> Result<String, HomologError> {
    let bytes = std::fs::read(path)
        .map_err(|e| HomologError::Io(format!("{}: {e}", path.display())))?;
    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            log::debug!("{} is not UTF-8, decoding as Windows-1252", path.display());
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(e.as_bytes());
            Ok(decoded.into_owned())
        }
    }
}

/// Pick `;` when the header row has more of them than commas.
fn sniff_delimiter(data: &str) -> u8 {
    let header = data.lines().next().unwrap_or("");
    let semicolons = header.matches(';').count();
    let commas = header.matches(',').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

struct Table {
    source: &'static str,
    headers: Vec<String>,
    records: Vec<csv::StringRecord>,
}

impl Table {
    fn read(source: &'static str, data: &str) -> Result<Self, HomologError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(sniff_delimiter(data))
            .trim(csv::Trim::All)
            .from_reader(data.as_bytes());

        let headers = reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();
        let records = reader.records().collect::<Result<Vec<_>, _>>()?;
        Ok(Self { source, headers, records })
    }

    fn idx(&self, name: &str) -> Result<usize, HomologError> {
        self.idx_opt(name).ok_or_else(|| HomologError::MissingColumn {
            source: self.source.into(),
            column: name.into(),
        })
    }

    fn idx_opt(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.records.iter().enumerate().map(|(i, record)| Row {
            source: self.source,
            line: i + 2,
            record,
            record_id: String::new(),
        })
    }
}

/// One data row; `record_id` names it in error messages once known.
struct Row<'a> {
    source: &'static str,
    line: usize,
    record: &'a csv::StringRecord,
    record_id: String,
}

impl Row<'_> {
    fn text(&self, idx: usize) -> &str {
        self.record.get(idx).unwrap_or("")
    }

    fn identify(&mut self, idx: usize) -> String {
        let id = self.text(idx).to_string();
        self.record_id = if id.is_empty() {
            format!("row {}", self.line)
        } else {
            id.clone()
        };
        id
    }

    fn error(&self, column: &str, value: &str) -> HomologError {
        HomologError::ValueParse {
            source: self.source.into(),
            record_id: self.record_id.clone(),
            column: column.into(),
            value: value.into(),
        }
    }

    fn opt_text(&self, idx: Option<usize>) -> Option<String> {
        let value = self.text(idx?);
        (!is_blank(value)).then(|| value.to_string())
    }

    fn number(&self, idx: usize, column: &str) -> Result<Option<f64>, HomologError> {
        parse_number(self.text(idx)).map_err(|v| self.error(column, v))
    }

    fn opt_number(&self, idx: Option<usize>, column: &str) -> Result<Option<f64>, HomologError> {
        match idx {
            Some(i) => self.number(i, column),
            None => Ok(None),
        }
    }

    fn required_number(&self, idx: usize, column: &str) -> Result<f64, HomologError> {
        self.number(idx, column)?
            .ok_or_else(|| self.error(column, self.text(idx)))
    }

    fn flag(&self, idx: usize, column: &str) -> Result<bool, HomologError> {
        parse_flag(self.text(idx)).map_err(|v| self.error(column, v))
    }

    fn date(&self, idx: Option<usize>, column: &str) -> Result<Option<NaiveDate>, HomologError> {
        let Some(i) = idx else { return Ok(None) };
        parse_date(self.text(i)).map_err(|v| self.error(column, v))
    }
}

fn is_blank(value: &str) -> bool {
    let v = value.trim();
    v.is_empty() || v == "-" || v.eq_ignore_ascii_case("nan")
}

fn parse_number(value: &str) -> Result<Option<f64>, &str> {
    if is_blank(value) {
        return Ok(None);
    }
    let v = value.trim();
    let parsed = if v.contains(',') && !v.contains('.') {
        v.replace(',', ".").parse::<f64>()
    } else {
        v.parse::<f64>()
    };
    match parsed {
        Ok(n) if n.is_finite() => Ok(Some(n)),
        _ => Err(value),
    }
}

fn parse_flag(value: &str) -> Result<bool, &str> {
    match value.trim().to_ascii_uppercase().as_str() {
        "T" | "TRUE" | "1" | "S" | "SI" | "Y" | "YES" => Ok(true),
        "F" | "FALSE" | "0" | "N" | "NO" | "" => Ok(false),
        _ => Err(value),
    }
}

fn parse_date(value: &str) -> Result<Option<NaiveDate>, &str> {
    if is_blank(value) {
        return Ok(None);
    }
    let v = value.trim();
    // timestamps keep only their date part
    let day = v.split([' ', 'T']).next().unwrap_or(v);
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(day, fmt).ok())
        .map(Some)
        .ok_or(value)
}

// ---------------------------------------------------------------------------
// Per-source loaders
// ---------------------------------------------------------------------------

pub fn load_reference_csv(data: &str, col: &ReferenceColumns) -> Result<Vec<ReferenceRecord>, HomologError> {
    let table = Table::read("reference", data)?;
    let name_idx = table.idx(&col.name)?;
    let r_idx = table.idx(&col.resistance)?;
    let x_idx = table.idx(&col.reactance)?;
    let a_idx = table.idx_opt(&col.endpoint_a);
    let b_idx = table.idx_opt(&col.endpoint_b);
    let kv_idx = table.idx_opt(&col.voltage);

    table
        .rows()
        .map(|mut row| {
            let name = row.identify(name_idx);
            Ok(ReferenceRecord {
                name,
                endpoint_a_raw: row.opt_text(a_idx),
                endpoint_b_raw: row.opt_text(b_idx),
                voltage_kv: row.opt_number(kv_idx, &col.voltage)?,
                resistance_ohm: row.number(r_idx, &col.resistance)?,
                reactance_ohm: row.number(x_idx, &col.reactance)?,
            })
        })
        .collect()
}

pub fn load_operational_csv(data: &str, col: &OperationalColumns) -> Result<Vec<OperationalRecord>, HomologError> {
    let table = Table::read("operational", data)?;
    let name_idx = table.idx(&col.line_name)?;
    let r_idx = table.idx(&col.resistance)?;
    let x_idx = table.idx(&col.reactance)?;
    let valid_idx = table.idx(&col.valid)?;
    let start_idx = table.idx_opt(&col.start_date);

    table
        .rows()
        .map(|mut row| {
            let line_name = row.identify(name_idx);
            Ok(OperationalRecord {
                line_name,
                resistance_ohm: row.number(r_idx, &col.resistance)?,
                reactance_ohm: row.number(x_idx, &col.reactance)?,
                operational_valid: row.flag(valid_idx, &col.valid)?,
                operational_start_date: row.date(start_idx, &col.start_date)?,
            })
        })
        .collect()
}

pub fn load_maintenance_csv(data: &str, col: &MaintenanceColumns) -> Result<Vec<MaintenanceRecord>, HomologError> {
    let table = Table::read("maintenance", data)?;
    let name_idx = table.idx(&col.line_name)?;
    let valid_idx = table.idx(&col.valid)?;
    let start_idx = table.idx(&col.start_date)?;
    let end_idx = table.idx(&col.end_date)?;
    let r_idx = table.idx_opt(&col.resistance);
    let x_idx = table.idx_opt(&col.reactance);

    table
        .rows()
        .map(|mut row| {
            let line_name = row.identify(name_idx);
            Ok(MaintenanceRecord {
                line_name,
                valid: row.flag(valid_idx, &col.valid)?,
                start_date: row.date(Some(start_idx), &col.start_date)?,
                end_date: row.date(Some(end_idx), &col.end_date)?,
                resistance_ohm: row.opt_number(r_idx, &col.resistance)?,
                reactance_ohm: row.opt_number(x_idx, &col.reactance)?,
            })
        })
        .collect()
}

pub fn load_spec_lines_csv(data: &str, col: &SpecLineColumns) -> Result<Vec<SpecLine>, HomologError> {
    let table = Table::read("spec_lines", data)?;
    let name_idx = table.idx(&col.name)?;
    let kv_idx = table.idx_opt(&col.voltage);
    let r_idx = table.idx(&col.resistance)?;
    let x_idx = table.idx(&col.reactance)?;

    table
        .rows()
        .map(|mut row| {
            let composite_name = row.identify(name_idx);
            Ok(SpecLine {
                composite_name,
                control_center: None,
                voltage_kv: row.opt_number(kv_idx, &col.voltage)?,
                resistance_ohm: row.number(r_idx, &col.resistance)?,
                reactance_ohm: row.number(x_idx, &col.reactance)?,
                missing_reason: None,
            })
        })
        .collect()
}

pub fn load_sections_csv(data: &str, col: &SectionColumns) -> Result<Vec<SectionRecord>, HomologError> {
    let table = Table::read("sections", data)?;
    let name_idx = table.idx(&col.name)?;
    let cc_idx = table.idx_opt(&col.control_center);
    let kv_idx = table.idx_opt(&col.voltage);
    let len_idx = table.idx(&col.length)?;
    let r_idx = table.idx(&col.resistance_per_km)?;
    let x_idx = table.idx(&col.reactance_per_km)?;

    table
        .rows()
        .map(|mut row| {
            let name = row.identify(name_idx);
            Ok(SectionRecord {
                name,
                control_center: row.opt_text(cc_idx),
                voltage_kv: row.opt_number(kv_idx, &col.voltage)?,
                length_km: row.number(len_idx, &col.length)?,
                r_per_km: row.number(r_idx, &col.resistance_per_km)?,
                x_per_km: row.number(x_idx, &col.reactance_per_km)?,
            })
        })
        .collect()
}

pub fn load_transformers_csv(data: &str, col: &TransformerColumns) -> Result<Vec<TransformerSpec>, HomologError> {
    let table = Table::read("transformers", data)?;
    let name_idx = table.idx(&col.name)?;
    let vp_idx = table.idx(&col.voltage_primary)?;
    let vs_idx = table.idx(&col.voltage_secondary)?;
    let r_idx = table.idx_opt(&col.resistance);
    let x_idx = table.idx_opt(&col.reactance);
    let rated_idx = table.idx_opt(&col.rated_mva);
    let base_idx = table.idx_opt(&col.base_mva);
    let z_idx = table.idx_opt(&col.z_percent);
    let pcu_idx = table.idx_opt(&col.copper_loss_kw);

    table
        .rows()
        .map(|mut row| {
            let name = row.identify(name_idx);
            let nameplate = TransformerNameplate {
                rated_mva: row.opt_number(rated_idx, &col.rated_mva)?,
                base_mva: row.opt_number(base_idx, &col.base_mva)?,
                voltage_kv: None,
                z_percent: row.opt_number(z_idx, &col.z_percent)?,
                copper_loss_kw: row.opt_number(pcu_idx, &col.copper_loss_kw)?,
            };
            Ok(TransformerSpec::from_nameplate(
                name,
                row.required_number(vp_idx, &col.voltage_primary)?,
                row.required_number(vs_idx, &col.voltage_secondary)?,
                row.opt_number(r_idx, &col.resistance)?,
                row.opt_number(x_idx, &col.reactance)?,
                &nameplate,
            ))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Whole input
// ---------------------------------------------------------------------------

/// Load every configured source. Paths are relative to `base_dir`.
/// Only the reference source is mandatory.
pub fn read_input(config: &HomologConfig, base_dir: &Path) -> Result<HomologInput, HomologError> {
    let sources = &config.sources;
    let read = |file: &str| read_file_as_utf8(&base_dir.join(file));

    let reference_src = sources
        .reference
        .as_ref()
        .ok_or_else(|| HomologError::MissingSource("reference".into()))?;
    let mut input = HomologInput {
        reference: load_reference_csv(&read(&reference_src.file)?, &reference_src.columns)?,
        ..HomologInput::default()
    };

    if let Some(src) = &sources.operational {
        input.operational = load_operational_csv(&read(&src.file)?, &src.columns)?;
    }
    if let Some(src) = &sources.maintenance {
        input.maintenance = load_maintenance_csv(&read(&src.file)?, &src.columns)?;
    }
    if let Some(src) = &sources.spec_lines {
        input.spec_lines = load_spec_lines_csv(&read(&src.file)?, &src.columns)?;
    }
    if let Some(src) = &sources.sections {
        let sections = load_sections_csv(&read(&src.file)?, &src.columns)?;
        input.spec_lines.extend(rollup_sections(&sections));
    }
    if let Some(src) = &sources.transformers {
        input.spec_transformers = load_transformers_csv(&read(&src.file)?, &src.columns)?;
    }

    log::info!(
        "loaded {} reference, {} operational, {} maintenance, {} spec lines, {} spec transformers",
        input.reference.len(),
        input.operational.len(),
        input.maintenance.len(),
        input.spec_lines.len(),
        input.spec_transformers.len()
    );
    Ok(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operational_defaults() {
        let csv = "LinNom,LinR,LinX,LinFOpe,LinFecOpe\n\
                   Paposo 220->Taltal 220,1.5,4.5,T,2020-01-01\n\
                   Cardones 220->Maitencillo 220,,NaN,F,\n";
        let rows = load_operational_csv(csv, &OperationalColumns::default()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].resistance_ohm, Some(1.5));
        assert!(rows[0].operational_valid);
        assert_eq!(rows[0].operational_start_date, NaiveDate::from_ymd_opt(2020, 1, 1));
        assert_eq!(rows[1].resistance_ohm, None);
        assert_eq!(rows[1].reactance_ohm, None);
        assert!(!rows[1].operational_valid);
        assert_eq!(rows[1].operational_start_date, None);
    }

    #[test]
    fn semicolon_and_decimal_comma() {
        let csv = "LinNom;LinFMan;LinFecIni;LinFecFin;LinR;LinX\n\
                   Paposo 220->Taltal 220;T;01-03-2025;;0,75;2,5\n";
        let rows = load_maintenance_csv(csv, &MaintenanceColumns::default()).unwrap();
        assert_eq!(rows[0].start_date, NaiveDate::from_ymd_opt(2025, 3, 1));
        assert_eq!(rows[0].end_date, None);
        assert_eq!(rows[0].resistance_ohm, Some(0.75));
        assert_eq!(rows[0].reactance_ohm, Some(2.5));
    }

    #[test]
    fn timestamp_dates_keep_the_day() {
        let csv = "LinNom,LinFMan,LinFecIni,LinFecFin,LinR,LinX\n\
                   x,1,2025-03-01 00:00:00,2025-04-30T00:00:00,,\n";
        let rows = load_maintenance_csv(csv, &MaintenanceColumns::default()).unwrap();
        assert_eq!(rows[0].end_date, NaiveDate::from_ymd_opt(2025, 4, 30));
    }

    #[test]
    fn missing_column() {
        let csv = "LinNom,LinR\nx,1\n";
        let err = load_operational_csv(csv, &OperationalColumns::default()).unwrap_err();
        match err {
            HomologError::MissingColumn { source, column } => {
                assert_eq!(source, "operational");
                assert_eq!(column, "LinX");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn bad_number_names_record_and_column() {
        let csv = "nombre,resistencia_ohm,reactancia_ohm\nD.ALMAGRO____220->CARRERA_PINTO_220,abc,1\n";
        let err = load_reference_csv(csv, &ReferenceColumns::default()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("D.ALMAGRO____220->CARRERA_PINTO_220"), "{msg}");
        assert!(msg.contains("resistencia_ohm"), "{msg}");
        assert!(msg.contains("abc"), "{msg}");
    }

    #[test]
    fn bad_flag_is_an_error() {
        let csv = "LinNom,LinR,LinX,LinFOpe\nx,1,1,maybe\n";
        assert!(load_operational_csv(csv, &OperationalColumns::default()).is_err());
    }

    #[test]
    fn reference_optional_columns() {
        let csv = "nombre,barra_a,barra_b,voltaje_kv,resistencia_ohm,reactancia_ohm\n\
                   A.JAHUEL______220->A.JAHUEL______154,A.JAHUEL______220,A.JAHUEL______154,220,0.5,12\n";
        let rows = load_reference_csv(csv, &ReferenceColumns::default()).unwrap();
        assert_eq!(rows[0].endpoint_b_raw.as_deref(), Some("A.JAHUEL______154"));
        assert_eq!(rows[0].voltage_kv, Some(220.0));

        let csv = "nombre,resistencia_ohm,reactancia_ohm\nx->y,,\n";
        let rows = load_reference_csv(csv, &ReferenceColumns::default()).unwrap();
        assert_eq!(rows[0].endpoint_a_raw, None);
        assert_eq!(rows[0].voltage_kv, None);
    }

    #[test]
    fn transformers_derive_missing_impedance() {
        let csv = "nombre,tension_nominal_at,tension_nominal_bt,capacidad_nominal_mva,z_percent,pcu_kw\n\
                   A.JAHUEL,220,154,100,10,300\n\
                   CARDONES,220,110,,10,300\n";
        let rows = load_transformers_csv(csv, &TransformerColumns::default()).unwrap();
        assert!((rows[0].resistance_ohm.unwrap() - 1.452).abs() < 1e-9);
        assert_eq!(rows[1].impedance_issue.as_deref(), Some("missing rated_mva"));
    }

    #[test]
    fn transformer_without_voltage_is_an_error() {
        let csv = "nombre,tension_nominal_at,tension_nominal_bt\nA.JAHUEL,220,\n";
        let err = load_transformers_csv(csv, &TransformerColumns::default()).unwrap_err();
        assert!(err.to_string().contains("tension_nominal_bt"));
    }

    #[test]
    fn windows_1252_file_is_decoded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tramos.csv");
        // "Tensión" with ó as 0xF3
        std::fs::write(&path, b"Tensi\xf3n\n220\n").unwrap();
        let text = read_file_as_utf8(&path).unwrap();
        assert!(text.starts_with("Tensión"));
    }

    #[test]
    fn read_input_needs_reference() {
        let err = read_input(&HomologConfig::default(), Path::new(".")).unwrap_err();
        assert!(matches!(err, HomologError::MissingSource(_)));
    }
}
