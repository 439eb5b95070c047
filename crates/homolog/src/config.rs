use serde::Deserialize;

use crate::abbrev::{AbbreviationEntry, AbbreviationTable};
use crate::error::HomologError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct HomologConfig {
    #[serde(default = "default_name")]
    pub name: String,
    /// Ordered `{ short, long }` expansions. Omitted = builtin table.
    #[serde(default)]
    pub abbreviations: Option<Vec<AbbreviationEntry>>,
    /// Also register dot-less and space-less spellings of every key.
    #[serde(default = "default_true")]
    pub abbreviation_variants: bool,
    #[serde(default)]
    pub thresholds: ThresholdConfig,
    #[serde(default)]
    pub tolerance: ToleranceConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub tie_break: TieBreak,
    #[serde(default)]
    pub parallel: ParallelConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
}

fn default_name() -> String {
    "homologation".into()
}

fn default_true() -> bool {
    true
}

impl Default for HomologConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            abbreviations: None,
            abbreviation_variants: true,
            thresholds: ThresholdConfig::default(),
            tolerance: ToleranceConfig::default(),
            scoring: ScoringConfig::default(),
            tie_break: TieBreak::default(),
            parallel: ParallelConfig::default(),
            sources: SourcesConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Thresholds, tolerance, scoring
// ---------------------------------------------------------------------------

/// Confidence tier boundaries (inclusive lower bounds).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub accept: f64,
    pub medium: f64,
    pub high: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            accept: 50.0,
            medium: 80.0,
            high: 90.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ToleranceConfig {
    /// Max voltage difference for two records to be compatible.
    pub voltage_kv: f64,
    /// Min voltage gap between same-named endpoints for a transformer.
    pub transformer_gap_kv: f64,
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            voltage_kv: 5.0,
            transformer_gap_kv: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub containment_floor: f64,
    pub orientation_adjustment: bool,
    pub orientation_bonus: f64,
    pub orientation_penalty: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            containment_floor: 90.0,
            orientation_adjustment: true,
            orientation_bonus: 2.0,
            orientation_penalty: 3.0,
        }
    }
}

/// How two candidates with exactly the same score are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Lexicographically smallest candidate id, then pool order.
    #[default]
    LowestId,
    /// First candidate in pool order.
    FirstSeen,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ParallelConfig {
    /// Dedicated worker count. Unset = rayon's global pool.
    #[serde(default)]
    pub threads: Option<usize>,
}

// ---------------------------------------------------------------------------
// Sources (CSV adapter)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub reference: Option<ReferenceSource>,
    #[serde(default)]
    pub operational: Option<OperationalSource>,
    #[serde(default)]
    pub maintenance: Option<MaintenanceSource>,
    #[serde(default)]
    pub spec_lines: Option<SpecLineSource>,
    #[serde(default)]
    pub sections: Option<SectionSource>,
    #[serde(default)]
    pub transformers: Option<TransformerSource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceSource {
    pub file: String,
    #[serde(default)]
    pub columns: ReferenceColumns,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReferenceColumns {
    pub name: String,
    pub endpoint_a: String,
    pub endpoint_b: String,
    pub voltage: String,
    pub resistance: String,
    pub reactance: String,
}

impl Default for ReferenceColumns {
    fn default() -> Self {
        Self {
            name: "nombre".into(),
            endpoint_a: "barra_a".into(),
            endpoint_b: "barra_b".into(),
            voltage: "voltaje_kv".into(),
            resistance: "resistencia_ohm".into(),
            reactance: "reactancia_ohm".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperationalSource {
    pub file: String,
    #[serde(default)]
    pub columns: OperationalColumns,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OperationalColumns {
    pub line_name: String,
    pub resistance: String,
    pub reactance: String,
    pub valid: String,
    pub start_date: String,
}

impl Default for OperationalColumns {
    fn default() -> Self {
        Self {
            line_name: "LinNom".into(),
            resistance: "LinR".into(),
            reactance: "LinX".into(),
            valid: "LinFOpe".into(),
            start_date: "LinFecOpe".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MaintenanceSource {
    pub file: String,
    #[serde(default)]
    pub columns: MaintenanceColumns,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MaintenanceColumns {
    pub line_name: String,
    pub valid: String,
    pub start_date: String,
    pub end_date: String,
    pub resistance: String,
    pub reactance: String,
}

impl Default for MaintenanceColumns {
    fn default() -> Self {
        Self {
            line_name: "LinNom".into(),
            valid: "LinFMan".into(),
            start_date: "LinFecIni".into(),
            end_date: "LinFecFin".into(),
            resistance: "LinR".into(),
            reactance: "LinX".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpecLineSource {
    pub file: String,
    #[serde(default)]
    pub columns: SpecLineColumns,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SpecLineColumns {
    pub name: String,
    pub voltage: String,
    pub resistance: String,
    pub reactance: String,
}

impl Default for SpecLineColumns {
    fn default() -> Self {
        Self {
            name: "nombre".into(),
            voltage: "tension_nominal".into(),
            resistance: "R_total".into(),
            reactance: "X_total".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SectionSource {
    pub file: String,
    #[serde(default)]
    pub columns: SectionColumns,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SectionColumns {
    pub name: String,
    pub control_center: String,
    pub voltage: String,
    pub length: String,
    pub resistance_per_km: String,
    pub reactance_per_km: String,
}

impl Default for SectionColumns {
    fn default() -> Self {
        Self {
            name: "Nombre Tramo".into(),
            control_center: "Nombre Centro Control".into(),
            voltage: "1.1 Tensión nominal".into(),
            length: "1.2 Longitud conductor".into(),
            resistance_per_km: "1.3 Resistencia de secuencia positiva a 20°C (50 Hz)".into(),
            reactance_per_km: "1.4 Reactancia de Secuencia positiva  X (50Hz)".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransformerSource {
    pub file: String,
    #[serde(default)]
    pub columns: TransformerColumns,
}

/// Precomputed `resistance`/`reactance` win when filled in; otherwise R/X are
/// derived from the nameplate columns.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TransformerColumns {
    pub name: String,
    pub voltage_primary: String,
    pub voltage_secondary: String,
    pub resistance: String,
    pub reactance: String,
    pub rated_mva: String,
    pub base_mva: String,
    pub z_percent: String,
    pub copper_loss_kw: String,
}

impl Default for TransformerColumns {
    fn default() -> Self {
        Self {
            name: "nombre".into(),
            voltage_primary: "tension_nominal_at".into(),
            voltage_secondary: "tension_nominal_bt".into(),
            resistance: "R_total".into(),
            reactance: "X_total".into(),
            rated_mva: "capacidad_nominal_mva".into(),
            base_mva: "potencia_base_mva".into(),
            z_percent: "z_percent".into(),
            copper_loss_kw: "pcu_kw".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl HomologConfig {
    pub fn from_toml(input: &str) -> Result<Self, HomologError> {
        let config: HomologConfig =
            toml::from_str(input).map_err(|e| HomologError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), HomologError> {
        let t = &self.thresholds;
        for (label, value) in [("accept", t.accept), ("medium", t.medium), ("high", t.high)] {
            if !(0.0..=100.0).contains(&value) {
                return Err(HomologError::ConfigValidation(format!(
                    "thresholds.{label} must be within 0..=100, got {value}"
                )));
            }
        }
        if !(t.accept <= t.medium && t.medium <= t.high) {
            return Err(HomologError::ConfigValidation(format!(
                "thresholds must satisfy accept <= medium <= high, got {} / {} / {}",
                t.accept, t.medium, t.high
            )));
        }

        let tol = &self.tolerance;
        for (label, value) in [
            ("voltage_kv", tol.voltage_kv),
            ("transformer_gap_kv", tol.transformer_gap_kv),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(HomologError::ConfigValidation(format!(
                    "tolerance.{label} must be a non-negative number, got {value}"
                )));
            }
        }

        let s = &self.scoring;
        if !(0.0..=100.0).contains(&s.containment_floor) {
            return Err(HomologError::ConfigValidation(format!(
                "scoring.containment_floor must be within 0..=100, got {}",
                s.containment_floor
            )));
        }
        if s.orientation_bonus < 0.0 || s.orientation_penalty < 0.0 {
            return Err(HomologError::ConfigValidation(
                "scoring.orientation_bonus and orientation_penalty must be non-negative".into(),
            ));
        }

        if self.parallel.threads == Some(0) {
            return Err(HomologError::ConfigValidation(
                "parallel.threads must be at least 1".into(),
            ));
        }

        self.abbreviation_table()?;
        Ok(())
    }

    /// The abbreviation table this config describes (builtin when omitted).
    pub fn abbreviation_table(&self) -> Result<AbbreviationTable, HomologError> {
        let table = match &self.abbreviations {
            Some(entries) => AbbreviationTable::new(entries.iter().cloned())?,
            None => AbbreviationTable::builtin(),
        };
        Ok(if self.abbreviation_variants {
            table.with_variants()
        } else {
            table
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
