//! Two-winding transformer R/X from nameplate data.
//!
//! ```text
//! S    = base_mva, else rated_mva
//! R%   = Pcu[kW] * 100 / (S * 1000)
//! X%   = sqrt(Z%^2 - R%^2)
//! Zb   = V^2 / S
//! R, X = R% / 100 * Zb, X% / 100 * Zb
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::TransformerSpec;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformerNameplate {
    pub rated_mva: Option<f64>,
    pub base_mva: Option<f64>,
    /// Voltage of the winding the impedance is referred to.
    pub voltage_kv: Option<f64>,
    pub z_percent: Option<f64>,
    pub copper_loss_kw: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Impedance {
    pub resistance_ohm: f64,
    pub reactance_ohm: f64,
    pub r_percent: f64,
    pub x_percent: f64,
}

/// Why R/X could not be derived. Reported on the record, never fatal.
#[derive(Debug, Clone, PartialEq)]
pub enum ImpedanceIssue {
    MissingField(&'static str),
    NonPositivePower(f64),
    NonPositiveVoltage(f64),
    ImpedanceBelowResistance { z_percent: f64, r_percent: f64 },
}

impl fmt::Display for ImpedanceIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "missing {field}"),
            Self::NonPositivePower(s) => write!(f, "non-positive base power {s} MVA"),
            Self::NonPositiveVoltage(v) => write!(f, "non-positive voltage {v} kV"),
            Self::ImpedanceBelowResistance { z_percent, r_percent } => write!(
                f,
                "Z% ({z_percent:.4}) smaller than R% ({r_percent:.4}), reactance undefined"
            ),
        }
    }
}

impl TransformerNameplate {
    pub fn derive_impedance(&self) -> Result<Impedance, ImpedanceIssue> {
        let power = self
            .base_mva
            .or(self.rated_mva)
            .ok_or(ImpedanceIssue::MissingField("rated_mva"))?;
        let voltage = self.voltage_kv.ok_or(ImpedanceIssue::MissingField("voltage_kv"))?;
        let z_percent = self.z_percent.ok_or(ImpedanceIssue::MissingField("z_percent"))?;
        let copper_loss = self
            .copper_loss_kw
            .ok_or(ImpedanceIssue::MissingField("copper_loss_kw"))?;

        if power <= 0.0 {
            return Err(ImpedanceIssue::NonPositivePower(power));
        }
        if voltage <= 0.0 {
            return Err(ImpedanceIssue::NonPositiveVoltage(voltage));
        }

        let r_percent = copper_loss * 100.0 / (power * 1000.0);
        let x_squared = z_percent.powi(2) - r_percent.powi(2);
        if x_squared < 0.0 {
            return Err(ImpedanceIssue::ImpedanceBelowResistance { z_percent, r_percent });
        }
        let x_percent = x_squared.sqrt();

        let z_base = voltage.powi(2) / power;
        Ok(Impedance {
            resistance_ohm: r_percent / 100.0 * z_base,
            reactance_ohm: x_percent / 100.0 * z_base,
            r_percent,
            x_percent,
        })
    }
}

impl TransformerSpec {
    /// Build a specifications transformer. Nameplate-derived R/X fill in
    /// only where no precomputed value is given; a failed derivation is kept
    /// as `impedance_issue`.
    pub fn from_nameplate(
        base_name: impl Into<String>,
        voltage_primary: f64,
        voltage_secondary: f64,
        resistance_ohm: Option<f64>,
        reactance_ohm: Option<f64>,
        nameplate: &TransformerNameplate,
    ) -> Self {
        let base_name = base_name.into();
        let (mut resistance_ohm, mut reactance_ohm, mut impedance_issue) =
            (resistance_ohm, reactance_ohm, None);

        if resistance_ohm.is_none() || reactance_ohm.is_none() {
            let mut plate = nameplate.clone();
            if plate.voltage_kv.is_none() {
                plate.voltage_kv = Some(voltage_primary);
            }
            match plate.derive_impedance() {
                Ok(z) => {
                    resistance_ohm = resistance_ohm.or(Some(z.resistance_ohm));
                    reactance_ohm = reactance_ohm.or(Some(z.reactance_ohm));
                }
                Err(issue) => {
                    log::debug!("transformer '{base_name}': {issue}");
                    impedance_issue = Some(issue.to_string());
                }
            }
        }

        Self {
            base_name,
            voltage_primary,
            voltage_secondary,
            resistance_ohm,
            reactance_ohm,
            impedance_issue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plate() -> TransformerNameplate {
        TransformerNameplate {
            rated_mva: Some(100.0),
            base_mva: None,
            voltage_kv: Some(220.0),
            z_percent: Some(10.0),
            copper_loss_kw: Some(300.0),
        }
    }

    #[test]
    fn derive_from_nameplate() {
        let z = plate().derive_impedance().unwrap();
        // R% = 300*100/(100*1000) = 0.3; Zb = 220^2/100 = 484
        assert!((z.r_percent - 0.3).abs() < 1e-12);
        assert!((z.resistance_ohm - 1.452).abs() < 1e-9);
        let x_percent = (100.0f64 - 0.09).sqrt();
        assert!((z.x_percent - x_percent).abs() < 1e-12);
        assert!((z.reactance_ohm - x_percent / 100.0 * 484.0).abs() < 1e-9);
    }

    #[test]
    fn base_power_wins_over_rated() {
        let mut p = plate();
        p.base_mva = Some(200.0);
        let z = p.derive_impedance().unwrap();
        assert!((z.r_percent - 0.15).abs() < 1e-12);
    }

    #[test]
    fn impedance_below_resistance_is_an_issue() {
        let mut p = plate();
        p.z_percent = Some(0.1);
        let issue = p.derive_impedance().unwrap_err();
        assert!(matches!(issue, ImpedanceIssue::ImpedanceBelowResistance { .. }));
        assert!(issue.to_string().contains("smaller than R%"));
    }

    #[test]
    fn missing_and_non_positive_values() {
        let mut p = plate();
        p.z_percent = None;
        assert_eq!(p.derive_impedance().unwrap_err(), ImpedanceIssue::MissingField("z_percent"));

        let mut p = plate();
        p.rated_mva = Some(0.0);
        assert_eq!(p.derive_impedance().unwrap_err(), ImpedanceIssue::NonPositivePower(0.0));

        let mut p = plate();
        p.voltage_kv = Some(-1.0);
        assert!(matches!(p.derive_impedance(), Err(ImpedanceIssue::NonPositiveVoltage(_))));
    }

    #[test]
    fn spec_keeps_precomputed_values() {
        let t = TransformerSpec::from_nameplate("A.JAHUEL", 220.0, 154.0, Some(0.5), Some(12.0), &plate());
        assert_eq!(t.resistance_ohm, Some(0.5));
        assert_eq!(t.reactance_ohm, Some(12.0));
        assert!(t.impedance_issue.is_none());
    }

    #[test]
    fn spec_derives_missing_values_at_primary_voltage() {
        let mut p = plate();
        p.voltage_kv = None;
        let t = TransformerSpec::from_nameplate("A.JAHUEL", 220.0, 154.0, None, None, &p);
        assert!((t.resistance_ohm.unwrap() - 1.452).abs() < 1e-9);
        assert!(t.impedance_issue.is_none());
    }

    #[test]
    fn spec_records_issue() {
        let t = TransformerSpec::from_nameplate(
            "CARDONES",
            220.0,
            110.0,
            None,
            None,
            &TransformerNameplate::default(),
        );
        assert_eq!(t.resistance_ohm, None);
        assert_eq!(t.impedance_issue.as_deref(), Some("missing rated_mva"));
    }
}
