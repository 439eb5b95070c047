use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::SpecLine;

/// One section (tramo) row of the specifications registry. Per-km values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionRecord {
    pub name: String,
    pub control_center: Option<String>,
    pub voltage_kv: Option<f64>,
    pub length_km: Option<f64>,
    pub r_per_km: Option<f64>,
    pub x_per_km: Option<f64>,
}

#[derive(Debug, Default)]
struct Totals {
    control_center: Option<String>,
    voltage_kv: Option<f64>,
    length_km: f64,
    resistance_ohm: f64,
    reactance_ohm: f64,
    missing_length: bool,
    missing_r: bool,
    missing_x: bool,
}

/// Group sections by name and add them up into whole lines. A total that
/// depends on a missing value is left empty and the gap is named in
/// `missing_reason`.
pub fn rollup_sections(sections: &[SectionRecord]) -> Vec<SpecLine> {
    let mut groups: BTreeMap<String, Totals> = BTreeMap::new();

    for s in sections {
        let t = groups.entry(s.name.trim().to_string()).or_default();
        if t.control_center.is_none() {
            t.control_center = s.control_center.clone();
        }
        if t.voltage_kv.is_none() {
            t.voltage_kv = s.voltage_kv;
        }

        let Some(length) = s.length_km else {
            t.missing_length = true;
            continue;
        };
        t.length_km += length;
        match s.r_per_km {
            Some(r) => t.resistance_ohm += r * length,
            None => t.missing_r = true,
        }
        match s.x_per_km {
            Some(x) => t.reactance_ohm += x * length,
            None => t.missing_x = true,
        }
    }

    groups
        .into_iter()
        .map(|(name, t)| {
            let mut reasons = Vec::new();
            if t.missing_length {
                reasons.push("missing length_km");
            }
            if t.missing_r {
                reasons.push("missing r_per_km");
            }
            if t.missing_x {
                reasons.push("missing x_per_km");
            }
            SpecLine {
                composite_name: name,
                control_center: t.control_center,
                voltage_kv: t.voltage_kv,
                resistance_ohm: (!t.missing_length && !t.missing_r).then_some(t.resistance_ohm),
                reactance_ohm: (!t.missing_length && !t.missing_x).then_some(t.reactance_ohm),
                missing_reason: (!reasons.is_empty()).then(|| reasons.join(", ")),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(name: &str, length: Option<f64>, r: Option<f64>, x: Option<f64>) -> SectionRecord {
        SectionRecord {
            name: name.into(),
            control_center: Some("CEN".into()),
            voltage_kv: Some(220.0),
            length_km: length,
            r_per_km: r,
            x_per_km: x,
        }
    }

    #[test]
    fn sections_add_up() {
        let lines = rollup_sections(&[
            section("PAPOSO - TAP TAL TAL 220KV C1", Some(10.0), Some(0.05), Some(0.4)),
            section("CARDONES - MAITENCILLO 220KV C1", Some(3.0), Some(0.1), Some(0.5)),
            section("PAPOSO - TAP TAL TAL 220KV C1", Some(5.0), Some(0.1), Some(0.3)),
        ]);
        assert_eq!(lines.len(), 2);
        // ordered by name
        assert_eq!(lines[0].composite_name, "CARDONES - MAITENCILLO 220KV C1");

        let paposo = &lines[1];
        assert!((paposo.resistance_ohm.unwrap() - 1.0).abs() < 1e-12);
        assert!((paposo.reactance_ohm.unwrap() - 5.5).abs() < 1e-12);
        assert_eq!(paposo.voltage_kv, Some(220.0));
        assert_eq!(paposo.control_center.as_deref(), Some("CEN"));
        assert!(paposo.missing_reason.is_none());
    }

    #[test]
    fn missing_per_km_value_names_the_gap() {
        let lines = rollup_sections(&[
            section("A - B 66KV", Some(2.0), Some(0.1), None),
            section("A - B 66KV", Some(1.0), Some(0.1), Some(0.2)),
        ]);
        assert!((lines[0].resistance_ohm.unwrap() - 0.3).abs() < 1e-12);
        assert_eq!(lines[0].reactance_ohm, None);
        assert_eq!(lines[0].missing_reason.as_deref(), Some("missing x_per_km"));
    }

    #[test]
    fn missing_length_empties_both_totals() {
        let lines = rollup_sections(&[section("A - B 66KV", None, Some(0.1), Some(0.2))]);
        assert_eq!(lines[0].resistance_ohm, None);
        assert_eq!(lines[0].reactance_ohm, None);
        assert_eq!(lines[0].missing_reason.as_deref(), Some("missing length_km"));
    }
}
