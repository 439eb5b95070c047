//! Composite line-name parsing, one grammar per registry.
//!
//! | Grammar  | Registry        | Example                                   |
//! |----------|-----------------|-------------------------------------------|
//! | `Arrow`  | operational     | `Los Changos 220->Kapatur 220 II`         |
//! | `DashKv` | specifications  | `PAPOSO - TAP TAL TAL 220KV C1`           |
//! | `Padded` | reference       | `A.JAHUEL______220->A.JAHUEL______154`    |

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::ToleranceConfig;
use crate::model::{CircuitId, EquipmentKind, ParsedEndpoint, ParsedLine};
use crate::normalize::split_voltage_suffix;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineGrammar {
    Arrow,
    DashKv,
    Padded,
}

impl std::fmt::Display for LineGrammar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Arrow => write!(f, "arrow"),
            Self::DashKv => write!(f, "dash_kv"),
            Self::Padded => write!(f, "padded"),
        }
    }
}

fn circuit_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<rest>.*?)\s+(?:(?P<roman>[IVX]+)|[Cc](?P<num>\d+))\s*$")
            .expect("circuit marker regex")
    })
}

fn dash_kv_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(?P<a>.+?)\s*[-–]\s*(?P<b>.+?)\s+(?P<kv>\d{2,3})\s*kv(?:\s+c(?P<circuit>\d+))?\s*$")
            .expect("dash-kV regex")
    })
}

fn dash_bare_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(?P<a>.+?)\s*[-–]\s*(?P<b>.+?)(?:\s+c(?P<circuit>\d+))?\s*$")
            .expect("bare dash regex")
    })
}

fn part_suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?P<rest>.*?)_(?P<n>\d+)de\d+\s*$").expect("part suffix regex")
    })
}

/// Roman numeral `I`..`VI` to its value; anything else is not a circuit.
pub fn roman_circuit(marker: &str) -> Option<CircuitId> {
    match marker {
        "I" => Some(1),
        "II" => Some(2),
        "III" => Some(3),
        "IV" => Some(4),
        "V" => Some(5),
        "VI" => Some(6),
        _ => None,
    }
}

/// Strip a trailing circuit marker (`II`, `C2`) from the B side of an arrow
/// name. A roman marker only counts when it follows the voltage, so a bus
/// name ending in `X` or `V` is left intact.
pub fn strip_circuit_marker(side: &str) -> (&str, Option<CircuitId>) {
    let Some(caps) = circuit_marker_re().captures(side) else {
        return (side.trim(), None);
    };
    let rest = caps.name("rest").map_or("", |m| m.as_str());

    if let Some(num) = caps.name("num") {
        return (rest.trim(), num.as_str().parse().ok());
    }
    // Without a voltage in front, `Taltal II` stays a bus label with no
    // circuit: a bare roman suffix cannot be told apart from a name ending in
    // `V`, `X` or `I`.
    match caps.name("roman") {
        Some(roman) if rest.trim_end().ends_with(|c: char| c.is_ascii_digit()) => {
            (rest.trim(), roman_circuit(roman.as_str()))
        }
        _ => (side.trim(), None),
    }
}

/// Parse one standalone endpoint label such as `"D.ALMAGRO1____220"`.
pub fn parse_endpoint(raw: &str) -> ParsedEndpoint {
    let (bus, kv) = split_voltage_suffix(raw.trim());
    ParsedEndpoint::new(bus.trim(), kv)
}

/// Same base name on both sides with voltages further apart than `gap_kv`.
pub fn classify_kind(a: &ParsedEndpoint, b: &ParsedEndpoint, gap_kv: f64) -> EquipmentKind {
    let same_base = a.bus_label.trim().to_uppercase() == b.bus_label.trim().to_uppercase();
    match (a.voltage_kv, b.voltage_kv) {
        (Some(va), Some(vb)) if same_base && (va - vb).abs() > gap_kv => EquipmentKind::Transformer,
        _ => EquipmentKind::Line,
    }
}

/// Grammar-specific parser with the shared `parse` contract.
#[derive(Debug, Clone, Copy)]
pub struct IdentifierParser {
    grammar: LineGrammar,
    transformer_gap_kv: f64,
}

impl IdentifierParser {
    pub fn new(grammar: LineGrammar, tolerance: &ToleranceConfig) -> Self {
        Self {
            grammar,
            transformer_gap_kv: tolerance.transformer_gap_kv,
        }
    }

    pub fn grammar(&self) -> LineGrammar {
        self.grammar
    }

    /// Extract both endpoints, the circuit and the equipment kind.
    /// `None` when the name does not follow the grammar.
    pub fn parse(&self, raw: &str) -> Option<ParsedLine> {
        let parts = match self.grammar {
            LineGrammar::Arrow => parse_arrow(raw)?,
            LineGrammar::DashKv => parse_dash_kv(raw)?,
            LineGrammar::Padded => parse_padded(raw)?,
        };
        self.finish(parts)
    }

    /// `parse`, falling back to a registry voltage column for DashKv names
    /// that carry no `kV` token (`CARDONES - MAITENCILLO C1`).
    pub fn parse_with_voltage(&self, raw: &str, voltage_kv: Option<f64>) -> Option<ParsedLine> {
        if let Some(parsed) = self.parse(raw) {
            return Some(parsed);
        }
        match (self.grammar, voltage_kv) {
            (LineGrammar::DashKv, Some(kv)) => self.finish(parse_dash_bare(raw, kv)?),
            _ => None,
        }
    }

    fn finish(&self, (endpoint_a, endpoint_b, circuit): Parts) -> Option<ParsedLine> {
        if endpoint_a.bus_label.is_empty() || endpoint_b.bus_label.is_empty() {
            return None;
        }
        let kind = classify_kind(&endpoint_a, &endpoint_b, self.transformer_gap_kv);
        Some(ParsedLine {
            endpoint_a,
            endpoint_b,
            circuit,
            kind,
        })
    }
}

type Parts = (ParsedEndpoint, ParsedEndpoint, Option<CircuitId>);

fn parse_arrow(raw: &str) -> Option<Parts> {
    let (left, right) = raw.split_once("->")?;
    let (right, circuit) = strip_circuit_marker(right);
    Some((parse_endpoint(left), parse_endpoint(right), circuit))
}

fn parse_dash_kv(raw: &str) -> Option<Parts> {
    let caps = dash_kv_re().captures(raw)?;
    let kv: Option<f64> = caps.name("kv").and_then(|m| m.as_str().parse().ok());
    let circuit = caps.name("circuit").and_then(|m| m.as_str().parse().ok());
    let a = caps.name("a")?.as_str().trim();
    let b = caps.name("b")?.as_str().trim();
    Some((ParsedEndpoint::new(a, kv), ParsedEndpoint::new(b, kv), circuit))
}

/// Dash name without a unit token; sides without their own voltage get `kv`.
fn parse_dash_bare(raw: &str, kv: f64) -> Option<Parts> {
    let caps = dash_bare_re().captures(raw)?;
    let circuit = caps.name("circuit").and_then(|m| m.as_str().parse().ok());
    let side = |name: &str| {
        let e = parse_endpoint(caps.name(name).map_or("", |m| m.as_str()));
        let voltage = e.voltage_kv.or(Some(kv));
        ParsedEndpoint::new(e.bus_label, voltage)
    };
    Some((side("a"), side("b"), circuit))
}

fn parse_padded(raw: &str) -> Option<Parts> {
    let (name, circuit) = match part_suffix_re().captures(raw) {
        Some(caps) => (
            caps.name("rest").map_or(raw, |m| m.as_str()),
            caps.name("n").and_then(|m| m.as_str().parse().ok()),
        ),
        None => (raw, None),
    };
    let (left, right) = name.split_once("->")?;
    Some((parse_endpoint(left), parse_endpoint(right), circuit))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser(grammar: LineGrammar) -> IdentifierParser {
        IdentifierParser::new(grammar, &ToleranceConfig::default())
    }

    #[test]
    fn arrow_with_roman_circuit() {
        let p = parser(LineGrammar::Arrow).parse("Los Changos 220->Kapatur 220 II").unwrap();
        assert_eq!(p.endpoint_a, ParsedEndpoint::new("Los Changos", Some(220.0)));
        assert_eq!(p.endpoint_b, ParsedEndpoint::new("Kapatur", Some(220.0)));
        assert_eq!(p.circuit, Some(2));
        assert_eq!(p.kind, EquipmentKind::Line);
    }

    #[test]
    fn arrow_with_c_circuit_and_prefix() {
        let p = parser(LineGrammar::Arrow).parse("Paposo 220->Tap Tal Tal 220 C1").unwrap();
        assert_eq!(p.endpoint_b.bus_label, "Tap Tal Tal");
        assert_eq!(p.circuit, Some(1));

        let p = parser(LineGrammar::Arrow).parse("SUEZ_Los Changos 220->Kimal 500 II").unwrap();
        assert_eq!(p.endpoint_a, ParsedEndpoint::new("SUEZ_Los Changos", Some(220.0)));
        assert_eq!(p.endpoint_b.voltage_kv, Some(500.0));
    }

    #[test]
    fn arrow_without_circuit() {
        let p = parser(LineGrammar::Arrow).parse("Paposo 220->Taltal 220").unwrap();
        assert_eq!(p.circuit, None);
        assert_eq!(p.endpoint_b.bus_label, "Taltal");
    }

    #[test]
    fn arrow_same_station_two_voltages_is_transformer() {
        let p = parser(LineGrammar::Arrow).parse("Cardones 220->Cardones 110 I").unwrap();
        assert_eq!(p.kind, EquipmentKind::Transformer);
        assert_eq!(p.circuit, Some(1));
        assert_eq!(p.nominal_voltage(), Some(220.0));
    }

    #[test]
    fn roman_marker_needs_voltage_before_it() {
        assert_eq!(strip_circuit_marker("Tap V"), ("Tap V", None));
        assert_eq!(strip_circuit_marker("Kapatur 220 III"), ("Kapatur 220", Some(3)));
        assert_eq!(strip_circuit_marker("Kapatur 220 VII"), ("Kapatur 220", None));

        let p = parser(LineGrammar::Arrow).parse("Paposo 220->Taltal II").unwrap();
        assert_eq!(p.endpoint_b, ParsedEndpoint::new("Taltal II", None));
        assert_eq!(p.circuit, None);
    }

    #[test]
    fn arrow_needs_arrow() {
        assert!(parser(LineGrammar::Arrow).parse("Paposo 220 Taltal 220").is_none());
        assert!(parser(LineGrammar::Arrow).parse("->Taltal 220").is_none());
    }

    #[test]
    fn dash_kv_hyphen_and_en_dash() {
        for raw in ["PAPOSO - TAP TAL TAL 220KV C1", "PAPOSO – TAP TAL TAL 220KV C1"] {
            let p = parser(LineGrammar::DashKv).parse(raw).unwrap();
            assert_eq!(p.endpoint_a, ParsedEndpoint::new("PAPOSO", Some(220.0)));
            assert_eq!(p.endpoint_b, ParsedEndpoint::new("TAP TAL TAL", Some(220.0)));
            assert_eq!(p.circuit, Some(1));
        }
    }

    #[test]
    fn dash_kv_optional_circuit_and_case() {
        let p = parser(LineGrammar::DashKv)
            .parse("Tap Nirivilo - Tap Central San Javier 66kV")
            .unwrap();
        assert_eq!(p.endpoint_b.bus_label, "Tap Central San Javier");
        assert_eq!(p.endpoint_b.voltage_kv, Some(66.0));
        assert_eq!(p.circuit, None);
    }

    #[test]
    fn dash_kv_rejects_missing_unit() {
        assert!(parser(LineGrammar::DashKv).parse("PAPOSO - TAP TAL TAL 220").is_none());
    }

    #[test]
    fn dash_without_unit_uses_voltage_column() {
        let p = parser(LineGrammar::DashKv)
            .parse_with_voltage("CARDONES - MAITENCILLO C1", Some(220.0))
            .unwrap();
        assert_eq!(p.endpoint_a, ParsedEndpoint::new("CARDONES", Some(220.0)));
        assert_eq!(p.endpoint_b, ParsedEndpoint::new("MAITENCILLO", Some(220.0)));
        assert_eq!(p.circuit, Some(1));
        assert_eq!(p.kind, EquipmentKind::Line);

        // the name's own kV token wins over the column
        let p = parser(LineGrammar::DashKv)
            .parse_with_voltage("PAPOSO - TAP TAL TAL 220KV", Some(66.0))
            .unwrap();
        assert_eq!(p.endpoint_a.voltage_kv, Some(220.0));

        assert!(parser(LineGrammar::DashKv)
            .parse_with_voltage("CARDONES - MAITENCILLO C1", None)
            .is_none());
        assert!(parser(LineGrammar::Arrow)
            .parse_with_voltage("Paposo Taltal", Some(220.0))
            .is_none());
    }

    #[test]
    fn padded_transformer() {
        let p = parser(LineGrammar::Padded)
            .parse("A.JAHUEL______220->A.JAHUEL______154")
            .unwrap();
        assert_eq!(p.endpoint_a, ParsedEndpoint::new("A.JAHUEL", Some(220.0)));
        assert_eq!(p.endpoint_b, ParsedEndpoint::new("A.JAHUEL", Some(154.0)));
        assert_eq!(p.kind, EquipmentKind::Transformer);
    }

    #[test]
    fn padded_line_with_part_suffix() {
        let p = parser(LineGrammar::Padded)
            .parse("D.ALMAGRO1____220->CARRERA_PINTO_220_2de2")
            .unwrap();
        assert_eq!(p.endpoint_a.bus_label, "D.ALMAGRO1");
        assert_eq!(p.endpoint_b, ParsedEndpoint::new("CARRERA_PINTO", Some(220.0)));
        assert_eq!(p.circuit, Some(2));
        assert_eq!(p.kind, EquipmentKind::Line);
    }

    #[test]
    fn close_voltages_stay_a_line() {
        let a = ParsedEndpoint::new("Cardones", Some(220.0));
        let b = ParsedEndpoint::new("CARDONES", Some(223.0));
        assert_eq!(classify_kind(&a, &b, 5.0), EquipmentKind::Line);
    }

    #[test]
    fn endpoint_without_voltage() {
        assert_eq!(parse_endpoint("Kapatur"), ParsedEndpoint::new("Kapatur", None));
    }
}
