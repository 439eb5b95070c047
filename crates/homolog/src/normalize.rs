//! Bus/station label normalization.
//!
//! `normalize` turns a raw label into the key used for comparison:
//! strip the voltage suffix, uppercase, expand abbreviations, turn
//! separators into spaces, collapse whitespace, lowercase.

use std::sync::OnceLock;

use regex::Regex;

use crate::abbrev::AbbreviationTable;

/// Passes needed for normalization to reach a fixed point; a validated table
/// settles in two.
const MAX_PASSES: usize = 4;

fn voltage_suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<base>.*?)[\s_.\-–]*(?P<kv>\d+)\s*$").expect("voltage suffix regex")
    })
}

/// Split a trailing 2–3 digit voltage run (with any separator padding in
/// front of it) off a label. Longer or shorter digit runs are part of the name.
///
/// `"D.ALMAGRO1____220"` -> `("D.ALMAGRO1", Some(220.0))`
pub fn split_voltage_suffix(label: &str) -> (&str, Option<f64>) {
    let Some(caps) = voltage_suffix_re().captures(label) else {
        return (label.trim_end(), None);
    };
    let (Some(base), Some(kv)) = (caps.name("base"), caps.name("kv")) else {
        return (label.trim_end(), None);
    };
    if !(2..=3).contains(&kv.as_str().len()) {
        return (label.trim_end(), None);
    }
    (base.as_str().trim_end(), kv.as_str().parse().ok())
}

/// Canonicalizes labels against a fixed abbreviation table.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    table: AbbreviationTable,
}

impl Normalizer {
    pub fn new(table: AbbreviationTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &AbbreviationTable {
        &self.table
    }

    /// Normalize a raw label. Runs to a fixed point so that
    /// `normalize(normalize(x)) == normalize(x)`.
    pub fn normalize(&self, raw: &str) -> String {
        let mut key = self.pass(raw);
        for _ in 1..MAX_PASSES {
            let next = self.pass(&key);
            if next == key {
                return key;
            }
            key = next;
        }
        log::debug!("normalization of '{raw}' did not settle after {MAX_PASSES} passes");
        key
    }

    fn pass(&self, raw: &str) -> String {
        let mut label = raw.trim();
        loop {
            match split_voltage_suffix(label) {
                (base, Some(_)) => label = base,
                (_, None) => break,
            }
        }

        let expanded = self.table.expand(&label.to_uppercase());
        let spaced = expanded.replace(['_', '.', '-', '–'], " ");

        spaced
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }
}
