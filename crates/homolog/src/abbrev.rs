//! Abbreviation table: fixed expansions applied by the normalizer.
//!
//! Keys are matched at letter boundaries and applied longest-first so a short
//! key never corrupts a longer one it is a prefix of (`S.` vs `STA.`).

use serde::{Deserialize, Serialize};

use crate::error::HomologError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbbreviationEntry {
    pub short: String,
    pub long: String,
}

impl AbbreviationEntry {
    pub fn new(short: impl Into<String>, long: impl Into<String>) -> Self {
        Self {
            short: short.into(),
            long: long.into(),
        }
    }
}

/// Confirmed, unambiguous expansions found across the three registries.
const BUILTIN: &[(&str, &str)] = &[
    ("D.ALMAGRO", "DIEGO DE ALMAGRO"),
    ("L.CHANGOS", "LOS CHANGOS"),
    ("A.JAHUEL", "ALTO JAHUEL"),
    ("C.NAVIA", "CERRO NAVIA"),
    ("P.AZUCAR", "PAN DE AZUCAR"),
    ("S. VICENTE", "SAN VICENTE"),
    ("STA.", "SANTA"),
    ("PTO.", "PUERTO"),
];

/// Immutable, ordered abbreviation lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AbbreviationTable {
    entries: Vec<AbbreviationEntry>,
}

impl AbbreviationTable {
    /// Build a table, uppercasing keys and expansions and ordering by
    /// descending key length (ties keep input order).
    ///
    /// Rejects empty keys, a key listed twice with different expansions, and
    /// any expansion that contains a key (normalizing would not be idempotent).
    pub fn new(entries: impl IntoIterator<Item = AbbreviationEntry>) -> Result<Self, HomologError> {
        let mut table: Vec<AbbreviationEntry> = Vec::new();

        for entry in entries {
            let short = clean(&entry.short);
            let long = clean(&entry.long);
            if short.is_empty() {
                return Err(HomologError::ConfigValidation(
                    "abbreviation with empty key".into(),
                ));
            }
            match table.iter().find(|e| e.short == short) {
                Some(existing) if existing.long == long => continue,
                Some(existing) => {
                    return Err(HomologError::ConfigValidation(format!(
                        "abbreviation '{short}' maps to both '{}' and '{long}'",
                        existing.long
                    )))
                }
                None => table.push(AbbreviationEntry { short, long }),
            }
        }

        table.sort_by(|a, b| b.short.chars().count().cmp(&a.short.chars().count()));

        for entry in &table {
            let sanitized = entry.long.replace(['_', '.', '-', '–'], " ");
            if let Some(key) = table
                .iter()
                .find(|k| find_at_boundary(&sanitized, &k.short, 0).is_some())
            {
                return Err(HomologError::ConfigValidation(format!(
                    "expansion '{}' of '{}' contains abbreviation '{}'",
                    entry.long, entry.short, key.short
                )));
            }
        }

        Ok(Self { entries: table })
    }

    pub fn builtin() -> Self {
        let entries = BUILTIN.iter().map(|(s, l)| AbbreviationEntry::new(*s, *l));
        // The builtin list is checked by `builtin_table_is_valid`.
        Self::new(entries).unwrap_or_default()
    }

    /// Add the dot-less and space-less spelling of every key
    /// (`D. ALMAGRO` -> `D ALMAGRO`, `D.ALMAGRO`). Variants shorter than three
    /// characters or that would clash with the table are skipped.
    pub fn with_variants(self) -> Self {
        let mut entries = self.entries.clone();
        for entry in &self.entries {
            let dotless = entry.short.replace('.', " ");
            let dotless = dotless.split_whitespace().collect::<Vec<_>>().join(" ");
            let spaceless = entry.short.replace(' ', "");
            for variant in [dotless, spaceless] {
                if variant.chars().count() < 3 || entries.iter().any(|e| e.short == variant) {
                    continue;
                }
                entries.push(AbbreviationEntry::new(variant, entry.long.clone()));
            }
        }

        match Self::new(entries) {
            Ok(table) => table,
            Err(e) => {
                log::warn!("abbreviation variants rejected ({e}); keeping base table");
                self
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AbbreviationEntry> {
        self.entries.iter()
    }

    /// Apply every expansion to an uppercase label, longest key first.
    pub fn expand(&self, upper: &str) -> String {
        let mut text = upper.to_string();
        for entry in &self.entries {
            text = replace_at_boundaries(&text, &entry.short, &entry.long);
        }
        text
    }
}

fn clean(s: &str) -> String {
    s.trim().to_uppercase()
}

/// Find `key` in `text` starting at byte `from`, only where the characters
/// around it are not letters (checked on sides where the key edge is a letter).
fn find_at_boundary(text: &str, key: &str, from: usize) -> Option<usize> {
    let first_is_letter = key.chars().next().is_some_and(char::is_alphabetic);
    let last_is_letter = key.chars().next_back().is_some_and(char::is_alphabetic);

    let mut start = from;
    while let Some(pos) = text[start..].find(key) {
        let at = start + pos;
        let end = at + key.len();
        let before_ok = !first_is_letter || !text[..at].chars().next_back().is_some_and(char::is_alphabetic);
        let after_ok = !last_is_letter || !text[end..].chars().next().is_some_and(char::is_alphabetic);
        if before_ok && after_ok {
            return Some(at);
        }
        start = at + key.chars().next().map_or(1, char::len_utf8);
    }
    None
}

fn replace_at_boundaries(text: &str, key: &str, expansion: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;

    while let Some(at) = find_at_boundary(text, key, cursor) {
        out.push_str(&text[cursor..at]);
        if text[..at].chars().next_back().is_some_and(char::is_alphanumeric) {
            out.push(' ');
        }
        out.push_str(expansion);
        let end = at + key.len();
        if text[end..].chars().next().is_some_and(char::is_alphabetic) {
            out.push(' ');
        }
        cursor = end;
    }

    out.push_str(&text[cursor..]);
    out
}
