//! CLI Exit Code Registry
//!
//! Single source of truth for `gridrecon` exit codes.
//! Exit codes are part of the shell contract: batch jobs branch on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 1       | Universal        | General error (unspecified)              |
//! | 2       | Universal        | CLI usage error (bad args, missing file) |
//! | 3-9     | homolog          | Homologation outcome and failure codes   |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed, every reference row matched with confidence.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Homolog (3-9)
// =============================================================================

/// Run completed but at least one matched row sits in the low tier
/// and needs manual review.
pub const EXIT_HOMOLOG_REVIEW: u8 = 3;

/// Run completed but at least one reference row found no candidate
/// in one of the registries. Takes precedence over `EXIT_HOMOLOG_REVIEW`.
pub const EXIT_HOMOLOG_UNMATCHED: u8 = 4;

/// Config file could not be parsed or failed validation.
pub const EXIT_HOMOLOG_INVALID_CONFIG: u8 = 5;

/// `--month` is not a valid `YYYY-MM` value.
pub const EXIT_HOMOLOG_INVALID_MONTH: u8 = 6;

/// Runtime failure: unreadable source, missing column, bad cell value,
/// output write error.
pub const EXIT_HOMOLOG_RUNTIME: u8 = 7;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn homolog_codes_are_distinct_and_in_range() {
        let codes = [
            EXIT_HOMOLOG_REVIEW,
            EXIT_HOMOLOG_UNMATCHED,
            EXIT_HOMOLOG_INVALID_CONFIG,
            EXIT_HOMOLOG_INVALID_MONTH,
            EXIT_HOMOLOG_RUNTIME,
        ];
        for (i, a) in codes.iter().enumerate() {
            assert!((3..=9).contains(a));
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert_ne!(EXIT_USAGE, EXIT_SUCCESS);
    }
}
