//! Symbol alphabet used by every trimming stage.
//!
//! Nothing in the library reads global state: callers build a [`SymbolConfig`]
//! (usually the default) and pass it into each call.

/// Gap symbol written by the aligner.
pub const DEFAULT_GAP: u8 = b'-';

/// Symbol marking an unresolved base call.
pub const DEFAULT_AMBIGUITY: u8 = b'N';

/// Identifier of the record marking the target region.
pub const DEFAULT_PROBE_ID: &str = "probe";

/// IUPAC ambiguous DNA, upper case (includes the unambiguous bases).
pub const AMBIGUOUS_DNA: &[u8] = b"GATCRYWSMKHBVDN";

/// Symbols that drive trimming decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolConfig {
    /// Gap placeholder
    pub gap: u8,
    /// Ambiguity marker, matched case-insensitively
    pub ambiguity: u8,
    /// Identifier of the probe record
    pub probe_id: String,
}

impl Default for SymbolConfig {
    fn default() -> Self {
        Self {
            gap: DEFAULT_GAP,
            ambiguity: DEFAULT_AMBIGUITY,
            probe_id: DEFAULT_PROBE_ID.to_string(),
        }
    }
}

impl SymbolConfig {
    /// Returns true if `symbol` is the gap placeholder.
    pub fn is_gap(&self, symbol: u8) -> bool {
        symbol == self.gap
    }

    /// Returns true if `symbol` is the ambiguity marker (either case).
    pub fn is_ambiguous(&self, symbol: u8) -> bool {
        symbol.eq_ignore_ascii_case(&self.ambiguity)
    }

    /// Returns true if `symbol` belongs to gapped IUPAC DNA (either case).
    pub fn is_gapped_dna(&self, symbol: u8) -> bool {
        self.is_gap(symbol) || AMBIGUOUS_DNA.contains(&symbol.to_ascii_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ambiguity_is_case_insensitive() {
        let symbols = SymbolConfig::default();
        assert!(symbols.is_ambiguous(b'N'));
        assert!(symbols.is_ambiguous(b'n'));
        assert!(!symbols.is_ambiguous(b'A'));
    }

    #[test]
    fn test_gapped_dna_alphabet() {
        let symbols = SymbolConfig::default();
        for &b in b"ACGTRYKMSWBDHVNacgtn-" {
            assert!(symbols.is_gapped_dna(b), "{} should be accepted", b as char);
        }
        assert!(!symbols.is_gapped_dna(b'!'));
        assert!(!symbols.is_gapped_dna(b'X'));
    }
}
