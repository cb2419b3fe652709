use crate::error::{LinkError, Result};
use std::fmt;

/// Carrier frequency for the start-of-frame marker
pub const START_MARKER_HZ: f64 = 1500.0;

/// Carrier frequency for the end-of-frame marker
pub const STOP_MARKER_HZ: f64 = 1300.0;

/// Carrier frequency for a binary '1'
pub const FREQ_ONE_HZ: f64 = 1200.0;

/// Carrier frequency for a binary '0'
pub const FREQ_ZERO_HZ: f64 = 1000.0;

/// Default matching tolerance for the binary table (half the 100 Hz minimum spacing)
pub const BINARY_TOLERANCE_HZ: f64 = 50.0;

// Character-per-tone layout: 50 Hz steps per character, one block per character class.
// Digits start at 3600 Hz so they clear the top of the lowercase block (3550 Hz).
const UPPER_BASE_HZ: f64 = 1000.0;
const LOWER_BASE_HZ: f64 = 2300.0;
const DIGIT_BASE_HZ: f64 = 3600.0;
const CHAR_STEP_HZ: f64 = 50.0;

/// Carrier frequency of the message terminator in character mode
pub const TERMINATOR_HZ: f64 = 4100.0;

/// Default matching tolerance for the character table
pub const CHARACTER_TOLERANCE_HZ: f64 = 25.0;

/// An element of the link alphabet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    /// A payload character (character-per-tone mode)
    Char(char),
    /// End of a character-mode message
    Terminator,
    /// Start-of-frame marker (binary mode)
    Start,
    /// End-of-frame marker (binary mode)
    Stop,
    Zero,
    One,
}

impl Symbol {
    /// Map a payload character to its symbol; NUL is the terminator
    pub fn from_char(c: char) -> Self {
        if c == '\0' {
            Symbol::Terminator
        } else {
            Symbol::Char(c)
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Char(c) => write!(f, "'{}'", c),
            Symbol::Terminator => write!(f, "TERMINATOR"),
            Symbol::Start => write!(f, "START"),
            Symbol::Stop => write!(f, "STOP"),
            Symbol::Zero => write!(f, "'0'"),
            Symbol::One => write!(f, "'1'"),
        }
    }
}

/// Inclusive range of plausible carrier frequencies
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencyBand {
    pub low: f64,
    pub high: f64,
}

impl FrequencyBand {
    pub fn contains(&self, frequency: f64) -> bool {
        frequency >= self.low && frequency <= self.high
    }
}

/// Immutable bijective mapping between symbols and carrier frequencies
///
/// Construction checks that every frequency is distinct and at least
/// `2 * tolerance` away from every other one, so a measurement within
/// tolerance of an entry can never also match a neighbour.
#[derive(Debug, Clone)]
pub struct FrequencyTable {
    entries: Vec<(Symbol, f64)>,
    tolerance: f64,
}

impl FrequencyTable {
    pub fn new(entries: Vec<(Symbol, f64)>, tolerance: f64) -> Result<Self> {
        if !(tolerance.is_finite() && tolerance > 0.0) {
            return Err(LinkError::InvalidConfig(format!(
                "tolerance must be positive, got {}",
                tolerance
            )));
        }
        if entries.is_empty() {
            return Err(LinkError::InvalidConfig("frequency table is empty".into()));
        }

        for (i, (symbol, freq)) in entries.iter().enumerate() {
            if !(freq.is_finite() && *freq > 0.0) {
                return Err(LinkError::InvalidConfig(format!(
                    "{} has non-positive frequency {}",
                    symbol, freq
                )));
            }
            if entries[..i].iter().any(|(other, _)| other == symbol) {
                return Err(LinkError::InvalidConfig(format!(
                    "{} appears more than once",
                    symbol
                )));
            }
        }

        let mut sorted: Vec<&(Symbol, f64)> = entries.iter().collect();
        sorted.sort_by(|a, b| a.1.total_cmp(&b.1));
        for pair in sorted.windows(2) {
            let (lo_sym, lo) = pair[0];
            let (hi_sym, hi) = pair[1];
            if hi - lo < 2.0 * tolerance {
                return Err(LinkError::InvalidConfig(format!(
                    "{} ({} Hz) and {} ({} Hz) are closer than twice the {} Hz tolerance",
                    lo_sym, lo, hi_sym, hi, tolerance
                )));
            }
        }

        Ok(Self { entries, tolerance })
    }

    /// Marker and bit frequencies for framed binary transmission
    pub fn binary(tolerance: f64) -> Result<Self> {
        Self::new(
            vec![
                (Symbol::Start, START_MARKER_HZ),
                (Symbol::Stop, STOP_MARKER_HZ),
                (Symbol::One, FREQ_ONE_HZ),
                (Symbol::Zero, FREQ_ZERO_HZ),
            ],
            tolerance,
        )
    }

    /// One tone per letter or digit, plus the terminator
    pub fn character(tolerance: f64) -> Result<Self> {
        let mut entries = Vec::with_capacity(26 + 26 + 10 + 1);
        for (i, c) in ('A'..='Z').enumerate() {
            entries.push((Symbol::Char(c), UPPER_BASE_HZ + i as f64 * CHAR_STEP_HZ));
        }
        for (i, c) in ('a'..='z').enumerate() {
            entries.push((Symbol::Char(c), LOWER_BASE_HZ + i as f64 * CHAR_STEP_HZ));
        }
        for (i, c) in ('0'..='9').enumerate() {
            entries.push((Symbol::Char(c), DIGIT_BASE_HZ + i as f64 * CHAR_STEP_HZ));
        }
        entries.push((Symbol::Terminator, TERMINATOR_HZ));
        Self::new(entries, tolerance)
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn entries(&self) -> &[(Symbol, f64)] {
        &self.entries
    }

    /// Look up the carrier for a symbol; `None` if the symbol is not in this table
    pub fn symbol_to_frequency(&self, symbol: Symbol) -> Option<f64> {
        self.entries
            .iter()
            .find(|(s, _)| *s == symbol)
            .map(|(_, f)| *f)
    }

    /// First entry (in table order) whose frequency is within tolerance of `frequency`
    pub fn frequency_to_symbol(&self, frequency: f64) -> Option<Symbol> {
        self.entries
            .iter()
            .find(|(_, f)| (frequency - f).abs() <= self.tolerance)
            .map(|(s, _)| *s)
    }

    /// Plausible measurement band: lowest carrier minus `guard` up to highest plus `guard`
    pub fn band(&self, guard: f64) -> FrequencyBand {
        let low = self
            .entries
            .iter()
            .map(|(_, f)| *f)
            .fold(f64::INFINITY, f64::min);
        let high = self
            .entries
            .iter()
            .map(|(_, f)| *f)
            .fold(f64::NEG_INFINITY, f64::max);
        FrequencyBand {
            low: low - guard,
            high: high + guard,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_table_round_trip() {
        let table = FrequencyTable::binary(BINARY_TOLERANCE_HZ).unwrap();
        for &(symbol, _) in table.entries() {
            let freq = table.symbol_to_frequency(symbol).unwrap();
            assert_eq!(table.frequency_to_symbol(freq), Some(symbol));
        }
    }

    #[test]
    fn test_character_table_round_trip() {
        let table = FrequencyTable::character(CHARACTER_TOLERANCE_HZ).unwrap();
        assert_eq!(table.entries().len(), 63);
        for &(symbol, _) in table.entries() {
            let freq = table.symbol_to_frequency(symbol).unwrap();
            assert_eq!(table.frequency_to_symbol(freq), Some(symbol));
        }
    }

    #[test]
    fn test_character_table_layout() {
        let table = FrequencyTable::character(CHARACTER_TOLERANCE_HZ).unwrap();
        assert_eq!(table.symbol_to_frequency(Symbol::Char('A')), Some(1000.0));
        assert_eq!(table.symbol_to_frequency(Symbol::Char('z')), Some(3550.0));
        assert_eq!(table.symbol_to_frequency(Symbol::Char('0')), Some(3600.0));
        assert_eq!(table.symbol_to_frequency(Symbol::Terminator), Some(4100.0));
        assert_eq!(table.symbol_to_frequency(Symbol::Char('!')), None);
    }

    #[test]
    fn test_lookup_within_tolerance() {
        let table = FrequencyTable::binary(BINARY_TOLERANCE_HZ).unwrap();
        assert_eq!(table.frequency_to_symbol(1540.0), Some(Symbol::Start));
        assert_eq!(table.frequency_to_symbol(1160.0), Some(Symbol::One));
        assert_eq!(table.frequency_to_symbol(700.0), None);
        assert_eq!(table.frequency_to_symbol(1100.0), None);
    }

    #[test]
    fn test_tie_resolves_by_table_order() {
        // 1250 Hz sits exactly between STOP and '1'; STOP comes first in the table
        let table = FrequencyTable::binary(BINARY_TOLERANCE_HZ).unwrap();
        assert_eq!(table.frequency_to_symbol(1250.0), Some(Symbol::Stop));
    }

    #[test]
    fn test_rejects_insufficient_separation() {
        assert!(matches!(
            FrequencyTable::binary(60.0),
            Err(LinkError::InvalidConfig(_))
        ));
        assert!(matches!(
            FrequencyTable::character(30.0),
            Err(LinkError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_duplicate_symbol() {
        let result = FrequencyTable::new(
            vec![(Symbol::One, 1000.0), (Symbol::One, 2000.0)],
            10.0,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_bad_tolerance() {
        assert!(FrequencyTable::new(vec![(Symbol::One, 1000.0)], 0.0).is_err());
        assert!(FrequencyTable::new(vec![(Symbol::One, 1000.0)], f64::NAN).is_err());
    }

    #[test]
    fn test_band() {
        let table = FrequencyTable::binary(BINARY_TOLERANCE_HZ).unwrap();
        let band = table.band(100.0);
        assert_eq!(band.low, 900.0);
        assert_eq!(band.high, 1600.0);
        assert!(band.contains(900.0));
        assert!(!band.contains(1600.5));
    }
}
