//! Heuristic check that decoded text looks like a real message.
//!
//! A wrong passphrase frequently makes the decoder "succeed" and emit noise.
//! This filter does not prove anything cryptographically; it only rejects
//! output that is clearly not human text.

/// Minimum share of printable characters for text to be plausible.
pub const MIN_PRINTABLE_RATIO: f64 = 0.7;

/// Maximum number of U+FFFD replacement characters tolerated.
pub const MAX_REPLACEMENT_CHARS: usize = 3;

/// Verdict of [`assess`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Plausibility {
    Plausible,
    Rejected {
        printable_ratio: f64,
        replacements: usize,
    },
}

impl Plausibility {
    pub fn is_plausible(&self) -> bool {
        matches!(self, Self::Plausible)
    }
}

/// Assess decoded text.
///
/// Printable means ASCII `0x20..=0x7E` plus `\n`, `\r` and `\t`. The ratio
/// is computed over characters, not bytes. Empty text is rejected.
pub fn assess(text: &str) -> Plausibility {
    let mut total = 0usize;
    let mut printable = 0usize;
    let mut replacements = 0usize;

    for c in text.chars() {
        total += 1;
        if matches!(c, ' '..='~' | '\n' | '\r' | '\t') {
            printable += 1;
        }
        if c == char::REPLACEMENT_CHARACTER {
            replacements += 1;
        }
    }

    let printable_ratio = if total == 0 {
        0.0
    } else {
        printable as f64 / total as f64
    };

    if printable_ratio < MIN_PRINTABLE_RATIO || replacements > MAX_REPLACEMENT_CHARS {
        Plausibility::Rejected {
            printable_ratio,
            replacements,
        }
    } else {
        Plausibility::Plausible
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn plain_text_is_plausible() {
        assert!(assess("meet me at the docks\r\n\tat noon").is_plausible());
    }

    #[test]
    fn empty_text_is_rejected() {
        assert_matches!(assess(""), Plausibility::Rejected { .. });
    }

    #[test]
    fn low_printable_ratio_is_rejected() {
        // 6 printable out of 10 characters.
        let text = "abcdef\u{1}\u{2}\u{3}\u{4}";
        assert_matches!(
            assess(text),
            Plausibility::Rejected { printable_ratio, .. } if (printable_ratio - 0.6).abs() < 1e-9
        );
    }

    #[test]
    fn exactly_seventy_percent_passes() {
        let text = "abcdefg\u{1}\u{2}\u{3}";
        assert!(assess(text).is_plausible());
    }

    #[test]
    fn ratio_counts_characters_not_bytes() {
        // 8 printable + 2 multi-byte letters: 80% by chars, lower by bytes.
        let text = "abcdefghéé";
        assert!(assess(text).is_plausible());
    }

    #[test]
    fn too_many_replacement_characters_are_rejected() {
        let mut text = "a".repeat(100);
        text.push_str(&"\u{FFFD}".repeat(4));
        assert_matches!(
            assess(&text),
            Plausibility::Rejected { replacements: 4, .. }
        );

        let mut ok = "a".repeat(100);
        ok.push_str(&"\u{FFFD}".repeat(3));
        assert!(assess(&ok).is_plausible());
    }
}
