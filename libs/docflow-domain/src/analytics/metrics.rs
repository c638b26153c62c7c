//! Line, word and character metrics
//!
//! `Metrics` is a commutative monoid under addition with identity `(0, 0, 0)`.
//! Aggregators rely on that: the order in which segments arrive never changes
//! the final totals.

use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Line, word and character counts for a block of text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Metrics {
    pub line_count: u64,
    pub word_count: u64,
    pub char_count: u64,
}

impl Metrics {
    /// Create metrics from explicit counts
    pub fn new(line_count: u64, word_count: u64, char_count: u64) -> Self {
        Self {
            line_count,
            word_count,
            char_count,
        }
    }

    /// The identity element, `(0, 0, 0)`
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::zero()
    }
}

impl Add for Metrics {
    type Output = Metrics;

    fn add(self, rhs: Metrics) -> Metrics {
        Metrics {
            line_count: self.line_count + rhs.line_count,
            word_count: self.word_count + rhs.word_count,
            char_count: self.char_count + rhs.char_count,
        }
    }
}

impl AddAssign for Metrics {
    fn add_assign(&mut self, rhs: Metrics) {
        *self = *self + rhs;
    }
}

impl Sum for Metrics {
    fn sum<I: Iterator<Item = Metrics>>(iter: I) -> Metrics {
        iter.fold(Metrics::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Metrics> for Metrics {
    fn sum<I: Iterator<Item = &'a Metrics>>(iter: I) -> Metrics {
        iter.copied().sum()
    }
}

/// Count lines, words and characters in `text`
///
/// Trailing line terminators are trimmed once from the whole text before
/// splitting on `\n`, so a single trailing newline does not add a phantom empty
/// line. Words are whitespace-delimited tokens. Characters are counted per line
/// without the terminator (a trailing `\r` belongs to the terminator); leading and
/// trailing spaces are counted.
///
/// ```rust
/// use docflow_domain::analytics::analyze_content;
///
/// let m = analyze_content("Line 1\nLine 2\nLine 3 with more words");
/// assert_eq!((m.line_count, m.word_count, m.char_count), (3, 9, 34));
/// ```
pub fn analyze_content(text: &str) -> Metrics {
    if text.is_empty() {
        return Metrics::zero();
    }

    let trimmed = text.trim_end_matches(['\n', '\r']);

    trimmed
        .split('\n')
        .map(|line| {
            let line = line.strip_suffix('\r').unwrap_or(line);
            Metrics {
                line_count: 1,
                word_count: line.split_whitespace().count() as u64,
                char_count: line.chars().count() as u64,
            }
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_is_zero() {
        assert_eq!(analyze_content(""), Metrics::zero());
    }

    #[test]
    fn test_trailing_newline_is_not_a_line() {
        assert_eq!(analyze_content("a b\ncc\n"), Metrics::new(2, 3, 5));
        assert_eq!(analyze_content("a b\ncc"), Metrics::new(2, 3, 5));
    }

    #[test]
    fn test_multiple_trailing_newlines_trimmed_once() {
        assert_eq!(analyze_content("one\n\n\n"), Metrics::new(1, 1, 3));
    }

    #[test]
    fn test_interior_blank_lines_count_as_lines() {
        assert_eq!(analyze_content("a\n\nb\n"), Metrics::new(3, 2, 2));
    }

    #[test]
    fn test_repeated_whitespace_collapses_for_words() {
        let m = analyze_content("  two   words  \n");
        assert_eq!(m.word_count, 2);
        // leading and trailing spaces on a line are characters
        assert_eq!(m.char_count, 15);
    }

    #[test]
    fn test_crlf_terminators_are_not_characters() {
        assert_eq!(analyze_content("ab\r\ncd\r\n"), Metrics::new(2, 2, 4));
    }

    #[test]
    fn test_characters_not_bytes() {
        let m = analyze_content("héllo wörld");
        assert_eq!(m.char_count, 11);
    }

    #[test]
    fn test_newline_only_input_is_one_empty_line() {
        assert_eq!(analyze_content("\n"), Metrics::new(1, 0, 0));
    }

    #[test]
    fn test_metrics_monoid() {
        let a = Metrics::new(1, 2, 3);
        let b = Metrics::new(4, 5, 6);
        let c = Metrics::new(7, 8, 9);

        assert_eq!(a + Metrics::zero(), a);
        assert_eq!(a + b, b + a);
        assert_eq!((a + b) + c, a + (b + c));

        let total: Metrics = [a, b, c].iter().sum();
        assert_eq!(total, Metrics::new(12, 15, 18));

        let mut acc = Metrics::zero();
        acc += a;
        acc += b;
        assert_eq!(acc, Metrics::new(5, 7, 9));
    }
}
