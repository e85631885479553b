//! Folding non-Latin text to ASCII so that `Иван` is found by `ivan` and
//! `Ångström` sorts next to `Angstrom`.

use deunicode::deunicode;

/// Transliterate a string to ASCII/Latin.
/// Uses deunicode for broad script coverage.
pub fn transliterate(s: &str) -> String {
    let result = deunicode(s);
    // collapse runs of whitespace left by dropped characters
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transliterate() {
        assert_eq!(transliterate("Иван Петров"), "Ivan Petrov");
        assert_eq!(transliterate("José García"), "Jose Garcia");
    }

    #[test]
    fn test_transliterate_collapses_whitespace() {
        assert_eq!(transliterate("  Jane \t Doe "), "Jane Doe");
        assert_eq!(transliterate(""), "");
    }
}
