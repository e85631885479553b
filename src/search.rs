use crate::translit;

/// Normalize a string for search indexing, querying and collation.
/// Applies lowercase and transliteration (e.g., "Иван" -> "ivan").
pub fn normalize(s: &str) -> String {
    translit::transliterate(s).to_lowercase()
}

pub fn normalize_query(query: &str) -> Option<String> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(normalize(trimmed))
    }
}

/// Substring pattern for `LIKE ... ESCAPE '\'`.
pub fn like_pattern(normalized: &str) -> String {
    let escaped = normalized
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}
