use chrono::{DateTime, Utc};

/// Case-insensitive substring match
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// True for empty or whitespace-only input
pub fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

/// Truncate a string to a maximum number of characters, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Format an optional timestamp for list display
pub fn format_timestamp(value: Option<&DateTime<Utc>>) -> String {
    match value {
        Some(dt) => dt.format("%b %d, %Y").to_string(),
        None => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_contains_ignore_case() {
        assert!(contains_ignore_case("Karimov", "KARIM"));
        assert!(!contains_ignore_case("Karimov", "rust"));
    }

    #[test]
    fn test_is_blank() {
        assert!(is_blank(""));
        assert!(is_blank(" \t\n"));
        assert!(!is_blank(" a "));
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("Hello World", 8), "Hello...");
        assert_eq!(truncate_string("Hi", 2), "Hi");
        assert_eq!(truncate_string("Ўзбекистон", 6), "Ўзб...");
    }

    #[test]
    fn test_format_timestamp() {
        let dt = Utc.with_ymd_and_hms(2024, 7, 1, 9, 30, 0).unwrap();
        assert_eq!(format_timestamp(Some(&dt)), "Jul 01, 2024");
        assert_eq!(format_timestamp(None), "-");
    }
}
