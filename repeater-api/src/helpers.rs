/// `None` for empty strings, an owned copy otherwise.
pub fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_owned())
    }
}

/// Parses a talkgroup id, rejecting anything that isn't a positive integer.
/// Trailing junk drops the token instead of keeping its leading digits.
pub fn positive_talkgroup(s: &str) -> Option<i32> {
    s.trim().parse::<i32>().ok().filter(|tg| *tg > 0)
}
