
const PREFIX_DATA: &str = include_str!("prefixes.tbl");

lazy_static::lazy_static! {
    static ref PREFIX_DATA_PARSED: Vec<(&'static str, &'static str)> = {
        parse_prefix_data(PREFIX_DATA)
    };
}

fn parse_prefix_data(data: &'static str) -> Vec<(&'static str, &'static str)> {
    let mut vec = Vec::new();
    for line in data.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        for entry in line.split_whitespace() {
            match entry.split_once('=') {
                Some((prefix, country)) if !prefix.is_empty() && country.len() == 2 => {
                    vec.push((prefix, country))
                }
                _ => log::warn!("Skipping malformed prefix entry {:?}", entry),
            }
        }
    }
    vec
}

/// Stripped from both ends of a callsign. Other Unicode whitespace is kept.
const TRIMMED: &[char] = &[' ', '\t', '\n', '\r', '\0', '\x0B'];

/// Resolves the ISO-3166 alpha-2 country a callsign was issued by.
///
/// Prefixes are tested in the order they are listed and the first one the
/// callsign starts with wins, even if a longer prefix further down would
/// also match. Blank input never matches.
pub fn country_for_callsign(callsign: &str) -> Option<&'static str> {
    let call = callsign.trim_matches(TRIMMED).to_ascii_uppercase();
    if call.is_empty() {
        return None;
    }

    let country = PREFIX_DATA_PARSED
        .iter()
        .find(|(prefix, _)| call.starts_with(prefix))
        .map(|(_, country)| *country);

    log::trace!("Resolved {} to {:?}", call, country);
    country
}

/// Convenience for rows whose callsign column is nullable.
pub fn country_for(callsign: Option<&str>) -> Option<&'static str> {
    callsign.and_then(country_for_callsign)
}
