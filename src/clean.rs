use serde_json::Value;

pub const MIN_YEAR: i32 = 1880;
pub const MAX_YEAR: i32 = 2025;

/// Normalize a raw `year` value into a plausible release year.
///
/// The value's text is reduced to its ASCII digits; the result is accepted
/// only if it parses and lies in `MIN_YEAR..=MAX_YEAR`. Strings are used
/// as-is, anything else through its JSON text, so `1999.0` reads as
/// `"19990"` and is rejected.
///
/// This is a lossy heuristic: `"19-99"` and `"1999è"` both become 1999,
/// and any string whose digits happen to land in range is accepted.
pub fn clean_year(raw: &Value) -> Option<i32> {
    match raw {
        Value::String(s) => clean_year_str(s),
        other => clean_year_str(&other.to_string()),
    }
}

pub fn clean_year_str(raw: &str) -> Option<i32> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    // Overlong digit runs fail to parse and are rejected like any other
    let year = digits.parse::<i32>().ok()?;
    (MIN_YEAR..=MAX_YEAR).contains(&year).then_some(year)
}
