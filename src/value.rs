use std::cmp::Ordering;

use serde_json::Value as JsonValue;

/// Comparable view of a JSON value with type-aware ordering.
///
/// Ordering across types is Null < Boolean < number < DateTime < String,
/// so a descending sort always places nulls (and missing fields) last.
/// Strings that look like ISO-8601 dates compare as millisecond timestamps.
#[derive(Debug, Clone)]
pub enum IndexValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    DateTime(i64), // millis since epoch
    String(String),
}

impl Eq for IndexValue {}

impl PartialEq for IndexValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl PartialOrd for IndexValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexValue {
    fn cmp(&self, other: &Self) -> Ordering {
        use IndexValue::*;
        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Null, _) => Ordering::Less,
            (_, Null) => Ordering::Greater,

            (Boolean(a), Boolean(b)) => a.cmp(b),
            (Boolean(_), _) => Ordering::Less,
            (_, Boolean(_)) => Ordering::Greater,

            (Integer(a), Integer(b)) => a.cmp(b),
            (Integer(a), Float(b)) => (*a as f64).total_cmp(b),
            (Float(a), Integer(b)) => a.total_cmp(&(*b as f64)),
            (Float(a), Float(b)) => a.total_cmp(b),
            (Integer(_) | Float(_), _) => Ordering::Less,
            (_, Integer(_) | Float(_)) => Ordering::Greater,

            (DateTime(a), DateTime(b)) => a.cmp(b),
            (DateTime(_), _) => Ordering::Less,
            (_, DateTime(_)) => Ordering::Greater,

            (String(a), String(b)) => a.cmp(b),
        }
    }
}

impl IndexValue {
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => IndexValue::Null,
            JsonValue::Bool(b) => IndexValue::Boolean(*b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    IndexValue::Integer(i)
                } else if let Some(f) = n.as_f64() {
                    IndexValue::Float(f)
                } else {
                    IndexValue::Null
                }
            }
            JsonValue::String(s) => Self::parse_string(s),
            // Arrays/objects compare by their JSON text
            other => IndexValue::String(other.to_string()),
        }
    }

    pub fn parse_string(s: &str) -> Self {
        // Valid date strings start with YYYY-MM
        let b = s.as_bytes();
        if b.len() < 10
            || !b[0].is_ascii_digit()
            || !b[1].is_ascii_digit()
            || !b[2].is_ascii_digit()
            || !b[3].is_ascii_digit()
            || b[4] != b'-'
            || !b[5].is_ascii_digit()
            || !b[6].is_ascii_digit()
        {
            return IndexValue::String(s.to_string());
        }

        if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
            return IndexValue::DateTime(dt.timestamp_millis());
        }
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
            return IndexValue::DateTime(dt.and_utc().timestamp_millis());
        }
        if let Ok(d) = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            if let Some(dt) = d.and_hms_opt(0, 0, 0) {
                return IndexValue::DateTime(dt.and_utc().timestamp_millis());
            }
        }
        IndexValue::String(s.to_string())
    }
}
