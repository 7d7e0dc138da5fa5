//! Minimal dotted/slice JSON path navigation for `response_path` and
//! `fields` (spec §6 source config schema): `jobs`, `data.results`, `[1:]`.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

fn segment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z0-9_]*)(\[(-?\d*)(:(-?\d*))?\])?$").expect("valid regex"))
}

/// Navigate `value` by a dotted path where each segment may carry an
/// optional `[index]` or `[start:end]` array accessor. Returns `None` if any
/// segment fails to resolve (missing key, non-array slice, out-of-range
/// index) rather than panicking — callers treat a miss as "field absent for
/// this job", not a scrape-ending error.
pub fn navigate(value: &Value, path: &str) -> Option<Value> {
    let path = path.trim();
    if path.is_empty() {
        return Some(value.clone());
    }

    let mut current = value.clone();
    for segment in path.split('.') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        current = apply_segment(&current, segment)?;
    }
    Some(current)
}

fn apply_segment(value: &Value, segment: &str) -> Option<Value> {
    let caps = segment_re().captures(segment)?;
    let name = caps.get(1).map(|m| m.as_str()).unwrap_or("");

    let mut current = if name.is_empty() {
        value.clone()
    } else {
        value.get(name)?.clone()
    };

    if let Some(bracket) = caps.get(2) {
        let _ = bracket;
        let has_colon = caps.get(4).is_some();
        let start_str = caps.get(3).map(|m| m.as_str()).unwrap_or("");
        let end_str = caps.get(5).map(|m| m.as_str()).unwrap_or("");
        let arr = current.as_array()?;

        if has_colon {
            let len = arr.len();
            let start = parse_index(start_str, 0, len);
            let end = parse_index(end_str, len, len);
            let (start, end) = (start.min(len), end.min(len));
            if start > end {
                return Some(Value::Array(Vec::new()));
            }
            current = Value::Array(arr[start..end].to_vec());
        } else {
            let idx: i64 = start_str.parse().ok()?;
            let idx = if idx < 0 { (arr.len() as i64 + idx).max(0) as usize } else { idx as usize };
            current = arr.get(idx)?.clone();
        }
    }

    Some(current)
}

fn parse_index(raw: &str, default: usize, len: usize) -> usize {
    if raw.is_empty() {
        return default;
    }
    match raw.parse::<i64>() {
        Ok(i) if i < 0 => (len as i64 + i).max(0) as usize,
        Ok(i) => i as usize,
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn navigates_simple_key() {
        let v = json!({"jobs": [1, 2, 3]});
        assert_eq!(navigate(&v, "jobs"), Some(json!([1, 2, 3])));
    }

    #[test]
    fn navigates_nested_key() {
        let v = json!({"data": {"results": [1, 2]}});
        assert_eq!(navigate(&v, "data.results"), Some(json!([1, 2])));
    }

    #[test]
    fn navigates_bare_slice() {
        let v = json!([1, 2, 3, 4]);
        assert_eq!(navigate(&v, "[1:]"), Some(json!([2, 3, 4])));
    }

    #[test]
    fn navigates_index() {
        let v = json!({"jobs": [10, 20, 30]});
        assert_eq!(navigate(&v, "jobs[1]"), Some(json!(20)));
    }

    #[test]
    fn missing_key_returns_none() {
        let v = json!({"jobs": []});
        assert_eq!(navigate(&v, "data.results"), None);
    }
}
