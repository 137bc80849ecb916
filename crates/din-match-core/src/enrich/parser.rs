//! Secondary-code response parsing.
//!
//! A lookup response carries a `matches` object mapping full codes to
//! detail objects:
//!
//! ```json
//! {"matches": {"3004-90-10": {"description": "Analgesics"}, "3004-90-99": {"description": "Other"}}}
//! ```
//!
//! Codes are reduced to their first two `-` segments and de-duplicated,
//! keeping the first description per prefix. The above yields `3004-90: Analgesics`.

use serde_json::Value;

use super::{LookupError, LookupResult};

/// Written when a lookup succeeds but carries no codes.
pub const NO_MATCHES_MARKER: &str = "no matches";

/// Inline marker for a failed lookup.
pub fn error_marker(error: &LookupError) -> String {
    format!("error: {}", error)
}

/// First two `-`-delimited segments of a code.
pub fn code_prefix(code: &str) -> &str {
    match code.match_indices('-').nth(1) {
        Some((second_dash, _)) => &code[..second_dash],
        None => code,
    }
}

/// Reduce a lookup response to newline-joined `prefix: description` pairs.
pub fn format_secondary_codes(response: &Value) -> LookupResult<String> {
    let object = response
        .as_object()
        .ok_or_else(|| LookupError::Malformed("response is not a JSON object".into()))?;

    let matches = match object.get("matches") {
        None | Some(Value::Null) => return Ok(NO_MATCHES_MARKER.to_string()),
        Some(Value::Object(matches)) => matches,
        Some(_) => return Err(LookupError::Malformed("`matches` is not an object".into())),
    };

    let mut seen: Vec<&str> = Vec::new();
    let mut lines: Vec<String> = Vec::new();
    for (code, detail) in matches {
        let prefix = code_prefix(code);
        if seen.contains(&prefix) {
            continue;
        }
        seen.push(prefix);
        let description = detail
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim();
        lines.push(format!("{}: {}", prefix, description));
    }

    if lines.is_empty() {
        Ok(NO_MATCHES_MARKER.to_string())
    } else {
        Ok(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_code_prefix() {
        assert_eq!(code_prefix("3004-90-10"), "3004-90");
        assert_eq!(code_prefix("3004-90"), "3004-90");
        assert_eq!(code_prefix("3004"), "3004");
        assert_eq!(code_prefix("a-b-c-d"), "a-b");
    }

    #[test]
    fn test_format_dedups_by_prefix_in_encounter_order() {
        let response = json!({
            "matches": {
                "3004-90-10": {"description": "Analgesics"},
                "2941-10-00": {"description": "Penicillins", "rate": 0},
                "3004-90-99": {"description": "Other medicaments"}
            }
        });

        assert_eq!(
            format_secondary_codes(&response).unwrap(),
            "3004-90: Analgesics\n2941-10: Penicillins"
        );
    }

    #[test]
    fn test_empty_or_missing_matches() {
        assert_eq!(
            format_secondary_codes(&json!({"matches": {}})).unwrap(),
            NO_MATCHES_MARKER
        );
        assert_eq!(format_secondary_codes(&json!({})).unwrap(), NO_MATCHES_MARKER);
        assert_eq!(
            format_secondary_codes(&json!({"matches": null})).unwrap(),
            NO_MATCHES_MARKER
        );
    }

    #[test]
    fn test_malformed_shapes() {
        assert!(matches!(
            format_secondary_codes(&json!([1, 2])),
            Err(LookupError::Malformed(_))
        ));
        assert!(matches!(
            format_secondary_codes(&json!({"matches": "none"})),
            Err(LookupError::Malformed(_))
        ));
    }

    #[test]
    fn test_missing_description() {
        let response = json!({"matches": {"1-2-3": {}}});
        assert_eq!(format_secondary_codes(&response).unwrap(), "1-2: ");
    }
}
