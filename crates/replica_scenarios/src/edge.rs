//! Generated boundary inputs for edge-case scenarios.

use serde_json::{json, Value};

/// Length of the oversized string input.
pub const OVERSIZED_STRING_LEN: usize = 10_000;

/// Nesting depth of the deeply nested input.
pub const NESTING_DEPTH: usize = 32;

/// Returns the generated edge inputs: empty object, null values, oversized
/// string, special characters, deep nesting and numeric extremes.
#[must_use]
pub fn edge_case_inputs() -> Vec<Value> {
    vec![
        json!({}),
        json!({"value": null, "data": null, "items": [null]}),
        json!({"text": "x".repeat(OVERSIZED_STRING_LEN)}),
        json!({
            "text": "<script>alert('x')</script> ' \" \\ \n\t \u{0} ñ 中文 🚀",
            "path": "../../etc/passwd",
            "sql": "'; DROP TABLE users; --",
        }),
        nested(NESTING_DEPTH),
        json!({
            "maxInt": i64::MAX,
            "minInt": i64::MIN,
            "maxFloat": f64::MAX,
            "tinyFloat": f64::MIN_POSITIVE,
            "zero": 0,
            "negative": -1,
        }),
    ]
}

fn nested(depth: usize) -> Value {
    (0..depth).fold(json!({"leaf": true}), |inner, _| json!({"nested": inner}))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covers_every_category() {
        let inputs = edge_case_inputs();
        assert_eq!(inputs.len(), 6);
        assert_eq!(inputs[0], json!({}));
        assert_eq!(inputs[2]["text"].as_str().unwrap().len(), OVERSIZED_STRING_LEN);

        let mut depth = 0;
        let mut cursor = &inputs[4];
        while let Some(inner) = cursor.get("nested") {
            depth += 1;
            cursor = inner;
        }
        assert_eq!(depth, NESTING_DEPTH);
    }
}
