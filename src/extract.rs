//! Turning free-form vision-model replies into query records.
//!
//! The vision model is asked two questions about a scanned drawing: one for the nameplate
//! attributes and one for the overall dimensions. Each reply is prose that should contain a JSON
//! object somewhere.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::record::{FieldValue, QueryRecord};

// -------------------------------------------------------------------------------------------------
// Error
// -------------------------------------------------------------------------------------------------
#[derive(Debug)]
pub enum Error {
    NoJson,
    InvalidJson(serde_json::Error),
    NothingRecognized,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NoJson => write!(f, "no JSON found in response"),
            Error::InvalidJson(e) => write!(f, "invalid JSON in response: {e}"),
            Error::NothingRecognized => write!(f, "no information recognized in either response"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::InvalidJson(e) => Some(e),
            _ => None,
        }
    }
}

// -------------------------------------------------------------------------------------------------
// JSON extraction
// -------------------------------------------------------------------------------------------------
lazy_static! {
    static ref FENCED_JSON: Regex =
        Regex::new(r"(?s)```json[ \t]*\r?\n(.*?)```").expect("fenced JSON regex should compile");
}

/// Find the first balanced `{...}` span, ignoring braces inside string literals.
fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Extract and parse the JSON embedded in a model reply.
///
/// A fenced ```` ```json ```` block takes precedence; otherwise the first balanced object is used.
pub fn extract_json(text: &str) -> Result<Value, Error> {
    let candidate = match FENCED_JSON.captures(text) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str()),
        None => balanced_object(text).ok_or(Error::NoJson)?,
    };
    serde_json::from_str(candidate.trim()).map_err(Error::InvalidJson)
}

// -------------------------------------------------------------------------------------------------
// ScannedRecord
// -------------------------------------------------------------------------------------------------
/// A query record assembled from the two vision-model replies.
#[derive(Clone, Debug, PartialEq)]
pub struct ScannedRecord {
    pub query: QueryRecord,

    /// Whether the attribute reply contributed
    pub has_spec: bool,

    /// Whether the dimension reply contributed
    pub has_dimensions: bool,
}

/// Interpret a scanned JSON value as a field value, dropping anything empty or non-scalar.
fn scalar(obj: Option<&Map<String, Value>>, key: &str) -> Option<FieldValue> {
    match obj?.get(key)? {
        Value::Number(n) => n.as_f64().map(FieldValue::Number),
        Value::String(s) if !s.trim().is_empty() => Some(FieldValue::Text(s.trim().to_string())),
        _ => None,
    }
}

impl ScannedRecord {
    /// Merge the attribute reply and the dimension reply.
    ///
    /// A reply that cannot be parsed, or that lacks the expected content, is skipped; only if
    /// both are skipped is this an error.
    pub fn from_responses(spec_text: Option<&str>, dimension_text: Option<&str>) -> Result<Self, Error> {
        let spec = spec_text
            .and_then(|t| {
                extract_json(t)
                    .map_err(|e| debug!("Skipping attribute response: {e}"))
                    .ok()
            })
            .and_then(|v| match v {
                Value::Object(m) if !m.is_empty() => Some(m),
                _ => None,
            });

        let dims = dimension_text
            .and_then(|t| {
                extract_json(t)
                    .map_err(|e| debug!("Skipping dimension response: {e}"))
                    .ok()
            })
            .and_then(|v| match v {
                Value::Object(m) if scalar(Some(&m), "長度").is_some() => Some(m),
                _ => None,
            });

        if spec.is_none() && dims.is_none() {
            return Err(Error::NothingRecognized);
        }

        let s = spec.as_ref();
        let d = dims.as_ref();
        let query = QueryRecord {
            length: scalar(d, "長度"),
            width: scalar(d, "寬度"),
            height: scalar(d, "高度"),
            static_pressure: scalar(s, "靜壓mmAq"),
            horsepower: scalar(s, "馬力HP"),
            airflow: scalar(s, "風量NCMM"),
            operating_temperature: scalar(s, "操作溫度°C"),
            purchase_quantity: Some(1.0.into()),
            impeller_diameter: scalar(s, "葉輪直徑mm"),
            series: scalar(s, "型號"),
            specification: scalar(s, "規格"),
            outlet_direction: Some("A".into()),
            casing_material: scalar(s, "機殼材質"),
            frame_material: scalar(s, "架台材質"),
            product_name: scalar(s, "產品名稱"),
            drive_method: scalar(s, "驅動方式"),
            fire_spark_level: scalar(s, "防火花級"),
            suction: Some("單吸".into()),
            fan_grade: scalar(s, "風機等級"),
        };

        Ok(ScannedRecord {
            query,
            has_spec: spec.is_some(),
            has_dimensions: dims.is_some(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn fenced_block_wins() {
        let text = "Here is {\"ignored\": true} and\n```json\n{\"長度\": \"2500\"}\n```\n";
        assert_eq!(extract_json(text).unwrap(), json!({"長度": "2500"}));
    }

    #[test]
    fn balanced_span_ignores_braces_in_strings() {
        let text = r#"Result: {"產品名稱": "風機 {特殊}", "note": "a \"}\" b"} and then {"x": 1}"#;
        assert_eq!(
            extract_json(text).unwrap(),
            json!({"產品名稱": "風機 {特殊}", "note": "a \"}\" b"})
        );
    }

    #[test]
    fn extraction_errors() {
        assert!(matches!(extract_json("no json here"), Err(Error::NoJson)));
        assert!(matches!(extract_json("{unbalanced"), Err(Error::NoJson)));
        assert!(matches!(extract_json("{'single': 1}"), Err(Error::InvalidJson(_))));
        assert!(matches!(extract_json("```json\nnot json\n```"), Err(Error::InvalidJson(_))));
    }

    #[test]
    fn merge_both_responses() {
        let spec = r#"```json
{"型號": "TFBD", "規格": "型五", "產品名稱": "透浦式風機", "馬力HP": 75, "風量NCMM": "", "機殼材質": "SS400"}
```"#;
        let dims = r#"The overall size is {"長度": "2500", "寬度": 1200, "高度": "1800"}"#;
        let r = ScannedRecord::from_responses(Some(spec), Some(dims)).unwrap();
        assert!(r.has_spec && r.has_dimensions);
        assert_eq!(
            r.query,
            QueryRecord {
                length: Some("2500".into()),
                width: Some(1200.0.into()),
                height: Some("1800".into()),
                horsepower: Some(75.0.into()),
                purchase_quantity: Some(1.0.into()),
                series: Some("TFBD".into()),
                specification: Some("型五".into()),
                outlet_direction: Some("A".into()),
                casing_material: Some("SS400".into()),
                product_name: Some("透浦式風機".into()),
                suction: Some("單吸".into()),
                ..Default::default()
            }
        );
    }

    #[test]
    fn dimension_response_needs_length() {
        let r = ScannedRecord::from_responses(Some(r#"{"規格": "型三"}"#), Some(r#"{"寬度": 900}"#))
            .unwrap();
        assert!(r.has_spec);
        assert!(!r.has_dimensions);
        assert_eq!(r.query.width, None);
    }

    #[test]
    fn nothing_recognized() {
        assert!(matches!(
            ScannedRecord::from_responses(Some("{}"), Some("sorry, I cannot read this")),
            Err(Error::NothingRecognized)
        ));
        assert!(matches!(
            ScannedRecord::from_responses(None, None),
            Err(Error::NothingRecognized)
        ));
    }
}
