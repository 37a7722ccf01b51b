//! Call-target dataset validation.
//!
//! A batch (call campaign) is created from an uploaded dataset: one record per
//! number to call, with one field per agent variable. Two encodings are accepted
//! interchangeably:
//!
//! - **JSON array**: `[{"phone": "+1555...", "name": "Ann"}, ...]`. The field set
//!   is the key set of the first element.
//! - **Tabular**: comma separated text whose first line is the header.
//!
//! Validation only looks at the *shape* of the dataset: which fields exist and how
//! many records there are. Values are never inspected, and phone numbers are not
//! syntax-checked; the presence of a phone column is enough.
//!
//! The same function backs the advisory pre-check a client may run before upload
//! and the authoritative check the server runs when the batch is created. Only the
//! server-side result is binding.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Errors produced when a dataset does not fit the target agent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatasetError {
    /// Neither encoding yields a usable field set.
    #[error("invalid dataset format: {0}")]
    InvalidFormat(String),

    /// No field name contains "phone".
    #[error(
        "dataset must contain a phone number field such as \"phone\" or \"customer_phone\" (found: {})",
        .fields.join(", ")
    )]
    MissingPhoneField {
        /// The field set that was found.
        fields: Vec<String>,
    },

    /// Some variables required by the agent are not present as fields.
    #[error("dataset is missing required agent variables: {}", .missing.join(", "))]
    MissingVariables {
        /// Every absent variable, in the order the agent declares them.
        missing: Vec<String>,
    },
}

/// The encoding a dataset was recognized as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetFormat {
    /// A JSON array of objects.
    JsonArray,
    /// Comma separated text with a header line.
    Tabular,
}

impl fmt::Display for DatasetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::JsonArray => f.write_str("json"),
            Self::Tabular => f.write_str("csv"),
        }
    }
}

/// The shape of a parsed dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetSummary {
    /// Detected encoding.
    pub format: DatasetFormat,
    /// Field names, as found in the first record or header line.
    pub fields: Vec<String>,
    /// Number of records, excluding any header line.
    pub record_count: usize,
}

impl DatasetSummary {
    /// Returns `true` if any field name contains "phone", ignoring case.
    #[must_use]
    pub fn has_phone_field(&self) -> bool {
        self.fields
            .iter()
            .any(|field| field.to_lowercase().contains("phone"))
    }

    /// Returns the required names that are not present as fields.
    ///
    /// Order follows `required`; duplicates are reported once.
    #[must_use]
    pub fn missing_variables<S: AsRef<str>>(&self, required: &[S]) -> Vec<String> {
        let mut missing: Vec<String> = Vec::new();
        for name in required.iter().map(AsRef::as_ref) {
            if !self.fields.iter().any(|field| field == name)
                && !missing.iter().any(|seen| seen == name)
            {
                missing.push(name.to_string());
            }
        }
        missing
    }
}

/// Detect the encoding of `payload` and extract its field set and record count.
///
/// A payload that is valid JSON but not a non-empty array of objects is rejected
/// rather than reinterpreted as a header line.
///
/// # Errors
///
/// Returns [`DatasetError::InvalidFormat`] if no usable field set can be found.
pub fn inspect(payload: &str) -> Result<DatasetSummary, DatasetError> {
    match serde_json::from_str::<Value>(payload) {
        Ok(value) => inspect_json(value),
        Err(_) => inspect_tabular(payload),
    }
}

/// Validate `payload` against the variables an agent requires.
///
/// # Errors
///
/// - [`DatasetError::InvalidFormat`] if the payload is in neither encoding
/// - [`DatasetError::MissingPhoneField`] if no field looks like a phone number
/// - [`DatasetError::MissingVariables`] listing every absent required variable
pub fn validate<S: AsRef<str>>(
    payload: &str,
    required_variables: &[S],
) -> Result<DatasetSummary, DatasetError> {
    let summary = inspect(payload)?;

    if !summary.has_phone_field() {
        return Err(DatasetError::MissingPhoneField {
            fields: summary.fields,
        });
    }

    let missing = summary.missing_variables(required_variables);
    if !missing.is_empty() {
        return Err(DatasetError::MissingVariables { missing });
    }

    Ok(summary)
}

fn inspect_json(value: Value) -> Result<DatasetSummary, DatasetError> {
    let Value::Array(items) = value else {
        return Err(DatasetError::InvalidFormat(
            "JSON datasets must be a non-empty array of objects".to_string(),
        ));
    };

    let Some(Value::Object(first)) = items.first() else {
        return Err(DatasetError::InvalidFormat(
            "JSON datasets must be a non-empty array of objects".to_string(),
        ));
    };

    if !items.iter().all(Value::is_object) {
        return Err(DatasetError::InvalidFormat(
            "every element of a JSON dataset must be an object".to_string(),
        ));
    }

    Ok(DatasetSummary {
        format: DatasetFormat::JsonArray,
        fields: first.keys().cloned().collect(),
        record_count: items.len(),
    })
}

fn inspect_tabular(payload: &str) -> Result<DatasetSummary, DatasetError> {
    let text = payload.trim();
    if text.is_empty() {
        return Err(DatasetError::InvalidFormat("dataset is empty".to_string()));
    }

    let lines: Vec<&str> = text
        .split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .collect();

    let fields: Vec<String> = lines[0]
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();

    if fields.is_empty() {
        return Err(DatasetError::InvalidFormat(
            "header line has no column names".to_string(),
        ));
    }

    Ok(DatasetSummary {
        format: DatasetFormat::Tabular,
        fields,
        record_count: lines.len().saturating_sub(1),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    const NONE: &[&str] = &[];

    fn field_set(summary: &DatasetSummary) -> BTreeSet<&str> {
        summary.fields.iter().map(String::as_str).collect()
    }

    #[test]
    fn json_array_with_required_variable() {
        let summary = validate(r#"[{"phone":"+1","name":"A"}]"#, &["name"]).unwrap();
        assert_eq!(summary.format, DatasetFormat::JsonArray);
        assert_eq!(summary.record_count, 1);
    }

    #[test]
    fn json_array_without_required_variables() {
        let summary = validate(r#"[{"phone":"+1","name":"A"}]"#, NONE).unwrap();
        assert_eq!(summary.record_count, 1);
    }

    #[test]
    fn json_array_without_phone_field() {
        let err = validate(r#"[{"name":"A"}]"#, &["name"]).unwrap_err();
        assert!(matches!(err, DatasetError::MissingPhoneField { .. }));
    }

    #[test]
    fn tabular_matches_json_equivalent() {
        let tabular = validate("phone,name\n+1,A\n+2,B", NONE).unwrap();
        let json = validate(
            r#"[{"phone":"+1","name":"A"},{"phone":"+2","name":"B"}]"#,
            NONE,
        )
        .unwrap();

        assert_eq!(tabular.format, DatasetFormat::Tabular);
        assert_eq!(tabular.record_count, 2);
        assert_eq!(json.record_count, 2);
        assert_eq!(field_set(&tabular), field_set(&json));
        assert_eq!(field_set(&tabular), BTreeSet::from(["phone", "name"]));
    }

    #[test]
    fn tabular_trims_headers_and_carriage_returns() {
        let summary = validate(" phone , first name \r\n+1,Ann\r\n", &["first name"]).unwrap();
        assert_eq!(summary.fields, vec!["phone", "first name"]);
        assert_eq!(summary.record_count, 1);
    }

    #[test]
    fn tabular_header_only_has_zero_records() {
        let summary = validate("phone,name", NONE).unwrap();
        assert_eq!(summary.record_count, 0);
    }

    #[test]
    fn phone_match_is_case_insensitive_substring() {
        assert!(validate("Customer_Phone\n+1", NONE).is_ok());
        assert!(validate("MOBILE_PHONE_NUMBER\n+1", NONE).is_ok());
        assert!(matches!(
            validate("tel,name\n+1,A", NONE),
            Err(DatasetError::MissingPhoneField { .. })
        ));
    }

    #[test]
    fn every_missing_variable_is_reported() {
        let err = validate("phone,name\n+1,A", &["city", "name", "company", "city"]).unwrap_err();
        assert_eq!(
            err,
            DatasetError::MissingVariables {
                missing: vec!["city".to_string(), "company".to_string()],
            }
        );
        assert!(err.to_string().contains("city, company"));
    }

    #[test]
    fn variable_names_are_case_sensitive() {
        let err = validate("phone,Name\n+1,A", &["name"]).unwrap_err();
        assert!(matches!(err, DatasetError::MissingVariables { .. }));
    }

    #[test]
    fn empty_payload_is_invalid() {
        assert!(matches!(
            validate("   \n  ", NONE),
            Err(DatasetError::InvalidFormat(_))
        ));
    }

    #[test]
    fn json_that_is_not_an_array_of_objects_is_invalid() {
        for payload in ["[]", "{\"phone\":\"+1\"}", "[1,2]", "[{\"phone\":\"+1\"}, 3]", "42"] {
            assert!(
                matches!(validate(payload, NONE), Err(DatasetError::InvalidFormat(_))),
                "payload {payload:?} should be rejected"
            );
        }
    }

    #[test]
    fn header_without_names_is_invalid() {
        assert!(matches!(
            validate(" , ,\n1,2", NONE),
            Err(DatasetError::InvalidFormat(_))
        ));
    }

    #[test]
    fn values_are_not_inspected() {
        let summary = validate(r#"[{"phone": null, "name": 5}, {"other": true}]"#, &["name"]).unwrap();
        assert_eq!(summary.record_count, 2);
    }
}
