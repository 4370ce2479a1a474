//! Passthrough options for the editing tool.

use schemars::JsonSchema;
use serde::{de, Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Maximum length of a single option value.
pub const MAX_OPTION_LENGTH: usize = 64;

/// Option validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionsError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} exceeds maximum length of {} characters", MAX_OPTION_LENGTH)]
    TooLong { field: &'static str },

    #[error("{field} must not start with '-'")]
    LooksLikeFlag { field: &'static str },

    #[error("{field} contains invalid character '{ch}'")]
    InvalidCharacter { field: &'static str, ch: char },

    #[error("threshold must be a finite, non-negative number")]
    InvalidThreshold,
}

/// Options forwarded to the editing tool.
///
/// - `margin` becomes `--margin <margin>` (e.g. `0.2sec` or `0.3s,1.5s`)
/// - `edit_mode` becomes `--edit <mode>`, or `--edit <mode>:threshold=<t>`
///   when a threshold is given
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EditOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit_mode: Option<String>,

    /// Accepts a number or a numeric string; a blank string means unset.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "blank_or_number"
    )]
    #[schemars(with = "Option<f64>")]
    pub threshold: Option<f64>,
}

impl EditOptions {
    /// Check that every value is safe to pass as a single argv entry.
    pub fn validate(&self) -> Result<(), OptionsError> {
        if let Some(margin) = &self.margin {
            validate_value("margin", margin)?;
        }
        if let Some(mode) = &self.edit_mode {
            validate_value("edit_mode", mode)?;
        }
        if let Some(threshold) = self.threshold {
            if !threshold.is_finite() || threshold < 0.0 {
                return Err(OptionsError::InvalidThreshold);
            }
        }
        Ok(())
    }

    /// Value for the `--edit` flag, if any.
    ///
    /// A threshold without an edit mode is ignored. Whole-number thresholds
    /// keep their decimal point (`1.0`, not `1`).
    pub fn edit_arg(&self) -> Option<String> {
        let mode = self.edit_mode.as_deref()?;
        match self.threshold {
            Some(threshold) => Some(format!("{}:threshold={:?}", mode, threshold)),
            None => Some(mode.to_string()),
        }
    }

    /// Drop blank strings so `?margin=` behaves like an absent option.
    pub fn normalized(mut self) -> Self {
        self.margin = self.margin.filter(|m| !m.trim().is_empty());
        self.edit_mode = self.edit_mode.filter(|m| !m.trim().is_empty());
        self
    }
}

fn blank_or_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n)),
        Some(Raw::Text(text)) => {
            let text = text.trim();
            if text.is_empty() {
                return Ok(None);
            }
            text.parse()
                .map(Some)
                .map_err(|_| de::Error::custom(format!("invalid threshold '{}'", text)))
        }
    }
}

fn validate_value(field: &'static str, value: &str) -> Result<(), OptionsError> {
    if value.is_empty() {
        return Err(OptionsError::Empty { field });
    }
    if value.len() > MAX_OPTION_LENGTH {
        return Err(OptionsError::TooLong { field });
    }
    if value.starts_with('-') {
        return Err(OptionsError::LooksLikeFlag { field });
    }
    if let Some(ch) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | ',' | ':' | '=' | '%' | '-' | '_')))
    {
        return Err(OptionsError::InvalidCharacter { field, ch });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_arg() {
        let opts = EditOptions {
            edit_mode: Some("audio".into()),
            ..Default::default()
        };
        assert_eq!(opts.edit_arg().as_deref(), Some("audio"));

        let opts = EditOptions {
            edit_mode: Some("motion".into()),
            threshold: Some(0.04),
            ..Default::default()
        };
        assert_eq!(opts.edit_arg().as_deref(), Some("motion:threshold=0.04"));

        let opts = EditOptions {
            edit_mode: Some("audio".into()),
            threshold: Some(1.0),
            ..Default::default()
        };
        assert_eq!(opts.edit_arg().as_deref(), Some("audio:threshold=1.0"));

        let opts = EditOptions {
            threshold: Some(0.04),
            ..Default::default()
        };
        assert_eq!(opts.edit_arg(), None);
    }

    #[test]
    fn test_valid_options() {
        let opts = EditOptions {
            margin: Some("0.3s,1.5s".into()),
            edit_mode: Some("audio".into()),
            threshold: Some(0.0),
        };
        assert!(opts.validate().is_ok());
        assert!(EditOptions::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_flag_injection() {
        let opts = EditOptions {
            margin: Some("--export".into()),
            ..Default::default()
        };
        assert_eq!(
            opts.validate(),
            Err(OptionsError::LooksLikeFlag { field: "margin" })
        );
    }

    #[test]
    fn test_rejects_bad_characters() {
        let opts = EditOptions {
            edit_mode: Some("audio; rm".into()),
            ..Default::default()
        };
        assert_eq!(
            opts.validate(),
            Err(OptionsError::InvalidCharacter {
                field: "edit_mode",
                ch: ';'
            })
        );

        let opts = EditOptions {
            margin: Some("1".repeat(MAX_OPTION_LENGTH + 1)),
            ..Default::default()
        };
        assert_eq!(opts.validate(), Err(OptionsError::TooLong { field: "margin" }));
    }

    #[test]
    fn test_rejects_bad_threshold() {
        for threshold in [f64::NAN, f64::INFINITY, -0.5] {
            let opts = EditOptions {
                edit_mode: Some("audio".into()),
                threshold: Some(threshold),
                ..Default::default()
            };
            assert_eq!(opts.validate(), Err(OptionsError::InvalidThreshold));
        }
    }

    #[test]
    fn test_threshold_accepts_numbers_and_strings() {
        let opts: EditOptions = serde_json::from_str(r#"{"threshold": 0.04}"#).unwrap();
        assert_eq!(opts.threshold, Some(0.04));

        let opts: EditOptions = serde_json::from_str(r#"{"threshold": 2}"#).unwrap();
        assert_eq!(opts.threshold, Some(2.0));

        let opts: EditOptions = serde_json::from_str(r#"{"threshold": " 0.5 "}"#).unwrap();
        assert_eq!(opts.threshold, Some(0.5));

        let opts: EditOptions = serde_json::from_str(r#"{"threshold": ""}"#).unwrap();
        assert_eq!(opts.threshold, None);

        let opts: EditOptions = serde_json::from_str(r#"{"threshold": null}"#).unwrap();
        assert_eq!(opts.threshold, None);

        assert!(serde_json::from_str::<EditOptions>(r#"{"threshold": "abc"}"#).is_err());
    }

    #[test]
    fn test_normalized_drops_blanks() {
        let opts = EditOptions {
            margin: Some("  ".into()),
            edit_mode: Some(String::new()),
            threshold: None,
        }
        .normalized();
        assert_eq!(opts, EditOptions::default());
    }
}
