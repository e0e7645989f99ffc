//! Error taxonomy for the inference engine.
//!
//! Build-time problems (`Configuration`, unknown names inside rule
//! definitions) abort construction. Per-call problems (`UnknownVariable`,
//! `MissingInput`, `Domain`, `InvalidArgument`) are reported for the
//! offending record or call only.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FuzzyError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("unknown variable: {0}")]
    UnknownVariable(String),
    #[error("unknown label `{label}` for variable `{variable}`")]
    UnknownLabel { variable: String, label: String },
    #[error("missing input value for variable `{0}`")]
    MissingInput(String),
    #[error("value {value} is outside the universe of `{variable}`")]
    Domain { variable: String, value: f64 },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl FuzzyError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// True for errors caused by a single input record (skip it, keep the batch going).
    pub fn is_per_record(&self) -> bool {
        matches!(
            self,
            Self::UnknownVariable(_)
                | Self::MissingInput(_)
                | Self::Domain { .. }
                | Self::InvalidArgument(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, FuzzyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_record_classification() {
        assert!(FuzzyError::MissingInput("daylight".into()).is_per_record());
        assert!(FuzzyError::Domain {
            variable: "view_sky".into(),
            value: f64::NAN
        }
        .is_per_record());
        assert!(FuzzyError::InvalidArgument("n = 0".into()).is_per_record());
        assert!(!FuzzyError::config("duplicate variable").is_per_record());
    }

    #[test]
    fn messages_name_the_offender() {
        let e = FuzzyError::UnknownLabel {
            variable: "noise_lden".into(),
            label: "deafening".into(),
        };
        let s = e.to_string();
        assert!(s.contains("noise_lden") && s.contains("deafening"), "{s}");
    }
}
