//! Validation flags and the opaque external validator interface.
//!
//! spec.md §9 treats the three validation flags as process-wide mutable
//! state but recommends modeling them as an immutable value injected at
//! construction instead of mutated through setters — that's `ValidationConfig`
//! here, passed explicitly to `validate_record` rather than read from a
//! global.

use crate::error::RecordError;
use crate::record::Record;

/// Oversized-record ceiling (bytes of canonical JSON). Implementation-chosen
/// per spec.md §4.1.
pub const MAX_RECORD_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ValidationConfig {
    pub disable_api_validation: bool,
    pub schema_url: String,
    pub strict: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        ValidationConfig {
            disable_api_validation: true,
            schema_url: String::new(),
            strict: false,
        }
    }
}

impl ValidationConfig {
    /// `disable_api_validation=false ∧ schema_url=""` is a fatal
    /// configuration error surfaced to the caller (spec.md §4.1, S3).
    pub fn check_fatal(&self) -> Result<(), RecordError> {
        if !self.disable_api_validation && self.schema_url.is_empty() {
            return Err(RecordError::FatalConfig {
                message: "validation.schema_url must be set when validation.disable_api is false"
                    .to_string(),
            });
        }
        Ok(())
    }
}

/// External schema-validation collaborator (spec.md §1 treats this as an
/// opaque interface out of core scope). Only consulted when API validation
/// is enabled.
pub trait ApiValidator: Send + Sync {
    fn validate(&self, schema_url: &str, record: &Record, strict: bool) -> Result<(bool, Vec<String>), RecordError>;
}

/// A validator that always reports success; used when no external
/// collaborator is wired up (e.g. `disable_api_validation = true`).
pub struct NoopValidator;

impl ApiValidator for NoopValidator {
    fn validate(&self, _schema_url: &str, _record: &Record, _strict: bool) -> Result<(bool, Vec<String>), RecordError> {
        Ok((true, Vec::new()))
    }
}

/// Validate a record against local invariants plus, if enabled, the external
/// API validator. Returns `(valid, errors)`; never fails except for the
/// fatal-configuration case (spec.md S3), which is surfaced as `Err`.
pub fn validate_record(
    record: &Record,
    config: &ValidationConfig,
    validator: &dyn ApiValidator,
) -> Result<(bool, Vec<String>), RecordError> {
    config.check_fatal()?;

    let mut errors = Vec::new();

    if record.is_empty() {
        errors.push("record has no payload".to_string());
        return Ok((false, errors));
    }

    let bytes = record.marshal_canonical()?;
    if bytes.len() > MAX_RECORD_BYTES {
        errors.push(format!(
            "record exceeds maximum size of {MAX_RECORD_BYTES} bytes ({} bytes)",
            bytes.len()
        ));
        return Ok((false, errors));
    }

    if config.disable_api_validation {
        return Ok((true, errors));
    }

    let (valid, api_errors) = validator.validate(&config.schema_url, record, config.strict)?;
    errors.extend(api_errors);
    Ok((valid && errors.is_empty(), errors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{OasfV0_7_0, Payload};

    fn valid_record() -> Record {
        Record::new(Payload::OasfV0_7_0(OasfV0_7_0 {
            name: "test-agent".into(),
            ..Default::default()
        }))
    }

    #[test]
    fn s3_validation_flag_gate_is_fatal() {
        let config = ValidationConfig {
            disable_api_validation: false,
            schema_url: String::new(),
            strict: false,
        };
        let err = validate_record(&valid_record(), &config, &NoopValidator).unwrap_err();
        assert!(matches!(err, RecordError::FatalConfig { .. }));
    }

    #[test]
    fn disabled_api_validation_passes_without_schema_url() {
        let config = ValidationConfig::default();
        let (valid, errors) = validate_record(&valid_record(), &config, &NoopValidator).unwrap();
        assert!(valid);
        assert!(errors.is_empty());
    }

    #[test]
    fn empty_record_is_invalid() {
        let config = ValidationConfig::default();
        let (valid, errors) = validate_record(&Record::empty(), &config, &NoopValidator).unwrap();
        assert!(!valid);
        assert!(!errors.is_empty());
    }
}
