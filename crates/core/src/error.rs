use thiserror::Error;

/// Failure modes of the template renderer (spec §4.1).
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("variable '{missing_var}' not found in context (template: {template})")]
    MissingVariable {
        template: String,
        missing_var: String,
    },

    #[error("malformed template expression '{template}': {reason}")]
    Malformed { template: String, reason: String },
}
