use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(String),

    #[error("{key} is not valid: {reason}")]
    Invalid { key: String, reason: String },
}
