use thiserror::Error;

/// Problems with the configuration. Each one only skips the offending item.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("profile is missing its name attribute")]
    MissingName,

    #[error("{item} is missing its '{attribute}' attribute")]
    MissingAttribute {
        item: String,
        attribute: &'static str,
    },

    #[error("profile [{profile}] is malformed: {reason}")]
    Malformed { profile: String, reason: String },

    #[error("could not read configuration {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}
