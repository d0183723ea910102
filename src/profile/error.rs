use thiserror::Error;

use crate::config::ConfigError;
use crate::source::SubscribeError;

/// Reasons a profile could not be brought up. The profile is torn down and
/// skipped; other profiles are unaffected.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("profile [{profile}] has no connections configured")]
    NoConnections { profile: String },

    #[error("profile [{profile}] already exists")]
    Duplicate { profile: String },

    #[error("profile [{profile}] could not start its publisher thread: {source}")]
    Spawn {
        profile: String,
        #[source]
        source: std::io::Error,
    },

    #[error("profile [{profile}] could not subscribe: {source}")]
    Subscribe {
        profile: String,
        #[source]
        source: SubscribeError,
    },
}
