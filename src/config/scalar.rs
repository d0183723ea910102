//! Lenient scalar decoding: numbers and flags are accepted as JSON values or
//! as strings.

use serde::de::Error;
use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum Integer {
    Number(i64),
    Text(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Number(i64),
    Text(String),
}

/// `100` or `"100"`. A string that is not an integer is an error.
pub(super) fn integer<'de, D: Deserializer<'de>>(de: D) -> Result<Option<i64>, D::Error> {
    match Option::<Integer>::deserialize(de)? {
        None => Ok(None),
        Some(Integer::Number(n)) => Ok(Some(n)),
        Some(Integer::Text(text)) => {
            let text = text.trim();
            if text.is_empty() {
                return Ok(None);
            }
            text.parse()
                .map(Some)
                .map_err(|_| D::Error::custom(format!("expected an integer, got \"{text}\"")))
        }
    }
}

/// `true`, a non-zero number, or one of the usual affirmative words.
pub(super) fn flag<'de, D: Deserializer<'de>>(de: D) -> Result<bool, D::Error> {
    Ok(match Option::<Flag>::deserialize(de)? {
        None => false,
        Some(Flag::Bool(b)) => b,
        Some(Flag::Number(n)) => n != 0,
        Some(Flag::Text(text)) => matches!(
            text.trim().to_ascii_lowercase().as_str(),
            "true" | "yes" | "on" | "enabled" | "active" | "allow" | "1"
        ),
    })
}
