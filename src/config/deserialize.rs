// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Validates host and user names while reading YAML settings.

use serde::Deserialize;

use crate::types::{Hostname, Username};

pub fn deserialize_hostnames<'de, D>(deserializer: D) -> Result<Vec<Hostname>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Vec<String> = Vec::deserialize(deserializer)?;
    values
        .iter()
        .map(|value| Hostname::for_field(value, "allowed_hosts"))
        .collect::<Result<Vec<_>, _>>()
        .map_err(serde::de::Error::custom)
}

pub fn deserialize_optional_hostname<'de, D>(deserializer: D) -> Result<Option<Hostname>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => Hostname::for_field(raw, "default_host")
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

pub fn deserialize_optional_username<'de, D>(deserializer: D) -> Result<Option<Username>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => Username::for_field(raw, "default_user")
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
