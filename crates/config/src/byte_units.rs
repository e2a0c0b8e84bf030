// SPDX-License-Identifier: Apache-2.0

//! Support for byte units like "KB / KiB", "MB / MiB" in configuration
//! files, grounded on the teacher's `config::byte_units` module.

use byte_unit::Byte;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum Value {
    Number(u64),
    String(String),
}

/// Deserializes an optional byte size given either as a plain number (in
/// bytes) or as a string with units (e.g. `"1 KB"`, `"2 MiB"`).
pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let Some(value) = value else {
        return Ok(None);
    };

    let bytes = match value {
        Value::Number(value) => value,
        Value::String(text) => {
            let parsed: Byte = text.parse().map_err(DeError::custom)?;
            parsed.as_u64()
        }
    };

    Ok(Some(bytes))
}

#[cfg(test)]
mod tests {
    use super::deserialize;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Holder {
        #[serde(default, deserialize_with = "deserialize")]
        value: Option<u64>,
    }

    fn de_yaml(input: &str) -> Result<Holder, serde_yaml::Error> {
        serde_yaml::from_str::<Holder>(input)
    }

    #[test]
    fn parses_number_as_bytes() {
        let cfg = de_yaml("value: 1024").expect("should parse numeric bytes");
        assert_eq!(cfg.value, Some(1024));
    }

    #[test]
    fn parses_string_with_iec_units() {
        let cfg = de_yaml("value: '2 MiB'").expect("should parse 2 MiB");
        assert_eq!(cfg.value, Some(2 * 1024 * 1024));
    }

    #[test]
    fn missing_value_is_none() {
        let cfg = de_yaml("{}").expect("should parse with missing field as None");
        assert_eq!(cfg.value, None);
    }
}
