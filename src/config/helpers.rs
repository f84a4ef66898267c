use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

/// Custom deserializer for Duration from milliseconds
pub fn deserialize_duration_from_ms<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let ms = u64::deserialize(deserializer)?;
    Ok(Duration::from_millis(ms))
}

/// Custom deserializer for Duration from seconds
pub fn deserialize_duration_from_seconds<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = u64::deserialize(deserializer)?;
    Ok(Duration::from_secs(secs))
}

/// Custom serializer for Duration to milliseconds
pub fn serialize_duration_to_ms<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// Custom serializer for Duration to seconds
pub fn serialize_duration_to_seconds<S>(
    duration: &Duration,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(duration.as_secs())
}

#[cfg(test)]
mod tests {
    use serde::Serialize;

    use super::*;

    #[derive(Debug, Deserialize, Serialize, PartialEq)]
    struct CacheTtl {
        #[serde(
            deserialize_with = "deserialize_duration_from_ms",
            serialize_with = "serialize_duration_to_ms"
        )]
        ttl: Duration,
    }

    #[derive(Debug, Deserialize, Serialize, PartialEq)]
    struct Cooldown {
        #[serde(
            deserialize_with = "deserialize_duration_from_seconds",
            serialize_with = "serialize_duration_to_seconds"
        )]
        cooldown: Duration,
    }

    #[test]
    fn test_deserialize_duration_from_ms() {
        let actual: CacheTtl = serde_json::from_str(r#"{"ttl": 15000}"#).unwrap();
        assert_eq!(actual.ttl, Duration::from_secs(15));
    }

    #[test]
    fn test_serialize_duration_to_ms() {
        let data = CacheTtl { ttl: Duration::from_millis(60_000) };
        assert_eq!(serde_json::to_string(&data).unwrap(), r#"{"ttl":60000}"#);
    }

    #[test]
    fn test_deserialize_duration_from_seconds() {
        let actual: Cooldown = serde_json::from_str(r#"{"cooldown": 300}"#).unwrap();
        assert_eq!(actual.cooldown, Duration::from_secs(300));
    }

    #[test]
    fn test_deserialize_negative_duration_is_rejected() {
        let result: Result<Cooldown, _> = serde_json::from_str(r#"{"cooldown": -5}"#);
        assert!(result.is_err());
    }
}
