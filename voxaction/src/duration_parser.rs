use anyhow::{anyhow, Result};
use std::time::Duration;

/// Parse a human-readable delay such as "200ms", "1.5s", "5s" or a bare
/// number of milliseconds into a [`Duration`].
pub fn parse_duration(input: &str) -> Result<Duration> {
    let input = input.trim();

    if let Ok(ms) = input.parse::<u64>() {
        return Ok(Duration::from_millis(ms));
    }

    let (number_part, unit_part) = split_number_and_unit(input)?;
    let value: f64 = number_part
        .trim()
        .parse()
        .map_err(|_| anyhow!("Invalid number in duration: {}", number_part))?;
    if !value.is_finite() || value < 0.0 {
        return Err(anyhow!("Duration must be a non-negative number: {}", input));
    }

    let millis_per_unit = match unit_part.trim() {
        "ms" | "millis" | "milliseconds" | "millisecond" | "" => 1.0,
        "s" | "sec" | "secs" | "second" | "seconds" => 1000.0,
        "m" | "min" | "mins" | "minute" | "minutes" => 60_000.0,
        other => return Err(anyhow!("Unknown time unit: {}", other)),
    };

    Ok(Duration::from_micros((value * millis_per_unit * 1000.0).round() as u64))
}

/// Inverse of [`parse_duration`] for whole milliseconds and seconds.
pub fn format_duration(duration: Duration) -> String {
    let ms = duration.as_millis();
    if ms >= 1000 && ms % 1000 == 0 {
        format!("{}s", ms / 1000)
    } else {
        format!("{ms}ms")
    }
}

fn split_number_and_unit(input: &str) -> Result<(&str, &str)> {
    let split_pos = input
        .char_indices()
        .find(|(_, ch)| ch.is_alphabetic())
        .map(|(i, _)| i)
        .unwrap_or(input.len());

    let number_part = &input[..split_pos];
    let unit_part = &input[split_pos..];

    if number_part.trim().is_empty() {
        return Err(anyhow!("No numeric value in duration: {}", input));
    }

    Ok((number_part, unit_part))
}

/// `#[serde(with = "duration_parser::human")]` for config fields: accepts
/// "200ms"-style strings or a bare millisecond count.
pub mod human {
    use serde::de::{self, Deserializer, Visitor};
    use serde::Serializer;
    use std::fmt;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_duration(*duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        struct HumanDuration;

        impl<'de> Visitor<'de> for HumanDuration {
            type Value = Duration;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a duration such as \"200ms\" or a number of milliseconds")
            }

            fn visit_u64<E: de::Error>(self, ms: u64) -> Result<Duration, E> {
                Ok(Duration::from_millis(ms))
            }

            fn visit_i64<E: de::Error>(self, ms: i64) -> Result<Duration, E> {
                u64::try_from(ms)
                    .map(Duration::from_millis)
                    .map_err(|_| E::custom("duration must not be negative"))
            }

            fn visit_str<E: de::Error>(self, s: &str) -> Result<Duration, E> {
                super::parse_duration(s).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(HumanDuration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_milliseconds() {
        assert_eq!(parse_duration("500").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("200ms").unwrap(), Duration::from_millis(200));
        assert_eq!(parse_duration(" 100 ms ").unwrap(), Duration::from_millis(100));
    }

    #[test]
    fn test_parse_duration_seconds() {
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_duration("0.8seconds").unwrap(), Duration::from_millis(800));
    }

    #[test]
    fn test_parse_duration_minutes() {
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
    }

    #[test]
    fn test_parse_duration_errors() {
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("10x").is_err());
        assert!(parse_duration("").is_err());
        assert!(parse_duration("-5ms").is_err());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(200)), "200ms");
        assert_eq!(format_duration(Duration::from_secs(5)), "5s");
        assert_eq!(format_duration(Duration::ZERO), "0ms");
    }
}
