use std::{path::PathBuf, str::FromStr, time::Duration};

use teloxide::types::{ChatId, Recipient};
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("environment variable {0} is required")]
    Missing(&'static str),
    #[error("environment variable {name} has a bad value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Bot settings, read from environment variables on startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Where new reports get posted. `PUBLISH_CHAT_ID`, either a numeric chat ID or `@channel`.
    pub publish_destination: Recipient,
    /// `MIN_NO_TO_MARK_GONE`, how many "gone" votes remove a report.
    pub gone_threshold: u32,
    /// `GONE_LIFETIME_MINUTES`, how long a report lives if nobody votes it away.
    pub lifetime_minutes: u32,
    /// `YANDEX_API_KEY`. Addresses are not geocoded without it.
    pub yandex_api_key: Option<String>,
    /// `MAP_LINK`, link to a shared map with all the reports.
    pub map_link: Option<Url>,
    /// `DATA_FILE`, where reports are saved.
    pub data_file: PathBuf,
    /// `SWEEP_INTERVAL_SECONDS`, how often expired reports are cleaned up.
    pub sweep_interval: Duration,
}

impl Config {
    /// Read the config from the process environment.
    ///
    /// # Errors
    /// Errors if a required variable is missing or any is unparsable.
    pub fn from_env() -> Result<Config, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Config, ConfigError> {
        // Empty values count as unset, like a blank line in a `.env` file would.
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let publish_destination = parse_recipient(
            &get("PUBLISH_CHAT_ID").ok_or(ConfigError::Missing("PUBLISH_CHAT_ID"))?,
        );

        let gone_threshold: u32 = parse_or("MIN_NO_TO_MARK_GONE", get("MIN_NO_TO_MARK_GONE"), 3)?;
        if gone_threshold == 0 {
            return Err(ConfigError::Invalid {
                name: "MIN_NO_TO_MARK_GONE",
                value: gone_threshold.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let lifetime_minutes: u32 =
            parse_or("GONE_LIFETIME_MINUTES", get("GONE_LIFETIME_MINUTES"), 120)?;

        let map_link = match get("MAP_LINK") {
            Some(value) => match Url::parse(value.trim()) {
                Ok(url) => Some(url),
                Err(e) => {
                    return Err(ConfigError::Invalid {
                        name: "MAP_LINK",
                        reason: e.to_string(),
                        value,
                    })
                }
            },
            None => None,
        };

        let sweep_interval_seconds: u64 =
            parse_or("SWEEP_INTERVAL_SECONDS", get("SWEEP_INTERVAL_SECONDS"), 60)?;

        Ok(Config {
            publish_destination,
            gone_threshold,
            lifetime_minutes,
            yandex_api_key: get("YANDEX_API_KEY").map(|key| key.trim().to_string()),
            map_link,
            data_file: get("DATA_FILE").map_or_else(|| PathBuf::from("points.json"), PathBuf::from),
            sweep_interval: Duration::from_secs(sweep_interval_seconds.max(1)),
        })
    }
}

fn parse_or<T>(name: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(value) = value else {
        return Ok(default);
    };

    match value.trim().parse() {
        Ok(parsed) => Ok(parsed),
        Err(e) => Err(ConfigError::Invalid {
            name,
            reason: e.to_string(),
            value,
        }),
    }
}

/// A numeric chat ID, or a public channel's `@username`.
fn parse_recipient(value: &str) -> Recipient {
    let value = value.trim();
    match value.parse::<i64>() {
        Ok(id) => Recipient::Id(ChatId(id)),
        Err(_) if value.starts_with('@') => Recipient::ChannelUsername(value.to_string()),
        Err(_) => Recipient::ChannelUsername(format!("@{value}")),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[("PUBLISH_CHAT_ID", "-1001234567890")]).unwrap();
        assert_eq!(
            config.publish_destination,
            Recipient::Id(ChatId(-1001234567890))
        );
        assert_eq!(config.gone_threshold, 3);
        assert_eq!(config.lifetime_minutes, 120);
        assert_eq!(config.yandex_api_key, None);
        assert_eq!(config.map_link, None);
        assert_eq!(config.data_file, PathBuf::from("points.json"));
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
    }

    #[test]
    fn everything_set() {
        let config = config(&[
            ("PUBLISH_CHAT_ID", "@dps_reports"),
            ("MIN_NO_TO_MARK_GONE", "5"),
            ("GONE_LIFETIME_MINUTES", " 45 "),
            ("YANDEX_API_KEY", "abc"),
            ("MAP_LINK", "https://yandex.ru/maps/?um=constructor"),
            ("DATA_FILE", "/var/lib/dps/points.json"),
            ("SWEEP_INTERVAL_SECONDS", "300"),
        ])
        .unwrap();
        assert_eq!(
            config.publish_destination,
            Recipient::ChannelUsername("@dps_reports".to_string())
        );
        assert_eq!(config.gone_threshold, 5);
        assert_eq!(config.lifetime_minutes, 45);
        assert_eq!(config.yandex_api_key.as_deref(), Some("abc"));
        assert_eq!(
            config.map_link.unwrap().as_str(),
            "https://yandex.ru/maps/?um=constructor"
        );
        assert_eq!(config.data_file, PathBuf::from("/var/lib/dps/points.json"));
        assert_eq!(config.sweep_interval, Duration::from_secs(300));
    }

    #[test]
    fn channel_without_at() {
        let config = config(&[("PUBLISH_CHAT_ID", "dps_reports")]).unwrap();
        assert_eq!(
            config.publish_destination,
            Recipient::ChannelUsername("@dps_reports".to_string())
        );
    }

    #[test]
    fn blank_values_are_defaults() {
        let config = config(&[("PUBLISH_CHAT_ID", "1"), ("YANDEX_API_KEY", "  ")]).unwrap();
        assert_eq!(config.yandex_api_key, None);
    }

    #[test]
    fn bad_values() {
        assert!(matches!(
            config(&[]),
            Err(ConfigError::Missing("PUBLISH_CHAT_ID"))
        ));
        assert!(matches!(
            config(&[("PUBLISH_CHAT_ID", "1"), ("MIN_NO_TO_MARK_GONE", "three")]),
            Err(ConfigError::Invalid {
                name: "MIN_NO_TO_MARK_GONE",
                ..
            })
        ));
        assert!(matches!(
            config(&[("PUBLISH_CHAT_ID", "1"), ("MIN_NO_TO_MARK_GONE", "0")]),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            config(&[("PUBLISH_CHAT_ID", "1"), ("MAP_LINK", "not a link")]),
            Err(ConfigError::Invalid {
                name: "MAP_LINK",
                ..
            })
        ));
    }
}
