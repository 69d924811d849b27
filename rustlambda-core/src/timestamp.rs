//! Fixed date formats used by event payloads
//!
//! SNS and S3 send `2020-01-08T14:18:51.203Z`, CloudWatch sends
//! `1970-01-01T00:00:00Z`. Neither is parsed as general ISO 8601.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use crate::error::DecodeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampFormat {
    /// `yyyy-MM-dd'T'HH:mm:ss.SSSZ`
    Milliseconds,
    /// `yyyy-MM-dd'T'HH:mm:ssZ`
    Seconds,
}

impl TimestampFormat {
    /// The format as reported in decode errors
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Milliseconds => "yyyy-MM-dd'T'HH:mm:ss.SSSZ",
            Self::Seconds => "yyyy-MM-dd'T'HH:mm:ssZ",
        }
    }

    fn pattern(self) -> &'static str {
        match self {
            Self::Milliseconds => "%Y-%m-%dT%H:%M:%S%.3f",
            Self::Seconds => "%Y-%m-%dT%H:%M:%S",
        }
    }

    /// chrono treats `%.3f` as optional, so the fraction is checked here
    fn has_required_fraction(self, value: &str) -> bool {
        match self {
            Self::Milliseconds => value.get(19..23).is_some_and(|fraction| {
                fraction.starts_with('.') && fraction[1..].bytes().all(|b| b.is_ascii_digit())
            }),
            Self::Seconds => true,
        }
    }

    /// Parse a timestamp ending in `Z` or a `+HHMM` offset
    pub fn parse(self, value: &str) -> Result<DateTime<Utc>, DecodeError> {
        let invalid = || DecodeError::InvalidTimestamp {
            value: value.to_string(),
            format: self.as_str(),
        };
        if !self.has_required_fraction(value) {
            return Err(invalid());
        }

        let parsed = match value.strip_suffix('Z') {
            Some(local) => NaiveDateTime::parse_from_str(local, self.pattern())
                .map(|naive| Utc.from_utc_datetime(&naive)),
            None => DateTime::parse_from_str(value, &format!("{}%z", self.pattern()))
                .map(|dt| dt.with_timezone(&Utc)),
        };

        parsed.map_err(|_| invalid())
    }

    pub fn format(self, value: &DateTime<Utc>) -> String {
        format!("{}Z", value.format(self.pattern()))
    }
}

macro_rules! timestamp_serde {
    ($name:ident, $format:expr) => {
        /// Serde adapter for `#[serde(with = "...")]`
        pub mod $name {
            use chrono::{DateTime, Utc};
            use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

            pub fn serialize<S: Serializer>(
                value: &DateTime<Utc>,
                serializer: S,
            ) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&$format.format(value))
            }

            pub fn deserialize<'de, D: Deserializer<'de>>(
                deserializer: D,
            ) -> Result<DateTime<Utc>, D::Error> {
                let value = String::deserialize(deserializer)?;
                $format.parse(&value).map_err(D::Error::custom)
            }
        }
    };
}

timestamp_serde!(milliseconds, crate::timestamp::TimestampFormat::Milliseconds);
timestamp_serde!(seconds, crate::timestamp::TimestampFormat::Seconds);

/// Optional epoch seconds (possibly fractional), as in DynamoDB stream records
pub mod epoch_seconds_option {
    use chrono::{DateTime, TimeZone, Utc};
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            #[allow(clippy::cast_precision_loss)]
            Some(dt) => serializer.serialize_f64(dt.timestamp_millis() as f64 / 1000.0),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let Some(seconds) = Option::<f64>::deserialize(deserializer)? else {
            return Ok(None);
        };

        #[allow(clippy::cast_possible_truncation)]
        let millis = (seconds * 1000.0).round() as i64;
        Utc.timestamp_millis_opt(millis)
            .single()
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {seconds}")))
    }
}
