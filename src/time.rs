use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::error::{NetreelError, NetreelResult};

/// Declared encoding of time values in a GEXF document.
///
/// The two date formats are normalized to epoch milliseconds; the numeric
/// formats keep their raw value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimeFormat {
    Date,
    DateTime,
    Integer,
    Double,
}

impl TimeFormat {
    /// Parse the `timeformat` attribute. An absent or empty value means
    /// `integer`.
    pub fn from_gexf(raw: &str) -> NetreelResult<Self> {
        match raw {
            "" | "integer" => Ok(Self::Integer),
            "date" => Ok(Self::Date),
            "dateTime" => Ok(Self::DateTime),
            "double" => Ok(Self::Double),
            other => Err(NetreelError::UnsupportedTimeFormat(other.to_string())),
        }
    }

    pub fn is_date_like(self) -> bool {
        matches!(self, Self::Date | Self::DateTime)
    }

    /// Normalize a textual time value to the internal scalar.
    pub fn parse(self, raw: &str) -> NetreelResult<f64> {
        match self {
            Self::Date => {
                let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .map_err(|e| NetreelError::schema(format!("bad date '{raw}': {e}")))?;
                Ok(date.and_time(NaiveTime::MIN).and_utc().timestamp_millis() as f64)
            }
            Self::DateTime => parse_date_time(raw),
            Self::Integer | Self::Double => raw
                .trim()
                .parse::<f64>()
                .map_err(|e| NetreelError::schema(format!("bad number '{raw}': {e}"))),
        }
    }

    /// Render an internal scalar back to the declared format, for logs and
    /// the slice JSON.
    pub fn format(self, value: f64) -> String {
        match self {
            Self::Date => DateTime::<Utc>::from_timestamp_millis(value as i64)
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| value.to_string()),
            Self::DateTime => DateTime::<Utc>::from_timestamp_millis(value as i64)
                .map(|d| d.to_rfc3339())
                .unwrap_or_else(|| value.to_string()),
            Self::Integer => format!("{}", value as i64),
            Self::Double => value.to_string(),
        }
    }
}

fn parse_date_time(raw: &str) -> NetreelResult<f64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.timestamp_millis() as f64);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Ok(dt.and_utc().timestamp_millis() as f64);
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN).and_utc().timestamp_millis() as f64);
    }
    Err(NetreelError::schema(format!("bad dateTime '{raw}'")))
}

/// How elements declare their lifetime: a single interval (possibly refined
/// by spells) or discrete timestamps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimeRepresentation {
    Interval,
    Timestamp,
}

impl TimeRepresentation {
    /// Parse the `timerepresentation` attribute. An absent or empty value
    /// means `interval`.
    pub fn from_gexf(raw: &str) -> NetreelResult<Self> {
        match raw {
            "" | "interval" => Ok(Self::Interval),
            "timestamp" => Ok(Self::Timestamp),
            other => Err(NetreelError::UnsupportedTimeRepresentation(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_format_defaults_to_integer() {
        assert_eq!(TimeFormat::from_gexf("").unwrap(), TimeFormat::Integer);
        assert!(TimeFormat::from_gexf("stardate").is_err());
    }

    #[test]
    fn date_roundtrips_through_millis() {
        let fmt = TimeFormat::Date;
        let t = fmt.parse("2009-03-01").unwrap();
        assert_eq!(fmt.format(t), "2009-03-01");
    }

    #[test]
    fn date_time_accepts_rfc3339_and_naive() {
        let fmt = TimeFormat::DateTime;
        let a = fmt.parse("2009-03-01T00:00:00+00:00").unwrap();
        let b = fmt.parse("2009-03-01T00:00:00").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn numeric_formats_parse_raw_scalars() {
        assert_eq!(TimeFormat::Integer.parse("42").unwrap(), 42.0);
        assert_eq!(TimeFormat::Double.parse("1.5").unwrap(), 1.5);
        assert!(TimeFormat::Integer.parse("x").is_err());
    }

    #[test]
    fn empty_representation_defaults_to_interval() {
        assert_eq!(
            TimeRepresentation::from_gexf("").unwrap(),
            TimeRepresentation::Interval
        );
        assert!(TimeRepresentation::from_gexf("spline").is_err());
    }
}
