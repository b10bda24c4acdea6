/// Serializes a `SystemTime` as fractional seconds since the unix epoch.
pub mod ts_seconds_float {
    use std::fmt;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use serde::{de, ser};

    pub fn deserialize<'de, D>(d: D) -> Result<SystemTime, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        d.deserialize_any(SecondsTimestampVisitor)
    }

    pub fn serialize<S>(st: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: ser::Serializer,
    {
        match st.duration_since(UNIX_EPOCH) {
            Ok(duration) if duration.subsec_nanos() == 0 => {
                serializer.serialize_u64(duration.as_secs())
            }
            Ok(duration) => serializer.serialize_f64(duration.as_secs_f64()),
            Err(_) => Err(ser::Error::custom(format!(
                "timestamp before the unix epoch: {st:?}"
            ))),
        }
    }

    struct SecondsTimestampVisitor;

    impl de::Visitor<'_> for SecondsTimestampVisitor {
        type Value = SystemTime;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            write!(formatter, "a unix timestamp in seconds")
        }

        fn visit_f64<E>(self, value: f64) -> Result<SystemTime, E>
        where
            E: de::Error,
        {
            if value.is_finite() && value >= 0.0 {
                Ok(UNIX_EPOCH + Duration::from_secs_f64(value))
            } else {
                Err(E::custom(format!("invalid timestamp: {value}")))
            }
        }

        fn visit_u64<E>(self, value: u64) -> Result<SystemTime, E>
        where
            E: de::Error,
        {
            Ok(UNIX_EPOCH + Duration::from_secs(value))
        }

        fn visit_i64<E>(self, value: i64) -> Result<SystemTime, E>
        where
            E: de::Error,
        {
            u64::try_from(value)
                .map(|secs| UNIX_EPOCH + Duration::from_secs(secs))
                .map_err(|_| E::custom(format!("invalid timestamp: {value}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Stamped {
        #[serde(with = "super::ts_seconds_float")]
        ts: SystemTime,
    }

    #[test]
    fn test_whole_seconds_serialize_as_integers() {
        let stamped = Stamped {
            ts: UNIX_EPOCH + Duration::from_secs(1_500_000_000),
        };
        let json = serde_json::to_string(&stamped).unwrap();
        assert_eq!(json, r#"{"ts":1500000000}"#);
    }

    #[test]
    fn test_fractional_seconds() {
        let stamped: Stamped = serde_json::from_str(r#"{"ts":1500000000.5}"#).unwrap();
        assert_eq!(
            stamped.ts,
            UNIX_EPOCH + Duration::from_millis(1_500_000_000_500)
        );
        assert!(serde_json::from_str::<Stamped>(r#"{"ts":-1}"#).is_err());
    }
}
