//! Structured logging with JSON output and sensitive data redaction.

use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    prelude::*,
};

use crate::{TelemetryConfig, TelemetryError};

/// Install the global subscriber described by `config`.
pub(crate) fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    if config.json_logs {
        let json_layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_span_events(FmtSpan::CLOSE);

        subscriber
            .with(json_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    } else {
        let pretty_layer = fmt::layer()
            .with_ansi(true)
            .with_target(true)
            .with_span_events(FmtSpan::NONE);

        subscriber
            .with(pretty_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    }

    Ok(())
}

/// Redact sensitive fields from a JSON value.
///
/// A key matches when it contains any of `fields`, ignoring case.
#[must_use]
pub fn redact_sensitive(value: &serde_json::Value, fields: &[String]) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut result = serde_json::Map::new();
            for (key, val) in map {
                let key_lower = key.to_lowercase();
                if fields.iter().any(|f| key_lower.contains(&f.to_lowercase())) {
                    result.insert(
                        key.clone(),
                        serde_json::Value::String("[REDACTED]".to_string()),
                    );
                } else {
                    result.insert(key.clone(), redact_sensitive(val, fields));
                }
            }
            serde_json::Value::Object(result)
        }
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.iter().map(|v| redact_sensitive(v, fields)).collect())
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_redact_credentials() {
        let value = json!({
            "consumer_key": "ck",
            "consumer_secret": "cs",
            "access_token": "at",
            "stream_url": "https://stream.twitter.com/1.1/statuses/sample.json",
            "nested": {"access_token_secret": "ats", "track": "rust"}
        });

        let fields = TelemetryConfig::default().redact_fields;
        let redacted = redact_sensitive(&value, &fields);

        assert_eq!(redacted["consumer_key"], "[REDACTED]");
        assert_eq!(redacted["consumer_secret"], "[REDACTED]");
        assert_eq!(redacted["access_token"], "[REDACTED]");
        assert_eq!(redacted["nested"]["access_token_secret"], "[REDACTED]");
        assert_eq!(redacted["nested"]["track"], "rust");
        assert_eq!(
            redacted["stream_url"],
            "https://stream.twitter.com/1.1/statuses/sample.json"
        );
    }

    #[test]
    fn test_redact_case_insensitive_in_arrays() {
        let value = json!([{"Authorization": "OAuth x"}, {"id": 1}]);

        let redacted = redact_sensitive(&value, &["authorization".to_string()]);

        assert_eq!(redacted[0]["Authorization"], "[REDACTED]");
        assert_eq!(redacted[1]["id"], 1);
    }

    #[test]
    fn test_redact_leaves_scalars() {
        let value = json!("token");
        assert_eq!(redact_sensitive(&value, &["token".to_string()]), value);
    }
}
