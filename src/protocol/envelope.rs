use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inbound command envelope, parsed from a text WebSocket frame.
///
/// Binary frames are rejected by the connection loop before this type is
/// ever constructed (spec §6: binary → close 1003).
#[derive(Debug, Clone, Deserialize)]
pub struct ClientEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "correlationId", default)]
    pub correlation_id: Option<String>,
}

/// Outbound event envelope.
///
/// `correlationId` is echoed back verbatim when the event is a synchronous
/// acknowledgement or error for a specific inbound command (spec §7); it is
/// absent on broadcast-style events nobody explicitly asked for.
#[derive(Debug, Clone, Serialize)]
pub struct ServerEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(rename = "correlationId", skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl ServerEnvelope {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
            timestamp: Some(chrono::Utc::now().timestamp_millis()),
            correlation_id: None,
        }
    }

    pub fn with_correlation(mut self, correlation_id: Option<String>) -> Self {
        self.correlation_id = correlation_id;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_envelope() {
        let raw = r#"{"type":"PING"}"#;
        let env: ClientEnvelope = serde_json::from_str(raw).unwrap();
        assert_eq!(env.kind, "PING");
        assert!(env.correlation_id.is_none());
    }

    #[test]
    fn server_envelope_round_trips_correlation_id() {
        let env = ServerEnvelope::new("PONG", Value::Null).with_correlation(Some("abc".into()));
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["correlationId"], "abc");
    }
}
