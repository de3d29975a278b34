//! Inbound request envelope and the typed payloads it carries.

use serde::{Deserialize, Serialize};

use super::error::GatewayError;

/// Credentials forwarded verbatim to the authentication service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthPayload {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// A log entry, sent either to the logger service or to the topic exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogPayload {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub data: String,
}

/// A message forwarded verbatim to the mail service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailPayload {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub message: String,
}

/// The inbound JSON body as received on the wire.
///
/// `action` selects which of the optional payloads is used; the others are
/// ignored even when present. A missing payload for the selected action is
/// treated as an empty one and left for the downstream service to reject.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestEnvelope {
    pub action: String,
    #[serde(default)]
    pub auth: Option<AuthPayload>,
    #[serde(default)]
    pub log: Option<LogPayload>,
    #[serde(default)]
    pub mail: Option<MailPayload>,
}

/// A decoded request: exactly one action with its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Auth(AuthPayload),
    Log(LogPayload),
    Mail(MailPayload),
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Auth(_) => "auth",
            Action::Log(_) => "log",
            Action::Mail(_) => "mail",
        }
    }
}

impl TryFrom<RequestEnvelope> for Action {
    type Error = GatewayError;

    fn try_from(envelope: RequestEnvelope) -> Result<Self, Self::Error> {
        match envelope.action.as_str() {
            "auth" => Ok(Action::Auth(envelope.auth.unwrap_or_default())),
            "log" => Ok(Action::Log(envelope.log.unwrap_or_default())),
            "mail" => Ok(Action::Mail(envelope.mail.unwrap_or_default())),
            _ => Err(GatewayError::UnknownAction(envelope.action)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(json: &str) -> RequestEnvelope {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_selects_payload_by_action() {
        let env = envelope(
            r#"{"action":"mail","mail":{"from":"me@x.com","to":"a@b.com","subject":"Hi","message":"Hello"},
                "log":{"name":"ignored","data":"ignored"}}"#,
        );

        match Action::try_from(env).unwrap() {
            Action::Mail(mail) => {
                assert_eq!(mail.to, "a@b.com");
                assert_eq!(mail.subject, "Hi");
            }
            other => panic!("Expected Mail action, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_payload_defaults_to_empty() {
        let action = Action::try_from(envelope(r#"{"action":"log"}"#)).unwrap();
        assert_eq!(action, Action::Log(LogPayload::default()));
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let err = Action::try_from(envelope(r#"{"action":"launch"}"#)).unwrap_err();
        assert!(matches!(err, GatewayError::UnknownAction(ref a) if a == "launch"));
    }

    #[test]
    fn test_action_tag_is_case_sensitive() {
        assert!(Action::try_from(envelope(r#"{"action":"AUTH"}"#)).is_err());
    }

    #[test]
    fn test_missing_action_fails_to_decode() {
        assert!(serde_json::from_str::<RequestEnvelope>(r#"{"auth":{}}"#).is_err());
    }
}
