use crate::error::ErrorKind;
use crate::schema::MessagingEvent;

pub const QUOTE_VERB: &str = "@quote";
pub const INFO_VERB: &str = "@info";

/// One platform event reduced to who sent it and what they typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub sender_id: String,
    pub text: String,
}

impl InboundEvent {
    pub fn new(sender_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            text: text.into(),
        }
    }

    /// Picks the message text, falling back to the postback payload. Events
    /// carrying neither are unsupported.
    pub fn from_messaging(event: &MessagingEvent) -> Result<Self, ErrorKind> {
        let message_text = event
            .message
            .as_ref()
            .and_then(|m| m.text.as_deref())
            .filter(|text| !text.is_empty());
        let payload = event
            .postback
            .as_ref()
            .and_then(|p| p.payload.as_deref())
            .filter(|payload| !payload.is_empty());

        message_text
            .or(payload)
            .map(|text| Self::new(event.sender.id.clone(), text))
            .ok_or(ErrorKind::UnsupportedEvent)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quote(String),
    Info(String),
    Unknown { token: String, kind: ErrorKind },
}

impl Command {
    pub fn error_kind(&self) -> Option<&ErrorKind> {
        match self {
            Self::Unknown { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

/// Classifies the event text. Tokens are split on single spaces with no
/// quoting, so `"@quote  FB"` carries an empty symbol. The symbol keeps the
/// sender's casing.
pub fn route(event: &InboundEvent) -> Command {
    let tokens: Vec<&str> = event.text.split(' ').collect();

    if tokens.len() < 2 {
        return Command::Unknown {
            token: tokens.first().copied().unwrap_or_default().to_string(),
            kind: ErrorKind::InsufficientInput,
        };
    }

    let (verb, argument) = (tokens[0], tokens[1].to_string());
    match verb {
        QUOTE_VERB => Command::Quote(argument),
        INFO_VERB => Command::Info(argument),
        other => Command::Unknown {
            token: other.to_string(),
            kind: ErrorKind::UnknownCommand(other.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(text: &str) -> InboundEvent {
        InboundEvent::new("u1", text)
    }

    fn messaging(json: &str) -> MessagingEvent {
        serde_json::from_str(json).expect("event")
    }

    #[test]
    fn quote_verb_routes_with_symbol_as_typed() {
        assert_eq!(route(&text("@quote fb")), Command::Quote("fb".into()));
    }

    #[test]
    fn info_verb_routes_to_info() {
        assert_eq!(route(&text("@info TSLA extra words")), Command::Info("TSLA".into()));
    }

    #[test]
    fn single_token_is_insufficient_input() {
        let command = route(&text("@info"));
        assert_eq!(command.error_kind(), Some(&ErrorKind::InsufficientInput));
        assert_eq!(
            command,
            Command::Unknown {
                token: "@info".into(),
                kind: ErrorKind::InsufficientInput
            }
        );
    }

    #[test]
    fn unrecognised_verb_is_unknown_command() {
        let command = route(&text("@foo bar"));
        assert_eq!(
            command.error_kind(),
            Some(&ErrorKind::UnknownCommand("@foo".into()))
        );
    }

    #[test]
    fn verbs_are_case_sensitive() {
        assert!(matches!(route(&text("@QUOTE fb")), Command::Unknown { .. }));
    }

    #[test]
    fn double_space_yields_an_empty_symbol() {
        assert_eq!(route(&text("@quote  FB")), Command::Quote(String::new()));
    }

    #[test]
    fn message_text_takes_priority_over_postback() {
        let event = messaging(
            r#"{"sender":{"id":"7"},"message":{"text":"@quote FB"},"postback":{"payload":"@info FB"}}"#,
        );
        let inbound = InboundEvent::from_messaging(&event).expect("inbound");
        assert_eq!(inbound, InboundEvent::new("7", "@quote FB"));
    }

    #[test]
    fn postback_payload_is_used_without_message_text() {
        let event = messaging(r#"{"sender":{"id":"7"},"postback":{"payload":"@info FB"}}"#);
        let inbound = InboundEvent::from_messaging(&event).expect("inbound");
        assert_eq!(inbound.text, "@info FB");
    }

    #[test]
    fn attachment_only_message_is_unsupported() {
        let event = messaging(r#"{"sender":{"id":"7"},"message":{"mid":"m1"}}"#);
        assert_eq!(
            InboundEvent::from_messaging(&event),
            Err(ErrorKind::UnsupportedEvent)
        );
    }
}
