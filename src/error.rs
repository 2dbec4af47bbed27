use thiserror::Error;

/// Failures scoped to a single inbound event. Each one becomes a text reply to
/// the sender; the `Display` output is the reason shown to the user.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[error("Unknown event")]
    UnsupportedEvent,
    #[error("insufficient input")]
    InsufficientInput,
    #[error("unknown command {0}.")]
    UnknownCommand(String),
    #[error("unknown symbol")]
    MissingArgument,
    /// The string is diagnostic detail for logs and never reaches the user.
    #[error("internal network error to query information")]
    UpstreamUnavailable(String),
}

/// Failure of one outbound call to the messaging platform.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SendError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("platform returned status {0}")]
    Status(u16),
    #[error("platform error: {0}")]
    Platform(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("expected {0} in env")]
    Missing(&'static str),
    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_detail_is_not_part_of_the_user_reason() {
        let err = ErrorKind::UpstreamUnavailable("status 500".into());
        assert_eq!(err.to_string(), "internal network error to query information");
    }

    #[test]
    fn unknown_command_names_the_verb() {
        let err = ErrorKind::UnknownCommand("@foo".into());
        assert_eq!(err.to_string(), "unknown command @foo.");
    }
}
