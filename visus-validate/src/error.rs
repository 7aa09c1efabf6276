use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Why a recording could not be scored. Callers record the trial as a
/// non-match and show the message.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("could not prepare the recording: {0}")]
    Encoding(String),
    #[error("speech service request failed: {message}")]
    Service {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
    #[error("speech service sent an unreadable response: {0}")]
    MalformedResponse(String),
}

impl ValidationError {
    pub fn service(message: impl Into<String>) -> Self {
        Self::Service {
            message: message.into(),
            source: None,
        }
    }

    pub fn service_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Service {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn is_encoding(&self) -> bool {
        matches!(self, Self::Encoding(_))
    }

    /// Participant-facing text, without the underlying source chain.
    pub fn message(&self) -> String {
        match self {
            Self::Encoding(detail) => format!("The recording could not be processed ({detail})."),
            Self::Service { message, .. } => format!("Speech recognition failed: {message}."),
            Self::MalformedResponse(_) => {
                "Speech recognition sent an answer that could not be read.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn message_hides_the_source_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "socket timed out");
        let err = ValidationError::service_with_source("request timed out", io);
        assert_eq!(err.message(), "Speech recognition failed: request timed out.");
        assert_eq!(err.source().map(|s| s.to_string()).as_deref(), Some("socket timed out"));
        assert!(!err.is_encoding());
        assert!(ValidationError::Encoding("x".into()).message().contains("(x)"));
    }
}
