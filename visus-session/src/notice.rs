/// Transient, toast-style message for the participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Failure,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionNotice {
    pub kind: NoticeKind,
    pub message: String,
}

impl SessionNotice {
    pub fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeKind::Success, message)
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(NoticeKind::Failure, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeKind::Error, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeKind::Info, message)
    }
}
