pub mod config;
pub mod error;
pub mod notice;
pub mod runner;
pub mod state;
pub mod trial;

pub use config::SessionConfig;
pub use error::{SessionError, StateError};
pub use notice::{NoticeKind, SessionNotice};
pub use runner::SessionHandle;
pub use state::{
    Deferred, SessionEffect, SessionInput, SessionSnapshot, SessionStage, SessionState,
    SessionStateMachine,
};
pub use trial::ActiveTrial;
