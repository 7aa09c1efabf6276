pub mod timer;

pub use timer::{ManualTimer, SessionTimer, Timer};
