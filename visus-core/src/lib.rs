pub mod history;
pub mod phase;
pub mod stimulus;
pub mod trial;

pub use history::{HistoryError, SessionHistory};
pub use phase::EyePhase;
pub use stimulus::{CatalogEntry, CatalogError, StimulusCatalog, StimulusItem};
pub use trial::{PHASE_NOT_COMPLETED_TEXT, PHASE_SKIPPED_TEXT, TrialRecord};
