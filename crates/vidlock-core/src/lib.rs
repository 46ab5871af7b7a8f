//! vidlock-core: shared types, IDs, errors, configuration and event contracts.
//!
//! This crate is the foundational dependency for all other vidlock-* crates,
//! providing validated identifiers, a unified error type, the wire contracts
//! for processing events, application configuration, and the per-run
//! [`Workspace`] that owns every transient file a run creates.

pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod workspace;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use events::{CompletedEvent, Locator, ProcessingEvent, ProgressEvent};
pub use ids::{SegmentId, VideoId};
pub use workspace::{TransientFile, Workspace};
