//! Narrative Graph: an interpreter for branching game narrative.
//!
//! Dialogues, choices and events reference each other by identifier and
//! are held by a [`crate::core::store::NarrativeStore`]. The host drives play
//! through a [`crate::core::session::NarrativeSession`], renders whatever lines
//! and options come back, and reports the player's selections. Presentation
//! (text, sound, cameras) stays with the host.

pub mod core;
pub mod schema;

pub use crate::core::error::NarrativeError;
pub use crate::core::markup::format;
