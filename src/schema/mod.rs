//! Plain narrative data: dialogues, choices, events and player state.

pub mod choice;
pub mod dialogue;
pub mod event;
pub mod state;
