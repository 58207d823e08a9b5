//! Interpreter behaviour over the schema types.

pub mod choice;
pub mod cursor;
pub mod error;
pub mod evaluator;
pub mod markup;
pub mod session;
pub mod store;
