//! Domain models for NoteAI.
//!
//! # Core Concepts
//!
//! - [`User`]: An account. Every other entity is owned, directly or through a note, by a user.
//! - [`Note`]: A titled markdown document with tags, free-form metadata and privacy flags.
//!   Every mutation bumps [`Note::version`] and leaves a [`NoteVersion`] snapshot behind.
//! - [`FileAttachment`]: A file stored alongside a note.
//! - [`SharedLink`]: A tokenized, optionally password-protected public link to a note.
//! - [`ChatSession`] / [`ChatMessage`]: Persisted assistant conversations.
//! - [`Activity`]: Append-only log of what a user did, feeding [`Analytics`].
//!
//! Request and response bodies for the AI endpoints live in [`ai`](self::ai).

mod activity;
pub mod ai;
mod chat;
mod file;
mod note;
mod share;
mod user;

pub use activity::*;
pub use chat::*;
pub use file::*;
pub use note::*;
pub use share::*;
pub use user::*;
