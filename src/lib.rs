//! File tree mirror, share links and Google Drive gateway.
//!
//! The local node tree and share links live in SQLite; file content lives on
//! each user's linked Google Drive.

pub mod api;
pub mod config;
pub mod drive;
pub mod error;
pub mod store;
