//! Type definitions for the Widn API.
//!
//! Covers completion requests and responses, content events emitted to the
//! caller, and the static model catalog.

pub mod chat;
pub mod models;
