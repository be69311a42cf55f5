//! Core of the link guard bot: configuration, link detection, per-user link
//! counting and the moderation decisions built on top of them.
//!
//! This crate is framework-agnostic. The chat platform lives behind
//! [`moderation::port::ModerationPort`], implemented in adapter crates.

pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod links;
pub mod logging;
pub mod moderation;
pub mod tracker;

pub use errors::{Error, Result};
