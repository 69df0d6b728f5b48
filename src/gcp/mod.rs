//! GCP API plumbing
//!
//! Shared authentication and HTTP machinery the storage and messaging
//! backends are built on.
//!
//! # Module Structure
//!
//! - [`auth`] - token acquisition from a resolved configuration, with caching
//! - [`http`] - typed HTTP wrapper for REST API calls

pub mod auth;
pub mod http;
