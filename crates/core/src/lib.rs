//! Lavande Core - Shared domain types.
//!
//! This crate provides common types used across all Lavande components:
//! - `client` - Typed SDK for the storefront HTTP API
//! - `cli` - Terminal front-end for browsing, checkout, and order tracking
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no
//! storage access. This keeps it lightweight and allows it to be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, VND prices, emails,
//!   phone numbers, and order statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
