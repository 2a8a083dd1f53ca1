//! Back-office Core - Shared domain types.
//!
//! This crate provides the types used across the back-office workspace:
//! - `admin` - Order desk library (drafts, response cache, backend client)
//! - `integration-tests` - Cross-module scenarios
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no caches.
//! This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, money, phone numbers, and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
