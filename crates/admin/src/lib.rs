//! Back-office order desk library.
//!
//! Staff ring up counter sales and prepare delivery orders in several
//! draft tabs at once, while browsing existing orders through a client-side
//! response cache.
//!
//! # Modules
//!
//! - [`api`]: backend boundary ([`api::OrderBackend`]) and its HTTP client
//! - [`cache`]: TTL + LRU response cache and in-flight request dedup
//! - [`orders`]: cached order reads and cache-invalidating writes
//! - [`drafts`]: draft order tabs, totals and submission
//! - [`payment`]: payment method rules
//! - [`state`]: wiring of the above for an application

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cache;
pub mod config;
pub mod drafts;
pub mod error;
pub mod orders;
pub mod payment;
pub mod state;
pub mod telemetry;

pub use error::AppError;
pub use state::AppState;
