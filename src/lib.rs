//! Shelf - shared offline cache for multi-app deployments
//!
//! Many independently versioned web apps share one interception layer and
//! one cache store. Shelf decides which named partition owns a request,
//! serves or fetches and populates it, preloads partitions at install and
//! reclaims stale generations at activation.
//!
//! | Module | Role |
//! |--------|------|
//! | [`resolve`] | request path → app, scope, partition |
//! | [`store`] | named partitions of request/response pairs |
//! | [`preload`] | all-or-nothing install-time population |
//! | [`router`] | per-request serve-or-fetch decisions |
//! | [`reclaim`] | activation-time deletion of stale partitions |
//! | [`worker`] | install → activate → intercept lifecycle |

pub mod apps;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod manifest;
pub mod preload;
pub mod reclaim;
pub mod records;
pub mod resolve;
pub mod router;
pub mod store;
pub mod ui;
pub mod worker;

pub use error::{ShelfError, ShelfResult};
