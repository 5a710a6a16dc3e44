//! HTTP surface of the open hackathon platform.
//! - `routes` holds the `/v2` handlers, one module per area.
//! - `auth` resolves the bearer token and provides the role guards.
//! - `startup` wires configuration, storage and the cron scheduler.

pub mod auth;
pub mod dto;
pub mod errors;
pub mod openapi;
pub mod routes;
pub mod startup;
pub mod state;

pub use startup::run;
