//! Convoy Registry - npm registry integration
//!
//! [`NpmRegistry`] implements the release engine's `RegistryClient` over the
//! npm registry HTTP API and [`NpmPacker`] produces tarballs with `npm pack`.

mod auth;
mod client;
mod pack;

pub use auth::{escape_name, token_from_npmrc};
pub use client::{NpmConfig, NpmRegistry};
pub use pack::{integrity_of, NpmPacker};
