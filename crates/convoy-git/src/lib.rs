//! Convoy Git - Git operations for releases
//!
//! Read-only queries go through `git2`; anything that writes history or
//! talks to a remote shells out to the system `git` so hooks, signing and
//! credential helpers behave as they do on the command line.

mod client;
mod command;
mod history;
mod remote;
mod repository;
mod status;
mod tags;

pub use repository::{GitRepo, Result};
pub use tags::parse_describe;
