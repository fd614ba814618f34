//! Configuration system for convoy

pub mod defaults;
mod loader;
mod record;
mod types;
pub mod validation;

pub use defaults::*;
pub use loader::*;
pub use record::ProjectRecord;
pub use types::*;
pub use validation::*;
