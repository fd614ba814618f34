//! Release workflow orchestration

mod options;
mod push;
mod release;
mod state;
#[cfg(test)]
pub(crate) mod testing;
mod validation;

pub use options::*;
pub use push::*;
pub use release::*;
pub use state::*;
pub use validation::*;
