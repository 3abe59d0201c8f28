//! Domain layer types and invariants.

pub mod quote;
pub mod symbol;

pub use quote::Quote;
pub use symbol::{Symbol, SymbolError};
