//! Core traits, errors, and protocol constants.
//!
//! This module has no runtime dependencies and is always built.

mod constants;
mod error;
mod traits;

pub use constants::*;
pub use error::*;
pub use traits::*;
