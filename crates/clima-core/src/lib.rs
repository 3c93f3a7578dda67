//! Core data types and climatology calculations for Clima
//!
//! This crate provides the location/observation model, the collaborator
//! traits the rest of the workspace implements, and the pure engine:
//! hour-bucket aggregation, year synthesis and working-window evaluation.

pub mod climatology;
pub mod forecast;
pub mod traits;
pub mod types;
pub mod window;

pub use climatology::*;
pub use forecast::*;
pub use traits::*;
pub use types::*;
pub use window::*;
