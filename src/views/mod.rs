//! Derived view models for the dashboard and their terminal rendering.

pub mod format;
mod mapper;
pub mod render;
mod types;

pub use mapper::*;
pub use types::*;
