//! Subcommand implementations

pub mod inspect;
pub mod predict;
pub mod remote;
pub mod schema;
pub mod train;
