//! CLI command implementations.

pub mod check;
pub mod common;
pub mod compositions;
pub mod nodes;
pub mod run;
