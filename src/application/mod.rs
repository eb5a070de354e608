//! Application services layer.

pub mod error;
pub mod members;
pub mod render;
pub mod repos;
pub mod startup;
