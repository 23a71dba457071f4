pub mod config;
pub mod geometry;
pub mod renderer;
pub mod software;
