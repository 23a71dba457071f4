pub mod cull;
pub mod draw;
