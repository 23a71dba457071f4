pub mod graph;
pub mod pass;
pub mod resource;
