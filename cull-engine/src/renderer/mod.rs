pub mod bindless;
pub mod compacting_alloc_buffer;
pub mod frame_context;
pub mod geometry_context;
pub mod hiz;
pub mod meshlet;
pub mod orchestrator;
pub mod pipelines;
pub mod render_graph;

#[cfg(test)]
mod tests;
