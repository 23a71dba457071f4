pub mod camera;
pub mod compacting_alloc_buffer;
pub mod cull_flags;
pub mod debug_draw;
pub mod frustum;
pub mod hiz;
pub mod indirect;
pub mod meshlet;
pub mod phase;
