pub mod cull_meshes;
pub mod cull_meshlets;
pub mod cull_triangles;
pub mod generate_cull_commands;
pub mod visbuffer;
