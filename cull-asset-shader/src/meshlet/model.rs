use crate::descriptor::{BufferId, Descriptors};
use crate::meshlet::indices::{PackedTriangle, load_triangle};
use crate::meshlet::mesh::{Mesh, Meshlet};
use crate::meshlet::vertex::Vertex;
use bytemuck_derive::{Pod, Zeroable};
use glam::{UVec3, Vec3};

/// All geometry buffers of a model. Shared by every pass and never written after upload.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct MeshletModel {
	pub meshes: BufferId<Mesh>,
	pub meshlets: BufferId<Meshlet>,
	pub vertices: BufferId<Vertex>,
	pub meshlet_vertices: BufferId<u32>,
	pub triangles: BufferId<PackedTriangle>,
}

impl MeshletModel {
	pub fn load_mesh(&self, descriptors: &impl Descriptors, mesh_id: u32) -> Mesh {
		descriptors.load(self.meshes, mesh_id)
	}

	/// `meshlet_id` is relative to the meshlet range of `mesh`
	pub fn load_meshlet(&self, descriptors: &impl Descriptors, mesh: &Mesh, meshlet_id: u32) -> Meshlet {
		descriptors.load(self.meshlets, mesh.meshlets.first + meshlet_id)
	}

	/// meshlet-local vertex indices of a triangle
	pub fn load_triangle(&self, descriptors: &impl Descriptors, meshlet: &Meshlet, triangle: u32) -> UVec3 {
		load_triangle(descriptors, self.triangles, meshlet.triangles, triangle)
	}

	pub fn load_position(&self, descriptors: &impl Descriptors, meshlet: &Meshlet, local_vertex: u32) -> Vec3 {
		let vertex_id = descriptors.load(self.meshlet_vertices, meshlet.vertices.first + local_vertex);
		descriptors.load(self.vertices, vertex_id).position
	}
}
