use bytemuck_derive::{Pod, Zeroable};

/// One renderable occurrence of a mesh, rebuilt by the scene every frame.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct MeshInstance {
	pub mesh_id: u32,
	pub transform_id: u32,
	pub material_id: u32,
}

impl MeshInstance {
	pub fn new(mesh_id: u32, transform_id: u32, material_id: u32) -> Self {
		Self {
			mesh_id,
			transform_id,
			material_id,
		}
	}
}

/// A meshlet of a [`MeshInstance`], only ever exists on the GPU.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct MeshletInstance {
	pub instance_id: u32,
	/// relative to the meshlet range of the instance's mesh
	pub meshlet_id: u32,
}

impl MeshletInstance {
	pub fn new(instance_id: u32, meshlet_id: u32) -> Self {
		Self {
			instance_id,
			meshlet_id,
		}
	}
}
