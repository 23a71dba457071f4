use crate::renderer::camera::Camera;
use crate::renderer::compacting_alloc_buffer::CompactingAllocBufferWriter;
use crate::renderer::cull_flags::CullFlags;
use bytemuck_derive::{Pod, Zeroable};
use cull_asset_shader::affine_transform::AffineTransform;
use cull_asset_shader::descriptor::{BufferId, Descriptors};
use cull_asset_shader::meshlet::instance::{MeshInstance, MeshletInstance};
use cull_asset_shader::meshlet::model::MeshletModel;
use cull_asset_shader::shape::sphere::Sphere;
use glam::UVec3;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Param {
	pub camera: BufferId<Camera>,
	pub model: MeshletModel,
	pub instances: BufferId<MeshInstance>,
	pub transforms: BufferId<AffineTransform>,
	pub out_meshlet_instances: CompactingAllocBufferWriter<MeshletInstance>,
	pub debug_spheres: CompactingAllocBufferWriter<Sphere>,
	pub num_instances: u32,
	pub cull_flags: u32,
	pub debug_draw: u32,
}

pub const CULL_MESHES_WG_SIZE: u32 = 64;

/// One invocation per [`MeshInstance`]: frustum test the mesh bounds and expand survivors into one
/// [`MeshletInstance`] per meshlet.
pub fn cull_meshes(descriptors: &impl Descriptors, param: &Param, global_id: UVec3) {
	let instance_id = global_id.x;
	if instance_id >= param.num_instances {
		return;
	}

	let camera = descriptors.load(param.camera, 0);
	let instance = descriptors.load(param.instances, instance_id);
	let mesh = param.model.load_mesh(descriptors, instance.mesh_id);
	let transform = descriptors.load(param.transforms, instance.transform_id);
	let bounds = mesh.bounds.transform(&transform);

	let flags = CullFlags::from_bits_truncate(param.cull_flags);
	if flags.contains(CullFlags::MESHLET_FRUSTUM) && !camera.frustum.intersects_sphere(bounds) {
		return;
	}

	let meshlet_count = mesh.meshlet_count();
	let allocation = param.out_meshlet_instances.allocate(descriptors, meshlet_count);
	for meshlet_id in 0..meshlet_count {
		let _ = allocation.write(meshlet_id, MeshletInstance::new(instance_id, meshlet_id));
	}

	if param.debug_draw != 0 {
		let _ = param.debug_spheres.allocate(descriptors, 1).write(0, bounds);
	}
}
