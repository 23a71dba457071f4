use crate::renderer::camera::Camera;
use crate::renderer::compacting_alloc_buffer::{CompactingAllocBufferReader, CompactingAllocBufferWriter};
use crate::renderer::cull_flags::CullFlags;
use crate::renderer::hiz::is_occluded;
use crate::renderer::phase::Phase;
use bytemuck_derive::{Pod, Zeroable};
use cull_asset_shader::affine_transform::AffineTransform;
use cull_asset_shader::descriptor::{BufferId, Descriptors, ImageId};
use cull_asset_shader::meshlet::instance::{MeshInstance, MeshletInstance};
use cull_asset_shader::meshlet::mesh::Meshlet;
use cull_asset_shader::meshlet::model::MeshletModel;
use glam::UVec3;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Param {
	pub camera: BufferId<Camera>,
	pub model: MeshletModel,
	pub instances: BufferId<MeshInstance>,
	pub transforms: BufferId<AffineTransform>,
	pub meshlet_instances: CompactingAllocBufferReader<MeshletInstance>,
	/// indices into `meshlet_instances`
	pub out_visible: CompactingAllocBufferWriter<u32>,
	/// one bit per meshlet instance, set once it was drawn this frame
	pub visibility_bitmask: BufferId<u32>,
	pub hiz: ImageId,
	pub hiz_valid: u32,
	pub phase: u32,
	pub cull_flags: u32,
	pub hiz_mip_bias: i32,
}

pub const CULL_MESHLETS_WG_SIZE: u32 = 64;

/// word and bit of a meshlet instance in the visibility bitmask
#[inline]
pub fn bitmask_location(meshlet_instance_id: u32) -> (u32, u32) {
	(meshlet_instance_id / 32, 1 << (meshlet_instance_id % 32))
}

pub fn bitmask_words(meshlet_instances: u32) -> u32 {
	meshlet_instances.div_ceil(32)
}

/// Frustum and normal cone tests, true if the meshlet may be visible.
pub fn meshlet_visible(camera: &Camera, flags: CullFlags, meshlet: &Meshlet, transform: &AffineTransform) -> bool {
	if flags.contains(CullFlags::MESHLET_FRUSTUM) && !camera.frustum.intersects_sphere(meshlet.bounds.transform(transform))
	{
		return false;
	}
	// cones do not survive non-uniform scaling, mirroring is fine as the axis goes through the normal matrix
	if flags.contains(CullFlags::TRIANGLE_BACK_FACE)
		&& transform.is_uniform_scale()
		&& meshlet.cone.transform(transform).is_backfacing(camera.position)
	{
		return false;
	}
	true
}

/// One invocation per [`MeshletInstance`], compacts the visible ones into `out_visible`.
pub fn cull_meshlets(descriptors: &impl Descriptors, param: &Param, global_id: UVec3) {
	let meshlet_instance_id = global_id.x;
	let meshlet_instances = param.meshlet_instances.access(descriptors);
	if meshlet_instance_id >= meshlet_instances.len() {
		return;
	}

	let (word, bit) = bitmask_location(meshlet_instance_id);
	if Phase::from_param(param.phase) == Phase::Late && descriptors.load(param.visibility_bitmask, word) & bit != 0 {
		// already drawn in the early phase
		return;
	}

	let meshlet_instance = meshlet_instances.read(meshlet_instance_id);
	let instance = descriptors.load(param.instances, meshlet_instance.instance_id);
	let mesh = param.model.load_mesh(descriptors, instance.mesh_id);
	let meshlet = param.model.load_meshlet(descriptors, &mesh, meshlet_instance.meshlet_id);
	let transform = descriptors.load(param.transforms, instance.transform_id);
	let camera = descriptors.load(param.camera, 0);

	let flags = CullFlags::from_bits_truncate(param.cull_flags);
	if !meshlet_visible(&camera, flags, &meshlet, &transform) {
		return;
	}
	if flags.contains(CullFlags::OCCLUSION)
		&& param.hiz_valid != 0
		&& is_occluded(
			descriptors,
			param.hiz,
			&camera,
			meshlet.bounds.transform(&transform),
			param.hiz_mip_bias,
		) {
		return;
	}

	descriptors.atomic_or(param.visibility_bitmask, word, bit);
	let _ = param.out_visible.allocate(descriptors, 1).write(0, meshlet_instance_id);
}
