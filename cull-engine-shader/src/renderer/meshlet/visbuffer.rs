use crate::renderer::camera::Camera;
use crate::renderer::hiz::depth_to_texel;
use bytemuck_derive::{Pod, Zeroable};
use cull_asset_shader::affine_transform::AffineTransform;
use cull_asset_shader::descriptor::{BufferId, Descriptors, ImageId};
use cull_asset_shader::meshlet::instance::{MeshInstance, MeshletInstance};
use cull_asset_shader::meshlet::model::MeshletModel;
use glam::{UVec2, Vec4};

/// Bits of a reordered index used by the corner of a meshlet triangle, `triangle * 3 + vertex`.
pub const INDEX_CORNER_BITS: u32 = 8;
/// Bits of a visibility buffer payload used by the triangle within its meshlet.
pub const PAYLOAD_TRIANGLE_BITS: u32 = 6;

/// Meshlet instance ids must stay below this to fit the reordered indices.
pub const MAX_MESHLET_INSTANCES: u32 = 1 << (32 - INDEX_CORNER_BITS);
// payloads keep more id bits than indices, so no valid payload can reach PAYLOAD_EMPTY
static_assertions::const_assert!(PAYLOAD_TRIANGLE_BITS < INDEX_CORNER_BITS);

/// Payload of a pixel no triangle was drawn to.
pub const PAYLOAD_EMPTY: u32 = u32::MAX;
/// Clear value of the visibility buffer: depth 0 (infinitely far) and an empty payload.
pub const VISBUFFER_CLEAR: u64 = PAYLOAD_EMPTY as u64;

#[inline]
pub fn encode_index(meshlet_instance_id: u32, corner: u32) -> u32 {
	(meshlet_instance_id << INDEX_CORNER_BITS) | corner
}

/// (meshlet instance, corner)
#[inline]
pub fn decode_index(index: u32) -> (u32, u32) {
	(index >> INDEX_CORNER_BITS, index & ((1 << INDEX_CORNER_BITS) - 1))
}

#[inline]
pub fn encode_payload(meshlet_instance_id: u32, triangle: u32) -> u32 {
	(meshlet_instance_id << PAYLOAD_TRIANGLE_BITS) | triangle
}

/// (meshlet instance, triangle), `None` if nothing was drawn
#[inline]
pub fn decode_payload(payload: u32) -> Option<(u32, u32)> {
	if payload == PAYLOAD_EMPTY {
		None
	} else {
		Some((
			payload >> PAYLOAD_TRIANGLE_BITS,
			payload & ((1 << PAYLOAD_TRIANGLE_BITS) - 1),
		))
	}
}

/// Depth in the upper half, so an atomic max keeps the closest fragment with reverse-Z.
#[inline]
pub fn encode_texel(depth: f32, payload: u32) -> u64 {
	(depth_to_texel(depth) << 32) | payload as u64
}

/// (depth, payload)
#[inline]
pub fn decode_texel(texel: u64) -> (f32, u32) {
	(f32::from_bits((texel >> 32) as u32), texel as u32)
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Param {
	pub camera: BufferId<Camera>,
	pub model: MeshletModel,
	pub instances: BufferId<MeshInstance>,
	pub transforms: BufferId<AffineTransform>,
	pub meshlet_instances: BufferId<MeshletInstance>,
	/// 64-bit visibility buffer, invalid for depth only
	pub visbuffer: ImageId,
	/// 32-bit float depth
	pub depth: ImageId,
	/// 32-bit fragment counter, may be invalid
	pub overdraw: ImageId,
}

#[derive(Copy, Clone, Debug)]
pub struct VisbufferVertex {
	pub clip: Vec4,
	/// flat across the triangle
	pub payload: u32,
}

/// Vertex stage: decodes a reordered index into its meshlet instance and corner.
pub fn visbuffer_vertex(descriptors: &impl Descriptors, param: &Param, index: u32) -> VisbufferVertex {
	let (meshlet_instance_id, corner) = decode_index(index);
	let (triangle, vertex) = (corner / 3, corner % 3);
	let meshlet_instance = descriptors.load(param.meshlet_instances, meshlet_instance_id);
	let instance = descriptors.load(param.instances, meshlet_instance.instance_id);
	let mesh = param.model.load_mesh(descriptors, instance.mesh_id);
	let meshlet = param.model.load_meshlet(descriptors, &mesh, meshlet_instance.meshlet_id);
	let local = param.model.load_triangle(descriptors, &meshlet, triangle).to_array()[vertex as usize];
	let position = param.model.load_position(descriptors, &meshlet, local);

	let camera = descriptors.load(param.camera, 0);
	let transform = descriptors.load(param.transforms, instance.transform_id);
	VisbufferVertex {
		clip: camera.transform_vertex(&transform, position),
		payload: encode_payload(meshlet_instance_id, triangle),
	}
}

/// Fragment stage: greater-or-equal depth test as an atomic max on the visibility and depth images.
pub fn visbuffer_encode_fragment(
	descriptors: &impl Descriptors,
	param: &Param,
	coord: UVec2,
	depth: f32,
	payload: u32,
) {
	descriptors.image_atomic_max(param.visbuffer, coord, encode_texel(depth, payload));
	descriptors.image_atomic_max(param.depth, coord, depth_to_texel(depth));
	if param.overdraw.is_valid() {
		descriptors.image_atomic_add(param.overdraw, coord, 1);
	}
}

pub fn visbuffer_depth_only_fragment(
	descriptors: &impl Descriptors,
	param: &Param,
	coord: UVec2,
	depth: f32,
	_payload: u32,
) {
	descriptors.image_atomic_max(param.depth, coord, depth_to_texel(depth));
	if param.overdraw.is_valid() {
		descriptors.image_atomic_add(param.overdraw, coord, 1);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn index_encoding() {
		assert_eq!(decode_index(encode_index(12345, 191)), (12345, 191));
		assert_eq!(decode_index(encode_index(0, 0)), (0, 0));
	}

	#[test]
	fn payload_encoding() {
		assert_eq!(decode_payload(encode_payload(777, 63)), Some((777, 63)));
		assert_eq!(decode_payload(PAYLOAD_EMPTY), None);
	}

	#[test]
	fn last_meshlet_instance() {
		let last = MAX_MESHLET_INSTANCES - 1;
		assert_eq!(decode_index(encode_index(last, 191)), (last, 191));
		let payload = encode_payload(last, 63);
		assert_ne!(payload, PAYLOAD_EMPTY);
		assert_eq!(decode_payload(payload), Some((last, 63)));
		// one more would wrap the index
		assert_eq!(decode_index(encode_index(MAX_MESHLET_INSTANCES, 0)).0, 0);
	}

	#[test]
	fn closer_fragments_win() {
		let far = encode_texel(0.25, encode_payload(1, 2));
		let near = encode_texel(0.75, encode_payload(0, 0));
		assert!(near > far);
		assert!(far > VISBUFFER_CLEAR);
		assert_eq!(decode_texel(near), (0.75, encode_payload(0, 0)));
		assert_eq!(decode_texel(VISBUFFER_CLEAR), (0., PAYLOAD_EMPTY));
	}
}
