use crate::renderer::camera::{Camera, ndc_to_screen};
use crate::renderer::compacting_alloc_buffer::CompactingAllocBufferReader;
use crate::renderer::cull_flags::CullFlags;
use crate::renderer::indirect::DrawIndexedIndirectCommand;
use crate::renderer::meshlet::visbuffer::encode_index;
use bytemuck_derive::{Pod, Zeroable};
use cull_asset_shader::affine_transform::AffineTransform;
use cull_asset_shader::descriptor::{BufferId, Descriptors};
use cull_asset_shader::meshlet::MESHLET_MAX_TRIANGLES;
use cull_asset_shader::meshlet::instance::{MeshInstance, MeshletInstance};
use cull_asset_shader::meshlet::model::MeshletModel;
use glam::{UVec3, Vec2, Vec4, Vec4Swizzles};
#[cfg(target_arch = "spirv")]
use num_traits::Float;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Param {
	pub camera: BufferId<Camera>,
	pub model: MeshletModel,
	pub instances: BufferId<MeshInstance>,
	pub transforms: BufferId<AffineTransform>,
	pub meshlet_instances: BufferId<MeshletInstance>,
	/// indices into `meshlet_instances` that survived meshlet culling
	pub visible: CompactingAllocBufferReader<u32>,
	pub out_indices: BufferId<u32>,
	pub draw_command: BufferId<DrawIndexedIndirectCommand>,
	pub cull_flags: u32,
	/// in pixels²
	pub micro_triangle_area: f32,
}

/// one invocation per triangle slot of a meshlet
pub const CULL_TRIANGLES_WG_SIZE: u32 = MESHLET_MAX_TRIANGLES;

/// Backface and micro triangle tests on the clip space positions of a triangle, true if it can be dropped.
///
/// `mirrored` transforms flip the winding of every triangle, see [`AffineTransform::is_mirrored`].
pub fn is_triangle_culled(
	clip: [Vec4; 3],
	viewport: Vec2,
	flags: CullFlags,
	micro_triangle_area: f32,
	mirrored: bool,
) -> bool {
	// behind or on the camera plane the projection is meaningless, keep it
	if clip[0].w <= 0. || clip[1].w <= 0. || clip[2].w <= 0. {
		return false;
	}

	let ndc = clip.map(|c| c.xy() / c.w);
	// twice the signed area, counter-clockwise is positive
	let area = (ndc[1] - ndc[0]).perp_dot(ndc[2] - ndc[0]);
	let facing = if mirrored { -area } else { area };
	if flags.contains(CullFlags::TRIANGLE_BACK_FACE) && facing <= 0. {
		return true;
	}

	if flags.contains(CullFlags::MICRO_TRIANGLES) {
		let area_px = area.abs() * 0.5 * (viewport.x * 0.5) * (viewport.y * 0.5);
		if area_px < micro_triangle_area {
			return true;
		}

		// pixel centers sit at +0.5, the bounds contain one iff ceil(min - 0.5) <= floor(max - 0.5)
		let screen = ndc.map(|n| ndc_to_screen(n, viewport));
		let min = screen[0].min(screen[1]).min(screen[2]);
		let max = screen[0].max(screen[1]).max(screen[2]);
		let first = (min - 0.5).ceil();
		let last = (max - 0.5).floor();
		if first.x > last.x || first.y > last.y {
			return true;
		}
	}
	false
}

/// One invocation per candidate triangle, appends survivors to the reordered index buffer.
pub fn cull_triangles(descriptors: &impl Descriptors, param: &Param, global_id: UVec3) {
	let slot = global_id.x / MESHLET_MAX_TRIANGLES;
	let triangle = global_id.x % MESHLET_MAX_TRIANGLES;
	let visible = param.visible.access(descriptors);
	if slot >= visible.len() {
		return;
	}

	let meshlet_instance_id = visible.read(slot);
	let meshlet_instance = descriptors.load(param.meshlet_instances, meshlet_instance_id);
	let instance = descriptors.load(param.instances, meshlet_instance.instance_id);
	let mesh = param.model.load_mesh(descriptors, instance.mesh_id);
	let meshlet = param.model.load_meshlet(descriptors, &mesh, meshlet_instance.meshlet_id);
	if triangle >= meshlet.triangles.count {
		return;
	}

	let camera = descriptors.load(param.camera, 0);
	let transform = descriptors.load(param.transforms, instance.transform_id);
	let local = param.model.load_triangle(descriptors, &meshlet, triangle);
	let clip = local
		.to_array()
		.map(|v| camera.transform_vertex(&transform, param.model.load_position(descriptors, &meshlet, v)));

	let flags = CullFlags::from_bits_truncate(param.cull_flags);
	if is_triangle_culled(
		clip,
		camera.viewport_f32(),
		flags,
		param.micro_triangle_area,
		transform.is_mirrored(),
	) {
		return;
	}

	let base = descriptors.atomic_add(param.draw_command, DrawIndexedIndirectCommand::INDEX_COUNT_WORD, 3);
	if base + 3 > descriptors.buffer_len(param.out_indices) {
		return;
	}
	for corner in 0..3 {
		descriptors.store(
			param.out_indices,
			base + corner,
			encode_index(meshlet_instance_id, triangle * 3 + corner),
		);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const VIEWPORT: Vec2 = Vec2::new(100., 100.);

	/// counter-clockwise triangle in ndc with its right angle at `origin`
	fn triangle(origin: Vec2, size: f32) -> [Vec4; 3] {
		[
			Vec4::new(origin.x, origin.y, 0.5, 1.),
			Vec4::new(origin.x + size, origin.y, 0.5, 1.),
			Vec4::new(origin.x, origin.y + size, 0.5, 1.),
		]
	}

	fn flip(t: [Vec4; 3]) -> [Vec4; 3] {
		[t[0], t[2], t[1]]
	}

	#[test]
	fn backface() {
		let t = triangle(Vec2::ZERO, 0.5);
		assert!(!is_triangle_culled(t, VIEWPORT, CullFlags::all(), 0.25, false));
		assert!(is_triangle_culled(flip(t), VIEWPORT, CullFlags::all(), 0.25, false));
		assert!(!is_triangle_culled(flip(t), VIEWPORT, CullFlags::MICRO_TRIANGLES, 0.25, false));
	}

	#[test]
	fn mirrored_winding() {
		let t = triangle(Vec2::ZERO, 0.5);
		assert!(is_triangle_culled(t, VIEWPORT, CullFlags::all(), 0.25, true));
		assert!(!is_triangle_culled(flip(t), VIEWPORT, CullFlags::all(), 0.25, true));
		// the area test does not care about winding
		let micro = flip(triangle(Vec2::new(0.01, 0.01), 0.04));
		assert!(is_triangle_culled(micro, VIEWPORT, CullFlags::MICRO_TRIANGLES, 2.5, true));
		assert!(!is_triangle_culled(micro, VIEWPORT, CullFlags::MICRO_TRIANGLES, 1., true));
	}

	#[test]
	fn behind_camera_is_kept() {
		let mut t = flip(triangle(Vec2::ZERO, 0.0001));
		t[1].w = -1.;
		assert!(!is_triangle_culled(t, VIEWPORT, CullFlags::all(), 0.25, false));
	}

	#[test]
	fn micro_triangle_area() {
		// one ndc unit is 50 pixels, a right triangle of 0.04 ndc is 2x2 pixels with an area of 2 px²
		let t = triangle(Vec2::new(0.01, 0.01), 0.04);
		assert!(!is_triangle_culled(t, VIEWPORT, CullFlags::all(), 1., false));
		assert!(is_triangle_culled(t, VIEWPORT, CullFlags::all(), 2.5, false));
		assert!(!is_triangle_culled(t, VIEWPORT, CullFlags::TRIANGLE_BACK_FACE, 2.5, false));
	}

	#[test]
	fn misses_every_pixel_center() {
		// pixel 50 spans [50, 51] with its center at 50.5, ndc 0.0 maps to 50 and ndc 0.008 to 50.4
		let t = triangle(Vec2::new(0., -0.008), 0.008);
		assert!(is_triangle_culled(t, VIEWPORT, CullFlags::all(), 0., false));
		assert!(!is_triangle_culled(t, VIEWPORT, CullFlags::TRIANGLE_BACK_FACE, 0., false));
		// shifted to cover a pixel center
		let t = triangle(Vec2::new(0.004, -0.016), 0.016);
		assert!(!is_triangle_culled(t, VIEWPORT, CullFlags::all(), 0., false));
	}
}
