use crate::renderer::frustum::Frustum;
use bytemuck_derive::{Pod, Zeroable};
use cull_asset_shader::affine_transform::AffineTransform;
use glam::{Mat4, UVec2, Vec2, Vec3, Vec4, Vec4Swizzles};
use static_assertions::const_assert_eq;

/// Camera of a view. Depth is reverse-Z: the near plane maps to 1 and the far plane to 0.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Camera {
	/// world to view space
	pub view: Mat4,
	pub projection: Mat4,
	pub view_projection: Mat4,
	pub frustum: Frustum,
	pub position: Vec3,
	pub near: f32,
	pub far: f32,
	pub viewport: UVec2,
	pub _pad: u32,
}
const_assert_eq!(size_of::<Camera>(), 320);

impl Camera {
	pub fn new(view: Mat4, projection: Mat4, near: f32, far: f32, viewport: UVec2) -> Self {
		let view_projection = projection * view;
		Self {
			view,
			projection,
			view_projection,
			frustum: Frustum::from_view_projection(view_projection),
			position: view.inverse().w_axis.xyz(),
			near,
			far,
			viewport,
			_pad: 0,
		}
	}

	/// Right-handed perspective camera at `eye` looking at `target`, with reverse-Z depth.
	pub fn look_at_reverse_z(eye: Vec3, target: Vec3, fov_y: f32, near: f32, far: f32, viewport: UVec2) -> Self {
		let aspect = viewport.x as f32 / viewport.y.max(1) as f32;
		let view = Mat4::look_at_rh(eye, target, Vec3::Y);
		// swapping near and far yields reverse-Z
		let projection = Mat4::perspective_rh(fov_y, aspect, far, near);
		Self::new(view, projection, near, far, viewport)
	}

	pub fn viewport_f32(&self) -> Vec2 {
		self.viewport.as_vec2()
	}

	pub fn transform_vertex(&self, instance: &AffineTransform, vertex_pos: Vec3) -> Vec4 {
		let world_space = instance.transform_point(vertex_pos);
		self.view_projection * Vec4::from((world_space, 1.))
	}
}

/// Normalized device coordinates (y up) to pixel coordinates (y down, origin top left).
#[inline]
pub fn ndc_to_screen(ndc: Vec2, viewport: Vec2) -> Vec2 {
	Vec2::new((ndc.x * 0.5 + 0.5) * viewport.x, (0.5 - ndc.y * 0.5) * viewport.y)
}
