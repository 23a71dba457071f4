use bytemuck_derive::{Pod, Zeroable};
use cull_asset_shader::shape::sphere::Sphere;
use glam::{Mat4, Vec4, Vec4Swizzles};

/// Six clip planes extracted from a view-projection matrix with a `[0, 1]` depth range. Planes are not normalized,
/// which keeps the plane at infinity of an infinite reverse-Z projection well-defined: its normal is zero and it
/// never rejects anything.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Frustum {
	pub planes: [Vec4; 6],
}

impl Frustum {
	pub fn from_view_projection(m: Mat4) -> Self {
		let (r0, r1, r2, r3) = (m.row(0), m.row(1), m.row(2), m.row(3));
		Self {
			planes: [r3 + r0, r3 - r0, r3 + r1, r3 - r1, r2, r3 - r2],
		}
	}

	/// false only if the sphere is entirely outside of at least one plane
	pub fn intersects_sphere(&self, sphere: Sphere) -> bool {
		let center = sphere.center();
		let radius = sphere.radius();
		let mut i = 0;
		while i < 6 {
			let plane = self.planes[i];
			let normal = plane.xyz();
			if normal.dot(center) + plane.w < -radius * normal.length() {
				return false;
			}
			i += 1;
		}
		true
	}
}
