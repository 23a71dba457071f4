use crate::affine_transform::AffineTransform;
use bytemuck_derive::{Pod, Zeroable};
use glam::{Vec3, Vec4, Vec4Swizzles};

/// Normal cone of a cluster of triangles. All triangles face away from any eye position within the "backface" cone
/// spanned by `apex`, `axis` and `cutoff`. A degenerate cone has a zero axis and a cutoff of 1 and never culls.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Cone {
	apex_cutoff: Vec4,
	axis: Vec4,
}

impl Cone {
	pub const DEGENERATE: Self = Self {
		apex_cutoff: Vec4::new(0., 0., 0., 1.),
		axis: Vec4::ZERO,
	};

	pub fn new(apex: Vec3, axis: Vec3, cutoff: f32) -> Self {
		Self {
			apex_cutoff: Vec4::from((apex, cutoff)),
			axis: Vec4::from((axis, 0.)),
		}
	}

	pub fn apex(&self) -> Vec3 {
		self.apex_cutoff.xyz()
	}

	pub fn axis(&self) -> Vec3 {
		self.axis.xyz()
	}

	pub fn cutoff(&self) -> f32 {
		self.apex_cutoff.w
	}

	pub fn transform(&self, transform: &AffineTransform) -> Self {
		Self::new(
			transform.transform_point(self.apex()),
			transform.transform_normal(self.axis()),
			self.cutoff(),
		)
	}

	/// true if every triangle within the cone faces away from `eye`
	pub fn is_backfacing(&self, eye: Vec3) -> bool {
		let dir = (self.apex() - eye).normalize_or_zero();
		dir.dot(self.axis()) >= self.cutoff()
	}
}
