use crate::affine_transform::AffineTransform;
use bytemuck_derive::{Pod, Zeroable};
use glam::{Vec3, Vec4, Vec4Swizzles};

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Sphere(Vec4);

impl Sphere {
	pub fn new(center: Vec3, radius: f32) -> Sphere {
		Self(Vec4::from((center, radius)))
	}

	#[cfg(not(target_arch = "spirv"))]
	#[profiling::function]
	pub fn bounding_sphere<I: Iterator<Item = Vec3>>(iter: impl Fn() -> I) -> Option<Self> {
		let a = Self::bounding_sphere_centered(|| iter())?;
		let b = Self::bounding_sphere_aabb(|| iter())?;
		[a, b].into_iter().min_by(|a, b| a.radius().total_cmp(&b.radius()))
	}

	/// Centered on the average of all points. `iter` must yield the same values every time.
	#[cfg(not(target_arch = "spirv"))]
	pub fn bounding_sphere_centered<I: Iterator<Item = Vec3>>(iter: impl Fn() -> I) -> Option<Self> {
		let (mut center, denom) = iter().fold((Vec3::ZERO, 0.), |a, b| (a.0 + b, a.1 + 1.));
		if denom != 0. {
			center /= denom;
			let radius = iter()
				.map(|a| Vec3::distance(a, center))
				.max_by(|a, b| a.total_cmp(b))?;
			Some(Self::new(center, radius))
		} else {
			None
		}
	}

	/// Centered on the aabb. `iter` must yield the same values every time.
	#[cfg(not(target_arch = "spirv"))]
	pub fn bounding_sphere_aabb<I: Iterator<Item = Vec3>>(iter: impl Fn() -> I) -> Option<Self> {
		let (min, max) = iter().fold((Vec3::INFINITY, Vec3::NEG_INFINITY), |a, b| (a.0.min(b), a.1.max(b)));
		if min != Vec3::INFINITY {
			let diff = max - min;
			Some(Self::new(min + diff * 0.5, diff.length() * 0.5))
		} else {
			None
		}
	}

	pub fn center(&self) -> Vec3 {
		self.0.xyz()
	}

	pub fn radius(&self) -> f32 {
		self.0.w
	}

	/// The radius grows with the largest axis scale so the sphere stays enclosing.
	pub fn transform(&self, transform: &AffineTransform) -> Self {
		Self::new(
			transform.transform_point(self.center()),
			self.radius() * transform.max_scale(),
		)
	}
}
