use bytemuck::{Pod, Zeroable};
use glam::{Affine3A, Mat3A, Vec3};
#[cfg(target_arch = "spirv")]
use num_traits::Float;
use static_assertions::const_assert_eq;

/// Affine transformation like [`Affine3A`] but also stores a matrix to transform normals.
#[repr(C)]
#[derive(Copy, Clone, Default, Debug)]
pub struct AffineTransform {
	pub affine: Affine3A,
	pub normal: Mat3A,
}
const_assert_eq!(size_of::<AffineTransform>(), 28 * 4);
const_assert_eq!(size_of::<Affine3A>(), 16 * 4);
const_assert_eq!(size_of::<Mat3A>(), 12 * 4);
const_assert_eq!(align_of::<AffineTransform>(), 16);

// Safety: both glam types are f32 columns of Vec3A, which are four initialized lanes each
unsafe impl Zeroable for AffineTransform {}
unsafe impl Pod for AffineTransform {}

impl AffineTransform {
	pub const IDENTITY: Self = Self {
		affine: Affine3A::IDENTITY,
		normal: Mat3A::IDENTITY,
	};

	pub fn new(transform: Affine3A) -> Self {
		Self {
			affine: transform,
			normal: transform.matrix3.inverse().transpose(),
		}
	}

	pub fn translation(&self) -> Vec3 {
		Vec3::from(self.affine.translation)
	}

	#[inline]
	pub fn transform_point(&self, point: Vec3) -> Vec3 {
		self.affine.transform_point3(point)
	}

	/// transformed normal, normalized
	#[inline]
	pub fn transform_normal(&self, normal: Vec3) -> Vec3 {
		Vec3::from(self.normal * normal).normalize_or_zero()
	}

	/// The largest factor any axis gets scaled by, used to scale bounding sphere radii.
	pub fn max_scale(&self) -> f32 {
		let m = self.affine.matrix3;
		m.x_axis.length_squared().max(m.y_axis.length_squared()).max(m.z_axis.length_squared()).sqrt()
	}

	/// Mirroring transforms flip the winding order of every triangle.
	pub fn is_mirrored(&self) -> bool {
		self.affine.matrix3.determinant() < 0.
	}

	/// Normal cones only survive transforms that scale every axis by the same amount.
	pub fn is_uniform_scale(&self) -> bool {
		let m = self.affine.matrix3;
		let x = m.x_axis.length_squared();
		let y = m.y_axis.length_squared();
		let z = m.z_axis.length_squared();
		let max = x.max(y).max(z);
		let min = x.min(y).min(z);
		max - min <= max * 1e-4
	}
}
