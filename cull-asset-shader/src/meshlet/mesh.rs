use crate::shape::cone::Cone;
use crate::shape::sphere::Sphere;
use crate::span::Span;
use bytemuck_derive::{Pod, Zeroable};
use static_assertions::const_assert_eq;

/// A cluster of up to [`MESHLET_MAX_TRIANGLES`](super::MESHLET_MAX_TRIANGLES) triangles referencing up to
/// [`MESHLET_MAX_VERTICES`](super::MESHLET_MAX_VERTICES) vertices.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Pod, Zeroable)]
pub struct Meshlet {
	/// span of the meshlet vertex buffer, which remaps meshlet-local indices to vertex buffer indices
	pub vertices: Span,
	/// span of the packed triangle buffer
	pub triangles: Span,
	pub bounds: Sphere,
	pub cone: Cone,
}
const_assert_eq!(size_of::<Meshlet>(), 64);

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Pod, Zeroable)]
pub struct Mesh {
	pub meshlets: Span,
	pub triangle_count: u32,
	pub _pad: u32,
	pub bounds: Sphere,
}
const_assert_eq!(size_of::<Mesh>(), 32);

impl Mesh {
	#[inline]
	pub fn meshlet_count(&self) -> u32 {
		self.meshlets.count
	}
}
