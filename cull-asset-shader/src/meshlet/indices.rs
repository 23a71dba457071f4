use crate::descriptor::{BufferId, Descriptors};
use crate::meshlet::MESHLET_INDICES_BITS;
use crate::span::Span;
use bytemuck_derive::{Pod, Zeroable};
use glam::UVec3;

const INDEX_MASK: u32 = (1 << MESHLET_INDICES_BITS) - 1;

/// The three meshlet-local vertex indices of a triangle, [`MESHLET_INDICES_BITS`] each, in a single word.
///
/// One word per triangle means a triangle is always a single load, at the cost of a few unused bits.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct PackedTriangle(pub u32);
static_assertions::const_assert!(3 * MESHLET_INDICES_BITS <= 32);

impl PackedTriangle {
	#[inline]
	pub fn pack(local: UVec3) -> Self {
		Self(
			(local.x & INDEX_MASK)
				| (local.y & INDEX_MASK) << MESHLET_INDICES_BITS
				| (local.z & INDEX_MASK) << (2 * MESHLET_INDICES_BITS),
		)
	}

	#[inline]
	pub fn unpack(self) -> UVec3 {
		UVec3::new(
			self.0 & INDEX_MASK,
			(self.0 >> MESHLET_INDICES_BITS) & INDEX_MASK,
			(self.0 >> (2 * MESHLET_INDICES_BITS)) & INDEX_MASK,
		)
	}
}

/// Meshlet-local vertex indices of the `triangle`th triangle in `triangles`.
#[inline]
pub fn load_triangle(
	descriptors: &impl Descriptors,
	buffer: BufferId<PackedTriangle>,
	triangles: Span,
	triangle: u32,
) -> UVec3 {
	descriptors.load(buffer, triangles.first + triangle).unpack()
}

/// Packs a flat list of meshlet-local indices, three per triangle. A trailing partial triangle is dropped.
#[cfg(not(target_arch = "spirv"))]
pub fn pack_triangles(indices: &[u32]) -> impl Iterator<Item = PackedTriangle> + '_ {
	indices
		.chunks_exact(3)
		.map(|t| PackedTriangle::pack(UVec3::new(t[0], t[1], t[2])))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn extreme_indices_survive() {
		let max = (1 << MESHLET_INDICES_BITS) - 1;
		for local in [UVec3::ZERO, UVec3::splat(max), UVec3::new(max, 0, 1), UVec3::new(5, max, 17)] {
			assert_eq!(PackedTriangle::pack(local).unpack(), local);
		}
		assert_eq!(PackedTriangle::pack(UVec3::splat(max)).0 >> (3 * MESHLET_INDICES_BITS), 0);
	}

	#[test]
	fn packs_whole_triangles() {
		let packed = pack_triangles(&[0, 1, 2, 3, 4, 5, 6]).collect::<Vec<_>>();
		assert_eq!(packed.len(), 2);
		assert_eq!(packed[1].unpack(), UVec3::new(3, 4, 5));
	}
}
