//! Hierarchical depth pyramid. Mip 0 is a copy of the depth buffer, every following mip stores the minimum of its
//! footprint in the previous one. With reverse-Z the minimum is the farthest depth, so a texel is a conservative
//! bound on how far away every occluder within it is.

use crate::renderer::camera::Camera;
use bytemuck_derive::{Pod, Zeroable};
use cull_asset_shader::descriptor::{Descriptors, ImageId};
use cull_asset_shader::shape::sphere::Sphere;
use glam::{UVec2, UVec3, Vec2, Vec3, Vec4, Vec4Swizzles};
#[cfg(target_arch = "spirv")]
use num_traits::Float;

pub const HIZ_WG_SIZE: u32 = 8;

/// the largest footprint in texels along one axis an occlusion test may sample
pub const HIZ_MAX_SAMPLE_SPAN: u32 = 4;

#[inline]
pub fn depth_to_texel(depth: f32) -> u64 {
	depth.to_bits() as u64
}

#[inline]
pub fn texel_to_depth(texel: u64) -> f32 {
	f32::from_bits(texel as u32)
}

/// `floor(log2(max(w, h))) + 1`
pub fn hiz_mip_levels(extent: UVec2) -> u32 {
	let max = extent.max_element().max(1);
	32 - max.leading_zeros()
}

pub fn mip_extent(extent: UVec2, mip: u32) -> UVec2 {
	UVec2::new((extent.x >> mip).max(1), (extent.y >> mip).max(1))
}

/// Inclusive range of texels in a mip of `src_extent` that `dst` of the next mip covers. The last texel of an odd
/// sized mip additionally covers the trailing row or column, so every source texel is covered.
pub fn reduce_footprint(dst: UVec2, src_extent: UVec2) -> (UVec2, UVec2) {
	let dst_extent = UVec2::new((src_extent.x / 2).max(1), (src_extent.y / 2).max(1));
	let min = dst * 2;
	let mut max = min + 1;
	if dst.x == dst_extent.x - 1 {
		max.x = src_extent.x - 1;
	}
	if dst.y == dst_extent.y - 1 {
		max.y = src_extent.y - 1;
	}
	(min.min(src_extent - 1), max.min(src_extent - 1))
}

/// Maps a pixel of mip 0 to the texel of `mip` covering it.
#[inline]
pub fn texel_of_pixel(pixel: UVec2, extent: UVec2, mip: u32) -> UVec2 {
	UVec2::new(pixel.x >> mip, pixel.y >> mip).min(mip_extent(extent, mip) - 1)
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct CopyParam {
	pub depth: ImageId,
	pub hiz: ImageId,
}

pub fn hiz_copy(descriptors: &impl Descriptors, param: &CopyParam, global_id: UVec3) {
	let coord = global_id.truncate();
	let extent = descriptors.image_extent(param.hiz, 0);
	if coord.x >= extent.x || coord.y >= extent.y {
		return;
	}
	let depth = descriptors.image_load(param.depth, 0, coord);
	descriptors.image_store(param.hiz, 0, coord, depth);
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct ReduceParam {
	pub hiz: ImageId,
	/// writes `src_mip + 1`
	pub src_mip: u32,
}

pub fn hiz_reduce(descriptors: &impl Descriptors, param: &ReduceParam, global_id: UVec3) {
	let dst = global_id.truncate();
	let dst_extent = descriptors.image_extent(param.hiz, param.src_mip + 1);
	if dst.x >= dst_extent.x || dst.y >= dst_extent.y {
		return;
	}
	let src_extent = descriptors.image_extent(param.hiz, param.src_mip);
	let (min, max) = reduce_footprint(dst, src_extent);
	let mut depth = f32::INFINITY;
	for y in min.y..=max.y {
		for x in min.x..=max.x {
			let texel = descriptors.image_load(param.hiz, param.src_mip, UVec2::new(x, y));
			depth = depth.min(texel_to_depth(texel));
		}
	}
	descriptors.image_store(param.hiz, param.src_mip + 1, dst, depth_to_texel(depth));
}

/// A sphere projected onto the screen.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ScreenRect {
	/// pixels, y down
	pub min: Vec2,
	pub max: Vec2,
	/// depth of the point of the sphere closest to the camera, the largest depth with reverse-Z
	pub nearest_depth: f32,
}

/// Projects the screen space bounds of `sphere` onto a screen of `extent` pixels. Returns `None` if the sphere
/// intersects the near plane, where the projection is unbounded.
pub fn project_sphere(camera: &Camera, sphere: Sphere, extent: Vec2) -> Option<ScreenRect> {
	let center = camera.view.transform_point3(sphere.center());
	let radius = sphere.radius();
	// view space looks down -z
	if center.z + radius >= -camera.near {
		return None;
	}

	// the projection of the bounding box encloses the projection of the sphere
	let mut min = Vec2::INFINITY;
	let mut max = Vec2::NEG_INFINITY;
	let mut i = 0;
	while i < 8 {
		let sign = Vec3::new(
			if i & 1 == 0 { -1. } else { 1. },
			if i & 2 == 0 { -1. } else { 1. },
			if i & 4 == 0 { -1. } else { 1. },
		);
		let clip = camera.projection * Vec4::from((center + sign * radius, 1.));
		let ndc = clip.xy() / clip.w;
		min = min.min(ndc);
		max = max.max(ndc);
		i += 1;
	}

	let nearest = camera.projection * Vec4::new(center.x, center.y, center.z + radius, 1.);
	Some(ScreenRect {
		min: Vec2::new(min.x * 0.5 + 0.5, 0.5 - max.y * 0.5) * extent,
		max: Vec2::new(max.x * 0.5 + 0.5, 0.5 - min.y * 0.5) * extent,
		nearest_depth: nearest.z / nearest.w,
	})
}

/// The mip at which the rect spans about 2x2 texels, offset by `bias`.
pub fn select_mip(rect: &ScreenRect, mip_levels: u32, bias: i32) -> u32 {
	let size = (rect.max - rect.min).max_element().max(1.);
	let mip = size.log2().ceil() as i32 + bias;
	mip.clamp(0, mip_levels as i32 - 1) as u32
}

/// The minimum depth of all Hi-Z texels touched by `rect`.
pub fn sample_min(descriptors: &impl Descriptors, hiz: ImageId, rect: &ScreenRect, bias: i32) -> f32 {
	let extent = descriptors.image_extent(hiz, 0);
	let mip_levels = descriptors.image_mip_levels(hiz);
	let last = (extent - 1).as_vec2();
	let pixel_min = rect.min.floor().clamp(Vec2::ZERO, last).as_uvec2();
	let pixel_max = rect.max.floor().clamp(Vec2::ZERO, last).as_uvec2();

	let mut mip = select_mip(rect, mip_levels, bias);
	let (mut lo, mut hi);
	loop {
		lo = texel_of_pixel(pixel_min, extent, mip);
		hi = texel_of_pixel(pixel_max, extent, mip);
		if (hi - lo).max_element() < HIZ_MAX_SAMPLE_SPAN || mip + 1 >= mip_levels {
			break;
		}
		mip += 1;
	}

	let mut depth = f32::INFINITY;
	for y in lo.y..=hi.y {
		for x in lo.x..=hi.x {
			depth = depth.min(texel_to_depth(descriptors.image_load(hiz, mip, UVec2::new(x, y))));
		}
	}
	depth
}

/// Conservative occlusion test of a world space sphere against the Hi-Z.
pub fn is_occluded(descriptors: &impl Descriptors, hiz: ImageId, camera: &Camera, sphere: Sphere, bias: i32) -> bool {
	let extent = descriptors.image_extent(hiz, 0).as_vec2();
	match project_sphere(camera, sphere, extent) {
		Some(rect) => rect.nearest_depth < sample_min(descriptors, hiz, &rect, bias),
		None => false,
	}
}
