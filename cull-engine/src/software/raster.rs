use crate::software::descriptors::SoftwareDescriptors;
use cull_asset_shader::descriptor::{BufferId, Descriptors};
use cull_engine_shader::renderer::camera::ndc_to_screen;
use cull_engine_shader::renderer::indirect::DrawIndexedIndirectCommand;
use cull_engine_shader::renderer::meshlet::visbuffer::VisbufferVertex;
use glam::{UVec2, Vec2, Vec3, Vec4, Vec4Swizzles};
use rayon::prelude::*;
use smallvec::SmallVec;

/// Draws `index_count / 3` triangles in parallel. Triangles are never culled, the fragment stage is invoked for
/// every covered pixel center with the depth interpolated across the triangle and the payload of its first vertex.
/// More than one instance is drawn exactly once.
#[profiling::function]
pub fn draw_indexed<V, F>(
	descriptors: &SoftwareDescriptors,
	command: &DrawIndexedIndirectCommand,
	indices: BufferId<u32>,
	extent: UVec2,
	vertex: V,
	fragment: F,
) where
	V: Fn(u32) -> VisbufferVertex + Sync,
	F: Fn(UVec2, f32, u32) + Sync,
{
	if command.instance_count == 0 {
		return;
	}
	let available = descriptors.buffer_len(indices).saturating_sub(command.first_index);
	let index_count = command.index_count.min(available);
	(0..index_count / 3).into_par_iter().for_each(|triangle| {
		let vertices = [0, 1, 2].map(|k| {
			let index = descriptors.load(indices, command.first_index + triangle * 3 + k);
			vertex(index.wrapping_add_signed(command.vertex_offset))
		});
		let clip = vertices.map(|v| v.clip);
		rasterize_triangle(clip, vertices[0].payload, extent, &fragment);
	});
}

/// Clips against `0 <= z <= w`, the depth range of reverse-Z. Returns a convex polygon.
fn clip_polygon(triangle: [Vec4; 3]) -> SmallVec<[Vec4; 8]> {
	let mut polygon: SmallVec<[Vec4; 8]> = triangle.into_iter().collect();
	for plane in [Vec4::new(0., 0., -1., 1.), Vec4::new(0., 0., 1., 0.)] {
		let input = core::mem::take(&mut polygon);
		for i in 0..input.len() {
			let a = input[i];
			let b = input[(i + 1) % input.len()];
			let (da, db) = (a.dot(plane), b.dot(plane));
			if da >= 0. {
				polygon.push(a);
			}
			if (da >= 0.) != (db >= 0.) {
				polygon.push(a + (b - a) * (da / (da - db)));
			}
		}
	}
	polygon
}

pub fn rasterize_triangle(clip: [Vec4; 3], payload: u32, extent: UVec2, fragment: &impl Fn(UVec2, f32, u32)) {
	if extent.x == 0 || extent.y == 0 {
		return;
	}
	let polygon = clip_polygon(clip);
	if polygon.len() < 3 || polygon.iter().any(|v| v.w <= f32::EPSILON) {
		return;
	}
	let viewport = extent.as_vec2();
	let screen = polygon
		.iter()
		.map(|v| (ndc_to_screen(v.xy() / v.w, viewport), v.z / v.w))
		.collect::<SmallVec<[(Vec2, f32); 8]>>();
	for i in 1..screen.len() - 1 {
		rasterize_screen_triangle([screen[0], screen[i], screen[i + 1]], payload, extent, fragment);
	}
}

fn rasterize_screen_triangle(
	vertices: [(Vec2, f32); 3],
	payload: u32,
	extent: UVec2,
	fragment: &impl Fn(UVec2, f32, u32),
) {
	let [(s0, d0), (s1, d1), (s2, d2)] = vertices;
	let area = (s1 - s0).perp_dot(s2 - s0);
	if area == 0. || !area.is_finite() {
		return;
	}

	let last = (extent - 1).as_vec2();
	let min = ((s0.min(s1).min(s2) - 0.5).ceil()).clamp(Vec2::ZERO, last);
	let max = ((s0.max(s1).max(s2) - 0.5).floor()).clamp(Vec2::splat(-1.), last);
	if max.x < min.x || max.y < min.y {
		return;
	}

	let depths = Vec3::new(d0, d1, d2);
	for y in min.y as u32..=max.y as u32 {
		for x in min.x as u32..=max.x as u32 {
			let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
			let weights = Vec3::new(
				(s2 - s1).perp_dot(p - s1),
				(s0 - s2).perp_dot(p - s2),
				(s1 - s0).perp_dot(p - s0),
			) / area;
			// both windings are drawn
			if weights.min_element() < 0. {
				continue;
			}
			let depth = weights.dot(depths).clamp(0., 1.);
			fragment(UVec2::new(x, y), depth, payload);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use approx::assert_relative_eq;
	use parking_lot::Mutex;

	fn collect(clip: [Vec4; 3], extent: UVec2) -> Vec<(UVec2, f32)> {
		let out = Mutex::new(Vec::new());
		rasterize_triangle(clip, 0, extent, &|coord, depth, _| out.lock().push((coord, depth)));
		let mut out = out.into_inner();
		out.sort_by_key(|(c, _)| (c.y, c.x));
		out
	}

	#[test]
	fn full_screen_quad_covers_every_pixel_once() {
		let extent = UVec2::new(8, 5);
		let v = |x: f32, y: f32| Vec4::new(x, y, 0.5, 1.);
		let mut pixels = collect([v(-1., -1.), v(1., -1.), v(1., 1.)], extent);
		// opposite winding on purpose
		pixels.extend(collect([v(-1., -1.), v(-1., 1.), v(1., 1.)], extent));
		assert!(pixels.iter().all(|(_, d)| (*d - 0.5).abs() < 1e-6));
		for y in 0..extent.y {
			for x in 0..extent.x {
				let count = pixels.iter().filter(|(c, _)| *c == UVec2::new(x, y)).count();
				// no pixel center lies on the shared diagonal
				assert_eq!(count, 1, "pixel {x} {y}");
			}
		}
	}

	#[test]
	fn behind_near_plane_is_clipped() {
		let extent = UVec2::new(8, 8);
		// z > w lies between the camera and the near plane with reverse-Z
		let v = |x: f32, y: f32| Vec4::new(x, y, 2., 1.);
		assert!(collect([v(-1., -1.), v(1., -1.), v(1., 1.)], extent).is_empty());
	}

	#[test]
	fn depth_is_interpolated() {
		let extent = UVec2::new(2, 1);
		let clip = [
			Vec4::new(-1., -1., 0., 1.),
			Vec4::new(3., -1., 1., 1.),
			Vec4::new(-1., 3., 0., 1.),
		];
		let pixels = collect(clip, extent);
		assert_eq!(pixels.len(), 2);
		// pixel centers at ndc x -0.5 and 0.5, depth grows by 1 over 4 ndc units
		assert_relative_eq!(pixels[0].1, 0.125, epsilon = 1e-5);
		assert_relative_eq!(pixels[1].1, 0.375, epsilon = 1e-5);
	}
}
