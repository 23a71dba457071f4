use crate::renderer::compacting_alloc_buffer::CompactingAllocBufferWriter;
use crate::renderer::indirect::DrawIndirectCommand;
use cull_asset_shader::descriptor::BufferId;
use cull_asset_shader::shape::sphere::Sphere;
use glam::Vec3;
#[cfg(target_arch = "spirv")]
use num_traits::Float;

pub const DEBUG_SPHERE_SEGMENTS: u32 = 32;

/// three axis-aligned circles drawn as a line list
pub const DEBUG_SPHERE_VERTICES: u32 = 3 * DEBUG_SPHERE_SEGMENTS * 2;

/// Initial contents of the debug sphere draw, every surviving instance adds an instance.
pub const DEBUG_SPHERE_DRAW: DrawIndirectCommand = DrawIndirectCommand {
	vertex_count: DEBUG_SPHERE_VERTICES,
	instance_count: 0,
	first_vertex: 0,
	first_instance: 0,
};

pub fn debug_sphere_writer(
	command: BufferId<DrawIndirectCommand>,
	spheres: BufferId<Sphere>,
) -> CompactingAllocBufferWriter<Sphere> {
	CompactingAllocBufferWriter {
		buffer: spheres,
		counter: command.cast(),
		counter_word: DrawIndirectCommand::INSTANCE_COUNT_WORD,
	}
}

/// World space position of line list vertex `vertex_index` of the debug sphere `sphere`.
pub fn debug_sphere_vertex(sphere: Sphere, vertex_index: u32) -> Vec3 {
	let circle = vertex_index / (DEBUG_SPHERE_SEGMENTS * 2);
	let segment = (vertex_index % (DEBUG_SPHERE_SEGMENTS * 2)) / 2 + vertex_index % 2;
	let angle = segment as f32 / DEBUG_SPHERE_SEGMENTS as f32 * core::f32::consts::TAU;
	let (s, c) = (angle.sin(), angle.cos());
	let offset = match circle {
		0 => Vec3::new(c, s, 0.),
		1 => Vec3::new(c, 0., s),
		_ => Vec3::new(0., c, s),
	};
	sphere.center() + offset * sphere.radius()
}

#[cfg(test)]
mod tests {
	use super::*;
	use approx::assert_relative_eq;

	#[test]
	fn vertices_on_sphere() {
		let sphere = Sphere::new(Vec3::new(1., 2., 3.), 2.5);
		for i in 0..DEBUG_SPHERE_VERTICES {
			let v = debug_sphere_vertex(sphere, i);
			assert_relative_eq!(v.distance(sphere.center()), sphere.radius(), epsilon = 1e-4);
		}
	}

	#[test]
	fn lines_are_connected() {
		let sphere = Sphere::new(Vec3::ZERO, 1.);
		// within a circle the end of each line is the start of the next one
		for i in (1..DEBUG_SPHERE_VERTICES - 1).step_by(2).filter(|i| (i + 1) % (DEBUG_SPHERE_SEGMENTS * 2) != 0) {
			let end = debug_sphere_vertex(sphere, i);
			let start = debug_sphere_vertex(sphere, i + 1);
			assert!(end.abs_diff_eq(start, 1e-5), "{i}: {end} != {start}");
		}
	}
}
