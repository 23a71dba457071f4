use cull_engine_shader::renderer::cull_flags::CullFlags;

/// Tunables of the culling pipeline. None of them change buffer layouts, they may differ from frame to frame.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CullConfig {
	pub cull_flags: CullFlags,
	/// triangles with a smaller screen space area in pixels² are culled
	pub micro_triangle_area: f32,
	/// added to the Hi-Z mip an occlusion test samples, negative values sample finer mips
	pub hiz_mip_bias: i32,
	/// emit a bounding sphere for every surviving mesh instance
	pub debug_draw_bounds: bool,
	/// keep the per-phase buffers of a frame alive after execution, see [`FrameOutput`](crate::renderer::orchestrator::FrameOutput)
	pub retain_outputs: bool,
}

impl Default for CullConfig {
	fn default() -> Self {
		Self {
			cull_flags: CullFlags::all(),
			micro_triangle_area: 0.25,
			hiz_mip_bias: 0,
			debug_draw_bounds: false,
			retain_outputs: false,
		}
	}
}

impl CullConfig {
	pub fn with_flags(self, cull_flags: CullFlags) -> Self {
		Self { cull_flags, ..self }
	}

	pub fn with_retained_outputs(self) -> Self {
		Self {
			retain_outputs: true,
			..self
		}
	}
}
