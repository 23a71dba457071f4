use crate::config::CullConfig;
use crate::renderer::bindless::{Bindless, BufferUsage};
use crate::renderer::compacting_alloc_buffer::{CompactingAllocBuffer, CompactingAllocBufferReading};
use crate::renderer::frame_context::FrameContext;
use crate::renderer::hiz::HiZImage;
use crate::renderer::pipelines::CULL_MESHES;
use crate::renderer::render_graph::graph::{FrameGraph, RecordError};
use crate::renderer::render_graph::pass::Pass;
use cull_asset_shader::descriptor::BufferId;
use cull_asset_shader::meshlet::instance::MeshletInstance;
use cull_asset_shader::shape::sphere::Sphere;
use cull_engine_shader::renderer::compacting_alloc_buffer::CompactingAllocBufferWriter;
use cull_engine_shader::renderer::debug_draw::{DEBUG_SPHERE_DRAW, debug_sphere_writer};
use cull_engine_shader::renderer::indirect::DrawIndirectCommand;
use cull_engine_shader::renderer::meshlet::cull_meshes::{CULL_MESHES_WG_SIZE, Param};
use cull_engine_shader::renderer::meshlet::cull_meshlets::bitmask_words;
use cull_engine_shader::renderer::phase::Phase;
use glam::UVec3;

/// Bounding spheres of all mesh instances surviving the mesh cull, drawn as line lists.
#[derive(Copy, Clone, Debug)]
pub struct DebugDraw {
	pub command: BufferId<DrawIndirectCommand>,
	pub spheres: BufferId<Sphere>,
}

/// Everything a single phase culls and draws with. The late context is derived from the early one, sharing its
/// meshlet instances and visibility bitmask.
#[derive(Debug)]
pub struct GeometryContext {
	pub phase: Phase,
	pub config: CullConfig,
	pub frame: FrameContext,
	pub meshlet_instances: CompactingAllocBufferReading<MeshletInstance>,
	/// one bit per meshlet instance, cleared at the start of the frame
	pub visibility_bitmask: BufferId<u32>,
	/// the Hi-Z to test occlusion against, `None` if there is no valid one
	pub hiz: Option<HiZImage>,
	pub debug_draw: Option<DebugDraw>,
}

impl GeometryContext {
	/// Records the mesh instance cull expanding all instances into meshlet instances.
	#[profiling::function]
	pub fn early<B: Bindless>(
		graph: &mut FrameGraph<B>,
		frame: FrameContext,
		config: CullConfig,
		hiz: Option<HiZImage>,
	) -> Result<Self, RecordError> {
		let meshlet_instances =
			CompactingAllocBuffer::<MeshletInstance>::new(graph, "meshlet instances", frame.meshlet_capacity)?
				.transition_writing(graph)?;

		let visibility_bitmask = graph.transient_buffer(
			"visibility bitmask",
			BufferUsage::STORAGE_BUFFER | BufferUsage::TRANSFER_DST,
			bitmask_words(frame.meshlet_capacity) as usize,
		)?;
		graph.add_pass(Pass::fill_buffer("clear visibility bitmask", visibility_bitmask, 0))?;

		let (debug_draw, debug_spheres) = if config.debug_draw_bounds {
			let command = graph.transient_buffer(
				"debug sphere draw",
				BufferUsage::STORAGE_BUFFER | BufferUsage::INDIRECT_BUFFER | BufferUsage::TRANSFER_DST,
				1,
			)?;
			graph.add_pass(Pass::write_buffer("init debug sphere draw", command, 0, &[DEBUG_SPHERE_DRAW]))?;
			let spheres = graph.transient_buffer(
				"debug spheres",
				BufferUsage::STORAGE_BUFFER,
				frame.num_instances as usize,
			)?;
			(Some(DebugDraw { command, spheres }), debug_sphere_writer(command, spheres))
		} else {
			(None, CompactingAllocBufferWriter::INVALID)
		};

		let param = Param {
			camera: frame.camera_buffer,
			model: frame.model,
			instances: frame.instances,
			transforms: frame.transforms,
			out_meshlet_instances: meshlet_instances.to_writer(),
			debug_spheres,
			num_instances: frame.num_instances,
			cull_flags: config.cull_flags.bits(),
			debug_draw: debug_draw.is_some() as u32,
		};
		let mut pass = Pass::dispatch(
			"cull meshes",
			CULL_MESHES,
			UVec3::new(frame.num_instances.div_ceil(CULL_MESHES_WG_SIZE), 1, 1),
			&param,
		);
		pass = meshlet_instances.write(frame.read(pass));
		if let Some(debug) = debug_draw {
			pass = pass.write(debug.spheres).read_write(debug.command);
		}
		graph.add_pass(pass)?;

		Ok(Self {
			phase: Phase::Early,
			config,
			frame,
			meshlet_instances: meshlet_instances.transition_reading(),
			visibility_bitmask,
			hiz,
			debug_draw,
		})
	}

	/// The late phase tests against the Hi-Z built from the early phase's depth.
	pub fn into_late(self, hiz: HiZImage) -> Self {
		Self {
			phase: Phase::Late,
			hiz: Some(hiz),
			..self
		}
	}
}
