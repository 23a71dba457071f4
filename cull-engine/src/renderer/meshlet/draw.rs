use crate::renderer::bindless::Bindless;
use crate::renderer::geometry_context::GeometryContext;
use crate::renderer::meshlet::cull::PhaseOutput;
use crate::renderer::orchestrator::FrameTargets;
use crate::renderer::pipelines::{VISBUFFER_DEPTH_ONLY, VISBUFFER_ENCODE};
use crate::renderer::render_graph::graph::{FrameGraph, RecordError};
use crate::renderer::render_graph::pass::Pass;
use cull_asset_shader::descriptor::ImageId;
use cull_engine_shader::renderer::hiz::depth_to_texel;
use cull_engine_shader::renderer::meshlet::visbuffer::{Param, VISBUFFER_CLEAR};
use cull_engine_shader::renderer::phase::Phase;

/// Records the draw of a phase's surviving triangles. The early phase clears the targets, the late phase draws on
/// top of them.
#[profiling::function]
pub fn record_draw<B: Bindless>(
	graph: &mut FrameGraph<B>,
	ctx: &GeometryContext,
	targets: &FrameTargets,
	cull: &PhaseOutput,
) -> Result<(), RecordError> {
	let phase = ctx.phase;
	if phase == Phase::Early {
		graph.add_pass(Pass::clear_image("clear depth", targets.depth, 0..1, depth_to_texel(0.)))?;
		if let Some(visbuffer) = targets.visbuffer {
			graph.add_pass(Pass::clear_image("clear visbuffer", visbuffer, 0..1, VISBUFFER_CLEAR))?;
		}
		if let Some(overdraw) = targets.overdraw {
			graph.add_pass(Pass::clear_image("clear overdraw", overdraw, 0..1, 0))?;
		}
	}

	let frame = &ctx.frame;
	let param = Param {
		camera: frame.camera_buffer,
		model: frame.model,
		instances: frame.instances,
		transforms: frame.transforms,
		meshlet_instances: ctx.meshlet_instances.buffer(),
		visbuffer: targets.visbuffer.unwrap_or(ImageId::INVALID),
		depth: targets.depth,
		overdraw: targets.overdraw.unwrap_or(ImageId::INVALID),
	};
	let pipeline = if targets.visbuffer.is_some() {
		VISBUFFER_ENCODE
	} else {
		VISBUFFER_DEPTH_ONLY
	};
	let mut pass = Pass::draw_indexed_indirect(
		format!("{:?} draw", phase),
		pipeline,
		cull.draw_command,
		cull.indices,
		targets.extent,
		&param,
	);
	pass = frame.read(pass).read(ctx.meshlet_instances.buffer()).attachment(targets.depth);
	for target in [targets.visbuffer, targets.overdraw].into_iter().flatten() {
		pass = pass.attachment(target);
	}
	graph.add_pass(pass)?;
	Ok(())
}
