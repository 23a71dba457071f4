use crate::renderer::bindless::{Bindless, BufferUsage};
use crate::renderer::compacting_alloc_buffer::{CompactingAllocBuffer, CompactingAllocBufferReading};
use crate::renderer::geometry_context::GeometryContext;
use crate::renderer::pipelines::{CULL_MESHLETS, CULL_TRIANGLES, GENERATE_CULL_COMMANDS};
use crate::renderer::render_graph::graph::{FrameGraph, RecordError};
use crate::renderer::render_graph::pass::Pass;
use cull_asset_shader::descriptor::{BufferId, ImageId};
use cull_asset_shader::meshlet::MESHLET_MAX_TRIANGLES;
use cull_engine_shader::renderer::indirect::{DispatchIndirectCommand, DrawIndexedIndirectCommand};
use cull_engine_shader::renderer::meshlet::cull_meshlets::CULL_MESHLETS_WG_SIZE;
use cull_engine_shader::renderer::meshlet::cull_triangles::CULL_TRIANGLES_WG_SIZE;
use cull_engine_shader::renderer::meshlet::{cull_meshlets, cull_triangles, generate_cull_commands};
use cull_engine_shader::renderer::phase::Phase;
use glam::UVec3;

/// Handles of everything a phase's culling produced.
#[derive(Copy, Clone, Debug)]
pub struct PhaseOutput {
	pub phase: Phase,
	pub meshlet_dispatch: BufferId<DispatchIndirectCommand>,
	/// indices into the meshlet instances
	pub visible_meshlets: CompactingAllocBufferReading<u32>,
	pub triangle_dispatch: BufferId<DispatchIndirectCommand>,
	pub indices: BufferId<u32>,
	pub draw_command: BufferId<DrawIndexedIndirectCommand>,
}

impl PhaseOutput {
	pub fn retain<B: Bindless>(&self, graph: &mut FrameGraph<B>) {
		graph.retain(self.meshlet_dispatch);
		self.visible_meshlets.retain(graph);
		graph.retain(self.triangle_dispatch);
		graph.retain(self.indices);
		graph.retain(self.draw_command);
	}

	pub fn free(&self, bindless: &impl Bindless) {
		bindless.free(self.meshlet_dispatch.into());
		bindless.free(self.visible_meshlets.buffer().into());
		bindless.free(self.visible_meshlets.counter().into());
		bindless.free(self.triangle_dispatch.into());
		bindless.free(self.indices.into());
		bindless.free(self.draw_command.into());
	}
}

/// Records turning `count` into the indirect dispatch of the next stage.
fn record_generate_commands<B: Bindless>(
	graph: &mut FrameGraph<B>,
	name: &str,
	count: BufferId<u32>,
	items_per_count: u32,
	workgroup_size: u32,
) -> Result<BufferId<DispatchIndirectCommand>, RecordError> {
	let out_args = graph.transient_buffer(
		name,
		BufferUsage::STORAGE_BUFFER | BufferUsage::INDIRECT_BUFFER,
		1,
	)?;
	let param = generate_cull_commands::Param {
		count,
		count_word: 0,
		out_args,
		items_per_count,
		workgroup_size,
	};
	graph.add_pass(
		Pass::dispatch(name, GENERATE_CULL_COMMANDS, UVec3::ONE, &param)
			.read(count)
			.write(out_args),
	)?;
	Ok(out_args)
}

/// Records the meshlet and triangle cull of a phase, filling a fresh index buffer and draw command.
#[profiling::function]
pub fn record_cull<B: Bindless>(graph: &mut FrameGraph<B>, ctx: &GeometryContext) -> Result<PhaseOutput, RecordError> {
	let phase = ctx.phase;
	let frame = &ctx.frame;
	let flags = ctx.config.cull_flags.bits();

	let meshlet_dispatch = record_generate_commands(
		graph,
		&format!("{:?} meshlet cull args", phase),
		ctx.meshlet_instances.counter(),
		1,
		CULL_MESHLETS_WG_SIZE,
	)?;

	let visible = CompactingAllocBuffer::<u32>::new(
		graph,
		&format!("{:?} visible meshlets", phase),
		ctx.meshlet_instances.capacity(),
	)?
	.transition_writing(graph)?;
	let param = cull_meshlets::Param {
		camera: frame.camera_buffer,
		model: frame.model,
		instances: frame.instances,
		transforms: frame.transforms,
		meshlet_instances: ctx.meshlet_instances.to_reader(),
		out_visible: visible.to_writer(),
		visibility_bitmask: ctx.visibility_bitmask,
		hiz: ctx.hiz.map_or(ImageId::INVALID, |hiz| hiz.image),
		hiz_valid: ctx.hiz.is_some() as u32,
		phase: phase.into(),
		cull_flags: flags,
		hiz_mip_bias: ctx.config.hiz_mip_bias,
	};
	let mut pass = Pass::dispatch_indirect(
		format!("{:?} cull meshlets", phase),
		CULL_MESHLETS,
		meshlet_dispatch,
		&param,
	);
	pass = visible.write(ctx.meshlet_instances.read(frame.read(pass))).read_write(ctx.visibility_bitmask);
	if let Some(hiz) = ctx.hiz {
		pass = hiz.sample(pass);
	}
	graph.add_pass(pass)?;
	let visible = visible.transition_reading();

	let triangle_dispatch = record_generate_commands(
		graph,
		&format!("{:?} triangle cull args", phase),
		visible.counter(),
		MESHLET_MAX_TRIANGLES,
		CULL_TRIANGLES_WG_SIZE,
	)?;

	let indices = graph.transient_buffer(
		&format!("{:?} indices", phase),
		BufferUsage::STORAGE_BUFFER | BufferUsage::INDEX_BUFFER,
		frame.triangle_capacity as usize * 3,
	)?;
	let draw_command = graph.transient_buffer(
		&format!("{:?} draw command", phase),
		BufferUsage::STORAGE_BUFFER | BufferUsage::INDIRECT_BUFFER | BufferUsage::TRANSFER_DST,
		1,
	)?;
	graph.add_pass(Pass::write_buffer(
		format!("{:?} init draw command", phase),
		draw_command,
		0,
		&[DrawIndexedIndirectCommand::EMPTY],
	))?;

	let param = cull_triangles::Param {
		camera: frame.camera_buffer,
		model: frame.model,
		instances: frame.instances,
		transforms: frame.transforms,
		meshlet_instances: ctx.meshlet_instances.buffer(),
		visible: visible.to_reader(),
		out_indices: indices,
		draw_command,
		cull_flags: flags,
		micro_triangle_area: ctx.config.micro_triangle_area,
	};
	let pass = Pass::dispatch_indirect(
		format!("{:?} cull triangles", phase),
		CULL_TRIANGLES,
		triangle_dispatch,
		&param,
	);
	graph.add_pass(
		visible
			.read(ctx.meshlet_instances.read(frame.read(pass)))
			.write(indices)
			.read_write(draw_command),
	)?;

	Ok(PhaseOutput {
		phase,
		meshlet_dispatch,
		visible_meshlets: visible,
		triangle_dispatch,
		indices,
		draw_command,
	})
}
