use crate::config::CullConfig;
use crate::renderer::bindless::Bindless;
use crate::renderer::compacting_alloc_buffer::CompactingAllocBufferReading;
use crate::renderer::frame_context::{FrameContext, SceneInput};
use crate::renderer::geometry_context::{DebugDraw, GeometryContext};
use crate::renderer::hiz::{HiZImage, ViewState, record_build};
use crate::renderer::meshlet::cull::{PhaseOutput, record_cull};
use crate::renderer::meshlet::draw::record_draw;
use crate::renderer::pipelines::{PipelineError, verify_pipelines};
use crate::renderer::render_graph::graph::{FrameGraph, RecordError};
use cull_asset_shader::descriptor::ImageId;
use cull_asset_shader::meshlet::instance::MeshletInstance;
use glam::UVec2;

/// Attachments the geometry is drawn into, owned by the caller.
#[derive(Copy, Clone, Debug)]
pub struct FrameTargets {
	/// `R32Float`, reverse-Z
	pub depth: ImageId,
	/// `R64Uint`, only depth is written without one
	pub visbuffer: Option<ImageId>,
	/// `R32Uint` fragment counter
	pub overdraw: Option<ImageId>,
	pub extent: UVec2,
}

/// The steps of recording a frame, in order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FramePhase {
	Idle,
	EarlyCull,
	EarlyDraw,
	HiZBuild,
	LateCull,
	LateDraw,
	Done,
}

impl FramePhase {
	pub fn next(self) -> Option<Self> {
		match self {
			FramePhase::Idle => Some(FramePhase::EarlyCull),
			FramePhase::EarlyCull => Some(FramePhase::EarlyDraw),
			FramePhase::EarlyDraw => Some(FramePhase::HiZBuild),
			FramePhase::HiZBuild => Some(FramePhase::LateCull),
			FramePhase::LateCull => Some(FramePhase::LateDraw),
			FramePhase::LateDraw => Some(FramePhase::Done),
			FramePhase::Done => None,
		}
	}
}

struct PhaseTracker {
	phases: Vec<FramePhase>,
}

impl PhaseTracker {
	fn new() -> Self {
		Self {
			phases: vec![FramePhase::Idle],
		}
	}

	fn current(&self) -> FramePhase {
		self.phases.last().copied().unwrap_or(FramePhase::Idle)
	}

	fn enter(&mut self, to: FramePhase) {
		let from = self.current();
		debug_assert_eq!(from.next(), Some(to), "invalid transition from {from:?} to {to:?}");
		log::debug!("{:?} -> {:?}", from, to);
		self.phases.push(to);
	}
}

/// Handles of everything a recorded frame produced.
///
/// With [`CullConfig::retain_outputs`] the buffers stay alive after execution for inspection and must be
/// [freed](Self::free). Otherwise the device releases them once their last pass ran, and they must not be read.
#[derive(Debug)]
pub struct FrameOutput {
	pub early: PhaseOutput,
	pub late: PhaseOutput,
	pub meshlet_instances: CompactingAllocBufferReading<MeshletInstance>,
	pub hiz: HiZImage,
	pub debug_draw: Option<DebugDraw>,
	/// every phase visited, starting with [`FramePhase::Idle`]
	pub phases: Vec<FramePhase>,
	pub retained: bool,
}

impl FrameOutput {
	/// Frees the retained buffers, does nothing if they were never retained.
	pub fn free(self, bindless: &impl Bindless) {
		if !self.retained {
			return;
		}
		self.early.free(bindless);
		self.late.free(bindless);
		bindless.free(self.meshlet_instances.buffer().into());
		bindless.free(self.meshlet_instances.counter().into());
		if let Some(debug) = self.debug_draw {
			bindless.free(debug.command.into());
			bindless.free(debug.spheres.into());
		}
	}
}

/// Records the two phase culling and drawing of a view.
///
/// The early phase tests against the previous frame's Hi-Z and draws what survives. A Hi-Z is then built from the
/// early depth, and the late phase tests every meshlet instance the early phase did not draw against it. Anything
/// the early phase wrongly culled is drawn late, so the final image matches one without occlusion culling.
pub struct GeometryPipeline {
	config: CullConfig,
}

impl GeometryPipeline {
	pub fn new(bindless: &impl Bindless, config: CullConfig) -> Result<Self, PipelineError> {
		verify_pipelines(bindless)?;
		Ok(Self { config })
	}

	pub fn config(&self) -> &CullConfig {
		&self.config
	}

	pub fn set_config(&mut self, config: CullConfig) {
		self.config = config;
	}

	/// Records a frame. `view` is marked valid, the next frame trusts its Hi-Z once this frame has executed.
	#[profiling::function]
	pub fn record<B: Bindless>(
		&self,
		graph: &mut FrameGraph<B>,
		scene: &SceneInput,
		targets: &FrameTargets,
		view: &mut ViewState,
	) -> Result<FrameOutput, RecordError> {
		let mut tracker = PhaseTracker::new();
		let hiz = view.prepare(graph.bindless(), targets.extent)?;
		let previous_hiz = view.is_valid().then_some(hiz);
		if previous_hiz.is_none() {
			log::debug!("no valid hiz, early phase culls without occlusion");
		}

		let frame = FrameContext::upload(graph, scene)?;

		tracker.enter(FramePhase::EarlyCull);
		let early_ctx = GeometryContext::early(graph, frame, self.config, previous_hiz)?;
		let early = record_cull(graph, &early_ctx)?;

		tracker.enter(FramePhase::EarlyDraw);
		record_draw(graph, &early_ctx, targets, &early)?;

		tracker.enter(FramePhase::HiZBuild);
		record_build(graph, targets.depth, &hiz)?;

		tracker.enter(FramePhase::LateCull);
		let late_ctx = early_ctx.into_late(hiz);
		let late = record_cull(graph, &late_ctx)?;

		tracker.enter(FramePhase::LateDraw);
		record_draw(graph, &late_ctx, targets, &late)?;

		tracker.enter(FramePhase::Done);
		view.set_valid();

		let retained = self.config.retain_outputs;
		if retained {
			early.retain(graph);
			late.retain(graph);
			late_ctx.meshlet_instances.retain(graph);
			if let Some(debug) = late_ctx.debug_draw {
				graph.retain(debug.command);
				graph.retain(debug.spheres);
			}
		}
		Ok(FrameOutput {
			early,
			late,
			meshlet_instances: late_ctx.meshlet_instances,
			hiz,
			debug_draw: late_ctx.debug_draw,
			phases: tracker.phases,
			retained,
		})
	}
}
