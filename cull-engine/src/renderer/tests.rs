use crate::config::CullConfig;
use crate::geometry::builder::{GeometryModel, MeshletModelCpu};
use crate::geometry::shapes;
use crate::renderer::bindless::{Bindless, BindlessImageCreateInfo, ImageFormat, ImageUsage};
use crate::renderer::frame_context::SceneInput;
use crate::renderer::hiz::ViewState;
use crate::renderer::meshlet::cull::PhaseOutput;
use crate::renderer::orchestrator::{FramePhase, FrameTargets, GeometryPipeline};
use crate::renderer::pipelines::{PipelineError, VISBUFFER_DEPTH_ONLY};
use crate::renderer::render_graph::graph::{FrameGraph, RecordError};
use crate::software::device::SoftwareDevice;
use bytemuck::Pod;
use cull_asset_shader::affine_transform::AffineTransform;
use cull_asset_shader::descriptor::{BufferId, ImageId};
use cull_asset_shader::meshlet::instance::{MeshInstance, MeshletInstance};
use cull_engine_shader::renderer::camera::Camera;
use cull_engine_shader::renderer::cull_flags::CullFlags;
use cull_engine_shader::renderer::hiz::{depth_to_texel, mip_extent, reduce_footprint, texel_to_depth};
use cull_engine_shader::renderer::meshlet::visbuffer::{decode_payload, decode_texel};
use glam::{Affine3A, Quat, UVec2, Vec2, Vec3, Vec4Swizzles};
use std::collections::HashSet;

const EXTENT: UVec2 = UVec2::new(64, 64);

const CUBE: u32 = 0;
const WALL: u32 = 1;
const TRIANGLE: u32 = 2;

fn build_model(device: &SoftwareDevice) -> anyhow::Result<GeometryModel> {
	let mut model = MeshletModelCpu::new();
	let (positions, indices) = shapes::cube();
	assert_eq!(model.add_mesh(&positions, &indices)?, CUBE);
	let (positions, indices) = shapes::quad(Vec2::splat(3.));
	assert_eq!(model.add_mesh(&positions, &indices)?, WALL);
	let (positions, indices) = shapes::triangle(Vec2::new(-1., -1.), Vec2::new(1., -1.), Vec2::new(-1., 1.));
	assert_eq!(model.add_mesh(&positions, &indices)?, TRIANGLE);
	Ok(model.upload(device)?)
}

fn camera() -> Camera {
	Camera::look_at_reverse_z(Vec3::ZERO, Vec3::NEG_Z, 90f32.to_radians(), 0.1, 100., EXTENT)
}

fn placed(translation: Vec3, scale: f32) -> AffineTransform {
	AffineTransform::new(Affine3A::from_scale_rotation_translation(
		Vec3::splat(scale),
		Quat::IDENTITY,
		translation,
	))
}

/// A wall with a cube hidden behind it, a few visible cubes and one behind the camera.
struct Scene {
	instances: Vec<MeshInstance>,
	transforms: Vec<AffineTransform>,
}

const OCCLUDEE: u32 = 1;
const OUTSIDE: u32 = 4;

impl Scene {
	fn empty() -> Self {
		Self {
			instances: Vec::new(),
			transforms: Vec::new(),
		}
	}

	fn new() -> Self {
		let mut scene = Self::empty();
		scene.add(WALL, placed(Vec3::new(0., 0., -5.), 1.));
		scene.add(CUBE, placed(Vec3::new(0.3, 0.2, -12.), 1.));
		scene.add(CUBE, placed(Vec3::new(-2.7, 1.9, -4.), 1.));
		scene.add(CUBE, placed(Vec3::new(4.3, -3.1, -9.), 2.));
		scene.add(CUBE, placed(Vec3::new(0., 0., 10.), 1.));
		scene.add(CUBE, placed(Vec3::new(1.7, -1.3, -3.), 0.5));
		scene
	}

	fn add(&mut self, mesh_id: u32, transform: AffineTransform) -> u32 {
		let id = self.instances.len() as u32;
		self.instances.push(MeshInstance::new(mesh_id, self.transforms.len() as u32, 0));
		self.transforms.push(transform);
		id
	}

	fn input<'a>(&'a self, model: &'a GeometryModel) -> SceneInput<'a> {
		SceneInput {
			model,
			camera: camera(),
			instances: &self.instances,
			transforms: &self.transforms,
		}
	}
}

fn target_image(device: &SoftwareDevice, format: ImageFormat, name: &str) -> anyhow::Result<ImageId> {
	Ok(device.alloc_image(&BindlessImageCreateInfo {
		usage: ImageUsage::ATTACHMENT | ImageUsage::SAMPLED,
		format,
		extent: EXTENT,
		mip_levels: 1,
		name,
	})?)
}

fn targets(device: &SoftwareDevice, visbuffer: bool) -> anyhow::Result<FrameTargets> {
	let image = |format, name| target_image(device, format, name);
	Ok(FrameTargets {
		depth: image(ImageFormat::R32Float, "depth")?,
		visbuffer: if visbuffer {
			Some(image(ImageFormat::R64Uint, "visbuffer")?)
		} else {
			None
		},
		overdraw: None,
		extent: EXTENT,
	})
}

/// (depth bits, instance, meshlet, triangle)
type Pixel = Option<(u32, u32, u32, u32)>;

#[derive(Debug)]
struct RenderedFrame {
	phases: Vec<FramePhase>,
	early_index_count: u32,
	late_index_count: u32,
	early_visible: Vec<MeshletInstance>,
	late_visible: Vec<MeshletInstance>,
	visbuffer: Vec<Pixel>,
	depth: Vec<u64>,
	/// fragments per pixel, empty without an overdraw target
	overdraw: Vec<u64>,
	debug_spheres: Option<u32>,
}

impl RenderedFrame {
	fn visible_instances(&self) -> HashSet<u32> {
		self.early_visible
			.iter()
			.chain(&self.late_visible)
			.map(|m| m.instance_id)
			.collect()
	}
}

fn read_list<T: Pod>(device: &SoftwareDevice, buffer: BufferId<T>, counter: BufferId<u32>) -> anyhow::Result<Vec<T>> {
	let count = device.read_buffer(counter)?[0];
	let mut data = device.read_buffer(buffer)?;
	data.truncate(count as usize);
	Ok(data)
}

fn render(
	device: &SoftwareDevice,
	pipeline: &GeometryPipeline,
	scene: &SceneInput,
	targets: &FrameTargets,
	view: &mut ViewState,
) -> anyhow::Result<RenderedFrame> {
	let mut graph = FrameGraph::new(device);
	let output = pipeline.record(&mut graph, scene, targets, view)?;
	device.execute(graph)?;

	let meshlet_instances = read_list(
		device,
		output.meshlet_instances.buffer(),
		output.meshlet_instances.counter(),
	)?;
	let visible = |phase: &PhaseOutput| -> anyhow::Result<Vec<MeshletInstance>> {
		let ids = read_list(device, phase.visible_meshlets.buffer(), phase.visible_meshlets.counter())?;
		Ok(ids.into_iter().map(|id| meshlet_instances[id as usize]).collect())
	};
	let visbuffer = match targets.visbuffer {
		Some(visbuffer) => device
			.read_image(visbuffer, 0)?
			.into_iter()
			.map(|texel| {
				let (depth, payload) = decode_texel(texel);
				decode_payload(payload).map(|(mi, triangle)| {
					let m = meshlet_instances[mi as usize];
					(depth.to_bits(), m.instance_id, m.meshlet_id, triangle)
				})
			})
			.collect(),
		None => Vec::new(),
	};
	let frame = RenderedFrame {
		phases: output.phases.clone(),
		early_index_count: device.read_buffer(output.early.draw_command)?[0].index_count,
		late_index_count: device.read_buffer(output.late.draw_command)?[0].index_count,
		early_visible: visible(&output.early)?,
		late_visible: visible(&output.late)?,
		visbuffer,
		depth: device.read_image(targets.depth, 0)?,
		overdraw: match targets.overdraw {
			Some(overdraw) => device.read_image(overdraw, 0)?,
			None => Vec::new(),
		},
		debug_spheres: match output.debug_draw {
			Some(debug) => Some(device.read_buffer(debug.command)?[0].instance_count),
			None => None,
		},
	};
	output.free(device);
	Ok(frame)
}

struct Harness {
	device: SoftwareDevice,
	model: GeometryModel,
}

impl Harness {
	fn new() -> anyhow::Result<Self> {
		let device = SoftwareDevice::new();
		let model = build_model(&device)?;
		Ok(Self { device, model })
	}

	fn pipeline(&self, flags: CullFlags) -> anyhow::Result<GeometryPipeline> {
		Ok(GeometryPipeline::new(
			&self.device,
			CullConfig::default().with_flags(flags).with_retained_outputs(),
		)?)
	}

	/// Renders `frames` frames of a fresh view, returning the last one.
	fn render_frames(&self, flags: CullFlags, scene: &Scene, frames: usize) -> anyhow::Result<RenderedFrame> {
		let pipeline = self.pipeline(flags)?;
		let targets = targets(&self.device, true)?;
		let mut view = ViewState::new();
		let mut last = None;
		for _ in 0..frames {
			last = Some(render(&self.device, &pipeline, &scene.input(&self.model), &targets, &mut view)?);
		}
		view.free(&self.device);
		last.ok_or_else(|| anyhow::anyhow!("no frames rendered"))
	}
}

#[test]
fn phase_sequence() -> anyhow::Result<()> {
	let harness = Harness::new()?;
	let frame = harness.render_frames(CullFlags::all(), &Scene::new(), 1)?;
	assert_eq!(
		frame.phases,
		vec![
			FramePhase::Idle,
			FramePhase::EarlyCull,
			FramePhase::EarlyDraw,
			FramePhase::HiZBuild,
			FramePhase::LateCull,
			FramePhase::LateDraw,
			FramePhase::Done,
		]
	);
	Ok(())
}

#[test]
fn occlusion_culling_is_conservative() -> anyhow::Result<()> {
	let harness = Harness::new()?;
	let scene = Scene::new();
	let reference = harness.render_frames(CullFlags::MESHLET_FRUSTUM, &scene, 1)?;
	assert!(reference.visbuffer.iter().any(|p| p.is_some()));
	for frames in 1..=3 {
		let frame = harness.render_frames(CullFlags::all(), &scene, frames)?;
		assert_eq!(frame.visbuffer, reference.visbuffer, "after {frames} frames");
	}
	Ok(())
}

#[test]
fn late_phase_never_redraws() -> anyhow::Result<()> {
	let harness = Harness::new()?;
	let scene = Scene::new();
	for frames in 1..=2 {
		let frame = harness.render_frames(CullFlags::all(), &scene, frames)?;
		let early = frame.early_visible.iter().collect::<HashSet<_>>();
		assert_eq!(early.len(), frame.early_visible.len());
		assert!(frame.late_visible.iter().all(|m| !early.contains(m)));
	}
	Ok(())
}

#[test]
fn occluded_instance_is_culled_once_hiz_exists() -> anyhow::Result<()> {
	let harness = Harness::new()?;
	let scene = Scene::new();

	// without a hiz the early phase draws everything in the frustum
	let first = harness.render_frames(CullFlags::all(), &scene, 1)?;
	assert!(first.early_visible.iter().any(|m| m.instance_id == OCCLUDEE));

	let second = harness.render_frames(CullFlags::all(), &scene, 2)?;
	assert!(!second.visible_instances().contains(&OCCLUDEE));
	assert!(second.early_index_count > 0);
	// the partially hidden cube next to the wall is still drawn
	assert!(second.visible_instances().contains(&3));
	Ok(())
}

#[test]
fn outside_frustum_draws_nothing() -> anyhow::Result<()> {
	let harness = Harness::new()?;
	let mut scene = Scene::new();
	scene.instances.retain(|i| i.transform_id == OUTSIDE);
	let frame = harness.render_frames(CullFlags::all(), &scene, 2)?;
	assert_eq!(frame.early_index_count, 0);
	assert_eq!(frame.late_index_count, 0);
	assert!(frame.visbuffer.iter().all(|p| p.is_none()));

	let frame = harness.render_frames(CullFlags::all(), &Scene::new(), 1)?;
	assert!(!frame.visible_instances().contains(&OUTSIDE));
	Ok(())
}

#[test]
fn hiz_texels_are_conservative() -> anyhow::Result<()> {
	let harness = Harness::new()?;
	let pipeline = harness.pipeline(CullFlags::all())?;
	let targets = targets(&harness.device, true)?;
	let mut view = ViewState::new();
	render(&harness.device, &pipeline, &Scene::new().input(&harness.model), &targets, &mut view)?;

	let hiz = view.hiz().ok_or_else(|| anyhow::anyhow!("no hiz"))?;
	assert!(view.is_valid());
	// built from the early depth, the late phase only adds closer fragments
	let depth = harness.device.read_image(targets.depth, 0)?;
	let base = harness.device.read_image(hiz.image, 0)?;
	assert!(base.iter().zip(&depth).all(|(h, d)| texel_to_depth(*h) <= texel_to_depth(*d)));

	for mip in 1..hiz.mip_levels {
		let src = harness.device.read_image(hiz.image, mip - 1)?;
		let dst = harness.device.read_image(hiz.image, mip)?;
		let src_extent = mip_extent(hiz.extent, mip - 1);
		let dst_extent = mip_extent(hiz.extent, mip);
		for y in 0..dst_extent.y {
			for x in 0..dst_extent.x {
				let (min, max) = reduce_footprint(UVec2::new(x, y), src_extent);
				let mut footprint = f32::INFINITY;
				for sy in min.y..=max.y {
					for sx in min.x..=max.x {
						footprint = footprint.min(texel_to_depth(src[(sy * src_extent.x + sx) as usize]));
					}
				}
				let texel = texel_to_depth(dst[(y * dst_extent.x + x) as usize]);
				assert!(texel <= footprint, "mip {mip} texel {x} {y}: {texel} > {footprint}");
			}
		}
	}
	view.free(&harness.device);
	Ok(())
}

#[test]
fn micro_triangle_sweep() -> anyhow::Result<()> {
	let harness = Harness::new()?;
	let config = CullConfig::default()
		.with_flags(CullFlags::MESHLET_FRUSTUM | CullFlags::MICRO_TRIANGLES)
		.with_retained_outputs();
	let pipeline = GeometryPipeline::new(&harness.device, config)?;
	let targets = targets(&harness.device, true)?;
	let mut view = ViewState::new();
	let camera = camera();

	let mut scale = 40.;
	for step in 0..20 {
		let mut scene = Scene::empty();
		let transform = placed(Vec3::new(0.013, 0.021, -10.), scale);
		scene.add(TRIANGLE, transform);

		let ndc = [Vec3::new(-1., -1., 0.), Vec3::new(1., -1., 0.), Vec3::new(-1., 1., 0.)].map(|p| {
			let clip = camera.transform_vertex(&transform, p);
			clip.xy() / clip.w
		});
		let area = (ndc[1] - ndc[0]).perp_dot(ndc[2] - ndc[0]).abs() * 0.5 * (EXTENT.x as f32 * 0.5)
			* (EXTENT.y as f32 * 0.5);

		let frame = render(&harness.device, &pipeline, &scene.input(&harness.model), &targets, &mut view)?;
		let drawn = frame.early_index_count + frame.late_index_count;
		if step == 0 {
			assert_eq!(drawn, 3, "a triangle larger than the screen must be drawn");
		}
		if area < config.micro_triangle_area {
			assert_eq!(drawn, 0, "triangle of {area} px² was drawn");
		}
		scale *= 0.5;
	}
	view.free(&harness.device);
	Ok(())
}

#[test]
fn garbage_hiz_without_occlusion() -> anyhow::Result<()> {
	let harness = Harness::new()?;
	let scene = Scene::new();
	let flags = CullFlags::all() - CullFlags::OCCLUSION;
	let reference = harness.render_frames(flags, &scene, 1)?;

	for flags in [flags, CullFlags::all()] {
		let pipeline = harness.pipeline(flags)?;
		let targets = targets(&harness.device, true)?;
		let mut view = ViewState::new();
		render(&harness.device, &pipeline, &scene.input(&harness.model), &targets, &mut view)?;
		// a hiz claiming everything is right in front of the camera
		let hiz = view.hiz().ok_or_else(|| anyhow::anyhow!("no hiz"))?;
		for mip in 0..hiz.mip_levels {
			harness.device.write_image(hiz.image, mip, depth_to_texel(1.))?;
		}

		let frame = render(&harness.device, &pipeline, &scene.input(&harness.model), &targets, &mut view)?;
		if flags.contains(CullFlags::OCCLUSION) {
			// the early phase culls everything, the late phase tests against the real depth and recovers
			assert!(frame.early_visible.is_empty());
		} else {
			assert_eq!(frame.early_visible.len(), reference.early_visible.len());
			assert_eq!(frame.early_index_count, reference.early_index_count);
		}
		assert_eq!(frame.visbuffer, reference.visbuffer);
		view.free(&harness.device);
	}
	Ok(())
}

#[test]
fn depth_only_matches_visbuffer_depth() -> anyhow::Result<()> {
	let harness = Harness::new()?;
	let scene = Scene::new();
	let pipeline = harness.pipeline(CullFlags::all())?;

	let with_visbuffer = targets(&harness.device, true)?;
	let depth_only = targets(&harness.device, false)?;
	let mut view_a = ViewState::new();
	let mut view_b = ViewState::new();
	let a = render(&harness.device, &pipeline, &scene.input(&harness.model), &with_visbuffer, &mut view_a)?;
	let b = render(&harness.device, &pipeline, &scene.input(&harness.model), &depth_only, &mut view_b)?;
	assert_eq!(a.depth, b.depth);
	assert!(a.depth.iter().any(|d| *d != 0));
	Ok(())
}

#[test]
fn debug_spheres_of_surviving_instances() -> anyhow::Result<()> {
	let harness = Harness::new()?;
	let config = CullConfig {
		debug_draw_bounds: true,
		retain_outputs: true,
		..CullConfig::default()
	};
	let pipeline = GeometryPipeline::new(&harness.device, config)?;
	let targets = targets(&harness.device, true)?;
	let mut view = ViewState::new();
	let scene = Scene::new();
	let frame = render(&harness.device, &pipeline, &scene.input(&harness.model), &targets, &mut view)?;
	// everything but the instance behind the camera
	assert_eq!(frame.debug_spheres, Some(scene.instances.len() as u32 - 1));
	Ok(())
}

#[test]
fn missing_pipeline() {
	let mut device = SoftwareDevice::new();
	device.remove_pipeline(VISBUFFER_DEPTH_ONLY);
	assert!(matches!(
		GeometryPipeline::new(&device, CullConfig::default()),
		Err(PipelineError::Missing(VISBUFFER_DEPTH_ONLY))
	));
}

#[test]
fn invalid_instance_is_rejected() -> anyhow::Result<()> {
	let harness = Harness::new()?;
	let pipeline = harness.pipeline(CullFlags::all())?;
	let targets = targets(&harness.device, true)?;
	let mut view = ViewState::new();
	let mut scene = Scene::new();
	scene.instances.push(MeshInstance::new(17, 0, 0));
	let mut graph = FrameGraph::new(&harness.device);
	let result = pipeline.record(&mut graph, &scene.input(&harness.model), &targets, &mut view);
	assert!(matches!(
		result,
		Err(RecordError::InvalidInstance { what: "mesh", id: 17, .. })
	));
	Ok(())
}

#[test]
fn resize_invalidates_hiz() -> anyhow::Result<()> {
	let harness = Harness::new()?;
	let mut view = ViewState::new();
	let hiz = view.prepare(&harness.device, EXTENT)?;
	view.set_valid();
	assert_eq!(view.prepare(&harness.device, EXTENT)?, hiz);
	assert!(view.is_valid());

	let resized = view.prepare(&harness.device, UVec2::new(32, 16))?;
	assert!(!view.is_valid());
	assert_eq!(resized.mip_levels, 6);
	view.free(&harness.device);
	Ok(())
}

#[test]
fn transients_do_not_leak() -> anyhow::Result<()> {
	let harness = Harness::new()?;
	let before = harness.device.live_resource_count();
	let frame = harness.render_frames(CullFlags::all(), &Scene::new(), 2)?;
	assert!(frame.early_index_count > 0);
	// only the targets of the harness view remain
	assert_eq!(harness.device.live_resource_count(), before + 2);
	Ok(())
}

#[test]
fn outputs_are_released_unless_retained() -> anyhow::Result<()> {
	let harness = Harness::new()?;
	let before = harness.device.live_resource_count();
	let pipeline = GeometryPipeline::new(&harness.device, CullConfig::default())?;
	let targets = targets(&harness.device, true)?;
	let mut view = ViewState::new();
	for _ in 0..2 {
		let mut graph = FrameGraph::new(&harness.device);
		let output = pipeline.record(&mut graph, &Scene::new().input(&harness.model), &targets, &mut view)?;
		harness.device.execute(graph)?;
		assert!(!output.retained);
		// the two targets and the hiz of the view
		assert_eq!(harness.device.live_resource_count(), before + 3);
		output.free(&harness.device);
		assert_eq!(harness.device.live_resource_count(), before + 3);
	}
	view.free(&harness.device);
	assert_eq!(harness.device.live_resource_count(), before + 2);
	Ok(())
}

#[test]
fn mirrored_instance_is_drawn() -> anyhow::Result<()> {
	let harness = Harness::new()?;
	let mut scene = Scene::empty();
	scene.add(
		WALL,
		AffineTransform::new(Affine3A::from_scale_rotation_translation(
			Vec3::new(-1., 1., 1.),
			Quat::IDENTITY,
			Vec3::new(0., 0., -5.),
		)),
	);
	let reference = harness.render_frames(CullFlags::MESHLET_FRUSTUM, &scene, 1)?;
	assert!(reference.visbuffer.iter().any(|p| p.is_some()));
	for frames in 1..=2 {
		let frame = harness.render_frames(CullFlags::all(), &scene, frames)?;
		assert_eq!(frame.early_index_count + frame.late_index_count, 6, "after {frames} frames");
		assert_eq!(frame.visbuffer, reference.visbuffer, "after {frames} frames");
	}
	Ok(())
}

#[test]
fn overdraw_counts_every_fragment() -> anyhow::Result<()> {
	let harness = Harness::new()?;
	let pipeline = harness.pipeline(CullFlags::MESHLET_FRUSTUM)?;
	let mut targets = targets(&harness.device, true)?;
	targets.overdraw = Some(target_image(&harness.device, ImageFormat::R32Uint, "overdraw")?);

	let wall = placed(Vec3::new(0.1, 0.05, -5.), 1.);
	let triangle = placed(Vec3::new(0.4, 0.3, -4.), 1.);
	let frame_of = |parts: &[(u32, AffineTransform)]| -> anyhow::Result<RenderedFrame> {
		let mut scene = Scene::empty();
		for (mesh, transform) in parts {
			scene.add(*mesh, *transform);
		}
		let mut view = ViewState::new();
		let frame = render(&harness.device, &pipeline, &scene.input(&harness.model), &targets, &mut view)?;
		view.free(&harness.device);
		Ok(frame)
	};
	let a = frame_of(&[(WALL, wall)])?;
	let b = frame_of(&[(TRIANGLE, triangle)])?;
	let both = frame_of(&[(WALL, wall), (TRIANGLE, triangle)])?;

	for frame in [&a, &b] {
		for (count, pixel) in frame.overdraw.iter().zip(&frame.visbuffer) {
			assert_eq!(*count > 0, pixel.is_some());
		}
	}
	for (i, count) in both.overdraw.iter().enumerate() {
		assert_eq!(*count, a.overdraw[i] + b.overdraw[i], "pixel {i}");
	}
	let overlap = (0..both.overdraw.len())
		.filter(|i| a.visbuffer[*i].is_some() && b.visbuffer[*i].is_some())
		.count();
	assert!(overlap > 0);
	assert!(both.overdraw.iter().filter(|c| **c >= 2).count() >= overlap);
	// the triangle is in front wherever both cover a pixel
	for i in 0..both.visbuffer.len() {
		if let (Some(_), Some(front)) = (a.visbuffer[i], b.visbuffer[i]) {
			assert_eq!(both.visbuffer[i].map(|p| p.1), Some(1));
			assert_eq!(both.visbuffer[i].map(|p| p.0), Some(front.0));
		}
	}
	Ok(())
}
