use clap::Parser;
use cull_demo::scene::DemoScene;
use cull_engine::config::CullConfig;
use cull_engine::renderer::bindless::{Bindless, BindlessImageCreateInfo, ImageFormat, ImageUsage};
use cull_engine::renderer::hiz::ViewState;
use cull_engine::renderer::orchestrator::{FrameOutput, FrameTargets, GeometryPipeline};
use cull_engine::renderer::render_graph::graph::FrameGraph;
use cull_engine::software::device::SoftwareDevice;
use cull_engine_shader::renderer::cull_flags::CullFlags;
use cull_engine_shader::renderer::meshlet::visbuffer::{decode_payload, decode_texel};
use glam::UVec2;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
	/// The amount of frames to render
	#[arg(short, long, default_value_t = 8)]
	frames: u32,

	/// Width of the view in pixels
	#[arg(long, default_value_t = 320)]
	width: u32,

	/// Height of the view in pixels
	#[arg(long, default_value_t = 180)]
	height: u32,

	/// Cubes per row and column of the field behind the wall
	#[arg(long, default_value_t = 12)]
	field: u32,

	/// Remove the occluding wall
	#[arg(long)]
	no_wall: bool,

	#[arg(long)]
	no_frustum: bool,

	#[arg(long)]
	no_backface: bool,

	#[arg(long)]
	no_micro_triangles: bool,

	#[arg(long)]
	no_occlusion: bool,

	/// Triangles with a smaller area in pixels² are culled
	#[arg(long, default_value_t = 0.25)]
	micro_triangle_area: f32,

	/// Offset of the Hi-Z mip occlusion tests sample
	#[arg(long, default_value_t = 0, allow_negative_numbers = true)]
	hiz_mip_bias: i32,

	/// Emit a bounding sphere for every mesh instance surviving frustum culling
	#[arg(long)]
	debug_draw_bounds: bool,

	/// Count fragments per pixel
	#[arg(long)]
	overdraw: bool,

	/// Only write depth, without a visibility buffer
	#[arg(long)]
	depth_only: bool,

	/// The amount of threads to use
	#[arg(long, short = 'j')]
	threads: Option<usize>,
}

impl Args {
	fn config(&self) -> CullConfig {
		let mut cull_flags = CullFlags::all();
		cull_flags.set(CullFlags::MESHLET_FRUSTUM, !self.no_frustum);
		cull_flags.set(CullFlags::TRIANGLE_BACK_FACE, !self.no_backface);
		cull_flags.set(CullFlags::MICRO_TRIANGLES, !self.no_micro_triangles);
		cull_flags.set(CullFlags::OCCLUSION, !self.no_occlusion);
		CullConfig {
			cull_flags,
			micro_triangle_area: self.micro_triangle_area,
			hiz_mip_bias: self.hiz_mip_bias,
			debug_draw_bounds: self.debug_draw_bounds,
			// read back by log_frame
			retain_outputs: true,
		}
	}
}

fn main() -> anyhow::Result<()> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

	#[cfg(feature = "profile-with-puffin")]
	let _puffin_server = {
		profiling::puffin::set_scopes_on(true);
		let server_addr = format!("127.0.0.1:{}", puffin_http::DEFAULT_PORT);
		puffin_http::Server::new(&server_addr)?
	};

	let args = Args::parse();
	rayon::ThreadPoolBuilder::new()
		.num_threads(args.threads.unwrap_or(0))
		.thread_name(|id| format!("Rayon-{}", id))
		.build_global()?;
	run(&args)
}

fn alloc_targets(device: &SoftwareDevice, args: &Args, extent: UVec2) -> anyhow::Result<FrameTargets> {
	let image = |format, name| {
		device.alloc_image(&BindlessImageCreateInfo {
			usage: ImageUsage::ATTACHMENT | ImageUsage::SAMPLED | ImageUsage::TRANSFER_DST,
			format,
			extent,
			mip_levels: 1,
			name,
		})
	};
	Ok(FrameTargets {
		depth: image(ImageFormat::R32Float, "depth")?,
		visbuffer: (!args.depth_only)
			.then(|| image(ImageFormat::R64Uint, "visbuffer"))
			.transpose()?,
		overdraw: args.overdraw.then(|| image(ImageFormat::R32Uint, "overdraw")).transpose()?,
		extent,
	})
}

fn free_targets(device: &SoftwareDevice, targets: FrameTargets) {
	device.free(targets.depth.into());
	for image in [targets.visbuffer, targets.overdraw].into_iter().flatten() {
		device.free(image.into());
	}
}

#[profiling::function]
fn run(args: &Args) -> anyhow::Result<()> {
	let device = SoftwareDevice::new();
	let extent = UVec2::new(args.width, args.height);
	let config = args.config();
	log::info!("rendering {} frames at {} with {:?}", args.frames, extent, config);

	let scene = DemoScene::new(&device, args.field, !args.no_wall)?;
	let pipeline = GeometryPipeline::new(&device, config)?;
	let targets = alloc_targets(&device, args, extent)?;
	let mut view = ViewState::new();

	for frame in 0..args.frames {
		let camera = DemoScene::camera(frame, extent);
		let mut graph = FrameGraph::new(&device);
		let output = pipeline.record(&mut graph, &scene.input(camera), &targets, &mut view)?;
		log::debug!("frame {frame}: recorded {} passes", graph.passes().len());
		device.execute(graph)?;
		let result = log_frame(&device, frame, &targets, &output);
		output.free(&device);
		result?;
		profiling::finish_frame!();
	}

	view.free(&device);
	free_targets(&device, targets);
	scene.free(&device);
	log::info!("{} resources still alive", device.live_resource_count());
	Ok(())
}

fn log_frame(device: &SoftwareDevice, frame: u32, targets: &FrameTargets, output: &FrameOutput) -> anyhow::Result<()> {
	let instances = device.read_buffer(output.meshlet_instances.counter())?[0];
	for phase in [&output.early, &output.late] {
		let visible = device.read_buffer(phase.visible_meshlets.counter())?[0];
		let draw = device.read_buffer(phase.draw_command)?[0];
		log::info!(
			"frame {frame} {:?}: {visible} of {instances} meshlet instances visible, {} triangles",
			phase.phase,
			draw.index_count / 3
		);
	}

	let covered = match targets.visbuffer {
		Some(visbuffer) => device
			.read_image(visbuffer, 0)?
			.into_iter()
			.filter(|texel| decode_payload(decode_texel(*texel).1).is_some())
			.count(),
		None => device.read_image(targets.depth, 0)?.into_iter().filter(|d| *d != 0).count(),
	};
	log::info!("frame {frame}: {covered} of {} pixels covered", targets.extent.element_product());
	if let Some(overdraw) = targets.overdraw {
		let fragments: u64 = device.read_image(overdraw, 0)?.into_iter().sum();
		log::info!(
			"frame {frame}: {fragments} fragments, {:.2} per covered pixel",
			fragments as f64 / covered.max(1) as f64
		);
	}
	if let Some(debug) = output.debug_draw {
		let spheres = device.read_buffer(debug.command)?[0].instance_count;
		log::info!("frame {frame}: {spheres} mesh instances survived frustum culling");
	}
	Ok(())
}
