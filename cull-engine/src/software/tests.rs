use crate::renderer::bindless::{
	AllocError, Bindless, BindlessBufferCreateInfo, BindlessImageCreateInfo, BufferUsage, ImageFormat, ImageUsage,
};
use crate::renderer::pipelines::{CULL_MESHES, HIZ_COPY};
use crate::renderer::render_graph::graph::FrameGraph;
use crate::renderer::render_graph::pass::Pass;
use crate::software::descriptors::GARBAGE;
use crate::software::device::{ExecuteError, SoftwareDevice};
use cull_asset_shader::descriptor::{BufferId, Descriptors};
use cull_engine_shader::renderer::hiz::CopyParam;
use glam::{UVec2, UVec3};

fn buffer_info(name: &str) -> BindlessBufferCreateInfo<'_> {
	BindlessBufferCreateInfo {
		usage: BufferUsage::STORAGE_BUFFER,
		name,
	}
}

#[test]
fn uninitialized_memory_is_garbage() -> anyhow::Result<()> {
	let device = SoftwareDevice::new();
	let buffer = device.alloc_buffer_slice::<u32>(&buffer_info("garbage"), 4)?;
	assert_eq!(device.read_buffer(buffer)?, vec![GARBAGE; 4]);
	Ok(())
}

#[test]
fn robust_access() -> anyhow::Result<()> {
	let device = SoftwareDevice::new();
	let buffer = device.alloc_buffer_from_slice(&buffer_info("robust"), &[1u32, 2, 3])?;
	let descriptors = device.snapshot();
	assert_eq!(descriptors.buffer_len(buffer), 3);
	assert_eq!(descriptors.load(buffer, 2), 3);
	assert_eq!(descriptors.load(buffer, 3), 0);
	descriptors.store(buffer, 3, 42);
	assert_eq!(descriptors.atomic_add(buffer, 1, 5), 2);
	assert_eq!(descriptors.load(BufferId::<u32>::INVALID, 0), 0);
	assert_eq!(device.read_buffer(buffer)?, vec![1, 7, 3]);
	Ok(())
}

#[test]
fn alloc_errors() {
	let device = SoftwareDevice::new();
	assert!(matches!(
		device.alloc_buffer_slice::<u16>(&buffer_info("u16"), 2),
		Err(AllocError::UnalignedElement { element_size: 2, .. })
	));
	assert!(matches!(
		device.alloc_buffer_slice::<[u32; 4]>(&buffer_info("huge"), usize::MAX / 8),
		Err(AllocError::BufferTooLarge { .. })
	));
	let image = |extent, mip_levels| {
		device.alloc_image(&BindlessImageCreateInfo {
			usage: ImageUsage::STORAGE,
			format: ImageFormat::R32Float,
			extent,
			mip_levels,
			name: "image",
		})
	};
	assert!(matches!(image(UVec2::new(0, 4), 1), Err(AllocError::InvalidImage { .. })));
	assert!(matches!(image(UVec2::new(4, 4), 4), Err(AllocError::InvalidImage { .. })));
	assert!(image(UVec2::new(4, 4), 3).is_ok());
	assert_eq!(device.live_resource_count(), 1);
}

#[test]
fn transients_are_released_after_execution() -> anyhow::Result<()> {
	let device = SoftwareDevice::new();
	let mut graph = FrameGraph::new(&device);
	let a = graph.transient_buffer::<u32>("a", BufferUsage::STORAGE_BUFFER, 8)?;
	let kept = graph.transient_buffer::<u32>("kept", BufferUsage::STORAGE_BUFFER, 2)?;
	let _unused = graph.transient_buffer::<u32>("unused", BufferUsage::STORAGE_BUFFER, 2)?;
	graph.add_pass(Pass::fill_buffer("fill a", a, 3))?;
	graph.add_pass(Pass::write_buffer("write kept", kept, 1, &[9u32]))?;
	graph.retain(kept);
	assert_eq!(device.live_resource_count(), 3);

	device.execute(graph)?;
	assert_eq!(device.live_resource_count(), 1);
	assert_eq!(device.read_buffer(kept)?, vec![GARBAGE, 9]);
	assert!(matches!(device.read_buffer(a), Err(ExecuteError::NotAlive { .. })));
	Ok(())
}

#[test]
fn dropped_graph_frees_transients() -> anyhow::Result<()> {
	let device = SoftwareDevice::new();
	{
		let mut graph = FrameGraph::new(&device);
		let a = graph.transient_buffer::<u32>("a", BufferUsage::STORAGE_BUFFER, 8)?;
		graph.add_pass(Pass::fill_buffer("fill a", a, 3))?;
	}
	assert_eq!(device.live_resource_count(), 0);
	Ok(())
}

#[test]
fn pipeline_kind_and_param_size_are_checked() -> anyhow::Result<()> {
	let device = SoftwareDevice::new();
	let mut graph = FrameGraph::new(&device);
	graph.add_pass(Pass::dispatch("wrong param", CULL_MESHES, UVec3::ONE, &0u32))?;
	assert!(matches!(device.execute(graph), Err(ExecuteError::ParamSize { .. })));

	let mut graph = FrameGraph::new(&device);
	let image = graph.transient_image(&BindlessImageCreateInfo {
		usage: ImageUsage::STORAGE,
		format: ImageFormat::R32Float,
		extent: UVec2::new(4, 4),
		mip_levels: 1,
		name: "image",
	})?;
	let param = CopyParam {
		depth: image,
		hiz: image,
	};
	graph.add_pass(Pass::clear_image("clear", image, 0..1, 0))?;
	let indices = graph.transient_buffer::<u32>("indices", BufferUsage::INDEX_BUFFER, 3)?;
	let command = graph.transient_buffer("command", BufferUsage::INDIRECT_BUFFER, 1)?;
	graph.add_pass(Pass::fill_buffer("fill indices", indices, 0))?;
	graph.add_pass(Pass::fill_buffer("fill command", command, 0))?;
	graph.add_pass(Pass::draw_indexed_indirect(
		"compute as graphics",
		HIZ_COPY,
		command,
		indices,
		UVec2::new(4, 4),
		&param,
	))?;
	assert!(matches!(
		device.execute(graph),
		Err(ExecuteError::PipelineKind { expected: "graphics", .. })
	));
	assert_eq!(device.live_resource_count(), 0);
	Ok(())
}

#[test]
fn freed_resource_is_missing() -> anyhow::Result<()> {
	let device = SoftwareDevice::new();
	let buffer = device.alloc_buffer_slice::<u32>(&buffer_info("freed"), 1)?;
	device.free(buffer.into());
	let mut graph = FrameGraph::new(&device);
	graph.add_pass(Pass::fill_buffer("fill", buffer, 0))?;
	assert!(matches!(device.execute(graph), Err(ExecuteError::MissingResource { .. })));
	Ok(())
}
