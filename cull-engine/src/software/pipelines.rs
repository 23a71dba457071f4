use crate::renderer::pipelines::{
	CULL_MESHES, CULL_MESHLETS, CULL_TRIANGLES, GENERATE_CULL_COMMANDS, HIZ_COPY, HIZ_SLOW, PipelineKey,
	VISBUFFER_DEPTH_ONLY, VISBUFFER_ENCODE,
};
use crate::software::descriptors::SoftwareDescriptors;
use crate::software::raster::draw_indexed;
use bytemuck::Pod;
use cull_asset_shader::descriptor::BufferId;
use cull_engine_shader::renderer::hiz;
use cull_engine_shader::renderer::indirect::DrawIndexedIndirectCommand;
use cull_engine_shader::renderer::meshlet::visbuffer::{self, VisbufferVertex};
use cull_engine_shader::renderer::meshlet::{cull_meshes, cull_meshlets, cull_triangles, generate_cull_commands};
use glam::{UVec2, UVec3};
use rayon::prelude::*;
use rustc_hash::FxHashMap;

pub type ComputeKernel<P> = fn(&SoftwareDescriptors, &P, UVec3);
pub type VertexKernel<P> = fn(&SoftwareDescriptors, &P, u32) -> VisbufferVertex;
pub type FragmentKernel<P> = fn(&SoftwareDescriptors, &P, UVec2, f32, u32);

type DispatchFn = Box<dyn Fn(&SoftwareDescriptors, &[u8], UVec3) + Send + Sync>;
type DrawFn = Box<dyn Fn(&SoftwareDescriptors, &[u8], &DrawIndexedIndirectCommand, BufferId<u32>, UVec2) + Send + Sync>;

pub struct ComputePipeline {
	pub workgroup_size: UVec3,
	pub param_size: usize,
	dispatch: DispatchFn,
}

impl ComputePipeline {
	/// Runs every invocation of `groups` workgroups in parallel. `param` must be `param_size` bytes.
	pub fn dispatch(&self, descriptors: &SoftwareDescriptors, param: &[u8], groups: UVec3) {
		(self.dispatch)(descriptors, param, groups)
	}
}

pub struct GraphicsPipeline {
	pub param_size: usize,
	draw: DrawFn,
}

impl GraphicsPipeline {
	pub fn draw(
		&self,
		descriptors: &SoftwareDescriptors,
		param: &[u8],
		command: &DrawIndexedIndirectCommand,
		indices: BufferId<u32>,
		extent: UVec2,
	) {
		(self.draw)(descriptors, param, command, indices, extent)
	}
}

pub enum Pipeline {
	Compute(ComputePipeline),
	Graphics(GraphicsPipeline),
}

impl Pipeline {
	pub fn kind(&self) -> &'static str {
		match self {
			Pipeline::Compute(_) => "compute",
			Pipeline::Graphics(_) => "graphics",
		}
	}

	pub fn param_size(&self) -> usize {
		match self {
			Pipeline::Compute(c) => c.param_size,
			Pipeline::Graphics(g) => g.param_size,
		}
	}
}

pub fn compute<P: Pod + Sync>(workgroup_size: UVec3, kernel: ComputeKernel<P>) -> Pipeline {
	Pipeline::Compute(ComputePipeline {
		workgroup_size,
		param_size: size_of::<P>(),
		dispatch: Box::new(move |descriptors, param, groups| {
			let param = bytemuck::pod_read_unaligned::<P>(param);
			let size = groups.as_u64vec3() * workgroup_size.as_u64vec3();
			let total = size.x * size.y * size.z;
			(0..total).into_par_iter().for_each(|i| {
				let global_id = UVec3::new(
					(i % size.x) as u32,
					((i / size.x) % size.y) as u32,
					(i / (size.x * size.y)) as u32,
				);
				kernel(descriptors, &param, global_id);
			});
		}),
	})
}

pub fn graphics<P: Pod + Sync>(vertex: VertexKernel<P>, fragment: FragmentKernel<P>) -> Pipeline {
	Pipeline::Graphics(GraphicsPipeline {
		param_size: size_of::<P>(),
		draw: Box::new(move |descriptors, param, command, indices, extent| {
			let param = bytemuck::pod_read_unaligned::<P>(param);
			draw_indexed(
				descriptors,
				command,
				indices,
				extent,
				|index| vertex(descriptors, &param, index),
				|coord, depth, payload| fragment(descriptors, &param, coord, depth, payload),
			);
		}),
	})
}

/// All pipelines the geometry pipeline requires, backed by the kernels of `cull-engine-shader`.
pub fn software_pipelines() -> FxHashMap<PipelineKey, Pipeline> {
	let linear = |size: u32| UVec3::new(size, 1, 1);
	let hiz_wg = UVec3::new(hiz::HIZ_WG_SIZE, hiz::HIZ_WG_SIZE, 1);
	let mut map = FxHashMap::default();
	map.insert(
		CULL_MESHES,
		compute::<cull_meshes::Param>(linear(cull_meshes::CULL_MESHES_WG_SIZE), cull_meshes::cull_meshes),
	);
	// only invocation zero does anything
	map.insert(
		GENERATE_CULL_COMMANDS,
		compute::<generate_cull_commands::Param>(linear(1), generate_cull_commands::generate_cull_commands),
	);
	map.insert(
		CULL_MESHLETS,
		compute::<cull_meshlets::Param>(linear(cull_meshlets::CULL_MESHLETS_WG_SIZE), cull_meshlets::cull_meshlets),
	);
	map.insert(
		CULL_TRIANGLES,
		compute::<cull_triangles::Param>(
			linear(cull_triangles::CULL_TRIANGLES_WG_SIZE),
			cull_triangles::cull_triangles,
		),
	);
	map.insert(HIZ_COPY, compute::<hiz::CopyParam>(hiz_wg, hiz::hiz_copy));
	map.insert(HIZ_SLOW, compute::<hiz::ReduceParam>(hiz_wg, hiz::hiz_reduce));
	map.insert(
		VISBUFFER_ENCODE,
		graphics::<visbuffer::Param>(visbuffer::visbuffer_vertex, visbuffer::visbuffer_encode_fragment),
	);
	map.insert(
		VISBUFFER_DEPTH_ONLY,
		graphics::<visbuffer::Param>(visbuffer::visbuffer_vertex, visbuffer::visbuffer_depth_only_fragment),
	);
	map
}
