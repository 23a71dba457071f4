use crate::renderer::pipelines::PipelineKey;
use crate::renderer::render_graph::resource::ResourceId;
use bitflags::bitflags;
use bytemuck::Pod;
use cull_asset_shader::descriptor::{BufferId, ImageId};
use glam::UVec2;

bitflags! {
	#[repr(transparent)]
	#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
	pub struct BufferUsage: u32 {
		const STORAGE_BUFFER = 1;
		const INDIRECT_BUFFER = 2;
		const INDEX_BUFFER = 4;
		const TRANSFER_DST = 8;
		const MAP_WRITE = 16;
	}
}

bitflags! {
	#[repr(transparent)]
	#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
	pub struct ImageUsage: u32 {
		const STORAGE = 1;
		const SAMPLED = 2;
		const ATTACHMENT = 4;
		const TRANSFER_DST = 8;
	}
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ImageFormat {
	R32Float,
	R32Uint,
	/// visibility buffer, requires 64-bit image atomics
	R64Uint,
}

#[derive(Copy, Clone, Debug)]
pub struct BindlessBufferCreateInfo<'a> {
	pub usage: BufferUsage,
	pub name: &'a str,
}

#[derive(Copy, Clone, Debug)]
pub struct BindlessImageCreateInfo<'a> {
	pub usage: ImageUsage,
	pub format: ImageFormat,
	pub extent: UVec2,
	pub mip_levels: u32,
	pub name: &'a str,
}

#[derive(Debug, thiserror::Error)]
pub enum AllocError {
	#[error("buffer {name:?} of {len} elements of {element_size} bytes exceeds the addressable size")]
	BufferTooLarge { name: String, len: usize, element_size: usize },
	#[error("buffer {name:?} has an element size of {element_size} bytes, which is not a multiple of 4")]
	UnalignedElement { name: String, element_size: usize },
	#[error("image {name:?} has an invalid extent {extent} or mip count {mip_levels}")]
	InvalidImage { name: String, extent: UVec2, mip_levels: u32 },
}

/// The device: owns all buffers and images addressed by handles and the pipelines addressed by name.
pub trait Bindless {
	/// contents are undefined
	fn alloc_buffer_slice<T: Pod>(&self, info: &BindlessBufferCreateInfo, len: usize) -> Result<BufferId<T>, AllocError>;

	fn alloc_buffer_from_slice<T: Pod>(
		&self,
		info: &BindlessBufferCreateInfo,
		data: &[T],
	) -> Result<BufferId<T>, AllocError>;

	/// contents are undefined
	fn alloc_image(&self, info: &BindlessImageCreateInfo) -> Result<ImageId, AllocError>;

	/// Frees a buffer or image. The handle must not be used by any pass recorded afterward.
	fn free(&self, resource: ResourceId);

	fn has_pipeline(&self, key: PipelineKey) -> bool;
}
