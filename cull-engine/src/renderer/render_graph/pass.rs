use crate::renderer::pipelines::PipelineKey;
use crate::renderer::render_graph::resource::{Access, AccessKind, ResourceId};
use bytemuck::Pod;
use core::ops::Range;
use cull_asset_shader::descriptor::{BufferId, ImageId};
use cull_engine_shader::renderer::indirect::{DispatchIndirectCommand, DrawIndexedIndirectCommand};
use glam::{UVec2, UVec3};
use smallvec::SmallVec;

#[derive(Clone, Debug)]
pub enum Command {
	FillBuffer {
		buffer: BufferId<u32>,
		value: u32,
	},
	WriteBuffer {
		buffer: BufferId<u32>,
		offset_words: u32,
		data: Vec<u32>,
	},
	/// clears `mips` of the image to the raw texel `value`
	ClearImage {
		image: ImageId,
		mips: Range<u32>,
		value: u64,
	},
	Dispatch {
		pipeline: PipelineKey,
		groups: UVec3,
	},
	DispatchIndirect {
		pipeline: PipelineKey,
		args: BufferId<DispatchIndirectCommand>,
	},
	/// `indices` holds `index_count` indices starting at `first_index`, rasterized into a viewport of `extent`
	DrawIndexedIndirect {
		pipeline: PipelineKey,
		command: BufferId<DrawIndexedIndirectCommand>,
		indices: BufferId<u32>,
		extent: UVec2,
	},
}

impl Command {
	pub fn pipeline(&self) -> Option<PipelineKey> {
		match self {
			Command::Dispatch { pipeline, .. }
			| Command::DispatchIndirect { pipeline, .. }
			| Command::DrawIndexedIndirect { pipeline, .. } => Some(*pipeline),
			Command::FillBuffer { .. } | Command::WriteBuffer { .. } | Command::ClearImage { .. } => None,
		}
	}
}

/// A single command with every resource it touches. Commands that read indirect args or indices declare those
/// accesses themselves, the kernel's accesses are added with the builder methods.
#[derive(Clone, Debug)]
pub struct Pass {
	pub name: String,
	pub command: Command,
	pub accesses: SmallVec<[Access; 8]>,
	/// the kernel's `Param`, as bytes
	pub param: Vec<u8>,
}

impl Pass {
	fn new(name: impl Into<String>, command: Command, param: Vec<u8>) -> Self {
		Self {
			name: name.into(),
			command,
			accesses: SmallVec::new(),
			param,
		}
	}

	pub fn fill_buffer<T: 'static>(name: impl Into<String>, buffer: BufferId<T>, value: u32) -> Self {
		Self::new(
			name,
			Command::FillBuffer {
				buffer: buffer.cast(),
				value,
			},
			Vec::new(),
		)
		.access(buffer, AccessKind::TransferWrite)
	}

	/// Writes `data` starting at the `offset`-th T of `buffer`.
	pub fn write_buffer<T: Pod>(name: impl Into<String>, buffer: BufferId<T>, offset: u32, data: &[T]) -> Self {
		let words_per_t = (size_of::<T>() / 4) as u32;
		Self::new(
			name,
			Command::WriteBuffer {
				buffer: buffer.cast(),
				offset_words: offset * words_per_t,
				data: bytemuck::cast_slice::<T, u32>(data).to_vec(),
			},
			Vec::new(),
		)
		.access(buffer, AccessKind::TransferWrite)
	}

	pub fn clear_image(name: impl Into<String>, image: ImageId, mips: Range<u32>, value: u64) -> Self {
		let access = Access {
			resource: image.into(),
			kind: AccessKind::TransferWrite,
			mips: mips.clone(),
		};
		let mut pass = Self::new(name, Command::ClearImage { image, mips, value }, Vec::new());
		pass.accesses.push(access);
		pass
	}

	pub fn dispatch<P: Pod>(name: impl Into<String>, pipeline: PipelineKey, groups: UVec3, param: &P) -> Self {
		Self::new(
			name,
			Command::Dispatch { pipeline, groups },
			bytemuck::bytes_of(param).to_vec(),
		)
	}

	pub fn dispatch_indirect<P: Pod>(
		name: impl Into<String>,
		pipeline: PipelineKey,
		args: BufferId<DispatchIndirectCommand>,
		param: &P,
	) -> Self {
		Self::new(
			name,
			Command::DispatchIndirect { pipeline, args },
			bytemuck::bytes_of(param).to_vec(),
		)
		.access(args, AccessKind::IndirectRead)
	}

	pub fn draw_indexed_indirect<P: Pod>(
		name: impl Into<String>,
		pipeline: PipelineKey,
		command: BufferId<DrawIndexedIndirectCommand>,
		indices: BufferId<u32>,
		extent: UVec2,
		param: &P,
	) -> Self {
		Self::new(
			name,
			Command::DrawIndexedIndirect {
				pipeline,
				command,
				indices,
				extent,
			},
			bytemuck::bytes_of(param).to_vec(),
		)
		.access(command, AccessKind::IndirectRead)
		.access(indices, AccessKind::IndexRead)
	}

	fn access(mut self, resource: impl Into<ResourceId>, kind: AccessKind) -> Self {
		self.accesses.push(Access {
			resource: resource.into(),
			kind,
			mips: 0..1,
		});
		self
	}

	fn access_mips(mut self, image: ImageId, kind: AccessKind, mips: Range<u32>) -> Self {
		self.accesses.push(Access {
			resource: image.into(),
			kind,
			mips,
		});
		self
	}

	pub fn read(self, resource: impl Into<ResourceId>) -> Self {
		self.access(resource, AccessKind::ShaderRead)
	}

	pub fn write(self, resource: impl Into<ResourceId>) -> Self {
		self.access(resource, AccessKind::ShaderWrite)
	}

	pub fn read_write(self, resource: impl Into<ResourceId>) -> Self {
		self.access(resource, AccessKind::ShaderReadWrite)
	}

	pub fn sampled(self, image: ImageId, mips: Range<u32>) -> Self {
		self.access_mips(image, AccessKind::Sampled, mips)
	}

	pub fn write_image(self, image: ImageId, mips: Range<u32>) -> Self {
		self.access_mips(image, AccessKind::ShaderWrite, mips)
	}

	pub fn attachment(self, image: ImageId) -> Self {
		self.access_mips(image, AccessKind::AttachmentReadWrite, 0..1)
	}
}
