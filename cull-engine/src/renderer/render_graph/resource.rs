use core::ops::Range;
use cull_asset_shader::descriptor::{BufferId, ImageId};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceId {
	Buffer(u32),
	Image(u32),
}

impl<T: 'static> From<BufferId<T>> for ResourceId {
	fn from(value: BufferId<T>) -> Self {
		ResourceId::Buffer(value.id())
	}
}

impl From<ImageId> for ResourceId {
	fn from(value: ImageId) -> Self {
		ResourceId::Image(value.id())
	}
}

/// How a pass uses a resource.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AccessKind {
	TransferWrite,
	ShaderRead,
	/// storage buffer or storage image
	ShaderWrite,
	ShaderReadWrite,
	IndirectRead,
	IndexRead,
	Sampled,
	/// attachments are loaded, depth tested and stored
	AttachmentReadWrite,
}

impl AccessKind {
	pub fn is_read(&self) -> bool {
		matches!(
			self,
			AccessKind::ShaderRead
				| AccessKind::ShaderReadWrite
				| AccessKind::IndirectRead
				| AccessKind::IndexRead
				| AccessKind::Sampled
				| AccessKind::AttachmentReadWrite
		)
	}

	pub fn is_write(&self) -> bool {
		matches!(
			self,
			AccessKind::TransferWrite
				| AccessKind::ShaderWrite
				| AccessKind::ShaderReadWrite
				| AccessKind::AttachmentReadWrite
		)
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Access {
	pub resource: ResourceId,
	pub kind: AccessKind,
	/// buffers only have mip 0
	pub mips: Range<u32>,
}

/// A single mip of an image, or a whole buffer
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Subresource {
	pub resource: ResourceId,
	pub mip: u32,
}

/// Execution and memory dependency of a pass on an earlier access of the same subresource.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Barrier {
	pub subresource: Subresource,
	pub src: AccessKind,
	pub dst: AccessKind,
}
