use bytemuck_derive::{Pod, Zeroable};

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DispatchIndirectCommand {
	pub x: u32,
	pub y: u32,
	pub z: u32,
}

impl DispatchIndirectCommand {
	pub fn new(x: u32) -> Self {
		Self { x, y: 1, z: 1 }
	}
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawIndexedIndirectCommand {
	pub index_count: u32,
	pub instance_count: u32,
	pub first_index: u32,
	pub vertex_offset: i32,
	pub first_instance: u32,
}

impl DrawIndexedIndirectCommand {
	/// word of `index_count`, the counter triangle culling appends to
	pub const INDEX_COUNT_WORD: u32 = 0;

	/// a single instance without any indices, ready to be appended to
	pub const EMPTY: Self = Self {
		index_count: 0,
		instance_count: 1,
		first_index: 0,
		vertex_offset: 0,
		first_instance: 0,
	};
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawIndirectCommand {
	pub vertex_count: u32,
	pub instance_count: u32,
	pub first_vertex: u32,
	pub first_instance: u32,
}

impl DrawIndirectCommand {
	/// word of `instance_count`
	pub const INSTANCE_COUNT_WORD: u32 = 1;
}
