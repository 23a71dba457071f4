use crate::renderer::indirect::DispatchIndirectCommand;
use bytemuck_derive::{Pod, Zeroable};
use cull_asset_shader::descriptor::{BufferId, Descriptors};
use glam::UVec3;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Param {
	pub count: BufferId<u32>,
	pub count_word: u32,
	pub out_args: BufferId<DispatchIndirectCommand>,
	/// how many invocations each counted item requires
	pub items_per_count: u32,
	pub workgroup_size: u32,
}

/// `ceil(count * items_per_count / workgroup_size)`
pub fn dispatch_size(count: u32, items_per_count: u32, workgroup_size: u32) -> u32 {
	let items = count as u64 * items_per_count as u64;
	let groups = items.div_ceil(workgroup_size.max(1) as u64);
	u64::min(groups, u32::MAX as u64) as u32
}

/// Single invocation turning a GPU-side count into the dispatch size of the next stage.
pub fn generate_cull_commands(descriptors: &impl Descriptors, param: &Param, global_id: UVec3) {
	if global_id != UVec3::ZERO {
		return;
	}
	let count = descriptors.load(param.count, param.count_word);
	let x = dispatch_size(count, param.items_per_count, param.workgroup_size);
	descriptors.store(param.out_args, 0, DispatchIndirectCommand::new(x));
}
