use bitflags::bitflags;

bitflags! {
	/// Toggles of the individual culling tests. Passed to every cull pass as a plain `u32`, toggling never changes
	/// buffer layouts.
	#[repr(transparent)]
	#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
	pub struct CullFlags: u32 {
		const MESHLET_FRUSTUM = 1;
		const TRIANGLE_BACK_FACE = 2;
		const MICRO_TRIANGLES = 4;
		const OCCLUSION = 8;
	}
}

impl Default for CullFlags {
	fn default() -> Self {
		Self::all()
	}
}
