use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Which of the two passes of a frame a cull or draw belongs to.
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum Phase {
	/// culls against the previous frame's Hi-Z
	Early = 0,
	/// culls against the Hi-Z built from the early draw, skipping everything drawn early
	Late = 1,
}

impl Phase {
	/// Unknown values are treated as [`Phase::Early`].
	#[inline]
	pub fn from_param(phase: u32) -> Self {
		Phase::try_from(phase).unwrap_or(Phase::Early)
	}
}
