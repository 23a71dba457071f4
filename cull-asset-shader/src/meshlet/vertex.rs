use bytemuck_derive::{Pod, Zeroable};
use glam::Vec3;
use static_assertions::const_assert_eq;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
	pub position: Vec3,
	pub _pad: f32,
}
const_assert_eq!(size_of::<Vertex>(), 16);

impl Vertex {
	pub fn new(position: Vec3) -> Self {
		Self { position, _pad: 0. }
	}
}
