use bytemuck_derive::{Pod, Zeroable};

/// `count` consecutive elements of some buffer, starting at `first`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Span {
	pub first: u32,
	pub count: u32,
}

impl Span {
	pub const EMPTY: Self = Self::new(0, 0);

	#[inline]
	pub const fn new(first: u32, count: u32) -> Self {
		Self { first, count }
	}

	#[inline]
	pub const fn end(&self) -> u32 {
		self.first + self.count
	}

	#[inline]
	pub const fn is_empty(&self) -> bool {
		self.count == 0
	}

	/// Absolute index of the `i`th element, if the span has one.
	#[inline]
	pub fn get(&self, i: u32) -> Option<u32> {
		if i < self.count { Some(self.first + i) } else { None }
	}

	/// For slicing host-side copies of the buffer this spans.
	#[cfg(not(target_arch = "spirv"))]
	pub fn to_range(&self) -> core::ops::Range<usize> {
		self.first as usize..self.end() as usize
	}

	/// A span covering `count` elements appended to a buffer currently `len` elements long.
	#[cfg(not(target_arch = "spirv"))]
	pub fn appended(len: usize, count: usize) -> Self {
		Self::new(len as u32, count as u32)
	}
}
