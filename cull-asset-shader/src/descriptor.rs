use bytemuck::{Pod, Zeroable};
use core::fmt::{Debug, Formatter};
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use glam::UVec2;

/// A typed handle to a buffer of `T`s. Only the handle is passed around, the buffer itself is resolved through
/// [`Descriptors`] when a kernel runs.
#[repr(transparent)]
pub struct BufferId<T: 'static> {
	id: u32,
	_phantom: PhantomData<fn() -> T>,
}

impl<T: 'static> BufferId<T> {
	pub const INVALID: Self = Self::new(u32::MAX);

	#[inline]
	pub const fn new(id: u32) -> Self {
		Self {
			id,
			_phantom: PhantomData,
		}
	}

	#[inline]
	pub const fn id(&self) -> u32 {
		self.id
	}

	#[inline]
	pub const fn is_valid(&self) -> bool {
		self.id != u32::MAX
	}

	/// Reinterpret the same buffer as containing `U`s, eg. to do word-sized atomics on an indirect command.
	#[inline]
	pub const fn cast<U: 'static>(self) -> BufferId<U> {
		BufferId::new(self.id)
	}
}

impl<T: 'static> Copy for BufferId<T> {}

impl<T: 'static> Clone for BufferId<T> {
	#[inline]
	fn clone(&self) -> Self {
		*self
	}
}

impl<T: 'static> PartialEq for BufferId<T> {
	#[inline]
	fn eq(&self, other: &Self) -> bool {
		self.id == other.id
	}
}

impl<T: 'static> Eq for BufferId<T> {}

impl<T: 'static> Hash for BufferId<T> {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.id.hash(state)
	}
}

impl<T: 'static> Debug for BufferId<T> {
	fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
		write!(f, "BufferId({})", self.id)
	}
}

// Safety: repr(transparent) over a u32, the PhantomData is a ZST
unsafe impl<T: 'static> Zeroable for BufferId<T> {}
unsafe impl<T: 'static> Pod for BufferId<T> {}

#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, bytemuck_derive::Pod, bytemuck_derive::Zeroable)]
pub struct ImageId(u32);

impl ImageId {
	pub const INVALID: Self = Self(u32::MAX);

	#[inline]
	pub const fn new(id: u32) -> Self {
		Self(id)
	}

	#[inline]
	pub const fn id(&self) -> u32 {
		self.0
	}

	#[inline]
	pub const fn is_valid(&self) -> bool {
		self.0 != u32::MAX
	}
}

/// Access to all live buffers and images from within a kernel.
///
/// Buffers are arrays of 32-bit words, `index` addresses whole `T`s while `word` addresses single words for atomics.
/// Image texels are raw 64-bit values, 32-bit formats only ever use the low half.
pub trait Descriptors: Sync {
	/// the number of `T`s that fit into the buffer
	fn buffer_len<T: Pod>(&self, buffer: BufferId<T>) -> u32;

	fn load<T: Pod>(&self, buffer: BufferId<T>, index: u32) -> T;

	fn store<T: Pod>(&self, buffer: BufferId<T>, index: u32, value: T);

	/// returns the previous value
	fn atomic_add<T: Pod>(&self, buffer: BufferId<T>, word: u32, value: u32) -> u32;

	/// returns the previous value
	fn atomic_or<T: Pod>(&self, buffer: BufferId<T>, word: u32, value: u32) -> u32;

	fn image_extent(&self, image: ImageId, mip: u32) -> UVec2;

	fn image_mip_levels(&self, image: ImageId) -> u32;

	fn image_load(&self, image: ImageId, mip: u32, coord: UVec2) -> u64;

	fn image_store(&self, image: ImageId, mip: u32, coord: UVec2, value: u64);

	fn image_atomic_max(&self, image: ImageId, coord: UVec2, value: u64);

	fn image_atomic_add(&self, image: ImageId, coord: UVec2, value: u64);
}
