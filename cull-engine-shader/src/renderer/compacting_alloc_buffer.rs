use bytemuck::{Pod, Zeroable};
use cull_asset_shader::descriptor::{BufferId, Descriptors};

/// Append-only writer into a buffer of `T`s. The number of allocated `T`s is counted in word `counter_word` of
/// `counter`, which may be a plain count or a field of an indirect command.
#[repr(C)]
pub struct CompactingAllocBufferWriter<T: 'static> {
	pub buffer: BufferId<T>,
	pub counter: BufferId<u32>,
	pub counter_word: u32,
}

impl<T: Pod> CompactingAllocBufferWriter<T> {
	pub const INVALID: Self = Self {
		buffer: BufferId::INVALID,
		counter: BufferId::INVALID,
		counter_word: 0,
	};

	/// Allocates space for `count` consecutive T's with a single atomic.
	#[must_use]
	pub fn allocate<'a, D: Descriptors>(&'a self, descriptors: &'a D, count: u32) -> Allocation<'a, T, D> {
		let base = if count != 0 {
			descriptors.atomic_add(self.counter, self.counter_word, count)
		} else {
			0
		};
		Allocation {
			writer: self,
			descriptors,
			base,
			count,
		}
	}
}

pub struct Allocation<'a, T: 'static, D> {
	writer: &'a CompactingAllocBufferWriter<T>,
	descriptors: &'a D,
	base: u32,
	count: u32,
}

impl<T: Pod, D: Descriptors> Allocation<'_, T, D> {
	/// Write the `index`-th T of this allocation. Returns false if the buffer ran out of capacity, the T is dropped.
	pub fn write(&self, index: u32, t: T) -> bool {
		debug_assert!(index < self.count);
		let index = self.base + index;
		if index < self.descriptors.buffer_len(self.writer.buffer) {
			self.descriptors.store(self.writer.buffer, index, t);
			true
		} else {
			false
		}
	}
}

#[repr(C)]
pub struct CompactingAllocBufferReader<T: 'static> {
	pub buffer: BufferId<T>,
	pub counter: BufferId<u32>,
	pub counter_word: u32,
}

impl<T: Pod> CompactingAllocBufferReader<T> {
	pub fn access<'a, D: Descriptors>(&self, descriptors: &'a D) -> CompactingAllocBufferReaderAccessed<'a, T, D> {
		let count = descriptors.load(self.counter, self.counter_word);
		CompactingAllocBufferReaderAccessed {
			buffer: self.buffer,
			descriptors,
			// allocations past the capacity were dropped
			len: u32::min(count, descriptors.buffer_len(self.buffer)),
		}
	}
}

pub struct CompactingAllocBufferReaderAccessed<'a, T: 'static, D> {
	buffer: BufferId<T>,
	descriptors: &'a D,
	len: u32,
}

impl<T: Pod, D: Descriptors> CompactingAllocBufferReaderAccessed<'_, T, D> {
	pub fn len(&self) -> u32 {
		self.len
	}

	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	pub fn read(&self, index: u32) -> T {
		let len = self.len;
		if index < len {
			self.descriptors.load(self.buffer, index)
		} else {
			// len must not be referred to as self.len but as a local variable, rust-gpu doesn't like it otherwise
			panic!("index out of bounds: the len is {} but the index is {}", len, index);
		}
	}
}

macro_rules! impl_plain {
	($name:ident) => {
		impl<T: 'static> Copy for $name<T> {}

		impl<T: 'static> Clone for $name<T> {
			fn clone(&self) -> Self {
				*self
			}
		}

		impl<T: 'static> core::fmt::Debug for $name<T> {
			fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
				f.debug_struct(stringify!($name))
					.field("buffer", &self.buffer)
					.field("counter", &self.counter)
					.field("counter_word", &self.counter_word)
					.finish()
			}
		}

		// Safety: repr(C) of three u32-sized fields without padding
		unsafe impl<T: 'static> Zeroable for $name<T> {}
		unsafe impl<T: 'static> Pod for $name<T> {}
	};
}
impl_plain!(CompactingAllocBufferWriter);
impl_plain!(CompactingAllocBufferReader);

impl<T: Pod> From<CompactingAllocBufferWriter<T>> for CompactingAllocBufferReader<T> {
	fn from(value: CompactingAllocBufferWriter<T>) -> Self {
		Self {
			buffer: value.buffer,
			counter: value.counter,
			counter_word: value.counter_word,
		}
	}
}
