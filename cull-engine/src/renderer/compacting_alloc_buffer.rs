use crate::renderer::bindless::{Bindless, BufferUsage};
use crate::renderer::render_graph::graph::{FrameGraph, RecordError};
use crate::renderer::render_graph::pass::Pass;
use bytemuck::Pod;
use cull_asset_shader::descriptor::BufferId;
use cull_engine_shader::renderer::compacting_alloc_buffer::{
	CompactingAllocBufferReader, CompactingAllocBufferWriter,
};

/// A transient append buffer with its own counter, not yet written to this frame.
pub struct CompactingAllocBuffer<T: Pod> {
	buffer: BufferId<T>,
	counter: BufferId<u32>,
	capacity: u32,
}

impl<T: Pod> CompactingAllocBuffer<T> {
	pub fn new<B: Bindless>(graph: &mut FrameGraph<B>, name: &str, capacity: u32) -> Result<Self, RecordError> {
		let buffer = graph.transient_buffer(
			&format!("CompactingAllocBuffer {} buffer", name),
			BufferUsage::STORAGE_BUFFER,
			capacity as usize,
		)?;
		let counter = graph.transient_buffer(
			&format!("CompactingAllocBuffer {} counter", name),
			BufferUsage::STORAGE_BUFFER | BufferUsage::TRANSFER_DST,
			1,
		)?;
		Ok(Self {
			buffer,
			counter,
			capacity,
		})
	}

	pub fn capacity(&self) -> u32 {
		self.capacity
	}

	/// Records the reset of the counter.
	pub fn transition_writing<B: Bindless>(
		self,
		graph: &mut FrameGraph<B>,
	) -> Result<CompactingAllocBufferWriting<T>, RecordError> {
		graph.add_pass(Pass::fill_buffer("clear CompactingAllocBuffer counter", self.counter, 0))?;
		Ok(CompactingAllocBufferWriting { inner: self })
	}
}

pub struct CompactingAllocBufferWriting<T: Pod> {
	inner: CompactingAllocBuffer<T>,
}

impl<T: Pod> CompactingAllocBufferWriting<T> {
	pub fn to_writer(&self) -> CompactingAllocBufferWriter<T> {
		CompactingAllocBufferWriter {
			buffer: self.inner.buffer,
			counter: self.inner.counter,
			counter_word: 0,
		}
	}

	/// Declares the accesses of a pass appending to this buffer.
	pub fn write(&self, pass: Pass) -> Pass {
		pass.write(self.inner.buffer).read_write(self.inner.counter)
	}

	pub fn transition_reading(self) -> CompactingAllocBufferReading<T> {
		CompactingAllocBufferReading {
			buffer: self.inner.buffer,
			counter: self.inner.counter,
			capacity: self.inner.capacity,
		}
	}
}

/// Written to this frame, no further allocations are allowed.
#[derive(Debug)]
pub struct CompactingAllocBufferReading<T: Pod> {
	buffer: BufferId<T>,
	counter: BufferId<u32>,
	capacity: u32,
}

impl<T: Pod> Copy for CompactingAllocBufferReading<T> {}

impl<T: Pod> Clone for CompactingAllocBufferReading<T> {
	fn clone(&self) -> Self {
		*self
	}
}

impl<T: Pod> CompactingAllocBufferReading<T> {
	pub fn to_reader(&self) -> CompactingAllocBufferReader<T> {
		CompactingAllocBufferReader {
			buffer: self.buffer,
			counter: self.counter,
			counter_word: 0,
		}
	}

	/// Declares the accesses of a pass reading this buffer.
	pub fn read(&self, pass: Pass) -> Pass {
		pass.read(self.buffer).read(self.counter)
	}

	pub fn buffer(&self) -> BufferId<T> {
		self.buffer
	}

	/// word 0 holds the number of allocated `T`s, which may exceed the capacity
	pub fn counter(&self) -> BufferId<u32> {
		self.counter
	}

	pub fn capacity(&self) -> u32 {
		self.capacity
	}

	pub fn retain<B: Bindless>(&self, graph: &mut FrameGraph<B>) {
		graph.retain(self.buffer);
		graph.retain(self.counter);
	}
}
