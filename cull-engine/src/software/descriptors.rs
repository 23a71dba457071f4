use crate::renderer::bindless::ImageFormat;
use crate::renderer::render_graph::resource::ResourceId;
use bytemuck::Pod;
use cull_asset_shader::descriptor::{BufferId, Descriptors, ImageId};
use glam::UVec2;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// What uninitialized memory reads as.
pub const GARBAGE: u32 = 0xDEADBEEF;

#[derive(Debug)]
pub struct BufferStorage {
	pub name: String,
	pub words: Box<[AtomicU32]>,
}

impl BufferStorage {
	pub fn new(name: &str, words: usize) -> Self {
		Self {
			name: name.to_string(),
			words: (0..words).map(|_| AtomicU32::new(GARBAGE)).collect(),
		}
	}
}

#[derive(Debug)]
pub struct ImageStorage {
	pub name: String,
	pub format: ImageFormat,
	pub extent: UVec2,
	/// row major texels of every mip
	pub mips: Vec<Box<[AtomicU64]>>,
}

impl ImageStorage {
	pub fn new(name: &str, format: ImageFormat, extent: UVec2, mip_levels: u32) -> Self {
		let garbage = match format {
			ImageFormat::R64Uint => (GARBAGE as u64) << 32 | GARBAGE as u64,
			ImageFormat::R32Float | ImageFormat::R32Uint => GARBAGE as u64,
		};
		let mips = (0..mip_levels)
			.map(|mip| {
				let extent = cull_engine_shader::renderer::hiz::mip_extent(extent, mip);
				(0..extent.x as usize * extent.y as usize)
					.map(|_| AtomicU64::new(garbage))
					.collect()
			})
			.collect();
		Self {
			name: name.to_string(),
			format,
			extent,
			mips,
		}
	}

	pub fn mip_extent(&self, mip: u32) -> UVec2 {
		cull_engine_shader::renderer::hiz::mip_extent(self.extent, mip)
	}

	pub fn texel(&self, mip: u32, coord: UVec2) -> Option<&AtomicU64> {
		let extent = self.mip_extent(mip);
		if coord.x >= extent.x || coord.y >= extent.y {
			return None;
		}
		self.mips
			.get(mip as usize)?
			.get(coord.y as usize * extent.x as usize + coord.x as usize)
	}

	/// 32-bit formats truncate
	fn narrow(&self, value: u64) -> u64 {
		match self.format {
			ImageFormat::R64Uint => value,
			ImageFormat::R32Float | ImageFormat::R32Uint => value & u32::MAX as u64,
		}
	}
}

#[derive(Clone, Debug, Default)]
pub struct ResourceTable {
	pub buffers: FxHashMap<u32, Arc<BufferStorage>>,
	pub images: FxHashMap<u32, Arc<ImageStorage>>,
}

impl ResourceTable {
	pub fn contains(&self, resource: ResourceId) -> bool {
		match resource {
			ResourceId::Buffer(id) => self.buffers.contains_key(&id),
			ResourceId::Image(id) => self.images.contains_key(&id),
		}
	}
}

/// An immutable snapshot of all live resources, against which a single pass executes. Accesses are bounds checked:
/// loads out of bounds or of dead handles return zero, stores are dropped.
#[derive(Clone, Debug)]
pub struct SoftwareDescriptors {
	table: Arc<ResourceTable>,
}

fn words_per<T>() -> usize {
	(size_of::<T>() / 4).max(1)
}

impl SoftwareDescriptors {
	pub fn new(table: Arc<ResourceTable>) -> Self {
		Self { table }
	}

	pub fn table(&self) -> &ResourceTable {
		&self.table
	}

	pub fn buffer_words<T>(&self, buffer: BufferId<T>) -> Option<&[AtomicU32]> {
		self.table.buffers.get(&buffer.id()).map(|b| &*b.words)
	}

	pub fn image(&self, image: ImageId) -> Option<&ImageStorage> {
		self.table.images.get(&image.id()).map(|i| &**i)
	}

	fn words<T>(&self, buffer: BufferId<T>, index: u32) -> Option<&[AtomicU32]> {
		let n = words_per::<T>();
		let start = index as usize * n;
		self.buffer_words(buffer)?.get(start..start + n)
	}
}

impl Descriptors for SoftwareDescriptors {
	fn buffer_len<T: Pod>(&self, buffer: BufferId<T>) -> u32 {
		self.buffer_words(buffer)
			.map_or(0, |words| (words.len() / words_per::<T>()) as u32)
	}

	fn load<T: Pod>(&self, buffer: BufferId<T>, index: u32) -> T {
		let mut t = T::zeroed();
		if let Some(words) = self.words(buffer, index) {
			let bytes = bytemuck::bytes_of_mut(&mut t);
			for (chunk, word) in bytes.chunks_exact_mut(4).zip(words) {
				chunk.copy_from_slice(&word.load(Ordering::Relaxed).to_ne_bytes());
			}
		}
		t
	}

	fn store<T: Pod>(&self, buffer: BufferId<T>, index: u32, value: T) {
		if let Some(words) = self.words(buffer, index) {
			for (chunk, word) in bytemuck::bytes_of(&value).chunks_exact(4).zip(words) {
				word.store(u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]), Ordering::Relaxed);
			}
		}
	}

	fn atomic_add<T: Pod>(&self, buffer: BufferId<T>, word: u32, value: u32) -> u32 {
		self.buffer_words(buffer)
			.and_then(|words| words.get(word as usize))
			.map_or(0, |w| w.fetch_add(value, Ordering::Relaxed))
	}

	fn atomic_or<T: Pod>(&self, buffer: BufferId<T>, word: u32, value: u32) -> u32 {
		self.buffer_words(buffer)
			.and_then(|words| words.get(word as usize))
			.map_or(0, |w| w.fetch_or(value, Ordering::Relaxed))
	}

	fn image_extent(&self, image: ImageId, mip: u32) -> UVec2 {
		self.image(image).map_or(UVec2::ZERO, |i| i.mip_extent(mip))
	}

	fn image_mip_levels(&self, image: ImageId) -> u32 {
		self.image(image).map_or(0, |i| i.mips.len() as u32)
	}

	fn image_load(&self, image: ImageId, mip: u32, coord: UVec2) -> u64 {
		self.image(image)
			.and_then(|i| i.texel(mip, coord))
			.map_or(0, |t| t.load(Ordering::Relaxed))
	}

	fn image_store(&self, image: ImageId, mip: u32, coord: UVec2, value: u64) {
		if let Some(image) = self.image(image) {
			if let Some(texel) = image.texel(mip, coord) {
				texel.store(image.narrow(value), Ordering::Relaxed);
			}
		}
	}

	fn image_atomic_max(&self, image: ImageId, coord: UVec2, value: u64) {
		if let Some(image) = self.image(image) {
			if let Some(texel) = image.texel(0, coord) {
				texel.fetch_max(image.narrow(value), Ordering::Relaxed);
			}
		}
	}

	fn image_atomic_add(&self, image: ImageId, coord: UVec2, value: u64) {
		if let Some(image) = self.image(image) {
			if let Some(texel) = image.texel(0, coord) {
				match image.format {
					ImageFormat::R64Uint => {
						texel.fetch_add(value, Ordering::Relaxed);
					}
					// wraps at 32 bits
					ImageFormat::R32Float | ImageFormat::R32Uint => {
						let _ = texel.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |t| {
							Some((t as u32).wrapping_add(value as u32) as u64)
						});
					}
				}
			}
		}
	}
}
