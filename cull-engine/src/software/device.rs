use crate::renderer::bindless::{AllocError, Bindless, BindlessBufferCreateInfo, BindlessImageCreateInfo};
use crate::renderer::pipelines::PipelineKey;
use crate::renderer::render_graph::graph::FrameGraph;
use crate::renderer::render_graph::pass::{Command, Pass};
use crate::renderer::render_graph::resource::ResourceId;
use crate::software::descriptors::{BufferStorage, ImageStorage, ResourceTable, SoftwareDescriptors};
use crate::software::pipelines::{Pipeline, software_pipelines};
use bytemuck::Pod;
use cull_asset_shader::descriptor::{BufferId, Descriptors, ImageId};
use cull_engine_shader::renderer::hiz::hiz_mip_levels;
use glam::{UVec2, UVec3};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Debug, thiserror::Error)]
pub enum ExecuteError {
	#[error("pass {pass:?} uses unknown pipeline {pipeline:?}")]
	UnknownPipeline { pass: String, pipeline: PipelineKey },
	#[error("pass {pass:?} requires a {expected} pipeline, but {pipeline:?} is a {actual} pipeline")]
	PipelineKind {
		pass: String,
		pipeline: PipelineKey,
		expected: &'static str,
		actual: &'static str,
	},
	#[error("pass {pass:?} has a param of {actual} bytes, but {pipeline:?} expects {expected} bytes")]
	ParamSize {
		pass: String,
		pipeline: PipelineKey,
		expected: usize,
		actual: usize,
	},
	#[error("pass {pass:?} accesses {resource:?}, which does not exist")]
	MissingResource { pass: String, resource: ResourceId },
	#[error("{resource:?} is not alive")]
	NotAlive { resource: ResourceId },
}

/// Executes frames on the CPU. Kernels of a pass run in parallel on the rayon thread pool, passes execute one after
/// another in recorded order.
pub struct SoftwareDevice {
	table: RwLock<Arc<ResourceTable>>,
	next_id: AtomicU32,
	pipelines: FxHashMap<PipelineKey, Pipeline>,
}

impl Default for SoftwareDevice {
	fn default() -> Self {
		Self::new()
	}
}

impl SoftwareDevice {
	pub fn new() -> Self {
		Self::with_pipelines(software_pipelines())
	}

	pub fn with_pipelines(pipelines: FxHashMap<PipelineKey, Pipeline>) -> Self {
		Self {
			table: RwLock::new(Arc::new(ResourceTable::default())),
			next_id: AtomicU32::new(0),
			pipelines,
		}
	}

	/// Removes a pipeline, returning it if it existed.
	pub fn remove_pipeline(&mut self, key: PipelineKey) -> Option<Pipeline> {
		self.pipelines.remove(&key)
	}

	fn next_id(&self) -> u32 {
		self.next_id.fetch_add(1, Ordering::Relaxed)
	}

	/// Immutable view of all resources alive right now.
	pub fn snapshot(&self) -> SoftwareDescriptors {
		SoftwareDescriptors::new(self.table.read().clone())
	}

	fn modify(&self, f: impl FnOnce(&mut ResourceTable)) {
		let mut table = self.table.write();
		f(Arc::make_mut(&mut table));
	}

	pub fn live_resource_count(&self) -> usize {
		let table = self.table.read();
		table.buffers.len() + table.images.len()
	}

	pub fn read_buffer<T: Pod>(&self, buffer: BufferId<T>) -> Result<Vec<T>, ExecuteError> {
		let descriptors = self.snapshot();
		if !descriptors.table().contains(buffer.into()) {
			return Err(ExecuteError::NotAlive {
				resource: buffer.into(),
			});
		}
		Ok((0..descriptors.buffer_len(buffer))
			.map(|i| descriptors.load(buffer, i))
			.collect())
	}

	/// Raw texels of a mip, row major.
	pub fn read_image(&self, image: ImageId, mip: u32) -> Result<Vec<u64>, ExecuteError> {
		let descriptors = self.snapshot();
		let storage = descriptors.image(image).ok_or(ExecuteError::NotAlive {
			resource: image.into(),
		})?;
		Ok(storage
			.mips
			.get(mip as usize)
			.map(|texels| texels.iter().map(|t| t.load(Ordering::Relaxed)).collect())
			.unwrap_or_default())
	}

	/// Overwrites all texels of a mip.
	pub fn write_image(&self, image: ImageId, mip: u32, value: u64) -> Result<(), ExecuteError> {
		let descriptors = self.snapshot();
		let extent = descriptors.image_extent(image, mip);
		if !descriptors.table().contains(image.into()) {
			return Err(ExecuteError::NotAlive {
				resource: image.into(),
			});
		}
		for y in 0..extent.y {
			for x in 0..extent.x {
				descriptors.image_store(image, mip, UVec2::new(x, y), value);
			}
		}
		Ok(())
	}

	/// Executes all passes of `graph` in order. Transients are released after their last use, even if a pass failed.
	#[profiling::function]
	pub fn execute(&self, graph: FrameGraph<'_, Self>) -> Result<(), ExecuteError> {
		let frame = graph.finish();
		let mut result = Ok(());
		for recorded in &frame.passes {
			if result.is_ok() {
				result = self.execute_pass(&recorded.pass);
			}
			for resource in &recorded.release {
				self.free(*resource);
			}
		}
		result
	}

	fn execute_pass(&self, pass: &Pass) -> Result<(), ExecuteError> {
		profiling::scope!("execute pass", pass.name.as_str());
		log::trace!("executing pass {:?}", pass.name);
		let descriptors = self.snapshot();
		if let Some(access) = pass.accesses.iter().find(|a| !descriptors.table().contains(a.resource)) {
			return Err(ExecuteError::MissingResource {
				pass: pass.name.clone(),
				resource: access.resource,
			});
		}

		match &pass.command {
			Command::FillBuffer { buffer, value } => {
				if let Some(words) = descriptors.buffer_words(*buffer) {
					words.iter().for_each(|w| w.store(*value, Ordering::Relaxed));
				}
			}
			Command::WriteBuffer {
				buffer,
				offset_words,
				data,
			} => {
				if let Some(words) = descriptors.buffer_words(*buffer) {
					for (word, value) in words.iter().skip(*offset_words as usize).zip(data) {
						word.store(*value, Ordering::Relaxed);
					}
				}
			}
			Command::ClearImage { image, mips, value } => {
				for mip in mips.clone() {
					let extent = descriptors.image_extent(*image, mip);
					for y in 0..extent.y {
						for x in 0..extent.x {
							descriptors.image_store(*image, mip, UVec2::new(x, y), *value);
						}
					}
				}
			}
			Command::Dispatch { pipeline, groups } => {
				self.dispatch(pass, &descriptors, *pipeline, *groups)?;
			}
			Command::DispatchIndirect { pipeline, args } => {
				let args = descriptors.load(*args, 0);
				self.dispatch(pass, &descriptors, *pipeline, UVec3::new(args.x, args.y, args.z))?;
			}
			Command::DrawIndexedIndirect {
				pipeline,
				command,
				indices,
				extent,
			} => match self.pipeline(pass, *pipeline)? {
				Pipeline::Graphics(graphics) => {
					let command = descriptors.load(*command, 0);
					graphics.draw(&descriptors, &pass.param, &command, *indices, *extent);
				}
				other => return Err(kind_mismatch(pass, *pipeline, "graphics", other)),
			},
		}
		Ok(())
	}

	fn pipeline(&self, pass: &Pass, key: PipelineKey) -> Result<&Pipeline, ExecuteError> {
		let pipeline = self.pipelines.get(&key).ok_or_else(|| ExecuteError::UnknownPipeline {
			pass: pass.name.clone(),
			pipeline: key,
		})?;
		if pipeline.param_size() != pass.param.len() {
			return Err(ExecuteError::ParamSize {
				pass: pass.name.clone(),
				pipeline: key,
				expected: pipeline.param_size(),
				actual: pass.param.len(),
			});
		}
		Ok(pipeline)
	}

	fn dispatch(
		&self,
		pass: &Pass,
		descriptors: &SoftwareDescriptors,
		key: PipelineKey,
		groups: UVec3,
	) -> Result<(), ExecuteError> {
		match self.pipeline(pass, key)? {
			Pipeline::Compute(compute) => {
				compute.dispatch(descriptors, &pass.param, groups);
				Ok(())
			}
			other => Err(kind_mismatch(pass, key, "compute", other)),
		}
	}
}

fn kind_mismatch(pass: &Pass, pipeline: PipelineKey, expected: &'static str, actual: &Pipeline) -> ExecuteError {
	ExecuteError::PipelineKind {
		pass: pass.name.clone(),
		pipeline,
		expected,
		actual: actual.kind(),
	}
}

impl Bindless for SoftwareDevice {
	fn alloc_buffer_slice<T: Pod>(&self, info: &BindlessBufferCreateInfo, len: usize) -> Result<BufferId<T>, AllocError> {
		let element_size = size_of::<T>();
		if element_size % 4 != 0 || element_size == 0 {
			return Err(AllocError::UnalignedElement {
				name: info.name.to_string(),
				element_size,
			});
		}
		let words = len
			.checked_mul(element_size / 4)
			.filter(|words| *words <= u32::MAX as usize)
			.ok_or_else(|| AllocError::BufferTooLarge {
				name: info.name.to_string(),
				len,
				element_size,
			})?;
		let id = self.next_id();
		let storage = Arc::new(BufferStorage::new(info.name, words));
		self.modify(|table| {
			table.buffers.insert(id, storage);
		});
		Ok(BufferId::new(id))
	}

	fn alloc_buffer_from_slice<T: Pod>(
		&self,
		info: &BindlessBufferCreateInfo,
		data: &[T],
	) -> Result<BufferId<T>, AllocError> {
		let buffer = self.alloc_buffer_slice::<T>(info, data.len())?;
		let descriptors = self.snapshot();
		for (i, t) in data.iter().enumerate() {
			descriptors.store(buffer, i as u32, *t);
		}
		Ok(buffer)
	}

	fn alloc_image(&self, info: &BindlessImageCreateInfo) -> Result<ImageId, AllocError> {
		if info.extent.min_element() == 0 || info.mip_levels == 0 || info.mip_levels > hiz_mip_levels(info.extent) {
			return Err(AllocError::InvalidImage {
				name: info.name.to_string(),
				extent: info.extent,
				mip_levels: info.mip_levels,
			});
		}
		let id = self.next_id();
		let storage = Arc::new(ImageStorage::new(info.name, info.format, info.extent, info.mip_levels));
		self.modify(|table| {
			table.images.insert(id, storage);
		});
		Ok(ImageId::new(id))
	}

	fn free(&self, resource: ResourceId) {
		let mut freed = false;
		self.modify(|table| {
			freed = match resource {
				ResourceId::Buffer(id) => table.buffers.remove(&id).is_some(),
				ResourceId::Image(id) => table.images.remove(&id).is_some(),
			};
		});
		if !freed {
			log::warn!("freeing {:?}, which is not alive", resource);
		}
	}

	fn has_pipeline(&self, key: PipelineKey) -> bool {
		self.pipelines.contains_key(&key)
	}
}
