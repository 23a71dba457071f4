use crate::renderer::bindless::{
	AllocError, Bindless, BindlessBufferCreateInfo, BindlessImageCreateInfo, BufferUsage,
};
use crate::renderer::pipelines::PipelineKey;
use crate::renderer::render_graph::pass::Pass;
use crate::renderer::render_graph::resource::{AccessKind, Barrier, ResourceId, Subresource};
use bytemuck::Pod;
use cull_asset_shader::descriptor::{BufferId, ImageId};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use static_assertions::assert_not_impl_any;

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
	#[error("pass {pass:?} reads {resource:?} mip {mip}, which no earlier pass has written")]
	ReadBeforeWrite {
		pass: String,
		resource: ResourceId,
		mip: u32,
	},
	#[error("pass {pass:?} uses missing pipeline {pipeline:?}")]
	MissingPipeline { pass: String, pipeline: PipelineKey },
	#[error("instance {instance} references {what} {id}, but there are only {len}")]
	InvalidInstance {
		instance: u32,
		what: &'static str,
		id: u32,
		len: u32,
	},
	#[error("{count} meshlet instances exceed the maximum of {max}")]
	TooManyMeshletInstances { count: u64, max: u32 },
	#[error(transparent)]
	Alloc(#[from] AllocError),
}

/// A [`Pass`] with everything the device must wait on before executing it.
#[derive(Clone, Debug)]
pub struct RecordedPass {
	pub pass: Pass,
	/// indices of earlier passes
	pub dependencies: SmallVec<[usize; 4]>,
	pub barriers: SmallVec<[Barrier; 4]>,
	/// transient resources to free once this pass completed
	pub release: SmallVec<[ResourceId; 4]>,
}

#[derive(Default)]
struct SubresourceState {
	last_write: Option<(usize, AccessKind)>,
	reads_since_write: SmallVec<[(usize, AccessKind); 4]>,
}

struct Transient {
	name: String,
	last_use: Option<usize>,
	retained: bool,
}

/// Records the passes of a frame in submission order. Dependencies and barriers are derived from the declared
/// accesses: read after write, write after read and write after write on every subresource.
///
/// Transient resources live until their last use and are released by the device afterward, unless they are
/// [retained](Self::retain). Dropping a graph without executing it frees all transients.
pub struct FrameGraph<'a, B: Bindless> {
	bindless: &'a B,
	passes: Vec<RecordedPass>,
	states: FxHashMap<Subresource, SubresourceState>,
	transients: FxHashMap<ResourceId, Transient>,
}

assert_not_impl_any!(FrameGraph<'static, crate::software::device::SoftwareDevice>: Clone);

/// The passes of a frame, ready to be executed.
#[derive(Debug)]
pub struct RecordedFrame {
	pub passes: Vec<RecordedPass>,
}

impl<'a, B: Bindless> FrameGraph<'a, B> {
	pub fn new(bindless: &'a B) -> Self {
		Self {
			bindless,
			passes: Vec::new(),
			states: FxHashMap::default(),
			transients: FxHashMap::default(),
		}
	}

	pub fn bindless(&self) -> &'a B {
		self.bindless
	}

	pub fn passes(&self) -> &[RecordedPass] {
		&self.passes
	}

	/// A buffer with undefined contents that lives until its last use in this frame.
	pub fn transient_buffer<T: Pod>(&mut self, name: &str, usage: BufferUsage, len: usize) -> Result<BufferId<T>, RecordError> {
		// zero sized buffers are not allowed
		let buffer = self
			.bindless
			.alloc_buffer_slice::<T>(&BindlessBufferCreateInfo { usage, name }, len.max(1))?;
		self.add_transient(buffer.into(), name);
		Ok(buffer)
	}

	pub fn transient_image(&mut self, info: &BindlessImageCreateInfo) -> Result<ImageId, RecordError> {
		let image = self.bindless.alloc_image(info)?;
		self.add_transient(image.into(), info.name);
		Ok(image)
	}

	fn add_transient(&mut self, resource: ResourceId, name: &str) {
		self.transients.insert(
			resource,
			Transient {
				name: name.to_string(),
				last_use: None,
				retained: false,
			},
		);
	}

	/// Keeps a transient alive past the frame, it must be freed by the caller.
	pub fn retain(&mut self, resource: impl Into<ResourceId>) {
		if let Some(transient) = self.transients.get_mut(&resource.into()) {
			transient.retained = true;
		}
	}

	/// Appends a pass, returning its index.
	#[profiling::function]
	pub fn add_pass(&mut self, pass: Pass) -> Result<usize, RecordError> {
		if let Some(pipeline) = pass.command.pipeline() {
			if !self.bindless.has_pipeline(pipeline) {
				return Err(RecordError::MissingPipeline {
					pass: pass.name,
					pipeline,
				});
			}
		}

		// validate before touching any state, a failed pass must leave the graph as it was
		for access in &pass.accesses {
			if !access.kind.is_read() || !self.transients.contains_key(&access.resource) {
				continue;
			}
			for mip in access.mips.clone() {
				let subresource = Subresource {
					resource: access.resource,
					mip,
				};
				if self.states.get(&subresource).is_none_or(|s| s.last_write.is_none()) {
					return Err(RecordError::ReadBeforeWrite {
						pass: pass.name,
						resource: access.resource,
						mip,
					});
				}
			}
		}

		let index = self.passes.len();
		let mut dependencies = SmallVec::<[usize; 4]>::new();
		let mut barriers = SmallVec::<[Barrier; 4]>::new();
		let mut depend = |pass: usize| {
			// a pass reading and writing the same subresource does not wait on itself
			if pass != index && !dependencies.contains(&pass) {
				dependencies.push(pass);
			}
		};

		for access in &pass.accesses {
			let kind = access.kind;
			for mip in access.mips.clone() {
				let subresource = Subresource {
					resource: access.resource,
					mip,
				};
				let state = self.states.entry(subresource).or_default();
				if kind.is_write() {
					if let Some((writer, src)) = state.last_write {
						depend(writer);
						if state.reads_since_write.is_empty() {
							barriers.push(Barrier { subresource, src, dst: kind });
						}
					}
					for (reader, src) in state.reads_since_write.drain(..) {
						depend(reader);
						barriers.push(Barrier { subresource, src, dst: kind });
					}
					state.last_write = Some((index, kind));
				} else {
					if let Some((writer, src)) = state.last_write {
						depend(writer);
						// the write is already visible to an earlier read of the same kind
						if !state.reads_since_write.iter().any(|(_, k)| *k == kind) {
							barriers.push(Barrier { subresource, src, dst: kind });
						}
					}
					state.reads_since_write.push((index, kind));
				}
			}
			if let Some(transient) = self.transients.get_mut(&access.resource) {
				transient.last_use = Some(index);
			}
		}

		self.passes.push(RecordedPass {
			pass,
			dependencies,
			barriers,
			release: SmallVec::new(),
		});
		Ok(index)
	}

	/// Assigns every transient to the pass after which it is released. Transients no pass used are freed right away.
	pub fn finish(mut self) -> RecordedFrame {
		let mut passes = core::mem::take(&mut self.passes);
		for (resource, transient) in core::mem::take(&mut self.transients) {
			if transient.retained {
				continue;
			}
			match transient.last_use {
				Some(pass) => passes[pass].release.push(resource),
				None => {
					log::trace!("transient {:?} was never used", transient.name);
					self.bindless.free(resource);
				}
			}
		}
		// release order would otherwise depend on hashing
		for pass in &mut passes {
			pass.release.sort();
		}
		RecordedFrame { passes }
	}
}

impl<B: Bindless> Drop for FrameGraph<'_, B> {
	fn drop(&mut self) {
		for (resource, transient) in self.transients.drain() {
			if !transient.retained {
				self.bindless.free(resource);
			}
		}
	}
}
