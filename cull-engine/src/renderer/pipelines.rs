use crate::renderer::bindless::Bindless;
use core::fmt::{Debug, Formatter};

/// Name of a precompiled pipeline.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct PipelineKey(pub &'static str);

impl Debug for PipelineKey {
	fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
		f.write_str(self.0)
	}
}

pub const CULL_MESHES: PipelineKey = PipelineKey("cull_meshes");
pub const GENERATE_CULL_COMMANDS: PipelineKey = PipelineKey("generate_cull_commands");
pub const CULL_MESHLETS: PipelineKey = PipelineKey("cull_meshlets");
pub const CULL_TRIANGLES: PipelineKey = PipelineKey("cull_triangles");
pub const HIZ_COPY: PipelineKey = PipelineKey("hiz_copy");
pub const HIZ_SLOW: PipelineKey = PipelineKey("hiz_slow");
pub const VISBUFFER_ENCODE: PipelineKey = PipelineKey("visbuffer_encode");
pub const VISBUFFER_DEPTH_ONLY: PipelineKey = PipelineKey("visbuffer_depth_only");

pub const REQUIRED_PIPELINES: [PipelineKey; 8] = [
	CULL_MESHES,
	GENERATE_CULL_COMMANDS,
	CULL_MESHLETS,
	CULL_TRIANGLES,
	HIZ_COPY,
	HIZ_SLOW,
	VISBUFFER_ENCODE,
	VISBUFFER_DEPTH_ONLY,
];

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
	#[error("pipeline {0:?} is missing")]
	Missing(PipelineKey),
}

pub fn verify_pipelines(bindless: &impl Bindless) -> Result<(), PipelineError> {
	match REQUIRED_PIPELINES.into_iter().find(|key| !bindless.has_pipeline(*key)) {
		None => Ok(()),
		Some(key) => Err(PipelineError::Missing(key)),
	}
}
