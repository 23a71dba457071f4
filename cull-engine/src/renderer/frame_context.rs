use crate::geometry::builder::GeometryModel;
use crate::renderer::bindless::{Bindless, BufferUsage};
use crate::renderer::render_graph::graph::{FrameGraph, RecordError};
use crate::renderer::render_graph::pass::Pass;
use cull_asset_shader::affine_transform::AffineTransform;
use cull_asset_shader::descriptor::BufferId;
use cull_asset_shader::meshlet::instance::MeshInstance;
use cull_asset_shader::meshlet::model::MeshletModel;
use cull_engine_shader::renderer::camera::Camera;
use cull_engine_shader::renderer::meshlet::visbuffer::MAX_MESHLET_INSTANCES;

/// Everything a frame draws, as seen from the host.
#[derive(Copy, Clone, Debug)]
pub struct SceneInput<'a> {
	pub model: &'a GeometryModel,
	pub camera: Camera,
	pub instances: &'a [MeshInstance],
	pub transforms: &'a [AffineTransform],
}

/// A `FrameContext` is created once per frame rendered, containing the uploaded per-frame data and the worst case
/// sizes of all per-frame buffers.
#[derive(Copy, Clone, Debug)]
pub struct FrameContext {
	pub camera: Camera,
	pub camera_buffer: BufferId<Camera>,
	pub model: MeshletModel,
	pub instances: BufferId<MeshInstance>,
	pub transforms: BufferId<AffineTransform>,
	pub num_instances: u32,
	/// meshlet instances if no mesh instance is culled
	pub meshlet_capacity: u32,
	/// triangles if no meshlet is culled
	pub triangle_capacity: u32,
}

impl FrameContext {
	#[profiling::function]
	pub fn upload<B: Bindless>(graph: &mut FrameGraph<B>, scene: &SceneInput) -> Result<Self, RecordError> {
		let meshes = &scene.model.meshes;
		let mut meshlet_capacity = 0u64;
		let mut triangle_capacity = 0u64;
		for (instance_id, instance) in scene.instances.iter().enumerate() {
			let mesh = meshes.get(instance.mesh_id as usize).ok_or(RecordError::InvalidInstance {
				instance: instance_id as u32,
				what: "mesh",
				id: instance.mesh_id,
				len: meshes.len() as u32,
			})?;
			if instance.transform_id as usize >= scene.transforms.len() {
				return Err(RecordError::InvalidInstance {
					instance: instance_id as u32,
					what: "transform",
					id: instance.transform_id,
					len: scene.transforms.len() as u32,
				});
			}
			meshlet_capacity += mesh.meshlet_count() as u64;
			triangle_capacity += mesh.triangle_count as u64;
		}
		if meshlet_capacity > MAX_MESHLET_INSTANCES as u64 {
			return Err(RecordError::TooManyMeshletInstances {
				count: meshlet_capacity,
				max: MAX_MESHLET_INSTANCES,
			});
		}

		let usage = BufferUsage::STORAGE_BUFFER | BufferUsage::TRANSFER_DST;
		let camera_buffer = graph.transient_buffer("camera", usage, 1)?;
		graph.add_pass(Pass::write_buffer("upload camera", camera_buffer, 0, &[scene.camera]))?;
		let instances = graph.transient_buffer("mesh instances", usage, scene.instances.len())?;
		graph.add_pass(Pass::write_buffer("upload mesh instances", instances, 0, scene.instances))?;
		let transforms = graph.transient_buffer("transforms", usage, scene.transforms.len())?;
		graph.add_pass(Pass::write_buffer("upload transforms", transforms, 0, scene.transforms))?;

		Ok(Self {
			camera: scene.camera,
			camera_buffer,
			model: scene.model.gpu,
			instances,
			transforms,
			num_instances: scene.instances.len() as u32,
			meshlet_capacity: meshlet_capacity as u32,
			triangle_capacity: u64::min(triangle_capacity, u32::MAX as u64) as u32,
		})
	}

	/// Declares the reads of the scene every culling and drawing pass does.
	pub fn read(&self, pass: Pass) -> Pass {
		pass.read(self.camera_buffer)
			.read(self.instances)
			.read(self.transforms)
			.read(self.model.meshes)
			.read(self.model.meshlets)
			.read(self.model.vertices)
			.read(self.model.meshlet_vertices)
			.read(self.model.triangles)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::software::device::SoftwareDevice;
	use bytemuck::Zeroable;
	use cull_asset_shader::meshlet::mesh::Mesh;
	use cull_asset_shader::span::Span;
	use glam::{UVec2, Vec3};

	/// A model that is only ever looked at on the host, its buffers are never bound.
	fn huge_model(meshlets: u32) -> GeometryModel {
		GeometryModel {
			gpu: MeshletModel::zeroed(),
			meshes: vec![Mesh {
				meshlets: Span::new(0, meshlets),
				triangle_count: meshlets,
				..Mesh::default()
			}],
		}
	}

	fn upload(instances: u32, model: &GeometryModel) -> Result<FrameContext, RecordError> {
		let device = SoftwareDevice::new();
		let mut graph = FrameGraph::new(&device);
		let scene = SceneInput {
			model,
			camera: Camera::look_at_reverse_z(Vec3::ZERO, Vec3::NEG_Z, 1., 0.1, 100., UVec2::splat(8)),
			instances: &vec![MeshInstance::new(0, 0, 0); instances as usize],
			transforms: &[AffineTransform::IDENTITY],
		};
		FrameContext::upload(&mut graph, &scene)
	}

	#[test]
	fn meshlet_instance_limit() {
		let model = huge_model(MAX_MESHLET_INSTANCES / 2);
		let frame = upload(2, &model).unwrap();
		assert_eq!(frame.meshlet_capacity, MAX_MESHLET_INSTANCES);
		assert!(matches!(
			upload(3, &model),
			Err(RecordError::TooManyMeshletInstances { count, max: MAX_MESHLET_INSTANCES })
				if count == 3 * (MAX_MESHLET_INSTANCES / 2) as u64
		));
	}
}
