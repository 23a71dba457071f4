use crate::renderer::bindless::{AllocError, Bindless, BindlessBufferCreateInfo, BufferUsage};
use crate::renderer::render_graph::resource::ResourceId;
use anyhow::anyhow;
use bytemuck::Pod;
use cull_asset_shader::descriptor::BufferId;
use cull_asset_shader::meshlet::indices::pack_triangles;
use cull_asset_shader::meshlet::mesh::{Mesh, Meshlet};
use cull_asset_shader::meshlet::model::MeshletModel;
use cull_asset_shader::meshlet::vertex::Vertex;
use cull_asset_shader::meshlet::{MESHLET_MAX_TRIANGLES, MESHLET_MAX_VERTICES};
use cull_asset_shader::shape::cone::Cone;
use cull_asset_shader::shape::sphere::Sphere;
use cull_asset_shader::span::Span;
use glam::Vec3;
use meshopt::VertexDataAdapter;

/// Meshes split into meshlets, ready for upload. Every mesh appends to the same set of buffers.
#[derive(Clone, Debug, Default)]
pub struct MeshletModelCpu {
	pub meshes: Vec<Mesh>,
	pub meshlets: Vec<Meshlet>,
	pub vertices: Vec<Vertex>,
	/// absolute vertex ids of every meshlet's vertices
	pub meshlet_vertices: Vec<u32>,
	/// meshlet-local indices, three per triangle, packed on upload
	pub triangle_indices: Vec<u32>,
}

impl MeshletModelCpu {
	pub fn new() -> Self {
		Self::default()
	}

	/// Splits a triangle list into meshlets and appends it as a new mesh, returning its mesh id.
	#[profiling::function]
	pub fn add_mesh(&mut self, positions: &[Vec3], indices: &[u32]) -> anyhow::Result<u32> {
		if indices.len() % 3 != 0 {
			return Err(anyhow!("index count {} is not a multiple of 3", indices.len()));
		}
		if let Some(index) = indices.iter().find(|i| **i as usize >= positions.len()) {
			return Err(anyhow!("index {} exceeds the {} vertices", index, positions.len()));
		}

		let mesh_id = self.meshes.len() as u32;
		let vertex_base = self.vertices.len() as u32;
		let meshlet_start = self.meshlets.len() as u32;
		self.vertices.extend(positions.iter().map(|p| Vertex::new(*p)));

		if !indices.is_empty() {
			let mut indices = indices.to_vec();
			{
				profiling::scope!("meshopt::optimize_vertex_cache");
				meshopt::optimize_vertex_cache_in_place(&mut indices, positions.len());
			}

			let adapter = VertexDataAdapter::new(bytemuck::cast_slice(positions), size_of::<Vec3>(), 0)
				.map_err(|e| anyhow!("{e:?}"))?;
			let out = {
				profiling::scope!("meshopt::build_meshlets");
				meshopt::build_meshlets(
					&indices,
					&adapter,
					MESHLET_MAX_VERTICES as usize,
					MESHLET_MAX_TRIANGLES as usize,
					0.,
				)
			};

			for m in out.iter() {
				let bounds = meshopt::compute_meshlet_bounds(m, &adapter);
				let cone = if bounds.cone_cutoff >= 1. {
					Cone::DEGENERATE
				} else {
					Cone::new(
						Vec3::from(bounds.cone_apex),
						Vec3::from(bounds.cone_axis),
						bounds.cone_cutoff,
					)
				};

				let vertices = Span::appended(self.meshlet_vertices.len(), m.vertices.len());
				self.meshlet_vertices
					.extend(m.vertices.iter().map(|v| vertex_base + *v));
				let triangles = Span::appended(self.triangle_indices.len() / 3, m.triangles.len() / 3);
				self.triangle_indices.extend(m.triangles.iter().map(|i| *i as u32));

				self.meshlets.push(Meshlet {
					vertices,
					triangles,
					bounds: Sphere::new(Vec3::from(bounds.center), bounds.radius),
					cone,
				});
			}
		}

		let bounds = Sphere::bounding_sphere(|| indices.iter().map(|i| positions[*i as usize]))
			.unwrap_or(Sphere::new(Vec3::ZERO, 0.));
		self.meshes.push(Mesh {
			meshlets: Span::new(meshlet_start, self.meshlets.len() as u32 - meshlet_start),
			triangle_count: (indices.len() / 3) as u32,
			_pad: 0,
			bounds,
		});
		log::debug!(
			"mesh {} split into {} meshlets",
			mesh_id,
			self.meshes[mesh_id as usize].meshlet_count()
		);
		Ok(mesh_id)
	}

	#[profiling::function]
	pub fn upload(&self, bindless: &impl Bindless) -> Result<GeometryModel, AllocError> {
		let triangles = pack_triangles(&self.triangle_indices).collect::<Vec<_>>();
		let gpu = MeshletModel {
			meshes: upload_slice(bindless, "meshes", &self.meshes)?,
			meshlets: upload_slice(bindless, "meshlets", &self.meshlets)?,
			vertices: upload_slice(bindless, "vertices", &self.vertices)?,
			meshlet_vertices: upload_slice(bindless, "meshlet vertices", &self.meshlet_vertices)?,
			triangles: upload_slice(bindless, "triangles", &triangles)?,
		};
		Ok(GeometryModel {
			gpu,
			meshes: self.meshes.clone(),
		})
	}
}

fn upload_slice<T: Pod>(bindless: &impl Bindless, name: &str, data: &[T]) -> Result<BufferId<T>, AllocError> {
	let info = BindlessBufferCreateInfo {
		usage: BufferUsage::STORAGE_BUFFER,
		name,
	};
	if data.is_empty() {
		bindless.alloc_buffer_from_slice(&info, &[T::zeroed()])
	} else {
		bindless.alloc_buffer_from_slice(&info, data)
	}
}

/// An uploaded [`MeshletModelCpu`]. Keeps a copy of the meshes to size per-frame buffers on the host.
#[derive(Clone, Debug)]
pub struct GeometryModel {
	pub gpu: MeshletModel,
	pub meshes: Vec<Mesh>,
}

impl GeometryModel {
	pub fn free(self, bindless: &impl Bindless) {
		let MeshletModel {
			meshes,
			meshlets,
			vertices,
			meshlet_vertices,
			triangles,
		} = self.gpu;
		for resource in [
			ResourceId::from(meshes),
			meshlets.into(),
			vertices.into(),
			meshlet_vertices.into(),
			triangles.into(),
		] {
			bindless.free(resource);
		}
	}
}
