use cull_asset_shader::affine_transform::AffineTransform;
use cull_asset_shader::meshlet::instance::MeshInstance;
use cull_engine::geometry::builder::{GeometryModel, MeshletModelCpu};
use cull_engine::geometry::shapes;
use cull_engine::renderer::bindless::Bindless;
use cull_engine::renderer::frame_context::SceneInput;
use cull_engine_shader::renderer::camera::Camera;
use glam::{Affine3A, Quat, UVec2, Vec2, Vec3};

pub const CUBE: u32 = 0;
pub const WALL: u32 = 1;

/// A wall right in front of the camera with a field of cubes behind and around it.
pub struct DemoScene {
	pub model: GeometryModel,
	pub instances: Vec<MeshInstance>,
	pub transforms: Vec<AffineTransform>,
}

impl DemoScene {
	#[profiling::function]
	pub fn new(bindless: &impl Bindless, field: u32, wall: bool) -> anyhow::Result<Self> {
		let mut model = MeshletModelCpu::new();
		let (positions, indices) = shapes::cube();
		model.add_mesh(&positions, &indices)?;
		let (positions, indices) = shapes::quad(Vec2::new(8., 5.));
		model.add_mesh(&positions, &indices)?;
		let model = model.upload(bindless)?;

		let mut scene = Self {
			model,
			instances: Vec::new(),
			transforms: Vec::new(),
		};
		if wall {
			scene.add(WALL, Affine3A::from_translation(Vec3::new(0., 0., -6.)));
		}
		let half = field as f32 * 0.5;
		for z in 0..field {
			for x in 0..field {
				let position = Vec3::new((x as f32 - half) * 2.5 + 0.3, ((x + z) % 3) as f32 - 1., -8. - z as f32 * 2.5);
				let rotation = Quat::from_rotation_y((x * 7 + z * 13) as f32 * 0.1);
				scene.add(
					CUBE,
					Affine3A::from_scale_rotation_translation(Vec3::splat(0.8), rotation, position),
				);
			}
		}
		Ok(scene)
	}

	fn add(&mut self, mesh_id: u32, transform: Affine3A) {
		self.instances
			.push(MeshInstance::new(mesh_id, self.transforms.len() as u32, 0));
		self.transforms.push(AffineTransform::new(transform));
	}

	/// Camera orbiting slightly around the wall, so the early phase has to catch up on disocclusions.
	pub fn camera(frame: u32, extent: UVec2) -> Camera {
		let angle = frame as f32 * 0.02;
		let eye = Vec3::new(angle.sin() * 3., 1., 2.);
		Camera::look_at_reverse_z(eye, Vec3::new(0., 0., -20.), 70f32.to_radians(), 0.1, 200., extent)
	}

	pub fn input(&self, camera: Camera) -> SceneInput<'_> {
		SceneInput {
			model: &self.model,
			camera,
			instances: &self.instances,
			transforms: &self.transforms,
		}
	}

	pub fn free(self, bindless: &impl Bindless) {
		self.model.free(bindless);
	}
}
