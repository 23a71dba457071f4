use crate::renderer::bindless::{AllocError, Bindless, BindlessImageCreateInfo, ImageFormat, ImageUsage};
use crate::renderer::pipelines::{HIZ_COPY, HIZ_SLOW};
use crate::renderer::render_graph::graph::{FrameGraph, RecordError};
use crate::renderer::render_graph::pass::Pass;
use cull_asset_shader::descriptor::ImageId;
use cull_engine_shader::renderer::hiz::{CopyParam, HIZ_WG_SIZE, ReduceParam, hiz_mip_levels, mip_extent};
use glam::{UVec2, UVec3};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HiZImage {
	pub image: ImageId,
	pub extent: UVec2,
	pub mip_levels: u32,
}

impl HiZImage {
	pub fn new(bindless: &impl Bindless, extent: UVec2) -> Result<Self, AllocError> {
		let mip_levels = hiz_mip_levels(extent);
		let image = bindless.alloc_image(&BindlessImageCreateInfo {
			usage: ImageUsage::STORAGE | ImageUsage::SAMPLED,
			format: ImageFormat::R32Float,
			extent,
			mip_levels,
			name: "hiz",
		})?;
		Ok(Self {
			image,
			extent,
			mip_levels,
		})
	}

	/// Declares the occlusion test reading every mip.
	pub fn sample(&self, pass: Pass) -> Pass {
		pass.sampled(self.image, 0..self.mip_levels)
	}
}

/// State kept across the frames of a single view. The Hi-Z built in one frame is what the early phase of the next
/// frame tests against.
#[derive(Debug, Default)]
pub struct ViewState {
	hiz: Option<HiZImage>,
	valid: bool,
}

impl ViewState {
	pub fn new() -> Self {
		Self::default()
	}

	/// The Hi-Z for a view of `extent`, recreated and invalidated if the extent changed.
	pub fn prepare(&mut self, bindless: &impl Bindless, extent: UVec2) -> Result<HiZImage, AllocError> {
		match self.hiz {
			Some(hiz) if hiz.extent == extent => Ok(hiz),
			old => {
				if let Some(old) = old {
					log::debug!("view resized from {} to {}, recreating hiz", old.extent, extent);
					bindless.free(old.image.into());
				}
				let hiz = HiZImage::new(bindless, extent)?;
				self.hiz = Some(hiz);
				self.valid = false;
				Ok(hiz)
			}
		}
	}

	pub fn hiz(&self) -> Option<HiZImage> {
		self.hiz
	}

	/// true if the Hi-Z holds the depth of a previous frame of this view
	pub fn is_valid(&self) -> bool {
		self.valid
	}

	pub fn set_valid(&mut self) {
		self.valid = self.hiz.is_some();
	}

	/// The next frame must not trust the Hi-Z, eg. after a camera cut.
	pub fn invalidate(&mut self) {
		self.valid = false;
	}

	pub fn free(&mut self, bindless: &impl Bindless) {
		if let Some(hiz) = self.hiz.take() {
			bindless.free(hiz.image.into());
		}
		self.valid = false;
	}
}

fn groups(extent: UVec2) -> UVec3 {
	UVec3::new(extent.x.div_ceil(HIZ_WG_SIZE), extent.y.div_ceil(HIZ_WG_SIZE), 1)
}

/// Records copying `depth` into mip 0 and reducing every following mip from the previous one.
#[profiling::function]
pub fn record_build<B: Bindless>(graph: &mut FrameGraph<B>, depth: ImageId, hiz: &HiZImage) -> Result<(), RecordError> {
	graph.add_pass(
		Pass::dispatch(
			"hiz copy",
			HIZ_COPY,
			groups(hiz.extent),
			&CopyParam {
				depth,
				hiz: hiz.image,
			},
		)
		.sampled(depth, 0..1)
		.write_image(hiz.image, 0..1),
	)?;
	for src_mip in 0..hiz.mip_levels - 1 {
		graph.add_pass(
			Pass::dispatch(
				format!("hiz reduce mip {}", src_mip + 1),
				HIZ_SLOW,
				groups(mip_extent(hiz.extent, src_mip + 1)),
				&ReduceParam {
					hiz: hiz.image,
					src_mip,
				},
			)
			.sampled(hiz.image, src_mip..src_mip + 1)
			.write_image(hiz.image, src_mip + 1..src_mip + 2),
		)?;
	}
	Ok(())
}
