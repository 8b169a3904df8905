// SPDX-License-Identifier: CEPL-1.0
//! The fixed triangle pipeline and the render pass it draws into.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use ash::vk;
use tracing::{debug, info};

use crate::error::InitError;
use crate::gpu::Gpu;
use crate::owned::{Owned, OwnedPipeline, OwnedPipelineLayout, OwnedRenderPass, OwnedShaderModule};

/// Relative to the working directory, or failing that to the executable's directory,
/// where the build places the compiled stages.
pub const DEFAULT_VERTEX_SHADER: &str = "shaders/triangle.vert.spv";
pub const DEFAULT_FRAGMENT_SHADER: &str = "shaders/triangle.frag.spv";

const ENTRY_POINT: &std::ffi::CStr = c"main";

/// SPIR-V words for the two stages.
#[derive(Clone, Debug)]
pub struct ShaderSources {
    pub vertex: Vec<u32>,
    pub fragment: Vec<u32>,
}

impl ShaderSources {
    pub fn load(vertex: &Path, fragment: &Path) -> Result<Self, InitError> {
        let roots = search_roots();
        let vertex = resolve_shader_path(vertex, &roots);
        let fragment = resolve_shader_path(fragment, &roots);
        Ok(Self {
            vertex: decode_spirv(&vertex, &veng_core::read_file(&vertex))?,
            fragment: decode_spirv(&fragment, &veng_core::read_file(&fragment))?,
        })
    }
}

fn search_roots() -> Vec<PathBuf> {
    let mut roots = Vec::with_capacity(2);
    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd);
    }
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        roots.push(dir);
    }
    roots
}

/// First existing `root/path` for a relative path; absolute paths and misses come back as given.
fn resolve_shader_path(path: &Path, roots: &[PathBuf]) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    roots
        .iter()
        .map(|root| root.join(path))
        .find(|candidate| candidate.is_file())
        .unwrap_or_else(|| path.to_path_buf())
}

fn decode_spirv(path: &Path, bytes: &[u8]) -> Result<Vec<u32>, InitError> {
    if bytes.is_empty() {
        return Err(InitError::EmptyShader {
            path: path.to_path_buf(),
        });
    }
    let words = ash::util::read_spv(&mut Cursor::new(bytes)).map_err(|source| {
        InitError::InvalidShader {
            path: PathBuf::from(path),
            source,
        }
    })?;
    debug!("loaded {} ({} words)", path.display(), words.len());
    Ok(words)
}

fn create_render_pass<G: Gpu>(
    gpu: &Rc<G>,
    format: vk::Format,
) -> Result<OwnedRenderPass<G>, InitError> {
    let attachments = [vk::AttachmentDescription::default()
        .format(format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)];

    let color_refs = [vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    }];
    let subpasses = [vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs)];

    let info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(&subpasses);

    let handle =
        unsafe { gpu.create_render_pass(&info) }.map_err(InitError::RenderPassCreation)?;
    Ok(Owned::new(gpu, handle))
}

fn create_shader_module<G: Gpu>(
    gpu: &Rc<G>,
    code: &[u32],
) -> Result<OwnedShaderModule<G>, InitError> {
    let info = vk::ShaderModuleCreateInfo::default().code(code);
    let handle =
        unsafe { gpu.create_shader_module(&info) }.map_err(InitError::ShaderModuleCreation)?;
    Ok(Owned::new(gpu, handle))
}

pub struct GraphicsPipeline<G: Gpu> {
    pipeline: OwnedPipeline<G>,
    layout: OwnedPipelineLayout<G>,
    render_pass: OwnedRenderPass<G>,
}

impl<G: Gpu> GraphicsPipeline<G> {
    pub fn new(
        gpu: &Rc<G>,
        color_format: vk::Format,
        shaders: &ShaderSources,
    ) -> Result<Self, InitError> {
        let render_pass = create_render_pass(gpu, color_format)?;

        let layout_info = vk::PipelineLayoutCreateInfo::default();
        let layout = unsafe { gpu.create_pipeline_layout(&layout_info) }
            .map_err(InitError::PipelineLayoutCreation)?;
        let layout = Owned::new(gpu, layout);

        // Modules are only needed until the pipeline exists.
        let vertex = create_shader_module(gpu, &shaders.vertex)?;
        let fragment = create_shader_module(gpu, &shaders.fragment)?;

        let stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vertex.handle())
                .name(ENTRY_POINT),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(fragment.handle())
                .name(ENTRY_POINT),
        ];

        // Positions live in the vertex shader.
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default();
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);
        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let raster = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(vk::CullModeFlags::NONE)
            .front_face(vk::FrontFace::CLOCKWISE)
            .depth_bias_enable(false)
            .line_width(1.0);

        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1)
            .sample_shading_enable(false);

        let blend_attachments = [vk::PipelineColorBlendAttachmentState::default()
            .blend_enable(false)
            .color_write_mask(vk::ColorComponentFlags::RGBA)];
        let blend = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&blend_attachments);

        let info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&raster)
            .multisample_state(&multisample)
            .color_blend_state(&blend)
            .dynamic_state(&dynamic)
            .layout(layout.handle())
            .render_pass(render_pass.handle())
            .subpass(0);

        let pipeline = unsafe { gpu.create_graphics_pipeline(&info) }
            .map_err(InitError::PipelineCreation)?;
        let pipeline = Owned::new(gpu, pipeline);

        info!("graphics pipeline created for {color_format:?}");
        Ok(Self {
            pipeline,
            layout,
            render_pass,
        })
    }

    pub fn pipeline(&self) -> vk::Pipeline {
        self.pipeline.handle()
    }

    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout.handle()
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass.handle()
    }
}
