// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
//! Vulkan backend: a single triangle pipeline driven one frame at a time.

mod capabilities;
pub mod device;
pub mod error;
pub mod frame;
pub mod gpu;
mod instance;
mod owned;
pub mod pipeline;
mod surface;
pub mod swapchain;
#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::rc::Rc;

use ash::vk;
use tracing::{debug, warn};
use veng_render::{RenderSize, RenderTarget, Renderer};

use crate::device::{create_logical_device, pick_physical_device, QueueFamilies, SurfaceProbe};
use crate::frame::{FrameLoop, FrameResources, FrameTargets};
use crate::gpu::{AshGpu, Gpu};
use crate::instance::VulkanInstance;
use crate::pipeline::{GraphicsPipeline, ShaderSources};
use crate::surface::PresentationSurface;
use crate::swapchain::{SwapChain, SwapChainProperties};

pub use error::{FrameError, InitError};
pub use frame::FramePhase;
pub use pipeline::{DEFAULT_FRAGMENT_SHADER, DEFAULT_VERTEX_SHADER};

#[derive(Clone, Debug)]
pub struct RendererOptions {
    pub application_name: String,
    pub validation: bool,
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            application_name: "Vulkan Renderer".to_owned(),
            validation: cfg!(debug_assertions),
            vertex_shader: PathBuf::from(DEFAULT_VERTEX_SHADER),
            fragment_shader: PathBuf::from(DEFAULT_FRAGMENT_SHADER),
        }
    }
}

/// Everything created from the logical device. Fields drop top to bottom, which is
/// the reverse of creation; the device itself goes with the last `Rc`.
pub struct RenderCore<G: Gpu> {
    frame: FrameLoop<G>,
    pipeline: GraphicsPipeline<G>,
    swap_chain: SwapChain<G>,
    gpu: Rc<G>,
}

impl<G: Gpu> RenderCore<G> {
    pub fn new(
        gpu: Rc<G>,
        surface: vk::SurfaceKHR,
        families: QueueFamilies,
        properties: &SwapChainProperties,
        framebuffer: RenderSize,
        shaders: &ShaderSources,
    ) -> Result<Self, InitError> {
        let graphics_queue = unsafe { gpu.get_device_queue(families.graphics, 0) };
        let present_queue = unsafe { gpu.get_device_queue(families.presentation, 0) };

        let swap_chain = SwapChain::new(&gpu, surface, properties, families, framebuffer)?;
        let pipeline = GraphicsPipeline::new(&gpu, swap_chain.format().format, shaders)?;
        let resources = FrameResources::new(
            &gpu,
            pipeline.render_pass(),
            swap_chain.image_views(),
            swap_chain.extent(),
            families.graphics,
        )?;

        let frame = FrameLoop::new(
            &gpu,
            resources,
            FrameTargets {
                graphics_queue,
                present_queue,
                swapchain: swap_chain.handle(),
                extent: swap_chain.extent(),
                render_pass: pipeline.render_pass(),
                pipeline: pipeline.pipeline(),
            },
        );

        Ok(Self {
            frame,
            pipeline,
            swap_chain,
            gpu,
        })
    }

    pub fn frame(&self) -> &FrameLoop<G> {
        &self.frame
    }

    pub fn swap_chain(&self) -> &SwapChain<G> {
        &self.swap_chain
    }

    pub fn pipeline(&self) -> &GraphicsPipeline<G> {
        &self.pipeline
    }
}

impl<G: Gpu> Drop for RenderCore<G> {
    fn drop(&mut self) {
        // Nothing may be released while the GPU could still be using it.
        if let Err(e) = unsafe { self.gpu.device_wait_idle() } {
            warn!("device_wait_idle before teardown failed: {e}");
        }
        debug!(
            "tearing down after {} presented frame(s)",
            self.frame.frames_presented()
        );
    }
}

impl<G: Gpu> Renderer for RenderCore<G> {
    type Error = FrameError;

    fn begin_frame(&mut self) -> Result<(), FrameError> {
        self.frame.begin_frame()
    }

    fn render_triangle(&mut self) -> Result<(), FrameError> {
        self.frame.render_triangle()
    }

    fn end_frame(&mut self) -> Result<(), FrameError> {
        self.frame.end_frame()
    }

    fn wait_idle(&mut self) -> Result<(), FrameError> {
        self.frame.wait_idle()
    }
}

/// The window-backed renderer. Drops the device-level core, then the surface, then
/// the instance.
pub struct VkRenderer {
    core: RenderCore<AshGpu>,
    surface: PresentationSurface,
    instance: VulkanInstance,
    device_name: String,
}

impl VkRenderer {
    pub fn new(target: &dyn RenderTarget, options: &RendererOptions) -> Result<Self, InitError> {
        let shaders = ShaderSources::load(&options.vertex_shader, &options.fragment_shader)?;

        let display = target.display_handle()?.as_raw();
        let instance =
            VulkanInstance::new(&options.application_name, display, options.validation)?;
        let surface = PresentationSurface::new(&instance, target)?;

        let selected = pick_physical_device(&SurfaceProbe::new(instance.instance(), &surface))?;
        let device = create_logical_device(instance.instance(), selected.physical, selected.families)?;
        let gpu = Rc::new(AshGpu::new(instance.instance(), device));

        let core = RenderCore::new(
            gpu,
            surface.handle(),
            selected.families,
            &selected.properties,
            target.framebuffer_size(),
            &shaders,
        )?;

        Ok(Self {
            core,
            surface,
            instance,
            device_name: selected.name,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn validation_enabled(&self) -> bool {
        self.instance.validation_enabled()
    }

    pub fn frames_presented(&self) -> u64 {
        self.core.frame().frames_presented()
    }

    pub fn phase(&self) -> FramePhase {
        self.core.frame().phase()
    }

    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface.handle()
    }
}

impl Renderer for VkRenderer {
    type Error = FrameError;

    fn begin_frame(&mut self) -> Result<(), FrameError> {
        self.core.begin_frame()
    }

    fn render_triangle(&mut self) -> Result<(), FrameError> {
        self.core.render_triangle()
    }

    fn end_frame(&mut self) -> Result<(), FrameError> {
        self.core.end_frame()
    }

    fn wait_idle(&mut self) -> Result<(), FrameError> {
        self.core.wait_idle()
    }
}
