// SPDX-License-Identifier: CEPL-1.0
//! Scoped ownership for device-created handles.
//!
//! Each `Owned` keeps the device alive through an `Rc` and releases its handle on
//! drop. Aggregates declare fields in reverse creation order, so Rust's field drop
//! order is the teardown order.

use std::fmt;
use std::rc::Rc;

use ash::vk::{self, Handle};
use tracing::trace;

use crate::gpu::Gpu;

pub trait DeviceResource: Handle + Copy + fmt::Debug {
    /// # Safety
    /// `self` must have been created by `gpu` and must not be in use by the GPU.
    unsafe fn release<G: Gpu>(self, gpu: &G);
}

macro_rules! device_resource {
    ($($ty:ty => $destroy:ident),* $(,)?) => {
        $(
            impl DeviceResource for $ty {
                unsafe fn release<G: Gpu>(self, gpu: &G) {
                    unsafe { gpu.$destroy(self) }
                }
            }
        )*
    };
}

device_resource! {
    vk::SwapchainKHR => destroy_swapchain,
    vk::ImageView => destroy_image_view,
    vk::RenderPass => destroy_render_pass,
    vk::ShaderModule => destroy_shader_module,
    vk::PipelineLayout => destroy_pipeline_layout,
    vk::Pipeline => destroy_pipeline,
    vk::Framebuffer => destroy_framebuffer,
    vk::CommandPool => destroy_command_pool,
    vk::Semaphore => destroy_semaphore,
    vk::Fence => destroy_fence,
}

pub struct Owned<H: DeviceResource, G: Gpu> {
    gpu: Rc<G>,
    handle: H,
}

pub type OwnedSwapchain<G> = Owned<vk::SwapchainKHR, G>;
pub type OwnedRenderPass<G> = Owned<vk::RenderPass, G>;
pub type OwnedShaderModule<G> = Owned<vk::ShaderModule, G>;
pub type OwnedPipelineLayout<G> = Owned<vk::PipelineLayout, G>;
pub type OwnedPipeline<G> = Owned<vk::Pipeline, G>;
pub type OwnedCommandPool<G> = Owned<vk::CommandPool, G>;
pub type OwnedSemaphore<G> = Owned<vk::Semaphore, G>;
pub type OwnedFence<G> = Owned<vk::Fence, G>;

impl<H: DeviceResource, G: Gpu> Owned<H, G> {
    /// Takes ownership of `handle`, which must have been created by `gpu`.
    pub fn new(gpu: &Rc<G>, handle: H) -> Self {
        Self {
            gpu: Rc::clone(gpu),
            handle,
        }
    }

    pub fn handle(&self) -> H {
        self.handle
    }
}

impl<H: DeviceResource, G: Gpu> fmt::Debug for Owned<H, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Owned")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

impl<H: DeviceResource, G: Gpu> Drop for Owned<H, G> {
    fn drop(&mut self) {
        trace!("releasing {:?} {:#x}", H::TYPE, self.handle.as_raw());
        unsafe { self.handle.release(&*self.gpu) };
    }
}

/// A run of same-kind handles, released last-created-first.
pub struct ResourceList<H: DeviceResource, G: Gpu> {
    items: Vec<Owned<H, G>>,
}

impl<H: DeviceResource, G: Gpu> ResourceList<H, G> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, item: Owned<H, G>) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn get(&self, index: usize) -> Option<H> {
        self.items.get(index).map(Owned::handle)
    }

    pub fn handles(&self) -> impl ExactSizeIterator<Item = H> + '_ {
        self.items.iter().map(Owned::handle)
    }
}

impl<H: DeviceResource, G: Gpu> Drop for ResourceList<H, G> {
    fn drop(&mut self) {
        while let Some(item) = self.items.pop() {
            drop(item);
        }
    }
}
