// SPDX-License-Identifier: CEPL-1.0
use ash::khr::surface;
use ash::vk;
use tracing::debug;
use veng_render::RenderTarget;

use crate::error::InitError;
use crate::instance::VulkanInstance;

/// The window's presentation surface. Must be dropped before the instance.
pub struct PresentationSurface {
    loader: surface::Instance,
    handle: vk::SurfaceKHR,
}

impl PresentationSurface {
    pub fn new(instance: &VulkanInstance, target: &dyn RenderTarget) -> Result<Self, InitError> {
        let display = target.display_handle()?.as_raw();
        let window = target.window_handle()?.as_raw();

        let handle = unsafe {
            ash_window::create_surface(
                instance.entry(),
                instance.instance(),
                display,
                window,
                None,
            )
        }
        .map_err(InitError::SurfaceCreation)?;

        let loader = surface::Instance::new(instance.entry(), instance.instance());
        Ok(Self { loader, handle })
    }

    pub fn loader(&self) -> &surface::Instance {
        &self.loader
    }

    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }
}

impl Drop for PresentationSurface {
    fn drop(&mut self) {
        debug!("destroying surface");
        unsafe { self.loader.destroy_surface(self.handle, None) };
    }
}
