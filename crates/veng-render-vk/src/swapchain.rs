// SPDX-License-Identifier: CEPL-1.0
//! Swap chain configuration choices and the swap chain with its image views.

use std::rc::Rc;

use ash::vk;
use tracing::{debug, info};
use veng_render::RenderSize;

use crate::device::QueueFamilies;
use crate::error::InitError;
use crate::gpu::Gpu;
use crate::owned::{Owned, OwnedSwapchain, ResourceList};

/// What a surface offers a particular physical device.
#[derive(Clone, Debug, Default)]
pub struct SwapChainProperties {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapChainProperties {
    pub fn is_valid(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

const PREFERRED_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::R8G8B8A8_SRGB,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

pub fn choose_swap_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    // A lone UNDEFINED entry means the surface takes anything.
    if let [only] = formats {
        if only.format == vk::Format::UNDEFINED {
            return PREFERRED_FORMAT;
        }
    }

    formats
        .iter()
        .copied()
        .find(|f| {
            matches!(
                f.format,
                vk::Format::R8G8B8A8_SRGB | vk::Format::B8G8R8A8_SRGB
            ) && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first().copied())
        .unwrap_or(PREFERRED_FORMAT)
}

pub fn choose_swap_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

pub fn choose_swap_extent(caps: &vk::SurfaceCapabilitiesKHR, framebuffer: RenderSize) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }
    // max/min instead of clamp, which panics on an inverted range.
    vk::Extent2D {
        width: framebuffer
            .width
            .max(caps.min_image_extent.width)
            .min(caps.max_image_extent.width),
        height: framebuffer
            .height
            .max(caps.min_image_extent.height)
            .min(caps.max_image_extent.height),
    }
}

/// One more than the minimum, unless the surface caps it lower. Zero max means no cap.
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let wanted = caps.min_image_count.saturating_add(1);
    if caps.max_image_count > 0 && wanted > caps.max_image_count {
        caps.max_image_count
    } else {
        wanted
    }
}

/// Concurrent sharing across two distinct families, exclusive otherwise.
pub fn choose_sharing(families: QueueFamilies) -> (vk::SharingMode, Vec<u32>) {
    if families.is_shared() {
        (vk::SharingMode::EXCLUSIVE, Vec::new())
    } else {
        (
            vk::SharingMode::CONCURRENT,
            vec![families.graphics, families.presentation],
        )
    }
}

pub struct SwapChain<G: Gpu> {
    image_views: ResourceList<vk::ImageView, G>,
    handle: OwnedSwapchain<G>,
    images: Vec<vk::Image>,
    format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    extent: vk::Extent2D,
}

impl<G: Gpu> SwapChain<G> {
    pub fn new(
        gpu: &Rc<G>,
        surface: vk::SurfaceKHR,
        properties: &SwapChainProperties,
        families: QueueFamilies,
        framebuffer: RenderSize,
    ) -> Result<Self, InitError> {
        let caps = &properties.capabilities;
        let format = choose_swap_surface_format(&properties.formats);
        let present_mode = choose_swap_present_mode(&properties.present_modes);
        let extent = choose_swap_extent(caps, framebuffer);
        let image_count = choose_image_count(caps);
        let (sharing_mode, family_indices) = choose_sharing(families);

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(&family_indices)
            .pre_transform(caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true);

        let handle = unsafe { gpu.create_swapchain(&create_info) }
            .map_err(InitError::SwapChainCreation)?;
        let handle = Owned::new(gpu, handle);

        let images = unsafe { gpu.get_swapchain_images(handle.handle()) }
            .map_err(InitError::SwapChainImages)?;

        let mut image_views = ResourceList::with_capacity(images.len());
        for &image in &images {
            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format.format)
                .components(vk::ComponentMapping::default())
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });
            let view = unsafe { gpu.create_image_view(&view_info) }
                .map_err(InitError::ImageViewCreation)?;
            image_views.push(Owned::new(gpu, view));
        }

        debug!("swap chain sharing mode {sharing_mode:?}");
        info!(
            "swap chain: {:?}/{:?}, {:?}, {}x{}, {} image(s)",
            format.format,
            format.color_space,
            present_mode,
            extent.width,
            extent.height,
            images.len()
        );

        Ok(Self {
            image_views,
            handle,
            images,
            format,
            present_mode,
            extent,
        })
    }

    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle.handle()
    }

    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    pub fn image_views(&self) -> impl ExactSizeIterator<Item = vk::ImageView> + '_ {
        self.image_views.handles()
    }
}
