// SPDX-License-Identifier: CEPL-1.0
//! Physical device selection and logical device creation.

use std::collections::BTreeSet;
use std::ffi::{c_char, CStr, CString};

use ash::prelude::VkResult;
use ash::vk;
use tracing::{debug, info};

use crate::capabilities;
use crate::error::InitError;
use crate::surface::PresentationSurface;
use crate::swapchain::SwapChainProperties;

pub const REQUIRED_DEVICE_EXTENSIONS: [&CStr; 1] = [ash::khr::swapchain::NAME];

/// Read-only questions asked of enumerated GPUs while choosing one.
pub trait DeviceQuery {
    fn physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>>;
    fn device_name(&self, device: vk::PhysicalDevice) -> String;
    fn queue_families(&self, device: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties>;
    fn presentation_support(&self, device: vk::PhysicalDevice, family: u32) -> VkResult<bool>;
    fn device_extensions(&self, device: vk::PhysicalDevice) -> VkResult<Vec<CString>>;
    fn swap_chain_properties(&self, device: vk::PhysicalDevice) -> VkResult<SwapChainProperties>;
}

/// Answers `DeviceQuery` from the driver, against one surface.
pub struct SurfaceProbe<'a> {
    instance: &'a ash::Instance,
    surface: &'a PresentationSurface,
}

impl<'a> SurfaceProbe<'a> {
    pub fn new(instance: &'a ash::Instance, surface: &'a PresentationSurface) -> Self {
        Self { instance, surface }
    }
}

impl DeviceQuery for SurfaceProbe<'_> {
    fn physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>> {
        unsafe { self.instance.enumerate_physical_devices() }
    }

    fn device_name(&self, device: vk::PhysicalDevice) -> String {
        let props = unsafe { self.instance.get_physical_device_properties(device) };
        props
            .device_name_as_c_str()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "<unnamed>".to_owned())
    }

    fn queue_families(&self, device: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties> {
        unsafe {
            self.instance
                .get_physical_device_queue_family_properties(device)
        }
    }

    fn presentation_support(&self, device: vk::PhysicalDevice, family: u32) -> VkResult<bool> {
        unsafe {
            self.surface.loader().get_physical_device_surface_support(
                device,
                family,
                self.surface.handle(),
            )
        }
    }

    fn device_extensions(&self, device: vk::PhysicalDevice) -> VkResult<Vec<CString>> {
        capabilities::device_extensions(self.instance, device)
    }

    fn swap_chain_properties(&self, device: vk::PhysicalDevice) -> VkResult<SwapChainProperties> {
        let loader = self.surface.loader();
        let surface = self.surface.handle();
        unsafe {
            Ok(SwapChainProperties {
                capabilities: loader
                    .get_physical_device_surface_capabilities(device, surface)?,
                formats: loader.get_physical_device_surface_formats(device, surface)?,
                present_modes: loader
                    .get_physical_device_surface_present_modes(device, surface)?,
            })
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub presentation: Option<u32>,
}

impl QueueFamilyIndices {
    pub fn is_valid(&self) -> bool {
        self.graphics.is_some() && self.presentation.is_some()
    }

    pub fn resolve(&self) -> Option<QueueFamilies> {
        Some(QueueFamilies {
            graphics: self.graphics?,
            presentation: self.presentation?,
        })
    }
}

/// Resolved family indices. The two may be equal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub presentation: u32,
}

impl QueueFamilies {
    pub fn is_shared(&self) -> bool {
        self.graphics == self.presentation
    }

    /// Each distinct family once, ascending.
    pub fn unique(&self) -> Vec<u32> {
        [self.graphics, self.presentation]
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Graphics is the first family with both graphics and transfer; presentation is the
/// first family the surface accepts. The two searches are independent.
pub fn find_queue_families<Q: DeviceQuery + ?Sized>(
    query: &Q,
    device: vk::PhysicalDevice,
) -> QueueFamilyIndices {
    let families = query.queue_families(device);

    let graphics = families
        .iter()
        .position(|f| {
            f.queue_flags
                .contains(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER)
        })
        .map(|i| i as u32);

    let presentation = (0..families.len() as u32)
        .find(|&i| query.presentation_support(device, i).unwrap_or(false));

    QueueFamilyIndices {
        graphics,
        presentation,
    }
}

pub fn is_device_suitable<Q: DeviceQuery + ?Sized>(query: &Q, device: vk::PhysicalDevice) -> bool {
    let name = query.device_name(device);

    if !find_queue_families(query, device).is_valid() {
        debug!("{name}: missing graphics or presentation queue family");
        return false;
    }

    let extensions = match query.device_extensions(device) {
        Ok(e) => e,
        Err(e) => {
            debug!("{name}: extension query failed: {e}");
            return false;
        }
    };
    let missing = capabilities::missing(&REQUIRED_DEVICE_EXTENSIONS, &extensions);
    if !missing.is_empty() {
        debug!("{name}: missing device extensions {missing:?}");
        return false;
    }

    match query.swap_chain_properties(device) {
        Ok(props) if props.is_valid() => true,
        Ok(_) => {
            debug!("{name}: no surface formats or present modes");
            false
        }
        Err(e) => {
            debug!("{name}: surface query failed: {e}");
            false
        }
    }
}

#[derive(Clone, Debug)]
pub struct SelectedDevice {
    pub physical: vk::PhysicalDevice,
    pub name: String,
    pub families: QueueFamilies,
    pub properties: SwapChainProperties,
}

/// First suitable device in enumeration order. No ranking.
pub fn pick_physical_device<Q: DeviceQuery + ?Sized>(query: &Q) -> Result<SelectedDevice, InitError> {
    let devices = query.physical_devices().map_err(|result| InitError::Query {
        what: "physical devices",
        result,
    })?;
    debug!("{} physical device(s) enumerated", devices.len());

    let physical = devices
        .into_iter()
        .find(|&d| is_device_suitable(query, d))
        .ok_or(InitError::NoSuitableDevice)?;

    let families = find_queue_families(query, physical)
        .resolve()
        .ok_or(InitError::NoSuitableDevice)?;
    let properties = query
        .swap_chain_properties(physical)
        .map_err(|result| InitError::Query {
            what: "surface properties",
            result,
        })?;
    let name = query.device_name(physical);

    info!(
        "selected GPU {name} (graphics family {}, presentation family {})",
        families.graphics, families.presentation
    );
    Ok(SelectedDevice {
        physical,
        name,
        families,
        properties,
    })
}

/// One queue per family, at full priority.
pub const QUEUE_PRIORITIES: [f32; 1] = [1.0];

/// One create-info per distinct family; the queue count follows `priorities.len()`.
pub fn queue_create_infos(
    families: QueueFamilies,
    priorities: &[f32],
) -> Vec<vk::DeviceQueueCreateInfo<'_>> {
    families
        .unique()
        .into_iter()
        .map(|family| {
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(family)
                .queue_priorities(priorities)
        })
        .collect()
}

pub fn create_logical_device(
    instance: &ash::Instance,
    physical: vk::PhysicalDevice,
    families: QueueFamilies,
) -> Result<ash::Device, InitError> {
    let queue_infos = queue_create_infos(families, &QUEUE_PRIORITIES);

    let extension_ptrs: Vec<*const c_char> = REQUIRED_DEVICE_EXTENSIONS
        .iter()
        .map(|e| e.as_ptr())
        .collect();
    let features = vk::PhysicalDeviceFeatures::default();

    let create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_infos)
        .enabled_extension_names(&extension_ptrs)
        .enabled_features(&features);

    let device = unsafe { instance.create_device(physical, &create_info, None) }
        .map_err(InitError::DeviceCreation)?;
    debug!("logical device created with {} queue(s)", queue_infos.len());
    Ok(device)
}
