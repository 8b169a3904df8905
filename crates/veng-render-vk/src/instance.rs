// SPDX-License-Identifier: CEPL-1.0
//! Vulkan instance creation and the validation message sink.

use std::ffi::{c_char, c_void, CStr, CString};

use ash::ext::debug_utils;
use ash::vk;
use raw_window_handle::RawDisplayHandle;
use tracing::{debug, error, info, warn};

use crate::capabilities;
use crate::error::InitError;

pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";
pub const ENGINE_NAME: &CStr = c"VEng";

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user: *mut c_void,
) -> vk::Bool32 {
    if data.is_null() {
        return vk::FALSE;
    }
    let message = unsafe { (*data).message_as_c_str() }
        .map(CStr::to_string_lossy)
        .unwrap_or_default();

    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        error!(target: "vulkan", "[{types:?}] {message}");
    } else {
        warn!(target: "vulkan", "[{types:?}] {message}");
    }
    vk::FALSE
}

fn messenger_info<'a>() -> vk::DebugUtilsMessengerCreateInfoEXT<'a> {
    vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION,
        )
        .pfn_user_callback(Some(debug_callback))
}

/// Validation runs only when asked for and the layer is installed.
fn validation_usable<L: AsRef<CStr>>(requested: bool, layers: &[L]) -> bool {
    if !requested {
        return false;
    }
    let usable = capabilities::are_all_supported(&[VALIDATION_LAYER], layers);
    if !usable {
        debug!("{} not installed; validation disabled", VALIDATION_LAYER.to_string_lossy());
    }
    usable
}

fn required_extensions<'a>(platform: &[&'a CStr], validation: bool) -> Vec<&'a CStr> {
    let mut required = platform.to_vec();
    if validation {
        required.push(debug_utils::NAME);
    }
    required
}

struct DebugMessenger {
    loader: debug_utils::Instance,
    handle: vk::DebugUtilsMessengerEXT,
}

impl Drop for DebugMessenger {
    fn drop(&mut self) {
        debug!("destroying debug messenger");
        unsafe { self.loader.destroy_debug_utils_messenger(self.handle, None) };
    }
}

pub struct VulkanInstance {
    entry: ash::Entry,
    instance: ash::Instance,
    debug: Option<DebugMessenger>,
    validation_enabled: bool,
}

impl VulkanInstance {
    pub fn new(
        application_name: &str,
        display: RawDisplayHandle,
        request_validation: bool,
    ) -> Result<Self, InitError> {
        let entry = unsafe { ash::Entry::load() }?;

        let layers = capabilities::instance_layers(&entry)?;
        let validation_enabled = validation_usable(request_validation, &layers);

        let platform = ash_window::enumerate_required_extensions(display).map_err(|result| {
            InitError::Query {
                what: "platform surface extensions",
                result,
            }
        })?;
        let platform: Vec<&CStr> = platform
            .iter()
            .map(|&p| unsafe { CStr::from_ptr(p) })
            .collect();
        let required = required_extensions(&platform, validation_enabled);

        let available = capabilities::instance_extensions(&entry)?;
        let missing = capabilities::missing(&required, &available);
        if !missing.is_empty() {
            return Err(InitError::UnsupportedInstanceExtensions(missing));
        }

        let app_name = CString::new(application_name)?;
        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(ENGINE_NAME)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let extension_ptrs: Vec<*const c_char> = required.iter().map(|e| e.as_ptr()).collect();
        let layer_ptrs: Vec<*const c_char> = if validation_enabled {
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            Vec::new()
        };

        // Chained so instance creation and destruction are reported too.
        let mut creation_messenger = messenger_info();
        let mut create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extension_ptrs)
            .enabled_layer_names(&layer_ptrs);
        if validation_enabled {
            create_info = create_info.push_next(&mut creation_messenger);
        }

        let instance = unsafe { entry.create_instance(&create_info, None) }
            .map_err(InitError::InstanceCreation)?;

        let debug = if validation_enabled {
            create_messenger(&entry, &instance)
        } else {
            None
        };

        info!(
            "Vulkan instance created (validation {})",
            if validation_enabled { "on" } else { "off" }
        );

        Ok(Self {
            entry,
            instance,
            debug,
            validation_enabled,
        })
    }

    pub fn entry(&self) -> &ash::Entry {
        &self.entry
    }

    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    pub fn validation_enabled(&self) -> bool {
        self.validation_enabled
    }
}

/// The messenger entry point is an extension function, so drivers may not export it.
fn create_messenger(entry: &ash::Entry, instance: &ash::Instance) -> Option<DebugMessenger> {
    let create_fn = unsafe {
        entry.get_instance_proc_addr(
            instance.handle(),
            c"vkCreateDebugUtilsMessengerEXT".as_ptr(),
        )
    };
    if create_fn.is_none() {
        warn!("vkCreateDebugUtilsMessengerEXT unavailable; validation output limited to instance creation");
        return None;
    }

    let loader = debug_utils::Instance::new(entry, instance);
    match unsafe { loader.create_debug_utils_messenger(&messenger_info(), None) } {
        Ok(handle) => Some(DebugMessenger { loader, handle }),
        Err(e) => {
            warn!("failed to create debug messenger: {e}");
            None
        }
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        self.debug.take();
        debug!("destroying Vulkan instance");
        unsafe { self.instance.destroy_instance(None) };
    }
}
