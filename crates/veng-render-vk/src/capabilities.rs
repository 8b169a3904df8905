// SPDX-License-Identifier: CEPL-1.0
//! Extension and layer availability checks.

use std::ffi::{CStr, CString};

use ash::vk;

use crate::error::InitError;

/// True iff every `required` name exactly matches one of `available`.
pub fn are_all_supported<R, A>(required: &[R], available: &[A]) -> bool
where
    R: AsRef<CStr>,
    A: AsRef<CStr>,
{
    missing(required, available).is_empty()
}

/// The `required` names absent from `available`, in request order.
pub fn missing<R, A>(required: &[R], available: &[A]) -> Vec<String>
where
    R: AsRef<CStr>,
    A: AsRef<CStr>,
{
    required
        .iter()
        .map(AsRef::as_ref)
        .filter(|r| !available.iter().any(|a| a.as_ref() == *r))
        .map(|r| r.to_string_lossy().into_owned())
        .collect()
}

fn ext_name(props: &vk::ExtensionProperties) -> CString {
    props
        .extension_name_as_c_str()
        .map(CStr::to_owned)
        .unwrap_or_default()
}

pub fn instance_extensions(entry: &ash::Entry) -> Result<Vec<CString>, InitError> {
    let props = unsafe { entry.enumerate_instance_extension_properties(None) }.map_err(|result| {
        InitError::Query {
            what: "instance extensions",
            result,
        }
    })?;
    Ok(props.iter().map(ext_name).collect())
}

pub fn instance_layers(entry: &ash::Entry) -> Result<Vec<CString>, InitError> {
    let props = unsafe { entry.enumerate_instance_layer_properties() }.map_err(|result| {
        InitError::Query {
            what: "instance layers",
            result,
        }
    })?;
    Ok(props
        .iter()
        .map(|p| {
            p.layer_name_as_c_str()
                .map(CStr::to_owned)
                .unwrap_or_default()
        })
        .collect())
}

pub fn device_extensions(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
) -> ash::prelude::VkResult<Vec<CString>> {
    let props = unsafe { instance.enumerate_device_extension_properties(device) }?;
    Ok(props.iter().map(ext_name).collect())
}
