// SPDX-License-Identifier: CEPL-1.0
use std::path::PathBuf;

use ash::vk;
use thiserror::Error;

use crate::frame::FramePhase;

/// Setup-phase failures. None of these leave a usable renderer behind.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("failed to load the Vulkan library: {0}")]
    Loading(#[from] ash::LoadingError),

    #[error("application name contains a NUL byte")]
    InvalidName(#[from] std::ffi::NulError),

    #[error("window handle unavailable: {0}")]
    WindowHandle(#[from] raw_window_handle::HandleError),

    #[error("Vulkan error querying {what}: {result}")]
    Query {
        what: &'static str,
        result: vk::Result,
    },

    #[error("required instance extensions are not supported: {}", .0.join(", "))]
    UnsupportedInstanceExtensions(Vec<String>),

    #[error("Vulkan error creating instance: {0}")]
    InstanceCreation(vk::Result),

    #[error("Vulkan error creating surface: {0}")]
    SurfaceCreation(vk::Result),

    #[error("no physical device supports graphics, presentation and swap chains for this surface")]
    NoSuitableDevice,

    #[error("Vulkan error creating logical device: {0}")]
    DeviceCreation(vk::Result),

    #[error("Vulkan error creating swap chain: {0}")]
    SwapChainCreation(vk::Result),

    #[error("Vulkan error fetching swap chain images: {0}")]
    SwapChainImages(vk::Result),

    #[error("Vulkan error creating swap chain image view: {0}")]
    ImageViewCreation(vk::Result),

    #[error("shader bytecode at {} is missing or empty", .path.display())]
    EmptyShader { path: PathBuf },

    #[error("shader bytecode at {} is not SPIR-V: {source}", .path.display())]
    InvalidShader {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Vulkan error creating shader module: {0}")]
    ShaderModuleCreation(vk::Result),

    #[error("Vulkan error creating render pass: {0}")]
    RenderPassCreation(vk::Result),

    #[error("Vulkan error creating pipeline layout: {0}")]
    PipelineLayoutCreation(vk::Result),

    #[error("Vulkan error creating graphics pipeline: {0}")]
    PipelineCreation(vk::Result),

    #[error("Vulkan error creating framebuffer: {0}")]
    FramebufferCreation(vk::Result),

    #[error("Vulkan error creating command pool: {0}")]
    CommandPoolCreation(vk::Result),

    #[error("Vulkan error allocating command buffer: {0}")]
    CommandBufferAllocation(vk::Result),

    #[error("Vulkan error creating {what}: {result}")]
    SyncObjectCreation {
        what: &'static str,
        result: vk::Result,
    },
}

/// Steady-state failures raised by the frame loop.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("{op} called while the frame is {phase:?}")]
    OutOfOrder {
        op: &'static str,
        phase: FramePhase,
    },

    #[error("frame loop is faulted by an earlier failure; the in-flight fence can no longer be trusted")]
    Faulted,

    #[error("Vulkan error waiting for the in-flight fence: {0}")]
    FenceWait(vk::Result),

    #[error("Vulkan error resetting the in-flight fence: {0}")]
    FenceReset(vk::Result),

    #[error("Vulkan error acquiring a swap chain image: {0}")]
    Acquire(vk::Result),

    #[error("Vulkan error recording commands ({stage}): {result}")]
    Recording {
        stage: &'static str,
        result: vk::Result,
    },

    #[error("Vulkan error submitting commands: {0}")]
    Submit(vk::Result),

    #[error("Vulkan error presenting image {image_index}: {result}")]
    Present { image_index: u32, result: vk::Result },

    #[error("Vulkan error waiting for the device to go idle: {0}")]
    WaitIdle(vk::Result),
}
