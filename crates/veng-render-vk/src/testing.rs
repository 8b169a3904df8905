// SPDX-License-Identifier: CEPL-1.0
//! Headless stand-ins for the device and the physical-device queries.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::rc::Rc;

use ash::prelude::VkResult;
use ash::vk::{self, Handle};

use crate::device::DeviceQuery;
use crate::gpu::Gpu;
use crate::swapchain::SwapChainProperties;

pub const DEVICE_RAW: u64 = 0xd0;

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Create(vk::ObjectType, u64),
    Destroy(vk::ObjectType, u64),
    AllocateCommandBuffer(u64),
    DeviceWaitIdle,
    WaitFence {
        fence: u64,
        blocked: bool,
    },
    ResetFence(u64),
    Acquire {
        semaphore: u64,
        image_index: u32,
    },
    ResetCommandBuffer(u64),
    BeginCommandBuffer(u64),
    EndCommandBuffer(u64),
    BeginRenderPass {
        render_pass: u64,
        framebuffer: u64,
        extent: (u32, u32),
        clear: [f32; 4],
    },
    EndRenderPass,
    BindPipeline(u64),
    SetViewport {
        width: f32,
        height: f32,
    },
    SetScissor {
        extent: (u32, u32),
    },
    Draw {
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    },
    Submit {
        command_buffers: Vec<u64>,
        wait: Vec<u64>,
        wait_stages: Vec<vk::PipelineStageFlags>,
        signal: Vec<u64>,
        fence: u64,
    },
    Present {
        wait: Vec<u64>,
        swapchain: u64,
        image_index: u32,
    },
}

pub type CallLog = Rc<RefCell<Vec<Call>>>;

#[derive(Clone, Debug)]
pub struct SwapchainRecord {
    pub min_image_count: u32,
    pub format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,
    pub sharing_mode: vk::SharingMode,
    pub queue_family_indices: Vec<u32>,
    pub present_mode: vk::PresentModeKHR,
}

#[derive(Clone, Debug)]
pub struct PipelineRecord {
    pub stages: Vec<(vk::ShaderStageFlags, CString)>,
    pub vertex_bindings: u32,
    pub vertex_attributes: u32,
    pub topology: vk::PrimitiveTopology,
    pub dynamic_states: Vec<vk::DynamicState>,
    pub polygon_mode: vk::PolygonMode,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub samples: vk::SampleCountFlags,
    pub has_depth_stencil: bool,
    pub blend_enable: bool,
    pub color_write_mask: vk::ColorComponentFlags,
    pub render_pass: u64,
    pub layout: u64,
}

/// A device that hands out fresh handles, records every call, and simulates fences.
pub struct FakeGpu {
    log: CallLog,
    next_handle: Cell<u64>,
    fences: RefCell<HashMap<u64, bool>>,
    image_count: usize,
    next_image: Cell<u32>,
    failing: RefCell<Vec<&'static str>>,
    present_error: Cell<Option<vk::Result>>,
    pub swapchain: RefCell<Option<SwapchainRecord>>,
    pub render_pass_attachment: RefCell<Option<vk::AttachmentDescription>>,
    pub pipeline: RefCell<Option<PipelineRecord>>,
    pub layout_sets: Cell<Option<(u32, u32)>>,
    pub framebuffer_sizes: RefCell<Vec<(u32, u32, u32)>>,
    pub command_pool: Cell<Option<(u32, vk::CommandPoolCreateFlags)>>,
    pub command_buffer_level: Cell<Option<vk::CommandBufferLevel>>,
}

impl FakeGpu {
    pub fn new(log: CallLog, image_count: usize) -> Self {
        log.borrow_mut()
            .push(Call::Create(vk::ObjectType::DEVICE, DEVICE_RAW));
        Self {
            log,
            next_handle: Cell::new(0x100),
            fences: RefCell::new(HashMap::new()),
            image_count,
            next_image: Cell::new(0),
            failing: RefCell::new(Vec::new()),
            present_error: Cell::new(None),
            swapchain: RefCell::new(None),
            render_pass_attachment: RefCell::new(None),
            pipeline: RefCell::new(None),
            layout_sets: Cell::new(None),
            framebuffer_sizes: RefCell::new(Vec::new()),
            command_pool: Cell::new(None),
            command_buffer_level: Cell::new(None),
        }
    }

    /// A three-image device behind an `Rc`, plus the log it writes to.
    pub fn shared() -> (Rc<Self>, CallLog) {
        let log = CallLog::default();
        (Rc::new(Self::new(Rc::clone(&log), 3)), log)
    }

    /// Makes every later call of `op` fail with `ERROR_OUT_OF_DEVICE_MEMORY`.
    pub fn fail_on(&self, op: &'static str) {
        self.failing.borrow_mut().push(op);
    }

    pub fn fail_present_with(&self, result: vk::Result) {
        self.present_error.set(Some(result));
    }

    pub fn fence_signaled(&self, fence: vk::Fence) -> bool {
        self.fences
            .borrow()
            .get(&fence.as_raw())
            .copied()
            .unwrap_or(false)
    }

    fn check(&self, op: &'static str) -> VkResult<()> {
        if self.failing.borrow().contains(&op) {
            Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY)
        } else {
            Ok(())
        }
    }

    fn push(&self, call: Call) {
        self.log.borrow_mut().push(call);
    }

    fn fresh<H: Handle>(&self) -> H {
        let raw = self.next_handle.get();
        self.next_handle.set(raw + 1);
        H::from_raw(raw)
    }

    fn create<H: Handle + Copy>(&self, op: &'static str) -> VkResult<H> {
        self.check(op)?;
        let handle: H = self.fresh();
        self.push(Call::Create(H::TYPE, handle.as_raw()));
        Ok(handle)
    }

    fn destroy<H: Handle>(&self, handle: H) {
        self.push(Call::Destroy(H::TYPE, handle.as_raw()));
    }
}

impl Drop for FakeGpu {
    fn drop(&mut self) {
        self.push(Call::Destroy(vk::ObjectType::DEVICE, DEVICE_RAW));
    }
}

unsafe fn raw_slice<'a, T>(ptr: *const T, len: u32) -> &'a [T] {
    if ptr.is_null() || len == 0 {
        &[]
    } else {
        unsafe { std::slice::from_raw_parts(ptr, len as usize) }
    }
}

fn raws<H: Handle + Copy>(handles: &[H]) -> Vec<u64> {
    handles.iter().map(|h| h.as_raw()).collect()
}

impl Gpu for FakeGpu {
    unsafe fn get_device_queue(&self, family: u32, index: u32) -> vk::Queue {
        vk::Queue::from_raw(0x1000 + u64::from(family) * 0x10 + u64::from(index))
    }

    unsafe fn device_wait_idle(&self) -> VkResult<()> {
        self.check("device_wait_idle")?;
        self.push(Call::DeviceWaitIdle);
        Ok(())
    }

    unsafe fn create_swapchain(
        &self,
        info: &vk::SwapchainCreateInfoKHR<'_>,
    ) -> VkResult<vk::SwapchainKHR> {
        let families =
            unsafe { raw_slice(info.p_queue_family_indices, info.queue_family_index_count) };
        *self.swapchain.borrow_mut() = Some(SwapchainRecord {
            min_image_count: info.min_image_count,
            format: vk::SurfaceFormatKHR {
                format: info.image_format,
                color_space: info.image_color_space,
            },
            extent: info.image_extent,
            sharing_mode: info.image_sharing_mode,
            queue_family_indices: families.to_vec(),
            present_mode: info.present_mode,
        });
        self.create("create_swapchain")
    }

    unsafe fn get_swapchain_images(
        &self,
        _swapchain: vk::SwapchainKHR,
    ) -> VkResult<Vec<vk::Image>> {
        self.check("get_swapchain_images")?;
        Ok((0..self.image_count).map(|_| self.fresh()).collect())
    }

    unsafe fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        self.destroy(swapchain);
    }

    unsafe fn create_image_view(
        &self,
        _info: &vk::ImageViewCreateInfo<'_>,
    ) -> VkResult<vk::ImageView> {
        self.create("create_image_view")
    }

    unsafe fn destroy_image_view(&self, view: vk::ImageView) {
        self.destroy(view);
    }

    unsafe fn create_render_pass(
        &self,
        info: &vk::RenderPassCreateInfo<'_>,
    ) -> VkResult<vk::RenderPass> {
        let attachments = unsafe { raw_slice(info.p_attachments, info.attachment_count) };
        *self.render_pass_attachment.borrow_mut() = attachments.first().copied();
        self.create("create_render_pass")
    }

    unsafe fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        self.destroy(render_pass);
    }

    unsafe fn create_shader_module(
        &self,
        _info: &vk::ShaderModuleCreateInfo<'_>,
    ) -> VkResult<vk::ShaderModule> {
        self.create("create_shader_module")
    }

    unsafe fn destroy_shader_module(&self, module: vk::ShaderModule) {
        self.destroy(module);
    }

    unsafe fn create_pipeline_layout(
        &self,
        info: &vk::PipelineLayoutCreateInfo<'_>,
    ) -> VkResult<vk::PipelineLayout> {
        self.layout_sets
            .set(Some((info.set_layout_count, info.push_constant_range_count)));
        self.create("create_pipeline_layout")
    }

    unsafe fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        self.destroy(layout);
    }

    unsafe fn create_graphics_pipeline(
        &self,
        info: &vk::GraphicsPipelineCreateInfo<'_>,
    ) -> VkResult<vk::Pipeline> {
        let record = unsafe {
            let stages = raw_slice(info.p_stages, info.stage_count)
                .iter()
                .map(|s| (s.stage, CStr::from_ptr(s.p_name).to_owned()))
                .collect();
            let vertex_input = &*info.p_vertex_input_state;
            let input_assembly = &*info.p_input_assembly_state;
            let dynamic = &*info.p_dynamic_state;
            let raster = &*info.p_rasterization_state;
            let multisample = &*info.p_multisample_state;
            let blend = &*info.p_color_blend_state;
            let blend_attachment = &raw_slice(blend.p_attachments, blend.attachment_count)[0];
            PipelineRecord {
                stages,
                vertex_bindings: vertex_input.vertex_binding_description_count,
                vertex_attributes: vertex_input.vertex_attribute_description_count,
                topology: input_assembly.topology,
                dynamic_states: raw_slice(dynamic.p_dynamic_states, dynamic.dynamic_state_count)
                    .to_vec(),
                polygon_mode: raster.polygon_mode,
                cull_mode: raster.cull_mode,
                front_face: raster.front_face,
                samples: multisample.rasterization_samples,
                has_depth_stencil: !info.p_depth_stencil_state.is_null(),
                blend_enable: blend_attachment.blend_enable == vk::TRUE,
                color_write_mask: blend_attachment.color_write_mask,
                render_pass: info.render_pass.as_raw(),
                layout: info.layout.as_raw(),
            }
        };
        *self.pipeline.borrow_mut() = Some(record);
        self.create("create_graphics_pipeline")
    }

    unsafe fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        self.destroy(pipeline);
    }

    unsafe fn create_framebuffer(
        &self,
        info: &vk::FramebufferCreateInfo<'_>,
    ) -> VkResult<vk::Framebuffer> {
        self.framebuffer_sizes
            .borrow_mut()
            .push((info.width, info.height, info.layers));
        self.create("create_framebuffer")
    }

    unsafe fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        self.destroy(framebuffer);
    }

    unsafe fn create_command_pool(
        &self,
        info: &vk::CommandPoolCreateInfo<'_>,
    ) -> VkResult<vk::CommandPool> {
        self.command_pool
            .set(Some((info.queue_family_index, info.flags)));
        self.create("create_command_pool")
    }

    unsafe fn destroy_command_pool(&self, pool: vk::CommandPool) {
        self.destroy(pool);
    }

    unsafe fn allocate_command_buffers(
        &self,
        info: &vk::CommandBufferAllocateInfo<'_>,
    ) -> VkResult<Vec<vk::CommandBuffer>> {
        self.check("allocate_command_buffers")?;
        self.command_buffer_level.set(Some(info.level));
        Ok((0..info.command_buffer_count)
            .map(|_| {
                let cmd: vk::CommandBuffer = self.fresh();
                self.push(Call::AllocateCommandBuffer(cmd.as_raw()));
                cmd
            })
            .collect())
    }

    unsafe fn create_semaphore(
        &self,
        _info: &vk::SemaphoreCreateInfo<'_>,
    ) -> VkResult<vk::Semaphore> {
        self.create("create_semaphore")
    }

    unsafe fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        self.destroy(semaphore);
    }

    unsafe fn create_fence(&self, info: &vk::FenceCreateInfo<'_>) -> VkResult<vk::Fence> {
        let fence: vk::Fence = self.create("create_fence")?;
        self.fences.borrow_mut().insert(
            fence.as_raw(),
            info.flags.contains(vk::FenceCreateFlags::SIGNALED),
        );
        Ok(fence)
    }

    unsafe fn destroy_fence(&self, fence: vk::Fence) {
        self.fences.borrow_mut().remove(&fence.as_raw());
        self.destroy(fence);
    }

    unsafe fn wait_for_fences(
        &self,
        fences: &[vk::Fence],
        _wait_all: bool,
        _timeout: u64,
    ) -> VkResult<()> {
        self.check("wait_for_fences")?;
        for fence in fences {
            let blocked = !self.fence_signaled(*fence);
            // The GPU "finishes" whatever the fence guarded while we block.
            self.fences.borrow_mut().insert(fence.as_raw(), true);
            self.push(Call::WaitFence {
                fence: fence.as_raw(),
                blocked,
            });
        }
        Ok(())
    }

    unsafe fn reset_fences(&self, fences: &[vk::Fence]) -> VkResult<()> {
        self.check("reset_fences")?;
        for fence in fences {
            self.fences.borrow_mut().insert(fence.as_raw(), false);
            self.push(Call::ResetFence(fence.as_raw()));
        }
        Ok(())
    }

    unsafe fn acquire_next_image(
        &self,
        _swapchain: vk::SwapchainKHR,
        _timeout: u64,
        semaphore: vk::Semaphore,
        _fence: vk::Fence,
    ) -> VkResult<(u32, bool)> {
        self.check("acquire_next_image")?;
        let image_index = self.next_image.get();
        self.next_image
            .set((image_index + 1) % self.image_count.max(1) as u32);
        self.push(Call::Acquire {
            semaphore: semaphore.as_raw(),
            image_index,
        });
        Ok((image_index, false))
    }

    unsafe fn reset_command_buffer(
        &self,
        cmd: vk::CommandBuffer,
        _flags: vk::CommandBufferResetFlags,
    ) -> VkResult<()> {
        self.check("reset_command_buffer")?;
        self.push(Call::ResetCommandBuffer(cmd.as_raw()));
        Ok(())
    }

    unsafe fn begin_command_buffer(
        &self,
        cmd: vk::CommandBuffer,
        _info: &vk::CommandBufferBeginInfo<'_>,
    ) -> VkResult<()> {
        self.check("begin_command_buffer")?;
        self.push(Call::BeginCommandBuffer(cmd.as_raw()));
        Ok(())
    }

    unsafe fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()> {
        self.check("end_command_buffer")?;
        self.push(Call::EndCommandBuffer(cmd.as_raw()));
        Ok(())
    }

    unsafe fn cmd_begin_render_pass(
        &self,
        _cmd: vk::CommandBuffer,
        info: &vk::RenderPassBeginInfo<'_>,
        _contents: vk::SubpassContents,
    ) {
        let clear = unsafe { raw_slice(info.p_clear_values, info.clear_value_count) }
            .first()
            .map(|c| unsafe { c.color.float32 })
            .unwrap_or_default();
        self.push(Call::BeginRenderPass {
            render_pass: info.render_pass.as_raw(),
            framebuffer: info.framebuffer.as_raw(),
            extent: (info.render_area.extent.width, info.render_area.extent.height),
            clear,
        });
    }

    unsafe fn cmd_end_render_pass(&self, _cmd: vk::CommandBuffer) {
        self.push(Call::EndRenderPass);
    }

    unsafe fn cmd_bind_pipeline(
        &self,
        _cmd: vk::CommandBuffer,
        _bind_point: vk::PipelineBindPoint,
        pipeline: vk::Pipeline,
    ) {
        self.push(Call::BindPipeline(pipeline.as_raw()));
    }

    unsafe fn cmd_set_viewport(
        &self,
        _cmd: vk::CommandBuffer,
        _first: u32,
        viewports: &[vk::Viewport],
    ) {
        for vp in viewports {
            self.push(Call::SetViewport {
                width: vp.width,
                height: vp.height,
            });
        }
    }

    unsafe fn cmd_set_scissor(&self, _cmd: vk::CommandBuffer, _first: u32, scissors: &[vk::Rect2D]) {
        for sc in scissors {
            self.push(Call::SetScissor {
                extent: (sc.extent.width, sc.extent.height),
            });
        }
    }

    unsafe fn cmd_draw(
        &self,
        _cmd: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        self.push(Call::Draw {
            vertex_count,
            instance_count,
            first_vertex,
            first_instance,
        });
    }

    unsafe fn queue_submit(
        &self,
        _queue: vk::Queue,
        submits: &[vk::SubmitInfo<'_>],
        fence: vk::Fence,
    ) -> VkResult<()> {
        self.check("queue_submit")?;
        for submit in submits {
            let call = unsafe {
                Call::Submit {
                    command_buffers: raws(raw_slice(
                        submit.p_command_buffers,
                        submit.command_buffer_count,
                    )),
                    wait: raws(raw_slice(
                        submit.p_wait_semaphores,
                        submit.wait_semaphore_count,
                    )),
                    wait_stages: raw_slice(
                        submit.p_wait_dst_stage_mask,
                        submit.wait_semaphore_count,
                    )
                    .to_vec(),
                    signal: raws(raw_slice(
                        submit.p_signal_semaphores,
                        submit.signal_semaphore_count,
                    )),
                    fence: fence.as_raw(),
                }
            };
            self.push(call);
        }
        if fence != vk::Fence::null() {
            // Pending until someone waits on it.
            self.fences.borrow_mut().insert(fence.as_raw(), false);
        }
        Ok(())
    }

    unsafe fn queue_present(
        &self,
        _queue: vk::Queue,
        info: &vk::PresentInfoKHR<'_>,
    ) -> VkResult<bool> {
        let (wait, swapchain, image_index) = unsafe {
            (
                raws(raw_slice(info.p_wait_semaphores, info.wait_semaphore_count)),
                raw_slice(info.p_swapchains, info.swapchain_count)[0].as_raw(),
                raw_slice(info.p_image_indices, info.swapchain_count)[0],
            )
        };
        self.push(Call::Present {
            wait,
            swapchain,
            image_index,
        });
        match self.present_error.get() {
            Some(err) => Err(err),
            None => Ok(false),
        }
    }
}

/// One enumerated GPU as the fake driver reports it.
#[derive(Clone, Debug)]
pub struct FakeAdapter {
    pub name: &'static str,
    pub queue_families: Vec<vk::QueueFlags>,
    pub present_support: Vec<bool>,
    pub extensions: Vec<&'static CStr>,
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl FakeAdapter {
    /// A device that passes every suitability check with a single family.
    pub fn capable(name: &'static str) -> Self {
        Self {
            name,
            queue_families: vec![vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER],
            present_support: vec![true],
            extensions: vec![ash::khr::swapchain::NAME],
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 8,
                current_extent: vk::Extent2D {
                    width: 800,
                    height: 600,
                },
                ..Default::default()
            },
            formats: vec![vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            }],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct FakeAdapters {
    pub adapters: Vec<FakeAdapter>,
}

impl FakeAdapters {
    pub fn new(adapters: Vec<FakeAdapter>) -> Self {
        Self { adapters }
    }

    pub fn handle(index: usize) -> vk::PhysicalDevice {
        vk::PhysicalDevice::from_raw(index as u64 + 1)
    }

    fn adapter(&self, device: vk::PhysicalDevice) -> &FakeAdapter {
        &self.adapters[device.as_raw() as usize - 1]
    }
}

impl DeviceQuery for FakeAdapters {
    fn physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>> {
        Ok((0..self.adapters.len()).map(Self::handle).collect())
    }

    fn device_name(&self, device: vk::PhysicalDevice) -> String {
        self.adapter(device).name.to_owned()
    }

    fn queue_families(&self, device: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties> {
        self.adapter(device)
            .queue_families
            .iter()
            .map(|&queue_flags| vk::QueueFamilyProperties {
                queue_flags,
                queue_count: 1,
                ..Default::default()
            })
            .collect()
    }

    fn presentation_support(&self, device: vk::PhysicalDevice, family: u32) -> VkResult<bool> {
        Ok(self
            .adapter(device)
            .present_support
            .get(family as usize)
            .copied()
            .unwrap_or(false))
    }

    fn device_extensions(&self, device: vk::PhysicalDevice) -> VkResult<Vec<CString>> {
        Ok(self
            .adapter(device)
            .extensions
            .iter()
            .map(|&e| e.to_owned())
            .collect())
    }

    fn swap_chain_properties(&self, device: vk::PhysicalDevice) -> VkResult<SwapChainProperties> {
        let a = self.adapter(device);
        Ok(SwapChainProperties {
            capabilities: a.capabilities,
            formats: a.formats.clone(),
            present_modes: a.present_modes.clone(),
        })
    }
}
