// SPDX-License-Identifier: CEPL-1.0
//! Per-frame resources and the single-frame-in-flight loop.
//!
//! One command buffer is re-recorded every frame. The in-flight fence starts signaled
//! and is waited on before that buffer is touched again, so at most one frame is ever
//! queued on the GPU.

use std::rc::Rc;

use ash::vk;
use tracing::{debug, info, trace, warn};

use crate::error::{FrameError, InitError};
use crate::gpu::Gpu;
use crate::owned::{
    Owned, OwnedCommandPool, OwnedFence, OwnedSemaphore, ResourceList,
};

const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

pub struct FrameResources<G: Gpu> {
    in_flight: OwnedFence<G>,
    render_finished: OwnedSemaphore<G>,
    image_available: OwnedSemaphore<G>,
    // Freed with its pool.
    command_buffer: vk::CommandBuffer,
    command_pool: OwnedCommandPool<G>,
    framebuffers: ResourceList<vk::Framebuffer, G>,
}

impl<G: Gpu> FrameResources<G> {
    pub fn new(
        gpu: &Rc<G>,
        render_pass: vk::RenderPass,
        image_views: impl ExactSizeIterator<Item = vk::ImageView>,
        extent: vk::Extent2D,
        graphics_family: u32,
    ) -> Result<Self, InitError> {
        let mut framebuffers = ResourceList::with_capacity(image_views.len());
        for view in image_views {
            let attachments = [view];
            let info = vk::FramebufferCreateInfo::default()
                .render_pass(render_pass)
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);
            let fb = unsafe { gpu.create_framebuffer(&info) }
                .map_err(InitError::FramebufferCreation)?;
            framebuffers.push(Owned::new(gpu, fb));
        }

        let pool_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(graphics_family);
        let command_pool = unsafe { gpu.create_command_pool(&pool_info) }
            .map_err(InitError::CommandPoolCreation)?;
        let command_pool = Owned::new(gpu, command_pool);

        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(command_pool.handle())
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let command_buffer = unsafe { gpu.allocate_command_buffers(&alloc_info) }
            .map_err(InitError::CommandBufferAllocation)?
            .into_iter()
            .next()
            .ok_or(InitError::CommandBufferAllocation(
                vk::Result::ERROR_UNKNOWN,
            ))?;

        let semaphore = |what: &'static str| {
            unsafe { gpu.create_semaphore(&vk::SemaphoreCreateInfo::default()) }
                .map(|s| Owned::new(gpu, s))
                .map_err(|result| InitError::SyncObjectCreation { what, result })
        };
        let image_available = semaphore("image-available semaphore")?;
        let render_finished = semaphore("render-finished semaphore")?;

        // Signaled, so the first frame has nothing to wait for.
        let fence_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);
        let in_flight = unsafe { gpu.create_fence(&fence_info) }.map_err(|result| {
            InitError::SyncObjectCreation {
                what: "in-flight fence",
                result,
            }
        })?;
        let in_flight = Owned::new(gpu, in_flight);

        info!(
            "frame resources ready ({} framebuffer(s))",
            framebuffers.len()
        );
        Ok(Self {
            in_flight,
            render_finished,
            image_available,
            command_buffer,
            command_pool,
            framebuffers,
        })
    }

    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    pub fn command_pool(&self) -> vk::CommandPool {
        self.command_pool.handle()
    }

    pub fn framebuffer(&self, image_index: u32) -> Option<vk::Framebuffer> {
        self.framebuffers.get(image_index as usize)
    }

    pub fn image_available(&self) -> vk::Semaphore {
        self.image_available.handle()
    }

    pub fn render_finished(&self) -> vk::Semaphore {
        self.render_finished.handle()
    }

    pub fn in_flight(&self) -> vk::Fence {
        self.in_flight.handle()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FramePhase {
    Idle,
    Acquiring,
    Recording,
    Submitted,
    Presented,
    /// The fence was reset but nothing will signal it again.
    Faulted,
}

/// Handles the loop draws with but does not own.
#[derive(Clone, Copy, Debug)]
pub struct FrameTargets {
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    pub swapchain: vk::SwapchainKHR,
    pub extent: vk::Extent2D,
    pub render_pass: vk::RenderPass,
    pub pipeline: vk::Pipeline,
}

pub struct FrameLoop<G: Gpu> {
    resources: FrameResources<G>,
    targets: FrameTargets,
    gpu: Rc<G>,
    phase: FramePhase,
    image_index: u32,
    frames_presented: u64,
}

impl<G: Gpu> FrameLoop<G> {
    pub fn new(gpu: &Rc<G>, resources: FrameResources<G>, targets: FrameTargets) -> Self {
        Self {
            resources,
            targets,
            gpu: Rc::clone(gpu),
            phase: FramePhase::Idle,
            image_index: 0,
            frames_presented: 0,
        }
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    pub fn image_index(&self) -> u32 {
        self.image_index
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    pub fn resources(&self) -> &FrameResources<G> {
        &self.resources
    }

    fn fault(&mut self, err: FrameError) -> FrameError {
        warn!("frame loop faulted: {err}");
        self.phase = FramePhase::Faulted;
        err
    }

    fn expect_phase(&self, op: &'static str, allowed: &[FramePhase]) -> Result<(), FrameError> {
        match self.phase {
            p if allowed.contains(&p) => Ok(()),
            FramePhase::Faulted => Err(FrameError::Faulted),
            phase => Err(FrameError::OutOfOrder { op, phase }),
        }
    }

    /// Waits for the previous frame, acquires the next image and opens the render pass.
    pub fn begin_frame(&mut self) -> Result<(), FrameError> {
        self.expect_phase("begin_frame", &[FramePhase::Idle, FramePhase::Presented])?;
        self.phase = FramePhase::Acquiring;

        let fence = self.resources.in_flight();
        if let Err(e) = unsafe { self.gpu.wait_for_fences(&[fence], true, u64::MAX) } {
            self.phase = FramePhase::Idle;
            return Err(FrameError::FenceWait(e));
        }
        if let Err(e) = unsafe { self.gpu.reset_fences(&[fence]) } {
            return Err(self.fault(FrameError::FenceReset(e)));
        }

        let acquired = unsafe {
            self.gpu.acquire_next_image(
                self.targets.swapchain,
                u64::MAX,
                self.resources.image_available(),
                vk::Fence::null(),
            )
        };
        match acquired {
            Ok((index, suboptimal)) => {
                if suboptimal {
                    debug!("acquired image {index} is suboptimal for the surface");
                }
                self.image_index = index;
            }
            Err(e) => return Err(self.fault(FrameError::Acquire(e))),
        }

        self.phase = FramePhase::Recording;
        if let Err(e) = self.begin_commands() {
            return Err(self.fault(e));
        }
        trace!("frame {} recording into image {}", self.frames_presented, self.image_index);
        Ok(())
    }

    fn begin_commands(&mut self) -> Result<(), FrameError> {
        let cmd = self.resources.command_buffer();
        // An index with no framebuffer means the swap chain changed under us.
        let framebuffer = self
            .resources
            .framebuffer(self.image_index)
            .ok_or(FrameError::Acquire(vk::Result::ERROR_OUT_OF_DATE_KHR))?;

        unsafe {
            self.gpu
                .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
        }
        .map_err(|result| FrameError::Recording {
            stage: "reset",
            result,
        })?;
        unsafe {
            self.gpu
                .begin_command_buffer(cmd, &vk::CommandBufferBeginInfo::default())
        }
        .map_err(|result| FrameError::Recording {
            stage: "begin",
            result,
        })?;

        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: CLEAR_COLOR,
            },
        }];
        let begin = vk::RenderPassBeginInfo::default()
            .render_pass(self.targets.render_pass)
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: self.targets.extent,
            })
            .clear_values(&clear_values);
        unsafe {
            self.gpu
                .cmd_begin_render_pass(cmd, &begin, vk::SubpassContents::INLINE)
        };
        Ok(())
    }

    pub fn render_triangle(&mut self) -> Result<(), FrameError> {
        self.expect_phase("render_triangle", &[FramePhase::Recording])?;

        let cmd = self.resources.command_buffer();
        let extent = self.targets.extent;
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };

        unsafe {
            self.gpu.cmd_bind_pipeline(
                cmd,
                vk::PipelineBindPoint::GRAPHICS,
                self.targets.pipeline,
            );
            self.gpu.cmd_set_viewport(cmd, 0, &[viewport]);
            self.gpu.cmd_set_scissor(cmd, 0, &[scissor]);
            self.gpu.cmd_draw(cmd, 3, 1, 0, 0);
        }
        Ok(())
    }

    /// Closes recording, submits, and presents the acquired image.
    pub fn end_frame(&mut self) -> Result<(), FrameError> {
        self.expect_phase("end_frame", &[FramePhase::Recording])?;

        let cmd = self.resources.command_buffer();
        unsafe { self.gpu.cmd_end_render_pass(cmd) };
        if let Err(result) = unsafe { self.gpu.end_command_buffer(cmd) } {
            return Err(self.fault(FrameError::Recording {
                stage: "end",
                result,
            }));
        }

        let wait = [self.resources.image_available()];
        let wait_stages = [vk::PipelineStageFlags::TOP_OF_PIPE];
        let command_buffers = [cmd];
        let signal = [self.resources.render_finished()];
        let submit = vk::SubmitInfo::default()
            .wait_semaphores(&wait)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal);

        if let Err(e) = unsafe {
            self.gpu.queue_submit(
                self.targets.graphics_queue,
                &[submit],
                self.resources.in_flight(),
            )
        } {
            return Err(self.fault(FrameError::Submit(e)));
        }
        self.phase = FramePhase::Submitted;

        let swapchains = [self.targets.swapchain];
        let indices = [self.image_index];
        let present = vk::PresentInfoKHR::default()
            .wait_semaphores(&signal)
            .swapchains(&swapchains)
            .image_indices(&indices);

        match unsafe { self.gpu.queue_present(self.targets.present_queue, &present) } {
            Ok(suboptimal) => {
                if suboptimal {
                    warn!("image {} presented suboptimally", self.image_index);
                }
                self.phase = FramePhase::Presented;
                self.frames_presented += 1;
                Ok(())
            }
            Err(result) => {
                // The submit already armed the fence, so the next frame can still wait on it.
                self.phase = FramePhase::Idle;
                Err(FrameError::Present {
                    image_index: self.image_index,
                    result,
                })
            }
        }
    }

    pub fn wait_idle(&self) -> Result<(), FrameError> {
        unsafe { self.gpu.device_wait_idle() }.map_err(FrameError::WaitIdle)
    }
}
