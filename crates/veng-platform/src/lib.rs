// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
//! Pump-driven window for a single-threaded render loop.
//!
//! The loop shape is `while !window.should_close() { window.poll_events(); draw(); }`,
//! so the event loop is pumped with a zero timeout instead of handing control
//! to `run_app`.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use tracing::{debug, info, warn};
use veng_render::{RenderSize, RenderTarget};

pub use winit;

use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalPosition, PhysicalSize},
    error::OsError,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    raw_window_handle::{
        DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
    },
    window::{Window as WinitWindow, WindowAttributes, WindowId},
};

// Desktop backends deliver `resumed` on the first pump; this is a generous cap.
const STARTUP_PUMPS: usize = 64;

#[derive(Clone, Debug)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Vulkan Renderer".to_owned(),
            width: 800,
            height: 600,
        }
    }
}

struct WindowHandler {
    attributes: WindowAttributes,
    window_id: Option<WindowId>,
    created: Option<WinitWindow>,
    create_error: Option<OsError>,
    close_requested: bool,
}

impl ApplicationHandler for WindowHandler {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window_id.is_some() {
            return;
        }
        match event_loop.create_window(self.attributes.clone()) {
            Ok(window) => {
                self.window_id = Some(window.id());
                self.created = Some(window);
            }
            Err(e) => self.create_error = Some(e),
        }
    }

    fn window_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.window_id != Some(window_id) {
            return;
        }
        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                if !self.close_requested {
                    info!("close requested");
                }
                self.close_requested = true;
            }
            _ => {}
        }
    }
}

pub struct Window {
    // Dropped before the event loop that owns its connection.
    inner: WinitWindow,
    event_loop: EventLoop<()>,
    handler: WindowHandler,
}

impl Window {
    pub fn new(cfg: &WindowConfig) -> Result<Self> {
        let mut event_loop: EventLoop<()> = EventLoop::new().context("EventLoop::new")?;

        let attributes = WinitWindow::default_attributes()
            .with_title(cfg.title.clone())
            .with_inner_size(LogicalSize::new(cfg.width, cfg.height))
            .with_resizable(false);

        let mut handler = WindowHandler {
            attributes,
            window_id: None,
            created: None,
            create_error: None,
            close_requested: false,
        };

        let mut inner = None;
        for _ in 0..STARTUP_PUMPS {
            if let PumpStatus::Exit(code) =
                event_loop.pump_app_events(Some(Duration::ZERO), &mut handler)
            {
                bail!("event loop exited with code {code} before the window was created");
            }
            if let Some(e) = handler.create_error.take() {
                return Err(anyhow!(e)).context("create_window");
            }
            if let Some(w) = handler.created.take() {
                inner = Some(w);
                break;
            }
        }
        let inner = inner.ok_or_else(|| anyhow!("window was not created by the event loop"))?;

        let size = inner.inner_size();
        info!(
            "window \"{}\" ready ({}x{} px)",
            cfg.title, size.width, size.height
        );

        Ok(Self {
            inner,
            event_loop,
            handler,
        })
    }

    /// Processes pending window events without blocking.
    pub fn poll_events(&mut self) {
        if let PumpStatus::Exit(code) = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.handler)
        {
            debug!("event loop exit status {code}");
            self.handler.close_requested = true;
        }
    }

    pub fn should_close(&self) -> bool {
        self.handler.close_requested
    }

    /// Centres the window on the monitor at `index`. Returns false when no such monitor exists.
    pub fn try_move_to_monitor(&self, index: usize) -> bool {
        let Some(monitor) = self.inner.available_monitors().nth(index) else {
            warn!("monitor {index} not available; window stays where it is");
            return false;
        };

        let pos = centered_position(monitor.position(), monitor.size(), self.inner.outer_size());
        self.inner.set_outer_position(pos);
        info!(
            "window moved to monitor {index} ({})",
            monitor.name().unwrap_or_else(|| "unnamed".to_owned())
        );
        true
    }
}

fn centered_position(
    monitor_pos: PhysicalPosition<i32>,
    monitor_size: PhysicalSize<u32>,
    window_size: PhysicalSize<u32>,
) -> PhysicalPosition<i32> {
    let dx = (i64::from(monitor_size.width) - i64::from(window_size.width)) / 2;
    let dy = (i64::from(monitor_size.height) - i64::from(window_size.height)) / 2;
    PhysicalPosition::new(
        monitor_pos.x.saturating_add(dx.max(0) as i32),
        monitor_pos.y.saturating_add(dy.max(0) as i32),
    )
}

impl HasWindowHandle for Window {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        self.inner.window_handle()
    }
}

impl HasDisplayHandle for Window {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        self.inner.display_handle()
    }
}

impl RenderTarget for Window {
    fn framebuffer_size(&self) -> RenderSize {
        let s = self.inner.inner_size();
        RenderSize {
            width: s.width,
            height: s.height,
        }
    }
}
