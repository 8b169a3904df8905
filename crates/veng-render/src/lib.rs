// SPDX-License-Identifier: CEPL-1.0
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

/// A window a renderer can present into.
pub trait RenderTarget: HasWindowHandle + HasDisplayHandle {
    /// Current drawable size in physical pixels.
    fn framebuffer_size(&self) -> RenderSize;
}

/// One displayed frame is `begin_frame`, `render_triangle`, `end_frame`, in that order.
pub trait Renderer {
    type Error: std::error::Error + Send + Sync + 'static;

    fn begin_frame(&mut self) -> Result<(), Self::Error>;
    fn render_triangle(&mut self) -> Result<(), Self::Error>;
    fn end_frame(&mut self) -> Result<(), Self::Error>;

    /// Blocks until the GPU has finished all submitted work.
    fn wait_idle(&mut self) -> Result<(), Self::Error>;

    fn draw_frame(&mut self) -> Result<(), Self::Error> {
        self.begin_frame()?;
        self.render_triangle()?;
        self.end_frame()
    }
}
