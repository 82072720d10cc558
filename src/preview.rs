// Preview window for the raster canvas.
// Visual effects provided here:
// 1) A window the size of the canvas showing the last rendered pass.
// 2) ESC or closing the window ends the preview.

use std::time::Duration;

use log::info;
use minifb::{Key, Window, WindowOptions};

use crate::error::{Error, Result};
use crate::types::FrameBuffer;

pub struct Preview {
    window: Window, // the on-screen window you see
}

impl Preview {
    /// Visual: a new empty window appears with your chosen title.
    pub fn new(title: &str, width: usize, height: usize) -> Result<Self> {
        let mut window =
            Window::new(title, width, height, WindowOptions::default()).map_err(|e| Error::Window(e.to_string()))?;
        // Nothing animates, no need to spin faster than this.
        window.set_target_fps(30);
        Ok(Self { window })
    }

    /// Visual: the window immediately displays the rendered strokes.
    pub fn present(&mut self, framebuffer: &FrameBuffer) -> Result<()> {
        self.window
            .update_with_buffer(&framebuffer.pixels, framebuffer.width, framebuffer.height)
            .map_err(|e| Error::Window(e.to_string()))
    }

    /// Returns false when the user closes the window.
    pub fn is_open(&self) -> bool {
        self.window.is_open()
    }

    /// True while ESC is held down.
    pub fn esc_pressed(&self) -> bool {
        self.window.is_key_down(Key::Escape)
    }

    /// Keep showing `framebuffer` until the window is closed or ESC is pressed.
    pub fn show(mut self, framebuffer: &FrameBuffer) -> Result<()> {
        info!("preview open, press ESC to quit");
        while self.is_open() && !self.esc_pressed() {
            self.present(framebuffer)?;
            std::thread::sleep(Duration::from_millis(10));
        }
        Ok(())
    }
}
