use std::cell::RefCell;
use std::rc::Rc;

use thiserror::Error;

use crate::savegame::{SaveError, SaveReader, SaveWriter, Thumbnail};
use crate::world::{Actor, Bitmap, Camera, Color, Id, Point, PrimitiveObject, TextObject};

use super::movie::MovieFrame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RendererConfig {
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
    pub software: bool,
}

#[derive(Debug, Error)]
pub enum RendererError {
    #[error("failed to set up {width}x{height} screen: {message}")]
    Setup {
        width: u32,
        height: u32,
        message: String,
    },
    #[error("failed to present frame: {0}")]
    Present(String),
}

/// Drawing backend consumed by the engine. Draw calls go to a back buffer
/// that `flip_buffer` presents.
pub trait Renderer {
    fn setup_screen(&mut self, config: &RendererConfig) -> Result<(), RendererError>;
    fn is_fullscreen(&self) -> bool;
    fn is_software(&self) -> bool;
    fn screen_width(&self) -> u32;
    fn screen_height(&self) -> u32;

    fn clear_screen(&mut self);
    /// Copies the stored scene buffers into the back buffer.
    fn draw_buffers(&mut self);
    fn flip_buffer(&mut self) -> Result<(), RendererError>;
    /// Keeps the current back buffer as the backdrop for later frames.
    fn store_display(&mut self);
    fn dim_screen(&mut self);
    fn refresh_buffers(&mut self);
    fn set_3d_mode(&mut self);
    fn setup_camera(&mut self, camera: &Camera);

    fn draw_bitmap(&mut self, id: Id<Bitmap>, bitmap: &Bitmap);
    fn draw_actor(&mut self, id: Id<Actor>, actor: &Actor);
    fn draw_primitive(&mut self, primitive: &PrimitiveObject);
    fn draw_text(&mut self, text: &TextObject);
    fn draw_movie_frame(&mut self, frame: &MovieFrame);
    fn release_movie_frame(&mut self);
    fn iris_around_region(&mut self, top_left: Point, bottom_right: Point);
    /// Unstyled debug text, used for the FPS counter.
    fn draw_emerg_string(&mut self, pos: Point, text: &str, color: Color);

    fn get_screenshot(&mut self, width: u32, height: u32) -> Option<Thumbnail>;
    fn restore_clean_buffer(&mut self, id: Id<Actor>);

    fn save_state(&self, sink: &mut SaveWriter);
    fn restore_state(&mut self, source: &mut SaveReader<'_>) -> Result<(), SaveError>;
}

/// Builds renderers at startup and again on every device reset.
pub trait RendererFactory {
    fn create(&mut self, config: &RendererConfig) -> Result<Box<dyn Renderer>, RendererError>;
}

/// One recorded renderer operation.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCall {
    SetupScreen(RendererConfig),
    Clear,
    DrawBuffers,
    Flip,
    StoreDisplay,
    DimScreen,
    RefreshBuffers,
    Set3dMode,
    SetupCamera,
    Bitmap(u32),
    Actor(u32),
    Primitive,
    Text(String),
    MovieFrame(u32),
    ReleaseMovieFrame,
    Iris,
    EmergString(String),
    Screenshot,
    RestoreCleanBuffer(u32),
}

#[derive(Debug, Default)]
struct HeadlessState {
    calls: Vec<DrawCall>,
    renderers_created: u32,
    fail_screenshots: bool,
}

/// Shared view into what headless renderers did, kept by tests and tools.
#[derive(Debug, Clone, Default)]
pub struct DrawLog {
    state: Rc<RefCell<HeadlessState>>,
}

impl DrawLog {
    pub fn calls(&self) -> Vec<DrawCall> {
        self.state.borrow().calls.clone()
    }

    pub fn take_calls(&self) -> Vec<DrawCall> {
        std::mem::take(&mut self.state.borrow_mut().calls)
    }

    pub fn renderers_created(&self) -> u32 {
        self.state.borrow().renderers_created
    }

    pub fn set_fail_screenshots(&self, fail: bool) {
        self.state.borrow_mut().fail_screenshots = fail;
    }

    fn push(&self, call: DrawCall) {
        self.state.borrow_mut().calls.push(call);
    }
}

/// Renderer without a display that records every call into a [`DrawLog`].
#[derive(Debug)]
pub struct HeadlessRenderer {
    config: RendererConfig,
    clear_color: Color,
    log: DrawLog,
}

impl HeadlessRenderer {
    pub fn new(config: RendererConfig, log: DrawLog) -> Self {
        Self {
            config,
            clear_color: Color::BLACK,
            log,
        }
    }

    pub fn set_clear_color(&mut self, color: Color) {
        self.clear_color = color;
    }
}

impl Renderer for HeadlessRenderer {
    fn setup_screen(&mut self, config: &RendererConfig) -> Result<(), RendererError> {
        if config.width == 0 || config.height == 0 {
            return Err(RendererError::Setup {
                width: config.width,
                height: config.height,
                message: "screen size must be non-zero".to_string(),
            });
        }
        self.config = *config;
        self.log.push(DrawCall::SetupScreen(*config));
        Ok(())
    }

    fn is_fullscreen(&self) -> bool {
        self.config.fullscreen
    }

    fn is_software(&self) -> bool {
        self.config.software
    }

    fn screen_width(&self) -> u32 {
        self.config.width
    }

    fn screen_height(&self) -> u32 {
        self.config.height
    }

    fn clear_screen(&mut self) {
        self.log.push(DrawCall::Clear);
    }

    fn draw_buffers(&mut self) {
        self.log.push(DrawCall::DrawBuffers);
    }

    fn flip_buffer(&mut self) -> Result<(), RendererError> {
        self.log.push(DrawCall::Flip);
        Ok(())
    }

    fn store_display(&mut self) {
        self.log.push(DrawCall::StoreDisplay);
    }

    fn dim_screen(&mut self) {
        self.log.push(DrawCall::DimScreen);
    }

    fn refresh_buffers(&mut self) {
        self.log.push(DrawCall::RefreshBuffers);
    }

    fn set_3d_mode(&mut self) {
        self.log.push(DrawCall::Set3dMode);
    }

    fn setup_camera(&mut self, _camera: &Camera) {
        self.log.push(DrawCall::SetupCamera);
    }

    fn draw_bitmap(&mut self, id: Id<Bitmap>, _bitmap: &Bitmap) {
        self.log.push(DrawCall::Bitmap(id.raw()));
    }

    fn draw_actor(&mut self, id: Id<Actor>, _actor: &Actor) {
        self.log.push(DrawCall::Actor(id.raw()));
    }

    fn draw_primitive(&mut self, _primitive: &PrimitiveObject) {
        self.log.push(DrawCall::Primitive);
    }

    fn draw_text(&mut self, text: &TextObject) {
        self.log.push(DrawCall::Text(text.text.clone()));
    }

    fn draw_movie_frame(&mut self, frame: &MovieFrame) {
        self.log.push(DrawCall::MovieFrame(frame.number));
    }

    fn release_movie_frame(&mut self) {
        self.log.push(DrawCall::ReleaseMovieFrame);
    }

    fn iris_around_region(&mut self, _top_left: Point, _bottom_right: Point) {
        self.log.push(DrawCall::Iris);
    }

    fn draw_emerg_string(&mut self, _pos: Point, text: &str, _color: Color) {
        self.log.push(DrawCall::EmergString(text.to_string()));
    }

    fn get_screenshot(&mut self, width: u32, height: u32) -> Option<Thumbnail> {
        if self.log.state.borrow().fail_screenshots {
            return None;
        }
        self.log.push(DrawCall::Screenshot);
        let fill = self.clear_color.to_rgb565();
        Thumbnail::new(width, height, vec![fill; width as usize * height as usize])
    }

    fn restore_clean_buffer(&mut self, id: Id<Actor>) {
        self.log.push(DrawCall::RestoreCleanBuffer(id.raw()));
    }

    fn save_state(&self, sink: &mut SaveWriter) {
        self.clear_color.write(sink);
    }

    fn restore_state(&mut self, source: &mut SaveReader<'_>) -> Result<(), SaveError> {
        self.clear_color = Color::read(source)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct HeadlessRendererFactory {
    log: DrawLog,
}

impl HeadlessRendererFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> DrawLog {
        self.log.clone()
    }
}

impl RendererFactory for HeadlessRendererFactory {
    fn create(&mut self, config: &RendererConfig) -> Result<Box<dyn Renderer>, RendererError> {
        self.log.state.borrow_mut().renderers_created += 1;
        let mut renderer = HeadlessRenderer::new(*config, self.log.clone());
        renderer.setup_screen(config)?;
        Ok(Box::new(renderer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer(log: &DrawLog) -> HeadlessRenderer {
        let config = RendererConfig {
            width: 640,
            height: 480,
            fullscreen: false,
            software: true,
        };
        HeadlessRenderer::new(config, log.clone())
    }

    #[test]
    fn screenshot_is_filled_with_clear_color() {
        let log = DrawLog::default();
        let mut renderer = renderer(&log);
        renderer.set_clear_color(Color::WHITE);

        let shot = renderer.get_screenshot(250, 188).expect("screenshot");
        assert_eq!(shot.pixels().len(), 250 * 188);
        assert!(shot.pixels().iter().all(|pixel| *pixel == Color::WHITE.to_rgb565()));
        assert_eq!(log.calls(), vec![DrawCall::Screenshot]);
    }

    #[test]
    fn screenshot_failure_is_reported_as_none() {
        let log = DrawLog::default();
        let mut renderer = renderer(&log);
        log.set_fail_screenshots(true);
        assert!(renderer.get_screenshot(250, 188).is_none());
        assert!(log.calls().is_empty());
    }
}
