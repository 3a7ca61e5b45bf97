use std::sync::Arc;

use lantern_engine::savegame::{SaveError, SaveReader, SaveWriter, Thumbnail};
use lantern_engine::services::{MovieFrame, Renderer, RendererConfig, RendererError, RendererFactory};
use lantern_engine::world::{
    Actor, Bitmap, Camera, Color, Id, Justify, Point, PrimitiveObject, PrimitiveShape, TextObject,
};
use pixels::{Pixels, SurfaceTexture};
use tracing::{debug, info};
use winit::window::{Fullscreen, Window};

const PIXELS_PER_UNIT: f32 = 60.0;
const ACTOR_HALF_SIZE: i32 = 10;
const GLYPH_WIDTH: i32 = 5;
const GLYPH_HEIGHT: i32 = 7;
const GLYPH_ADVANCE: i32 = 6;

/// Software framebuffer renderer. Scene bitmaps have no decoded image data in
/// this player, so each one is drawn as a flat panel tinted by its file name.
pub struct PixelsRenderer {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    config: RendererConfig,
    surface_width: u32,
    surface_height: u32,
    back: Vec<u8>,
    stored: Vec<u8>,
    camera: Camera,
    clear_color: Color,
}

impl PixelsRenderer {
    pub fn new(window: Arc<Window>, config: &RendererConfig) -> Result<Self, RendererError> {
        apply_fullscreen(&window, config.fullscreen);
        let size = window.inner_size();
        let pixels = build_pixels(Arc::clone(&window), config, size.width, size.height)?;
        let frame_len = frame_len(config.width, config.height);
        Ok(Self {
            window,
            pixels,
            config: *config,
            surface_width: size.width,
            surface_height: size.height,
            back: vec![0; frame_len],
            stored: vec![0; frame_len],
            camera: Camera::default(),
            clear_color: Color::BLACK,
        })
    }

    fn width(&self) -> usize {
        self.config.width as usize
    }

    fn fill_rect(&mut self, top_left: Point, bottom_right: Point, color: [u8; 4]) {
        let width = self.config.width as i32;
        let height = self.config.height as i32;
        let x0 = top_left.x.max(0);
        let y0 = top_left.y.max(0);
        let x1 = bottom_right.x.min(width - 1);
        let y1 = bottom_right.y.min(height - 1);
        for y in y0..=y1 {
            for x in x0..=x1 {
                write_pixel_rgba_clipped(&mut self.back, width as usize, x, y, color);
            }
        }
    }

    fn outline_rect(&mut self, top_left: Point, bottom_right: Point, color: [u8; 4]) {
        let width = self.width();
        for x in top_left.x..=bottom_right.x {
            write_pixel_rgba_clipped(&mut self.back, width, x, top_left.y, color);
            write_pixel_rgba_clipped(&mut self.back, width, x, bottom_right.y, color);
        }
        for y in top_left.y..=bottom_right.y {
            write_pixel_rgba_clipped(&mut self.back, width, top_left.x, y, color);
            write_pixel_rgba_clipped(&mut self.back, width, bottom_right.x, y, color);
        }
    }

    fn draw_line(&mut self, from: Point, to: Point, color: [u8; 4]) {
        let width = self.width();
        let dx = (to.x - from.x).abs();
        let dy = -(to.y - from.y).abs();
        let step_x = if from.x < to.x { 1 } else { -1 };
        let step_y = if from.y < to.y { 1 } else { -1 };
        let mut error = dx + dy;
        let (mut x, mut y) = (from.x, from.y);
        loop {
            write_pixel_rgba_clipped(&mut self.back, width, x, y, color);
            if x == to.x && y == to.y {
                break;
            }
            let doubled = 2 * error;
            if doubled >= dy {
                error += dy;
                x += step_x;
            }
            if doubled <= dx {
                error += dx;
                y += step_y;
            }
        }
    }

    /// One solid block per visible character.
    fn draw_block_text(&mut self, pos: Point, text: &str, justify: Justify, color: [u8; 4]) {
        let span = text.chars().count() as i32 * GLYPH_ADVANCE;
        let start_x = match justify {
            Justify::Left => pos.x,
            Justify::Center => pos.x - span / 2,
            Justify::Right => pos.x - span,
        };
        for (index, ch) in text.chars().enumerate() {
            if ch.is_whitespace() {
                continue;
            }
            let x = start_x + index as i32 * GLYPH_ADVANCE;
            self.fill_rect(
                Point::new(x, pos.y),
                Point::new(x + GLYPH_WIDTH - 1, pos.y + GLYPH_HEIGHT - 1),
                color,
            );
        }
    }

    fn project(&self, actor: &Actor) -> Point {
        let center_x = self.config.width as f32 / 2.0;
        let center_y = self.config.height as f32 / 2.0;
        let dx = actor.pos.x - self.camera.interest.x;
        let dy = actor.pos.y - self.camera.interest.y + actor.pos.z;
        Point::new(
            (center_x + dx * PIXELS_PER_UNIT).round() as i32,
            (center_y - dy * PIXELS_PER_UNIT).round() as i32,
        )
    }

    fn resize_surface_if_needed(&mut self) -> Result<(), RendererError> {
        let size = self.window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Ok(());
        }
        if size.width == self.surface_width && size.height == self.surface_height {
            return Ok(());
        }
        self.pixels
            .resize_surface(size.width, size.height)
            .map_err(|error| RendererError::Present(error.to_string()))?;
        self.surface_width = size.width;
        self.surface_height = size.height;
        debug!(width = size.width, height = size.height, "surface_resized");
        Ok(())
    }
}

impl Renderer for PixelsRenderer {
    fn setup_screen(&mut self, config: &RendererConfig) -> Result<(), RendererError> {
        if config.width == 0 || config.height == 0 {
            return Err(RendererError::Setup {
                width: config.width,
                height: config.height,
                message: "screen size must be non-zero".to_string(),
            });
        }
        apply_fullscreen(&self.window, config.fullscreen);
        let size = self.window.inner_size();
        self.pixels = build_pixels(Arc::clone(&self.window), config, size.width, size.height)?;
        self.surface_width = size.width;
        self.surface_height = size.height;
        self.config = *config;
        let frame_len = frame_len(config.width, config.height);
        self.back = vec![0; frame_len];
        self.stored = vec![0; frame_len];
        info!(
            width = config.width,
            height = config.height,
            fullscreen = config.fullscreen,
            software = config.software,
            "screen_setup"
        );
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
        let color = rgba(self.clear_color);
        for pixel in self.back.chunks_exact_mut(4) {
            pixel.copy_from_slice(&color);
        }
    }

    /// Scene layers are drawn straight into the back buffer.
    fn draw_buffers(&mut self) {}

    fn flip_buffer(&mut self) -> Result<(), RendererError> {
        self.resize_surface_if_needed()?;
        let frame = self.pixels.frame_mut();
        if frame.len() == self.back.len() {
            frame.copy_from_slice(&self.back);
        }
        self.pixels
            .render()
            .map_err(|error| RendererError::Present(error.to_string()))
    }

    fn store_display(&mut self) {
        self.stored.copy_from_slice(&self.back);
    }

    fn dim_screen(&mut self) {
        for buffer in [&mut self.back, &mut self.stored] {
            for pixel in buffer.chunks_exact_mut(4) {
                pixel[0] /= 2;
                pixel[1] /= 2;
                pixel[2] /= 2;
            }
        }
        self.back.copy_from_slice(&self.stored);
    }

    fn refresh_buffers(&mut self) {
        self.back.copy_from_slice(&self.stored);
    }

    fn set_3d_mode(&mut self) {}

    fn setup_camera(&mut self, camera: &Camera) {
        self.camera = *camera;
    }

    fn draw_bitmap(&mut self, _id: Id<Bitmap>, bitmap: &Bitmap) {
        let (width, height) = if bitmap.width == 0 || bitmap.height == 0 {
            (self.config.width, self.config.height)
        } else {
            (bitmap.width, bitmap.height)
        };
        let bottom_right = Point::new(
            bitmap.pos.x + width as i32 - 1,
            bitmap.pos.y + height as i32 - 1,
        );
        self.fill_rect(bitmap.pos, bottom_right, tint_for(&bitmap.filename));
    }

    fn draw_actor(&mut self, _id: Id<Actor>, actor: &Actor) {
        let center = self.project(actor);
        let half = Point::new(ACTOR_HALF_SIZE, ACTOR_HALF_SIZE);
        let top_left = Point::new(center.x - half.x, center.y - half.y);
        let bottom_right = Point::new(center.x + half.x, center.y + half.y);
        self.fill_rect(top_left, bottom_right, rgba(actor.talk_color));
        if actor.talking {
            self.outline_rect(
                Point::new(top_left.x - 2, top_left.y - 2),
                Point::new(bottom_right.x + 2, bottom_right.y + 2),
                rgba(Color::WHITE),
            );
        }
    }

    fn draw_primitive(&mut self, primitive: &PrimitiveObject) {
        let color = rgba(primitive.color);
        match (primitive.shape, primitive.points.as_slice()) {
            (PrimitiveShape::Rectangle, [top_left, bottom_right, ..]) => {
                if primitive.filled {
                    self.fill_rect(*top_left, *bottom_right, color);
                } else {
                    self.outline_rect(*top_left, *bottom_right, color);
                }
            }
            (PrimitiveShape::Line, [from, to, ..]) => self.draw_line(*from, *to, color),
            (PrimitiveShape::Polygon, points) if points.len() >= 2 => {
                for (index, from) in points.iter().enumerate() {
                    let to = points[(index + 1) % points.len()];
                    self.draw_line(*from, to, color);
                }
            }
            _ => {}
        }
    }

    fn draw_text(&mut self, text: &TextObject) {
        self.draw_block_text(
            text.style.pos,
            &text.text,
            text.style.justify,
            rgba(text.style.fg_color),
        );
    }

    fn draw_movie_frame(&mut self, frame: &MovieFrame) {
        let (width, height) = if frame.width == 0 || frame.height == 0 {
            (self.config.width, self.config.height)
        } else {
            (frame.width, frame.height)
        };
        let shade = 40 + (frame.number % 8) as u8 * 20;
        self.fill_rect(
            frame.pos,
            Point::new(frame.pos.x + width as i32 - 1, frame.pos.y + height as i32 - 1),
            [shade, shade, shade, 0xff],
        );
    }

    fn release_movie_frame(&mut self) {}

    fn iris_around_region(&mut self, top_left: Point, bottom_right: Point) {
        let width = self.config.width as i32;
        let height = self.config.height as i32;
        let black = rgba(Color::BLACK);
        self.fill_rect(Point::new(0, 0), Point::new(width - 1, top_left.y - 1), black);
        self.fill_rect(Point::new(0, bottom_right.y + 1), Point::new(width - 1, height - 1), black);
        self.fill_rect(
            Point::new(0, top_left.y),
            Point::new(top_left.x - 1, bottom_right.y),
            black,
        );
        self.fill_rect(
            Point::new(bottom_right.x + 1, top_left.y),
            Point::new(width - 1, bottom_right.y),
            black,
        );
    }

    fn draw_emerg_string(&mut self, pos: Point, text: &str, color: Color) {
        self.draw_block_text(pos, text, Justify::Left, rgba(color));
    }

    fn get_screenshot(&mut self, width: u32, height: u32) -> Option<Thumbnail> {
        Thumbnail::from_rgba(self.config.width, self.config.height, &self.back, width, height)
    }

    fn restore_clean_buffer(&mut self, _id: Id<Actor>) {}

    fn save_state(&self, sink: &mut SaveWriter) {
        sink.write_u8(self.clear_color.r);
        sink.write_u8(self.clear_color.g);
        sink.write_u8(self.clear_color.b);
    }

    fn restore_state(&mut self, source: &mut SaveReader<'_>) -> Result<(), SaveError> {
        self.clear_color = Color::new(source.read_u8()?, source.read_u8()?, source.read_u8()?);
        Ok(())
    }
}

/// Builds a fresh [`PixelsRenderer`] on the shared window for every device reset.
pub struct PixelsRendererFactory {
    window: Arc<Window>,
}

impl PixelsRendererFactory {
    pub fn new(window: Arc<Window>) -> Self {
        Self { window }
    }
}

impl RendererFactory for PixelsRendererFactory {
    fn create(&mut self, config: &RendererConfig) -> Result<Box<dyn Renderer>, RendererError> {
        let mut renderer = PixelsRenderer::new(Arc::clone(&self.window), config)?;
        renderer.setup_screen(config)?;
        Ok(Box::new(renderer))
    }
}

fn build_pixels(
    window: Arc<Window>,
    config: &RendererConfig,
    surface_width: u32,
    surface_height: u32,
) -> Result<Pixels<'static>, RendererError> {
    let surface = SurfaceTexture::new(surface_width.max(1), surface_height.max(1), window);
    Pixels::new(config.width, config.height, surface).map_err(|error| RendererError::Setup {
        width: config.width,
        height: config.height,
        message: error.to_string(),
    })
}

fn apply_fullscreen(window: &Window, fullscreen: bool) {
    window.set_fullscreen(fullscreen.then_some(Fullscreen::Borderless(None)));
}

fn frame_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 4
}

fn rgba(color: Color) -> [u8; 4] {
    [color.r, color.g, color.b, 0xff]
}

/// Stable muted color per bitmap file name.
fn tint_for(filename: &str) -> [u8; 4] {
    let hash = filename
        .bytes()
        .fold(0x811c_9dc5_u32, |hash, byte| (hash ^ u32::from(byte)).wrapping_mul(0x0100_0193));
    let channel = |shift: u32| 48 + ((hash >> shift) & 0x7f) as u8;
    [channel(0), channel(8), channel(16), 0xff]
}

fn write_pixel_rgba_clipped(frame: &mut [u8], width: usize, x: i32, y: i32, color: [u8; 4]) {
    if x < 0 || y < 0 {
        return;
    }
    let x = x as usize;
    let y = y as usize;
    if x >= width {
        return;
    }
    let Some(pixel_offset) = y.checked_mul(width).and_then(|row| row.checked_add(x)) else {
        return;
    };
    let Some(byte_offset) = pixel_offset.checked_mul(4) else {
        return;
    };
    let Some(end) = byte_offset.checked_add(4) else {
        return;
    };
    if end > frame.len() {
        return;
    }
    frame[byte_offset..end].copy_from_slice(&color);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clipped_write_ignores_out_of_bounds() {
        let mut frame = vec![0u8; 4 * 4 * 4];
        write_pixel_rgba_clipped(&mut frame, 4, -1, 0, [1, 2, 3, 4]);
        write_pixel_rgba_clipped(&mut frame, 4, 4, 0, [1, 2, 3, 4]);
        write_pixel_rgba_clipped(&mut frame, 4, 0, 4, [1, 2, 3, 4]);
        assert!(frame.iter().all(|byte| *byte == 0));

        write_pixel_rgba_clipped(&mut frame, 4, 1, 2, [9, 8, 7, 6]);
        let offset = (2 * 4 + 1) * 4;
        assert_eq!(&frame[offset..offset + 4], &[9, 8, 7, 6]);
    }

    #[test]
    fn tint_is_stable_and_muted() {
        let first = tint_for("office_wide.bm");
        assert_eq!(first, tint_for("office_wide.bm"));
        assert_ne!(first, tint_for("office_desk.bm"));
        assert!(first[..3].iter().all(|channel| (48..=175).contains(channel)));
        assert_eq!(first[3], 0xff);
    }
}
