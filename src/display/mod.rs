//! SDL2 window showing the composited output
//!
//! The output buffer's packed `0xAARRGGBB` words are uploaded as an
//! ARGB8888 streaming texture and stretched to the window.

use sdl2::event::Event;
use sdl2::keyboard::Keycode;
use sdl2::pixels::PixelFormatEnum;
use sdl2::render::{Canvas, Texture, TextureCreator};
use sdl2::video::{Window, WindowContext};
use sdl2::EventPump;

use bodyblend::{Dimensions, OutputBuffer, Point};

pub struct Display {
    canvas: Canvas<Window>,
    event_pump: EventPump,
    width: u32,
    height: u32,
}

/// Streaming texture sized to the native domain
pub struct RenderTarget<'a> {
    texture: Texture<'a>,
    dims: Dimensions,
    staging: Vec<u8>,
}

#[derive(Debug, Clone)]
pub enum InputEvent {
    Quit,
    KeyDown(Keycode),
    /// Pointer position in window pixels, button held or not
    MouseMove { x: i32, y: i32, pressed: bool },
    MouseDown { x: i32, y: i32 },
    MouseUp,
}

impl Display {
    pub fn with_options(
        title: &str,
        width: u32,
        height: u32,
        vsync: bool,
    ) -> Result<(Self, TextureCreator<WindowContext>), String> {
        let sdl_context = sdl2::init()?;
        let video_subsystem = sdl_context.video()?;

        let window = video_subsystem
            .window(title, width, height)
            .position_centered()
            .build()
            .map_err(|e| e.to_string())?;

        let mut canvas_builder = window.into_canvas().accelerated();
        if vsync {
            canvas_builder = canvas_builder.present_vsync();
        }
        let canvas = canvas_builder.build().map_err(|e| e.to_string())?;

        let texture_creator = canvas.texture_creator();
        let event_pump = sdl_context.event_pump()?;

        Ok((
            Self {
                canvas,
                event_pump,
                width,
                height,
            },
            texture_creator,
        ))
    }

    /// Window pixel to native coordinates
    pub fn to_native(&self, x: i32, y: i32, dims: Dimensions) -> Point {
        Point::new(
            x as f32 * dims.width as f32 / self.width.max(1) as f32,
            y as f32 * dims.height as f32 / self.height.max(1) as f32,
        )
    }

    pub fn present(&mut self, target: &mut RenderTarget, output: &OutputBuffer) -> Result<(), String> {
        if output.dims() != target.dims {
            return Err(format!(
                "output is {}, texture is {}",
                output.dims(),
                target.dims
            ));
        }
        target.staging.clear();
        target
            .staging
            .extend(output.as_slice().iter().flat_map(|px| px.to_ne_bytes()));
        target
            .texture
            .update(None, &target.staging, target.dims.width * 4)
            .map_err(|e| e.to_string())?;

        self.canvas.copy(&target.texture, None, None)?;
        self.canvas.present();
        Ok(())
    }

    pub fn poll_events(&mut self) -> Vec<InputEvent> {
        let mut events = Vec::new();

        for event in self.event_pump.poll_iter() {
            match event {
                Event::Quit { .. } => events.push(InputEvent::Quit),
                Event::KeyDown {
                    keycode: Some(k), ..
                } => events.push(InputEvent::KeyDown(k)),
                Event::MouseMotion {
                    x, y, mousestate, ..
                } => events.push(InputEvent::MouseMove {
                    x,
                    y,
                    pressed: mousestate.left(),
                }),
                Event::MouseButtonDown { x, y, .. } => events.push(InputEvent::MouseDown { x, y }),
                Event::MouseButtonUp { .. } => events.push(InputEvent::MouseUp),
                _ => {},
            }
        }

        events
    }
}

impl<'a> RenderTarget<'a> {
    pub fn new(texture_creator: &'a TextureCreator<WindowContext>, dims: Dimensions) -> Result<Self, String> {
        let texture = texture_creator
            .create_texture_streaming(PixelFormatEnum::ARGB8888, dims.width as u32, dims.height as u32)
            .map_err(|e| e.to_string())?;
        Ok(Self {
            texture,
            dims,
            staging: Vec::with_capacity(dims.len() * 4),
        })
    }
}
