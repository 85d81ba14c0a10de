mod control;
#[cfg(feature = "viewer")]
mod display;
mod mqtt;

use std::path::PathBuf;
use std::time::Duration;

use bodyblend::frame::bgra;
use bodyblend::synthetic::{SyntheticRig, ARM_ANGLE_RANGE};
use bodyblend::util::FpsCounter;
use bodyblend::{Compositor, CompositorConfig, OutputBuffer, Point, Resolution, TraversalStrategy};
use control::{Command, Controller, DEFAULT_SOCKET_PATH};
use mqtt::TouchFeed;

/// Fill for cells no pass writes
const BACKDROP: u32 = bgra(16, 16, 24, 0xFF);

/// Frames run headless when `--frames` is not given
const HEADLESS_FRAMES: usize = 600;

struct Options {
    config: Option<PathBuf>,
    frames: Option<usize>,
    hd: bool,
    strategy: Option<TraversalStrategy>,
    socket: Option<PathBuf>,
    mqtt_host: Option<String>,
    mqtt_topic: String,
    headless: bool,
    window_scale: u32,
    vsync: bool,
}

fn parse_args() -> Options {
    let args: Vec<String> = std::env::args().collect();
    let mut options = Options {
        config: None,
        frames: None,
        hd: false,
        strategy: None,
        socket: Some(PathBuf::from(DEFAULT_SOCKET_PATH)),
        mqtt_host: None,
        mqtt_topic: mqtt::DEFAULT_TOPIC.to_string(),
        headless: !cfg!(feature = "viewer"),
        window_scale: 4,
        vsync: true,
    };

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1);
        match (args[i].as_str(), value) {
            ("--config" | "-c", Some(v)) => {
                options.config = Some(PathBuf::from(v));
                i += 1;
            },
            ("--frames" | "-n", Some(v)) => {
                options.frames = v.parse().ok();
                i += 1;
            },
            ("--strategy" | "-s", Some(v)) => {
                options.strategy = TraversalStrategy::from_name(v);
                if options.strategy.is_none() {
                    log::warn!("unknown strategy '{}', keeping the configured one", v);
                }
                i += 1;
            },
            ("--socket", Some(v)) => {
                options.socket = Some(PathBuf::from(v));
                i += 1;
            },
            ("--mqtt", Some(v)) => {
                options.mqtt_host = Some(v.clone());
                i += 1;
            },
            ("--topic", Some(v)) => {
                options.mqtt_topic = v.clone();
                i += 1;
            },
            ("--scale", Some(v)) => {
                if let Ok(scale) = v.parse::<u32>() {
                    options.window_scale = scale.max(1);
                }
                i += 1;
            },
            ("--hd", _) => options.hd = true,
            ("--headless", _) => options.headless = true,
            ("--no-control", _) => options.socket = None,
            ("--no-vsync", _) => options.vsync = false,
            ("--help", _) => {
                println!("Usage: bodyblend [OPTIONS]");
                println!();
                println!("Options:");
                println!("  --config FILE, -c FILE  Load compositor settings from JSON");
                println!("  --frames N, -n N        Stop after N frames");
                println!("  --hd                    Composite in color space");
                println!("  --strategy NAME, -s NAME");
                println!("                          sequential, recursive_dfs, iterative_dfs,");
                println!("                          iterative_bfs or scanline");
                println!("  --socket PATH           Control socket (default: {})", DEFAULT_SOCKET_PATH);
                println!("  --no-control            Do not open the control socket");
                println!("  --mqtt HOST             Read touch points from an MQTT broker");
                println!("  --topic TOPIC           MQTT topic (default: {})", mqtt::DEFAULT_TOPIC);
                println!("  --headless              No window, log frame timing instead");
                println!("  --scale N               Window pixels per native pixel (default: 4)");
                println!("  --no-vsync              Disable VSync");
                println!("  --help                  Show this help message");
                std::process::exit(0);
            },
            (other, _) => log::warn!("ignoring argument '{}'", other),
        }
        i += 1;
    }

    options
}

/// Everything the frame loop mutates
struct App {
    compositor: Compositor,
    rig: SyntheticRig,
    output: OutputBuffer,
    touch: Option<Point>,
    time: f32,
    frame: usize,
}

impl App {
    fn new(options: &Options) -> bodyblend::Result<Self> {
        let mut config = match &options.config {
            Some(path) => CompositorConfig::load(path)?,
            None => CompositorConfig::default(),
        };
        if options.hd {
            config.resolution = Resolution::Hd;
        }
        if let Some(strategy) = options.strategy {
            config.traversal = strategy;
        }
        let rig = match config.resolution {
            Resolution::LowRes => SyntheticRig::low_res(),
            Resolution::Hd => SyntheticRig::hd(),
        };
        log::info!(
            "compositing {} frames at {} with {} traversal, mode {}",
            config.resolution.name(),
            rig.native_dims(),
            config.traversal.name(),
            config.mode.name()
        );
        Ok(Self {
            compositor: Compositor::new(config)?,
            rig,
            output: OutputBuffer::new(rig.native_dims(), BACKDROP),
            touch: Some(rig.default_touch()),
            time: 0.0,
            frame: 0,
        })
    }

    /// Returns false on quit
    fn apply(&mut self, cmd: Command) -> bool {
        log::debug!("command {:?}", cmd);
        match cmd {
            Command::Mode(mode) => self.compositor.set_mode(mode),
            Command::Strategy(strategy) => {
                let mut config = self.compositor.config().clone();
                config.traversal = strategy;
                if let Err(e) = self.compositor.set_config(config) {
                    log::warn!("strategy change rejected: {}", e);
                }
            },
            Command::Alpha(alpha) => self.compositor.set_transparency(alpha),
            Command::Touch(p) => self.touch = Some(p),
            Command::Release => self.touch = None,
            Command::Quit => return false,
        }
        true
    }

    /// Pose the synthetic figure and composite one frame
    fn step(&mut self, dt: f32) -> bodyblend::Result<()> {
        self.time += dt;
        let (lo, hi) = ARM_ANGLE_RANGE;
        let angle = lo + (hi - lo) * (0.5 + 0.5 * (self.time * 0.8).sin());
        let frame = self.rig.frame(angle)?;

        self.output.fill(BACKDROP);
        let report =
            self.compositor
                .compose(&frame.sensor_frame(), &frame.skeleton, self.touch, &mut self.output)?;
        self.frame += 1;
        if self.frame % 120 == 0 {
            log::debug!("frame {}: {:?}", self.frame, report);
        }
        Ok(())
    }
}

fn run_headless(app: &mut App, options: &Options, controller: Option<&Controller>, feed: Option<&TouchFeed>) -> Result<(), String> {
    let frames = options.frames.unwrap_or(HEADLESS_FRAMES);
    let mut fps = FpsCounter::new(120);
    let mut dt = 1.0 / 60.0;
    while app.frame < frames {
        if !poll_remote(app, controller, feed) {
            break;
        }
        app.step(dt).map_err(|e| e.to_string())?;
        dt = fps.tick().0;
        if app.frame % 120 == 0 {
            let (p1, p50, p99) = fps.percentiles_ms();
            log::info!(
                "{} frames, avg {:.2}ms (p1 {:.2} / p50 {:.2} / p99 {:.2})",
                app.frame,
                fps.avg_frame_time_ms(),
                p1,
                p50,
                p99
            );
        }
        if controller.is_some() || feed.is_some() {
            // leave room for remote input
            std::thread::sleep(Duration::from_millis(1));
        }
    }
    log::info!("done after {} frames", app.frame);
    Ok(())
}

#[cfg(feature = "viewer")]
fn run_viewer(app: &mut App, options: &Options, controller: Option<&Controller>, feed: Option<&TouchFeed>) -> Result<(), String> {
    use bodyblend::CompositeMode;
    use display::{Display, InputEvent, RenderTarget};
    use sdl2::keyboard::Keycode;

    // keys 1-6
    const MODE_KEYS: [&str; 6] = ["standard", "extend", "rotate", "scale", "duplicate", "pointer"];

    let dims = app.rig.native_dims();
    let scale = options.window_scale;
    let (mut display, texture_creator) = Display::with_options(
        "bodyblend",
        dims.width as u32 * scale,
        dims.height as u32 * scale,
        options.vsync,
    )?;
    let mut target = RenderTarget::new(&texture_creator, dims)?;
    let mut fps = FpsCounter::new(60);

    println!("=== bodyblend ===");
    println!("  Mouse      - Drag to move the touch point");
    println!("  1-6        - standard, extend, rotate, scale, duplicate, pointer");
    println!("  S          - Next traversal strategy");
    println!("  R          - Release the touch point");
    println!("  Escape     - Quit");

    'main: loop {
        let (dt, _, _) = fps.tick();
        if !poll_remote(app, controller, feed) {
            break;
        }

        for event in display.poll_events() {
            let cmd = match event {
                InputEvent::Quit | InputEvent::KeyDown(Keycode::Escape) => break 'main,
                InputEvent::MouseDown { x, y } | InputEvent::MouseMove { x, y, pressed: true } => {
                    Some(Command::Touch(display.to_native(x, y, dims)))
                },
                InputEvent::KeyDown(Keycode::R) => Some(Command::Release),
                InputEvent::KeyDown(Keycode::S) => {
                    let current = app.compositor.config().traversal;
                    let all = TraversalStrategy::ALL;
                    let next = all.iter().position(|&s| s == current).map_or(0, |i| (i + 1) % all.len());
                    log::info!("traversal: {}", all[next].name());
                    Some(Command::Strategy(all[next]))
                },
                InputEvent::KeyDown(key) => {
                    let digits = [
                        Keycode::Num1,
                        Keycode::Num2,
                        Keycode::Num3,
                        Keycode::Num4,
                        Keycode::Num5,
                        Keycode::Num6,
                    ];
                    digits
                        .iter()
                        .position(|&k| k == key)
                        .and_then(|i| CompositeMode::from_name(MODE_KEYS[i]))
                        .map(Command::Mode)
                },
                _ => None,
            };
            if let Some(cmd) = cmd {
                if !app.apply(cmd) {
                    break 'main;
                }
            }
        }

        app.step(dt).map_err(|e| e.to_string())?;
        display.present(&mut target, &app.output)?;
        if options.frames.is_some_and(|n| app.frame >= n) {
            break;
        }
    }
    Ok(())
}

/// Drain the control socket and touch feed; false on quit
fn poll_remote(app: &mut App, controller: Option<&Controller>, feed: Option<&TouchFeed>) -> bool {
    if let Some(update) = feed.and_then(TouchFeed::poll) {
        app.touch = update;
    }
    controller
        .map(Controller::poll)
        .unwrap_or_default()
        .into_iter()
        .all(|cmd| app.apply(cmd))
}

fn main() -> Result<(), String> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let options = parse_args();

    let mut app = App::new(&options).map_err(|e| e.to_string())?;

    let controller = match &options.socket {
        Some(path) => match Controller::bind(path) {
            Ok(controller) => Some(controller),
            Err(e) => {
                log::warn!("control socket unavailable: {}", e);
                None
            },
        },
        None => None,
    };
    let feed = match &options.mqtt_host {
        Some(host) => Some(TouchFeed::connect(host, &options.mqtt_topic).map_err(|e| e.to_string())?),
        None => None,
    };

    run(&mut app, &options, controller.as_ref(), feed.as_ref())
}

#[cfg(feature = "viewer")]
fn run(app: &mut App, options: &Options, controller: Option<&Controller>, feed: Option<&TouchFeed>) -> Result<(), String> {
    if options.headless {
        run_headless(app, options, controller, feed)
    } else {
        run_viewer(app, options, controller, feed)
    }
}

#[cfg(not(feature = "viewer"))]
fn run(app: &mut App, options: &Options, controller: Option<&Controller>, feed: Option<&TouchFeed>) -> Result<(), String> {
    run_headless(app, options, controller, feed)
}
