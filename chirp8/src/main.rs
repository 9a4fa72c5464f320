use std::{path::PathBuf, thread};

use chirp8_base::{
    processor::{Key, KeyState},
    runner::{self, ControlEvent, MachineEvent, RunnerOptions},
    screen::Screen,
};
use clap::Parser;
use pixels::{Pixels, SurfaceTexture};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{self, fmt::format::FmtSpan, EnvFilter};
use winit::{
    dpi::{LogicalSize, PhysicalSize},
    event::{ElementState, Event, VirtualKeyCode, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
};

/// RGB color for the pixel on-state
const COLOR_PIXEL_ON: [u8; 3] = [0xFF, 0xFF, 0xFF];
/// RGB color for the pixel off-state
const COLOR_PIXEL_OFF: [u8; 3] = [0x00, 0x00, 0x00];

trait TryIntoKey {
    type Error;

    fn try_into_key(&self) -> Result<Key, Self::Error>;
}

impl TryIntoKey for VirtualKeyCode {
    type Error = ();

    fn try_into_key(&self) -> Result<Key, Self::Error> {
        use VirtualKeyCode::*;

        // The left half of a QWERTY keyboard, mirroring the 4x4 hex keypad.
        match *self {
            // row 1
            Key1 => Ok(Key::K1),
            Key2 => Ok(Key::K2),
            Key3 => Ok(Key::K3),
            Key4 => Ok(Key::KC),
            // row 2
            Q => Ok(Key::K4),
            W => Ok(Key::K5),
            E => Ok(Key::K6),
            R => Ok(Key::KD),
            // row 3
            A => Ok(Key::K7),
            S => Ok(Key::K8),
            D => Ok(Key::K9),
            F => Ok(Key::KE),
            // row 4
            Z => Ok(Key::KA),
            X => Ok(Key::K0),
            C => Ok(Key::KB),
            V => Ok(Key::KF),
            _ => Err(()),
        }
    }
}

trait IntoKeyState {
    fn into_key_state(&self) -> KeyState;
}

impl IntoKeyState for ElementState {
    fn into_key_state(&self) -> KeyState {
        match *self {
            ElementState::Pressed => KeyState::Pressed,
            ElementState::Released => KeyState::NotPressed,
        }
    }
}

#[derive(Debug, Parser)]
#[clap(version, about)]
struct CliOpts {
    /// The path to the file containing the program image.
    /// The file's contents will be loaded into the machine's memory,
    /// starting at address 0x200.
    rom_file: PathBuf,
    /// Interpreter cycles driven per second.
    #[clap(short, long, default_value_t = 720)]
    cycles_per_second: u32,
    /// Initial window scale relative to the 64x32 pixel buffer.
    #[clap(short, long, default_value_t = 8)]
    scale: u32,
}

fn main() -> Result<(), pixels::Error> {
    let cli_opts = CliOpts::parse();

    tracing_subscriber::fmt()
        .pretty()
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let event_loop = EventLoop::<MachineEvent>::with_user_event();

    let (window, size) = create_window(&event_loop, "chirp8", cli_opts.scale);
    let surface_texture = SurfaceTexture::new(size.width, size.height, &window);
    let mut pixels = Pixels::new(Screen::WIDTH as u32, Screen::HEIGHT as u32, surface_texture)?;

    let program = std::fs::read(&cli_opts.rom_file).expect("could not read the program image");
    let (control_event_sender, machine_event_receiver, machine_join_handle) = runner::spawn(
        &program,
        RunnerOptions {
            cycles_per_second: cli_opts.cycles_per_second,
        },
    )
    .expect("could not start the machine");

    let mut control_event_sender = Some(control_event_sender);
    let mut machine_join_handle = Some(machine_join_handle);
    let mut screen = Screen::default();
    let mut machine_paused = false;

    let event_loop_proxy = event_loop.create_proxy();
    thread::Builder::new()
        .name("machine event forwarder".to_owned())
        .spawn(move || loop {
            let event = match machine_event_receiver.recv() {
                Ok(event) => event,
                Err(_) => break, // event sender closed, stop
            };
            match event_loop_proxy.send_event(event) {
                Ok(()) => (),
                Err(_) => break, // event loop closed, stop
            }
        })
        .expect("could not spawn machine event forwarder thread");

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Wait;
        match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::Resized(size) => pixels.resize_surface(size.width, size.height),
                WindowEvent::CloseRequested => {
                    // dropping this will make the machine stop
                    drop(control_event_sender.take());
                    if let Some(join_handle) = machine_join_handle.take() {
                        let machine_result = join_handle.join().expect("machine thread panicked");
                        if let Err(error) = machine_result {
                            // We are shutting down,
                            // so the error shouldn't be handled graphically anymore.
                            // Logging doesn't hurt though.
                            warn!(?error, "error occurred running the program");
                        }
                    }

                    *control_flow = ControlFlow::Exit;
                }
                WindowEvent::KeyboardInput {
                    input:
                        winit::event::KeyboardInput {
                            state,
                            virtual_keycode: Some(virtual_keycode),
                            ..
                        },
                    ..
                } => {
                    debug!(?virtual_keycode, ?state, "key state changed");
                    if virtual_keycode == VirtualKeyCode::Escape && state == ElementState::Pressed {
                        info!("escape key pressed, exiting...");
                        *control_flow = ControlFlow::Exit;
                    } else if virtual_keycode == VirtualKeyCode::P
                        && state == ElementState::Pressed
                    {
                        let event = if machine_paused {
                            ControlEvent::Resume
                        } else {
                            ControlEvent::Pause
                        };
                        machine_paused = !machine_paused;
                        if let Some(sender) = control_event_sender.as_ref() {
                            let _ = sender.send(event);
                        }
                    } else if let Ok(key) = virtual_keycode.try_into_key() {
                        if let Some(sender) = control_event_sender.as_ref() {
                            let _ = sender.send(ControlEvent::KeyStateChange {
                                key,
                                new_state: state.into_key_state(),
                            });
                        }
                    }
                }
                _ => (),
            },
            Event::UserEvent(MachineEvent::ErrorEncountered { error }) => {
                error!(%error, "the machine encountered an error");
                *control_flow = ControlFlow::Exit;
            }
            Event::UserEvent(MachineEvent::ScreenUpdate { screen: new_screen }) => {
                screen = new_screen;
                window.request_redraw();
            }
            Event::UserEvent(MachineEvent::ScreenCleared) => {
                screen = Screen::default();
                window.request_redraw();
            }
            Event::RedrawRequested(_) => {
                pixels
                    .get_frame()
                    .chunks_exact_mut(4)
                    .zip(
                        screen
                            .pixel_data
                            .iter()
                            .copied()
                            .flat_map(|byte| (0..8).rev().map(move |i| byte >> i & 1 > 0)),
                    )
                    .for_each(|(frame_pixel, screen_pixel_on)| {
                        frame_pixel[0..3].copy_from_slice(if screen_pixel_on {
                            &COLOR_PIXEL_ON
                        } else {
                            &COLOR_PIXEL_OFF
                        }); // RGB
                        frame_pixel[3] = 0xFF; // alpha
                    });
                if pixels
                    .render()
                    .map_err(|error| error!(?error, "pixels failed to draw the pixel buffer"))
                    .is_err()
                {
                    *control_flow = ControlFlow::Exit;
                }
            }
            _ => (),
        }
    });
}

fn create_window<T>(
    event_loop: &EventLoop<T>,
    title: &str,
    scale: u32,
) -> (winit::window::Window, PhysicalSize<u32>) {
    let scale = scale.max(1) as f64;
    let min_size = LogicalSize::new(Screen::WIDTH as f64, Screen::HEIGHT as f64);
    let default_size = LogicalSize::new(
        Screen::WIDTH as f64 * scale,
        Screen::HEIGHT as f64 * scale,
    );

    let window = winit::window::WindowBuilder::new()
        .with_title(title)
        .with_inner_size(default_size)
        .with_min_inner_size(min_size)
        .build(event_loop)
        .expect("could not create the window");

    let size = window.inner_size();

    (window, size)
}
