use std::{thread, time::Duration};

use flume::{Receiver, Sender, TryRecvError};
use tracing::{debug, info, instrument, warn};

use crate::{
    display::DisplaySink,
    machine::{Machine, MachineError, MachineState},
    processor::{Key, KeyState},
    screen::Screen,
};

/// Host → machine control messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    KeyStateChange { key: Key, new_state: KeyState },
    Pause,
    Resume,
    Stop,
}

/// Machine → host notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MachineEvent {
    /// The display buffer changed and should be re-presented.
    ScreenUpdate { screen: Screen },
    /// The display buffer was blanked.
    ScreenCleared,
    /// The machine stopped because of an unrecoverable error.
    ErrorEncountered { error: MachineError },
}

/// Display capability that forwards presentation to the host over a channel.
pub struct ChannelDisplay {
    sender: Sender<MachineEvent>,
}

impl DisplaySink for ChannelDisplay {
    fn render(&mut self, screen: &Screen) {
        // The host may have hung up already; presenting is then moot.
        let _ = self.sender.send(MachineEvent::ScreenUpdate { screen: *screen });
    }

    fn clear(&mut self) {
        let _ = self.sender.send(MachineEvent::ScreenCleared);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RunnerOptions {
    /// Interpreter cycles driven per second.
    pub cycles_per_second: u32,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            cycles_per_second: 720,
        }
    }
}

/// Load `program` into a fresh machine and drive it on a dedicated thread at
/// a fixed cycle rate.
///
/// The machine stops when a [`ControlEvent::Stop`] arrives or the control
/// sender is dropped. While paused no cycles are driven and the thread blocks
/// on the control channel instead of spinning.
#[allow(clippy::type_complexity)]
pub fn spawn(
    program: &[u8],
    options: RunnerOptions,
) -> Result<
    (
        Sender<ControlEvent>,
        Receiver<MachineEvent>,
        thread::JoinHandle<Result<(), MachineError>>,
    ),
    MachineError,
> {
    let (control_sender, control_receiver) = flume::unbounded();
    let (event_sender, event_receiver) = flume::unbounded();

    let mut machine = Machine::new(ChannelDisplay {
        sender: event_sender.clone(),
    });
    machine.load_program(program)?;
    machine.run()?;

    let join_handle = thread::Builder::new()
        .name("chirp8 machine".to_owned())
        .spawn(move || run_machine(machine, control_receiver, event_sender, options))
        .expect("could not spawn machine thread");

    Ok((control_sender, event_receiver, join_handle))
}

#[instrument(name = "machine", skip(machine, control_receiver, event_sender, options))]
fn run_machine(
    mut machine: Machine<ChannelDisplay>,
    control_receiver: Receiver<ControlEvent>,
    event_sender: Sender<MachineEvent>,
    options: RunnerOptions,
) -> Result<(), MachineError> {
    let cycle_period = Duration::from_secs(1) / options.cycles_per_second.max(1);

    info!(
        cycles_per_second = options.cycles_per_second,
        "machine started"
    );

    loop {
        // Drain pending control events; while paused, block instead of
        // spinning through empty cycles.
        loop {
            let event = if machine.state() == MachineState::Paused {
                match control_receiver.recv() {
                    Ok(event) => Some(event),
                    Err(_) => {
                        debug!("control sender dropped, stopping");
                        return Ok(());
                    }
                }
            } else {
                match control_receiver.try_recv() {
                    Ok(event) => Some(event),
                    Err(TryRecvError::Empty) => None,
                    Err(TryRecvError::Disconnected) => {
                        debug!("control sender dropped, stopping");
                        return Ok(());
                    }
                }
            };

            match event {
                Some(ControlEvent::KeyStateChange { key, new_state }) => {
                    machine.set_key_state(key, new_state)
                }
                Some(ControlEvent::Pause) => {
                    if machine.state() == MachineState::Running {
                        machine.pause()?;
                    }
                }
                Some(ControlEvent::Resume) => {
                    if machine.state() == MachineState::Paused {
                        machine.resume()?;
                    }
                }
                Some(ControlEvent::Stop) => {
                    machine.stop()?;
                    info!("machine stopped");
                    return Ok(());
                }
                None => break,
            }
        }

        if let Err(error) = machine.step_cycle() {
            warn!(%error, "machine stopped due to an error");
            let _ = event_sender.send(MachineEvent::ErrorEncountered {
                error: error.clone(),
            });
            return Err(error);
        }

        spin_sleep::sleep(cycle_period);
    }
}
