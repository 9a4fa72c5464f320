use thiserror::Error;
use tracing::debug;

use crate::{
    display::DisplaySink,
    processor::{Key, KeyState, Processor, ProcessorError, ProgramTooLargeError, ScreenEffect},
};

/// Lifecycle state of a [`Machine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineState {
    /// No program image has been supplied yet.
    Idle,
    /// A program image is in memory and the processor state is pristine.
    Ready,
    /// Cycles are being driven.
    Running,
    /// All state is frozen as of the last completed cycle.
    Paused,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MachineError {
    #[error("no program image has been loaded")]
    NoProgramLoaded,
    #[error("`{operation}` is not valid in the {state:?} state")]
    InvalidStateTransition {
        state: MachineState,
        operation: &'static str,
    },
    #[error(transparent)]
    ProgramTooLarge(#[from] ProgramTooLargeError),
    #[error(transparent)]
    Processor(#[from] ProcessorError),
}

/// The execution engine: owns a [`Processor`] and a display capability, keeps
/// a pristine copy of the loaded program image, and enforces the lifecycle
/// around single cycles.
///
/// The machine never schedules its own repetition. A periodic external driver
/// (a fixed-rate runner thread, a game loop, a test harness) calls
/// [`Machine::step_cycle`] as often as it sees fit, which makes execution
/// fully deterministic under test.
pub struct Machine<D> {
    processor: Processor,
    display: D,
    program: Option<Vec<u8>>,
    state: MachineState,
}

impl<D: DisplaySink> Machine<D> {
    pub fn new(display: D) -> Self {
        Self {
            processor: Processor::new(),
            display,
            program: None,
            state: MachineState::Idle,
        }
    }

    pub fn state(&self) -> MachineState {
        self.state
    }

    pub fn processor(&self) -> &Processor {
        &self.processor
    }

    /// Validate and retain a program image, then apply it to a pristine
    /// processor. A fresh copy is re-applied on every subsequent
    /// [`Machine::run`] and [`Machine::reset`], so a self-modifying program
    /// always starts over from the original image.
    ///
    /// On error the machine is left unchanged.
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), MachineError> {
        if program.len() > Processor::MAX_PROGRAM_LEN {
            return Err(ProgramTooLargeError {
                program_len: program.len(),
            }
            .into());
        }

        self.program = Some(program.to_vec());
        debug!(program_len = program.len(), "program image loaded");
        self.reset()
    }

    /// Clear all processor state, re-install the font, re-apply the retained
    /// program image (if any) and blank the presentation surface.
    pub fn reset(&mut self) -> Result<(), MachineError> {
        self.processor.reset();
        self.display.clear();
        self.state = match &self.program {
            Some(program) => {
                self.processor.load_program(program)?;
                MachineState::Ready
            }
            None => MachineState::Idle,
        };
        Ok(())
    }

    /// Start executing the loaded program from a pristine copy of its image.
    ///
    /// Fails with [`MachineError::NoProgramLoaded`] when no image was ever
    /// loaded; the machine is left unchanged in that case.
    pub fn run(&mut self) -> Result<(), MachineError> {
        if self.program.is_none() {
            return Err(MachineError::NoProgramLoaded);
        }

        self.reset()?;
        self.state = MachineState::Running;
        debug!("machine running");
        Ok(())
    }

    /// Freeze execution after the last completed cycle.
    pub fn pause(&mut self) -> Result<(), MachineError> {
        if self.state != MachineState::Running {
            return Err(MachineError::InvalidStateTransition {
                state: self.state,
                operation: "pause",
            });
        }
        self.state = MachineState::Paused;
        debug!("machine paused");
        Ok(())
    }

    /// Continue execution exactly where [`Machine::pause`] froze it.
    pub fn resume(&mut self) -> Result<(), MachineError> {
        if self.state != MachineState::Paused {
            return Err(MachineError::InvalidStateTransition {
                state: self.state,
                operation: "resume",
            });
        }
        self.state = MachineState::Running;
        debug!("machine resumed");
        Ok(())
    }

    /// Stop driving cycles. All state is maintained as it is for inspection;
    /// a subsequent [`Machine::run`] starts over from a fresh image.
    pub fn stop(&mut self) -> Result<(), MachineError> {
        match self.state {
            MachineState::Running | MachineState::Paused => {
                self.state = MachineState::Ready;
                debug!("machine stopped");
                Ok(())
            }
            state => Err(MachineError::InvalidStateTransition {
                state,
                operation: "stop",
            }),
        }
    }

    /// Drive one interpreter cycle and present the display buffer if the
    /// cycle changed it.
    pub fn step_cycle(&mut self) -> Result<(), MachineError> {
        if self.state != MachineState::Running {
            return Err(MachineError::InvalidStateTransition {
                state: self.state,
                operation: "step_cycle",
            });
        }

        let screen_effect = self.processor.step()?;
        self.present(screen_effect);
        Ok(())
    }

    /// Execute a raw instruction word against the current state, bypassing
    /// the fetch and the timers. Valid in every machine state.
    ///
    /// This is the debug entry used for opcode-level testing independent of
    /// a loaded program.
    pub fn inject(&mut self, word: u16) -> Result<(), MachineError> {
        let screen_effect = self.processor.execute_word(word)?;
        self.present(screen_effect);
        Ok(())
    }

    /// Forward a host input event to the keypad.
    pub fn set_key_state(&mut self, key: Key, state: KeyState) {
        self.processor.set_key_state(key, state);
    }

    fn present(&mut self, screen_effect: ScreenEffect) {
        match screen_effect {
            ScreenEffect::Drawn => self.display.render(self.processor.screen()),
            ScreenEffect::Cleared => self.display.clear(),
            ScreenEffect::Unchanged => (),
        }
    }
}
