use std::convert::TryFrom;

use rand::random;
use thiserror::Error;
use tracing::warn;

use crate::{
    font::{FONT_BASE_ADDRESS, FONT_SPRITES, FONT_SPRITE_HEIGHT},
    instruction::Instruction,
    screen::Screen,
};

mod call_stack;
mod data_register;
mod key;

pub use call_stack::{CallStack, CallStackCapacityExceededError};
pub use data_register::{DataRegister, DATA_REGISTER_COUNT};
pub use key::{Key, KeyState, Keypad, KEY_COUNT};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessorError {
    #[error("an out of bounds memory access was requested at {program_counter:X}")]
    OutOfBoundsMemoryAccess { program_counter: u16 },
    #[error("the call at {program_counter:X} exceeds the 16-slot call stack")]
    CallStackOverflow { program_counter: u16 },
    #[error("return was requested at {program_counter:X} with an empty call stack")]
    CallStackUnderflow { program_counter: u16 },
    #[error("the font sprite address was requested for a non-hex-digit (greater than 0xF) value {requested_digit:X} at {program_counter:X}")]
    NotAHexDigit {
        program_counter: u16,
        requested_digit: u8,
    },
    #[error("a key with an invalid (greater than 0xF) key id {requested_key_id:X} was referenced at {program_counter:X}")]
    NotAValidKey {
        program_counter: u16,
        requested_key_id: u8,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "a program with a length ({program_len}) greater than the {} usable bytes of memory was supplied",
    Processor::MAX_PROGRAM_LEN
)]
pub struct ProgramTooLargeError {
    pub program_len: usize,
}

/// Effect of one interpreter cycle on the display buffer,
/// so drivers know when to re-present it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenEffect {
    Unchanged,
    Drawn,
    Cleared,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Processor {
    data_registers: [u8; DATA_REGISTER_COUNT],
    address_register: u16,
    memory: [u8; Self::MEMORY_LEN],
    program_counter: u16,
    call_stack: CallStack,
    delay_timer: u8,
    sound_timer: u8,
    screen: Screen,
    keypad: Keypad,
}

impl Processor {
    /// The length of the 4KiB address space.
    pub const MEMORY_LEN: usize = 0x1000;

    /// The highest valid memory address.
    ///
    /// The special address register `I` can hold larger values, but every
    /// instruction that reads or writes memory through it will cause a
    /// runtime error when any touched address exceeds this.
    pub const MAX_ADDRESS: u16 = 0x0FFF;

    /// The address program images are loaded at and execution starts from.
    pub const PROGRAM_START_ADDRESS: u16 = 0x200;

    /// The largest program image that fits between
    /// [`Self::PROGRAM_START_ADDRESS`] and the end of memory.
    pub const MAX_PROGRAM_LEN: usize = Self::MEMORY_LEN - Self::PROGRAM_START_ADDRESS as usize;

    pub fn new() -> Self {
        let mut processor = Self {
            data_registers: [0; DATA_REGISTER_COUNT],
            address_register: 0,
            memory: [0; Self::MEMORY_LEN],
            program_counter: Self::PROGRAM_START_ADDRESS,
            call_stack: CallStack::new(),
            delay_timer: 0,
            sound_timer: 0,
            screen: Screen::default(),
            keypad: Keypad::default(),
        };
        processor.install_font();
        processor
    }

    fn install_font(&mut self) {
        let base = FONT_BASE_ADDRESS as usize;
        self.memory[base..base + FONT_SPRITES.len()].copy_from_slice(&FONT_SPRITES);
    }

    /// Zero memory, registers, timers and the call stack, re-install the
    /// builtin font sprites, clear the display buffer and move the program
    /// counter back to [`Self::PROGRAM_START_ADDRESS`].
    ///
    /// Key states are host-owned and survive a reset.
    pub fn reset(&mut self) {
        let keypad = self.keypad;
        *self = Self::new();
        self.keypad = keypad;
    }

    /// Copy a program image into memory, starting at
    /// [`Self::PROGRAM_START_ADDRESS`].
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), ProgramTooLargeError> {
        if program.len() > Self::MAX_PROGRAM_LEN {
            return Err(ProgramTooLargeError {
                program_len: program.len(),
            });
        }

        let start = Self::PROGRAM_START_ADDRESS as usize;
        self.memory[start..start + program.len()].copy_from_slice(program);

        Ok(())
    }

    /// Get the value of a data register.
    pub const fn get_register(&self, register: DataRegister) -> u8 {
        self.data_registers[register as u8 as usize]
    }

    /// Set the value of a data register.
    fn set_register(&mut self, register: DataRegister, val: u8) {
        self.data_registers[register as u8 as usize] = val;
    }

    pub const fn screen(&self) -> &Screen {
        &self.screen
    }

    pub const fn program_counter(&self) -> u16 {
        self.program_counter
    }

    /// Read-only view of the whole address space, for hosts and debuggers.
    pub const fn memory(&self) -> &[u8; Self::MEMORY_LEN] {
        &self.memory
    }

    /// Get the state of a key.
    pub const fn get_key_state(&self, key: Key) -> KeyState {
        self.keypad.get(key)
    }

    /// Set the state of a key. Called by the host on input events.
    pub fn set_key_state(&mut self, key: Key, state: KeyState) {
        self.keypad.set(key, state);
    }

    /// Return decimal digits of a u8 value.
    /// The hundreds digit is the first element in the array,
    /// followed by the tens and single digits.
    ///
    /// 3 digits are always enough, since the maximum value of a u8 is 255.
    fn decimal_digits_of_u8(num: u8) -> [u8; 3] {
        [num / 100, num / 10 % 10, num % 10]
    }

    /// Perform one interpreter cycle: fetch and execute the instruction at
    /// the program counter, advance the program counter unless the
    /// instruction set it itself, then tick both timers toward zero.
    ///
    /// Unrecognized instruction words are logged and skipped; contract
    /// violations abort the cycle with an error and leave the remaining
    /// state untouched.
    pub fn step(&mut self) -> Result<ScreenEffect, ProcessorError> {
        if self.program_counter >= Self::MAX_ADDRESS {
            return Err(ProcessorError::OutOfBoundsMemoryAccess {
                program_counter: self.program_counter,
            });
        }
        let instruction_bytes = [
            self.memory[self.program_counter as usize],
            self.memory[self.program_counter as usize + 1],
        ];

        let screen_effect = match Instruction::try_from(instruction_bytes) {
            Ok(instruction) => self.execute(instruction)?,
            Err(error) => {
                // Malformed words must not take down an otherwise valid program.
                warn!(
                    %error,
                    program_counter = self.program_counter,
                    "skipping unrecognized instruction word"
                );
                self.program_counter = self.program_counter.wrapping_add(2);
                ScreenEffect::Unchanged
            }
        };

        if self.delay_timer > 0 {
            self.delay_timer -= 1;
        }
        if self.sound_timer > 0 {
            self.sound_timer -= 1;
        }

        Ok(screen_effect)
    }

    /// Decode and execute a raw instruction word against the current state,
    /// bypassing the fetch. Program counter advancement follows the same
    /// rules as for a fetched instruction; the timers do not tick.
    ///
    /// This is the debug entry used for opcode-level testing independent of
    /// a loaded program.
    pub fn execute_word(&mut self, word: u16) -> Result<ScreenEffect, ProcessorError> {
        match Instruction::try_from(word.to_be_bytes()) {
            Ok(instruction) => self.execute(instruction),
            Err(error) => {
                warn!(%error, "skipping unrecognized instruction word");
                self.program_counter = self.program_counter.wrapping_add(2);
                Ok(ScreenEffect::Unchanged)
            }
        }
    }

    fn execute(&mut self, instruction: Instruction) -> Result<ScreenEffect, ProcessorError> {
        let mut was_control_flow_instr = false;
        let mut screen_effect = ScreenEffect::Unchanged;

        match instruction {
            Instruction::ClearDisplay => {
                self.screen.clear();
                screen_effect = ScreenEffect::Cleared;
            }
            Instruction::Return => {
                self.program_counter =
                    self.call_stack
                        .pop()
                        .ok_or(ProcessorError::CallStackUnderflow {
                            program_counter: self.program_counter,
                        })?;

                was_control_flow_instr = true;
            }
            Instruction::CallMachineRoutine { target_address } => {
                // There are no native machine routines to run;
                // executed as a plain jump for compatibility.
                self.program_counter = target_address.into_u16();

                was_control_flow_instr = true;
            }
            Instruction::Jump { target_address } => {
                self.program_counter = target_address.into_u16();

                was_control_flow_instr = true;
            }
            Instruction::CallSubroutine { target_address } => {
                // The pushed return address is the instruction after the
                // call, where execution resumes on return.
                self.call_stack
                    .push(self.program_counter.wrapping_add(2))
                    .map_err(|_| ProcessorError::CallStackOverflow {
                        program_counter: self.program_counter,
                    })?;
                self.program_counter = target_address.into_u16();

                was_control_flow_instr = true;
            }
            Instruction::SkipIfEqConst { register, constant } => {
                if self.get_register(register) == constant {
                    self.program_counter = self.program_counter.wrapping_add(4);

                    was_control_flow_instr = true;
                }
            }
            Instruction::SkipIfNeqConst { register, constant } => {
                if self.get_register(register) != constant {
                    self.program_counter = self.program_counter.wrapping_add(4);

                    was_control_flow_instr = true;
                }
            }
            Instruction::SkipIfEq {
                register1,
                register2,
            } => {
                if self.get_register(register1) == self.get_register(register2) {
                    self.program_counter = self.program_counter.wrapping_add(4);

                    was_control_flow_instr = true;
                }
            }
            Instruction::AssignConst {
                target_register,
                constant,
            } => self.set_register(target_register, constant),
            Instruction::AddAssignConst {
                target_register,
                constant,
            } => self.set_register(
                target_register,
                self.get_register(target_register).wrapping_add(constant),
            ),
            Instruction::Assign {
                target_register,
                source_register,
            } => self.set_register(target_register, self.get_register(source_register)),
            Instruction::OrAssign {
                target_register,
                source_register,
            } => self.set_register(
                target_register,
                self.get_register(target_register) | self.get_register(source_register),
            ),
            Instruction::AndAssign {
                target_register,
                source_register,
            } => self.set_register(
                target_register,
                self.get_register(target_register) & self.get_register(source_register),
            ),
            Instruction::XorAssign {
                target_register,
                source_register,
            } => self.set_register(
                target_register,
                self.get_register(target_register) ^ self.get_register(source_register),
            ),
            Instruction::AddAssign {
                target_register,
                source_register,
            } => {
                let (res, carry) = self
                    .get_register(target_register)
                    .overflowing_add(self.get_register(source_register));
                self.set_register(DataRegister::VF, carry as u8);
                self.set_register(target_register, res);
            }
            Instruction::SubAssign {
                target_register,
                source_register,
            } => {
                let (res, borrow) = self
                    .get_register(target_register)
                    .overflowing_sub(self.get_register(source_register));
                self.set_register(DataRegister::VF, 1 - borrow as u8);
                self.set_register(target_register, res);
            }
            Instruction::ShrAssign { target_register } => {
                let val = self.get_register(target_register);
                self.set_register(DataRegister::VF, val & 0b1);
                self.set_register(target_register, val >> 1);
            }
            Instruction::RevSubAssign {
                target_register,
                source_register,
            } => {
                let (res, borrow) = self
                    .get_register(source_register)
                    .overflowing_sub(self.get_register(target_register));
                self.set_register(DataRegister::VF, 1 - borrow as u8);
                self.set_register(target_register, res);
            }
            Instruction::ShlAssign { target_register } => {
                let val = self.get_register(target_register);
                self.set_register(DataRegister::VF, (val >> 7) & 0b1);
                self.set_register(target_register, val << 1);
            }
            Instruction::SkipIfNeq {
                register1,
                register2,
            } => {
                if self.get_register(register1) != self.get_register(register2) {
                    self.program_counter = self.program_counter.wrapping_add(4);

                    was_control_flow_instr = true;
                }
            }
            Instruction::AssignAddrToI { address } => self.address_register = address.into_u16(),
            Instruction::JumpOffset { address } => {
                self.program_counter = address
                    .into_u16()
                    .wrapping_add(self.get_register(DataRegister::V0) as u16);

                was_control_flow_instr = true;
            }
            Instruction::AssignRandomMasked {
                target_register,
                mask,
            } => self.set_register(target_register, random::<u8>() & mask),
            Instruction::DrawSprite {
                position_x_register,
                position_y_register,
                sprite_height,
            } => {
                let height = sprite_height.into_usize();
                if height > 0 {
                    let start = self.address_register as usize;
                    let end = start + height - 1;
                    if end > Self::MAX_ADDRESS as usize {
                        return Err(ProcessorError::OutOfBoundsMemoryAccess {
                            program_counter: self.program_counter,
                        });
                    }

                    let x = self.get_register(position_x_register);
                    let y = self.get_register(position_y_register);
                    let collision = self.screen.draw_sprite(x, y, &self.memory[start..=end]);
                    self.set_register(DataRegister::VF, collision as u8);
                } else {
                    // Nothing to blit, but the collision flag is still primed.
                    self.set_register(DataRegister::VF, 0);
                }
                screen_effect = ScreenEffect::Drawn;
            }
            Instruction::SkipIfKeyPressed { key_register } => {
                let key_id = self.get_register(key_register);
                let key = Key::try_from(key_id).map_err(|_| ProcessorError::NotAValidKey {
                    program_counter: self.program_counter,
                    requested_key_id: key_id,
                })?;

                if self.keypad.is_down(key) {
                    self.program_counter = self.program_counter.wrapping_add(4);

                    was_control_flow_instr = true;
                }
            }
            Instruction::SkipIfKeyNotPressed { key_register } => {
                let key_id = self.get_register(key_register);
                let key = Key::try_from(key_id).map_err(|_| ProcessorError::NotAValidKey {
                    program_counter: self.program_counter,
                    requested_key_id: key_id,
                })?;

                if !self.keypad.is_down(key) {
                    self.program_counter = self.program_counter.wrapping_add(4);

                    was_control_flow_instr = true;
                }
            }
            Instruction::AssignDelayTimerVal { target_register } => {
                self.set_register(target_register, self.delay_timer)
            }
            Instruction::WaitForKeyPress { target_register } => match self.keypad.first_pressed() {
                Some(key) => {
                    self.set_register(target_register, key as u8);
                    // Drop the latched key so the wait does not immediately
                    // re-trigger on the next scan.
                    self.keypad.release_all();
                }
                None => {
                    // Suppress the advance so this exact instruction is
                    // fetched again on the next cycle.
                    was_control_flow_instr = true;
                }
            },
            Instruction::SetDelayTimer { source_register } => {
                self.delay_timer = self.get_register(source_register)
            }
            Instruction::SetSoundTimer { source_register } => {
                self.sound_timer = self.get_register(source_register)
            }
            Instruction::AddAssignI { source_register } => {
                self.address_register = self
                    .address_register
                    .wrapping_add(self.get_register(source_register) as u16)
            }
            Instruction::AssignFontSpriteAddrToI { digit_register } => {
                let digit = self.get_register(digit_register);
                if digit > 0xF {
                    return Err(ProcessorError::NotAHexDigit {
                        program_counter: self.program_counter,
                        requested_digit: digit,
                    });
                }
                self.address_register =
                    FONT_BASE_ADDRESS + digit as u16 * FONT_SPRITE_HEIGHT as u16;
            }
            Instruction::StoreBCD { source_register } => {
                let start = self.address_register as usize;
                if start + 2 > Self::MAX_ADDRESS as usize {
                    return Err(ProcessorError::OutOfBoundsMemoryAccess {
                        program_counter: self.program_counter,
                    });
                }

                let val = self.get_register(source_register);
                self.memory[start..=start + 2]
                    .copy_from_slice(&Self::decimal_digits_of_u8(val));
            }
            Instruction::StoreRegisterValues { last_register } => {
                let start = self.address_register as usize;
                if start + last_register as u8 as usize > Self::MAX_ADDRESS as usize {
                    return Err(ProcessorError::OutOfBoundsMemoryAccess {
                        program_counter: self.program_counter,
                    });
                }
                for register in DataRegister::through(last_register) {
                    self.memory[start + register as u8 as usize] = self.get_register(register);
                }
                // The address register is left untouched.
            }
            Instruction::LoadRegisterValues { last_register } => {
                let start = self.address_register as usize;
                if start + last_register as u8 as usize > Self::MAX_ADDRESS as usize {
                    return Err(ProcessorError::OutOfBoundsMemoryAccess {
                        program_counter: self.program_counter,
                    });
                }
                for register in DataRegister::through(last_register) {
                    self.set_register(register, self.memory[start + register as u8 as usize]);
                }
                // The address register is left untouched.
            }
        }

        if !was_control_flow_instr {
            self.program_counter = self.program_counter.wrapping_add(2);
        }

        Ok(screen_effect)
    }
}

impl Default for Processor {
    fn default() -> Self {
        Self::new()
    }
}
