use std::convert::TryFrom;

use thiserror::Error;

use crate::{
    nibble_ints::{U12, U4, U8Nibble},
    processor::DataRegister,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized instruction word `{0:02X?}`")]
pub struct UnknownInstructionError(pub [u8; 2]);

/// A CHIP-8 instruction.
///
/// References used are
/// <https://github.com/mattmikolay/chip-8/wiki/CHIP%E2%80%908-Instruction-Set> (CC-BY-SA 4.0, Matthew Mikolay)
/// and <https://en.wikipedia.org/wiki/CHIP-8#Opcode_table> (CC-BY-SA 3.0, Wikipedia Authors).
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Instruction {
    /// Clear the display.
    ClearDisplay,
    /// Return from a subroutine.
    Return,
    /// Call the machine routine at `target_address`.
    ///
    /// No native machine routines exist to call; this is executed as a plain
    /// jump for compatibility with programs that still emit it.
    CallMachineRoutine { target_address: U12 },
    /// Jump to the `target_address`.
    Jump { target_address: U12 },
    /// Call the subroutine at the `target_address`.
    CallSubroutine { target_address: U12 },
    /// Skip the next instruction if the value in `register`
    /// is equal to `constant`.
    SkipIfEqConst { register: DataRegister, constant: u8 },
    /// Skip the next instruction if the value in `register`
    /// is not equal to `constant`.
    SkipIfNeqConst { register: DataRegister, constant: u8 },
    /// Skip the next instruction if the value in `register1`
    /// is equal to the value in `register2`.
    SkipIfEq {
        register1: DataRegister,
        register2: DataRegister,
    },
    /// Assign `constant` to `target_register`.
    AssignConst {
        target_register: DataRegister,
        constant: u8,
    },
    /// Add `constant` to the value in `target_register`
    /// and assign the result to `target_register`, wrapping at 8 bits.
    ///
    /// [`DataRegister::VF`] is not altered.
    AddAssignConst {
        target_register: DataRegister,
        constant: u8,
    },
    /// Assign the value in `source_register` to `target_register`.
    Assign {
        target_register: DataRegister,
        source_register: DataRegister,
    },
    /// Bitwise-OR the values in `target_register` and `source_register`
    /// and assign the result to `target_register`.
    OrAssign {
        target_register: DataRegister,
        source_register: DataRegister,
    },
    /// Bitwise-AND the values in `target_register` and `source_register`
    /// and assign the result to `target_register`.
    AndAssign {
        target_register: DataRegister,
        source_register: DataRegister,
    },
    /// Bitwise-XOR the values in `target_register` and `source_register`
    /// and assign the result to `target_register`.
    XorAssign {
        target_register: DataRegister,
        source_register: DataRegister,
    },
    /// Add the value in `source_register` to the value in `target_register`
    /// and assign the result to `target_register`.
    ///
    /// If a carry occurs [`DataRegister::VF`] is set to `1`,
    /// if not it is set to `0`.
    AddAssign {
        target_register: DataRegister,
        source_register: DataRegister,
    },
    /// Subtract the value in `source_register`
    /// from the value in `target_register`
    /// and assign the result to `target_register`.
    ///
    /// If a borrow occurs [`DataRegister::VF`] is set to `0`,
    /// if not it is set to `1`.
    SubAssign {
        target_register: DataRegister,
        source_register: DataRegister,
    },
    /// Shift the value in `target_register` one bit to the right, in place.
    ///
    /// [`DataRegister::VF`] is set to the least significant bit prior to the
    /// shift, i.e. the bit that is shifted out. The legacy source-register
    /// nibble of the encoding is ignored and emitted as zero.
    ShrAssign { target_register: DataRegister },
    /// Subtract the value in `target_register`
    /// from the value in `source_register`
    /// and assign the result to `target_register`.
    ///
    /// If a borrow occurs [`DataRegister::VF`] is set to `0`,
    /// if not it is set to `1`.
    RevSubAssign {
        target_register: DataRegister,
        source_register: DataRegister,
    },
    /// Shift the value in `target_register` one bit to the left, in place.
    ///
    /// [`DataRegister::VF`] is set to the most significant bit prior to the
    /// shift, i.e. the bit that is shifted out. The legacy source-register
    /// nibble of the encoding is ignored and emitted as zero.
    ShlAssign { target_register: DataRegister },
    /// Skip the next instruction if the value in `register1`
    /// is not equal to the value in `register2`.
    SkipIfNeq {
        register1: DataRegister,
        register2: DataRegister,
    },
    /// Assign `address` to the special address register `I`.
    AssignAddrToI { address: U12 },
    /// Jump to the sum of `address` and the value in [`DataRegister::V0`].
    JumpOffset { address: U12 },
    /// Assign a random byte bitwise-ANDed with `mask` to `target_register`.
    AssignRandomMasked {
        target_register: DataRegister,
        mask: u8,
    },
    /// Draw a sprite of `sprite_height` rows at the position given by the
    /// values in `position_x_register` and `position_y_register`.
    /// The sprite data is read from the address stored in the special address
    /// register `I`, one byte per row.
    ///
    /// A `sprite_height` of zero draws nothing.
    DrawSprite {
        position_x_register: DataRegister,
        position_y_register: DataRegister,
        sprite_height: U4,
    },
    /// Skip the next instruction if the key corresponding
    /// to the value set in `key_register` is pressed.
    SkipIfKeyPressed { key_register: DataRegister },
    /// Skip the next instruction if the key corresponding
    /// to the value set in `key_register` is not pressed.
    SkipIfKeyNotPressed { key_register: DataRegister },
    /// Assign the current value of the delay timer to `target_register`.
    AssignDelayTimerVal { target_register: DataRegister },
    /// Wait until a key is pressed and store the value
    /// corresponding to the key in `target_register`.
    WaitForKeyPress { target_register: DataRegister },
    /// Set the value of the delay timer to the value in `source_register`.
    SetDelayTimer { source_register: DataRegister },
    /// Set the value of the sound timer to the value in `source_register`.
    SetSoundTimer { source_register: DataRegister },
    /// Add the value in `source_register` to the value
    /// in the special address register `I` and store the result in `I`,
    /// wrapping at 16 bits.
    ///
    /// [`DataRegister::VF`] is not altered.
    AddAssignI { source_register: DataRegister },
    /// Assign the address of the builtin font sprite for the hexadecimal
    /// digit in `digit_register` to the special address register `I`.
    /// See [`FONT_SPRITES`][`crate::font::FONT_SPRITES`].
    ///
    /// For any value of `digit_register` that is greater than `0xF`
    /// a runtime error will be emitted.
    AssignFontSpriteAddrToI { digit_register: DataRegister },
    /// Store the three digit binary-coded decimal equivalent
    /// of the value in `source_register`
    /// in the three consecutive bytes of memory
    /// beginning at the address in the special address register `I`.
    /// The digits are stored in order of significance,
    /// i.e. the digit for hundreds is stored at the address in `I`.
    StoreBCD { source_register: DataRegister },
    /// Store the values of registers [`DataRegister::V0`] to `last_register`
    /// in consecutive bytes of memory
    /// beginning at the address in the special address register `I`.
    ///
    /// The special address register `I` is not altered.
    StoreRegisterValues { last_register: DataRegister },
    /// Load the values of consecutive bytes of memory
    /// beginning at the address in the special address register `I`
    /// into the registers [`DataRegister::V0`] to `last_register`.
    ///
    /// The special address register `I` is not altered.
    LoadRegisterValues { last_register: DataRegister },
}

impl TryFrom<[u8; 2]> for Instruction {
    type Error = UnknownInstructionError;

    fn try_from(bytes: [u8; 2]) -> Result<Self, Self::Error> {
        let class = U4::from_u8(bytes[0], U8Nibble::Hi).into_u8();
        let low_nibble = U4::from_u8(bytes[1], U8Nibble::Lo).into_u8();

        let x = DataRegister::from(U4::from_u8(bytes[0], U8Nibble::Lo));
        let y = DataRegister::from(U4::from_u8(bytes[1], U8Nibble::Hi));
        let constant = bytes[1];
        let address = U12::from_instruction_bytes(bytes);

        Ok(match class {
            0x0 => match bytes {
                [0x00, 0xE0] => Self::ClearDisplay,
                [0x00, 0xEE] => Self::Return,
                _ => Self::CallMachineRoutine {
                    target_address: address,
                },
            },
            0x1 => Self::Jump {
                target_address: address,
            },
            0x2 => Self::CallSubroutine {
                target_address: address,
            },
            0x3 => Self::SkipIfEqConst {
                register: x,
                constant,
            },
            0x4 => Self::SkipIfNeqConst {
                register: x,
                constant,
            },
            0x5 if low_nibble == 0x0 => Self::SkipIfEq {
                register1: x,
                register2: y,
            },
            0x6 => Self::AssignConst {
                target_register: x,
                constant,
            },
            0x7 => Self::AddAssignConst {
                target_register: x,
                constant,
            },
            0x8 => match low_nibble {
                0x0 => Self::Assign {
                    target_register: x,
                    source_register: y,
                },
                0x1 => Self::OrAssign {
                    target_register: x,
                    source_register: y,
                },
                0x2 => Self::AndAssign {
                    target_register: x,
                    source_register: y,
                },
                0x3 => Self::XorAssign {
                    target_register: x,
                    source_register: y,
                },
                0x4 => Self::AddAssign {
                    target_register: x,
                    source_register: y,
                },
                0x5 => Self::SubAssign {
                    target_register: x,
                    source_register: y,
                },
                0x6 => Self::ShrAssign { target_register: x },
                0x7 => Self::RevSubAssign {
                    target_register: x,
                    source_register: y,
                },
                0xE => Self::ShlAssign { target_register: x },
                _ => return Err(UnknownInstructionError(bytes)),
            },
            0x9 if low_nibble == 0x0 => Self::SkipIfNeq {
                register1: x,
                register2: y,
            },
            0xA => Self::AssignAddrToI { address },
            0xB => Self::JumpOffset { address },
            0xC => Self::AssignRandomMasked {
                target_register: x,
                mask: constant,
            },
            0xD => Self::DrawSprite {
                position_x_register: x,
                position_y_register: y,
                sprite_height: U4::from_u8(bytes[1], U8Nibble::Lo),
            },
            0xE => match bytes[1] {
                0x9E => Self::SkipIfKeyPressed { key_register: x },
                0xA1 => Self::SkipIfKeyNotPressed { key_register: x },
                _ => return Err(UnknownInstructionError(bytes)),
            },
            0xF => match bytes[1] {
                0x07 => Self::AssignDelayTimerVal { target_register: x },
                0x0A => Self::WaitForKeyPress { target_register: x },
                0x15 => Self::SetDelayTimer { source_register: x },
                0x18 => Self::SetSoundTimer { source_register: x },
                0x1E => Self::AddAssignI { source_register: x },
                0x29 => Self::AssignFontSpriteAddrToI { digit_register: x },
                0x33 => Self::StoreBCD { source_register: x },
                0x55 => Self::StoreRegisterValues { last_register: x },
                0x65 => Self::LoadRegisterValues { last_register: x },
                _ => return Err(UnknownInstructionError(bytes)),
            },
            _ => return Err(UnknownInstructionError(bytes)),
        })
    }
}

/// Encode `class`, an address operand.
fn encode_addr(class: u8, address: U12) -> [u8; 2] {
    let address = address.into_u16();
    [class << 4 | (address >> 8) as u8, address as u8]
}

/// Encode `class`, a register operand and a constant byte operand.
fn encode_xkk(class: u8, register: DataRegister, constant: u8) -> [u8; 2] {
    [class << 4 | register as u8, constant]
}

/// Encode `class`, two register operands and a selector nibble.
fn encode_xyn(class: u8, register1: DataRegister, register2: DataRegister, nibble: u8) -> [u8; 2] {
    [
        class << 4 | register1 as u8,
        (register2 as u8) << 4 | nibble,
    ]
}

/// Encode `class`, a register operand and a selector byte.
fn encode_xnn(class: u8, register: DataRegister, low_byte: u8) -> [u8; 2] {
    [class << 4 | register as u8, low_byte]
}

impl From<Instruction> for [u8; 2] {
    fn from(instruction: Instruction) -> Self {
        use DataRegister::V0;
        use Instruction::*;

        match instruction {
            ClearDisplay => [0x00, 0xE0],
            Return => [0x00, 0xEE],
            CallMachineRoutine { target_address } => encode_addr(0x0, target_address),
            Jump { target_address } => encode_addr(0x1, target_address),
            CallSubroutine { target_address } => encode_addr(0x2, target_address),
            SkipIfEqConst { register, constant } => encode_xkk(0x3, register, constant),
            SkipIfNeqConst { register, constant } => encode_xkk(0x4, register, constant),
            SkipIfEq {
                register1,
                register2,
            } => encode_xyn(0x5, register1, register2, 0x0),
            AssignConst {
                target_register,
                constant,
            } => encode_xkk(0x6, target_register, constant),
            AddAssignConst {
                target_register,
                constant,
            } => encode_xkk(0x7, target_register, constant),
            Assign {
                target_register,
                source_register,
            } => encode_xyn(0x8, target_register, source_register, 0x0),
            OrAssign {
                target_register,
                source_register,
            } => encode_xyn(0x8, target_register, source_register, 0x1),
            AndAssign {
                target_register,
                source_register,
            } => encode_xyn(0x8, target_register, source_register, 0x2),
            XorAssign {
                target_register,
                source_register,
            } => encode_xyn(0x8, target_register, source_register, 0x3),
            AddAssign {
                target_register,
                source_register,
            } => encode_xyn(0x8, target_register, source_register, 0x4),
            SubAssign {
                target_register,
                source_register,
            } => encode_xyn(0x8, target_register, source_register, 0x5),
            ShrAssign { target_register } => encode_xyn(0x8, target_register, V0, 0x6),
            RevSubAssign {
                target_register,
                source_register,
            } => encode_xyn(0x8, target_register, source_register, 0x7),
            ShlAssign { target_register } => encode_xyn(0x8, target_register, V0, 0xE),
            SkipIfNeq {
                register1,
                register2,
            } => encode_xyn(0x9, register1, register2, 0x0),
            AssignAddrToI { address } => encode_addr(0xA, address),
            JumpOffset { address } => encode_addr(0xB, address),
            AssignRandomMasked {
                target_register,
                mask,
            } => encode_xkk(0xC, target_register, mask),
            DrawSprite {
                position_x_register,
                position_y_register,
                sprite_height,
            } => encode_xyn(
                0xD,
                position_x_register,
                position_y_register,
                sprite_height.into_u8(),
            ),
            SkipIfKeyPressed { key_register } => encode_xnn(0xE, key_register, 0x9E),
            SkipIfKeyNotPressed { key_register } => encode_xnn(0xE, key_register, 0xA1),
            AssignDelayTimerVal { target_register } => encode_xnn(0xF, target_register, 0x07),
            WaitForKeyPress { target_register } => encode_xnn(0xF, target_register, 0x0A),
            SetDelayTimer { source_register } => encode_xnn(0xF, source_register, 0x15),
            SetSoundTimer { source_register } => encode_xnn(0xF, source_register, 0x18),
            AddAssignI { source_register } => encode_xnn(0xF, source_register, 0x1E),
            AssignFontSpriteAddrToI { digit_register } => encode_xnn(0xF, digit_register, 0x29),
            StoreBCD { source_register } => encode_xnn(0xF, source_register, 0x33),
            StoreRegisterValues { last_register } => encode_xnn(0xF, last_register, 0x55),
            LoadRegisterValues { last_register } => encode_xnn(0xF, last_register, 0x65),
        }
    }
}
