use num_enum::{IntoPrimitive, TryFromPrimitive, UnsafeFromPrimitive};
use static_assertions::const_assert;

use crate::nibble_ints::{U4, U8Nibble};

/// The number of general-purpose data registers.
pub const DATA_REGISTER_COUNT: usize = 16;

/// Data register of the CHIP-8 processor.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    TryFromPrimitive,
    IntoPrimitive,
    UnsafeFromPrimitive,
)]
#[repr(u8)]
pub enum DataRegister {
    /// Used as the offset in [`Instruction::JumpOffset`][`crate::instruction::Instruction::JumpOffset`].
    V0,
    V1,
    V2,
    V3,
    V4,
    V5,
    V6,
    V7,
    V8,
    V9,
    VA,
    VB,
    VC,
    VD,
    VE,
    /// Used for carry/borrow flags, the shifted-out bit after bit shifts
    /// and the collision flag of sprite draws.
    VF,
}

const_assert!(DATA_REGISTER_COUNT == U4::MAX.into_u8() as usize + 1);

impl DataRegister {
    /// Iterate over the registers `V0..=last`, in index order.
    pub fn through(last: Self) -> impl Iterator<Item = Self> {
        // SAFETY: i never exceeds last's discriminant, which is a valid one.
        (0..=last as u8).map(|i| unsafe { Self::from_unchecked(i) })
    }
}

impl From<DataRegister> for U4 {
    fn from(register: DataRegister) -> Self {
        // The discriminant fits in the low nibble,
        // DataRegister has exactly U4::MAX + 1 variants.
        U4::from_u8(register as u8, U8Nibble::Lo)
    }
}

impl From<U4> for DataRegister {
    fn from(val: U4) -> Self {
        // SAFETY: DataRegister has exactly U4::MAX + 1 variants.
        unsafe { DataRegister::from_unchecked(val.into_u8()) }
    }
}
