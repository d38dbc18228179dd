/// Number of general-purpose registers addressable by the 2-bit field.
pub const GENERAL_REGISTER_COUNT: usize = 4;
/// `F` bit for zero result.
pub const FLAG_Z: u8 = 1 << 0;
/// `F` bit for negative result (bit 7 of the result).
pub const FLAG_N: u8 = 1 << 1;
/// `F` bit for carry out / borrow.
pub const FLAG_C: u8 = 1 << 2;
/// `F` bit for signed overflow.
pub const FLAG_V: u8 = 1 << 3;
/// Mask of architecturally active `F` bits.
pub const FLAGS_ACTIVE_MASK: u8 = FLAG_Z | FLAG_N | FLAG_C | FLAG_V;

/// General-purpose register selected by a 2-bit instruction field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
#[allow(missing_docs)]
pub enum GeneralRegister {
    B = 0,
    C = 1,
    D = 2,
    A = 3,
}

impl GeneralRegister {
    /// All general-purpose registers in field-encoding order.
    pub const ALL: [Self; GENERAL_REGISTER_COUNT] = [Self::B, Self::C, Self::D, Self::A];

    /// Decodes the low two bits of `bits` into a register.
    #[must_use]
    pub const fn from_u2(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Self::B,
            1 => Self::C,
            2 => Self::D,
            _ => Self::A,
        }
    }

    /// The 2-bit field value.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// The named register this field selects.
    #[must_use]
    pub const fn register(self) -> Register {
        match self {
            Self::A => Register::A,
            Self::B => Register::B,
            Self::C => Register::C,
            Self::D => Register::D,
        }
    }

    /// Assembly name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.register().name()
    }
}

/// Every named register visible to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Register {
    /// Accumulator.
    A,
    /// General purpose.
    B,
    /// General purpose; high byte of the indirect pointer.
    C,
    /// General purpose; low byte of the indirect pointer.
    D,
    /// Status flags.
    F,
    /// Data page selecting a 64 KiB bank of the data region.
    Dp,
    /// Stack pointer into data bank 0.
    Sp,
    /// Program counter into the code region.
    Pc,
}

impl Register {
    /// Every register in host display order.
    pub const ALL: [Self; 8] = [
        Self::A,
        Self::B,
        Self::C,
        Self::D,
        Self::F,
        Self::Dp,
        Self::Sp,
        Self::Pc,
    ];

    /// Canonical upper-case name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
            Self::Dp => "DP",
            Self::Sp => "SP",
            Self::Pc => "PC",
        }
    }

    /// Looks a register up by name, ignoring ASCII case.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|reg| reg.name().eq_ignore_ascii_case(name))
    }

    /// Storage width in bits.
    #[must_use]
    pub const fn width_bits(self) -> u32 {
        match self {
            Self::A | Self::B | Self::C | Self::D | Self::F | Self::Dp => 8,
            Self::Sp => 16,
            Self::Pc => 32,
        }
    }

    /// Value mask for this register's width.
    #[must_use]
    pub const fn mask(self) -> u32 {
        match self.width_bits() {
            8 => 0xFF,
            16 => 0xFFFF,
            _ => u32::MAX,
        }
    }
}

/// The complete register file. Values are stored at their natural width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RegisterFile {
    gpr: [u8; GENERAL_REGISTER_COUNT],
    flags: u8,
    dp: u8,
    sp: u16,
    pc: u32,
}

impl RegisterFile {
    /// Reads any register by name, widened to `u32`.
    #[must_use]
    pub const fn get(&self, reg: Register) -> u32 {
        match reg {
            Register::A => self.gpr[GeneralRegister::A as usize] as u32,
            Register::B => self.gpr[GeneralRegister::B as usize] as u32,
            Register::C => self.gpr[GeneralRegister::C as usize] as u32,
            Register::D => self.gpr[GeneralRegister::D as usize] as u32,
            Register::F => self.flags as u32,
            Register::Dp => self.dp as u32,
            Register::Sp => self.sp as u32,
            Register::Pc => self.pc,
        }
    }

    /// Writes any register by name; `value` is masked to the register width
    /// and `F` keeps only its active bits.
    #[cfg(test)]
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) const fn set(&mut self, reg: Register, value: u32) {
        let value = value & reg.mask();
        match reg {
            Register::A => self.gpr[GeneralRegister::A as usize] = value as u8,
            Register::B => self.gpr[GeneralRegister::B as usize] = value as u8,
            Register::C => self.gpr[GeneralRegister::C as usize] = value as u8,
            Register::D => self.gpr[GeneralRegister::D as usize] = value as u8,
            Register::F => self.flags = value as u8 & FLAGS_ACTIVE_MASK,
            Register::Dp => self.dp = value as u8,
            Register::Sp => self.sp = value as u16,
            Register::Pc => self.pc = value,
        }
    }

    /// Reads a general-purpose register.
    #[must_use]
    pub const fn gpr(&self, reg: GeneralRegister) -> u8 {
        self.gpr[reg as usize]
    }

    pub(crate) const fn set_gpr(&mut self, reg: GeneralRegister, value: u8) {
        self.gpr[reg as usize] = value;
    }

    /// Reads the accumulator.
    #[must_use]
    pub const fn a(&self) -> u8 {
        self.gpr(GeneralRegister::A)
    }

    /// Reads `F`.
    #[must_use]
    pub const fn flags(&self) -> u8 {
        self.flags
    }

    pub(crate) const fn set_flags(&mut self, value: u8) {
        self.flags = value & FLAGS_ACTIVE_MASK;
    }

    /// Returns `true` when a specific flag bit is set.
    #[must_use]
    pub const fn flag_is_set(&self, flag: u8) -> bool {
        (self.flags & flag) != 0
    }

    /// Reads `DP`.
    #[must_use]
    pub const fn dp(&self) -> u8 {
        self.dp
    }

    pub(crate) const fn set_dp(&mut self, value: u8) {
        self.dp = value;
    }

    /// Reads `SP`.
    #[must_use]
    pub const fn sp(&self) -> u16 {
        self.sp
    }

    pub(crate) const fn set_sp(&mut self, value: u16) {
        self.sp = value;
    }

    /// Reads `PC`.
    #[must_use]
    pub const fn pc(&self) -> u32 {
        self.pc
    }

    pub(crate) const fn set_pc(&mut self, value: u32) {
        self.pc = value;
    }
}
