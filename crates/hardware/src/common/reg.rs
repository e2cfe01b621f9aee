//! Architectural register names.
//!
//! Registers travel on the wire as short strings: `%pc`, `x0`..`x31` and `f0`..`f31`.
//! The register file images them in this same order (`%pc` first) when a snapshot is
//! taken, so `slot` doubles as the snapshot layout.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Number of integer (and floating-point) registers.
pub const NUM_REGS: u8 = 32;

/// Total number of named registers: `%pc` plus 32 integer and 32 FP registers.
pub const NUM_SLOTS: usize = 1 + 2 * NUM_REGS as usize;

/// A named architectural register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum RegName {
    /// Program counter of the next instruction to retire.
    Pc,
    /// Integer register `xN`.
    X(u8),
    /// Floating-point register `fN`.
    F(u8),
}

impl RegName {
    /// Position of this register in the snapshot image.
    pub const fn slot(self) -> usize {
        match self {
            Self::Pc => 0,
            Self::X(n) => 1 + n as usize,
            Self::F(n) => 1 + NUM_REGS as usize + n as usize,
        }
    }

    /// Inverse of [`RegName::slot`].
    pub const fn from_slot(slot: usize) -> Option<Self> {
        let n = NUM_REGS as usize;
        if slot == 0 {
            Some(Self::Pc)
        } else if slot <= n {
            Some(Self::X((slot - 1) as u8))
        } else if slot < NUM_SLOTS {
            Some(Self::F((slot - 1 - n) as u8))
        } else {
            None
        }
    }

    /// Every register, in snapshot order.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..NUM_SLOTS).filter_map(Self::from_slot)
    }
}

impl fmt::Display for RegName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pc => write!(f, "%pc"),
            Self::X(n) => write!(f, "x{n}"),
            Self::F(n) => write!(f, "f{n}"),
        }
    }
}

impl FromStr for RegName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "%pc" {
            return Ok(Self::Pc);
        }
        let (kind, num) = s.split_at(s.len().min(1));
        let n: u8 = num.parse().map_err(|_| format!("bad register name '{s}'"))?;
        if n >= NUM_REGS {
            return Err(format!("register index out of range in '{s}'"));
        }
        match kind {
            "x" => Ok(Self::X(n)),
            "f" => Ok(Self::F(n)),
            _ => Err(format!("bad register name '{s}'")),
        }
    }
}

impl From<RegName> for String {
    fn from(r: RegName) -> Self {
        r.to_string()
    }
}

impl TryFrom<String> for RegName {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
