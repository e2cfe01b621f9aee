//! The in-flight instruction record.
//!
//! An [`Instruction`] is created by Decode and travels by value through Issue,
//! the ALU, the LSU and Commit, each stage filling in the fields it owns. It is
//! dropped on retirement or flush.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::opcode::{Extension, Opcode};
use crate::common::constants::SYSCALL_REGS;

/// Memory-ordering handshake between the LSU and Commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confirmation {
    /// Pure ALU result; commits as soon as it is complete.
    #[default]
    NotRequired,
    /// Memory op waiting for Commit to declare it non-speculative.
    Awaiting,
    /// Commit has sent `confirm`; the LSU may perform the access.
    Confirmed,
}

/// Predicted next PC attached by Issue to branches and jumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    /// Address Fetch followed after this instruction.
    pub targetpc: u64,
}

/// Short reference to an in-flight instruction, used by `flush` and `confirm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsnRef {
    /// Instruction id.
    pub iid: u64,
    /// Address.
    pub pc: u64,
    /// Operation.
    pub cmd: Opcode,
}

/// A decoded instruction and everything the pipeline learns about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    /// Operation.
    pub cmd: Opcode,
    /// Address of the first byte.
    pub pc: u64,
    /// Encoded length: 2 or 4.
    pub size: u64,
    /// Raw encoding (the 16-bit parcel for compressed instructions).
    pub word: u32,

    /// First source register.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rs1: Option<u8>,
    /// Second source register.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rs2: Option<u8>,
    /// Destination register.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rd: Option<u8>,
    /// Sign-extended immediate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imm: Option<i64>,
    /// Shift amount of shift-immediate instructions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shamt: Option<u32>,
    /// Access width of loads and stores.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbytes: Option<u64>,

    /// Program-order id assigned at issue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iid: Option<u64>,
    /// Resolved register values, by register number.
    #[serde(default)]
    pub operands: BTreeMap<u8, u64>,
    /// Effective address of a load or store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addr: Option<u64>,
    /// Predicted target of a branch or jump.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction: Option<Prediction>,

    /// Value destined for `rd`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<u64>,
    /// Realized next PC of a branch or jump.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_pc: Option<u64>,
    /// Link address written by JAL/JALR.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ret_pc: Option<u64>,
    /// Branch outcome.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taken: Option<bool>,

    /// LSU/Commit handshake state.
    #[serde(default)]
    pub confirmation: Confirmation,
    /// Execution finished: set by the ALU, or by Commit once the LSU reports the access.
    #[serde(default)]
    pub completed: bool,
    /// Retiring this ECALL ends the process.
    #[serde(default)]
    pub shutdown: bool,
}

impl Instruction {
    /// Creates a bare record for `cmd` with no operand fields.
    pub fn new(cmd: Opcode, pc: u64, size: u64, word: u32) -> Self {
        Self {
            cmd,
            pc,
            size,
            word,
            rs1: None,
            rs2: None,
            rd: None,
            imm: None,
            shamt: None,
            nbytes: None,
            iid: None,
            operands: BTreeMap::new(),
            addr: None,
            prediction: None,
            result: None,
            next_pc: None,
            ret_pc: None,
            taken: None,
            confirmation: Confirmation::NotRequired,
            completed: false,
            shutdown: false,
        }
    }

    /// Address of the next sequential instruction.
    pub fn fallthrough(&self) -> u64 {
        self.pc.wrapping_add(self.size)
    }

    /// Registers whose values must be read before this instruction can execute.
    pub fn sources(&self) -> Vec<u8> {
        if self.cmd == Opcode::Ecall {
            return SYSCALL_REGS.to_vec();
        }
        let mut regs: Vec<u8> = self.rs1.into_iter().chain(self.rs2).collect();
        regs.dedup();
        regs
    }

    /// Register written at retirement, ignoring `x0`.
    pub fn destination(&self) -> Option<u8> {
        self.rd.filter(|&r| r != 0)
    }

    /// Value of a resolved source register.
    pub fn operand(&self, reg: Option<u8>) -> Option<u64> {
        reg.and_then(|r| self.operands.get(&r).copied())
    }

    /// Every source register has a value.
    pub fn is_ready(&self) -> bool {
        self.sources().iter().all(|r| self.operands.contains_key(r))
    }

    /// Predicted next PC, or the fall-through when nothing was predicted.
    pub fn predicted_next(&self) -> u64 {
        self.prediction
            .map_or_else(|| self.fallthrough(), |p| p.targetpc)
    }

    /// Realized next PC.
    pub fn actual_next(&self) -> u64 {
        self.next_pc.unwrap_or_else(|| self.fallthrough())
    }

    /// The realized target disagrees with what Fetch followed.
    pub fn is_mispredicted(&self) -> bool {
        self.cmd.is_control() && self.next_pc.is_some() && self.actual_next() != self.predicted_next()
    }

    /// Short reference for `flush` and `confirm`.
    pub fn reference(&self) -> InsnRef {
        InsnRef {
            iid: self.iid.unwrap_or_default(),
            pc: self.pc,
            cmd: self.cmd,
        }
    }

    /// Byte range `[addr, addr + nbytes)` of a memory access.
    pub fn access_range(&self) -> Option<(u64, u64)> {
        let addr = self.addr?;
        let n = self.nbytes?;
        Some((addr, addr.wrapping_add(n)))
    }

    /// Store data truncated to the store width, little-endian.
    pub fn store_bytes(&self) -> Option<Vec<u8>> {
        if !self.cmd.is_store() {
            return None;
        }
        let value = self.operand(self.rs2)?;
        let n = self.nbytes? as usize;
        Some(value.to_le_bytes()[..n].to_vec())
    }

    /// Widens little-endian load data per the opcode (LD as is, LW/LH/LB signed,
    /// LWU/LHU/LBU unsigned).
    pub fn extend_load(&self, data: &[u8]) -> Option<u64> {
        let ext = self.cmd.extension()?;
        let n = data.len().min(8);
        let mut raw = [0u8; 8];
        raw[..n].copy_from_slice(&data[..n]);
        let value = u64::from_le_bytes(raw);
        if n == 0 || n == 8 || ext == Extension::Unsigned {
            return Some(value);
        }
        let shift = 64 - 8 * n as u32;
        Some((((value << shift) as i64) >> shift) as u64)
    }
}
