// Control-program instructions shared by node, tile and core controllers

use serde::Serialize;

/// Number of words one instruction flattens to
pub const INSTRUCTION_WORDS: usize = 7;

/// Bit carrying the direction of a branch immediate
const BRANCH_BACKWARD: u32 = 1 << 11;
const BRANCH_MAGNITUDE: u32 = 0xff;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u32)]
pub enum Opcode {
  Ret = 0,
  Load = 3,
  LoadFp = 7,
  Copy = 11,
  OpImm = 19,
  Store = 35,
  StoreFp = 39,
  Custom = 43,
  Op = 51,
  Lui = 55,
  OpFp = 83,
  Branch = 99,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Instruction {
  pub opcode: Opcode,
  pub rd: u32,
  pub rs1: u32,
  pub rs2: u32,
  pub imm: u32,
  pub funct3: u32,
  pub funct7: u32,
}

impl Instruction {
  pub const fn new(opcode: Opcode, rd: u32, rs1: u32, rs2: u32, imm: u32, funct3: u32, funct7: u32) -> Self {
    Self {
      opcode,
      rd,
      rs1,
      rs2,
      imm,
      funct3,
      funct7,
    }
  }

  /// `addi x0, x0, 0`
  pub const fn nop() -> Self {
    Self::new(Opcode::OpImm, 0, 0, 0, 0, 0, 0)
  }

  /// Immediate for a branch moving `offset` instructions
  pub const fn branch_imm(offset: i32) -> u32 {
    if offset < 0 {
      BRANCH_BACKWARD | (offset.unsigned_abs() & BRANCH_MAGNITUDE)
    } else {
      offset as u32 & BRANCH_MAGNITUDE
    }
  }

  /// Signed distance of a branch, `None` for any other opcode
  pub fn branch_offset(&self) -> Option<i64> {
    if self.opcode != Opcode::Branch {
      return None;
    }
    let magnitude = (self.imm & BRANCH_MAGNITUDE) as i64;
    if self.imm & BRANCH_BACKWARD != 0 {
      Some(-magnitude)
    } else {
      Some(magnitude)
    }
  }

  pub fn to_words(&self) -> [u32; INSTRUCTION_WORDS] {
    [
      self.opcode as u32,
      self.rd,
      self.rs1,
      self.rs2,
      self.imm,
      self.funct3,
      self.funct7,
    ]
  }
}
