//! Fixed control programs of the three controller levels.
//!
//! The programs do not depend on the model; everything model-specific is
//! read at run time from the scalar block of the image they execute in.

use serde::Serialize;

use super::instruction::{Instruction, Opcode, INSTRUCTION_WORDS};
use super::layout::*;
use crate::error::{CompileError, Result};

const NOP: Instruction = Instruction::nop();

const fn w(value: usize) -> u32 {
  value as u32
}

const fn op(opcode: Opcode, rd: u32, rs1: u32, rs2: u32, imm: u32, funct3: u32, funct7: u32) -> Instruction {
  Instruction::new(opcode, rd, rs1, rs2, imm, funct3, funct7)
}

/// Branch by `offset` instructions; funct3 0 = equal, 1 = not equal
const fn branch(rs1: u32, rs2: u32, offset: i32, funct3: u32) -> Instruction {
  Instruction::new(Opcode::Branch, 0, rs1, rs2, Instruction::branch_imm(offset), funct3, 0)
}

pub const NODE_PROGRAM: &[Instruction] = &[
  op(Opcode::Lui, 10, 0, 0, w(NODE_SCALAR_BASE >> 12), 0, 0),
  NOP,
  NOP,
  op(Opcode::Load, 11, 10, 0, w(NODE_PARTIAL_SHAP_PTR), 2, 0),
  op(Opcode::Load, 12, 10, 0, w(NODE_SHAP_PTR), 3, 0),
  op(Opcode::Load, 13, 10, 0, w(NODE_SAMPLE_PTR), 2, 0),
  op(Opcode::Load, 15, 10, 0, w(NODE_NUM_FEATURE), 2, 0),
  op(Opcode::Load, 22, 10, 0, w(NODE_NUM_CLASS), 2, 0),
  op(Opcode::Load, 14, 10, 0, w(NODE_NUM_TEST), 2, 0),
  op(Opcode::LoadFp, 1, 10, 0, w(NODE_NUM_BASE), 2, 0),
  op(Opcode::Op, 16, 22, 15, 0, 0, 1),
  op(Opcode::Copy, 0, 13, 15, 0, 1, 0),
  // spin until the run flag is raised
  op(Opcode::Load, 21, 10, 0, w(NODE_RUN_FLAG), 2, 0),
  NOP,
  NOP,
  branch(21, 0, -5, 0),
  op(Opcode::OpImm, 23, 0, 0, 0, 0, 0),
  op(Opcode::Store, 0, 10, 0, w(NODE_RUN_FLAG), 2, 0),
  op(Opcode::LoadFp, 2, 11, 0, 0, 2, 0),
  op(Opcode::LoadFp, 3, 12, 0, 0, 2, 0),
  op(Opcode::OpImm, 19, 19, 0, 1, 0, 0),
  op(Opcode::OpImm, 23, 23, 0, 1, 0, 0),
  op(Opcode::OpFp, 4, 2, 1, 0, 0, 12),
  op(Opcode::OpImm, 11, 11, 0, 4, 0, 0),
  NOP,
  op(Opcode::OpFp, 3, 3, 4, 0, 0, 0),
  NOP,
  NOP,
  op(Opcode::StoreFp, 0, 12, 3, 0, 2, 0),
  op(Opcode::OpImm, 12, 12, 0, 4, 0, 0),
  NOP,
  branch(23, 22, -15, 1),
  branch(19, 16, -22, 1),
  op(Opcode::OpImm, 18, 18, 0, 1, 0, 0),
  op(Opcode::OpImm, 19, 0, 0, 0, 0, 0),
  op(Opcode::Load, 11, 10, 0, w(NODE_PARTIAL_SHAP_PTR), 2, 0),
  op(Opcode::Load, 12, 10, 0, w(NODE_SHAP_PTR), 2, 0),
  NOP,
  branch(18, 14, -28, 1),
  op(Opcode::OpImm, 20, 16, 0, 2, 1, 0),
  op(Opcode::Op, 13, 13, 15, 0, 0, 0),
  op(Opcode::OpImm, 17, 17, 0, 1, 0, 0),
  op(Opcode::OpImm, 19, 0, 0, 0, 0, 0),
  op(Opcode::OpImm, 18, 0, 0, 0, 0, 0),
  op(Opcode::Copy, 0, 12, 20, 0, 0, 0),
  op(Opcode::StoreFp, 0, 12, 0, 0, 2, 0),
  NOP,
  branch(17, 14, -38, 1),
  op(Opcode::Ret, 0, 0, 0, 0, 0, 0),
  NOP,
  NOP,
  NOP,
  NOP,
];

pub const TILE_PROGRAM: &[Instruction] = &[
  op(Opcode::Lui, 10, 0, 0, w(TILE_SCALAR_BASE >> 12), 0, 0),
  NOP,
  NOP,
  op(Opcode::OpImm, 10, 10, 0, w(TILE_SCALAR_BASE & 0xfff), 0, 0),
  op(Opcode::OpImm, 16, 0, 0, 4, 0, 0),
  NOP,
  op(Opcode::Load, 11, 10, 0, w(TILE_SAMPLE_PTR), 2, 0),
  op(Opcode::Load, 12, 10, 0, w(TILE_BASE_PTR), 2, 0),
  op(Opcode::Load, 13, 10, 0, w(TILE_RESULT_PTR), 2, 0),
  op(Opcode::Load, 14, 10, 0, w(TILE_NUM_BASE), 2, 0),
  op(Opcode::Load, 15, 10, 0, w(TILE_NUM_FEATURE), 2, 0),
  op(Opcode::Load, 21, 10, 0, w(TILE_SAMPLE_FLAG), 2, 0),
  NOP,
  NOP,
  branch(21, 0, -5, 0),
  op(Opcode::Store, 0, 10, 0, w(TILE_SAMPLE_FLAG), 2, 0),
  op(Opcode::Copy, 0, 11, 15, 0, 1, 0),
  op(Opcode::Copy, 0, 12, 15, 0, 1, 0),
  op(Opcode::Load, 22, 10, 0, w(TILE_RESULT_FLAG), 2, 0),
  NOP,
  NOP,
  branch(22, 0, -5, 0),
  op(Opcode::Store, 0, 10, 0, w(TILE_RESULT_FLAG), 2, 0),
  op(Opcode::Copy, 0, 13, 16, 0, 0, 0),
  op(Opcode::OpImm, 18, 18, 0, 1, 0, 0),
  NOP,
  NOP,
  branch(18, 15, -11, 1),
  op(Opcode::Op, 12, 12, 15, 0, 0, 0),
  op(Opcode::OpImm, 17, 17, 0, 1, 0, 0),
  op(Opcode::OpImm, 18, 0, 0, 0, 0, 0),
  NOP,
  branch(17, 14, -17, 1),
  op(Opcode::Load, 12, 10, 0, w(TILE_BASE_PTR), 2, 0),
  op(Opcode::OpImm, 17, 0, 0, 0, 0, 0),
  op(Opcode::OpImm, 18, 0, 0, 0, 0, 0),
  NOP,
  branch(0, 0, -28, 0),
];

pub const CORE_PROGRAM: &[Instruction] = &[
  op(Opcode::OpImm, 10, 10, 0, w(CORE_SCALAR_BASE), 0, 0),
  NOP,
  NOP,
  op(Opcode::Load, 11, 10, 0, w(CORE_CAM_PTR), 2, 0),
  op(Opcode::Load, 12, 10, 0, w(CORE_SAMPLE_PTR), 2, 0),
  op(Opcode::Load, 13, 10, 0, w(CORE_BASE_PTR), 2, 0),
  op(Opcode::OpImm, 14, 0, 0, w(CORE_SCALAR_BASE + CORE_RUNTIME), 0, 0),
  op(Opcode::Load, 15, 10, 0, w(CORE_NUM_BASE), 2, 0),
  op(Opcode::Load, 16, 10, 0, w(CORE_NUM_FEATURE), 2, 0),
  op(Opcode::Load, 23, 10, 0, w(CORE_RUN_FLAG), 2, 0),
  op(Opcode::OpImm, 24, 0, 0, 1, 0, 0),
  NOP,
  branch(23, 0, -5, 0),
  op(Opcode::Load, 23, 10, 0, w(CORE_RUN_FLAG), 2, 0),
  op(Opcode::OpImm, 26, 17, 0, 2, 0, 0),
  NOP,
  NOP,
  branch(23, 26, -6, 1),
  op(Opcode::Custom, 0, 0, 0, 0, 1, 0),
  op(Opcode::Custom, 0, 0, 0, 0, 0, 0),
  op(Opcode::Copy, 11, 12, 24, 0, 2, 0),
  NOP,
  op(Opcode::Custom, 0, 0, 0, 1, 0, 0),
  NOP,
  NOP,
  NOP,
  op(Opcode::Custom, 0, 0, 0, 1, 1, 0),
  op(Opcode::Copy, 11, 13, 24, 0, 2, 0),
  NOP,
  op(Opcode::Custom, 0, 0, 0, 1, 0, 0),
  NOP,
  NOP,
  NOP,
  op(Opcode::Custom, 0, 0, 0, 2, 1, 0),
  op(Opcode::Custom, 0, 0, 0, 3, 1, 0),
  op(Opcode::OpImm, 18, 18, 0, 1, 0, 0),
  op(Opcode::OpImm, 11, 11, 0, 1, 0, 0),
  op(Opcode::OpImm, 12, 12, 0, 1, 0, 0),
  op(Opcode::OpImm, 13, 13, 0, 1, 0, 0),
  NOP,
  branch(16, 18, -23, 1),
  op(Opcode::Custom, 0, 0, 0, 4, 1, 0),
  op(Opcode::OpImm, 18, 0, 0, 0, 0, 0),
  op(Opcode::Load, 11, 10, 0, w(CORE_CAM_PTR), 2, 0),
  op(Opcode::Load, 12, 10, 0, w(CORE_SAMPLE_PTR), 2, 0),
  op(Opcode::Load, 13, 10, 0, w(CORE_BASE_PTR), 2, 0),
  op(Opcode::Custom, 0, 0, 0, 0, 0, 0),
  op(Opcode::Copy, 11, 12, 24, 0, 2, 0),
  NOP,
  op(Opcode::Custom, 0, 0, 0, 1, 0, 0),
  NOP,
  NOP,
  NOP,
  op(Opcode::Custom, 0, 0, 0, 1, 1, 0),
  op(Opcode::Copy, 11, 13, 24, 0, 2, 0),
  NOP,
  op(Opcode::Custom, 0, 0, 0, 1, 0, 0),
  NOP,
  NOP,
  NOP,
  op(Opcode::Custom, 0, 0, 0, 2, 1, 0),
  op(Opcode::Custom, 0, 0, 0, 5, 1, 0),
  op(Opcode::Custom, 0, 0, 0, 0, 2, 0),
  op(Opcode::OpImm, 25, 0, 0, 4, 0, 0),
  // weighted sum over matched rows, two lanes at a time
  op(Opcode::Load, 19, 0, 0, w(CORE_SCRATCH_OFFSET), 2, 0),
  op(Opcode::Load, 20, 0, 0, w(CORE_SCRATCH_OFFSET + 2 * WORD), 2, 0),
  NOP,
  op(Opcode::LoadFp, 1, 19, 0, w(CORE_VALUE_OFFSET), 0, 0),
  NOP,
  NOP,
  NOP,
  op(Opcode::LoadFp, 5, 20, 0, w(CORE_VALUE_OFFSET), 0, 0),
  NOP,
  NOP,
  NOP,
  op(Opcode::Load, 21, 19, 0, w(CORE_MATCH_OFFSET), 0, 0),
  NOP,
  NOP,
  NOP,
  op(Opcode::Load, 22, 20, 0, w(CORE_MATCH_OFFSET), 0, 0),
  NOP,
  NOP,
  NOP,
  op(Opcode::LoadFp, 2, 21, 0, w(CORE_WEIGHT_OFFSET), 0, 0),
  NOP,
  NOP,
  NOP,
  op(Opcode::LoadFp, 6, 22, 0, w(CORE_WEIGHT_OFFSET + 1), 0, 0),
  NOP,
  NOP,
  NOP,
  op(Opcode::OpFp, 3, 1, 2, 0, 0, 8),
  NOP,
  NOP,
  op(Opcode::OpFp, 7, 5, 6, 0, 0, 8),
  NOP,
  NOP,
  op(Opcode::OpFp, 4, 4, 3, 0, 0, 0),
  NOP,
  NOP,
  op(Opcode::OpFp, 8, 8, 7, 0, 0, 0),
  op(Opcode::Load, 19, 0, 0, w(CORE_SCRATCH_OFFSET + WORD), 2, 0),
  op(Opcode::Load, 20, 0, 0, w(CORE_SCRATCH_OFFSET + 3 * WORD), 2, 0),
  NOP,
  op(Opcode::LoadFp, 1, 19, 0, w(CORE_VALUE_OFFSET), 0, 0),
  NOP,
  NOP,
  NOP,
  op(Opcode::LoadFp, 5, 20, 0, w(CORE_VALUE_OFFSET), 0, 0),
  NOP,
  NOP,
  NOP,
  op(Opcode::Load, 21, 19, 0, w(CORE_MATCH_OFFSET), 0, 0),
  NOP,
  NOP,
  NOP,
  op(Opcode::Load, 22, 20, 0, w(CORE_MATCH_OFFSET), 0, 0),
  NOP,
  NOP,
  NOP,
  op(Opcode::LoadFp, 2, 21, 0, w(CORE_WEIGHT_OFFSET), 0, 0),
  NOP,
  NOP,
  NOP,
  op(Opcode::LoadFp, 6, 22, 0, w(CORE_WEIGHT_OFFSET + 1), 0, 0),
  NOP,
  NOP,
  NOP,
  op(Opcode::OpFp, 3, 1, 2, 0, 0, 8),
  NOP,
  NOP,
  op(Opcode::OpFp, 7, 5, 6, 0, 0, 8),
  NOP,
  NOP,
  op(Opcode::OpFp, 4, 4, 3, 0, 0, 0),
  NOP,
  NOP,
  op(Opcode::OpFp, 8, 8, 7, 0, 0, 0),
  NOP,
  NOP,
  op(Opcode::OpFp, 4, 4, 8, 0, 0, 4),
  op(Opcode::OpImm, 18, 18, 0, 1, 0, 0),
  op(Opcode::OpImm, 11, 11, 0, 1, 0, 0),
  op(Opcode::StoreFp, 0, 14, 4, 0, 2, 0),
  op(Opcode::OpImm, 12, 12, 0, 1, 0, 0),
  op(Opcode::OpImm, 13, 13, 0, 1, 0, 0),
  op(Opcode::Copy, 0, 14, 25, 0, 0, 0),
  op(Opcode::OpFp, 4, 0, 0, 0, 0, 0),
  NOP,
  NOP,
  op(Opcode::OpFp, 8, 0, 0, 0, 0, 0),
  NOP,
  NOP,
  branch(16, 18, -109, 1),
  op(Opcode::OpImm, 17, 17, 0, 1, 0, 0),
  op(Opcode::OpImm, 18, 0, 0, 0, 0, 0),
  op(Opcode::Load, 11, 10, 0, w(CORE_CAM_PTR), 2, 0),
  op(Opcode::Load, 12, 10, 0, w(CORE_SAMPLE_PTR), 2, 0),
  op(Opcode::Load, 13, 10, 0, w(CORE_BASE_PTR), 2, 0),
  NOP,
  branch(15, 17, -149, 1),
  op(Opcode::Store, 23, 10, 0, w(CORE_RUN_FLAG), 2, 0),
  op(Opcode::OpImm, 17, 0, 0, 0, 0, 0),
  op(Opcode::OpImm, 18, 0, 0, 0, 0, 0),
  op(Opcode::Load, 11, 10, 0, w(CORE_CAM_PTR), 2, 0),
  op(Opcode::Load, 12, 10, 0, w(CORE_SAMPLE_PTR), 2, 0),
  op(Opcode::Load, 13, 10, 0, w(CORE_BASE_PTR), 2, 0),
  NOP,
  branch(0, 0, -161, 0),
];

/// A level's control program
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Program {
  pub level: ImageLevel,
  pub instructions: &'static [Instruction],
}

impl Program {
  pub const fn for_level(level: ImageLevel) -> Self {
    let instructions = match level {
      ImageLevel::Node => NODE_PROGRAM,
      ImageLevel::Tile => TILE_PROGRAM,
      ImageLevel::Core => CORE_PROGRAM,
    };
    Self { level, instructions }
  }

  pub fn len(&self) -> usize {
    self.instructions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.instructions.is_empty()
  }

  /// Every branch must land on an instruction of the same program.
  pub fn validate(&self) -> Result<()> {
    for (pc, instruction) in self.instructions.iter().enumerate() {
      if let Some(offset) = instruction.branch_offset() {
        let target = pc as i64 + offset;
        if target < 0 || target >= self.instructions.len() as i64 {
          return Err(CompileError::range(
            format!("{:?} program", self.level),
            format!("branch at {} jumps to {}, outside [0, {})", pc, target, self.len()),
          ));
        }
      }
    }
    Ok(())
  }

  /// Flattened instruction table, seven words per instruction
  pub fn to_words(&self) -> Vec<u32> {
    let mut words = Vec::with_capacity(self.instructions.len() * INSTRUCTION_WORDS);
    for instruction in self.instructions {
      words.extend_from_slice(&instruction.to_words());
    }
    words
  }
}
