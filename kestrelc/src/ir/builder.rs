//! IR builder utilities
//!
//! Helpers for constructing functions one instruction at a time.

use std::collections::HashMap;

use super::*;

/// Index of a block inside the function being built.
pub type BlockId = usize;

/// IR builder for constructing functions
///
/// Instructions are appended to the current block. Once a block has a
/// terminator it is closed: further instructions and terminators aimed at
/// it are dropped, so callers can lower unreachable code without
/// corrupting the block.
pub struct FunctionBuilder {
    function: Function,
    current_block: Option<BlockId>,
    next_temp: usize,
    next_slot: usize,
    /// Allocas emitted so far; they stay grouped at the top of the entry block.
    entry_allocas: usize,
    slot_names: HashMap<String, usize>,
}

impl FunctionBuilder {
    /// Create a new function builder
    pub fn new(name: impl Into<String>, params: Vec<Parameter>, return_type: Type) -> Self {
        Self {
            function: Function::new(name, params, return_type),
            current_block: None,
            next_temp: 0,
            next_slot: 0,
            entry_allocas: 0,
            slot_names: HashMap::new(),
        }
    }

    /// The function's declared return type.
    pub fn return_type(&self) -> Type {
        self.function.return_type
    }

    /// The function's parameters.
    pub fn params(&self) -> &[Parameter] {
        &self.function.params
    }

    /// Create a new basic block at the end of the function
    pub fn create_block(&mut self, label: impl Into<String>) -> BlockId {
        self.function.blocks.push(BasicBlock::new(label));
        self.function.blocks.len() - 1
    }

    /// Switch to a block
    pub fn switch_to_block(&mut self, block_id: BlockId) {
        self.current_block = Some(block_id);
    }

    /// Label of a block.
    pub fn label(&self, block_id: BlockId) -> String {
        self.function.blocks[block_id].label.clone()
    }

    /// `true` when there is no current block or it already has a terminator.
    pub fn is_terminated(&self) -> bool {
        match self.current_block {
            Some(block_id) => self.function.blocks[block_id].is_terminated(),
            None => true,
        }
    }

    /// Allocate a fresh temporary of the given type.
    pub fn new_temp(&mut self, ty: Type) -> Temp {
        let temp = Temp {
            id: self.next_temp,
            ty,
        };
        self.next_temp += 1;
        temp
    }

    /// Emit an `alloca` for a new stack slot named `<name>.addr`. Repeated
    /// names get a numeric suffix. The alloca is placed at the top of the
    /// entry block regardless of the current block.
    pub fn alloca(&mut self, name: &str, ty: Type) -> SlotRef {
        let count = self.slot_names.entry(name.to_string()).or_insert(0);
        let unique = if *count == 0 {
            format!("{}.addr", name)
        } else {
            format!("{}.addr{}", name, count)
        };
        *count += 1;

        let slot = SlotRef {
            id: self.next_slot,
            name: unique,
            ty,
        };
        self.next_slot += 1;

        if let Some(entry) = self.function.blocks.first_mut() {
            entry.instructions.insert(
                self.entry_allocas,
                Instruction::Alloca { slot: slot.clone() },
            );
            self.entry_allocas += 1;
        }
        slot
    }

    /// Add an instruction to the current block
    pub fn add_instruction(&mut self, inst: Instruction) {
        if let Some(block_id) = self.current_block {
            let block = &mut self.function.blocks[block_id];
            if !block.is_terminated() {
                block.instructions.push(inst);
            }
        }
    }

    /// Set the terminator for the current block if it is still open
    pub fn terminate(&mut self, term: Terminator) {
        if let Some(block_id) = self.current_block {
            let block = &mut self.function.blocks[block_id];
            if block.terminator.is_none() {
                block.terminator = Some(term);
            }
        }
    }

    /// Emit an instruction producing a value of type `ty` and return it.
    pub fn emit_value(&mut self, ty: Type, make: impl FnOnce(Temp) -> Instruction) -> Value {
        let dest = self.new_temp(ty);
        self.add_instruction(make(dest));
        Value::Temp(dest)
    }

    /// Finish building and return the function
    pub fn build(self) -> Function {
        self.function
    }
}
