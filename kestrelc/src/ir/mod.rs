//! Intermediate representation for Kestrel
//!
//! The IR mirrors the shape of LLVM IR: typed values, explicit stack slots,
//! and functions made of labelled basic blocks that each end in exactly one
//! terminator. It is produced by [`crate::codegen`], rendered as text by
//! [`printer`] and compiled to machine code by the backends.

pub mod builder;
pub mod printer;

use std::collections::HashSet;

use thiserror::Error;

/// A compiled module
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    /// Module name
    pub name: String,
    /// Functions in definition order; declarations have no blocks
    pub functions: Vec<Function>,
    /// Interned string constants
    pub globals: Vec<GlobalString>,
}

/// A function definition or external declaration
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    /// Function name
    pub name: String,
    /// Parameters
    pub params: Vec<Parameter>,
    /// Return type
    pub return_type: Type,
    /// Accepts extra arguments after `params` (C variadic)
    pub variadic: bool,
    /// Basic blocks; the first one is the entry block
    pub blocks: Vec<BasicBlock>,
}

/// Function parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Parameter name
    pub name: String,
    /// Parameter type
    pub ty: Type,
}

/// A basic block (straight-line code with no branches except at the end)
#[derive(Debug, Clone, PartialEq)]
pub struct BasicBlock {
    /// Block label, unique within the function
    pub label: String,
    /// Instructions in this block
    pub instructions: Vec<Instruction>,
    /// Block terminator; the block is open while this is `None`
    pub terminator: Option<Terminator>,
}

/// A NUL-terminated byte array constant (`@.str.N`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalString {
    /// Symbol name without the `@` sigil
    pub name: String,
    /// Contents including the trailing NUL
    pub bytes: Vec<u8>,
}

/// IR type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    /// No value
    Void,
    /// 32-bit signed integer
    Int32,
    /// 32-bit IEEE float
    Float32,
    /// 64-bit IEEE float; only produced when a float is passed through
    /// the variadic part of a call
    Float64,
    /// One-bit boolean
    Bool1,
    /// Opaque pointer to NUL-terminated bytes
    StringPtr,
}

impl Type {
    /// The value a function of this type returns when its body falls off
    /// the end. `None` for `Void`.
    pub fn zero_value(self) -> Option<Value> {
        match self {
            Type::Void => None,
            Type::Int32 => Some(Value::ConstInt(0)),
            Type::Float32 => Some(Value::ConstFloat(0.0)),
            Type::Float64 => Some(Value::ConstDouble(0.0)),
            Type::Bool1 => Some(Value::ConstBool(false)),
            Type::StringPtr => Some(Value::Null),
        }
    }
}

/// A temporary produced by an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Temp {
    /// Function-local id
    pub id: usize,
    /// Type of the produced value
    pub ty: Type,
}

/// A stack slot created by an `alloca`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotRef {
    /// Function-local id
    pub id: usize,
    /// Unique name within the function
    pub name: String,
    /// Type of the value stored in the slot
    pub ty: Type,
}

/// IR value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `i32` constant
    ConstInt(i32),
    /// `float` constant
    ConstFloat(f32),
    /// `double` constant
    ConstDouble(f64),
    /// `i1` constant
    ConstBool(bool),
    /// Null pointer
    Null,
    /// Incoming function parameter
    Param {
        /// Position in the parameter list
        index: usize,
        /// Parameter name
        name: String,
        /// Parameter type
        ty: Type,
    },
    /// Result of an earlier instruction
    Temp(Temp),
}

impl Value {
    /// The IR type of this value.
    pub fn ty(&self) -> Type {
        match self {
            Value::ConstInt(_) => Type::Int32,
            Value::ConstFloat(_) => Type::Float32,
            Value::ConstDouble(_) => Type::Float64,
            Value::ConstBool(_) => Type::Bool1,
            Value::Null => Type::StringPtr,
            Value::Param { ty, .. } => *ty,
            Value::Temp(temp) => temp.ty,
        }
    }
}

impl From<Temp> for Value {
    fn from(temp: Temp) -> Self {
        Value::Temp(temp)
    }
}

/// Arithmetic operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    SDiv,
    FAdd,
    FSub,
    FMul,
    FDiv,
}

/// Integer comparison predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntPredicate {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
}

/// Ordered floating-point comparison predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatPredicate {
    Oeq,
    One,
    Olt,
    Ole,
    Ogt,
    Oge,
}

/// Conversion operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastOp {
    /// Signed integer to float
    SiToFp,
    /// Float to signed integer, truncating
    FpToSi,
    /// Zero extension (`i1` to `i32`)
    ZExt,
    /// `float` to `double`
    FpExt,
}

/// IR instruction
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Reserve a stack slot
    Alloca { slot: SlotRef },
    /// Read a stack slot
    Load { dest: Temp, slot: SlotRef },
    /// Write a stack slot
    Store { slot: SlotRef, value: Value },
    /// Arithmetic
    Binary {
        dest: Temp,
        op: BinOp,
        lhs: Value,
        rhs: Value,
    },
    /// Integer or pointer comparison producing `i1`
    ICmp {
        dest: Temp,
        pred: IntPredicate,
        lhs: Value,
        rhs: Value,
    },
    /// Floating-point comparison producing `i1`
    FCmp {
        dest: Temp,
        pred: FloatPredicate,
        lhs: Value,
        rhs: Value,
    },
    /// Type conversion; the target type is `dest.ty`
    Cast {
        dest: Temp,
        op: CastOp,
        value: Value,
    },
    /// Direct call
    Call {
        /// `None` for void callees
        dest: Option<Temp>,
        callee: String,
        args: Vec<Value>,
        /// Return type of the callee
        ret: Type,
        /// Fixed parameter types when the callee is variadic
        variadic_params: Option<Vec<Type>>,
    },
    /// Address of the first byte of a global string
    StringAddress {
        dest: Temp,
        global: String,
        /// Array length including the NUL
        len: usize,
    },
    /// `cond ? then_value : else_value`
    Select {
        dest: Temp,
        cond: Value,
        then_value: Value,
        else_value: Value,
    },
}

/// Block terminator (control flow)
#[derive(Debug, Clone, PartialEq)]
pub enum Terminator {
    /// Return from function
    Ret(Option<Value>),
    /// Unconditional branch
    Br(String),
    /// Conditional branch on an `i1`
    CondBr {
        cond: Value,
        then_label: String,
        else_label: String,
    },
}

impl Terminator {
    /// Labels this terminator may transfer control to.
    pub fn successors(&self) -> Vec<&str> {
        match self {
            Terminator::Ret(_) => Vec::new(),
            Terminator::Br(target) => vec![target.as_str()],
            Terminator::CondBr {
                then_label,
                else_label,
                ..
            } => vec![then_label.as_str(), else_label.as_str()],
        }
    }
}

/// A structural problem found by [`Function::verify`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("function '{function}': {message}")]
pub struct VerifyError {
    pub function: String,
    pub message: String,
}

impl Module {
    /// Create a new empty module
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: Vec::new(),
            globals: Vec::new(),
        }
    }

    /// Look up a function or declaration by name.
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|function| function.name == name)
    }

    /// Look up a global string by symbol name.
    pub fn global(&self, name: &str) -> Option<&GlobalString> {
        self.globals.iter().find(|global| global.name == name)
    }

    /// Verify every function and check that function names are unique.
    pub fn verify(&self) -> Result<(), VerifyError> {
        let mut names = HashSet::new();
        for function in &self.functions {
            if !names.insert(function.name.as_str()) {
                return Err(VerifyError {
                    function: function.name.clone(),
                    message: "defined more than once".to_string(),
                });
            }
            function.verify()?;
        }
        Ok(())
    }
}

impl Function {
    /// Create a new function with no blocks
    pub fn new(name: impl Into<String>, params: Vec<Parameter>, return_type: Type) -> Self {
        Self {
            name: name.into(),
            params,
            return_type,
            variadic: false,
            blocks: Vec::new(),
        }
    }

    /// An external declaration.
    pub fn declare(
        name: impl Into<String>,
        params: Vec<Parameter>,
        return_type: Type,
        variadic: bool,
    ) -> Self {
        Self {
            variadic,
            ..Self::new(name, params, return_type)
        }
    }

    /// `true` when the function has no body.
    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Look up a block by label.
    pub fn block(&self, label: &str) -> Option<&BasicBlock> {
        self.blocks.iter().find(|block| block.label == label)
    }

    /// Check the block structure of a defined function: every block is
    /// terminated, labels are unique, branch targets exist and returns
    /// match the declared return type.
    pub fn verify(&self) -> Result<(), VerifyError> {
        if self.is_declaration() {
            return Ok(());
        }

        let fail = |message: String| VerifyError {
            function: self.name.clone(),
            message,
        };

        let mut labels = HashSet::new();
        for block in &self.blocks {
            if !labels.insert(block.label.as_str()) {
                return Err(fail(format!("duplicate block label '{}'", block.label)));
            }
        }

        for block in &self.blocks {
            let terminator = block
                .terminator
                .as_ref()
                .ok_or_else(|| fail(format!("block '{}' has no terminator", block.label)))?;

            for target in terminator.successors() {
                if !labels.contains(target) {
                    return Err(fail(format!(
                        "block '{}' branches to unknown block '{}'",
                        block.label, target
                    )));
                }
            }

            match terminator {
                Terminator::Ret(None) if self.return_type != Type::Void => {
                    return Err(fail(format!(
                        "block '{}' returns void from a {} function",
                        block.label,
                        self.return_type
                    )));
                }
                Terminator::Ret(Some(value)) if value.ty() != self.return_type => {
                    return Err(fail(format!(
                        "block '{}' returns {} from a {} function",
                        block.label,
                        value.ty(),
                        self.return_type
                    )));
                }
                Terminator::CondBr { cond, .. } if cond.ty() != Type::Bool1 => {
                    return Err(fail(format!(
                        "block '{}' branches on a {} condition",
                        block.label,
                        cond.ty()
                    )));
                }
                _ => {}
            }
        }

        Ok(())
    }
}

impl BasicBlock {
    /// Create a new, open basic block
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            instructions: Vec::new(),
            terminator: None,
        }
    }

    /// `true` once a terminator has been appended.
    pub fn is_terminated(&self) -> bool {
        self.terminator.is_some()
    }
}
