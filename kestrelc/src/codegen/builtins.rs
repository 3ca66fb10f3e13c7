//! Built-in runtime surface: `printf` and the typed print helpers
//!
//! Each helper wraps the variadic `printf` with a fixed format string.
//! `print_bool` renders its argument through a `select` between the
//! interned strings `"true"` and `"false"`.

use std::collections::BTreeSet;

use tracing::debug;

use super::interner::StringInterner;
use crate::ir::builder::FunctionBuilder;
use crate::ir::{CastOp, Function, Instruction, Module, Parameter, Terminator, Type, Value};

/// Callable names the generator resolves without a user definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Printf,
    Print,
    PrintInt,
    PrintFloat,
    PrintBool,
    PrintString,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Self> {
        let builtin = match name {
            "printf" => Builtin::Printf,
            "print" => Builtin::Print,
            "print_int" => Builtin::PrintInt,
            "print_float" => Builtin::PrintFloat,
            "print_bool" => Builtin::PrintBool,
            "print_string" => Builtin::PrintString,
            _ => return None,
        };
        Some(builtin)
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Printf => "printf",
            Builtin::Print => "print",
            Builtin::PrintInt => "print_int",
            Builtin::PrintFloat => "print_float",
            Builtin::PrintBool => "print_bool",
            Builtin::PrintString => "print_string",
        }
    }
}

/// A typed print helper emitted into the module on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrintHelper {
    Int,
    Float,
    Bool,
    String,
}

impl PrintHelper {
    /// The helper that prints values of IR type `ty`.
    pub fn for_type(ty: Type) -> Option<Self> {
        match ty {
            Type::Int32 => Some(PrintHelper::Int),
            Type::Float32 => Some(PrintHelper::Float),
            Type::Bool1 => Some(PrintHelper::Bool),
            Type::StringPtr => Some(PrintHelper::String),
            Type::Void | Type::Float64 => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PrintHelper::Int => "print_int",
            PrintHelper::Float => "print_float",
            PrintHelper::Bool => "print_bool",
            PrintHelper::String => "print_string",
        }
    }

    pub fn param_type(self) -> Type {
        match self {
            PrintHelper::Int => Type::Int32,
            PrintHelper::Float => Type::Float32,
            PrintHelper::Bool => Type::Bool1,
            PrintHelper::String => Type::StringPtr,
        }
    }

    pub fn format(self) -> &'static str {
        match self {
            PrintHelper::Int => "%d\n",
            PrintHelper::Float => "%f\n",
            PrintHelper::Bool | PrintHelper::String => "%s\n",
        }
    }
}

/// Runtime pieces referenced while lowering the user functions.
#[derive(Debug, Default)]
pub struct RuntimeUsage {
    printf: bool,
    helpers: BTreeSet<PrintHelper>,
}

impl RuntimeUsage {
    pub fn use_printf(&mut self) {
        self.printf = true;
    }

    pub fn use_helper(&mut self, helper: PrintHelper) {
        self.helpers.insert(helper);
        self.printf = true;
    }

    pub fn uses_printf(&self) -> bool {
        self.printf
    }

    pub fn helpers(&self) -> impl Iterator<Item = PrintHelper> + '_ {
        self.helpers.iter().copied()
    }
}

/// Fixed parameter list of `printf`.
pub fn printf_params() -> Vec<Type> {
    vec![Type::StringPtr]
}

/// `declare i32 @printf(ptr, ...)`
pub fn printf_declaration() -> Function {
    Function::declare(
        "printf",
        vec![Parameter {
            name: "format".to_string(),
            ty: Type::StringPtr,
        }],
        Type::Int32,
        true,
    )
}

/// Build a call to `printf`. Arguments after the format must already be
/// promoted (`double`, `i32` or `ptr`).
pub fn printf_call(builder: &mut FunctionBuilder, args: Vec<Value>) -> Value {
    builder.emit_value(Type::Int32, |dest| Instruction::Call {
        dest: Some(dest),
        callee: "printf".to_string(),
        args,
        ret: Type::Int32,
        variadic_params: Some(printf_params()),
    })
}

/// Emit the address of an interned string into the current block.
pub fn string_address(
    builder: &mut FunctionBuilder,
    interner: &mut StringInterner,
    content: &str,
) -> Value {
    let interned = interner.intern(content);
    builder.emit_value(Type::StringPtr, |dest| Instruction::StringAddress {
        dest,
        global: interned.name,
        len: interned.len,
    })
}

/// Append the used helpers and the `printf` declaration to `module`.
pub fn emit_runtime(module: &mut Module, interner: &mut StringInterner, usage: &RuntimeUsage) {
    for helper in usage.helpers() {
        debug!(helper = helper.name(), "emitting print helper");
        module.functions.push(build_helper(helper, interner));
    }
    if usage.uses_printf() {
        module.functions.push(printf_declaration());
    }
}

fn build_helper(helper: PrintHelper, interner: &mut StringInterner) -> Function {
    let ty = helper.param_type();
    let params = vec![Parameter {
        name: "value".to_string(),
        ty,
    }];
    let mut builder = FunctionBuilder::new(helper.name(), params, Type::Void);
    let entry = builder.create_block("entry");
    builder.switch_to_block(entry);

    let format = string_address(&mut builder, interner, helper.format());
    let value = Value::Param {
        index: 0,
        name: "value".to_string(),
        ty,
    };

    let rendered = match helper {
        PrintHelper::Int | PrintHelper::String => value,
        PrintHelper::Float => builder.emit_value(Type::Float64, |dest| Instruction::Cast {
            dest,
            op: CastOp::FpExt,
            value,
        }),
        PrintHelper::Bool => {
            let yes = string_address(&mut builder, interner, "true");
            let no = string_address(&mut builder, interner, "false");
            builder.emit_value(Type::StringPtr, |dest| Instruction::Select {
                dest,
                cond: value,
                then_value: yes,
                else_value: no,
            })
        }
    };

    printf_call(&mut builder, vec![format, rendered]);
    builder.terminate(Terminator::Ret(None));
    builder.build()
}
