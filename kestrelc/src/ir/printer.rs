//! Textual rendering of the IR in LLVM assembly syntax
//!
//! The output uses opaque pointers (`ptr`) and is deterministic: globals in
//! creation order, then functions in module order.

use super::*;
use std::fmt;

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Type::Void => "void",
            Type::Int32 => "i32",
            Type::Float32 => "float",
            Type::Float64 => "double",
            Type::Bool1 => "i1",
            Type::StringPtr => "ptr",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::ConstInt(value) => write!(f, "{}", value),
            // LLVM wants float constants that are exact in hex double form.
            Value::ConstFloat(value) => write!(f, "0x{:016X}", f64::from(*value).to_bits()),
            Value::ConstDouble(value) => write!(f, "0x{:016X}", value.to_bits()),
            Value::ConstBool(value) => write!(f, "{}", value),
            Value::Null => f.write_str("null"),
            Value::Param { name, .. } => write!(f, "%{}.arg", name),
            Value::Temp(temp) => write!(f, "{}", temp),
        }
    }
}

impl fmt::Display for Temp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%t{}", self.id)
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::SDiv => "sdiv",
            BinOp::FAdd => "fadd",
            BinOp::FSub => "fsub",
            BinOp::FMul => "fmul",
            BinOp::FDiv => "fdiv",
        };
        f.write_str(name)
    }
}

impl fmt::Display for IntPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IntPredicate::Eq => "eq",
            IntPredicate::Ne => "ne",
            IntPredicate::Slt => "slt",
            IntPredicate::Sle => "sle",
            IntPredicate::Sgt => "sgt",
            IntPredicate::Sge => "sge",
        };
        f.write_str(name)
    }
}

impl fmt::Display for FloatPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FloatPredicate::Oeq => "oeq",
            FloatPredicate::One => "one",
            FloatPredicate::Olt => "olt",
            FloatPredicate::Ole => "ole",
            FloatPredicate::Ogt => "ogt",
            FloatPredicate::Oge => "oge",
        };
        f.write_str(name)
    }
}

impl fmt::Display for CastOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CastOp::SiToFp => "sitofp",
            CastOp::FpToSi => "fptosi",
            CastOp::ZExt => "zext",
            CastOp::FpExt => "fpext",
        };
        f.write_str(name)
    }
}

/// `<type> <value>` as used in operand lists.
struct Typed<'a>(&'a Value);

impl fmt::Display for Typed<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0.ty(), self.0)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Alloca { slot } => write!(f, "%{} = alloca {}", slot.name, slot.ty),
            Instruction::Load { dest, slot } => {
                write!(f, "{} = load {}, ptr %{}", dest, slot.ty, slot.name)
            }
            Instruction::Store { slot, value } => {
                write!(f, "store {}, ptr %{}", Typed(value), slot.name)
            }
            Instruction::Binary { dest, op, lhs, rhs } => {
                write!(f, "{} = {} {}, {}", dest, op, Typed(lhs), rhs)
            }
            Instruction::ICmp {
                dest,
                pred,
                lhs,
                rhs,
            } => write!(f, "{} = icmp {} {}, {}", dest, pred, Typed(lhs), rhs),
            Instruction::FCmp {
                dest,
                pred,
                lhs,
                rhs,
            } => write!(f, "{} = fcmp {} {}, {}", dest, pred, Typed(lhs), rhs),
            Instruction::Cast { dest, op, value } => {
                write!(f, "{} = {} {} to {}", dest, op, Typed(value), dest.ty)
            }
            Instruction::Call {
                dest,
                callee,
                args,
                ret,
                variadic_params,
            } => {
                if let Some(dest) = dest {
                    write!(f, "{} = ", dest)?;
                }
                write!(f, "call {} ", ret)?;
                if let Some(fixed) = variadic_params {
                    f.write_str("(")?;
                    for ty in fixed {
                        write!(f, "{}, ", ty)?;
                    }
                    f.write_str("...) ")?;
                }
                write!(f, "@{}(", callee)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", Typed(arg))?;
                }
                f.write_str(")")
            }
            Instruction::StringAddress { dest, global, len } => write!(
                f,
                "{} = getelementptr inbounds [{} x i8], ptr @{}, i32 0, i32 0",
                dest, len, global
            ),
            Instruction::Select {
                dest,
                cond,
                then_value,
                else_value,
            } => write!(
                f,
                "{} = select {}, {}, {}",
                dest,
                Typed(cond),
                Typed(then_value),
                Typed(else_value)
            ),
        }
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminator::Ret(Some(value)) => write!(f, "ret {}", Typed(value)),
            Terminator::Ret(None) => f.write_str("ret void"),
            Terminator::Br(target) => write!(f, "br label %{}", target),
            Terminator::CondBr {
                cond,
                then_label,
                else_label,
            } => write!(
                f,
                "br {}, label %{}, label %{}",
                Typed(cond),
                then_label,
                else_label
            ),
        }
    }
}

impl fmt::Display for GlobalString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "@{} = private unnamed_addr constant [{} x i8] c\"",
            self.name,
            self.bytes.len()
        )?;
        for &byte in &self.bytes {
            if (byte.is_ascii_graphic() && byte != b'"' && byte != b'\\') || byte == b' ' {
                write!(f, "{}", byte as char)?;
            } else {
                write!(f, "\\{:02X}", byte)?;
            }
        }
        f.write_str("\"")
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keyword = if self.is_declaration() {
            "declare"
        } else {
            "define"
        };
        write!(f, "{} {} @{}(", keyword, self.return_type, self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            if self.is_declaration() {
                write!(f, "{}", param.ty)?;
            } else {
                write!(f, "{} %{}.arg", param.ty, param.name)?;
            }
        }
        if self.variadic {
            if self.params.is_empty() {
                f.write_str("...")?;
            } else {
                f.write_str(", ...")?;
            }
        }
        f.write_str(")")?;

        if self.is_declaration() {
            return writeln!(f);
        }

        writeln!(f, " {{")?;
        for (index, block) in self.blocks.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            writeln!(f, "{}:", block.label)?;
            for inst in &block.instructions {
                writeln!(f, "  {}", inst)?;
            }
            if let Some(terminator) = &block.terminator {
                writeln!(f, "  {}", terminator)?;
            }
        }
        writeln!(f, "}}")
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; ModuleID = '{}'", self.name)?;
        writeln!(f, "source_filename = \"{}\"", self.name)?;

        if !self.globals.is_empty() {
            writeln!(f)?;
        }
        for global in &self.globals {
            writeln!(f, "{}", global)?;
        }

        for func in &self.functions {
            writeln!(f)?;
            write!(f, "{}", func)?;
        }
        Ok(())
    }
}
