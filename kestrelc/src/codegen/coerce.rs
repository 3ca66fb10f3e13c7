//! Implicit conversions applied at declarations, assignments, returns,
//! call arguments and conditions.

use super::lowering::FunctionLowering;
use super::CodegenError;
use crate::ir::{CastOp, FloatPredicate, Instruction, IntPredicate, Type, Value};

impl FunctionLowering<'_> {
    /// Convert `value` to `target`. Only the numeric and boolean widenings
    /// are implicit; any other mismatch is an error.
    pub(super) fn coerce(&mut self, value: Value, target: Type) -> Result<Value, CodegenError> {
        let from = value.ty();
        if from == target {
            return Ok(value);
        }

        let converted = match (from, target) {
            (Type::Int32, Type::Float32) => self.cast(CastOp::SiToFp, value, target),
            (Type::Float32, Type::Int32) => self.cast(CastOp::FpToSi, value, target),
            (Type::Bool1, Type::Int32) => self.cast(CastOp::ZExt, value, target),
            (Type::Int32, Type::Bool1) => self.icmp(IntPredicate::Ne, value, Value::ConstInt(0)),
            _ => return Err(CodegenError::CannotConvert { from, to: target }),
        };
        Ok(converted)
    }

    /// Convert a branch condition to `i1`. Besides the integer rule this
    /// accepts floats (`!= 0.0`) and strings (non-null).
    pub(super) fn condition(&mut self, value: Value) -> Result<Value, CodegenError> {
        match value.ty() {
            Type::Float32 => Ok(self.builder.emit_value(Type::Bool1, |dest| {
                Instruction::FCmp {
                    dest,
                    pred: FloatPredicate::One,
                    lhs: value,
                    rhs: Value::ConstFloat(0.0),
                }
            })),
            Type::StringPtr => Ok(self.icmp(IntPredicate::Ne, value, Value::Null)),
            _ => self.coerce(value, Type::Bool1),
        }
    }

    /// Apply C default argument promotion for the variadic part of a call.
    pub(super) fn promote_vararg(&mut self, value: Value) -> Value {
        match value.ty() {
            Type::Float32 => self.cast(CastOp::FpExt, value, Type::Float64),
            Type::Bool1 => self.cast(CastOp::ZExt, value, Type::Int32),
            _ => value,
        }
    }

    pub(super) fn cast(&mut self, op: CastOp, value: Value, target: Type) -> Value {
        self.builder
            .emit_value(target, |dest| Instruction::Cast { dest, op, value })
    }

    pub(super) fn icmp(&mut self, pred: IntPredicate, lhs: Value, rhs: Value) -> Value {
        self.builder.emit_value(Type::Bool1, |dest| Instruction::ICmp {
            dest,
            pred,
            lhs,
            rhs,
        })
    }
}
