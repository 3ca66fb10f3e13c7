//! AST to IR lowering
//!
//! This module converts one Kestrel function body into basic blocks.
//! Variables live in stack slots; every read is a `load` and every write a
//! `store`, so no phi nodes are needed at merge points.

use kestrel::parser::ast::{BinaryOp as AstBinaryOp, Block, Expr, FunctionDecl, Stmt};

use super::builtins::{self, Builtin, PrintHelper, RuntimeUsage};
use super::interner::StringInterner;
use super::scope::{Binding, Scope};
use super::{lower_type, CodegenError, SignatureTable};
use crate::ir::builder::FunctionBuilder;
use crate::ir::{
    BinOp, FloatPredicate, Function, Instruction, IntPredicate, Parameter, Terminator, Type,
    Value,
};

/// Lower one function declaration. Signatures of every function in the
/// program must already be in `signatures`.
pub fn lower_function(
    decl: &FunctionDecl,
    signatures: &SignatureTable,
    interner: &mut StringInterner,
    runtime: &mut RuntimeUsage,
) -> Result<Function, CodegenError> {
    let params = decl
        .params
        .iter()
        .map(|param| Parameter {
            name: param.name.clone(),
            ty: lower_type(param.ty),
        })
        .collect();

    let mut lowering = FunctionLowering {
        signatures,
        interner,
        runtime,
        builder: FunctionBuilder::new(decl.name.clone(), params, lower_type(decl.return_type)),
        scope: Scope::new(),
        next_label: 0,
    };
    lowering.lower_body(&decl.body)?;
    Ok(lowering.builder.build())
}

/// Generation state for one function.
pub(crate) struct FunctionLowering<'a> {
    signatures: &'a SignatureTable,
    interner: &'a mut StringInterner,
    runtime: &'a mut RuntimeUsage,
    pub(super) builder: FunctionBuilder,
    scope: Scope,
    next_label: usize,
}

impl FunctionLowering<'_> {
    fn lower_body(&mut self, body: &Block) -> Result<(), CodegenError> {
        let entry = self.builder.create_block("entry");
        self.builder.switch_to_block(entry);

        let params = self.builder.params().to_vec();
        for (index, param) in params.into_iter().enumerate() {
            let slot = self.builder.alloca(&param.name, param.ty);
            self.builder.add_instruction(Instruction::Store {
                slot: slot.clone(),
                value: Value::Param {
                    index,
                    name: param.name.clone(),
                    ty: param.ty,
                },
            });
            self.scope.bind(param.name, Binding::Slot(slot));
        }

        self.lower_block(body)?;

        if !self.builder.is_terminated() {
            let ret = self.builder.return_type().zero_value();
            self.builder.terminate(Terminator::Ret(ret));
        }
        Ok(())
    }

    fn lower_block(&mut self, block: &Block) -> Result<(), CodegenError> {
        for stmt in &block.statements {
            // Code after a terminator in the same block is unreachable.
            if self.builder.is_terminated() {
                break;
            }
            self.lower_stmt(stmt)?;
        }
        Ok(())
    }

    fn lower_stmt(&mut self, stmt: &Stmt) -> Result<(), CodegenError> {
        match stmt {
            Stmt::VarDecl {
                name,
                declared_type,
                initializer,
                ..
            } => self.lower_var_decl(name, declared_type.map(lower_type), initializer.as_ref()),
            Stmt::Return { value } => self.lower_return(value.as_ref()),
            Stmt::If {
                condition,
                then_block,
                else_block,
            } => self.lower_if(condition, then_block, else_block.as_ref()),
            Stmt::While { condition, body } => self.lower_while(condition, body),
            Stmt::Assign { name, value } => self.lower_assign(name, value),
            Stmt::Expr(expr) => {
                self.lower_expr(expr)?;
                Ok(())
            }
        }
    }

    fn lower_var_decl(
        &mut self,
        name: &str,
        declared: Option<Type>,
        initializer: Option<&Expr>,
    ) -> Result<(), CodegenError> {
        let (ty, value) = match (declared, initializer) {
            (Some(ty), Some(init)) => {
                let value = self.lower_value(init)?;
                (ty, self.coerce(value, ty)?)
            }
            (Some(ty), None) => match ty.zero_value() {
                Some(zero) => (ty, zero),
                None => return Err(CodegenError::CannotConvert { from: ty, to: ty }),
            },
            (None, Some(init)) => {
                let value = self.lower_value(init)?;
                (value.ty(), value)
            }
            (None, None) => return Err(CodegenError::MissingInitializer(name.to_string())),
        };

        let slot = self.builder.alloca(name, ty);
        self.builder.add_instruction(Instruction::Store {
            slot: slot.clone(),
            value,
        });
        self.scope.bind(name, Binding::Slot(slot));
        Ok(())
    }

    fn lower_return(&mut self, value: Option<&Expr>) -> Result<(), CodegenError> {
        let ret_ty = self.builder.return_type();
        let ret = match (ret_ty.zero_value(), value) {
            (None, _) => None,
            (Some(zero), None) => Some(zero),
            (Some(_), Some(expr)) => {
                let value = self.lower_value(expr)?;
                Some(self.coerce(value, ret_ty)?)
            }
        };
        self.builder.terminate(Terminator::Ret(ret));
        Ok(())
    }

    fn lower_if(
        &mut self,
        condition: &Expr,
        then_body: &Block,
        else_body: Option<&Block>,
    ) -> Result<(), CodegenError> {
        let cond = self.lower_value(condition)?;
        let cond = self.condition(cond)?;

        let id = self.fresh_label_id();
        let then_block = self.builder.create_block(format!("if.then.{}", id));
        let else_block = else_body.map(|_| self.builder.create_block(format!("if.else.{}", id)));
        let merge_block = self.builder.create_block(format!("if.merge.{}", id));

        let then_label = self.builder.label(then_block);
        let merge_label = self.builder.label(merge_block);
        let else_label = match else_block {
            Some(block) => self.builder.label(block),
            None => merge_label.clone(),
        };
        self.builder.terminate(Terminator::CondBr {
            cond,
            then_label,
            else_label,
        });

        self.builder.switch_to_block(then_block);
        self.lower_block(then_body)?;
        self.builder.terminate(Terminator::Br(merge_label.clone()));

        if let (Some(block), Some(body)) = (else_block, else_body) {
            self.builder.switch_to_block(block);
            self.lower_block(body)?;
            self.builder.terminate(Terminator::Br(merge_label));
        }

        self.builder.switch_to_block(merge_block);
        Ok(())
    }

    fn lower_while(&mut self, condition: &Expr, body: &Block) -> Result<(), CodegenError> {
        let id = self.fresh_label_id();
        let cond_block = self.builder.create_block(format!("while.cond.{}", id));
        let body_block = self.builder.create_block(format!("while.body.{}", id));
        let end_block = self.builder.create_block(format!("while.end.{}", id));
        let cond_label = self.builder.label(cond_block);
        let body_label = self.builder.label(body_block);
        let end_label = self.builder.label(end_block);

        self.builder.terminate(Terminator::Br(cond_label.clone()));

        self.builder.switch_to_block(cond_block);
        let cond = self.lower_value(condition)?;
        let cond = self.condition(cond)?;
        self.builder.terminate(Terminator::CondBr {
            cond,
            then_label: body_label,
            else_label: end_label,
        });

        self.builder.switch_to_block(body_block);
        self.lower_block(body)?;
        self.builder.terminate(Terminator::Br(cond_label));

        self.builder.switch_to_block(end_block);
        Ok(())
    }

    fn lower_assign(&mut self, name: &str, value: &Expr) -> Result<(), CodegenError> {
        let slot = match self.scope.lookup(name) {
            Some(Binding::Slot(slot)) => slot.clone(),
            Some(Binding::Value(_)) => return Err(CodegenError::NotAssignable(name.to_string())),
            None => return Err(CodegenError::UndefinedVariable(name.to_string())),
        };

        let value = self.lower_value(value)?;
        let value = self.coerce(value, slot.ty)?;
        self.builder.add_instruction(Instruction::Store { slot, value });
        Ok(())
    }

    fn fresh_label_id(&mut self) -> usize {
        let id = self.next_label;
        self.next_label += 1;
        id
    }

    /// Lower an expression used for its value. A void call yields the
    /// placeholder `i32 0`.
    fn lower_value(&mut self, expr: &Expr) -> Result<Value, CodegenError> {
        Ok(self.lower_expr(expr)?.unwrap_or(Value::ConstInt(0)))
    }

    /// Lower an expression; `None` means a call to a void function.
    fn lower_expr(&mut self, expr: &Expr) -> Result<Option<Value>, CodegenError> {
        let value = match expr {
            Expr::Int(value) => {
                let value =
                    i32::try_from(*value).map_err(|_| CodegenError::IntegerOutOfRange(*value))?;
                Value::ConstInt(value)
            }
            Expr::Float(value) => Value::ConstFloat(*value as f32),
            Expr::Bool(value) => Value::ConstBool(*value),
            Expr::String(raw) => {
                let interned = self.interner.intern_literal(raw);
                self.builder
                    .emit_value(Type::StringPtr, |dest| Instruction::StringAddress {
                        dest,
                        global: interned.name,
                        len: interned.len,
                    })
            }
            Expr::Identifier(name) => match self.scope.lookup(name) {
                Some(Binding::Slot(slot)) => {
                    let slot = slot.clone();
                    self.builder
                        .emit_value(slot.ty, |dest| Instruction::Load { dest, slot })
                }
                Some(Binding::Value(value)) => value.clone(),
                None => return Err(CodegenError::UndefinedVariable(name.clone())),
            },
            Expr::Binary { lhs, op, rhs } => self.lower_binary(lhs, *op, rhs)?,
            Expr::Call { callee, args } => return self.lower_call(callee, args),
        };
        Ok(Some(value))
    }

    fn lower_binary(
        &mut self,
        lhs: &Expr,
        op: AstBinaryOp,
        rhs: &Expr,
    ) -> Result<Value, CodegenError> {
        let mut lhs = self.lower_value(lhs)?;
        let mut rhs = self.lower_value(rhs)?;

        // Mixed int/float operands widen the integer side.
        match (lhs.ty(), rhs.ty()) {
            (Type::Int32, Type::Float32) => lhs = self.coerce(lhs, Type::Float32)?,
            (Type::Float32, Type::Int32) => rhs = self.coerce(rhs, Type::Float32)?,
            _ => {}
        }

        let (ty, rhs_ty) = (lhs.ty(), rhs.ty());
        let invalid = || CodegenError::InvalidOperands {
            op: op.symbol(),
            lhs: ty,
            rhs: rhs_ty,
        };
        if ty != rhs_ty {
            return Err(invalid());
        }

        if op.is_comparison() {
            return match ty {
                Type::Float32 => {
                    let pred = float_predicate(op);
                    Ok(self.builder.emit_value(Type::Bool1, |dest| Instruction::FCmp {
                        dest,
                        pred,
                        lhs,
                        rhs,
                    }))
                }
                Type::Int32 => Ok(self.icmp(int_predicate(op), lhs, rhs)),
                Type::Bool1 | Type::StringPtr
                    if matches!(op, AstBinaryOp::Equal | AstBinaryOp::NotEqual) =>
                {
                    Ok(self.icmp(int_predicate(op), lhs, rhs))
                }
                _ => Err(invalid()),
            };
        }

        let bin_op = match (ty, op) {
            (Type::Int32, AstBinaryOp::Add) => BinOp::Add,
            (Type::Int32, AstBinaryOp::Subtract) => BinOp::Sub,
            (Type::Int32, AstBinaryOp::Multiply) => BinOp::Mul,
            (Type::Int32, AstBinaryOp::Divide) => BinOp::SDiv,
            (Type::Float32, AstBinaryOp::Add) => BinOp::FAdd,
            (Type::Float32, AstBinaryOp::Subtract) => BinOp::FSub,
            (Type::Float32, AstBinaryOp::Multiply) => BinOp::FMul,
            (Type::Float32, AstBinaryOp::Divide) => BinOp::FDiv,
            _ => return Err(invalid()),
        };
        Ok(self.builder.emit_value(ty, |dest| Instruction::Binary {
            dest,
            op: bin_op,
            lhs,
            rhs,
        }))
    }

    fn lower_call(&mut self, callee: &str, args: &[Expr]) -> Result<Option<Value>, CodegenError> {
        match Builtin::from_name(callee) {
            Some(Builtin::Printf) => return self.lower_printf(args).map(Some),
            Some(builtin) => return self.lower_print(builtin, args),
            None => {}
        }

        let signature = self
            .signatures
            .get(callee)
            .ok_or_else(|| CodegenError::UndefinedFunction(callee.to_string()))?;
        if signature.params.len() != args.len() {
            return Err(CodegenError::ArityMismatch {
                name: callee.to_string(),
                expected: signature.params.len(),
                found: args.len(),
            });
        }
        let params = signature.params.clone();
        let ret = signature.ret;

        let mut lowered = Vec::with_capacity(args.len());
        for (arg, ty) in args.iter().zip(params) {
            let value = self.lower_value(arg)?;
            lowered.push(self.coerce(value, ty)?);
        }

        let dest = (ret != Type::Void).then(|| self.builder.new_temp(ret));
        self.builder.add_instruction(Instruction::Call {
            dest,
            callee: callee.to_string(),
            args: lowered,
            ret,
            variadic_params: None,
        });
        Ok(dest.map(Value::Temp))
    }

    /// `print` and the typed `print_*` names dispatch on the IR type of
    /// the argument, not on the name used.
    fn lower_print(
        &mut self,
        builtin: Builtin,
        args: &[Expr],
    ) -> Result<Option<Value>, CodegenError> {
        let [arg] = args else {
            return Err(CodegenError::ArityMismatch {
                name: builtin.name().to_string(),
                expected: 1,
                found: args.len(),
            });
        };

        let value = self.lower_value(arg)?;
        let helper = PrintHelper::for_type(value.ty()).ok_or(CodegenError::CannotConvert {
            from: value.ty(),
            to: Type::StringPtr,
        })?;
        self.runtime.use_helper(helper);

        self.builder.add_instruction(Instruction::Call {
            dest: None,
            callee: helper.name().to_string(),
            args: vec![value],
            ret: Type::Void,
            variadic_params: None,
        });
        Ok(None)
    }

    fn lower_printf(&mut self, args: &[Expr]) -> Result<Value, CodegenError> {
        let (format, rest) = args.split_first().ok_or(CodegenError::MissingFormat)?;
        let format = self.lower_value(format)?;
        if format.ty() != Type::StringPtr {
            return Err(CodegenError::FormatNotString(format.ty()));
        }

        let mut lowered = vec![format];
        for arg in rest {
            // Void calls run for their effect and pass nothing.
            if let Some(value) = self.lower_expr(arg)? {
                lowered.push(self.promote_vararg(value));
            }
        }

        self.runtime.use_printf();
        Ok(builtins::printf_call(&mut self.builder, lowered))
    }
}

fn int_predicate(op: AstBinaryOp) -> IntPredicate {
    match op {
        AstBinaryOp::Equal => IntPredicate::Eq,
        AstBinaryOp::NotEqual => IntPredicate::Ne,
        AstBinaryOp::Less => IntPredicate::Slt,
        AstBinaryOp::LessEqual => IntPredicate::Sle,
        AstBinaryOp::Greater => IntPredicate::Sgt,
        _ => IntPredicate::Sge,
    }
}

fn float_predicate(op: AstBinaryOp) -> FloatPredicate {
    match op {
        AstBinaryOp::Equal => FloatPredicate::Oeq,
        AstBinaryOp::NotEqual => FloatPredicate::One,
        AstBinaryOp::Less => FloatPredicate::Olt,
        AstBinaryOp::LessEqual => FloatPredicate::Ole,
        AstBinaryOp::Greater => FloatPredicate::Ogt,
        _ => FloatPredicate::Oge,
    }
}
