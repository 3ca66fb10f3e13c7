//! Cranelift backend implementation
//!
//! Compiles the IR to native code, either into a relocatable object file
//! or into memory for immediate execution.

use std::collections::HashMap;

use cranelift::codegen::ir::{FuncRef, StackSlot};
use cranelift::codegen::isa::OwnedTargetIsa;
use cranelift::prelude::{
    settings, types, AbiParam, Block, Configurable, FloatCC, FunctionBuilder,
    FunctionBuilderContext, InstBuilder, IntCC, Signature, StackSlotData, StackSlotKind,
    Value as ClifValue,
};
use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::{DataDescription, DataId, FuncId, Linkage, Module as ClifModule};
use cranelift_object::{ObjectBuilder, ObjectModule};
use tracing::{debug, info};

use crate::backend::runtime;
use crate::backend::Backend;
use crate::ir::{
    BinOp, CastOp, FloatPredicate, Function as IrFunction, Instruction, IntPredicate, Module,
    Terminator, Type, Value,
};
use crate::CompileError;

/// Cranelift code generator.
pub struct CraneliftBackend {
    /// Target ISA (instruction set architecture).
    target: String,
}

impl CraneliftBackend {
    /// Create a new Cranelift backend for the host.
    pub fn new() -> Result<Self, CompileError> {
        let isa = build_native_isa()?;
        Ok(Self {
            target: isa.triple().to_string(),
        })
    }

    /// Compile IR to object bytes.
    fn compile_module(&self, module: &Module) -> Result<Vec<u8>, CompileError> {
        let isa = build_native_isa()?;
        let builder = ObjectBuilder::new(
            isa,
            module.name.as_str(),
            cranelift_module::default_libcall_names(),
        )
        .map_err(module_error)?;
        let mut object_module = ObjectModule::new(builder);

        compile_into_module(&mut object_module, module)?;
        let product = object_module.finish();
        product.emit().map_err(|err| {
            CompileError::Backend(format!("failed to emit object bytes: {}", err))
        })
    }

    /// JIT-compile the module and run `main`, returning its result widened
    /// to `i64`. A void `main` yields 0.
    pub fn run_main(&self, module: &Module) -> Result<i64, CompileError> {
        let main = module
            .function("main")
            .filter(|function| !function.is_declaration())
            .ok_or_else(|| CompileError::InvalidIr("module has no `main` function".to_string()))?;
        if !main.params.is_empty() {
            return Err(CompileError::InvalidIr(
                "`main` must not take parameters".to_string(),
            ));
        }

        let mut jit_builder =
            JITBuilder::new(cranelift_module::default_libcall_names()).map_err(module_error)?;
        jit_builder.symbol(runtime::PRINTF_NONE, runtime::kestrel_printf as *const u8);
        jit_builder.symbol(runtime::PRINTF_INT, runtime::kestrel_printf_i32 as *const u8);
        jit_builder.symbol(runtime::PRINTF_DOUBLE, runtime::kestrel_printf_f64 as *const u8);
        jit_builder.symbol(runtime::PRINTF_STRING, runtime::kestrel_printf_str as *const u8);

        let mut jit_module = JITModule::new(jit_builder);
        let compiled = compile_into_module(&mut jit_module, module)?;
        jit_module.finalize_definitions().map_err(module_error)?;
        info!(module = %module.name, "finalized JIT module");

        let main_id = compiled.get("main").copied().ok_or_else(|| {
            CompileError::InvalidIr("module has no `main` function".to_string())
        })?;
        let code = jit_module.get_finalized_function(main_id);

        // SAFETY: `main` was defined above with no parameters and the
        // return type matched in each arm.
        let result = unsafe {
            match main.return_type {
                Type::Void => {
                    let main_fn: extern "C" fn() = std::mem::transmute(code);
                    main_fn();
                    0
                }
                Type::Int32 => {
                    let main_fn: extern "C" fn() -> i32 = std::mem::transmute(code);
                    i64::from(main_fn())
                }
                Type::Bool1 => {
                    let main_fn: extern "C" fn() -> i8 = std::mem::transmute(code);
                    i64::from(main_fn())
                }
                other => {
                    return Err(CompileError::Backend(format!(
                        "cannot run a `main` returning {}",
                        other
                    )))
                }
            }
        };
        Ok(result)
    }

    /// Get configured target triple.
    pub fn target(&self) -> &str {
        &self.target
    }
}

impl Backend for CraneliftBackend {
    fn generate(&self, module: &Module) -> Result<Vec<u8>, CompileError> {
        self.compile_module(module)
    }

    fn name(&self) -> &'static str {
        "cranelift"
    }
}

type CompiledFunctions = HashMap<String, FuncId>;

/// Runtime shims standing in for the variadic `printf`.
struct PrintfShims {
    none: FuncId,
    int: FuncId,
    double: FuncId,
    string: FuncId,
}

struct FunctionRefs {
    functions: HashMap<String, FuncRef>,
    printf_none: FuncRef,
    printf_int: FuncRef,
    printf_double: FuncRef,
    printf_string: FuncRef,
}

fn compile_into_module<M: ClifModule>(
    module: &mut M,
    ir_module: &Module,
) -> Result<CompiledFunctions, CompileError> {
    let shims = declare_printf_shims(module)?;

    let mut strings = HashMap::new();
    for global in &ir_module.globals {
        let data_id = module
            .declare_data(&global.name, Linkage::Local, false, false)
            .map_err(module_error)?;
        let mut data = DataDescription::new();
        data.define(global.bytes.clone().into_boxed_slice());
        module.define_data(data_id, &data).map_err(module_error)?;
        strings.insert(global.name.clone(), data_id);
    }

    let mut functions = HashMap::new();
    for function in ir_module.functions.iter().filter(|f| !f.is_declaration()) {
        let signature = make_signature(module, function)?;
        let func_id = module
            .declare_function(&function.name, Linkage::Export, &signature)
            .map_err(module_error)?;
        functions.insert(function.name.clone(), func_id);
    }

    for function in ir_module.functions.iter().filter(|f| !f.is_declaration()) {
        let func_id = *functions.get(&function.name).ok_or_else(|| {
            CompileError::InvalidIr(format!("missing function id for {}", function.name))
        })?;

        let mut context = module.make_context();
        context.func.signature = make_signature(module, function)?;

        {
            let mut builder_context = FunctionBuilderContext::new();
            let mut builder = FunctionBuilder::new(&mut context.func, &mut builder_context);
            let mut function_refs = HashMap::new();
            for (name, id) in &functions {
                let func_ref = module.declare_func_in_func(*id, builder.func);
                function_refs.insert(name.clone(), func_ref);
            }
            let refs = FunctionRefs {
                functions: function_refs,
                printf_none: module.declare_func_in_func(shims.none, builder.func),
                printf_int: module.declare_func_in_func(shims.int, builder.func),
                printf_double: module.declare_func_in_func(shims.double, builder.func),
                printf_string: module.declare_func_in_func(shims.string, builder.func),
            };

            let mut lowering = ClifLowering {
                module: &mut *module,
                strings: &strings,
                refs,
                slots: HashMap::new(),
                temps: HashMap::new(),
                params: Vec::new(),
                builder: &mut builder,
            };
            lowering.lower_function(function)?;
            builder.seal_all_blocks();
            builder.finalize();
        }

        module
            .define_function(func_id, &mut context)
            .map_err(module_error)?;
        debug!(function = %function.name, "defined native function");
    }

    Ok(functions)
}

/// Translation state for one function.
struct ClifLowering<'a, 'b, M: ClifModule> {
    module: &'a mut M,
    strings: &'a HashMap<String, DataId>,
    refs: FunctionRefs,
    slots: HashMap<usize, StackSlot>,
    temps: HashMap<usize, ClifValue>,
    params: Vec<ClifValue>,
    builder: &'a mut FunctionBuilder<'b>,
}

impl<M: ClifModule> ClifLowering<'_, '_, M> {
    fn lower_function(&mut self, ir_function: &IrFunction) -> Result<(), CompileError> {
        let mut block_ids: HashMap<&str, Block> = HashMap::new();
        for block in &ir_function.blocks {
            block_ids.insert(block.label.as_str(), self.builder.create_block());
        }

        let entry = ir_function
            .blocks
            .first()
            .and_then(|block| block_ids.get(block.label.as_str()).copied())
            .ok_or_else(|| CompileError::InvalidIr("missing entry block".to_string()))?;
        self.builder.append_block_params_for_function_params(entry);
        self.params = self.builder.block_params(entry).to_vec();

        for block in &ir_function.blocks {
            let clif_block = block_ids[block.label.as_str()];
            self.builder.switch_to_block(clif_block);

            for instruction in &block.instructions {
                self.lower_instruction(instruction)?;
            }

            let terminator = block.terminator.as_ref().ok_or_else(|| {
                CompileError::InvalidIr(format!("block '{}' has no terminator", block.label))
            })?;
            self.lower_terminator(terminator, &block_ids)?;
        }

        Ok(())
    }

    fn lower_instruction(&mut self, instruction: &Instruction) -> Result<(), CompileError> {
        match instruction {
            Instruction::Alloca { slot } => {
                let size = clif_type(self.pointer_type(), slot.ty)?.bytes();
                let stack_slot = self.builder.create_sized_stack_slot(StackSlotData::new(
                    StackSlotKind::ExplicitSlot,
                    size,
                    size.trailing_zeros() as u8,
                ));
                self.slots.insert(slot.id, stack_slot);
            }
            Instruction::Load { dest, slot } => {
                let stack_slot = self.slot(slot.id)?;
                let ty = clif_type(self.pointer_type(), slot.ty)?;
                let value = self.builder.ins().stack_load(ty, stack_slot, 0);
                self.temps.insert(dest.id, value);
            }
            Instruction::Store { slot, value } => {
                let stack_slot = self.slot(slot.id)?;
                let value = self.value(value)?;
                self.builder.ins().stack_store(value, stack_slot, 0);
            }
            Instruction::Binary { dest, op, lhs, rhs } => {
                let lhs = self.value(lhs)?;
                let rhs = self.value(rhs)?;
                let ins = self.builder.ins();
                let result = match op {
                    BinOp::Add => ins.iadd(lhs, rhs),
                    BinOp::Sub => ins.isub(lhs, rhs),
                    BinOp::Mul => ins.imul(lhs, rhs),
                    BinOp::SDiv => ins.sdiv(lhs, rhs),
                    BinOp::FAdd => ins.fadd(lhs, rhs),
                    BinOp::FSub => ins.fsub(lhs, rhs),
                    BinOp::FMul => ins.fmul(lhs, rhs),
                    BinOp::FDiv => ins.fdiv(lhs, rhs),
                };
                self.temps.insert(dest.id, result);
            }
            Instruction::ICmp {
                dest,
                pred,
                lhs,
                rhs,
            } => {
                let lhs = self.value(lhs)?;
                let rhs = self.value(rhs)?;
                let result = self.builder.ins().icmp(int_cc(*pred), lhs, rhs);
                self.temps.insert(dest.id, result);
            }
            Instruction::FCmp {
                dest,
                pred,
                lhs,
                rhs,
            } => {
                let lhs = self.value(lhs)?;
                let rhs = self.value(rhs)?;
                let result = self.builder.ins().fcmp(float_cc(*pred), lhs, rhs);
                self.temps.insert(dest.id, result);
            }
            Instruction::Cast { dest, op, value } => {
                let value = self.value(value)?;
                let target = clif_type(self.pointer_type(), dest.ty)?;
                let ins = self.builder.ins();
                let result = match op {
                    CastOp::SiToFp => ins.fcvt_from_sint(target, value),
                    CastOp::FpToSi => ins.fcvt_to_sint_sat(target, value),
                    CastOp::ZExt => ins.uextend(target, value),
                    CastOp::FpExt => ins.fpromote(target, value),
                };
                self.temps.insert(dest.id, result);
            }
            Instruction::Call {
                dest, callee, args, ..
            } => {
                let mut lowered = Vec::with_capacity(args.len());
                for arg in args {
                    lowered.push(self.value(arg)?);
                }

                let func_ref = if callee == "printf" {
                    self.printf_shim(args)?
                } else {
                    self.refs.functions.get(callee).copied().ok_or_else(|| {
                        CompileError::InvalidIr(format!("unknown call target '{}'", callee))
                    })?
                };

                let call = self.builder.ins().call(func_ref, &lowered);
                if let Some(dest) = dest {
                    let result = self.builder.inst_results(call).first().copied().ok_or_else(
                        || CompileError::InvalidIr(format!("call to '{}' has no result", callee)),
                    )?;
                    self.temps.insert(dest.id, result);
                }
            }
            Instruction::StringAddress { dest, global, .. } => {
                let data_id = *self.strings.get(global).ok_or_else(|| {
                    CompileError::InvalidIr(format!("unknown global '{}'", global))
                })?;
                let global_value = self.module.declare_data_in_func(data_id, self.builder.func);
                let ptr_ty = self.pointer_type();
                let address = self.builder.ins().global_value(ptr_ty, global_value);
                self.temps.insert(dest.id, address);
            }
            Instruction::Select {
                dest,
                cond,
                then_value,
                else_value,
            } => {
                let cond = self.value(cond)?;
                let then_value = self.value(then_value)?;
                let else_value = self.value(else_value)?;
                let result = self.builder.ins().select(cond, then_value, else_value);
                self.temps.insert(dest.id, result);
            }
        }
        Ok(())
    }

    fn lower_terminator(
        &mut self,
        terminator: &Terminator,
        block_ids: &HashMap<&str, Block>,
    ) -> Result<(), CompileError> {
        let target = |label: &str| {
            block_ids.get(label).copied().ok_or_else(|| {
                CompileError::InvalidIr(format!("unknown branch target '{}'", label))
            })
        };

        match terminator {
            Terminator::Ret(Some(value)) => {
                let value = self.value(value)?;
                self.builder.ins().return_(&[value]);
            }
            Terminator::Ret(None) => {
                self.builder.ins().return_(&[]);
            }
            Terminator::Br(label) => {
                let block = target(label)?;
                self.builder.ins().jump(block, &[]);
            }
            Terminator::CondBr {
                cond,
                then_label,
                else_label,
            } => {
                let then_block = target(then_label)?;
                let else_block = target(else_label)?;
                let cond = self.value(cond)?;
                self.builder
                    .ins()
                    .brif(cond, then_block, &[], else_block, &[]);
            }
        }
        Ok(())
    }

    /// Pick the shim matching the shape of the value argument, if any.
    fn printf_shim(&self, args: &[Value]) -> Result<FuncRef, CompileError> {
        match args {
            [_] => Ok(self.refs.printf_none),
            [_, value] => match value.ty() {
                Type::Int32 => Ok(self.refs.printf_int),
                Type::Float64 => Ok(self.refs.printf_double),
                Type::StringPtr => Ok(self.refs.printf_string),
                other => Err(CompileError::InvalidIr(format!(
                    "printf argument of type {} was not promoted",
                    other
                ))),
            },
            _ => Err(CompileError::Backend(format!(
                "printf with {} value arguments is not supported natively",
                args.len().saturating_sub(1)
            ))),
        }
    }

    fn value(&mut self, value: &Value) -> Result<ClifValue, CompileError> {
        let pointer = self.pointer_type();
        match value {
            Value::ConstInt(value) => Ok(self.builder.ins().iconst(types::I32, i64::from(*value))),
            Value::ConstFloat(value) => Ok(self.builder.ins().f32const(*value)),
            Value::ConstDouble(value) => Ok(self.builder.ins().f64const(*value)),
            Value::ConstBool(value) => Ok(self.builder.ins().iconst(types::I8, i64::from(*value))),
            Value::Null => Ok(self.builder.ins().iconst(pointer, 0)),
            Value::Param { index, name, .. } => self.params.get(*index).copied().ok_or_else(|| {
                CompileError::InvalidIr(format!("unknown parameter '{}'", name))
            }),
            Value::Temp(temp) => self.temps.get(&temp.id).copied().ok_or_else(|| {
                CompileError::InvalidIr(format!("temporary {} used before definition", temp))
            }),
        }
    }

    fn slot(&self, id: usize) -> Result<StackSlot, CompileError> {
        self.slots
            .get(&id)
            .copied()
            .ok_or_else(|| CompileError::InvalidIr(format!("stack slot {} used before alloca", id)))
    }

    fn pointer_type(&self) -> types::Type {
        self.module.target_config().pointer_type()
    }
}

fn int_cc(pred: IntPredicate) -> IntCC {
    match pred {
        IntPredicate::Eq => IntCC::Equal,
        IntPredicate::Ne => IntCC::NotEqual,
        IntPredicate::Slt => IntCC::SignedLessThan,
        IntPredicate::Sle => IntCC::SignedLessThanOrEqual,
        IntPredicate::Sgt => IntCC::SignedGreaterThan,
        IntPredicate::Sge => IntCC::SignedGreaterThanOrEqual,
    }
}

fn float_cc(pred: FloatPredicate) -> FloatCC {
    match pred {
        FloatPredicate::Oeq => FloatCC::Equal,
        FloatPredicate::One => FloatCC::OrderedNotEqual,
        FloatPredicate::Olt => FloatCC::LessThan,
        FloatPredicate::Ole => FloatCC::LessThanOrEqual,
        FloatPredicate::Ogt => FloatCC::GreaterThan,
        FloatPredicate::Oge => FloatCC::GreaterThanOrEqual,
    }
}

fn make_signature<M: ClifModule>(
    module: &M,
    function: &IrFunction,
) -> Result<Signature, CompileError> {
    let pointer = module.target_config().pointer_type();
    let mut signature = module.make_signature();

    for param in &function.params {
        signature
            .params
            .push(AbiParam::new(clif_type(pointer, param.ty)?));
    }

    if function.return_type != Type::Void {
        signature
            .returns
            .push(AbiParam::new(clif_type(pointer, function.return_type)?));
    }

    Ok(signature)
}

fn declare_printf_shims<M: ClifModule>(module: &mut M) -> Result<PrintfShims, CompileError> {
    let pointer = module.target_config().pointer_type();
    let mut declare = |name: &str, extra: Option<types::Type>| {
        let mut signature = module.make_signature();
        signature.params.push(AbiParam::new(pointer));
        if let Some(ty) = extra {
            signature.params.push(AbiParam::new(ty));
        }
        signature.returns.push(AbiParam::new(types::I32));
        module
            .declare_function(name, Linkage::Import, &signature)
            .map_err(module_error)
    };

    Ok(PrintfShims {
        none: declare(runtime::PRINTF_NONE, None)?,
        int: declare(runtime::PRINTF_INT, Some(types::I32))?,
        double: declare(runtime::PRINTF_DOUBLE, Some(types::F64))?,
        string: declare(runtime::PRINTF_STRING, Some(pointer))?,
    })
}

/// Cranelift type for an IR type. Booleans are carried as `i8` 0/1, the
/// result type of Cranelift comparisons.
fn clif_type(pointer: types::Type, ty: Type) -> Result<types::Type, CompileError> {
    match ty {
        Type::Int32 => Ok(types::I32),
        Type::Float32 => Ok(types::F32),
        Type::Float64 => Ok(types::F64),
        Type::Bool1 => Ok(types::I8),
        Type::StringPtr => Ok(pointer),
        Type::Void => Err(CompileError::InvalidIr(
            "void cannot be used as a concrete value type".to_string(),
        )),
    }
}

fn build_native_isa() -> Result<OwnedTargetIsa, CompileError> {
    let mut flags = settings::builder();
    flags.set("is_pic", "true").map_err(|err| {
        CompileError::Backend(format!("failed to set Cranelift flag: {}", err))
    })?;

    let isa_builder = cranelift_native::builder().map_err(|msg| {
        CompileError::Backend(format!(
            "host machine is not supported by Cranelift: {}",
            msg
        ))
    })?;

    isa_builder
        .finish(settings::Flags::new(flags))
        .map_err(module_error)
}

fn module_error(err: impl std::fmt::Display) -> CompileError {
    CompileError::Backend(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_creation() {
        let backend = CraneliftBackend::new().unwrap();
        assert_eq!(backend.name(), "cranelift");
        assert!(!backend.target().is_empty());
    }

    #[test]
    fn booleans_are_bytes() {
        assert_eq!(clif_type(types::I64, Type::Bool1).unwrap(), types::I8);
        assert!(clif_type(types::I64, Type::Void).is_err());
    }
}
