//! Weaving code fragments into existing method bodies.
//!
//! A fragment is an ordinary method whose body is translated into the target body instead of
//! being called. Translation rebinds the fragment's view of the world onto the target:
//!
//! - fragment locals get fresh slots after the target's locals,
//! - fragment arguments address the target's arguments (a receiver-less fragment sees the
//!   target's declared parameters, whatever the target's receiver),
//! - symbolic operands are imported into the target's module,
//! - exception handlers move along with the fragment code.
//!
//! Both bodies are normalized first: compact slot forms are expanded and short branches are
//! widened, so indices can be rewritten freely.
//!
//! [`CodeSplicer::splice_before`] runs the fragment on entry and lets its `ret` fall into the
//! original code. [`CodeSplicer::splice_after`] runs the fragment on every exit. For a
//! value-returning target the fragment declares one parameter more than the target; that
//! parameter holds the value the target was about to return and the fragment's own return
//! value becomes the method's result.

use log::{debug, trace, warn};

use crate::{
    assembly::{Instruction, OpCode, Operand},
    metadata::{
        exceptions::ExceptionHandler,
        image::Image,
        method::{LocalVariable, MethodBody},
        token::Token,
    },
    Result,
};

/// A fragment translated for one target, not yet inserted.
struct Translated {
    instructions: Vec<Instruction>,
    exception_handlers: Vec<ExceptionHandler>,
    locals: Vec<LocalVariable>,
    max_stack: u16,
    reads_result: bool,
}

/// Splices fragments into method bodies of an [`Image`].
pub struct CodeSplicer<'a> {
    image: &'a mut Image,
}

impl<'a> CodeSplicer<'a> {
    /// Creates a splicer over `image`.
    pub fn new(image: &'a mut Image) -> Self {
        CodeSplicer { image }
    }

    /// Inserts `fragment` in front of the body of `target`.
    ///
    /// Every `ret` of the fragment becomes a branch to the target's original first
    /// instruction.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PreconditionViolated`] if a body is missing or the fragment
    /// addresses an argument the target lacks.
    pub fn splice_before(&mut self, target: Token, fragment: Token) -> Result<()> {
        let local_base = self.local_count(target)?;
        let translated = self.translate(target, fragment, local_base, None)?;
        let Translated {
            mut instructions,
            mut exception_handlers,
            locals,
            max_stack,
            ..
        } = translated;

        let entry = instructions.len();
        for instruction in &mut instructions {
            if instruction.is_return() {
                *instruction = Instruction::branch(entry);
            }
        }

        let body = self.body_mut(target)?;
        body.normalize();
        body.shift_targets(entry);
        instructions.append(&mut body.instructions);
        exception_handlers.append(&mut body.exception_handlers);
        body.instructions = instructions;
        body.exception_handlers = exception_handlers;
        body.locals.extend(locals);
        body.max_stack = body.max_stack.max(max_stack);

        debug!("spliced {fragment} before {target} ({entry} instructions)");
        Ok(())
    }

    /// Appends `fragment` so it runs whenever `target` returns.
    ///
    /// For a `void` target, every `ret` is redirected to a landing pad after which the
    /// fragment runs; the fragment's `ret` leaves the method. For a value-returning target,
    /// the fragment takes one parameter more than the target; the value being returned is
    /// stored in a new local that this parameter reads, and the fragment's result is
    /// returned instead.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PreconditionViolated`] if the fragment's arity or return type
    /// does not fit the target, or a value-returning target does not end in `ret`.
    pub fn splice_after(&mut self, target: Token, fragment: Token) -> Result<()> {
        let target_def = self.image.method(target)?;
        let fragment_def = self.image.method(fragment)?;

        if target_def.returns_void() {
            if !fragment_def.returns_void() {
                return Err(precondition_error!(
                    "fragment {} returns a value but {} is void",
                    fragment_def.name,
                    target_def.name
                ));
            }
            return self.splice_after_void(target, fragment);
        }

        if fragment_def.params.len() != target_def.params.len() + 1 {
            return Err(precondition_error!(
                "fragment {} takes {} parameters, {} expected for {}",
                fragment_def.name,
                fragment_def.params.len(),
                target_def.params.len() + 1,
                target_def.name
            ));
        }
        if fragment_def.returns_void() {
            return Err(precondition_error!(
                "fragment {} must return the result of {}",
                fragment_def.name,
                target_def.name
            ));
        }
        self.splice_after_value(target, fragment)
    }

    fn splice_after_void(&mut self, target: Token, fragment: Token) -> Result<()> {
        let local_base = self.local_count(target)?;
        let translated = self.translate(target, fragment, local_base, None)?;

        let body = self.body_mut(target)?;
        body.normalize();
        let pad = match body.instructions.last() {
            Some(last) if last.is_return() => body.len() - 1,
            _ => {
                body.instructions.push(Instruction::simple(OpCode::Nop));
                body.len() - 1
            }
        };
        body.instructions[pad] = Instruction::simple(OpCode::Nop);
        Self::redirect_returns(body, pad);

        let count = translated.instructions.len();
        Self::append(body, translated, pad + 1);
        debug!("spliced {fragment} after {target} ({count} instructions, pad at {pad})");
        Ok(())
    }

    fn splice_after_value(&mut self, target: Token, fragment: Token) -> Result<()> {
        let body = self.body(target)?;
        if !body.instructions.last().is_some_and(Instruction::is_return) {
            return Err(precondition_error!(
                "value-returning {} does not end in ret",
                target
            ));
        }
        let result_local = self.local_count(target)?;
        let local_base = result_local
            .checked_add(1)
            .ok_or_else(|| precondition_error!("{} has too many locals", target))?;
        let return_type = self.image.method(target)?.return_type.clone();

        let translated = self.translate(target, fragment, local_base, Some(result_local))?;
        if !translated.reads_result {
            warn!("fragment {fragment} never reads the result of {target}");
        }

        let body = self.body_mut(target)?;
        body.normalize();
        body.locals.push(LocalVariable::new(return_type));
        let boundary = body.len() - 1;
        body.instructions[boundary] = Instruction::new(OpCode::Stloc, Operand::Local(result_local));
        Self::redirect_returns(body, boundary);

        let count = translated.instructions.len();
        Self::append(body, translated, boundary + 1);
        debug!(
            "spliced {fragment} after {target} ({count} instructions, result in V_{result_local})"
        );
        Ok(())
    }

    /// Turns every `ret` before `boundary` into a branch to `boundary`.
    fn redirect_returns(body: &mut MethodBody, boundary: usize) {
        for (index, instruction) in body.instructions[..boundary].iter_mut().enumerate() {
            if instruction.is_return() {
                trace!("ret at {index} -> br {boundary}");
                *instruction = Instruction::branch(boundary);
            }
        }
    }

    /// Appends a translated fragment whose first instruction lands at `start`.
    fn append(body: &mut MethodBody, translated: Translated, start: usize) {
        let Translated {
            instructions,
            exception_handlers,
            locals,
            max_stack,
            ..
        } = translated;

        body.instructions.extend(instructions.into_iter().map(|mut instruction| {
            instruction.operand.remap_targets(|target| target + start);
            instruction
        }));
        body.exception_handlers
            .extend(exception_handlers.into_iter().map(|mut handler| {
                handler.shift(start);
                handler
            }));
        body.locals.extend(locals);
        body.max_stack = body.max_stack.max(max_stack);
    }

    /// Rewrites a copy of the fragment body for `target`.
    ///
    /// Fragment locals are renumbered from `local_base`. With `result_local`, the last
    /// fragment parameter is redirected to that local.
    fn translate(
        &mut self,
        target: Token,
        fragment: Token,
        local_base: u16,
        result_local: Option<u16>,
    ) -> Result<Translated> {
        let module = self.image.owner_module(target)?;
        let target_def = self.image.method(target)?;
        let target_receiver = target_def.receiver_slots();
        let target_params = target_def.params.len();
        let target_name = target_def.name.clone();
        self.body(target)?;

        let fragment_def = self.image.method(fragment)?;
        let fragment_receiver = fragment_def.receiver_slots();
        let result_param = result_local.map(|_| fragment_def.params.len().saturating_sub(1));
        let mut body = fragment_def
            .body
            .clone()
            .ok_or_else(|| precondition_error!("fragment {} has no body", fragment_def.name))?;
        body.normalize();

        let mut reads_result = false;
        for instruction in &mut body.instructions {
            let operand = std::mem::replace(&mut instruction.operand, Operand::None);
            let (opcode, operand) = match operand {
                Operand::Local(index) => {
                    let index = index
                        .checked_add(local_base)
                        .ok_or_else(|| precondition_error!("{} has too many locals", target))?;
                    (instruction.opcode, Operand::Local(index))
                }
                Operand::Argument(0) if fragment_receiver == 1 => {
                    if target_receiver == 0 {
                        return Err(precondition_error!(
                            "fragment {} uses a receiver but {} has none",
                            fragment,
                            target_name
                        ));
                    }
                    (instruction.opcode, Operand::Argument(0))
                }
                Operand::Argument(slot) => {
                    let param = usize::from(slot - fragment_receiver);
                    match result_local {
                        Some(local) if Some(param) == result_param => {
                            reads_result |= instruction.opcode == OpCode::Ldarg;
                            (to_local_opcode(instruction.opcode), Operand::Local(local))
                        }
                        _ if param >= target_params => {
                            return Err(precondition_error!(
                                "fragment {} addresses parameter {} but {} has {}",
                                fragment,
                                param,
                                target_name,
                                target_params
                            ))
                        }
                        _ => {
                            let slot = u16::try_from(param)
                                .ok()
                                .and_then(|param| param.checked_add(target_receiver))
                                .ok_or_else(|| precondition_error!("argument slot {} overflows", param))?;
                            (instruction.opcode, Operand::Argument(slot))
                        }
                    }
                }
                Operand::Token(token) => {
                    let imported = self.image.import(token, module)?;
                    (instruction.opcode, Operand::Token(imported))
                }
                other => (instruction.opcode, other),
            };
            instruction.opcode = opcode;
            instruction.operand = operand;
        }

        let mut locals = Vec::with_capacity(body.locals.len());
        for local in &body.locals {
            locals.push(LocalVariable {
                signature: self.image.import_signature(&local.signature, module)?,
                is_pinned: local.is_pinned,
            });
        }
        for handler in &mut body.exception_handlers {
            if let Some(catch_type) = handler.catch_type.as_ref() {
                handler.catch_type = Some(self.image.import_signature(catch_type, module)?);
            }
        }

        Ok(Translated {
            instructions: body.instructions,
            exception_handlers: body.exception_handlers,
            locals,
            max_stack: body.max_stack,
            reads_result,
        })
    }

    fn local_count(&self, method: Token) -> Result<u16> {
        let count = self.body(method)?.locals.len();
        u16::try_from(count).map_err(|_| precondition_error!("{} has too many locals", method))
    }

    fn body(&self, method: Token) -> Result<&MethodBody> {
        let def = self.image.method(method)?;
        match def.body.as_ref() {
            Some(body) if !body.is_empty() => Ok(body),
            _ => Err(precondition_error!("{} has no body", def.name)),
        }
    }

    fn body_mut(&mut self, method: Token) -> Result<&mut MethodBody> {
        let def = self.image.method_mut(method)?;
        let name = def.name.clone();
        def.body
            .as_mut()
            .ok_or_else(|| precondition_error!("{} has no body", name))
    }
}

/// The local-variable counterpart of an argument opcode.
fn to_local_opcode(opcode: OpCode) -> OpCode {
    match opcode {
        OpCode::Ldarga => OpCode::Ldloca,
        OpCode::Starg => OpCode::Stloc,
        _ => OpCode::Ldloc,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::{
            builders::{MethodBuilder, TypeBuilder},
            exceptions::ExceptionHandler,
            signatures::TypeSignature,
        },
        test::{
            fixtures::SampleImage,
            machine::{Machine, Value},
        },
        Error,
    };

    fn logged(machine: &Machine) -> Vec<Vec<Value>> {
        machine.trace().iter().map(|entry| entry.args.clone()).collect()
    }

    #[test]
    fn test_splice_before_runs_fragment_first() -> Result<()> {
        let mut sample = SampleImage::build()?;
        CodeSplicer::new(&mut sample.image).splice_before(sample.program_add, sample.fragment_enter)?;

        let body = sample.image.method(sample.program_add)?.body.as_ref().expect("body");
        // ldstr, call, br -> 3; original code follows
        assert_eq!(body.instructions[2], Instruction::branch(3));
        assert_eq!(body.len(), 7);

        let mut machine = Machine::new(&sample.image);
        assert_eq!(
            machine.call(sample.program_add, vec![Value::I32(4), Value::I32(5)])?,
            Some(Value::I32(9))
        );
        assert_eq!(logged(&machine), vec![vec![Value::Str("enter".to_string())]]);
        Ok(())
    }

    #[test]
    fn test_splice_before_shifts_branches_and_maps_locals() -> Result<()> {
        let mut sample = SampleImage::build()?;
        let write_int = sample.image.import(sample.console_write_int, sample.hooks_module)?;
        let target = sample.target_type;
        let max = MethodBuilder::new("Max")
            .param("a", TypeSignature::I4)
            .param("b", TypeSignature::I4)
            .returns(TypeSignature::I4)
            .local(TypeSignature::I4)
            .body(|asm| {
                asm.ldarg_1()?
                    .ldarg_2()?
                    .clt()?
                    .brtrue("second")?
                    .ldarg_1()?
                    .stloc(0)?
                    .br("done")?
                    .label("second")?
                    .ldarg_2()?
                    .stloc(0)?
                    .label("done")?
                    .ldloc(0)?
                    .ret()?;
                Ok(())
            })
            .build(&mut sample.image, target)?;
        let fragment = MethodBuilder::new("Sum")
            .static_method()
            .param("a", TypeSignature::I4)
            .param("b", TypeSignature::I4)
            .local(TypeSignature::I4)
            .body(move |asm| {
                asm.ldarg_0()?
                    .ldarg_1()?
                    .add()?
                    .stloc(0)?
                    .ldloc(0)?
                    .call(write_int)?
                    .ret()?;
                Ok(())
            })
            .build(&mut sample.image, sample.hooks_type)?;

        CodeSplicer::new(&mut sample.image).splice_before(max, fragment)?;
        let body = sample.image.method(max)?.body.as_ref().expect("body");
        assert_eq!(body.locals.len(), 2);
        assert_eq!(body.instructions[3], Instruction::new(OpCode::Stloc, Operand::Local(1)));
        assert_eq!(body.instructions[0], Instruction::new(OpCode::Ldarg, Operand::Argument(1)));
        assert_eq!(body.instructions[6], Instruction::branch(7));
        // brtrue "second" moved from 3 to 10, pointing at 7 + 7
        assert_eq!(body.instructions[10].opcode, OpCode::Brtrue);
        assert_eq!(body.instructions[10].operand, Operand::Target(14));

        let mut machine = Machine::new(&sample.image);
        let object = machine.new_object(target);
        assert_eq!(
            machine.call(max, vec![object, Value::I32(3), Value::I32(8)])?,
            Some(Value::I32(8))
        );
        assert_eq!(logged(&machine), vec![vec![Value::I32(11)]]);
        Ok(())
    }

    #[test]
    fn test_splice_after_void_covers_every_exit() -> Result<()> {
        let mut sample = SampleImage::build()?;
        let write_int = sample.console_write_int;
        let ty = sample.program_type;
        let report = MethodBuilder::new("Report")
            .static_method()
            .param("value", TypeSignature::I4)
            .body(move |asm| {
                asm.ldarg_0()?
                    .brfalse("skip")?
                    .ldarg_0()?
                    .call(write_int)?
                    .ret()?
                    .label("skip")?
                    .ret()?;
                Ok(())
            })
            .build(&mut sample.image, ty)?;

        CodeSplicer::new(&mut sample.image).splice_after(report, sample.fragment_enter)?;
        let body = sample.image.method(report)?.body.as_ref().expect("body");
        assert_eq!(body.instructions[4], Instruction::branch(5));
        assert_eq!(body.instructions[5].opcode, OpCode::Nop);
        assert!(body.instructions.last().is_some_and(Instruction::is_return));

        for (input, expected) in [(0, 1), (7, 2)] {
            let mut machine = Machine::new(&sample.image);
            assert_eq!(machine.call(report, vec![Value::I32(input)])?, None);
            let trace = logged(&machine);
            assert_eq!(trace.len(), expected);
            assert_eq!(trace.last(), Some(&vec![Value::Str("enter".to_string())]));
        }
        Ok(())
    }

    #[test]
    fn test_splice_after_void_synthesizes_pad() -> Result<()> {
        let mut image = Image::new();
        let module = image.add_module("App")?;
        let ty = TypeBuilder::new("App", "Worker").build(&mut image, module)?;
        let fail = MethodBuilder::new("Fail")
            .static_method()
            .body(|asm| {
                asm.ldnull()?.throw()?;
                Ok(())
            })
            .build(&mut image, ty)?;
        let fragment = MethodBuilder::new("After")
            .static_method()
            .body(|asm| {
                asm.nop()?.ret()?;
                Ok(())
            })
            .build(&mut image, ty)?;

        CodeSplicer::new(&mut image).splice_after(fail, fragment)?;
        let body = image.method(fail)?.body.as_ref().expect("body");
        let opcodes: Vec<OpCode> = body.instructions.iter().map(|i| i.opcode).collect();
        assert_eq!(
            opcodes,
            vec![OpCode::Ldnull, OpCode::Throw, OpCode::Nop, OpCode::Nop, OpCode::Ret]
        );
        Ok(())
    }

    #[test]
    fn test_splice_after_value_rewrites_result() -> Result<()> {
        let mut sample = SampleImage::build()?;
        CodeSplicer::new(&mut sample.image).splice_after(sample.target_add, sample.fragment_post)?;

        let body = sample.image.method(sample.target_add)?.body.as_ref().expect("body");
        assert_eq!(body.locals.len(), 1);
        assert_eq!(body.instructions[4], Instruction::new(OpCode::Stloc, Operand::Local(0)));
        assert_eq!(body.instructions[5], Instruction::new(OpCode::Ldloc, Operand::Local(0)));

        let mut machine = Machine::new(&sample.image);
        assert_eq!(machine.call(sample.program_run, vec![])?, Some(Value::I32(13)));
        let object = machine.last_object().expect("object created");
        assert_eq!(machine.field_value(object, sample.field_m_a), Value::I32(10));
        Ok(())
    }

    #[test]
    fn test_splice_after_value_holds_for_all_inputs() -> Result<()> {
        let mut sample = SampleImage::build()?;
        CodeSplicer::new(&mut sample.image).splice_after(sample.target_add, sample.fragment_post)?;

        let cases = [(10, 2), (0, 0), (-5, 3), (7, -7), (-1, -1), (100, 0), (0, -42), (i32::MAX, 0)];
        for (m_a, b) in cases {
            let mut machine = Machine::new(&sample.image);
            let object = machine.new_object(sample.target_type);
            machine.call(sample.ctor, vec![object.clone(), Value::I32(m_a)])?;

            let result = machine.call(sample.target_add, vec![object.clone(), Value::I32(b)])?;
            let expected = m_a.wrapping_add(b).wrapping_add(1);
            assert_eq!(result, Some(Value::I32(expected)), "m_a = {m_a}, b = {b}");

            let Value::Obj(id) = object else {
                panic!("expected an object");
            };
            assert_eq!(machine.field_value(id, sample.field_m_a), Value::I32(m_a));
        }
        Ok(())
    }

    #[test]
    fn test_splice_after_value_preconditions() -> Result<()> {
        let mut sample = SampleImage::build()?;
        let mut splicer = CodeSplicer::new(&mut sample.image);
        assert!(matches!(
            splicer.splice_after(sample.program_add, sample.fragment_post),
            Err(Error::PreconditionViolated { .. })
        ));
        assert!(matches!(
            splicer.splice_after(sample.target_add, sample.fragment_enter),
            Err(Error::PreconditionViolated { .. })
        ));
        assert!(matches!(
            splicer.splice_after(sample.console_write, sample.fragment_enter),
            Err(Error::PreconditionViolated { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_fragment_receiver_requires_instance_target() -> Result<()> {
        let mut sample = SampleImage::build()?;
        let ty = sample.target_type;
        let touch = MethodBuilder::new("Touch")
            .body(|asm| {
                asm.ldarg_0()?.pop()?.ret()?;
                Ok(())
            })
            .build(&mut sample.image, ty)?;

        let mut splicer = CodeSplicer::new(&mut sample.image);
        assert!(matches!(
            splicer.splice_before(sample.program_add, touch),
            Err(Error::PreconditionViolated { .. })
        ));
        splicer.splice_before(sample.target_add, touch)?;
        let body = sample.image.method(sample.target_add)?.body.as_ref().expect("body");
        assert_eq!(body.instructions[0], Instruction::new(OpCode::Ldarg, Operand::Argument(0)));
        Ok(())
    }

    #[test]
    fn test_fragment_handlers_are_carried_over() -> Result<()> {
        let mut sample = SampleImage::build()?;
        let ty = sample.hooks_type;
        let guarded = MethodBuilder::new("Guarded")
            .static_method()
            .handler(ExceptionHandler::finally(0..2, 2..3))
            .body(|asm| {
                asm.nop()?
                    .leave("out")?
                    .emit_instruction(OpCode::Endfinally, Operand::None)?
                    .label("out")?
                    .ret()?;
                Ok(())
            })
            .build(&mut sample.image, ty)?;
        let idle = MethodBuilder::new("Idle")
            .static_method()
            .body(|asm| {
                asm.nop()?.ret()?;
                Ok(())
            })
            .build(&mut sample.image, sample.program_type)?;

        CodeSplicer::new(&mut sample.image).splice_after(idle, guarded)?;
        let body = sample.image.method(idle)?.body.as_ref().expect("body");
        let handler = body.exception_handlers.last().expect("handler");
        let start = body.len() - 4;
        assert_eq!(handler.try_start, start);
        assert_eq!(handler.handler_end, start + 3);
        assert_eq!(body.instructions[start + 1].operand, Operand::Target(start + 3));
        Ok(())
    }
}
