//! A small evaluation-stack interpreter for checking rewritten bodies by running them.
//!
//! Supports the integer/string/object subset the fixtures use. Methods without a body are
//! not executed; their calls are recorded in the trace instead, which is how tests observe
//! logging calls such as `System.Console::WriteLine`.

use rustc_hash::FxHashMap;

use crate::{
    assembly::{Immediate, OpCode, Operand},
    metadata::{image::Image, token::Token},
    Result,
};

const STEP_LIMIT: usize = 100_000;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    I32(i32),
    I64(i64),
    F64(f64),
    Str(String),
    Obj(usize),
    Null,
}

impl Value {
    fn as_i64(&self) -> Result<i64> {
        match self {
            Value::I32(v) => Ok(i64::from(*v)),
            Value::I64(v) => Ok(*v),
            Value::Null => Ok(0),
            Value::Obj(_) | Value::Str(_) => Ok(1),
            Value::F64(_) => Err(precondition_error!("float used as integer")),
        }
    }
}

/// A call of a bodiless method.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceEntry {
    pub method: String,
    pub args: Vec<Value>,
}

struct Object {
    fields: FxHashMap<Token, Value>,
}

pub struct Machine<'a> {
    image: &'a Image,
    objects: Vec<Object>,
    statics: FxHashMap<Token, Value>,
    trace: Vec<TraceEntry>,
    steps: usize,
}

impl<'a> Machine<'a> {
    pub fn new(image: &'a Image) -> Self {
        Machine {
            image,
            objects: Vec::new(),
            statics: FxHashMap::default(),
            trace: Vec::new(),
            steps: 0,
        }
    }

    pub fn trace(&self) -> &[TraceEntry] {
        &self.trace
    }

    /// Allocates an object without running a constructor.
    pub fn new_object(&mut self, _ty: Token) -> Value {
        self.objects.push(Object {
            fields: FxHashMap::default(),
        });
        Value::Obj(self.objects.len() - 1)
    }

    /// Id of the most recently allocated object.
    pub fn last_object(&self) -> Option<usize> {
        self.objects.len().checked_sub(1)
    }

    pub fn field_value(&self, object: usize, field: Token) -> Value {
        self.objects
            .get(object)
            .and_then(|o| o.fields.get(&field))
            .cloned()
            .unwrap_or(Value::I32(0))
    }

    pub fn call(&mut self, method: Token, mut args: Vec<Value>) -> Result<Option<Value>> {
        let image = self.image;
        let method = image.resolve_definition(method)?;
        let def = image.method(method)?;
        if args.len() != def.argument_slots() {
            return Err(precondition_error!(
                "{} expects {} arguments, got {}",
                def.name,
                def.argument_slots(),
                args.len()
            ));
        }

        let Some(body) = def.body.as_ref() else {
            self.trace.push(TraceEntry {
                method: image.member_full_name(method)?,
                args,
            });
            return Ok((!def.returns_void()).then_some(Value::Null));
        };

        let mut locals = vec![Value::I32(0); body.locals.len()];
        let mut stack: Vec<Value> = Vec::new();
        let mut pc = 0;

        loop {
            self.steps += 1;
            if self.steps > STEP_LIMIT {
                return Err(precondition_error!("step limit exceeded in {}", def.name));
            }
            let instruction = body
                .instructions
                .get(pc)
                .ok_or_else(|| precondition_error!("{} ran off its body at {}", def.name, pc))?
                .normalized();
            pc += 1;

            match (instruction.opcode, instruction.operand) {
                (OpCode::Nop | OpCode::Endfinally, _) => {}
                (OpCode::Ldarg, Operand::Argument(slot)) => {
                    stack.push(slot_value(&args, slot.into())?);
                }
                (OpCode::Starg, Operand::Argument(slot)) => {
                    let value = pop(&mut stack)?;
                    *slot_mut(&mut args, slot.into())? = value;
                }
                (OpCode::Ldloc, Operand::Local(slot)) => {
                    stack.push(slot_value(&locals, slot.into())?);
                }
                (OpCode::Stloc, Operand::Local(slot)) => {
                    let value = pop(&mut stack)?;
                    *slot_mut(&mut locals, slot.into())? = value;
                }
                (OpCode::LdcI4M1, _) => stack.push(Value::I32(-1)),
                (OpCode::LdcI4_0, _) => stack.push(Value::I32(0)),
                (OpCode::LdcI4_1, _) => stack.push(Value::I32(1)),
                (OpCode::LdcI4_2, _) => stack.push(Value::I32(2)),
                (OpCode::LdcI4_3, _) => stack.push(Value::I32(3)),
                (OpCode::LdcI4_4, _) => stack.push(Value::I32(4)),
                (OpCode::LdcI4_5, _) => stack.push(Value::I32(5)),
                (OpCode::LdcI4_6, _) => stack.push(Value::I32(6)),
                (OpCode::LdcI4_7, _) => stack.push(Value::I32(7)),
                (OpCode::LdcI4_8, _) => stack.push(Value::I32(8)),
                (_, Operand::Immediate(Immediate::Int8(v))) => stack.push(Value::I32(v.into())),
                (_, Operand::Immediate(Immediate::Int32(v))) => stack.push(Value::I32(v)),
                (_, Operand::Immediate(Immediate::Int64(v))) => stack.push(Value::I64(v)),
                (_, Operand::Immediate(Immediate::Float64(v))) => stack.push(Value::F64(v)),
                (OpCode::Ldstr, Operand::String(text)) => stack.push(Value::Str(text)),
                (OpCode::Ldnull, _) => stack.push(Value::Null),
                (OpCode::Dup, _) => {
                    let top = stack.last().cloned().ok_or_else(|| precondition_error!("dup on empty stack"))?;
                    stack.push(top);
                }
                (OpCode::Pop, _) => {
                    pop(&mut stack)?;
                }
                (OpCode::Box | OpCode::UnboxAny | OpCode::Castclass, _) => {}
                (
                    opcode @ (OpCode::Add
                    | OpCode::Sub
                    | OpCode::Mul
                    | OpCode::Div
                    | OpCode::Rem
                    | OpCode::Ceq
                    | OpCode::Clt
                    | OpCode::Cgt),
                    _,
                ) => {
                    let right = pop(&mut stack)?;
                    let left = pop(&mut stack)?;
                    stack.push(arithmetic(opcode, &left, &right)?);
                }
                (OpCode::Br | OpCode::Leave, Operand::Target(target)) => pc = target,
                (OpCode::Brtrue, Operand::Target(target)) => {
                    if pop(&mut stack)?.as_i64()? != 0 {
                        pc = target;
                    }
                }
                (OpCode::Brfalse, Operand::Target(target)) => {
                    if pop(&mut stack)?.as_i64()? == 0 {
                        pc = target;
                    }
                }
                (
                    opcode @ (OpCode::Beq
                    | OpCode::BneUn
                    | OpCode::Blt
                    | OpCode::Bgt
                    | OpCode::Ble
                    | OpCode::Bge),
                    Operand::Target(target),
                ) => {
                    let right = pop(&mut stack)?.as_i64()?;
                    let left = pop(&mut stack)?.as_i64()?;
                    let taken = match opcode {
                        OpCode::Beq => left == right,
                        OpCode::BneUn => left != right,
                        OpCode::Blt => left < right,
                        OpCode::Bgt => left > right,
                        OpCode::Ble => left <= right,
                        _ => left >= right,
                    };
                    if taken {
                        pc = target;
                    }
                }
                (OpCode::Call | OpCode::Callvirt, Operand::Token(callee)) => {
                    let count = image.method(image.resolve_definition(callee)?)?.argument_slots();
                    let call_args = pop_n(&mut stack, count)?;
                    if let Some(result) = self.call(callee, call_args)? {
                        stack.push(result);
                    }
                }
                (OpCode::Newobj, Operand::Token(ctor)) => {
                    let ctor_def = image.method(image.resolve_definition(ctor)?)?;
                    let ty = ctor_def.declaring_type.unwrap_or(Token::NULL);
                    let mut call_args = pop_n(&mut stack, ctor_def.params.len())?;
                    let object = self.new_object(ty);
                    call_args.insert(0, object.clone());
                    self.call(ctor, call_args)?;
                    stack.push(object);
                }
                (OpCode::Ldfld, Operand::Token(field)) => {
                    let field = image.resolve_definition(field)?;
                    let object = object_id(&pop(&mut stack)?)?;
                    stack.push(self.field_value(object, field));
                }
                (OpCode::Stfld, Operand::Token(field)) => {
                    let field = image.resolve_definition(field)?;
                    let value = pop(&mut stack)?;
                    let object = object_id(&pop(&mut stack)?)?;
                    let slot = self
                        .objects
                        .get_mut(object)
                        .ok_or_else(|| precondition_error!("dangling object {}", object))?;
                    slot.fields.insert(field, value);
                }
                (OpCode::Ldsfld, Operand::Token(field)) => {
                    let field = image.resolve_definition(field)?;
                    stack.push(self.statics.get(&field).cloned().unwrap_or(Value::I32(0)));
                }
                (OpCode::Stsfld, Operand::Token(field)) => {
                    let field = image.resolve_definition(field)?;
                    let value = pop(&mut stack)?;
                    self.statics.insert(field, value);
                }
                (OpCode::Ret, _) => {
                    return if def.returns_void() {
                        Ok(None)
                    } else {
                        pop(&mut stack).map(Some)
                    };
                }
                (OpCode::Throw, _) => {
                    return Err(precondition_error!("{} threw", def.name));
                }
                (opcode, operand) => {
                    return Err(precondition_error!(
                        "unsupported instruction {} {:?} in {}",
                        opcode,
                        operand,
                        def.name
                    ));
                }
            }
        }
    }
}

fn pop(stack: &mut Vec<Value>) -> Result<Value> {
    stack
        .pop()
        .ok_or_else(|| precondition_error!("evaluation stack underflow"))
}

fn pop_n(stack: &mut Vec<Value>, count: usize) -> Result<Vec<Value>> {
    if stack.len() < count {
        return Err(precondition_error!("evaluation stack underflow"));
    }
    Ok(stack.split_off(stack.len() - count))
}

fn slot_value(slots: &[Value], index: usize) -> Result<Value> {
    slots
        .get(index)
        .cloned()
        .ok_or_else(|| precondition_error!("slot {} out of range", index))
}

fn slot_mut(slots: &mut [Value], index: usize) -> Result<&mut Value> {
    slots
        .get_mut(index)
        .ok_or_else(|| precondition_error!("slot {} out of range", index))
}

fn object_id(value: &Value) -> Result<usize> {
    match value {
        Value::Obj(id) => Ok(*id),
        other => Err(precondition_error!("{:?} is not an object", other)),
    }
}

fn arithmetic(opcode: OpCode, left: &Value, right: &Value) -> Result<Value> {
    let wide = matches!(left, Value::I64(_)) || matches!(right, Value::I64(_));
    let (l, r) = (left.as_i64()?, right.as_i64()?);
    let value = match opcode {
        OpCode::Add => l.wrapping_add(r),
        OpCode::Sub => l.wrapping_sub(r),
        OpCode::Mul => l.wrapping_mul(r),
        OpCode::Div | OpCode::Rem if r == 0 => {
            return Err(precondition_error!("division by zero"));
        }
        OpCode::Div => l / r,
        OpCode::Rem => l % r,
        OpCode::Ceq => return Ok(Value::I32((l == r).into())),
        OpCode::Clt => return Ok(Value::I32((l < r).into())),
        _ => return Ok(Value::I32((l > r).into())),
    };
    if wide {
        Ok(Value::I64(value))
    } else {
        // Truncation is the intended int32 overflow behavior
        Ok(Value::I32(value as i32))
    }
}
