//! The sample program most tests run against.
//!
//! Three modules:
//!
//! - `mscorlib`: `System.Object` with a bodiless constructor and `System.Console` with two
//!   bodiless `WriteLine` overloads, whose calls the [`super::machine::Machine`] records.
//! - `Target`: `Target.Program` (`Main`, `Run`, static `Add` and `Sub`), `Target.Target`
//!   (field `m_a`, `.ctor(int)`, `get_A`, instance `Add(int)`) and `Target.Other` (a static
//!   `Add(int, int)` shaped like `Program.Add`).
//! - `Hooks`: `Hooks.Hooks` with method hooks, field hooks and splice fragments. Hooks that
//!   delegate to the original call themselves.

use crate::{
    assembly::InstructionAssembler,
    metadata::{
        builders::{FieldBuilder, MethodBuilder, PropertyBuilder, TypeBuilder},
        image::Image,
        method::{LocalVariable, MethodBody},
        signatures::TypeSignature,
        token::Token,
    },
    Result,
};

pub struct SampleImage {
    pub image: Image,

    pub corlib_module: Token,
    pub target_module: Token,
    pub hooks_module: Token,

    pub object_ctor: Token,
    pub console_write: Token,
    pub console_write_int: Token,

    pub program_type: Token,
    pub program_main: Token,
    pub program_run: Token,
    pub program_add: Token,
    pub program_sub: Token,
    /// `Target.Other::Add(a, b)`: same name and shape as `Program.Add`
    pub other_add: Token,

    pub target_type: Token,
    pub field_m_a: Token,
    pub ctor: Token,
    pub target_get_a: Token,
    pub target_add: Token,

    pub hooks_type: Token,
    /// `Add(a, b)`: logs, delegates to itself, logs the result
    pub hook_add: Token,
    /// `Sub(a, b)`: delegates to itself and adds 100
    pub hook_sub: Token,
    /// `AddTwice(Target self, b)`: delegates to itself and doubles the result
    pub hook_instance_add: Token,
    /// `Get(Target self)`: reads `m_a` doubled
    pub hook_read: Token,
    /// `Set(Target self, value)`: stores `value + 1`
    pub hook_write: Token,
    /// `Enter()`: logs `"enter"`
    pub fragment_enter: Token,
    /// `Post(b, result)`: returns `result + 1`
    pub fragment_post: Token,
    /// `Caller()`: returns `Program.Sub(9, 4)` through a `MemberRef`
    pub hooks_caller: Token,
    /// `Program.Sub` as referenced from the hooks module
    pub program_sub_ref: Token,
    /// `Other.Add` as referenced from the hooks module
    pub other_add_ref: Token,
}

/// Sets a body whose code may call the method itself.
fn set_body<F>(image: &mut Image, method: Token, locals: &[TypeSignature], code: F) -> Result<()>
where
    F: FnOnce(&mut InstructionAssembler) -> Result<()>,
{
    let mut asm = InstructionAssembler::new();
    code(&mut asm)?;
    let mut body = MethodBody::new(asm.finish()?);
    body.locals = locals.iter().cloned().map(LocalVariable::new).collect();
    image.method_mut(method)?.body = Some(body);
    Ok(())
}

fn int_binary(name: &str) -> MethodBuilder {
    MethodBuilder::new(name)
        .static_method()
        .param("a", TypeSignature::I4)
        .param("b", TypeSignature::I4)
        .returns(TypeSignature::I4)
}

impl SampleImage {
    pub fn build() -> Result<SampleImage> {
        let mut image = Image::new();
        let corlib_module = image.add_module("mscorlib")?;
        let target_module = image.add_module("Target")?;
        let hooks_module = image.add_module("Hooks")?;

        // mscorlib
        let object_type = TypeBuilder::new("System", "Object")
            .extends(None)
            .build(&mut image, corlib_module)?;
        let object_ctor = MethodBuilder::constructor().build(&mut image, object_type)?;
        let console = TypeBuilder::new("System", "Console").build(&mut image, corlib_module)?;
        let console_write = MethodBuilder::new("WriteLine")
            .static_method()
            .param("value", TypeSignature::String)
            .build(&mut image, console)?;
        let console_write_int = MethodBuilder::new("WriteLine")
            .static_method()
            .param("value", TypeSignature::I4)
            .build(&mut image, console)?;

        // Target
        let program_type = TypeBuilder::new("Target", "Program").build(&mut image, target_module)?;
        let target_type = TypeBuilder::new("Target", "Target").build(&mut image, target_module)?;
        let field_m_a = FieldBuilder::new("m_a", TypeSignature::I4)
            .build(&mut image, target_type)?;

        let base_ctor = image.import(object_ctor, target_module)?;
        let ctor = MethodBuilder::constructor()
            .param("a", TypeSignature::I4)
            .body(move |asm| {
                asm.ldarg_0()?
                    .call(base_ctor)?
                    .ldarg_0()?
                    .ldarg_1()?
                    .stfld(field_m_a)?
                    .ret()?;
                Ok(())
            })
            .build(&mut image, target_type)?;
        let target_get_a = MethodBuilder::new("get_A")
            .returns(TypeSignature::I4)
            .body(move |asm| {
                asm.ldarg_0()?.ldfld(field_m_a)?.ret()?;
                Ok(())
            })
            .build(&mut image, target_type)?;
        PropertyBuilder::new("A", TypeSignature::I4)
            .getter(target_get_a)
            .build(&mut image, target_type)?;
        let target_add = MethodBuilder::new("Add")
            .param("b", TypeSignature::I4)
            .returns(TypeSignature::I4)
            .body(move |asm| {
                asm.ldarg_0()?.ldfld(field_m_a)?.ldarg_1()?.add()?.ret()?;
                Ok(())
            })
            .build(&mut image, target_type)?;

        let program_add = int_binary("Add")
            .body(|asm| {
                asm.ldarg_0()?.ldarg_1()?.add()?.ret()?;
                Ok(())
            })
            .build(&mut image, program_type)?;
        let program_sub = int_binary("Sub")
            .body(|asm| {
                asm.ldarg_0()?.ldarg_1()?.sub()?.ret()?;
                Ok(())
            })
            .build(&mut image, program_type)?;
        let other_type = TypeBuilder::new("Target", "Other").build(&mut image, target_module)?;
        let other_add = int_binary("Add")
            .body(|asm| {
                asm.ldarg_0()?.ldarg_1()?.mul()?.ret()?;
                Ok(())
            })
            .build(&mut image, other_type)?;
        let program_main = MethodBuilder::new("Main")
            .static_method()
            .returns(TypeSignature::I4)
            .body(move |asm| {
                asm.ldc_i4(1)?
                    .ldc_i4(2)?
                    .call(program_add)?
                    .ldc_i4(3)?
                    .ldc_i4(4)?
                    .call(program_add)?
                    .add()?
                    .ret()?;
                Ok(())
            })
            .build(&mut image, program_type)?;
        let write_int = image.import(console_write_int, target_module)?;
        let program_run = MethodBuilder::new("Run")
            .static_method()
            .returns(TypeSignature::I4)
            .body(move |asm| {
                asm.ldc_i4(10)?
                    .newobj(ctor)?
                    .ldc_i4(2)?
                    .callvirt(target_add)?
                    .dup()?
                    .call(write_int)?
                    .ret()?;
                Ok(())
            })
            .build(&mut image, program_type)?;

        // Hooks
        let hooks_type = TypeBuilder::new("Hooks", "Hooks").build(&mut image, hooks_module)?;
        let log = image.import(console_write, hooks_module)?;
        let log_int = image.import(console_write_int, hooks_module)?;
        let target_ref = TypeSignature::Class(image.import(target_type, hooks_module)?);
        let m_a_ref = image.import(field_m_a, hooks_module)?;
        let program_sub_ref = image.import(program_sub, hooks_module)?;
        let other_add_ref = image.import(other_add, hooks_module)?;

        let hook_add = int_binary("Add").build(&mut image, hooks_type)?;
        set_body(&mut image, hook_add, &[TypeSignature::I4], |asm| {
            asm.ldstr("enter")?
                .call(log)?
                .ldarg_0()?
                .ldarg_1()?
                .call(hook_add)?
                .stloc(0)?
                .ldloc(0)?
                .call(log_int)?
                .ldloc(0)?
                .ret()?;
            Ok(())
        })?;

        let hook_sub = int_binary("Sub").build(&mut image, hooks_type)?;
        set_body(&mut image, hook_sub, &[], |asm| {
            asm.ldarg_0()?
                .ldarg_1()?
                .call(hook_sub)?
                .ldc_i4(100)?
                .add()?
                .ret()?;
            Ok(())
        })?;

        let hook_instance_add = MethodBuilder::new("AddTwice")
            .static_method()
            .param("self", target_ref.clone())
            .param("b", TypeSignature::I4)
            .returns(TypeSignature::I4)
            .build(&mut image, hooks_type)?;
        set_body(&mut image, hook_instance_add, &[], |asm| {
            asm.ldarg_0()?
                .ldarg_1()?
                .call(hook_instance_add)?
                .ldc_i4(2)?
                .mul()?
                .ret()?;
            Ok(())
        })?;

        let hook_read = MethodBuilder::new("Get")
            .static_method()
            .param("self", target_ref.clone())
            .returns(TypeSignature::I4)
            .body(move |asm| {
                asm.ldarg_0()?.ldfld(m_a_ref)?.ldc_i4(2)?.mul()?.ret()?;
                Ok(())
            })
            .build(&mut image, hooks_type)?;
        let hook_write = MethodBuilder::new("Set")
            .static_method()
            .param("self", target_ref)
            .param("value", TypeSignature::I4)
            .body(move |asm| {
                asm.ldarg_0()?
                    .ldarg_1()?
                    .ldc_i4(1)?
                    .add()?
                    .stfld(m_a_ref)?
                    .ret()?;
                Ok(())
            })
            .build(&mut image, hooks_type)?;

        let fragment_enter = MethodBuilder::new("Enter")
            .static_method()
            .body(move |asm| {
                asm.ldstr("enter")?.call(log)?.ret()?;
                Ok(())
            })
            .build(&mut image, hooks_type)?;
        let fragment_post = MethodBuilder::new("Post")
            .static_method()
            .param("b", TypeSignature::I4)
            .param("result", TypeSignature::I4)
            .returns(TypeSignature::I4)
            .body(|asm| {
                asm.ldarg_1()?.ldc_i4(1)?.add()?.ret()?;
                Ok(())
            })
            .build(&mut image, hooks_type)?;
        let hooks_caller = MethodBuilder::new("Caller")
            .static_method()
            .returns(TypeSignature::I4)
            .body(move |asm| {
                asm.ldc_i4(9)?.ldc_i4(4)?.call(program_sub_ref)?.ret()?;
                Ok(())
            })
            .build(&mut image, hooks_type)?;

        Ok(SampleImage {
            image,
            corlib_module,
            target_module,
            hooks_module,
            object_ctor,
            console_write,
            console_write_int,
            program_type,
            program_main,
            program_run,
            program_add,
            program_sub,
            other_add,
            target_type,
            field_m_a,
            ctor,
            target_get_a,
            target_add,
            hooks_type,
            hook_add,
            hook_sub,
            hook_instance_add,
            hook_read,
            hook_write,
            fragment_enter,
            fragment_post,
            hooks_caller,
            program_sub_ref,
            other_add_ref,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::machine::{Machine, Value};

    #[test]
    fn test_sample_runs() -> Result<()> {
        let sample = SampleImage::build()?;
        let mut machine = Machine::new(&sample.image);
        assert_eq!(machine.call(sample.program_main, vec![])?, Some(Value::I32(10)));
        assert_eq!(machine.call(sample.program_run, vec![])?, Some(Value::I32(12)));
        assert_eq!(machine.call(sample.hooks_caller, vec![])?, Some(Value::I32(5)));

        let names: Vec<&str> = machine.trace().iter().map(|e| e.method.as_str()).collect();
        assert_eq!(names, vec!["System.Object::.ctor", "System.Console::WriteLine"]);
        Ok(())
    }
}
