//! Benchmarks for reference search and method hooking.
//!
//! Builds a module of `TYPES` types with `METHODS` methods each, where every method calls a
//! shared `Target.Add` and reads a shared field:
//! - Scanning the module
//! - Searching all references to the shared method
//! - Hooking the shared method (scan, clone, rewrite)

extern crate cilhook;

use cilhook::prelude::*;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use std::hint::black_box;

const TYPES: usize = 50;
const METHODS: usize = 20;

struct Corpus {
    image: Image,
    module: Token,
    add: Token,
    hook: Token,
}

fn build_corpus() -> Corpus {
    let mut image = Image::new();
    let module = image.add_module("App").unwrap();
    let hooks = image.add_module("Hooks").unwrap();

    let shared = TypeBuilder::new("App", "Shared").build(&mut image, module).unwrap();
    let value = FieldBuilder::new("value", TypeSignature::I4)
        .static_field()
        .build(&mut image, shared)
        .unwrap();
    let add = MethodBuilder::new("Add")
        .static_method()
        .param("a", TypeSignature::I4)
        .param("b", TypeSignature::I4)
        .returns(TypeSignature::I4)
        .body(|asm| {
            asm.ldarg_0()?.ldarg_1()?.add()?.ret()?;
            Ok(())
        })
        .build(&mut image, shared)
        .unwrap();

    for t in 0..TYPES {
        let ty = TypeBuilder::new("App", &format!("Worker{t}"))
            .build(&mut image, module)
            .unwrap();
        for m in 0..METHODS {
            MethodBuilder::new(&format!("Run{m}"))
                .static_method()
                .returns(TypeSignature::I4)
                .local(TypeSignature::I4)
                .body(move |asm| {
                    asm.ldsfld(value)?
                        .ldc_i4(1)?
                        .call(add)?
                        .stloc(0)?
                        .ldloc(0)?
                        .brtrue("done")?
                        .ldc_i4(0)?
                        .ret()?
                        .label("done")?
                        .ldloc(0)?
                        .ret()?;
                    Ok(())
                })
                .build(&mut image, ty)
                .unwrap();
        }
    }

    let donor = TypeBuilder::new("Hooks", "Hooks").build(&mut image, hooks).unwrap();
    let hook = MethodBuilder::new("Add")
        .static_method()
        .param("a", TypeSignature::I4)
        .param("b", TypeSignature::I4)
        .returns(TypeSignature::I4)
        .build(&mut image, donor)
        .unwrap();
    let mut asm = InstructionAssembler::new();
    asm.ldarg_0().unwrap().ldarg_1().unwrap().call(hook).unwrap().ret().unwrap();
    image.method_mut(hook).unwrap().body = Some(MethodBody::new(asm.finish().unwrap()));

    Corpus {
        image,
        module,
        add,
        hook,
    }
}

fn bench_scan_module(c: &mut Criterion) {
    let corpus = build_corpus();

    c.bench_function("resolver_scan_module", |b| {
        b.iter(|| {
            let resolver = ReferenceResolver::for_module(&corpus.image, corpus.module).unwrap();
            black_box(resolver)
        });
    });
}

fn bench_find_all_references(c: &mut Criterion) {
    let corpus = build_corpus();
    let resolver = ReferenceResolver::for_module(&corpus.image, corpus.module).unwrap();

    c.bench_function("resolver_find_all_references", |b| {
        b.iter(|| {
            let sites = resolver
                .find_all_references(&corpus.image, black_box(corpus.add))
                .unwrap();
            black_box(sites)
        });
    });
}

fn bench_hook_method(c: &mut Criterion) {
    let corpus = build_corpus();

    c.bench_function("injector_hook_method", |b| {
        b.iter_batched(
            || corpus.image.clone(),
            |mut image| {
                let hooked = CodeInjector::new(&mut image)
                    .hook_method(corpus.add, corpus.hook, None)
                    .unwrap();
                black_box(hooked)
            },
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(
    benches,
    bench_scan_module,
    bench_find_all_references,
    bench_hook_method
);
criterion_main!(benches);
