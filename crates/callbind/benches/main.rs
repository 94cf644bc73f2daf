// Use codspeed-criterion-compat when running on CodSpeed (CI), real criterion otherwise (for flamegraphs)
use std::sync::Arc;

use callbind::{
    CallArguments, CallBindingGenerator, CodegenOptions, ConstantTable, ConstantValue, DefaultBinding, FunctionDecl,
    GeneratedEntryPoints, ParameterList, ParameterSpec, RuntimeValue, SharedConstantTable, execute,
};
#[cfg(codspeed)]
use codspeed_criterion_compat::{Bencher, Criterion, black_box, criterion_group, criterion_main};
#[cfg(not(codspeed))]
use criterion::{Bencher, Criterion, black_box, criterion_group, criterion_main};

/// `def f(a, b, (c, d), e=1, *rest, **kw)`
fn wide_signature() -> ParameterList {
    ParameterList::new([
        ParameterSpec::plain("a"),
        ParameterSpec::plain("b"),
        ParameterSpec::nested([ParameterSpec::plain("c"), ParameterSpec::plain("d")]),
        ParameterSpec::plain("e"),
    ])
    .with_star_list("rest")
    .with_star_dict("kw")
    .with_defaults([DefaultBinding::Literal(ConstantValue::int(1))])
}

/// `def f(a, b, c, d)` without catch-alls, so keywords go through identity matching.
fn keyword_signature() -> ParameterList {
    ParameterList::new(["a", "b", "c", "d"].map(ParameterSpec::plain))
}

fn generate(table: &SharedConstantTable, parameters: ParameterList) -> GeneratedEntryPoints {
    CallBindingGenerator::new(CodegenOptions::default(), table)
        .generate(&FunctionDecl::new("f_1", "f", parameters))
        .unwrap()
}

fn int(value: i64) -> RuntimeValue {
    Arc::new(ConstantValue::int(value))
}

/// Generates and renders both entry points of a wide signature.
fn bench_generate(bench: &mut Bencher) {
    let table = SharedConstantTable::default();
    let decl = FunctionDecl::new("f_1", "f", wide_signature());
    let mut generator = CallBindingGenerator::new(CodegenOptions::default(), &table);

    bench.iter(|| {
        let entry = generator.generate(black_box(&decl)).unwrap();
        black_box(entry.plain.code.len());
    });
}

/// Binds a call to the wide signature with every kind of argument present.
fn bench_execute_wide(bench: &mut Bencher) {
    let table = SharedConstantTable::default();
    let entry = generate(&table, wide_signature());
    let defaults = vec![int(1)];
    let pair = Arc::new(ConstantValue::tuple([ConstantValue::int(3), ConstantValue::int(4)]));
    let arguments = CallArguments::positional([int(1), int(2), pair, int(5), int(6), int(7)])
        .keyword(table.intern_name("x"), int(8));
    assert_eq!(execute(&entry.plain.program, &defaults, &arguments).unwrap().len(), 7);

    bench.iter(|| {
        let bound = execute(black_box(&entry.plain.program), &defaults, black_box(&arguments)).unwrap();
        black_box(bound.len());
    });
}

/// Binds keywords whose keys are the interned parameter names.
fn bench_keywords_quick(bench: &mut Bencher) {
    let table = SharedConstantTable::default();
    let entry = generate(&table, keyword_signature());
    let arguments = ["d", "c", "b", "a"]
        .into_iter()
        .fold(CallArguments::default(), |arguments, name| {
            arguments.keyword(table.intern_name(name), int(0))
        });
    assert_eq!(
        execute(&entry.plain.program, &[], &arguments).unwrap().quick_path_hits(),
        4
    );

    bench.iter(|| {
        let bound = execute(black_box(&entry.plain.program), &[], black_box(&arguments)).unwrap();
        black_box(bound.quick_path_hits());
    });
}

/// Binds keywords whose keys only compare equal to the parameter names.
fn bench_keywords_slow(bench: &mut Bencher) {
    let table = SharedConstantTable::default();
    let entry = generate(&table, keyword_signature());
    let arguments = ["d", "c", "b", "a"]
        .into_iter()
        .fold(CallArguments::default(), |arguments, name| {
            arguments.keyword(Arc::from(name), int(0))
        });
    assert_eq!(
        execute(&entry.plain.program, &[], &arguments).unwrap().slow_path_hits(),
        4
    );

    bench.iter(|| {
        let bound = execute(black_box(&entry.plain.program), &[], black_box(&arguments)).unwrap();
        black_box(bound.slow_path_hits());
    });
}

/// Registers a batch of constants, most of them duplicates.
fn bench_constant_dedup(bench: &mut Bencher) {
    let constants: Vec<ConstantValue> = (0..200)
        .map(|i| {
            ConstantValue::tuple([
                ConstantValue::int(i % 20),
                ConstantValue::Float(f64::NAN),
                ConstantValue::List(vec![ConstantValue::str("x")]),
            ])
        })
        .collect();

    bench.iter(|| {
        let mut table = ConstantTable::new();
        for constant in &constants {
            black_box(table.get_or_insert(constant));
        }
        black_box(table.len());
    });
}

/// Configures the call-binding benchmark group.
fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("generate_wide_signature", bench_generate);
    c.bench_function("execute_wide_signature", bench_execute_wide);
    c.bench_function("keywords_quick_path", bench_keywords_quick);
    c.bench_function("keywords_slow_path", bench_keywords_slow);
    c.bench_function("constant_dedup", bench_constant_dedup);
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
