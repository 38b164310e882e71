use std::cell::RefCell;
use std::rc::Rc;

use criterion::{criterion_group, criterion_main, Criterion};
use squirt::runtime::default_namespace;

const FIB: &str = "
func fib(n) if n < 2 then return n end return fib(n-1) + fib(n-2) end
print(fib(15))
";

fn bench_frontend(c: &mut Criterion) {
    c.bench_function("parse_fib", |b| {
        b.iter(|| squirt::parser::parse_str(FIB).expect("parse failed"))
    });
}

fn bench_interpreter(c: &mut Criterion) {
    c.bench_function("eval_fib", |b| {
        b.iter(|| {
            let sink = Rc::new(RefCell::new(Vec::<u8>::new()));
            let scope = default_namespace(Some(sink));
            squirt::eval_str(&scope, FIB).expect("eval failed")
        })
    });
}

criterion_group!(benches, bench_frontend, bench_interpreter);
criterion_main!(benches);
