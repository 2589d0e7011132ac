use bytes::Bytes;
use cmscript::expand::expand_list_argument;
use cmscript::parser::parse_file;
use cmscript::symtab::intern;
use criterion::{Criterion, black_box, criterion_group, criterion_main};

fn criterion_benchmark(c: &mut Criterion) {
    let block = "# sources\n\
                 set(SRCS a.c \"b c.c\" [=[d;e.c]=])\n\
                 if(FOO AND NOT BAR)\n  list(APPEND SRCS ${EXTRA})\nendif()\n";
    let text = Bytes::from(block.repeat(400000 / block.len()));
    let filename = intern("CMakeLists.txt");

    c.bench_function("parse_file", |b| {
        b.iter(|| black_box(parse_file(black_box(&text), filename)))
    });

    let item = "frameworks/base/docs/html/tv/adt-1/index.jd;";
    let list = item.repeat(400000 / item.len());
    c.bench_function("expand_list_argument", |b| {
        b.iter(|| black_box(expand_list_argument(black_box(&list), false)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
