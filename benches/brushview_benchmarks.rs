use brushview::*;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

const REGIONS: [&str; 8] = ["East", "West", "North", "South", "Central", "Coast", "Hills", "Plains"];

fn sales_table(rows: usize, stride: usize) -> SharedTable {
    let schema = Schema::new(vec![
        ("Region".to_string(), ColumnType::String, false),
        ("Day".to_string(), ColumnType::Date, false),
        ("Sales".to_string(), ColumnType::Float64, true),
    ]);
    let mut table = DataTable::new("sales".to_string(), schema);
    for i in (0..rows).step_by(stride) {
        table
            .append_row(vec![
                ColumnValue::String(REGIONS[i % REGIONS.len()].to_string()),
                ColumnValue::Date((i / REGIONS.len()) as i32),
                ColumnValue::Float64(i as f64),
            ])
            .unwrap();
    }
    shared(table)
}

fn bench_tuple_index_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("tuple_index_build");
    let columns = vec!["Region".to_string(), "Day".to_string()];

    for size in [1000, 10000, 100000].iter() {
        let table = sales_table(*size, 1);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| TupleIndex::build(&*table.borrow(), black_box(&columns)));
        });
    }
    group.finish();
}

fn bench_merge_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_construction");

    for size in [1000, 10000, 100000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter_batched(
                || (sales_table(size, 1), sales_table(size, 10)),
                |(all, brushed)| MergeView::new(all, brushed),
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_merge_read_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_read_path");

    for size in [1000, 10000, 100000].iter() {
        let view = MergeView::new(sales_table(*size, 1), sales_table(*size, 10));
        let sales = view.index_of("Sales").unwrap();
        let all_sales = view.index_of("__all__Sales").unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let mut sum = 0.0;
                for row in 0..view.row_count() {
                    sum += view.value(black_box(sales), row).to_f64().unwrap_or(0.0);
                    sum += view.value(black_box(all_sales), row).to_f64().unwrap_or(0.0);
                }
                sum
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_tuple_index_build,
    bench_merge_construction,
    bench_merge_read_path
);

criterion_main!(benches);
