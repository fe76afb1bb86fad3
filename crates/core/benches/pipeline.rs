use criterion::{criterion_group, criterion_main, Criterion};
use tabula::db::{ColumnOptions, CursorOptions};
use tabula::expr::{ExpressionBuilder, Operator};
use tabula::pipeline::PipelineBuilder;
use tabula::{DataType, Datum, Db, TableId};

const NUM_ROWS: i64 = 1 << 16;

fn fixture() -> (Db, TableId) {
    let mut db = Db::new();
    let t = db.create_table("bench").unwrap();
    db.create_column(t, "value", DataType::Int, ColumnOptions::default())
        .unwrap();
    db.create_column(t, "weight", DataType::Float, ColumnOptions::default())
        .unwrap();
    for at in 0..NUM_ROWS {
        let row = db.insert_row(t, &Datum::Na).unwrap();
        db.set_value(t, "value", row, &Datum::from(at % 256)).unwrap();
        db.set_value(t, "weight", row, &Datum::from((at % 256) as f64 / 256.0))
            .unwrap();
    }
    (db, t)
}

fn filter_expression(db: &Db, t: TableId) -> tabula::expr::Expression {
    let mut builder = ExpressionBuilder::new(db, t).unwrap();
    builder.push_column("value").unwrap();
    builder.push_constant(Datum::from(128i64)).unwrap();
    builder.push_operator(Operator::Less).unwrap();
    builder.release().unwrap()
}

fn adjust_expression(db: &Db, t: TableId) -> tabula::expr::Expression {
    let mut builder = ExpressionBuilder::new(db, t).unwrap();
    builder.push_column("weight").unwrap();
    builder.push_constant(Datum::from(100.0)).unwrap();
    builder.push_operator(Operator::Multiplication).unwrap();
    builder.release().unwrap()
}

fn bench_filter(c: &mut Criterion) {
    let (db, t) = fixture();
    c.bench_function("filter_half", |b| {
        b.iter(|| {
            let mut pipeline = PipelineBuilder::new(&db, t).unwrap();
            pipeline.push_cursor(db.table(t).unwrap().create_cursor(CursorOptions::default()));
            pipeline
                .push_filter(filter_expression(&db, t), 0, usize::MAX)
                .unwrap();
            let mut records = Vec::new();
            pipeline.release().unwrap().flush(&mut records).unwrap();
            records.len()
        })
    });
}

fn bench_adjuster(c: &mut Criterion) {
    let (db, t) = fixture();
    c.bench_function("adjust_all", |b| {
        b.iter(|| {
            let mut pipeline = PipelineBuilder::new(&db, t).unwrap();
            pipeline.push_cursor(db.table(t).unwrap().create_cursor(CursorOptions::default()));
            pipeline.push_adjuster(adjust_expression(&db, t)).unwrap();
            let mut records = Vec::new();
            pipeline.release().unwrap().flush(&mut records).unwrap();
            records.len()
        })
    });
}

criterion_group!(benches, bench_filter, bench_adjuster);
criterion_main!(benches);
