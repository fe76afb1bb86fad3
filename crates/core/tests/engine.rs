//! End-to-end scenarios driving tables, expressions and pipelines
//! together through the public API.

use tabula::db::{ColumnOptions, Cursor, CursorOptions, OrderType};
use tabula::expr::{ExpressionBuilder, Operator};
use tabula::pipeline::{
    MergerLogicalOperator, MergerOptions, MergerScoreOperator, PipelineBuilder, Sorter,
    SorterOptions, SorterOrder,
};
use tabula::{Bool, DataType, Datum, Db, Float, Int, Record, TableId, Text};

fn int_table(values: &[Option<i64>]) -> (Db, TableId) {
    let mut db = Db::new();
    let t = db.create_table("data").unwrap();
    db.create_column(t, "x", DataType::Int, ColumnOptions::default())
        .unwrap();
    for value in values {
        let row = db.insert_row(t, &Datum::Na).unwrap();
        if let Some(v) = value {
            db.set_value(t, "x", row, &Datum::from(*v)).unwrap();
        }
    }
    (db, t)
}

fn row_ids(records: &[Record]) -> Vec<i64> {
    records.iter().map(|r| r.row_id.value()).collect()
}

#[test]
fn insert_then_find() {
    let mut db = Db::new();
    let t = db.create_table("keyed").unwrap();
    db.create_column(t, "k", DataType::Int, ColumnOptions::default())
        .unwrap();
    db.set_key_column(t, "k").unwrap();
    db.insert_row(t, &Datum::from(10i64)).unwrap();
    let second = db.insert_row(t, &Datum::from(20i64)).unwrap();
    db.insert_row(t, &Datum::from(30i64)).unwrap();

    let table = db.table(t).unwrap();
    assert_eq!(table.find_row(&Datum::from(20i64)).unwrap(), second);
    assert!(table.find_row(&Datum::from(99i64)).unwrap().is_na());
}

#[test]
fn filter_keeps_matching_rows() {
    let (db, t) = int_table(&(0..16).map(Some).collect::<Vec<_>>());

    let mut builder = ExpressionBuilder::new(&db, t).unwrap();
    builder.push_column("x").unwrap();
    builder.push_constant(Datum::from(8i64)).unwrap();
    builder.push_operator(Operator::GreaterEqual).unwrap();
    let expression = builder.release().unwrap();

    let mut pipeline = PipelineBuilder::new(&db, t).unwrap();
    pipeline.push_cursor(db.table(t).unwrap().create_cursor(CursorOptions::default()));
    pipeline
        .push_filter(expression, 0, usize::MAX)
        .unwrap();
    let mut pipeline = pipeline.release().unwrap();

    let mut records = Vec::new();
    pipeline.flush(&mut records).unwrap();
    assert_eq!(row_ids(&records), (8..16).collect::<Vec<_>>());
}

#[test]
fn three_valued_filter() {
    let mut db = Db::new();
    let t = db.create_table("flags").unwrap();
    db.create_column(t, "b", DataType::Bool, ColumnOptions::default())
        .unwrap();
    let values = [
        Some(true),
        Some(false),
        None,
        Some(true),
        None,
    ];
    for value in values {
        let row = db.insert_row(t, &Datum::Na).unwrap();
        if let Some(v) = value {
            db.set_value(t, "b", row, &Datum::from(v)).unwrap();
        }
    }

    let filter_rows = |negate: bool| -> Vec<i64> {
        let mut builder = ExpressionBuilder::new(&db, t).unwrap();
        builder.push_column("b").unwrap();
        if negate {
            builder.push_operator(Operator::LogicalNot).unwrap();
        }
        let expression = builder.release().unwrap();
        let mut records = Vec::new();
        db.table(t)
            .unwrap()
            .create_cursor(CursorOptions::default())
            .read_all(&mut records)
            .unwrap();
        expression.filter(&db, &mut records).unwrap();
        row_ids(&records)
    };

    // True lanes only: N/A is not true, and NOT N/A is still N/A.
    assert_eq!(filter_rows(false), vec![0, 3]);
    assert_eq!(filter_rows(true), vec![1]);
}

#[test]
fn sort_with_na_keys() {
    // Values [3, N/A, 1, N/A, 2].
    let (db, t) = int_table(&[Some(3), None, Some(1), None, Some(2)]);

    let sort = |order: OrderType| -> Vec<i64> {
        let mut builder = ExpressionBuilder::new(&db, t).unwrap();
        builder.push_column("x").unwrap();
        let key = builder.release().unwrap();
        let mut sorter =
            Sorter::new(vec![SorterOrder::new(key, order)], SorterOptions::default()).unwrap();
        let mut records = Vec::new();
        db.table(t)
            .unwrap()
            .create_cursor(CursorOptions::default())
            .read_all(&mut records)
            .unwrap();
        sorter.sort(&db, &mut records).unwrap();
        row_ids(&records)
    };

    // Regular: values 1, 2, 3, then the N/As in input order.
    assert_eq!(sort(OrderType::Regular), vec![2, 4, 0, 1, 3]);
    // Reverse: N/As first (input order kept by stability), then 3, 2, 1.
    assert_eq!(sort(OrderType::Reverse), vec![1, 3, 0, 4, 2]);
}

#[test]
fn sorter_is_stable_with_tiebreakers() {
    let (db, t) = int_table(&[Some(1), Some(0), Some(1), Some(0)]);

    let mut builder = ExpressionBuilder::new(&db, t).unwrap();
    builder.push_column("x").unwrap();
    let key = builder.release().unwrap();
    let mut sorter = Sorter::new(
        vec![SorterOrder::new(key, OrderType::Regular)],
        SorterOptions::default(),
    )
    .unwrap();
    let mut records = Vec::new();
    db.table(t)
        .unwrap()
        .create_cursor(CursorOptions::default())
        .read_all(&mut records)
        .unwrap();
    sorter.sort(&db, &mut records).unwrap();
    // Equal keys keep input order.
    assert_eq!(row_ids(&records), vec![1, 3, 0, 2]);

    // A `_id` tiebreaker after a reverse key.
    let mut builder = ExpressionBuilder::new(&db, t).unwrap();
    builder.push_column("x").unwrap();
    let primary = builder.release().unwrap();
    let mut builder = ExpressionBuilder::new(&db, t).unwrap();
    builder.push_row_id().unwrap();
    let tiebreak = builder.release().unwrap();
    let mut sorter = Sorter::new(
        vec![
            SorterOrder::new(primary, OrderType::Reverse),
            SorterOrder::new(tiebreak, OrderType::Reverse),
        ],
        SorterOptions::default(),
    )
    .unwrap();
    let mut records = Vec::new();
    db.table(t)
        .unwrap()
        .create_cursor(CursorOptions::default())
        .read_all(&mut records)
        .unwrap();
    sorter.sort(&db, &mut records).unwrap();
    assert_eq!(row_ids(&records), vec![2, 0, 3, 1]);
}

#[test]
fn sorter_window() {
    let (db, t) = int_table(&[Some(5), Some(1), Some(4), Some(2), Some(3)]);
    let mut builder = ExpressionBuilder::new(&db, t).unwrap();
    builder.push_column("x").unwrap();
    let key = builder.release().unwrap();
    let mut sorter = Sorter::new(
        vec![SorterOrder::new(key, OrderType::Regular)],
        SorterOptions {
            offset: 1,
            limit: 2,
        },
    )
    .unwrap();
    let mut records = Vec::new();
    db.table(t)
        .unwrap()
        .create_cursor(CursorOptions::default())
        .read_all(&mut records)
        .unwrap();
    sorter.sort(&db, &mut records).unwrap();
    // Sorted values are 1,2,3,4,5; the window keeps 2 and 3.
    assert_eq!(row_ids(&records), vec![3, 4]);
}

#[test]
fn merge_and_plus() {
    let left = vec![
        Record::new(Int::new(1), Float::new(1.0)),
        Record::new(Int::new(3), Float::new(2.0)),
    ];
    let right = vec![
        Record::new(Int::new(3), Float::new(5.0)),
        Record::new(Int::new(5), Float::new(7.0)),
    ];
    let mut merger = tabula::pipeline::Merger::new(MergerOptions::default());
    let merged = merger.merge(left, right).unwrap();
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].row_id, Int::new(3));
    assert!(merged[0].score.matches(&Float::new(7.0)));
}

#[test]
fn merger_set_and_score_operators() {
    let left = vec![
        Record::new(Int::new(0), Float::new(1.0)),
        Record::new(Int::new(1), Float::new(2.0)),
    ];
    let right = vec![
        Record::new(Int::new(1), Float::new(10.0)),
        Record::new(Int::new(2), Float::new(20.0)),
    ];
    let run = |logical, score, missing: f64| -> Vec<(i64, f64)> {
        let mut merger = tabula::pipeline::Merger::new(MergerOptions {
            logical_operator: logical,
            score_operator: score,
            missing_score: Float::new(missing),
            ..Default::default()
        });
        let mut out: Vec<(i64, f64)> = merger
            .merge(left.clone(), right.clone())
            .unwrap()
            .iter()
            .map(|r| (r.row_id.value(), r.score.value()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    };

    use MergerLogicalOperator as L;
    use MergerScoreOperator as S;
    assert_eq!(run(L::Or, S::Plus, 100.0), vec![(0, 101.0), (1, 12.0), (2, 120.0)]);
    assert_eq!(run(L::Xor, S::Left, 0.0), vec![(0, 1.0), (2, 0.0)]);
    assert_eq!(run(L::Minus, S::Left, 0.0), vec![(0, 1.0)]);
    assert_eq!(run(L::Left, S::Minus, 0.5), vec![(0, 0.5), (1, -8.0)]);
    assert_eq!(run(L::Right, S::Right, 0.0), vec![(1, 10.0), (2, 20.0)]);
    assert_eq!(run(L::And, S::Zero, 9.0), vec![(1, 0.0)]);
    assert_eq!(run(L::And, S::Multiplication, 9.0), vec![(1, 20.0)]);
}

#[test]
fn dereference_through_pipeline() {
    let mut db = Db::new();
    let authors = db.create_table("authors").unwrap();
    db.create_column(authors, "id", DataType::Int, ColumnOptions::default())
        .unwrap();
    db.set_key_column(authors, "id").unwrap();
    db.create_column(authors, "name", DataType::Text, ColumnOptions::default())
        .unwrap();
    let books = db.create_table("books").unwrap();
    db.create_column(
        books,
        "author",
        DataType::Int,
        ColumnOptions {
            reference_table: Some("authors".into()),
        },
    )
    .unwrap();
    db.create_column(books, "title", DataType::Text, ColumnOptions::default())
        .unwrap();

    let ada = db.insert_row(authors, &Datum::from(1i64)).unwrap();
    db.set_value(authors, "name", ada, &Datum::from("Ada")).unwrap();
    let book = db.insert_row(books, &Datum::Na).unwrap();
    db.set_value(books, "author", book, &Datum::Int(ada)).unwrap();
    db.set_value(books, "title", book, &Datum::from("Notes")).unwrap();
    // A second book with no author stays N/A and never matches.
    db.insert_row(books, &Datum::Na).unwrap();

    let mut builder = ExpressionBuilder::new(&db, books).unwrap();
    builder.push_column("author").unwrap();
    builder.begin_subexpression().unwrap();
    builder.push_column("name").unwrap();
    builder.end_subexpression().unwrap();
    builder.push_constant(Datum::from("Ada")).unwrap();
    builder.push_operator(Operator::Equal).unwrap();
    let expression = builder.release().unwrap();

    let mut pipeline = PipelineBuilder::new(&db, books).unwrap();
    pipeline.push_cursor(db.table(books).unwrap().create_cursor(CursorOptions::default()));
    pipeline.push_filter(expression, 0, usize::MAX).unwrap();
    let mut pipeline = pipeline.release().unwrap();
    let mut records = Vec::new();
    pipeline.flush(&mut records).unwrap();
    assert_eq!(row_ids(&records), vec![book.value()]);

    // The same query through the infix parser.
    let expression = tabula::expr::parse(&db, books, "author.name == \"Ada\"").unwrap();
    let mut records = Vec::new();
    db.table(books)
        .unwrap()
        .create_cursor(CursorOptions::default())
        .read_all(&mut records)
        .unwrap();
    expression.filter(&db, &mut records).unwrap();
    assert_eq!(row_ids(&records), vec![book.value()]);
}

#[test]
fn filter_composition_matches_conjunction() {
    let values: Vec<Option<i64>> = (0..100)
        .map(|v| if v % 7 == 0 { None } else { Some(v % 13) })
        .collect();
    let (db, t) = int_table(&values);

    let build = |f: &dyn Fn(&mut ExpressionBuilder)| {
        let mut builder = ExpressionBuilder::new(&db, t).unwrap();
        f(&mut builder);
        builder.release().unwrap()
    };
    let p = |b: &mut ExpressionBuilder| {
        b.push_column("x").unwrap();
        b.push_constant(Datum::from(3i64)).unwrap();
        b.push_operator(Operator::Greater).unwrap();
    };
    let q = |b: &mut ExpressionBuilder| {
        b.push_column("x").unwrap();
        b.push_constant(Datum::from(10i64)).unwrap();
        b.push_operator(Operator::Less).unwrap();
    };

    // cursor | filter(P) | filter(Q)
    let mut pipeline = PipelineBuilder::new(&db, t).unwrap();
    pipeline.push_cursor(db.table(t).unwrap().create_cursor(CursorOptions::default()));
    pipeline.push_filter(build(&p), 0, usize::MAX).unwrap();
    pipeline.push_filter(build(&q), 0, usize::MAX).unwrap();
    let mut chained = Vec::new();
    pipeline.release().unwrap().flush(&mut chained).unwrap();

    // cursor | filter(P && Q)
    let conjunction = build(&|b: &mut ExpressionBuilder| {
        p(b);
        q(b);
        b.push_operator(Operator::LogicalAnd).unwrap();
    });
    let mut pipeline = PipelineBuilder::new(&db, t).unwrap();
    pipeline.push_cursor(db.table(t).unwrap().create_cursor(CursorOptions::default()));
    pipeline.push_filter(conjunction, 0, usize::MAX).unwrap();
    let mut folded = Vec::new();
    pipeline.release().unwrap().flush(&mut folded).unwrap();

    assert_eq!(row_ids(&chained), row_ids(&folded));
    assert!(!chained.is_empty());
}

#[test]
fn filter_offset_limit_pushdown() {
    let values: Vec<Option<i64>> = (0..3000).map(|v| Some(v % 5)).collect();
    let (db, t) = int_table(&values);

    let predicate = || {
        let mut builder = ExpressionBuilder::new(&db, t).unwrap();
        builder.push_column("x").unwrap();
        builder.push_constant(Datum::from(0i64)).unwrap();
        builder.push_operator(Operator::Equal).unwrap();
        builder.release().unwrap()
    };

    let mut pipeline = PipelineBuilder::new(&db, t).unwrap();
    pipeline.push_cursor(db.table(t).unwrap().create_cursor(CursorOptions::default()));
    pipeline.push_filter(predicate(), 0, usize::MAX).unwrap();
    let mut plain = Vec::new();
    pipeline.release().unwrap().flush(&mut plain).unwrap();

    let (offset, limit) = (100, 250);
    let mut pipeline = PipelineBuilder::new(&db, t).unwrap();
    pipeline.push_cursor(db.table(t).unwrap().create_cursor(CursorOptions::default()));
    pipeline.push_filter(predicate(), offset, limit).unwrap();
    let mut windowed = Vec::new();
    pipeline.release().unwrap().flush(&mut windowed).unwrap();

    let expected: Vec<i64> = row_ids(&plain)
        .into_iter()
        .skip(offset)
        .take(limit)
        .collect();
    assert_eq!(row_ids(&windowed), expected);
    assert_eq!(windowed.len(), limit);
}

#[test]
fn adjuster_overwrites_scores() {
    let mut db = Db::new();
    let t = db.create_table("scored").unwrap();
    db.create_column(t, "w", DataType::Float, ColumnOptions::default())
        .unwrap();
    for v in [0.5, 1.5, 2.5] {
        let row = db.insert_row(t, &Datum::Na).unwrap();
        db.set_value(t, "w", row, &Datum::from(v)).unwrap();
    }

    let mut builder = ExpressionBuilder::new(&db, t).unwrap();
    builder.push_column("w").unwrap();
    builder.push_constant(Datum::from(100.0)).unwrap();
    builder.push_operator(Operator::Multiplication).unwrap();
    let expression = builder.release().unwrap();

    let mut pipeline = PipelineBuilder::new(&db, t).unwrap();
    pipeline.push_cursor(db.table(t).unwrap().create_cursor(CursorOptions::default()));
    pipeline.push_adjuster(expression).unwrap();
    let mut records = Vec::new();
    pipeline.release().unwrap().flush(&mut records).unwrap();

    assert_eq!(row_ids(&records), vec![0, 1, 2]);
    let scores: Vec<f64> = records.iter().map(|r| r.score.value()).collect();
    assert_eq!(scores, vec![50.0, 150.0, 250.0]);
}

#[test]
fn evaluate_projects_with_na_lanes() {
    let (db, t) = int_table(&[Some(1), None, Some(3)]);
    let mut builder = ExpressionBuilder::new(&db, t).unwrap();
    builder.push_column("x").unwrap();
    builder.push_column("x").unwrap();
    builder.push_operator(Operator::Plus).unwrap();
    let expression = builder.release().unwrap();

    let mut records = Vec::new();
    db.table(t)
        .unwrap()
        .create_cursor(CursorOptions::default())
        .read_all(&mut records)
        .unwrap();
    let mut out: Vec<Int> = Vec::new();
    expression.evaluate(&db, &records, &mut out).unwrap();
    assert_eq!(out.len(), records.len());
    assert_eq!(out[0], Int::new(2));
    assert!(out[1].is_na());
    assert_eq!(out[2], Int::new(6));

    // The output type is checked.
    let mut wrong: Vec<Float> = Vec::new();
    assert!(expression.evaluate(&db, &records, &mut wrong).is_err());
}

#[test]
fn operator_type_checks_fail_at_push() {
    let (db, t) = int_table(&[Some(1)]);
    let mut builder = ExpressionBuilder::new(&db, t).unwrap();
    builder.push_column("x").unwrap();
    builder.push_constant(Datum::from("nope")).unwrap();
    let err = builder.push_operator(Operator::Plus).unwrap_err();
    assert_eq!(err.kind(), tabula::ErrorKind::InvalidOperand);

    // The failed push left both operands on the stack.
    let err = builder.release().unwrap_err();
    assert_eq!(err.kind(), tabula::ErrorKind::InvalidOperation);
    builder.clear();
    let err = builder.release().unwrap_err();
    assert_eq!(err.kind(), tabula::ErrorKind::InvalidOperation);
}

#[test]
fn text_operators_and_subscript() {
    let mut db = Db::new();
    let t = db.create_table("texts").unwrap();
    db.create_column(t, "s", DataType::Text, ColumnOptions::default())
        .unwrap();
    for value in ["alpha", "beta", "alphabet"] {
        let row = db.insert_row(t, &Datum::Na).unwrap();
        db.set_value(t, "s", row, &Datum::from(value)).unwrap();
    }
    let row_na = db.insert_row(t, &Datum::Na).unwrap();
    let _ = row_na;

    let filter_with = |op: Operator, needle: &str| -> Vec<i64> {
        let mut builder = ExpressionBuilder::new(&db, t).unwrap();
        builder.push_column("s").unwrap();
        builder.push_constant(Datum::from(needle)).unwrap();
        builder.push_operator(op).unwrap();
        let expression = builder.release().unwrap();
        let mut records = Vec::new();
        db.table(t)
            .unwrap()
            .create_cursor(CursorOptions::default())
            .read_all(&mut records)
            .unwrap();
        expression.filter(&db, &mut records).unwrap();
        row_ids(&records)
    };

    assert_eq!(filter_with(Operator::StartsWith, "alpha"), vec![0, 2]);
    assert_eq!(filter_with(Operator::EndsWith, "a"), vec![0, 1]);
    assert_eq!(filter_with(Operator::Contains, "phab"), vec![2]);

    // Subscript: s[0] yields the first byte.
    let expression = tabula::expr::parse(&db, t, "s[0] == 98").unwrap();
    let mut records = Vec::new();
    db.table(t)
        .unwrap()
        .create_cursor(CursorOptions::default())
        .read_all(&mut records)
        .unwrap();
    expression.filter(&db, &mut records).unwrap();
    assert_eq!(row_ids(&records), vec![1]);
}

#[test]
fn parser_precedence() {
    let (db, t) = int_table(&(0..20).map(Some).collect::<Vec<_>>());
    // `*` binds tighter than `+`, comparisons tighter than `&&`.
    let expression = tabula::expr::parse(&db, t, "x + 2 * 3 == 10 || x == 0").unwrap();
    assert_eq!(expression.data_type(), DataType::Bool);
    let mut records = Vec::new();
    db.table(t)
        .unwrap()
        .create_cursor(CursorOptions::default())
        .read_all(&mut records)
        .unwrap();
    expression.filter(&db, &mut records).unwrap();
    assert_eq!(row_ids(&records), vec![0, 4]);

    let err = tabula::expr::parse(&db, t, "x +").unwrap_err();
    assert_eq!(err.kind(), tabula::ErrorKind::InvalidArgument);
    let err = tabula::expr::parse(&db, t, "missing_column == 1").unwrap_err();
    assert_eq!(err.kind(), tabula::ErrorKind::NotFound);
}

#[test]
fn score_pseudo_column_flows_through_stages() {
    let (db, t) = int_table(&[Some(1), Some(2), Some(3)]);

    // adjust score = x, then filter _score > 1.5.
    let mut builder = ExpressionBuilder::new(&db, t).unwrap();
    builder.push_column("x").unwrap();
    builder.push_operator(Operator::ToFloat).unwrap();
    let adjust = builder.release().unwrap();

    let mut builder = ExpressionBuilder::new(&db, t).unwrap();
    builder.push_score().unwrap();
    builder.push_constant(Datum::from(1.5)).unwrap();
    builder.push_operator(Operator::Greater).unwrap();
    let keep = builder.release().unwrap();

    let mut pipeline = PipelineBuilder::new(&db, t).unwrap();
    pipeline.push_cursor(db.table(t).unwrap().create_cursor(CursorOptions::default()));
    pipeline.push_adjuster(adjust).unwrap();
    pipeline.push_filter(keep, 0, usize::MAX).unwrap();
    let mut records = Vec::new();
    pipeline.release().unwrap().flush(&mut records).unwrap();
    assert_eq!(row_ids(&records), vec![1, 2]);
}

#[test]
fn pipeline_identity_over_cursor() {
    let (db, t) = int_table(&(0..2500).map(Some).collect::<Vec<_>>());
    let mut pipeline = PipelineBuilder::new(&db, t).unwrap();
    pipeline.push_cursor(db.table(t).unwrap().create_cursor(CursorOptions::default()));
    let mut records = Vec::new();
    pipeline.release().unwrap().flush(&mut records).unwrap();
    assert_eq!(records.len(), 2500);
    assert_eq!(row_ids(&records), (0..2500).collect::<Vec<_>>());
    assert!(records.iter().all(|r| r.score.matches(&Float::new(0.0))));
}

#[test]
fn merger_pipeline_combines_two_branches() {
    let (db, t) = int_table(&(0..50).map(Some).collect::<Vec<_>>());

    let parse = |text: &str| tabula::expr::parse(&db, t, text).unwrap();

    let mut pipeline = PipelineBuilder::new(&db, t).unwrap();
    // Left branch: x < 30.
    pipeline.push_cursor(db.table(t).unwrap().create_cursor(CursorOptions::default()));
    pipeline.push_filter(parse("x < 30"), 0, usize::MAX).unwrap();
    // Right branch: x >= 20.
    pipeline.push_cursor(db.table(t).unwrap().create_cursor(CursorOptions::default()));
    pipeline.push_filter(parse("x >= 20"), 0, usize::MAX).unwrap();
    pipeline
        .push_merger(MergerOptions {
            logical_operator: MergerLogicalOperator::And,
            score_operator: MergerScoreOperator::Plus,
            ..Default::default()
        })
        .unwrap();
    let mut records = Vec::new();
    pipeline.release().unwrap().flush(&mut records).unwrap();
    let mut rows = row_ids(&records);
    rows.sort_unstable();
    assert_eq!(rows, (20..30).collect::<Vec<_>>());
}

#[test]
fn unbalanced_builders_are_rejected() {
    let (db, t) = int_table(&[Some(1)]);

    let mut builder = ExpressionBuilder::new(&db, t).unwrap();
    builder.push_column("x").unwrap();
    builder.push_column("x").unwrap();
    let err = builder.release().unwrap_err();
    assert_eq!(err.kind(), tabula::ErrorKind::InvalidOperation);

    let mut pipeline = PipelineBuilder::new(&db, t).unwrap();
    let err = pipeline.release().unwrap_err();
    assert_eq!(err.kind(), tabula::ErrorKind::InvalidOperation);
    let err = pipeline
        .push_merger(MergerOptions::default())
        .unwrap_err();
    assert_eq!(err.kind(), tabula::ErrorKind::InvalidOperation);
}

#[test]
fn bool_constant_filters() {
    let (db, t) = int_table(&[Some(1), Some(2)]);
    let expression = tabula::expr::parse(&db, t, "true").unwrap();
    let mut records = Vec::new();
    db.table(t)
        .unwrap()
        .create_cursor(CursorOptions::default())
        .read_all(&mut records)
        .unwrap();
    expression.filter(&db, &mut records).unwrap();
    assert_eq!(records.len(), 2);

    // Typed N/A constants are allowed; the typeless one is not.
    let mut builder = ExpressionBuilder::new(&db, t).unwrap();
    builder.push_constant(Datum::Bool(Bool::Na)).unwrap();
    let expression = builder.release().unwrap();
    let mut records = Vec::new();
    db.table(t)
        .unwrap()
        .create_cursor(CursorOptions::default())
        .read_all(&mut records)
        .unwrap();
    expression.filter(&db, &mut records).unwrap();
    assert!(records.is_empty());

    let mut builder = ExpressionBuilder::new(&db, t).unwrap();
    let err = builder.push_constant(Datum::Na).unwrap_err();
    assert_eq!(err.kind(), tabula::ErrorKind::InvalidArgument);
}

#[test]
fn geo_point_ordering_in_expressions() {
    let mut db = Db::new();
    let t = db.create_table("places").unwrap();
    db.create_column(t, "p", DataType::GeoPoint, ColumnOptions::default())
        .unwrap();
    let deg = 60 * 60 * 1000i64;
    let points = [(10, 20), (10, 30), (20, 0)];
    for (lat, lon) in points {
        let row = db.insert_row(t, &Datum::Na).unwrap();
        let point = tabula::GeoPoint::new(Int::new(lat * deg), Int::new(lon * deg));
        db.set_value(t, "p", row, &Datum::GeoPoint(point)).unwrap();
    }
    let mut builder = ExpressionBuilder::new(&db, t).unwrap();
    builder.push_column("p").unwrap();
    let pivot = tabula::GeoPoint::new(Int::new(10 * deg), Int::new(25 * deg));
    builder.push_constant(Datum::GeoPoint(pivot)).unwrap();
    builder.push_operator(Operator::Less).unwrap();
    let expression = builder.release().unwrap();
    let mut records = Vec::new();
    db.table(t)
        .unwrap()
        .create_cursor(CursorOptions::default())
        .read_all(&mut records)
        .unwrap();
    expression.filter(&db, &mut records).unwrap();
    // Latitude first, longitude breaks the tie.
    assert_eq!(row_ids(&records), vec![0]);
}

#[test]
fn text_storage_survives_many_updates() {
    let mut db = Db::new();
    let t = db.create_table("texts").unwrap();
    db.create_column(t, "s", DataType::Text, ColumnOptions::default())
        .unwrap();
    let row = db.insert_row(t, &Datum::Na).unwrap();
    for i in 0..100 {
        let value = format!("value_{i}");
        db.set_value(t, "s", row, &Datum::from(value.as_str())).unwrap();
        assert_eq!(
            db.table(t).unwrap().column("s").unwrap().get(row),
            Datum::Text(Text::from(value.as_str()))
        );
    }
}

#[test]
fn merger_window_applies_to_the_output() {
    let left: Vec<Record> = (0..10)
        .map(|v| Record::new(Int::new(v), Float::new(v as f64)))
        .collect();
    let right = left.clone();
    let mut merger = tabula::pipeline::Merger::new(MergerOptions {
        logical_operator: MergerLogicalOperator::And,
        score_operator: MergerScoreOperator::Left,
        offset: 3,
        limit: 4,
        ..Default::default()
    });
    let merged = merger.merge(left, right).unwrap();
    assert_eq!(merged.len(), 4);
}

#[test]
fn float_na_reads_back_with_the_canonical_bits() {
    let mut db = Db::new();
    let t = db.create_table("floats").unwrap();
    db.create_column(t, "f", DataType::Float, ColumnOptions::default())
        .unwrap();
    let row = db.insert_row(t, &Datum::Na).unwrap();
    db.set_value(t, "f", row, &Datum::Float(Float::na())).unwrap();
    let got = db.table(t).unwrap().column("f").unwrap().get(row);
    let Datum::Float(value) = got else { panic!("wrong type") };
    assert_eq!(value.value().to_bits(), Float::NA_BITS);

    // Infinities are valid values, distinct from N/A.
    db.set_value(t, "f", row, &Datum::from(f64::INFINITY)).unwrap();
    assert!(!db.table(t).unwrap().column("f").unwrap().get(row).is_missing());
}

#[test]
fn keyed_inserts_use_an_attached_index() {
    let mut db = Db::new();
    let t = db.create_table("keyed").unwrap();
    db.create_column(t, "k", DataType::Text, ColumnOptions::default())
        .unwrap();
    db.set_key_column(t, "k").unwrap();
    db.create_index(t, "k", "k_hash", tabula::db::IndexType::Hash)
        .unwrap();
    for at in 0..100 {
        let key = format!("key_{at}");
        db.insert_row(t, &Datum::from(key.as_str())).unwrap();
    }
    let err = db.insert_row(t, &Datum::from("key_42")).unwrap_err();
    assert_eq!(err.kind(), tabula::ErrorKind::AlreadyExists);
    assert_eq!(
        db.table(t).unwrap().find_row(&Datum::from("key_7")).unwrap(),
        Int::new(7)
    );
    // Removal frees the key for reuse.
    db.remove_row(t, Int::new(42)).unwrap();
    let row = db.insert_row(t, &Datum::from("key_42")).unwrap();
    assert_eq!(row, Int::new(42));
}

#[test]
fn vector_columns_round_trip_and_compare() {
    let mut db = Db::new();
    let t = db.create_table("vectors").unwrap();
    db.create_column(t, "words", DataType::TextVector, ColumnOptions::default())
        .unwrap();
    let row = db.insert_row(t, &Datum::Na).unwrap();
    let words = tabula::Vector::<Text>::new(vec![
        Text::from("alpha"),
        Text::na(),
        Text::from(""),
    ]);
    db.set_value(t, "words", row, &Datum::TextVector(words.clone()))
        .unwrap();
    assert_eq!(
        db.table(t).unwrap().column("words").unwrap().get(row),
        Datum::TextVector(words.clone())
    );

    // words == constant, and words[0] subscripting, via expressions.
    let mut builder = ExpressionBuilder::new(&db, t).unwrap();
    builder.push_column("words").unwrap();
    builder.push_constant(Datum::TextVector(words)).unwrap();
    builder.push_operator(Operator::Equal).unwrap();
    let expression = builder.release().unwrap();
    let records = vec![Record::fresh(row)];
    let mut out: Vec<Bool> = Vec::new();
    expression.evaluate(&db, &records, &mut out).unwrap();
    assert_eq!(out, vec![Bool::True]);

    let expression = tabula::expr::parse(&db, t, "words[0] == \"alpha\"").unwrap();
    let mut records = vec![Record::fresh(row)];
    expression.filter(&db, &mut records).unwrap();
    assert_eq!(records.len(), 1);
}

#[test]
fn index_range_cursor_feeds_a_pipeline() {
    let mut db = Db::new();
    let t = db.create_table("data").unwrap();
    db.create_column(t, "x", DataType::Int, ColumnOptions::default())
        .unwrap();
    for v in [30i64, 10, 20, 40, 50] {
        let row = db.insert_row(t, &Datum::Na).unwrap();
        db.set_value(t, "x", row, &Datum::from(v)).unwrap();
    }
    db.create_index(t, "x", "x_tree", tabula::db::IndexType::Tree)
        .unwrap();

    let table = db.table(t).unwrap();
    let index = table.column("x").unwrap().find_index("x_tree").unwrap();
    let mut range = tabula::db::IndexRange::new();
    range.set_lower_bound(Datum::from(20i64), tabula::db::EndPointType::Inclusive);
    range.set_upper_bound(Datum::from(40i64), tabula::db::EndPointType::Inclusive);
    let cursor = index
        .find_in_range(&range, CursorOptions::default())
        .unwrap();
    let mut pipeline = PipelineBuilder::new(&db, t).unwrap();
    pipeline.push_cursor(cursor);
    let mut records = Vec::new();
    pipeline.release().unwrap().flush(&mut records).unwrap();
    // Key order: 20 (row 2), 30 (row 0), 40 (row 3).
    assert_eq!(row_ids(&records), vec![2, 0, 3]);
}

#[test]
fn cursor_block_size_never_changes_the_output() {
    let (db, t) = int_table(&(0..1500).map(Some).collect::<Vec<_>>());
    let table = db.table(t).unwrap();

    let mut all = Vec::new();
    table
        .create_cursor(CursorOptions::default())
        .read_all(&mut all)
        .unwrap();

    // Reading through a tiny buffer must produce the same records.
    let mut cursor = table.create_cursor(CursorOptions::default());
    let mut chunked = Vec::new();
    let mut buffer = [Record::fresh(Int::na()); 7];
    loop {
        let count = cursor.read(&mut buffer).unwrap();
        chunked.extend_from_slice(&buffer[..count]);
        if count < buffer.len() {
            break;
        }
    }
    assert_eq!(row_ids(&all), row_ids(&chunked));
    assert_eq!(all.len(), 1500);
}
