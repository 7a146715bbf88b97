//! SQL Engine Benchmarks
//!
//! - Parsing statements of increasing size
//! - Predicate evaluation against a single row scope
//! - Indexed point lookups versus full scans
//!
//! ## Running Benchmarks
//!
//! ```bash
//! cargo bench --bench sql_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mockdb::sql::evaluator::{ColumnRef, ExprEvaluator, Scope};
use mockdb::{parse, parse_where, Connection, Database, DbConfig, Dialect, DialectKind, Params, Value};

fn seeded_connection(row_count: usize) -> Connection {
    let db = Database::new(DbConfig::for_testing(DialectKind::MySql)).unwrap();
    let mut conn = db.connect();
    conn.execute(
        "CREATE TABLE users (id INT PRIMARY KEY, name VARCHAR(50), age INT, city VARCHAR(20))",
        &Params::new(),
    )
    .unwrap();

    for i in 0..row_count {
        conn.execute(
            "INSERT INTO users VALUES (@id, @name, @age, @city)",
            &Params::new()
                .bind("id", i as i64)
                .bind("name", format!("user{}", i))
                .bind("age", (20 + i % 60) as i64)
                .bind("city", if i % 3 == 0 { "Oslo" } else { "Lima" }),
        )
        .unwrap();
    }
    conn
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    let dialect = Dialect::latest(DialectKind::Postgres);

    let statements = [
        ("point_select", "SELECT name FROM users WHERE id = $1"),
        (
            "aggregate",
            "SELECT city, COUNT(*), AVG(age) FROM users WHERE age > 30 GROUP BY city HAVING COUNT(*) > 1 ORDER BY city",
        ),
        (
            "window_cte",
            "WITH recent AS (SELECT id, city, age FROM users WHERE age BETWEEN 20 AND 40) \
             SELECT id, ROW_NUMBER() OVER (PARTITION BY city ORDER BY age DESC) AS rn FROM recent",
        ),
        (
            "upsert",
            "INSERT INTO users (id, name) VALUES (1, 'a') ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name",
        ),
    ];

    for (name, sql) in statements.iter() {
        group.bench_with_input(BenchmarkId::from_parameter(name), sql, |b, sql| {
            b.iter(|| parse(black_box(sql), &dialect).unwrap());
        });
    }

    group.finish();
}

fn bench_predicate(c: &mut Criterion) {
    let mut group = c.benchmark_group("predicate");
    let dialect = Dialect::latest(DialectKind::MySql);
    let params = Params::new();
    let evaluator = ExprEvaluator::new(&dialect, &params);

    let columns = vec![
        ColumnRef::new(Some("users"), "id"),
        ColumnRef::new(Some("users"), "name"),
        ColumnRef::new(Some("users"), "age"),
    ];
    let values = vec![Value::Integer(42), Value::Text("Alice".into()), Value::Integer(31)];
    let scope = Scope::new(&columns, &values);

    let predicates = [
        ("equality", "id = 42"),
        ("boolean", "id = 1 OR age > 30 AND name <> 'Bob'"),
        ("like", "name LIKE 'A%e'"),
        ("in_list", "age IN (10, 20, 31, 40)"),
    ];

    for (name, source) in predicates.iter() {
        let expr = parse_where(source, &dialect).unwrap();
        group.bench_function(*name, |b| {
            b.iter(|| evaluator.eval_predicate(black_box(&expr), &scope).unwrap());
        });
    }

    group.finish();
}

fn bench_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("select");

    for count in [100, 1000].iter() {
        let mut conn = seeded_connection(*count);
        group.throughput(Throughput::Elements(1));

        group.bench_with_input(BenchmarkId::new("primary_key", count), count, |b, &count| {
            let params = Params::new().bind("id", (count / 2) as i64);
            b.iter(|| {
                conn.query("SELECT name FROM users WHERE id = @id", black_box(&params))
                    .unwrap()
            });
        });

        group.bench_with_input(BenchmarkId::new("full_scan", count), count, |b, _| {
            let params = Params::new().bind("city", "Oslo");
            b.iter(|| {
                conn.query("SELECT COUNT(*) FROM users WHERE city = @city", black_box(&params))
                    .unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parse, bench_predicate, bench_select);
criterion_main!(benches);
