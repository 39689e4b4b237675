//! Benchmark for simpledb-record statement throughput.
//!
//! Measures placeholder binding, statement translation, emulated INSERTs and
//! paged fetches against the in-memory store.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use simpledb_record::query::parse_mutation;
use simpledb_record::{
    Connection, ConnectionParams, MemoryStore, Record, Records, Statement,
};

#[derive(ValueEnum, Clone, Debug, PartialEq)]
enum Operation {
    Bind,
    Translate,
    Insert,
    FetchAll,
}

#[derive(Parser, Debug)]
#[command(name = "benchmark")]
#[command(about = "Benchmark simpledb-record binding, translation and execution")]
struct Args {
    /// Operation to benchmark
    #[arg(long, value_enum)]
    operation: Operation,

    /// Statements (or items) per iteration
    #[arg(short, long, default_value = "10000")]
    count: usize,

    /// Number of benchmark iterations
    #[arg(short, long, default_value = "5")]
    iterations: usize,

    /// Number of warmup iterations
    #[arg(short, long, default_value = "1")]
    warmup: usize,

    /// Page size of the in-memory store
    #[arg(long, default_value = "100")]
    page_size: usize,

    /// Output JSON file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

const INSERT_SQL: &str =
    "INSERT INTO cars (brand, colour, doors, note) VALUES (:brand, :colour, :doors, :note)";

fn bound_insert(i: usize) -> Result<Statement, Box<dyn std::error::Error>> {
    let mut stmt = Statement::new(INSERT_SQL);
    stmt.bind_value(":brand", if i % 2 == 0 { "Ford" } else { "Saab" })?
        .bind_value(":colour", "Black")?
        .bind_value(":doors", (i % 4 + 2) as i64)?
        .bind_value(":note", format!("O'Brien's car, no. {}", i))?;
    Ok(stmt)
}

fn connection(args: &Args) -> Result<Connection, Box<dyn std::error::Error>> {
    let params = ConnectionParams::builder()
        .key_space(u32::MAX as u64)
        .key_seed(1)
        .build()?;
    Ok(Connection::open(
        MemoryStore::new().with_page_size(args.page_size),
        params,
    )?)
}

async fn run_once(args: &Args) -> Result<(usize, f64), Box<dyn std::error::Error>> {
    match args.operation {
        Operation::Bind => {
            let start = Instant::now();
            for i in 0..args.count {
                bound_insert(i)?;
            }
            Ok((args.count, start.elapsed().as_secs_f64()))
        }
        Operation::Translate => {
            let statements = (0..args.count)
                .map(|i| bound_insert(i).map(|s| s.sql().to_string()))
                .collect::<Result<Vec<_>, _>>()?;
            let start = Instant::now();
            for sql in &statements {
                parse_mutation(sql)?;
            }
            Ok((args.count, start.elapsed().as_secs_f64()))
        }
        Operation::Insert => {
            let mut conn = connection(args)?;
            let start = Instant::now();
            for i in 0..args.count {
                conn.execute_statement(&mut bound_insert(i)?).await?;
            }
            Ok((args.count, start.elapsed().as_secs_f64()))
        }
        Operation::FetchAll => {
            let mut conn = connection(args)?;
            for i in 0..args.count {
                conn.execute_statement(&mut bound_insert(i)?).await?;
            }
            let start = Instant::now();
            let mut stmt = Statement::new("SELECT * FROM cars WHERE brand = :brand");
            stmt.bind_value(":brand", "Ford")?;
            let records: Records<Record> = conn.fetch_all_into(&mut stmt).await?;
            Ok((records.len(), start.elapsed().as_secs_f64()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    println!("simpledb-record Benchmark: {:?}", args.operation);
    println!("  Count: {}", args.count);
    println!();

    println!("Running {} warmup iteration(s)...", args.warmup);
    for i in 0..args.warmup {
        let (ops, elapsed) = run_once(&args).await?;
        println!("  Warmup {}: {} ops in {:.3}s", i + 1, ops, elapsed);
    }

    println!("Running {} benchmark iteration(s)...", args.iterations);
    let mut times = Vec::with_capacity(args.iterations);
    let mut total_ops = 0;
    for i in 0..args.iterations {
        let (ops, elapsed) = run_once(&args).await?;
        times.push(elapsed);
        total_ops = ops;
        println!(
            "  Iteration {}: {} ops in {:.3}s ({:.0} ops/s)",
            i + 1,
            ops,
            elapsed,
            ops as f64 / elapsed
        );
    }

    if times.is_empty() {
        return Ok(());
    }

    let avg_time: f64 = times.iter().sum::<f64>() / times.len() as f64;
    let min_time: f64 = times.iter().cloned().fold(f64::INFINITY, f64::min);
    let max_time: f64 = times.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    println!();
    println!("Results:");
    println!("  Avg time: {:.3}s", avg_time);
    println!("  Ops/sec: {:.0}", total_ops as f64 / avg_time);

    let results = serde_json::json!({
        "library": "simpledb-record",
        "operation": format!("{:?}", args.operation),
        "count": args.count,
        "page_size": args.page_size,
        "total_ops": total_ops,
        "iterations": args.iterations,
        "warmup": args.warmup,
        "times_secs": times,
        "avg_time_secs": avg_time,
        "min_time_secs": min_time,
        "max_time_secs": max_time,
        "ops_per_sec": total_ops as f64 / avg_time,
    });

    if let Some(output_path) = &args.output {
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(output_path, serde_json::to_string_pretty(&results)?)?;
        println!("  Saved to: {}", output_path.display());
    }

    Ok(())
}
