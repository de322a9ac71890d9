//! Example: Batch Processing
//!
//! Streams a users table in fixed-size batches, keeps only users older than
//! 25, pages through the same table, and computes the average age without
//! materializing the result.

use sluice::prelude::*;

fn seed(source: &SqliteSource, users: usize) -> Result<()> {
    let mut conn = source.open()?;
    conn.execute_update(&Query::new(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            age INTEGER NOT NULL
        )",
    ))?;
    run_in_transaction(&mut conn, |conn| {
        for id in 1..=users as i64 {
            conn.execute_update(
                &Query::new("INSERT INTO users (id, name, email, age) VALUES (?, ?, ?, ?)")
                    .bind(id)
                    .bind(format!("user{}", id))
                    .bind(format!("user{}@example.com", id))
                    .bind(18 + (id * 7) % 50),
            )?;
        }
        Ok(())
    })?;
    conn.close();
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("sluice=info")
        .init();

    let temp_dir = tempfile::tempdir()?;
    let source = SqliteSource::open_path(temp_dir.path().join("users.db"));
    seed(&source, 1_000)?;

    let engine = StreamEngine::with_config(
        source,
        StreamConfig::new().with_batch_size(50).with_page_size(200),
    )?;
    let all_users = Query::new("SELECT * FROM users");

    println!("=== Batches of users older than 25 ===");
    let mut kept = 0;
    for (index, batch) in engine
        .batches(&all_users)?
        .filter_rows(|row| row.get("age").and_then(Value::as_i64).unwrap_or(0) > 25)
        .enumerate()
    {
        let batch = batch?;
        kept += batch.len();
        if index < 3 {
            println!("batch {}: {} users", index, batch.len());
        }
    }
    println!("{} users older than 25\n", kept);

    println!("=== Pages ===");
    for page in engine.pages("users")? {
        let page = page?;
        println!("offset {:>4}: {} rows", page.offset(), page.len());
    }

    println!("\n=== Streaming aggregate ===");
    let average = engine
        .aggregate_stream("age", &Query::new("SELECT age FROM users"))?
        .average()?;
    println!("average age: {:.2}", average);

    Ok(())
}
