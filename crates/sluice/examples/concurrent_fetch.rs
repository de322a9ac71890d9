//! Example: Concurrent Fetch
//!
//! Runs two independent queries concurrently, each on its own connection,
//! and prints both result sets.

use sluice::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("sluice=info")
        .init();

    let temp_dir = tempfile::tempdir()?;
    let source = SqliteSource::open_path(temp_dir.path().join("users.db"));

    with_connection(&source, |conn| {
        conn.execute_update(&Query::new(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, age INTEGER NOT NULL)",
        ))?;
        for (id, name, age) in [(1, "Ada", 36), (2, "Grace", 45), (3, "Linus", 21), (4, "Barbara", 52)] {
            conn.execute_update(
                &Query::new("INSERT INTO users (id, name, age) VALUES (?, ?, ?)")
                    .bind(id)
                    .bind(name)
                    .bind(age),
            )?;
        }
        Ok(())
    })()?;

    let coordinator = Coordinator::with_config(CoordinatorConfig::new().with_max_concurrency(4))?;
    let results = coordinator
        .fetch_all_concurrently(
            source.clone(),
            vec![
                Query::new("SELECT * FROM users"),
                Query::new("SELECT * FROM users WHERE age > ?").bind(40),
            ],
        )
        .await?;

    println!("=== All users ===");
    for row in &results[0] {
        println!("{:?}", row.get("name"));
    }
    println!("\n=== Users older than 40 ===");
    for row in &results[1] {
        println!("{:?}", row.get("name"));
    }

    let (count, oldest) = coordinator
        .run_pair(
            {
                let source = source.clone();
                move || fetch_all(&source, &Query::new("SELECT COUNT(*) AS n FROM users"))
            },
            {
                let source = source.clone();
                move || fetch_all(&source, &Query::new("SELECT name FROM users ORDER BY age DESC LIMIT 1"))
            },
        )
        .await?;
    println!(
        "\n{} users, oldest is {}",
        count[0].get("n").map(ToString::to_string).unwrap_or_default(),
        oldest[0].get("name").and_then(Value::as_str).unwrap_or("?")
    );

    Ok(())
}
