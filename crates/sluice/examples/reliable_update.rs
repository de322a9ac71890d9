//! Example: Reliable Update
//!
//! Updates a user's email inside a transaction with retry, then serves a
//! repeated read from the result cache.

use sluice::prelude::*;
use std::time::Duration;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("sluice=debug")
        .init();

    let temp_dir = tempfile::tempdir()?;
    let source = SqliteSource::open_path(temp_dir.path().join("users.db"));

    with_connection(&source, |conn| {
        conn.execute_update(&Query::new(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, email TEXT NOT NULL)",
        ))?;
        conn.execute_update(
            &Query::new("INSERT INTO users (id, name, email) VALUES (?, ?, ?)")
                .bind(1)
                .bind("Ada")
                .bind("ada@old.example.com"),
        )
    })()?;

    let update = Query::new("UPDATE users SET email = ? WHERE id = ?")
        .bind("ada@example.com")
        .bind(1);
    let policy = RetryPolicy::new(3, Duration::from_millis(200))?;

    let changed = Pipeline::new(&source)
        .transactional()
        .retry(policy.clone())
        .logged(update.clone())
        .run(|conn| conn.execute_update(&update))?;
    println!("updated {} row(s)", changed);

    let cache = QueryCache::new();
    let lookup = Query::new("SELECT * FROM users WHERE id = ?").bind(1);
    let read = Pipeline::new(&source)
        .cached(&cache, lookup.clone())
        .retry(policy);

    for _ in 0..3 {
        let users = read.run(|conn| conn.fetch_all(&lookup))?;
        println!("email: {}", users[0].get("email").and_then(Value::as_str).unwrap_or("?"));
    }

    let stats = cache.stats();
    println!(
        "cache: {} hit(s), {} miss(es), hit rate {:.0}%",
        stats.hits,
        stats.misses,
        stats.hit_rate() * 100.0
    );

    Ok(())
}
