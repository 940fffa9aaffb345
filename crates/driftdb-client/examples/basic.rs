//! Basic connection and query example.
//!
//! Connects to a DriftDB server, runs a few parameterized queries and prints
//! the results.
//!
//! # Running
//!
//! ```bash
//! export DRIFTDB_ADDR=localhost:5433
//! cargo run --example basic
//! ```

// Allow common patterns in example code
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use driftdb_client::{Client, Direction, Error, QueryBuilder, Value};

#[derive(Debug, serde::Deserialize)]
struct User {
    id: i64,
    name: String,
    email: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize tracing for logging
    tracing_subscriber::fmt::init();

    let addr = std::env::var("DRIFTDB_ADDR").unwrap_or_else(|_| "localhost:5433".into());
    println!("Connecting to DriftDB at {addr}...");

    let client = Client::connect(&addr, 2, 10, Duration::from_secs(10)).await?;
    println!("Connected successfully! Pool: {:?}", client.pool_status());

    client
        .execute(
            "CREATE TABLE users (id INT PRIMARY KEY, name TEXT, email TEXT)",
            &[],
        )
        .await?;

    for (id, name, email) in [
        (1, "Alice", Some("alice@example.com")),
        (2, "Bob", None),
    ] {
        client
            .execute(
                "INSERT INTO users (id, name, email) VALUES (?, ?, ?)",
                &[Value::from(id), Value::from(name), Value::from(email)],
            )
            .await?;
    }

    let result = client.query("SELECT * FROM users", &[]).await?;
    println!("{} rows in {:?} ms", result.row_count(), result.execution_time_ms());
    for row in &result {
        for (column, value) in row.iter() {
            print!("{column}={value} ");
        }
        println!();
    }

    let users: Vec<User> = QueryBuilder::new("users")
        .where_("id", ">=", 1)
        .order_by("name", Direction::Asc)
        .fetch_as(&client)
        .await?;
    for user in users {
        println!("User {}: {} <{}>", user.id, user.name, user.email.unwrap_or_default());
    }

    client.close().await;
    Ok(())
}
