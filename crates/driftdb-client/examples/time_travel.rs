//! Time-travel query example.
//!
//! Reads a table as it was at an earlier sequence number and timestamp.
//!
//! # Running
//!
//! ```bash
//! export DRIFTDB_ADDR=localhost:5433
//! cargo run --example time_travel
//! ```

// Allow common patterns in example code
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use driftdb_client::{Client, Error, QueryBuilder, TimeTravel, Value};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let addr = std::env::var("DRIFTDB_ADDR").unwrap_or_else(|_| "localhost:5433".into());
    let client = Client::connect(&addr, 1, 4, Duration::from_secs(10)).await?;

    client
        .execute("CREATE TABLE prices (sku TEXT PRIMARY KEY, cents INT)", &[])
        .await?;
    client
        .execute(
            "INSERT INTO prices (sku, cents) VALUES (?, ?)",
            &[Value::from("apple"), Value::Int(50)],
        )
        .await?;

    let before = client.current_sequence().await?.unwrap_or(0);
    let before_time = chrono::Utc::now();

    client
        .execute(
            "UPDATE prices SET cents = ? WHERE sku = ?",
            &[Value::Int(75), Value::from("apple")],
        )
        .await?;

    let now = client.query("SELECT * FROM prices", &[]).await?;
    let then = client
        .query_at_sequence("SELECT * FROM prices", before, &[])
        .await?;
    println!(
        "apple costs {} now, cost {} at sequence {before}",
        now[0]["cents"], then[0]["cents"]
    );

    let at_time = client
        .query_as_of("SELECT * FROM prices", &TimeTravel::at(&before_time), &[])
        .await?;
    println!("{} rows as of {before_time}", at_time.row_count());

    let history = QueryBuilder::new("prices")
        .as_of(TimeTravel::All)
        .where_("sku", "=", "apple")
        .fetch(&client)
        .await?;
    println!("{} historical versions of apple", history.row_count());

    client.close().await;
    Ok(())
}
