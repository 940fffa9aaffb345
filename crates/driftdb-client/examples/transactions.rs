//! Transaction example.
//!
//! Shows explicit commit/rollback and the scoped `run_transaction` form.
//!
//! # Running
//!
//! ```bash
//! export DRIFTDB_ADDR=localhost:5433
//! cargo run --example transactions
//! ```

// Allow common patterns in example code
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use driftdb_client::{Client, Error, Value};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let addr = std::env::var("DRIFTDB_ADDR").unwrap_or_else(|_| "localhost:5433".into());
    let client = Client::connect(&addr, 1, 4, Duration::from_secs(10)).await?;

    client
        .execute("CREATE TABLE accounts (id INT PRIMARY KEY, balance INT)", &[])
        .await?;
    client
        .execute("INSERT INTO accounts (id, balance) VALUES (1, 100), (2, 0)", &[])
        .await?;

    // Explicit form
    let mut tx = client.begin().await?;
    tx.execute(
        "UPDATE accounts SET balance = balance - ? WHERE id = ?",
        &[Value::Int(25), Value::Int(1)],
    )
    .await?;
    tx.execute(
        "UPDATE accounts SET balance = balance + ? WHERE id = ?",
        &[Value::Int(25), Value::Int(2)],
    )
    .await?;
    tx.commit().await?;
    println!("Transfer committed");

    // Scoped form: an error inside the closure rolls everything back.
    let outcome = client
        .run_transaction(|tx| {
            Box::pin(async move {
                tx.execute("UPDATE accounts SET balance = 0 WHERE id = 1", &[])
                    .await?;
                tx.execute("UPDATE no_such_table SET x = 1", &[]).await?;
                Ok::<_, Error>(())
            })
        })
        .await;
    match outcome {
        Ok(()) => println!("Unexpectedly committed"),
        Err(e) => println!("Rolled back: {e} ({:?})", e.kind()),
    }

    let balances = client
        .query("SELECT id, balance FROM accounts ORDER BY id", &[])
        .await?;
    for row in &balances {
        println!("account {} balance {}", row["id"], row["balance"]);
    }

    client.close().await;
    Ok(())
}
