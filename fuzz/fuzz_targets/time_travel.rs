#![no_main]

use arbitrary::Arbitrary;
use driftdb_protocol::TimeTravel;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum FuzzPoint {
    Sequence(u64),
    Timestamp(String),
    Between(u64, u64),
    All,
}

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    sql: String,
    point: FuzzPoint,
}

fuzz_target!(|input: FuzzInput| {
    let point = match input.point {
        FuzzPoint::Sequence(n) => TimeTravel::Sequence(n),
        FuzzPoint::Timestamp(ts) => TimeTravel::Timestamp(ts),
        FuzzPoint::Between(start, end) => TimeTravel::Between { start, end },
        FuzzPoint::All => TimeTravel::All,
    };
    let rewritten = point.apply(&input.sql);
    assert!(rewritten.starts_with(&input.sql));
    assert!(rewritten.ends_with(&point.to_sql()));
});
