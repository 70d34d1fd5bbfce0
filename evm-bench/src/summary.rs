//! Final summary table.

use bench_core::BenchmarkResult;
use prettytable::{Table, row};

/// Render the run summary to stdout.
pub fn print_summary(result: &BenchmarkResult) {
    let mut table = Table::new();
    table.add_row(row![
        "TestCase",
        "Total",
        "Succeeded",
        "Failed",
        "MinLatency",
        "MaxLatency",
        "AvgLatency",
        "SubmitPerSec",
        "ExecPerSec",
        "TimeTaken"
    ]);
    table.add_row(row![
        result.testcase,
        result.total,
        result.succeeded,
        result.failed,
        format!("{:?}", result.min_latency),
        format!("{:?}", result.max_latency),
        format!("{:?}", result.avg_latency),
        format!("{:.2}", result.submit_per_sec),
        format!("{:.2}", result.exec_per_sec),
        format!("{:?}", result.time_taken)
    ]);
    table.printstd();
}
