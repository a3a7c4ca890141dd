//! Human-readable console output

use crate::stats::CountTable;
use std::time::Duration;

/// One-line execution summary
///
/// ```
/// use std::time::Duration;
/// use corpuscount::output::text::summary_line;
///
/// assert_eq!(
///     summary_line("wordcount", 2, 3, Duration::from_millis(1250)),
///     "[wordcount] units=2, procs=3, t_total=1.250s"
/// );
/// ```
pub fn summary_line(job: &str, units: u64, procs: usize, elapsed: Duration) -> String {
    format!(
        "[{}] units={}, procs={}, t_total={:.3}s",
        job,
        units,
        procs,
        elapsed.as_secs_f64()
    )
}

pub fn print_summary(job: &str, units: u64, procs: usize, elapsed: Duration) {
    println!("{}", summary_line(job, units, procs, elapsed));
}

/// Lines of the top-N preview
pub fn top_lines(counts: &CountTable, n: usize) -> Vec<String> {
    let sorted = counts.sorted_by_count();
    let width = sorted
        .iter()
        .take(n)
        .map(|(key, _)| key.chars().count())
        .max()
        .unwrap_or(0);

    sorted
        .into_iter()
        .take(n)
        .enumerate()
        .map(|(i, (key, count))| format!("{:>4}. {:<width$}  {}", i + 1, key, count, width = width))
        .collect()
}

/// Print the `n` most frequent keys
pub fn print_top(counts: &CountTable, n: usize) {
    if n == 0 || counts.is_empty() {
        return;
    }
    println!();
    println!("Top {} of {} keys:", n.min(counts.len()), counts.len());
    for line in top_lines(counts, n) {
        println!("{}", line);
    }
}
