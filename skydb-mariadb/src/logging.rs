//! Query-timing log helper: summarize and log at `debug`, escalate to
//! `warn` once a caller-configurable threshold is exceeded.

use std::time::Duration;

pub(crate) fn log_execution(sql: &str, elapsed: Duration, slow_threshold: Duration) {
    let summary = summarize(sql);

    if elapsed >= slow_threshold {
        log::warn!("slow query ({:?}): {}", elapsed, summary);
    } else {
        log::debug!("{:?}: {}", elapsed, summary);
    }
}

fn summarize(sql: &str) -> String {
    let mut words = sql.split_whitespace();
    let mut summary = String::new();

    for _ in 0..8 {
        match words.next() {
            Some(word) => {
                if !summary.is_empty() {
                    summary.push(' ');
                }
                summary.push_str(word);
            }
            None => break,
        }
    }

    if words.next().is_some() {
        summary.push_str(" …");
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_truncates_long_statements() {
        let sql = "SELECT a, b, c, d, e, f, g, h, i, j FROM t WHERE a = 1";
        let summary = summarize(sql);
        assert!(summary.ends_with('…'));
    }
}
