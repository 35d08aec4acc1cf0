use crate::pipeline::RunSummary;
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Order {
    #[default]
    Descending,
    Ascending,
}

/// Packages ranked by file count, equal counts are ordered by name.
pub fn ranked(counts: &HashMap<String, u64>, order: Order) -> Vec<(&str, u64)> {
    let mut ranked = counts
        .iter()
        .map(|(name, count)| (name.as_str(), *count))
        .collect::<Vec<_>>();

    ranked.sort_by(|a, b| {
        let by_count = match order {
            Order::Descending => b.1.cmp(&a.1),
            Order::Ascending => a.1.cmp(&b.1),
        };
        match by_count {
            Ordering::Equal => a.0.cmp(b.0),
            other => other,
        }
    });

    ranked
}

pub fn format_table(counts: &HashMap<String, u64>, order: Order, limit: usize) -> String {
    let mut output = vec![format!("{:50} \t File Count", "Package")];
    for (name, count) in ranked(counts, order).into_iter().take(limit) {
        output.push(format!("{:50} \t {}", name, count));
    }
    output.join("\n")
}

/// Footer for the table, only if something had to be left out.
pub fn format_summary(summary: &RunSummary, skipped_lines: u64) -> Option<String> {
    let mut parts = Vec::new();
    if skipped_lines > 0 {
        parts.push(format!("{} malformed line(s) skipped", skipped_lines));
    }
    let failed = summary.failed_files();
    if failed > 0 {
        parts.push(format!("{} file(s) failed", failed));
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}
