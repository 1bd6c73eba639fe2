//! Parallel line scans over derived read contexts.
//!
//! A scan splits a line range into contiguous chunks and hands each chunk to a worker on
//! tokio's blocking pool. Every worker owns a context derived from the prototype, so the
//! workers share nothing mutable. What counts as a match is up to the caller's visitor.

use crate::error::{BiglineError, Result};
use crate::reader::ReadContext;
use futures::future::join_all;
use std::ops::Range;
use std::sync::Arc;

/// A line whose read failed during a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFailure {
    pub line: usize,
    pub diagnostic: String,
}

/// Combined outcome of all scan workers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Lines the visitor accepted, ascending
    pub matches: Vec<usize>,
    pub failures: Vec<ScanFailure>,
    /// Lines the visitor only saw a prefix of, ascending
    pub truncated: Vec<usize>,
    pub lines_scanned: usize,
}

impl ScanReport {
    fn merge(&mut self, other: ScanReport) {
        self.matches.extend(other.matches);
        self.failures.extend(other.failures);
        self.truncated.extend(other.truncated);
        self.lines_scanned += other.lines_scanned;
    }
}

/// Visit every line in `lines` with `workers` parallel contexts.
///
/// Lines are read as prefixes of about `max_chars` characters. `None` reads whole lines,
/// but never more than the prototype's buffer capacity. Every line the visitor saw cut
/// short, by either limit, is listed in [`ScanReport::truncated`]. The range is clipped to
/// the index.
///
/// All worker contexts are derived before any worker starts, so a failed derivation
/// leaves nothing running.
///
/// # Errors
/// * `ConfigError` if the prototype's buffer size was never set
/// * `WorkerError` if a worker panicked
pub async fn scan_lines<F>(
    prototype: &ReadContext,
    lines: Range<usize>,
    workers: usize,
    max_chars: Option<usize>,
    visitor: F,
) -> Result<ScanReport>
where
    F: Fn(usize, &str) -> bool + Send + Sync + 'static,
{
    let lines = lines.start..lines.end.min(prototype.index().line_count());
    if lines.is_empty() {
        return Ok(ScanReport::default());
    }

    let workers = workers.clamp(1, lines.len());
    let chunk = lines.len().div_ceil(workers);
    let visitor = Arc::new(visitor);
    log::debug!(
        "scanning lines {}..{} with {} workers",
        lines.start,
        lines.end,
        workers
    );

    let assignments = lines
        .clone()
        .step_by(chunk)
        .map(|start| {
            let range = start..(start + chunk).min(lines.end);
            prototype
                .new_instance_for_thread()
                .map(|context| (context, range))
        })
        .collect::<Result<Vec<_>>>()?;

    let handles: Vec<_> = assignments
        .into_iter()
        .map(|(mut context, range)| {
            let visitor = Arc::clone(&visitor);
            tokio::task::spawn_blocking(move || {
                scan_chunk(&mut context, range, max_chars, visitor.as_ref())
            })
        })
        .collect();

    let mut report = ScanReport::default();
    for joined in join_all(handles).await {
        let part = joined.map_err(|e| {
            log::error!("scan worker failed: {}", e);
            BiglineError::worker(e.to_string())
        })?;
        report.merge(part);
    }
    report.matches.sort_unstable();
    report.truncated.sort_unstable();
    report.failures.sort_by_key(|failure| failure.line);
    Ok(report)
}

fn scan_chunk<F>(
    context: &mut ReadContext,
    range: Range<usize>,
    max_chars: Option<usize>,
    visitor: &F,
) -> ScanReport
where
    F: Fn(usize, &str) -> bool,
{
    let mut report = ScanReport::default();
    for line in range {
        match context.decode_prefix(line, line + 1, max_chars) {
            Ok(truncated) => {
                if truncated {
                    report.truncated.push(line);
                }
                if visitor(line, context.char_buffer()) {
                    report.matches.push(line);
                }
            }
            Err(failure) => report.failures.push(ScanFailure {
                line,
                diagnostic: failure.diagnostic().to_string(),
            }),
        }
        report.lines_scanned += 1;
    }
    report
}
