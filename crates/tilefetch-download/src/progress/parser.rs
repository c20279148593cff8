//! Stateless parser for download-tool progress output.
//!
//! Recognizes the vendor CLI's bar format,
//! ` 211.14 MiB / 18.47 GiB [>------]   1.12% 02m56s`, and falls back to any
//! bare `<number>%`. Anything else is ignored.

use std::sync::LazyLock;

use regex::Regex;
use tilefetch_core::ProgressSample;
use tracing::trace;

/// Status text attached to parsed samples.
pub const DOWNLOADING_STATUS: &str = "Downloading...";

static SIZED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\d.]+\s+([KMG]i?B)\s*/\s*([\d.]+)\s+([KMG]i?B)\s+\[.*?\]\s+([\d.]+)%")
        .expect("valid sized progress regex")
});

static BARE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\d.]+)%").expect("valid percentage regex"));

/// Bytes per unit for the size units the tools print.
#[must_use]
pub fn unit_multiplier(unit: &str) -> Option<u64> {
    match unit {
        "KiB" | "KB" => Some(1 << 10),
        "MiB" | "MB" => Some(1 << 20),
        "GiB" | "GB" => Some(1 << 30),
        _ => None,
    }
}

/// Parse a raw output chunk into zero or more samples, in order.
///
/// The chunk is split on both `\n` and `\r`; segments without a `%` are
/// skipped without inspection.
#[must_use]
pub fn parse_chunk(chunk: &str) -> Vec<ProgressSample> {
    chunk
        .split(['\n', '\r'])
        .filter(|segment| !segment.is_empty() && segment.contains('%'))
        .filter_map(|segment| {
            let sample = parse_segment(segment);
            if sample.is_none() {
                trace!(segment, "Unrecognized progress segment");
            }
            sample
        })
        .collect()
}

fn parse_segment(segment: &str) -> Option<ProgressSample> {
    if let Some(sample) = parse_sized(segment) {
        return Some(sample);
    }

    let caps = BARE.captures(segment)?;
    let percentage: f64 = caps[1].parse().ok()?;
    Some(ProgressSample::percent(percentage, DOWNLOADING_STATUS))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn parse_sized(segment: &str) -> Option<ProgressSample> {
    let caps = SIZED.captures(segment)?;
    let total: f64 = caps[2].parse().ok()?;
    let multiplier = unit_multiplier(&caps[3])?;
    let percentage: f64 = caps[4].parse().ok()?;

    let total_bytes = (total * multiplier as f64).floor() as u64;
    Some(ProgressSample::percent(percentage, DOWNLOADING_STATUS).with_total_bytes(total_bytes))
}
