// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Parsers for spooler tool output.
//
// All functions here are pure: raw text in, structured value out.  None of
// them fail; output that cannot be understood maps to `Unknown`, `None`, or
// an empty collection so a formatting surprise never aborts a status query.

use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::Regex;

use webprinter_core::types::{PrinterState, TonerLevel};

/// `lp` prints "request id is <queue>-<n> (1 file(s))" on success.
static REQUEST_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"request id is (\S+)").expect("request id pattern is valid"));

/// ipptool attribute dump line: `marker-levels (1setOf integer) = 57,80`.
static IPP_ATTRIBUTE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9-]+)\s+\([^)]+\)\s+=\s*(.+)$").expect("ipp attribute pattern is valid")
});

/// Detail-line keys in `lpstat -l` output that carry printer alerts.
const ALERT_KEYS: [&str; 3] = ["alerts", "printer-state-reasons", "reasons"];

/// Placeholder alert values meaning "nothing to report".
const EMPTY_ALERTS: [&str; 2] = ["none", "no alerts"];

// ---------------------------------------------------------------------------
// CUPS (lp / lpstat)
// ---------------------------------------------------------------------------

/// Printer names from `lpstat -a`: first token of each line, sorted and
/// deduplicated.
pub fn parse_printer_names(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Default destination from `lpstat -d`.
pub fn parse_default_printer(output: &str) -> Option<String> {
    const MARKER: &str = "system default destination:";
    let (_, rest) = output.trim().split_once(MARKER)?;
    let name = rest.trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Job identifier from `lp` stdout.  Falls back to the first token when the
/// usual sentence is missing (some CUPS builds print only the id).
pub fn extract_request_id(output: &str) -> Option<String> {
    if let Some(captures) = REQUEST_ID_PATTERN.captures(output) {
        return Some(captures[1].to_string());
    }
    output.split_whitespace().next().map(str::to_string)
}

/// Whether a queue listing (`lpstat -o`) still holds `job_id`.
pub fn queue_contains(listing: &str, job_id: &str) -> bool {
    listing
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .any(|token| token == job_id)
}

/// Number of jobs in a queue listing.
pub fn count_queue_entries(listing: &str) -> u32 {
    let entries = listing.lines().filter(|line| !line.trim().is_empty()).count();
    u32::try_from(entries).unwrap_or(u32::MAX)
}

/// Map the free-text `lpstat -p` summary line to a state and enabled flag.
pub fn map_cups_state(summary: &str) -> (PrinterState, bool) {
    let text = summary.to_lowercase();
    let enabled = !text.contains("disabled");
    let state = if text.contains("printing") || text.contains("processing") {
        PrinterState::Printing
    } else if text.contains("idle") || text.contains("ready") {
        PrinterState::Idle
    } else if text.contains("disabled") || text.contains("stopped") {
        PrinterState::Stopped
    } else {
        PrinterState::Unknown
    };
    (state, enabled)
}

/// Whether `lpstat -a <printer>` reports the queue as accepting jobs.
pub fn parse_accepting(output: &str) -> bool {
    let text = output.to_lowercase();
    text.contains("accepting requests") && !text.contains("not accepting")
}

/// Device URI from `lpstat -v <printer>` ("device for NAME: URI").
pub fn parse_device_uri(output: &str, printer: &str) -> Option<String> {
    let own_marker = format!("device for {}:", printer.to_lowercase());
    let mut fallback = None;

    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let lower = line.to_lowercase();
        if !lower.starts_with("device for ") {
            continue;
        }
        let Some((_, uri)) = line.split_once(':') else {
            continue;
        };
        let uri = uri.trim().to_string();
        if lower.starts_with(&own_marker) {
            return Some(uri);
        }
        fallback.get_or_insert(uri);
    }
    fallback
}

/// Alert reasons from the `key: value` detail lines of `lpstat -p -l`.
pub fn extract_reasons<'a>(lines: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut reasons = Vec::new();
    for line in lines {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        if !ALERT_KEYS.contains(&key.as_str()) {
            continue;
        }
        reasons.extend(
            value
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .filter(|r| !EMPTY_ALERTS.contains(&r.to_lowercase().as_str()))
                .map(str::to_string),
        );
    }
    reasons
}

// ---------------------------------------------------------------------------
// Consumables (ipptool)
// ---------------------------------------------------------------------------

/// Parse `name (type) = value` lines into a map keyed by lowercase name.
pub fn parse_ipp_attributes(output: &str) -> HashMap<String, String> {
    output
        .lines()
        .filter_map(|line| IPP_ATTRIBUTE_PATTERN.captures(line.trim()))
        .map(|c| (c[1].to_lowercase(), c[2].trim().to_string()))
        .collect()
}

/// Split a comma-separated IPP value list, dropping quotes and empties.
pub fn split_ipp_values(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|chunk| chunk.trim())
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| chunk.trim_matches('"').to_string())
        .collect()
}

/// Normalise a raw `marker-levels` value to a 0–100 percentage.
///
/// Devices disagree on the unit: most report a percentage, some report
/// parts per 10000.  Negative values are the IPP "unknown" sentinels.
pub fn normalize_toner_level(level: Option<i64>) -> Option<u8> {
    match level? {
        l if l < 0 => None,
        l if l <= 100 => Some(l as u8),
        l if l <= 10_000 => Some((l / 100) as u8),
        _ => None,
    }
}

/// Build consumable levels from the parallel `marker-*` attribute arrays.
pub fn extract_toner_levels(attributes: &HashMap<String, String>) -> Vec<TonerLevel> {
    let values = |key: &str| {
        attributes
            .get(key)
            .map(|raw| split_ipp_values(raw))
            .unwrap_or_default()
    };
    let names = values("marker-names");
    let levels = values("marker-levels");
    let colors = values("marker-colors");
    let kinds = values("marker-types");

    let count = names.len().max(levels.len()).max(colors.len()).max(kinds.len());

    (0..count)
        .map(|index| {
            let name = [names.get(index), kinds.get(index)]
                .into_iter()
                .flatten()
                .find(|n| !n.is_empty())
                .cloned()
                .unwrap_or_else(|| format!("Toner {}", index + 1));
            let raw_level = levels.get(index).and_then(|l| l.parse::<i64>().ok());
            TonerLevel {
                name,
                percent: normalize_toner_level(raw_level),
                color: colors.get(index).cloned(),
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Windows spooler
// ---------------------------------------------------------------------------

/// Map a Windows `PrinterStatus` value (numeric code or text) to a state.
pub fn map_windows_state(raw: &str, offline: bool) -> PrinterState {
    if offline {
        return PrinterState::Stopped;
    }

    let raw = raw.trim();
    if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit()) {
        return match raw.parse::<u32>() {
            Ok(3) => PrinterState::Idle,
            Ok(4 | 5) => PrinterState::Printing,
            Ok(6 | 7) => PrinterState::Stopped,
            _ => PrinterState::Unknown,
        };
    }

    let text = raw.to_lowercase();
    if text.contains("print") || text.contains("busy") {
        PrinterState::Printing
    } else if text.contains("idle") || text.contains("normal") {
        PrinterState::Idle
    } else if text.contains("offline") || text.contains("stop") || text.contains("error") {
        PrinterState::Stopped
    } else {
        PrinterState::Unknown
    }
}
