//! Non-revocation intervals
//!
//! Two descriptor forms are accepted:
//! - `<from>:<to>` where each side is `now` or a signed offset in seconds
//!   from now, e.g. `-86400:+86400` or `-600:now`
//! - `[at] last N seconds|minutes|hours|days`, meaning `{now - N*unit, now}`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{Error, Result};

/// Timestamps (unix seconds) a credential must be unrevoked between
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonRevokedInterval {
    pub from: i64,
    pub to: i64,
}

impl NonRevokedInterval {
    /// Build an interval from a descriptor relative to the current time
    pub fn from_descriptor(descriptor: &str) -> Result<Self> {
        Self::from_descriptor_at(descriptor, Utc::now())
    }

    /// Build an interval from a descriptor relative to `now`
    pub fn from_descriptor_at(descriptor: &str, now: DateTime<Utc>) -> Result<Self> {
        let now = now.timestamp();
        let trimmed = descriptor.trim();
        let invalid = || Error::InvalidInterval(descriptor.to_string());

        if let Some((from, to)) = trimmed.split_once(':') {
            let from = offset_from(from, now).ok_or_else(invalid)?;
            let to = offset_from(to, now).ok_or_else(invalid)?;
            if from > to {
                return Err(invalid());
            }
            return Ok(Self { from, to });
        }

        let words: Vec<String> = trimmed
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();
        let words: Vec<&str> = words
            .iter()
            .map(String::as_str)
            .skip_while(|w| *w == "at")
            .collect();

        match words.as_slice() {
            ["last", count, unit] => {
                let count: i64 = count.parse().map_err(|_| invalid())?;
                let unit = unit_seconds(unit).ok_or_else(invalid)?;
                let span = count.checked_mul(unit).ok_or_else(invalid)?;
                if span < 0 {
                    return Err(invalid());
                }
                Ok(Self {
                    from: now - span,
                    to: now,
                })
            }
            _ => Err(invalid()),
        }
    }
}

fn offset_from(side: &str, now: i64) -> Option<i64> {
    let side = side.trim();
    if side.eq_ignore_ascii_case("now") {
        return Some(now);
    }
    let offset: i64 = side.trim_start_matches('+').parse().ok()?;
    now.checked_add(offset)
}

fn unit_seconds(unit: &str) -> Option<i64> {
    match unit.trim_end_matches('s') {
        "second" | "sec" => Some(1),
        "minute" | "min" => Some(60),
        "hour" => Some(3_600),
        "day" => Some(86_400),
        _ => None,
    }
}
