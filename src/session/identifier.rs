//! Session identifier grammar.
//!
//! A session directory is named `YYYY_MM_DD_HH_MM[_SS]_<executor>__<name>`:
//! capture timestamp, the executor/host label (which may itself contain
//! single underscores) and the profiled program name. Directories that do not
//! match are not sessions and are skipped during enumeration.

use crate::utils::error::SessionError;
use chrono::{NaiveDate, NaiveDateTime};
use std::cmp::Ordering;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Parsed session identifier.
///
/// Ordering is reverse-chronological, then by executor, then by profiled
/// program name, matching how session lists are displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId {
    pub timestamp: NaiveDateTime,
    /// Whether the directory name carried a seconds field
    pub has_seconds: bool,
    pub executor: String,
    pub name: String,
    /// The original directory name
    pub raw: String,
}

impl FromStr for SessionId {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SessionError::InvalidIdentifier(s.to_string());

        let (prefix, name) = s.split_once("__").ok_or_else(invalid)?;
        if name.is_empty() {
            return Err(invalid());
        }

        let tokens: Vec<&str> = prefix.split('_').collect();
        if tokens.len() < 6 {
            return Err(invalid());
        }

        let widths = [4, 2, 2, 2, 2];
        let mut fields = [0u32; 5];
        for (i, (&token, &width)) in tokens.iter().zip(widths.iter()).enumerate() {
            if token.len() != width || !token.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            fields[i] = token.parse().map_err(|_| invalid())?;
        }

        // An optional 2-digit seconds field sits between the minute and the
        // executor. A lone trailing numeric token is a seconds field with the
        // executor missing, not a numeric executor.
        let rest = &tokens[5..];
        let seconds_token = rest[0].len() == 2 && rest[0].bytes().all(|b| b.is_ascii_digit());
        let (second, executor_tokens) = if seconds_token {
            if rest.len() == 1 {
                return Err(invalid());
            }
            (Some(rest[0].parse::<u32>().map_err(|_| invalid())?), &rest[1..])
        } else {
            (None, rest)
        };

        let executor = executor_tokens.join("_");
        if executor.is_empty() {
            return Err(invalid());
        }

        let [year, month, day, hour, minute] = fields;
        let timestamp = NaiveDate::from_ymd_opt(year as i32, month, day)
            .and_then(|d| d.and_hms_opt(hour, minute, second.unwrap_or(0)))
            .ok_or_else(invalid)?;

        Ok(SessionId {
            timestamp,
            has_seconds: second.is_some(),
            executor,
            name: name.to_string(),
            raw: s.to_string(),
        })
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let time = if self.has_seconds {
            self.timestamp.format("%Y-%m-%d %H:%M:%S")
        } else {
            self.timestamp.format("%Y-%m-%d %H:%M")
        };
        write!(f, "[{}] {} ({})", self.executor, self.name, time)
    }
}

impl Ord for SessionId {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .timestamp
            .cmp(&self.timestamp)
            .then_with(|| self.executor.cmp(&other.executor))
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| self.raw.cmp(&other.raw))
    }
}

impl PartialOrd for SessionId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl SessionId {
    /// List every session under a storage directory, newest first.
    /// Entries whose names do not match the grammar are silently skipped.
    pub fn enumerate(storage: &Path) -> Result<Vec<SessionId>, SessionError> {
        let mut ids = Vec::new();

        for entry in std::fs::read_dir(storage)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Some(dir_name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if let Ok(id) = dir_name.parse::<SessionId>() {
                ids.push(id);
            }
        }

        ids.sort();
        Ok(ids)
    }
}
