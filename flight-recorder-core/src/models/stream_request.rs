use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};

/// Block size used when the caller does not choose one.
pub const DEFAULT_BLOCK_SIZE: i64 = 50_000;

/// Parameters for opening a data stream over a stopped recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Bytes per remote read.
    pub block_size: i64,
}

impl StreamRequest {
    pub fn new(start_time: Option<DateTime<Utc>>, end_time: Option<DateTime<Utc>>, block_size: i64) -> Self {
        Self {
            start_time,
            end_time,
            block_size,
        }
    }

    /// Stream options for the remote side.
    ///
    /// Only supplied, positive values are included.
    pub fn to_options(&self) -> BTreeMap<String, String> {
        let mut options = BTreeMap::new();
        if let Some(start) = self.start_time.filter(is_after_epoch) {
            options.insert("startTime".to_string(), format_instant(&start));
        }
        if let Some(end) = self.end_time.filter(is_after_epoch) {
            options.insert("endTime".to_string(), format_instant(&end));
        }
        if self.block_size > 0 {
            options.insert("blockSize".to_string(), self.block_size.to_string());
        }
        options
    }
}

impl Default for StreamRequest {
    fn default() -> Self {
        Self::new(None, None, DEFAULT_BLOCK_SIZE)
    }
}

fn is_after_epoch(t: &DateTime<Utc>) -> bool {
    t.timestamp() > 0 || (t.timestamp() == 0 && t.timestamp_subsec_nanos() > 0)
}

fn format_instant(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
