use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use serde::Serialize;
use time::OffsetDateTime;

pub const DEFAULT_CAPACITY: usize = 500;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    pub task_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Process-wide bounded log sink, shared by the executor and every
/// automation context.
///
/// A ring buffer rather than a queue with backpressure: dropping the
/// oldest records is tolerable here, blocking producers is not. Safe for
/// concurrent writers.
pub struct LogBus {
    records: Mutex<VecDeque<LogRecord>>,
    capacity: usize,
}

impl LogBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn append(&self, record: LogRecord) {
        let mut records = self.records.lock().unwrap();
        while records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Records a message and mirrors it onto the `log` facade.
    pub fn log(&self, level: LogLevel, message: impl Into<String>, task_id: Option<&str>) {
        let message = message.into();
        match (level, task_id) {
            (LogLevel::Info, Some(id)) => log::info!("[{id}] {message}"),
            (LogLevel::Info, None) => log::info!("{message}"),
            (LogLevel::Warn, Some(id)) => log::warn!("[{id}] {message}"),
            (LogLevel::Warn, None) => log::warn!("{message}"),
            (LogLevel::Error, Some(id)) => log::error!("[{id}] {message}"),
            (LogLevel::Error, None) => log::error!("{message}"),
        }
        self.append(LogRecord {
            level,
            message,
            task_id: task_id.map(str::to_string),
            timestamp: OffsetDateTime::now_utc(),
        });
    }

    /// The most recent records, oldest first. `limit` of zero means all
    /// retained records.
    pub fn recent(&self, limit: usize) -> Vec<LogRecord> {
        let records = self.records.lock().unwrap();
        let skip = if limit == 0 {
            0
        } else {
            records.len().saturating_sub(limit)
        };
        records.iter().skip(skip).cloned().collect()
    }

    pub fn clear(&self) {
        self.records.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().unwrap().is_empty()
    }
}

impl Default for LogBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_ring_evicts_oldest_first() {
        let bus = LogBus::new(3);
        for i in 0..5 {
            bus.log(LogLevel::Info, format!("message {i}"), None);
        }
        let messages: Vec<String> = bus.recent(0).into_iter().map(|r| r.message).collect();
        assert_eq!(messages, ["message 2", "message 3", "message 4"]);
    }

    #[test]
    fn test_recent_limits_from_the_tail() {
        let bus = LogBus::new(10);
        for i in 0..6 {
            bus.log(LogLevel::Info, format!("message {i}"), None);
        }
        let messages: Vec<String> = bus.recent(2).into_iter().map(|r| r.message).collect();
        assert_eq!(messages, ["message 4", "message 5"]);
    }

    #[test]
    fn test_task_tag_and_level() {
        let bus = LogBus::default();
        bus.log(LogLevel::Warn, "no match", Some("demo"));
        let records = bus.recent(1);
        assert_eq!(records[0].level, LogLevel::Warn);
        assert_eq!(records[0].task_id.as_deref(), Some("demo"));
    }

    #[test]
    fn test_concurrent_writers() {
        let bus = Arc::new(LogBus::new(64));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let bus = bus.clone();
                std::thread::spawn(move || {
                    for i in 0..32 {
                        bus.log(LogLevel::Info, format!("t{t} m{i}"), None);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(bus.len(), 64);
    }
}
