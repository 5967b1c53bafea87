//! File-based daily log consumer
//!
//! Writes each record as one line to an append-mode file named
//! `<prefix>.log.<YYYYMMDD>` (local date). When the local date changes
//! between sends, the current file is closed and a file for the new
//! date is opened before writing, so a long-lived process produces one
//! file per day without external rotation.

use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use beacon_core::Result;
use chrono::{Datelike, Local};
use tracing::debug;

use crate::Consumer;

/// Append-mode daily log file consumer
///
/// The prefix is used verbatim: `LoggingConsumer::new("/data/logs/http")`
/// writes `/data/logs/http.log.20260829` and its successors. Nothing is
/// opened until the first send.
#[derive(Debug)]
pub struct LoggingConsumer {
    prefix: PathBuf,
    /// Date embedded in the open file's name, as year*10000+month*100+day;
    /// 0 while no file is open.
    date: u32,
    file: Option<BufWriter<File>>,
}

/// Local date as year*10000 + month*100 + day
fn current_date() -> u32 {
    let now = Local::now();
    now.year() as u32 * 10000 + now.month() * 100 + now.day()
}

impl LoggingConsumer {
    /// Create a consumer writing under the given file-name prefix
    pub fn new(prefix: impl Into<PathBuf>) -> Self {
        LoggingConsumer {
            prefix: prefix.into(),
            date: 0,
            file: None,
        }
    }

    /// Path of the log file for a given date
    fn log_path(&self, date: u32) -> PathBuf {
        let mut name = OsString::from(self.prefix.as_os_str());
        name.push(format!(".log.{}", date));
        PathBuf::from(name)
    }

    /// Close the current file (if any) and open the file for `date`
    fn roll_to(&mut self, date: u32) -> Result<()> {
        self.close_file()?;
        let path = self.log_path(date);
        debug!(path = %path.display(), "opening daily log file");
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        self.file = Some(BufWriter::new(file));
        self.date = date;
        Ok(())
    }

    fn close_file(&mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }
        self.date = 0;
        Ok(())
    }

    /// Send with an explicit date; factored out so rollover is testable
    fn send_dated(&mut self, record: &[u8], date: u32) -> Result<()> {
        if self.file.is_none() || date != self.date {
            self.roll_to(date)?;
        }
        if let Some(file) = self.file.as_mut() {
            file.write_all(record)?;
            file.write_all(b"\n")?;
        }
        Ok(())
    }
}

impl Consumer for LoggingConsumer {
    fn send(&mut self, record: &[u8]) -> Result<()> {
        self.send_dated(record, current_date())
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
            file.get_ref().sync_data()?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.close_file()
    }
}

impl Drop for LoggingConsumer {
    fn drop(&mut self) {
        let _ = self.close_file();
    }
}
