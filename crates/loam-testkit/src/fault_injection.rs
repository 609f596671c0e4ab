//! Fault injection for log sinks.
//!
//! [`FaultySink`] is an in-memory [`WritableFile`] that starts failing after a
//! configured number of appends or flushes, letting tests drive the log
//! writer into its mid-record failure paths deterministically.

use loam_log::WritableFile;
use std::io;

/// In-memory sink with injectable failures.
#[derive(Debug, Default)]
pub struct FaultySink {
    data: Vec<u8>,
    fail_appends_after: Option<usize>,
    fail_flushes_after: Option<usize>,
    fail_syncs: bool,
    appends: usize,
    flushes: usize,
    syncs: usize,
}

impl FaultySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lets `n` appends succeed, then fails every later one.
    pub fn fail_appends_after(mut self, n: usize) -> Self {
        self.fail_appends_after = Some(n);
        self
    }

    /// Lets `n` flushes succeed, then fails every later one.
    pub fn fail_flushes_after(mut self, n: usize) -> Self {
        self.fail_flushes_after = Some(n);
        self
    }

    pub fn fail_syncs(mut self) -> Self {
        self.fail_syncs = true;
        self
    }

    /// Stops injecting failures; later calls behave like a healthy sink.
    pub fn heal(&mut self) {
        self.fail_appends_after = None;
        self.fail_flushes_after = None;
        self.fail_syncs = false;
    }

    /// Bytes accepted so far.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    pub fn appends(&self) -> usize {
        self.appends
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }

    pub fn syncs(&self) -> usize {
        self.syncs
    }
}

fn injected(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("injected {} failure", what))
}

impl WritableFile for FaultySink {
    fn append(&mut self, data: &[u8]) -> io::Result<()> {
        if matches!(self.fail_appends_after, Some(n) if self.appends >= n) {
            return Err(injected("append"));
        }
        self.appends += 1;
        self.data.extend_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        if matches!(self.fail_flushes_after, Some(n) if self.flushes >= n) {
            return Err(injected("flush"));
        }
        self.flushes += 1;
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        if self.fail_syncs {
            return Err(injected("sync"));
        }
        self.syncs += 1;
        Ok(())
    }
}
