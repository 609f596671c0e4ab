//! loam-observe: vendor-neutral observability ABI.
//!
//! Core crates depend only on these traits and event types. Backends live elsewhere.

pub trait Counter: Send + Sync {
    fn inc(&self, v: u64);
}
pub trait Gauge: Send + Sync {
    fn set(&self, v: i64);
}
pub trait Histogram: Send + Sync {
    fn observe(&self, v: f64);
}

pub trait Meter: Send + Sync + 'static {
    fn counter(
        &self,
        name: &'static str,
        labels: &'static [(&'static str, &'static str)],
    ) -> Box<dyn Counter>;
    fn gauge(
        &self,
        name: &'static str,
        labels: &'static [(&'static str, &'static str)],
    ) -> Box<dyn Gauge>;
    fn histo(
        &self,
        name: &'static str,
        _buckets: &'static [f64],
        labels: &'static [(&'static str, &'static str)],
    ) -> Box<dyn Histogram>;
    fn emit(&self, evt: VizEvent);
}

/// A do-nothing meter for tests and users who don't care about telemetry.
#[derive(Clone, Default)]
pub struct NoopMeter;
struct NoopC;
impl Counter for NoopC {
    fn inc(&self, _v: u64) {}
}
struct NoopG;
impl Gauge for NoopG {
    fn set(&self, _v: i64) {}
}
struct NoopH;
impl Histogram for NoopH {
    fn observe(&self, _v: f64) {}
}
impl Meter for NoopMeter {
    fn counter(
        &self,
        _n: &'static str,
        _l: &'static [(&'static str, &'static str)],
    ) -> Box<dyn Counter> {
        Box::new(NoopC)
    }
    fn gauge(
        &self,
        _n: &'static str,
        _l: &'static [(&'static str, &'static str)],
    ) -> Box<dyn Gauge> {
        Box::new(NoopG)
    }
    fn histo(
        &self,
        _n: &'static str,
        _b: &'static [f64],
        _l: &'static [(&'static str, &'static str)],
    ) -> Box<dyn Histogram> {
        Box::new(NoopH)
    }
    fn emit(&self, _e: VizEvent) {}
}

/// Typed events for live visualization (keys/values never included).
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq)]
pub enum VizEvent {
    Log(LogEvt),
    Block(BlockEvt),
    Snapshot(SnapshotEvt),
    Cache(CacheEvt),
}

#[derive(Clone, Debug, PartialEq)]
pub struct LogEvt {
    /// Absolute block number within the log stream.
    pub block: u64,
    pub kind: LogKind,
}
#[derive(Clone, Debug, PartialEq)]
pub enum LogKind {
    /// Tail of a block was too small for a header and got zero-filled.
    BlockPadded { bytes: u32 },
    /// Sink rejected an append or flush partway through a logical record.
    AppendFailed { fragments_written: u32 },
}

#[derive(Clone, Debug, PartialEq)]
pub struct BlockEvt {
    pub kind: BlockKind,
}
#[derive(Clone, Debug, PartialEq)]
pub enum BlockKind {
    Finished {
        entries: usize,
        restarts: usize,
        bytes: usize,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct SnapshotEvt {
    pub seqno: u64,
    pub kind: SnapshotKind,
}
#[derive(Clone, Debug, PartialEq)]
pub enum SnapshotKind {
    Created { live: usize },
    Released { live: usize },
}

#[derive(Clone, Debug, PartialEq)]
pub struct CacheEvt {
    pub shard: u32,
    pub kind: CacheKind,
}
#[derive(Clone, Debug, PartialEq)]
pub enum CacheKind {
    Evicted { charge: usize },
}

/// Macros (simple versions). Can be feature-gated if desired.
#[macro_export]
macro_rules! obs_count {
    ($m:expr, $name:expr, $labels:expr, $v:expr) => {{
        $m.counter($name, $labels).inc($v as u64);
    }};
}
#[macro_export]
macro_rules! obs_gauge {
    ($m:expr, $name:expr, $labels:expr, $v:expr) => {{
        $m.gauge($name, $labels).set($v as i64);
    }};
}
#[macro_export]
macro_rules! obs_hist {
    ($m:expr, $name:expr, $labels:expr, $v:expr) => {{
        $m.histo($name, &[], $labels).observe($v as f64);
    }};
}
#[macro_export]
macro_rules! obs_timed {
    ($m:expr, $name:expr, $labels:expr, $body:block) => {{
        let __t = std::time::Instant::now();
        let __ret = { $body };
        let __ms = __t.elapsed().as_secs_f64() * 1000.0;
        $m.histo($name, &[], $labels).observe(__ms);
        __ret
    }};
}

/// In-memory meter that records every event and counter increment.
///
/// Intended for tests that assert on emitted telemetry.
#[derive(Clone, Default)]
pub struct RecordingMeter {
    inner: std::sync::Arc<std::sync::Mutex<Recorded>>,
}

#[derive(Default)]
struct Recorded {
    events: Vec<VizEvent>,
    counters: std::collections::HashMap<&'static str, u64>,
    gauges: std::collections::HashMap<&'static str, i64>,
}

impl RecordingMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events emitted so far, oldest first.
    pub fn events(&self) -> Vec<VizEvent> {
        self.lock().events.clone()
    }

    /// Sum of all increments to the named counter, ignoring labels.
    pub fn counter_value(&self, name: &str) -> u64 {
        self.lock().counters.get(name).copied().unwrap_or(0)
    }

    /// Last value set on the named gauge.
    pub fn gauge_value(&self, name: &str) -> Option<i64> {
        self.lock().gauges.get(name).copied()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Recorded> {
        // A panicking test thread must not hide earlier recordings.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

struct RecordingCounter {
    name: &'static str,
    inner: std::sync::Arc<std::sync::Mutex<Recorded>>,
}
impl Counter for RecordingCounter {
    fn inc(&self, v: u64) {
        let mut rec = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        *rec.counters.entry(self.name).or_insert(0) += v;
    }
}

struct RecordingGauge {
    name: &'static str,
    inner: std::sync::Arc<std::sync::Mutex<Recorded>>,
}
impl Gauge for RecordingGauge {
    fn set(&self, v: i64) {
        let mut rec = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        rec.gauges.insert(self.name, v);
    }
}

impl Meter for RecordingMeter {
    fn counter(
        &self,
        name: &'static str,
        _l: &'static [(&'static str, &'static str)],
    ) -> Box<dyn Counter> {
        Box::new(RecordingCounter {
            name,
            inner: self.inner.clone(),
        })
    }
    fn gauge(
        &self,
        name: &'static str,
        _l: &'static [(&'static str, &'static str)],
    ) -> Box<dyn Gauge> {
        Box::new(RecordingGauge {
            name,
            inner: self.inner.clone(),
        })
    }
    fn histo(
        &self,
        _n: &'static str,
        _b: &'static [f64],
        _l: &'static [(&'static str, &'static str)],
    ) -> Box<dyn Histogram> {
        Box::new(NoopH)
    }
    fn emit(&self, evt: VizEvent) {
        self.lock().events.push(evt);
    }
}
