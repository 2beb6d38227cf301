//! Cleaning jobs
//!
//! A job covers one layer/datatype pair: its extent, its rule pair and the
//! edges to rasterise. Jobs share nothing, so a batch runs them on a rayon
//! pool with each worker owning its store for the duration of one job.
//!
//! # Record layout
//! A record is a flat run of integers:
//! `layer, datatype, hor1, hor2, ver1, ver2, min_space, min_width` followed
//! by any number of `x1, x2, y1, y2` edge groups. The binary form prefixes
//! the values with their count as a little-endian `u32`; values are
//! little-endian `i32`.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};

use crate::clean::{Bounds, CleanError, CleanReport, Lines, Ring, ScanlineStore, ViolationParameters};
pub use crate::config::{CleanerConfig, OutputKind};

/// Values ahead of the edge data in a flat record
pub const HEADER_LEN: usize = 8;

#[derive(thiserror::Error, Debug)]
pub enum JobError {
    #[error("job record has {0} values, expected at least 8")]
    Truncated(usize),
    #[error("job record carries {0} edge values, not a multiple of 4")]
    RaggedEdges(usize),
    #[error("binary record ends after {found} of {expected} bytes")]
    ShortRecord { expected: u64, found: u64 },
    #[error("invalid integer {0:?} in job record")]
    BadValue(String),
    #[error(transparent)]
    Clean(#[from] CleanError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("job cancelled before it started")]
    Cancelled,
}

/// One edge from `(x1, y1)` to `(x2, y2)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub x1: i32,
    pub x2: i32,
    pub y1: i32,
    pub y2: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub layer: i32,
    pub datatype: i32,
    pub bounds: Bounds,
    pub params: ViolationParameters,
    pub edges: Vec<Edge>,
}

impl JobRecord {
    pub fn new(layer: i32, datatype: i32, bounds: Bounds, params: ViolationParameters) -> Self {
        Self {
            layer,
            datatype,
            bounds,
            params,
            edges: Vec::new(),
        }
    }

    /// Add a box as its upward left edge and downward right edge
    pub fn push_box(&mut self, x1: i32, y1: i32, x2: i32, y2: i32) {
        let (left, right) = (x1.min(x2), x1.max(x2));
        let (bottom, top) = (y1.min(y2), y1.max(y2));
        self.edges.push(Edge { x1: left, x2: left, y1: bottom, y2: top });
        self.edges.push(Edge { x1: right, x2: right, y1: top, y2: bottom });
    }

    pub fn key(&self) -> (i32, i32) {
        (self.layer, self.datatype)
    }

    pub fn from_flat(values: &[i32]) -> Result<Self, JobError> {
        if values.len() < HEADER_LEN {
            return Err(JobError::Truncated(values.len()));
        }
        let (header, data) = values.split_at(HEADER_LEN);
        if data.len() % 4 != 0 {
            return Err(JobError::RaggedEdges(data.len()));
        }

        Ok(Self {
            layer: header[0],
            datatype: header[1],
            bounds: Bounds::new(header[2], header[3], header[4], header[5]),
            params: ViolationParameters::new(header[7], header[6]),
            edges: data
                .chunks_exact(4)
                .map(|e| Edge { x1: e[0], x2: e[1], y1: e[2], y2: e[3] })
                .collect(),
        })
    }

    pub fn to_flat(&self) -> Vec<i32> {
        let mut values = Vec::with_capacity(HEADER_LEN + 4 * self.edges.len());
        values.extend_from_slice(&[
            self.layer,
            self.datatype,
            self.bounds.hor1,
            self.bounds.hor2,
            self.bounds.ver1,
            self.bounds.ver2,
            self.params.min_space,
            self.params.min_width,
        ]);
        for e in &self.edges {
            values.extend_from_slice(&[e.x1, e.x2, e.y1, e.y2]);
        }
        values
    }

    /// Parse whitespace separated integers
    pub fn parse_text(text: &str) -> Result<Self, JobError> {
        let values = text
            .split_whitespace()
            .map(|v| v.parse::<i32>().map_err(|_| JobError::BadValue(v.to_string())))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_flat(&values)
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), JobError> {
        let values = self.to_flat();
        writer.write_u32::<LittleEndian>(values.len() as u32)?;
        for v in values {
            writer.write_i32::<LittleEndian>(v)?;
        }
        Ok(())
    }

    /// Read back-to-back binary records until the stream ends.
    ///
    /// Values are buffered only as far as the stream actually supplies them,
    /// so a corrupt count fails as a short record instead of allocating.
    pub fn read_all<R: Read>(reader: &mut R) -> Result<Vec<Self>, JobError> {
        let mut records = Vec::new();
        loop {
            let mut header = Vec::with_capacity(4);
            reader.by_ref().take(4).read_to_end(&mut header)?;
            match header.len() {
                0 => break,
                4 => {}
                found => return Err(JobError::ShortRecord { expected: 4, found: found as u64 }),
            }
            let count = LittleEndian::read_u32(&header);

            let expected = u64::from(count) * 4;
            let mut bytes = Vec::new();
            reader.by_ref().take(expected).read_to_end(&mut bytes)?;
            if bytes.len() as u64 != expected {
                return Err(JobError::ShortRecord { expected, found: bytes.len() as u64 });
            }

            let mut values = vec![0i32; count as usize];
            LittleEndian::read_i32_into(&bytes, &mut values);
            records.push(Self::from_flat(&values)?);
        }
        Ok(records)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum JobOutput {
    Lines(Lines),
    Polygons(Vec<Ring>),
}

impl JobOutput {
    /// Rings, or lines with material, depending on the kind
    pub fn len(&self) -> usize {
        match self {
            JobOutput::Lines(lines) => lines.lines.iter().filter(|l| !l.is_empty()).count(),
            JobOutput::Polygons(rings) => rings.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub layer: i32,
    pub datatype: i32,
    /// `None` when the rules were too small to enforce
    pub report: Option<CleanReport>,
    pub output: JobOutput,
    pub elapsed_ms: f64,
}

/// Build, clean and read back one job
pub fn run_job(record: &JobRecord, config: &CleanerConfig) -> Result<JobResult, JobError> {
    let _span = info_span!("job", layer = record.layer, datatype = record.datatype).entered();
    let start = Instant::now();

    let mut store = ScanlineStore::with_line_limit(record.bounds, record.params, config.max_grid_lines)?;
    for edge in &record.edges {
        store.add_data(edge.x1, edge.x2, edge.y1, edge.y2)?;
    }
    store.sortlist();

    let report = if record.params.is_enforced() {
        Some(store.clean(config.max_tries))
    } else {
        debug!(
            min_width = record.params.min_width,
            min_space = record.params.min_space,
            "unit rules, skipping repair"
        );
        None
    };

    let output = match config.output {
        OutputKind::Lines => JobOutput::Lines(store.get_lines()),
        OutputKind::Polygons => JobOutput::Polygons(store.get_polygons()),
    };

    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    info!(
        edges = record.edges.len(),
        fixed = report.as_ref().map_or(0, CleanReport::total_fixed),
        outputs = output.len(),
        elapsed_ms,
        "job finished"
    );

    Ok(JobResult {
        layer: record.layer,
        datatype: record.datatype,
        report,
        output,
        elapsed_ms,
    })
}

#[derive(Debug)]
pub struct JobFailure {
    pub layer: i32,
    pub datatype: i32,
    pub error: JobError,
}

#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Results in submission order; a repeated key keeps its first slot
    pub results: IndexMap<(i32, i32), JobResult>,
    pub failures: Vec<JobFailure>,
}

/// Run independent jobs in parallel.
///
/// `cancel` is checked as each job starts; jobs that see it set are reported
/// as [`JobError::Cancelled`]. A failing job never stops the others.
pub fn run_jobs(
    records: &[JobRecord],
    config: &CleanerConfig,
    cancel: &AtomicBool,
) -> Result<BatchOutcome, JobError> {
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(threads) = config.threads {
        builder = builder.num_threads(threads);
    }
    let pool = builder.build()?;

    let start = Instant::now();
    let outcomes: Vec<_> = pool.install(|| {
        records
            .par_iter()
            .map(|record| {
                if cancel.load(Ordering::Relaxed) {
                    Err(JobError::Cancelled)
                } else {
                    run_job(record, config)
                }
            })
            .collect()
    });

    let mut batch = BatchOutcome::default();
    for (record, outcome) in records.iter().zip(outcomes) {
        match outcome {
            Ok(result) => {
                batch.results.insert(record.key(), result);
            }
            Err(error) => {
                warn!(layer = record.layer, datatype = record.datatype, %error, "job failed");
                batch.failures.push(JobFailure {
                    layer: record.layer,
                    datatype: record.datatype,
                    error,
                });
            }
        }
    }

    info!(
        jobs = records.len(),
        succeeded = batch.results.len(),
        failed = batch.failures.len(),
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "batch finished"
    );
    Ok(batch)
}
