//! Worker pool driving the parse, index and write phases of a job.

use itertools::Itertools;
use log::{
    debug,
    info,
};
use rayon::prelude::*;
use rayon::{
    ThreadPool,
    ThreadPoolBuilder,
};

use crate::data_structs::{
    Dialect,
    Forest,
    Ranking,
    Record,
};
use crate::errors::{
    Result,
    SortError,
};
use crate::io::parse::{
    annotation_section,
    count_newlines,
    parse_chunk,
    split_chunks,
};
use crate::io::{
    EmissionPlan,
    OutputSink,
    SinkReport,
};

/// Input chunks per worker, so that uneven chunks still balance.
pub const CHUNKS_PER_THREAD: usize = 4;
/// Smallest input chunk handed to a worker.
pub const DEFAULT_MIN_CHUNK_SIZE: usize = 64 * 1024;
/// Largest output segment written by one task.
pub const DEFAULT_SEGMENT_SIZE: usize = 4 * 1024 * 1024;

/// Fixed-size rayon pool plus the chunking parameters of a job.
pub struct Scheduler {
    pool:           ThreadPool,
    min_chunk_size: usize,
    segment_size:   usize,
}

impl Scheduler {
    /// Builds a pool of exactly `threads` workers.
    pub fn new(threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(SortError::InvalidThreads(
                "number of threads must be greater than 0".to_string(),
            ));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("annotsort-{}", i))
            .build()
            .map_err(|e| SortError::InvalidThreads(e.to_string()))?;
        info!("Worker pool started with {} threads", threads);

        Ok(Self {
            pool,
            min_chunk_size: DEFAULT_MIN_CHUNK_SIZE,
            segment_size: DEFAULT_SEGMENT_SIZE,
        })
    }

    pub fn with_min_chunk_size(
        mut self,
        min_chunk_size: usize,
    ) -> Self {
        self.min_chunk_size = min_chunk_size.max(1);
        self
    }

    pub fn with_segment_size(
        mut self,
        segment_size: usize,
    ) -> Self {
        self.segment_size = segment_size.max(1);
        self
    }

    pub fn threads(&self) -> usize { self.pool.current_num_threads() }

    pub fn pool(&self) -> &ThreadPool { &self.pool }

    fn n_tasks(&self) -> usize { self.threads() * CHUNKS_PER_THREAD }

    /// Parses `text` on the pool. Records come back in input order; the
    /// reported error is the one on the earliest malformed line.
    pub fn parse<'a>(
        &self,
        dialect: Dialect,
        text: &'a str,
    ) -> Result<Vec<Record<'a>>> {
        let text = annotation_section(dialect, text);
        let chunks = split_chunks(text, self.n_tasks(), self.min_chunk_size);
        debug!(
            "Split {} bytes of input into {} chunks",
            text.len(),
            chunks.len()
        );

        self.pool.install(|| {
            let line_counts: Vec<usize> = chunks
                .par_iter()
                .map(|chunk| count_newlines(chunk))
                .collect();
            let first_lines = line_counts
                .iter()
                .scan(1, |next, count| {
                    let first = *next;
                    *next += count;
                    Some(first)
                })
                .collect_vec();

            let parsed: Vec<Result<Vec<Record<'a>>>> = chunks
                .par_iter()
                .zip(first_lines.par_iter())
                .map(|(chunk, &first_line)| parse_chunk(dialect, chunk, first_line))
                .collect();

            itertools::process_results(parsed, |chunks| {
                chunks.flatten().collect::<Vec<_>>()
            })
        })
    }

    /// Builds the hierarchy of `records` and ranks them.
    pub fn index(
        &self,
        dialect: Dialect,
        records: &[Record],
    ) -> Ranking {
        self.pool
            .install(|| Forest::build(records, dialect).rank())
    }

    /// Computes the output layout of ranked records.
    pub fn plan<'p, 'a>(
        &self,
        records: &'p [Record<'a>],
        ranking: &'p Ranking,
    ) -> EmissionPlan<'p, 'a> {
        self.pool.install(|| {
            EmissionPlan::new(records, ranking, self.n_tasks(), self.segment_size)
        })
    }

    /// Writes ranked records through `sink`.
    pub fn write<S: OutputSink + ?Sized>(
        &self,
        records: &[Record],
        ranking: &Ranking,
        sink: &mut S,
    ) -> Result<SinkReport> {
        let plan = self.plan(records, ranking);
        sink.write_plan(&plan, &self.pool)
    }
}
