//! End-to-end sorting jobs.
//!
//! A [`SortJob`] carries the configuration, runs the parse, index and write
//! phases on a [`Scheduler`] and reports a [`JobResult`] with per-phase
//! timings and memory samples.

use std::path::Path;
use std::time::Instant;

use log::{
    debug,
    error,
    info,
};
use serde::Serialize;

use crate::data_structs::{
    Dialect,
    Record,
};
use crate::errors::{
    Result,
    SortError,
};
use crate::io::{
    ChunkSink,
    FileSink,
    InputText,
    OutputSink,
    SinkReport,
};
use crate::tools::scheduler::{
    Scheduler,
    DEFAULT_MIN_CHUNK_SIZE,
    DEFAULT_SEGMENT_SIZE,
};
use crate::utils::{
    default_threads,
    max_mem_usage_mb,
};

/// Label reported as the input of a string job.
pub const STRING_INPUT: &str = "[string]";
/// Label reported as the output of a callback job.
pub const CALLBACK_OUTPUT: &str = "[callback]";
/// Default size of chunks handed to a streaming callback.
pub const DEFAULT_STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Lifecycle of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum JobState {
    NotStarted,
    Parsing,
    Indexing,
    Writing,
    Done,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }
}

/// Timestamps each state transition and samples memory on entry to
/// [`JobState::Parsing`] and on reaching a terminal state.
#[derive(Debug, Clone)]
pub struct JobTracker {
    state:        JobState,
    transitions:  Vec<(JobState, Instant)>,
    start_mem_mb: Option<f64>,
    end_mem_mb:   Option<f64>,
}

impl Default for JobTracker {
    fn default() -> Self {
        Self {
            state:        JobState::NotStarted,
            transitions:  vec![(JobState::NotStarted, Instant::now())],
            start_mem_mb: None,
            end_mem_mb:   None,
        }
    }
}

impl JobTracker {
    pub fn new() -> Self { Self::default() }

    pub fn state(&self) -> JobState { self.state }

    pub fn start_mem_mb(&self) -> Option<f64> { self.start_mem_mb }

    pub fn end_mem_mb(&self) -> Option<f64> { self.end_mem_mb }

    /// Moves to `next`. Transitions out of a terminal state are ignored.
    pub fn enter(
        &mut self,
        next: JobState,
    ) {
        if self.state.is_terminal() {
            return;
        }
        let now = Instant::now();
        if let Some((previous, since)) = self.transitions.last() {
            if *previous != JobState::NotStarted {
                info!(
                    "{:?} took {:.3}s",
                    previous,
                    now.duration_since(*since).as_secs_f64()
                );
            }
        }
        match next {
            JobState::Parsing => self.start_mem_mb = max_mem_usage_mb(),
            JobState::Done | JobState::Failed => {
                self.end_mem_mb = max_mem_usage_mb()
            },
            _ => {},
        }
        self.transitions.push((next, now));
        self.state = next;
    }

    /// Seconds spent in `state`, zero if it was never entered.
    pub fn phase_secs(
        &self,
        state: JobState,
    ) -> f64 {
        self.transitions
            .windows(2)
            .find(|pair| pair[0].0 == state)
            .map(|pair| pair[1].1.duration_since(pair[0].1).as_secs_f64())
            .unwrap_or(0.0)
    }
}

/// Telemetry of a successful job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobResult {
    pub input:         String,
    pub output:        String,
    pub dialect:       Dialect,
    pub threads:       usize,
    pub input_mmaped:  bool,
    pub output_mmaped: bool,
    pub parsing_secs:  f64,
    pub indexing_secs: f64,
    pub writing_secs:  f64,
    pub start_mem_mb:  Option<f64>,
    pub end_mem_mb:    Option<f64>,
    /// Number of records written.
    pub records:       usize,
}

impl JobResult {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Growth of peak memory over the job, when both samples exist.
    pub fn mem_delta_mb(&self) -> Option<f64> {
        Some(self.end_mem_mb? - self.start_mem_mb?)
    }

    pub fn total_secs(&self) -> f64 {
        self.parsing_secs + self.indexing_secs + self.writing_secs
    }
}

/// Sorting job configuration.
///
/// ```no_run
/// use annotsort::prelude::*;
///
/// let result = SortJob::default()
///     .with_threads(4)
///     .run_file("genes.gtf", "genes.sorted.gtf")?;
/// println!("{}", result.to_json()?);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct SortJob {
    threads:           usize,
    min_chunk_size:    usize,
    segment_size:      usize,
    stream_chunk_size: usize,
    use_mmap:          bool,
}

impl Default for SortJob {
    fn default() -> Self {
        Self {
            threads:           default_threads(),
            min_chunk_size:    DEFAULT_MIN_CHUNK_SIZE,
            segment_size:      DEFAULT_SEGMENT_SIZE,
            stream_chunk_size: DEFAULT_STREAM_CHUNK_SIZE,
            use_mmap:          cfg!(feature = "mmap"),
        }
    }
}

impl SortJob {
    pub fn new(threads: usize) -> Self { Self::default().with_threads(threads) }

    pub fn with_threads(
        mut self,
        threads: usize,
    ) -> Self {
        self.threads = threads;
        self
    }

    /// Smallest input chunk parsed by one task.
    pub fn with_min_chunk_size(
        mut self,
        bytes: usize,
    ) -> Self {
        self.min_chunk_size = bytes;
        self
    }

    /// Largest output segment serialized by one task.
    pub fn with_segment_size(
        mut self,
        bytes: usize,
    ) -> Self {
        self.segment_size = bytes;
        self
    }

    /// Size of chunks handed to a streaming callback.
    pub fn with_stream_chunk_size(
        mut self,
        bytes: usize,
    ) -> Self {
        self.stream_chunk_size = bytes;
        self
    }

    /// Whether file jobs may memory-map their input and output.
    pub fn with_mmap(
        mut self,
        use_mmap: bool,
    ) -> Self {
        self.use_mmap = use_mmap;
        self
    }

    pub fn threads(&self) -> usize { self.threads }

    fn scheduler(&self) -> Result<Scheduler> {
        Ok(Scheduler::new(self.threads)?
            .with_min_chunk_size(self.min_chunk_size)
            .with_segment_size(self.segment_size))
    }

    /// Sorts the file at `input` into `output`. The dialect follows the
    /// input extension.
    pub fn run_file<P, Q>(
        &self,
        input: P,
        output: Q,
    ) -> Result<JobResult>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>, {
        self.run_file_tracked(&mut JobTracker::new(), input.as_ref(), output.as_ref())
    }

    /// Runs a file job on `tracker`, which ends in [`JobState::Done`] or
    /// [`JobState::Failed`], including when validation fails before any I/O.
    fn run_file_tracked(
        &self,
        tracker: &mut JobTracker,
        input: &Path,
        output: &Path,
    ) -> Result<JobResult> {
        match self.sort_file(tracker, input, output) {
            Ok(result) => Ok(result),
            Err(e) => {
                tracker.enter(JobState::Failed);
                error!("Sorting {:?} failed: {}", input, e);
                Err(e)
            },
        }
    }

    fn sort_file(
        &self,
        tracker: &mut JobTracker,
        input: &Path,
        output: &Path,
    ) -> Result<JobResult> {
        let scheduler = self.scheduler()?;
        let dialect = Dialect::from_path(input)?;
        check_distinct(input, output)?;

        tracker.enter(JobState::Parsing);
        let text = InputText::open(input, self.use_mmap)?;
        let mut sink = FileSink::new(output).with_mmap(self.use_mmap);
        let (records, report) =
            execute(&scheduler, tracker, dialect, text.as_str()?, &mut sink)?;

        Ok(JobResult {
            input: input.display().to_string(),
            output: output.display().to_string(),
            dialect,
            threads: scheduler.threads(),
            input_mmaped: text.is_mapped(),
            output_mmaped: report.mmaped,
            parsing_secs: tracker.phase_secs(JobState::Parsing),
            indexing_secs: tracker.phase_secs(JobState::Indexing),
            writing_secs: tracker.phase_secs(JobState::Writing),
            start_mem_mb: tracker.start_mem_mb(),
            end_mem_mb: tracker.end_mem_mb(),
            records,
        })
    }

    /// Sorts `input` and streams the result to `callback` in chunks of the
    /// configured size. A callback error aborts the job and is reported as
    /// an I/O failure carrying the callback's message.
    pub fn run_string<F>(
        &self,
        dialect: Dialect,
        input: &str,
        callback: F,
    ) -> Result<JobResult>
    where
        F: FnMut(&[u8]) -> std::result::Result<(), String>, {
        let mut tracker = JobTracker::new();
        match self.sort_string(&mut tracker, dialect, input, callback) {
            Ok(result) => Ok(result),
            Err(e) => {
                tracker.enter(JobState::Failed);
                error!("Sorting string input failed: {}", e);
                Err(e)
            },
        }
    }

    fn sort_string<F>(
        &self,
        tracker: &mut JobTracker,
        dialect: Dialect,
        input: &str,
        callback: F,
    ) -> Result<JobResult>
    where
        F: FnMut(&[u8]) -> std::result::Result<(), String>, {
        let scheduler = self.scheduler()?;

        tracker.enter(JobState::Parsing);
        let mut sink = ChunkSink::new(callback, self.stream_chunk_size);
        let (records, _) = execute(&scheduler, tracker, dialect, input, &mut sink)?;
        debug!("Delivered {} chunks", sink.chunks_delivered());

        Ok(JobResult {
            input: STRING_INPUT.to_string(),
            output: CALLBACK_OUTPUT.to_string(),
            dialect,
            threads: scheduler.threads(),
            input_mmaped: false,
            output_mmaped: false,
            parsing_secs: tracker.phase_secs(JobState::Parsing),
            indexing_secs: tracker.phase_secs(JobState::Indexing),
            writing_secs: tracker.phase_secs(JobState::Writing),
            start_mem_mb: tracker.start_mem_mb(),
            end_mem_mb: tracker.end_mem_mb(),
            records,
        })
    }
}

/// Runs parse, index and write on an already open input. The tracker is
/// expected to be in [`JobState::Parsing`].
fn execute<S: OutputSink>(
    scheduler: &Scheduler,
    tracker: &mut JobTracker,
    dialect: Dialect,
    text: &str,
    sink: &mut S,
) -> Result<(usize, SinkReport)> {
    let records: Vec<Record> = scheduler.parse(dialect, text)?;
    info!("Parsed {} {} records", records.len(), dialect);

    tracker.enter(JobState::Indexing);
    let ranking = scheduler.index(dialect, &records);
    let stats = ranking.stats();
    info!(
        "Indexed {} roots ({} dangling parents, {} broken cycles)",
        stats.roots, stats.dangling_parents, stats.broken_cycles
    );

    tracker.enter(JobState::Writing);
    let report = scheduler.write(&records, &ranking, sink)?;
    tracker.enter(JobState::Done);
    info!(
        "Wrote {} bytes{}",
        report.bytes,
        if report.mmaped { " through mmap" } else { "" }
    );

    Ok((records.len(), report))
}

fn check_distinct(
    input: &Path,
    output: &Path,
) -> Result<()> {
    if !output.exists() {
        return Ok(());
    }
    match (input.canonicalize(), output.canonicalize()) {
        (Ok(a), Ok(b)) if a == b => {
            Err(SortError::InvalidOutput(format!(
                "output {:?} is the same file as the input",
                output
            )))
        },
        _ => Ok(()),
    }
}
