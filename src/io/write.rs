//! Serialization of ranked records.
//!
//! The sorting core hands an [`EmissionPlan`] to an [`OutputSink`]. A plan
//! knows the exact byte length of every record, so a sink can either carve a
//! pre-sized region into disjoint per-segment ranges (file-backed output) or
//! serialize segments and push them on in order (streaming output).

use std::fs::File;
use std::io::{
    self,
    BufWriter,
    Write,
};
use std::ops::Range;
use std::path::{
    Path,
    PathBuf,
};

use log::{
    debug,
    info,
    warn,
};
use rayon::prelude::*;
use rayon::ThreadPool;

use crate::data_structs::{
    Ranking,
    Record,
};
use crate::errors::{
    Result,
    SortError,
};

/// Contiguous run of the emission order written as one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Range into the emission order.
    pub records: Range<usize>,
    /// Byte offset of the segment in the output.
    pub offset:  usize,
    /// Byte length of the segment.
    pub len:     usize,
}

/// Ranked records with precomputed output layout.
pub struct EmissionPlan<'p, 'a> {
    records:   &'p [Record<'a>],
    order:     &'p [usize],
    segments:  Vec<Segment>,
    total_len: usize,
}

impl<'p, 'a> EmissionPlan<'p, 'a> {
    /// Lays out `records` in `ranking` order as about `n_segments` segments,
    /// none (except a single oversized record) longer than `max_segment_len`.
    ///
    /// Record lengths are computed on the current rayon pool; the segment
    /// boundaries are computed sequentially.
    pub fn new(
        records: &'p [Record<'a>],
        ranking: &'p Ranking,
        n_segments: usize,
        max_segment_len: usize,
    ) -> Self {
        let order = ranking.order();
        let lengths: Vec<usize> = order
            .par_iter()
            .map(|&idx| records[idx].serialized_len())
            .collect();
        let total_len: usize = lengths.iter().sum();

        let target = (total_len / n_segments.max(1))
            .clamp(1, max_segment_len.max(1));
        let mut segments = Vec::with_capacity(n_segments);
        let mut first = 0;
        let mut offset = 0;
        let mut len = 0;
        for (pos, record_len) in lengths.iter().enumerate() {
            len += record_len;
            if len >= target {
                segments.push(Segment {
                    records: first..pos + 1,
                    offset,
                    len,
                });
                first = pos + 1;
                offset += len;
                len = 0;
            }
        }
        if first < lengths.len() {
            segments.push(Segment {
                records: first..lengths.len(),
                offset,
                len,
            });
        }

        debug!(
            "Output layout: {} bytes in {} segments",
            total_len,
            segments.len()
        );

        Self {
            records,
            order,
            segments,
            total_len,
        }
    }

    pub fn total_len(&self) -> usize { self.total_len }

    pub fn segments(&self) -> &[Segment] { &self.segments }

    pub fn n_records(&self) -> usize { self.order.len() }

    /// Records in emission order.
    pub fn iter(&self) -> impl Iterator<Item = &'p Record<'a>> + '_ {
        self.order.iter().map(|&idx| &self.records[idx])
    }

    pub fn write_segment<W: Write>(
        &self,
        segment: &Segment,
        writer: &mut W,
    ) -> io::Result<()> {
        for &idx in &self.order[segment.records.clone()] {
            self.records[idx].write_to(writer)?;
        }
        Ok(())
    }

    /// Serializes one segment into a new buffer.
    pub fn render_segment(
        &self,
        segment: &Segment,
    ) -> io::Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(segment.len);
        self.write_segment(segment, &mut buffer)?;
        Ok(buffer)
    }
}

/// What a sink reports after a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SinkReport {
    pub bytes:   usize,
    pub mmaped:  bool,
}

/// Destination of the sorted output.
///
/// Implementations decide how to use the pool: random-access sinks write
/// disjoint ranges in parallel, sequential sinks serialize in parallel and
/// emit in order.
pub trait OutputSink {
    fn write_plan(
        &mut self,
        plan: &EmissionPlan,
        pool: &ThreadPool,
    ) -> Result<SinkReport>;
}

/// File-backed sink: pre-sized memory map with per-segment parallel writers,
/// buffered sequential writing as fallback.
pub struct FileSink {
    path:     PathBuf,
    use_mmap: bool,
}

impl FileSink {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path:     path.into(),
            use_mmap: true,
        }
    }

    pub fn with_mmap(
        mut self,
        use_mmap: bool,
    ) -> Self {
        self.use_mmap = use_mmap;
        self
    }

    pub fn path(&self) -> &Path { &self.path }

    #[cfg(feature = "mmap")]
    fn write_mmaped(
        &self,
        plan: &EmissionPlan,
        pool: &ThreadPool,
    ) -> io::Result<()> {
        use std::fs::OpenOptions;

        use memmap2::MmapMut;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)?;
        file.set_len(plan.total_len() as u64)?;

        // SAFETY: the file was just created by this job and is only accessed
        // through this map until it is flushed.
        let mut map = unsafe { MmapMut::map_mut(&file)? };
        #[cfg(unix)]
        if let Err(e) = map.advise(memmap2::Advice::Random) {
            warn!("madvise failed: {}", e);
        }
        info!(
            "Successfully mapped output file, size: {} bytes",
            map.len()
        );

        let mut rest: &mut [u8] = &mut map[..];
        let mut ranges = Vec::with_capacity(plan.segments().len());
        for segment in plan.segments() {
            let (head, tail) = std::mem::take(&mut rest).split_at_mut(segment.len);
            ranges.push(head);
            rest = tail;
        }

        pool.install(|| {
            plan.segments()
                .par_iter()
                .zip(ranges.into_par_iter())
                .try_for_each(|(segment, mut range)| {
                    plan.write_segment(segment, &mut range)?;
                    if !range.is_empty() {
                        return Err(io::Error::other(format!(
                            "segment at offset {} left {} bytes unwritten",
                            segment.offset,
                            range.len()
                        )));
                    }
                    Ok(())
                })
        })?;

        map.flush()
    }

    fn write_sequential(
        &self,
        plan: &EmissionPlan,
    ) -> Result<()> {
        let file = File::create(&self.path).map_err(|e| {
            SortError::InvalidOutput(format!(
                "cannot create {:?}: {}",
                self.path, e
            ))
        })?;
        let mut writer = BufWriter::new(file);
        for segment in plan.segments() {
            plan.write_segment(segment, &mut writer)
                .map_err(|e| SortError::io("writing output file", e))?;
        }
        writer
            .flush()
            .map_err(|e| SortError::io("flushing output file", e))
    }

    /// Whether a failed write may leave a partial file behind at the path,
    /// i.e. the path is absent or a regular file the job will truncate.
    fn is_replaceable(&self) -> bool {
        match std::fs::symlink_metadata(&self.path) {
            Ok(meta) => meta.is_file(),
            Err(_) => true,
        }
    }

    /// Removes an incomplete output. Devices, pipes and symlinks are never
    /// removed. Returns whether a file was deleted.
    fn discard_partial(
        &self,
        replaceable: bool,
    ) -> bool {
        if !replaceable || !self.is_replaceable() || !self.path.is_file() {
            return false;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Removed incomplete output {:?}", self.path);
                true
            },
            Err(e) => {
                warn!(
                    "Could not remove incomplete output {:?}: {}",
                    self.path, e
                );
                false
            },
        }
    }

    fn write_plan_inner(
        &mut self,
        plan: &EmissionPlan,
        pool: &ThreadPool,
    ) -> Result<SinkReport> {
        let report = SinkReport {
            bytes:  plan.total_len(),
            mmaped: false,
        };

        #[cfg(feature = "mmap")]
        if self.use_mmap && plan.total_len() > 0 {
            match self.write_mmaped(plan, pool) {
                Ok(()) => {
                    return Ok(SinkReport {
                        mmaped: true,
                        ..report
                    })
                },
                Err(e) => {
                    warn!(
                        "Error in mmaped output, falling back to sequential: {}",
                        e
                    )
                },
            }
        }
        #[cfg(not(feature = "mmap"))]
        let _ = pool;

        self.write_sequential(plan)?;
        Ok(report)
    }
}

impl OutputSink for FileSink {
    fn write_plan(
        &mut self,
        plan: &EmissionPlan,
        pool: &ThreadPool,
    ) -> Result<SinkReport> {
        let replaceable = self.is_replaceable();
        let result = self.write_plan_inner(plan, pool);
        if result.is_err() {
            self.discard_partial(replaceable);
        }
        result
    }
}

/// Streaming sink: output is pushed in order through a callback, in chunks
/// of at most `chunk_size` bytes. The first callback error stops the
/// stream.
pub struct ChunkSink<F>
where
    F: FnMut(&[u8]) -> std::result::Result<(), String>, {
    callback:   F,
    chunk_size: usize,
    pending:    Vec<u8>,
    delivered:  usize,
}

impl<F> ChunkSink<F>
where
    F: FnMut(&[u8]) -> std::result::Result<(), String>,
{
    pub fn new(
        callback: F,
        chunk_size: usize,
    ) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            callback,
            chunk_size,
            pending: Vec::with_capacity(chunk_size),
            delivered: 0,
        }
    }

    /// Number of chunks handed to the callback so far.
    pub fn chunks_delivered(&self) -> usize { self.delivered }

    fn emit(
        &mut self,
        chunk: &[u8],
    ) -> Result<()> {
        (self.callback)(chunk).map_err(SortError::Sink)?;
        self.delivered += 1;
        Ok(())
    }

    fn push(
        &mut self,
        mut bytes: &[u8],
    ) -> Result<()> {
        while !bytes.is_empty() {
            let room = self.chunk_size - self.pending.len();
            let take = room.min(bytes.len());
            self.pending.extend_from_slice(&bytes[..take]);
            bytes = &bytes[take..];
            if self.pending.len() == self.chunk_size {
                let chunk = std::mem::take(&mut self.pending);
                self.emit(&chunk)?;
                self.pending = chunk;
                self.pending.clear();
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if !self.pending.is_empty() {
            let chunk = std::mem::take(&mut self.pending);
            self.emit(&chunk)?;
        }
        Ok(())
    }
}

impl<F> OutputSink for ChunkSink<F>
where
    F: FnMut(&[u8]) -> std::result::Result<(), String>,
{
    fn write_plan(
        &mut self,
        plan: &EmissionPlan,
        pool: &ThreadPool,
    ) -> Result<SinkReport> {
        // Serialize as many segments at a time as there are workers
        let window = pool.current_num_threads().max(1);
        for batch in plan.segments().chunks(window) {
            let rendered = pool
                .install(|| {
                    batch
                        .par_iter()
                        .map(|segment| plan.render_segment(segment))
                        .collect::<io::Result<Vec<_>>>()
                })
                .map_err(|e| SortError::io("serializing output", e))?;
            for buffer in rendered {
                self.push(&buffer)?;
            }
        }
        self.finish()?;

        Ok(SinkReport {
            bytes:  plan.total_len(),
            mmaped: false,
        })
    }
}
