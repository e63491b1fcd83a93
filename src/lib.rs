//! # annotsort
//!
//! `annotsort` sorts gene annotation files in GTF or GFF3 format. Features
//! come out in ascending coordinate order while genes, transcripts and their
//! children (exons, CDS, UTRs) stay nested under each other.
//!
//! Sorting is a pure function of the input text: the same input gives the
//! same bytes for any number of threads.
//!
//! ## How it works
//!
//! 1. The input is split into newline-aligned chunks that are parsed in
//!    parallel into [`Record`](data_structs::Record)s borrowing from the
//!    input text (memory-mapped when reading from a file).
//! 2. A [`Forest`](data_structs::Forest) links every record to its parent.
//!    Parents that never appear and links that would close a cycle turn the
//!    record into a root instead of failing the job.
//! 3. Roots are ordered by sequence name (natural order, `chr2` before
//!    `chr10`) and start, children by start; ties keep input order.
//! 4. The pre-order walk of the forest is serialized either into a
//!    memory-mapped output file, one parallel writer per segment, or into
//!    chunks handed to a callback.
//!
//! Number of threads used by default can be configured with the
//! `ANNOTSORT_NUM_THREADS` environment variable.
//!
//! ## Structure
//!
//! * [`data_structs`]: records, attributes and the feature hierarchy.
//! * [`io`]: input loading, parsing and output sinks.
//! * [`tools`]: the worker pool and the sorting job.
//! * [`errors`]: the error type and its stable codes.
//! * [`utils`]: logger setup, memory sampling and thread defaults.
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//!
//! use annotsort::prelude::*;
//!
//! let result = sort_annotations(
//!     Path::new("gencode.gff3"),
//!     Path::new("gencode.sorted.gff3"),
//!     8,
//! )?;
//! println!("Sorted {} records in {:.2}s", result.records, result.total_secs());
//! # Ok::<(), SortError>(())
//! ```
//!
//! Streaming into memory:
//!
//! ```
//! use annotsort::prelude::*;
//!
//! let gtf = "1\t.\texon\t20\t30\t.\t+\t.\tgene_id \"g\"; transcript_id \"t\";\n\
//!            1\t.\tgene\t10\t30\t.\t+\t.\tgene_id \"g\";\n";
//! let mut sorted = Vec::new();
//! sort_annotations_string(
//!     Dialect::Gtf,
//!     gtf,
//!     |chunk| {
//!         sorted.extend_from_slice(chunk);
//!         Ok(())
//!     },
//!     2,
//! )?;
//! assert!(sorted.starts_with(b"1\t.\tgene"));
//! # Ok::<(), SortError>(())
//! ```

use std::path::Path;

pub mod data_structs;
pub mod errors;
pub mod io;
pub mod prelude;
pub mod tools;
pub mod utils;

use crate::data_structs::Dialect;
use crate::errors::Result;
use crate::tools::{
    JobResult,
    SortJob,
};

/// Sorts the annotation file at `input` into `output` using `threads`
/// workers. The dialect is taken from the input extension (`gtf`, `gff`,
/// `gff3`).
pub fn sort_annotations(
    input: &Path,
    output: &Path,
    threads: usize,
) -> Result<JobResult> {
    SortJob::new(threads).run_file(input, output)
}

/// Sorts annotation text and streams the output to `sink`. Mapping flags in
/// the result are always `false`.
pub fn sort_annotations_string<F>(
    dialect: Dialect,
    input: &str,
    sink: F,
    threads: usize,
) -> Result<JobResult>
where
    F: FnMut(&[u8]) -> std::result::Result<(), String>, {
    SortJob::new(threads).run_string(dialect, input, sink)
}
