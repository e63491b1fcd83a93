//! Reading annotation text and writing the sorted result.

pub mod mmap;
pub mod parse;
pub mod write;

pub use mmap::InputText;
pub use write::{
    ChunkSink,
    EmissionPlan,
    FileSink,
    OutputSink,
    Segment,
    SinkReport,
};
