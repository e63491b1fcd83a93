pub use crate::data_structs::{
    Attributes,
    Dialect,
    Forest,
    NodeKey,
    Phase,
    RankKey,
    Ranking,
    Record,
    Strand,
};
pub use crate::errors::{
    ErrorCode,
    Result,
    SortError,
};
pub use crate::io::{
    ChunkSink,
    FileSink,
    OutputSink,
};
pub use crate::tools::{
    JobResult,
    JobState,
    Scheduler,
    SortJob,
};
pub use crate::{
    sort_annotations,
    sort_annotations_string,
};
