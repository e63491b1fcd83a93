//! Core data structures of the sort engine.
//!
//! - [`Record`]: one annotation line, borrowing its text from the input.
//! - [`Attributes`]: the decoded ninth column, with the raw text kept for
//!   output.
//! - [`Forest`]: the parent-child hierarchy of a set of records and the
//!   [`Ranking`] derived from it.
//! - Small enumerations shared by the parser and the writer ([`Dialect`],
//!   [`Strand`], [`Phase`]).

mod attributes;
mod enums;
pub mod forest;
mod record;

pub use attributes::{
    Attributes,
    GFF_ID,
    GFF_PARENT,
    GTF_GENE_ID,
    GTF_TRANSCRIPT_ID,
};
pub use enums::{
    Dialect,
    Phase,
    Strand,
};
pub use forest::{
    Forest,
    ForestStats,
    HierarchyNode,
    Link,
    NodeKey,
    RankKey,
    Ranking,
};
pub use record::Record;
