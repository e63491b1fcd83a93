//! Dialect-aware parsing of annotation text into [`Record`]s.
//!
//! Parsing works on newline-aligned chunks so that the scheduler can hand
//! each chunk to a different worker. A chunk only needs to know the line
//! number of its first line; the caller derives it from the newline counts
//! of the preceding chunks.

use log::trace;

use crate::data_structs::{
    Attributes,
    Dialect,
    Phase,
    Record,
    Strand,
};
use crate::errors::{
    Result,
    SortError,
};

const MIN_COLUMNS: usize = 8;
const FASTA_DIRECTIVE: &str = "##FASTA";

/// Parses one non-comment line. `line_no` is only used for reporting.
pub fn parse_line(
    dialect: Dialect,
    line: &str,
    line_no: usize,
) -> Result<Record<'_>> {
    let mut fields = line.splitn(10, '\t');
    let mut columns: [&str; 9] = [""; 9];
    let mut n_columns = 0;
    for column in columns.iter_mut() {
        match fields.next() {
            Some(field) => {
                *column = field;
                n_columns += 1;
            },
            None => break,
        }
    }
    let raw_extra = fields.next();

    if n_columns < MIN_COLUMNS {
        return Err(SortError::parse(
            line_no,
            format!(
                "expected at least {} tab-separated columns, found {}",
                MIN_COLUMNS, n_columns
            ),
        ));
    }

    let [seq_id, source, feature_type, start, end, score, strand, frame, attributes] =
        columns;

    if seq_id.is_empty() {
        return Err(SortError::parse(line_no, "empty sequence name"));
    }

    let start = parse_coord(start, "start", line_no)?;
    let end = parse_coord(end, "end", line_no)?;
    if start > end {
        return Err(SortError::parse(
            line_no,
            format!("start ({}) is greater than end ({})", start, end),
        ));
    }

    let score = match score {
        "." => None,
        s if s.parse::<f64>().is_ok() => Some(s),
        s => {
            return Err(SortError::parse(
                line_no,
                format!("score '{}' is not a number", s),
            ))
        },
    };

    let strand = Strand::parse(strand).ok_or_else(|| {
        SortError::parse(line_no, format!("invalid strand '{}'", strand))
    })?;

    let frame = match frame {
        "." => None,
        f => {
            Some(Phase::parse(f).ok_or_else(|| {
                SortError::parse(line_no, format!("invalid frame '{}'", f))
            })?)
        },
    };

    let attributes = if n_columns > MIN_COLUMNS {
        Some(
            Attributes::parse(dialect, attributes)
                .map_err(|reason| SortError::parse(line_no, reason))?,
        )
    }
    else {
        None
    };

    Ok(Record {
        seq_id,
        source,
        feature_type,
        start,
        end,
        score,
        strand,
        frame,
        attributes,
        raw_extra,
        line_no,
    })
}

fn parse_coord(
    value: &str,
    name: &str,
    line_no: usize,
) -> Result<u64> {
    value.parse::<u64>().map_err(|_| {
        SortError::parse(
            line_no,
            format!("{} '{}' is not a valid coordinate", name, value),
        )
    })
}

/// Whether a line carries no record.
#[inline]
fn is_skipped(line: &str) -> bool {
    line.starts_with('#') || line.trim().is_empty()
}

/// Parses a chunk of whole lines whose first line is `first_line_no`.
pub fn parse_chunk(
    dialect: Dialect,
    chunk: &str,
    first_line_no: usize,
) -> Result<Vec<Record<'_>>> {
    let mut records = Vec::with_capacity(chunk.len() / 128);
    for (offset, line) in chunk.lines().enumerate() {
        if is_skipped(line) {
            continue;
        }
        records.push(parse_line(dialect, line, first_line_no + offset)?);
    }
    trace!(
        "Parsed {} records starting at line {}",
        records.len(),
        first_line_no
    );
    Ok(records)
}

/// Sequential parse of a whole text.
pub fn parse_records(
    dialect: Dialect,
    text: &str,
) -> Result<Vec<Record<'_>>> {
    parse_chunk(dialect, annotation_section(dialect, text), 1)
}

/// Drops a trailing GFF3 `##FASTA` section, which holds sequences rather
/// than features.
pub fn annotation_section(
    dialect: Dialect,
    text: &str,
) -> &str {
    if dialect != Dialect::Gff3 {
        return text;
    }
    if text.starts_with(FASTA_DIRECTIVE) {
        return "";
    }
    match text.find(&format!("\n{}", FASTA_DIRECTIVE)) {
        Some(pos) => &text[..pos + 1],
        None => text,
    }
}

/// Splits `text` into at most roughly `n_chunks` pieces, each ending on a
/// newline (except possibly the last) and at least `min_chunk` bytes long.
pub fn split_chunks(
    text: &str,
    n_chunks: usize,
    min_chunk: usize,
) -> Vec<&str> {
    let bytes = text.as_bytes();
    let target = (text.len() / n_chunks.max(1)).max(min_chunk).max(1);

    let mut chunks = Vec::with_capacity(n_chunks);
    let mut start = 0;
    while start < bytes.len() {
        let mut end = (start + target).min(bytes.len());
        if end < bytes.len() {
            end = match bytes[end - 1..].iter().position(|&b| b == b'\n') {
                Some(pos) => end + pos,
                None => bytes.len(),
            };
        }
        chunks.push(&text[start..end]);
        start = end;
    }
    chunks
}

/// Number of lines a newline-terminated chunk contributes.
pub fn count_newlines(chunk: &str) -> usize {
    chunk
        .as_bytes()
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
}
