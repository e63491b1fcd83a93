use std::io::{
    self,
    Write,
};

use crate::data_structs::Attributes;
use crate::data_structs::{
    Phase,
    Strand,
};

/// One annotation line.
///
/// String fields borrow from the input text, so a job keeps the whole input
/// alive (mapped or in memory) until the output is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record<'a> {
    pub(crate) seq_id:       &'a str,
    pub(crate) source:       &'a str,
    pub(crate) feature_type: &'a str,
    pub(crate) start:        u64,
    pub(crate) end:          u64,
    pub(crate) score:        Option<&'a str>,
    pub(crate) strand:       Strand,
    pub(crate) frame:        Option<Phase>,
    pub(crate) attributes:   Option<Attributes<'a>>,
    pub(crate) raw_extra:    Option<&'a str>,
    pub(crate) line_no:      usize,
}

impl<'a> Record<'a> {
    pub fn seq_id(&self) -> &'a str { self.seq_id }

    pub fn source(&self) -> &'a str { self.source }

    pub fn feature_type(&self) -> &'a str { self.feature_type }

    pub fn start(&self) -> u64 { self.start }

    pub fn end(&self) -> u64 { self.end }

    pub fn score(&self) -> Option<&'a str> { self.score }

    pub fn strand(&self) -> Strand { self.strand }

    pub fn frame(&self) -> Option<Phase> { self.frame }

    /// `None` when the line had only eight columns.
    pub fn attributes(&self) -> Option<&Attributes<'a>> {
        self.attributes.as_ref()
    }

    /// Columns after the ninth, tab-joined as in the input.
    pub fn raw_extra(&self) -> Option<&'a str> { self.raw_extra }

    pub fn line_no(&self) -> usize { self.line_no }

    /// Exact number of bytes [`Record::write_to`] produces, newline included.
    pub fn serialized_len(&self) -> usize {
        // 7 tabs between the first eight columns, plus the newline
        let mut len = 8;
        len += self.seq_id.len() + self.source.len() + self.feature_type.len();
        len += decimal_len(self.start) + decimal_len(self.end);
        len += self.score.map_or(1, str::len);
        len += 1; // strand
        len += 1; // frame, one digit or '.'
        if let Some(attributes) = self.attributes.as_ref() {
            len += 1 + attributes.raw().len();
        }
        if let Some(extra) = self.raw_extra {
            len += 1 + extra.len();
        }
        len
    }

    /// Writes the record as one dialect-correct line terminated by `\n`.
    pub fn write_to<W: Write>(
        &self,
        writer: &mut W,
    ) -> io::Result<()> {
        write!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t",
            self.seq_id,
            self.source,
            self.feature_type,
            self.start,
            self.end,
            self.score.unwrap_or("."),
            self.strand,
        )?;
        match self.frame {
            Some(frame) => write!(writer, "{}", frame)?,
            None => writer.write_all(b".")?,
        }
        if let Some(attributes) = self.attributes.as_ref() {
            writer.write_all(b"\t")?;
            writer.write_all(attributes.raw().as_bytes())?;
        }
        if let Some(extra) = self.raw_extra {
            writer.write_all(b"\t")?;
            writer.write_all(extra.as_bytes())?;
        }
        writer.write_all(b"\n")
    }
}

fn decimal_len(mut value: u64) -> usize {
    let mut len = 1;
    while value >= 10 {
        value /= 10;
        len += 1;
    }
    len
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structs::Dialect;
    use crate::io::parse::parse_line;

    #[test]
    fn test_decimal_len() {
        assert_eq!(decimal_len(0), 1);
        assert_eq!(decimal_len(9), 1);
        assert_eq!(decimal_len(10), 2);
        assert_eq!(decimal_len(2408530), 7);
        assert_eq!(decimal_len(u64::MAX), 20);
    }

    #[test]
    fn test_serialized_len_matches_output() {
        let lines = [
            "1\thavana\tCDS\t2408530\t2408619\t.\t-\t0\tgene_id \
             \"ENSG00000157911\"; transcript_id \"ENST00000508384\";",
            "chr1\t.\tgene\t1\t100\t0.93\t+\t.\tID=G1;Name=abc",
            "chr1\t.\tgene\t1\t100\t.\t?\t.",
            "chr1\t.\tgene\t1\t100\t.\t.\t.\tID=G1\textra1\textra2",
        ];
        for line in lines {
            let dialect = if line.contains("gene_id") {
                Dialect::Gtf
            }
            else {
                Dialect::Gff3
            };
            let record = parse_line(dialect, line, 1).unwrap();
            let mut out = Vec::new();
            record.write_to(&mut out).unwrap();

            assert_eq!(out.len(), record.serialized_len());
            assert_eq!(String::from_utf8(out).unwrap(), format!("{}\n", line));
        }
    }
}
