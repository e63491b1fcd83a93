use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;

use crate::errors::SortError;

/// Text dialect of an annotation file.
#[derive(Eq, Hash, PartialEq, Copy, Clone, Debug, PartialOrd, Ord)]
pub enum Dialect {
    /// GTF (GTF2.2 / GTF2.5): `key "value";` attributes.
    Gtf,
    /// GFF3: `key=value` attributes. Plain `gff` is treated as GFF3.
    Gff3,
}

impl Dialect {
    /// Infers the dialect from a file extension (`gtf`, `gff`, `gff3`).
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, SortError> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| {
                SortError::InvalidInput(format!(
                    "file {:?} has no GTF/GFF3 extension",
                    path
                ))
            })?;
        ext.parse().map_err(|_| {
            SortError::InvalidInput(format!(
                "file {:?} is not a GTF or GFF3 file, please specify the \
                 correct format",
                path
            ))
        })
    }
}

impl FromStr for Dialect {
    type Err = SortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gtf" => Ok(Dialect::Gtf),
            "gff" | "gff3" => Ok(Dialect::Gff3),
            other => {
                Err(SortError::InvalidParameter(format!(
                    "unsupported dialect '{}', expected gtf, gff or gff3",
                    other
                )))
            },
        }
    }
}

impl Display for Dialect {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Dialect::Gtf => write!(f, "GTF"),
            Dialect::Gff3 => write!(f, "GFF3"),
        }
    }
}

impl Serialize for Dialect {
    fn serialize<S>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer, {
        serializer.serialize_str(&self.to_string())
    }
}

#[derive(Eq, Hash, PartialEq, Copy, Clone, Debug, PartialOrd, Ord)]
pub enum Strand {
    /// Forward strand.
    Forward,
    /// Reverse strand.
    Reverse,
    /// Not stranded.
    None,
    /// Stranded, but the strand is unknown.
    Unknown,
}

impl Strand {
    /// Parses the strand column. Anything other than `+ - . ?` is rejected.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "+" => Some(Strand::Forward),
            "-" => Some(Strand::Reverse),
            "." => Some(Strand::None),
            "?" => Some(Strand::Unknown),
            _ => None,
        }
    }
}

impl From<Strand> for char {
    fn from(value: Strand) -> Self {
        match value {
            Strand::Forward => '+',
            Strand::Reverse => '-',
            Strand::None => '.',
            Strand::Unknown => '?',
        }
    }
}

impl Display for Strand {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{}", char::from(*self))
    }
}

/// Reading frame of a CDS feature.
#[derive(Eq, Hash, PartialEq, Copy, Clone, Debug, PartialOrd, Ord)]
pub enum Phase {
    Zero,
    One,
    Two,
}

impl Phase {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "0" => Some(Phase::Zero),
            "1" => Some(Phase::One),
            "2" => Some(Phase::Two),
            _ => None,
        }
    }
}

impl From<Phase> for u8 {
    fn from(value: Phase) -> Self {
        match value {
            Phase::Zero => 0,
            Phase::One => 1,
            Phase::Two => 2,
        }
    }
}

impl Display for Phase {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}
