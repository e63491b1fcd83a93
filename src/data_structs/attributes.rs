use std::fmt;

use itertools::Either;

use crate::data_structs::Dialect;

pub const GTF_GENE_ID: &str = "gene_id";
pub const GTF_TRANSCRIPT_ID: &str = "transcript_id";
pub const GFF_ID: &str = "ID";
pub const GFF_PARENT: &str = "Parent";

/// Decoded ninth column of a record.
///
/// Pairs are kept in file order, repeated keys included (GTF `tag` is
/// commonly repeated). The raw column text is retained so the record can be
/// written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attributes<'a> {
    dialect: Dialect,
    raw:     &'a str,
    pairs:   Vec<(&'a str, &'a str)>,
}

impl<'a> Attributes<'a> {
    /// Decodes an attribute column in the given dialect. On failure the
    /// returned string describes the problem.
    pub fn parse(
        dialect: Dialect,
        raw: &'a str,
    ) -> Result<Self, String> {
        let pairs = if raw.trim() == "." {
            Vec::new()
        }
        else {
            match dialect {
                Dialect::Gtf => parse_gtf_pairs(raw)?,
                Dialect::Gff3 => parse_gff3_pairs(raw)?,
            }
        };
        Ok(Self {
            dialect,
            raw,
            pairs,
        })
    }

    pub fn dialect(&self) -> Dialect { self.dialect }

    pub fn raw(&self) -> &'a str { self.raw }

    pub fn len(&self) -> usize { self.pairs.len() }

    pub fn is_empty(&self) -> bool { self.pairs.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a str)> + '_ {
        self.pairs.iter().copied()
    }

    /// First value stored under `key`.
    pub fn get(
        &self,
        key: &str,
    ) -> Option<&'a str> {
        self.pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
    }

    /// Every value stored under `key`. GFF3 multi-values (`Parent=A,B`) are
    /// split on commas; GTF values are returned as written.
    pub fn get_all<'s>(
        &'s self,
        key: &'s str,
    ) -> impl Iterator<Item = &'a str> + 's {
        let dialect = self.dialect;
        self.pairs
            .iter()
            .filter(move |(k, _)| *k == key)
            .flat_map(move |&(_, v)| {
                match dialect {
                    Dialect::Gff3 => Either::Left(v.split(',')),
                    Dialect::Gtf => Either::Right(std::iter::once(v)),
                }
            })
    }

    pub fn gene_id(&self) -> Option<&'a str> { self.get(GTF_GENE_ID) }

    pub fn transcript_id(&self) -> Option<&'a str> {
        self.get(GTF_TRANSCRIPT_ID)
    }

    pub fn id(&self) -> Option<&'a str> { self.get(GFF_ID) }

    /// First listed parent. Additional parents are ignored for ranking.
    pub fn first_parent(&self) -> Option<&'a str> {
        self.get(GFF_PARENT)
            .and_then(|v| v.split(',').next())
            .filter(|v| !v.is_empty())
    }
}

impl fmt::Display for Attributes<'_> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// `key "value"; key value;` with `;` allowed inside quotes.
fn parse_gtf_pairs(raw: &str) -> Result<Vec<(&str, &str)>, String> {
    let bytes = raw.as_bytes();
    let mut pairs = Vec::new();
    let mut pos = 0;

    let skip_ws = |mut p: usize| {
        while p < bytes.len() && bytes[p].is_ascii_whitespace() {
            p += 1;
        }
        p
    };

    loop {
        while pos < bytes.len()
            && (bytes[pos].is_ascii_whitespace() || bytes[pos] == b';')
        {
            pos += 1;
        }
        if pos >= bytes.len() {
            break;
        }

        let key_start = pos;
        while pos < bytes.len()
            && !bytes[pos].is_ascii_whitespace()
            && bytes[pos] != b';'
        {
            pos += 1;
        }
        let key = &raw[key_start..pos];

        pos = skip_ws(pos);
        if pos >= bytes.len() || bytes[pos] == b';' {
            return Err(format!("attribute '{}' has no value", key));
        }

        if bytes[pos] == b'"' {
            let value_start = pos + 1;
            let close = raw[value_start..]
                .find('"')
                .ok_or_else(|| {
                    format!("unterminated quote in attribute '{}'", key)
                })?;
            pairs.push((key, &raw[value_start..value_start + close]));
            pos = value_start + close + 1;
        }
        else {
            let value_start = pos;
            while pos < bytes.len() && bytes[pos] != b';' {
                pos += 1;
            }
            pairs.push((key, raw[value_start..pos].trim_end()));
        }
    }

    Ok(pairs)
}

/// `key=value;key=v1,v2`
fn parse_gff3_pairs(raw: &str) -> Result<Vec<(&str, &str)>, String> {
    let mut pairs = Vec::new();
    for pair in raw.split(';') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("attribute '{}' is missing '='", pair))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("attribute '{}' has an empty key", pair));
        }
        pairs.push((key, value.trim()));
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gtf_attributes() {
        let raw = "gene_id \"ENSG00000290825.1\"; transcript_id \
                   \"ENST00000456328.2\"; exon_number 2; tag \"basic\"; tag \
                   \"Ensembl_canonical\";";
        let attrs = Attributes::parse(Dialect::Gtf, raw).unwrap();

        assert_eq!(attrs.gene_id(), Some("ENSG00000290825.1"));
        assert_eq!(attrs.transcript_id(), Some("ENST00000456328.2"));
        assert_eq!(attrs.get("exon_number"), Some("2"));
        assert_eq!(
            attrs.get_all("tag").collect::<Vec<_>>(),
            vec!["basic", "Ensembl_canonical"]
        );
        assert_eq!(attrs.len(), 5);
        assert_eq!(attrs.to_string(), raw);
    }

    #[test]
    fn test_gtf_semicolon_inside_quotes() {
        let attrs = Attributes::parse(
            Dialect::Gtf,
            "gene_id \"G1\"; note \"a; b\";",
        )
        .unwrap();
        assert_eq!(attrs.get("note"), Some("a; b"));
    }

    #[test]
    fn test_gtf_unterminated_quote() {
        let err = Attributes::parse(Dialect::Gtf, "gene_id \"G1;").unwrap_err();
        assert!(err.contains("unterminated quote"));
    }

    #[test]
    fn test_gtf_missing_value() {
        let err = Attributes::parse(Dialect::Gtf, "gene_id;").unwrap_err();
        assert!(err.contains("no value"));
    }

    #[test]
    fn test_gff3_attributes() {
        let raw = "ID=ENST00000450305.2;Parent=ENSG1,ENSG2;tag=basic,\
                   Ensembl_canonical;";
        let attrs = Attributes::parse(Dialect::Gff3, raw).unwrap();

        assert_eq!(attrs.id(), Some("ENST00000450305.2"));
        assert_eq!(attrs.first_parent(), Some("ENSG1"));
        assert_eq!(
            attrs.get_all("Parent").collect::<Vec<_>>(),
            vec!["ENSG1", "ENSG2"]
        );
        assert_eq!(attrs.len(), 3);
    }

    #[test]
    fn test_gff3_missing_equals() {
        let err = Attributes::parse(Dialect::Gff3, "ID=G1;broken").unwrap_err();
        assert!(err.contains("missing '='"));
    }

    #[test]
    fn test_dot_is_empty() {
        assert!(Attributes::parse(Dialect::Gff3, ".").unwrap().is_empty());
        assert!(Attributes::parse(Dialect::Gtf, ".").unwrap().is_empty());
    }
}
