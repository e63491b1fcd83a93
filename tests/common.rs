#![allow(dead_code)]

use annotsort::prelude::*;
use rand::seq::SliceRandom;
use rand::{
    Rng,
    SeedableRng,
};
use rand_chacha::ChaCha8Rng;

/// Generates a GFF3 or GTF annotation with genes on several sequences,
/// transcripts and exons, emitted in a scrambled (but fixed) order.
pub struct DemoAnnotationBuilder {
    dialect:   Dialect,
    n_seqs:    usize,
    n_genes:   usize,
    n_tx:      usize,
    n_exons:   usize,
    seed:      u64,
}

impl DemoAnnotationBuilder {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            n_seqs: 3,
            n_genes: 10,
            n_tx: 2,
            n_exons: 3,
            seed: 42,
        }
    }

    pub fn with_genes(
        mut self,
        n_genes: usize,
    ) -> Self {
        self.n_genes = n_genes;
        self
    }

    pub fn with_seed(
        mut self,
        seed: u64,
    ) -> Self {
        self.seed = seed;
        self
    }

    fn line(
        &self,
        seq: &str,
        feature: &str,
        start: u64,
        end: u64,
        attributes: String,
    ) -> String {
        format!(
            "{}\tdemo\t{}\t{}\t{}\t.\t+\t.\t{}",
            seq, feature, start, end, attributes
        )
    }

    /// Lines of the annotation, without a header.
    pub fn lines(&self) -> Vec<String> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut lines = Vec::new();
        for g in 0..self.n_genes {
            let seq = format!("chr{}", rng.gen_range(1..=self.n_seqs));
            let start = rng.gen_range(1..=100_000u64);
            let end = start + 5_000;
            let gene = format!("gene{}", g);
            lines.push(match self.dialect {
                Dialect::Gff3 => self.line(&seq, "gene", start, end, format!("ID={}", gene)),
                Dialect::Gtf => {
                    self.line(
                        &seq,
                        "gene",
                        start,
                        end,
                        format!("gene_id \"{}\";", gene),
                    )
                },
            });
            for t in 0..self.n_tx {
                let tx = format!("{}.t{}", gene, t);
                let tx_start = start + rng.gen_range(0..1_000u64);
                lines.push(match self.dialect {
                    Dialect::Gff3 => {
                        self.line(
                            &seq,
                            "mRNA",
                            tx_start,
                            end,
                            format!("ID={};Parent={}", tx, gene),
                        )
                    },
                    Dialect::Gtf => {
                        self.line(
                            &seq,
                            "transcript",
                            tx_start,
                            end,
                            format!("gene_id \"{}\"; transcript_id \"{}\";", gene, tx),
                        )
                    },
                });
                for _ in 0..self.n_exons {
                    let exon_start = tx_start + rng.gen_range(0..3_000u64);
                    lines.push(match self.dialect {
                        Dialect::Gff3 => {
                            self.line(
                                &seq,
                                "exon",
                                exon_start,
                                exon_start + 100,
                                format!("Parent={}", tx),
                            )
                        },
                        Dialect::Gtf => {
                            self.line(
                                &seq,
                                "exon",
                                exon_start,
                                exon_start + 100,
                                format!(
                                    "gene_id \"{}\"; transcript_id \"{}\";",
                                    gene, tx
                                ),
                            )
                        },
                    });
                }
            }
        }

        // Children often end up before their parents
        lines.shuffle(&mut rng);
        lines
    }

    pub fn build(&self) -> String {
        let mut text = match self.dialect {
            Dialect::Gff3 => "##gff-version 3\n".to_string(),
            Dialect::Gtf => "#!genome-build demo\n".to_string(),
        };
        for line in self.lines() {
            text += &line;
            text += "\n";
        }
        text
    }
}

/// Sorts `text` into a string using small chunks so that every stage
/// actually splits its work.
pub fn sort_text(
    dialect: Dialect,
    text: &str,
    threads: usize,
) -> annotsort::errors::Result<String> {
    let mut out = Vec::new();
    SortJob::new(threads)
        .with_min_chunk_size(64)
        .with_segment_size(256)
        .with_stream_chunk_size(1000)
        .run_string(dialect, text, |chunk| {
            out.extend_from_slice(chunk);
            Ok(())
        })?;
    Ok(String::from_utf8(out).expect("output is UTF-8"))
}

/// `(seq_id, feature, start, attributes)` of an output line.
pub fn fields(line: &str) -> (&str, &str, u64, &str) {
    let cols: Vec<&str> = line.split('\t').collect();
    (cols[0], cols[2], cols[3].parse().unwrap(), cols[8])
}
