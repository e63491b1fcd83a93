use std::cmp::Ordering;

use annotsort::prelude::*;
use proptest::prelude::*;

mod common;
use common::{
    fields,
    sort_text,
    DemoAnnotationBuilder,
};

fn dialect_strategy() -> impl Strategy<Value = Dialect> {
    prop_oneof![Just(Dialect::Gtf), Just(Dialect::Gff3)]
}

/// GFF3 text of `n` genes whose `Parent` points anywhere: at another node,
/// at itself, or at an ID that never appears.
fn tangled_gff3(links: &[(u64, Option<usize>)]) -> String {
    links
        .iter()
        .enumerate()
        .map(|(i, (start, parent))| {
            let parent = match parent {
                Some(p) => format!(";Parent=n{}", p),
                None => String::new(),
            };
            format!(
                "chr{}\t.\tgene\t{}\t{}\t.\t+\t.\tID=n{}{}\n",
                i % 2 + 1,
                start,
                start + 10,
                i,
                parent
            )
        })
        .collect()
}

fn gtf_value<'a>(
    attributes: &'a str,
    key: &str,
) -> Option<&'a str> {
    attributes.split(';').find_map(|pair| {
        let (k, v) = pair.trim().split_once(' ')?;
        (k == key).then(|| v.trim_matches('"'))
    })
}

/// `(own id, parent id)` of a generated gene, transcript or exon line.
fn links<'a>(
    dialect: Dialect,
    feature: &str,
    attributes: &'a str,
) -> (Option<&'a str>, Option<&'a str>) {
    match dialect {
        Dialect::Gff3 => {
            let value = |key: &str| {
                attributes
                    .split(';')
                    .find_map(|pair| pair.strip_prefix(key)?.strip_prefix('='))
            };
            (value("ID"), value("Parent"))
        },
        Dialect::Gtf => {
            match feature {
                "gene" => (gtf_value(attributes, "gene_id"), None),
                "transcript" => {
                    (
                        gtf_value(attributes, "transcript_id"),
                        gtf_value(attributes, "gene_id"),
                    )
                },
                _ => (None, gtf_value(attributes, "transcript_id")),
            }
        },
    }
}

fn sorted_lines(text: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = text
        .lines()
        .filter(|l| !l.starts_with('#') && !l.is_empty())
        .collect();
    lines.sort_unstable();
    lines
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_output_independent_of_threads(
        dialect in dialect_strategy(),
        n_genes in 0usize..40,
        seed in any::<u64>(),
    ) {
        let text = DemoAnnotationBuilder::new(dialect)
            .with_genes(n_genes)
            .with_seed(seed)
            .build();
        let reference = sort_text(dialect, &text, 1).unwrap();
        for threads in [2, 3, 8] {
            prop_assert_eq!(&sort_text(dialect, &text, threads).unwrap(), &reference);
        }
    }

    #[test]
    fn prop_output_is_permutation_of_records(
        dialect in dialect_strategy(),
        n_genes in 0usize..30,
        seed in any::<u64>(),
    ) {
        let text = DemoAnnotationBuilder::new(dialect)
            .with_genes(n_genes)
            .with_seed(seed)
            .build();
        let output = sort_text(dialect, &text, 4).unwrap();
        prop_assert_eq!(sorted_lines(&output), sorted_lines(&text));
    }

    #[test]
    fn prop_children_follow_parents_in_start_order(
        dialect in dialect_strategy(),
        n_genes in 1usize..30,
        seed in any::<u64>(),
    ) {
        let text = DemoAnnotationBuilder::new(dialect)
            .with_genes(n_genes)
            .with_seed(seed)
            .build();
        let output = sort_text(dialect, &text, 3).unwrap();

        let mut last_root: Option<(String, u64)> = None;
        let mut gene: Option<String> = None;
        let mut transcript: Option<String> = None;
        let mut last_tx_start = 0;
        let mut last_exon_start = 0;
        for line in output.lines().filter(|l| !l.starts_with('#')) {
            let (seq, feature, start, attributes) = fields(line);
            let (id, parent) = links(dialect, feature, attributes);
            match feature {
                "gene" => {
                    prop_assert_eq!(parent, None);
                    if let Some((last_seq, last_start)) = &last_root {
                        let order = natord::compare(last_seq, seq)
                            .then(last_start.cmp(&start));
                        prop_assert_ne!(order, Ordering::Greater);
                    }
                    last_root = Some((seq.to_string(), start));
                    gene = id.map(str::to_string);
                    transcript = None;
                    last_tx_start = 0;
                },
                "mRNA" | "transcript" => {
                    prop_assert_eq!(parent, gene.as_deref());
                    prop_assert!(start >= last_tx_start);
                    last_tx_start = start;
                    transcript = id.map(str::to_string);
                    last_exon_start = 0;
                },
                _ => {
                    prop_assert_eq!(parent, transcript.as_deref());
                    prop_assert!(start >= last_exon_start);
                    last_exon_start = start;
                },
            }
        }
        prop_assert!(last_root.is_some());
    }

    #[test]
    fn prop_tangled_parents_never_fail(
        links in prop::collection::vec(
            (1u64..1000, prop::option::of(0usize..25)),
            0..20,
        ),
    ) {
        let text = tangled_gff3(&links);
        let output = sort_text(Dialect::Gff3, &text, 2).unwrap();
        prop_assert_eq!(sorted_lines(&output), sorted_lines(&text));
        prop_assert_eq!(&sort_text(Dialect::Gff3, &text, 5).unwrap(), &output);
    }
}
