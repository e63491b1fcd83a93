//! Feature hierarchy reconstruction and ranking.
//!
//! The forest is built in two passes so that children may appear before
//! their parents in the file: first every identity is registered, then every
//! parent reference is linked. Links that would close a cycle are cut, and
//! the remaining forest is traversed depth-first to produce the emission
//! order.

use std::cmp::Ordering;

use hashbrown::HashMap;
use log::debug;
use rayon::prelude::*;

use crate::data_structs::{
    Dialect,
    Record,
};

const GENE_FEATURE: &str = "gene";
const TRANSCRIPT_FEATURE: &str = "transcript";

/// Identity of a node in the hierarchy.
///
/// GTF genes and transcripts live in separate namespaces, so a gene and a
/// transcript sharing an identifier never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKey<'a> {
    /// GFF3 `ID`.
    Id(&'a str),
    /// GTF `gene_id` of a gene line.
    Gene(&'a str),
    /// GTF `transcript_id` of a transcript line.
    Transcript(&'a str),
}

impl<'a> NodeKey<'a> {
    /// Derives `(self_id, parent_id)` of a record.
    pub fn of_record(
        record: &Record<'a>,
        dialect: Dialect,
    ) -> (Option<Self>, Option<Self>) {
        let Some(attributes) = record.attributes()
        else {
            return (None, None);
        };
        match dialect {
            Dialect::Gff3 => {
                (
                    attributes.id().filter(|s| !s.is_empty()).map(NodeKey::Id),
                    attributes.first_parent().map(NodeKey::Id),
                )
            },
            Dialect::Gtf => {
                let gene = attributes
                    .gene_id()
                    .filter(|s| !s.is_empty())
                    .map(NodeKey::Gene);
                let transcript = attributes
                    .transcript_id()
                    .filter(|s| !s.is_empty())
                    .map(NodeKey::Transcript);
                match record.feature_type() {
                    GENE_FEATURE => (gene, None),
                    TRANSCRIPT_FEATURE => (transcript, gene),
                    _ => (None, transcript.or(gene)),
                }
            },
        }
    }
}

/// Resolved parent link of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    Root,
    Child(usize),
}

/// A record together with its place in the hierarchy. Children are owned
/// by the [`Forest`].
#[derive(Debug, Clone)]
pub struct HierarchyNode<'r, 'a> {
    record:    &'r Record<'a>,
    self_id:   Option<NodeKey<'a>>,
    parent_id: Option<NodeKey<'a>>,
    link:      Link,
}

impl<'r, 'a> HierarchyNode<'r, 'a> {
    pub fn record(&self) -> &'r Record<'a> { self.record }

    pub fn self_id(&self) -> Option<NodeKey<'a>> { self.self_id }

    pub fn parent_id(&self) -> Option<NodeKey<'a>> { self.parent_id }

    pub fn link(&self) -> Link { self.link }
}

/// Total-order key of an emitted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RankKey {
    /// Position of the record's root among all roots.
    pub root:     usize,
    /// Depth-first pre-order position inside the root's subtree.
    pub position: usize,
}

/// Counters describing how tolerant the hierarchy had to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ForestStats {
    pub roots:            usize,
    pub dangling_parents: usize,
    pub broken_cycles:    usize,
    pub duplicate_ids:    usize,
}

/// Emission order of a set of records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ranking {
    order: Vec<usize>,
    keys:  Vec<RankKey>,
    stats: ForestStats,
}

impl Ranking {
    /// Record indices in emission order.
    pub fn order(&self) -> &[usize] { &self.order }

    /// Rank key of each record, indexed like the input records.
    pub fn keys(&self) -> &[RankKey] { &self.keys }

    pub fn stats(&self) -> ForestStats { self.stats }

    pub fn len(&self) -> usize { self.order.len() }

    pub fn is_empty(&self) -> bool { self.order.is_empty() }
}

/// Working structure of the indexer: all nodes, the identity map and the
/// roots. Built fresh for each job.
pub struct Forest<'r, 'a> {
    nodes:    Vec<HierarchyNode<'r, 'a>>,
    id_map:   HashMap<NodeKey<'a>, usize>,
    children: Vec<Vec<usize>>,
    roots:    Vec<usize>,
    stats:    ForestStats,
}

impl<'r, 'a> Forest<'r, 'a> {
    /// Builds the forest over `records`, which must be in input order.
    ///
    /// Uses the current rayon pool for identity derivation and child
    /// sorting; the result does not depend on the pool size.
    pub fn build(
        records: &'r [Record<'a>],
        dialect: Dialect,
    ) -> Self {
        let mut nodes: Vec<HierarchyNode<'r, 'a>> = records
            .par_iter()
            .map(|record| {
                let (self_id, parent_id) = NodeKey::of_record(record, dialect);
                HierarchyNode {
                    record,
                    self_id,
                    parent_id,
                    link: Link::Root,
                }
            })
            .collect();

        let mut stats = ForestStats::default();

        // Pass 1: identities, first definition wins
        let mut id_map = HashMap::with_capacity(nodes.len());
        for (idx, node) in nodes.iter().enumerate() {
            if let Some(key) = node.self_id {
                if id_map.try_insert(key, idx).is_err() {
                    stats.duplicate_ids += 1;
                }
            }
        }

        // Pass 2: parent links
        for node in nodes.iter_mut() {
            if let Some(parent) = node.parent_id {
                match id_map.get(&parent) {
                    Some(&idx) => node.link = Link::Child(idx),
                    None => stats.dangling_parents += 1,
                }
            }
        }

        stats.broken_cycles = break_cycles(&mut nodes);

        let mut children = vec![Vec::new(); nodes.len()];
        let mut roots = Vec::new();
        for (idx, node) in nodes.iter().enumerate() {
            match node.link {
                Link::Root => roots.push(idx),
                Link::Child(parent) => children[parent].push(idx),
            }
        }
        stats.roots = roots.len();

        children.par_iter_mut().for_each(|siblings| {
            siblings.sort_unstable_by(|&a, &b| cmp_siblings(&records[a], &records[b]))
        });
        roots.par_sort_unstable_by(|&a, &b| cmp_roots(&records[a], &records[b]));

        debug!(
            "Built forest: {} nodes, {} roots, {} dangling parents, {} broken \
             cycles, {} duplicate ids",
            nodes.len(),
            stats.roots,
            stats.dangling_parents,
            stats.broken_cycles,
            stats.duplicate_ids
        );

        Self {
            nodes,
            id_map,
            children,
            roots,
            stats,
        }
    }

    pub fn len(&self) -> usize { self.nodes.len() }

    pub fn is_empty(&self) -> bool { self.nodes.is_empty() }

    pub fn node(
        &self,
        idx: usize,
    ) -> Option<&HierarchyNode<'r, 'a>> {
        self.nodes.get(idx)
    }

    /// Node that defined `key` first.
    pub fn lookup(
        &self,
        key: &NodeKey<'a>,
    ) -> Option<usize> {
        self.id_map.get(key).copied()
    }

    /// Children of a node in emission order.
    pub fn children(
        &self,
        idx: usize,
    ) -> &[usize] {
        &self.children[idx]
    }

    /// Roots in emission order.
    pub fn roots(&self) -> &[usize] { &self.roots }

    pub fn stats(&self) -> ForestStats { self.stats }

    /// Assigns rank keys by walking every root subtree in pre-order. The
    /// forest is consumed.
    pub fn rank(self) -> Ranking {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut keys = vec![RankKey::default(); self.nodes.len()];
        let mut stack = Vec::new();

        for (root_rank, &root) in self.roots.iter().enumerate() {
            let mut position = 0;
            stack.push(root);
            while let Some(idx) = stack.pop() {
                order.push(idx);
                keys[idx] = RankKey {
                    root: root_rank,
                    position,
                };
                position += 1;
                stack.extend(self.children[idx].iter().rev());
            }
        }

        debug_assert_eq!(order.len(), self.nodes.len());
        Ranking {
            order,
            keys,
            stats: self.stats,
        }
    }
}

/// Cuts every link that would close a cycle, turning the offending node
/// into a root. Returns the number of cuts.
fn break_cycles(nodes: &mut [HierarchyNode]) -> usize {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Visit {
        New,
        OnPath,
        Done,
    }

    let mut state = vec![Visit::New; nodes.len()];
    let mut path = Vec::new();
    let mut cuts = 0;

    for start in 0..nodes.len() {
        if state[start] != Visit::New {
            continue;
        }
        let mut current = start;
        loop {
            state[current] = Visit::OnPath;
            path.push(current);
            match nodes[current].link {
                Link::Root => break,
                Link::Child(parent) => {
                    match state[parent] {
                        Visit::New => current = parent,
                        Visit::OnPath => {
                            nodes[current].link = Link::Root;
                            cuts += 1;
                            break;
                        },
                        Visit::Done => break,
                    }
                },
            }
        }
        for idx in path.drain(..) {
            state[idx] = Visit::Done;
        }
    }

    cuts
}

fn cmp_siblings(
    a: &Record,
    b: &Record,
) -> Ordering {
    a.start()
        .cmp(&b.start())
        .then(a.line_no().cmp(&b.line_no()))
}

/// Natural order of sequence names (`chr2` before `chr10`), then start,
/// then line number.
fn cmp_roots(
    a: &Record,
    b: &Record,
) -> Ordering {
    natord::compare(a.seq_id(), b.seq_id())
        .then_with(|| a.seq_id().cmp(b.seq_id()))
        .then(a.start().cmp(&b.start()))
        .then(a.line_no().cmp(&b.line_no()))
}
