//! BK-tree over edit distance.
//!
//! Nodes live in an arena and node 0 is the root. Each child edge is keyed
//! by its distance to the parent term, so a search only descends into
//! children whose edge lies within `[d - max, d + max]`.
//!
//! # Binary layout
//!
//! All integers are little-endian `u32`.
//!
//! ```text
//! magic      "BKTREE1\0"
//! count      number of nodes
//! per node:  term_len, term bytes (UTF-8), child_count,
//!            child_count x (distance, child_index)
//! ```

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use memmap2::Mmap;

use super::{edit_distance, sort_matches, EngineError, IndexEngine, Match};

const MAGIC: &[u8; 8] = b"BKTREE1\0";
const HEADER_LEN: usize = MAGIC.len() + 4;

#[derive(Debug, Clone)]
struct Node {
    term: String,
    children: Vec<(u32, u32)>,
}

impl Node {
    fn new(term: &str) -> Self {
        Self { term: term.to_string(), children: Vec::new() }
    }
}

/// Arena-backed BK-tree.
#[derive(Debug, Clone, Default)]
pub struct BkTree {
    nodes: Vec<Node>,
}

impl BkTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from an iterator of terms.
    pub fn from_terms<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tree = Self::new();
        for term in terms {
            tree.insert(term.as_ref());
        }
        tree
    }

    fn push_node(&mut self, term: &str) -> u32 {
        let index = self.nodes.len() as u32;
        self.nodes.push(Node::new(term));
        index
    }

    fn decode(bytes: &[u8]) -> Result<Self, EngineError> {
        if bytes.len() < HEADER_LEN || &bytes[..MAGIC.len()] != MAGIC {
            return Err(EngineError::InvalidFormat("invalid file header".into()));
        }
        let mut cursor = Cursor { bytes, pos: MAGIC.len() };
        let count = cursor.read_u32("node count")? as usize;

        // Every node needs at least 8 bytes, so a count beyond that is lying.
        if count > bytes.len() / 8 {
            return Err(EngineError::InvalidFormat(format!(
                "node count {} exceeds blob size {}",
                count,
                bytes.len()
            )));
        }

        let mut nodes = Vec::with_capacity(count);
        let mut parents = vec![0u32; count];
        for _ in 0..count {
            let term_len = cursor.read_u32("term length")? as usize;
            let raw = cursor.take(term_len, "term data")?;
            let term = std::str::from_utf8(raw)
                .map_err(|e| EngineError::InvalidFormat(format!("term is not UTF-8: {}", e)))?
                .to_string();

            let child_count = cursor.read_u32("child count")? as usize;
            let mut children = Vec::with_capacity(child_count.min(count));
            for _ in 0..child_count {
                let distance = cursor.read_u32("child distance")?;
                let child = cursor.read_u32("child index")?;
                let slot = parents.get_mut(child as usize).ok_or_else(|| {
                    EngineError::InvalidFormat(format!("child index {} out of range", child))
                })?;
                *slot += 1;
                children.push((distance, child));
            }
            nodes.push(Node { term, children });
        }

        if cursor.pos != bytes.len() {
            return Err(EngineError::InvalidFormat(format!(
                "{} trailing bytes after last node",
                bytes.len() - cursor.pos
            )));
        }
        // Root has no parent and every other node exactly one, so the part
        // reachable from the root is a tree.
        if let Some((index, _)) = parents
            .iter()
            .enumerate()
            .find(|&(i, &p)| if i == 0 { p != 0 } else { p != 1 })
        {
            return Err(EngineError::InvalidFormat(format!(
                "node {} is not referenced exactly once",
                index
            )));
        }

        Ok(Self { nodes })
    }
}

impl IndexEngine for BkTree {
    fn insert(&mut self, term: &str) {
        if self.nodes.is_empty() {
            self.push_node(term);
            return;
        }

        let mut current = 0usize;
        loop {
            let distance = edit_distance(&self.nodes[current].term, term);
            if distance == 0 {
                return;
            }
            let next = self.nodes[current]
                .children
                .iter()
                .find(|(d, _)| *d == distance)
                .map(|&(_, child)| child);
            match next {
                Some(child) => current = child as usize,
                None => {
                    let child = self.push_node(term);
                    self.nodes[current].children.push((distance, child));
                    return;
                }
            }
        }
    }

    fn search(&self, query: &str, max_distance: u32) -> Vec<Match> {
        let mut matches = Vec::new();
        if self.nodes.is_empty() {
            return matches;
        }

        let mut stack = vec![0u32];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index as usize];
            let distance = edit_distance(&node.term, query);
            if distance <= max_distance {
                matches.push(Match::new(node.term.clone(), distance));
            }
            let low = distance.saturating_sub(max_distance);
            let high = distance.saturating_add(max_distance);
            stack.extend(
                node.children
                    .iter()
                    .filter(|(d, _)| (low..=high).contains(d))
                    .map(|&(_, child)| child),
            );
        }

        sort_matches(&mut matches);
        matches
    }

    fn save(&self, path: &Path) -> Result<(), EngineError> {
        let count = encode_len(self.nodes.len(), "node count")?;
        let mut out = BufWriter::new(File::create(path)?);
        out.write_all(MAGIC)?;
        out.write_all(&count.to_le_bytes())?;

        for node in &self.nodes {
            let term_len = encode_len(node.term.len(), "term length")?;
            out.write_all(&term_len.to_le_bytes())?;
            out.write_all(node.term.as_bytes())?;

            let child_count = encode_len(node.children.len(), "child count")?;
            out.write_all(&child_count.to_le_bytes())?;
            for &(distance, child) in &node.children {
                out.write_all(&distance.to_le_bytes())?;
                out.write_all(&child.to_le_bytes())?;
            }
        }

        out.flush()?;
        Ok(())
    }

    fn restore(path: &Path) -> Result<Self, EngineError> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        if (len as usize) < HEADER_LEN {
            return Err(EngineError::InvalidFormat(format!(
                "blob is {} bytes, shorter than the header",
                len
            )));
        }
        // SAFETY: the blob is a private scratch file opened read-only and is
        // not modified while mapped; the mapping is dropped before returning.
        let mmap = unsafe { Mmap::map(&file)? };
        Self::decode(&mmap)
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }
}

fn encode_len(value: usize, what: &str) -> Result<u32, EngineError> {
    u32::try_from(value).map_err(|_| EngineError::TooLarge(format!("{} {}", what, value)))
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8], EngineError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| EngineError::InvalidFormat(format!("failed to read {}", what)))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u32(&mut self, what: &str) -> Result<u32, EngineError> {
        let raw = self.take(4, what)?;
        Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }
}
