//! MPQ adaptive Huffman decoding
//!
//! Sectors tagged 0x01, and the 0x41/0x81 audio sectors in front of their
//! ADPCM stage, hold a Huffman coded bit stream. The first byte of the stream
//! selects one of the weight tables in [`crate::tables::HUFFMAN_WEIGHTS`],
//! which seeds the tree. Two symbols sit outside the byte range:
//!
//! - `0x100` ends the stream
//! - `0x101` is followed by 8 raw bits holding a byte that is not in the
//!   tree yet; the lowest-weight leaf is split to make room for it
//!
//! Every tree change keeps the nodes ordered by weight (the sibling
//! property), so encoder and decoder stay in lockstep. Table 0 is fully
//! adaptive and bumps the weight of every decoded symbol.

use crate::bits::BitStream;
use crate::tables::HUFFMAN_WEIGHTS;
use crate::{MpqError, Result};
use std::io::Read;

/// Symbol that terminates the stream
pub const SYMBOL_END_OF_STREAM: u16 = 0x100;

/// Symbol announcing a byte sent as 8 raw bits
pub const SYMBOL_NEW_LITERAL: u16 = 0x101;

/// Number of seed weight tables
pub const WEIGHT_TABLE_COUNT: usize = HUFFMAN_WEIGHTS.len();

#[derive(Debug, Clone)]
struct Node {
    value: u16,
    weight: u32,
    parent: Option<usize>,
    /// Bit 0 child, bit 1 child
    children: Option<[usize; 2]>,
}

/// Huffman tree with nodes kept in weight order
///
/// `order` lists node indices by descending weight, root first. The two
/// children of a node are always adjacent in it, the bit 1 child first.
#[derive(Debug, Clone)]
struct HuffmanTree {
    nodes: Vec<Node>,
    order: Vec<usize>,
    position: Vec<usize>,
}

impl HuffmanTree {
    /// Seed a tree from a weight table
    fn new(weights: &[u8; 256]) -> Self {
        let mut tree = Self {
            nodes: Vec::with_capacity(2 * 258),
            order: Vec::with_capacity(2 * 258),
            position: Vec::new(),
        };

        let end = tree.add_node(SYMBOL_END_OF_STREAM, 1, None);
        tree.insert_by_weight(end);
        let escape = tree.add_node(SYMBOL_NEW_LITERAL, 1, None);
        tree.insert_by_weight(escape);
        for (value, &weight) in weights.iter().enumerate() {
            if weight != 0 {
                let leaf = tree.add_node(value as u16, u32::from(weight), None);
                tree.insert_by_weight(leaf);
            }
        }

        // Pair nodes from the light end upwards; each new parent is filed by
        // weight ahead of the pair it joins
        let mut cursor = tree.order.len() - 1;
        while cursor > 0 {
            let child0 = tree.order[cursor];
            let child1 = tree.order[cursor - 1];
            let weight = tree.nodes[child0].weight + tree.nodes[child1].weight;
            let parent = tree.add_node(0, weight, Some([child0, child1]));
            tree.nodes[child0].parent = Some(parent);
            tree.nodes[child1].parent = Some(parent);
            tree.insert_by_weight(parent);
            cursor -= 1;
        }

        tree.position = vec![0; tree.nodes.len()];
        for (position, &node) in tree.order.iter().enumerate() {
            tree.position[node] = position;
        }
        tree
    }

    fn add_node(&mut self, value: u16, weight: u32, children: Option<[usize; 2]>) -> usize {
        self.nodes.push(Node {
            value,
            weight,
            parent: None,
            children,
        });
        self.nodes.len() - 1
    }

    /// File a node after every node at least as heavy
    fn insert_by_weight(&mut self, node: usize) {
        let weight = self.nodes[node].weight;
        let at = self
            .order
            .partition_point(|&other| self.nodes[other].weight >= weight);
        self.order.insert(at, node);
    }

    fn root(&self) -> usize {
        self.order[0]
    }

    /// Walk from the root to a leaf, one input bit per level
    fn decode<R: Read>(&self, bits: &mut BitStream<R>) -> Result<usize> {
        let mut node = self.root();
        while let Some(children) = self.nodes[node].children {
            let bit = bits.read_bits(1)?.ok_or_else(|| {
                MpqError::CorruptStream("huffman stream ends without an end code".to_string())
            })?;
            node = children[bit as usize];
        }
        Ok(node)
    }

    /// Add one to the weight of `node` and its ancestors, swapping nodes
    /// forward wherever the order would break
    fn increment(&mut self, mut node: usize) {
        loop {
            self.nodes[node].weight += 1;
            let weight = self.nodes[node].weight;
            let position = self.position[node];

            if position > 0 {
                // The root never moves
                let target = 1 + self.order[1..position]
                    .partition_point(|&other| self.nodes[other].weight >= weight);
                if target < position {
                    let other = self.order[target];
                    self.swap(node, other);
                }
            }

            match self.nodes[node].parent {
                Some(parent) => node = parent,
                None => break,
            }
        }
    }

    /// Exchange two nodes' places in both the order and the tree
    fn swap(&mut self, a: usize, b: usize) {
        let (position_a, position_b) = (self.position[a], self.position[b]);
        self.order.swap(position_a, position_b);
        self.position[a] = position_b;
        self.position[b] = position_a;

        let parent_a = self.nodes[a].parent;
        let parent_b = self.nodes[b].parent;
        if parent_a == parent_b {
            if let Some(children) = parent_a.and_then(|p| self.nodes[p].children.as_mut()) {
                children.swap(0, 1);
            }
        } else {
            self.replace_child(parent_a, a, b);
            self.replace_child(parent_b, b, a);
        }
        self.nodes[a].parent = parent_b;
        self.nodes[b].parent = parent_a;
    }

    fn replace_child(&mut self, parent: Option<usize>, old: usize, new: usize) {
        if let Some(children) = parent.and_then(|p| self.nodes[p].children.as_mut()) {
            for child in children.iter_mut() {
                if *child == old {
                    *child = new;
                }
            }
        }
    }

    /// Split the lightest leaf into itself and a zero-weight leaf for `value`
    fn insert_literal(&mut self, value: u8) -> usize {
        let last = self.order[self.order.len() - 1];
        let (value_last, weight) = (self.nodes[last].value, self.nodes[last].weight);
        let moved = self.add_node(value_last, weight, None);
        let fresh = self.add_node(u16::from(value), 0, None);
        self.nodes[moved].parent = Some(last);
        self.nodes[fresh].parent = Some(last);
        self.nodes[last].children = Some([fresh, moved]);

        for node in [moved, fresh] {
            self.position.push(self.order.len());
            self.order.push(node);
        }
        self.increment(fresh);
        fresh
    }
}

/// Decompress a Huffman stream, weight table byte included
///
/// Output ends at the end-of-stream symbol. Running out of input before it
/// is an error.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let (&table, payload) = data
        .split_first()
        .ok_or_else(|| MpqError::short_read(1, 0))?;
    let weights = HUFFMAN_WEIGHTS.get(table as usize).ok_or_else(|| {
        MpqError::CorruptStream(format!("unknown huffman weight table {}", table))
    })?;

    let adaptive = table == 0;
    let mut tree = HuffmanTree::new(weights);
    let mut bits = BitStream::new(payload);
    let mut output = Vec::with_capacity(payload.len() * 2);

    loop {
        let leaf = tree.decode(&mut bits)?;
        let leaf = match tree.nodes[leaf].value {
            SYMBOL_END_OF_STREAM => break,
            SYMBOL_NEW_LITERAL => {
                let byte = bits.read_bits(8)?.ok_or_else(|| {
                    MpqError::CorruptStream("huffman stream ends inside a new literal".to_string())
                })? as u8;
                let fresh = tree.insert_literal(byte);
                if !adaptive {
                    tree.increment(fresh);
                }
                output.push(byte);
                fresh
            }
            value => {
                output.push(value as u8);
                leaf
            }
        };
        if adaptive {
            tree.increment(leaf);
        }
    }

    log::trace!(
        "huffman table {}: {} -> {} bytes",
        table,
        data.len(),
        output.len()
    );
    Ok(output)
}
