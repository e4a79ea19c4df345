/*
    Newick trees: parsing, writing, patristic distances and relabelling
        tree     = subtree ';'
        subtree  = '(' children ')' label | label
        children = subtree (',' subtree)*
        label    = name? (':' length)?

    Parsing and writing walk the tree with explicit stacks, nesting depth is only
    bounded by memory
*/

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use flate2::read::GzDecoder;
use log::{debug, info, warn};
use super::accession::truncate_accession;
use super::distance_matrix::DistanceMatrix;
use super::error::{MatrixError, Result};

pub type NodeId = usize;

#[derive(Debug, Clone)]
pub struct Node {
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub name: Option<String>,
    pub branch_length: Option<f64>,
}

// Arena-backed rooted tree. Pruned nodes stay in the arena but are
// unreachable from the root.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Tree {
    pub fn parse(input: &str) -> Result<Tree> {
        let mut parser = Parser { input: input.as_bytes(), pos: 0, nodes: Vec::new() };
        let root = parser.parse_tree()?;
        Ok(Tree { nodes: parser.nodes, root })
    }

    // .gz files are decompressed on the fly
    pub fn read(path: &Path) -> Result<Tree> {
        let mut text = String::new();
        let file = File::open(path)?;
        if path.extension().map_or(false, |ext| ext == "gz") {
            GzDecoder::new(file).read_to_string(&mut text)?;
        } else {
            let mut file = file;
            file.read_to_string(&mut text)?;
        }
        let tree = Tree::parse(&text)?;
        debug!("Read tree with {} leaves from {:?}", tree.leaves().len(), path);
        Ok(tree)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, format!("{}\n", self.to_newick()))?;
        info!("Wrote tree to {:?}", path);
        Ok(())
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    // reachable nodes in preorder
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.nodes[id].children.iter().rev());
        }
        order
    }

    pub fn leaves(&self) -> Vec<NodeId> {
        self.preorder().into_iter().filter(|&id| self.nodes[id].children.is_empty()).collect()
    }

    pub fn leaf_names(&self) -> Vec<String> {
        self.leaves().into_iter()
            .map(|id| self.nodes[id].name.clone().unwrap_or_default())
            .collect()
    }

    pub fn to_newick(&self) -> String {
        let mut buf = String::new();
        let mut steps = vec![WriteStep::Open(self.root)];
        while let Some(step) = steps.pop() {
            match step {
                WriteStep::Open(id) if self.nodes[id].children.is_empty() => self.write_label(id, &mut buf),
                WriteStep::Open(id) => {
                    buf.push('(');
                    steps.push(WriteStep::Close(id));
                    for (i, &child) in self.nodes[id].children.iter().enumerate().rev() {
                        steps.push(WriteStep::Open(child));
                        if i > 0 {
                            steps.push(WriteStep::Comma);
                        }
                    }
                }
                WriteStep::Comma => buf.push(','),
                WriteStep::Close(id) => {
                    buf.push(')');
                    self.write_label(id, &mut buf);
                }
            }
        }
        buf.push(';');
        buf
    }

    fn write_label(&self, id: NodeId, buf: &mut String) {
        let node = &self.nodes[id];
        if let Some(name) = &node.name {
            buf.push_str(name);
        }
        if let Some(length) = node.branch_length {
            buf.push(':');
            buf.push_str(&length.to_string());
        }
    }

    // distance from the root and depth in edges for every reachable node
    fn root_distances(&self) -> HashMap<NodeId, (f64, usize)> {
        let mut distances = HashMap::new();
        for id in self.preorder() {
            let node = &self.nodes[id];
            let entry = match node.parent {
                Some(parent) if id != self.root => {
                    let (d, depth) = distances[&parent];
                    (d + node.branch_length.unwrap_or(0.0), depth + 1)
                }
                _ => (0.0, 0),
            };
            distances.insert(id, entry);
        }
        distances
    }

    fn mrca(&self, mut a: NodeId, mut b: NodeId, depths: &HashMap<NodeId, (f64, usize)>) -> NodeId {
        while depths[&a].1 > depths[&b].1 {
            a = self.nodes[a].parent.unwrap_or(self.root);
        }
        while depths[&b].1 > depths[&a].1 {
            b = self.nodes[b].parent.unwrap_or(self.root);
        }
        while a != b {
            a = self.nodes[a].parent.unwrap_or(self.root);
            b = self.nodes[b].parent.unwrap_or(self.root);
        }
        a
    }

    // pairwise leaf-to-leaf path lengths, missing branch lengths count as 0
    pub fn patristic_matrix(&self) -> DistanceMatrix {
        let leaves = self.leaves();
        let distances = self.root_distances();
        let mut matrix = DistanceMatrix::zeros(self.leaf_names());
        for i in 0..leaves.len() {
            for j in 0..i {
                let ancestor = self.mrca(leaves[i], leaves[j], &distances);
                let d = distances[&leaves[i]].0 + distances[&leaves[j]].0 - 2.0 * distances[&ancestor].0;
                matrix.set_symmetric(i, j, d);
            }
        }
        info!("Calculated distances between {} leaves", leaves.len());
        matrix
    }

    pub fn truncate_names(&mut self) {
        for node in self.nodes.iter_mut() {
            if let Some(name) = node.name.as_mut() {
                let key = truncate_accession(name).to_string();
                *name = key;
            }
        }
    }

    // A parent left with a single child is spliced out and its branch length
    // is added to that child's.
    pub fn prune_leaf(&mut self, name: &str) -> Result<()> {
        let leaf = self.leaves().into_iter()
            .find(|&id| self.nodes[id].name.as_deref() == Some(name))
            .ok_or_else(|| MatrixError::Newick(format!("leaf {} not found", name)))?;
        let parent = self.nodes[leaf].parent
            .ok_or_else(|| MatrixError::Newick(format!("cannot prune {}: it is the whole tree", name)))?;
        self.nodes[parent].children.retain(|&c| c != leaf);
        self.nodes[leaf].parent = None;

        if self.nodes[parent].children.len() == 1 {
            let child = self.nodes[parent].children[0];
            let parent_length = self.nodes[parent].branch_length;
            match self.nodes[parent].parent {
                Some(grandparent) => {
                    let slot = self.nodes[grandparent].children.iter()
                        .position(|&c| c == parent)
                        .ok_or_else(|| MatrixError::Newick("corrupt tree".into()))?;
                    self.nodes[grandparent].children[slot] = child;
                    self.nodes[child].parent = Some(grandparent);
                    self.nodes[child].branch_length = match (self.nodes[child].branch_length, parent_length) {
                        (None, None) => None,
                        (a, b) => Some(a.unwrap_or(0.0) + b.unwrap_or(0.0)),
                    };
                }
                None => {
                    // parent was the root
                    self.nodes[child].parent = None;
                    self.root = child;
                }
            }
            self.nodes[parent].children.clear();
        }
        debug!("Pruned {}", name);
        Ok(())
    }

    // returns the names absent from the tree
    pub fn prune_leaves<S: AsRef<str>>(&mut self, names: &[S]) -> Vec<String> {
        let mut absent = Vec::new();
        for name in names {
            if let Err(e) = self.prune_leaf(name.as_ref()) {
                warn!("{}", e);
                absent.push(name.as_ref().to_string());
            }
        }
        absent
    }
}

enum WriteStep {
    Open(NodeId),
    Comma,
    Close(NodeId),
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
    nodes: Vec<Node>,
}

impl<'a> Parser<'a> {
    fn new_node(&mut self, parent: Option<NodeId>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node { parent, children: Vec::new(), name: None, branch_length: None });
        if let Some(parent) = parent {
            self.nodes[parent].children.push(id);
        }
        id
    }

    // `open` holds the internal nodes whose ')' has not been read yet
    fn parse_tree(&mut self) -> Result<NodeId> {
        let mut open: Vec<NodeId> = Vec::new();
        loop {
            self.skip_whitespace();
            while self.peek() == Some(b'(') {
                let id = self.new_node(open.last().copied());
                open.push(id);
                self.pos += 1;
                self.skip_whitespace();
            }
            let leaf = self.new_node(open.last().copied());
            self.parse_label(leaf)?;
            loop {
                self.skip_whitespace();
                match self.peek() {
                    Some(b',') if !open.is_empty() => {
                        self.pos += 1;
                        break;
                    }
                    Some(b')') => {
                        let id = open.pop()
                            .ok_or_else(|| MatrixError::Newick(format!("unbalanced ')' at byte {}", self.pos)))?;
                        self.pos += 1;
                        self.parse_label(id)?;
                    }
                    // the first node created is the root
                    Some(b';') if open.is_empty() => return Ok(0),
                    _ if open.is_empty() => return Err(MatrixError::Newick("expected ';' at end of tree".into())),
                    _ => return Err(MatrixError::Newick(format!("expected ',' or ')' at byte {}", self.pos))),
                }
            }
        }
    }

    fn parse_label(&mut self, id: NodeId) -> Result<()> {
        self.skip_whitespace();
        let start = self.pos;
        while let Some(c) = self.peek() {
            match c {
                b':' | b',' | b')' | b'(' | b';' | b' ' | b'\t' | b'\n' | b'\r' => break,
                _ => self.pos += 1,
            }
        }
        if self.pos > start {
            self.nodes[id].name = Some(String::from_utf8_lossy(&self.input[start..self.pos]).into_owned());
        }
        self.skip_whitespace();
        if self.peek() == Some(b':') {
            self.pos += 1;
            self.skip_whitespace();
            let start = self.pos;
            while let Some(b'0'..=b'9' | b'.' | b'-' | b'+' | b'e' | b'E') = self.peek() {
                self.pos += 1;
            }
            let text = String::from_utf8_lossy(&self.input[start..self.pos]);
            let length = text.parse::<f64>()
                .map_err(|_| MatrixError::Newick(format!("invalid branch length '{}'", text)))?;
            self.nodes[id].branch_length = Some(length);
        }
        Ok(())
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(b' ' | b'\t' | b'\n' | b'\r') = self.peek() {
            self.pos += 1;
        }
    }
}
