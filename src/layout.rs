use std::collections::{HashSet, VecDeque};
use std::f64::consts::TAU;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use petgraph::algo::min_spanning_tree;
use petgraph::data::Element as GraphElement;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::unionfind::UnionFind;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{DataError, LshForest, TreemapError};

/// Node coordinates plus the spanning tree edges `s[i] -> t[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub x: Vec<f32>,
    pub y: Vec<f32>,
    pub s: Vec<u32>,
    pub t: Vec<u32>,
}

impl Layout {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.s.len()
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), TreemapError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(TreemapError::io(path))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush().map_err(TreemapError::io(path))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, TreemapError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(TreemapError::io(path))?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

/// Parameters of the k-nearest-neighbour graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutConfig {
    /// Neighbours queried per node.
    pub k: usize,
    /// Candidate multiplier for each query.
    pub kc: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self { k: 10, kc: 10 }
    }
}

/// Lay out the minimum spanning tree of the forest's kNN graph.
pub fn layout_from_lsh_forest(forest: &LshForest, config: &LayoutConfig) -> Result<Layout, TreemapError> {
    let n = forest.size();
    if n == 0 {
        return Err(DataError::EmptyLibrary.into());
    }
    if !forest.is_indexed() {
        return Err(TreemapError::Index("the forest must be indexed before layout".to_string()));
    }
    if n == 1 {
        return Ok(Layout {
            x: vec![0.0],
            y: vec![0.0],
            s: Vec::new(),
            t: Vec::new(),
        });
    }

    let mut graph: UnGraph<(), f32> = UnGraph::with_capacity(n, n * config.k);
    for _ in 0..n {
        graph.add_node(());
    }
    let mut seen: HashSet<(u32, u32)> = HashSet::new();
    let mut add_edge = |graph: &mut UnGraph<(), f32>, a: u32, b: u32, weight: f32| {
        if a != b && seen.insert((a.min(b), a.max(b))) {
            graph.add_edge(NodeIndex::new(a as usize), NodeIndex::new(b as usize), weight);
        }
    };

    for id in 0..n as u32 {
        for (distance, neighbor) in forest.query_by_id(id, config.k, config.kc)? {
            add_edge(&mut graph, id, neighbor, distance);
        }
    }
    debug!("kNN graph: {} nodes, {} edges", n, graph.edge_count());

    // Join disconnected components until one remains.
    loop {
        let mut components = UnionFind::<usize>::new(n);
        for edge in graph.raw_edges() {
            components.union(edge.source().index(), edge.target().index());
        }
        let labels = components.into_labeling();
        let mut firsts: Vec<usize> = Vec::new();
        let mut labels_seen = HashSet::new();
        for (node, &label) in labels.iter().enumerate() {
            if labels_seen.insert(label) {
                firsts.push(node);
            }
        }
        if firsts.len() <= 1 {
            break;
        }
        debug!("joining {} kNN graph components", firsts.len());

        for first in firsts {
            let label = labels[first];
            let mut closest: Option<(f32, u32)> = None;
            for other in 0..n {
                if labels[other] == label {
                    continue;
                }
                let distance = forest.distance_by_id(first as u32, other as u32)?;
                if closest.map_or(true, |(best, _)| distance < best) {
                    closest = Some((distance, other as u32));
                }
            }
            if let Some((distance, other)) = closest {
                add_edge(&mut graph, first as u32, other, distance);
            }
        }
    }

    let mut tree: Vec<Vec<(usize, f32)>> = vec![Vec::new(); n];
    for element in min_spanning_tree(&graph) {
        if let GraphElement::Edge { source, target, weight, .. } = element {
            tree[source].push((target, weight));
            tree[target].push((source, weight));
        }
    }

    let layout = radial_layout(&tree);
    info!("laid out {} nodes with {} tree edges", layout.len(), layout.edge_count());
    Ok(layout)
}

/// Breadth-first order from `root` and each node's parent.
fn bfs(tree: &[Vec<(usize, f32)>], root: usize) -> (Vec<usize>, Vec<Option<usize>>) {
    let mut order = Vec::with_capacity(tree.len());
    let mut parent = vec![None; tree.len()];
    let mut visited = vec![false; tree.len()];
    visited[root] = true;
    let mut queue = VecDeque::from([root]);
    while let Some(node) = queue.pop_front() {
        order.push(node);
        let mut children: Vec<usize> = tree[node].iter().map(|&(child, _)| child).collect();
        children.sort_unstable();
        for child in children {
            if !visited[child] {
                visited[child] = true;
                parent[child] = Some(node);
                queue.push_back(child);
            }
        }
    }
    (order, parent)
}

/// Root the tree at its centre: the middle of a longest path.
fn tree_center(tree: &[Vec<(usize, f32)>]) -> usize {
    let (order, _) = bfs(tree, 0);
    let far = order.last().copied().unwrap_or(0);
    let (order, parent) = bfs(tree, far);
    let mut path = vec![order.last().copied().unwrap_or(far)];
    while let Some(next) = path.last().and_then(|&node| parent[node]) {
        path.push(next);
    }
    path[path.len() / 2]
}

/// Radial tree drawing: every subtree gets an angular wedge proportional to
/// its number of leaves, and children sit further out than their parent by
/// `0.5 + weight`. Coordinates are normalized to `[-0.5, 0.5]`.
fn radial_layout(tree: &[Vec<(usize, f32)>]) -> Layout {
    let n = tree.len();
    let root = tree_center(tree);
    let (order, parent) = bfs(tree, root);

    let mut leaves = vec![0usize; n];
    for &node in order.iter().rev() {
        if leaves[node] == 0 {
            leaves[node] = 1;
        }
        if let Some(up) = parent[node] {
            leaves[up] += leaves[node];
        }
    }

    let mut radius = vec![0f64; n];
    let mut wedge = vec![(0f64, TAU); n];
    let mut x = vec![0f64; n];
    let mut y = vec![0f64; n];
    let mut s = Vec::with_capacity(n.saturating_sub(1));
    let mut t = Vec::with_capacity(n.saturating_sub(1));

    for &node in &order {
        let (start, end) = wedge[node];
        let mut children: Vec<(usize, f32)> = tree[node]
            .iter()
            .copied()
            .filter(|&(child, _)| parent[child] == Some(node))
            .collect();
        children.sort_by_key(|&(child, _)| child);
        let total: usize = children.iter().map(|&(child, _)| leaves[child]).sum();

        let mut cursor = start;
        for (child, weight) in children {
            let span = (end - start) * leaves[child] as f64 / total.max(1) as f64;
            wedge[child] = (cursor, cursor + span);
            let angle = cursor + span / 2.0;
            cursor += span;

            radius[child] = radius[node] + 0.5 + weight as f64;
            x[child] = radius[child] * angle.cos();
            y[child] = radius[child] * angle.sin();
            s.push(node as u32);
            t.push(child as u32);
        }
    }

    let extent = x.iter().chain(&y).fold(0f64, |acc, &v| acc.max(v.abs()));
    let scale = if extent > 0.0 { 0.5 / extent } else { 1.0 };
    Layout {
        x: x.iter().map(|&v| (v * scale) as f32).collect(),
        y: y.iter().map(|&v| (v * scale) as f32).collect(),
        s,
        t,
    }
}
