use std::cmp::Ordering;
use std::collections::BTreeSet;

use tracing::debug;

use crate::{MinHash, TreemapError};

/// Approximate nearest-neighbour index over MinHash vectors.
///
/// The vector is split into `trees` equal-width slices; each tree keeps the
/// stored vectors sorted by their slice, so vectors sharing a long slice
/// prefix with a query sit next to each other. Candidates are collected from
/// every tree by decreasing prefix length and then ranked by the estimated
/// Jaccard distance.
///
/// Usage is two-phase: [`add`](Self::add) / [`batch_add`](Self::batch_add),
/// then [`index`](Self::index), then queries.
#[derive(Debug, Clone)]
pub struct LshForest {
    dimension: usize,
    trees: usize,
    data: Vec<Vec<u32>>,
    sorted: Vec<Vec<u32>>,
    indexed: bool,
}

impl LshForest {
    pub fn new(dimension: usize, trees: usize) -> Result<Self, TreemapError> {
        if trees == 0 || dimension < trees {
            return Err(TreemapError::Index(format!(
                "cannot split dimension {dimension} across {trees} trees"
            )));
        }
        Ok(Self {
            dimension,
            trees,
            data: Vec::new(),
            sorted: Vec::new(),
            indexed: false,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn trees(&self) -> usize {
        self.trees
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    fn width(&self) -> usize {
        self.dimension / self.trees
    }

    fn key(&self, tree: usize, id: u32) -> &[u32] {
        let width = self.width();
        &self.data[id as usize][tree * width..(tree + 1) * width]
    }

    fn check_dimension(&self, vector: &[u32]) -> Result<(), TreemapError> {
        if vector.len() != self.dimension {
            return Err(TreemapError::Index(format!(
                "vector has dimension {}, forest expects {}",
                vector.len(),
                self.dimension
            )));
        }
        Ok(())
    }

    pub fn add(&mut self, vector: Vec<u32>) -> Result<u32, TreemapError> {
        if self.indexed {
            return Err(TreemapError::Index("cannot add to an indexed forest".to_string()));
        }
        self.check_dimension(&vector)?;
        self.data.push(vector);
        Ok((self.data.len() - 1) as u32)
    }

    pub fn batch_add(&mut self, vectors: Vec<Vec<u32>>) -> Result<(), TreemapError> {
        for vector in vectors {
            self.add(vector)?;
        }
        Ok(())
    }

    /// Sort every tree. Queries are only valid after this.
    pub fn index(&mut self) {
        let ids: Vec<u32> = (0..self.data.len() as u32).collect();
        let mut sorted = Vec::with_capacity(self.trees);
        for tree in 0..self.trees {
            let mut order = ids.clone();
            order.sort_by(|&a, &b| self.key(tree, a).cmp(self.key(tree, b)).then(a.cmp(&b)));
            sorted.push(order);
        }
        self.sorted = sorted;
        self.indexed = true;
        debug!("indexed {} vectors in {} trees", self.data.len(), self.trees);
    }

    fn check_indexed(&self) -> Result<(), TreemapError> {
        if !self.indexed {
            return Err(TreemapError::Index("the forest must be indexed before it is queried".to_string()));
        }
        Ok(())
    }

    /// Ids whose tree keys share the longest possible prefix with `vector`,
    /// stopping once at least `wanted` have been found.
    fn candidates(&self, vector: &[u32], wanted: usize) -> BTreeSet<u32> {
        let width = self.width();
        let mut found = BTreeSet::new();
        for prefix in (1..=width).rev() {
            for (tree, order) in self.sorted.iter().enumerate() {
                let query = &vector[tree * width..tree * width + prefix];
                let lower = order.partition_point(|&id| &self.key(tree, id)[..prefix] < query);
                let upper = order.partition_point(|&id| &self.key(tree, id)[..prefix] <= query);
                found.extend(&order[lower..upper]);
            }
            if found.len() >= wanted {
                break;
            }
        }
        found
    }

    fn rank(&self, vector: &[u32], candidates: impl IntoIterator<Item = u32>, k: usize) -> Vec<(f32, u32)> {
        let mut ranked: Vec<(f32, u32)> = candidates
            .into_iter()
            .map(|id| (MinHash::distance(vector, &self.data[id as usize]), id))
            .collect();
        ranked.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal).then(a.1.cmp(&b.1)));
        ranked.truncate(k);
        ranked
    }

    /// The `k` nearest stored vectors as `(distance, id)`, closest first.
    /// `kc` scales how many candidates (`k * kc`) are gathered before ranking.
    pub fn query(&self, vector: &[u32], k: usize, kc: usize) -> Result<Vec<(f32, u32)>, TreemapError> {
        self.check_indexed()?;
        self.check_dimension(vector)?;
        let candidates = self.candidates(vector, k.saturating_mul(kc).max(1));
        Ok(self.rank(vector, candidates, k))
    }

    /// Like [`query`](Self::query) for a stored vector, leaving the vector
    /// itself out of the result.
    pub fn query_by_id(&self, id: u32, k: usize, kc: usize) -> Result<Vec<(f32, u32)>, TreemapError> {
        self.check_indexed()?;
        let vector = self.vector(id)?;
        let candidates = self.candidates(vector, k.saturating_mul(kc).max(1) + 1);
        Ok(self.rank(vector, candidates.into_iter().filter(|&other| other != id), k))
    }

    /// Exact MinHash distance between every stored vector and `vector`,
    /// closest first.
    pub fn linear_scan(&self, vector: &[u32], k: usize) -> Result<Vec<(f32, u32)>, TreemapError> {
        self.check_dimension(vector)?;
        Ok(self.rank(vector, 0..self.data.len() as u32, k))
    }

    pub fn vector(&self, id: u32) -> Result<&[u32], TreemapError> {
        self.data
            .get(id as usize)
            .map(Vec::as_slice)
            .ok_or_else(|| TreemapError::Index(format!("no vector with id {id}")))
    }

    pub fn distance_by_id(&self, a: u32, b: u32) -> Result<f32, TreemapError> {
        Ok(MinHash::distance(self.vector(a)?, self.vector(b)?))
    }
}
