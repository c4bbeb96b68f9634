use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use lazy_static::lazy_static;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use sha2::{Digest, Sha256};

use crate::{cycle_basis, parse_smiles, MinHash, MoleculeGraph, SmilesError};

/// Seed of the MHFP permutations, fixed so fingerprints are comparable
/// across runs.
pub const MHFP_SEED: u64 = 42;
/// Largest environment radius in the shingling (diameter 6).
pub const MHFP_RADIUS: usize = 3;

lazy_static! {
    static ref ENCODERS: RwLock<HashMap<usize, Arc<MhfpEncoder>>> = RwLock::new(HashMap::new());
}

/// Encodes molecules as MinHash vectors over their molecular shingling.
#[derive(Debug, Clone)]
pub struct MhfpEncoder {
    minhash: MinHash,
    radius: usize,
    rings: bool,
}

impl MhfpEncoder {
    pub fn new(dimension: usize, seed: u64) -> Self {
        Self {
            minhash: MinHash::new(dimension, seed),
            radius: MHFP_RADIUS,
            rings: true,
        }
    }

    /// The shared encoder for `dimension` with the default seed.
    ///
    /// Drawing the permutations is linear in the dimension, so encoders are
    /// created once per dimension and reused.
    pub fn cached(dimension: usize) -> Arc<Self> {
        if let Some(encoder) = ENCODERS
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&dimension)
        {
            return encoder.clone();
        }

        let mut encoders = ENCODERS.write().unwrap_or_else(PoisonError::into_inner);
        encoders
            .entry(dimension)
            .or_insert_with(|| Arc::new(Self::new(dimension, MHFP_SEED)))
            .clone()
    }

    pub fn dimension(&self) -> usize {
        self.minhash.dimension()
    }

    /// The set of substructure strings describing `graph`: every atom's
    /// environment at radius `0..=radius`, plus every ring.
    pub fn shingling(&self, graph: &MoleculeGraph) -> BTreeSet<String> {
        let mut shingles = BTreeSet::new();
        for node in graph.node_indices() {
            for radius in 0..=self.radius {
                shingles.insert(environment(graph, node, None, radius));
            }
        }
        if self.rings {
            for ring in cycle_basis(graph) {
                shingles.insert(ring_string(graph, &ring));
            }
        }
        shingles
    }

    pub fn encode_graph(&self, graph: &MoleculeGraph) -> Vec<u32> {
        let shingles = self.shingling(graph);
        self.minhash.from_hashes(shingles.iter().map(|shingle| shingle_hash(shingle)))
    }

    pub fn encode(&self, smiles: &str) -> Result<Vec<u32>, SmilesError> {
        Ok(self.encode_graph(&parse_smiles(smiles)?))
    }
}

/// First four bytes (little-endian) of the SHA-256 digest.
pub fn shingle_hash(shingle: &str) -> u32 {
    let digest = Sha256::digest(shingle.as_bytes());
    u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// Canonical string of the environment of `node` up to `radius` bonds,
/// written as a rooted tree with branches sorted.
fn environment(graph: &MoleculeGraph, node: NodeIndex, parent: Option<NodeIndex>, radius: usize) -> String {
    let token = graph[node].smiles_token();
    if radius == 0 {
        return token;
    }

    let mut branches: Vec<String> = graph
        .edges(node)
        .filter_map(|edge| {
            let neighbor = if edge.source() == node { edge.target() } else { edge.source() };
            if Some(neighbor) == parent {
                return None;
            }
            Some(format!(
                "{}{}",
                edge.weight().smiles_symbol(),
                environment(graph, neighbor, Some(node), radius - 1)
            ))
        })
        .collect();
    if branches.is_empty() {
        return token;
    }
    branches.sort();

    let mut out = token;
    for branch in branches {
        out.push('(');
        out.push_str(&branch);
        out.push(')');
    }
    out
}

/// The lexicographically smallest walk around the ring, over all starting
/// atoms and both directions.
fn ring_string(graph: &MoleculeGraph, ring: &[NodeIndex]) -> String {
    let n = ring.len();
    let mut best: Option<String> = None;
    for reversed in [false, true] {
        for start in 0..n {
            let mut walk = String::new();
            for step in 0..n {
                let (i, j) = if reversed {
                    ((start + n - step) % n, (start + 2 * n - step - 1) % n)
                } else {
                    ((start + step) % n, (start + step + 1) % n)
                };
                walk.push_str(&graph[ring[i]].smiles_token());
                if let Some(edge) = graph.find_edge(ring[i], ring[j]) {
                    walk.push_str(graph[edge].smiles_symbol());
                }
            }
            if best.as_ref().map_or(true, |current| walk < *current) {
                best = Some(walk);
            }
        }
    }
    best.unwrap_or_default()
}
