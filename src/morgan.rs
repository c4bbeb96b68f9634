use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;

use crate::{ring_atoms, Bond, MoleculeGraph};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// A small, stable hasher (FNV-1a over little-endian words).
///
/// `DefaultHasher` is not guaranteed to be stable between Rust releases, and
/// identifiers end up in persisted fingerprints.
#[derive(Debug, Clone, Copy)]
pub struct StableHasher(u64);

impl StableHasher {
    pub fn new() -> Self {
        Self(FNV_OFFSET)
    }

    pub fn write_u64(&mut self, value: u64) {
        for byte in value.to_le_bytes() {
            self.0 ^= byte as u64;
            self.0 = self.0.wrapping_mul(FNV_PRIME);
        }
    }

    pub fn finish(&self) -> u64 {
        self.0
    }
}

impl Default for StableHasher {
    fn default() -> Self {
        Self::new()
    }
}

fn bond_code(bond: &Bond) -> u64 {
    match bond {
        Bond::Single => 1,
        Bond::Double => 2,
        Bond::Triple => 3,
        Bond::Aromatic => 4,
    }
}

/// Initial atom labels in the style of ECFP atom invariants: atomic number,
/// heavy-atom degree, total hydrogens, formal charge, ring membership and
/// aromaticity.
pub fn atom_invariants(graph: &MoleculeGraph) -> Vec<u64> {
    let in_ring = ring_atoms(graph);
    graph
        .node_indices()
        .map(|node| {
            let atom = &graph[node];
            let heavy_degree = graph.neighbors(node).filter(|&n| !graph[n].is_hydrogen()).count();
            let explicit_h = graph.neighbors(node).filter(|&n| graph[n].is_hydrogen()).count();
            let mut hasher = StableHasher::new();
            hasher.write_u64(atom.element.atomic_number() as u64);
            hasher.write_u64(heavy_degree as u64);
            hasher.write_u64(atom.hydrogens as u64 + explicit_h as u64);
            hasher.write_u64(atom.charge as i64 as u64);
            hasher.write_u64(in_ring[node.index()] as u64);
            hasher.write_u64(atom.aromatic as u64);
            hasher.finish()
        })
        .collect()
}

/// Iterated Morgan relabelling.
///
/// Returns one label vector per iteration, starting with the atom
/// invariants at index 0. At iteration `r` an atom's label describes its
/// circular environment of radius `r`: the previous label hashed together
/// with the sorted `(bond, neighbour label)` pairs.
pub fn morgan_identifiers(graph: &MoleculeGraph, radius: usize) -> Vec<Vec<u64>> {
    let mut rounds = Vec::with_capacity(radius + 1);
    let mut labels = atom_invariants(graph);

    for iteration in 1..=radius {
        let updated: Vec<u64> = graph
            .node_indices()
            .map(|node| {
                let mut neighbor_labels: Vec<(u64, u64)> = graph
                    .edges(node)
                    .filter(|edge| !graph[other_end(edge.source(), edge.target(), node)].is_hydrogen())
                    .map(|edge| {
                        let neighbor = other_end(edge.source(), edge.target(), node);
                        (bond_code(edge.weight()), labels[neighbor.index()])
                    })
                    .collect();
                neighbor_labels.sort();

                let mut hasher = StableHasher::new();
                hasher.write_u64(iteration as u64);
                hasher.write_u64(labels[node.index()]);
                for (bond, label) in neighbor_labels {
                    hasher.write_u64(bond);
                    hasher.write_u64(label);
                }
                hasher.finish()
            })
            .collect();
        rounds.push(std::mem::replace(&mut labels, updated));
    }
    rounds.push(labels);
    rounds
}

fn other_end(source: NodeIndex, target: NodeIndex, node: NodeIndex) -> NodeIndex {
    if source == node {
        target
    } else {
        source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_smiles;

    #[test]
    fn test_identifiers_per_round() {
        let molecule = parse_smiles("CCO").unwrap();
        let rounds = morgan_identifiers(&molecule, 2);
        assert_eq!(rounds.len(), 3);
        for round in &rounds {
            assert_eq!(round.len(), 3);
        }
        // Both carbons look alike at radius 0 only if their degree matches,
        // which it does not here (CH3 vs CH2).
        assert_ne!(rounds[0][0], rounds[0][1]);
    }

    #[test]
    fn test_symmetric_atoms_share_labels() {
        let molecule = parse_smiles("c1ccccc1").unwrap();
        let rounds = morgan_identifiers(&molecule, 3);
        for round in rounds {
            assert!(round.iter().all(|&label| label == round[0]));
        }
    }

    #[test]
    fn test_labels_ignore_atom_order() {
        let a = parse_smiles("OCC").unwrap();
        let b = parse_smiles("CCO").unwrap();
        let mut labels_a = morgan_identifiers(&a, 2).concat();
        let mut labels_b = morgan_identifiers(&b, 2).concat();
        labels_a.sort();
        labels_b.sort();
        assert_eq!(labels_a, labels_b);
    }

    #[test]
    fn test_stable_hasher_is_deterministic() {
        let mut a = StableHasher::new();
        let mut b = StableHasher::default();
        a.write_u64(42);
        b.write_u64(42);
        assert_eq!(a.finish(), b.finish());
        b.write_u64(1);
        assert_ne!(a.finish(), b.finish());
    }
}
