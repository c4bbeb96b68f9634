use crate::{morgan_identifiers, MoleculeGraph};

/// Fold every circular identifier up to `radius` into a bit vector of
/// `dimension` positions (one byte per bit).
pub fn ecfp_bits(graph: &MoleculeGraph, radius: usize, dimension: usize) -> Vec<u8> {
    let mut bits = vec![0u8; dimension];
    if dimension == 0 {
        return bits;
    }
    for round in morgan_identifiers(graph, radius) {
        for (node, identifier) in graph.node_indices().zip(round) {
            if graph[node].is_hydrogen() {
                continue;
            }
            bits[(identifier % dimension as u64) as usize] = 1;
        }
    }
    bits
}
