use std::collections::VecDeque;

use petgraph::graph::NodeIndex;

use crate::MoleculeGraph;

/// A fundamental cycle basis of the molecule graph.
///
/// Each ring is the closed path (without repeating the first atom) formed by
/// one non-tree edge of a breadth-first spanning forest. The number of rings
/// equals the cyclomatic number, which is also the SSSR size.
pub fn cycle_basis(graph: &MoleculeGraph) -> Vec<Vec<NodeIndex>> {
    let n = graph.node_count();
    let mut parent: Vec<Option<NodeIndex>> = vec![None; n];
    let mut depth: Vec<usize> = vec![0; n];
    let mut visited = vec![false; n];
    let mut rings = Vec::new();

    for root in graph.node_indices() {
        if visited[root.index()] {
            continue;
        }
        visited[root.index()] = true;
        let mut queue = VecDeque::from([root]);
        let mut non_tree_edges = Vec::new();

        while let Some(node) = queue.pop_front() {
            let mut neighbors: Vec<NodeIndex> = graph.neighbors(node).collect();
            neighbors.sort();
            for neighbor in neighbors {
                if !visited[neighbor.index()] {
                    visited[neighbor.index()] = true;
                    parent[neighbor.index()] = Some(node);
                    depth[neighbor.index()] = depth[node.index()] + 1;
                    queue.push_back(neighbor);
                } else if parent[node.index()] != Some(neighbor) && node < neighbor {
                    non_tree_edges.push((node, neighbor));
                }
            }
        }

        for (a, b) in non_tree_edges {
            rings.push(tree_cycle(&parent, &depth, a, b));
        }
    }
    rings
}

/// Close the cycle formed by the non-tree edge `a - b` through the tree.
fn tree_cycle(parent: &[Option<NodeIndex>], depth: &[usize], a: NodeIndex, b: NodeIndex) -> Vec<NodeIndex> {
    let mut left = vec![a];
    let mut right = vec![b];
    let (mut x, mut y) = (a, b);
    while x != y {
        if depth[x.index()] >= depth[y.index()] {
            match parent[x.index()] {
                Some(p) => {
                    x = p;
                    left.push(x);
                }
                None => break,
            }
        } else {
            match parent[y.index()] {
                Some(p) => {
                    y = p;
                    right.push(y);
                }
                None => break,
            }
        }
    }
    // Both paths end at the common ancestor; keep it once.
    right.pop();
    right.reverse();
    left.extend(right);
    left
}

/// Per-atom ring membership.
pub fn ring_atoms(graph: &MoleculeGraph) -> Vec<bool> {
    let mut in_ring = vec![false; graph.node_count()];
    for ring in cycle_basis(graph) {
        for atom in ring {
            in_ring[atom.index()] = true;
        }
    }
    in_ring
}

/// Number of independent rings (edges - nodes + components).
pub fn ring_count(graph: &MoleculeGraph) -> usize {
    let components = petgraph::algo::connected_components(graph);
    (graph.edge_count() + components).saturating_sub(graph.node_count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_smiles;

    #[test]
    fn test_acyclic_has_no_rings() {
        let molecule = parse_smiles("CCC(C)CO").unwrap();
        assert!(cycle_basis(&molecule).is_empty());
        assert_eq!(ring_count(&molecule), 0);
        assert!(ring_atoms(&molecule).iter().all(|&r| !r));
    }

    #[test]
    fn test_benzene_ring() {
        let molecule = parse_smiles("c1ccccc1").unwrap();
        let rings = cycle_basis(&molecule);
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0].len(), 6);
        assert_eq!(ring_count(&molecule), 1);
    }

    #[test]
    fn test_fused_and_substituted_rings() {
        let naphthalene = parse_smiles("c1ccc2ccccc2c1").unwrap();
        assert_eq!(ring_count(&naphthalene), 2);
        assert_eq!(cycle_basis(&naphthalene).len(), 2);

        let toluene = parse_smiles("Cc1ccccc1").unwrap();
        let in_ring = ring_atoms(&toluene);
        assert!(!in_ring[0]);
        assert!(in_ring[1..].iter().all(|&r| r));
    }

    #[test]
    fn test_ring_count_over_fragments() {
        let molecule = parse_smiles("C1CC1.C1CCC1").unwrap();
        assert_eq!(ring_count(&molecule), 2);
        assert_eq!(cycle_basis(&molecule).len(), 2);
    }
}
