use std::collections::BTreeMap;

use petgraph::algo::maximum_matching;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use thiserror::Error;

use crate::{parse_bracket_atom, Atom, Bond, Bond::*, Element, MoleculeGraph};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SmilesError {
    #[error("empty SMILES string")]
    Empty,
    #[error("unexpected character '{0}' at position {1}")]
    UnexpectedCharacter(char, usize),
    #[error("unknown element symbol '{0}'")]
    UnknownElement(String),
    #[error("branch start '(' at position {0} without a current atom")]
    BranchNoCurrentAtom(usize),
    #[error("branch end ')' at position {0} without a matching '('")]
    BranchEndNoStart(usize),
    #[error("branch opened at position {0} is never closed")]
    UnclosedBranch(usize),
    #[error("ring closure {0} at position {1} without a current atom")]
    RingClosureNoCurrentAtom(u8, usize),
    #[error("ring closure {0} at position {1} bonds an atom to itself or to a neighbour")]
    InvalidRingClosure(u8, usize),
    #[error("ring closure {0} is opened but never closed")]
    UnclosedRing(u8),
    #[error("bond at position {0} is not between two atoms")]
    DanglingBond(usize),
    #[error("unclosed bracket '[' at position {0}")]
    UnclosedBracket(usize),
    #[error("malformed bracket atom '[{0}]'")]
    MalformedBracket(String),
    #[error("atom {atom} has valence {valence}, more than its element allows")]
    Valence { atom: usize, valence: u32 },
    #[error("aromatic atom {0} has no partner in a Kekulé structure")]
    Kekulize(usize),
}

/// Parses a SMILES string into a MoleculeGraph.
///
/// Supports the organic subset, aromatic atoms, bracket atoms, explicit
/// bonds, branches, ring closures (`1`, `%12`) and `.` separated fragments.
/// Stereo markers are accepted and ignored. Implicit hydrogens are filled in
/// from default valences once the graph is complete, and structures with an
/// impossible valence or aromatic system are rejected.
pub fn parse_smiles(smiles: &str) -> Result<MoleculeGraph, SmilesError> {
    let smiles = smiles.trim();
    if smiles.is_empty() {
        return Err(SmilesError::Empty);
    }

    let mut graph = MoleculeGraph::default();
    let mut current_atom: Option<NodeIndex> = None;
    // Explicit bond waiting for the next atom, with its position for errors.
    let mut pending_bond: Option<(Bond, usize)> = None;
    let mut branch_stack: Vec<(NodeIndex, usize)> = Vec::new();
    let mut ring_map: BTreeMap<u8, (NodeIndex, Option<Bond>)> = BTreeMap::new();

    let chars: Vec<char> = smiles.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '(' => {
                let atom = current_atom.ok_or(SmilesError::BranchNoCurrentAtom(i))?;
                branch_stack.push((atom, i));
                i += 1;
            }
            ')' => {
                if let Some((_, at)) = pending_bond {
                    return Err(SmilesError::DanglingBond(at));
                }
                let (atom, _) = branch_stack.pop().ok_or(SmilesError::BranchEndNoStart(i))?;
                current_atom = Some(atom);
                i += 1;
            }
            '-' | '=' | '#' | ':' => {
                if pending_bond.is_some() || current_atom.is_none() {
                    return Err(SmilesError::DanglingBond(i));
                }
                let bond = match c {
                    '=' => Double,
                    '#' => Triple,
                    ':' => Aromatic,
                    _ => Single,
                };
                pending_bond = Some((bond, i));
                i += 1;
            }
            '/' | '\\' => {
                // Directional single bonds only carry stereo.
                if current_atom.is_none() {
                    return Err(SmilesError::DanglingBond(i));
                }
                i += 1;
            }
            '0'..='9' | '%' => {
                let (ring_number, width) = ring_label(&chars, i)?;
                let atom = current_atom.ok_or(SmilesError::RingClosureNoCurrentAtom(ring_number, i))?;
                let bond = pending_bond.take().map(|(bond, _)| bond);
                match ring_map.remove(&ring_number) {
                    Some((start, opening_bond)) => {
                        if start == atom || graph.find_edge(start, atom).is_some() {
                            return Err(SmilesError::InvalidRingClosure(ring_number, i));
                        }
                        let bond = bond
                            .or(opening_bond)
                            .unwrap_or_else(|| default_bond(&graph, start, atom));
                        graph.add_edge(start, atom, bond);
                    }
                    None => {
                        ring_map.insert(ring_number, (atom, bond));
                    }
                }
                i += width;
            }
            '.' => {
                if let Some((_, at)) = pending_bond {
                    return Err(SmilesError::DanglingBond(at));
                }
                current_atom = None;
                i += 1;
            }
            '[' => {
                let end = chars[i..]
                    .iter()
                    .position(|&x| x == ']')
                    .map(|offset| i + offset)
                    .ok_or(SmilesError::UnclosedBracket(i))?;
                let content: String = chars[i + 1..end].iter().collect();
                let atom = parse_bracket_atom(&content)?;
                current_atom = Some(attach_atom(&mut graph, atom, current_atom, &mut pending_bond));
                i = end + 1;
            }
            _ => {
                let (atom, width) = organic_atom(&chars, i)?;
                current_atom = Some(attach_atom(&mut graph, atom, current_atom, &mut pending_bond));
                i += width;
            }
        }
    }

    if let Some((_, at)) = pending_bond {
        return Err(SmilesError::DanglingBond(at));
    }
    if let Some(&(_, at)) = branch_stack.last() {
        return Err(SmilesError::UnclosedBranch(at));
    }
    if let Some(&ring_number) = ring_map.keys().next() {
        return Err(SmilesError::UnclosedRing(ring_number));
    }

    assign_implicit_hydrogens(&mut graph)?;
    Ok(graph)
}

/// Ring closure label at `i`: a single digit, or `%` followed by two digits.
fn ring_label(chars: &[char], i: usize) -> Result<(u8, usize), SmilesError> {
    let digit = |c: char| c.to_digit(10).map(|d| d as u8);
    if chars[i] == '%' {
        match (chars.get(i + 1).copied().and_then(digit), chars.get(i + 2).copied().and_then(digit)) {
            (Some(tens), Some(ones)) => Ok((tens * 10 + ones, 3)),
            _ => Err(SmilesError::UnexpectedCharacter('%', i)),
        }
    } else {
        digit(chars[i])
            .map(|d| (d, 1))
            .ok_or(SmilesError::UnexpectedCharacter(chars[i], i))
    }
}

/// An organic-subset atom at `i`, returning the atom and the characters consumed.
fn organic_atom(chars: &[char], i: usize) -> Result<(Atom, usize), SmilesError> {
    let c = chars[i];
    let next = chars.get(i + 1).copied();
    let (element, aromatic, width) = match (c, next) {
        ('C', Some('l')) => (Element::Cl, false, 2),
        ('B', Some('r')) => (Element::Br, false, 2),
        ('B', _) => (Element::B, false, 1),
        ('C', _) => (Element::C, false, 1),
        ('N', _) => (Element::N, false, 1),
        ('O', _) => (Element::O, false, 1),
        ('P', _) => (Element::P, false, 1),
        ('S', _) => (Element::S, false, 1),
        ('F', _) => (Element::F, false, 1),
        ('I', _) => (Element::I, false, 1),
        ('b', _) => (Element::B, true, 1),
        ('c', _) => (Element::C, true, 1),
        ('n', _) => (Element::N, true, 1),
        ('o', _) => (Element::O, true, 1),
        ('p', _) => (Element::P, true, 1),
        ('s', _) => (Element::S, true, 1),
        (c, _) if c.is_ascii_alphabetic() => return Err(SmilesError::UnknownElement(c.to_string())),
        (c, _) => return Err(SmilesError::UnexpectedCharacter(c, i)),
    };
    let atom = Atom::new(element);
    Ok((if aromatic { atom.as_aromatic() } else { atom }, width))
}

fn default_bond(graph: &MoleculeGraph, a: NodeIndex, b: NodeIndex) -> Bond {
    if graph[a].aromatic && graph[b].aromatic {
        Aromatic
    } else {
        Single
    }
}

/// Add `atom` to the graph, bonding it to the previous atom if there is one.
fn attach_atom(
    graph: &mut MoleculeGraph,
    atom: Atom,
    current_atom: Option<NodeIndex>,
    pending_bond: &mut Option<(Bond, usize)>,
) -> NodeIndex {
    let new_atom = graph.add_node(atom);
    if let Some(prev_atom) = current_atom {
        let bond = match pending_bond.take() {
            Some((bond, _)) => bond,
            None => default_bond(graph, prev_atom, new_atom),
        };
        graph.add_edge(prev_atom, new_atom, bond);
    }
    new_atom
}

/// Sum of bond orders at `node`, aromatic bonds counted once.
fn bond_valence(graph: &MoleculeGraph, node: NodeIndex) -> u32 {
    graph
        .edges(node)
        .map(|edge| match edge.weight() {
            Single | Aromatic => 1,
            Double => 2,
            Triple => 3,
        })
        .sum()
}

/// Fill in implicit hydrogen counts for organic-subset atoms and check the
/// valence of every atom.
///
/// Aromatic atoms use their lowest valence and donate one electron to the
/// ring, so `c` in benzene gets one hydrogen and `n` in pyridine none. An
/// aromatic atom left with that free electron must pair with a neighbour,
/// which fails for rings such as `c1cccc1`.
pub fn assign_implicit_hydrogens(graph: &mut MoleculeGraph) -> Result<(), SmilesError> {
    let mut pi_atoms = Vec::new();
    let nodes: Vec<NodeIndex> = graph.node_indices().collect();
    for node in nodes {
        let atom = graph[node];
        let used = bond_valence(graph, node);

        if atom.bracket {
            let Some((lowest, highest)) = atom.element.charged_valences(atom.charge) else {
                continue;
            };
            let total = used + atom.hydrogens as u32;
            if total > highest as u32 {
                return Err(SmilesError::Valence {
                    atom: node.index(),
                    valence: total,
                });
            }
            if atom.aromatic && total < lowest as u32 {
                pi_atoms.push(node);
            }
            continue;
        }

        let valences = atom.element.default_valences();
        let too_many = SmilesError::Valence {
            atom: node.index(),
            valence: used,
        };
        let hydrogens = if atom.aromatic {
            let lowest = valences.first().map_or(0, |&v| v as u32);
            let highest = valences.last().map_or(0, |&v| v as u32);
            if used > highest {
                return Err(too_many);
            }
            if used < lowest {
                pi_atoms.push(node);
                lowest - used - 1
            } else {
                0
            }
        } else {
            valences
                .iter()
                .map(|&v| v as u32)
                .find(|&v| v >= used)
                .map(|v| v - used)
                .ok_or(too_many)?
        };
        // Bounded by the largest default valence.
        graph[node].hydrogens = hydrogens as u8;
    }
    check_kekulization(graph, &pi_atoms)
}

/// Every aromatic atom in `pi_atoms` must share a double bond with exactly
/// one aromatic neighbour that is also in `pi_atoms`.
fn check_kekulization(graph: &MoleculeGraph, pi_atoms: &[NodeIndex]) -> Result<(), SmilesError> {
    if pi_atoms.is_empty() {
        return Ok(());
    }
    let mut local = vec![None; graph.node_count()];
    let mut system = UnGraph::<NodeIndex, ()>::with_capacity(pi_atoms.len(), pi_atoms.len());
    for &node in pi_atoms {
        local[node.index()] = Some(system.add_node(node));
    }
    for edge in graph.edge_references() {
        if *edge.weight() != Aromatic {
            continue;
        }
        if let (Some(a), Some(b)) = (local[edge.source().index()], local[edge.target().index()]) {
            system.add_edge(a, b, ());
        }
    }

    let matching = maximum_matching(&system);
    if matching.is_perfect() {
        return Ok(());
    }
    let unmatched = system
        .node_indices()
        .find(|&n| matching.mate(n).is_none())
        .map_or(pi_atoms[0], |n| system[n]);
    Err(SmilesError::Kekulize(unmatched.index()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hydrogens(molecule: &MoleculeGraph) -> u32 {
        molecule.node_weights().map(|atom| atom.hydrogens as u32).sum()
    }

    #[test]
    fn test_parse_ethanol() {
        let molecule = parse_smiles("CCO").expect("Failed to parse SMILES");

        assert_eq!(molecule.node_count(), 3);
        assert_eq!(molecule[NodeIndex::new(0)].element, Element::C);
        assert_eq!(molecule[NodeIndex::new(1)].element, Element::C);
        assert_eq!(molecule[NodeIndex::new(2)].element, Element::O);

        let edges: Vec<_> = molecule.edge_references().collect();
        assert_eq!(edges.len(), 2);
        for edge in edges {
            assert_eq!(edge.weight(), &Single);
        }
        assert_eq!(hydrogens(&molecule), 6);
    }

    #[test]
    fn test_parse_isobutane() {
        let molecule = parse_smiles("CC(C)C").expect("Failed to parse SMILES");
        assert_eq!(molecule.node_count(), 4);
        assert_eq!(molecule.edge_count(), 3);

        let center = NodeIndex::new(1);
        assert_eq!(molecule.neighbors(center).count(), 3);
        assert_eq!(molecule[center].hydrogens, 1);
        assert_eq!(hydrogens(&molecule), 10);
    }

    #[test]
    fn test_parse_cyclohexane() {
        let molecule = parse_smiles("C1CCCCC1").expect("Failed to parse SMILES");
        assert_eq!(molecule.edge_count(), 6);
        for node in molecule.node_indices() {
            assert_eq!(molecule.edges(node).count(), 2, "Node {} degree", node.index());
            assert_eq!(molecule[node].hydrogens, 2);
        }
    }

    #[test]
    fn test_parse_benzene() {
        let molecule = parse_smiles("c1ccccc1").expect("Failed to parse SMILES");
        assert_eq!(molecule.node_count(), 6);
        assert_eq!(molecule.edge_count(), 6);
        for edge in molecule.edge_references() {
            assert_eq!(edge.weight(), &Aromatic);
        }
        for atom in molecule.node_weights() {
            assert!(atom.aromatic);
            assert_eq!(atom.hydrogens, 1);
        }
    }

    #[test]
    fn test_parse_pyridine_and_pyrrole() {
        let pyridine = parse_smiles("c1ccncc1").unwrap();
        assert_eq!(hydrogens(&pyridine), 5);

        let pyrrole = parse_smiles("c1cc[nH]c1").unwrap();
        assert_eq!(hydrogens(&pyrrole), 5);
    }

    #[test]
    fn test_parse_bonds_and_halogens() {
        let molecule = parse_smiles("ClC=CBr").unwrap();
        let elements: Vec<Element> = molecule.node_weights().map(|a| a.element).collect();
        assert_eq!(elements, vec![Element::Cl, Element::C, Element::C, Element::Br]);
        assert!(molecule.edge_references().any(|e| e.weight() == &Double));

        let acetonitrile = parse_smiles("CC#N").unwrap();
        assert!(acetonitrile.edge_references().any(|e| e.weight() == &Triple));
        assert_eq!(hydrogens(&acetonitrile), 3);
    }

    #[test]
    fn test_parse_two_digit_ring_closure_and_fragments() {
        let molecule = parse_smiles("C%10CCCC%10").unwrap();
        assert_eq!(molecule.edge_count(), 5);

        let salt = parse_smiles("[Na+].[Cl-]").unwrap();
        assert_eq!(salt.node_count(), 2);
        assert_eq!(salt.edge_count(), 0);
    }

    #[test]
    fn test_parse_stereo_is_ignored() {
        let molecule = parse_smiles("F/C=C/F").unwrap();
        assert_eq!(molecule.node_count(), 4);
        assert_eq!(molecule.edge_count(), 3);

        let alanine = parse_smiles("N[C@@H](C)C(=O)O").unwrap();
        assert_eq!(alanine.node_count(), 6);
    }

    #[test]
    fn test_parse_ciprofloxacin() {
        let molecule = parse_smiles("C1CNCCN1c(c2)c(F)cc3c2N(C4CC4)C=C(C3=O)C(=O)O").unwrap();
        assert_eq!(molecule.node_count(), 24);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_smiles("").unwrap_err(), SmilesError::Empty);
        assert_eq!(parse_smiles("   ").unwrap_err(), SmilesError::Empty);
        assert_eq!(parse_smiles("C1CC").unwrap_err(), SmilesError::UnclosedRing(1));
        assert_eq!(parse_smiles("CC(C").unwrap_err(), SmilesError::UnclosedBranch(2));
        assert_eq!(parse_smiles("CC)C").unwrap_err(), SmilesError::BranchEndNoStart(2));
        assert_eq!(parse_smiles("(C)C").unwrap_err(), SmilesError::BranchNoCurrentAtom(0));
        assert_eq!(parse_smiles("C[C").unwrap_err(), SmilesError::UnclosedBracket(1));
        assert_eq!(parse_smiles("CC=").unwrap_err(), SmilesError::DanglingBond(2));
        assert_eq!(parse_smiles("C11").unwrap_err(), SmilesError::InvalidRingClosure(1, 2));
        assert!(matches!(parse_smiles("CXC"), Err(SmilesError::UnknownElement(_))));
        assert!(matches!(parse_smiles("C C"), Err(SmilesError::UnexpectedCharacter(' ', 1))));
        assert!(matches!(parse_smiles("not a smiles"), Err(_)));
    }

    #[test]
    fn test_valence_is_checked() {
        assert_eq!(
            parse_smiles("C(C)(C)(C)(C)C").unwrap_err(),
            SmilesError::Valence { atom: 0, valence: 5 }
        );
        assert!(matches!(parse_smiles("CF(C)C"), Err(SmilesError::Valence { atom: 1, .. })));
        assert!(matches!(parse_smiles("O=O=O"), Err(SmilesError::Valence { atom: 1, .. })));
        assert!(matches!(parse_smiles("[CH5]"), Err(SmilesError::Valence { atom: 0, valence: 5 })));
        assert!(matches!(parse_smiles("C[O-](C)"), Err(SmilesError::Valence { .. })));

        // Expanded and charged valences stay valid.
        assert!(parse_smiles("CS(=O)(=O)C").is_ok());
        assert!(parse_smiles("OP(=O)(O)O").is_ok());
        assert!(parse_smiles("C[N+](=O)[O-]").is_ok());
        assert!(parse_smiles("C[N+](C)(C)C").is_ok());
        assert!(parse_smiles("[Na+].[Fe+3]").is_ok());
    }

    #[test]
    fn test_many_branches_do_not_overflow() {
        let smiles = format!("C{}", "(C)".repeat(300));
        assert_eq!(
            parse_smiles(&smiles).unwrap_err(),
            SmilesError::Valence { atom: 0, valence: 300 }
        );
    }

    #[test]
    fn test_aromatic_systems_must_kekulize() {
        assert!(matches!(parse_smiles("c1cccc1"), Err(SmilesError::Kekulize(_))));
        assert!(matches!(parse_smiles("c1ccccc1c"), Err(SmilesError::Kekulize(_))));
        assert!(matches!(parse_smiles("Cc"), Err(SmilesError::Kekulize(1))));

        for smiles in [
            "c1ccoc1",
            "c1ccsc1",
            "c1cc[nH]c1",
            "c1ccc2ccccc2c1",
            "c1ccc2[nH]ccc2c1",
            "Cn1ccnc1",
            "O=c1cccc[nH]1",
            "C[n+]1ccccc1",
            "c1cc[cH-]c1",
            "c1ccccc1c1ccccc1",
        ] {
            assert!(parse_smiles(smiles).is_ok(), "{smiles}");
        }
    }
}
