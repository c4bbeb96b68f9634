use std::collections::HashSet;

use petgraph::visit::EdgeRef;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use crate::{Bond, Element, GeneratorError, MoleculeGraph};

/// Seed used for the starting coordinates of every embedding.
pub const EMBED_SEED: u64 = 42;

const ITERATIONS: usize = 1500;
const STEP: f64 = 0.05;
const MAX_MOVE: f64 = 0.25;

/// Cartesian coordinates (angstroms) of every atom, hydrogens included.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub positions: Vec<[f64; 3]>,
    pub masses: Vec<f64>,
}

struct Restraint {
    i: usize,
    j: usize,
    target: f64,
    weight: f64,
    /// Only penalize distances shorter than `target`.
    lower_bound: bool,
}

fn bond_length(a: Element, b: Element, bond: Bond) -> f64 {
    let shortening = match bond {
        Bond::Single => 0.0,
        Bond::Aromatic => 0.1,
        Bond::Double => 0.15,
        Bond::Triple => 0.25,
    };
    a.covalent_radius() + b.covalent_radius() - shortening
}

/// Bond angle around a centre given the bonds it makes.
fn bond_angle(bonds: &[Bond]) -> f64 {
    let doubles = bonds.iter().filter(|&&bond| bond == Bond::Double).count();
    if bonds.contains(&Bond::Triple) || doubles >= 2 {
        180f64.to_radians()
    } else if doubles == 1 || bonds.contains(&Bond::Aromatic) {
        120f64.to_radians()
    } else {
        109.47f64.to_radians()
    }
}

/// Embed the molecule in 3-D with explicit hydrogens.
///
/// Distance restraints for bonds and 1-3 pairs, plus soft lower bounds
/// between all other pairs, are relaxed by gradient descent from seeded
/// random coordinates. The same graph and seed always give the same result.
pub fn embed_with_hydrogens(graph: &MoleculeGraph, seed: u64) -> Result<Embedding, GeneratorError> {
    let mut elements: Vec<Element> = graph.node_weights().map(|atom| atom.element).collect();
    let mut bonds: Vec<(usize, usize, Bond)> = graph
        .edge_references()
        .map(|edge| (edge.source().index(), edge.target().index(), *edge.weight()))
        .collect();
    for node in graph.node_indices() {
        for _ in 0..graph[node].hydrogens {
            elements.push(Element::H);
            bonds.push((node.index(), elements.len() - 1, Bond::Single));
        }
    }

    let n = elements.len();
    if n == 0 {
        return Err(GeneratorError::Embedding("molecule has no atoms".to_string()));
    }

    let mut neighbors: Vec<Vec<(usize, Bond)>> = vec![Vec::new(); n];
    for &(a, b, bond) in &bonds {
        neighbors[a].push((b, bond));
        neighbors[b].push((a, bond));
    }

    let mut restraints = Vec::new();
    let mut near: HashSet<(usize, usize)> = HashSet::new();
    for &(a, b, bond) in &bonds {
        restraints.push(Restraint {
            i: a,
            j: b,
            target: bond_length(elements[a], elements[b], bond),
            weight: 1.0,
            lower_bound: false,
        });
        near.insert((a.min(b), a.max(b)));
    }
    for (center, around) in neighbors.iter().enumerate() {
        let angle = bond_angle(&around.iter().map(|&(_, bond)| bond).collect::<Vec<_>>());
        for (x, &(a, bond_a)) in around.iter().enumerate() {
            for &(b, bond_b) in &around[x + 1..] {
                let da = bond_length(elements[center], elements[a], bond_a);
                let db = bond_length(elements[center], elements[b], bond_b);
                restraints.push(Restraint {
                    i: a,
                    j: b,
                    target: (da * da + db * db - 2.0 * da * db * angle.cos()).sqrt(),
                    weight: 0.5,
                    lower_bound: false,
                });
                near.insert((a.min(b), a.max(b)));
            }
        }
    }
    for i in 0..n {
        for j in i + 1..n {
            if near.contains(&(i, j)) {
                continue;
            }
            let target = match (elements[i] == Element::H, elements[j] == Element::H) {
                (false, false) => 2.5,
                (true, true) => 1.8,
                _ => 2.2,
            };
            restraints.push(Restraint {
                i,
                j,
                target,
                weight: 0.2,
                lower_bound: true,
            });
        }
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let extent = (n as f64).cbrt() * 1.5;
    let mut positions: Vec<[f64; 3]> = (0..n)
        .map(|_| {
            [
                rng.gen_range(-extent..extent),
                rng.gen_range(-extent..extent),
                rng.gen_range(-extent..extent),
            ]
        })
        .collect();

    let mut gradient = vec![[0.0f64; 3]; n];
    for iteration in 0..ITERATIONS {
        gradient.iter_mut().for_each(|g| *g = [0.0; 3]);
        let mut energy = 0.0;
        for restraint in &restraints {
            let (pi, pj) = (positions[restraint.i], positions[restraint.j]);
            let delta = [pi[0] - pj[0], pi[1] - pj[1], pi[2] - pj[2]];
            let distance = (delta[0] * delta[0] + delta[1] * delta[1] + delta[2] * delta[2])
                .sqrt()
                .max(1e-6);
            if restraint.lower_bound && distance >= restraint.target {
                continue;
            }
            let error = distance - restraint.target;
            energy += restraint.weight * error * error;
            let scale = 2.0 * restraint.weight * error / distance;
            for axis in 0..3 {
                gradient[restraint.i][axis] += scale * delta[axis];
                gradient[restraint.j][axis] -= scale * delta[axis];
            }
        }

        for (position, g) in positions.iter_mut().zip(&gradient) {
            let mut step = [-STEP * g[0], -STEP * g[1], -STEP * g[2]];
            let length = (step[0] * step[0] + step[1] * step[1] + step[2] * step[2]).sqrt();
            if length > MAX_MOVE {
                step.iter_mut().for_each(|s| *s *= MAX_MOVE / length);
            }
            for axis in 0..3 {
                position[axis] += step[axis];
            }
        }

        if iteration % 500 == 0 {
            trace!("embedding iteration {iteration}: energy {energy:.4}");
        }
    }

    if positions.iter().flatten().any(|coordinate| !coordinate.is_finite()) {
        return Err(GeneratorError::Embedding(
            "relaxation produced non-finite coordinates".to_string(),
        ));
    }

    Ok(Embedding {
        positions,
        masses: elements.iter().map(|element| element.atomic_mass()).collect(),
    })
}

/// Mass-weighted radius of gyration.
pub fn radius_of_gyration(embedding: &Embedding) -> f64 {
    let total: f64 = embedding.masses.iter().sum();
    if total == 0.0 {
        return 0.0;
    }
    let mut center = [0.0; 3];
    for (position, mass) in embedding.positions.iter().zip(&embedding.masses) {
        for axis in 0..3 {
            center[axis] += mass * position[axis] / total;
        }
    }
    let spread: f64 = embedding
        .positions
        .iter()
        .zip(&embedding.masses)
        .map(|(position, mass)| {
            let d: f64 = (0..3).map(|axis| (position[axis] - center[axis]).powi(2)).sum();
            mass * d
        })
        .sum();
    (spread / total).sqrt()
}
