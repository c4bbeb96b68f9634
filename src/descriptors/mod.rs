//! Scalar molecular descriptors.

mod embed;
pub use embed::*;

use crate::{parse_smiles, ring_count, Bond, DescriptorFn, GeneratorError, MoleculeGraph, Registry};

pub fn register_builtin_descriptors(registry: &mut Registry<DescriptorFn>) {
    registry
        .register("MolWeight", mol_weight_descriptor)
        .register("RingCount", ring_count_descriptor)
        .register("Fsp3", fsp3_descriptor)
        .register("GyrationRad", gyration_radius_descriptor);
}

pub fn mol_weight_descriptor(smiles: &str) -> Result<f64, GeneratorError> {
    Ok(mol_weight(&parse_smiles(smiles)?))
}

pub fn ring_count_descriptor(smiles: &str) -> Result<f64, GeneratorError> {
    Ok(ring_count(&parse_smiles(smiles)?) as f64)
}

pub fn fsp3_descriptor(smiles: &str) -> Result<f64, GeneratorError> {
    Ok(fraction_csp3(&parse_smiles(smiles)?))
}

pub fn gyration_radius_descriptor(smiles: &str) -> Result<f64, GeneratorError> {
    let embedding = embed_with_hydrogens(&parse_smiles(smiles)?, EMBED_SEED)?;
    Ok(radius_of_gyration(&embedding))
}

/// Average molecular weight, implicit hydrogens included.
pub fn mol_weight(graph: &MoleculeGraph) -> f64 {
    graph.node_weights().map(|atom| atom.mass()).sum()
}

/// Fraction of carbons that are sp3: not aromatic and only single bonds.
/// Zero for molecules without carbon.
pub fn fraction_csp3(graph: &MoleculeGraph) -> f64 {
    let carbons: Vec<_> = graph.node_indices().filter(|&node| graph[node].is_carbon()).collect();
    if carbons.is_empty() {
        return 0.0;
    }
    let sp3 = carbons
        .iter()
        .filter(|&&node| {
            !graph[node].aromatic && graph.edges(node).all(|edge| *edge.weight() == Bond::Single)
        })
        .count();
    sp3 as f64 / carbons.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Toolbox;

    fn descriptor(name: &str, smiles: &str) -> f64 {
        let toolbox = Toolbox::builtin();
        let function = toolbox.descriptors.get(name).unwrap();
        function(smiles).unwrap()
    }

    #[test]
    fn test_mol_weight() {
        assert!((descriptor("MolWeight", "CCO") - 46.069).abs() < 0.01);
        assert!((descriptor("MolWeight", "O") - 18.015).abs() < 0.01);
        assert!((descriptor("MolWeight", "c1ccccc1") - 78.114).abs() < 0.01);
    }

    #[test]
    fn test_ring_count() {
        assert_eq!(descriptor("RingCount", "CCO"), 0.0);
        assert_eq!(descriptor("RingCount", "c1ccccc1"), 1.0);
        assert_eq!(descriptor("RingCount", "c1ccc2ccccc2c1"), 2.0);
    }

    #[test]
    fn test_fraction_csp3() {
        assert_eq!(descriptor("Fsp3", "C1CCCCC1"), 1.0);
        assert_eq!(descriptor("Fsp3", "c1ccccc1"), 0.0);
        assert_eq!(descriptor("Fsp3", "O"), 0.0);
        assert!((descriptor("Fsp3", "CC(=O)O") - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_gyration_radius() {
        let ethane = descriptor("GyrationRad", "CC");
        let hexane = descriptor("GyrationRad", "CCCCCC");
        assert!(ethane.is_finite() && ethane > 0.0);
        assert!(hexane > ethane);
        assert_eq!(descriptor("GyrationRad", "CCCCCC"), hexane);
    }

    #[test]
    fn test_invalid_smiles_is_an_error() {
        let toolbox = Toolbox::builtin();
        for name in toolbox.descriptors.list_available() {
            let function = toolbox.descriptors.get(name).unwrap();
            assert!(matches!(function("C1CC"), Err(GeneratorError::Smiles(_))), "{name}");
        }
    }
}
