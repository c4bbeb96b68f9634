//! Fingerprint generators.
//!
//! Every generator has the shape `(smiles, dimension) -> Fingerprint` and is
//! looked up by name through a [`Registry`].

mod ecfp;
pub use ecfp::*;

mod mhfp;
pub use mhfp::*;

use crate::{parse_smiles, FingerprintFn, GeneratorError, Registry};

/// A fixed-length molecular fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fingerprint {
    /// Already in MinHash space; can be indexed directly.
    MinHash(Vec<u32>),
    /// One byte (0 or 1) per bit; must be MinHash-encoded before indexing.
    Bits(Vec<u8>),
}

impl Fingerprint {
    pub fn len(&self) -> usize {
        match self {
            Fingerprint::MinHash(values) => values.len(),
            Fingerprint::Bits(bits) => bits.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_minhash(&self) -> bool {
        matches!(self, Fingerprint::MinHash(_))
    }
}

pub fn register_builtin_fingerprints(registry: &mut Registry<FingerprintFn>) {
    registry
        .register("MHFP6", mhfp6_fp_generator)
        .register("ECFP4", ecfp4_fp_generator);
}

/// MinHash fingerprint over circular substructures up to diameter 6.
pub fn mhfp6_fp_generator(smiles: &str, dimension: usize) -> Result<Fingerprint, GeneratorError> {
    if dimension == 0 {
        return Err(GeneratorError::Dimension(dimension));
    }
    let molecule = parse_smiles(smiles)?;
    let encoder = MhfpEncoder::cached(dimension);
    Ok(Fingerprint::MinHash(encoder.encode_graph(&molecule)))
}

/// Morgan bit fingerprint of radius 2, folded to `dimension` bits.
pub fn ecfp4_fp_generator(smiles: &str, dimension: usize) -> Result<Fingerprint, GeneratorError> {
    if dimension == 0 {
        return Err(GeneratorError::Dimension(dimension));
    }
    let molecule = parse_smiles(smiles)?;
    Ok(Fingerprint::Bits(ecfp_bits(&molecule, 2, dimension)))
}
