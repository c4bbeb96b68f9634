use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// 2^61 - 1
pub const MERSENNE_PRIME: u64 = (1 << 61) - 1;
const MAX_HASH: u64 = u32::MAX as u64;

/// A family of `dimension` seeded universal hash functions
/// `h -> ((a * h + b) mod p) & 0xffffffff`.
///
/// The MinHash of a set is, per function, the minimum over the set's members.
/// The fraction of equal positions between two MinHash vectors estimates the
/// Jaccard similarity of the underlying sets.
#[derive(Debug, Clone)]
pub struct MinHash {
    seed: u64,
    a: Vec<u64>,
    b: Vec<u64>,
}

impl MinHash {
    pub fn new(dimension: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut a = Vec::with_capacity(dimension);
        let mut b = Vec::with_capacity(dimension);
        for _ in 0..dimension {
            a.push(rng.gen_range(1..MERSENNE_PRIME));
            b.push(rng.gen_range(0..MERSENNE_PRIME));
        }
        Self { seed, a, b }
    }

    pub fn dimension(&self) -> usize {
        self.a.len()
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// MinHash a set of 32-bit hashes. An empty set maps every position to
    /// `u32::MAX`.
    pub fn from_hashes<I>(&self, hashes: I) -> Vec<u32>
    where
        I: IntoIterator<Item = u32>,
    {
        let mut mins = vec![u32::MAX; self.dimension()];
        for hash in hashes {
            let hash = hash as u128;
            for (i, min) in mins.iter_mut().enumerate() {
                let permuted = (self.a[i] as u128 * hash + self.b[i] as u128) % MERSENNE_PRIME as u128;
                let value = (permuted as u64 & MAX_HASH) as u32;
                if value < *min {
                    *min = value;
                }
            }
        }
        mins
    }

    /// MinHash the set of indices whose bit is set.
    pub fn from_binary_array(&self, bits: &[u8]) -> Vec<u32> {
        self.from_hashes(
            bits.iter()
                .enumerate()
                .filter(|&(_, &bit)| bit != 0)
                .map(|(index, _)| index as u32),
        )
    }

    pub fn batch_from_binary_array(&self, arrays: &[Vec<u8>]) -> Vec<Vec<u32>> {
        arrays.iter().map(|bits| self.from_binary_array(bits)).collect()
    }

    /// Estimated Jaccard distance: one minus the fraction of equal positions.
    pub fn distance(a: &[u32], b: &[u32]) -> f32 {
        let length = a.len().max(b.len());
        if length == 0 {
            return 0.0;
        }
        let equal = a.iter().zip(b).filter(|(x, y)| x == y).count();
        1.0 - equal as f32 / length as f32
    }
}
