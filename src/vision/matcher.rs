//! Approximate nearest-neighbour matching of binary descriptors.
//!
//! Descriptors are bucketed into several hash tables, each keyed on a random
//! subset of descriptor bits. A query probes its own bucket plus every bucket
//! one bit away (multi-probe level 1), then ranks the gathered candidates by
//! exact Hamming distance.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use rayon::prelude::*;

use super::features::{hamming, Descriptor};

const TABLE_COUNT: usize = 6;
const KEY_BITS: usize = 12;
const DESCRIPTOR_BITS: usize = 256;

/// A reference-to-live correspondence that survived the ratio test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorMatch {
    /// Index into the query (reference) descriptors.
    pub query: usize,
    /// Index into the indexed (live) descriptors.
    pub train: usize,
    pub distance: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbor {
    pub index: usize,
    pub distance: u32,
}

struct HashTable {
    bits: Vec<usize>,
    buckets: HashMap<u32, Vec<u32>>,
}

impl HashTable {
    fn key(&self, d: &Descriptor) -> u32 {
        self.bits
            .iter()
            .enumerate()
            .fold(0u32, |key, (i, &b)| key | (((d[b / 64] >> (b % 64)) & 1) as u32) << i)
    }
}

pub struct LshIndex<'a> {
    descriptors: &'a [Descriptor],
    tables: Vec<HashTable>,
}

impl<'a> LshIndex<'a> {
    pub fn build(descriptors: &'a [Descriptor], seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let tables = (0..TABLE_COUNT)
            .map(|_| {
                let bits = index::sample(&mut rng, DESCRIPTOR_BITS, KEY_BITS).into_vec();
                let mut table = HashTable {
                    bits,
                    buckets: HashMap::new(),
                };
                for (i, d) in descriptors.iter().enumerate() {
                    let key = table.key(d);
                    table.buckets.entry(key).or_default().push(i as u32);
                }
                table
            })
            .collect();
        Self {
            descriptors,
            tables,
        }
    }

    /// Two nearest indexed descriptors among the probed buckets, or `None`
    /// when fewer than two distinct candidates were found.
    pub fn nearest_two(&self, query: &Descriptor) -> Option<(Neighbor, Neighbor)> {
        let mut seen = vec![false; self.descriptors.len()];
        let mut best: Option<Neighbor> = None;
        let mut second: Option<Neighbor> = None;

        for table in &self.tables {
            let key = table.key(query);
            let probes = std::iter::once(key).chain((0..KEY_BITS).map(|i| key ^ (1 << i)));
            for probe in probes {
                let Some(bucket) = table.buckets.get(&probe) else {
                    continue;
                };
                for &i in bucket {
                    let i = i as usize;
                    if std::mem::replace(&mut seen[i], true) {
                        continue;
                    }
                    let n = Neighbor {
                        index: i,
                        distance: hamming(query, &self.descriptors[i]),
                    };
                    match best {
                        Some(b) if n.distance >= b.distance => {
                            if second.is_none_or(|s| n.distance < s.distance) {
                                second = Some(n);
                            }
                        }
                        _ => {
                            second = best;
                            best = Some(n);
                        }
                    }
                }
            }
        }
        Some((best?, second?))
    }
}

/// Lowe's ratio test over 2-NN queries: keep a match only when the best
/// neighbour is clearly closer than the runner-up.
pub fn ratio_matches(query: &[Descriptor], train: &[Descriptor], ratio: f32) -> Vec<DescriptorMatch> {
    if query.is_empty() || train.len() < 2 {
        return Vec::new();
    }
    let index = LshIndex::build(train, 0);
    query
        .par_iter()
        .enumerate()
        .filter_map(|(qi, q)| {
            let (best, second) = index.nearest_two(q)?;
            ((best.distance as f32) < ratio * second.distance as f32).then_some(DescriptorMatch {
                query: qi,
                train: best.index,
                distance: best.distance,
            })
        })
        .collect()
}
