
use rustc_hash::FxHashMap;

use crate::bubbles::bubble_graph::BubbleGraph;
use crate::data_types::parameters::PolishParams;
use crate::util::log_math::{log_add_exact, LOG_ZERO};

/// Scale between log-probabilities and their quantized byte encoding
pub const PROFILE_PROB_SCALAR: f64 = 30.0;

/// Decodes a quantized byte back into a log-probability
pub fn byte_to_log_prob(byte: u8) -> f64 {
    -(byte as f64) / PROFILE_PROB_SCALAR
}

/// Decodes a quantized byte back into a linear probability
pub fn byte_to_prob(byte: u8) -> f64 {
    byte_to_log_prob(byte).exp()
}

/// One read's quantized per-bubble, per-allele posterior profile: the HMM's emission
/// view of the read. A lower byte value denotes higher posterior allele probability.
#[derive(Clone, Debug)]
pub struct ProfileSeq {
    /// The owning read's stable identifier
    read_id: usize,
    /// First bubble index the read covers
    ref_start: usize,
    /// Number of bubbles covered
    length: usize,
    /// Allele offset of the first covered bubble
    allele_offset: usize,
    /// Quantized scaled negative log-probabilities, one byte per allele over the span
    profile_probs: Vec<u8>,
}

impl ProfileSeq {
    /// True if this profile covers the given bubble index
    pub fn covers(&self, bubble_index: usize) -> bool {
        bubble_index >= self.ref_start && bubble_index < self.ref_start + self.length
    }

    /// The quantized byte for an allele at a covered bubble.
    /// # Arguments
    /// * `site_allele_offset` - the bubble's graph-wide allele offset
    /// * `allele` - allele index within the bubble
    pub fn profile_byte(&self, site_allele_offset: usize, allele: usize) -> u8 {
        self.profile_probs[site_allele_offset - self.allele_offset + allele]
    }

    /// Log-probability of the read under an allele at a covered bubble
    pub fn allele_log_prob(&self, site_allele_offset: usize, allele: usize) -> f64 {
        byte_to_log_prob(self.profile_byte(site_allele_offset, allele))
    }

    // getters
    pub fn read_id(&self) -> usize {
        self.read_id
    }

    pub fn ref_start(&self) -> usize {
        self.ref_start
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn allele_offset(&self) -> usize {
        self.allele_offset
    }

    pub fn profile_probs(&self) -> &[u8] {
        &self.profile_probs
    }
}

/// One phasing site, mirroring a bubble: allele bookkeeping plus the quantized priors
/// and allele-substitution model the HMM emissions draw from.
#[derive(Clone, Debug)]
pub struct Site {
    /// Number of alleles at the site
    allele_number: usize,
    /// Graph-wide allele offset of the site
    allele_offset: usize,
    /// Quantized negative log prior per allele; uniform (all zero)
    allele_prior_log_probs: Vec<u16>,
    /// Quantized `A x A` substitution matrix; identity is 0, off-diagonal is
    /// `round(-ln(het_substitution_probability) * PROFILE_PROB_SCALAR)`
    substitution_log_probs: Vec<u16>,
}

impl Site {
    pub fn allele_number(&self) -> usize {
        self.allele_number
    }

    pub fn allele_offset(&self) -> usize {
        self.allele_offset
    }

    /// Log prior of an allele at this site
    pub fn prior_log_prob(&self, allele: usize) -> f64 {
        -(self.allele_prior_log_probs[allele] as f64) / PROFILE_PROB_SCALAR
    }

    /// Log probability of substituting `to` for `from` between haplotype and ancestor
    pub fn substitution_log_prob(&self, from: usize, to: usize) -> f64 {
        -(self.substitution_log_probs[from * self.allele_number + to] as f64) / PROFILE_PROB_SCALAR
    }

    /// Linear-space substitution probability
    pub fn substitution_prob(&self, from: usize, to: usize) -> f64 {
        self.substitution_log_prob(from, to).exp()
    }
}

/// The per-site reference view of a bubble graph used by the phasing HMM
#[derive(Clone, Debug)]
pub struct PhasingReference {
    /// One site per bubble, in bubble order
    sites: Vec<Site>,
    /// Total allele count across sites
    total_alleles: usize,
}

impl PhasingReference {
    /// Builds the site list parallel to the bubble graph.
    /// # Arguments
    /// * `graph` - the scored bubble graph
    /// * `params` - supplies the het substitution probability
    pub fn from_bubble_graph(graph: &BubbleGraph, params: &PolishParams) -> Self {
        let off_diagonal = (-params.het_substitution_probability.ln() * PROFILE_PROB_SCALAR).round() as u16;

        let sites: Vec<Site> = graph.bubbles().iter()
            .map(|bubble| {
                let allele_number = bubble.allele_no();
                let mut substitution_log_probs = vec![0_u16; allele_number * allele_number];
                for from in 0..allele_number {
                    for to in 0..allele_number {
                        if from != to {
                            substitution_log_probs[from * allele_number + to] = off_diagonal;
                        }
                    }
                }

                Site {
                    allele_number,
                    allele_offset: bubble.allele_offset(),
                    allele_prior_log_probs: vec![0; allele_number],
                    substitution_log_probs
                }
            })
            .collect();

        Self {
            total_alleles: graph.total_alleles(),
            sites
        }
    }

    /// Number of sites
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    // getters
    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    pub fn total_alleles(&self) -> usize {
        self.total_alleles
    }
}

/// Projects the bubble graph's support matrix into per-read profile sequences: for each
/// read, one byte per allele over the span of bubbles it touches, normalized per bubble
/// by the log-sum-exp across alleles.
/// # Arguments
/// * `graph` - the scored bubble graph
pub fn profile_seqs_from_bubble_graph(graph: &BubbleGraph) -> FxHashMap<usize, ProfileSeq> {
    // first pass: the last bubble each read is observed in
    let mut read_ends: FxHashMap<usize, usize> = Default::default();
    for (bubble_index, bubble) in graph.bubbles().iter().enumerate() {
        for substring in bubble.reads().iter() {
            read_ends.insert(substring.read_id(), bubble_index);
        }
    }

    // second pass: allocate on first sight and fill in the covered range
    let mut profiles: FxHashMap<usize, ProfileSeq> = Default::default();
    for (bubble_index, bubble) in graph.bubbles().iter().enumerate() {
        for (read_index, substring) in bubble.reads().iter().enumerate() {
            let read_id = substring.read_id();
            let profile = profiles.entry(read_id).or_insert_with(|| {
                let last_bubble = read_ends[&read_id];
                assert!(bubble_index <= last_bubble);
                let length = last_bubble - bubble_index + 1;
                let allele_count: usize = graph.bubbles()[bubble_index..=last_bubble].iter()
                    .map(|b| b.allele_no())
                    .sum();
                ProfileSeq {
                    read_id,
                    ref_start: bubble_index,
                    length,
                    allele_offset: bubble.allele_offset(),
                    profile_probs: vec![0; allele_count]
                }
            });

            assert!(bubble.allele_offset() >= profile.allele_offset);
            assert!(bubble_index < profile.ref_start + profile.length);

            // normalizing constant across the bubble's alleles for this read
            let mut total_log_prob = LOG_ZERO;
            for allele in 0..bubble.allele_no() {
                total_log_prob = log_add_exact(total_log_prob, bubble.support(allele, read_index));
            }

            let local_offset = bubble.allele_offset() - profile.allele_offset;
            for allele in 0..bubble.allele_no() {
                let log_prob = bubble.support(allele, read_index);
                let quantized = (PROFILE_PROB_SCALAR * (total_log_prob - log_prob)).round() as i64;
                assert!(quantized >= 0);
                profile.profile_probs[local_offset + allele] = quantized.min(255) as u8;
            }
        }
    }

    profiles
}

/// Scaffolding for phasing tests that build profiles and references directly
#[cfg(test)]
pub mod test_profiles {
    use super::*;

    /// A reference of `sites` biallelic sites with a mild het substitution penalty, so
    /// small synthetic read sets can still overcome it
    pub fn biallelic_reference(sites: usize) -> PhasingReference {
        let off_diagonal = (-(0.1_f64).ln() * PROFILE_PROB_SCALAR).round() as u16;
        let site_list: Vec<Site> = (0..sites)
            .map(|i| Site {
                allele_number: 2,
                allele_offset: i * 2,
                allele_prior_log_probs: vec![0, 0],
                substitution_log_probs: vec![0, off_diagonal, off_diagonal, 0]
            })
            .collect();
        PhasingReference {
            sites: site_list,
            total_alleles: sites * 2
        }
    }

    /// Direct profile construction from quantized bytes
    pub fn make_profile(read_id: usize, ref_start: usize, length: usize, allele_offset: usize, profile_probs: Vec<u8>) -> ProfileSeq {
        ProfileSeq {
            read_id, ref_start, length, allele_offset, profile_probs
        }
    }
}
