
use log::{debug, info};
use rustc_hash::FxHashMap;

use crate::bubbles::allele_enumeration::enumerate_alleles;
use crate::bubbles::candidate_sites::{anchor_positions, candidate_weights};
use crate::bubbles::scorer::AlignmentScorer;
use crate::data_types::parameters::PolishParams;
use crate::data_types::poa::{Poa, PoaNode};
use crate::data_types::reads::{ReadSubstring, SequencingRead, NO_QUALITY};
use crate::data_types::rle_string::RleString;
use crate::data_types::vcf_entry::{ReadVcfEntrySubstrings, VcfEntry};

/// A candidate variant interval on the reference together with its allele set, the read
/// substrings spanning it, and the read-vs-allele support matrix.
#[derive(Clone, Debug)]
pub struct Bubble {
    /// First reference node of the interval
    ref_start: usize,
    /// Length of the interval on the reference
    bubble_length: usize,
    /// The reference's own allele over the interval
    ref_allele: RleString,
    /// Candidate alleles; always contains the reference allele
    alleles: Vec<RleString>,
    /// Read substrings spanning the interval
    reads: Vec<ReadSubstring>,
    /// Row-major log-likelihoods: entry `a * reads.len() + k` supports allele `a` from read `k`
    allele_read_supports: Vec<f64>,
    /// Offsets within the bubble corresponding to called variant positions
    variant_position_offsets: Vec<usize>,
    /// Prefix sum of allele counts over preceding bubbles
    allele_offset: usize,
}

impl Bubble {
    /// Number of candidate alleles
    pub fn allele_no(&self) -> usize {
        self.alleles.len()
    }

    /// Number of spanning read substrings
    pub fn read_no(&self) -> usize {
        self.reads.len()
    }

    /// Support matrix lookup.
    /// # Arguments
    /// * `allele` - allele index
    /// * `read` - read index within this bubble
    pub fn support(&self, allele: usize, read: usize) -> f64 {
        self.allele_read_supports[allele * self.reads.len() + read]
    }

    /// Index of the allele equal (RLE-expanded) to the reference allele, if present
    pub fn reference_allele_index(&self) -> Option<usize> {
        self.alleles.iter().position(|a| *a == self.ref_allele)
    }

    /// Total log-likelihood of an allele across all spanning reads
    pub fn log_likelihood_of_allele(&self, allele: usize) -> f64 {
        (0..self.reads.len()).map(|k| self.support(allele, k)).sum()
    }

    /// Index of the allele with the highest total read support
    pub fn highest_likelihood_allele(&self) -> usize {
        assert!(!self.alleles.is_empty());
        (0..self.alleles.len())
            .max_by(|&a, &b| {
                self.log_likelihood_of_allele(a).total_cmp(&self.log_likelihood_of_allele(b))
            })
            .unwrap()
    }

    /// Per-allele strand skew: the normalized difference between average forward- and
    /// reverse-strand support. A quality signal only.
    /// # Arguments
    /// * `reads` - the read list backing the substrings
    pub fn strand_skews(&self, reads: &[SequencingRead]) -> Vec<f64> {
        let allele_no = self.alleles.len();
        let mut forward_supports = vec![0.0; allele_no];
        let mut reverse_supports = vec![0.0; allele_no];
        let mut total_forward = 0_usize;
        let mut total_reverse = 0_usize;

        for (k, substring) in self.reads.iter().enumerate() {
            let forward = reads[substring.read_id()].forward_strand();
            let supports = if forward {
                total_forward += 1;
                &mut forward_supports
            } else {
                total_reverse += 1;
                &mut reverse_supports
            };
            for (j, slot) in supports.iter_mut().enumerate() {
                *slot += self.support(j, k);
            }
        }

        (0..allele_no)
            .map(|j| {
                let forward_mean = forward_supports[j] / total_forward as f64;
                let reverse_mean = reverse_supports[j] / total_reverse as f64;
                let combined = (forward_supports[j] + reverse_supports[j]).abs()
                    / (total_forward + total_reverse) as f64;
                (forward_mean - reverse_mean) / combined
            })
            .collect()
    }

    // getters
    pub fn ref_start(&self) -> usize {
        self.ref_start
    }

    pub fn bubble_length(&self) -> usize {
        self.bubble_length
    }

    pub fn ref_allele(&self) -> &RleString {
        &self.ref_allele
    }

    pub fn alleles(&self) -> &[RleString] {
        &self.alleles
    }

    pub fn reads(&self) -> &[ReadSubstring] {
        &self.reads
    }

    pub fn allele_read_supports(&self) -> &[f64] {
        &self.allele_read_supports
    }

    pub fn variant_position_offsets(&self) -> &[usize] {
        &self.variant_position_offsets
    }

    pub fn allele_offset(&self) -> usize {
        self.allele_offset
    }
}

/// The ordered, disjoint bubbles over one reference chunk. Between any two bubbles the
/// reference is an anchor region in which all reads agree.
#[derive(Clone, Debug)]
pub struct BubbleGraph {
    /// The reference backing the graph; absent in VCF-driven mode
    ref_string: Option<RleString>,
    /// Bubbles sorted by ascending `ref_start`
    bubbles: Vec<Bubble>,
    /// Total allele count across all bubbles
    total_alleles: usize,
}

impl BubbleGraph {
    /// Constructs the bubble graph from a POA: identify anchors, enumerate alleles between
    /// them, and score every spanning read against every allele.
    /// # Arguments
    /// * `poa` - the alignment; its observations get sorted in place
    /// * `reads` - the read list
    /// * `vcf_entries` - pre-called sites replacing the candidate detector, when present
    /// * `params` - bubble configuration
    /// * `scorer` - the pair-HMM seam
    /// * `phasing` - selects which read-allele toggle applies
    pub fn from_poa(
        poa: &mut Poa, reads: &[SequencingRead], vcf_entries: Option<&[VcfEntry]>,
        params: &PolishParams, scorer: &dyn AlignmentScorer, phasing: bool
    ) -> Self {
        let weights = candidate_weights(poa, params);
        debug!("Got avg. coverage: {:.3} for region of length: {}",
            poa.avg_coverage(0, poa.nodes().len()), poa.nodes().len());

        // observation lists must be sorted for the paired anchor walk below
        poa.sort_observations();

        let (anchors, candidate_positions) = anchor_positions(poa, &weights, vcf_entries, params);

        let use_read_alleles = if phasing {
            params.use_read_alleles_in_phasing
        } else {
            params.use_read_alleles
        };

        let mut bubbles: Vec<Bubble> = vec![];
        let mut p_anchor = 0; // the prefix node is the first anchor
        for i in 1..poa.nodes().len() {
            if !anchors[i] {
                continue;
            }
            assert!(i > p_anchor);
            if i - p_anchor != 1 {
                // non-adjacent anchors bound a potential bubble over nodes (p_anchor, i)
                let read_substrings = get_read_substrings(reads, poa, p_anchor + 1, i, params, true);
                if !read_substrings.is_empty() {
                    let mut alleles = enumerate_alleles(
                        poa, p_anchor + 1, i, &weights, params, use_read_alleles, &read_substrings, reads
                    );

                    // nodes are offset one from the reference due to the prefix node
                    let ref_substring = poa.ref_string().substring(p_anchor, i - 1 - p_anchor);
                    let expanded_ref = ref_substring.expand();
                    if !alleles.iter().any(|a| *a == expanded_ref) {
                        alleles.push(expanded_ref);
                    }

                    if alleles.len() > 1 {
                        let ref_start = p_anchor + 1;
                        let bubble_length = i - 1 - p_anchor;
                        let variant_position_offsets: Vec<usize> = (0..bubble_length)
                            .filter(|&vp| candidate_positions[ref_start + vp])
                            .collect();

                        let rle_alleles: Vec<RleString> = alleles.iter()
                            .map(|a| RleString::from_expanded(a, params.use_run_length_encoding))
                            .collect();
                        let allele_read_supports = compute_allele_read_supports(
                            &rle_alleles, &read_substrings, reads, scorer
                        );

                        bubbles.push(Bubble {
                            ref_start,
                            bubble_length,
                            ref_allele: ref_substring,
                            alleles: rle_alleles,
                            reads: read_substrings,
                            allele_read_supports,
                            variant_position_offsets,
                            allele_offset: 0
                        });
                    }
                }
            }
            p_anchor = i;
        }

        let mut graph = Self {
            ref_string: Some(poa.ref_string().clone()),
            bubbles,
            total_alleles: 0
        };
        graph.finalize_offsets();
        graph
    }

    /// Constructs the bubble graph directly from pre-called sites and their per-read
    /// substrings, one bubble per usable site. Returns the graph and the indices of the
    /// sites that produced bubbles, in bubble order.
    /// # Arguments
    /// * `reads` - the read list
    /// * `entry_substrings` - per-read site substrings, parallel to `reads`
    /// * `entries` - the pre-called sites
    /// * `params` - bubble configuration
    /// * `scorer` - the pair-HMM seam
    pub fn from_vcf_entries(
        reads: &[SequencingRead], entry_substrings: &[ReadVcfEntrySubstrings], entries: &[VcfEntry],
        params: &PolishParams, scorer: &dyn AlignmentScorer
    ) -> (Self, Vec<usize>) {
        let substrings_by_entry = group_substrings_by_entry(reads, entry_substrings, entries.len(), params);

        let mut bubbles: Vec<Bubble> = vec![];
        let mut used_entries: Vec<usize> = vec![];
        let mut entries_without_substrings = 0_usize;
        for (entry_index, entry) in entries.iter().enumerate() {
            let read_substrings = &substrings_by_entry[entry_index];
            if read_substrings.is_empty() {
                // nothing to phase with
                entries_without_substrings += 1;
                continue;
            }

            let ref_allele = re_encode(entry.ref_allele(), params.use_run_length_encoding);
            let alleles: Vec<RleString> = entry.alleles().iter()
                .map(|a| re_encode(a, params.use_run_length_encoding))
                .collect();
            let allele_read_supports = compute_allele_read_supports(&alleles, read_substrings, reads, scorer);

            bubbles.push(Bubble {
                ref_start: entry.ref_aln_start(),
                bubble_length: entry.ref_aln_stop_incl() - entry.ref_aln_start(),
                ref_allele,
                alleles,
                reads: read_substrings.clone(),
                allele_read_supports,
                variant_position_offsets: vec![entry.ref_pos()],
                allele_offset: 0
            });
            used_entries.push(entry_index);
        }

        if entries_without_substrings > 0 {
            info!("Skipped {entries_without_substrings} of {} called sites with no spanning read substrings",
                entries.len());
        }

        let mut graph = Self {
            ref_string: None,
            bubbles,
            total_alleles: 0
        };
        graph.finalize_offsets();
        (graph, used_entries)
    }

    /// Fills in the per-bubble allele offsets and the graph's total allele count
    fn finalize_offsets(&mut self) {
        let mut allele_offset = 0;
        for bubble in self.bubbles.iter_mut() {
            bubble.allele_offset = allele_offset;
            allele_offset += bubble.alleles.len();
        }
        self.total_alleles = allele_offset;
    }

    /// Per-bubble argmax of total read support, the most-supported path through the graph
    pub fn consensus_path(&self) -> Vec<usize> {
        self.bubbles.iter().map(|b| b.highest_likelihood_allele()).collect()
    }

    /// Fraction of bubbles whose phased strand skew p-value falls below 0.05
    /// # Arguments
    /// * `reads` - the read list
    /// * `reads1` - read ids assigned to the first haplotype
    /// * `reads2` - read ids assigned to the second haplotype
    pub fn skewed_bubble_fraction(
        &self, reads: &[SequencingRead],
        reads1: &rustc_hash::FxHashSet<usize>, reads2: &rustc_hash::FxHashSet<usize>
    ) -> f64 {
        let skewed = self.bubbles.iter()
            .filter(|b| b.phased_strand_skew(reads, reads1, reads2) < 0.05)
            .count();
        skewed as f64 / self.bubbles.len() as f64
    }

    /// Number of bubbles
    pub fn len(&self) -> usize {
        self.bubbles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bubbles.is_empty()
    }

    // getters
    pub fn bubbles(&self) -> &[Bubble] {
        &self.bubbles
    }

    pub fn ref_string(&self) -> Option<&RleString> {
        self.ref_string.as_ref()
    }

    pub fn total_alleles(&self) -> usize {
        self.total_alleles
    }
}

impl Bubble {
    /// Binomial p-value for strand/haplotype association at this bubble: of the spanning
    /// reads that were phased, counts forward-strand reads in haplotype 1 plus
    /// reverse-strand reads in haplotype 2.
    /// # Arguments
    /// * `reads` - the read list
    /// * `reads1` - read ids assigned to the first haplotype
    /// * `reads2` - read ids assigned to the second haplotype
    pub fn phased_strand_skew(
        &self, reads: &[SequencingRead],
        reads1: &rustc_hash::FxHashSet<usize>, reads2: &rustc_hash::FxHashSet<usize>
    ) -> f64 {
        let mut phased = 0_usize;
        let mut positives = 0_usize;
        for substring in self.reads.iter() {
            let read = &reads[substring.read_id()];
            if reads1.contains(&read.read_id()) {
                phased += 1;
                if read.forward_strand() {
                    positives += 1;
                }
            } else if reads2.contains(&read.read_id()) {
                phased += 1;
                if !read.forward_strand() {
                    positives += 1;
                }
            }
        }
        binomial_p_value(phased, positives)
    }
}

/// Tail probability P(X >= k) for X ~ Binomial(n, 1/2), folded so k is in the upper tail
pub fn binomial_p_value(n: usize, k: usize) -> f64 {
    if n == 0 {
        return 1.0;
    }
    let k = if k < n / 2 { n - k } else { k };

    let mut total = 0.0;
    for i in k..=n {
        // C(n, i) / 2^n in log space to avoid overflow at high coverage
        let mut log_term = -(n as f64) * std::f64::consts::LN_2;
        for j in 0..i {
            log_term += ((n - j) as f64).ln() - ((j + 1) as f64).ln();
        }
        total += log_term.exp();
    }
    total
}

/// Re-encodes an RLE string under the requested encoding flag
fn re_encode(rle: &RleString, use_run_length_encoding: bool) -> RleString {
    RleString::from_expanded(&rle.expand(), use_run_length_encoding)
}

/// Scores every read substring against every allele through the pair-HMM seam, with a
/// cache keyed by the substring's RLE-expanded identity: a repeated substring copies the
/// full allele column of its first occurrence.
/// # Arguments
/// * `alleles` - the candidate alleles
/// * `read_substrings` - the spanning read substrings
/// * `reads` - the read list
/// * `scorer` - the pair-HMM seam
pub fn compute_allele_read_supports(
    alleles: &[RleString], read_substrings: &[ReadSubstring], reads: &[SequencingRead],
    scorer: &dyn AlignmentScorer
) -> Vec<f64> {
    let read_no = read_substrings.len();
    let allele_no = alleles.len();
    let mut supports = vec![0.0; read_no * allele_no];

    let mut cached_scores: FxHashMap<RleString, usize> = Default::default();
    for (k, substring) in read_substrings.iter().enumerate() {
        let read = &reads[substring.read_id()];
        let rle = substring.rle_string(read);

        if let Some(&cached_index) = cached_scores.get(&rle) {
            for j in 0..allele_no {
                supports[j * read_no + k] = supports[j * read_no + cached_index];
            }
        } else {
            for (j, allele) in alleles.iter().enumerate() {
                supports[j * read_no + k] = scorer.forward_log_prob(allele, &rle, read.forward_strand());
            }
            cached_scores.insert(rle, k);
        }
    }

    supports
}

/// Walks past further observations of the same read
fn skip_dupes(node: &PoaNode, mut i: usize, read_id: usize) -> usize {
    while i < node.observations.len() && node.observations[i].read_id == read_id {
        i += 1;
    }
    i
}

/// Gets the substrings of reads aligned to the node interval `[from, to)`, using the POA
/// observation offsets. Bubbles at the graph boundaries take read prefixes/suffixes;
/// interior bubbles require the read to be observed at both bounding anchors.
/// # Arguments
/// * `reads` - the read list
/// * `poa` - the alignment with sorted observations
/// * `from` - first node of the interval
/// * `to` - closing anchor node (exclusive interval end)
/// * `params` - supplies the quality filter configuration
/// * `should_filter` - if true, low-quality substrings are dropped above the coverage floor
pub fn get_read_substrings(
    reads: &[SequencingRead], poa: &Poa, from: usize, to: usize,
    params: &PolishParams, should_filter: bool
) -> Vec<ReadSubstring> {
    let mut substrings: Vec<ReadSubstring> = vec![];

    if from == 0 {
        if to >= poa.nodes().len() {
            // the interval bounds the complete alignment, take whole reads
            for read in reads.iter() {
                substrings.push(read.substring(0, read.rle_read().len()));
            }
        } else {
            // read prefixes ending at `to`
            let node = &poa.nodes()[to];
            let mut i = 0;
            while i < node.observations.len() {
                let obs = node.observations[i];
                substrings.push(reads[obs.read_id].substring(0, obs.offset));
                i = skip_dupes(node, i + 1, obs.read_id);
            }
        }
    } else if to >= poa.nodes().len() {
        // read suffixes starting at `from`
        let node = &poa.nodes()[from];
        let mut i = 0;
        while i < node.observations.len() {
            let obs = node.observations[i];
            let read = &reads[obs.read_id];
            substrings.push(read.substring(obs.offset, read.rle_read().len() - obs.offset));
            i = skip_dupes(node, i + 1, obs.read_id);
        }
    } else {
        // interior interval: reads observed at both bounding nodes
        let from_node = &poa.nodes()[from];
        let to_node = &poa.nodes()[to];
        let mut i = 0;
        let mut j = 0;
        while i < from_node.observations.len() && j < to_node.observations.len() {
            let obs_from = from_node.observations[i];
            let obs_to = to_node.observations[j];
            match obs_from.read_id.cmp(&obs_to.read_id) {
                std::cmp::Ordering::Equal => {
                    if obs_to.offset > obs_from.offset {
                        substrings.push(reads[obs_from.read_id]
                            .substring(obs_from.offset, obs_to.offset - obs_from.offset));
                    }
                    i = skip_dupes(from_node, i + 1, obs_from.read_id);
                    j = skip_dupes(to_node, j + 1, obs_to.read_id);
                },
                std::cmp::Ordering::Less => {
                    i = skip_dupes(from_node, i + 1, obs_from.read_id);
                },
                std::cmp::Ordering::Greater => {
                    j = skip_dupes(to_node, j + 1, obs_to.read_id);
                }
            }
        }
    }

    if should_filter {
        filter_read_substrings(substrings, params)
    } else {
        substrings
    }
}

/// Sorts substrings by descending quality and drops the lowest-quality entries while
/// coverage still exceeds the configured floor and the candidate's quality is below the
/// minimum. Substrings without qualities are never dropped.
/// # Arguments
/// * `substrings` - the candidate read substrings
/// * `params` - supplies the coverage floor and quality minimum
pub fn filter_read_substrings(mut substrings: Vec<ReadSubstring>, params: &PolishParams) -> Vec<ReadSubstring> {
    substrings.sort_by(|a, b| b.qual_value().total_cmp(&a.qual_value()));

    while substrings.len() > params.filter_reads_while_have_at_least_this_coverage {
        let worst = substrings.last().unwrap();
        if worst.qual_value() >= params.min_avg_base_quality || worst.qual_value() == NO_QUALITY {
            break;
        }
        substrings.pop();
    }

    substrings
}

/// Inverts per-read site substrings into per-site read substring lists
fn group_substrings_by_entry(
    reads: &[SequencingRead], entry_substrings: &[ReadVcfEntrySubstrings], entry_count: usize,
    params: &PolishParams
) -> Vec<Vec<ReadSubstring>> {
    let mut by_entry: Vec<Vec<ReadSubstring>> = vec![vec![]; entry_count];
    for (read, site_substrings) in reads.iter().zip(entry_substrings.iter()) {
        for (entry_index, substring, qualities) in site_substrings.iter() {
            let rle = RleString::from_expanded(substring, params.use_run_length_encoding);
            let qualities = if qualities.is_empty() || qualities[0] == 0 {
                None
            } else {
                Some(qualities)
            };
            by_entry[entry_index].push(ReadSubstring::new_explicit(read.read_id(), rle, qualities));
        }
    }
    by_entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bubbles::scorer::EditDistanceScorer;
    use crate::data_types::poa::build_uniform_poa;
    use assert_approx_eq::assert_approx_eq;

    /// A reference with reads split between a ref-carrying and an alt-carrying group at
    /// one position; the mutated position also gets the matching POA weight signal.
    fn build_het_scenario() -> (Poa, Vec<SequencingRead>) {
        let reference = b"ACGTACGTACGTACG";
        let alt_position = 7; // reference position of the variant, a 'T' -> 'G'
        let read_count = 6;

        let mut poa = build_uniform_poa(reference, &(0..read_count).collect::<Vec<usize>>(), 1.0);
        // half the reads support 'G' at the variant node
        poa.nodes_mut()[alt_position + 1].base_weights[2] = 3.0;
        poa.nodes_mut()[alt_position + 1].base_weights[3] = 3.0;

        let reads: Vec<SequencingRead> = (0..read_count)
            .map(|read_id| {
                let mut sequence = reference.to_vec();
                if read_id % 2 == 1 {
                    sequence[alt_position] = b'G';
                }
                SequencingRead::new(
                    read_id, format!("read{read_id}"), read_id % 2 == 0,
                    RleString::new_no_rle(&sequence),
                    Some(vec![30; sequence.len()])
                )
            })
            .collect();

        (poa, reads)
    }

    #[test]
    fn test_from_poa_builds_het_bubble() {
        let (mut poa, reads) = build_het_scenario();
        let params = PolishParams {
            use_run_length_encoding: false,
            column_anchor_trim: 2,
            ..Default::default()
        };
        let scorer = EditDistanceScorer::default();

        let graph = BubbleGraph::from_poa(&mut poa, &reads, None, &params, &scorer, true);
        assert_eq!(graph.len(), 1);

        let bubble = &graph.bubbles()[0];
        // the reference allele is always present
        assert!(bubble.reference_allele_index().is_some());
        assert_eq!(bubble.allele_no(), 2);
        assert_eq!(bubble.read_no(), reads.len());
        assert_eq!(bubble.allele_read_supports().len(), bubble.allele_no() * bubble.read_no());

        // offsets invariant
        assert_eq!(bubble.allele_offset(), 0);
        assert_eq!(graph.total_alleles(), 2);
    }

    #[test]
    fn test_scorer_ranks_reads_to_alleles() {
        let (mut poa, reads) = build_het_scenario();
        let params = PolishParams {
            use_run_length_encoding: false,
            ..Default::default()
        };
        let scorer = EditDistanceScorer::default();

        let graph = BubbleGraph::from_poa(&mut poa, &reads, None, &params, &scorer, true);
        let bubble = &graph.bubbles()[0];
        let ref_allele = bubble.reference_allele_index().unwrap();
        let alt_allele = 1 - ref_allele;

        for (k, substring) in bubble.reads().iter().enumerate() {
            let is_alt_read = substring.read_id() % 2 == 1;
            let ref_support = bubble.support(ref_allele, k);
            let alt_support = bubble.support(alt_allele, k);
            if is_alt_read {
                assert!(alt_support > ref_support, "alt read {k} should prefer the alt allele");
            } else {
                assert!(ref_support > alt_support, "ref read {k} should prefer the ref allele");
            }
        }
    }

    #[test]
    fn test_allele_offsets_prefix_sum() {
        let (mut poa, reads) = build_het_scenario();
        // a second variant far from the first gives us two bubbles
        poa.nodes_mut()[3].base_weights[1] = 3.0;
        let reads: Vec<SequencingRead> = reads.into_iter()
            .map(|r| {
                let mut sequence = r.rle_read().expand();
                if r.read_id() % 2 == 1 {
                    sequence[2] = b'C';
                }
                SequencingRead::new(r.read_id(), r.read_name().to_string(), r.forward_strand(),
                    RleString::new_no_rle(&sequence), Some(vec![30; sequence.len()]))
            })
            .collect();

        let params = PolishParams {
            use_run_length_encoding: false,
            column_anchor_trim: 1,
            ..Default::default()
        };
        let scorer = EditDistanceScorer::default();
        let graph = BubbleGraph::from_poa(&mut poa, &reads, None, &params, &scorer, true);

        // offsets must be the prefix sums of allele counts, totalling the graph count
        let mut expected_offset = 0;
        for bubble in graph.bubbles().iter() {
            assert_eq!(bubble.allele_offset(), expected_offset);
            expected_offset += bubble.allele_no();
        }
        assert_eq!(graph.total_alleles(), expected_offset);
    }

    #[test]
    fn test_quality_filter() {
        let params = PolishParams {
            filter_reads_while_have_at_least_this_coverage: 2,
            min_avg_base_quality: 10.0,
            ..Default::default()
        };

        let reads: Vec<SequencingRead> = [40_u8, 5, 30, 3].iter().enumerate()
            .map(|(read_id, &qual)| {
                SequencingRead::new(read_id, format!("read{read_id}"), true,
                    RleString::new(b"ACGT"), Some(vec![qual; 4]))
            })
            .collect();
        let substrings: Vec<ReadSubstring> = reads.iter().map(|r| r.substring(0, 4)).collect();

        let filtered = filter_read_substrings(substrings, &params);
        // the two low-quality reads are dropped, stopping at the coverage floor
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|s| s.qual_value() >= 10.0));

        // reads without qualities survive filtering
        let no_qual_reads: Vec<SequencingRead> = (0..4)
            .map(|read_id| {
                SequencingRead::new(read_id, format!("read{read_id}"), true, RleString::new(b"ACGT"), None)
            })
            .collect();
        let no_qual_substrings: Vec<ReadSubstring> = no_qual_reads.iter().map(|r| r.substring(0, 4)).collect();
        assert_eq!(filter_read_substrings(no_qual_substrings, &params).len(), 4);
    }

    #[test]
    fn test_support_cache_consistency() {
        // two reads with identical substrings must get identical support columns
        let reads = vec![
            SequencingRead::new(0, "read0".to_string(), true, RleString::new(b"ACGT"), None),
            SequencingRead::new(1, "read1".to_string(), true, RleString::new(b"ACGT"), None),
        ];
        let substrings: Vec<ReadSubstring> = reads.iter().map(|r| r.substring(0, 4)).collect();
        let alleles = vec![RleString::new(b"ACGT"), RleString::new(b"AGGT")];

        let scorer = EditDistanceScorer::default();
        let supports = compute_allele_read_supports(&alleles, &substrings, &reads, &scorer);
        assert_approx_eq!(supports[0], supports[1]);
        assert_approx_eq!(supports[2], supports[3]);
    }

    #[test]
    fn test_consensus_path() {
        use crate::data_types::vcf_entry::{ReadVcfEntrySubstrings, VcfEntry};

        // two reads support the reference allele, one supports the alternate
        let entries = vec![
            VcfEntry::new("chr1".to_string(), 5, 40.0,
                vec![RleString::new(b"ACA"), RleString::new(b"AGA")],
                0, 1, 4, 7, 105),
        ];
        let reads = vec![
            SequencingRead::new(0, "read0".to_string(), true, RleString::new(b"ACA"), None),
            SequencingRead::new(1, "read1".to_string(), true, RleString::new(b"ACA"), None),
            SequencingRead::new(2, "read2".to_string(), false, RleString::new(b"AGA"), None),
        ];
        let entry_substrings: Vec<ReadVcfEntrySubstrings> = reads.iter()
            .map(|r| ReadVcfEntrySubstrings::new(vec![0], vec![r.rle_read().expand()], vec![vec![30, 30, 30]]))
            .collect();

        let params = PolishParams::default();
        let scorer = EditDistanceScorer::default();
        let (graph, _used) = BubbleGraph::from_vcf_entries(&reads, &entry_substrings, &entries, &params, &scorer);

        // the majority allele wins the consensus path
        assert_eq!(graph.consensus_path(), vec![0]);
        assert_eq!(graph.bubbles()[0].highest_likelihood_allele(), 0);
    }

    #[test]
    fn test_binomial_p_value() {
        assert_approx_eq!(binomial_p_value(0, 0), 1.0);
        // P(X >= 1) for 1 flip = 0.5, folded from k=0 or k=1 identically
        assert_approx_eq!(binomial_p_value(1, 1), 0.5);
        assert_approx_eq!(binomial_p_value(1, 0), 0.5);
        // P(X >= 4) over 4 fair flips = 1/16
        assert_approx_eq!(binomial_p_value(4, 4), 1.0 / 16.0);
        // balanced outcome keeps a high p-value
        assert!(binomial_p_value(10, 5) > 0.5);
        // extreme skew at depth 30 is tiny
        assert!(binomial_p_value(30, 30) < 1e-6);
    }

    #[test]
    fn test_vcf_driven_construction() {
        use crate::data_types::vcf_entry::{ReadVcfEntrySubstrings, VcfEntry};

        let entries = vec![
            VcfEntry::new("chr1".to_string(), 5, 40.0,
                vec![RleString::new(b"ACA"), RleString::new(b"AGA")],
                0, 1, 4, 7, 105),
        ];
        let reads = vec![
            SequencingRead::new(0, "read0".to_string(), true, RleString::new(b"ACA"), None),
            SequencingRead::new(1, "read1".to_string(), false, RleString::new(b"AGA"), None),
            SequencingRead::new(2, "read2".to_string(), true, RleString::new(b"TTT"), None),
        ];
        let entry_substrings = vec![
            ReadVcfEntrySubstrings::new(vec![0], vec![b"ACA".to_vec()], vec![vec![30, 30, 30]]),
            ReadVcfEntrySubstrings::new(vec![0], vec![b"AGA".to_vec()], vec![vec![30, 30, 30]]),
            ReadVcfEntrySubstrings::default(),
        ];

        let params = PolishParams::default();
        let scorer = EditDistanceScorer::default();
        let (graph, used) = BubbleGraph::from_vcf_entries(&reads, &entry_substrings, &entries, &params, &scorer);

        assert_eq!(graph.len(), 1);
        assert_eq!(used, vec![0]);
        let bubble = &graph.bubbles()[0];
        assert_eq!(bubble.variant_position_offsets(), &[5]);
        assert_eq!(bubble.read_no(), 2);

        // read0 prefers the ref allele, read1 the alt
        assert!(bubble.support(0, 0) > bubble.support(1, 0));
        assert!(bubble.support(1, 1) > bubble.support(0, 1));
    }
}
