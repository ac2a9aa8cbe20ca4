
use log::debug;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::phasing::profile_seq::{byte_to_prob, PhasingReference, ProfileSeq};
use crate::phasing::read_partition_hmm::{PathColumn, PhasedPath};
use crate::util::log_math::{log_add_exact, LOG_ZERO};

/// The phased output over one reference span: two haplotype allele strings, per-site
/// posteriors, an ancestor allele per site, and the two disjoint read partitions.
#[derive(Clone, Debug, Default)]
pub struct GenomeFragment {
    /// First site of the span, in bubble indices
    ref_start: usize,
    /// Number of sites spanned
    length: usize,
    /// Allele index per site for the first haplotype
    haplotype1: Vec<usize>,
    /// Allele index per site for the second haplotype
    haplotype2: Vec<usize>,
    /// Most probable ancestral allele per site
    ancestor: Vec<usize>,
    /// Posterior of the first haplotype's allele choice per site
    haplotype_probs1: Vec<f64>,
    /// Posterior of the second haplotype's allele choice per site
    haplotype_probs2: Vec<f64>,
    /// Posterior of the joint genotype per site
    genotype_probs: Vec<f64>,
    /// Read ids assigned to the first haplotype
    reads1: FxHashSet<usize>,
    /// Read ids assigned to the second haplotype
    reads2: FxHashSet<usize>,
}

impl GenomeFragment {
    /// The empty fragment spanning no sites, returned for empty alignments
    pub fn empty() -> Self {
        Default::default()
    }

    /// Derives the fragment from a traced path: per-site haplotypes from each column's
    /// oriented partition, and read sets from the per-read bits.
    /// # Arguments
    /// * `path` - the HMM traceback
    /// * `profiles` - profile sequences by read id
    /// * `reference` - per-site allele bookkeeping
    /// * `include_ancestor_sub_prob` - emission model flag, as used by the HMM
    pub fn from_path(
        path: &PhasedPath, profiles: &FxHashMap<usize, ProfileSeq>, reference: &PhasingReference,
        include_ancestor_sub_prob: bool
    ) -> Self {
        let mut fragment = Self {
            ref_start: path.ref_start,
            length: path.length,
            haplotype1: vec![0; path.length],
            haplotype2: vec![0; path.length],
            ancestor: vec![0; path.length],
            haplotype_probs1: vec![0.0; path.length],
            haplotype_probs2: vec![0.0; path.length],
            genotype_probs: vec![0.0; path.length],
            reads1: Default::default(),
            reads2: Default::default()
        };

        for column in path.columns.iter() {
            fragment.fill_in_predicted_genome(column, profiles, reference, include_ancestor_sub_prob);
            for (position, &read_id) in column.read_ids.iter().enumerate() {
                if (column.partition >> position) & 1 == 0 {
                    fragment.reads1.insert(read_id);
                } else {
                    fragment.reads2.insert(read_id);
                }
            }
        }

        fragment
    }

    /// Re-derives the haplotype pair, ancestor, and posteriors at one site from the
    /// column's oriented partition by maximizing over (ancestor, allele1, allele2).
    /// # Arguments
    /// * `column` - the path column for the site
    /// * `profiles` - profile sequences by read id
    /// * `reference` - per-site allele bookkeeping
    /// * `include_ancestor_sub_prob` - marginalize through the ancestor model when true
    pub fn fill_in_predicted_genome(
        &mut self, column: &PathColumn, profiles: &FxHashMap<usize, ProfileSeq>,
        reference: &PhasingReference, include_ancestor_sub_prob: bool
    ) {
        let site = &reference.sites()[column.site_index];
        let allele_number = site.allele_number();
        let offset = column.site_index - self.ref_start;

        // per-side read support sums per allele
        let mut side1 = vec![0.0; allele_number];
        let mut side2 = vec![0.0; allele_number];
        for (position, &read_id) in column.read_ids.iter().enumerate() {
            let seq = &profiles[&read_id];
            let side = if (column.partition >> position) & 1 == 0 { &mut side1 } else { &mut side2 };
            for (allele, slot) in side.iter_mut().enumerate() {
                *slot += seq.allele_log_prob(site.allele_offset(), allele);
            }
        }

        // score every (ancestor, allele1, allele2) combination; the ancestor dimension
        // collapses to a single slot when the substitution model is off
        let score_of = |ancestor: usize, allele1: usize, allele2: usize| -> f64 {
            if include_ancestor_sub_prob {
                site.prior_log_prob(ancestor)
                    + site.substitution_log_prob(ancestor, allele1) + side1[allele1]
                    + site.substitution_log_prob(ancestor, allele2) + side2[allele2]
            } else {
                site.prior_log_prob(allele1) + side1[allele1]
                    + site.prior_log_prob(allele2) + side2[allele2]
            }
        };
        let ancestor_count = if include_ancestor_sub_prob { allele_number } else { 1 };

        let mut best_score = LOG_ZERO;
        let mut best = (0, 0, 0);
        let mut total = LOG_ZERO;
        for ancestor in 0..ancestor_count {
            for allele1 in 0..allele_number {
                for allele2 in 0..allele_number {
                    let score = score_of(ancestor, allele1, allele2);
                    total = log_add_exact(total, score);
                    if score > best_score {
                        best_score = score;
                        best = (ancestor, allele1, allele2);
                    }
                }
            }
        }
        let (best_ancestor, best_allele1, best_allele2) = best;

        // genotype posterior marginalizes ancestors at the chosen allele pair; each
        // haplotype posterior marginalizes the other side as well
        let mut genotype_sum = LOG_ZERO;
        let mut hap1_sum = LOG_ZERO;
        let mut hap2_sum = LOG_ZERO;
        for ancestor in 0..ancestor_count {
            for allele1 in 0..allele_number {
                for allele2 in 0..allele_number {
                    let score = score_of(ancestor, allele1, allele2);
                    if allele1 == best_allele1 && allele2 == best_allele2 {
                        genotype_sum = log_add_exact(genotype_sum, score);
                    }
                    if allele1 == best_allele1 {
                        hap1_sum = log_add_exact(hap1_sum, score);
                    }
                    if allele2 == best_allele2 {
                        hap2_sum = log_add_exact(hap2_sum, score);
                    }
                }
            }
        }

        self.haplotype1[offset] = best_allele1;
        self.haplotype2[offset] = best_allele2;
        self.ancestor[offset] = best_ancestor;
        self.genotype_probs[offset] = (genotype_sum - total).exp();
        self.haplotype_probs1[offset] = (hap1_sum - total).exp();
        self.haplotype_probs2[offset] = (hap2_sum - total).exp();
    }

    /// True if the site's two haplotype alleles differ
    pub fn is_het_site(&self, offset: usize) -> bool {
        self.haplotype1[offset] != self.haplotype2[offset]
    }

    // getters
    pub fn ref_start(&self) -> usize {
        self.ref_start
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn haplotype1(&self) -> &[usize] {
        &self.haplotype1
    }

    pub fn haplotype2(&self) -> &[usize] {
        &self.haplotype2
    }

    pub fn ancestor(&self) -> &[usize] {
        &self.ancestor
    }

    pub fn haplotype_probs1(&self) -> &[f64] {
        &self.haplotype_probs1
    }

    pub fn haplotype_probs2(&self) -> &[f64] {
        &self.haplotype_probs2
    }

    pub fn genotype_probs(&self) -> &[f64] {
        &self.genotype_probs
    }

    pub fn reads1(&self) -> &FxHashSet<usize> {
        &self.reads1
    }

    pub fn reads2(&self) -> &FxHashSet<usize> {
        &self.reads2
    }
}

/// Expected probability of the read given a haplotype string: over the read's covered
/// sites, the substitution model is averaged under the read's quantized profile row.
/// # Arguments
/// * `haplotype` - allele index per site over the fragment span
/// * `ref_start` - first site of the span
/// * `length` - number of sites in the span
/// * `profile` - the read's profile sequence
/// * `reference` - per-site allele bookkeeping
pub fn log_prob_of_read_given_haplotype(
    haplotype: &[usize], ref_start: usize, length: usize, profile: &ProfileSeq,
    reference: &PhasingReference
) -> f64 {
    let mut total_prob = 0.0;
    for site_offset in 0..profile.length() {
        let site_index = site_offset + profile.ref_start();
        if site_index < ref_start || site_index >= ref_start + length {
            continue;
        }
        let site = &reference.sites()[site_index];
        let hap_allele = haplotype[site_index - ref_start];

        // expectation of a match under the read's profile row
        for allele in 0..site.allele_number() {
            total_prob += site.substitution_prob(hap_allele, allele)
                * byte_to_prob(profile.profile_byte(site.allele_offset(), allele));
        }
    }
    total_prob
}

/// The read ids in `read_set` whose profiles better match the second haplotype string
fn reads_preferring_other_haplotype(
    haplotype_current: &[usize], haplotype_other: &[usize], ref_start: usize, length: usize,
    read_set: &FxHashSet<usize>, profiles: &FxHashMap<usize, ProfileSeq>, reference: &PhasingReference
) -> FxHashSet<usize> {
    read_set.iter()
        .filter(|&&read_id| {
            let profile = &profiles[&read_id];
            let current = log_prob_of_read_given_haplotype(haplotype_current, ref_start, length, profile, reference);
            let other = log_prob_of_read_given_haplotype(haplotype_other, ref_start, length, profile, reference);
            other > current
        })
        .copied()
        .collect()
}

/// Greedily and iteratively re-partitions reads between the two haplotypes: each round
/// flips every read that better matches the other haplotype (all at once), XORs the
/// flips into the path partitions, and re-derives the haplotype strings at every site.
/// Stops at a fixed point or after `max_iterations` rounds.
/// # Arguments
/// * `fragment` - the fragment being refined, updated in place
/// * `path` - the traced path; partitions are updated in place
/// * `profiles` - profile sequences by read id
/// * `reference` - per-site allele bookkeeping
/// * `include_ancestor_sub_prob` - emission model flag for the re-derivation
/// * `max_iterations` - bound on refinement rounds
pub fn refine_genome_fragment(
    fragment: &mut GenomeFragment, path: &mut PhasedPath, profiles: &FxHashMap<usize, ProfileSeq>,
    reference: &PhasingReference, include_ancestor_sub_prob: bool, max_iterations: usize
) {
    for iteration in 0..max_iterations {
        let reads1_to_2 = reads_preferring_other_haplotype(
            &fragment.haplotype1, &fragment.haplotype2, fragment.ref_start, fragment.length,
            &fragment.reads1, profiles, reference
        );
        let reads2_to_1 = reads_preferring_other_haplotype(
            &fragment.haplotype2, &fragment.haplotype1, fragment.ref_start, fragment.length,
            &fragment.reads2, profiles, reference
        );

        debug!("At iteration {} of partition refinement found {} reads from partition 1 switching to 2 and {} reads from partition 2 switching to 1",
            iteration, reads1_to_2.len(), reads2_to_1.len());
        if reads1_to_2.is_empty() && reads2_to_1.is_empty() {
            break;
        }

        // apply all flips simultaneously
        for read_id in reads1_to_2.iter() {
            fragment.reads1.remove(read_id);
            fragment.reads2.insert(*read_id);
        }
        for read_id in reads2_to_1.iter() {
            fragment.reads2.remove(read_id);
            fragment.reads1.insert(*read_id);
        }

        // XOR the flipping reads into each column partition, then re-derive the site
        for column in path.columns.iter_mut() {
            for (position, read_id) in column.read_ids.iter().enumerate() {
                if reads1_to_2.contains(read_id) || reads2_to_1.contains(read_id) {
                    column.partition ^= 1 << position;
                }
            }
            fragment.fill_in_predicted_genome(column, profiles, reference, include_ancestor_sub_prob);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phasing::profile_seq::test_profiles::{biallelic_reference, make_profile};

    /// Four reads over two biallelic sites: reads 0, 1 carry allele 0 and reads 2, 3
    /// carry allele 1; read 3 starts on the wrong side of the partition.
    fn misassigned_setup() -> (PhasedPath, FxHashMap<usize, ProfileSeq>, PhasingReference) {
        let reference = biallelic_reference(2);
        let profiles: FxHashMap<usize, ProfileSeq> = (0..4)
            .map(|read_id| {
                let bytes: Vec<u8> = if read_id < 2 {
                    vec![0, 90, 0, 90]
                } else {
                    vec![90, 0, 90, 0]
                };
                (read_id, make_profile(read_id, 0, 2, 0, bytes))
            })
            .collect();

        // read 2 on side 2, read 3 erroneously on side 1
        let columns = (0..2)
            .map(|site_index| PathColumn {
                site_index,
                read_ids: vec![0, 1, 2, 3],
                partition: 0b0100
            })
            .collect();
        let path = PhasedPath {
            ref_start: 0,
            length: 2,
            columns
        };

        (path, profiles, reference)
    }

    #[test]
    fn test_from_path_derives_haplotypes() {
        let (path, profiles, reference) = misassigned_setup();
        let fragment = GenomeFragment::from_path(&path, &profiles, &reference, true);

        assert_eq!(fragment.ref_start(), 0);
        assert_eq!(fragment.length(), 2);
        // side 1 is dominated by allele-0 reads, side 2 holds the lone allele-1 read
        assert_eq!(fragment.haplotype1(), &[0, 0]);
        assert_eq!(fragment.haplotype2(), &[1, 1]);
        assert!(fragment.is_het_site(0));

        // partition sets reflect the oriented bits
        assert!(fragment.reads1().contains(&0));
        assert!(fragment.reads1().contains(&3));
        assert!(fragment.reads2().contains(&2));

        // posteriors are proper probabilities
        for offset in 0..2 {
            assert!(fragment.genotype_probs()[offset] > 0.0 && fragment.genotype_probs()[offset] <= 1.0);
            assert!(fragment.haplotype_probs1()[offset] > 0.0 && fragment.haplotype_probs1()[offset] <= 1.0);
        }
    }

    #[test]
    fn test_refiner_converges_in_one_iteration() {
        let (mut path, profiles, reference) = misassigned_setup();
        let mut fragment = GenomeFragment::from_path(&path, &profiles, &reference, true);
        assert!(fragment.reads1().contains(&3));

        refine_genome_fragment(&mut fragment, &mut path, &profiles, &reference, true, 10);

        // the mis-assigned read moved over and the haplotypes are unchanged
        assert_eq!(fragment.reads1().len(), 2);
        assert_eq!(fragment.reads2().len(), 2);
        assert!(fragment.reads2().contains(&2));
        assert!(fragment.reads2().contains(&3));
        assert_eq!(fragment.haplotype1(), &[0, 0]);
        assert_eq!(fragment.haplotype2(), &[1, 1]);

        // partitions in the path were updated to match
        for column in path.columns.iter() {
            assert_eq!(column.partition, 0b1100);
        }

        // read partitions stay disjoint and complete
        assert!(fragment.reads1().is_disjoint(fragment.reads2()));
        assert_eq!(fragment.reads1().len() + fragment.reads2().len(), 4);
    }

    #[test]
    fn test_log_prob_of_read_given_haplotype() {
        let reference = biallelic_reference(2);
        let profile = make_profile(0, 0, 2, 0, vec![0, 90, 0, 90]);

        // an allele-0 read strongly prefers the all-0 haplotype
        let matching = log_prob_of_read_given_haplotype(&[0, 0], 0, 2, &profile, &reference);
        let mismatching = log_prob_of_read_given_haplotype(&[1, 1], 0, 2, &profile, &reference);
        assert!(matching > mismatching);
    }

    #[test]
    fn test_empty_fragment() {
        let fragment = GenomeFragment::empty();
        assert_eq!(fragment.length(), 0);
        assert!(fragment.reads1().is_empty());
        assert!(fragment.reads2().is_empty());
    }
}
