
use anyhow::ensure;
use derive_builder::Builder;

use crate::data_types::alphabet::Alphabet;

/// Active reads per HMM site are packed into a machine-word bitmask, so the coverage
/// cap can never exceed this; it is part of the public contract of the phaser.
pub const MAX_PARTITION_READS: usize = 64;

/// Parameters controlling bubble construction and allele scoring
#[derive(Builder, Clone, Debug)]
#[builder(default)]
pub struct PolishParams {
    /// if true, sequences are run-length compressed before scoring
    pub use_run_length_encoding: bool,
    /// if true, consensus alleles come from read substrings instead of POA enumeration
    pub use_read_alleles: bool,
    /// same toggle, but applied when the bubble graph is built for phasing
    pub use_read_alleles_in_phasing: bool,
    /// scale on the windowed coverage that sets per-position candidate thresholds
    pub candidate_variant_weight: f64,
    /// number of positions to trim around candidate variants when forming anchors
    pub column_anchor_trim: usize,
    /// budget on POA allele enumeration before the threshold is inflated
    pub max_consensus_strings: usize,
    /// low-quality read substrings are dropped while coverage still exceeds this
    pub filter_reads_while_have_at_least_this_coverage: usize,
    /// mean base quality below which a read substring can be dropped
    pub min_avg_base_quality: f64,
    /// if true, the alignment scorer should weigh repeat counts as well as characters
    pub use_repeat_counts_in_alignment: bool,
    /// the symbol set for base weights and enumeration
    pub alphabet: Alphabet,
    /// exclusive bound on repeat counts investigated per node
    pub max_repeat_count: usize,
    /// probability of a substitution between the two haplotypes at a het site
    pub het_substitution_probability: f64,
}

impl Default for PolishParams {
    fn default() -> Self {
        Self {
            use_run_length_encoding: true,
            use_read_alleles: false,
            use_read_alleles_in_phasing: true,
            candidate_variant_weight: 0.2,
            column_anchor_trim: 2,
            max_consensus_strings: 100,
            filter_reads_while_have_at_least_this_coverage: 50,
            min_avg_base_quality: 10.0,
            use_repeat_counts_in_alignment: false,
            alphabet: Alphabet::dna(),
            max_repeat_count: 51,
            het_substitution_probability: 0.0001,
        }
    }
}

/// Parameters controlling the read-partition HMM and downstream refinement
#[derive(Builder, Clone, Copy, Debug)]
#[builder(default)]
pub struct PhaseParams {
    /// coverage cap per HMM site; reads beyond this are filtered and later re-attached
    pub max_coverage_depth: usize,
    /// upper bound on greedy read-reassignment rounds
    pub rounds_of_iterative_refinement: usize,
    /// if true, emissions marginalize over an ancestor allele with substitution probabilities
    pub include_ancestor_sub_prob: bool,
    /// beam width on partition cells kept per HMM column
    pub max_partitions_per_column: usize,
}

impl Default for PhaseParams {
    fn default() -> Self {
        Self {
            max_coverage_depth: 64,
            rounds_of_iterative_refinement: 10,
            include_ancestor_sub_prob: true,
            max_partitions_per_column: 50,
        }
    }
}

impl PhaseParams {
    /// Validates the parameter bundle before phasing starts.
    /// # Errors
    /// * if the coverage cap is zero or exceeds the bitmask width
    /// * if the partition beam is empty
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.max_coverage_depth > 0, "max_coverage_depth must be > 0");
        ensure!(
            self.max_coverage_depth <= MAX_PARTITION_READS,
            "max_coverage_depth must be <= {MAX_PARTITION_READS} to fit the partition bitmask"
        );
        ensure!(self.max_partitions_per_column > 0, "max_partitions_per_column must be > 0");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_params_validation() {
        let params = PhaseParams::default();
        assert!(params.validate().is_ok());

        let too_deep = PhaseParamsBuilder::default()
            .max_coverage_depth(65)
            .build().unwrap();
        assert!(too_deep.validate().is_err());

        let zero_depth = PhaseParamsBuilder::default()
            .max_coverage_depth(0)
            .build().unwrap();
        assert!(zero_depth.validate().is_err());
    }

    #[test]
    fn test_builder_defaults() {
        let params = PolishParamsBuilder::default()
            .use_run_length_encoding(false)
            .build().unwrap();
        assert!(!params.use_run_length_encoding);
        assert_eq!(params.max_consensus_strings, 100);
    }
}
