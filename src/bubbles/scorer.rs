
use crate::data_types::rle_string::RleString;

/// The pair-HMM scoring seam. Implementations return the forward log-likelihood of
/// observing `read` given `allele`; the strand flag selects between the forward- and
/// reverse-strand state machines of the underlying aligner. Implementations must be
/// pure and reentrant.
pub trait AlignmentScorer: Sync {
    /// Log-likelihood of the read substring under the allele.
    /// # Arguments
    /// * `allele` - the candidate allele sequence
    /// * `read` - the read substring
    /// * `forward_strand` - selects the strand-specific model
    fn forward_log_prob(&self, allele: &RleString, read: &RleString, forward_strand: bool) -> f64;
}

/// Edit distance between the expansions of two RLE sequences, so run-length differences
/// count base-by-base. Single-row dynamic program with a carried diagonal.
/// # Arguments
/// * `allele` - the first sequence
/// * `read` - the second sequence
pub fn rle_edit_distance(allele: &RleString, read: &RleString) -> usize {
    let allele_seq = allele.expand();
    let read_seq = read.expand();

    // costs[j] holds the distance between the read prefix consumed so far and the
    // allele prefix of length j
    let mut costs: Vec<usize> = (0..=allele_seq.len()).collect();
    for (i, &read_base) in read_seq.iter().enumerate() {
        let mut diagonal = costs[0];
        costs[0] = i + 1;
        for (j, &allele_base) in allele_seq.iter().enumerate() {
            let substituted = diagonal + usize::from(read_base != allele_base);
            diagonal = costs[j + 1];
            costs[j + 1] = substituted
                .min(diagonal + 1)
                .min(costs[j] + 1);
        }
    }

    costs[allele_seq.len()]
}

/// A strand-symmetric scorer backed by edit distance over the expanded sequences:
/// matched positions contribute `ln(1 - error_rate)`, each edit contributes
/// `ln(error_rate / 3)`. Coarse compared to a full pair-HMM, but monotone in edit
/// distance, which is all the bubble ranking relies on.
#[derive(Clone, Copy, Debug)]
pub struct EditDistanceScorer {
    /// Per-base error probability
    error_rate: f64,
}

impl EditDistanceScorer {
    pub fn new(error_rate: f64) -> Self {
        assert!(error_rate > 0.0 && error_rate < 1.0);
        Self { error_rate }
    }
}

impl Default for EditDistanceScorer {
    fn default() -> Self {
        Self::new(0.05)
    }
}

impl AlignmentScorer for EditDistanceScorer {
    fn forward_log_prob(&self, allele: &RleString, read: &RleString, _forward_strand: bool) -> f64 {
        let distance = rle_edit_distance(allele, read);
        let matched = allele.expanded_len().max(read.expanded_len()) - distance;

        matched as f64 * (1.0 - self.error_rate).ln() + distance as f64 * (self.error_rate / 3.0).ln()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rle_edit_distance() {
        let reference = RleString::new(b"ACGTT");
        let snv = RleString::new(b"ACCTT");
        let shuffled = RleString::new(b"CGAT");
        let empty = RleString::new(b"");

        assert_eq!(rle_edit_distance(&reference, &reference), 0);
        assert_eq!(rle_edit_distance(&reference, &snv), 1);
        assert_eq!(rle_edit_distance(&reference, &shuffled), 3);
        assert_eq!(rle_edit_distance(&reference, &empty), 5);
        assert_eq!(rle_edit_distance(&empty, &reference), 5);
        assert_eq!(rle_edit_distance(&empty, &empty), 0);
    }

    #[test]
    fn test_rle_edit_distance_counts_run_lengths() {
        // same compressed characters, different run lengths: one base of difference
        let short_run = RleString::new(b"AAAATAAAA");
        let long_run = RleString::new(b"AAAAATAAAA");
        assert!(short_run.eq_compressed(&long_run));
        assert_eq!(rle_edit_distance(&short_run, &long_run), 1);
        assert_eq!(rle_edit_distance(&long_run, &short_run), 1);
    }

    #[test]
    fn test_scorer_prefers_matching_allele() {
        let scorer = EditDistanceScorer::default();
        let allele_ref = RleString::new(b"ACGTACGT");
        let allele_alt = RleString::new(b"ACGAACGT");

        let read = RleString::new(b"ACGAACGT");
        let ref_score = scorer.forward_log_prob(&allele_ref, &read, true);
        let alt_score = scorer.forward_log_prob(&allele_alt, &read, true);
        assert!(alt_score > ref_score);
    }

    #[test]
    fn test_scorer_strand_symmetric() {
        let scorer = EditDistanceScorer::default();
        let allele = RleString::new(b"ACGT");
        let read = RleString::new(b"ACCT");
        assert_eq!(
            scorer.forward_log_prob(&allele, &read, true),
            scorer.forward_log_prob(&allele, &read, false)
        );
    }
}
