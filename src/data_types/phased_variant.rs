
use std::cmp::Ordering;

/// A heterozygous phased variant as loaded from a VCF, the unit of the
/// phasing-correctness evaluation. `alleles[0]` is always the reference allele.
#[derive(Clone, Debug)]
pub struct PhasedVariant {
    /// Contig the variant sits on
    contig: String,
    /// 0-based position on the contig
    ref_pos: i64,
    /// QUAL from the record
    quality: f64,
    /// All alleles at the site, REF first
    alleles: Vec<String>,
    /// Allele index assigned to the first haplotype
    gt1: usize,
    /// Allele index assigned to the second haplotype
    gt2: usize,
    /// Phase-set identifier grouping co-phased variants
    phase_set: String,
}

impl PhasedVariant {
    /// General constructor; callers guarantee heterozygosity (`gt1 != gt2`).
    pub fn new(contig: String, ref_pos: i64, quality: f64, alleles: Vec<String>, gt1: usize, gt2: usize, phase_set: String) -> Self {
        assert_ne!(gt1, gt2, "phased variants must be heterozygous");
        assert!(gt1 < alleles.len() && gt2 < alleles.len(), "genotype indices must be in the allele list");
        Self {
            contig, ref_pos, quality, alleles, gt1, gt2, phase_set
        }
    }

    /// Position ordering used to sort per-contig lists
    pub fn position_cmp(&self, other: &PhasedVariant) -> Ordering {
        self.ref_pos.cmp(&other.ref_pos)
    }

    /// The allele sequence assigned to the first haplotype
    pub fn allele1(&self) -> &str {
        &self.alleles[self.gt1]
    }

    /// The allele sequence assigned to the second haplotype
    pub fn allele2(&self) -> &str {
        &self.alleles[self.gt2]
    }

    // getters
    pub fn contig(&self) -> &str {
        &self.contig
    }

    pub fn ref_pos(&self) -> i64 {
        self.ref_pos
    }

    pub fn quality(&self) -> f64 {
        self.quality
    }

    pub fn alleles(&self) -> &[String] {
        &self.alleles
    }

    pub fn gt1(&self) -> usize {
        self.gt1
    }

    pub fn gt2(&self) -> usize {
        self.gt2
    }

    pub fn phase_set(&self) -> &str {
        &self.phase_set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allele_accessors() {
        let pv = PhasedVariant::new(
            "chr1".to_string(), 100, 30.0,
            vec!["A".to_string(), "C".to_string()],
            0, 1, "ps1".to_string()
        );
        assert_eq!(pv.allele1(), "A");
        assert_eq!(pv.allele2(), "C");
        assert_eq!(pv.phase_set(), "ps1");
    }

    #[test]
    #[should_panic]
    fn test_homozygous_rejected() {
        let _pv = PhasedVariant::new(
            "chr1".to_string(), 100, 30.0,
            vec!["A".to_string(), "C".to_string()],
            1, 1, "ps1".to_string()
        );
    }
}
