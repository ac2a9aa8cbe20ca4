
use crate::data_types::rle_string::RleString;

/// A pre-called variant site driving VCF-guided bubble construction.
/// Alleles are already expanded to substrings covering the site plus flanks,
/// with the reference substring first.
#[derive(Clone, Debug)]
pub struct VcfEntry {
    /// Contig the site sits on
    contig: String,
    /// Position of the site in chunk coordinates
    ref_pos: usize,
    /// Call quality from the source VCF
    quality: f64,
    /// Allele substrings over the site, reference first
    alleles: Vec<RleString>,
    /// Allele index called for the first haplotype
    gt1: usize,
    /// Allele index called for the second haplotype
    gt2: usize,
    /// First reference position covered by the allele substrings
    ref_aln_start: usize,
    /// Last reference position covered by the allele substrings, inclusive
    ref_aln_stop_incl: usize,
    /// Original (pre-chunking) position, for log messages only
    raw_ref_pos_informative_only: i64,
}

impl VcfEntry {
    pub fn new(
        contig: String, ref_pos: usize, quality: f64, alleles: Vec<RleString>, gt1: usize, gt2: usize,
        ref_aln_start: usize, ref_aln_stop_incl: usize, raw_ref_pos_informative_only: i64
    ) -> Self {
        assert!(alleles.len() >= 2, "a called site must have at least two alleles");
        assert!(gt1 < alleles.len() && gt2 < alleles.len(), "genotype indices must be in the allele list");
        Self {
            contig, ref_pos, quality, alleles, gt1, gt2,
            ref_aln_start, ref_aln_stop_incl, raw_ref_pos_informative_only
        }
    }

    /// The reference allele substring
    pub fn ref_allele(&self) -> &RleString {
        &self.alleles[0]
    }

    // getters
    pub fn contig(&self) -> &str {
        &self.contig
    }

    pub fn ref_pos(&self) -> usize {
        self.ref_pos
    }

    pub fn quality(&self) -> f64 {
        self.quality
    }

    pub fn alleles(&self) -> &[RleString] {
        &self.alleles
    }

    pub fn gt1(&self) -> usize {
        self.gt1
    }

    pub fn gt2(&self) -> usize {
        self.gt2
    }

    pub fn ref_aln_start(&self) -> usize {
        self.ref_aln_start
    }

    pub fn ref_aln_stop_incl(&self) -> usize {
        self.ref_aln_stop_incl
    }

    pub fn raw_ref_pos_informative_only(&self) -> i64 {
        self.raw_ref_pos_informative_only
    }
}

/// The substrings of one read across the pre-called sites it spans, delivered by the
/// external read parser in VCF-driven mode. Entry indices refer to the shared site list.
#[derive(Clone, Debug, Default)]
pub struct ReadVcfEntrySubstrings {
    /// Indices into the shared `VcfEntry` list
    entry_indices: Vec<usize>,
    /// The read substring covering each site, parallel to `entry_indices`
    substrings: Vec<Vec<u8>>,
    /// Per-substring base qualities; an empty vector means no qualities
    qualities: Vec<Vec<u8>>,
}

impl ReadVcfEntrySubstrings {
    pub fn new(entry_indices: Vec<usize>, substrings: Vec<Vec<u8>>, qualities: Vec<Vec<u8>>) -> Self {
        assert_eq!(entry_indices.len(), substrings.len());
        assert_eq!(entry_indices.len(), qualities.len());
        Self {
            entry_indices, substrings, qualities
        }
    }

    /// Number of sites this read spans
    pub fn len(&self) -> usize {
        self.entry_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entry_indices.is_empty()
    }

    /// Iterates over (site index, substring, qualities) triples
    pub fn iter(&self) -> impl Iterator<Item = (usize, &[u8], &[u8])> {
        self.entry_indices.iter()
            .zip(self.substrings.iter())
            .zip(self.qualities.iter())
            .map(|((&idx, sub), quals)| (idx, sub.as_slice(), quals.as_slice()))
    }
}
