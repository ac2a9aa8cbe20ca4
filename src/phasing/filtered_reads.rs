
use log::info;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::bubbles::bubble_graph::{compute_allele_read_supports, get_read_substrings, BubbleGraph};
use crate::bubbles::scorer::AlignmentScorer;
use crate::data_types::parameters::PolishParams;
use crate::data_types::poa::Poa;
use crate::data_types::reads::{ReadSubstring, SequencingRead};
use crate::data_types::rle_string::RleString;
use crate::data_types::vcf_entry::{ReadVcfEntrySubstrings, VcfEntry};
use crate::phasing::genome_fragment::GenomeFragment;
use crate::util::log_math::log_add_exact;

/// Attachment outcome counters, surfaced in the info log
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FilteredReadCounts {
    /// Reads attached to haplotype 1
    pub hap1: usize,
    /// Reads attached to haplotype 2
    pub hap2: usize,
    /// Reads with equal support for both haplotypes
    pub unclassified: usize,
    /// Unclassified reads that never spanned a het site (both scores exactly zero)
    pub no_score: usize,
}

/// Accumulates one bubble's haplotype log-odds into the per-read score maps
fn accumulate_hap_support(
    substrings: &[ReadSubstring], supports: &[f64],
    score_hap1: &mut FxHashMap<usize, f64>, score_hap2: &mut FxHashMap<usize, f64>
) {
    let read_no = substrings.len();
    for (k, substring) in substrings.iter().enumerate() {
        let support_hap1 = supports[k];
        let support_hap2 = supports[read_no + k];

        *score_hap1.get_mut(&substring.read_id()).unwrap() +=
            support_hap1 - log_add_exact(support_hap1, support_hap2);
        *score_hap2.get_mut(&substring.read_id()).unwrap() +=
            support_hap2 - log_add_exact(support_hap2, support_hap1);
    }
}

/// Classifies each scored read to the haplotype with the larger accumulated log-odds,
/// leaving ties unclassified. A tie at exactly zero means the read never spanned a het
/// site; those are counted separately but receive no tiebreak.
fn classify_reads(
    score_hap1: &FxHashMap<usize, f64>, score_hap2: &FxHashMap<usize, f64>,
    reads1: &mut FxHashSet<usize>, reads2: &mut FxHashSet<usize>
) -> FilteredReadCounts {
    let mut counts = FilteredReadCounts::default();
    for (&read_id, &support_hap1) in score_hap1.iter() {
        let support_hap2 = score_hap2[&read_id];
        if support_hap1 > support_hap2 {
            reads1.insert(read_id);
            counts.hap1 += 1;
        } else if support_hap2 > support_hap1 {
            reads2.insert(read_id);
            counts.hap2 += 1;
        } else {
            if support_hap1 == 0.0 {
                counts.no_score += 1;
            }
            counts.unclassified += 1;
        }
    }
    counts
}

/// Assigns reads excluded from phasing to the haplotype with the higher cumulative
/// log-odds support over the fragment's het bubbles. Each het bubble is re-scored with
/// just the two haplotype alleles (plus the reference allele when absent) against the
/// unfiltered spanning read substrings.
/// # Arguments
/// * `poa` - the alignment, with sorted observations
/// * `reads` - the full read list
/// * `target_read_ids` - the reads to attach (coverage-capped or otherwise unused)
/// * `fragment` - the phased fragment supplying haplotype alleles
/// * `graph` - the bubble graph the fragment was phased from
/// * `params` - bubble configuration
/// * `scorer` - the pair-HMM seam
/// * `reads1` - haplotype 1 read set, extended in place
/// * `reads2` - haplotype 2 read set, extended in place
#[allow(clippy::too_many_arguments)]
pub fn partition_filtered_reads(
    poa: &Poa, reads: &[SequencingRead], target_read_ids: &FxHashSet<usize>,
    fragment: &GenomeFragment, graph: &BubbleGraph,
    params: &PolishParams, scorer: &dyn AlignmentScorer,
    reads1: &mut FxHashSet<usize>, reads2: &mut FxHashSet<usize>
) -> FilteredReadCounts {
    let mut score_hap1: FxHashMap<usize, f64> = target_read_ids.iter().map(|&id| (id, 0.0)).collect();
    let mut score_hap2: FxHashMap<usize, f64> = target_read_ids.iter().map(|&id| (id, 0.0)).collect();

    for offset in 0..fragment.length() {
        let bubble = &graph.bubbles()[fragment.ref_start() + offset];
        let hap1_allele = fragment.haplotype1()[offset];
        let hap2_allele = fragment.haplotype2()[offset];

        // only het sites are informative
        if hap1_allele == hap2_allele {
            continue;
        }

        let hap1 = &bubble.alleles()[hap1_allele];
        let hap2 = &bubble.alleles()[hap2_allele];
        let mut alleles: Vec<RleString> = vec![hap1.clone(), hap2.clone()];

        // keep the reference allele in the list so scores stay comparable
        let ref_expanded = bubble.ref_allele().expand();
        if !alleles.iter().any(|a| a.expand() == ref_expanded) {
            info!("While partitioning filtered reads at {}(+{}), did not see ref allele",
                bubble.ref_start(), bubble.bubble_length());
            alleles.push(RleString::from_expanded(&ref_expanded, params.use_run_length_encoding));
        }

        let substrings: Vec<ReadSubstring> = get_read_substrings(
            reads, poa, bubble.ref_start(), bubble.ref_start() + bubble.bubble_length() + 1, params, false
        ).into_iter()
            .filter(|s| target_read_ids.contains(&s.read_id()))
            .collect();
        if substrings.is_empty() {
            continue;
        }

        let supports = compute_allele_read_supports(&alleles, &substrings, reads, scorer);
        accumulate_hap_support(&substrings, &supports, &mut score_hap1, &mut score_hap2);
    }

    let counts = classify_reads(&score_hap1, &score_hap2, reads1, reads2);
    log_attachment_counts(target_read_ids.len(), &counts);
    counts
}

/// VCF-driven variant of the attacher: read substrings come from the per-site substring
/// records instead of POA extraction, with haplotype alleles taken from the fragment.
/// # Arguments
/// * `reads` - the full read list
/// * `entry_substrings` - per-read site substrings, parallel to `reads`
/// * `entries` - the pre-called sites
/// * `bubble_entries` - site index per bubble, as returned by VCF-driven construction
/// * `target_read_ids` - the reads to attach
/// * `fragment` - the phased fragment supplying haplotype alleles
/// * `graph` - the bubble graph the fragment was phased from
/// * `params` - bubble configuration
/// * `scorer` - the pair-HMM seam
/// * `reads1` - haplotype 1 read set, extended in place
/// * `reads2` - haplotype 2 read set, extended in place
#[allow(clippy::too_many_arguments)]
pub fn partition_filtered_reads_from_vcf_entries(
    reads: &[SequencingRead], entry_substrings: &[ReadVcfEntrySubstrings], entries: &[VcfEntry],
    bubble_entries: &[usize], target_read_ids: &FxHashSet<usize>,
    fragment: &GenomeFragment, graph: &BubbleGraph,
    params: &PolishParams, scorer: &dyn AlignmentScorer,
    reads1: &mut FxHashSet<usize>, reads2: &mut FxHashSet<usize>
) -> FilteredReadCounts {
    let mut score_hap1: FxHashMap<usize, f64> = target_read_ids.iter().map(|&id| (id, 0.0)).collect();
    let mut score_hap2: FxHashMap<usize, f64> = target_read_ids.iter().map(|&id| (id, 0.0)).collect();

    // invert the per-read records into per-site substring lists for the target reads
    let mut substrings_by_entry: FxHashMap<usize, Vec<ReadSubstring>> = Default::default();
    for (read, site_substrings) in reads.iter().zip(entry_substrings.iter()) {
        if !target_read_ids.contains(&read.read_id()) {
            continue;
        }
        for (entry_index, substring, qualities) in site_substrings.iter() {
            let rle = RleString::from_expanded(substring, params.use_run_length_encoding);
            let qualities = if qualities.is_empty() || qualities[0] == 0 { None } else { Some(qualities) };
            substrings_by_entry.entry(entry_index).or_default()
                .push(ReadSubstring::new_explicit(read.read_id(), rle, qualities));
        }
    }

    for offset in 0..fragment.length() {
        let bubble_index = fragment.ref_start() + offset;
        let bubble = &graph.bubbles()[bubble_index];
        let entry = &entries[bubble_entries[bubble_index]];
        assert_eq!(bubble.variant_position_offsets(), &[entry.ref_pos()]);

        let hap1_allele = fragment.haplotype1()[offset];
        let hap2_allele = fragment.haplotype2()[offset];
        if hap1_allele == hap2_allele {
            continue;
        }

        let alleles = vec![
            bubble.alleles()[hap1_allele].clone(),
            bubble.alleles()[hap2_allele].clone(),
        ];

        let substrings = match substrings_by_entry.get(&bubble_entries[bubble_index]) {
            Some(s) if !s.is_empty() => s,
            _ => continue
        };

        let supports = compute_allele_read_supports(&alleles, substrings, reads, scorer);
        accumulate_hap_support(substrings, &supports, &mut score_hap1, &mut score_hap2);
    }

    let counts = classify_reads(&score_hap1, &score_hap2, reads1, reads2);
    log_attachment_counts(target_read_ids.len(), &counts);
    counts
}

fn log_attachment_counts(total: usize, counts: &FilteredReadCounts) {
    let denom = total.max(1) as f64;
    info!("Of {} filtered reads: {} ({:.2}) were hap1, {} ({:.2}) were hap2, {} ({:.2}) were unclassified with {} having no score.",
        total,
        counts.hap1, counts.hap1 as f64 / denom,
        counts.hap2, counts.hap2 as f64 / denom,
        counts.unclassified, counts.unclassified as f64 / denom,
        counts.no_score);
}
