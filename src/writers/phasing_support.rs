
use serde::Serialize;
use std::path::Path;

use crate::bubbles::bubble_graph::BubbleGraph;
use crate::data_types::reads::SequencingRead;
use crate::phasing::genome_fragment::GenomeFragment;
use crate::util::json_io::save_json;

/// One read's support for the two haplotype alleles at a bubble
#[derive(Clone, Debug, Serialize)]
pub struct ReadHapSupport {
    /// Read name
    pub name: String,
    /// Mean base quality of the read substring, -1 when unknown
    pub qual: f64,
    /// Log-likelihood of the read under the haplotype 1 allele
    pub hap_support_h1: f64,
    /// Log-likelihood of the read under the haplotype 2 allele
    pub hap_support_h2: f64,
}

/// Per-bubble phasing evidence for one het site
#[derive(Clone, Debug, Serialize)]
pub struct BubblePhasingInfo {
    /// Reference position of the bubble
    pub ref_pos: usize,
    /// Binomial p-value of strand/haplotype association at the bubble
    pub strand_skew: f64,
    /// Per-read haplotype supports
    pub reads: Vec<ReadHapSupport>,
}

/// The per-bubble per-read haplotype support report
#[derive(Clone, Debug, Default, Serialize)]
pub struct PhasingSupportReport {
    /// Evidence at the het bubbles used in phasing
    pub primary: Vec<BubblePhasingInfo>,
}

/// Collects per-read haplotype supports at every het bubble of the phased fragment.
/// # Arguments
/// * `graph` - the scored bubble graph
/// * `fragment` - the phased fragment
/// * `reads` - the read list
pub fn build_phasing_support_report(
    graph: &BubbleGraph, fragment: &GenomeFragment, reads: &[SequencingRead]
) -> PhasingSupportReport {
    let mut report = PhasingSupportReport::default();

    for offset in 0..fragment.length() {
        let bubble = &graph.bubbles()[fragment.ref_start() + offset];
        let hap1_allele = fragment.haplotype1()[offset];
        let hap2_allele = fragment.haplotype2()[offset];

        // only het sites carry phasing evidence
        if hap1_allele == hap2_allele {
            continue;
        }

        let read_supports: Vec<ReadHapSupport> = bubble.reads().iter().enumerate()
            .map(|(k, substring)| {
                ReadHapSupport {
                    name: reads[substring.read_id()].read_name().to_string(),
                    qual: substring.qual_value(),
                    hap_support_h1: bubble.support(hap1_allele, k),
                    hap_support_h2: bubble.support(hap2_allele, k)
                }
            })
            .collect();

        report.primary.push(BubblePhasingInfo {
            ref_pos: bubble.ref_start(),
            strand_skew: bubble.phased_strand_skew(reads, fragment.reads1(), fragment.reads2()),
            reads: read_supports
        });
    }

    report
}

/// Serializes the report to JSON.
/// # Arguments
/// * `report` - the built report
/// * `out_filename` - output path, gzipped when the extension asks for it
pub fn save_phasing_support_report(report: &PhasingSupportReport, out_filename: &Path) -> anyhow::Result<()> {
    save_json(report, out_filename)
}
