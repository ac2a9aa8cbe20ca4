
use log::{debug, info, log_enabled, Level};
use rustc_hash::{FxHashMap, FxHashSet};

/// Attachment of coverage-capped and otherwise unused reads to the phased haplotypes
pub mod filtered_reads;
/// The genome fragment output and its iterative refinement
pub mod genome_fragment;
/// Profile sequences and the per-site phasing reference
pub mod profile_seq;
/// The column HMM over read bit-partitions
pub mod read_partition_hmm;

use crate::bubbles::bubble_graph::BubbleGraph;
use crate::data_types::parameters::PhaseParams;
use crate::data_types::reads::SequencingRead;
use crate::phasing::genome_fragment::{refine_genome_fragment, GenomeFragment};
use crate::phasing::profile_seq::{profile_seqs_from_bubble_graph, PhasingReference, ProfileSeq};
use crate::phasing::read_partition_hmm::{filter_reads_by_coverage_depth, phase_profile_seqs, PhasedPath};

/// Everything the phasing pipeline produces for one reference chunk
#[derive(Debug)]
pub struct PhaseResult {
    /// The phased haplotypes and read partitions
    pub fragment: GenomeFragment,
    /// The traced path, post-refinement
    pub path: PhasedPath,
    /// Profile sequences by read id, including coverage-discarded reads
    pub profiles: FxHashMap<usize, ProfileSeq>,
    /// Reads dropped by the coverage filter; attach these via `filtered_reads`
    pub discarded_read_ids: FxHashSet<usize>,
}

/// Runs the phasing algorithm to split the reads embedded in the bubble graph into two
/// partitions: profile-seq projection, coverage capping, per-strand phasing, fusion,
/// forward-backward with traceback, and iterative refinement. An empty alignment yields
/// an empty fragment.
/// # Arguments
/// * `graph` - the scored bubble graph
/// * `reference` - per-site view of the graph
/// * `reads` - the reads used in phasing
/// * `params` - phasing knobs
/// # Errors
/// * if the parameter bundle fails validation
pub fn phase_bubble_graph(
    graph: &BubbleGraph, reference: &PhasingReference, reads: &[SequencingRead], params: &PhaseParams
) -> anyhow::Result<PhaseResult> {
    params.validate()?;
    assert_eq!(reference.len(), graph.len());

    let profiles = profile_seqs_from_bubble_graph(graph);
    if reads.len() != profiles.len() {
        info!("In converting from reads to profile sequences have {} reads and {} profile sequences",
            reads.len(), profiles.len());
    }

    if profiles.is_empty() {
        return Ok(PhaseResult {
            fragment: GenomeFragment::empty(),
            path: Default::default(),
            profiles,
            discarded_read_ids: Default::default()
        });
    }

    // cap the per-site read depth; discarded reads are re-attached downstream
    info!("Filtering reads by coverage depth");
    let discarded_read_ids = filter_reads_by_coverage_depth(&profiles, params);

    let strand_by_read: FxHashMap<usize, bool> = reads.iter()
        .map(|r| (r.read_id(), r.forward_strand()))
        .collect();
    let kept: Vec<&ProfileSeq> = profiles.values()
        .filter(|p| !discarded_read_ids.contains(&p.read_id()))
        .collect();

    let mut path = phase_profile_seqs(kept, &strand_by_read, reference, params);
    let mut fragment = GenomeFragment::from_path(&path, &profiles, reference, params.include_ancestor_sub_prob);

    // greedy refinement of the read partitions
    refine_genome_fragment(
        &mut fragment, &mut path, &profiles, reference,
        params.include_ancestor_sub_prob, params.rounds_of_iterative_refinement
    );

    assert!(fragment.reads1().is_disjoint(fragment.reads2()));
    assert!(fragment.ref_start() + fragment.length() <= graph.len());

    log_phased_bubble_graph(graph, &fragment, reads);

    Ok(PhaseResult {
        fragment,
        path,
        profiles,
        discarded_read_ids
    })
}

/// Sanity logging for a phased bubble graph: per-het-site haplotype calls with per-allele
/// strand skews, plus the overall skewed-bubble fraction.
/// # Arguments
/// * `graph` - the scored bubble graph
/// * `fragment` - the phased fragment
/// * `reads` - the read list
pub fn log_phased_bubble_graph(graph: &BubbleGraph, fragment: &GenomeFragment, reads: &[SequencingRead]) {
    if !log_enabled!(Level::Debug) || fragment.length() == 0 {
        return;
    }

    for offset in 0..fragment.length() {
        if !fragment.is_het_site(offset) {
            continue;
        }
        let bubble = &graph.bubbles()[fragment.ref_start() + offset];
        let skews = bubble.strand_skews(reads);
        debug!("At site {} / {} (pos {}) with {} potential alleles got allele {} (prob {:.3}) for hap1 and allele {} (prob {:.3}) for hap2, ancestral allele {}, genotype prob {:.3}",
            offset, fragment.length(), bubble.ref_start(), bubble.allele_no(),
            fragment.haplotype1()[offset], fragment.haplotype_probs1()[offset],
            fragment.haplotype2()[offset], fragment.haplotype_probs2()[offset],
            fragment.ancestor()[offset], fragment.genotype_probs()[offset]);
        for (allele, skew) in skews.iter().enumerate() {
            debug!("\tAllele {} (ref allele: {})\t strand-skew: {:+.5}",
                allele, bubble.reference_allele_index() == Some(allele), skew);
        }
    }

    debug!("Fraction of bubbles skewed {:.3} (of {} total)",
        graph.skewed_bubble_fraction(reads, fragment.reads1(), fragment.reads2()), graph.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bubbles::scorer::EditDistanceScorer;
    use crate::data_types::parameters::PolishParams;
    use crate::data_types::poa::build_uniform_poa;
    use crate::data_types::rle_string::RleString;

    /// End-to-end: POA -> bubble graph -> profile seqs -> HMM -> refined fragment
    #[test]
    fn test_phase_bubble_graph_end_to_end() {
        let reference = b"ACGTACGTACGTACGTACGT";
        let variant_positions = [7_usize, 13];
        let read_count = 6;

        let mut poa = build_uniform_poa(reference, &(0..read_count).collect::<Vec<usize>>(), 1.0);
        for &position in variant_positions.iter() {
            poa.nodes_mut()[position + 1].base_weights[2] = 3.0;
        }

        let reads: Vec<SequencingRead> = (0..read_count)
            .map(|read_id| {
                let mut sequence = reference.to_vec();
                if read_id % 2 == 1 {
                    for &position in variant_positions.iter() {
                        sequence[position] = b'G';
                    }
                }
                SequencingRead::new(read_id, format!("read{read_id}"), read_id < 3,
                    RleString::new_no_rle(&sequence), Some(vec![30; sequence.len()]))
            })
            .collect();

        let polish_params = PolishParams {
            use_run_length_encoding: false,
            column_anchor_trim: 2,
            ..Default::default()
        };
        let scorer = EditDistanceScorer::default();
        let graph = BubbleGraph::from_poa(&mut poa, &reads, None, &polish_params, &scorer, true);
        assert_eq!(graph.len(), 2);

        let phasing_reference = PhasingReference::from_bubble_graph(&graph, &polish_params);
        let params = PhaseParams::default();
        let result = phase_bubble_graph(&graph, &phasing_reference, &reads, &params).unwrap();

        // every read is phased, partitions are disjoint and complete
        let fragment = &result.fragment;
        assert!(result.discarded_read_ids.is_empty());
        assert_eq!(fragment.reads1().len() + fragment.reads2().len(), read_count);
        assert!(fragment.reads1().is_disjoint(fragment.reads2()));

        // reads split by haplotype parity
        let side_of = |read_id: usize| fragment.reads1().contains(&read_id);
        for read_id in 0..read_count {
            assert_eq!(side_of(read_id), side_of(read_id % 2), "read {read_id} on the wrong side");
        }
        assert_ne!(side_of(0), side_of(1));

        // both sites are called het with distinct alleles per haplotype
        assert_eq!(fragment.length(), 2);
        for offset in 0..fragment.length() {
            assert!(fragment.is_het_site(offset));
        }
    }

    #[test]
    fn test_empty_alignment_yields_empty_fragment() {
        // a graph with no bubbles produces no profile sequences
        let reference = b"ACGTACGT";
        let mut poa = build_uniform_poa(reference, &[0, 1], 1.0);
        let reads: Vec<SequencingRead> = (0..2)
            .map(|read_id| {
                SequencingRead::new(read_id, format!("read{read_id}"), true,
                    RleString::new_no_rle(reference), None)
            })
            .collect();

        let polish_params = PolishParams {
            use_run_length_encoding: false,
            ..Default::default()
        };
        let scorer = EditDistanceScorer::default();
        let graph = BubbleGraph::from_poa(&mut poa, &reads, None, &polish_params, &scorer, true);
        assert!(graph.is_empty());

        let phasing_reference = PhasingReference::from_bubble_graph(&graph, &polish_params);
        let result = phase_bubble_graph(&graph, &phasing_reference, &reads, &PhaseParams::default()).unwrap();
        assert_eq!(result.fragment.length(), 0);
        assert!(result.fragment.reads1().is_empty());
        assert!(result.fragment.reads2().is_empty());
    }
}
