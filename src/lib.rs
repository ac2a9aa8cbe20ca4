
/*!
# Springhare-bio
Springhare-bio is the underlying library that supports the Springhare command line tool.
The library provides the core functionality for phasing noisy long reads into two
haplotypes over a bubble graph and for evaluating phased VCFs against each other.
The phasing entry point is `phase_bubble_graph`, with example usage below:

## Example phasing usage
```rust
use springhare::bubbles::bubble_graph::BubbleGraph;
use springhare::bubbles::scorer::EditDistanceScorer;
use springhare::data_types::parameters::{PhaseParams, PolishParams};
use springhare::data_types::reads::SequencingRead;
use springhare::data_types::rle_string::RleString;
use springhare::data_types::vcf_entry::{ReadVcfEntrySubstrings, VcfEntry};
use springhare::phasing::phase_bubble_graph;
use springhare::phasing::profile_seq::PhasingReference;

// one pre-called het site with four supporting reads, two per allele
let entries = vec![
    VcfEntry::new(
        "mock_chr1".to_string(), 5, 40.0,
        vec![RleString::new(b"ACA"), RleString::new(b"AGA")],
        0, 1, 4, 7, 105
    )
];
let reads: Vec<SequencingRead> = (0..4)
    .map(|read_id| {
        let sequence: &[u8] = if read_id % 2 == 0 { b"ACA" } else { b"AGA" };
        SequencingRead::new(
            read_id, format!("read{read_id}"), read_id < 2,
            RleString::new(sequence), None
        )
    })
    .collect();
let entry_substrings: Vec<ReadVcfEntrySubstrings> = reads.iter()
    .map(|r| ReadVcfEntrySubstrings::new(
        vec![0], vec![r.rle_read().expand()], vec![vec![30, 30, 30]]
    ))
    .collect();

// build and score the bubble graph, then phase it
let polish_params = PolishParams::default();
let scorer = EditDistanceScorer::default();
let (graph, _used_entries) = BubbleGraph::from_vcf_entries(
    &reads, &entry_substrings, &entries, &polish_params, &scorer
);
let reference = PhasingReference::from_bubble_graph(&graph, &polish_params);
let result = phase_bubble_graph(&graph, &reference, &reads, &PhaseParams::default()).unwrap();

// the reads split into two haplotype groups by allele
let fragment = &result.fragment;
assert_eq!(fragment.reads1().len() + fragment.reads2().len(), 4);
assert!(fragment.reads1().is_disjoint(fragment.reads2()));
let side_of = |read_id: usize| fragment.reads1().contains(&read_id);
assert_eq!(side_of(0), side_of(2));
assert_eq!(side_of(1), side_of(3));
assert_ne!(side_of(0), side_of(1));
```
*/

/// Bubble graph construction: candidate sites, allele enumeration, and scoring
pub mod bubbles;
/// Command line interface functionality that is specific to Springhare
pub mod cli;
/// The decay-weighted local phasing correctness evaluator
pub mod correctness;
/// Contains various shared data types
pub mod data_types;
/// Tooling for parsing input files into meaningful structs / data
pub mod parsing;
/// The read-partition HMM, genome fragments, and read attachment
pub mod phasing;
/// Contains generic utility functions
pub mod util;
/// All output writers
pub mod writers;
