
use log::debug;
use rustc_hash::FxHashMap;

use crate::data_types::parameters::PolishParams;
use crate::data_types::poa::{Poa, PoaNode};
use crate::data_types::reads::{ReadSubstring, SequencingRead};
use crate::data_types::rle_string::RleString;

/// How many 1.5x threshold inflations are attempted before POA enumeration falls
/// back to read-derived alleles
const MAX_ENUMERATION_RETRIES: usize = 10;

/// Groups RLE strings by their compressed characters and, per group, builds a consensus
/// whose per-position run count is the rounded mean of the members (clamped to [1, 255]).
/// Returns one expanded allele per group.
/// # Arguments
/// * `substrings` - read substrings spanning the bubble interval
/// * `reads` - the read list backing the substrings
pub fn candidate_alleles_from_read_substrings(substrings: &[ReadSubstring], reads: &[SequencingRead]) -> Vec<Vec<u8>> {
    // group by the compressed character sequence
    let mut groups: FxHashMap<Vec<u8>, Vec<RleString>> = Default::default();
    for substring in substrings.iter() {
        let rle = substring.rle_string(&reads[substring.read_id()]);
        groups.entry(rle.compressed().to_vec()).or_default().push(rle);
    }

    let mut alleles: Vec<Vec<u8>> = groups.into_values()
        .map(|members| consensus_rle_string(&members).expand())
        .collect();

    // deterministic output order regardless of hashing
    alleles.sort();
    alleles
}

/// Consensus over a group of RLE strings sharing the same compressed characters:
/// per-position run counts are averaged and rounded, never below 1.
fn consensus_rle_string(members: &[RleString]) -> RleString {
    assert!(!members.is_empty());
    let template = &members[members.len() - 1];

    let mut counts = Vec::with_capacity(template.len());
    for position in 0..template.len() {
        let total: u64 = members.iter()
            .map(|m| {
                assert_eq!(m.len(), template.len());
                m.counts()[position] as u64
            })
            .sum();
        let rounded = (total as f32 / members.len() as f32).round() as u64;
        counts.push(rounded.clamp(1, 255) as u8);
    }

    RleString::from_parts(template.compressed().to_vec(), counts)
        .expect("consensus counts are clamped to [1, 255]")
}

/// Candidate bases at a node: anything above the threshold, plus the reference base
fn candidate_bases(node: &PoaNode, params: &PolishParams, candidate_weight: f64) -> Vec<u8> {
    let ref_base = node.base.to_ascii_uppercase();
    (0..params.alphabet.size())
        .filter_map(|symbol| {
            let base = params.alphabet.symbol_to_char(symbol);
            if node.base_weights[symbol] > candidate_weight || base == ref_base {
                Some(base)
            } else {
                None
            }
        })
        .collect()
}

/// Candidate repeat counts at a node: anything above 2x the threshold, plus the
/// reference repeat count. Zero counts never materialize as alleles.
fn candidate_repeat_counts(node: &PoaNode, candidate_weight: f64) -> Vec<usize> {
    let candidate_weight = candidate_weight * 2.0;
    node.repeat_count_weights.iter().enumerate()
        .filter_map(|(repeat_count, &weight)| {
            if (weight > candidate_weight || repeat_count == node.repeat_count as usize) && repeat_count > 0 {
                Some(repeat_count)
            } else {
                None
            }
        })
        .collect()
}

/// Recursively enumerates all combinations of candidate variants over the half-open node
/// interval `[from, to)` as expanded consensus substrings. The reference rendition is
/// always among the products. Returns None when the product count exceeds
/// `maximum_string_number`, signalling the caller to raise the threshold and retry.
/// # Arguments
/// * `poa` - the alignment
/// * `from` - first node of the interval (inclusive)
/// * `to` - last node of the interval (exclusive)
/// * `weights` - per-position candidate thresholds
/// * `weight_adjustment` - multiplicative inflation applied on retries
/// * `maximum_string_number` - the enumeration budget
pub fn candidate_consensus_substrings(
    poa: &Poa, from: usize, to: usize, weights: &[f64], params: &PolishParams,
    weight_adjustment: f64, maximum_string_number: usize
) -> Option<Vec<Vec<u8>>> {
    // suffixes first, so prefix variants multiply onto completed tails
    let suffixes: Vec<Vec<u8>> = if from + 1 < to {
        candidate_consensus_substrings(poa, from + 1, to, weights, params, weight_adjustment, maximum_string_number)?
    } else {
        vec![vec![]]
    };

    let node = &poa.nodes()[from];
    let candidate_weight = weights[from] * weight_adjustment;

    let mut products: Vec<Vec<u8>> = vec![];
    for base in candidate_bases(node, params, candidate_weight) {
        for repeat_count in candidate_repeat_counts(node, candidate_weight) {
            let bases = vec![base; repeat_count];

            // no edit at this node
            for suffix in suffixes.iter() {
                let mut product = bases.clone();
                product.extend_from_slice(suffix);
                products.push(product);
            }

            // each candidate insert after this node
            for insert in node.inserts.iter() {
                if insert.weight > candidate_weight {
                    let expanded_insert = insert.insert.expand();
                    for suffix in suffixes.iter() {
                        let mut product = bases.clone();
                        product.extend_from_slice(&expanded_insert);
                        product.extend_from_slice(suffix);
                        products.push(product);
                    }
                }
            }

            // each candidate delete after this node; deduplicated since different
            // deletion lengths can collapse onto the same string
            for delete in node.deletes.iter() {
                if delete.weight > candidate_weight {
                    for suffix in suffixes.iter() {
                        let mut product = bases.clone();
                        if suffix.len() >= delete.length {
                            product.extend_from_slice(&suffix[delete.length..]);
                        }
                        if !products.contains(&product) {
                            products.push(product);
                        }
                    }
                }
            }
        }
    }

    if products.len() > maximum_string_number {
        return None;
    }

    Some(products)
}

/// Enumerates the allele set for a bubble interval: POA enumeration with threshold
/// inflation on budget overflow, falling back to read-derived alleles after
/// `MAX_ENUMERATION_RETRIES` failures or when read alleles are requested outright.
/// # Arguments
/// * `poa` - the alignment
/// * `from` - first node of the interval (inclusive)
/// * `to` - last node of the interval (exclusive)
/// * `weights` - per-position candidate thresholds
/// * `params` - configuration
/// * `use_read_alleles` - if true, skip POA enumeration entirely
/// * `substrings` - read substrings spanning the interval
/// * `reads` - the read list backing the substrings
#[allow(clippy::too_many_arguments)]
pub fn enumerate_alleles(
    poa: &Poa, from: usize, to: usize, weights: &[f64], params: &PolishParams,
    use_read_alleles: bool, substrings: &[ReadSubstring], reads: &[SequencingRead]
) -> Vec<Vec<u8>> {
    if use_read_alleles {
        return candidate_alleles_from_read_substrings(substrings, reads);
    }

    let mut weight_adjustment = 1.0;
    for _attempt in 0..MAX_ENUMERATION_RETRIES {
        if let Some(alleles) = candidate_consensus_substrings(
            poa, from, to, weights, params, weight_adjustment, params.max_consensus_strings
        ) {
            return alleles;
        }
        // too many combinations, raise the bar and try again
        weight_adjustment *= 1.5;
    }

    debug!("Allele enumeration for interval [{from}, {to}) exceeded {} candidates after {MAX_ENUMERATION_RETRIES} retries, falling back to read alleles",
        params.max_consensus_strings);
    candidate_alleles_from_read_substrings(substrings, reads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::poa::{build_uniform_poa, PoaInsert};

    fn make_read(read_id: usize, sequence: &[u8]) -> SequencingRead {
        SequencingRead::new(read_id, format!("read{read_id}"), true, RleString::new(sequence), None)
    }

    #[test]
    fn test_read_derived_consensus() {
        // two groups: AACC-like strings with different run lengths, and GGG
        let reads = vec![
            make_read(0, b"AACC"),
            make_read(1, b"AACCC"),
            make_read(2, b"GGG"),
        ];
        let substrings: Vec<ReadSubstring> = reads.iter()
            .map(|r| r.substring(0, r.rle_read().len()))
            .collect();

        let mut alleles = candidate_alleles_from_read_substrings(&substrings, &reads);
        alleles.sort();

        // the AC group's C counts (2 and 3) average to 2.5, rounding up
        assert_eq!(alleles.len(), 2);
        assert!(alleles.contains(&b"GGG".to_vec()));
        assert!(alleles.contains(&b"AACCC".to_vec()));
    }

    #[test]
    fn test_consensus_count_clamping() {
        let members = vec![
            RleString::from_parts(b"A".to_vec(), vec![255]).unwrap(),
            RleString::from_parts(b"A".to_vec(), vec![255]).unwrap(),
        ];
        let consensus = consensus_rle_string(&members);
        assert_eq!(consensus.counts(), &[255]);
    }

    #[test]
    fn test_poa_enumeration_reference_only() {
        let poa = build_uniform_poa(b"ACGT", &[0, 1], 1.0);
        let params = PolishParams::default();
        let weights = vec![10.0; poa.nodes().len()];

        // nothing above threshold: the reference substring is the only product
        let products = candidate_consensus_substrings(&poa, 1, 4, &weights, &params, 1.0, 100).unwrap();
        assert_eq!(products, vec![b"ACG".to_vec()]);
    }

    #[test]
    fn test_poa_enumeration_with_substitution() {
        let mut poa = build_uniform_poa(b"ACGT", &[0, 1], 1.0);
        let params = PolishParams::default();
        let weights = vec![10.0; poa.nodes().len()];

        // node 2 = reference position 1, a 'C'; add a strong 'T' signal
        poa.nodes_mut()[2].base_weights[3] = 20.0;

        let mut products = candidate_consensus_substrings(&poa, 1, 4, &weights, &params, 1.0, 100).unwrap();
        products.sort();
        assert_eq!(products, vec![b"ACG".to_vec(), b"ATG".to_vec()]);
    }

    #[test]
    fn test_poa_enumeration_with_insert() {
        let mut poa = build_uniform_poa(b"ACGT", &[0, 1], 1.0);
        let params = PolishParams::default();
        let weights = vec![10.0; poa.nodes().len()];

        poa.nodes_mut()[2].inserts.push(PoaInsert { insert: RleString::new(b"TT"), weight: 20.0 });

        let mut products = candidate_consensus_substrings(&poa, 1, 4, &weights, &params, 1.0, 100).unwrap();
        products.sort();
        assert_eq!(products, vec![b"ACG".to_vec(), b"ACTTG".to_vec()]);
    }

    #[test]
    fn test_enumeration_budget_overflow() {
        let mut poa = build_uniform_poa(b"ACGTACGT", &[0, 1], 1.0);
        let params = PolishParams::default();
        let weights = vec![0.5; poa.nodes().len()];

        // every node gets an alternate base signal, so products grow as 2^n
        for node in poa.nodes_mut().iter_mut().skip(1) {
            let alt_symbol = if node.base == b'A' { 1 } else { 0 };
            node.base_weights[alt_symbol] = 2.0;
        }

        // budget of 4 cannot hold 2^7 products
        assert!(candidate_consensus_substrings(&poa, 1, 8, &weights, &params, 1.0, 4).is_none());

        // with a huge weight adjustment the alternates fall below threshold again
        let products = candidate_consensus_substrings(&poa, 1, 8, &weights, &params, 100.0, 4).unwrap();
        assert_eq!(products.len(), 1);
    }

    #[test]
    fn test_enumerate_alleles_fallback() {
        let mut poa = build_uniform_poa(b"ACGTACGT", &[0, 1], 1.0);
        let mut params = PolishParams::default();
        params.max_consensus_strings = 2;
        let weights = vec![0.5; poa.nodes().len()];

        // alternates sit far above any reachable inflation of the threshold
        for node in poa.nodes_mut().iter_mut().skip(1) {
            let alt_symbol = if node.base == b'A' { 1 } else { 0 };
            node.base_weights[alt_symbol] = 1.0e12;
        }

        let reads = vec![make_read(0, b"ACGTACGT")];
        let substrings = vec![reads[0].substring(0, 8)];
        let alleles = enumerate_alleles(&poa, 1, 8, &weights, &params, false, &substrings, &reads);

        // fallback produced the read-derived allele set
        assert_eq!(alleles, vec![b"ACGTACGT".to_vec()]);
    }
}
