
use log::{debug, info};

use crate::data_types::parameters::PolishParams;
use crate::data_types::poa::{Poa, PoaNode};
use crate::data_types::vcf_entry::VcfEntry;

/// Size of the sliding window that coverage is averaged over when setting
/// per-position candidate thresholds
const CANDIDATE_WEIGHT_WINDOW: usize = 100;

/// Computes the per-position candidate weight threshold: a sliding-window average of
/// total node weight scaled by `candidate_variant_weight`. Positions within half a
/// window of either end inherit the nearest interior threshold.
/// # Arguments
/// * `poa` - the alignment
/// * `params` - supplies the weight scale
pub fn candidate_weights(poa: &Poa, params: &PolishParams) -> Vec<f64> {
    let node_count = poa.nodes().len();
    let window = CANDIDATE_WEIGHT_WINDOW;

    if window >= node_count {
        let candidate_weight = poa.avg_coverage(0, node_count) * params.candidate_variant_weight;
        return vec![candidate_weight; node_count];
    }

    let mut weights = vec![0.0; node_count];
    let mut total_weight = 0.0;
    for i in 0..node_count {
        total_weight += poa.nodes()[i].total_weight();
        if i >= window {
            total_weight -= poa.nodes()[i - window].total_weight();
            weights[i - window / 2] = total_weight / window as f64 * params.candidate_variant_weight;
        }
    }

    // bounding positions copy the nearest interior threshold
    for i in 0..window / 2 {
        weights[i] = weights[window / 2];
        weights[node_count - 1 - i] = weights[node_count - 1 - window / 2];
    }

    weights
}

/// True if the node carries a non-reference base with weight above the threshold
fn has_candidate_substitution(node: &PoaNode, params: &PolishParams, candidate_weight: f64) -> bool {
    let ref_base = node.base.to_ascii_uppercase();
    (0..params.alphabet.size()).any(|symbol| {
        let base = params.alphabet.symbol_to_char(symbol);
        base != ref_base && node.base_weights[symbol] > candidate_weight
    })
}

/// True if the node carries a non-reference repeat count with weight above 2x the
/// threshold. The doubling deliberately deflates repeat-count-only variants.
fn has_candidate_repeat_count_change(node: &PoaNode, candidate_weight: f64) -> bool {
    let candidate_weight = candidate_weight * 2.0;
    node.repeat_count_weights.iter().enumerate()
        .any(|(repeat_count, &weight)| {
            repeat_count != node.repeat_count as usize && weight > candidate_weight
        })
}

/// True if any insert anchored at this node has weight above the threshold
fn has_candidate_insert(node: &PoaNode, candidate_weight: f64) -> bool {
    node.inserts.iter().any(|insert| insert.weight > candidate_weight)
}

/// Longest candidate deletion starting after this node, 0 if none
fn max_candidate_delete_length(node: &PoaNode, candidate_weight: f64) -> usize {
    node.deletes.iter()
        .filter(|delete| delete.weight > candidate_weight)
        .map(|delete| delete.length)
        .max()
        .unwrap_or(0)
}

/// Marks each POA position that is a candidate variant site or is spanned by a
/// candidate deletion.
/// # Arguments
/// * `poa` - the alignment
/// * `weights` - per-position thresholds from `candidate_weights`
/// * `params` - detector configuration
pub fn candidate_variant_positions(poa: &Poa, weights: &[f64], params: &PolishParams) -> Vec<bool> {
    let node_count = poa.nodes().len();
    let mut positions = vec![false; node_count];

    for (i, node) in poa.nodes().iter().enumerate() {
        if has_candidate_substitution(node, params, weights[i])
            || has_candidate_repeat_count_change(node, weights[i])
            || has_candidate_insert(node, weights[i]) {
            positions[i] = true;
        }

        let mut j = max_candidate_delete_length(node, weights[i]);
        if j > 0 {
            // the position preceding the deletion is marked as well
            positions[i] = true;
        }
        while j > 0 {
            assert!(i + j < node_count);
            positions[i + j] = true;
            j -= 1;
        }
    }

    positions
}

/// Replaces the detector's candidate set with the positions named by pre-called VCF
/// entries, logging agreement statistics between the two.
/// # Arguments
/// * `positions` - the detector's candidate positions, overwritten in place
/// * `vcf_entries` - pre-called sites, sorted by position
pub fn apply_vcf_positions(positions: &mut [bool], vcf_entries: &[VcfEntry]) {
    let mut entry_iter = vcf_entries.iter();
    let mut current = entry_iter.next();

    let mut tp: i64 = 0;
    let mut fp: i64 = 0;
    let mut tn: i64 = 0;
    let mut fn_count: i64 = 0;
    for (i, position) in positions.iter_mut().enumerate() {
        let is_detected = *position;
        let is_vcf = current.map(|e| e.ref_pos() == i).unwrap_or(false);
        if is_vcf {
            let entry = current.unwrap();
            let a1 = entry.alleles()[entry.gt1()].expand();
            let a2 = entry.alleles()[entry.gt2()].expand();
            debug!("Variant at {}:{} ({}) with quality {:5.3} and alleles {}, {} is {}",
                entry.contig(), entry.ref_pos(), entry.raw_ref_pos_informative_only(), entry.quality(),
                String::from_utf8_lossy(&a1), String::from_utf8_lossy(&a2),
                if is_detected { "TP" } else { "FN" });
        }

        match (is_detected, is_vcf) {
            (true, true) => tp += 1,
            (true, false) => fp += 1,
            (false, true) => fn_count += 1,
            (false, false) => tn += 1
        }

        *position = is_vcf;
        if current.map(|e| e.ref_pos() <= i).unwrap_or(false) {
            current = entry_iter.next();
        }
    }

    let total = positions.len() as f64;
    info!("Of {} positions, got {} TP, {} FP, {} FN, {} TN, equating to a variation rate of {:.5}, precision of {:.5}, and recall of {:.5}.",
        positions.len(), tp, fp, fn_count, tn,
        (tp + fn_count) as f64 / total,
        tp as f64 / (tp + fp) as f64,
        tp as f64 / (tp + fn_count) as f64);
}

/// Dilates a boolean mask: output position `j` is set if any input position `i` with
/// `i - expansion <= j < i + expansion` is set.
/// # Arguments
/// * `positions` - the mask to dilate
/// * `expansion` - the dilation radius
pub fn dilate(positions: &[bool], expansion: usize) -> Vec<bool> {
    let length = positions.len();
    let mut dilated = vec![false; length];
    for (i, &set) in positions.iter().enumerate() {
        if set {
            let low = i.saturating_sub(expansion);
            let high = (i + expansion).min(length);
            for slot in dilated[low..high].iter_mut() {
                *slot = true;
            }
        }
    }
    dilated
}

/// Computes anchor positions: the complement of the (optionally VCF-overridden)
/// candidate variant set dilated by `column_anchor_trim`. Returns both the anchors
/// and the un-dilated candidate positions.
/// # Arguments
/// * `poa` - the alignment
/// * `weights` - per-position thresholds
/// * `vcf_entries` - pre-called sites replacing the detector's set, when present
/// * `params` - detector configuration
pub fn anchor_positions(
    poa: &Poa, weights: &[f64], vcf_entries: Option<&[VcfEntry]>, params: &PolishParams
) -> (Vec<bool>, Vec<bool>) {
    let mut candidates = candidate_variant_positions(poa, weights, params);
    if let Some(entries) = vcf_entries {
        apply_vcf_positions(&mut candidates, entries);
    }

    let expanded = dilate(&candidates, params.column_anchor_trim);
    let anchors: Vec<bool> = expanded.iter().map(|&e| !e).collect();

    let anchor_count = anchors.iter().filter(|&&a| a).count();
    debug!("Creating filtered anchor positions got: {} anchors for ref seq of length: {}, that's one every: {:.3} bases",
        anchor_count, poa.nodes().len(), poa.nodes().len() as f64 / anchor_count as f64);

    (anchors, candidates)
}
