
use anyhow::{bail, ensure};
use log::{debug, warn};
use rustc_hash::FxHashMap;

use crate::data_types::phased_variant::PhasedVariant;

/// The metric value plus the matched-pair count backing it
#[derive(Clone, Copy, Debug)]
pub struct CorrectnessResult {
    /// The decay-weighted phasing correctness (NaN when no pair of matched variants exists)
    pub correctness: f64,
    /// Number of matched heterozygous variants contributing to the metric
    pub num_phased: usize,
}

/// Running partial sums for one live (query phase set, truth phase set) pair
#[derive(Clone, Debug)]
struct PartialPhaseSums {
    query_phase_set: String,
    truth_phase_set: String,
    /// Accumulator that acts as if every pair were correctly phased
    unphased_sum: f64,
    /// Accumulator for pairs matched in the direct orientation
    phase_sum1: f64,
    /// Accumulator for pairs matched in the crossed orientation
    phase_sum2: f64,
}

/// First and last index of each phase set over a sorted variant list.
/// # Arguments
/// * `variants` - the per-contig variant list, sorted by position
/// # Errors
/// * if the list is out of order
pub fn phase_set_intervals(variants: &[PhasedVariant]) -> anyhow::Result<FxHashMap<String, (usize, usize)>> {
    let mut intervals: FxHashMap<String, (usize, usize)> = Default::default();
    let mut prev_pos = i64::MIN;
    for (index, variant) in variants.iter().enumerate() {
        ensure!(prev_pos <= variant.ref_pos(),
            "Phased variant at position {} on sequence {} is out of order with position {}",
            variant.ref_pos(), variant.contig(), prev_pos);
        prev_pos = variant.ref_pos();

        intervals.entry(variant.phase_set().to_string())
            .and_modify(|interval| interval.1 = index)
            .or_insert((index, index));
    }
    Ok(intervals)
}

/// Allele matching between a query and truth variant at a shared position. Returns
/// `Some(match11)` when the allele sets pair up one of the two allowed ways, None when
/// the site must be skipped.
fn match_alleles(qpv: &PhasedVariant, tpv: &PhasedVariant) -> Option<bool> {
    let match11 = qpv.allele1() == tpv.allele1();
    let match12 = qpv.allele1() == tpv.allele2();
    let match21 = qpv.allele2() == tpv.allele1();
    let match22 = qpv.allele2() == tpv.allele2();

    if !(match11 || match12) || !(match21 || match22) {
        // the site is shared, but the alleles are not
        return None;
    }

    if match11 as u8 + match12 as u8 + match21 as u8 + match22 as u8 > 2 {
        // at least one allele must be duplicated in the list of alts
        warn!("Duplicate alleles detected at position {} on sequence {}", qpv.ref_pos(), qpv.contig());
        return None;
    }

    Some(match11)
}

/// One direction of the decay-weighted sum. Returns (total sum, partition total sum,
/// matched pair count).
fn phasing_correctness_internal(
    query: &[PhasedVariant], truth: &[PhasedVariant], decay: f64,
    query_intervals: &FxHashMap<String, (usize, usize)>,
    truth_intervals: &FxHashMap<String, (usize, usize)>,
    forward: bool
) -> (f64, f64, usize) {
    let mut partial_sums: Vec<PartialPhaseSums> = vec![];

    let mut total_sum = 0.0;
    let mut partition_sum = 0.0;
    let mut partition_total_sum = 0.0;
    // unphased partial sums of phase-set pairs that have fallen out of scope
    let mut out_of_scope_sum = 0.0;
    let mut num_phased = 0_usize;

    let (mut i, mut j, incr): (i64, i64, i64) = if forward {
        (0, 0, 1)
    } else {
        (query.len() as i64 - 1, truth.len() as i64 - 1, -1)
    };

    debug!("beginning {} sum", if forward { "forward" } else { "backward" });

    while i >= 0 && i < query.len() as i64 && j >= 0 && j < truth.len() as i64 {
        let qpv = &query[i as usize];
        let tpv = &truth[j as usize];

        if (qpv.ref_pos() < tpv.ref_pos() && forward) || (qpv.ref_pos() > tpv.ref_pos() && !forward) {
            // variant only in query
            i += incr;
        } else if (tpv.ref_pos() < qpv.ref_pos() && forward) || (tpv.ref_pos() > qpv.ref_pos() && !forward) {
            // variant only in truth
            j += incr;
        } else {
            i += incr;
            j += incr;

            let match11 = match match_alleles(qpv, tpv) {
                Some(m) => m,
                None => continue
            };

            num_phased += 1;

            // add each partial sum's contribution, registering a correctly phased
            // pair in the co-phased accumulator
            let mut found_cophased_sum = false;
            for sums in partial_sums.iter_mut() {
                if qpv.phase_set() == sums.query_phase_set && tpv.phase_set() == sums.truth_phase_set {
                    found_cophased_sum = true;
                    // only 1-1/2-2 or 1-2/2-1 pairings survive the het and allele filters
                    if match11 {
                        total_sum += sums.phase_sum1;
                        sums.phase_sum1 += 1.0;
                    } else {
                        total_sum += sums.phase_sum2;
                        sums.phase_sum2 += 1.0;
                    }
                } else {
                    total_sum += sums.unphased_sum;
                }
                // the unphased sum acts as if always correctly phased
                sums.unphased_sum += 1.0;
            }
            total_sum += out_of_scope_sum;

            // partition function is the max value, always counting pairs as phased
            partition_total_sum += partition_sum;
            partition_sum += 1.0;

            if !found_cophased_sum {
                // first time seeing this phase-set pair
                partial_sums.push(PartialPhaseSums {
                    query_phase_set: qpv.phase_set().to_string(),
                    truth_phase_set: tpv.phase_set().to_string(),
                    unphased_sum: 1.0,
                    phase_sum1: if match11 { 1.0 } else { 0.0 },
                    phase_sum2: if match11 { 0.0 } else { 1.0 }
                });
            }

            // decay everything for the next iteration
            for sums in partial_sums.iter_mut() {
                sums.unphased_sum *= decay;
                sums.phase_sum1 *= decay;
                sums.phase_sum2 *= decay;
            }
            partition_sum *= decay;
            out_of_scope_sum *= decay;
        }

        // retire phase-set pairs that have fallen out of scope
        let mut k = 0;
        while k < partial_sums.len() {
            let query_interval = query_intervals[&partial_sums[k].query_phase_set];
            let truth_interval = truth_intervals[&partial_sums[k].truth_phase_set];
            let out_of_scope = i < query_interval.0 as i64 || i > query_interval.1 as i64
                || j < truth_interval.0 as i64 || j > truth_interval.1 as i64;
            if out_of_scope {
                out_of_scope_sum += partial_sums[k].unphased_sum;
                partial_sums.swap_remove(k);
            } else {
                k += 1;
            }
        }
    }

    (total_sum, partition_total_sum, num_phased)
}

/// The switch-correctness limit of the decay metric: consecutive matched pairs within an
/// unchanged phase-set pair are correct iff the match orientation is unchanged; a phase
/// set boundary always counts as correct.
/// # Arguments
/// * `query` - query variants for one contig, sorted by position
/// * `truth` - truth variants for one contig, sorted by position
pub fn switch_correctness(query: &[PhasedVariant], truth: &[PhasedVariant]) -> CorrectnessResult {
    let mut prev_phase_sets: Option<(String, String)> = None;
    let mut prev_in_phase = false;
    let mut num_phased = 0_usize;
    let mut num_correct_pairs = 0_usize;

    let mut i = 0;
    let mut j = 0;
    while i < query.len() && j < truth.len() {
        let qpv = &query[i];
        let tpv = &truth[j];

        if qpv.ref_pos() < tpv.ref_pos() {
            i += 1;
        } else if tpv.ref_pos() < qpv.ref_pos() {
            j += 1;
        } else {
            i += 1;
            j += 1;

            let match11 = match match_alleles(qpv, tpv) {
                Some(m) => m,
                None => continue
            };

            num_phased += 1;

            if let Some((prev_query_ps, prev_truth_ps)) = prev_phase_sets.as_ref() {
                if qpv.phase_set() == prev_query_ps && tpv.phase_set() == prev_truth_ps {
                    if match11 == prev_in_phase {
                        num_correct_pairs += 1;
                    }
                } else {
                    // a switch cannot occur across phase-set boundaries
                    num_correct_pairs += 1;
                }
            }

            prev_in_phase = match11;
            prev_phase_sets = Some((qpv.phase_set().to_string(), tpv.phase_set().to_string()));
        }
    }

    let correctness = if num_phased <= 1 {
        f64::NAN
    } else {
        num_correct_pairs as f64 / (num_phased - 1) as f64
    };

    CorrectnessResult {
        correctness,
        num_phased
    }
}

/// The decay-weighted local phasing correctness between two phased variant lists on one
/// contig. `decay = 0` is evaluated as its switch-correctness limit; `decay = 1` weighs
/// all pair distances equally.
/// # Arguments
/// * `query` - query variants for one contig, sorted by position
/// * `truth` - truth variants for one contig, sorted by position
/// * `decay` - the per-step multiplicative weight, in [0, 1]
/// # Errors
/// * if `decay` is outside [0, 1]
/// * if either list is out of order
pub fn phasing_correctness(query: &[PhasedVariant], truth: &[PhasedVariant], decay: f64) -> anyhow::Result<CorrectnessResult> {
    if !(0.0..=1.0).contains(&decay) {
        bail!("Decay factor is {decay}, must be between 0.0 and 1.0");
    }

    debug!("calculating correctness with decay {decay}");

    if decay == 0.0 {
        // the limit has to be evaluated as a special case; direct evaluation
        // divides by zero
        return Ok(switch_correctness(query, truth));
    }

    let query_intervals = phase_set_intervals(query)?;
    let truth_intervals = phase_set_intervals(truth)?;

    let (forward_numer, forward_denom, num_phased) = phasing_correctness_internal(
        query, truth, decay, &query_intervals, &truth_intervals, true
    );
    let (backward_numer, backward_denom, _backward_phased) = phasing_correctness_internal(
        query, truth, decay, &query_intervals, &truth_intervals, false
    );

    let correctness = (forward_numer + backward_numer) / (forward_denom + backward_denom);
    debug!("fwd numer {forward_numer}, bwd numer {backward_numer}, fwd denom {forward_denom}, bwd denom {backward_denom}, final answer {correctness}");

    Ok(CorrectnessResult {
        correctness,
        num_phased
    })
}
