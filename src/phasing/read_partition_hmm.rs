
use log::{debug, info};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::data_types::parameters::PhaseParams;
use crate::phasing::profile_seq::{PhasingReference, ProfileSeq, Site};
use crate::util::log_math::{log_add_exact, LOG_ZERO};

/// One site of the most-probable path: the active reads and their oriented haplotype
/// bits. Bit `k` set means `read_ids[k]` belongs to haplotype 2.
#[derive(Clone, Debug)]
pub struct PathColumn {
    /// Absolute bubble index of the site
    pub site_index: usize,
    /// Active read ids at the site, sorted ascending
    pub read_ids: Vec<usize>,
    /// Oriented partition bits over `read_ids`
    pub partition: u64,
}

/// The traceback result: one column per site across the phased span
#[derive(Clone, Debug, Default)]
pub struct PhasedPath {
    /// First site of the span
    pub ref_start: usize,
    /// Number of sites spanned
    pub length: usize,
    /// One column per site
    pub columns: Vec<PathColumn>,
}

/// A partition hypothesis at one column
#[derive(Clone, Copy, Debug)]
struct Cell {
    /// Canonical partition bits (lowest bit forced to 0) over the column's active reads
    partition: u64,
    emission: f64,
    forward: f64,
    backward: f64,
}

/// One column of the HMM: a site, its active profile sequences, and the beam of
/// partition cells under consideration
#[derive(Clone, Debug)]
struct Column {
    site_index: usize,
    /// Indices into the HMM's profile sequence list, sorted by read id
    seq_indices: Vec<usize>,
    cells: Vec<Cell>,
    /// For each continuing read: (position in this column, position in previous column)
    continuing: Vec<(usize, usize)>,
}

/// Forces the complement-equivalent canonical form: the lowest bit is 0
fn canonicalize(partition: u64, depth: usize) -> u64 {
    if depth == 0 {
        return 0;
    }
    let mask = if depth == 64 { u64::MAX } else { (1_u64 << depth) - 1 };
    if partition & 1 == 1 {
        !partition & mask
    } else {
        partition & mask
    }
}

/// Checks partition agreement on continuing reads: returns Some(false) when the bits
/// agree directly, Some(true) when they agree under complement, None when incompatible.
fn transition_flip(prev_partition: u64, cur_partition: u64, continuing: &[(usize, usize)]) -> Option<bool> {
    let mut all_same = true;
    let mut all_opposite = true;
    for &(cur_pos, prev_pos) in continuing.iter() {
        let cur_bit = (cur_partition >> cur_pos) & 1;
        let prev_bit = (prev_partition >> prev_pos) & 1;
        if cur_bit == prev_bit {
            all_opposite = false;
        } else {
            all_same = false;
        }
    }

    if all_same {
        Some(false)
    } else if all_opposite {
        Some(true)
    } else {
        None
    }
}

/// Emission of a partition at a site: each side's reads are summed per allele, each side
/// is collapsed over alleles (optionally through an ancestor substitution model), and
/// the two sides multiply.
/// # Arguments
/// * `site` - the site's allele bookkeeping and substitution model
/// * `active` - the active profile sequences, in column order
/// * `assigned_mask` - which column positions participate (partial partitions during seeding)
/// * `partition` - the partition bits
/// * `include_ancestor_sub_prob` - marginalize over an ancestor allele when true
fn emission_log_prob(
    site: &Site, active: &[&ProfileSeq], assigned_mask: u64, partition: u64,
    include_ancestor_sub_prob: bool
) -> f64 {
    let allele_number = site.allele_number();
    let mut side1 = vec![0.0; allele_number];
    let mut side2 = vec![0.0; allele_number];
    for (position, seq) in active.iter().enumerate() {
        if (assigned_mask >> position) & 1 == 0 {
            continue;
        }
        let side = if (partition >> position) & 1 == 0 { &mut side1 } else { &mut side2 };
        for (allele, slot) in side.iter_mut().enumerate() {
            *slot += seq.allele_log_prob(site.allele_offset(), allele);
        }
    }

    if include_ancestor_sub_prob {
        let mut total = LOG_ZERO;
        for ancestor in 0..allele_number {
            let mut hap1 = LOG_ZERO;
            let mut hap2 = LOG_ZERO;
            for allele in 0..allele_number {
                let substitution = site.substitution_log_prob(ancestor, allele);
                hap1 = log_add_exact(hap1, substitution + side1[allele]);
                hap2 = log_add_exact(hap2, substitution + side2[allele]);
            }
            total = log_add_exact(total, site.prior_log_prob(ancestor) + hap1 + hap2);
        }
        total
    } else {
        let mut hap1 = LOG_ZERO;
        let mut hap2 = LOG_ZERO;
        for allele in 0..allele_number {
            hap1 = log_add_exact(hap1, site.prior_log_prob(allele) + side1[allele]);
            hap2 = log_add_exact(hap2, site.prior_log_prob(allele) + side2[allele]);
        }
        hap1 + hap2
    }
}

/// The column HMM over read bit-partitions. Hidden state at each site is a canonical
/// partition of the active reads into two haplotype groups; complementary partitions are
/// the same state. Cell populations are beam-limited per column.
pub struct ReadPartitionHmm<'a> {
    reference: &'a PhasingReference,
    seqs: Vec<&'a ProfileSeq>,
    ref_start: usize,
    length: usize,
    columns: Vec<Column>,
    include_ancestor_sub_prob: bool,
    forward_log_prob: f64,
    backward_log_prob: f64,
}

impl<'a> ReadPartitionHmm<'a> {
    /// Builds the HMM spanning all sites covered by the given profile sequences.
    /// # Arguments
    /// * `seqs` - the profile sequences to phase; must be non-empty
    /// * `reference` - per-site allele bookkeeping
    /// * `params` - beam width and related knobs
    /// * `include_ancestor_sub_prob` - emission model flag (off inside per-strand phasing)
    /// * `seed_assignments` - optional global read-to-haplotype hints; each map seeds one
    ///   candidate partition per column
    pub fn new(
        mut seqs: Vec<&'a ProfileSeq>, reference: &'a PhasingReference, params: &PhaseParams,
        include_ancestor_sub_prob: bool, seed_assignments: &[FxHashMap<usize, bool>]
    ) -> Self {
        assert!(!seqs.is_empty(), "cannot build an HMM over zero profile sequences");
        seqs.sort_by_key(|s| s.read_id());

        let ref_start = seqs.iter().map(|s| s.ref_start()).min().unwrap();
        let ref_end = seqs.iter().map(|s| s.ref_start() + s.length()).max().unwrap();
        let length = ref_end - ref_start;

        let mut columns: Vec<Column> = Vec::with_capacity(length);
        for site_index in ref_start..ref_end {
            let seq_indices: Vec<usize> = seqs.iter().enumerate()
                .filter(|(_i, s)| s.covers(site_index))
                .map(|(i, _s)| i)
                .collect();
            assert!(seq_indices.len() <= 64, "active read depth exceeds the partition bitmask");

            // positions of reads continuing from the previous column
            let continuing: Vec<(usize, usize)> = if let Some(prev) = columns.last() {
                seq_indices.iter().enumerate()
                    .filter_map(|(cur_pos, seq_index)| {
                        prev.seq_indices.iter().position(|p| p == seq_index)
                            .map(|prev_pos| (cur_pos, prev_pos))
                    })
                    .collect()
            } else {
                vec![]
            };

            columns.push(Column {
                site_index,
                seq_indices,
                cells: vec![],
                continuing
            });
        }

        let mut hmm = Self {
            reference,
            seqs,
            ref_start,
            length,
            columns,
            include_ancestor_sub_prob,
            forward_log_prob: LOG_ZERO,
            backward_log_prob: LOG_ZERO
        };
        hmm.populate_cells(params, seed_assignments);
        hmm
    }

    /// Generates each column's cell beam: projections of the previous column's cells,
    /// seed partitions, and both expansions of every entering read, pruned by emission.
    fn populate_cells(&mut self, params: &PhaseParams, seed_assignments: &[FxHashMap<usize, bool>]) {
        for column_index in 0..self.columns.len() {
            let (depth, site_index) = {
                let column = &self.columns[column_index];
                (column.seq_indices.len(), column.site_index)
            };
            let site = &self.reference.sites()[site_index];
            let active: Vec<&ProfileSeq> = self.columns[column_index].seq_indices.iter()
                .map(|&i| self.seqs[i])
                .collect();

            // fixed bits for continuing reads, one candidate per surviving previous cell
            let mut candidates: Vec<u64> = if column_index == 0 {
                vec![0]
            } else {
                let continuing = &self.columns[column_index].continuing;
                let prev_cells = &self.columns[column_index - 1].cells;
                let mut projections: Vec<u64> = prev_cells.iter()
                    .map(|cell| {
                        let mut projected = 0_u64;
                        for &(cur_pos, prev_pos) in continuing.iter() {
                            if (cell.partition >> prev_pos) & 1 == 1 {
                                projected |= 1 << cur_pos;
                            }
                        }
                        projected
                    })
                    .collect();
                projections.sort_unstable();
                projections.dedup();
                projections
            };

            // seed candidates from global assignment hints
            for assignment in seed_assignments.iter() {
                let mut seeded = 0_u64;
                for (position, seq) in active.iter().enumerate() {
                    if assignment.get(&seq.read_id()).copied().unwrap_or(false) {
                        seeded |= 1 << position;
                    }
                }
                candidates.push(seeded);
            }

            // expand entering reads one position at a time, pruning by partial emission
            let continuing_mask: u64 = self.columns[column_index].continuing.iter()
                .fold(0, |mask, &(cur_pos, _)| mask | (1 << cur_pos));
            let mut assigned_mask = continuing_mask;
            for position in 0..depth {
                if (continuing_mask >> position) & 1 == 1 {
                    continue;
                }
                assigned_mask |= 1 << position;
                let mut expanded = Vec::with_capacity(candidates.len() * 2);
                for &candidate in candidates.iter() {
                    expanded.push(candidate);
                    expanded.push(candidate | (1 << position));
                }
                candidates = expanded;

                if candidates.len() > params.max_partitions_per_column {
                    let mut scored: Vec<(f64, u64)> = candidates.into_iter()
                        .map(|c| {
                            (emission_log_prob(site, &active, assigned_mask, c, self.include_ancestor_sub_prob), c)
                        })
                        .collect();
                    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
                    scored.truncate(params.max_partitions_per_column);
                    candidates = scored.into_iter().map(|(_score, c)| c).collect();
                }
            }

            // canonicalize, dedup, and score the survivors
            let mut canonical: Vec<u64> = candidates.into_iter()
                .map(|c| canonicalize(c, depth))
                .collect();
            canonical.sort_unstable();
            canonical.dedup();

            let full_mask = if depth == 0 { 0 } else if depth == 64 { u64::MAX } else { (1_u64 << depth) - 1 };
            let mut cells: Vec<Cell> = canonical.into_iter()
                .map(|partition| {
                    Cell {
                        partition,
                        emission: emission_log_prob(site, &active, full_mask, partition, self.include_ancestor_sub_prob),
                        forward: LOG_ZERO,
                        backward: LOG_ZERO
                    }
                })
                .collect();

            if cells.len() > params.max_partitions_per_column {
                cells.sort_by(|a, b| b.emission.total_cmp(&a.emission));
                cells.truncate(params.max_partitions_per_column);
            }

            self.columns[column_index].cells = cells;
        }
    }

    /// Runs the forward and backward passes over sites x cells
    pub fn forward_backward(&mut self) {
        // forward
        for column_index in 0..self.columns.len() {
            if column_index == 0 {
                for cell in self.columns[0].cells.iter_mut() {
                    cell.forward = cell.emission;
                }
                continue;
            }

            let (left, right) = self.columns.split_at_mut(column_index);
            let prev = &left[column_index - 1];
            let column = &mut right[0];
            for cell in column.cells.iter_mut() {
                let mut incoming = LOG_ZERO;
                for prev_cell in prev.cells.iter() {
                    if transition_flip(prev_cell.partition, cell.partition, &column.continuing).is_some() {
                        incoming = log_add_exact(incoming, prev_cell.forward);
                    }
                }
                cell.forward = cell.emission + incoming;
            }
        }

        let last = self.columns.last().unwrap();
        self.forward_log_prob = last.cells.iter()
            .fold(LOG_ZERO, |total, cell| log_add_exact(total, cell.forward));

        // backward
        for cell in self.columns.last_mut().unwrap().cells.iter_mut() {
            cell.backward = 0.0;
        }
        for column_index in (0..self.columns.len() - 1).rev() {
            let (left, right) = self.columns.split_at_mut(column_index + 1);
            let column = &mut left[column_index];
            let next = &right[0];
            for cell in column.cells.iter_mut() {
                let mut outgoing = LOG_ZERO;
                for next_cell in next.cells.iter() {
                    if transition_flip(cell.partition, next_cell.partition, &next.continuing).is_some() {
                        outgoing = log_add_exact(outgoing, next_cell.emission + next_cell.backward);
                    }
                }
                cell.backward = outgoing;
            }
        }

        let first = &self.columns[0];
        self.backward_log_prob = first.cells.iter()
            .fold(LOG_ZERO, |total, cell| log_add_exact(total, cell.emission + cell.backward));
    }

    /// Traces the most-probable path by walking backwards from the best final forward
    /// score, resolving complement orientation so haplotype labels stay consistent
    /// across columns.
    pub fn forward_traceback(&self) -> PhasedPath {
        let mut oriented: Vec<(usize, u64)> = Vec::with_capacity(self.columns.len()); // (cell index, oriented partition)

        let last_column = self.columns.last().unwrap();
        let mut cell_index = last_column.cells.iter().enumerate()
            .max_by(|(_a, ca), (_b, cb)| ca.forward.total_cmp(&cb.forward))
            .map(|(i, _c)| i)
            .unwrap();
        let mut flipped = false;

        for column_index in (0..self.columns.len()).rev() {
            let column = &self.columns[column_index];
            let cell = &column.cells[cell_index];
            let depth = column.seq_indices.len();
            let mask = if depth == 0 { 0 } else if depth == 64 { u64::MAX } else { (1_u64 << depth) - 1 };
            let actual = if flipped { !cell.partition & mask } else { cell.partition };
            oriented.push((column_index, actual));

            if column_index == 0 {
                break;
            }

            // best compatible predecessor by forward score
            let prev_column = &self.columns[column_index - 1];
            let mut best: Option<(usize, bool, f64)> = None;
            for (prev_index, prev_cell) in prev_column.cells.iter().enumerate() {
                if let Some(transition_flipped) = transition_flip(prev_cell.partition, cell.partition, &column.continuing) {
                    if best.map(|(_i, _f, score)| prev_cell.forward > score).unwrap_or(true) {
                        best = Some((prev_index, transition_flipped, prev_cell.forward));
                    }
                }
            }
            // a seed-derived cell can lose its predecessors to pruning; restart the
            // orientation from the best previous cell in that case
            let (prev_index, transition_flipped) = match best {
                Some((prev_index, transition_flipped, _score)) => (prev_index, transition_flipped),
                None => {
                    let fallback = prev_column.cells.iter().enumerate()
                        .max_by(|(_a, ca), (_b, cb)| ca.forward.total_cmp(&cb.forward))
                        .map(|(i, _c)| i)
                        .unwrap();
                    (fallback, false)
                }
            };
            cell_index = prev_index;
            flipped ^= transition_flipped;
        }

        oriented.reverse();
        let columns: Vec<PathColumn> = oriented.into_iter()
            .map(|(column_index, partition)| {
                let column = &self.columns[column_index];
                PathColumn {
                    site_index: column.site_index,
                    read_ids: column.seq_indices.iter().map(|&i| self.seqs[i].read_id()).collect(),
                    partition
                }
            })
            .collect();

        PhasedPath {
            ref_start: self.ref_start,
            length: self.length,
            columns
        }
    }

    // getters
    pub fn ref_start(&self) -> usize {
        self.ref_start
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn forward_log_prob(&self) -> f64 {
        self.forward_log_prob
    }

    pub fn backward_log_prob(&self) -> f64 {
        self.backward_log_prob
    }
}

/// Extracts a global read-to-haplotype assignment from an oriented path
pub fn path_assignments(path: &PhasedPath) -> FxHashMap<usize, bool> {
    let mut assignments: FxHashMap<usize, bool> = Default::default();
    for column in path.columns.iter() {
        for (position, &read_id) in column.read_ids.iter().enumerate() {
            let bit = (column.partition >> position) & 1 == 1;
            assignments.entry(read_id).or_insert(bit);
        }
    }
    assignments
}

/// Greedily drops reads so that no site's active-read count exceeds the coverage cap.
/// At an over-covered site, the spanning read reaching furthest right goes first.
/// Returns the discarded read ids.
/// # Arguments
/// * `profiles` - all profile sequences
/// * `params` - supplies `max_coverage_depth`
pub fn filter_reads_by_coverage_depth(
    profiles: &FxHashMap<usize, ProfileSeq>, params: &PhaseParams
) -> FxHashSet<usize> {
    let mut discarded: FxHashSet<usize> = Default::default();
    if profiles.is_empty() {
        return discarded;
    }

    let ref_start = profiles.values().map(|p| p.ref_start()).min().unwrap();
    let ref_end = profiles.values().map(|p| p.ref_start() + p.length()).max().unwrap();

    let mut coverage = vec![0_usize; ref_end - ref_start];
    for profile in profiles.values() {
        for site in profile.ref_start()..profile.ref_start() + profile.length() {
            coverage[site - ref_start] += 1;
        }
    }

    for site in ref_start..ref_end {
        while coverage[site - ref_start] > params.max_coverage_depth {
            // longest-reaching spanning read goes first; read id breaks ties deterministically
            let victim = profiles.values()
                .filter(|p| p.covers(site) && !discarded.contains(&p.read_id()))
                .max_by_key(|p| (p.ref_start() + p.length(), p.read_id()))
                .map(|p| p.read_id())
                .unwrap();

            let profile = &profiles[&victim];
            for covered in profile.ref_start()..profile.ref_start() + profile.length() {
                coverage[covered - ref_start] -= 1;
            }
            discarded.insert(victim);
        }
    }

    if !discarded.is_empty() {
        info!("Coverage filter discarded {} of {} reads (cap {})",
            discarded.len(), profiles.len(), params.max_coverage_depth);
    }

    discarded
}

/// Runs the full strand-split phasing pipeline over a set of profile sequences:
/// each strand is phased on its own with ancestor substitution off, the two
/// assignments seed the fused HMM over all reads, and the fused traceback is returned.
/// # Arguments
/// * `seqs` - profile sequences that survived the coverage filter
/// * `strand_by_read` - forward-strand flag per read id
/// * `reference` - per-site allele bookkeeping
/// * `params` - phasing knobs
pub fn phase_profile_seqs(
    seqs: Vec<&ProfileSeq>, strand_by_read: &FxHashMap<usize, bool>,
    reference: &PhasingReference, params: &PhaseParams
) -> PhasedPath {
    let forward_seqs: Vec<&ProfileSeq> = seqs.iter().copied()
        .filter(|s| strand_by_read.get(&s.read_id()).copied().unwrap_or(true))
        .collect();
    let reverse_seqs: Vec<&ProfileSeq> = seqs.iter().copied()
        .filter(|s| !strand_by_read.get(&s.read_id()).copied().unwrap_or(true))
        .collect();
    info!("Got {} forward strand reads for phasing and {} reverse strand reads for phasing",
        forward_seqs.len(), reverse_seqs.len());

    // per-strand phasing with ancestor substitution switched off
    let mut strand_assignments: Vec<FxHashMap<usize, bool>> = vec![];
    for strand_seqs in [forward_seqs, reverse_seqs] {
        if strand_seqs.is_empty() {
            strand_assignments.push(Default::default());
            continue;
        }
        let mut hmm = ReadPartitionHmm::new(strand_seqs, reference, params, false, &[]);
        hmm.forward_backward();
        let path = hmm.forward_traceback();
        strand_assignments.push(path_assignments(&path));
    }

    // merge the two strand assignments in both orientations as seeds for the fused hmm
    let mut merged_direct = strand_assignments[0].clone();
    let mut merged_flipped = strand_assignments[0].clone();
    for (&read_id, &bit) in strand_assignments[1].iter() {
        merged_direct.insert(read_id, bit);
        merged_flipped.insert(read_id, !bit);
    }

    let mut hmm = ReadPartitionHmm::new(
        seqs, reference, params, params.include_ancestor_sub_prob, &[merged_direct, merged_flipped]
    );
    hmm.forward_backward();
    info!("Forward probability of the hmm: {:.3}, backward prob: {:.3}",
        hmm.forward_log_prob(), hmm.backward_log_prob());
    debug!("Phasing hmm spans [{}, {})", hmm.ref_start(), hmm.ref_start() + hmm.length());

    hmm.forward_traceback()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phasing::profile_seq::test_profiles::make_profile;

    /// Two clean haplotype groups over `sites` biallelic sites: even reads always prefer
    /// allele 0, odd reads always prefer allele 1.
    fn clean_profiles(read_count: usize, sites: usize) -> (Vec<ProfileSeq>, PhasingReference) {
        let reference = crate::phasing::profile_seq::test_profiles::biallelic_reference(sites);
        let profiles: Vec<ProfileSeq> = (0..read_count)
            .map(|read_id| {
                let bytes: Vec<u8> = (0..sites)
                    .flat_map(|_| {
                        if read_id % 2 == 0 { [0, 60] } else { [60, 0] }
                    })
                    .collect();
                make_profile(read_id, 0, sites, 0, bytes)
            })
            .collect();
        (profiles, reference)
    }

    #[test]
    fn test_canonicalize() {
        // lowest bit forced to zero
        assert_eq!(canonicalize(0b0110, 4), 0b0110);
        assert_eq!(canonicalize(0b0111, 4), 0b1000);
        assert_eq!(canonicalize(0, 0), 0);
        // complementary partitions collapse to the same state
        assert_eq!(canonicalize(0b0101, 4), canonicalize(0b1010, 4));
    }

    #[test]
    fn test_transition_flip() {
        let continuing = vec![(0, 0), (1, 1)];
        assert_eq!(transition_flip(0b01, 0b01, &continuing), Some(false));
        assert_eq!(transition_flip(0b01, 0b10, &continuing), Some(true));
        assert_eq!(transition_flip(0b00, 0b01, &continuing), None);
        // no continuing reads: trivially compatible
        assert_eq!(transition_flip(0b11, 0b00, &[]), Some(false));
    }

    #[test]
    fn test_hmm_separates_clean_haplotypes() {
        let (profiles, reference) = clean_profiles(4, 3);
        let refs: Vec<&ProfileSeq> = profiles.iter().collect();
        let params = PhaseParams::default();

        let mut hmm = ReadPartitionHmm::new(refs, &reference, &params, true, &[]);
        hmm.forward_backward();
        let path = hmm.forward_traceback();

        assert_eq!(path.length, 3);
        let assignments = path_assignments(&path);
        // even and odd reads land on opposite haplotypes at every site
        assert_eq!(assignments[&0], assignments[&2]);
        assert_eq!(assignments[&1], assignments[&3]);
        assert_ne!(assignments[&0], assignments[&1]);

        // assignments are consistent across all columns
        for column in path.columns.iter() {
            for (position, &read_id) in column.read_ids.iter().enumerate() {
                let bit = (column.partition >> position) & 1 == 1;
                assert_eq!(bit, assignments[&read_id]);
            }
        }
    }

    #[test]
    fn test_forward_backward_agreement() {
        let (profiles, reference) = clean_profiles(4, 3);
        let refs: Vec<&ProfileSeq> = profiles.iter().collect();
        let params = PhaseParams::default();

        let mut hmm = ReadPartitionHmm::new(refs, &reference, &params, true, &[]);
        hmm.forward_backward();
        assert!((hmm.forward_log_prob() - hmm.backward_log_prob()).abs() < 1e-6);
    }

    #[test]
    fn test_canonical_cells_have_bit0_clear() {
        let (profiles, reference) = clean_profiles(6, 2);
        let refs: Vec<&ProfileSeq> = profiles.iter().collect();
        let params = PhaseParams::default();

        let hmm = ReadPartitionHmm::new(refs, &reference, &params, true, &[]);
        for column in hmm.columns.iter() {
            for cell in column.cells.iter() {
                if !column.seq_indices.is_empty() {
                    assert_eq!(cell.partition & 1, 0);
                }
            }
        }
    }

    #[test]
    fn test_strand_split_phasing() {
        let (profiles, reference) = clean_profiles(6, 3);
        let params = PhaseParams::default();

        // strand is independent of haplotype here: reads 0..3 forward, rest reverse
        let strand_by_read: FxHashMap<usize, bool> = (0..6).map(|id| (id, id < 3)).collect();
        let refs: Vec<&ProfileSeq> = profiles.iter().collect();
        let path = phase_profile_seqs(refs, &strand_by_read, &reference, &params);

        let assignments = path_assignments(&path);
        for read_id in 0..6 {
            assert_eq!(assignments[&read_id] == assignments[&0], read_id % 2 == 0,
                "read {read_id} landed on the wrong side");
        }
    }

    #[test]
    fn test_coverage_filter() {
        let (profiles, _reference) = clean_profiles(8, 3);
        let profile_map: FxHashMap<usize, ProfileSeq> = profiles.into_iter()
            .map(|p| (p.read_id(), p))
            .collect();

        let params = crate::data_types::parameters::PhaseParamsBuilder::default()
            .max_coverage_depth(5_usize)
            .build().unwrap();
        let discarded = filter_reads_by_coverage_depth(&profile_map, &params);
        assert_eq!(discarded.len(), 3);

        // nothing discarded when under the cap
        let loose = PhaseParams::default();
        assert!(filter_reads_by_coverage_depth(&profile_map, &loose).is_empty());
    }

    #[test]
    fn test_staggered_reads_stay_consistent() {
        // reads tile the sites with overlaps; haplotype signal stays parity-based
        let reference = crate::phasing::profile_seq::test_profiles::biallelic_reference(4);
        let spans = [(0_usize, 3_usize), (0, 3), (1, 3), (1, 3), (2, 2), (2, 2)];
        let profiles: Vec<ProfileSeq> = spans.iter().enumerate()
            .map(|(read_id, &(start, length))| {
                let bytes: Vec<u8> = (0..length)
                    .flat_map(|_| if read_id % 2 == 0 { [0, 60] } else { [60, 0] })
                    .collect();
                make_profile(read_id, start, length, start * 2, bytes)
            })
            .collect();

        let refs: Vec<&ProfileSeq> = profiles.iter().collect();
        let params = PhaseParams::default();
        let mut hmm = ReadPartitionHmm::new(refs, &reference, &params, true, &[]);
        hmm.forward_backward();
        let path = hmm.forward_traceback();

        let assignments = path_assignments(&path);
        for read_id in 0..6 {
            assert_eq!(assignments[&read_id] == assignments[&0], read_id % 2 == 0);
        }
    }
}
