
/// Generates the per-(contig, decay) correctness summary table
pub mod correctness_summary;
/// Generates the per-bubble per-read haplotype support JSON
pub mod phasing_support;
