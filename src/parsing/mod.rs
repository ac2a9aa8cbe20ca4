
/// Loads phased heterozygous variants from VCF files for the correctness evaluator
pub mod phased_vcf;
