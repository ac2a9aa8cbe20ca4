
use anyhow::{anyhow, bail, Context};
use indexmap::IndexMap;
use log::{info, warn};
use noodles::vcf;
use noodles::vcf::variant::record::samples::keys::key as vcf_key;
use std::path::Path;
use std::time::Instant;

use crate::data_types::phased_variant::PhasedVariant;

/// The phase set FORMAT key
const PS_KEY: &str = "PS";

/// Loads the heterozygous, PASS, phased variants from a VCF, grouped per contig and
/// sorted by position. Skipped records are counted and summarized in the log.
/// # Arguments
/// * `vcf_fn` - the VCF path; plain or bgzipped
/// # Errors
/// * if the file cannot be opened or parsed
/// * if the header has no PS FORMAT tag, or the tag is neither integer nor string typed
pub fn load_phased_variants(vcf_fn: &Path) -> anyhow::Result<IndexMap<String, Vec<PhasedVariant>>> {
    let start_time = Instant::now();

    let mut reader = vcf::io::reader::Builder::default()
        .build_from_path(vcf_fn)
        .with_context(|| format!("Error while opening {vcf_fn:?}:"))?;
    let header = reader.read_header()
        .with_context(|| format!("Error while reading header of {vcf_fn:?}:"))?;

    if header.sample_names().len() > 1 {
        warn!("Got {} samples reading {vcf_fn:?}, will only take VCF records for the first",
            header.sample_names().len());
    }

    // the PS tag must be declared, either integer or string typed
    let ps_format = header.formats().get(PS_KEY)
        .ok_or(anyhow!("PS tag not present in VCF header for {vcf_fn:?}"))?;
    let ps_is_integer = match ps_format.ty() {
        vcf::header::record::value::map::format::Type::Integer => true,
        vcf::header::record::value::map::format::Type::String => false,
        other => bail!("Unknown PS type {other:?} in VCF header for {vcf_fn:?}")
    };

    let mut entries: IndexMap<String, Vec<PhasedVariant>> = Default::default();
    let mut total_entries = 0_u64;
    let mut skipped_for_not_pass = 0_u64;
    let mut skipped_for_homozygous = 0_u64;
    let mut skipped_for_no_phaseset = 0_u64;
    let mut total_saved = 0_u64;

    for result in reader.record_bufs(&header) {
        let record = result?;
        total_entries += 1;

        // PASS records only
        if !record.filters().as_ref().iter().any(|f| f == "PASS") {
            skipped_for_not_pass += 1;
            continue;
        }

        // heterozygous genotypes only; a missing GT is treated as homozygous
        let sample = record.samples().get_index(0)
            .ok_or(anyhow!("Record in {vcf_fn:?} has no samples"))?;
        let genotype = match sample.get(vcf_key::GENOTYPE).flatten() {
            Some(gt) => gt,
            None => {
                skipped_for_homozygous += 1;
                continue;
            }
        };
        let (gt1, gt2) = match parse_genotype_indices(genotype) {
            Some(indices) => indices,
            None => {
                skipped_for_homozygous += 1;
                continue;
            }
        };
        if gt1 == gt2 {
            skipped_for_homozygous += 1;
            continue;
        }

        // phase set, skipping missing/zero identifiers
        let phase_set = match sample.get(PS_KEY).flatten() {
            Some(vcf::variant::record_buf::samples::sample::Value::Integer(ps)) if ps_is_integer => {
                if *ps == 0 {
                    skipped_for_no_phaseset += 1;
                    continue;
                }
                ps.to_string()
            },
            Some(vcf::variant::record_buf::samples::sample::Value::String(ps)) if !ps_is_integer => {
                if ps == "." {
                    skipped_for_no_phaseset += 1;
                    continue;
                }
                ps.clone()
            },
            _ => {
                skipped_for_no_phaseset += 1;
                continue;
            }
        };

        let contig = record.reference_sequence_name().to_string();
        let position = record.variant_start().ok_or(anyhow!("Record in {vcf_fn:?} has no POS"))?;
        let quality = record.quality_score().unwrap_or(f32::NAN) as f64;

        let mut alleles: Vec<String> = vec![record.reference_bases().to_string()];
        alleles.extend(record.alternate_bases().as_ref().iter().map(|a| a.to_string()));
        if gt1 >= alleles.len() || gt2 >= alleles.len() {
            bail!("Genotype indices out of range at {contig}:{position} in {vcf_fn:?}");
        }

        entries.entry(contig.clone()).or_default().push(PhasedVariant::new(
            contig,
            position.get() as i64 - 1, // 0-based
            quality,
            alleles,
            gt1,
            gt2,
            phase_set
        ));
        total_saved += 1;
    }

    // position-sort every contig list; duplicate positions are suspicious but tolerated
    for (contig, contig_entries) in entries.iter_mut() {
        contig_entries.sort_by(|a, b| a.position_cmp(b));
        for pair in contig_entries.windows(2) {
            if pair[0].ref_pos() == pair[1].ref_pos() {
                warn!("Encountered two variants at same position: {contig}:{}", pair[0].ref_pos());
            }
        }
    }

    info!("Read {total_entries} variants from {vcf_fn:?} over {} contigs in {:.1}s, keeping {total_saved} phased variants and discarding {skipped_for_not_pass} for not PASS, {skipped_for_homozygous} for HOM, {skipped_for_no_phaseset} for not phased.",
        entries.len(), start_time.elapsed().as_secs_f64());

    Ok(entries)
}

/// Pulls the two genotype allele indices from a GT value. Returns None for missing or
/// non-diploid calls.
fn parse_genotype_indices(gt: &vcf::variant::record_buf::samples::sample::Value) -> Option<(usize, usize)> {
    if let vcf::variant::record_buf::samples::sample::Value::Genotype(genotype) = gt {
        let alleles = genotype.as_ref();
        match alleles.len() {
            2 => {
                let a1 = alleles[0].position()?;
                let a2 = alleles[1].position()?;
                Some((a1, a2))
            },
            _ => None
        }
    } else {
        None
    }
}

/// The sorted intersection of contigs present in both variant maps.
/// # Arguments
/// * `entries1` - first per-contig variant map
/// * `entries2` - second per-contig variant map
pub fn get_shared_contigs(
    entries1: &IndexMap<String, Vec<PhasedVariant>>, entries2: &IndexMap<String, Vec<PhasedVariant>>
) -> Vec<String> {
    let mut shared: Vec<String> = entries1.keys()
        .filter(|contig| entries2.contains_key(*contig))
        .cloned()
        .collect();
    shared.sort();
    shared
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TEST_VCF: &str = "\
##fileformat=VCFv4.2
##FILTER=<ID=PASS,Description=\"All filters passed\">
##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">
##FORMAT=<ID=PS,Number=1,Type=Integer,Description=\"Phase set\">
##contig=<ID=chr1>
##contig=<ID=chr2>
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tsample1
chr1\t11\t.\tA\tC\t30\tPASS\t.\tGT:PS\t0|1:100
chr1\t21\t.\tG\tT\t30\tPASS\t.\tGT:PS\t1|0:100
chr1\t31\t.\tA\tG\t30\tq10\t.\tGT:PS\t0|1:100
chr1\t41\t.\tC\tT\t30\tPASS\t.\tGT:PS\t1|1:100
chr1\t51\t.\tC\tG\t30\tPASS\t.\tGT\t0|1
chr2\t16\t.\tT\tA\t30\tPASS\t.\tGT:PS\t0|1:200
";

    fn write_test_vcf(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".vcf")
            .tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_phased_variants() {
        let vcf_file = write_test_vcf(TEST_VCF);
        let entries = load_phased_variants(vcf_file.path()).unwrap();

        // not-PASS, homozygous, and PS-less records are dropped
        assert_eq!(entries.len(), 2);
        let chr1 = &entries["chr1"];
        assert_eq!(chr1.len(), 2);
        assert_eq!(chr1[0].ref_pos(), 10);
        assert_eq!(chr1[0].gt1(), 0);
        assert_eq!(chr1[0].gt2(), 1);
        assert_eq!(chr1[0].phase_set(), "100");
        assert_eq!(chr1[1].ref_pos(), 20);
        assert_eq!(chr1[1].gt1(), 1);
        assert_eq!(chr1[1].gt2(), 0);

        let chr2 = &entries["chr2"];
        assert_eq!(chr2.len(), 1);
        assert_eq!(chr2[0].alleles(), &["T".to_string(), "A".to_string()]);
    }

    #[test]
    fn test_missing_ps_header_is_fatal() {
        let no_ps = TEST_VCF.replace("##FORMAT=<ID=PS,Number=1,Type=Integer,Description=\"Phase set\">\n", "");
        let vcf_file = write_test_vcf(&no_ps);
        assert!(load_phased_variants(vcf_file.path()).is_err());
    }

    #[test]
    fn test_shared_contigs() {
        let vcf_file = write_test_vcf(TEST_VCF);
        let entries1 = load_phased_variants(vcf_file.path()).unwrap();

        let chr2_only = "\
##fileformat=VCFv4.2
##FILTER=<ID=PASS,Description=\"All filters passed\">
##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">
##FORMAT=<ID=PS,Number=1,Type=Integer,Description=\"Phase set\">
##contig=<ID=chr2>
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tsample1
chr2\t16\t.\tT\tA\t30\tPASS\t.\tGT:PS\t0|1:300
";
        let vcf_file2 = write_test_vcf(chr2_only);
        let entries2 = load_phased_variants(vcf_file2.path()).unwrap();

        assert_eq!(get_shared_contigs(&entries1, &entries2), vec!["chr2".to_string()]);
    }
}
