
use serde::Serialize;
use std::fs::File;
use std::path::Path;

/// Contains all the data written to each row of the correctness table
#[derive(Clone, Debug, Serialize)]
pub struct CorrectnessRow {
    /// The contig both VCFs share
    pub contig: String,
    /// Number of matched heterozygous variant pairs on the contig
    pub num_pairs: usize,
    /// The decay the metric was evaluated at
    pub decay: f64,
    /// The decay-weighted local phasing correctness; NaN when undefined
    pub correctness: f64,
}

/// Accumulates per-(contig, decay) correctness rows and writes the summary table
#[derive(Default)]
pub struct CorrectnessSummaryWriter {
    /// All rows added so far
    rows: Vec<CorrectnessRow>,
}

impl CorrectnessSummaryWriter {
    /// Adds one evaluated row
    pub fn add_row(&mut self, row: CorrectnessRow) {
        self.rows.push(row);
    }

    /// Number of rows accumulated
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Will write the summary out to the given file path, sorted by contig then decay.
    /// # Arguments
    /// * `filename` - the filename for the output (tsv/csv)
    pub fn write_summary(&mut self, filename: &Path) -> anyhow::Result<()> {
        // modify the delimiter to "," if it ends with .csv
        let is_csv: bool = filename.extension().unwrap_or_default() == "csv";
        let delimiter: u8 = if is_csv { b',' } else { b'\t' };
        let mut csv_writer: csv::Writer<File> = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_path(filename)?;

        self.rows.sort_by(|a, b| {
            a.contig.cmp(&b.contig)
                .then_with(|| a.decay.total_cmp(&b.decay))
        });
        for row in self.rows.iter() {
            csv_writer.serialize(row)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    // getters
    pub fn rows(&self) -> &[CorrectnessRow] {
        &self.rows
    }
}
