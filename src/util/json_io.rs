
use anyhow::Context;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Saves one of our JSON payloads (the parsed CLI settings, or a phasing support
/// report) to disk, pretty-printed. A `.gz` extension switches on gzip compression,
/// matching how the larger support reports are usually stored.
/// # Arguments
/// * `payload` - the settings or report to serialize
/// * `out_filename` - user provided path to write to
/// # Errors
/// * if the file cannot be created or written
/// * if JSON serialization fails
pub fn save_json<T: serde::Serialize>(payload: &T, out_filename: &Path) -> anyhow::Result<()> {
    let payload_label = std::any::type_name::<T>();
    let out_file = File::create(out_filename)
        .with_context(|| format!("Error while creating {out_filename:?} for {payload_label}:"))?;

    let gzip_requested = out_filename.extension().is_some_and(|ext| ext == "gz");
    let sink: Box<dyn Write> = if gzip_requested {
        Box::new(flate2::write::GzEncoder::new(out_file, flate2::Compression::best()))
    } else {
        Box::new(out_file)
    };

    let mut buffered_sink = BufWriter::new(sink);
    serde_json::to_writer_pretty(&mut buffered_sink, payload)
        .with_context(|| format!("Error while serializing {payload_label} to {out_filename:?}:"))?;
    buffered_sink.flush()
        .with_context(|| format!("Error while flushing {payload_label} output to {out_filename:?}:"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct MockReport {
        contig: String,
        correctness: f64,
    }

    #[test]
    fn test_save_json_plain() {
        let report = MockReport {
            contig: "chr1".to_string(),
            correctness: 0.5
        };
        let out_file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        save_json(&report, out_file.path()).unwrap();

        let written = std::fs::read_to_string(out_file.path()).unwrap();
        assert!(written.contains("\"contig\": \"chr1\""));
        assert!(written.contains("correctness"));
    }

    #[test]
    fn test_save_json_gzipped() {
        use std::io::Read;

        let report = MockReport {
            contig: "chr2".to_string(),
            correctness: 1.0
        };
        let out_file = tempfile::Builder::new().suffix(".json.gz").tempfile().unwrap();
        save_json(&report, out_file.path()).unwrap();

        // gzip magic bytes, then the payload decompresses back to JSON
        let raw = std::fs::read(out_file.path()).unwrap();
        assert_eq!(&raw[..2], &[0x1f, 0x8b]);
        let mut decoded = String::new();
        flate2::read::GzDecoder::new(&raw[..]).read_to_string(&mut decoded).unwrap();
        assert!(decoded.contains("\"contig\": \"chr2\""));
    }
}
