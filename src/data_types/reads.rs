
use crate::data_types::rle_string::RleString;

/// Quality sentinel for read substrings without base qualities; these are never filtered
pub const NO_QUALITY: f64 = -1.0;

/// A single long read as it participates in phasing. Coordinates on the read are in
/// run-length (compressed) space, matching `rle_read`.
#[derive(Clone, Debug)]
pub struct SequencingRead {
    /// Stable integer identifier, also the index of this read in the read list
    read_id: usize,
    /// Read name from the source alignment
    read_name: String,
    /// True if the read aligned to the forward strand
    forward_strand: bool,
    /// The read sequence in run-length encoded form
    rle_read: RleString,
    /// Optional per-position phred qualities, parallel to the compressed sequence
    qualities: Option<Vec<u8>>,
}

impl SequencingRead {
    /// General constructor; qualities (when present) must be parallel to the compressed read.
    pub fn new(read_id: usize, read_name: String, forward_strand: bool, rle_read: RleString, qualities: Option<Vec<u8>>) -> Self {
        if let Some(quals) = qualities.as_ref() {
            assert_eq!(quals.len(), rle_read.len(), "qualities must be parallel to the compressed read");
        }
        Self {
            read_id, read_name, forward_strand, rle_read, qualities
        }
    }

    /// Cuts a substring record out of this read, computing the mean base quality for the span.
    /// Reads without qualities get the `NO_QUALITY` sentinel.
    /// # Arguments
    /// * `start` - first compressed position of the substring
    /// * `length` - number of compressed positions
    pub fn substring(&self, start: usize, length: usize) -> ReadSubstring {
        let qual_value = match self.qualities.as_ref() {
            Some(quals) if length > 0 => {
                let total: u64 = quals[start..start+length].iter().map(|&q| q as u64).sum();
                total as f64 / length as f64
            },
            _ => NO_QUALITY
        };

        ReadSubstring {
            read_id: self.read_id,
            source: SubstringSource::Span { start, length },
            qual_value
        }
    }

    // getters
    pub fn read_id(&self) -> usize {
        self.read_id
    }

    pub fn read_name(&self) -> &str {
        &self.read_name
    }

    pub fn forward_strand(&self) -> bool {
        self.forward_strand
    }

    pub fn rle_read(&self) -> &RleString {
        &self.rle_read
    }

    pub fn qualities(&self) -> Option<&[u8]> {
        self.qualities.as_deref()
    }
}

/// Where a read substring's sequence comes from
#[derive(Clone, Debug)]
pub enum SubstringSource {
    /// A span of the read itself, in compressed coordinates
    Span {
        start: usize,
        length: usize
    },
    /// An explicit sequence, used when substrings are delivered alongside pre-called sites
    Explicit(RleString),
}

/// A read substring participating in one bubble, with its average base quality.
#[derive(Clone, Debug)]
pub struct ReadSubstring {
    /// The owning read's stable identifier
    read_id: usize,
    /// Span into the read, or an explicit sequence
    source: SubstringSource,
    /// Mean phred quality across the span, or `NO_QUALITY`
    qual_value: f64,
}

impl ReadSubstring {
    /// Builds a substring record around an explicit sequence with pre-computed qualities.
    /// # Arguments
    /// * `read_id` - the owning read
    /// * `substring` - the explicit sequence
    /// * `qualities` - optional per-expanded-position phred qualities
    pub fn new_explicit(read_id: usize, substring: RleString, qualities: Option<&[u8]>) -> Self {
        let qual_value = match qualities {
            Some(quals) if !quals.is_empty() => {
                let total: u64 = quals.iter().map(|&q| q as u64).sum();
                total as f64 / quals.len() as f64
            },
            _ => NO_QUALITY
        };

        Self {
            read_id,
            source: SubstringSource::Explicit(substring),
            qual_value
        }
    }

    /// Materializes the substring sequence, copying out of the read for span sources.
    /// # Arguments
    /// * `read` - the owning read; must match `read_id`
    pub fn rle_string(&self, read: &SequencingRead) -> RleString {
        assert_eq!(read.read_id(), self.read_id);
        match &self.source {
            SubstringSource::Span { start, length } => read.rle_read().substring(*start, *length),
            SubstringSource::Explicit(substring) => substring.clone()
        }
    }

    // getters
    pub fn read_id(&self) -> usize {
        self.read_id
    }

    pub fn source(&self) -> &SubstringSource {
        &self.source
    }

    pub fn qual_value(&self) -> f64 {
        self.qual_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_substring_quality() {
        let read = SequencingRead::new(
            0, "read1".to_string(), true,
            RleString::new(b"ACGTACGT"),
            Some(vec![10, 20, 30, 40, 10, 20, 30, 40])
        );

        let substring = read.substring(2, 4);
        assert_approx_eq!(substring.qual_value(), (30+40+10+20) as f64 / 4.0);
        assert_eq!(substring.rle_string(&read).expand(), b"GTAC");
    }

    #[test]
    fn test_missing_qualities() {
        let read = SequencingRead::new(
            1, "read2".to_string(), false,
            RleString::new(b"ACGT"),
            None
        );

        let substring = read.substring(0, 4);
        assert_eq!(substring.qual_value(), NO_QUALITY);
    }

    #[test]
    fn test_explicit_substring() {
        let read = SequencingRead::new(
            2, "read3".to_string(), true,
            RleString::new(b"ACGT"),
            None
        );

        let substring = ReadSubstring::new_explicit(2, RleString::new(b"GGG"), Some(&[20, 20, 20]));
        assert_approx_eq!(substring.qual_value(), 20.0);
        assert_eq!(substring.rle_string(&read).expand(), b"GGG");
    }
}
