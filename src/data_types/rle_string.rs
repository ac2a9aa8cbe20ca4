
/// Maximum representable run length; longer runs are clamped on construction
pub const MAX_RUN_LENGTH: u8 = u8::MAX;

#[derive(thiserror::Error, Debug)]
pub enum RleStringError {
    #[error("compressed sequence and run counts must be equal length")]
    LengthMismatch,
    #[error("run count at index {index} is zero")]
    ZeroRunCount { index: usize },
}

/// A run-length encoded sequence: the compressed characters plus a parallel array of run lengths.
/// Adjacent runs always have distinct characters when built through `new`; `new_no_rle` produces
/// the degenerate form where every run length is 1 and equality collapses to plain string equality.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct RleString {
    /// The compressed character sequence
    compressed: Vec<u8>,
    /// Run length for each compressed character, each in [1, 255]
    counts: Vec<u8>,
}

impl RleString {
    /// Run-length compresses an expanded sequence. Runs longer than 255 are clamped by
    /// splitting into multiple maximal runs.
    /// # Arguments
    /// * `expanded` - the plain (non-RLE) sequence
    pub fn new(expanded: &[u8]) -> Self {
        let mut compressed: Vec<u8> = vec![];
        let mut counts: Vec<u8> = vec![];
        for &c in expanded.iter() {
            match (compressed.last(), counts.last_mut()) {
                (Some(&p), Some(count)) if p == c && *count < MAX_RUN_LENGTH => {
                    *count += 1;
                },
                _ => {
                    compressed.push(c);
                    counts.push(1);
                }
            }
        }
        Self { compressed, counts }
    }

    /// Builds the non-RLE rendition where each expanded character is its own run of length 1.
    /// # Arguments
    /// * `expanded` - the plain (non-RLE) sequence
    pub fn new_no_rle(expanded: &[u8]) -> Self {
        Self {
            compressed: expanded.to_vec(),
            counts: vec![1; expanded.len()]
        }
    }

    /// Dispatches to `new` or `new_no_rle` based on the run-length encoding flag.
    /// # Arguments
    /// * `expanded` - the plain (non-RLE) sequence
    /// * `use_run_length_encoding` - if false, all run counts are 1
    pub fn from_expanded(expanded: &[u8], use_run_length_encoding: bool) -> Self {
        if use_run_length_encoding {
            Self::new(expanded)
        } else {
            Self::new_no_rle(expanded)
        }
    }

    /// Construction from pre-computed components.
    /// # Arguments
    /// * `compressed` - the compressed character sequence
    /// * `counts` - per-character run lengths
    /// # Errors
    /// * if the arrays have different lengths
    /// * if any run count is zero
    pub fn from_parts(compressed: Vec<u8>, counts: Vec<u8>) -> Result<Self, RleStringError> {
        if compressed.len() != counts.len() {
            return Err(RleStringError::LengthMismatch);
        }
        if let Some(index) = counts.iter().position(|&c| c == 0) {
            return Err(RleStringError::ZeroRunCount { index });
        }
        Ok(Self { compressed, counts })
    }

    /// Expands back into the plain sequence.
    pub fn expand(&self) -> Vec<u8> {
        let mut expanded = Vec::with_capacity(self.expanded_len());
        for (&c, &count) in self.compressed.iter().zip(self.counts.iter()) {
            expanded.extend(std::iter::repeat(c).take(count as usize));
        }
        expanded
    }

    /// Copies a substring in compressed coordinates.
    /// # Arguments
    /// * `start` - first compressed position of the substring
    /// * `length` - number of compressed positions to copy
    pub fn substring(&self, start: usize, length: usize) -> Self {
        Self {
            compressed: self.compressed[start..start+length].to_vec(),
            counts: self.counts[start..start+length].to_vec()
        }
    }

    /// Concatenation by joining the expansions and re-encoding, so runs meeting at the
    /// boundary merge when run-length encoding is enabled.
    /// # Arguments
    /// * `other` - the sequence to append
    /// * `use_run_length_encoding` - if false, the result has all run counts of 1
    pub fn concat(&self, other: &RleString, use_run_length_encoding: bool) -> Self {
        let mut expanded = self.expand();
        expanded.extend(other.expand());
        Self::from_expanded(&expanded, use_run_length_encoding)
    }

    /// Equality on the compressed characters only, ignoring run lengths.
    /// The derived `PartialEq` is the stricter RLE-expanded equality.
    /// # Arguments
    /// * `other` - the sequence to compare against
    pub fn eq_compressed(&self, other: &RleString) -> bool {
        self.compressed == other.compressed
    }

    /// Number of compressed positions (runs)
    pub fn len(&self) -> usize {
        self.compressed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compressed.is_empty()
    }

    /// Length of the expanded sequence
    pub fn expanded_len(&self) -> usize {
        self.counts.iter().map(|&c| c as usize).sum()
    }

    // getters
    pub fn compressed(&self) -> &[u8] {
        &self.compressed
    }

    pub fn counts(&self) -> &[u8] {
        &self.counts
    }
}
