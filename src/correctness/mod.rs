
/// The decay-weighted local phasing correctness metric and its switch-correctness limit
pub mod metric;
