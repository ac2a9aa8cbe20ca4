
/// Helper functions for writing JSON via serde
pub mod json_io;
/// Log-space arithmetic helpers shared by all probability code
pub mod log_math;
