
/*!
# CLI module
Command line interface functionality that is specific to Springhare.
*/

/// The main CLI module that contains the top-level CLI parser and help text
pub mod core;
/// The correctness CLI subcommand
pub mod correctness;
