//! Writing generated files.
//!
//! - [`json`]: pretty JSON for `inshorts_<category>.json` and the run report
//!
//! Files are written next to their final path and renamed into place, so a
//! crash mid-write never leaves a truncated summary file for the upload
//! stage or the data commit to pick up.

pub mod json;
