//! Pipeline stages, in the order a run executes them.
//!
//! | Stage | Module | Collaborator |
//! |-------|--------|--------------|
//! | Fetch | [`fetch`] | fetch script, once per request |
//! | Summarize | [`summarize`] | summarize script or [`crate::inshorts`] |
//! | Upload | [`upload`] | upload script or [`crate::supabase`] |
//! | Persist | [`persist`] | `git` |
//!
//! Every stage returns a [`crate::report::StageReport`] instead of an error;
//! whether a failure stops the run is decided in [`crate::pipeline`].

pub mod fetch;
pub mod persist;
pub mod summarize;
pub mod upload;
