//! Storage — the local trust view model and its snapshot file.
//!
//! - `snapshot_file`: versioned JSON encoding of a complete trust view
//! - `local_model`: in-process [`Model`](crate::view::Model) with optimistic
//!   commits, optionally backed by a snapshot file

pub mod local_model;
pub mod snapshot_file;

pub use local_model::LocalModel;
pub use snapshot_file::{load_snapshot, save_snapshot, CertificateRecord};
