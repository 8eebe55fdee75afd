//! Shared primitives used across every `forge` crate: the error taxonomy from
//! the verification/apply/provider design, a cancellation token with an
//! attached deadline, and small id helpers.

pub mod cancel;
pub mod error;
pub mod ids;

pub use cancel::Cancellation;
pub use error::{ApplyErrorKind, ForgeError};
pub use ids::new_id;
