//! Token Estimator + Context Builder: turns a path selection into a
//! token-bounded [`ContextPack`] in one of several wire formats, or a
//! [`StreamHandle`] of lazily-read chunks when the selection is oversize.

mod build;
mod format;
mod strip;
mod tokens;

pub use build::{build, BuildOptions, BuildOutcome, Chunk, ContextError, ContextPack, SplitStrategy, StreamHandle};
pub use format::{render, render_with_manifest, Format, Manifest, PackedFile};
pub use strip::strip_comments;
pub use tokens::{estimate, TokenProfile, TokenProfileRegistry};
