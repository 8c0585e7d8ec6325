//! Chunker module for planning work units.
//!
//! A [`Chunker`] turns a source into the ordered, dense sequence of
//! [`WorkUnit`](crate::unit::WorkUnit)s a run processes. Producing the
//! actual media slices is up to the implementation; [`WindowChunker`]
//! only plans time windows and leaves cutting to the unit processor.

mod traits;
mod window;

pub use traits::{Chunker, ChunkerError};
pub use window::WindowChunker;
