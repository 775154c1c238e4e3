//! The native boundary.
//!
//! The UI library hands over batches as fixed-layout [`RawBatch`] records and
//! calls back through a [`RenderCallbacks`] table. Records are decoded into
//! [`Batch`](crate::Batch) here and nowhere else.

mod callbacks;
mod raw;

pub use callbacks::{
    CreateTextureFn, DrawBatchFn, MapFn, RenderCallbacks, TextureFlagFn, TextureSizeFn, UnmapFn,
    UpdateTextureFn,
};
pub use raw::{RawBatch, RawTexture};
