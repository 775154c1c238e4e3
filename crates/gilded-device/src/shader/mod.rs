//! Shader permutation table.
//!
//! The UI library picks one of a closed set of shader permutations per batch.
//! Each permutation fixes the vertex attributes it consumes; this module maps
//! a [`ShaderId`] to that vertex layout and to the keys of its shader sources.

mod layout;
mod table;

pub use layout::{Attribute, AttributeFormat, VertexAttribute, VertexFormat, VertexLayout};
pub use table::{BlurTaps, Effect, Paint, ShaderId};
