//! Lock-free hand-off of pose snapshots from the simulation thread to a
//! renderer.

pub mod triple_buffer;

pub use triple_buffer::{buffer, Editor, Reader};
