//! Code search helpers shared by the provider clients.

pub mod fallback;
pub mod snippet;

pub use fallback::{RecursiveSearch, SearchOptions};
pub use snippet::{extract_snippet, native_hit_snippet};
