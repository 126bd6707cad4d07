pub mod flags;

pub use flags::{Flag, FlagSet};
