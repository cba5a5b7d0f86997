//! Model-free text processing: readability scoring, rule-based simplification and
//! echo removal for model output.

pub mod echo;
pub mod reading_level;
pub mod rules;

pub use echo::EchoFilter;
pub use reading_level::{estimate, Complexity, ReadingComparison, ReadingLevel, TextStats};
