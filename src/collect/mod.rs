pub mod ignore;
pub mod walker;

pub use ignore::{IgnoreMatcher, IGNORE_FILE_NAME};
pub use walker::{collect_files, CollectedFile};

/// Options for one collection pass
#[derive(Debug, Clone, Default)]
pub struct CollectOptions {
    /// Patterns applied on top of the defaults and the root's ignore file
    pub additional_ignore_patterns: Vec<String>,
    /// Maximum walk depth from the root (root = 0)
    pub max_depth: Option<usize>,
}
