use std::path::Path;

/// Name of the per-directory ignore file read from the sync root.
pub const IGNORE_FILE_NAME: &str = ".eesignore";

/// Patterns that are always active and cannot be disabled.
const DEFAULT_PATTERNS: &[&str] = &[
    // Version control
    ".git/",
    ".svn/",
    ".hg/",
    // Dependency directories
    "node_modules/",
    "vendor/",
    "target/",
    "__pycache__/",
    ".venv/",
    "venv/",
    // Build output
    "build/",
    "dist/",
    "out/",
    // OS metadata
    ".DS_Store",
    "Thumbs.db",
    "desktop.ini",
    // Secrets, logs, scratch files
    ".env",
    "*.pem",
    "*.key",
    "*.log",
    "*.tmp",
    // The ignore file itself is never synced
    IGNORE_FILE_NAME,
];

/// Matcher over a gitignore-style pattern subset.
///
/// Supported syntax: `*` globs within a path segment, a trailing `/` marks a
/// directory-only pattern (which also covers everything beneath the matched
/// directory), patterns without `/` match the basename at any depth, and
/// lines starting with `#` or blank lines are skipped. Negation (`!`) is
/// deliberately not supported; the first matching pattern wins.
#[derive(Debug)]
pub struct IgnoreMatcher {
    patterns: Vec<CompiledPattern>,
}

#[derive(Debug)]
struct CompiledPattern {
    segments: Vec<String>,
    dir_only: bool,
    anchored: bool,
}

impl CompiledPattern {
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        let dir_only = line.ends_with('/');
        let core = line.trim_end_matches('/');
        let core = core.strip_prefix('/').unwrap_or(core);
        if core.is_empty() {
            return None;
        }

        let segments: Vec<String> = core.split('/').map(str::to_string).collect();
        let anchored = segments.len() > 1;
        Some(Self { segments, dir_only, anchored })
    }

    fn matches(&self, parts: &[&str], is_dir: bool) -> bool {
        if self.anchored {
            if parts.len() < self.segments.len() {
                return false;
            }
            let prefix_matches = self
                .segments
                .iter()
                .zip(parts.iter())
                .all(|(pat, part)| glob_match(pat, part));
            if !prefix_matches {
                return false;
            }
            if parts.len() == self.segments.len() {
                // The path IS the matched entry
                return !self.dir_only || is_dir;
            }
            // The path lies beneath the matched prefix; only directory
            // patterns swallow their contents.
            self.dir_only
        } else {
            let pattern = &self.segments[0];
            if self.dir_only {
                // A directory anywhere on the path, or the path itself if it
                // is a directory.
                let last = parts.len() - 1;
                parts.iter().enumerate().any(|(i, part)| {
                    glob_match(pattern, part) && (i < last || is_dir)
                })
            } else {
                parts
                    .last()
                    .map(|basename| glob_match(pattern, basename))
                    .unwrap_or(false)
            }
        }
    }
}

impl IgnoreMatcher {
    /// Build a matcher from the built-in defaults, the base directory's
    /// ignore file (if readable), and caller-supplied extra patterns.
    ///
    /// A missing or unreadable ignore file is never fatal: it is logged and
    /// treated as "no custom patterns".
    pub fn new(base_dir: &Path, additional_patterns: &[String]) -> Self {
        let mut patterns: Vec<CompiledPattern> = DEFAULT_PATTERNS
            .iter()
            .filter_map(|p| CompiledPattern::parse(p))
            .collect();

        let ignore_file = base_dir.join(IGNORE_FILE_NAME);
        if ignore_file.exists() {
            match std::fs::read_to_string(&ignore_file) {
                Ok(contents) => {
                    patterns.extend(contents.lines().filter_map(CompiledPattern::parse));
                }
                Err(e) => {
                    log::warn!(
                        "Failed to read {}: {}. Continuing with no custom patterns.",
                        ignore_file.display(),
                        e
                    );
                }
            }
        }

        patterns.extend(
            additional_patterns
                .iter()
                .filter_map(|p| CompiledPattern::parse(p)),
        );

        Self { patterns }
    }

    /// Matcher with only the built-in defaults and extra patterns, no
    /// ignore-file lookup. Used when there is no base directory to consult.
    pub fn with_patterns(additional_patterns: &[String]) -> Self {
        let mut patterns: Vec<CompiledPattern> = DEFAULT_PATTERNS
            .iter()
            .filter_map(|p| CompiledPattern::parse(p))
            .collect();
        patterns.extend(
            additional_patterns
                .iter()
                .filter_map(|p| CompiledPattern::parse(p)),
        );
        Self { patterns }
    }

    /// Check whether a path relative to the base directory is ignored.
    pub fn matches(&self, relative_path: &str, is_dir: bool) -> bool {
        let normalized = relative_path.replace('\\', "/");
        let parts: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();
        if parts.is_empty() {
            return false;
        }
        self.patterns.iter().any(|p| p.matches(&parts, is_dir))
    }
}

/// Glob match supporting `*` (any run of characters within one segment).
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut mark = 0usize;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            mark = ti;
            pi += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            mark += 1;
            ti = mark;
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}
