use audit_code_chunker::{relative_path, SUPPORTED_EXTENSIONS};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::path::{Component, Path, PathBuf};

pub const IGNORE_FILE_NAME: &str = ".aiauditignore";
const MAX_FILE_SIZE_BYTES: u64 = 1_048_576; // 1 MB

const EXCLUDED_DIRS: &[&str] = &[
    "__pycache__",
    ".venv",
    "venv",
    ".git",
    "node_modules",
    "dist",
    "build",
    ".next",
];

/// Patterns from a project's `.aiauditignore`.
///
/// One glob per line, `#` starts a comment. A trailing `/` is dropped and
/// everything below the matched path is ignored. A pattern with no `/`
/// also matches any single path component, so `fixtures` ignores every
/// `fixtures` directory.
#[derive(Debug, Clone)]
pub struct AuditIgnore {
    paths: GlobSet,
    components: GlobSet,
    patterns: usize,
}

impl AuditIgnore {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            paths: GlobSet::empty(),
            components: GlobSet::empty(),
            patterns: 0,
        }
    }

    /// Load `<root>/.aiauditignore`, empty when absent or unreadable
    #[must_use]
    pub fn load(root: &Path) -> Self {
        let path = root.join(IGNORE_FILE_NAME);
        match std::fs::read_to_string(&path) {
            Ok(text) => Self::parse(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::empty(),
            Err(e) => {
                log::warn!("Failed to read {}: {e}", path.display());
                Self::empty()
            }
        }
    }

    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut paths = GlobSetBuilder::new();
        let mut components = GlobSetBuilder::new();
        let mut patterns = 0;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let pattern = line.trim_end_matches('/').trim_start_matches("./");
            if pattern.is_empty() {
                continue;
            }

            let (Ok(exact), Ok(below)) = (Glob::new(pattern), Glob::new(&format!("{pattern}/**")))
            else {
                log::warn!("Ignoring invalid {IGNORE_FILE_NAME} pattern {pattern:?}");
                continue;
            };
            paths.add(exact.clone());
            paths.add(below);
            if !pattern.contains('/') {
                components.add(exact);
            }
            patterns += 1;
        }

        let build = |builder: GlobSetBuilder| {
            builder.build().unwrap_or_else(|e| {
                log::warn!("Failed to compile {IGNORE_FILE_NAME}: {e}");
                GlobSet::empty()
            })
        };
        Self {
            paths: build(paths),
            components: build(components),
            patterns,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns == 0
    }

    /// Whether a `/`-separated root-relative path is ignored
    #[must_use]
    pub fn is_ignored(&self, rel_path: &str) -> bool {
        if self.is_empty() {
            return false;
        }
        self.paths.is_match(rel_path)
            || rel_path
                .split('/')
                .any(|component| self.components.is_match(component))
    }
}

/// Finds auditable source files below a root directory
pub struct FileScanner {
    root: PathBuf,
    ignore: AuditIgnore,
}

impl FileScanner {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let ignore = AuditIgnore::load(&root);
        Self { root, ignore }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Sorted list of supported source files (.gitignore aware)
    pub fn scan(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();

        let root = self.root.clone();
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .require_git(false);
        builder.filter_entry(move |entry| !Self::is_excluded_scope(entry.path(), &root));

        for result in builder.build() {
            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Failed to read entry: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }

            let path = entry.path();
            if !Self::is_source_file(path) {
                continue;
            }
            if let Ok(meta) = entry.metadata() {
                if meta.len() > MAX_FILE_SIZE_BYTES {
                    log::debug!(
                        "Skipping large file {} ({} bytes > {})",
                        path.display(),
                        meta.len(),
                        MAX_FILE_SIZE_BYTES
                    );
                    continue;
                }
            }
            let rel = relative_path(path, &self.root);
            if self.ignore.is_ignored(&rel) {
                log::debug!("Skipping {rel} ({IGNORE_FILE_NAME})");
                continue;
            }

            files.push(path.to_path_buf());
        }

        files.sort();
        log::info!("Found {} source files in {}", files.len(), self.root.display());
        files
    }

    fn is_source_file(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
    }

    fn is_excluded_scope(path: &Path, root: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(root) else {
            return false;
        };
        relative.components().any(|component| match component {
            Component::Normal(name) => EXCLUDED_DIRS.iter().any(|dir| name == *dir),
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn touch(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    fn scanned(root: &Path) -> Vec<String> {
        FileScanner::new(root)
            .scan()
            .iter()
            .map(|p| relative_path(p, root))
            .collect()
    }

    #[test]
    fn keeps_supported_sources_only() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "app/main.py", "def main(): pass\n");
        touch(dir.path(), "web/index.tsx", "export const A = () => null;\n");
        touch(dir.path(), "lib.rs", "fn f() {}\n");
        touch(dir.path(), "README.md", "# readme\n");
        touch(dir.path(), "node_modules/pkg/index.js", "module.exports = 1;\n");
        touch(dir.path(), "venv/lib/site.py", "x = 1\n");
        touch(dir.path(), "app/__pycache__/main.py", "x = 1\n");

        assert_eq!(scanned(dir.path()), vec!["app/main.py", "lib.rs", "web/index.tsx"]);
    }

    #[test]
    fn skips_files_over_one_megabyte() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "small.py", "x = 1\n");
        touch(dir.path(), "huge.py", &"x = 1\n".repeat(200_000));
        assert_eq!(scanned(dir.path()), vec!["small.py"]);
    }

    #[test]
    fn honours_aiauditignore() {
        let dir = tempdir().unwrap();
        touch(
            dir.path(),
            IGNORE_FILE_NAME,
            "# generated code\ngenerated/\n*_pb2.py\nsrc/legacy/*.js\nfixtures\n",
        );
        touch(dir.path(), "src/app.py", "x = 1\n");
        touch(dir.path(), "src/api_pb2.py", "x = 1\n");
        touch(dir.path(), "generated/models.py", "x = 1\n");
        touch(dir.path(), "src/legacy/old.js", "var a = 1;\n");
        touch(dir.path(), "src/legacy/keep.ts", "let a = 1;\n");
        touch(dir.path(), "tests/fixtures/sample.py", "x = 1\n");

        assert_eq!(scanned(dir.path()), vec!["src/app.py", "src/legacy/keep.ts"]);
    }

    #[test]
    fn ignore_rules() {
        let rules = AuditIgnore::parse("# c\n\nbuild_tmp/\n**/*.spec.ts\n");
        assert!(!rules.is_empty());
        assert!(rules.is_ignored("build_tmp/a.py"));
        assert!(rules.is_ignored("pkg/build_tmp/a.py"));
        assert!(rules.is_ignored("web/a.spec.ts"));
        assert!(!rules.is_ignored("web/a.ts"));
        assert!(AuditIgnore::parse("# only comments\n").is_empty());
    }
}
