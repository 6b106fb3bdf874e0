use std::path::{Path, PathBuf};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::{Match, WalkBuilder};

/// Paths under any of these prefixes never enter a batch
#[derive(Debug, Clone, Default)]
pub struct ExclusionPolicy {
    prefixes: Vec<PathBuf>,
}

impl ExclusionPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the policy for a watch root. A relative prefix is resolved
    /// against `root`, an empty one excludes nothing.
    pub fn for_root<P: AsRef<Path>>(root: P, excluded_prefix: &str) -> Self {
        let mut policy = Self::new();
        if !excluded_prefix.is_empty() {
            let prefix = Path::new(excluded_prefix);
            if prefix.is_absolute() {
                policy.prefixes.push(prefix.to_path_buf());
            } else {
                policy.prefixes.push(root.as_ref().join(prefix));
            }
        }
        policy
    }

    pub fn with_prefix<P: Into<PathBuf>>(mut self, prefix: P) -> Self {
        self.prefixes.push(prefix.into());
        self
    }

    /// Matches whole components, so `.idea` does not cover `.ideas`
    pub fn is_excluded<P: AsRef<Path>>(&self, path: P) -> bool {
        let path = path.as_ref();
        self.prefixes.iter().any(|prefix| path.starts_with(prefix))
    }

    pub fn prefixes(&self) -> &[PathBuf] {
        &self.prefixes
    }
}

/// Decides which files the filesystem host looks at.
///
/// `.gitignore` and `.ignore` files under the root are read once, when the
/// filter is built; later edits to them take effect on the next start.
pub struct FileFilter {
    root_path: PathBuf,
    /// One matcher per directory holding ignore files, deepest first
    matchers: Vec<Gitignore>,
}

impl FileFilter {
    pub fn new<P: AsRef<Path>>(root_path: P) -> Self {
        let root_path = root_path.as_ref().to_path_buf();
        let matchers = Self::load_matchers(&root_path);
        Self {
            root_path,
            matchers,
        }
    }

    fn walker(root_path: &Path) -> WalkBuilder {
        let mut builder = WalkBuilder::new(root_path);
        builder
            .hidden(false)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .ignore(true)
            .parents(true)
            .require_git(false);
        builder
    }

    fn load_matchers(root_path: &Path) -> Vec<Gitignore> {
        let mut dirs: Vec<PathBuf> = Vec::new();
        for entry in Self::walker(root_path).build().flatten() {
            let is_ignore_file = matches!(
                entry.file_name().to_str(),
                Some(".gitignore") | Some(".ignore")
            );
            if is_ignore_file && !entry.path().is_dir() {
                if let Some(dir) = entry.path().parent() {
                    if !dirs.iter().any(|known| known == dir) {
                        dirs.push(dir.to_path_buf());
                    }
                }
            }
        }
        dirs.sort_by_key(|dir| std::cmp::Reverse(dir.components().count()));

        let mut matchers = Vec::with_capacity(dirs.len());
        for dir in dirs {
            let mut builder = GitignoreBuilder::new(&dir);
            // later files win, and .ignore outranks .gitignore
            for name in [".gitignore", ".ignore"] {
                let file = dir.join(name);
                if file.is_file() {
                    if let Some(err) = builder.add(&file) {
                        tracing::warn!("Error reading {}: {}", file.display(), err);
                    }
                }
            }
            match builder.build() {
                Ok(matcher) => matchers.push(matcher),
                Err(err) => tracing::warn!("Error building ignore rules for {}: {}", dir.display(), err),
            }
        }
        matchers
    }

    pub fn should_watch<P: AsRef<Path>>(&self, path: P) -> bool {
        let path = path.as_ref();

        // Always ignore .git directory itself
        if path.components().any(|comp| comp.as_os_str() == ".git") {
            return false;
        }

        let is_dir = path.is_dir();
        for matcher in &self.matchers {
            if !path.starts_with(matcher.path()) {
                continue;
            }
            match matcher.matched_path_or_any_parents(path, is_dir) {
                Match::Ignore(_) => return false,
                Match::Whitelist(_) => return true,
                Match::None => {}
            }
        }
        true
    }

    /// Every file under the root that is not ignored by .gitignore rules
    pub fn get_watchable_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();

        for result in Self::walker(&self.root_path).build() {
            match result {
                Ok(entry) => {
                    let path = entry.path();
                    if path.is_file() && self.should_watch(path) {
                        files.push(path.to_path_buf());
                    }
                }
                Err(err) => {
                    tracing::warn!("Error walking directory: {}", err);
                }
            }
        }

        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_exclusion_relative_to_root() {
        let policy = ExclusionPolicy::for_root("/work/project", ".idea");

        assert!(policy.is_excluded("/work/project/.idea/workspace.xml"));
        assert!(policy.is_excluded("/work/project/.idea"));
        assert!(!policy.is_excluded("/work/project/.ideas/notes.md"));
        assert!(!policy.is_excluded("/work/project/src/main.rs"));
    }

    #[test]
    fn test_exclusion_absolute_and_empty() {
        let policy = ExclusionPolicy::for_root("/work/project", "/tmp/scratch");
        assert!(policy.is_excluded("/tmp/scratch/a.txt"));
        assert!(!policy.is_excluded("/work/project/a.txt"));

        let policy = ExclusionPolicy::for_root("/work/project", "");
        assert!(policy.prefixes().is_empty());
        assert!(!policy.is_excluded("/work/project/.idea/a.xml"));
    }

    #[test]
    fn test_filter_skips_git_directory() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir(temp_dir.path().join(".git")).unwrap();
        std::fs::write(temp_dir.path().join(".git").join("HEAD"), "ref").unwrap();
        std::fs::write(temp_dir.path().join("main.rs"), "fn main() {}").unwrap();

        let filter = FileFilter::new(temp_dir.path());
        let files = filter.get_watchable_files();

        assert_eq!(files, vec![temp_dir.path().join("main.rs")]);
        assert!(!filter.should_watch(temp_dir.path().join(".git").join("HEAD")));
    }

    #[test]
    fn test_filter_applies_ignore_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::write(root.join(".ignore"), "target/\n").unwrap();
        std::fs::write(root.join(".gitignore"), "*.log\n").unwrap();
        std::fs::create_dir_all(root.join("target")).unwrap();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::write(root.join("target").join("out.d"), "deps").unwrap();
        std::fs::write(root.join("build.log"), "log").unwrap();
        std::fs::write(root.join("src").join("main.rs"), "fn main() {}").unwrap();
        std::fs::write(root.join("src").join(".gitignore"), "!keep.log\n").unwrap();
        std::fs::write(root.join("src").join("keep.log"), "kept").unwrap();

        let filter = FileFilter::new(root);

        assert!(!filter.should_watch(root.join("target").join("out.d")));
        assert!(!filter.should_watch(root.join("target").join("new").join("later.d")));
        assert!(!filter.should_watch(root.join("build.log")));
        assert!(filter.should_watch(root.join("src").join("main.rs")));
        assert!(filter.should_watch(root.join("src").join("keep.log")));

        let files = filter.get_watchable_files();
        assert!(files.contains(&root.join("src").join("main.rs")));
        assert!(!files.contains(&root.join("target").join("out.d")));
        assert!(!files.contains(&root.join("build.log")));
    }
}
