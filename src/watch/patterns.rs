// src/watch/patterns.rs

use std::fmt;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::config::WatchSection;

/// Compiled `[watch]` include/exclude globs.
///
/// Patterns are relative to the working directory; the watcher passes
/// relative, forward-slash paths (e.g. `"src/main.rs"`) into [`matches`].
///
/// [`matches`]: WatchPatterns::matches
#[derive(Clone)]
pub struct WatchPatterns {
    include: GlobSet,
    exclude: Option<GlobSet>,
    include_count: usize,
    exclude_count: usize,
}

impl fmt::Debug for WatchPatterns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchPatterns")
            .field("include", &self.include_count)
            .field("exclude", &self.exclude_count)
            .finish_non_exhaustive()
    }
}

impl WatchPatterns {
    pub fn compile(section: &WatchSection) -> Result<Self> {
        let include = build_globset(&section.include).context("building include globset")?;
        let exclude = if section.exclude.is_empty() {
            None
        } else {
            Some(build_globset(&section.exclude).context("building exclude globset")?)
        };
        Ok(Self {
            include,
            exclude,
            include_count: section.include.len(),
            exclude_count: section.exclude.len(),
        })
    }

    /// Returns true if a save of `rel_path` should trigger a run.
    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.include.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }
}

/// Build a GlobSet from simple string patterns.
fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(include: &[&str], exclude: &[&str]) -> WatchSection {
        WatchSection {
            include: include.iter().map(|s| s.to_string()).collect(),
            exclude: exclude.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn default_section_ignores_target_and_git() {
        let p = WatchPatterns::compile(&WatchSection::default()).unwrap();
        assert!(p.matches("src/lib.rs"));
        assert!(p.matches("Cargo.toml"));
        assert!(!p.matches("target/debug/build/out.o"));
        assert!(!p.matches(".git/index"));
    }

    #[test]
    fn exclude_vetoes_include() {
        let p = WatchPatterns::compile(&section(&["src/**/*.rs"], &["src/**/generated_*.rs"]))
            .unwrap();
        assert!(p.matches("src/engine/core.rs"));
        assert!(!p.matches("src/engine/generated_table.rs"));
        assert!(!p.matches("README.md"));
    }

    #[test]
    fn empty_include_matches_nothing() {
        let p = WatchPatterns::compile(&section(&[], &[])).unwrap();
        assert!(!p.matches("src/lib.rs"));
    }

    #[test]
    fn invalid_glob_is_reported() {
        let err = WatchPatterns::compile(&section(&["src/[abc"], &[])).unwrap_err();
        assert!(format!("{err:#}").contains("invalid glob pattern"));
    }
}
