use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Play counts keyed by track title or playlist name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayCounts {
    entries: BTreeMap<String, u64>,
}

impl PlayCounts {
    pub fn get(&self, key: &str) -> u64 {
        self.entries.get(key).copied().unwrap_or(0)
    }

    pub fn set(&mut self, key: &str, count: u64) {
        self.entries.insert(key.to_string(), count);
    }

    pub fn increment(&mut self, key: &str) -> u64 {
        let count = self.entries.entry(key.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(key, count)| (key.as_str(), *count))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Parses `key=value` lines. Blank, malformed or negative lines are
    /// skipped.
    pub fn parse(raw: &str) -> Self {
        let mut counts = Self::default();
        for line in raw.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            match value.trim().parse::<u64>() {
                Ok(count) => counts.set(key, count),
                Err(_) => tracing::debug!(line, "skipping malformed count line"),
            }
        }
        counts
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (key, count) in self.iter() {
            out.push_str(key);
            out.push('=');
            out.push_str(&count.to_string());
            out.push('\n');
        }
        out
    }
}

impl<K: Into<String>> FromIterator<(K, u64)> for PlayCounts {
    fn from_iter<I: IntoIterator<Item = (K, u64)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(key, count)| (key.into(), count)).collect(),
        }
    }
}

/// A counter file on disk. Every increment reloads the file, bumps one entry
/// and rewrites the whole file, so edits made outside the player survive.
#[derive(Debug, Clone)]
pub struct PlayCountStore {
    path: PathBuf,
    cached: PlayCounts,
}

impl PlayCountStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cached = load_counts(&path).unwrap_or_else(|err| {
            tracing::warn!("failed to load {}: {err:#}", path.display());
            PlayCounts::default()
        });
        Self { path, cached }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn counts(&self) -> &PlayCounts {
        &self.cached
    }

    pub fn get(&self, key: &str) -> u64 {
        self.cached.get(key)
    }

    pub fn reload(&mut self) -> Result<()> {
        self.cached = load_counts(&self.path)?;
        Ok(())
    }

    pub fn increment(&mut self, key: &str) -> Result<u64> {
        let mut counts = load_counts(&self.path)?;
        let count = counts.increment(key);
        save_counts(&self.path, &counts)?;
        self.cached = counts;
        Ok(count)
    }
}

pub fn load_counts(path: &Path) -> Result<PlayCounts> {
    if !path.exists() {
        return Ok(PlayCounts::default());
    }
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(PlayCounts::parse(&raw))
}

pub fn save_counts(path: &Path, counts: &PlayCounts) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, counts.render())
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parse_skips_malformed_lines() {
        let counts = PlayCounts::parse("a=3\nbroken\n b = 7 \nc=-1\nd=lots\n=4\n\n");
        assert_eq!(counts.get("a"), 3);
        assert_eq!(counts.get("b"), 7);
        assert_eq!(counts.get("c"), 0);
        assert_eq!(counts.len(), 2);
    }

    #[test]
    fn line_splits_at_first_equals() {
        let counts = PlayCounts::parse("Song=Title=2");
        assert!(counts.is_empty());
    }

    #[test]
    fn increment_creates_and_rewrites_file() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("plays.count");
        let mut store = PlayCountStore::open(&path);

        assert_eq!(store.increment("Night Drive").expect("inc"), 1);
        assert_eq!(store.increment("Night Drive").expect("inc"), 2);
        assert_eq!(store.increment("Ocean").expect("inc"), 1);

        let raw = fs::read_to_string(&path).expect("read");
        assert_eq!(raw, "Night Drive=2\nOcean=1\n");
    }

    #[test]
    fn increment_picks_up_external_edits() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("plays.count");
        let mut store = PlayCountStore::open(&path);
        store.increment("a").expect("inc");

        fs::write(&path, "a=10\n").expect("external edit");
        assert_eq!(store.increment("a").expect("inc"), 11);
        assert_eq!(store.get("a"), 11);
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempdir().expect("tempdir");
        let store = PlayCountStore::open(dir.path().join("nope.count"));
        assert!(store.counts().is_empty());
    }
}
