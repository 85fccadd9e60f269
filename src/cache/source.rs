//! Source tree hashing for content-addressed layer keys
//!
//! Walks the source path in sorted order and hashes relative paths and
//! file contents. Paths excluded by the context's `.dockerignore` never
//! reach the image, so they do not affect the digest either. File mode bits
//! survive `COPY`, so they are hashed next to the contents.

use crate::error::{BakeError, BakeResult};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Ignore file read from the build context root
pub const IGNORE_FILE: &str = ".dockerignore";

/// Digest of the files that a source COPY would send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDigest {
    /// SHA256 over paths and contents (hex)
    pub digest: String,
    /// Number of files hashed
    pub files: usize,
}

impl SourceDigest {
    /// Hash `source` (relative to `context_root`), honoring `.dockerignore`.
    pub fn compute(context_root: &Path, source: &str) -> BakeResult<Self> {
        let source_path = context_root.join(source);
        if !source_path.exists() {
            return Err(BakeError::SourceNotFound(source_path));
        }

        let rules = IgnoreRules::load(context_root)?;
        let mut hasher = Sha256::new();
        let mut files = 0;

        let rel = relative(context_root, &source_path);
        hash_entry(context_root, &source_path, &rel, &rules, &mut hasher, &mut files)?;

        let digest = hex::encode(hasher.finalize());
        debug!("Hashed {} source files: {}", files, &digest[..12]);
        Ok(Self { digest, files })
    }
}

fn hash_entry(
    root: &Path,
    path: &Path,
    rel: &str,
    rules: &IgnoreRules,
    hasher: &mut Sha256,
    files: &mut usize,
) -> BakeResult<()> {
    let ignored = !rel.is_empty() && rules.is_ignored(rel);

    let meta = fs::symlink_metadata(path)
        .map_err(|e| BakeError::io(format!("reading metadata of {}", path.display()), e))?;

    if meta.is_dir() {
        // A later `!` rule may re-include something below an excluded directory
        if ignored && !rules.has_exceptions() {
            return Ok(());
        }
        let mut entries: Vec<_> = fs::read_dir(path)
            .map_err(|e| BakeError::io(format!("listing {}", path.display()), e))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| BakeError::io(format!("listing {}", path.display()), e))?;
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let child = entry.path();
            let child_rel = relative(root, &child);
            hash_entry(root, &child, &child_rel, rules, hasher, files)?;
        }
        return Ok(());
    }

    if ignored {
        return Ok(());
    }

    hasher.update(rel.as_bytes());
    hasher.update([0u8]);

    if meta.file_type().is_symlink() {
        let target = fs::read_link(path)
            .map_err(|e| BakeError::io(format!("reading link {}", path.display()), e))?;
        hasher.update(b"link:");
        hasher.update(target.to_string_lossy().as_bytes());
    } else {
        let content = fs::read(path)
            .map_err(|e| BakeError::io(format!("reading {}", path.display()), e))?;
        hasher.update(file_mode(&meta).to_le_bytes());
        hasher.update((content.len() as u64).to_le_bytes());
        hasher.update(&content);
    }

    *files += 1;
    Ok(())
}

#[cfg(unix)]
fn file_mode(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn file_mode(meta: &fs::Metadata) -> u32 {
    u32::from(meta.permissions().readonly())
}

/// Context-relative path with `/` separators
fn relative(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .filter_map(|c| match c {
            std::path::Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// One `.dockerignore` line
#[derive(Debug, Clone)]
struct IgnorePattern {
    components: Vec<String>,
    /// `!pattern`: re-include what earlier patterns excluded
    exception: bool,
}

/// Parsed `.dockerignore` patterns, applied in file order
#[derive(Debug, Default)]
pub struct IgnoreRules {
    patterns: Vec<IgnorePattern>,
}

impl IgnoreRules {
    /// Load rules from the context root; a missing file means no rules.
    pub fn load(context_root: &Path) -> BakeResult<Self> {
        let path = context_root.join(IGNORE_FILE);
        if !path.is_file() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)
            .map_err(|e| BakeError::io(format!("reading {}", path.display()), e))?;
        Ok(Self::parse(&content))
    }

    pub fn parse(content: &str) -> Self {
        let mut patterns = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (exception, body) = match line.strip_prefix('!') {
                Some(rest) => (true, rest.trim()),
                None => (false, line),
            };
            let cleaned = body
                .trim_start_matches("./")
                .trim_start_matches('/')
                .trim_end_matches('/');
            if cleaned.is_empty() {
                continue;
            }
            patterns.push(IgnorePattern {
                components: cleaned.split('/').map(str::to_string).collect(),
                exception,
            });
        }
        Self { patterns }
    }

    /// Whether any `!` pattern exists
    pub fn has_exceptions(&self) -> bool {
        self.patterns.iter().any(|p| p.exception)
    }

    /// Whether a context-relative path is excluded.
    ///
    /// A pattern matches the path or any of its parent directories. The last
    /// matching pattern decides.
    pub fn is_ignored(&self, rel: &str) -> bool {
        let parts: Vec<&str> = rel.split('/').collect();
        let mut ignored = false;
        for pattern in &self.patterns {
            let matched = (1..=parts.len())
                .any(|len| match_components(&pattern.components, &parts[..len]));
            if matched {
                ignored = !pattern.exception;
            }
        }
        ignored
    }
}

fn match_components(pattern: &[String], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((first, rest)) if first == "**" => {
            (0..=path.len()).any(|skip| match_components(rest, &path[skip..]))
        }
        Some((first, rest)) => match path.split_first() {
            Some((head, tail)) => wildcard_match(first, head) && match_components(rest, tail),
            None => false,
        },
    }
}

/// Match a single path component against `*` and `?` wildcards
fn wildcard_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((star_pi, star_ti)) = star {
            pi = star_pi + 1;
            ti = star_ti + 1;
            star = Some((star_pi, star_ti + 1));
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|c| *c == '*')
}
