//! Dependency manifest loading and hashing
//!
//! The manifest is a pip requirements file. Its raw bytes key the
//! dependency-install layer: same file contents, same layer.

mod requirement;

pub use requirement::{Requirement, VersionClause};

use crate::error::{BakeError, BakeResult};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Packages whose source builds need database client headers
const NATIVE_DB_DRIVERS: &[&str] = &["psycopg2", "mysqlclient"];

/// pip options whose argument names another file or project in the context
const FILE_OPTIONS: &[&str] = &["-r", "--requirement", "-c", "--constraint", "-e", "--editable"];

/// Parsed dependency manifest
#[derive(Debug, Clone)]
pub struct DependencyManifest {
    /// Where the manifest was read from
    pub path: PathBuf,
    /// Declared requirements in file order
    pub requirements: Vec<Requirement>,
    /// pip option lines (`-r`, `--index-url`, `-e`, ...)
    pub options: Vec<String>,
    /// SHA256 of the raw file contents (hex)
    pub digest: String,
}

impl DependencyManifest {
    /// Read and parse a manifest from disk
    pub async fn load(path: &Path) -> BakeResult<Self> {
        if !path.is_file() {
            return Err(BakeError::ManifestNotFound(path.to_path_buf()));
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| BakeError::io(format!("reading manifest {}", path.display()), e))?;

        let content = String::from_utf8(bytes).map_err(|_| BakeError::ManifestParse {
            path: path.to_path_buf(),
            line: 0,
            reason: "manifest is not valid UTF-8".to_string(),
        })?;

        Self::parse(path, &content)
    }

    /// Parse manifest text
    pub fn parse(path: &Path, content: &str) -> BakeResult<Self> {
        let mut requirements = Vec::new();
        let mut options = Vec::new();

        for (line, text) in logical_lines(content) {
            if text.starts_with('-') {
                if let Some(reference) = local_reference(&text) {
                    return Err(BakeError::ManifestParse {
                        path: path.to_path_buf(),
                        line,
                        reason: format!(
                            "'{}' refers to a local path that is not copied before dependencies are installed; inline its requirements",
                            reference
                        ),
                    });
                }
                options.push(text);
                continue;
            }

            let requirement =
                Requirement::parse(&text, line).map_err(|reason| BakeError::ManifestParse {
                    path: path.to_path_buf(),
                    line,
                    reason,
                })?;
            requirements.push(requirement);
        }

        debug!(
            "Parsed {} requirements, {} options from {}",
            requirements.len(),
            options.len(),
            path.display()
        );

        Ok(Self {
            path: path.to_path_buf(),
            requirements,
            options,
            digest: hash_contents(content.as_bytes()),
        })
    }

    /// True when nothing beyond the base runtime will be installed
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty() && self.options.is_empty()
    }

    /// Look up a requirement by (normalized) name
    pub fn get(&self, name: &str) -> Option<&Requirement> {
        let wanted = Requirement::parse(name, 0).ok()?.normalized_name();
        self.requirements
            .iter()
            .find(|r| r.normalized_name() == wanted)
    }

    /// Whether any dependency compiles against a relational database client library
    pub fn requires_relational_storage(&self) -> bool {
        self.requirements.iter().any(|r| {
            let name = r.normalized_name();
            NATIVE_DB_DRIVERS.contains(&name.as_str()) || (name == "psycopg" && r.has_extra("c"))
        })
    }
}

/// Join `\` continuations and strip comments. Yields (first line number, text).
fn logical_lines(content: &str) -> Vec<(usize, String)> {
    let mut lines = Vec::new();
    let mut pending: Option<(usize, String)> = None;

    for (idx, raw) in content.lines().enumerate() {
        let stripped = strip_comment(raw);
        let (start, mut buffer) = pending.take().unwrap_or((idx + 1, String::new()));

        if let Some(head) = stripped.strip_suffix('\\') {
            buffer.push_str(head);
            buffer.push(' ');
            pending = Some((start, buffer));
            continue;
        }

        buffer.push_str(stripped);
        let text = buffer.trim();
        if !text.is_empty() {
            lines.push((start, text.to_string()));
        }
    }

    if let Some((start, buffer)) = pending {
        let text = buffer.trim();
        if !text.is_empty() {
            lines.push((start, text.to_string()));
        }
    }

    lines
}

/// The argument of a `-r`/`-c`/`-e` option line when it is a local path
fn local_reference(text: &str) -> Option<&str> {
    let argument = FILE_OPTIONS.iter().find_map(|flag| {
        let rest = text.strip_prefix(flag)?;
        if flag.starts_with("--") {
            // --requirement=base.txt or --requirement base.txt
            rest.strip_prefix('=')
                .or_else(|| rest.strip_prefix(char::is_whitespace))
        } else {
            // -rbase.txt or -r base.txt
            Some(rest)
        }
    })?;

    let argument = argument.trim();
    if argument.is_empty() || argument.contains("://") {
        None
    } else {
        Some(argument)
    }
}

/// Remove a `#` comment that starts the line or follows whitespace
fn strip_comment(line: &str) -> &str {
    let trimmed = line.trim_end();
    if trimmed.trim_start().starts_with('#') {
        return "";
    }
    let bytes = trimmed.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'#' && i > 0 && bytes[i - 1].is_ascii_whitespace() {
            return trimmed[..i].trim_end();
        }
    }
    trimmed
}

fn hash_contents(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DJANGO_MANIFEST: &str = r#"
# Web stack
Django==5.0.6
djangorestframework==3.15.1   # API
django-import-export==4.0.3
python-dotenv>=1.0
psycopg2==2.9.9
gunicorn==22.0.0 \
    ; sys_platform != "win32"
--index-url https://pypi.org/simple
"#;

    fn parse(content: &str) -> BakeResult<DependencyManifest> {
        DependencyManifest::parse(Path::new("requirements.txt"), content)
    }

    #[test]
    fn parse_full_manifest() {
        let manifest = parse(DJANGO_MANIFEST).unwrap();
        assert_eq!(manifest.requirements.len(), 6);
        assert_eq!(manifest.options, vec!["--index-url https://pypi.org/simple"]);

        let drf = manifest.get("djangorestframework").unwrap();
        assert_eq!(drf.pinned_version(), Some("3.15.1"));

        let gunicorn = manifest.get("gunicorn").unwrap();
        assert_eq!(gunicorn.line, 8);
        assert_eq!(gunicorn.marker.as_deref(), Some("sys_platform != \"win32\""));
    }

    #[test]
    fn flask_pin_resolves_exact_version() {
        let manifest = parse("flask==3.0.0\n").unwrap();
        let flask = manifest.get("Flask").unwrap();
        assert_eq!(flask.pinned_version(), Some("3.0.0"));
    }

    #[test]
    fn empty_manifest_is_valid() {
        let manifest = parse("").unwrap();
        assert!(manifest.is_empty());

        let commented = parse("# nothing yet\n\n").unwrap();
        assert!(commented.is_empty());
    }

    #[test]
    fn parse_error_reports_line() {
        let err = parse("flask==3.0.0\nrequests==\n").unwrap_err();
        match err {
            BakeError::ManifestParse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn digest_tracks_content() {
        let a = parse("flask==3.0.0\n").unwrap();
        let b = parse("flask==3.0.0\n").unwrap();
        let c = parse("flask==3.0.1\n").unwrap();
        assert_eq!(a.digest, b.digest);
        assert_ne!(a.digest, c.digest);
        assert_eq!(a.digest.len(), 64);
    }

    #[test]
    fn relational_storage_detection() {
        assert!(parse("psycopg2==2.9.9").unwrap().requires_relational_storage());
        assert!(parse("mysqlclient").unwrap().requires_relational_storage());
        assert!(parse("psycopg[c]>=3.1").unwrap().requires_relational_storage());
        assert!(!parse("psycopg2-binary==2.9.9").unwrap().requires_relational_storage());
        assert!(!parse("psycopg[binary]").unwrap().requires_relational_storage());
        assert!(!parse("flask==3.0.0").unwrap().requires_relational_storage());
    }

    #[test]
    fn local_file_options_rejected() {
        for (content, reference) in [
            ("flask==3.0.0\n-r base.txt\n", "base.txt"),
            ("flask==3.0.0\n--requirement=requirements/prod.txt\n", "requirements/prod.txt"),
            ("flask==3.0.0\n-c constraints.txt\n", "constraints.txt"),
            ("flask==3.0.0\n-e .\n", "."),
            ("flask==3.0.0\n-rbase.txt\n", "base.txt"),
        ] {
            match parse(content).unwrap_err() {
                BakeError::ManifestParse { line, reason, .. } => {
                    assert_eq!(line, 2, "{content:?}");
                    assert!(reason.contains(reference), "{reason}");
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn remote_and_index_options_kept() {
        let manifest = parse(
            "-e git+https://github.com/org/lib.git#egg=lib\n-r https://example.com/base.txt\n--extra-index-url https://pypi.example.com/simple\n--require-hashes\n",
        )
        .unwrap();
        assert_eq!(manifest.options.len(), 4);
    }

    #[test]
    fn strip_comment_keeps_url_fragments() {
        assert_eq!(strip_comment("pkg @ https://x/y.tar.gz#sha256=abc"), "pkg @ https://x/y.tar.gz#sha256=abc");
        assert_eq!(strip_comment("flask==3.0.0  # web"), "flask==3.0.0");
        assert_eq!(strip_comment("   # full line"), "");
    }

    #[tokio::test]
    async fn load_missing_manifest_fails() {
        let dir = TempDir::new().unwrap();
        let err = DependencyManifest::load(&dir.path().join("requirements.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, BakeError::ManifestNotFound(_)));
    }

    #[tokio::test]
    async fn load_from_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("requirements.txt");
        std::fs::write(&path, "flask==3.0.0\n").unwrap();

        let manifest = DependencyManifest::load(&path).await.unwrap();
        assert_eq!(manifest.requirements.len(), 1);
        assert_eq!(manifest.path, path);
    }
}
