//! Single requirement line parsing
//!
//! Covers the subset of PEP 508 that appears in hand-written and
//! `pip freeze` requirements files: `name[extras] <specifiers> ; marker`
//! and direct references `name @ url`.

use std::fmt;

/// Comparison operators accepted in version specifiers
const OPERATORS: &[&str] = &["===", "~=", "==", "!=", "<=", ">=", "<", ">"];

/// One `<op><version>` clause of a specifier set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionClause {
    pub op: String,
    pub version: String,
}

impl fmt::Display for VersionClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op, self.version)
    }
}

/// A declared Python dependency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    /// Project name as written
    pub name: String,
    /// Optional extras (`name[extra1,extra2]`)
    pub extras: Vec<String>,
    /// Version constraints, empty for "any version"
    pub specifiers: Vec<VersionClause>,
    /// Environment marker after `;`
    pub marker: Option<String>,
    /// Direct reference after `@`
    pub url: Option<String>,
    /// 1-based line number in the manifest
    pub line: usize,
}

impl Requirement {
    /// Parse one logical requirement line (comments already stripped).
    ///
    /// Returns the reason on failure; the caller attaches path and line.
    pub fn parse(text: &str, line: usize) -> Result<Self, String> {
        let (body, marker) = match text.split_once(';') {
            Some((body, marker)) => {
                let marker = marker.trim();
                if marker.is_empty() {
                    return Err("empty environment marker after ';'".to_string());
                }
                (body.trim(), Some(marker.to_string()))
            }
            None => (text.trim(), None),
        };

        let name_end = body
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
            .unwrap_or(body.len());
        let name = &body[..name_end];
        validate_name(name)?;

        let mut rest = body[name_end..].trim_start();

        let mut extras = Vec::new();
        if let Some(after) = rest.strip_prefix('[') {
            let close = after
                .find(']')
                .ok_or_else(|| format!("unclosed extras for '{}'", name))?;
            for extra in after[..close].split(',') {
                let extra = extra.trim();
                if extra.is_empty() {
                    continue;
                }
                validate_name(extra)?;
                extras.push(extra.to_string());
            }
            rest = after[close + 1..].trim_start();
        }

        if let Some(url) = rest.strip_prefix('@') {
            let url = url.trim();
            if url.is_empty() {
                return Err(format!("empty direct reference for '{}'", name));
            }
            return Ok(Self {
                name: name.to_string(),
                extras,
                specifiers: Vec::new(),
                marker,
                url: Some(url.to_string()),
                line,
            });
        }

        let rest = rest
            .strip_prefix('(')
            .and_then(|r| r.strip_suffix(')'))
            .unwrap_or(rest);

        let mut specifiers = Vec::new();
        if !rest.trim().is_empty() {
            for clause in rest.split(',') {
                specifiers.push(parse_clause(clause.trim(), name)?);
            }
        }

        Ok(Self {
            name: name.to_string(),
            extras,
            specifiers,
            marker,
            url: None,
            line,
        })
    }

    /// Name normalized per PEP 503 (lowercase, runs of `-_.` become `-`)
    pub fn normalized_name(&self) -> String {
        normalize(&self.name)
    }

    /// The exact version when the requirement is pinned with `==` or `===`
    pub fn pinned_version(&self) -> Option<&str> {
        match self.specifiers.as_slice() {
            [clause] if (clause.op == "==" || clause.op == "===") && !clause.version.contains('*') => {
                Some(&clause.version)
            }
            _ => None,
        }
    }

    /// Whether this requirement has the named extra
    pub fn has_extra(&self, extra: &str) -> bool {
        self.extras.iter().any(|e| normalize(e) == normalize(extra))
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.extras.is_empty() {
            write!(f, "[{}]", self.extras.join(","))?;
        }
        if let Some(ref url) = self.url {
            write!(f, " @ {}", url)?;
        } else {
            let clauses: Vec<String> = self.specifiers.iter().map(ToString::to_string).collect();
            write!(f, "{}", clauses.join(","))?;
        }
        if let Some(ref marker) = self.marker {
            write!(f, "; {}", marker)?;
        }
        Ok(())
    }
}

fn parse_clause(clause: &str, name: &str) -> Result<VersionClause, String> {
    let op = OPERATORS
        .iter()
        .find(|op| clause.starts_with(**op))
        .ok_or_else(|| format!("invalid version specifier '{}' for '{}'", clause, name))?;

    let version = clause[op.len()..].trim();
    if version.is_empty() {
        return Err(format!("missing version after '{}' for '{}'", op, name));
    }
    if !version
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '*' | '+' | '!' | '-' | '_'))
    {
        return Err(format!("invalid version '{}' for '{}'", version, name));
    }

    Ok(VersionClause {
        op: (*op).to_string(),
        version: version.to_string(),
    })
}

fn validate_name(name: &str) -> Result<(), String> {
    let first = name.chars().next();
    let last = name.chars().last();
    match (first, last) {
        (Some(f), Some(l)) if f.is_ascii_alphanumeric() && l.is_ascii_alphanumeric() => Ok(()),
        _ if name.is_empty() => Err("missing package name".to_string()),
        _ => Err(format!("invalid package name '{}'", name)),
    }
}

fn normalize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_separator = false;
    for c in name.chars() {
        if matches!(c, '-' | '_' | '.') {
            if !in_separator {
                out.push('-');
            }
            in_separator = true;
        } else {
            out.push(c.to_ascii_lowercase());
            in_separator = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_pinned() {
        let req = Requirement::parse("flask==3.0.0", 1).unwrap();
        assert_eq!(req.name, "flask");
        assert_eq!(req.pinned_version(), Some("3.0.0"));
        assert_eq!(req.to_string(), "flask==3.0.0");
    }

    #[test]
    fn parse_range_with_extras_and_marker() {
        let req = Requirement::parse(
            "psycopg[binary,pool] >=3.1, <4 ; python_version >= \"3.10\"",
            4,
        )
        .unwrap();
        assert_eq!(req.extras, vec!["binary", "pool"]);
        assert_eq!(req.specifiers.len(), 2);
        assert_eq!(req.specifiers[1].op, "<");
        assert_eq!(req.marker.as_deref(), Some("python_version >= \"3.10\""));
        assert!(req.pinned_version().is_none());
        assert_eq!(req.line, 4);
    }

    #[test]
    fn parse_unversioned() {
        let req = Requirement::parse("python-dotenv", 1).unwrap();
        assert!(req.specifiers.is_empty());
    }

    #[test]
    fn parse_direct_reference() {
        let req = Requirement::parse("mylib @ https://example.com/mylib-1.0.tar.gz", 1).unwrap();
        assert_eq!(req.url.as_deref(), Some("https://example.com/mylib-1.0.tar.gz"));
    }

    #[test]
    fn wildcard_is_not_pinned() {
        let req = Requirement::parse("Django==5.0.*", 1).unwrap();
        assert!(req.pinned_version().is_none());
    }

    #[test]
    fn rejects_missing_version() {
        let err = Requirement::parse("flask==", 1).unwrap_err();
        assert!(err.contains("missing version"));
    }

    #[test]
    fn rejects_bad_operator() {
        assert!(Requirement::parse("flask=3.0", 1).is_err());
        assert!(Requirement::parse("flask 3.0", 1).is_err());
    }

    #[test]
    fn rejects_bad_name() {
        assert!(Requirement::parse("-flask", 1).is_err());
        assert!(Requirement::parse("==1.0", 1).is_err());
    }

    #[test]
    fn normalized_name_collapses_separators() {
        let req = Requirement::parse("Django_Import.Export==4.0", 1).unwrap();
        assert_eq!(req.normalized_name(), "django-import-export");
    }
}
