// src/dep.rs

//! Reldep parsing and reldep lists
//!
//! Turns textual dependency specs (`libc >= 2.34`, `webserver`) into
//! interned pool reldeps, and expands glob patterns into the list of
//! matching provide names.

use crate::error::{Error, Result};
use crate::pool::{Id, Pool, Reldep, REL_EQ, REL_GT, REL_LT};
use glob::Pattern;

/// Split a dependency spec into (name, flags, evr)
///
/// Accepted operators: `<`, `<=`, `=`, `>=`, `>`. A bare name has no
/// version constraint. Rich deps (starting with `(`) keep the whole
/// expression as the name with no constraint; the goal's weak-dep
/// autodetection skips them by that marker.
fn split_spec(spec: &str) -> Result<(&str, u32, Option<&str>)> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Err(Error::BadQuery("empty dependency spec".to_string()));
    }
    if spec.starts_with('(') {
        return Ok((spec, 0, None));
    }
    for (op, flags) in [
        ("<=", REL_LT | REL_EQ),
        (">=", REL_GT | REL_EQ),
        ("<", REL_LT),
        (">", REL_GT),
        ("=", REL_EQ),
    ] {
        if let Some(pos) = spec.find(op) {
            let name = spec[..pos].trim_end();
            let evr = spec[pos + op.len()..].trim_start();
            if name.is_empty() || evr.is_empty() {
                return Err(Error::BadQuery(format!(
                    "malformed dependency spec '{}'",
                    spec
                )));
            }
            return Ok((name, flags, Some(evr)));
        }
    }
    Ok((spec, 0, None))
}

impl Reldep {
    /// Parse a spec, interning the name; used while building the pool
    pub fn parse_create(pool: &mut Pool, spec: &str) -> Result<Self> {
        let (name, flags, evr) = split_spec(spec)?;
        let name = pool.str2id_create(name);
        Ok(Reldep {
            name,
            flags,
            evr: evr.map(Into::into),
            arch: None,
        })
    }

    /// Parse a spec against the existing string table; `None` when the
    /// name is unknown to the pool (such a dep can have no providers)
    pub fn parse_lookup(pool: &Pool, spec: &str) -> Option<Self> {
        let (name, flags, evr) = split_spec(spec).ok()?;
        let name = pool.str2id(name)?;
        Some(Reldep {
            name,
            flags,
            evr: evr.map(Into::into),
            arch: None,
        })
    }
}

/// An ordered list of interned reldep ids
#[derive(Debug, Clone, Default)]
pub struct ReldepList {
    ids: Vec<Id>,
}

impl ReldepList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, id: Id) {
        self.ids.push(id);
    }

    /// Parse and add one spec; fails when the name is unknown
    pub fn add(&mut self, pool: &Pool, spec: &str) -> bool {
        match Reldep::parse_lookup(pool, spec) {
            Some(dep) => {
                self.ids.push(pool.intern_reldep(dep));
                true
            }
            None => false,
        }
    }

    /// Expand a glob pattern over all provide names in the pool and add
    /// a name-only reldep per match; returns whether anything matched
    pub fn add_with_glob(&mut self, pool: &Pool, pattern: &str) -> bool {
        let Ok(pattern) = Pattern::new(pattern) else {
            return false;
        };
        pool.make_provides_ready();
        let mut matched = false;
        let mut names: Vec<Id> = Vec::new();
        for id in pool.pkg_ids() {
            for &p in &pool.solvable(id).provides {
                let name = pool.reldep(p).name;
                if !names.contains(&name) && pattern.matches(pool.id2str(name)) {
                    names.push(name);
                    matched = true;
                }
            }
        }
        names.sort_unstable();
        for name in names {
            self.ids.push(pool.intern_reldep(Reldep::name_only(name)));
        }
        matched
    }

    pub fn ids(&self) -> &[Id] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Id> + '_ {
        self.ids.iter().copied()
    }
}

/// True when the pattern carries glob metacharacters
pub fn is_glob_pattern(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

/// True when the subject looks like a file path pattern
pub fn is_file_pattern(subject: &str) -> bool {
    subject.starts_with('/') || subject.starts_with("*/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_spec_operators() {
        assert_eq!(split_spec("libc >= 2.34").unwrap(), ("libc", REL_GT | REL_EQ, Some("2.34")));
        assert_eq!(split_spec("foo<1.0").unwrap(), ("foo", REL_LT, Some("1.0")));
        assert_eq!(split_spec("bash").unwrap(), ("bash", 0, None));
        assert_eq!(split_spec("foo = 2:1.0-1").unwrap(), ("foo", REL_EQ, Some("2:1.0-1")));
    }

    #[test]
    fn test_split_spec_rich_dep_kept_whole() {
        let (name, flags, evr) = split_spec("(pkgA if pkgB)").unwrap();
        assert_eq!(name, "(pkgA if pkgB)");
        assert_eq!(flags, 0);
        assert_eq!(evr, None);
    }

    #[test]
    fn test_split_spec_malformed() {
        assert!(split_spec(">= 1.0").is_err());
        assert!(split_spec("foo >=").is_err());
        assert!(split_spec("").is_err());
    }

    #[test]
    fn test_parse_lookup_unknown_name() {
        let pool = Pool::new();
        assert!(Reldep::parse_lookup(&pool, "no-such-thing").is_none());
    }

    #[test]
    fn test_is_glob_pattern() {
        assert!(is_glob_pattern("ker*"));
        assert!(is_glob_pattern("foo?"));
        assert!(is_glob_pattern("lib[ab]"));
        assert!(!is_glob_pattern("kernel"));
    }

    #[test]
    fn test_is_file_pattern() {
        assert!(is_file_pattern("/usr/bin/vi"));
        assert!(is_file_pattern("*/vi"));
        assert!(!is_file_pattern("vi"));
    }
}
