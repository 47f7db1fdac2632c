// src/nevra.rs

//! NEVRA parsing
//!
//! Two parsers live here. `NevraId` is the strict one: it takes a full
//! `name-[epoch:]version-release.arch` string with no globs and resolves
//! it against the pool's interned ids, with an EVR-as-string mode for
//! relational (`<`, `>`) comparison. `Nevra` is the forgiving,
//! form-driven parser used when interpreting user subjects, where
//! components may be globs and most are optional.

use crate::pool::{Id, Pool};

/// A strict NEVRA resolved to pool ids
///
/// For `dnf-2.8.9-1.fc27.noarch` both `dnf-0:2.8.9-1.fc27.noarch` and
/// the epoch-less form resolve; an all-zero epoch prefix is stripped the
/// same way the pool strips it when interning EVRs. A nonzero epoch must
/// be written out for the lookup to succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NevraId {
    pub name: Id,
    pub arch: Id,
    /// interned EVR; unset in string mode
    pub evr: Id,
    /// textual EVR kept for relational comparison
    pub evr_str: Option<String>,
}

impl NevraId {
    /// Parse a strict NEVRA against the pool
    ///
    /// With `intern_evr` the EVR must already be interned (exact-match
    /// mode); without it the EVR is kept as a string so callers can run
    /// relational compares against arbitrary versions. Returns `None`
    /// when the pattern is malformed or any component is unknown.
    pub fn parse(pool: &Pool, pattern: &str, intern_evr: bool) -> Option<Self> {
        let bytes = pattern.as_bytes();
        let mut evr_delim = None;
        let mut release_delim = None;
        let mut arch_delim = None;
        for (i, &b) in bytes.iter().enumerate() {
            match b {
                b'-' => {
                    evr_delim = release_delim;
                    release_delim = Some(i);
                }
                b'.' => arch_delim = Some(i),
                _ => {}
            }
        }

        let evr_delim = evr_delim?;
        let release_delim = release_delim.expect("set whenever evr_delim is");
        let arch_delim = arch_delim?;
        if evr_delim == 0
            || release_delim - evr_delim <= 1
            || arch_delim <= release_delim + 1
            || arch_delim == pattern.len() - 1
        {
            return None;
        }

        let name = pool.str2id(&pattern[..evr_delim])?;
        let arch = pool.str2id(&pattern[arch_delim + 1..])?;

        let mut evr = &pattern[evr_delim + 1..arch_delim];
        // strip an all-zero epoch ("0:", "00:", ...)
        let zeros = evr.bytes().take_while(|&b| b == b'0').count();
        if zeros > 0 && evr.as_bytes().get(zeros) == Some(&b':') {
            evr = &evr[zeros + 1..];
        }
        if evr.is_empty() {
            return None;
        }

        if intern_evr {
            let evr = pool.str2id(evr)?;
            Some(NevraId {
                name,
                arch,
                evr,
                evr_str: None,
            })
        } else {
            Some(NevraId {
                name,
                arch,
                evr: 0,
                evr_str: Some(evr.to_string()),
            })
        }
    }
}

/// The shapes a user-supplied subject can take, most specific first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Form {
    Nevra,
    NameArch,
    Name,
    Nev,
    Nevr,
}

/// Form order tried when no explicit list is given
pub const FORMS_MOST_SPEC: &[Form] = &[
    Form::Nevra,
    Form::NameArch,
    Form::Name,
    Form::Nev,
    Form::Nevr,
];

/// A loosely parsed NEVRA; components may carry glob metacharacters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Nevra {
    pub name: String,
    pub epoch: Option<u64>,
    pub version: Option<String>,
    pub release: Option<String>,
    pub arch: Option<String>,
}

impl Nevra {
    /// Try to parse `subject` as the given form
    pub fn parse(subject: &str, form: Form) -> Option<Self> {
        if subject.is_empty() {
            return None;
        }
        match form {
            Form::Name => Some(Nevra {
                name: subject.to_string(),
                ..Default::default()
            }),
            Form::NameArch => {
                let dot = subject.rfind('.')?;
                if dot == 0 || dot == subject.len() - 1 {
                    return None;
                }
                Some(Nevra {
                    name: subject[..dot].to_string(),
                    arch: Some(subject[dot + 1..].to_string()),
                    ..Default::default()
                })
            }
            Form::Nev => {
                let dash = subject.rfind('-')?;
                if dash == 0 || dash == subject.len() - 1 {
                    return None;
                }
                let (epoch, version) = split_epoch(&subject[dash + 1..]);
                Some(Nevra {
                    name: subject[..dash].to_string(),
                    epoch,
                    version: Some(version.to_string()),
                    ..Default::default()
                })
            }
            Form::Nevr => {
                let (name, epoch, version, release) = split_nevr(subject)?;
                Some(Nevra {
                    name: name.to_string(),
                    epoch,
                    version: Some(version.to_string()),
                    release: Some(release.to_string()),
                    arch: None,
                })
            }
            Form::Nevra => {
                let dot = subject.rfind('.')?;
                if dot == subject.len() - 1 {
                    return None;
                }
                let (name, epoch, version, release) = split_nevr(&subject[..dot])?;
                Some(Nevra {
                    name: name.to_string(),
                    epoch,
                    version: Some(version.to_string()),
                    release: Some(release.to_string()),
                    arch: Some(subject[dot + 1..].to_string()),
                })
            }
        }
    }
}

fn split_epoch(s: &str) -> (Option<u64>, &str) {
    match s.find(':') {
        Some(pos) => match s[..pos].parse::<u64>() {
            Ok(e) => (Some(e), &s[pos + 1..]),
            Err(_) => (None, s),
        },
        None => (None, s),
    }
}

fn split_nevr(s: &str) -> Option<(&str, Option<u64>, &str, &str)> {
    let release_dash = s.rfind('-')?;
    if release_dash == s.len() - 1 {
        return None;
    }
    let evr_dash = s[..release_dash].rfind('-')?;
    if evr_dash == 0 {
        return None;
    }
    let (epoch, version) = split_epoch(&s[evr_dash + 1..release_dash]);
    if version.is_empty() {
        return None;
    }
    Some((&s[..evr_dash], epoch, version, &s[release_dash + 1..]))
}
