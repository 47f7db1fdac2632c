// src/advisory.rs

//! Advisory (erratum) metadata attached to the pool
//!
//! An advisory references a set of (name, arch, evr) triples and carries
//! type/severity/CVE/bug metadata. The query engine matches advisories
//! by that metadata and then maps the referenced triples back onto
//! concrete solvables.

use crate::pool::{Id, Pool};

/// Advisory classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvisoryKind {
    Security,
    Bugfix,
    Enhancement,
    Newpackage,
}

impl AdvisoryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AdvisoryKind::Security => "security",
            AdvisoryKind::Bugfix => "bugfix",
            AdvisoryKind::Enhancement => "enhancement",
            AdvisoryKind::Newpackage => "newpackage",
        }
    }
}

/// One (name, arch, evr) triple referenced by an advisory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvisoryPkg {
    pub name: Id,
    pub arch: Id,
    pub evr: Id,
}

impl AdvisoryPkg {
    /// Exact id-level NEVRA equality against a solvable
    pub fn nevra_eq(&self, pool: &Pool, solvable: Id) -> bool {
        let s = pool.solvable(solvable);
        self.name == s.name && self.arch == s.arch && self.evr == s.evr
    }
}

/// An erratum
#[derive(Debug, Clone)]
pub struct Advisory {
    pub name: String,
    pub kind: AdvisoryKind,
    pub severity: Option<String>,
    pub bugs: Vec<String>,
    pub cves: Vec<String>,
    pub packages: Vec<AdvisoryPkg>,
}

impl Advisory {
    pub fn new(name: &str, kind: AdvisoryKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            severity: None,
            bugs: Vec::new(),
            cves: Vec::new(),
            packages: Vec::new(),
        }
    }

    pub fn match_name(&self, pattern: &str) -> bool {
        self.name == pattern
    }

    pub fn match_bug(&self, pattern: &str) -> bool {
        self.bugs.iter().any(|b| b == pattern)
    }

    pub fn match_cve(&self, pattern: &str) -> bool {
        self.cves.iter().any(|c| c == pattern)
    }

    pub fn match_kind(&self, pattern: &str) -> bool {
        self.kind.as_str() == pattern
    }

    pub fn match_severity(&self, pattern: &str) -> bool {
        self.severity.as_deref() == Some(pattern)
    }
}
