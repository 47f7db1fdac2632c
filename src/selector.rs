// src/selector.rs

//! Selectors: structured target descriptions for goal intents
//!
//! A selector names a package set by at most one of each: an explicit
//! package set, a name filter, a provides filter, a file filter, plus
//! optional arch/evr/reponame refinements. It validates eagerly and
//! lowers itself into solver job entries; the arch and EVR refinements
//! rewrite the name entries into constrained reldeps rather than
//! post-filtering.

use crate::dep::is_glob_pattern;
use crate::error::{Error, Result};
use crate::pool::{Id, Reldep, REL_EQ};
use crate::query::{cmp, Keyname, Query};
use crate::sack::Sack;
use crate::set::{IdQueue, PackageSet};
use crate::solver::{self, job};
use glob::Pattern;

#[derive(Debug, Clone)]
struct SelectorFilter {
    cmp_type: u32,
    matches: Vec<Box<str>>,
}

impl SelectorFilter {
    /// The single match every well-formed selector filter carries
    fn single(&self) -> Result<&str> {
        if self.matches.len() != 1 {
            return Err(Error::BadSelector(
                "presence of multiple match objects in the filter".to_string(),
            ));
        }
        Ok(&self.matches[0])
    }
}

/// A validated target description
#[derive(Clone)]
pub struct Selector<'a> {
    sack: &'a Sack,
    pkgs: Option<PackageSet>,
    name: Option<SelectorFilter>,
    provides: Option<SelectorFilter>,
    file: Option<SelectorFilter>,
    arch: Option<SelectorFilter>,
    evr: Option<SelectorFilter>,
    version: Option<SelectorFilter>,
    reponame: Option<SelectorFilter>,
}

impl<'a> Selector<'a> {
    pub fn new(sack: &'a Sack) -> Self {
        Self {
            sack,
            pkgs: None,
            name: None,
            provides: None,
            file: None,
            arch: None,
            evr: None,
            version: None,
            reponame: None,
        }
    }

    pub fn sack(&self) -> &'a Sack {
        self.sack
    }

    /// Target an explicit package set
    pub fn set_pkgs(&mut self, pkgs: &PackageSet) -> &mut Self {
        self.pkgs = Some(pkgs.clone());
        self
    }

    pub fn has_pkgs(&self) -> bool {
        self.pkgs.is_some()
    }

    /// Set one of the selector's filter slots
    ///
    /// `Name` and `File` accept `EQ` or `GLOB`; `Provides` accepts `EQ`
    /// or `GLOB`; `Arch`, `Evr`, `Version` and `Reponame` accept `EQ`
    /// only. Anything else is a `BadSelector`.
    pub fn set(&mut self, keyname: Keyname, cmp_type: u32, m: &str) -> Result<&mut Self> {
        // a glob comparison without metacharacters is plain equality
        let cmp_type = if cmp_type == cmp::GLOB && !is_glob_pattern(m) {
            cmp::EQ
        } else {
            cmp_type
        };
        let filter = SelectorFilter {
            cmp_type,
            matches: vec![m.into()],
        };
        let slot = match keyname {
            Keyname::Name if matches!(cmp_type, cmp::EQ | cmp::GLOB) => &mut self.name,
            Keyname::Provides if matches!(cmp_type, cmp::EQ | cmp::GLOB) => &mut self.provides,
            Keyname::File if matches!(cmp_type, cmp::EQ | cmp::GLOB) => &mut self.file,
            Keyname::Arch if cmp_type == cmp::EQ => &mut self.arch,
            Keyname::Evr if cmp_type == cmp::EQ => &mut self.evr,
            Keyname::Version if cmp_type == cmp::EQ => &mut self.version,
            Keyname::Reponame if cmp_type == cmp::EQ => &mut self.reponame,
            Keyname::Name | Keyname::Provides | Keyname::File | Keyname::Arch | Keyname::Evr
            | Keyname::Version | Keyname::Reponame => {
                return Err(Error::BadSelector(
                    "incorrect comparison type".to_string(),
                ))
            }
            other => {
                return Err(Error::BadSelector(format!(
                    "{:?} is not a selector filter",
                    other
                )))
            }
        };
        *slot = Some(filter);
        Ok(self)
    }

    fn any_required(&self) -> bool {
        self.pkgs.is_some()
            || self.name.is_some()
            || self.provides.is_some()
            || self.file.is_some()
    }

    fn any_optional(&self) -> bool {
        self.arch.is_some()
            || self.evr.is_some()
            || self.version.is_some()
            || self.reponame.is_some()
    }

    /// Evaluate the selector into a package set without staging a goal
    pub fn matches(&self) -> PackageSet {
        let mut query = Query::new(self.sack);
        if let Some(ref pkgs) = self.pkgs {
            let _ = query.add_pkg_filter(Keyname::Pkg, cmp::EQ, pkgs);
        }
        for (keyname, filter) in [
            (Keyname::Name, &self.name),
            (Keyname::Provides, &self.provides),
            (Keyname::File, &self.file),
            (Keyname::Arch, &self.arch),
            (Keyname::Evr, &self.evr),
            (Keyname::Version, &self.version),
            (Keyname::Reponame, &self.reponame),
        ] {
            if let Some(f) = filter {
                for m in &f.matches {
                    let _ = query.add_str_filter(keyname, f.cmp_type, m);
                }
            }
        }
        query.result_set()
    }

    /// Lower the selector into job entries, OR-ing `solver_action` into
    /// each tuple's flags
    ///
    /// An empty selector lowers to an empty job. Optional filters with
    /// no required filter are a `BadSelector`. A filter that simply
    /// matches nothing aborts the lowering with an empty job rather
    /// than an error.
    pub fn to_job(&self, solver_action: u32, out: &mut IdQueue) -> Result<()> {
        if !self.any_required() {
            if self.any_optional() {
                return Err(Error::BadSelector(
                    "no name or provides or file in the selector".to_string(),
                ));
            }
            return Ok(());
        }

        self.sack.recompute_considered();
        self.sack.make_provides_ready();

        let mut staged = IdQueue::new();
        let lowered = self.filter_pkgs_to_job(&mut staged)?
            && self.filter_name_to_job(&mut staged)?
            && self.filter_file_to_job(&mut staged)?
            && self.filter_provides_to_job(&mut staged)?
            && self.filter_arch_to_job(&mut staged)?
            && self.filter_evr_to_job(&mut staged)?
            && self.filter_reponame_to_job(&mut staged)?;
        if !lowered {
            // no match: the job stays empty
            return Ok(());
        }

        for (flags, id) in staged.pairs() {
            out.push_pair(flags | solver_action, id);
        }
        Ok(())
    }

    fn filter_pkgs_to_job(&self, staged: &mut IdQueue) -> Result<bool> {
        if let Some(ref pkgs) = self.pkgs {
            let ids: Vec<Id> = pkgs.iter().collect();
            let what = self.sack.pool().intern_one_of(ids);
            staged.push_pair(job::SOLVABLE_ONE_OF | job::SETARCH | job::SETEVR, what);
        }
        Ok(true)
    }

    fn filter_name_to_job(&self, staged: &mut IdQueue) -> Result<bool> {
        let Some(ref f) = self.name else {
            return Ok(true);
        };
        let pool = self.sack.pool();
        let name = f.single()?;
        match f.cmp_type {
            cmp::EQ => {
                if let Some(id) = pool.str2id(name) {
                    let dep = pool.intern_reldep(Reldep::name_only(id));
                    staged.push_pair(job::SOLVABLE_NAME, dep);
                }
            }
            cmp::GLOB => {
                let Ok(pattern) = Pattern::new(name) else {
                    return Ok(false);
                };
                let mut seen: Vec<Id> = Vec::new();
                for id in pool.pkg_ids() {
                    let name_id = pool.solvable(id).name;
                    if seen.contains(&name_id) || !pattern.matches(pool.id2str(name_id)) {
                        continue;
                    }
                    seen.push(name_id);
                    let dep = pool.intern_reldep(Reldep::name_only(name_id));
                    if !solver::job_has(staged, job::SOLVABLE_NAME, dep) {
                        staged.push_pair(job::SOLVABLE_NAME, dep);
                    }
                }
            }
            _ => {
                return Err(Error::BadSelector(
                    "incorrect comparison type".to_string(),
                ))
            }
        }
        Ok(true)
    }

    fn filter_file_to_job(&self, staged: &mut IdQueue) -> Result<bool> {
        let Some(ref f) = self.file else {
            return Ok(true);
        };
        let path = f.single()?;
        let use_glob = f.cmp_type == cmp::GLOB;
        Ok(solver::selection_make_filelist(self.sack, path, use_glob, staged) != 0)
    }

    fn filter_provides_to_job(&self, staged: &mut IdQueue) -> Result<bool> {
        let Some(ref f) = self.provides else {
            return Ok(true);
        };
        let pool = self.sack.pool();
        let spec = f.single()?;
        match f.cmp_type {
            cmp::EQ => match Reldep::parse_lookup(pool, spec) {
                Some(dep) => {
                    let id = pool.intern_reldep(dep);
                    staged.push_pair(job::SOLVABLE_PROVIDES, id);
                }
                None => return Ok(false),
            },
            cmp::GLOB => {
                let mut deps = crate::dep::ReldepList::new();
                if !deps.add_with_glob(pool, spec) {
                    return Ok(false);
                }
                for dep in deps.iter() {
                    if !solver::job_has(staged, job::SOLVABLE_PROVIDES, dep) {
                        staged.push_pair(job::SOLVABLE_PROVIDES, dep);
                    }
                }
            }
            _ => {
                return Err(Error::BadSelector(
                    "incorrect comparison type".to_string(),
                ))
            }
        }
        Ok(true)
    }

    /// Rewrite staged name entries to carry an arch constraint
    fn filter_arch_to_job(&self, staged: &mut IdQueue) -> Result<bool> {
        let Some(ref f) = self.arch else {
            return Ok(true);
        };
        let pool = self.sack.pool();
        let arch = f.single()?;
        let Some(arch_id) = pool.str2id(arch) else {
            return Ok(false);
        };
        for (flags, operand) in staged.pairs_mut() {
            if *flags & job::SELECT_MASK != job::SOLVABLE_NAME {
                continue;
            }
            let mut dep = pool.reldep(*operand);
            dep.arch = Some(arch_id);
            *operand = pool.intern_reldep(dep);
            *flags |= job::SETARCH;
        }
        Ok(true)
    }

    /// Rewrite staged name entries to pin an exact EVR (or EV)
    fn filter_evr_to_job(&self, staged: &mut IdQueue) -> Result<bool> {
        let (f, constraint) = match (&self.evr, &self.version) {
            (Some(f), _) => (f, job::SETEVR),
            (None, Some(f)) => (f, job::SETEV),
            (None, None) => return Ok(true),
        };
        let pool = self.sack.pool();
        let evr = f.single()?;
        for (flags, operand) in staged.pairs_mut() {
            if *flags & job::SELECT_MASK != job::SOLVABLE_NAME {
                continue;
            }
            let mut dep = pool.reldep(*operand);
            dep.flags = REL_EQ;
            dep.evr = Some(evr.into());
            *operand = pool.intern_reldep(dep);
            *flags |= constraint;
        }
        Ok(true)
    }

    fn filter_reponame_to_job(&self, staged: &mut IdQueue) -> Result<bool> {
        let Some(ref f) = self.reponame else {
            return Ok(true);
        };
        let pool = self.sack.pool();
        let name = f.single()?;
        let repos: Vec<Id> = pool
            .repos()
            .filter(|(_, r)| r.name == name)
            .map(|(id, _)| id)
            .collect();
        solver::selection_filter_repos(self.sack, staged, &repos);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_sack() -> Sack {
        let mut sack = Sack::new();
        sack.add_system_repo();
        let main = sack.add_repo("main", 0);
        let extra = sack.add_repo("extra", 10);
        sack.add_package(main, "vim", "9.0-1", "x86_64");
        sack.add_package(main, "vim", "9.0-1", "i686");
        sack.add_package(extra, "vim", "9.1-1", "x86_64");
        sack.add_package(main, "emacs", "29-1", "x86_64");
        sack
    }

    fn selected(sack: &Sack, selector: &Selector<'_>, action: u32) -> Vec<Id> {
        let mut q = IdQueue::new();
        selector.to_job(action, &mut q).unwrap();
        let mut out = Vec::new();
        for (flags, operand) in q.pairs() {
            out.extend(crate::solver::select_ids(sack, flags, operand));
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    #[test]
    fn test_empty_selector_is_empty_job() {
        let sack = test_sack();
        let selector = Selector::new(&sack);
        let mut q = IdQueue::new();
        selector.to_job(job::INSTALL, &mut q).unwrap();
        assert!(q.is_empty());
    }

    #[test]
    fn test_optional_without_required_fails() {
        let sack = test_sack();
        let mut selector = Selector::new(&sack);
        selector.set(Keyname::Arch, cmp::EQ, "x86_64").unwrap();
        let mut q = IdQueue::new();
        assert!(matches!(
            selector.to_job(job::INSTALL, &mut q),
            Err(Error::BadSelector(_))
        ));
    }

    #[test]
    fn test_name_selection() {
        let sack = test_sack();
        let mut selector = Selector::new(&sack);
        selector.set(Keyname::Name, cmp::EQ, "vim").unwrap();
        let ids = selected(&sack, &selector, job::INSTALL);
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_name_with_arch_refinement() {
        let sack = test_sack();
        let mut selector = Selector::new(&sack);
        selector.set(Keyname::Name, cmp::EQ, "vim").unwrap();
        selector.set(Keyname::Arch, cmp::EQ, "i686").unwrap();
        let ids = selected(&sack, &selector, job::INSTALL);
        assert_eq!(ids.len(), 1);
        assert_eq!(sack.pool().id2str(sack.pool().solvable(ids[0]).arch), "i686");
    }

    #[test]
    fn test_name_with_evr_refinement() {
        let sack = test_sack();
        let mut selector = Selector::new(&sack);
        selector.set(Keyname::Name, cmp::EQ, "vim").unwrap();
        selector.set(Keyname::Evr, cmp::EQ, "9.1-1").unwrap();
        let ids = selected(&sack, &selector, job::INSTALL);
        assert_eq!(ids.len(), 1);
        assert_eq!(
            sack.pool().id2str(sack.pool().solvable(ids[0]).evr),
            "9.1-1"
        );
    }

    #[test]
    fn test_glob_name_selection() {
        let sack = test_sack();
        let mut selector = Selector::new(&sack);
        selector.set(Keyname::Name, cmp::GLOB, "v*").unwrap();
        let ids = selected(&sack, &selector, job::INSTALL);
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_reponame_filtering() {
        let sack = test_sack();
        let mut selector = Selector::new(&sack);
        selector.set(Keyname::Name, cmp::EQ, "vim").unwrap();
        selector.set(Keyname::Reponame, cmp::EQ, "extra").unwrap();
        let ids = selected(&sack, &selector, job::INSTALL);
        assert_eq!(ids.len(), 1);
        let repo = sack.pool().solvable(ids[0]).repo;
        assert_eq!(sack.pool().repo(repo).name, "extra");
    }

    #[test]
    fn test_bad_comparison_rejected() {
        let sack = test_sack();
        let mut selector = Selector::new(&sack);
        assert!(selector.set(Keyname::Reponame, cmp::GLOB, "ex*").is_err());
        assert!(selector.set(Keyname::Arch, cmp::GT, "x86_64").is_err());
        assert!(selector.set(Keyname::Summary, cmp::EQ, "text").is_err());
    }

    #[test]
    fn test_unknown_name_lowers_to_empty() {
        let sack = test_sack();
        let mut selector = Selector::new(&sack);
        selector.set(Keyname::Name, cmp::EQ, "no-such-package").unwrap();
        let mut q = IdQueue::new();
        selector.to_job(job::INSTALL, &mut q).unwrap();
        assert!(q.is_empty());
    }

    #[test]
    fn test_selector_matches() {
        let sack = test_sack();
        let mut selector = Selector::new(&sack);
        selector.set(Keyname::Name, cmp::EQ, "emacs").unwrap();
        let set = selector.matches();
        assert_eq!(set.len(), 1);
    }
}
