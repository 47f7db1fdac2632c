// src/sack.rs

//! The sack: pool ownership plus solving policy
//!
//! A `Sack` owns the package pool together with the policy state the
//! query and goal layers consult: the install-only package classes and
//! their limit, the running kernel, vendor-change policy, user and
//! modular excludes, and the cached all-packages bitmap. The considered
//! bitmap is recomputed through the entry points here; every evaluator
//! that needs excludes applied or providers indexed calls them eagerly.

use crate::advisory::Advisory;
use crate::dep::ReldepList;
use crate::error::Result;
use crate::pool::{DepKind, Id, Pool, Reldep, Solvable};
use crate::set::PackageSet;
use std::cell::RefCell;
use tracing::debug;

/// Which excludes a query applies when initializing its universe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExcludeFlags {
    /// user excludes and modular excludes both apply (the default)
    #[default]
    ApplyExcludes,
    /// no excludes apply
    IgnoreExcludes,
    /// only modular excludes apply
    IgnoreRegularExcludes,
    /// only user excludes apply
    IgnoreModularExcludes,
}

/// Pool plus policy
pub struct Sack {
    pool: Pool,
    advisories: Vec<Advisory>,
    installonly: ReldepList,
    installonly_limit: u32,
    running_kernel: Option<Id>,
    allow_vendor_change: bool,
    excludes: PackageSet,
    module_excludes: PackageSet,
    pkg_solvables: RefCell<Option<(PackageSet, usize)>>,
}

impl Default for Sack {
    fn default() -> Self {
        Self::new()
    }
}

impl Sack {
    pub fn new() -> Self {
        Self {
            pool: Pool::new(),
            advisories: Vec::new(),
            installonly: ReldepList::new(),
            installonly_limit: 0,
            running_kernel: None,
            allow_vendor_change: true,
            excludes: PackageSet::new(),
            module_excludes: PackageSet::new(),
            pkg_solvables: RefCell::new(None),
        }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut Pool {
        *self.pkg_solvables.borrow_mut() = None;
        &mut self.pool
    }

    // ---- building the universe ----------------------------------------

    pub fn add_repo(&mut self, name: &str, priority: i32) -> Id {
        self.pool.add_repo(name, priority)
    }

    /// Add the installed-system repo and mark it installed
    pub fn add_system_repo(&mut self) -> Id {
        let id = self.pool.add_repo("@System", 0);
        self.pool.set_installed_repo(id);
        id
    }

    /// Add a package; a `name = evr` self-provide is attached the way
    /// rpm metadata always carries one
    pub fn add_package(&mut self, repo: Id, name: &str, evr: &str, arch: &str) -> Id {
        *self.pkg_solvables.borrow_mut() = None;
        let name_id = self.pool.str2id_create(name);
        let evr_id = self.pool.str2id_create(evr);
        let arch_id = self.pool.str2id_create(arch);
        let self_provide = self
            .pool
            .intern_reldep(Reldep::with_evr(name_id, crate::pool::REL_EQ, evr));
        self.pool.add_solvable(Solvable {
            name: name_id,
            evr: evr_id,
            arch: arch_id,
            repo,
            provides: vec![self_provide],
            requires: Vec::new(),
            conflicts: Vec::new(),
            obsoletes: Vec::new(),
            recommends: Vec::new(),
            suggests: Vec::new(),
            supplements: Vec::new(),
            enhances: Vec::new(),
            files: Vec::new(),
            description: None,
            summary: None,
            url: None,
            sourcerpm: None,
            location: None,
            buildtime: 0,
        })
    }

    /// Attach a dependency spec to a package's relation array
    pub fn add_dep(&mut self, pkg: Id, kind: DepKind, spec: &str) -> Result<()> {
        let dep = Reldep::parse_create(&mut self.pool, spec)?;
        let dep_id = self.pool.intern_reldep(dep);
        let s = self.pool.solvable_mut(pkg);
        match kind {
            DepKind::Provides => s.provides.push(dep_id),
            DepKind::Requires => s.requires.push(dep_id),
            DepKind::Conflicts => s.conflicts.push(dep_id),
            DepKind::Obsoletes => s.obsoletes.push(dep_id),
            DepKind::Recommends => s.recommends.push(dep_id),
            DepKind::Suggests => s.suggests.push(dep_id),
            DepKind::Supplements => s.supplements.push(dep_id),
            DepKind::Enhances => s.enhances.push(dep_id),
        }
        Ok(())
    }

    pub fn add_file(&mut self, pkg: Id, path: &str) {
        self.pool.solvable_mut(pkg).files.push(path.into());
    }

    pub fn set_description(&mut self, pkg: Id, text: &str) {
        self.pool.solvable_mut(pkg).description = Some(text.into());
    }

    pub fn set_summary(&mut self, pkg: Id, text: &str) {
        self.pool.solvable_mut(pkg).summary = Some(text.into());
    }

    pub fn set_url(&mut self, pkg: Id, url: &str) {
        self.pool.solvable_mut(pkg).url = Some(url.into());
    }

    pub fn set_sourcerpm(&mut self, pkg: Id, srpm: &str) {
        self.pool.solvable_mut(pkg).sourcerpm = Some(srpm.into());
    }

    pub fn set_location(&mut self, pkg: Id, location: &str) {
        self.pool.solvable_mut(pkg).location = Some(location.into());
    }

    pub fn set_buildtime(&mut self, pkg: Id, buildtime: u64) {
        self.pool.solvable_mut(pkg).buildtime = buildtime;
    }

    pub fn add_advisory(&mut self, advisory: Advisory) {
        self.advisories.push(advisory);
    }

    pub fn advisories(&self) -> &[Advisory] {
        &self.advisories
    }

    // ---- policy --------------------------------------------------------

    /// Declare an install-only package class (e.g. `kernel`)
    pub fn add_installonly(&mut self, spec: &str) -> Result<()> {
        let dep = Reldep::parse_create(&mut self.pool, spec)?;
        let id = self.pool.intern_reldep(dep);
        self.installonly.push(id);
        Ok(())
    }

    pub fn installonly(&self) -> &ReldepList {
        &self.installonly
    }

    pub fn set_installonly_limit(&mut self, limit: u32) {
        self.installonly_limit = limit;
    }

    pub fn installonly_limit(&self) -> u32 {
        self.installonly_limit
    }

    pub fn set_running_kernel(&mut self, id: Option<Id>) {
        self.running_kernel = id;
    }

    pub fn running_kernel(&self) -> Option<Id> {
        self.running_kernel
    }

    pub fn set_allow_vendor_change(&mut self, allow: bool) {
        self.allow_vendor_change = allow;
    }

    pub fn allow_vendor_change(&self) -> bool {
        self.allow_vendor_change
    }

    // ---- excludes ------------------------------------------------------

    pub fn add_exclude(&mut self, id: Id) {
        self.excludes.set(id);
        *self.pool.considered.borrow_mut() = None;
    }

    pub fn add_module_exclude(&mut self, id: Id) {
        self.module_excludes.set(id);
        *self.pool.considered.borrow_mut() = None;
    }

    pub fn module_excludes(&self) -> &PackageSet {
        &self.module_excludes
    }

    /// Recompute the pool-wide considered bitmap from current excludes
    pub fn recompute_considered(&self) {
        if self.pool.considered.borrow().is_some() {
            return;
        }
        let mut considered = self.pkg_solvables_set();
        considered.subtract(&self.excludes);
        considered.subtract(&self.module_excludes);
        debug!(considered = considered.len(), "considered bitmap recomputed");
        *self.pool.considered.borrow_mut() = Some(considered);
    }

    /// Flag-specific considered map; `None` means "no mask applies"
    pub fn recompute_considered_map(&self, flags: ExcludeFlags) -> Option<PackageSet> {
        match flags {
            ExcludeFlags::ApplyExcludes => {
                self.recompute_considered();
                self.pool.considered.borrow().clone()
            }
            ExcludeFlags::IgnoreExcludes => None,
            ExcludeFlags::IgnoreRegularExcludes => {
                let mut map = self.pkg_solvables_set();
                map.subtract(&self.module_excludes);
                Some(map)
            }
            ExcludeFlags::IgnoreModularExcludes => {
                let mut map = self.pkg_solvables_set();
                map.subtract(&self.excludes);
                Some(map)
            }
        }
    }

    pub fn make_provides_ready(&self) {
        self.pool.make_provides_ready();
    }

    /// Bitmap of all real package solvables (cached per pool size)
    pub fn pkg_solvables_set(&self) -> PackageSet {
        let nsolvables = self.pool.nsolvables();
        if let Some((ref cached, n)) = *self.pkg_solvables.borrow() {
            if n == nsolvables {
                return cached.clone();
            }
        }
        let set: PackageSet = self.pool.pkg_ids().collect();
        *self.pkg_solvables.borrow_mut() = Some((set.clone(), nsolvables));
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_package_self_provide() {
        let mut sack = Sack::new();
        let repo = sack.add_repo("main", 0);
        let pkg = sack.add_package(repo, "bash", "5.1-1", "x86_64");

        sack.make_provides_ready();
        let dep = Reldep::parse_lookup(sack.pool(), "bash").unwrap();
        let dep = sack.pool().intern_reldep(dep);
        assert_eq!(sack.pool().whatprovides(dep), vec![pkg]);

        let versioned = Reldep::parse_lookup(sack.pool(), "bash >= 5.0").unwrap();
        let versioned = sack.pool().intern_reldep(versioned);
        assert_eq!(sack.pool().whatprovides(versioned), vec![pkg]);
    }

    #[test]
    fn test_considered_excludes() {
        let mut sack = Sack::new();
        let repo = sack.add_repo("main", 0);
        let a = sack.add_package(repo, "a", "1-1", "noarch");
        let b = sack.add_package(repo, "b", "1-1", "noarch");
        sack.add_exclude(b);

        sack.recompute_considered();
        assert!(sack.pool().is_considered(a));
        assert!(!sack.pool().is_considered(b));

        // ignoring excludes lifts the mask entirely
        assert!(sack.recompute_considered_map(ExcludeFlags::IgnoreExcludes).is_none());
        let only_modular = sack
            .recompute_considered_map(ExcludeFlags::IgnoreRegularExcludes)
            .unwrap();
        assert!(only_modular.has(b));
    }

    #[test]
    fn test_installonly_limit_default_disabled() {
        let sack = Sack::new();
        assert_eq!(sack.installonly_limit(), 0);
        assert!(sack.installonly().is_empty());
    }
}
