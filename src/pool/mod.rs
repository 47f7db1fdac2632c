// src/pool/mod.rs

//! Package pool: the arena every other component indexes into
//!
//! The pool assigns a dense positive integer id to every package
//! candidate (solvable) and owns the interned strings, interned
//! dependency expressions (reldeps), and repositories they point at.
//! Higher components (queries, selectors, goals) store only ids and a
//! borrowed pool reference; the pool itself is immutable during query
//! evaluation, with interior mutability backing the lazy provider index
//! and the considered bitmap. The core is single-threaded by contract,
//! so `RefCell` is sufficient.

pub mod evr;

use crate::set::PackageSet;
use std::cell::{Ref, RefCell};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

/// Dense identifier shared by solvables, interned strings and reldeps
/// (each in its own id space); 0 is never a valid id.
pub type Id = u32;

pub const ID_NULL: Id = 0;

/// Relational operator bits carried by a reldep
pub const REL_EQ: u32 = 1 << 0;
pub const REL_GT: u32 = 1 << 1;
pub const REL_LT: u32 = 1 << 2;

/// A dependency expression: a name, optionally constrained by an
/// operator and EVR, optionally pinned to an architecture (job
/// rewriting uses the arch slot; plain package metadata never does).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reldep {
    pub name: Id,
    pub flags: u32,
    pub evr: Option<Box<str>>,
    pub arch: Option<Id>,
}

impl Reldep {
    pub fn name_only(name: Id) -> Self {
        Self {
            name,
            flags: 0,
            evr: None,
            arch: None,
        }
    }

    pub fn with_evr(name: Id, flags: u32, evr: &str) -> Self {
        Self {
            name,
            flags,
            evr: Some(evr.into()),
            arch: None,
        }
    }
}

/// One repository; higher priority wins ties during selection
#[derive(Debug, Clone)]
pub struct Repo {
    pub name: String,
    pub priority: i32,
}

/// The seven-plus-one relation arrays attached to a solvable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepKind {
    Provides,
    Requires,
    Conflicts,
    Obsoletes,
    Recommends,
    Suggests,
    Supplements,
    Enhances,
}

/// A single package candidate
#[derive(Debug, Clone)]
pub struct Solvable {
    pub name: Id,
    pub evr: Id,
    pub arch: Id,
    pub repo: Id,
    pub provides: Vec<Id>,
    pub requires: Vec<Id>,
    pub conflicts: Vec<Id>,
    pub obsoletes: Vec<Id>,
    pub recommends: Vec<Id>,
    pub suggests: Vec<Id>,
    pub supplements: Vec<Id>,
    pub enhances: Vec<Id>,
    pub files: Vec<Box<str>>,
    pub description: Option<Box<str>>,
    pub summary: Option<Box<str>>,
    pub url: Option<Box<str>>,
    pub sourcerpm: Option<Box<str>>,
    pub location: Option<Box<str>>,
    pub buildtime: u64,
}

impl Solvable {
    pub fn deps(&self, kind: DepKind) -> &[Id] {
        match kind {
            DepKind::Provides => &self.provides,
            DepKind::Requires => &self.requires,
            DepKind::Conflicts => &self.conflicts,
            DepKind::Obsoletes => &self.obsoletes,
            DepKind::Recommends => &self.recommends,
            DepKind::Suggests => &self.suggests,
            DepKind::Supplements => &self.supplements,
            DepKind::Enhances => &self.enhances,
        }
    }
}

#[derive(Default)]
struct ProvidesIndex {
    /// provide name id → solvable ids carrying a provide with that name
    by_name: HashMap<Id, Vec<Id>>,
    /// file path → solvable ids owning that file
    by_file: HashMap<Box<str>, Vec<Id>>,
}

/// The package universe
pub struct Pool {
    strings: Vec<Box<str>>,
    string_ids: HashMap<Box<str>, Id>,
    solvables: Vec<Solvable>,
    repos: Vec<Repo>,
    installed_repo: Option<Id>,
    reldeps: RefCell<Vec<Reldep>>,
    reldep_ids: RefCell<HashMap<Reldep, Id>>,
    oneof_sets: RefCell<Vec<Vec<Id>>>,
    provides_index: RefCell<Option<ProvidesIndex>>,
    pub(crate) considered: RefCell<Option<PackageSet>>,
    /// when false, obsoletes only match providers whose name matches
    pub obsolete_uses_provides: bool,
}

impl Default for Pool {
    fn default() -> Self {
        Self::new()
    }
}

impl Pool {
    pub fn new() -> Self {
        let mut pool = Self {
            strings: Vec::new(),
            string_ids: HashMap::new(),
            solvables: Vec::new(),
            repos: Vec::new(),
            installed_repo: None,
            reldeps: RefCell::new(Vec::new()),
            reldep_ids: RefCell::new(HashMap::new()),
            oneof_sets: RefCell::new(Vec::new()),
            provides_index: RefCell::new(None),
            considered: RefCell::new(None),
            obsolete_uses_provides: true,
        };
        // id 0 is reserved in every id space
        pool.strings.push("".into());
        pool.solvables.push(Solvable {
            name: ID_NULL,
            evr: ID_NULL,
            arch: ID_NULL,
            repo: ID_NULL,
            provides: Vec::new(),
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
        });
        pool.repos.push(Repo {
            name: String::new(),
            priority: 0,
        });
        pool.reldeps.get_mut().push(Reldep::name_only(ID_NULL));
        pool.oneof_sets.get_mut().push(Vec::new());
        pool
    }

    // ---- strings -------------------------------------------------------

    /// Intern a string; only callable while the pool is being built
    pub fn str2id_create(&mut self, s: &str) -> Id {
        if let Some(&id) = self.string_ids.get(s) {
            return id;
        }
        let id = self.strings.len() as Id;
        self.strings.push(s.into());
        self.string_ids.insert(s.into(), id);
        id
    }

    /// Look up an interned string without creating it
    pub fn str2id(&self, s: &str) -> Option<Id> {
        self.string_ids.get(s).copied()
    }

    pub fn id2str(&self, id: Id) -> &str {
        &self.strings[id as usize]
    }

    // ---- repos ---------------------------------------------------------

    pub fn add_repo(&mut self, name: &str, priority: i32) -> Id {
        let id = self.repos.len() as Id;
        self.repos.push(Repo {
            name: name.to_string(),
            priority,
        });
        id
    }

    pub fn repo(&self, id: Id) -> &Repo {
        &self.repos[id as usize]
    }

    /// All real repos with their ids
    pub fn repos(&self) -> impl Iterator<Item = (Id, &Repo)> {
        self.repos
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, r)| (i as Id, r))
    }

    pub fn set_installed_repo(&mut self, repo: Id) {
        self.installed_repo = Some(repo);
    }

    pub fn installed_repo(&self) -> Option<Id> {
        self.installed_repo
    }

    pub fn repo_priority(&self, solvable: Id) -> i32 {
        self.repos[self.solvables[solvable as usize].repo as usize].priority
    }

    // ---- solvables -----------------------------------------------------

    pub fn add_solvable(&mut self, solvable: Solvable) -> Id {
        let id = self.solvables.len() as Id;
        self.solvables.push(solvable);
        // any structural change invalidates the lazy caches
        *self.provides_index.borrow_mut() = None;
        *self.considered.borrow_mut() = None;
        id
    }

    pub fn solvable(&self, id: Id) -> &Solvable {
        &self.solvables[id as usize]
    }

    pub(crate) fn solvable_mut(&mut self, id: Id) -> &mut Solvable {
        *self.provides_index.borrow_mut() = None;
        &mut self.solvables[id as usize]
    }

    pub fn nsolvables(&self) -> usize {
        self.solvables.len()
    }

    /// Ids of all real package solvables
    pub fn pkg_ids(&self) -> impl Iterator<Item = Id> + '_ {
        (1..self.solvables.len()).map(|i| i as Id)
    }

    pub fn is_installed(&self, id: Id) -> bool {
        self.installed_repo == Some(self.solvables[id as usize].repo)
    }

    pub fn is_considered(&self, id: Id) -> bool {
        match self.considered.borrow().as_ref() {
            Some(map) => map.has(id),
            None => true,
        }
    }

    /// Canonical `name-evr.arch` rendering
    pub fn solvid2str(&self, id: Id) -> String {
        let s = self.solvable(id);
        format!(
            "{}-{}.{}",
            self.id2str(s.name),
            self.id2str(s.evr),
            self.id2str(s.arch)
        )
    }

    /// `name-[epoch:]evr.arch` with the epoch forced present or absent,
    /// used when matching user-supplied NEVRA patterns
    pub fn solvid2str_epoch(&self, id: Id, with_epoch: bool) -> String {
        let s = self.solvable(id);
        let evr = self.id2str(s.evr);
        let has_epoch = evr.contains(':');
        let evr_out: String = match (has_epoch, with_epoch) {
            (false, true) => format!("0:{}", evr),
            (true, false) => evr[evr.find(':').unwrap() + 1..].to_string(),
            _ => evr.to_string(),
        };
        format!("{}-{}.{}", self.id2str(s.name), evr_out, self.id2str(s.arch))
    }

    // ---- reldeps -------------------------------------------------------

    pub fn intern_reldep(&self, dep: Reldep) -> Id {
        if let Some(&id) = self.reldep_ids.borrow().get(&dep) {
            return id;
        }
        let mut reldeps = self.reldeps.borrow_mut();
        let id = reldeps.len() as Id;
        reldeps.push(dep.clone());
        self.reldep_ids.borrow_mut().insert(dep, id);
        id
    }

    pub fn reldep(&self, id: Id) -> Reldep {
        self.reldeps.borrow()[id as usize].clone()
    }

    /// Human rendering of a reldep, e.g. `libc >= 2.34`
    pub fn dep2str(&self, id: Id) -> String {
        let dep = self.reldep(id);
        let mut out = self.id2str(dep.name).to_string();
        if let Some(arch) = dep.arch {
            out.push('.');
            out.push_str(self.id2str(arch));
        }
        if dep.flags != 0 {
            let op = match (
                dep.flags & REL_LT != 0,
                dep.flags & REL_GT != 0,
                dep.flags & REL_EQ != 0,
            ) {
                (true, false, true) => "<=",
                (false, true, true) => ">=",
                (true, false, false) => "<",
                (false, true, false) => ">",
                (false, false, true) => "=",
                _ => "<>",
            };
            out.push(' ');
            out.push_str(op);
            if let Some(ref evr) = dep.evr {
                out.push(' ');
                out.push_str(evr);
            }
        }
        out
    }

    // ---- one-of selections --------------------------------------------

    /// Intern an explicit solvable set for `SOLVABLE_ONE_OF` job entries
    pub fn intern_one_of(&self, ids: Vec<Id>) -> Id {
        let mut sets = self.oneof_sets.borrow_mut();
        sets.push(ids);
        (sets.len() - 1) as Id
    }

    pub fn one_of(&self, id: Id) -> Ref<'_, Vec<Id>> {
        Ref::map(self.oneof_sets.borrow(), |sets| &sets[id as usize])
    }

    // ---- EVR comparison -----------------------------------------------

    /// Literal EVR ordering between two interned EVRs; dependency
    /// matching goes through `match_nevr`/`match_dep` instead, where a
    /// missing release is a wildcard
    pub fn evrcmp(&self, a: Id, b: Id) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }
        evr::compare_evr(self.id2str(a), self.id2str(b))
    }

    pub fn evrcmp_str(&self, a: Id, b: &str) -> Ordering {
        evr::compare_evr(self.id2str(a), b)
    }

    // ---- provider walking ---------------------------------------------

    /// Build the provider index if it is stale
    pub fn make_provides_ready(&self) {
        if self.provides_index.borrow().is_some() {
            return;
        }
        let mut index = ProvidesIndex::default();
        for id in self.pkg_ids() {
            let s = self.solvable(id);
            for &p in &s.provides {
                let name = self.reldeps.borrow()[p as usize].name;
                index.by_name.entry(name).or_default().push(id);
            }
            for f in &s.files {
                index.by_file.entry(f.clone()).or_default().push(id);
            }
        }
        debug!(
            names = index.by_name.len(),
            files = index.by_file.len(),
            "provider index rebuilt"
        );
        *self.provides_index.borrow_mut() = Some(index);
    }

    /// Solvables providing `dep` (file deps walk the file lists)
    pub fn whatprovides(&self, dep: Id) -> Vec<Id> {
        self.make_provides_ready();
        let dep = self.reldep(dep);
        let index = self.provides_index.borrow();
        let index = index.as_ref().expect("provider index just built");

        let dep_name = self.id2str(dep.name);
        if dep_name.starts_with('/') {
            return index.by_file.get(dep_name).cloned().unwrap_or_default();
        }

        let mut out = Vec::new();
        if let Some(candidates) = index.by_name.get(&dep.name) {
            for &id in candidates {
                if let Some(arch) = dep.arch {
                    if self.solvable(id).arch != arch {
                        continue;
                    }
                }
                let provided = self
                    .solvable(id)
                    .provides
                    .iter()
                    .any(|&p| self.intersect_deps(&dep, &self.reldep(p)));
                if provided {
                    out.push(id);
                }
            }
        }
        out
    }

    /// Solvables owning a file matching `path` (exact match)
    pub fn whatprovides_file(&self, path: &str) -> Vec<Id> {
        self.make_provides_ready();
        let index = self.provides_index.borrow();
        index
            .as_ref()
            .expect("provider index just built")
            .by_file
            .get(path)
            .cloned()
            .unwrap_or_default()
    }

    /// True when the ranges of two same-name deps can both be satisfied
    pub fn intersect_deps(&self, a: &Reldep, b: &Reldep) -> bool {
        if a.name != b.name {
            return false;
        }
        if a.flags == 0 || b.flags == 0 {
            return true;
        }
        let (Some(ref ea), Some(ref eb)) = (&a.evr, &b.evr) else {
            return true;
        };
        match evr::compare_evr_wildcard(ea, eb) {
            Ordering::Less => a.flags & REL_GT != 0 || b.flags & REL_LT != 0,
            Ordering::Greater => a.flags & REL_LT != 0 || b.flags & REL_GT != 0,
            Ordering::Equal => {
                (a.flags & REL_EQ != 0 && b.flags & REL_EQ != 0)
                    || (a.flags & REL_GT != 0 && b.flags & REL_GT != 0)
                    || (a.flags & REL_LT != 0 && b.flags & REL_LT != 0)
            }
        }
    }

    /// Does `dep` match this concrete solvable by name and EVR range? A
    /// dep that omits the release matches every release of its version.
    pub fn match_nevr(&self, solvable: Id, dep: &Reldep) -> bool {
        let s = self.solvable(solvable);
        if s.name != dep.name {
            return false;
        }
        if dep.flags == 0 {
            return true;
        }
        let Some(ref evr) = dep.evr else { return true };
        match evr::compare_evr_wildcard(self.id2str(s.evr), evr) {
            Ordering::Less => dep.flags & REL_LT != 0,
            Ordering::Greater => dep.flags & REL_GT != 0,
            Ordering::Equal => dep.flags & REL_EQ != 0,
        }
    }

    /// Do two interned deps overlap (the `pool_match_dep` contract)?
    pub fn match_dep(&self, a: Id, b: Id) -> bool {
        self.intersect_deps(&self.reldep(a), &self.reldep(b))
    }

    // ---- upgrade direction --------------------------------------------

    fn arch_compatible(&self, a: Id, b: Id) -> bool {
        a == b || self.id2str(a) == "noarch" || self.id2str(b) == "noarch"
    }

    /// The installed solvable that installing `id` would upgrade, if any
    pub fn what_upgrades(&self, id: Id) -> Option<Id> {
        self.updown_target(id, Ordering::Greater)
    }

    /// The installed solvable that installing `id` would downgrade, if any
    pub fn what_downgrades(&self, id: Id) -> Option<Id> {
        self.updown_target(id, Ordering::Less)
    }

    fn updown_target(&self, id: Id, wanted: Ordering) -> Option<Id> {
        let installed_repo = self.installed_repo?;
        let s = self.solvable(id);
        if s.repo == installed_repo {
            return None;
        }
        // compare against the best installed copy of the same name
        let mut best: Option<Id> = None;
        for other in self.pkg_ids() {
            let o = self.solvable(other);
            if o.repo != installed_repo
                || o.name != s.name
                || !self.arch_compatible(o.arch, s.arch)
            {
                continue;
            }
            match best {
                Some(b) if self.evrcmp(o.evr, self.solvable(b).evr) != Ordering::Greater => {}
                _ => best = Some(other),
            }
        }
        let best = best?;
        (self.evrcmp(s.evr, self.solvable(best).evr) == wanted).then_some(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dep(pool: &mut Pool, name: &str, flags: u32, evr: Option<&str>) -> Reldep {
        let name = pool.str2id_create(name);
        Reldep {
            name,
            flags,
            evr: evr.map(Into::into),
            arch: None,
        }
    }

    #[test]
    fn test_string_interning() {
        let mut pool = Pool::new();
        let a = pool.str2id_create("glibc");
        let b = pool.str2id_create("glibc");
        assert_eq!(a, b);
        assert_eq!(pool.id2str(a), "glibc");
        assert_eq!(pool.str2id("nothere"), None);
    }

    #[test]
    fn test_intersect_deps_ranges() {
        let mut pool = Pool::new();
        let ge2 = dep(&mut pool, "libc", REL_GT | REL_EQ, Some("2.0"));
        let lt3 = dep(&mut pool, "libc", REL_LT, Some("3.0"));
        let eq1 = dep(&mut pool, "libc", REL_EQ, Some("1.0"));
        let any = dep(&mut pool, "libc", 0, None);

        assert!(pool.intersect_deps(&ge2, &lt3));
        assert!(!pool.intersect_deps(&ge2, &eq1));
        assert!(pool.intersect_deps(&any, &eq1));

        let other = dep(&mut pool, "zlib", 0, None);
        assert!(!pool.intersect_deps(&any, &other));
    }

    #[test]
    fn test_dep2str() {
        let mut pool = Pool::new();
        let d = dep(&mut pool, "libc", REL_GT | REL_EQ, Some("2.34"));
        let id = pool.intern_reldep(d);
        assert_eq!(pool.dep2str(id), "libc >= 2.34");

        let bare = dep(&mut pool, "bash", 0, None);
        let id = pool.intern_reldep(bare);
        assert_eq!(pool.dep2str(id), "bash");
    }
}
