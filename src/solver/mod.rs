// src/solver/mod.rs

//! Transaction solver
//!
//! Consumes a job queue of (flags, operand) pairs and produces either a
//! transaction or a list of problems made of rule infos. The solver is
//! deterministic and single-shot: candidates are ranked by favor state,
//! repository priority, EVR and id, requirements are walked recursively
//! with rollback on failure, and conflicts/obsoletes/locks are enforced
//! while deciding. Weak dependencies (recommends, supplements) install
//! best-effort after the hard decisions settle.

use crate::pool::{Id, Pool};
use crate::sack::Sack;
use crate::set::{IdQueue, PackageSet};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

/// Job vocabulary: selection modes, actions and modifier bits
pub mod job {
    // selection modes (low byte)
    pub const SOLVABLE: u32 = 0x01;
    pub const SOLVABLE_NAME: u32 = 0x02;
    pub const SOLVABLE_PROVIDES: u32 = 0x03;
    pub const SOLVABLE_ONE_OF: u32 = 0x04;
    pub const SOLVABLE_REPO: u32 = 0x05;
    pub const SOLVABLE_ALL: u32 = 0x06;
    pub const SELECT_MASK: u32 = 0xff;

    // actions (second byte, exclusive)
    pub const INSTALL: u32 = 0x100;
    pub const ERASE: u32 = 0x200;
    pub const UPDATE: u32 = 0x300;
    pub const DISTUPGRADE: u32 = 0x400;
    pub const VERIFY: u32 = 0x500;
    pub const LOCK: u32 = 0x600;
    pub const MULTIVERSION: u32 = 0x700;
    pub const USERINSTALLED: u32 = 0x800;
    pub const ALLOWUNINSTALL: u32 = 0x900;
    pub const FAVOR: u32 = 0xa00;
    pub const DISFAVOR: u32 = 0xb00;
    pub const EXCLUDEFROMWEAK: u32 = 0xc00;
    pub const ACTION_MASK: u32 = 0xff00;

    // modifier bits
    pub const WEAK: u32 = 0x1_0000;
    pub const CLEANDEPS: u32 = 0x2_0000;
    pub const FORCEBEST: u32 = 0x4_0000;
    pub const TARGETED: u32 = 0x8_0000;
    pub const SETEV: u32 = 0x10_0000;
    pub const SETEVR: u32 = 0x20_0000;
    pub const SETARCH: u32 = 0x40_0000;
    pub const SETREPO: u32 = 0x80_0000;
    pub const SETNAME: u32 = 0x100_0000;
}

/// Rule vocabulary reported back through problem infos
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleType {
    DistUpgrade,
    InfArch,
    Update,
    Job,
    JobUnsupported,
    JobNothingProvidesDep,
    JobUnknownPackage,
    JobProvidedBySystem,
    Pkg,
    Best,
    PkgNotInstallable,
    PkgNothingProvidesDep,
    PkgSameName,
    PkgConflicts,
    PkgObsoletes,
    PkgInstalledObsoletes,
    PkgImplicitObsoletes,
    PkgRequires,
    PkgSelfConflict,
    Yumobs,
}

/// Coarse classification of the rule that drove a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleClass {
    Unknown,
    Job,
    Pkg,
    Update,
    Best,
}

/// One (type, source, target, dep) tuple describing a rule
#[derive(Debug, Clone, Copy)]
pub struct RuleInfo {
    pub rule_type: RuleType,
    pub source: Id,
    pub target: Id,
    pub dep: Id,
}

impl RuleInfo {
    fn new(rule_type: RuleType, source: Id, target: Id, dep: Id) -> Self {
        Self {
            rule_type,
            source,
            target,
            dep,
        }
    }
}

/// One unsolvable piece of the job
#[derive(Debug, Clone, Default)]
pub struct Problem {
    pub rules: Vec<RuleInfo>,
}

/// Why a package was decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionKind {
    /// decided directly by a job rule
    ResolveJob,
    /// forced by a unit rule
    UnitRule,
    /// pulled in as a weak dependency
    Weakdep,
    /// erased by dependency cleanup
    CleandepsErase,
    /// decided while resolving dependencies
    Resolve,
}

#[derive(Debug, Clone, Copy)]
pub struct Decision {
    pub kind: DecisionKind,
    pub rule_class: RuleClass,
}

/// How a transaction step classifies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepType {
    Install,
    Reinstall,
    Upgrade,
    Downgrade,
    Erase,
    Obsoleted,
}

#[derive(Debug, Clone, Copy)]
pub struct TransactionStep {
    pub id: Id,
    pub step_type: StepType,
}

/// The materialized result of a successful solve
#[derive(Debug, Clone, Default)]
pub struct Transaction {
    pub steps: Vec<TransactionStep>,
    /// (new, old) pairs for every replacement and obsoletion
    obs_pairs: Vec<(Id, Id)>,
}

impl Transaction {
    /// Ids the given package replaces or obsoletes in this transaction
    pub fn obsoleted_by_package(&self, pkg: Id) -> Vec<Id> {
        self.obs_pairs
            .iter()
            .filter(|&&(new, _)| new == pkg)
            .map(|&(_, old)| old)
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
struct State {
    to_install: Vec<Id>,
    install_set: PackageSet,
    erased: Vec<Id>,
    erased_set: PackageSet,
    /// old installed id → replacing id (same-name replacement)
    replaced: HashMap<Id, Id>,
    /// old installed id → obsoleting id (cross-name obsoletes)
    obsoleted: HashMap<Id, Id>,
    decisions: HashMap<Id, Decision>,
    cleandeps: Vec<Id>,
}

/// A fresh solver is created per goal run
pub struct Solver<'a> {
    sack: &'a Sack,
    pub allow_downgrade: bool,
    pub ignore_recommended: bool,
    pub allow_vendor_change: bool,
    pub keep_orphans: bool,
    pub best_obey_policy: bool,
    pub yum_obsoletes: bool,
    pub urpm_reorder: bool,
    state: State,
    locks: PackageSet,
    favored: PackageSet,
    disfavored: PackageSet,
    multiversion: Vec<Id>,
    userinstalled: PackageSet,
    allow_uninstall: PackageSet,
    exclude_from_weak: PackageSet,
    problems: Vec<Problem>,
    suggested: Vec<Id>,
}

impl<'a> Solver<'a> {
    pub fn new(sack: &'a Sack) -> Self {
        Self {
            sack,
            allow_downgrade: false,
            ignore_recommended: false,
            allow_vendor_change: true,
            keep_orphans: true,
            best_obey_policy: true,
            yum_obsoletes: true,
            urpm_reorder: true,
            state: State::default(),
            locks: PackageSet::new(),
            favored: PackageSet::new(),
            disfavored: PackageSet::new(),
            multiversion: Vec::new(),
            userinstalled: PackageSet::new(),
            allow_uninstall: PackageSet::new(),
            exclude_from_weak: PackageSet::new(),
            problems: Vec::new(),
            suggested: Vec::new(),
        }
    }

    fn pool(&self) -> &'a Pool {
        self.sack.pool()
    }

    // ---- selection -----------------------------------------------------

    fn select(&self, flags: u32, operand: Id) -> Vec<Id> {
        select_ids(self.sack, flags, operand)
    }

    fn is_present(&self, id: Id) -> bool {
        if self.pool().is_installed(id) {
            !self.state.erased_set.has(id)
        } else {
            self.state.install_set.has(id)
        }
    }

    fn present_ids(&self) -> Vec<Id> {
        let pool = self.pool();
        pool.pkg_ids().filter(|&id| self.is_present(id)).collect()
    }

    /// "decision level > 0": the package is part of the end state
    pub fn decision_level_positive(&self, id: Id) -> bool {
        self.is_present(id)
    }

    fn provides_present(&self, dep: Id) -> bool {
        self.pool()
            .whatprovides(dep)
            .into_iter()
            .any(|p| self.is_present(p))
    }

    fn is_multiversion(&self, id: Id) -> bool {
        let pool = self.pool();
        pool.solvable(id)
            .provides
            .iter()
            .any(|&p| self.multiversion.iter().any(|&mv| pool.match_dep(mv, p)))
    }

    fn order_candidates(&self, ids: &mut Vec<Id>) {
        let pool = self.pool();
        ids.sort_by(|&a, &b| {
            let key = |id: Id| (self.disfavored.has(id), !self.favored.has(id));
            key(a)
                .cmp(&key(b))
                .then_with(|| pool.repo_priority(b).cmp(&pool.repo_priority(a)))
                .then_with(|| {
                    pool.evrcmp(pool.solvable(b).evr, pool.solvable(a).evr)
                })
                .then(a.cmp(&b))
        });
    }

    // ---- hard decisions -----------------------------------------------

    /// Install `cand` and everything it requires; on failure the caller
    /// rolls the state back
    fn install_package(
        &mut self,
        cand: Id,
        kind: DecisionKind,
        rule_class: RuleClass,
    ) -> Result<(), Vec<RuleInfo>> {
        let pool = self.pool();
        if self.is_present(cand) {
            return Ok(());
        }
        if self.locks.has(cand) || !pool.is_considered(cand) {
            return Err(vec![RuleInfo::new(RuleType::PkgNotInstallable, cand, 0, 0)]);
        }

        let cand_s = pool.solvable(cand);

        // conflicts of the candidate against the present set
        for &c in &cand_s.conflicts {
            for r in pool.whatprovides(c) {
                if r != cand && self.is_present(r) {
                    return Err(vec![RuleInfo::new(RuleType::PkgConflicts, cand, r, c)]);
                }
            }
        }
        // conflicts of present packages against the candidate
        for r in self.present_ids() {
            for &c in &pool.solvable(r).conflicts {
                let dep = pool.reldep(c);
                if cand_s.provides.iter().any(|&p| {
                    let provide = pool.reldep(p);
                    pool.intersect_deps(&dep, &provide)
                }) {
                    return Err(vec![RuleInfo::new(RuleType::PkgConflicts, r, cand, c)]);
                }
            }
        }

        // same-name replacement (multiversion classes keep old versions)
        let mut replaces: Vec<Id> = Vec::new();
        if !self.is_multiversion(cand) {
            for old in self.present_ids() {
                if old == cand {
                    continue;
                }
                let old_s = pool.solvable(old);
                if old_s.name == cand_s.name && arch_compatible(pool, old_s.arch, cand_s.arch)
                {
                    if self.locks.has(old) {
                        return Err(vec![RuleInfo::new(
                            RuleType::PkgSameName,
                            cand,
                            old,
                            0,
                        )]);
                    }
                    replaces.push(old);
                }
            }
        }

        // obsoletions of installed packages
        let mut obsoletes: Vec<(Id, Id)> = Vec::new();
        for &o in &cand_s.obsoletes {
            let dep = pool.reldep(o);
            for r in pool.whatprovides(o) {
                if !self.is_present(r) || !pool.is_installed(r) || r == cand {
                    continue;
                }
                if !pool.obsolete_uses_provides && !pool.match_nevr(r, &dep) {
                    continue;
                }
                if self.locks.has(r) {
                    return Err(vec![RuleInfo::new(RuleType::PkgObsoletes, cand, r, o)]);
                }
                obsoletes.push((r, o));
            }
        }

        // commit the candidate before walking requires so dependency
        // cycles terminate
        self.state.to_install.push(cand);
        self.state.install_set.set(cand);
        self.state.decisions.insert(cand, Decision { kind, rule_class });
        for old in replaces {
            if pool.is_installed(old) {
                self.state.erased.push(old);
                self.state.erased_set.set(old);
                self.state.replaced.insert(old, cand);
            } else {
                // replacing a queued install: drop it again
                self.state.install_set.remove(old);
                self.state.to_install.retain(|&x| x != old);
            }
        }
        for (old, _dep) in obsoletes {
            self.state.erased.push(old);
            self.state.erased_set.set(old);
            self.state.obsoleted.insert(old, cand);
        }

        // installed dependents of whatever just left must either stay
        // satisfied, be allowed to go, or fail the candidate
        for dependent in self.present_ids() {
            if !pool.is_installed(dependent) {
                continue;
            }
            for &r in &pool.solvable(dependent).requires {
                let dep = pool.reldep(r);
                if pool.id2str(dep.name).starts_with('(') || self.provides_present(r) {
                    continue;
                }
                let lost = pool
                    .whatprovides(r)
                    .into_iter()
                    .any(|p| self.state.erased_set.has(p));
                if !lost {
                    continue;
                }
                if self.allow_uninstall.has(dependent) {
                    self.erase_package(dependent, DecisionKind::Resolve, false)?;
                    break;
                }
                return Err(vec![RuleInfo::new(RuleType::PkgRequires, dependent, 0, r)]);
            }
        }

        // requirements
        let requires = pool.solvable(cand).requires.clone();
        for r in requires {
            let dep = pool.reldep(r);
            if pool.id2str(dep.name).starts_with('(') {
                // rich deps are out of this solver's scope
                continue;
            }
            if self.provides_present(r) {
                continue;
            }
            let mut providers: Vec<Id> = pool
                .whatprovides(r)
                .into_iter()
                .filter(|&p| pool.is_considered(p) && !self.locks.has(p))
                .collect();
            if providers.is_empty() {
                return Err(vec![RuleInfo::new(RuleType::PkgRequires, cand, 0, r)]);
            }
            self.order_candidates(&mut providers);
            let mut errors = Vec::new();
            let mut satisfied = false;
            for p in providers {
                let snapshot = self.state.clone();
                match self.install_package(p, DecisionKind::Resolve, RuleClass::Pkg) {
                    Ok(()) => {
                        satisfied = true;
                        break;
                    }
                    Err(mut rules) => {
                        self.state = snapshot;
                        errors.append(&mut rules);
                    }
                }
            }
            if !satisfied {
                let mut rules = vec![RuleInfo::new(RuleType::PkgRequires, cand, 0, r)];
                rules.extend(errors);
                return Err(rules);
            }
        }
        Ok(())
    }

    /// Erase `id` and cascade over now-broken dependents
    fn erase_package(
        &mut self,
        id: Id,
        kind: DecisionKind,
        clean_deps: bool,
    ) -> Result<(), Vec<RuleInfo>> {
        let pool = self.pool();
        if !pool.is_installed(id) || self.state.erased_set.has(id) {
            return Ok(());
        }
        if self.locks.has(id) {
            return Err(vec![RuleInfo::new(RuleType::Job, id, 0, 0)]);
        }
        self.state.erased.push(id);
        self.state.erased_set.set(id);
        self.state.decisions.insert(
            id,
            Decision {
                kind,
                rule_class: RuleClass::Job,
            },
        );
        if kind == DecisionKind::CleandepsErase {
            self.state.cleandeps.push(id);
        }

        // dependents left without any provider follow the erasure
        let provides: Vec<Id> = pool.solvable(id).provides.clone();
        for dependent in self.present_ids() {
            if !pool.is_installed(dependent) {
                continue;
            }
            for &r in &pool.solvable(dependent).requires {
                let dep = pool.reldep(r);
                if pool.id2str(dep.name).starts_with('(') {
                    continue;
                }
                let was_provided = provides.iter().any(|&p| {
                    let provide = pool.reldep(p);
                    pool.intersect_deps(&dep, &provide)
                });
                if !was_provided || self.provides_present(r) {
                    continue;
                }
                self.erase_package(dependent, DecisionKind::Resolve, clean_deps)?;
                break;
            }
        }

        // dependency cleanup: providers this package needed that nothing
        // present needs anymore and the user never asked for
        if clean_deps {
            let requires: Vec<Id> = pool.solvable(id).requires.clone();
            for r in requires {
                for p in pool.whatprovides(r) {
                    if !pool.is_installed(p)
                        || !self.is_present(p)
                        || self.userinstalled.has(p)
                        || self.locks.has(p)
                    {
                        continue;
                    }
                    let still_needed = self.present_ids().into_iter().any(|other| {
                        other != p
                            && pool.solvable(other).requires.iter().any(|&req| {
                                pool.whatprovides(req).contains(&p)
                            })
                    });
                    if !still_needed {
                        self.erase_package(p, DecisionKind::CleandepsErase, clean_deps)?;
                    }
                }
            }
        }
        Ok(())
    }

    // ---- job processing ------------------------------------------------

    fn do_install(&mut self, flags: u32, operand: Id) {
        let pool = self.pool();
        let weak = flags & job::WEAK != 0;
        let sel = self.select(flags, operand);
        if sel.is_empty() {
            if weak {
                return;
            }
            let rule = match flags & job::SELECT_MASK {
                job::SOLVABLE_PROVIDES => {
                    RuleInfo::new(RuleType::JobNothingProvidesDep, 0, 0, operand)
                }
                _ => RuleInfo::new(RuleType::JobUnknownPackage, 0, 0, operand),
            };
            self.problems.push(Problem { rules: vec![rule] });
            return;
        }

        // an already-present selected package satisfies the job
        if let Some(&present) = sel.iter().find(|&&id| self.is_present(id)) {
            self.state.decisions.entry(present).or_insert(Decision {
                kind: DecisionKind::ResolveJob,
                rule_class: RuleClass::Job,
            });
            return;
        }

        let mut candidates: Vec<Id> = sel
            .into_iter()
            .filter(|&id| !pool.is_installed(id))
            .collect();
        self.order_candidates(&mut candidates);

        let mut first_error: Option<Vec<RuleInfo>> = None;
        for cand in candidates {
            let snapshot = self.state.clone();
            match self.install_package(cand, DecisionKind::ResolveJob, RuleClass::Job) {
                Ok(()) => return,
                Err(rules) => {
                    self.state = snapshot;
                    first_error.get_or_insert(rules);
                }
            }
        }
        if weak {
            return;
        }
        let mut rules = first_error.unwrap_or_default();
        if flags & job::FORCEBEST != 0 {
            rules.insert(0, RuleInfo::new(RuleType::Best, 0, 0, 0));
        }
        self.problems.push(Problem { rules });
    }

    fn do_erase(&mut self, flags: u32, operand: Id) {
        let pool = self.pool();
        let clean_deps = flags & job::CLEANDEPS != 0;
        let sel: Vec<Id> = self
            .select(flags, operand)
            .into_iter()
            .filter(|&id| pool.is_installed(id) && !self.state.erased_set.has(id))
            .collect();
        for id in sel {
            let snapshot = self.state.clone();
            if let Err(rules) = self.erase_package(id, DecisionKind::ResolveJob, clean_deps) {
                self.state = snapshot;
                self.problems.push(Problem { rules });
            }
        }
    }

    fn best_update_for(&self, installed: Id, distupgrade: bool) -> Option<Id> {
        let pool = self.pool();
        let inst = pool.solvable(installed);
        let mut candidates: Vec<Id> = pool
            .pkg_ids()
            .filter(|&id| {
                let s = pool.solvable(id);
                !pool.is_installed(id)
                    && pool.is_considered(id)
                    && !self.locks.has(id)
                    && s.name == inst.name
                    && arch_compatible(pool, s.arch, inst.arch)
            })
            .collect();
        if candidates.is_empty() {
            return None;
        }
        self.order_candidates(&mut candidates);
        let best = candidates[0];
        let ord = pool.evrcmp(pool.solvable(best).evr, inst.evr);
        match ord {
            Ordering::Greater => Some(best),
            Ordering::Less if distupgrade || self.allow_downgrade => Some(best),
            _ => None,
        }
    }

    fn do_update(&mut self, flags: u32, operand: Id, distupgrade: bool) {
        let pool = self.pool();
        let targeted = flags & job::TARGETED != 0;
        let forcebest = flags & job::FORCEBEST != 0;

        let installed_targets: Vec<Id> = if flags & job::SELECT_MASK == job::SOLVABLE_ALL {
            pool.pkg_ids()
                .filter(|&id| pool.is_installed(id) && self.is_present(id))
                .collect()
        } else {
            let sel = self.select(flags, operand);
            // a selection may name available candidates (targeted form) or
            // installed packages; normalize to the installed side
            let mut targets = Vec::new();
            for id in &sel {
                if pool.is_installed(*id) {
                    if self.is_present(*id) {
                        targets.push(*id);
                    }
                } else if let Some(inst) = pool.what_upgrades(*id).or_else(|| {
                    (targeted || self.allow_downgrade)
                        .then(|| pool.what_downgrades(*id))
                        .flatten()
                }) {
                    if self.is_present(inst) {
                        targets.push(inst);
                    }
                }
            }
            targets.sort_unstable();
            targets.dedup();
            targets
        };

        for installed in installed_targets {
            let Some(best) = self.best_update_for(installed, distupgrade) else {
                continue;
            };
            let snapshot = self.state.clone();
            if let Err(rules) =
                self.install_package(best, DecisionKind::ResolveJob, RuleClass::Job)
            {
                self.state = snapshot;
                if forcebest {
                    let mut all = vec![RuleInfo::new(RuleType::Best, installed, 0, 0)];
                    all.extend(rules);
                    self.problems.push(Problem { rules: all });
                }
                // otherwise updates are best-effort: keep what is installed
            }
        }
    }

    fn do_verify(&mut self) {
        let pool = self.pool();
        for id in pool
            .pkg_ids()
            .filter(|&id| pool.is_installed(id))
            .collect::<Vec<_>>()
        {
            if !self.is_present(id) {
                continue;
            }
            let requires = pool.solvable(id).requires.clone();
            for r in requires {
                let dep = pool.reldep(r);
                if pool.id2str(dep.name).starts_with('(') || self.provides_present(r) {
                    continue;
                }
                let mut providers: Vec<Id> = pool
                    .whatprovides(r)
                    .into_iter()
                    .filter(|&p| pool.is_considered(p))
                    .collect();
                if providers.is_empty() {
                    self.problems.push(Problem {
                        rules: vec![RuleInfo::new(RuleType::PkgNothingProvidesDep, id, 0, r)],
                    });
                    continue;
                }
                self.order_candidates(&mut providers);
                let snapshot = self.state.clone();
                if self
                    .install_package(providers[0], DecisionKind::Resolve, RuleClass::Pkg)
                    .is_err()
                {
                    self.state = snapshot;
                    self.problems.push(Problem {
                        rules: vec![RuleInfo::new(RuleType::PkgRequires, id, 0, r)],
                    });
                }
            }
        }
    }

    // ---- weak dependencies --------------------------------------------

    fn weak_dep_pass(&mut self) {
        if self.ignore_recommended {
            return;
        }
        let pool = self.pool();

        // recommends of newly installed packages
        let mut cursor = 0;
        while cursor < self.state.to_install.len() {
            let id = self.state.to_install[cursor];
            cursor += 1;
            let recommends = pool.solvable(id).recommends.clone();
            for r in recommends {
                let dep = pool.reldep(r);
                if pool.id2str(dep.name).starts_with('(') || self.provides_present(r) {
                    continue;
                }
                let mut providers: Vec<Id> = pool
                    .whatprovides(r)
                    .into_iter()
                    .filter(|&p| {
                        pool.is_considered(p)
                            && !pool.is_installed(p)
                            && !self.locks.has(p)
                            && !self.exclude_from_weak.has(p)
                    })
                    .collect();
                if providers.is_empty() {
                    continue;
                }
                self.order_candidates(&mut providers);
                let snapshot = self.state.clone();
                if self
                    .install_package(providers[0], DecisionKind::Weakdep, RuleClass::Pkg)
                    .is_err()
                {
                    self.state = snapshot;
                }
            }
        }

        // supplements: available packages volunteered by the present set
        for id in pool.pkg_ids().collect::<Vec<_>>() {
            if pool.is_installed(id)
                || self.is_present(id)
                || !pool.is_considered(id)
                || self.exclude_from_weak.has(id)
                || self.locks.has(id)
            {
                continue;
            }
            let supplements = pool.solvable(id).supplements.clone();
            let triggered = supplements.iter().any(|&s| {
                let dep = pool.reldep(s);
                !pool.id2str(dep.name).starts_with('(') && self.provides_present(s)
            });
            if triggered {
                let snapshot = self.state.clone();
                if self
                    .install_package(id, DecisionKind::Weakdep, RuleClass::Pkg)
                    .is_err()
                {
                    self.state = snapshot;
                }
            }
        }

        // suggestions are reported, never auto-installed
        let mut suggested = Vec::new();
        for &id in &self.state.to_install {
            for &s in &pool.solvable(id).suggests {
                for p in pool.whatprovides(s) {
                    if !self.is_present(p) && pool.is_considered(p) && !suggested.contains(&p) {
                        suggested.push(p);
                    }
                }
            }
        }
        self.suggested = suggested;
    }

    // ---- entry point ---------------------------------------------------

    /// Run the solver over a job; true on success. Problems accumulate
    /// on failure and the job can be amended and re-solved.
    pub fn solve(&mut self, solver_job: &IdQueue) -> bool {
        self.sack.recompute_considered();
        self.sack.make_provides_ready();
        self.state = State::default();
        self.problems.clear();

        // modifier entries configure the run before any action applies
        for (flags, operand) in solver_job.pairs() {
            let action = flags & job::ACTION_MASK;
            let target = match action {
                job::LOCK => &mut self.locks,
                job::FAVOR => &mut self.favored,
                job::DISFAVOR => &mut self.disfavored,
                job::USERINSTALLED => &mut self.userinstalled,
                job::EXCLUDEFROMWEAK => &mut self.exclude_from_weak,
                job::ALLOWUNINSTALL => &mut self.allow_uninstall,
                job::MULTIVERSION => {
                    self.multiversion.push(operand);
                    continue;
                }
                _ => continue,
            };
            for id in select_ids(self.sack, flags, operand) {
                target.set(id);
            }
        }

        for (flags, operand) in solver_job.pairs() {
            match flags & job::ACTION_MASK {
                job::INSTALL => self.do_install(flags, operand),
                job::ERASE => self.do_erase(flags, operand),
                job::UPDATE => self.do_update(flags, operand, false),
                job::DISTUPGRADE => self.do_update(flags, operand, true),
                job::VERIFY => self.do_verify(),
                _ => {}
            }
        }

        if self.problems.is_empty() {
            self.weak_dep_pass();
        }

        debug!(
            installs = self.state.to_install.len(),
            erases = self.state.erased.len(),
            problems = self.problems.len(),
            "solve finished"
        );
        self.problems.is_empty()
    }

    // ---- results -------------------------------------------------------

    pub fn problem_count(&self) -> usize {
        self.problems.len()
    }

    /// All rule infos of problem `i` (0-based)
    pub fn all_problem_rules(&self, i: usize) -> &[RuleInfo] {
        self.problems
            .get(i)
            .map(|p| p.rules.as_slice())
            .unwrap_or(&[])
    }

    pub fn describe_decision(&self, id: Id) -> Option<Decision> {
        self.state.decisions.get(&id).copied()
    }

    pub fn get_cleandeps(&self) -> Vec<Id> {
        self.state.cleandeps.clone()
    }

    /// Installed packages nothing user-installed (transitively) needs
    pub fn get_unneeded(&self) -> Vec<Id> {
        let pool = self.pool();
        let mut needed = PackageSet::new();
        let mut stack: Vec<Id> = self
            .present_ids()
            .into_iter()
            .filter(|&id| self.userinstalled.has(id))
            .collect();
        while let Some(id) = stack.pop() {
            if needed.has(id) {
                continue;
            }
            needed.set(id);
            let s = pool.solvable(id);
            for &r in s.requires.iter().chain(&s.recommends) {
                for p in pool.whatprovides(r) {
                    if self.is_present(p) && !needed.has(p) {
                        stack.push(p);
                    }
                }
            }
        }
        self.present_ids()
            .into_iter()
            .filter(|&id| pool.is_installed(id) && !needed.has(id))
            .collect()
    }

    pub fn get_suggestions(&self) -> Vec<Id> {
        self.suggested.clone()
    }

    pub fn log_decision_queue(&self) {
        for (&id, decision) in &self.state.decisions {
            debug!(
                pkg = %self.pool().solvid2str(id),
                kind = ?decision.kind,
                class = ?decision.rule_class,
                "decision"
            );
        }
    }

    /// Snapshot the decisions into a classified transaction
    pub fn create_transaction(&self) -> Transaction {
        let pool = self.pool();
        let mut transaction = Transaction::default();

        for &old in &self.state.erased {
            if let Some(&new) = self.state.replaced.get(&old) {
                // replacement olds classify through their successor
                transaction.obs_pairs.push((new, old));
            } else if let Some(&new) = self.state.obsoleted.get(&old) {
                transaction.obs_pairs.push((new, old));
                transaction.steps.push(TransactionStep {
                    id: old,
                    step_type: StepType::Obsoleted,
                });
            } else {
                transaction.steps.push(TransactionStep {
                    id: old,
                    step_type: StepType::Erase,
                });
            }
        }

        for &new in &self.state.to_install {
            let replaced_old = self
                .state
                .replaced
                .iter()
                .find(|&(_, &n)| n == new)
                .map(|(&old, _)| old);
            let step_type = match replaced_old {
                None => StepType::Install,
                Some(old) => {
                    match pool.evrcmp(pool.solvable(new).evr, pool.solvable(old).evr) {
                        Ordering::Greater => StepType::Upgrade,
                        Ordering::Less => StepType::Downgrade,
                        Ordering::Equal => StepType::Reinstall,
                    }
                }
            };
            transaction.steps.push(TransactionStep { id: new, step_type });
        }

        transaction
    }
}

fn arch_compatible(pool: &Pool, a: Id, b: Id) -> bool {
    a == b || pool.id2str(a) == "noarch" || pool.id2str(b) == "noarch"
}

/// Expand a job selection into concrete solvable ids
///
/// `SOLVABLE_NAME` operands are reldep ids so arch/evr refinements can
/// be folded into the selection; `SOLVABLE_PROVIDES` operands are
/// reldep ids matched against provides.
pub(crate) fn select_ids(sack: &Sack, flags: u32, operand: Id) -> Vec<Id> {
    let pool = sack.pool();
    match flags & job::SELECT_MASK {
        job::SOLVABLE => vec![operand],
        job::SOLVABLE_NAME => {
            let dep = pool.reldep(operand);
            pool.pkg_ids()
                .filter(|&id| {
                    let s = pool.solvable(id);
                    dep.arch.is_none_or(|a| s.arch == a) && pool.match_nevr(id, &dep)
                })
                .collect()
        }
        job::SOLVABLE_PROVIDES => pool.whatprovides(operand),
        job::SOLVABLE_ONE_OF => pool.one_of(operand).clone(),
        job::SOLVABLE_REPO => pool
            .pkg_ids()
            .filter(|&id| pool.solvable(id).repo == operand)
            .collect(),
        job::SOLVABLE_ALL => pool.pkg_ids().collect(),
        _ => Vec::new(),
    }
}

/// Build a one-of install selection for a single concrete package
pub fn package_to_job(sack: &Sack, pkg: Id, solver_action: u32, queue: &mut IdQueue) {
    sack.recompute_considered();
    sack.make_provides_ready();
    let what = sack.pool().intern_one_of(vec![pkg]);
    queue.push_pair(
        job::SOLVABLE_ONE_OF | job::SETARCH | job::SETEVR | solver_action,
        what,
    );
}

/// Selection helper: does the job already carry this (flags, id) pair?
pub fn job_has(queue: &IdQueue, what: u32, id: Id) -> bool {
    queue.pairs().any(|(f, i)| f == what && i == id)
}

/// Expand a file-list selection into job entries, glob-aware
pub fn selection_make_filelist(
    sack: &Sack,
    path: &str,
    use_glob: bool,
    queue: &mut IdQueue,
) -> usize {
    let pool = sack.pool();
    let mut ids: Vec<Id> = Vec::new();
    if use_glob {
        let options = glob::MatchOptions {
            case_sensitive: false,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };
        if let Ok(pattern) = glob::Pattern::new(path) {
            for id in pool.pkg_ids() {
                if pool
                    .solvable(id)
                    .files
                    .iter()
                    .any(|f| pattern.matches_with(f, options))
                {
                    ids.push(id);
                }
            }
        }
    } else {
        ids = pool.whatprovides_file(path);
    }
    if ids.is_empty() {
        return 0;
    }
    let count = ids.len();
    let what = pool.intern_one_of(ids);
    queue.push_pair(job::SOLVABLE_ONE_OF, what);
    count
}

/// Keep only job entries whose selection intersects the given repos
pub fn selection_filter_repos(sack: &Sack, queue: &mut IdQueue, repos: &[Id]) {
    let pool = sack.pool();
    let mut filtered = IdQueue::new();
    for (flags, operand) in queue.pairs() {
        let ids: Vec<Id> = select_ids(sack, flags, operand)
            .into_iter()
            .filter(|&id| repos.contains(&pool.solvable(id).repo))
            .collect();
        if ids.is_empty() {
            continue;
        }
        let what = pool.intern_one_of(ids);
        filtered.push_pair(
            (flags & !job::SELECT_MASK) | job::SOLVABLE_ONE_OF | job::SETREPO,
            what,
        );
    }
    *queue = filtered;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{DepKind, Reldep};

    fn sack_with_installed() -> (Sack, Id, Id) {
        let mut sack = Sack::new();
        let system = sack.add_system_repo();
        let main = sack.add_repo("main", 0);
        let old = sack.add_package(system, "tool", "1.0-1", "x86_64");
        let new = sack.add_package(main, "tool", "2.0-1", "x86_64");
        (sack, old, new)
    }

    #[test]
    fn test_install_by_provides_picks_one() {
        let mut sack = Sack::new();
        sack.add_system_repo();
        let main = sack.add_repo("main", 0);
        let b = sack.add_package(main, "b", "1-1", "noarch");
        sack.add_dep(b, DepKind::Provides, "virt").unwrap();
        let c = sack.add_package(main, "c", "1-1", "noarch");
        sack.add_dep(c, DepKind::Provides, "virt").unwrap();

        let dep = Reldep::parse_lookup(sack.pool(), "virt").unwrap();
        let dep = sack.pool().intern_reldep(dep);
        let mut q = IdQueue::new();
        q.push_pair(job::INSTALL | job::SOLVABLE_PROVIDES, dep);

        let mut solver = Solver::new(&sack);
        assert!(solver.solve(&q));
        let transaction = solver.create_transaction();
        let installs: Vec<Id> = transaction
            .steps
            .iter()
            .filter(|s| s.step_type == StepType::Install)
            .map(|s| s.id)
            .collect();
        assert_eq!(installs.len(), 1);
        assert!(installs[0] == b || installs[0] == c);
    }

    #[test]
    fn test_install_missing_requirement_fails() {
        let mut sack = Sack::new();
        sack.add_system_repo();
        let main = sack.add_repo("main", 0);
        let a = sack.add_package(main, "a", "1-1", "noarch");
        sack.add_dep(a, DepKind::Requires, "ghost").unwrap();

        let mut q = IdQueue::new();
        let what = sack.pool().intern_one_of(vec![a]);
        q.push_pair(job::INSTALL | job::SOLVABLE_ONE_OF, what);

        let mut solver = Solver::new(&sack);
        assert!(!solver.solve(&q));
        assert_eq!(solver.problem_count(), 1);
        assert!(solver
            .all_problem_rules(0)
            .iter()
            .any(|r| r.rule_type == RuleType::PkgRequires));
    }

    #[test]
    fn test_upgrade_replaces_installed() {
        let (sack, old, new) = sack_with_installed();
        let mut q = IdQueue::new();
        q.push_pair(job::UPDATE | job::SOLVABLE_ALL, 0);

        let mut solver = Solver::new(&sack);
        assert!(solver.solve(&q));
        let transaction = solver.create_transaction();
        let upgrade = transaction
            .steps
            .iter()
            .find(|s| s.step_type == StepType::Upgrade)
            .expect("one upgrade step");
        assert_eq!(upgrade.id, new);
        assert_eq!(transaction.obsoleted_by_package(new), vec![old]);
    }

    #[test]
    fn test_erase_cascades_to_dependents() {
        let mut sack = Sack::new();
        let system = sack.add_system_repo();
        let lib = sack.add_package(system, "lib", "1-1", "x86_64");
        let app = sack.add_package(system, "app", "1-1", "x86_64");
        sack.add_dep(app, DepKind::Requires, "lib").unwrap();

        let mut q = IdQueue::new();
        q.push_pair(job::ERASE | job::SOLVABLE, lib);

        let mut solver = Solver::new(&sack);
        assert!(solver.solve(&q));
        let transaction = solver.create_transaction();
        let erased: Vec<Id> = transaction
            .steps
            .iter()
            .filter(|s| s.step_type == StepType::Erase)
            .map(|s| s.id)
            .collect();
        assert!(erased.contains(&lib));
        assert!(erased.contains(&app));
    }

    #[test]
    fn test_lock_blocks_erase() {
        let mut sack = Sack::new();
        let system = sack.add_system_repo();
        let pkg = sack.add_package(system, "pinned", "1-1", "noarch");

        let mut q = IdQueue::new();
        q.push_pair(job::LOCK | job::SOLVABLE, pkg);
        q.push_pair(job::ERASE | job::SOLVABLE, pkg);

        let mut solver = Solver::new(&sack);
        assert!(!solver.solve(&q));
        assert_eq!(solver.problem_count(), 1);
    }

    #[test]
    fn test_conflict_reported() {
        let mut sack = Sack::new();
        let system = sack.add_system_repo();
        let main = sack.add_repo("main", 0);
        sack.add_package(system, "incumbent", "1-1", "noarch");
        let challenger = sack.add_package(main, "challenger", "1-1", "noarch");
        sack.add_dep(challenger, DepKind::Conflicts, "incumbent").unwrap();

        let mut q = IdQueue::new();
        let what = sack.pool().intern_one_of(vec![challenger]);
        q.push_pair(job::INSTALL | job::SOLVABLE_ONE_OF, what);

        let mut solver = Solver::new(&sack);
        assert!(!solver.solve(&q));
        let rules = solver.all_problem_rules(0);
        assert!(rules.iter().any(|r| r.rule_type == RuleType::PkgConflicts));
    }

    #[test]
    fn test_multiversion_keeps_old() {
        let mut sack = Sack::new();
        let system = sack.add_system_repo();
        let main = sack.add_repo("main", 0);
        sack.add_package(system, "kernel", "1-1", "x86_64");
        let k2 = sack.add_package(main, "kernel", "2-1", "x86_64");
        sack.add_installonly("kernel").unwrap();

        let mut q = IdQueue::new();
        for dep in sack.installonly().iter() {
            q.push_pair(job::MULTIVERSION | job::SOLVABLE_PROVIDES, dep);
        }
        let what = sack.pool().intern_one_of(vec![k2]);
        q.push_pair(job::INSTALL | job::SOLVABLE_ONE_OF, what);

        let mut solver = Solver::new(&sack);
        assert!(solver.solve(&q));
        let transaction = solver.create_transaction();
        assert!(transaction
            .steps
            .iter()
            .any(|s| s.id == k2 && s.step_type == StepType::Install));
        assert!(!transaction.steps.iter().any(|s| s.step_type == StepType::Erase));
    }

    #[test]
    fn test_unneeded_without_userinstalled_roots() {
        let mut sack = Sack::new();
        let system = sack.add_system_repo();
        let lib = sack.add_package(system, "lib", "1-1", "noarch");
        let app = sack.add_package(system, "app", "1-1", "noarch");
        sack.add_dep(app, DepKind::Requires, "lib").unwrap();

        let mut q = IdQueue::new();
        q.push_pair(job::USERINSTALLED | job::SOLVABLE, app);

        let mut solver = Solver::new(&sack);
        assert!(solver.solve(&q));
        // app is a root and needs lib; nothing is unneeded
        assert!(solver.get_unneeded().is_empty());

        let mut solver = Solver::new(&sack);
        let mut q = IdQueue::new();
        q.push_pair(job::USERINSTALLED | job::SOLVABLE, lib);
        assert!(solver.solve(&q));
        // only lib is a root now, so app is unneeded
        assert_eq!(solver.get_unneeded(), vec![app]);
    }
}
