// src/goal/mod.rs

//! Goals: staged intents, solving under policy, classified results
//!
//! A goal accumulates user intents (install, erase, upgrade, ...) as
//! staged solver jobs, constructs the final job under policy flags,
//! runs a fresh solver, enforces install-only limiting and protected
//! package rules around it, and exposes the resulting transaction as
//! typed package sets plus human-readable problem descriptions.

pub mod format;

use crate::error::{Error, Result};
use crate::pool::{Id, Pool};
use crate::query::{Keyname, Query};
use crate::sack::Sack;
use crate::selector::Selector;
use crate::set::{IdQueue, PackageSet};
use crate::solver::{
    job, package_to_job, DecisionKind, RuleClass, RuleType, Solver, StepType, Transaction,
};
use tracing::{debug, info};

/// Goal action bits; doubles as the flag set accepted by `run`
pub mod actions {
    pub const NONE: u32 = 0;
    pub const ALLOW_UNINSTALL: u32 = 1 << 0;
    pub const FORCE_BEST: u32 = 1 << 1;
    pub const VERIFY: u32 = 1 << 2;
    pub const IGNORE_WEAK: u32 = 1 << 3;
    pub const IGNORE_WEAK_DEPS: u32 = 1 << 4;
    pub const ALLOW_DOWNGRADE: u32 = 1 << 5;
    pub const INSTALL: u32 = 1 << 6;
    pub const ERASE: u32 = 1 << 7;
    pub const UPGRADE: u32 = 1 << 8;
    pub const UPGRADE_ALL: u32 = 1 << 9;
    pub const DISTUPGRADE: u32 = 1 << 10;
    pub const DISTUPGRADE_ALL: u32 = 1 << 11;
}

/// Why a package ended up in the transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// directly requested by the user
    User,
    /// removed (or removable) by dependency cleanup
    Clean,
    /// pulled in by a weak dependency
    WeakDep,
    /// pulled in to satisfy a hard dependency
    Dep,
}

/// Installed/available restriction for problem package listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PkgState {
    Installed,
    Available,
    All,
}

/// A transaction goal over a sack
pub struct Goal<'a> {
    sack: &'a Sack,
    actions: u32,
    staging: IdQueue,
    solver: Option<Solver<'a>>,
    transaction: Option<Transaction>,
    protected: Option<PackageSet>,
    protect_running_kernel: bool,
    exclude_from_weak: PackageSet,
    removal_of_protected: Option<PackageSet>,
}

impl Clone for Goal<'_> {
    /// Clones carry the staged intents and policy, not solver results
    fn clone(&self) -> Self {
        Self {
            sack: self.sack,
            actions: self.actions,
            staging: self.staging.clone(),
            solver: None,
            transaction: None,
            protected: self.protected.clone(),
            protect_running_kernel: self.protect_running_kernel,
            exclude_from_weak: self.exclude_from_weak.clone(),
            removal_of_protected: self.removal_of_protected.clone(),
        }
    }
}

impl<'a> Goal<'a> {
    pub fn new(sack: &'a Sack) -> Self {
        Self {
            sack,
            actions: actions::NONE,
            staging: IdQueue::new(),
            solver: None,
            transaction: None,
            protected: None,
            protect_running_kernel: false,
            exclude_from_weak: PackageSet::new(),
            removal_of_protected: None,
        }
    }

    pub fn sack(&self) -> &'a Sack {
        self.sack
    }

    fn pool(&self) -> &'a Pool {
        self.sack.pool()
    }

    pub fn get_actions(&self) -> u32 {
        self.actions
    }

    pub fn has_actions(&self, action: u32) -> bool {
        self.actions & action != 0
    }

    /// Number of staged job tuples
    pub fn job_length(&self) -> usize {
        self.staging.len() / 2
    }

    // ---- intents -------------------------------------------------------

    pub fn install(&mut self, pkg: Id, optional: bool) {
        let mut action = job::INSTALL;
        if optional {
            action |= job::WEAK;
        }
        self.actions |= actions::INSTALL | actions::ALLOW_DOWNGRADE;
        package_to_job(self.sack, pkg, action, &mut self.staging);
    }

    pub fn install_selector(&mut self, sltr: &Selector<'_>, optional: bool) -> Result<()> {
        let mut action = job::INSTALL;
        if optional {
            action |= job::WEAK;
        }
        self.actions |= actions::INSTALL | actions::ALLOW_DOWNGRADE;
        sltr.to_job(action, &mut self.staging)
    }

    pub fn erase(&mut self, pkg: Id, clean_deps: bool) {
        let mut action = job::ERASE;
        if clean_deps {
            action |= job::CLEANDEPS;
        }
        self.actions |= actions::ERASE;
        self.staging.push_pair(job::SOLVABLE | action, pkg);
    }

    pub fn erase_selector(&mut self, sltr: &Selector<'_>, clean_deps: bool) -> Result<()> {
        let mut action = job::ERASE;
        if clean_deps {
            action |= job::CLEANDEPS;
        }
        self.actions |= actions::ERASE;
        sltr.to_job(action, &mut self.staging)
    }

    pub fn upgrade_all(&mut self) {
        self.actions |= actions::UPGRADE_ALL;
        self.staging.push_pair(job::UPDATE | job::SOLVABLE_ALL, 0);
    }

    pub fn upgrade(&mut self, pkg: Id) {
        self.actions |= actions::UPGRADE;
        package_to_job(self.sack, pkg, job::UPDATE, &mut self.staging);
    }

    pub fn upgrade_selector(&mut self, sltr: &Selector<'_>) -> Result<()> {
        self.actions |= actions::UPGRADE;
        let mut action = job::UPDATE;
        if sltr.has_pkgs() {
            action |= job::TARGETED;
        }
        sltr.to_job(action, &mut self.staging)
    }

    /// Distupgrade everything available
    pub fn distupgrade_all(&mut self) -> Result<()> {
        self.actions |= actions::DISTUPGRADE_ALL | actions::ALLOW_DOWNGRADE;
        let mut query = Query::new(self.sack);
        query.available();
        let mut selector = Selector::new(self.sack);
        selector.set_pkgs(query.run_set());
        selector.to_job(job::DISTUPGRADE, &mut self.staging)
    }

    pub fn distupgrade(&mut self, pkg: Id) {
        self.actions |= actions::DISTUPGRADE | actions::ALLOW_DOWNGRADE;
        package_to_job(self.sack, pkg, job::DISTUPGRADE, &mut self.staging);
    }

    pub fn distupgrade_selector(&mut self, sltr: &Selector<'_>) -> Result<()> {
        self.actions |= actions::DISTUPGRADE | actions::ALLOW_DOWNGRADE;
        sltr.to_job(job::DISTUPGRADE, &mut self.staging)
    }

    pub fn lock(&mut self, pkg: Id) {
        self.staging.push_pair(job::SOLVABLE | job::LOCK, pkg);
    }

    pub fn favor(&mut self, pkg: Id) {
        self.staging.push_pair(job::SOLVABLE | job::FAVOR, pkg);
    }

    pub fn disfavor(&mut self, pkg: Id) {
        self.staging.push_pair(job::SOLVABLE | job::DISFAVOR, pkg);
    }

    pub fn user_installed(&mut self, pkg: Id) {
        self.staging
            .push_pair(job::SOLVABLE | job::USERINSTALLED, pkg);
    }

    pub fn user_installed_set(&mut self, pset: &PackageSet) {
        for id in pset.iter() {
            self.user_installed(id);
        }
    }

    // ---- weak-dependency excludes -------------------------------------

    pub fn add_exclude_from_weak(&mut self, pkg: Id) {
        self.exclude_from_weak.set(pkg);
    }

    pub fn add_exclude_from_weak_set(&mut self, pset: &PackageSet) {
        self.exclude_from_weak.union_with(pset);
    }

    pub fn reset_exclude_from_weak(&mut self) {
        self.exclude_from_weak.clear();
    }

    /// Detect installed packages with unmet weak dependencies and
    /// available packages supplementing the installed set, and exclude
    /// them from weak-dependency auto-install
    pub fn exclude_from_weak_autodetect(&mut self) {
        let pool = self.pool();
        let mut installed_query =
            Query::with_flags(self.sack, crate::sack::ExcludeFlags::IgnoreExcludes);
        installed_query.installed();
        if installed_query.is_empty() {
            return;
        }
        let mut base_query = Query::new(self.sack);
        base_query.apply();
        let installed_ids: Vec<Id> = installed_query.run_set().iter().collect();

        // installed packages with recommends nobody installed provides:
        // exclude every provider so the recommend stays unmet
        for &id in &installed_ids {
            let recommends = pool.solvable(id).recommends.clone();
            for r in recommends {
                let dep = pool.reldep(r);
                let dep_name = pool.id2str(dep.name);
                if dep_name.starts_with('(') {
                    continue;
                }
                let mut query = base_query.clone();
                if dep.evr.is_some() {
                    // an installed provider may carry a different version;
                    // search by name only
                    let _ = query.add_str_filter(
                        Keyname::Provides,
                        crate::query::cmp::EQ,
                        dep_name,
                    );
                } else {
                    let _ = query.add_reldep_filter(Keyname::Provides, &dep);
                }
                if query.is_empty() {
                    continue;
                }
                let mut test_installed = query.clone();
                test_installed.installed();
                if test_installed.is_empty() {
                    self.exclude_from_weak.union_with(query.run_set());
                }
            }
        }

        // available packages with a different name than anything
        // installed whose supplements are already satisfied
        let installed_names: Vec<Id> =
            installed_ids.iter().map(|&id| pool.solvable(id).name).collect();
        for id in pool.pkg_ids() {
            if pool.is_installed(id)
                || !pool.is_considered(id)
                || installed_names.contains(&pool.solvable(id).name)
            {
                continue;
            }
            let supplements = pool.solvable(id).supplements.clone();
            let supplemented = supplements.iter().any(|&s| {
                let dep = pool.reldep(s);
                !pool.id2str(dep.name).starts_with('(')
                    && pool
                        .whatprovides(s)
                        .into_iter()
                        .any(|p| pool.is_installed(p))
            });
            if supplemented {
                self.exclude_from_weak.set(id);
            }
        }
        debug!(
            excluded = self.exclude_from_weak.len(),
            "weak-dependency excludes autodetected"
        );
    }

    // ---- protection policy --------------------------------------------

    pub fn add_protected(&mut self, pset: &PackageSet) {
        match self.protected {
            Some(ref mut protected) => protected.union_with(pset),
            None => self.protected = Some(pset.clone()),
        }
    }

    pub fn set_protected(&mut self, pset: &PackageSet) {
        self.protected = Some(pset.clone());
    }

    pub fn get_protect_running_kernel(&self) -> bool {
        self.protect_running_kernel
    }

    pub fn set_protect_running_kernel(&mut self, value: bool) {
        self.protect_running_kernel = value;
    }

    fn protected_running_kernel(&self) -> Option<Id> {
        self.protect_running_kernel
            .then(|| self.sack.running_kernel())
            .flatten()
    }

    // ---- job construction and solving ---------------------------------

    fn allow_uninstall_all_but_protected(&mut self, solver_job: &mut IdQueue, flags: u32) {
        if flags & actions::ALLOW_UNINSTALL == 0 {
            return;
        }
        let pool = self.pool();
        let protected = self.protected.get_or_insert_with(PackageSet::new);
        let kernel = self
            .protect_running_kernel
            .then(|| self.sack.running_kernel())
            .flatten();
        for id in pool.pkg_ids() {
            if pool.is_installed(id)
                && !protected.has(id)
                && Some(id) != kernel
                && pool.is_considered(id)
            {
                solver_job.push_pair(job::ALLOWUNINSTALL | job::SOLVABLE, id);
            }
        }
    }

    fn construct_job(&mut self, flags: u32) -> IdQueue {
        let mut solver_job = self.staging.clone();

        if flags & actions::FORCE_BEST != 0 {
            for (job_flags, _) in solver_job.pairs_mut() {
                *job_flags |= job::FORCEBEST;
            }
        }

        for id in self.exclude_from_weak.iter() {
            solver_job.push_pair(job::SOLVABLE | job::EXCLUDEFROMWEAK, id);
        }

        // implicit obsoletes stay off for install-only package classes
        for dep in self.sack.installonly().iter() {
            solver_job.push_pair(job::MULTIVERSION | job::SOLVABLE_PROVIDES, dep);
        }

        self.allow_uninstall_all_but_protected(&mut solver_job, flags);

        if flags & actions::VERIFY != 0 {
            solver_job.push_pair(job::VERIFY | job::SOLVABLE_ALL, 0);
        }

        solver_job
    }

    fn init_solver(&self) -> Solver<'a> {
        let mut solver = Solver::new(self.sack);
        let vendor = self.sack.allow_vendor_change();
        solver.allow_vendor_change = vendor;
        solver.keep_orphans = true;
        solver.best_obey_policy = true;
        solver.yum_obsoletes = true;
        solver.urpm_reorder = true;
        solver
    }

    /// Run the solver over the staged intents; false when no acceptable
    /// transaction exists (including protected removals)
    pub fn run(&mut self, flags: u32) -> bool {
        let mut solver_job = self.construct_job(flags);
        self.actions |= flags;

        self.sack.recompute_considered();
        self.sack.make_provides_ready();
        self.transaction = None;
        self.removal_of_protected = None;

        let mut solver = self.init_solver();

        if flags & actions::IGNORE_WEAK != 0 {
            for (job_flags, _) in solver_job.pairs_mut() {
                *job_flags &= !job::WEAK;
            }
        }
        if flags & actions::IGNORE_WEAK_DEPS != 0 {
            solver.ignore_recommended = true;
        }
        if self.actions & actions::ALLOW_DOWNGRADE != 0 {
            solver.allow_downgrade = true;
        }

        info!(job_tuples = solver_job.len() / 2, "running solver");
        if !solver.solve(&solver_job) {
            self.solver = Some(solver);
            return false;
        }

        if self.limit_installonly_packages(&solver, &mut solver_job) {
            // allow erasing packages that depend on a kernel about to go
            self.allow_uninstall_all_but_protected(&mut solver_job, actions::ALLOW_UNINSTALL);
            if !solver.solve(&solver_job) {
                self.solver = Some(solver);
                return false;
            }
        }

        self.transaction = Some(solver.create_transaction());
        self.solver = Some(solver);

        !self.protected_in_removals()
    }

    // ---- install-only limiting ----------------------------------------

    fn can_depend_on(&self, pkg: Id, target: Id) -> bool {
        let pool = self.pool();
        pool.solvable(pkg)
            .requires
            .iter()
            .any(|&r| pool.whatprovides(r).contains(&target))
    }

    fn installonly_sort_rank(&self, id: Id, kernel: Option<Id>) -> u8 {
        let pool = self.pool();
        if !pool.is_installed(id) {
            return 3;
        }
        if let Some(kernel) = kernel {
            if id == kernel || self.can_depend_on(id, kernel) {
                return 2;
            }
            // same EVR as the running kernel: keep (kernel-devel pairs)
            if pool.solvable(id).evr == pool.solvable(kernel).evr {
                return 1;
            }
        }
        0
    }

    /// After a successful solve, trim surplus install-only copies: for
    /// each same-name run over the limit, keep the preferred `limit`
    /// installed copies and erase the rest. Returns whether the job
    /// changed and the solver must run again.
    fn limit_installonly_packages(&mut self, solver: &Solver<'_>, solver_job: &mut IdQueue) -> bool {
        let limit = self.sack.installonly_limit() as usize;
        if limit == 0 {
            return false;
        }
        let pool = self.pool();
        let kernel = self.sack.running_kernel();
        let mut reresolve = false;

        for dep in self.sack.installonly().iter() {
            let mut q: Vec<Id> = pool
                .whatprovides(dep)
                .into_iter()
                .filter(|&p| solver.decision_level_positive(p))
                .collect();
            if q.len() <= limit {
                continue;
            }
            if !q.iter().any(|&id| !pool.is_installed(id)) {
                // nothing new is coming in, leave the system alone
                continue;
            }

            q.sort_by(|&a, &b| {
                let (sa, sb) = (pool.solvable(a), pool.solvable(b));
                sa.name
                    .cmp(&sb.name)
                    .then_with(|| {
                        self.installonly_sort_rank(a, kernel)
                            .cmp(&self.installonly_sort_rank(b, kernel))
                    })
                    .then_with(|| pool.evrcmp(sa.evr, sb.evr))
                    .then(a.cmp(&b))
            });

            // walk same-name runs in preference order (reversed)
            let mut start = 0;
            while start < q.len() {
                let name = pool.solvable(q[start]).name;
                let mut stop = start;
                while stop < q.len() && pool.solvable(q[stop]).name == name {
                    stop += 1;
                }
                let installed_preferred: Vec<Id> = q[start..stop]
                    .iter()
                    .rev()
                    .copied()
                    .filter(|&id| pool.is_installed(id))
                    .collect();
                if installed_preferred.len() > limit {
                    reresolve = true;
                    for (j, &id) in installed_preferred.iter().enumerate() {
                        let action = if j < limit { job::INSTALL } else { job::ERASE };
                        solver_job.push_pair(action | job::SOLVABLE, id);
                        if action == job::ERASE {
                            debug!(pkg = %pool.solvid2str(id), "install-only limit erases");
                        }
                    }
                }
                start = stop;
            }
        }
        reresolve
    }

    // ---- protected removals -------------------------------------------

    fn protected_in_removals(&mut self) -> bool {
        let has_protected = self.protected.as_ref().is_some_and(|p| !p.is_empty());
        if !has_protected && !self.protect_running_kernel {
            return false;
        }
        let Ok(mut removals) = self.list_results(StepType::Erase, None) else {
            return false;
        };
        if let Ok(obsoleted) = self.list_results(StepType::Obsoleted, None) {
            removals.union_with(&obsoleted);
        }

        let kernel = self.protected_running_kernel();
        let mut hit = false;
        let mut protected_removals = PackageSet::new();
        for id in removals.iter() {
            let is_protected = self.protected.as_ref().is_some_and(|p| p.has(id));
            if is_protected || Some(id) == kernel {
                protected_removals.set(id);
                hit = true;
            }
        }
        self.removal_of_protected = Some(protected_removals);
        hit
    }

    fn describe_protected_removal(&self) -> Option<String> {
        const MESSAGE: &str =
            "The operation would result in removing the following protected packages: ";
        let pool = self.pool();

        if let Some(ref removals) = self.removal_of_protected {
            if !removals.is_empty() {
                let names: Vec<&str> = removals
                    .iter()
                    .map(|id| pool.id2str(pool.solvable(id).name))
                    .collect();
                return Some(format!("{}{}", MESSAGE, names.join(", ")));
            }
        }

        // no recorded removal: check broken installed packages instead
        let pset = self.broken_dependency_all_pkgs(PkgState::Installed)?;
        let kernel = self.protected_running_kernel();
        let names: Vec<&str> = pset
            .iter()
            .filter(|&id| {
                self.protected.as_ref().is_some_and(|p| p.has(id)) || Some(id) == kernel
            })
            .map(|id| pool.id2str(pool.solvable(id).name))
            .collect();
        if names.is_empty() {
            None
        } else {
            Some(format!("{}{}", MESSAGE, names.join(", ")))
        }
    }

    // ---- problem reporting --------------------------------------------

    pub fn count_problems(&self) -> usize {
        let solver_problems = self
            .solver
            .as_ref()
            .map(|s| s.problem_count())
            .unwrap_or(0);
        let protected = self
            .removal_of_protected
            .as_ref()
            .is_some_and(|p| !p.is_empty()) as usize;
        solver_problems + protected
    }

    /// Sentences describing problem `i`, deduplicated within the problem
    pub fn describe_problem_rules(&self, i: usize, pkgs: bool) -> Vec<String> {
        let mut output = Vec::new();
        if i >= self.count_problems() {
            return output;
        }
        if let Some(problem) = self.describe_protected_removal() {
            output.push(problem);
            return output;
        }
        let Some(ref solver) = self.solver else {
            return output;
        };
        if i >= solver.problem_count() {
            return output;
        }
        for info in solver.all_problem_rules(i) {
            let problem_str = format::problem_rule_to_string(
                self.sack,
                Some(self.sack.module_excludes()),
                info,
                pkgs,
            );
            if !output.contains(&problem_str) {
                output.push(problem_str);
            }
        }
        output
    }

    /// All problems, deduplicated by elementwise containment between
    /// equal-sized lists
    pub fn describe_all_problem_rules(&self, pkgs: bool) -> Vec<Vec<String>> {
        let mut output: Vec<Vec<String>> = Vec::new();
        for i in 0..self.count_problems() {
            let problem_list = self.describe_problem_rules(i, pkgs);
            if problem_list.is_empty() {
                continue;
            }
            let mut unique = true;
            for saved in &output {
                if saved.len() != problem_list.len() {
                    continue;
                }
                if problem_list.iter().all(|p| saved.contains(p)) {
                    unique = false;
                }
            }
            if unique {
                output.push(problem_list);
            }
        }
        output
    }

    /// Render all problems into one display string
    pub fn format_all_problem_rules(&self, problems: &[Vec<String>]) -> String {
        format::format_all_problem_rules(problems)
    }

    fn problem_pkgs_by_rule(
        &self,
        i: usize,
        conflicts: bool,
    ) -> Vec<Id> {
        let mut out = Vec::new();
        let Some(ref solver) = self.solver else {
            return out;
        };
        if i >= solver.problem_count() {
            return out;
        }
        for info in solver.all_problem_rules(i) {
            if conflicts {
                match info.rule_type {
                    RuleType::PkgConflicts | RuleType::PkgSameName => {
                        out.push(info.source);
                        out.push(info.target);
                    }
                    RuleType::PkgSelfConflict => out.push(info.source),
                    _ => {}
                }
            } else {
                match info.rule_type {
                    RuleType::PkgNothingProvidesDep | RuleType::PkgRequires => {
                        out.push(info.source)
                    }
                    _ => {}
                }
            }
        }
        out
    }

    fn collect_problem_pkgs(&self, state: PkgState, conflicts: bool) -> Option<PackageSet> {
        let pool = self.pool();
        let mut pset = PackageSet::new();
        let mut same_nevra_removals = PackageSet::new();
        for i in 0..self.count_problems() {
            for id in self.problem_pkgs_by_rule(i, conflicts) {
                let installed = pool.is_installed(id);
                if state == PkgState::Available && installed {
                    same_nevra_removals.set(id);
                    continue;
                }
                if state == PkgState::Installed && !installed {
                    continue;
                }
                pset.set(id);
            }
        }
        if same_nevra_removals.is_empty() {
            return Some(pset);
        }
        // drop available packages sharing a NEVRA with a skipped
        // installed one
        let mut out = PackageSet::new();
        for id in pset.iter() {
            let s = pool.solvable(id);
            let duplicate = same_nevra_removals.iter().any(|other| {
                let o = pool.solvable(other);
                s.name == o.name && s.evr == o.evr && s.arch == o.arch
            });
            if !duplicate {
                out.set(id);
            }
        }
        Some(out)
    }

    /// Packages involved in conflict rules across all problems
    pub fn list_conflict_pkgs(&self, state: PkgState) -> Option<PackageSet> {
        self.collect_problem_pkgs(state, true)
    }

    /// Packages with broken dependencies across all problems
    pub fn list_broken_dependency_pkgs(&self, state: PkgState) -> Option<PackageSet> {
        self.broken_dependency_all_pkgs(state)
    }

    fn broken_dependency_all_pkgs(&self, state: PkgState) -> Option<PackageSet> {
        self.collect_problem_pkgs(state, false)
    }

    // ---- results -------------------------------------------------------

    fn list_results(&self, ty1: StepType, ty2: Option<StepType>) -> Result<PackageSet> {
        let Some(ref transaction) = self.transaction else {
            if self.solver.is_none() {
                return Err(Error::Internal("no solver in the goal".to_string()));
            }
            if self
                .removal_of_protected
                .as_ref()
                .is_some_and(|p| !p.is_empty())
            {
                return Err(Error::RemovalOfProtected);
            }
            return Err(Error::NoSolution);
        };
        let mut plist = PackageSet::new();
        for step in &transaction.steps {
            if step.step_type == ty1 || ty2 == Some(step.step_type) {
                plist.set(step.id);
            }
        }
        Ok(plist)
    }

    pub fn list_installs(&self) -> Result<PackageSet> {
        self.list_results(StepType::Install, None)
    }

    pub fn list_erasures(&self) -> Result<PackageSet> {
        self.list_results(StepType::Erase, None)
    }

    pub fn list_upgrades(&self) -> Result<PackageSet> {
        self.list_results(StepType::Upgrade, None)
    }

    pub fn list_downgrades(&self) -> Result<PackageSet> {
        self.list_results(StepType::Downgrade, None)
    }

    pub fn list_reinstalls(&self) -> Result<PackageSet> {
        self.list_results(StepType::Reinstall, None)
    }

    pub fn list_obsoleted(&self) -> Result<PackageSet> {
        self.list_results(StepType::Obsoleted, None)
    }

    pub fn list_unneeded(&self) -> Result<PackageSet> {
        let solver = self
            .solver
            .as_ref()
            .ok_or_else(|| Error::Internal("no solver in the goal".to_string()))?;
        Ok(solver.get_unneeded().into_iter().collect())
    }

    pub fn list_suggested(&self) -> Result<PackageSet> {
        let solver = self
            .solver
            .as_ref()
            .ok_or_else(|| Error::Internal("no solver in the goal".to_string()))?;
        Ok(solver.get_suggestions().into_iter().collect())
    }

    /// Packages this transaction replaces or obsoletes through `pkg`
    pub fn list_obsoleted_by_package(&self, pkg: Id) -> Result<PackageSet> {
        let transaction = self
            .transaction
            .as_ref()
            .ok_or_else(|| Error::Internal("no transaction in the goal".to_string()))?;
        Ok(transaction.obsoleted_by_package(pkg).into_iter().collect())
    }

    /// Why `pkg` was decided the way it was
    pub fn get_reason(&self, pkg: Id) -> Reason {
        let Some(ref solver) = self.solver else {
            return Reason::User;
        };
        if let Some(decision) = solver.describe_decision(pkg) {
            if matches!(
                decision.kind,
                DecisionKind::ResolveJob | DecisionKind::UnitRule
            ) && matches!(decision.rule_class, RuleClass::Job | RuleClass::Best)
            {
                return Reason::User;
            }
            if decision.kind == DecisionKind::CleandepsErase {
                return Reason::Clean;
            }
            if decision.kind == DecisionKind::Weakdep {
                return Reason::WeakDep;
            }
        }
        if solver.get_cleandeps().contains(&pkg) {
            return Reason::Clean;
        }
        Reason::Dep
    }

    // ---- debugging -----------------------------------------------------

    /// Write the solver's decisions to the log
    pub fn log_decisions(&self) -> Result<()> {
        let solver = self
            .solver
            .as_ref()
            .ok_or_else(|| Error::Internal("no solver set".to_string()))?;
        solver.log_decision_queue();
        Ok(())
    }

    /// Dump the solved transaction and problems as a testcase directory
    pub fn write_debugdata(&self, dir: &str) -> Result<()> {
        if self.solver.is_none() {
            return Err(Error::Internal("no solver set".to_string()));
        }
        let absdir = std::path::absolute(dir)
            .map_err(|e| Error::FileInvalid(format!("failed to make {} absolute: {}", dir, e)))?;
        std::fs::create_dir_all(&absdir)
            .map_err(|e| Error::FileInvalid(format!("failed to create {}: {}", absdir.display(), e)))?;
        debug!(dir = %absdir.display(), "writing solver debugdata");

        let pool = self.pool();
        let steps: Vec<serde_json::Value> = self
            .transaction
            .as_ref()
            .map(|t| {
                t.steps
                    .iter()
                    .map(|step| {
                        serde_json::json!({
                            "package": pool.solvid2str(step.id),
                            "type": format!("{:?}", step.step_type),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        let testcase = serde_json::json!({
            "job": self.staging.pairs().map(|(f, id)| vec![f, id]).collect::<Vec<_>>(),
            "result": {
                "transaction": steps,
                "problems": self.describe_all_problem_rules(true),
            },
        });
        let path = absdir.join("testcase.json");
        let payload = serde_json::to_vec_pretty(&testcase)
            .map_err(|e| Error::Internal(format!("serializing debugdata: {}", e)))?;
        std::fs::write(&path, payload).map_err(|e| {
            Error::FileInvalid(format!("failed writing debugdata to {}: {}", path.display(), e))
        })?;
        Ok(())
    }
}
