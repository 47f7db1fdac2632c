// src/query/mod.rs

//! Multi-predicate package queries over a sack
//!
//! A query is an ordered list of filters plus a lazily computed result
//! set. Filters are queued as data, so a query is cheap to clone and
//! snapshot; `apply` consumes the queued filters into the result bitmap
//! exactly once per configuration. Adding a filter after an apply
//! re-opens the query and the next apply re-runs the pipeline against
//! the current pool.

pub mod filter;

pub use filter::{cmp, Filter, Keyname, Match};

use crate::dep::{is_file_pattern, is_glob_pattern, ReldepList};
use crate::error::{Error, Result};
use crate::goal::Goal;
use crate::history::HistoryDb;
use crate::nevra::{Form, Nevra, NevraId, FORMS_MOST_SPEC};
use crate::pool::{evr, DepKind, Id, Pool, Reldep};
use crate::sack::{ExcludeFlags, Sack};
use crate::set::PackageSet;
use glob::{MatchOptions, Pattern};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use tracing::debug;

fn keyname_dep_kind(keyname: Keyname) -> DepKind {
    match keyname {
        Keyname::Conflicts => DepKind::Conflicts,
        Keyname::Enhances => DepKind::Enhances,
        Keyname::Obsoletes => DepKind::Obsoletes,
        Keyname::Provides => DepKind::Provides,
        Keyname::Recommends => DepKind::Recommends,
        Keyname::Requires => DepKind::Requires,
        Keyname::Suggests => DepKind::Suggests,
        Keyname::Supplements => DepKind::Supplements,
        _ => unreachable!("keyname {:?} carries no relation array", keyname),
    }
}

fn glob_options(icase: bool) -> MatchOptions {
    MatchOptions {
        case_sensitive: !icase,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    }
}

fn glob_match(pattern: &str, value: &str, icase: bool) -> bool {
    Pattern::new(pattern)
        .map(|p| p.matches_with(value, glob_options(icase)))
        .unwrap_or(false)
}

/// A lazily evaluated package query
#[derive(Clone)]
pub struct Query<'a> {
    sack: &'a Sack,
    flags: ExcludeFlags,
    applied: bool,
    filters: Vec<Filter>,
    result: Option<PackageSet>,
    considered_cached: Option<PackageSet>,
}

impl<'a> Query<'a> {
    pub fn new(sack: &'a Sack) -> Self {
        Self::with_flags(sack, ExcludeFlags::ApplyExcludes)
    }

    pub fn with_flags(sack: &'a Sack, flags: ExcludeFlags) -> Self {
        Self {
            sack,
            flags,
            applied: false,
            filters: Vec::new(),
            result: None,
            considered_cached: None,
        }
    }

    pub fn sack(&self) -> &'a Sack {
        self.sack
    }

    fn pool(&self) -> &'a Pool {
        self.sack.pool()
    }

    pub fn applied(&self) -> bool {
        self.applied
    }

    /// Drop all filters and results, returning the query to its open state
    pub fn clear(&mut self) {
        self.applied = false;
        self.result = None;
        self.filters.clear();
    }

    // ---- adding filters ------------------------------------------------

    fn push(&mut self, keyname: Keyname, cmp_type: u32, matches: Vec<Match>) {
        self.applied = false;
        self.filters.push(Filter::new(keyname, cmp_type, matches));
    }

    pub fn add_num_filter(&mut self, keyname: Keyname, cmp_type: u32, m: i64) -> Result<()> {
        self.add_num_filters(keyname, cmp_type, &[m])
    }

    pub fn add_num_filters(
        &mut self,
        keyname: Keyname,
        cmp_type: u32,
        ms: &[i64],
    ) -> Result<()> {
        if !filter::valid_filter_num(keyname, cmp_type) {
            return Err(Error::BadQuery(format!(
                "{:?} cannot take a numeric match with comparison {:#x}",
                keyname, cmp_type
            )));
        }
        self.push(keyname, cmp_type, ms.iter().map(|&n| Match::Num(n)).collect());
        Ok(())
    }

    pub fn add_pkg_filter(
        &mut self,
        keyname: Keyname,
        cmp_type: u32,
        pset: &PackageSet,
    ) -> Result<()> {
        if !filter::valid_filter_pkg(keyname, cmp_type) {
            return Err(Error::BadQuery(format!(
                "{:?} cannot take a package-set match with comparison {:#x}",
                keyname, cmp_type
            )));
        }
        self.push(keyname, cmp_type, vec![Match::PkgSet(pset.clone())]);
        Ok(())
    }

    pub fn add_reldep_filter(&mut self, keyname: Keyname, dep: &Reldep) -> Result<()> {
        if !filter::valid_filter_reldep(keyname) {
            return Err(Error::BadQuery(format!(
                "{:?} cannot take a reldep match",
                keyname
            )));
        }
        let id = self.pool().intern_reldep(dep.clone());
        self.push(keyname, cmp::EQ, vec![Match::Reldep(id)]);
        Ok(())
    }

    pub fn add_reldep_list_filter(&mut self, keyname: Keyname, deps: &ReldepList) -> Result<()> {
        if !filter::valid_filter_reldep(keyname) {
            return Err(Error::BadQuery(format!(
                "{:?} cannot take a reldep match",
                keyname
            )));
        }
        if deps.is_empty() {
            self.push(Keyname::PkgEmpty, cmp::EQ, vec![Match::Num(1)]);
        } else {
            self.push(
                keyname,
                cmp::EQ,
                deps.iter().map(Match::Reldep).collect(),
            );
        }
        Ok(())
    }

    pub fn add_str_filter(&mut self, keyname: Keyname, cmp_type: u32, m: &str) -> Result<()> {
        self.add_str_filters(keyname, cmp_type, &[m])
    }

    pub fn add_str_filters(
        &mut self,
        keyname: Keyname,
        mut cmp_type: u32,
        ms: &[&str],
    ) -> Result<()> {
        if keyname == Keyname::NevraStrict {
            if cmp_type & (cmp::EQ | cmp::GT | cmp::LT) == 0 {
                return Err(Error::BadQuery(
                    "strict NEVRA accepts only =, < and > comparisons".to_string(),
                ));
            }
            // applied eagerly rather than queued
            self.apply();
            self.filter_nevra_strict(cmp_type, ms);
            return Ok(());
        }

        // a glob comparison without glob metacharacters is plain equality
        if cmp_type & cmp::GLOB != 0 && !ms.iter().any(|m| is_glob_pattern(m)) {
            cmp_type = (cmp_type & !cmp::GLOB) | cmp::EQ;
        }

        if !filter::valid_filter_str(keyname, cmp_type) {
            return Err(Error::BadQuery(format!(
                "{:?} cannot take a string match with comparison {:#x}",
                keyname, cmp_type
            )));
        }

        if keyname.accepts_reldep() {
            // string form of a relation filter: parse (or glob-expand)
            // into reldeps and fall through to the reldep path
            let mut deps = ReldepList::new();
            if cmp_type == cmp::GLOB {
                for m in ms {
                    deps.add_with_glob(self.pool(), m);
                }
            } else {
                for m in ms {
                    deps.add(self.pool(), m);
                }
            }
            return self.add_reldep_list_filter(keyname, &deps);
        }

        self.push(
            keyname,
            cmp_type,
            ms.iter()
                .map(|m| {
                    // trailing slash on a file match never matches anything
                    let m = if keyname == Keyname::File && m.len() > 1 {
                        m.strip_suffix('/').unwrap_or(m)
                    } else {
                        m
                    };
                    Match::Str(m.into())
                })
                .collect(),
        );
        Ok(())
    }

    /// Apply a loosely parsed NEVRA as a set of component filters
    pub fn add_nevra_filter(&mut self, nevra: &Nevra, icase: bool) {
        let name_cmp = if icase {
            cmp::GLOB | cmp::ICASE
        } else {
            cmp::GLOB
        };
        if !nevra.name.is_empty() && nevra.name != "*" {
            let _ = self.add_str_filter(Keyname::Name, name_cmp, &nevra.name);
        }
        if let Some(epoch) = nevra.epoch {
            let _ = self.add_num_filter(Keyname::Epoch, cmp::EQ, epoch as i64);
        }
        for (keyname, value) in [
            (Keyname::Version, &nevra.version),
            (Keyname::Release, &nevra.release),
            (Keyname::Arch, &nevra.arch),
        ] {
            if let Some(v) = value {
                if !v.is_empty() && v != "*" {
                    let _ = self.add_str_filter(keyname, cmp::GLOB, v);
                }
            }
        }
    }

    // ---- evaluation ----------------------------------------------------

    fn init_result(&mut self) {
        let mut result = self.sack.pkg_solvables_set();
        if self.flags == ExcludeFlags::ApplyExcludes {
            self.sack.recompute_considered();
            if let Some(considered) = self.pool().considered.borrow().as_ref() {
                result.intersect_with(considered);
            }
        } else {
            self.considered_cached = self.sack.recompute_considered_map(self.flags);
            if let Some(ref considered) = self.considered_cached {
                result.intersect_with(considered);
            }
        }
        self.result = Some(result);
    }

    /// Consume queued filters into the result set
    pub fn apply(&mut self) {
        if self.applied {
            return;
        }
        if self.result.is_none() {
            self.init_result();
        }
        let filters = std::mem::take(&mut self.filters);
        let mut m = PackageSet::with_capacity(self.pool().nsolvables());
        for f in &filters {
            m.clear();
            match f.keyname {
                // match-all: leaves the result untouched
                Keyname::PkgAll => continue,
                // match-nothing: forces the result empty
                Keyname::PkgEmpty => {}
                Keyname::Pkg => self.filter_pkg(f, &mut m),
                Keyname::Name => self.filter_name(f, &mut m),
                Keyname::Epoch => self.filter_epoch(f, &mut m),
                Keyname::Evr => self.filter_evr(f, &mut m),
                Keyname::Nevra => self.filter_nevra(f, &mut m),
                Keyname::Version => self.filter_version_release(f, &mut m, true),
                Keyname::Release => self.filter_version_release(f, &mut m, false),
                Keyname::Arch => self.filter_arch(f, &mut m),
                Keyname::Sourcerpm => self.filter_sourcerpm(f, &mut m),
                Keyname::Obsoletes => match f.matches.first() {
                    Some(Match::PkgSet(_)) => self.filter_obsoletes(f, &mut m),
                    _ => self.filter_rco_reldep(f, &mut m),
                },
                Keyname::ObsoletesByPriority => self.filter_obsoletes_by_priority(f, &mut m),
                Keyname::Provides => self.filter_provides_reldep(f, &mut m),
                Keyname::Conflicts
                | Keyname::Enhances
                | Keyname::Recommends
                | Keyname::Requires
                | Keyname::Suggests
                | Keyname::Supplements => match f.matches.first() {
                    Some(Match::PkgSet(_)) => self.filter_dep_solvable(f, &mut m),
                    _ => self.filter_rco_reldep(f, &mut m),
                },
                Keyname::Reponame => self.filter_reponame(f, &mut m),
                Keyname::Location => self.filter_location(f, &mut m),
                Keyname::Advisory
                | Keyname::AdvisoryBug
                | Keyname::AdvisoryCve
                | Keyname::AdvisorySeverity
                | Keyname::AdvisoryType => self.filter_advisory(f, &mut m),
                Keyname::Latest
                | Keyname::LatestPerArch
                | Keyname::LatestPerArchByPriority => self.filter_latest(f, &mut m),
                Keyname::Upgradable | Keyname::Downgradable => self.filter_updown_able(f, &mut m),
                Keyname::Upgrades | Keyname::Downgrades => self.filter_updown(f, &mut m),
                Keyname::UpgradesByPriority => self.filter_updown_by_priority(f, &mut m),
                Keyname::Description | Keyname::Summary | Keyname::Url | Keyname::File => {
                    self.filter_strings(f, &mut m)
                }
                Keyname::NevraStrict => unreachable!("strict NEVRA filters apply eagerly"),
            }
            let result = self.result.as_mut().expect("initialized above");
            if f.cmp_type & cmp::NOT != 0 {
                result.subtract(&m);
            } else {
                result.intersect_with(&m);
            }
        }
        self.applied = true;
    }

    fn result_ref(&self) -> &PackageSet {
        self.result.as_ref().expect("query applied")
    }

    fn result_mut(&mut self) -> &mut PackageSet {
        self.result.as_mut().expect("query applied")
    }

    /// Apply and borrow the result set
    pub fn run_set(&mut self) -> &PackageSet {
        self.apply();
        self.result_ref()
    }

    /// Apply and clone the result set
    pub fn result_set(&mut self) -> PackageSet {
        self.apply();
        self.result_ref().clone()
    }

    pub fn size(&mut self) -> usize {
        self.apply();
        self.result_ref().len()
    }

    pub fn is_empty(&mut self) -> bool {
        self.apply();
        self.result_ref().is_empty()
    }

    // ---- set algebra ---------------------------------------------------

    pub fn union(&mut self, other: &mut Query<'_>) {
        self.apply();
        other.apply();
        self.result_mut().union_with(other.result_ref());
    }

    pub fn intersection(&mut self, other: &mut Query<'_>) {
        self.apply();
        other.apply();
        self.result_mut().intersect_with(other.result_ref());
    }

    pub fn difference(&mut self, other: &mut Query<'_>) {
        self.apply();
        other.apply();
        self.result_mut().subtract(other.result_ref());
    }

    // ---- evaluators ----------------------------------------------------

    fn filter_pkg(&self, f: &Filter, m: &mut PackageSet) {
        if let Some(Match::PkgSet(pset)) = f.matches.first() {
            *m = pset.clone();
        }
    }

    fn filter_name(&self, f: &Filter, m: &mut PackageSet) {
        let pool = self.pool();
        let result = self.result_ref();
        let cmp_type = f.cmp_type;

        if cmp_type & cmp::EQ != 0 && cmp_type & cmp::ICASE == 0 {
            if f.matches.len() < 3 {
                for mat in &f.matches {
                    let Some(name_id) = pool.str2id(mat.str()) else {
                        continue;
                    };
                    for id in result.iter() {
                        if pool.solvable(id).name == name_id {
                            m.set(id);
                        }
                    }
                }
            } else {
                // many names: binary-search sorted interned ids per solvable
                let mut names: Vec<Id> =
                    f.matches.iter().filter_map(|mat| pool.str2id(mat.str())).collect();
                names.sort_unstable();
                for id in result.iter() {
                    if names.binary_search(&pool.solvable(id).name).is_ok() {
                        m.set(id);
                    }
                }
            }
            return;
        }

        let icase = cmp_type & cmp::ICASE != 0;
        for mat in &f.matches {
            let pattern = mat.str();
            for id in result.iter() {
                let name = pool.id2str(pool.solvable(id).name);
                let hit = if cmp_type & cmp::GLOB != 0 {
                    glob_match(pattern, name, icase)
                } else if cmp_type & cmp::SUBSTR != 0 {
                    if icase {
                        name.to_ascii_lowercase()
                            .contains(&pattern.to_ascii_lowercase())
                    } else {
                        name.contains(pattern)
                    }
                } else if cmp_type & cmp::EQ != 0 {
                    name.eq_ignore_ascii_case(pattern)
                } else {
                    false
                };
                if hit {
                    m.set(id);
                }
            }
        }
    }

    fn filter_epoch(&self, f: &Filter, m: &mut PackageSet) {
        let pool = self.pool();
        for mat in &f.matches {
            let epoch = mat.num() as u64;
            for id in self.result_ref().iter() {
                let pkg_epoch = evr::epoch_of(pool.id2str(pool.solvable(id).evr));
                let hit = (pkg_epoch > epoch && f.cmp_type & cmp::GT != 0)
                    || (pkg_epoch < epoch && f.cmp_type & cmp::LT != 0)
                    || (pkg_epoch == epoch && f.cmp_type & cmp::EQ != 0);
                if hit {
                    m.set(id);
                }
            }
        }
    }

    fn filter_evr(&self, f: &Filter, m: &mut PackageSet) {
        let pool = self.pool();
        for mat in &f.matches {
            for id in self.result_ref().iter() {
                let ord = pool.evrcmp_str(pool.solvable(id).evr, mat.str());
                if ord_hits(ord, f.cmp_type) {
                    m.set(id);
                }
            }
        }
    }

    fn filter_nevra(&self, f: &Filter, m: &mut PackageSet) {
        let pool = self.pool();
        let icase = f.cmp_type & cmp::ICASE != 0;
        for mat in &f.matches {
            let pattern = mat.str();
            if pattern.contains(['(', '/', '=', '<', '>', ' ']) {
                continue;
            }
            let present_epoch = pattern.contains(':');
            for id in self.result_ref().iter() {
                let nevra = pool.solvid2str_epoch(id, present_epoch);
                let hit = if f.cmp_type & cmp::GLOB != 0 {
                    glob_match(pattern, &nevra, icase)
                } else if icase {
                    nevra.eq_ignore_ascii_case(pattern)
                } else {
                    nevra == pattern
                };
                if hit {
                    m.set(id);
                }
            }
        }
    }

    /// VERSION and RELEASE share one evaluator: the missing half of the
    /// version-release pair is pinned to "0" before comparing
    fn filter_version_release(&self, f: &Filter, m: &mut PackageSet, version: bool) {
        let pool = self.pool();
        for mat in &f.matches {
            let pattern = mat.str();
            let filter_vr = if version {
                format!("{}-0", pattern)
            } else {
                format!("0-{}", pattern)
            };
            for id in self.result_ref().iter() {
                let evr_str = pool.id2str(pool.solvable(id).evr);
                let (_, v, r) = evr::split_evr(evr_str);
                let component = if version { v } else { r };
                if f.cmp_type & cmp::GLOB != 0 {
                    if glob_match(pattern, component, false) {
                        m.set(id);
                    }
                    continue;
                }
                let vr = if version {
                    format!("{}-0", v)
                } else {
                    format!("0-{}", r)
                };
                if ord_hits(evr::compare_evr(&vr, &filter_vr), f.cmp_type) {
                    m.set(id);
                }
            }
        }
    }

    fn filter_arch(&self, f: &Filter, m: &mut PackageSet) {
        let pool = self.pool();
        for mat in &f.matches {
            if f.cmp_type & cmp::EQ != 0 {
                let Some(arch_id) = pool.str2id(mat.str()) else {
                    continue;
                };
                for id in self.result_ref().iter() {
                    if pool.solvable(id).arch == arch_id {
                        m.set(id);
                    }
                }
            } else if f.cmp_type & cmp::GLOB != 0 {
                for id in self.result_ref().iter() {
                    if glob_match(mat.str(), pool.id2str(pool.solvable(id).arch), false) {
                        m.set(id);
                    }
                }
            }
        }
    }

    fn filter_sourcerpm(&self, f: &Filter, m: &mut PackageSet) {
        let pool = self.pool();
        for mat in &f.matches {
            for id in self.result_ref().iter() {
                if pool.solvable(id).sourcerpm.as_deref() == Some(mat.str()) {
                    m.set(id);
                }
            }
        }
    }

    fn filter_location(&self, f: &Filter, m: &mut PackageSet) {
        let pool = self.pool();
        for mat in &f.matches {
            for id in self.result_ref().iter() {
                if pool.solvable(id).location.as_deref() == Some(mat.str()) {
                    m.set(id);
                }
            }
        }
    }

    fn filter_reponame(&self, f: &Filter, m: &mut PackageSet) {
        let pool = self.pool();
        let mut wanted = vec![false; pool.repos().count() + 1];
        for (repo_id, repo) in pool.repos() {
            if f.matches.iter().any(|mat| mat.str() == repo.name) {
                wanted[repo_id as usize] = true;
            }
        }
        for id in self.result_ref().iter() {
            if wanted[pool.solvable(id).repo as usize] {
                m.set(id);
            }
        }
    }

    /// Reldep match against a relation array: the candidate is set when
    /// any of its entries overlaps any filter reldep
    fn filter_rco_reldep(&self, f: &Filter, m: &mut PackageSet) {
        let pool = self.pool();
        let kind = keyname_dep_kind(f.keyname);
        for id in self.result_ref().iter() {
            let deps = pool.solvable(id).deps(kind);
            'matches: for mat in &f.matches {
                let Match::Reldep(filter_dep) = mat else { continue };
                for &d in deps {
                    if pool.match_dep(*filter_dep, d) {
                        m.set(id);
                        break 'matches;
                    }
                }
            }
        }
    }

    /// Package-set match against a relation array: a candidate is set
    /// when its array names any solvable in the filter set
    fn filter_dep_solvable(&self, f: &Filter, m: &mut PackageSet) {
        let pool = self.pool();
        self.sack.make_provides_ready();
        let Some(Match::PkgSet(target)) = f.matches.first() else {
            return;
        };
        let kind = keyname_dep_kind(f.keyname);
        for target_id in target.iter() {
            for candidate in pool.pkg_ids() {
                for &d in pool.solvable(candidate).deps(kind) {
                    if pool.match_nevr(target_id, &pool.reldep(d)) {
                        m.set(candidate);
                        break;
                    }
                }
            }
        }
    }

    fn filter_provides_reldep(&self, f: &Filter, m: &mut PackageSet) {
        let pool = self.pool();
        self.sack.make_provides_ready();
        for mat in &f.matches {
            let Match::Reldep(dep) = mat else { continue };
            for p in pool.whatprovides(*dep) {
                m.set(p);
            }
        }
    }

    fn obsoletes_match(&self, candidate: Id, target: &PackageSet, m: &mut PackageSet) {
        let pool = self.pool();
        for &d in &pool.solvable(candidate).obsoletes {
            let dep = pool.reldep(d);
            for r in pool.whatprovides(d) {
                if !target.has(r) {
                    continue;
                }
                if !pool.obsolete_uses_provides && !pool.match_nevr(r, &dep) {
                    continue;
                }
                m.set(candidate);
                return;
            }
        }
    }

    fn filter_obsoletes(&self, f: &Filter, m: &mut PackageSet) {
        self.sack.make_provides_ready();
        let Some(Match::PkgSet(target)) = f.matches.first() else {
            return;
        };
        for id in self.result_ref().iter() {
            self.obsoletes_match(id, target, m);
        }
    }

    fn filter_obsoletes_by_priority(&self, f: &Filter, m: &mut PackageSet) {
        let pool = self.pool();
        self.sack.make_provides_ready();
        let Some(Match::PkgSet(target)) = f.matches.first() else {
            return;
        };
        let mut candidates: Vec<Id> = self.result_ref().iter().collect();
        if candidates.is_empty() {
            return;
        }
        candidates.sort_by(|&a, &b| {
            let (sa, sb) = (pool.solvable(a), pool.solvable(b));
            sa.name
                .cmp(&sb.name)
                .then_with(|| pool.repo_priority(b).cmp(&pool.repo_priority(a)))
        });
        let mut name = 0;
        let mut priority = 0;
        for &candidate in &candidates {
            let s = pool.solvable(candidate);
            if pool.is_installed(candidate) {
                self.obsoletes_match(candidate, target, m);
            }
            if name != s.name {
                name = s.name;
                priority = pool.repo_priority(candidate);
                self.obsoletes_match(candidate, target, m);
            } else if priority == pool.repo_priority(candidate) {
                self.obsoletes_match(candidate, target, m);
            }
        }
    }

    fn filter_latest(&self, f: &Filter, m: &mut PackageSet) {
        let pool = self.pool();
        let keyname = f.keyname;
        let by_arch = matches!(
            keyname,
            Keyname::LatestPerArch | Keyname::LatestPerArchByPriority
        );
        for mat in &f.matches {
            let latest = mat.num();
            if latest == 0 {
                continue;
            }
            let mut samename: Vec<Id> = self.result_ref().iter().collect();
            samename.sort_by(|&a, &b| {
                let (sa, sb) = (pool.solvable(a), pool.solvable(b));
                let mut ord = sa.name.cmp(&sb.name);
                if by_arch {
                    ord = ord.then_with(|| sa.arch.cmp(&sb.arch));
                }
                if keyname == Keyname::LatestPerArchByPriority {
                    ord = ord.then_with(|| pool.repo_priority(b).cmp(&pool.repo_priority(a)));
                }
                ord.then_with(|| pool.evrcmp(sb.evr, sa.evr)).then(a.cmp(&b))
            });

            // blocks per name(/arch); under priority grouping only the
            // highest-priority run of each block lands in the map
            let mut highest: Option<Id> = None;
            let mut make_block = true;
            let mut start_block = 0usize;
            let mut started = false;
            for (i, &p) in samename.iter().enumerate() {
                let considered = pool.solvable(p);
                let new_block = match highest {
                    None => true,
                    Some(h) => {
                        let hs = pool.solvable(h);
                        hs.name != considered.name || (by_arch && hs.arch != considered.arch)
                    }
                };
                if new_block {
                    if !started {
                        highest = Some(p);
                        start_block = i;
                        started = true;
                        continue;
                    }
                    if make_block {
                        add_latest_to_map(pool, m, &samename[start_block..i], latest);
                    } else {
                        make_block = true;
                    }
                    highest = Some(p);
                    start_block = i;
                } else if keyname == Keyname::LatestPerArchByPriority
                    && pool.repo_priority(highest.expect("block started"))
                        != pool.repo_priority(p)
                    && make_block
                {
                    add_latest_to_map(pool, m, &samename[start_block..i], latest);
                    make_block = false;
                }
            }
            if started && make_block {
                add_latest_to_map(pool, m, &samename[start_block..], latest);
            }
        }
    }

    fn filter_updown(&self, f: &Filter, m: &mut PackageSet) {
        let pool = self.pool();
        self.sack.make_provides_ready();
        if pool.installed_repo().is_none() {
            return;
        }
        let downgrades = f.keyname == Keyname::Downgrades;
        for mat in &f.matches {
            if mat.num() == 0 {
                continue;
            }
            for id in self.result_ref().iter() {
                if pool.is_installed(id) {
                    continue;
                }
                let hit = if downgrades {
                    pool.what_downgrades(id).is_some()
                } else {
                    pool.what_upgrades(id).is_some()
                };
                if hit {
                    m.set(id);
                }
            }
        }
    }

    fn filter_updown_by_priority(&self, f: &Filter, m: &mut PackageSet) {
        let pool = self.pool();
        self.sack.make_provides_ready();
        if pool.installed_repo().is_none() {
            return;
        }
        for mat in &f.matches {
            if mat.num() == 0 {
                continue;
            }
            let mut candidates: Vec<Id> = self
                .result_ref()
                .iter()
                .filter(|&id| !pool.is_installed(id))
                .collect();
            if candidates.is_empty() {
                continue;
            }
            candidates.sort_by(|&a, &b| {
                let (sa, sb) = (pool.solvable(a), pool.solvable(b));
                sa.name
                    .cmp(&sb.name)
                    .then_with(|| pool.repo_priority(b).cmp(&pool.repo_priority(a)))
            });
            let mut name = 0;
            let mut priority = 0;
            for &candidate in &candidates {
                let s = pool.solvable(candidate);
                let in_best_group = if name != s.name {
                    name = s.name;
                    priority = pool.repo_priority(candidate);
                    true
                } else {
                    priority == pool.repo_priority(candidate)
                };
                if in_best_group && pool.what_upgrades(candidate).is_some() {
                    m.set(candidate);
                }
            }
        }
    }

    /// Symmetric dual of up/downgrades: sets the *installed* solvables
    /// some available candidate would move
    fn filter_updown_able(&self, f: &Filter, m: &mut PackageSet) {
        let pool = self.pool();
        self.sack.make_provides_ready();
        if pool.installed_repo().is_none() {
            return;
        }
        let downgradable = f.keyname == Keyname::Downgradable;
        let result = self.result_ref();
        for mat in &f.matches {
            if mat.num() == 0 {
                continue;
            }
            for p in pool.pkg_ids() {
                let masked = if self.flags == ExcludeFlags::ApplyExcludes {
                    !pool.is_considered(p)
                } else {
                    self.considered_cached
                        .as_ref()
                        .is_some_and(|map| !map.has(p))
                };
                if masked || pool.is_installed(p) {
                    continue;
                }
                let target = if downgradable {
                    pool.what_downgrades(p)
                } else {
                    pool.what_upgrades(p)
                };
                if let Some(target) = target {
                    if result.has(target) {
                        m.set(target);
                    }
                }
            }
        }
    }

    fn filter_strings(&self, f: &Filter, m: &mut PackageSet) {
        let pool = self.pool();
        let icase = f.cmp_type & cmp::ICASE != 0;
        for mat in &f.matches {
            let pattern = mat.str();
            for id in self.result_ref().iter() {
                let s = pool.solvable(id);
                let hit = match f.keyname {
                    Keyname::Description => {
                        s.description.as_deref().is_some_and(|v| {
                            string_hit(pattern, v, f.cmp_type, icase)
                        })
                    }
                    Keyname::Summary => s
                        .summary
                        .as_deref()
                        .is_some_and(|v| string_hit(pattern, v, f.cmp_type, icase)),
                    Keyname::Url => s
                        .url
                        .as_deref()
                        .is_some_and(|v| string_hit(pattern, v, f.cmp_type, icase)),
                    Keyname::File => s
                        .files
                        .iter()
                        .any(|file| string_hit(pattern, file, f.cmp_type, icase)),
                    _ => false,
                };
                if hit {
                    m.set(id);
                }
            }
        }
    }

    fn filter_advisory(&self, f: &Filter, m: &mut PackageSet) {
        let pool = self.pool();
        let mut pkgs: Vec<crate::advisory::AdvisoryPkg> = Vec::new();
        for advisory in self.sack.advisories() {
            let hit = f.matches.iter().any(|mat| match f.keyname {
                Keyname::Advisory => advisory.match_name(mat.str()),
                Keyname::AdvisoryBug => advisory.match_bug(mat.str()),
                Keyname::AdvisoryCve => advisory.match_cve(mat.str()),
                Keyname::AdvisoryType => advisory.match_kind(mat.str()),
                Keyname::AdvisorySeverity => advisory.match_severity(mat.str()),
                _ => false,
            });
            if hit {
                pkgs.extend_from_slice(&advisory.packages);
            }
        }
        pkgs.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then(a.arch.cmp(&b.arch))
                .then_with(|| pool.evrcmp(a.evr, b.evr))
        });

        let cmp_type = f.cmp_type;
        if cmp_type & cmp::EQG != 0 {
            self.filter_advisory_eqg(f, m, &pkgs);
            return;
        }

        for id in self.result_ref().iter() {
            if pkgs.is_empty() {
                break;
            }
            let s = pool.solvable(id);
            let start = pkgs.partition_point(|p| {
                p.name.cmp(&s.name).then(p.arch.cmp(&s.arch)) == Ordering::Less
            });
            for p in &pkgs[start..] {
                if p.name != s.name || p.arch != s.arch {
                    break;
                }
                if cmp_type == cmp::EQ {
                    if p.evr == s.evr {
                        m.set(id);
                        break;
                    }
                } else if ord_hits(pool.evrcmp(s.evr, p.evr), cmp_type) {
                    m.set(id);
                    break;
                }
            }
        }
    }

    /// Advisory filtering with upgrade semantics: restrict to candidates
    /// that continue an installed (name, arch) line or obsolete one, keep
    /// only the highest-priority tier, and skip advisories already
    /// satisfied by the installed version
    fn filter_advisory_eqg(
        &self,
        f: &Filter,
        m: &mut PackageSet,
        pkgs: &[crate::advisory::AdvisoryPkg],
    ) {
        let pool = self.pool();
        let cmp_type = f.cmp_type;
        let noarch = pool.str2id("noarch");
        let mut installed_solvables: Vec<Id> = Vec::new();
        let mut candidates: Vec<Id>;

        if cmp_type & cmp::UPGRADE != 0 {
            let mut installed_q = Query::with_flags(self.sack, ExcludeFlags::IgnoreExcludes);
            installed_q.installed();
            installed_q.push(Keyname::LatestPerArch, cmp::EQ, vec![Match::Num(1)]);
            installed_q.apply();
            installed_solvables = installed_q.result_ref().iter().collect();
            installed_solvables.sort_by_key(|&id| pool.solvable(id).name);

            // candidates that obsolete something installed or about to be
            let mut possibly_obsoleted =
                Query::with_flags(self.sack, ExcludeFlags::IgnoreExcludes);
            possibly_obsoleted.push(
                Keyname::Pkg,
                cmp::EQ,
                vec![Match::PkgSet(self.result_ref().clone())],
            );
            possibly_obsoleted.push(Keyname::Upgrades, cmp::EQ, vec![Match::Num(1)]);
            possibly_obsoleted.union(&mut installed_q);

            let mut obsoletes_q = Query::with_flags(self.sack, ExcludeFlags::IgnoreExcludes);
            obsoletes_q.push(
                Keyname::Pkg,
                cmp::EQ,
                vec![Match::PkgSet(self.result_ref().clone())],
            );
            obsoletes_q.available();
            obsoletes_q.push(
                Keyname::Obsoletes,
                cmp::EQ,
                vec![Match::PkgSet(possibly_obsoleted.result_set())],
            );
            candidates = obsoletes_q.result_set().iter().collect();

            // plus candidates continuing an installed (name, arch) line
            for id in self.result_ref().iter() {
                let s = pool.solvable(id);
                let start = installed_solvables
                    .partition_point(|&i| pool.solvable(i).name < s.name);
                for &inst in &installed_solvables[start..] {
                    let is = pool.solvable(inst);
                    if is.name != s.name {
                        break;
                    }
                    if s.arch == is.arch
                        || Some(s.arch) == noarch
                        || Some(is.arch) == noarch
                    {
                        candidates.push(id);
                        break;
                    }
                }
            }

            // among ties keep the installed plus highest-priority tier
            candidates.sort_by(|&a, &b| {
                let (sa, sb) = (pool.solvable(a), pool.solvable(b));
                sa.name
                    .cmp(&sb.name)
                    .then(sa.arch.cmp(&sb.arch))
                    .then_with(|| pool.repo_priority(b).cmp(&pool.repo_priority(a)))
            });
            let mut tiered = Vec::with_capacity(candidates.len());
            let mut name = 0;
            let mut arch = 0;
            let mut priority = 0;
            for &candidate in &candidates {
                let s = pool.solvable(candidate);
                if pool.is_installed(candidate) {
                    tiered.push(candidate);
                } else if name != s.name || arch != s.arch {
                    name = s.name;
                    arch = s.arch;
                    priority = pool.repo_priority(candidate);
                    tiered.push(candidate);
                } else if priority == pool.repo_priority(candidate) {
                    tiered.push(candidate);
                }
            }
            candidates = tiered;
        } else {
            candidates = self.result_ref().iter().collect();
        }

        let key = |a: Id, p: &crate::advisory::AdvisoryPkg| {
            let s = pool.solvable(a);
            s.name
                .cmp(&p.name)
                .then(s.arch.cmp(&p.arch))
                .then_with(|| pool.evrcmp(s.evr, p.evr))
        };
        candidates.sort_by(|&a, &b| {
            let (sa, sb) = (pool.solvable(a), pool.solvable(b));
            sa.name
                .cmp(&sb.name)
                .then(sa.arch.cmp(&sb.arch))
                .then_with(|| pool.evrcmp(sa.evr, sb.evr))
        });

        for advisory_pkg in pkgs {
            if cmp_type & cmp::UPGRADE != 0 {
                // skip advisory packages not newer than the installed line
                let start = installed_solvables
                    .partition_point(|&i| pool.solvable(i).name < advisory_pkg.name);
                let superseded = installed_solvables[start..]
                    .iter()
                    .take_while(|&&i| pool.solvable(i).name == advisory_pkg.name)
                    .any(|&i| {
                        let is = pool.solvable(i);
                        is.arch == advisory_pkg.arch
                            && pool.evrcmp(is.evr, advisory_pkg.evr) != Ordering::Less
                    });
                if superseded {
                    continue;
                }
            }
            let start =
                candidates.partition_point(|&c| key(c, advisory_pkg) == Ordering::Less);
            let mut iter = candidates[start..].iter();
            if let Some(&first) = iter.next() {
                let s = pool.solvable(first);
                if s.name == advisory_pkg.name && s.arch == advisory_pkg.arch {
                    m.set(first);
                    if cmp_type & cmp::GT != 0 {
                        for &next in iter {
                            let ns = pool.solvable(next);
                            if ns.name != advisory_pkg.name || ns.arch != advisory_pkg.arch {
                                break;
                            }
                            m.set(next);
                        }
                    }
                }
            }
        }
    }

    /// Strict NEVRA filtering, applied eagerly against the current result
    fn filter_nevra_strict(&mut self, cmp_type: u32, matches: &[&str]) {
        let pool = self.pool();
        let intern_evr = cmp_type & (cmp::LT | cmp::GT) == 0;
        let mut compare_set: Vec<NevraId> = matches
            .iter()
            .filter_map(|p| NevraId::parse(pool, p, intern_evr))
            .collect();

        if compare_set.is_empty() {
            if cmp_type & cmp::NOT == 0 {
                self.result_mut().clear();
            }
            return;
        }

        let mut hits = PackageSet::with_capacity(pool.nsolvables());
        if intern_evr {
            compare_set.sort_by_key(|n| (n.name, n.arch, n.evr));
            for id in self.result_ref().iter() {
                let s = pool.solvable(id);
                if compare_set
                    .binary_search_by_key(&(s.name, s.arch, s.evr), |n| (n.name, n.arch, n.evr))
                    .is_ok()
                {
                    hits.set(id);
                }
            }
        } else {
            compare_set.sort_by_key(|n| (n.name, n.arch));
            for id in self.result_ref().iter() {
                let s = pool.solvable(id);
                let start = compare_set
                    .partition_point(|n| (n.name, n.arch) < (s.name, s.arch));
                for n in &compare_set[start..] {
                    if n.name != s.name || n.arch != s.arch {
                        break;
                    }
                    let evr_str = n.evr_str.as_deref().expect("string mode");
                    if ord_hits(pool.evrcmp_str(s.evr, evr_str), cmp_type) {
                        hits.set(id);
                        break;
                    }
                }
            }
        }

        if cmp_type & cmp::NOT != 0 {
            self.result_mut().subtract(&hits);
        } else {
            self.result_mut().intersect_with(&hits);
        }
    }

    // ---- reducers ------------------------------------------------------

    /// Keep only solvables from the installed repo
    pub fn installed(&mut self) {
        self.apply();
        let pool = self.pool();
        match pool.installed_repo() {
            None => self.result_mut().clear(),
            Some(repo) => {
                let keep: Vec<Id> = self
                    .result_ref()
                    .iter()
                    .filter(|&id| pool.solvable(id).repo == repo)
                    .collect();
                let result = self.result_mut();
                result.clear();
                for id in keep {
                    result.set(id);
                }
            }
        }
    }

    /// Drop solvables from the installed repo
    pub fn available(&mut self) {
        self.apply();
        let pool = self.pool();
        let Some(repo) = pool.installed_repo() else {
            return;
        };
        let drop: Vec<Id> = self
            .result_ref()
            .iter()
            .filter(|&id| pool.solvable(id).repo == repo)
            .collect();
        for id in drop {
            self.result_mut().remove(id);
        }
    }

    /// Installed packages with no (name, arch) counterpart among all
    /// available packages; modular excludes still hide candidates but
    /// regular excludes do not
    pub fn filter_extras(&mut self) {
        self.apply();
        let pool = self.pool();

        let mut query_installed = self.clone();
        query_installed.installed();
        self.result_mut().clear();
        if query_installed.size() == 0 {
            return;
        }

        let mut query_available =
            Query::with_flags(self.sack, ExcludeFlags::IgnoreRegularExcludes);
        query_available.available();
        let mut names_arch: Vec<(Id, Id)> = query_available
            .run_set()
            .iter()
            .map(|id| {
                let s = pool.solvable(id);
                (s.name, s.arch)
            })
            .collect();
        names_arch.sort_unstable();

        for id in query_installed.run_set().iter() {
            let s = pool.solvable(id);
            if names_arch.binary_search(&(s.name, s.arch)).is_err() {
                self.result_mut().set(id);
            }
        }
    }

    /// Installed packages whose name group spans more than one EVR
    pub fn filter_duplicated(&mut self) {
        self.installed();
        let pool = self.pool();
        let samename = self.name_ordered_ids();

        self.result_mut().clear();
        let mut start_block = 0usize;
        let mut highest: Option<Id> = None;
        let mut started = false;
        let mut blocks: Vec<(usize, usize)> = Vec::new();
        for (i, &p) in samename.iter().enumerate() {
            let considered = pool.solvable(p);
            let new_block = match highest {
                None => true,
                Some(h) => pool.solvable(h).name != considered.name,
            };
            if new_block {
                if started && start_block != i - 1 {
                    blocks.push((start_block, i));
                }
                highest = Some(p);
                start_block = i;
                started = true;
            }
        }
        if started {
            blocks.push((start_block, samename.len()));
        }
        for (start, stop) in blocks {
            add_duplicates_to_map(pool, self.result_mut(), &samename[start..stop]);
        }
    }

    /// Drop solvables built at or before the cutoff
    pub fn filter_recent(&mut self, cutoff: u64) {
        self.apply();
        let pool = self.pool();
        let drop: Vec<Id> = self
            .result_ref()
            .iter()
            .filter(|&id| pool.solvable(id).buildtime <= cutoff)
            .collect();
        for id in drop {
            self.result_mut().remove(id);
        }
    }

    fn filter_unneeded_or_safe_to_remove(
        &mut self,
        history: &dyn HistoryDb,
        safe_to_remove: bool,
    ) -> Result<()> {
        self.apply();
        let mut goal = Goal::new(self.sack);
        let mut installed = Query::new(self.sack);
        installed.installed();
        let mut user_installed = installed.result_set();
        history.filter_userinstalled(&mut user_installed);
        if safe_to_remove {
            user_installed.subtract(self.result_ref());
        }
        goal.user_installed_set(&user_installed);

        if !goal.run(crate::goal::actions::NONE) {
            return Err(Error::NoSolution);
        }
        let unneeded = goal.list_unneeded()?;
        self.result_mut().intersect_with(&unneeded);
        Ok(())
    }

    /// Reduce to installed packages nothing user-installed depends on
    pub fn filter_unneeded(&mut self, history: &dyn HistoryDb) -> Result<()> {
        self.filter_unneeded_or_safe_to_remove(history, false)
    }

    /// Like `filter_unneeded`, but pretends the current result is
    /// already gone when computing what the user still needs
    pub fn filter_safe_to_remove(&mut self, history: &dyn HistoryDb) -> Result<()> {
        self.filter_unneeded_or_safe_to_remove(history, true)
    }

    /// Reduce to installed packages the user originally asked for
    pub fn filter_user_installed(&mut self, history: &dyn HistoryDb) {
        self.installed();
        history.filter_userinstalled(self.result_mut());
    }

    /// Interpret a user subject: NEVRA forms first, then provides, then
    /// file patterns. The first non-empty interpretation wins; when none
    /// matches the result is forced empty.
    pub fn filter_subject(
        &mut self,
        subject: &str,
        forms: Option<&[Form]>,
        icase: bool,
        with_nevra: bool,
        with_provides: bool,
        with_filenames: bool,
    ) -> (bool, Option<Nevra>) {
        self.apply();
        let orig = self.clone();

        if with_nevra {
            let try_forms = forms.unwrap_or(FORMS_MOST_SPEC);
            for &form in try_forms {
                if let Some(nevra) = Nevra::parse(subject, form) {
                    self.add_nevra_filter(&nevra, icase);
                    if !self.is_empty() {
                        return (true, Some(nevra));
                    }
                    *self = orig.clone();
                }
            }
            if forms.is_none() {
                *self = orig.clone();
                let _ = self.add_str_filter(Keyname::Nevra, cmp::GLOB, subject);
                if !self.is_empty() {
                    return (true, None);
                }
            }
        }

        if with_provides {
            *self = orig.clone();
            let _ = self.add_str_filter(Keyname::Provides, cmp::GLOB, subject);
            if !self.is_empty() {
                return (true, None);
            }
        }

        if with_filenames && is_file_pattern(subject) {
            *self = orig.clone();
            let _ = self.add_str_filter(Keyname::File, cmp::GLOB, subject);
            if !self.is_empty() {
                return (true, None);
            }
        }

        *self = orig;
        self.push(Keyname::PkgEmpty, cmp::EQ, vec![Match::Num(1)]);
        self.apply();
        (false, None)
    }

    /// Advisory packages applicable to the current result by (name,
    /// arch), kept when the advisory EVR relates to the installed one
    /// as requested
    pub fn get_advisory_pkgs(&mut self, cmp_type: u32) -> Vec<crate::advisory::AdvisoryPkg> {
        self.apply();
        let pool = self.pool();
        let mut pkgs: Vec<crate::advisory::AdvisoryPkg> = self
            .sack
            .advisories()
            .iter()
            .flat_map(|a| a.packages.iter().copied())
            .collect();
        pkgs.sort_by_key(|p| (p.name, p.arch));

        let mut out = Vec::new();
        for id in self.result_ref().iter() {
            if pkgs.is_empty() {
                break;
            }
            let s = pool.solvable(id);
            let start = pkgs.partition_point(|p| (p.name, p.arch) < (s.name, s.arch));
            for p in &pkgs[start..] {
                if p.name != s.name || p.arch != s.arch {
                    break;
                }
                if ord_hits(pool.evrcmp(p.evr, s.evr), cmp_type) {
                    out.push(*p);
                }
            }
        }
        out
    }

    /// Collect `X` over all provides of the form `prefix(X)` in the result
    pub fn get_strings_from_provide(&mut self, prefix: &str) -> BTreeSet<String> {
        self.apply();
        let pool = self.pool();
        let mut out = BTreeSet::new();
        for id in self.result_ref().iter() {
            for &p in &pool.solvable(id).provides {
                let name = pool.id2str(pool.reldep(p).name);
                if let Some(inner) = name
                    .strip_prefix(prefix)
                    .and_then(|rest| rest.strip_prefix('('))
                    .and_then(|rest| rest.strip_suffix(')'))
                {
                    if !inner.is_empty() {
                        out.insert(inner.to_string());
                    }
                }
            }
        }
        out
    }

    /// Result ids ordered by (name, EVR descending, id)
    fn name_ordered_ids(&mut self) -> Vec<Id> {
        self.apply();
        let pool = self.pool();
        let mut ids: Vec<Id> = self.result_ref().iter().collect();
        ids.sort_by(|&a, &b| {
            let (sa, sb) = (pool.solvable(a), pool.solvable(b));
            sa.name
                .cmp(&sb.name)
                .then_with(|| pool.evrcmp(sb.evr, sa.evr))
                .then(a.cmp(&b))
        });
        debug!(count = ids.len(), "name-ordered queue built");
        ids
    }
}

fn ord_hits(ord: Ordering, cmp_type: u32) -> bool {
    (ord == Ordering::Greater && cmp_type & cmp::GT != 0)
        || (ord == Ordering::Less && cmp_type & cmp::LT != 0)
        || (ord == Ordering::Equal && cmp_type & cmp::EQ != 0)
}

fn string_hit(pattern: &str, value: &str, cmp_type: u32, icase: bool) -> bool {
    if cmp_type & cmp::GLOB != 0 {
        glob_match(pattern, value, icase)
    } else if cmp_type & cmp::SUBSTR != 0 {
        if icase {
            value
                .to_ascii_lowercase()
                .contains(&pattern.to_ascii_lowercase())
        } else {
            value.contains(pattern)
        }
    } else if icase {
        value.eq_ignore_ascii_case(pattern)
    } else {
        value == pattern
    }
}

/// Add the first `latest` distinct EVRs of a same-name block to the map;
/// a negative `latest` skips that many distinct EVRs instead
fn add_latest_to_map(pool: &Pool, m: &mut PackageSet, block: &[Id], latest: i64) {
    let Some(&first) = block.first() else { return };
    let mut version_counter: i64 = 0;
    let mut previous_evr = pool.solvable(first).evr;
    for &id in block {
        let current_evr = pool.solvable(id).evr;
        if previous_evr != current_evr {
            version_counter += 1;
            previous_evr = current_evr;
        }
        if latest > 0 {
            if version_counter >= latest {
                return;
            }
        } else if version_counter < -latest {
            continue;
        }
        m.set(id);
    }
}

/// Mark every pair in the block that differs in EVR (a same-EVR pair on
/// different arches is not a duplicate)
fn add_duplicates_to_map(pool: &Pool, result: &mut PackageSet, block: &[Id]) {
    for (pos, &first) in block.iter().enumerate() {
        let s_first = pool.solvable(first);
        for &second in &block[pos + 1..] {
            let s_second = pool.solvable(second);
            if s_first.evr == s_second.evr && s_first.arch != s_second.arch {
                continue;
            }
            result.set(first);
            result.set(second);
        }
    }
}
