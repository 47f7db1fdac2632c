// tests/query.rs

//! Query engine tests: filter evaluation, reducers, set algebra and the
//! pinned end-to-end query scenarios.

use quarry::{
    cmp, Advisory, AdvisoryKind, AdvisoryPkg, DepKind, Error, ExcludeFlags, Id, Keyname,
    MemoryHistory, PackageSet, Query, Sack,
};

/// A small two-repo universe with an installed system
fn fedora_sack() -> Sack {
    let mut sack = Sack::new();
    let system = sack.add_system_repo();
    let main = sack.add_repo("main", 0);
    let extra = sack.add_repo("extra", 10);

    sack.add_package(system, "tool", "1.0-1", "x86_64");
    sack.add_package(main, "tool", "2.0-1", "x86_64");
    sack.add_package(extra, "tool", "1.5-1", "x86_64");
    sack.add_package(system, "standalone", "3-1", "noarch");
    sack.add_package(main, "editor", "1-1", "x86_64");
    sack
}

fn ids_of(query: &mut Query<'_>) -> Vec<Id> {
    query.run_set().iter().collect()
}

#[test]
fn test_apply_is_idempotent() {
    let sack = fedora_sack();
    let mut query = Query::new(&sack);
    query.add_str_filter(Keyname::Name, cmp::EQ, "tool").unwrap();

    query.apply();
    let first = query.result_set();
    query.apply();
    let second = query.result_set();

    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
    assert!(query.applied());
}

#[test]
fn test_add_filter_reopens_query() {
    let sack = fedora_sack();
    let mut query = Query::new(&sack);
    query.add_str_filter(Keyname::Name, cmp::EQ, "tool").unwrap();
    query.apply();
    assert!(query.applied());

    query
        .add_str_filter(Keyname::Arch, cmp::EQ, "x86_64")
        .unwrap();
    assert!(!query.applied());
    assert_eq!(query.size(), 3);
}

#[test]
fn test_result_subset_of_considered() {
    let mut sack = Sack::new();
    let main = sack.add_repo("main", 0);
    let a = sack.add_package(main, "a", "1-1", "noarch");
    let b = sack.add_package(main, "b", "1-1", "noarch");
    sack.add_exclude(b);

    let mut query = Query::new(&sack);
    let ids = ids_of(&mut query);
    assert!(ids.contains(&a));
    assert!(!ids.contains(&b));

    // ignoring excludes lifts the mask
    let mut unmasked = Query::with_flags(&sack, ExcludeFlags::IgnoreExcludes);
    assert_eq!(unmasked.size(), 2);
}

#[test]
fn test_installed_available_partition() {
    let sack = fedora_sack();

    let mut installed = Query::new(&sack);
    installed.installed();
    let mut available = Query::new(&sack);
    available.available();
    let mut all = Query::new(&sack);

    let mut union = installed.result_set();
    union.union_with(available.run_set());
    assert_eq!(&union, all.run_set());
    assert!(!installed.run_set().intersects(available.run_set()));
}

#[test]
fn test_query_set_algebra() {
    let sack = fedora_sack();
    let mut tools = Query::new(&sack);
    tools.add_str_filter(Keyname::Name, cmp::EQ, "tool").unwrap();
    let mut installed = Query::new(&sack);
    installed.installed();

    let mut union = tools.clone();
    union.union(&mut installed.clone());
    let mut inter = tools.clone();
    inter.intersection(&mut installed.clone());
    let mut diff = tools.clone();
    diff.difference(&mut installed.clone());

    // union covers both operands, intersection is inside both, and
    // difference + intersection rebuild the left operand
    for id in tools.run_set().iter() {
        assert!(union.run_set().has(id));
    }
    for id in inter.run_set().iter() {
        assert!(tools.run_set().has(id) && installed.run_set().has(id));
    }
    let mut rebuilt = diff.result_set();
    rebuilt.union_with(inter.run_set());
    assert_eq!(&rebuilt, tools.run_set());
}

#[test]
fn test_latest_take_and_skip_cover_all_versions() {
    let sack = fedora_sack();

    let mut newest = Query::new(&sack);
    newest.add_str_filter(Keyname::Name, cmp::EQ, "tool").unwrap();
    newest.add_num_filter(Keyname::Latest, cmp::EQ, 1).unwrap();

    let mut rest = Query::new(&sack);
    rest.add_str_filter(Keyname::Name, cmp::EQ, "tool").unwrap();
    rest.add_num_filter(Keyname::Latest, cmp::EQ, -1).unwrap();

    assert_eq!(newest.size(), 1);
    assert_eq!(rest.size(), 2);
    assert!(!newest.run_set().intersects(rest.run_set()));

    let mut covered = newest.result_set();
    covered.union_with(rest.run_set());
    let mut tools = Query::new(&sack);
    tools.add_str_filter(Keyname::Name, cmp::EQ, "tool").unwrap();
    assert_eq!(&covered, tools.run_set());
}

#[test]
fn test_latest_per_arch() {
    let mut sack = Sack::new();
    sack.add_system_repo();
    let main = sack.add_repo("main", 0);
    sack.add_package(main, "p", "1-1", "x86_64");
    let p2_x86 = sack.add_package(main, "p", "2-1", "x86_64");
    let p2_i686 = sack.add_package(main, "p", "2-1", "i686");
    let p3_noarch = sack.add_package(main, "p", "3-1", "noarch");
    sack.add_package(main, "q", "9-1", "x86_64");

    let mut query = Query::new(&sack);
    query.add_str_filter(Keyname::Name, cmp::EQ, "p").unwrap();
    query
        .add_num_filter(Keyname::LatestPerArch, cmp::EQ, 1)
        .unwrap();

    let mut expected = PackageSet::new();
    expected.set(p2_x86);
    expected.set(p2_i686);
    expected.set(p3_noarch);
    assert_eq!(query.run_set(), &expected);
}

#[test]
fn test_nevra_strict_roundtrip() {
    let sack = fedora_sack();
    let mut all = Query::new(&sack);
    for id in all.result_set().iter() {
        let canonical = sack.pool().solvid2str(id);
        let mut query = Query::new(&sack);
        query
            .add_str_filter(Keyname::NevraStrict, cmp::EQ, &canonical)
            .unwrap();
        assert_eq!(
            ids_of(&mut query),
            vec![id],
            "strict NEVRA {} should match exactly its solvable",
            canonical
        );
    }
}

#[test]
fn test_nevra_strict_relational() {
    let sack = fedora_sack();
    let mut query = Query::new(&sack);
    query
        .add_str_filter(Keyname::NevraStrict, cmp::GT, "tool-1.2-1.x86_64")
        .unwrap();
    // tool 1.5 and 2.0 are newer than 1.2
    assert_eq!(query.size(), 2);
}

#[test]
fn test_obsoletes_package_set() {
    let mut sack = Sack::new();
    let system = sack.add_system_repo();
    let main = sack.add_repo("main", 0);
    let old = sack.add_package(system, "old", "1-1", "noarch");
    let new = sack.add_package(main, "new", "1-1", "noarch");
    sack.add_dep(new, DepKind::Obsoletes, "old").unwrap();

    let mut target = PackageSet::new();
    target.set(old);

    let mut query = Query::new(&sack);
    query
        .add_pkg_filter(Keyname::Obsoletes, cmp::EQ, &target)
        .unwrap();
    assert_eq!(ids_of(&mut query), vec![new]);
}

#[test]
fn test_duplicated_detection() {
    let mut sack = Sack::new();
    let system = sack.add_system_repo();
    let lib1 = sack.add_package(system, "lib", "1-1", "x86_64");
    let lib2_x86 = sack.add_package(system, "lib", "2-1", "x86_64");
    let lib2_i686 = sack.add_package(system, "lib", "2-1", "i686");
    sack.add_package(system, "single", "1-1", "noarch");

    let mut query = Query::new(&sack);
    query.filter_duplicated();
    let mut ids = ids_of(&mut query);
    ids.sort_unstable();
    // every id whose name group spans two distinct EVRs; the two
    // same-EVR arches are not duplicates of each other but both
    // duplicate lib-1
    assert_eq!(ids, vec![lib1, lib2_x86, lib2_i686]);
}

#[test]
fn test_empty_pool_queries_are_empty() {
    let sack = Sack::new();
    let mut query = Query::new(&sack);
    assert!(query.is_empty());
    query.installed();
    assert!(query.is_empty());
    query.available();
    assert!(query.is_empty());
}

#[test]
fn test_name_glob_substr_icase() {
    let sack = fedora_sack();

    let mut glob = Query::new(&sack);
    glob.add_str_filter(Keyname::Name, cmp::GLOB, "too*").unwrap();
    assert_eq!(glob.size(), 3);

    let mut icase = Query::new(&sack);
    icase
        .add_str_filter(Keyname::Name, cmp::EQ | cmp::ICASE, "EDITOR")
        .unwrap();
    assert_eq!(icase.size(), 1);

    let mut substr = Query::new(&sack);
    substr
        .add_str_filter(Keyname::Name, cmp::SUBSTR, "andalo")
        .unwrap();
    assert_eq!(substr.size(), 1);

    let mut neq = Query::new(&sack);
    neq.add_str_filter(Keyname::Name, cmp::NEQ, "tool").unwrap();
    assert_eq!(neq.size(), 2);
}

#[test]
fn test_provides_filter_and_unknown_provides() {
    let mut sack = Sack::new();
    sack.add_system_repo();
    let main = sack.add_repo("main", 0);
    let b = sack.add_package(main, "b", "1-1", "noarch");
    sack.add_dep(b, DepKind::Provides, "webserver = 2.0").unwrap();

    let mut query = Query::new(&sack);
    query
        .add_str_filter(Keyname::Provides, cmp::EQ, "webserver >= 1.0")
        .unwrap();
    assert_eq!(ids_of(&mut query), vec![b]);

    // unknown provide names silently force an empty result
    let mut none = Query::new(&sack);
    none.add_str_filter(Keyname::Provides, cmp::EQ, "no-such-capability")
        .unwrap();
    assert!(none.is_empty());
}

#[test]
fn test_requires_reldep_filter() {
    let mut sack = Sack::new();
    sack.add_system_repo();
    let main = sack.add_repo("main", 0);
    let app = sack.add_package(main, "app", "1-1", "noarch");
    sack.add_dep(app, DepKind::Requires, "libfoo >= 2.0").unwrap();
    sack.add_package(main, "other", "1-1", "noarch");

    let mut query = Query::new(&sack);
    query
        .add_str_filter(Keyname::Requires, cmp::EQ, "libfoo = 2.5")
        .unwrap();
    assert_eq!(ids_of(&mut query), vec![app]);
}

#[test]
fn test_evr_and_version_comparisons() {
    let sack = fedora_sack();

    let mut newer = Query::new(&sack);
    newer.add_str_filter(Keyname::Name, cmp::EQ, "tool").unwrap();
    newer.add_str_filter(Keyname::Evr, cmp::GT, "1.2-1").unwrap();
    assert_eq!(newer.size(), 2);

    let mut exact = Query::new(&sack);
    exact.add_str_filter(Keyname::Version, cmp::EQ, "2.0").unwrap();
    assert_eq!(exact.size(), 1);

    let mut epoch = Query::new(&sack);
    epoch.add_num_filter(Keyname::Epoch, cmp::EQ, 0).unwrap();
    assert_eq!(epoch.size(), 5);
}

#[test]
fn test_evr_filter_release_omitted_is_literal() {
    let sack = fedora_sack();

    // "2.0" is not "2.0-1": a release-less match string only matches a
    // release-less EVR literally
    let mut eq = Query::new(&sack);
    eq.add_str_filter(Keyname::Name, cmp::EQ, "tool").unwrap();
    eq.add_str_filter(Keyname::Evr, cmp::EQ, "2.0").unwrap();
    assert!(eq.is_empty());

    // every tool release sorts strictly above its bare version
    let mut gt = Query::new(&sack);
    gt.add_str_filter(Keyname::Name, cmp::EQ, "tool").unwrap();
    gt.add_str_filter(Keyname::Evr, cmp::GT, "2.0").unwrap();
    assert_eq!(gt.size(), 1);

    let mut lt = Query::new(&sack);
    lt.add_str_filter(Keyname::Name, cmp::EQ, "tool").unwrap();
    lt.add_str_filter(Keyname::Evr, cmp::LT, "2.0").unwrap();
    assert_eq!(lt.size(), 2);
}

#[test]
fn test_upgrades_and_upgradable() {
    let sack = fedora_sack();

    let mut upgrades = Query::new(&sack);
    upgrades.add_num_filter(Keyname::Upgrades, cmp::EQ, 1).unwrap();
    // both available tool versions are newer than the installed 1.0
    assert_eq!(upgrades.size(), 2);

    let mut upgradable = Query::new(&sack);
    upgradable
        .add_num_filter(Keyname::Upgradable, cmp::EQ, 1)
        .unwrap();
    let ids = ids_of(&mut upgradable);
    assert_eq!(ids.len(), 1);
    assert!(sack.pool().is_installed(ids[0]));
}

#[test]
fn test_upgrades_by_priority_prefers_high_repo() {
    let sack = fedora_sack();
    let mut query = Query::new(&sack);
    query
        .add_num_filter(Keyname::UpgradesByPriority, cmp::EQ, 1)
        .unwrap();
    // only the extra repo (priority 10) survives the priority cut
    let ids = ids_of(&mut query);
    assert_eq!(ids.len(), 1);
    let repo = sack.pool().solvable(ids[0]).repo;
    assert_eq!(sack.pool().repo(repo).name, "extra");
}

#[test]
fn test_extras() {
    let sack = fedora_sack();
    let mut query = Query::new(&sack);
    query.filter_extras();
    // standalone is installed with no available counterpart
    let ids = ids_of(&mut query);
    assert_eq!(ids.len(), 1);
    let name = sack.pool().solvable(ids[0]).name;
    assert_eq!(sack.pool().id2str(name), "standalone");
}

#[test]
fn test_recent_cutoff() {
    let mut sack = Sack::new();
    sack.add_system_repo();
    let main = sack.add_repo("main", 0);
    let old = sack.add_package(main, "old-build", "1-1", "noarch");
    sack.set_buildtime(old, 100);
    let fresh = sack.add_package(main, "fresh-build", "1-1", "noarch");
    sack.set_buildtime(fresh, 2_000);

    let mut query = Query::new(&sack);
    query.filter_recent(1_000);
    assert_eq!(ids_of(&mut query), vec![fresh]);
}

#[test]
fn test_reponame_filter() {
    let sack = fedora_sack();
    let mut query = Query::new(&sack);
    query
        .add_str_filter(Keyname::Reponame, cmp::EQ, "extra")
        .unwrap();
    assert_eq!(query.size(), 1);
}

#[test]
fn test_file_and_sourcerpm_filters() {
    let mut sack = Sack::new();
    sack.add_system_repo();
    let main = sack.add_repo("main", 0);
    let pkg = sack.add_package(main, "shell", "1-1", "x86_64");
    sack.add_file(pkg, "/usr/bin/shell");
    sack.set_sourcerpm(pkg, "shell-1-1.src.rpm");
    sack.add_package(main, "bare", "1-1", "x86_64");

    let mut by_file = Query::new(&sack);
    by_file
        .add_str_filter(Keyname::File, cmp::EQ, "/usr/bin/shell")
        .unwrap();
    assert_eq!(ids_of(&mut by_file), vec![pkg]);

    let mut by_glob = Query::new(&sack);
    by_glob
        .add_str_filter(Keyname::File, cmp::GLOB, "/usr/bin/*")
        .unwrap();
    assert_eq!(ids_of(&mut by_glob), vec![pkg]);

    let mut by_srpm = Query::new(&sack);
    by_srpm
        .add_str_filter(Keyname::Sourcerpm, cmp::EQ, "shell-1-1.src.rpm")
        .unwrap();
    assert_eq!(ids_of(&mut by_srpm), vec![pkg]);
}

#[test]
fn test_advisory_filters() {
    let mut sack = Sack::new();
    let system = sack.add_system_repo();
    let main = sack.add_repo("main", 0);
    let installed = sack.add_package(system, "tool", "1.0-1", "x86_64");
    let update = sack.add_package(main, "tool", "2.0-1", "x86_64");

    let name = sack.pool_mut().str2id_create("tool");
    let arch = sack.pool_mut().str2id_create("x86_64");
    let evr = sack.pool_mut().str2id_create("2.0-1");
    let mut advisory = Advisory::new("FEDORA-2024-1", AdvisoryKind::Security);
    advisory.severity = Some("Moderate".to_string());
    advisory.cves.push("CVE-2024-0001".to_string());
    advisory.packages.push(AdvisoryPkg { name, arch, evr });
    sack.add_advisory(advisory);

    // exact advisory membership
    let mut by_name = Query::new(&sack);
    by_name
        .add_str_filter(Keyname::Advisory, cmp::EQ, "FEDORA-2024-1")
        .unwrap();
    assert_eq!(ids_of(&mut by_name), vec![update]);

    // installed version is older than the advisory reference
    let mut vulnerable = Query::new(&sack);
    vulnerable.installed();
    vulnerable
        .add_str_filter(Keyname::AdvisoryCve, cmp::LT, "CVE-2024-0001")
        .unwrap();
    assert_eq!(ids_of(&mut vulnerable), vec![installed]);

    let mut by_type = Query::new(&sack);
    by_type
        .add_str_filter(Keyname::AdvisoryType, cmp::EQ, "security")
        .unwrap();
    assert_eq!(ids_of(&mut by_type), vec![update]);

    let mut by_severity = Query::new(&sack);
    by_severity
        .add_str_filter(Keyname::AdvisorySeverity, cmp::EQ, "Critical")
        .unwrap();
    assert!(by_severity.is_empty());
}

#[test]
fn test_bad_query_rejected_eagerly() {
    let sack = fedora_sack();
    let mut query = Query::new(&sack);

    assert!(matches!(
        query.add_str_filter(Keyname::Name, cmp::GT, "tool"),
        Err(Error::BadQuery(_))
    ));
    assert!(matches!(
        query.add_num_filter(Keyname::Latest, cmp::GLOB, 1),
        Err(Error::BadQuery(_))
    ));
    assert!(matches!(
        query.add_pkg_filter(Keyname::Pkg, cmp::GT, &PackageSet::new()),
        Err(Error::BadQuery(_))
    ));
    assert!(matches!(
        query.add_str_filter(Keyname::Location, cmp::GLOB, "x*"),
        Err(Error::BadQuery(_))
    ));

    // the rejected filters were never stored
    assert_eq!(query.size(), 5);
}

#[test]
fn test_glob_without_metachars_downgrades_to_eq() {
    let sack = fedora_sack();
    let mut query = Query::new(&sack);
    query
        .add_str_filter(Keyname::Name, cmp::GLOB, "tool")
        .unwrap();
    assert_eq!(query.size(), 3);
}

#[test]
fn test_filter_subject_nevra_then_provides() {
    let mut sack = Sack::new();
    sack.add_system_repo();
    let main = sack.add_repo("main", 0);
    let vim = sack.add_package(main, "vim", "9.0-1", "x86_64");
    let server = sack.add_package(main, "httpd", "2-1", "x86_64");
    sack.add_dep(server, DepKind::Provides, "webserver").unwrap();

    let mut query = Query::new(&sack);
    let (matched, nevra) = query.filter_subject("vim-9.0-1.x86_64", None, false, true, true, true);
    assert!(matched);
    assert_eq!(nevra.unwrap().name, "vim");
    assert_eq!(ids_of(&mut query), vec![vim]);

    let mut query = Query::new(&sack);
    let (matched, nevra) = query.filter_subject("webserver", None, false, true, true, true);
    assert!(matched);
    assert!(nevra.is_none());
    assert_eq!(ids_of(&mut query), vec![server]);

    let mut query = Query::new(&sack);
    let (matched, _) = query.filter_subject("no-such-thing", None, false, true, true, true);
    assert!(!matched);
    assert!(query.is_empty());
}

#[test]
fn test_get_strings_from_provide() {
    let mut sack = Sack::new();
    sack.add_system_repo();
    let main = sack.add_repo("main", 0);
    let pkg = sack.add_package(main, "engine", "1-1", "noarch");
    sack.add_dep(pkg, DepKind::Provides, "plugin(alpha)").unwrap();
    sack.add_dep(pkg, DepKind::Provides, "plugin(beta)").unwrap();
    sack.add_dep(pkg, DepKind::Provides, "unrelated").unwrap();

    let mut query = Query::new(&sack);
    let strings = query.get_strings_from_provide("plugin");
    assert_eq!(
        strings.into_iter().collect::<Vec<_>>(),
        vec!["alpha".to_string(), "beta".to_string()]
    );
}

#[test]
fn test_user_installed_reducer() {
    let mut sack = Sack::new();
    let system = sack.add_system_repo();
    let wanted = sack.add_package(system, "wanted", "1-1", "noarch");
    sack.add_package(system, "pulled-in", "1-1", "noarch");

    let mut history = MemoryHistory::new();
    history.mark_user_installed(wanted);

    let mut query = Query::new(&sack);
    query.filter_user_installed(&history);
    assert_eq!(ids_of(&mut query), vec![wanted]);
}

#[test]
fn test_unneeded_and_safe_to_remove() {
    let mut sack = Sack::new();
    let system = sack.add_system_repo();
    let lib = sack.add_package(system, "lib", "1-1", "noarch");
    let app = sack.add_package(system, "app", "1-1", "noarch");
    sack.add_dep(app, DepKind::Requires, "lib").unwrap();
    let orphan = sack.add_package(system, "orphan", "1-1", "noarch");

    let mut history = MemoryHistory::new();
    history.mark_user_installed(app);

    let mut query = Query::new(&sack);
    query.installed();
    query.filter_unneeded(&history).unwrap();
    assert_eq!(ids_of(&mut query), vec![orphan]);

    // pretending app is being removed frees lib as well
    let mut query = Query::new(&sack);
    query.add_str_filter(Keyname::Name, cmp::EQ, "app").unwrap();
    query.installed();
    let mut removal_set = query.result_set();
    removal_set.set(app);
    let mut safe = Query::new(&sack);
    safe.add_pkg_filter(Keyname::Pkg, cmp::EQ, &removal_set).unwrap();
    safe.filter_safe_to_remove(&history).unwrap();
    assert!(safe.run_set().has(app));
    assert!(!safe.run_set().has(lib));
}

#[test]
fn test_nevra_filter_with_and_without_epoch() {
    let mut sack = Sack::new();
    sack.add_system_repo();
    let main = sack.add_repo("main", 0);
    let pkg = sack.add_package(main, "gedit", "3:3.22-2", "x86_64");

    let mut with_epoch = Query::new(&sack);
    with_epoch
        .add_str_filter(Keyname::Nevra, cmp::EQ, "gedit-3:3.22-2.x86_64")
        .unwrap();
    assert_eq!(ids_of(&mut with_epoch), vec![pkg]);

    let mut glob = Query::new(&sack);
    glob.add_str_filter(Keyname::Nevra, cmp::GLOB, "gedit-*.x86_64")
        .unwrap();
    assert_eq!(ids_of(&mut glob), vec![pkg]);
}
