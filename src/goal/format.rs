// src/goal/format.rs

//! Human-readable rendering of solver problem rules
//!
//! Maps rule infos to parameterized sentences in either package or
//! module vocabulary. Package vocabulary renders a solvable as its
//! canonical NEVRA; module vocabulary renders `description:evr:summary.arch`
//! (name:stream, version, original context).

use crate::pool::{Id, Pool};
use crate::sack::Sack;
use crate::set::PackageSet;
use crate::solver::{RuleInfo, RuleType};

fn pkg_solvid2str(pool: &Pool, source: Id) -> String {
    pool.solvid2str(source)
}

fn module_solvid2str(pool: &Pool, source: Id) -> String {
    let s = pool.solvable(source);
    format!(
        "{}:{}:{}.{}",
        s.description.as_deref().unwrap_or(""),
        pool.id2str(s.evr),
        s.summary.as_deref().unwrap_or(""),
        pool.id2str(s.arch)
    )
}

fn repo_name(pool: &Pool, source: Id) -> &str {
    &pool.repo(pool.solvable(source).repo).name
}

/// Substitute `%s` placeholders left to right
fn fill(template: &str, args: &[&str]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut arg = 0;
    while let Some(pos) = rest.find("%s") {
        out.push_str(&rest[..pos]);
        if let Some(a) = args.get(arg) {
            out.push_str(a);
        }
        arg += 1;
        rest = &rest[pos + 2..];
    }
    out.push_str(rest);
    out
}

fn template(rule: RuleType, pkgs: bool) -> &'static str {
    use RuleType::*;
    if pkgs {
        match rule {
            DistUpgrade => "%s from %s  does not belong to a distupgrade repository",
            // reuses the distupgrade wording, matching long-standing behavior
            InfArch => "%s from %s  does not belong to a distupgrade repository",
            Update => "problem with installed package ",
            Job => "conflicting requests",
            JobUnsupported => "unsupported request",
            JobNothingProvidesDep => "nothing provides requested ",
            JobUnknownPackage => "package %s does not exist",
            JobProvidedBySystem => " is provided by the system",
            Pkg => "some dependency problem",
            Best => "cannot install the best candidate for the job",
            PkgNotInstallable => "package %s from %s is not installable",
            PkgNothingProvidesDep => "nothing provides %s needed by %s from %s",
            PkgSameName => "cannot install both %s from %s and %s from %s",
            PkgConflicts => "package %s from %s conflicts with %s provided by %s from %s",
            PkgObsoletes => "package %s from %s obsoletes %s provided by %s from %s",
            PkgInstalledObsoletes => "installed package %s obsoletes %s provided by %s from %s",
            PkgImplicitObsoletes => {
                "package %s from %s implicitly obsoletes %s provided by %s from %s"
            }
            PkgRequires => "package %s from %s requires %s, but none of the providers can be installed",
            PkgSelfConflict => "package %s from %s conflicts with %s provided by itself",
            Yumobs => "both package %s from %s and %s from %s obsolete %s",
        }
    } else {
        match rule {
            DistUpgrade => "%s from %s does not belong to a distupgrade repository",
            InfArch => "%s from %s does not belong to a distupgrade repository",
            Update => "problem with installed module ",
            Job => "conflicting requests",
            JobUnsupported => "unsupported request",
            JobNothingProvidesDep => "nothing provides requested ",
            JobUnknownPackage => "module %s does not exist",
            JobProvidedBySystem => " is provided by the system",
            Pkg => "some dependency problem",
            Best => "cannot install the best candidate for the job",
            PkgNotInstallable => "module %s from %s is not installable",
            PkgNothingProvidesDep => "nothing provides %s needed by module %s from %s",
            PkgSameName => "cannot install both modules %s from %s and %s from %s",
            PkgConflicts => "module %s from %s conflicts with %s provided by %s from %s",
            PkgObsoletes => "module %s from %s obsoletes %s provided by %s from %s",
            PkgInstalledObsoletes => "installed module %s obsoletes %s provided by %s from %s",
            PkgImplicitObsoletes => {
                "module %s from %s implicitly obsoletes %s provided by %s from %s"
            }
            PkgRequires => "module %s from %s requires %s, but none of the providers can be installed",
            PkgSelfConflict => "module %s from %s conflicts with %s provided by itself",
            Yumobs => "both module %s from %s and %s from %s obsolete %s",
        }
    }
}

const BEST_UPDATE_PKG: &str = "cannot install the best update candidate for package ";
const BEST_UPDATE_MODULE: &str = "cannot install the best update candidate for module ";
const NOT_INSTALLABLE_MODULAR_PKG: &str = "package %s from %s is filtered out by modular filtering";
const NOT_INSTALLABLE_EXCLUDED_PKG: &str = "package %s from %s is filtered out by exclude filtering";
const NOT_INSTALLABLE_MODULAR_MODULE: &str = "module %s from %s is disabled";
const NOT_INSTALLABLE_EXCLUDED_MODULE: &str = "module %s from %s is disabled";

/// Render one rule info into a sentence
pub(crate) fn problem_rule_to_string(
    sack: &Sack,
    modular_excludes: Option<&PackageSet>,
    info: &RuleInfo,
    pkgs: bool,
) -> String {
    let pool = sack.pool();
    let solvid2str = if pkgs {
        pkg_solvid2str
    } else {
        module_solvid2str
    };
    let RuleInfo {
        rule_type,
        source,
        target,
        dep,
    } = *info;

    match rule_type {
        RuleType::DistUpgrade | RuleType::InfArch => fill(
            template(rule_type, pkgs),
            &[&solvid2str(pool, source), repo_name(pool, source)],
        ),
        RuleType::Update => format!(
            "{}{}",
            template(rule_type, pkgs),
            solvid2str(pool, source)
        ),
        RuleType::Job | RuleType::JobUnsupported | RuleType::Pkg => {
            template(rule_type, pkgs).to_string()
        }
        RuleType::JobNothingProvidesDep => {
            format!("{}{}", template(rule_type, pkgs), pool.dep2str(dep))
        }
        RuleType::JobUnknownPackage => {
            fill(template(rule_type, pkgs), &[&pool.dep2str(dep)])
        }
        RuleType::JobProvidedBySystem => {
            format!("{}{}", pool.dep2str(dep), template(rule_type, pkgs))
        }
        RuleType::Best => {
            if source > 0 {
                let prefix = if pkgs { BEST_UPDATE_PKG } else { BEST_UPDATE_MODULE };
                format!("{}{}", prefix, solvid2str(pool, source))
            } else {
                template(rule_type, pkgs).to_string()
            }
        }
        RuleType::PkgNotInstallable => {
            let disabled = !pool.is_considered(source);
            let tmpl = if disabled {
                let modular = modular_excludes.is_some_and(|m| m.has(source));
                match (modular, pkgs) {
                    (true, true) => NOT_INSTALLABLE_MODULAR_PKG,
                    (false, true) => NOT_INSTALLABLE_EXCLUDED_PKG,
                    (true, false) => NOT_INSTALLABLE_MODULAR_MODULE,
                    (false, false) => NOT_INSTALLABLE_EXCLUDED_MODULE,
                }
            } else {
                template(rule_type, pkgs)
            };
            fill(tmpl, &[&solvid2str(pool, source), repo_name(pool, source)])
        }
        RuleType::PkgNothingProvidesDep => fill(
            template(rule_type, pkgs),
            &[
                &pool.dep2str(dep),
                &solvid2str(pool, source),
                repo_name(pool, source),
            ],
        ),
        RuleType::PkgSameName => fill(
            template(rule_type, pkgs),
            &[
                &solvid2str(pool, source),
                repo_name(pool, source),
                &solvid2str(pool, target),
                repo_name(pool, target),
            ],
        ),
        RuleType::PkgConflicts | RuleType::PkgObsoletes => fill(
            template(rule_type, pkgs),
            &[
                &solvid2str(pool, source),
                repo_name(pool, source),
                &pool.dep2str(dep),
                &solvid2str(pool, target),
                repo_name(pool, target),
            ],
        ),
        RuleType::PkgInstalledObsoletes => fill(
            template(rule_type, pkgs),
            &[
                &solvid2str(pool, source),
                &pool.dep2str(dep),
                &solvid2str(pool, target),
                repo_name(pool, target),
            ],
        ),
        RuleType::PkgImplicitObsoletes => fill(
            template(rule_type, pkgs),
            &[
                &solvid2str(pool, source),
                &pool.dep2str(dep),
                repo_name(pool, source),
                &solvid2str(pool, target),
                repo_name(pool, target),
            ],
        ),
        RuleType::PkgRequires | RuleType::PkgSelfConflict => fill(
            template(rule_type, pkgs),
            &[
                &solvid2str(pool, source),
                repo_name(pool, source),
                &pool.dep2str(dep),
            ],
        ),
        RuleType::Yumobs => fill(
            template(rule_type, pkgs),
            &[
                &solvid2str(pool, source),
                repo_name(pool, source),
                &solvid2str(pool, target),
                repo_name(pool, target),
                &pool.dep2str(dep),
            ],
        ),
    }
}

/// Render a list of problem lists for display: a single problem gets a
/// plain `Problem:` prefix, multiple problems are numbered
pub fn format_all_problem_rules(problems: &[Vec<String>]) -> String {
    if problems.is_empty() {
        return String::new();
    }
    if problems.len() == 1 {
        return format!("Problem: {}", problems[0].join("\n  - "));
    }
    let mut output = String::new();
    for (index, problem) in problems.iter().enumerate() {
        if index > 0 {
            output.push_str("\n ");
        }
        output.push_str(&format!("Problem {}: {}", index + 1, problem.join("\n  - ")));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill() {
        assert_eq!(fill("a %s and %s", &["x", "y"]), "a x and y");
        assert_eq!(fill("no placeholders", &[]), "no placeholders");
        assert_eq!(fill("%s tail", &["head"]), "head tail");
    }

    #[test]
    fn test_infarch_reuses_distupgrade_template() {
        assert_eq!(
            template(RuleType::InfArch, true),
            template(RuleType::DistUpgrade, true)
        );
    }

    #[test]
    fn test_format_single_problem() {
        let problems = vec![vec!["first rule".to_string(), "second rule".to_string()]];
        assert_eq!(
            format_all_problem_rules(&problems),
            "Problem: first rule\n  - second rule"
        );
    }

    #[test]
    fn test_format_multiple_problems() {
        let problems = vec![
            vec!["a".to_string()],
            vec!["b".to_string(), "c".to_string()],
        ];
        assert_eq!(
            format_all_problem_rules(&problems),
            "Problem 1: a\n Problem 2: b\n  - c"
        );
    }
}
