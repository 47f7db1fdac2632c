// src/pool/evr.rs

//! EVR (epoch:version-release) parsing and comparison
//!
//! This module provides version parsing and comparison for RPM-style
//! versions, including support for the epoch:version-release format and
//! the segment-wise ordering rules RPM applies (numeric segments compare
//! as numbers, alphabetic segments lexically, `~` sorts before anything,
//! `^` sorts after a shorter otherwise-equal string).

use std::cmp::Ordering;
use std::fmt;

/// A parsed EVR with epoch, version, and release components
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Evr {
    pub epoch: u64,
    pub version: String,
    pub release: Option<String>,
}

impl Evr {
    /// Parse an EVR string
    ///
    /// Format: [epoch:]version[-release]
    /// Examples:
    /// - "1.2.3" → epoch=0, version="1.2.3", release=None
    /// - "2:1.2.3" → epoch=2, version="1.2.3", release=None
    /// - "1.2.3-4.el8" → epoch=0, version="1.2.3", release=Some("4.el8")
    /// - "1:2.3.4-5.el8" → epoch=1, version="2.3.4", release=Some("5.el8")
    ///
    /// A malformed or empty epoch defaults to 0; this parser never fails,
    /// matching how the pool treats arbitrary interned EVR strings.
    pub fn parse(s: &str) -> Self {
        let (epoch_str, rest) = match s.find(':') {
            Some(pos) => (&s[..pos], &s[pos + 1..]),
            None => ("", s),
        };

        let epoch = epoch_str.parse::<u64>().unwrap_or(0);

        let (version, release) = match rest.find('-') {
            Some(pos) => (rest[..pos].to_string(), Some(rest[pos + 1..].to_string())),
            None => (rest.to_string(), None),
        };

        Self {
            epoch,
            version,
            release,
        }
    }

    /// Compare two EVRs literally: epoch first, then version, then
    /// release, with a missing release comparing as the empty string
    pub fn compare(&self, other: &Evr) -> Ordering {
        match self.epoch.cmp(&other.epoch) {
            Ordering::Equal => {}
            ord => return ord,
        }

        match vercmp(&self.version, &other.version) {
            Ordering::Equal => {}
            ord => return ord,
        }

        vercmp(
            self.release.as_deref().unwrap_or(""),
            other.release.as_deref().unwrap_or(""),
        )
    }

    /// Like `compare`, but a missing release on either side matches any
    /// release, the way "foo = 1.0" accepts every 1.0-* candidate during
    /// dependency matching
    pub fn compare_wildcard(&self, other: &Evr) -> Ordering {
        match self.epoch.cmp(&other.epoch) {
            Ordering::Equal => {}
            ord => return ord,
        }

        match vercmp(&self.version, &other.version) {
            Ordering::Equal => {}
            ord => return ord,
        }

        match (&self.release, &other.release) {
            (Some(a), Some(b)) => vercmp(a, b),
            _ => Ordering::Equal,
        }
    }
}

impl fmt::Display for Evr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch > 0 {
            write!(f, "{}:", self.epoch)?;
        }
        write!(f, "{}", self.version)?;
        if let Some(ref release) = self.release {
            write!(f, "-{}", release)?;
        }
        Ok(())
    }
}

impl Ord for Evr {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl PartialOrd for Evr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Compare two full EVR strings literally
pub fn compare_evr(a: &str, b: &str) -> Ordering {
    Evr::parse(a).compare(&Evr::parse(b))
}

/// Compare two EVR strings with a missing release matching any release;
/// only dependency matching wants this
pub fn compare_evr_wildcard(a: &str, b: &str) -> Ordering {
    Evr::parse(a).compare_wildcard(&Evr::parse(b))
}

/// Extract the epoch from an EVR string (0 when absent)
pub fn epoch_of(evr: &str) -> u64 {
    match evr.find(':') {
        Some(pos) => evr[..pos].parse::<u64>().unwrap_or(0),
        None => 0,
    }
}

/// Split an EVR string into (epoch, version, release) string slices
pub fn split_evr(evr: &str) -> (&str, &str, &str) {
    let (epoch, rest) = match evr.find(':') {
        Some(pos) => (&evr[..pos], &evr[pos + 1..]),
        None => ("0", evr),
    };
    let (version, release) = match rest.find('-') {
        Some(pos) => (&rest[..pos], &rest[pos + 1..]),
        None => (rest, ""),
    };
    (epoch, version, release)
}

/// Segment-wise version comparison following RPM rules
///
/// Walks both strings splitting them into maximal numeric or alphabetic
/// segments; separators only delimit. Numeric segments compare as numbers
/// with leading zeros stripped, and a numeric segment always beats an
/// alphabetic one. `~` sorts before everything including end-of-string;
/// `^` sorts after end-of-string but before any other character.
pub fn vercmp(a: &str, b: &str) -> Ordering {
    let mut x = a.as_bytes();
    let mut y = b.as_bytes();

    loop {
        // tilde: lowest possible ordering
        match (x.first() == Some(&b'~'), y.first() == Some(&b'~')) {
            (true, true) => {
                x = &x[1..];
                y = &y[1..];
                continue;
            }
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            (false, false) => {}
        }

        // caret: greater than end-of-string, less than anything else
        match (x.first() == Some(&b'^'), y.first() == Some(&b'^')) {
            (true, true) => {
                x = &x[1..];
                y = &y[1..];
                continue;
            }
            (true, false) => {
                return if y.is_empty() {
                    Ordering::Greater
                } else {
                    Ordering::Less
                }
            }
            (false, true) => {
                return if x.is_empty() {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            }
            (false, false) => {}
        }

        // skip separators
        while let Some(&c) = x.first() {
            if c.is_ascii_alphanumeric() {
                break;
            }
            x = &x[1..];
        }
        while let Some(&c) = y.first() {
            if c.is_ascii_alphanumeric() {
                break;
            }
            y = &y[1..];
        }

        if x.is_empty() || y.is_empty() {
            return x.len().cmp(&y.len());
        }

        let x_numeric = x[0].is_ascii_digit();
        let y_numeric = y[0].is_ascii_digit();

        // a numeric segment always wins over an alphabetic one
        if x_numeric != y_numeric {
            return if x_numeric {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        let seg_len = |s: &[u8], numeric: bool| {
            s.iter()
                .take_while(|c| {
                    if numeric {
                        c.is_ascii_digit()
                    } else {
                        c.is_ascii_alphabetic()
                    }
                })
                .count()
        };

        let xl = seg_len(x, x_numeric);
        let yl = seg_len(y, y_numeric);
        let (xs, ys) = (&x[..xl], &y[..yl]);

        let ord = if x_numeric {
            let xs = strip_leading_zeros(xs);
            let ys = strip_leading_zeros(ys);
            // longer number is larger; equal length compares bytewise
            xs.len().cmp(&ys.len()).then_with(|| xs.cmp(ys))
        } else {
            xs.cmp(ys)
        };
        if ord != Ordering::Equal {
            return ord;
        }

        x = &x[xl..];
        y = &y[yl..];
    }
}

fn strip_leading_zeros(s: &[u8]) -> &[u8] {
    let n = s.iter().take_while(|&&c| c == b'0').count();
    if n == s.len() {
        &s[s.len() - 1..]
    } else {
        &s[n..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evr_parse_simple() {
        let v = Evr::parse("1.2.3");
        assert_eq!(v.epoch, 0);
        assert_eq!(v.version, "1.2.3");
        assert_eq!(v.release, None);
    }

    #[test]
    fn test_evr_parse_with_epoch() {
        let v = Evr::parse("2:1.2.3");
        assert_eq!(v.epoch, 2);
        assert_eq!(v.version, "1.2.3");
        assert_eq!(v.release, None);
    }

    #[test]
    fn test_evr_parse_with_release() {
        let v = Evr::parse("1.2.3-4.el8");
        assert_eq!(v.epoch, 0);
        assert_eq!(v.version, "1.2.3");
        assert_eq!(v.release, Some("4.el8".to_string()));
    }

    #[test]
    fn test_evr_parse_full() {
        let v = Evr::parse("1:2.3.4-5.el8");
        assert_eq!(v.epoch, 1);
        assert_eq!(v.version, "2.3.4");
        assert_eq!(v.release, Some("5.el8".to_string()));
    }

    #[test]
    fn test_evr_parse_empty_epoch() {
        // Some metadata carries versions like ":1.02.208-2.fc43"
        let v = Evr::parse(":1.02.208-2.fc43");
        assert_eq!(v.epoch, 0);
        assert_eq!(v.version, "1.02.208");
        assert_eq!(v.release, Some("2.fc43".to_string()));
    }

    #[test]
    fn test_evr_compare_epochs() {
        // Higher epoch wins even with lower version
        assert_eq!(compare_evr("1:1.0.0", "0:2.0.0"), Ordering::Greater);
    }

    #[test]
    fn test_evr_compare_versions() {
        assert_eq!(compare_evr("1.2.3", "1.2.4"), Ordering::Less);
        assert_eq!(compare_evr("1.10", "1.9"), Ordering::Greater);
    }

    #[test]
    fn test_evr_compare_releases() {
        assert_eq!(compare_evr("1.2.3-1", "1.2.3-2"), Ordering::Less);
        assert_eq!(compare_evr("1.2.3-2.el8", "1.2.3-2.el8"), Ordering::Equal);
    }

    #[test]
    fn test_compare_missing_release_is_literal() {
        assert_eq!(compare_evr("1.0", "1.0-3"), Ordering::Less);
        assert_eq!(compare_evr("1.0-3", "1.0"), Ordering::Greater);
        assert_eq!(compare_evr("1.0", "1.0"), Ordering::Equal);
    }

    #[test]
    fn test_compare_wildcard_missing_release_matches_any() {
        assert_eq!(compare_evr_wildcard("1.0", "1.0-3"), Ordering::Equal);
        assert_eq!(compare_evr_wildcard("1.0-3", "1.0"), Ordering::Equal);
        assert_eq!(compare_evr_wildcard("1.0-3", "1.0-4"), Ordering::Less);
        assert_eq!(compare_evr_wildcard("2:1.0", "1.0-3"), Ordering::Greater);
    }

    #[test]
    fn test_vercmp_alpha_vs_numeric() {
        // "1.0.1" > "1.0a" because numeric beats alphabetic
        assert_eq!(vercmp("1.0.1", "1.0.a"), Ordering::Greater);
        assert_eq!(vercmp("alpha", "beta"), Ordering::Less);
    }

    #[test]
    fn test_vercmp_leading_zeros() {
        assert_eq!(vercmp("1.02", "1.2"), Ordering::Equal);
        assert_eq!(vercmp("1.010", "1.9"), Ordering::Greater);
    }

    #[test]
    fn test_vercmp_tilde() {
        assert_eq!(vercmp("1.0~rc1", "1.0"), Ordering::Less);
        assert_eq!(vercmp("1.0~rc1", "1.0~rc2"), Ordering::Less);
    }

    #[test]
    fn test_vercmp_caret() {
        assert_eq!(vercmp("1.0^git1", "1.0"), Ordering::Greater);
        assert_eq!(vercmp("1.0^git1", "1.0.1"), Ordering::Less);
    }

    #[test]
    fn test_evr_display() {
        assert_eq!(Evr::parse("1.2.3").to_string(), "1.2.3");
        assert_eq!(Evr::parse("2:1.2.3-4.el8").to_string(), "2:1.2.3-4.el8");
    }

    #[test]
    fn test_epoch_of() {
        assert_eq!(epoch_of("3:1.0-1"), 3);
        assert_eq!(epoch_of("1.0-1"), 0);
    }

    #[test]
    fn test_split_evr() {
        assert_eq!(split_evr("3:1.0-2.fc40"), ("3", "1.0", "2.fc40"));
        assert_eq!(split_evr("1.0"), ("0", "1.0", ""));
    }
}
