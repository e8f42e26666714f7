//! Package version comparison.
//!
//! Versions have the form `[epoch:]version[-release]`. Epochs are compared
//! first (a missing epoch is `0`), then versions, then releases when both
//! sides carry one. Each part is compared segment by segment: runs of digits
//! compare numerically, runs of letters compare lexically, and a numeric
//! segment is always newer than an alphabetic one.

use std::cmp::Ordering;

pub fn vercmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let (epoch_a, version_a, release_a) = split_evr(a);
    let (epoch_b, version_b, release_b) = split_evr(b);

    segment_cmp(epoch_a, epoch_b)
        .then_with(|| segment_cmp(version_a, version_b))
        .then_with(|| match (release_a, release_b) {
            (Some(ra), Some(rb)) => segment_cmp(ra, rb),
            _ => Ordering::Equal,
        })
}

/// True when `candidate` is strictly newer than `current`.
pub fn is_newer(candidate: &str, current: &str) -> bool {
    vercmp(candidate, current) == Ordering::Greater
}

fn split_evr(evr: &str) -> (&str, &str, Option<&str>) {
    let digits = evr.bytes().take_while(u8::is_ascii_digit).count();
    let (epoch, rest) = match evr[digits..].strip_prefix(':') {
        Some(rest) if digits == 0 => ("0", rest),
        Some(rest) => (&evr[..digits], rest),
        None => ("0", evr),
    };

    match rest.rfind('-') {
        Some(dash) => (epoch, &rest[..dash], Some(&rest[dash + 1..])),
        None => (epoch, rest, None),
    }
}

fn segment_cmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let a = a.as_bytes();
    let b = b.as_bytes();
    let (mut one, mut two) = (0usize, 0usize);
    let (mut end_one, mut end_two) = (0usize, 0usize);

    while one < a.len() && two < b.len() {
        while one < a.len() && !a[one].is_ascii_alphanumeric() {
            one += 1;
        }
        while two < b.len() && !b[two].is_ascii_alphanumeric() {
            two += 1;
        }
        if one >= a.len() || two >= b.len() {
            break;
        }

        // A longer run of separators wins.
        let (sep_one, sep_two) = (one - end_one, two - end_two);
        if sep_one != sep_two {
            return sep_one.cmp(&sep_two);
        }

        let numeric = a[one].is_ascii_digit();
        let class: fn(&u8) -> bool = if numeric {
            u8::is_ascii_digit
        } else {
            u8::is_ascii_alphabetic
        };
        end_one = one + a[one..].iter().take_while(|c| class(*c)).count();
        end_two = two + b[two..].iter().take_while(|c| class(*c)).count();

        // Segments of different kinds: numbers are newer than letters.
        if end_two == two {
            return if numeric {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        let mut seg_one = &a[one..end_one];
        let mut seg_two = &b[two..end_two];
        if numeric {
            seg_one = trim_leading_zeros(seg_one);
            seg_two = trim_leading_zeros(seg_two);
            let by_len = seg_one.len().cmp(&seg_two.len());
            if by_len != Ordering::Equal {
                return by_len;
            }
        }

        let by_bytes = seg_one.cmp(seg_two);
        if by_bytes != Ordering::Equal {
            return by_bytes;
        }

        one = end_one;
        two = end_two;
    }

    let rest_one = a.get(one).copied();
    let rest_two = b.get(two).copied();
    match (rest_one, rest_two) {
        (None, None) => Ordering::Equal,
        // A trailing alpha segment never beats an exhausted string.
        (None, Some(c)) if !c.is_ascii_alphabetic() => Ordering::Less,
        (Some(c), _) if c.is_ascii_alphabetic() => Ordering::Less,
        _ => Ordering::Greater,
    }
}

fn trim_leading_zeros(segment: &[u8]) -> &[u8] {
    let zeros = segment.iter().take_while(|c| **c == b'0').count();
    &segment[zeros..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering::{Equal, Greater, Less};

    #[test]
    fn identical_versions_are_equal() {
        assert_eq!(vercmp("6.9.1-2", "6.9.1-2"), Equal);
        assert_eq!(vercmp("", ""), Equal);
    }

    #[test]
    fn numeric_segments_compare_numerically() {
        assert_eq!(vercmp("6.9.10-1", "6.9.9-1"), Greater);
        assert_eq!(vercmp("6.9.1-2", "6.9.1-10"), Less);
        assert_eq!(vercmp("1.5.1", "1.5"), Greater);
        assert_eq!(vercmp("1.01", "1.1"), Equal);
    }

    #[test]
    fn alpha_suffix_is_a_prerelease() {
        assert_eq!(vercmp("1.0a", "1.0"), Less);
        assert_eq!(vercmp("1.0", "1.0alpha"), Greater);
        assert_eq!(vercmp("1.0rc1", "1.0"), Less);
        assert_eq!(vercmp("6.10rc7", "6.10"), Less);
    }

    #[test]
    fn numbers_beat_letters() {
        assert_eq!(vercmp("1.1", "1.a"), Greater);
        assert_eq!(vercmp("1.a", "1.1"), Less);
    }

    #[test]
    fn epoch_dominates() {
        assert_eq!(vercmp("1:1.0-1", "2.0-1"), Greater);
        assert_eq!(vercmp("0:2.0", "2.0"), Equal);
        assert_eq!(vercmp("2:1.0", "1:9.9"), Greater);
    }

    #[test]
    fn release_compared_only_when_both_present() {
        assert_eq!(vercmp("1.0-1", "1.0"), Equal);
        assert_eq!(vercmp("1.0-2", "1.0-1"), Greater);
    }

    #[test]
    fn longer_separator_run_wins() {
        assert_eq!(vercmp("1..0", "1.0"), Greater);
    }

    #[test]
    fn trailing_dot_segment() {
        assert_eq!(vercmp("1.0", "1.0.0"), Less);
        assert_eq!(vercmp("1.0.1", "1.0"), Greater);
    }

    #[test]
    fn is_newer_matches_greater() {
        assert!(is_newer("6.9.2-1", "6.9.1-3"));
        assert!(!is_newer("6.9.1-3", "6.9.1-3"));
        assert!(!is_newer("6.9.1-2", "6.9.1-3"));
    }

    #[test]
    fn split_evr_handles_all_parts() {
        assert_eq!(split_evr("1:6.9.1-2"), ("1", "6.9.1", Some("2")));
        assert_eq!(split_evr("6.9.1"), ("0", "6.9.1", None));
        assert_eq!(split_evr(":6.9"), ("0", "6.9", None));
        assert_eq!(split_evr("6.9.arch1-1"), ("0", "6.9.arch1", Some("1")));
    }
}
