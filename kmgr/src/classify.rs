//! Release-flavor classification of kernel package names.

use serde::{Serialize, Serializer};
use std::fmt;

/// Human-readable release category of a kernel package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelCategory {
    LtoOptimized,
    Longterm,
    Zen,
    Hardened,
    NextRelease,
    Mainline,
    MasterBranch,
    Stable,
}

impl KernelCategory {
    pub fn label(self) -> &'static str {
        match self {
            KernelCategory::LtoOptimized => "lto optimized",
            KernelCategory::Longterm => "longterm",
            KernelCategory::Zen => "zen-kernel",
            KernelCategory::Hardened => "hardened-kernel",
            KernelCategory::NextRelease => "next release",
            KernelCategory::Mainline => "mainline branch",
            KernelCategory::MasterBranch => "master branch",
            KernelCategory::Stable => "stable",
        }
    }
}

impl Serialize for KernelCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl fmt::Display for KernelCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Keywords tested in order; the first one contained in the name wins.
///
/// Position in this table decides ties, not position in the package name:
/// `linux-lts-git` is `Longterm` because `lts` is tested before `git`.
pub const CATEGORY_KEYWORDS: &[(&str, KernelCategory)] = &[
    ("lto", KernelCategory::LtoOptimized),
    ("lts", KernelCategory::Longterm),
    ("zen", KernelCategory::Zen),
    ("hardened", KernelCategory::Hardened),
    ("next", KernelCategory::NextRelease),
    ("mainline", KernelCategory::Mainline),
    ("git", KernelCategory::MasterBranch),
];

pub fn classify(name: &str) -> KernelCategory {
    CATEGORY_KEYWORDS
        .iter()
        .find(|(keyword, _)| name.contains(keyword))
        .map(|(_, category)| *category)
        .unwrap_or(KernelCategory::Stable)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_kernel_is_stable() {
        assert_eq!(classify("linux"), KernelCategory::Stable);
        assert_eq!(classify("linux-cachyos"), KernelCategory::Stable);
    }

    #[test]
    fn each_keyword_maps_to_its_category() {
        assert_eq!(classify("linux-cachyos-lto"), KernelCategory::LtoOptimized);
        assert_eq!(classify("linux-lts"), KernelCategory::Longterm);
        assert_eq!(classify("linux-zen"), KernelCategory::Zen);
        assert_eq!(classify("linux-hardened"), KernelCategory::Hardened);
        assert_eq!(classify("linux-next"), KernelCategory::NextRelease);
        assert_eq!(classify("linux-mainline"), KernelCategory::Mainline);
        assert_eq!(classify("linux-git"), KernelCategory::MasterBranch);
    }

    #[test]
    fn table_order_breaks_ties() {
        // "git" appears first in the name but "lts" is tested first.
        assert_eq!(classify("linux-git-lts"), KernelCategory::Longterm);
        assert_eq!(classify("linux-lts-zen"), KernelCategory::Longterm);
        assert_eq!(classify("linux-zen-lto"), KernelCategory::LtoOptimized);
    }

    #[test]
    fn labels_match_display() {
        for (_, category) in CATEGORY_KEYWORDS {
            assert_eq!(category.to_string(), category.label());
        }
        assert_eq!(KernelCategory::Stable.to_string(), "stable");
    }

    #[test]
    fn serializes_as_label() {
        let json = serde_json::to_string(&KernelCategory::Zen).unwrap();
        assert_eq!(json, "\"zen-kernel\"");
    }
}
