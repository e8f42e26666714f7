//! Scoped process environment for successive builds.
//!
//! Each [`EnvironmentScope::apply`] first unsets every variable the previous
//! call set, then applies the new assignments. One build's compiler flags
//! therefore never leak into the next build.
//!
//! Assignment text is one `NAME=VALUE` per line, split at the first `=`, with
//! no quoting or escaping. Blank lines are skipped; any other line without
//! `=` is malformed and reported, while the remaining lines still apply.

use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

/// A line of assignment text that has no `=`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedLine {
    /// 1-based line number.
    pub line: usize,
    pub text: String,
}

/// Parsed assignment text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentSet {
    pub assignments: Vec<(String, String)>,
    pub malformed: Vec<MalformedLine>,
}

impl AssignmentSet {
    pub fn parse(text: &str) -> Self {
        let mut set = Self::default();
        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            match line.split_once('=') {
                Some((name, value)) => set
                    .assignments
                    .push((name.to_string(), value.to_string())),
                None => set.malformed.push(MalformedLine {
                    line: index + 1,
                    text: line.to_string(),
                }),
            }
        }
        set
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty() && self.malformed.is_empty()
    }
}

/// What one [`EnvironmentScope::apply`] call did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Variables from the previous call that were unset.
    pub unset: Vec<String>,
    /// Variables set by this call, in order.
    pub set: Vec<String>,
    pub malformed: Vec<MalformedLine>,
    /// Assignments that could not be applied, with the reason.
    pub failed: Vec<(String, String)>,
}

impl ApplyReport {
    pub fn is_clean(&self) -> bool {
        self.malformed.is_empty() && self.failed.is_empty()
    }
}

pub struct EnvironmentScope {
    previously_set: Mutex<Vec<String>>,
}

static GLOBAL: EnvironmentScope = EnvironmentScope::new();

impl Default for EnvironmentScope {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvironmentScope {
    pub const fn new() -> Self {
        Self {
            previously_set: Mutex::new(Vec::new()),
        }
    }

    /// The process-wide scope. The environment is process-wide, so callers
    /// outside tests should always go through this instance.
    pub fn global() -> &'static EnvironmentScope {
        &GLOBAL
    }

    /// Variable names recorded by the most recent apply.
    pub fn previously_set(&self) -> Vec<String> {
        self.previously_set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn apply_text(&self, text: &str) -> ApplyReport {
        self.apply(&AssignmentSet::parse(text))
    }

    pub fn apply(&self, set: &AssignmentSet) -> ApplyReport {
        let mut previous = self
            .previously_set
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut report = ApplyReport {
            malformed: set.malformed.clone(),
            ..Default::default()
        };

        for name in previous.drain(..) {
            if let Err(reason) = check_name(&name) {
                warn!("Cannot unset '{}': {}", name, reason);
                continue;
            }
            // SAFETY: the environment is only mutated while holding the
            // scope lock, and kmgr reads it from the thread that applies it.
            unsafe { std::env::remove_var(&name) };
            report.unset.push(name);
        }

        for malformed in &set.malformed {
            warn!(
                "Ignoring malformed environment line {}: '{}'",
                malformed.line, malformed.text
            );
        }

        for (name, value) in &set.assignments {
            if let Err(reason) = check_name(name).and_then(|()| check_value(value)) {
                warn!("Cannot set '{}': {}", name, reason);
                report.failed.push((name.clone(), reason.to_string()));
                continue;
            }
            // SAFETY: see above.
            unsafe { std::env::set_var(name, value) };
            if !previous.contains(name) {
                previous.push(name.clone());
            }
            report.set.push(name.clone());
        }

        debug!(
            unset = report.unset.len(),
            set = report.set.len(),
            "Applied build environment"
        );
        report
    }
}

fn check_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        Err("empty variable name")
    } else if name.contains('=') {
        Err("variable name contains '='")
    } else if name.contains('\0') {
        Err("variable name contains NUL")
    } else {
        Ok(())
    }
}

fn check_value(value: &str) -> Result<(), &'static str> {
    if value.contains('\0') {
        Err("value contains NUL")
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    fn parse_splits_at_first_equals() {
        let set = AssignmentSet::parse("CFLAGS=-O2 -march=native\nEMPTY=\n\n  \nKCFLAGS==x\r\n");
        assert_eq!(
            set.assignments,
            vec![
                ("CFLAGS".to_string(), "-O2 -march=native".to_string()),
                ("EMPTY".to_string(), String::new()),
                ("KCFLAGS".to_string(), "=x".to_string()),
            ]
        );
        assert!(set.malformed.is_empty());
    }

    #[test]
    fn parse_reports_malformed_lines_with_numbers() {
        let set = AssignmentSet::parse("A=1\nBADLINE\nB=2");
        assert_eq!(set.assignments.len(), 2);
        assert_eq!(
            set.malformed,
            vec![MalformedLine {
                line: 2,
                text: "BADLINE".to_string()
            }]
        );
    }

    #[test]
    fn parse_empty_text() {
        assert!(AssignmentSet::parse("").is_empty());
        assert!(AssignmentSet::parse("\n\n").is_empty());
    }

    #[test]
    #[serial]
    fn apply_then_empty_restores_environment() {
        let scope = EnvironmentScope::new();
        let report = scope.apply_text("KMGR_T_ROUND_A=1\nKMGR_T_ROUND_B=two");
        assert_eq!(report.set, vec!["KMGR_T_ROUND_A", "KMGR_T_ROUND_B"]);
        assert_eq!(env::var("KMGR_T_ROUND_B").unwrap(), "two");

        let report = scope.apply_text("");
        assert_eq!(report.unset, vec!["KMGR_T_ROUND_A", "KMGR_T_ROUND_B"]);
        assert!(env::var("KMGR_T_ROUND_A").is_err());
        assert!(env::var("KMGR_T_ROUND_B").is_err());
        assert!(scope.previously_set().is_empty());
    }

    #[test]
    #[serial]
    fn later_apply_overwrites() {
        let scope = EnvironmentScope::new();
        scope.apply_text("KMGR_T_FOO=1");
        scope.apply_text("KMGR_T_FOO=2");
        assert_eq!(env::var("KMGR_T_FOO").unwrap(), "2");
        assert_eq!(scope.previously_set(), vec!["KMGR_T_FOO"]);
        scope.apply_text("");
    }

    #[test]
    #[serial]
    fn new_value_wins_over_preexisting_variable() {
        unsafe { env::set_var("KMGR_T_PRESET", "old") };
        let scope = EnvironmentScope::new();
        scope.apply_text("KMGR_T_PRESET=new");
        assert_eq!(env::var("KMGR_T_PRESET").unwrap(), "new");
        scope.apply_text("");
        assert!(env::var("KMGR_T_PRESET").is_err());
    }

    #[test]
    #[serial]
    fn malformed_line_does_not_stop_the_rest() {
        let scope = EnvironmentScope::new();
        let report = scope.apply_text("KMGR_T_M_FOO=1\nBADLINE\nKMGR_T_M_BAR=2");
        assert_eq!(env::var("KMGR_T_M_FOO").unwrap(), "1");
        assert_eq!(env::var("KMGR_T_M_BAR").unwrap(), "2");
        assert_eq!(report.malformed.len(), 1);
        assert!(!report.is_clean());
        scope.apply_text("");
    }

    #[test]
    #[serial]
    fn invalid_names_are_reported_and_skipped() {
        let scope = EnvironmentScope::new();
        let report = scope.apply_text("=value\nKMGR_T_OK=yes");
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "");
        assert_eq!(report.set, vec!["KMGR_T_OK"]);

        let set = AssignmentSet {
            assignments: vec![("KMGR_T_NUL".to_string(), "a\0b".to_string())],
            malformed: Vec::new(),
        };
        let report = scope.apply(&set);
        assert_eq!(report.unset, vec!["KMGR_T_OK"]);
        assert_eq!(report.failed[0].1, "value contains NUL");
        assert!(env::var("KMGR_T_NUL").is_err());
        assert!(scope.previously_set().is_empty());
    }

    #[test]
    #[serial]
    fn global_scope_is_shared() {
        let a = EnvironmentScope::global();
        let b = EnvironmentScope::global();
        assert!(std::ptr::eq(a, b));
    }
}
