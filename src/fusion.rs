//! Merges per-family findings into one verdict per frame.

use serde::Serialize;

use crate::detect::{Family, Finding};
use crate::Level;

/// One contributing finding, flattened for alerting.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Cause {
    pub family: Family,
    /// Finding reason, or the family name when the finding has none.
    pub reason: String,
    pub level: Level,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FusedVerdict {
    pub overall_level: Level,
    pub causes: Vec<Cause>,
}

impl FusedVerdict {
    /// Causes at Warning or Danger, in verdict order.
    pub fn actionable(&self) -> impl Iterator<Item = &Cause> {
        self.causes.iter().filter(|cause| cause.level.is_actionable())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FusionEngine;

impl FusionEngine {
    pub fn new() -> Self {
        Self
    }

    /// Fuse one frame of findings.
    ///
    /// Causes are ordered by family (danger objects, suffocation, posture) and
    /// keep their input order within a family. Nothing is dropped; the
    /// overall level is the maximum seen, Safe when there are no findings.
    pub fn fuse(&self, findings: &[Finding]) -> FusedVerdict {
        let mut ordered: Vec<&Finding> = findings.iter().collect();
        ordered.sort_by_key(|finding| finding.family());

        let mut overall_level = Level::Safe;
        let mut causes = Vec::with_capacity(ordered.len());
        for finding in ordered {
            let level = finding.level();
            if level > overall_level {
                overall_level = level;
            }
            let family = finding.family();
            causes.push(Cause {
                family,
                reason: finding.reason().unwrap_or(family.as_str()).to_string(),
                level,
            });
        }

        FusedVerdict {
            overall_level,
            causes,
        }
    }
}
