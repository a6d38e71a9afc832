use crate::{events::EventSink, hash, manifest, pal, plan::ModPlan};
use anyhow::Result;
use serde::Serialize;
use std::path::Path;

/// Classification of every manifest entry against the live
/// installation. Files never recorded in the manifest are invisible
/// here: verify only detects regressions since the last install.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub ok: usize,
    pub missing: Vec<String>,
    pub changed: Vec<String>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.changed.is_empty()
    }
}

/// Read-only: recomputes fingerprints, mutates nothing.
pub fn verify(root: &Path, plan: &ModPlan, sink: &dyn EventSink) -> Result<VerifyReport> {
    pal::validate_root(root)?;
    let manifest = manifest::load(root, &plan.manifest_name)?;
    let total = manifest.len();
    let mut report = VerifyReport::default();

    for (index, (rel, recorded)) in manifest.iter().enumerate() {
        let path = root.join(rel);
        if !path.is_file() {
            report.missing.push(rel.clone());
        } else if hash::fingerprint(&path)? != *recorded {
            report.changed.push(rel.clone());
        } else {
            report.ok += 1;
        }
        sink.progress(index + 1, total);
    }

    sink.log(format!(
        "Verify complete: {} ok, {} changed, {} missing.",
        report.ok,
        report.changed.len(),
        report.missing.len()
    ));
    Ok(report)
}
