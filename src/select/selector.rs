//! Stream selection
//!
//! Filters a manifest's variants by policy and ranks the survivors with an
//! ordered list of comparators.

use crate::{
    Error, Result,
    config::SelectionSettings,
    select::{Comparator, stable_sort_by_comparators},
    types::{Manifest, StreamVariant},
};
use tracing::{debug, warn};

/// Caller constraints on variant selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionPolicy {
    /// Bandwidth floor in bits per second
    pub min_bandwidth: Option<u64>,
    /// Drop variants that need DRM
    pub require_drm_free: bool,
    /// Rank DRM-free variants first; when false DRM variants compete equally
    pub prefer_drm_free: bool,
    /// Only consider these variant ids
    pub allowed_ids: Option<Vec<String>>,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            min_bandwidth: None,
            require_drm_free: false,
            prefer_drm_free: true,
            allowed_ids: None,
        }
    }
}

impl SelectionPolicy {
    /// Policy with a bandwidth floor
    pub fn with_min_bandwidth(mut self, min_bandwidth: u64) -> Self {
        self.min_bandwidth = Some(min_bandwidth);
        self
    }

    /// Set whether DRM-free variants rank first
    pub fn prefer_drm_free(mut self, prefer: bool) -> Self {
        self.prefer_drm_free = prefer;
        self
    }

    /// Reject DRM variants outright
    pub fn require_drm_free(mut self) -> Self {
        self.require_drm_free = true;
        self
    }

    /// Restrict selection to the given variant ids
    pub fn allow_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    /// Comparators applied in priority order
    pub fn comparators(&self) -> Vec<Comparator<StreamVariant>> {
        let mut comparators: Vec<Comparator<StreamVariant>> = Vec::new();

        if self.prefer_drm_free {
            comparators.push(Box::new(|a: &StreamVariant, b: &StreamVariant| {
                a.drm_required.cmp(&b.drm_required)
            }));
        }

        match self.min_bandwidth {
            // Closest to the floor first
            Some(floor) => {
                comparators.push(Box::new(move |a: &StreamVariant, b: &StreamVariant| {
                    a.bandwidth.abs_diff(floor).cmp(&b.bandwidth.abs_diff(floor))
                }))
            }
            None => comparators.push(Box::new(|a: &StreamVariant, b: &StreamVariant| {
                b.bandwidth.cmp(&a.bandwidth)
            })),
        }

        comparators
    }
}

impl From<&SelectionSettings> for SelectionPolicy {
    fn from(settings: &SelectionSettings) -> Self {
        Self {
            min_bandwidth: settings.min_bandwidth,
            require_drm_free: settings.require_drm_free,
            prefer_drm_free: settings.prefer_drm_free,
            allowed_ids: None,
        }
    }
}

/// Ranked variants, highest priority first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Variants satisfying the policy
    pub variants: Vec<StreamVariant>,
    /// Set when no variant met the bandwidth floor and the highest-bandwidth
    /// variant was returned instead
    pub degraded: bool,
}

impl Selection {
    /// Top choice
    pub fn best(&self) -> Option<&StreamVariant> {
        self.variants.first()
    }

    /// Consume and return the top choice
    pub fn into_best(self) -> Option<StreamVariant> {
        self.variants.into_iter().next()
    }
}

/// Rank the variants of `manifest` under `policy`
///
/// Fails with `NoVariantMatchesPolicy` when the allow-list or the DRM
/// requirement removes every variant. An unmet bandwidth floor is not an
/// error: the single highest-bandwidth candidate is returned with
/// `degraded` set.
pub fn select(manifest: &Manifest, policy: &SelectionPolicy) -> Result<Selection> {
    let mut candidates: Vec<StreamVariant> = manifest
        .variants
        .iter()
        .filter(|v| {
            policy
                .allowed_ids
                .as_ref()
                .is_none_or(|ids| ids.iter().any(|id| *id == v.id))
        })
        .filter(|v| !(policy.require_drm_free && v.drm_required))
        .cloned()
        .collect();

    if candidates.is_empty() {
        let reason = if manifest.variants.is_empty() {
            "manifest has no variants".to_string()
        } else {
            format!(
                "{} variants removed by allow-list or DRM requirement",
                manifest.variants.len()
            )
        };
        return Err(Error::no_variant(reason));
    }

    if let Some(floor) = policy.min_bandwidth
        && candidates.iter().all(|v| v.bandwidth < floor)
    {
        // First maximum wins on ties
        let best = candidates
            .into_iter()
            .fold(None::<StreamVariant>, |best, v| match best {
                Some(b) if b.bandwidth >= v.bandwidth => Some(b),
                _ => Some(v),
            });
        warn!(
            "No variant of {} meets {} bps, degrading to highest bandwidth",
            manifest.content_ref, floor
        );
        return Ok(Selection {
            variants: best.into_iter().collect(),
            degraded: true,
        });
    }

    if let Some(floor) = policy.min_bandwidth {
        candidates.retain(|v| v.bandwidth >= floor);
    }

    stable_sort_by_comparators(&mut candidates, &policy.comparators());

    debug!(
        "Selected {} of {} variants for {}",
        candidates.len(),
        manifest.variants.len(),
        manifest.content_ref
    );
    Ok(Selection {
        variants: candidates,
        degraded: false,
    })
}
