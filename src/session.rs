//! Session state around the adjuster.
//!
//! The baseline is expensive and comes from an external collaborator, so it is fetched only when
//! the inputs it depends on change (or on an explicit forced refresh). Slider and override edits
//! recompute locally from the cached baseline.

use std::future::Future;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::core::{
    AdjustedProjection, AdjustmentSet, BaselineProjection, Plan, ProjectionContext,
    ScenarioOverrides, adjust,
};

/// Everything the baseline depends on. A change here is what justifies a refetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BaselineKey {
    pub plan_id: String,
    pub account_ids: Vec<String>,
    pub current_age: u32,
    pub retirement_age: u32,
    pub life_expectancy: u32,
}

#[derive(Debug, Error)]
pub enum BaselineError {
    #[error("baseline service unavailable: {0}")]
    Unavailable(String),
    #[error("failed to read baseline: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid baseline JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub trait BaselineSource {
    fn compute_baseline(
        &self,
        key: &BaselineKey,
    ) -> impl Future<Output = Result<BaselineProjection, BaselineError>> + Send;
}

/// Reads a previously exported baseline projection from disk.
#[derive(Debug, Clone)]
pub struct JsonFileBaselineSource {
    path: PathBuf,
}

impl JsonFileBaselineSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl BaselineSource for JsonFileBaselineSource {
    fn compute_baseline(
        &self,
        _key: &BaselineKey,
    ) -> impl Future<Output = Result<BaselineProjection, BaselineError>> + Send {
        let path = self.path.clone();
        async move {
            let raw = tokio::fs::read_to_string(&path).await?;
            Ok(serde_json::from_str::<BaselineProjection>(&raw)?)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Fetched,
    Cached,
}

pub struct WhatIfSession<S> {
    source: S,
    plan: Plan,
    context: ProjectionContext,
    overrides: ScenarioOverrides,
    adjustments: AdjustmentSet,
    key: Option<BaselineKey>,
    baseline: Option<BaselineProjection>,
}

impl<S: BaselineSource> WhatIfSession<S> {
    pub fn new(source: S, plan: Plan, context: ProjectionContext) -> Self {
        Self {
            source,
            plan,
            context,
            overrides: ScenarioOverrides::default(),
            adjustments: AdjustmentSet::default(),
            key: None,
            baseline: None,
        }
    }

    /// Fetches the baseline when `key` differs from the cached one or `force` is set.
    ///
    /// On failure the previous baseline (if any) stays in place and the error is returned.
    pub async fn refresh(
        &mut self,
        key: BaselineKey,
        force: bool,
    ) -> Result<RefreshOutcome, BaselineError> {
        if !force && self.baseline.is_some() && self.key.as_ref() == Some(&key) {
            return Ok(RefreshOutcome::Cached);
        }

        match self.source.compute_baseline(&key).await {
            Ok(baseline) => {
                info!(
                    plan_id = %key.plan_id,
                    accounts = key.account_ids.len(),
                    retirement_age = key.retirement_age,
                    "fetched baseline projection"
                );
                self.baseline = Some(baseline);
                self.key = Some(key);
                Ok(RefreshOutcome::Fetched)
            }
            Err(err) => {
                warn!(
                    plan_id = %key.plan_id,
                    error = %err,
                    kept_previous = self.baseline.is_some(),
                    "baseline fetch failed"
                );
                Err(err)
            }
        }
    }

    pub fn set_adjustments(&mut self, adjustments: AdjustmentSet) {
        self.adjustments = adjustments;
    }

    pub fn reset_adjustments(&mut self) {
        self.adjustments = AdjustmentSet::default();
    }

    pub fn set_overrides(&mut self, overrides: ScenarioOverrides) {
        self.overrides = overrides;
    }

    pub fn set_plan(&mut self, plan: Plan) {
        self.plan = plan;
    }

    pub fn set_context(&mut self, context: ProjectionContext) {
        self.context = context;
    }

    pub fn adjustments(&self) -> &AdjustmentSet {
        &self.adjustments
    }

    pub fn baseline(&self) -> Option<&BaselineProjection> {
        self.baseline.as_ref()
    }

    /// The current what-if trajectory, or `None` before the first successful fetch.
    pub fn projection(&self) -> Option<AdjustedProjection> {
        adjust(
            self.baseline.as_ref(),
            &self.plan,
            &self.overrides,
            &self.adjustments,
            &self.context,
        )
    }
}
