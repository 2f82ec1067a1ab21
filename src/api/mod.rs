use std::net::SocketAddr;
use std::path::PathBuf;

use axum::{
    Router,
    extract::Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::core::{
    AdjustedProjection, AdjustmentSet, BaselineProjection, GoalSolveConfig, GoalSolveResult,
    GoalType, MAX_RETIREMENT_AGE_OFFSET, MIN_RETIREMENT_AGE_OFFSET, Plan, ProjectionContext,
    ScenarioOverrides, SolveError, SolveInputs, SweepResult, adjust, solve_goal,
    sweep_retirement_offsets,
};
use crate::session::{BaselineError, BaselineKey, JsonFileBaselineSource, WhatIfSession};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{field} {message}")]
    InvalidAdjustment {
        field: &'static str,
        message: String,
    },
    #[error("invalid context: {0}")]
    InvalidContext(String),
    #[error("a baseline projection is required for this request")]
    MissingBaseline,
    #[error("invalid solve config: {0}")]
    InvalidSolveConfig(#[from] SolveError),
    #[error(transparent)]
    Baseline(#[from] BaselineError),
    #[error("failed to read request: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid request JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(
    name = "fire-whatif",
    about = "What-if drawdown projections recomputed from a cached baseline"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the JSON API.
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Adjust a baseline from a request file and print the projection as JSON.
    Adjust {
        #[arg(long, help = "Request JSON with plan, overrides, adjustments and context")]
        request: PathBuf,
        #[arg(
            long,
            help = "Baseline projection JSON; defaults to the request's inline baseline"
        )]
        baseline: Option<PathBuf>,
        #[arg(long, help = "Print a retirement-age sweep instead of a single projection")]
        sweep: bool,
        #[command(flatten)]
        sliders: SliderArgs,
    },
}

/// Slider values given on the command line win over the request file.
#[derive(Args, Debug, Default, Clone)]
pub struct SliderArgs {
    #[arg(long, allow_negative_numbers = true, help = "Years to retire later (negative: earlier)")]
    pub retirement_age_offset: Option<i32>,
    #[arg(long, help = "Expenses as percent of plan, e.g. 90")]
    pub expenses_percent: Option<f64>,
    #[arg(long, allow_negative_numbers = true, help = "Percentage points added to returns")]
    pub return_rate_offset: Option<f64>,
    #[arg(long, allow_negative_numbers = true, help = "Percentage points added to inflation")]
    pub inflation_offset: Option<f64>,
    #[arg(long, help = "Contributions as percent of plan")]
    pub contribution_percent: Option<f64>,
    #[arg(long, help = "Equity share of liquid assets in percent")]
    pub equity_percent: Option<f64>,
    #[arg(long, help = "Sell property below this percent of the starting balance")]
    pub liquidation_threshold: Option<f64>,
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AdjustmentPayload {
    retirement_age_offset: Option<i32>,
    expenses_percent: Option<f64>,
    return_rate_offset: Option<f64>,
    inflation_offset: Option<f64>,
    contribution_percent: Option<f64>,
    equity_percent: Option<f64>,
    liquidation_threshold: Option<f64>,
}

impl From<SliderArgs> for AdjustmentPayload {
    fn from(value: SliderArgs) -> Self {
        Self {
            retirement_age_offset: value.retirement_age_offset,
            expenses_percent: value.expenses_percent,
            return_rate_offset: value.return_rate_offset,
            inflation_offset: value.inflation_offset,
            contribution_percent: value.contribution_percent,
            equity_percent: value.equity_percent,
            liquidation_threshold: value.liquidation_threshold,
        }
    }
}

impl AdjustmentPayload {
    fn merged_over(self, base: AdjustmentPayload) -> AdjustmentPayload {
        AdjustmentPayload {
            retirement_age_offset: self.retirement_age_offset.or(base.retirement_age_offset),
            expenses_percent: self.expenses_percent.or(base.expenses_percent),
            return_rate_offset: self.return_rate_offset.or(base.return_rate_offset),
            inflation_offset: self.inflation_offset.or(base.inflation_offset),
            contribution_percent: self.contribution_percent.or(base.contribution_percent),
            equity_percent: self.equity_percent.or(base.equity_percent),
            liquidation_threshold: self.liquidation_threshold.or(base.liquidation_threshold),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AdjustPayload {
    baseline: Option<BaselineProjection>,
    baseline_key: Option<BaselineKey>,
    plan: Plan,
    overrides: ScenarioOverrides,
    adjustments: AdjustmentPayload,
    context: ProjectionContext,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiGoalType {
    #[serde(alias = "requiredContribution", alias = "required_contribution")]
    RequiredContribution,
    #[serde(alias = "maxExpenses", alias = "max_expenses")]
    MaxExpenses,
}

impl From<ApiGoalType> for GoalType {
    fn from(value: ApiGoalType) -> Self {
        match value {
            ApiGoalType::RequiredContribution => GoalType::RequiredContribution,
            ApiGoalType::MaxExpenses => GoalType::MaxExpenses,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SolvePayload {
    goal: ApiGoalType,
    search_min: Option<f64>,
    search_max: Option<f64>,
    tolerance: Option<f64>,
    max_iterations: Option<u32>,
    #[serde(flatten)]
    request: AdjustPayload,
}

/// A validated request: the core's inputs, resolved from payload values and defaults.
#[derive(Debug)]
struct ApiRequest {
    baseline: Option<BaselineProjection>,
    baseline_key: BaselineKey,
    plan: Plan,
    overrides: ScenarioOverrides,
    adjustments: AdjustmentSet,
    context: ProjectionContext,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AdjustResponse {
    plan_currency: String,
    adjustments: AdjustmentSet,
    projection: Option<AdjustedProjection>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SweepResponse {
    plan_currency: String,
    earliest_sustainable_retirement_age: Option<u32>,
    #[serde(flatten)]
    sweep: SweepResult,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

fn build_adjustments(payload: AdjustmentPayload) -> Result<AdjustmentSet, ApiError> {
    let defaults = AdjustmentSet::default();
    let adjustments = AdjustmentSet {
        retirement_age_offset: payload
            .retirement_age_offset
            .unwrap_or(defaults.retirement_age_offset),
        expenses_percent: payload.expenses_percent.unwrap_or(defaults.expenses_percent),
        return_rate_offset: payload
            .return_rate_offset
            .unwrap_or(defaults.return_rate_offset),
        inflation_offset: payload.inflation_offset.unwrap_or(defaults.inflation_offset),
        contribution_percent: payload
            .contribution_percent
            .unwrap_or(defaults.contribution_percent),
        equity_percent: payload.equity_percent,
        liquidation_threshold: payload
            .liquidation_threshold
            .unwrap_or(defaults.liquidation_threshold),
    };
    validate_adjustments(&adjustments)?;
    Ok(adjustments)
}

/// Enforces the slider ranges. The core trusts its caller, so this is the only place they are
/// checked.
fn validate_adjustments(adjustments: &AdjustmentSet) -> Result<(), ApiError> {
    let offset = adjustments.retirement_age_offset;
    if !(MIN_RETIREMENT_AGE_OFFSET..=MAX_RETIREMENT_AGE_OFFSET).contains(&offset) {
        return Err(invalid(
            "retirementAgeOffset",
            format!("must be between {MIN_RETIREMENT_AGE_OFFSET} and {MAX_RETIREMENT_AGE_OFFSET}"),
        ));
    }
    for (field, value, min, max) in [
        ("contributionPercent", adjustments.contribution_percent, 0.0, 200.0),
        ("expensesPercent", adjustments.expenses_percent, 50.0, 150.0),
        ("returnRateOffset", adjustments.return_rate_offset, -4.0, 4.0),
        ("inflationOffset", adjustments.inflation_offset, -2.0, 4.0),
        ("liquidationThreshold", adjustments.liquidation_threshold, 0.0, 100.0),
    ] {
        if !(min..=max).contains(&value) {
            return Err(invalid(field, format!("must be between {min} and {max}")));
        }
    }
    if let Some(equity) = adjustments.equity_percent {
        if !(0.0..=100.0).contains(&equity) {
            return Err(invalid("equityPercent", "must be between 0 and 100".to_string()));
        }
    }
    Ok(())
}

fn invalid(field: &'static str, message: String) -> ApiError {
    ApiError::InvalidAdjustment { field, message }
}

fn validate_context(context: &ProjectionContext) -> Result<(), ApiError> {
    if !context.blended_return_rate.is_finite() || context.blended_return_rate <= -1.0 {
        return Err(ApiError::InvalidContext(
            "blendedReturnRate must be > -1".to_string(),
        ));
    }
    if !context.monthly_investment.is_finite() || context.monthly_investment < 0.0 {
        return Err(ApiError::InvalidContext(
            "monthlyInvestment must be >= 0".to_string(),
        ));
    }
    if context.life_expectancy == 0 {
        return Err(ApiError::InvalidContext(
            "lifeExpectancy must be > 0".to_string(),
        ));
    }
    Ok(())
}

fn api_request_from_payload(payload: AdjustPayload) -> Result<ApiRequest, ApiError> {
    let adjustments = build_adjustments(payload.adjustments)?;
    let mut context = payload.context;
    if context.life_expectancy == 0 {
        context.life_expectancy = payload.plan.life_expectancy;
    }
    validate_context(&context)?;

    Ok(ApiRequest {
        baseline: payload.baseline,
        baseline_key: payload.baseline_key.unwrap_or_default(),
        plan: payload.plan,
        overrides: payload.overrides,
        adjustments,
        context,
    })
}

fn adjust_response(request: &ApiRequest) -> AdjustResponse {
    AdjustResponse {
        plan_currency: request.context.plan_currency.clone(),
        adjustments: request.adjustments,
        projection: adjust(
            request.baseline.as_ref(),
            &request.plan,
            &request.overrides,
            &request.adjustments,
            &request.context,
        ),
    }
}

fn sweep_response(request: &ApiRequest) -> Result<SweepResponse, ApiError> {
    let baseline = request.baseline.as_ref().ok_or(ApiError::MissingBaseline)?;
    let sweep = sweep_retirement_offsets(
        baseline,
        &request.plan,
        &request.overrides,
        &request.adjustments,
        &request.context,
    );
    Ok(SweepResponse {
        plan_currency: request.context.plan_currency.clone(),
        earliest_sustainable_retirement_age: sweep
            .earliest_sustainable_index
            .map(|idx| sweep.offsets[idx].retirement_age),
        sweep,
    })
}

fn solve_response(payload: SolvePayload) -> Result<GoalSolveResult, ApiError> {
    let request = api_request_from_payload(payload.request)?;
    let baseline = request.baseline.as_ref().ok_or(ApiError::MissingBaseline)?;

    let defaults = GoalSolveConfig::for_goal(payload.goal.into());
    let config = GoalSolveConfig {
        search_min: payload.search_min.unwrap_or(defaults.search_min),
        search_max: payload.search_max.unwrap_or(defaults.search_max),
        tolerance: payload.tolerance.unwrap_or(defaults.tolerance),
        max_iterations: payload.max_iterations.unwrap_or(defaults.max_iterations),
        ..defaults
    };
    let inputs = SolveInputs {
        baseline,
        plan: &request.plan,
        overrides: &request.overrides,
        adjustments: &request.adjustments,
        context: &request.context,
    };
    Ok(solve_goal(inputs, config)?)
}

pub async fn run_cli(cli: Cli) -> Result<(), ApiError> {
    match cli.command {
        Command::Serve { port } => run_http_server(port).await?,
        Command::Adjust {
            request,
            baseline,
            sweep,
            sliders,
        } => {
            let raw = tokio::fs::read_to_string(&request).await?;
            let mut payload = serde_json::from_str::<AdjustPayload>(&raw)?;
            payload.adjustments = AdjustmentPayload::from(sliders).merged_over(payload.adjustments);
            let mut request = api_request_from_payload(payload)?;

            if let Some(path) = baseline {
                load_baseline_file(&mut request, path).await?;
            }

            let json = if sweep {
                serde_json::to_string_pretty(&sweep_response(&request)?)?
            } else {
                serde_json::to_string_pretty(&adjust_response(&request))?
            };
            println!("{json}");
        }
    }
    Ok(())
}

/// Replaces the request's inline baseline with the one read from `path`. A failed read keeps the
/// inline baseline when there is one.
async fn load_baseline_file(request: &mut ApiRequest, path: PathBuf) -> Result<(), ApiError> {
    let mut session = WhatIfSession::new(
        JsonFileBaselineSource::new(path),
        request.plan.clone(),
        request.context.clone(),
    );
    match session.refresh(request.baseline_key.clone(), false).await {
        Ok(_) => {
            request.baseline = session.baseline().cloned();
            Ok(())
        }
        Err(err) if request.baseline.is_some() => {
            warn!(error = %err, "keeping the request's inline baseline");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/api/adjust", post(adjust_handler))
        .route("/api/sweep", post(sweep_handler))
        .route("/api/solve", post(solve_handler))
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "what-if API listening");
    axum::serve(listener, app).await
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, HealthResponse { status: "ok" })
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn adjust_handler(Json(payload): Json<AdjustPayload>) -> Response {
    match api_request_from_payload(payload) {
        Ok(request) => json_response(StatusCode::OK, adjust_response(&request)),
        Err(err) => api_error_response(err),
    }
}

async fn sweep_handler(Json(payload): Json<AdjustPayload>) -> Response {
    match api_request_from_payload(payload).and_then(|request| sweep_response(&request)) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(err) => api_error_response(err),
    }
}

async fn solve_handler(Json(payload): Json<SolvePayload>) -> Response {
    match solve_response(payload) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(err) => api_error_response(err),
    }
}

fn api_error_response(err: ApiError) -> Response {
    debug!(error = %err, "rejected request");
    let status = match err {
        ApiError::Baseline(_) | ApiError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    };
    error_response(status, &err.to_string())
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<ApiRequest, ApiError> {
    let payload = serde_json::from_str::<AdjustPayload>(json)?;
    api_request_from_payload(payload)
}
