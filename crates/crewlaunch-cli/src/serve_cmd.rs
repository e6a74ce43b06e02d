//! `crewlaunch serve`: the web UI.
//!
//! `GET /api/launch` runs the crew and streams adapter output to the page as
//! Server-Sent Events. Only one run may be in flight at a time.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::{Json, Router};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard, mpsc};
use tower_http::cors::CorsLayer;
use tracing::Instrument;
use uuid::Uuid;

use crewlaunch_core::adapter::UiSurface;
use crewlaunch_core::adapter::markup::{escape_html, to_html};
use crewlaunch_core::crew::{Crew, LaunchBrief};
use crewlaunch_core::runner::CrewRunner;

use crate::diagram;
use crate::launch::{CrewSource, elapsed_text, render_markdown, run_with_surface};

static PAGE_TEMPLATE: &str = include_str!("page.html");

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: msg.into(),
        }
    }

    pub fn internal(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("{err:#}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// UI updates
// ---------------------------------------------------------------------------

/// One message to the page. The SSE event name is [`UiUpdate::kind`]; the
/// data is the variant's fields as JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum UiUpdate {
    Log { html: String },
    Toast { message: String },
    Elapsed { seconds: f64, text: String },
    Report { markdown: String, html: String },
    Failed { message: String },
}

impl UiUpdate {
    pub fn kind(&self) -> &'static str {
        match self {
            UiUpdate::Log { .. } => "log",
            UiUpdate::Toast { .. } => "toast",
            UiUpdate::Elapsed { .. } => "elapsed",
            UiUpdate::Report { .. } => "report",
            UiUpdate::Failed { .. } => "failed",
        }
    }

    fn into_event(self) -> Event {
        let kind = self.kind();
        Event::default()
            .event(kind)
            .json_data(&self)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, kind, "failed to encode UI update");
                Event::default().event(kind).data("{}")
            })
    }
}

/// Surface that forwards adapter output to an SSE stream.
///
/// Keeps the cumulative rendered log so every `log` event carries the full
/// view. Highlight markup never spans blocks, so each block is rendered once
/// and appended.
pub struct ChannelSurface {
    tx: mpsc::UnboundedSender<UiUpdate>,
    html: String,
}

impl ChannelSurface {
    pub fn new(tx: mpsc::UnboundedSender<UiUpdate>) -> Self {
        Self {
            tx,
            html: String::new(),
        }
    }
}

impl UiSurface for ChannelSurface {
    fn render(&mut self, block: &str) {
        self.html.push_str(&to_html(block));
        // The receiver is gone once the browser disconnects; the run still
        // finishes.
        let _ = self.tx.send(UiUpdate::Log {
            html: self.html.clone(),
        });
    }

    fn toast(&mut self, message: &str) {
        let _ = self.tx.send(UiUpdate::Toast {
            message: message.to_string(),
        });
    }
}

/// Drop `log` updates that a later queued `log` update supersedes.
///
/// Starting from `first`, consumes consecutive queued `log` updates and
/// returns the latest one. The first non-log update met on the way is
/// returned as well, so ordering is preserved.
fn coalesce_logs(
    first: UiUpdate,
    rx: &mut mpsc::UnboundedReceiver<UiUpdate>,
) -> (UiUpdate, Option<UiUpdate>) {
    if !matches!(first, UiUpdate::Log { .. }) {
        return (first, None);
    }
    let mut latest = first;
    while let Ok(next) = rx.try_recv() {
        match next {
            UiUpdate::Log { .. } => latest = next,
            other => return (latest, Some(other)),
        }
    }
    (latest, None)
}

// ---------------------------------------------------------------------------
// State and router
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    runner: Arc<CrewRunner>,
    crew_source: Arc<CrewSource>,
    run_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(runner: CrewRunner, crew_source: CrewSource) -> Self {
        Self {
            runner: Arc::new(runner),
            crew_source: Arc::new(crew_source),
            run_lock: Arc::new(Mutex::new(())),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/diagram.svg", get(diagram_svg))
        .route("/health", get(health))
        .route("/api/crew", get(crew_detail))
        .route("/api/launch", get(launch))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(state: AppState, bind: &str, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    tracing::info!("crewlaunch serve listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("crewlaunch serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C");
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    #[serde(default)]
    pub product_name: Option<String>,
}

impl ProductQuery {
    fn brief(&self) -> LaunchBrief {
        match &self.product_name {
            Some(name) => LaunchBrief::new(name.clone()),
            None => LaunchBrief::placeholder(),
        }
    }
}

async fn index(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let crew = state
        .crew_source
        .crew_for(&LaunchBrief::placeholder())
        .map_err(AppError::internal)?;

    let about = crew
        .agents
        .iter()
        .map(|a| {
            format!(
                "<div class=\"agent\"><div class=\"role\">{}</div><div>{}</div></div>",
                escape_html(&a.role),
                escape_html(&a.goal)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    Ok(Html(PAGE_TEMPLATE.replace("{{ABOUT}}", &about)))
}

async fn diagram_svg(State(state): State<AppState>) -> Result<axum::response::Response, AppError> {
    let crew = state
        .crew_source
        .crew_for(&LaunchBrief::placeholder())
        .map_err(AppError::internal)?;
    Ok((
        [(header::CONTENT_TYPE, "image/svg+xml")],
        diagram::render_svg(&crew),
    )
        .into_response())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Debug, Serialize)]
pub struct AgentView {
    pub role: String,
    pub goal: String,
    pub backstory: String,
    pub memory: bool,
    pub allow_delegation: bool,
    pub tools: Vec<String>,
    pub max_iter: usize,
}

#[derive(Debug, Serialize)]
pub struct TaskView {
    pub name: String,
    pub description: String,
    pub expected_output: String,
    /// Role of the assigned agent.
    pub agent: String,
    /// Names of the context tasks, in declared order.
    pub context: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CrewView {
    pub name: String,
    pub agents: Vec<AgentView>,
    pub tasks: Vec<TaskView>,
}

impl From<&Crew> for CrewView {
    fn from(crew: &Crew) -> Self {
        Self {
            name: crew.name.clone(),
            agents: crew
                .agents
                .iter()
                .map(|a| AgentView {
                    role: a.role.clone(),
                    goal: a.goal.clone(),
                    backstory: a.backstory.clone(),
                    memory: a.memory,
                    allow_delegation: a.allow_delegation,
                    tools: a.tools.clone(),
                    max_iter: a.max_iter,
                })
                .collect(),
            tasks: crew
                .tasks
                .iter()
                .map(|t| TaskView {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    expected_output: t.expected_output.clone(),
                    agent: crew.agent_for(t).role.clone(),
                    context: t
                        .context
                        .iter()
                        .filter_map(|&i| crew.tasks.get(i))
                        .map(|c| c.name.clone())
                        .collect(),
                })
                .collect(),
        }
    }
}

async fn crew_detail(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<CrewView>, AppError> {
    let crew = state
        .crew_source
        .crew_for(&query.brief())
        .map_err(AppError::internal)?;
    Ok(Json(CrewView::from(&crew)))
}

async fn launch(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let guard = state
        .run_lock
        .clone()
        .try_lock_owned()
        .map_err(|_| AppError::conflict("a report is already being generated"))?;

    // An empty product name is accepted as-is.
    let brief = LaunchBrief::new(query.product_name.unwrap_or_default());
    let crew = state
        .crew_source
        .crew_for(&brief)
        .map_err(AppError::internal)?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let runner = state.runner.clone();
    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("launch", run_id = %run_id, product = %brief.product_name);
    tokio::spawn(run_launch(runner, crew, tx, guard).instrument(span));

    let stream = async_stream::stream! {
        let mut held: Option<UiUpdate> = None;
        loop {
            let update = match held.take() {
                Some(update) => update,
                None => match rx.recv().await {
                    Some(update) => update,
                    None => break,
                },
            };
            let (update, next) = coalesce_logs(update, &mut rx);
            held = next;
            yield Ok::<_, Infallible>(update.into_event());
        }
    };
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Drive one run and report its outcome on `tx`.
///
/// The run lock is released before the final update goes out, so a client
/// that saw the report can start the next run immediately.
async fn run_launch(
    runner: Arc<CrewRunner>,
    crew: Crew,
    tx: mpsc::UnboundedSender<UiUpdate>,
    guard: OwnedMutexGuard<()>,
) {
    tracing::info!(crew = %crew.name, "launch started");
    let outcome = run_with_surface(&runner, &crew, ChannelSurface::new(tx.clone())).await;
    drop(outcome.surface);
    drop(guard);

    match outcome.result {
        Ok(output) => {
            tracing::info!(seconds = outcome.seconds, "launch finished");
            let _ = tx.send(UiUpdate::Elapsed {
                seconds: (outcome.seconds * 100.0).round() / 100.0,
                text: elapsed_text(outcome.seconds),
            });
            let html = render_markdown(&output.final_output);
            let _ = tx.send(UiUpdate::Report {
                markdown: output.final_output,
                html,
            });
        }
        Err(e) => {
            tracing::error!(error = %e, "launch failed");
            let _ = tx.send(UiUpdate::Failed {
                message: format!("Report generation failed: {e}"),
            });
        }
    }
}
