use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        DefaultBodyLimit, Multipart, Request, State,
    },
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    serve, Json, Router,
};
use futures::{future, stream::StreamExt, Sink, SinkExt};
use minijinja::{path_loader, Environment};
use minijinja_autoreload::AutoReloader;
use serde::{Deserialize, Serialize};
use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::constants;
use crate::conversation::{SessionProfile, Turn};
use crate::dispatcher::CompletionDispatcher;
use crate::error::AssistantError;
use crate::estimator::{
    estimate, ConstructionGrade, MaterialEstimate, ParameterError, ProjectParameters, ProjectType,
};
use crate::prompts::{self, PromptProfile};
use crate::session::Session;
use crate::stream::StreamUpdate;

/// Messages a browser sends over the WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    Chat { text: String },
    GenerateDesign { description: String },
    Vastu { topic: String },
    Estimate(EstimateForm),
}

/// Messages pushed to the browser over the WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    History { turns: Vec<Turn> },
    Partial { text: String },
    Complete { text: String },
    DesignImage { url: String },
    VastuAdvice { topic: String, text: String },
    Estimate { estimate: EstimateView },
    Notice { message: String, detail: String },
    Profile { profile: SessionProfile, welcome: Option<String> },
}

impl ServerEvent {
    fn notice(message: impl Into<String>, detail: impl Into<String>) -> Self {
        ServerEvent::Notice {
            message: message.into(),
            detail: detail.into(),
        }
    }
}

impl From<&AssistantError> for ServerEvent {
    fn from(err: &AssistantError) -> Self {
        ServerEvent::notice(err.user_notice(), err.to_string())
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct EstimateForm {
    pub project_type: ProjectType,
    pub floors: u32,
    pub total_area: f64,
    pub construction_grade: ConstructionGrade,
}

impl EstimateForm {
    pub fn parameters(&self) -> Result<ProjectParameters, ParameterError> {
        ProjectParameters::new(self.project_type, self.floors, self.total_area, self.construction_grade)
    }
}

/// Display-ready calculator tables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstimateView {
    pub total_cement_bags: f64,
    pub materials: Vec<MaterialRow>,
    pub timeline: Vec<PhaseRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterialRow {
    pub material: String,
    pub quantity: String,
    pub cost: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseRow {
    pub phase: String,
    pub duration_weeks: u32,
    pub cement_bags: String,
}

impl From<&MaterialEstimate> for EstimateView {
    fn from(estimate: &MaterialEstimate) -> Self {
        Self {
            total_cement_bags: estimate.total_cement_bags,
            materials: estimate
                .materials
                .iter()
                .map(|line| MaterialRow {
                    material: line.material.to_string(),
                    quantity: line.display_quantity(),
                    cost: line.display_cost(),
                })
                .collect(),
            timeline: estimate
                .timeline
                .iter()
                .map(|phase| PhaseRow {
                    phase: phase.phase.to_string(),
                    duration_weeks: phase.duration_weeks,
                    cement_bags: phase.display_allocation(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub analysis: String,
    pub next_steps: Vec<String>,
    pub helpline: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NoticeBody {
    pub message: String,
    pub detail: String,
}

pub enum ApiError {
    Assistant(AssistantError),
    Parameters(ParameterError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Assistant(err) => {
                let status = match err {
                    AssistantError::BackendUnavailable(_) => StatusCode::BAD_GATEWAY,
                    AssistantError::Analysis(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    AssistantError::EmptyPrompt | AssistantError::Codec(_) => StatusCode::BAD_REQUEST,
                };
                (status, NoticeBody { message: err.user_notice().to_string(), detail: err.to_string() })
            }
            ApiError::Parameters(err) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                NoticeBody { message: "Please check the project details.".to_string(), detail: err.to_string() },
            ),
        };
        (status, Json(body)).into_response()
    }
}

// Shared application state
#[derive(Clone)]
pub struct AppState {
    templates: Arc<AutoReloader>,
    dispatcher: CompletionDispatcher,
    prompts: &'static PromptProfile,
}

impl AppState {
    pub fn new(dispatcher: CompletionDispatcher, prompts: &'static PromptProfile) -> Self {
        Self::with_templates(dispatcher, prompts, "templates")
    }

    pub fn with_templates(
        dispatcher: CompletionDispatcher,
        prompts: &'static PromptProfile,
        template_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            templates: Arc::new(create_minijinja_env(template_dir.into())),
            dispatcher,
            prompts,
        }
    }
}

// Minijinja Environment setup
fn create_minijinja_env(template_dir: PathBuf) -> AutoReloader {
    AutoReloader::new(move |notifier| {
        let loader = path_loader(&template_dir);
        let mut env = Environment::new();
        env.set_loader(loader);
        notifier.watch_path(Path::new(&template_dir), true);
        Ok(env)
    })
}

async fn index_handler(State(state): State<AppState>) -> Result<Html<String>, (StatusCode, Html<String>)> {
    let project_types: Vec<&str> = ProjectType::ALL.iter().map(|kind| kind.label()).collect();
    let grades: Vec<&str> = ConstructionGrade::ALL.iter().map(|grade| grade.label()).collect();

    state
        .templates
        .acquire_env()
        .and_then(|env| {
            env.get_template("index.html").and_then(|tmpl| {
                let context = minijinja::context! {
                    title => state.prompts.title,
                    placeholder => state.prompts.chat_placeholder,
                    products => prompts::PRODUCTS,
                    vastu_topics => prompts::VASTU_TOPICS,
                    project_types => project_types,
                    grades => grades,
                    helpline => constants::HELPLINE,
                    email => constants::SUPPORT_EMAIL,
                    offers => prompts::OFFERS,
                };
                tmpl.render(context)
            })
        })
        .map(Html)
        .map_err(|e| {
            error!("Failed to get or render template: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, Html(format!("Internal Server Error: {}", e)))
        })
}

async fn analyze_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AnalysisResponse>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Assistant(AssistantError::Codec(e.to_string())))?
    {
        if field.name() == Some("design") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::Assistant(AssistantError::Codec(e.to_string())))?;
            upload = Some(bytes);
            break;
        }
    }
    let upload = upload
        .ok_or_else(|| ApiError::Assistant(AssistantError::Codec("no design file in upload".to_string())))?;
    info!(bytes = upload.len(), "Design uploaded for analysis");

    let analysis = state
        .dispatcher
        .analyze_design(state.prompts, &upload)
        .await
        .map_err(ApiError::Assistant)?;

    Ok(Json(AnalysisResponse {
        analysis,
        next_steps: state.prompts.analysis_next_steps.iter().map(|s| s.to_string()).collect(),
        helpline: constants::HELPLINE.to_string(),
    }))
}

async fn estimate_handler(Json(form): Json<EstimateForm>) -> Result<Json<EstimateView>, ApiError> {
    let params = form.parameters().map_err(ApiError::Parameters)?;
    Ok(Json(EstimateView::from(&estimate(&params))))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    info!("WebSocket connection upgrade requested");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

// Each connection owns one session for its whole lifetime.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let mut session = Session::start(state.dispatcher.clone(), state.prompts);
    info!(session = %session.id, "New WebSocket connection established");

    let (ws_tx, mut ws_rx) = socket.split();
    let mut events = ws_tx.with(|event: ServerEvent| {
        future::ready(
            serde_json::to_string(&event)
                .map(Message::Text)
                .map_err(axum::Error::new),
        )
    });

    let history = ServerEvent::History {
        turns: session.visible_turns().cloned().collect(),
    };
    if events.send(history).await.is_err() {
        warn!("Failed to send history to new WebSocket client");
        return;
    }

    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let event = match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!("Ignoring malformed client message: {}", e);
                        if events.send(ServerEvent::notice("Unrecognised request.", e.to_string())).await.is_err() {
                            break;
                        }
                        continue;
                    }
                };
                if handle_client_event(&mut session, event, &mut events).await.is_err() {
                    warn!("WebSocket client disconnected or send error. Closing connection.");
                    break;
                }
            }
            Ok(Message::Binary(_)) => warn!("Received unexpected binary message from client"),
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!("Client requested WebSocket close");
                break;
            }
            Err(e) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
        }
    }
    info!(session = %session.id, turns = session.messages().len(), "WebSocket connection closed");
}

/// Runs one user action against the session, pushing results to `sink`.
/// Only sink failures are returned; assistant failures become notices.
pub async fn handle_client_event<S>(session: &mut Session, event: ClientEvent, sink: &mut S) -> Result<(), S::Error>
where
    S: Sink<ServerEvent> + Unpin,
{
    match event {
        ClientEvent::Chat { text } => {
            let text = text.trim();
            if text.is_empty() {
                return Ok(());
            }
            let before = session.profile().clone();
            {
                let mut pending = session.submit_chat(text).await;
                while let Some(update) = pending.next_update().await {
                    match update {
                        StreamUpdate::Partial(text) => sink.send(ServerEvent::Partial { text }).await?,
                        StreamUpdate::Complete(text) => sink.send(ServerEvent::Complete { text }).await?,
                        StreamUpdate::Failed { reply, error } => {
                            sink.send(ServerEvent::Complete { text: reply }).await?;
                            sink.send(ServerEvent::from(&error)).await?;
                        }
                    }
                }
            }
            if session.profile() != &before {
                let profile = session.profile().clone();
                let welcome = profile.welcome();
                sink.send(ServerEvent::Profile { profile, welcome }).await?;
            }
        }
        ClientEvent::GenerateDesign { description } => match session.generate_design(&description).await {
            Ok(url) => sink.send(ServerEvent::DesignImage { url }).await?,
            Err(err) => sink.send(ServerEvent::from(&err)).await?,
        },
        ClientEvent::Vastu { topic } => match session.vastu_advice(&topic).await {
            Ok(text) => sink.send(ServerEvent::VastuAdvice { topic, text }).await?,
            Err(err) => sink.send(ServerEvent::from(&err)).await?,
        },
        ClientEvent::Estimate(form) => match form.parameters() {
            Ok(params) => {
                let estimate = EstimateView::from(&session.estimate(&params));
                sink.send(ServerEvent::Estimate { estimate }).await?
            }
            Err(err) => sink.send(ServerEvent::notice("Please check the project details.", err.to_string())).await?,
        },
    }
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    // Serve static files from the `static` directory
    let static_files_service = ServeDir::new("static").not_found_service(tower::service_fn(|_req: Request| async {
        Ok::<_, std::convert::Infallible>((StatusCode::NOT_FOUND, "Not Found").into_response())
    }));

    Router::new()
        .route("/", get(index_handler))
        .route("/ws", get(ws_handler))
        .route(
            "/api/analyze",
            post(analyze_handler).layer(DefaultBodyLimit::max(constants::MAX_UPLOAD_BYTES)),
        )
        .route("/api/estimate", post(estimate_handler))
        .nest_service("/static", static_files_service)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn start_web_server(port: u16, state: AppState) -> Result<()> {
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Web server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind to address {}", addr))?;

    serve(listener, app.into_make_service())
        .await
        .context("Web server failed")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backend::fake::FakeBackend;
    use crate::dispatcher::ModelSelection;
    use crate::prompts::ASSISTANT;

    fn session_with(backend: FakeBackend) -> Session {
        Session::start(CompletionDispatcher::new(Arc::new(backend), ModelSelection::default()), &ASSISTANT)
    }

    async fn run(session: &mut Session, event: ClientEvent) -> Vec<ServerEvent> {
        let (mut tx, rx) = futures::channel::mpsc::unbounded();
        handle_client_event(session, event, &mut tx).await.unwrap();
        drop(tx);
        rx.collect().await
    }

    #[tokio::test]
    async fn test_missing_template_is_server_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let dispatcher = CompletionDispatcher::new(Arc::new(FakeBackend::unavailable()), ModelSelection::default());
        let state = AppState::with_templates(dispatcher, &ASSISTANT, dir.path());
        match index_handler(State(state)).await {
            Err((status, Html(body))) => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert!(body.starts_with("Internal Server Error"));
            }
            Ok(_) => panic!("rendered without a template"),
        }
    }

    #[tokio::test]
    async fn test_chat_event_streams_partials() {
        let mut session = session_with(FakeBackend::streaming(&["Hello ", "Priya"]));
        let events = run(&mut session, ClientEvent::Chat { text: "my name is Priya".to_string() }).await;
        assert_eq!(events[0], ServerEvent::Partial { text: "Hello ▌".to_string() });
        assert_eq!(events[1], ServerEvent::Partial { text: "Hello Priya▌".to_string() });
        assert_eq!(events[2], ServerEvent::Complete { text: "Hello Priya".to_string() });
        assert!(matches!(&events[3], ServerEvent::Profile { welcome: Some(w), .. } if w == "Welcome, Priya!"));
        assert_eq!(events.len(), 4);
    }

    #[tokio::test]
    async fn test_chat_failure_sends_apology_and_notice() {
        let mut session = session_with(FakeBackend::unavailable());
        let events = run(&mut session, ClientEvent::Chat { text: "hello".to_string() }).await;
        assert_eq!(events[0], ServerEvent::Complete { text: ASSISTANT.apology.to_string() });
        assert!(matches!(&events[1], ServerEvent::Notice { .. }));
        assert_eq!(session.messages().len(), 3);
    }

    #[tokio::test]
    async fn test_blank_chat_is_ignored() {
        let mut session = session_with(FakeBackend::streaming(&["unused"]));
        let events = run(&mut session, ClientEvent::Chat { text: "   ".to_string() }).await;
        assert!(events.is_empty());
        assert_eq!(session.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_design_gets_notice() {
        let mut session = session_with(FakeBackend::unavailable());
        let events = run(&mut session, ClientEvent::GenerateDesign { description: " ".to_string() }).await;
        assert_eq!(events, vec![ServerEvent::from(&AssistantError::EmptyPrompt)]);
    }

    #[tokio::test]
    async fn test_estimate_event() {
        let mut session = session_with(FakeBackend::unavailable());
        let form = EstimateForm {
            project_type: ProjectType::Residential,
            floors: 1,
            total_area: 1000.0,
            construction_grade: ConstructionGrade::Premium,
        };
        let events = run(&mut session, ClientEvent::Estimate(form)).await;
        match &events[0] {
            ServerEvent::Estimate { estimate } => {
                assert_eq!(estimate.materials[0].quantity, "400 bags");
                assert_eq!(estimate.timeline[3].cement_bags, "N/A");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_estimate_gets_notice() {
        let mut session = session_with(FakeBackend::unavailable());
        let form = EstimateForm {
            project_type: ProjectType::Commercial,
            floors: 0,
            total_area: 1000.0,
            construction_grade: ConstructionGrade::Basic,
        };
        let events = run(&mut session, ClientEvent::Estimate(form)).await;
        assert!(matches!(&events[0], ServerEvent::Notice { detail, .. } if detail.contains("floors")));
    }

    #[test]
    fn test_client_event_json() {
        let event: ClientEvent = serde_json::from_str(
            r#"{"type":"estimate","project_type":"industrial","floors":2,"total_area":2500,"construction_grade":"luxury"}"#,
        )
        .unwrap();
        assert!(matches!(event, ClientEvent::Estimate(EstimateForm { floors: 2, .. })));

        let event: ClientEvent = serde_json::from_str(r#"{"type":"vastu","topic":"Kitchen"}"#).unwrap();
        assert!(matches!(event, ClientEvent::Vastu { ref topic } if topic == "Kitchen"));
    }

    #[test]
    fn test_server_event_json() {
        let value = serde_json::to_value(ServerEvent::Partial { text: "Hi▌".to_string() }).unwrap();
        assert_eq!(value, serde_json::json!({"type": "partial", "text": "Hi▌"}));
    }
}
