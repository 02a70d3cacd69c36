//! ==============================================================================
//! server.rs - dashboard web server
//! ==============================================================================
//!
//! purpose:
//!     exposes the latest telemetry snapshot over http. the page and the api
//!     only ever read from `StatePublisher`; the one write is the energy
//!     reset, which is forwarded to the engine as a command.
//!
//! routes:
//!     GET  /                    status page rendered from the snapshot
//!     GET  /api                 full snapshot as json
//!     GET  /api/heat            heat overlay for the motor sensor (t1)
//!     POST /api/energy/reset    zero the energy total
//!
//! relationships:
//!     - uses: publisher.rs (snapshot reads, reset command)
//!     - uses: visual.rs (heat overlay, unit formatting)
//!     - started by: main.rs, stopped through its cancellation token
//!
//! ==============================================================================

use crate::config::VisualConfig;
use crate::domain::{LinkState, TelemetrySnapshot};
use crate::publisher::StatePublisher;
use crate::visual::{self, HeatOverlay};

use anyhow::{Context, Result};
use axum::{
    extract::State,
    response::{Html, Json},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

#[derive(Clone)]
pub struct ServerState {
    publisher: StatePublisher,
    visual: VisualConfig,
}

impl ServerState {
    pub fn new(publisher: StatePublisher, visual: VisualConfig) -> Self {
        Self { publisher, visual }
    }
}

/// heat overlay response; `overlay` is null until t1 holds a finite value
#[derive(Debug, Serialize)]
pub struct HeatResponse {
    pub temperature: f64,
    pub overlay: Option<HeatOverlay>,
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/", get(dashboard_handler))
        .route("/api", get(api_handler))
        .route("/api/heat", get(heat_handler))
        .route("/api/energy/reset", post(reset_energy_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run(bind: &str, state: ServerState, shutdown: CancellationToken) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {}", bind))?;
    tracing::info!(bind = %bind, "dashboard server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("dashboard server stopped");
    Ok(())
}

async fn dashboard_handler(State(state): State<ServerState>) -> Html<String> {
    Html(render_page(&state.publisher.snapshot(), &state.visual))
}

/// json api endpoint for programmatic access
async fn api_handler(State(state): State<ServerState>) -> Json<Arc<TelemetrySnapshot>> {
    Json(state.publisher.snapshot())
}

async fn heat_handler(State(state): State<ServerState>) -> Json<HeatResponse> {
    let temperature = state.publisher.snapshot().temperature.t1;
    let overlay = HeatOverlay::for_temperature(
        temperature,
        state.visual.cool_threshold,
        state.visual.hot_threshold,
    );
    Json(HeatResponse { temperature, overlay })
}

async fn reset_energy_handler(State(state): State<ServerState>) -> Json<serde_json::Value> {
    tracing::info!("energy reset requested over http");
    state.publisher.reset_energy();
    Json(serde_json::json!({"status": "ok", "action": "energy_reset"}))
}

fn render_page(snap: &TelemetrySnapshot, visual_config: &VisualConfig) -> String {
    let (status_label, status_color) = match snap.connection.state {
        LinkState::Connected => ("connected", "#4ade80"),
        LinkState::Connecting => ("connecting", "#facc15"),
        LinkState::Disconnected => ("disconnected", "#ff6b6b"),
    };
    let error = snap
        .connection
        .error
        .as_deref()
        .map(|e| format!(r#"<p style="color: #ff6b6b;">{}</p>"#, html_escape(e)))
        .unwrap_or_default();

    let temps: String = [("motor (t1)", snap.temperature.t1), ("bearing top (t2)", snap.temperature.t2), ("bearing bottom (t3)", snap.temperature.t3)]
        .iter()
        .map(|(label, t)| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                label,
                visual::format_temperature(*t),
                visual::temperature_status(*t)
            )
        })
        .collect();

    let heat = HeatOverlay::for_temperature(
        snap.temperature.t1,
        visual_config.cool_threshold,
        visual_config.hot_threshold,
    )
    .map(|o| format!("{:.0}%", o.normalized * 100.0))
    .unwrap_or_else(|| "-".to_string());

    let spectrum = match &snap.spectrum {
        Some(s) => format!(
            "peak {} / fs {} / {} bins",
            visual::format_frequency(s.peak),
            visual::format_frequency(s.fs),
            s.bins.len()
        ),
        None => "no spectrum yet".to_string(),
    };
    let tilt = match &snap.tilt {
        Some(t) => format!("pitch {:.1}° / roll {:.1}°", t.pitch, t.roll),
        None => "no tilt yet".to_string(),
    };

    format!(
        r#"<!doctype html>
<html>
<head><title>motor telemetry</title><meta http-equiv="refresh" content="2"></head>
<body style="font-family: system-ui; padding: 2rem; background: #1a1a2e; color: #eee;">
    <h1>motor telemetry</h1>
    <p>link: <strong style="color: {status_color};">{status_label}</strong> (uptime {uptime})</p>
    {error}
    <h2>temperature</h2>
    <table>{temps}</table>
    <p>motor heat: {heat}</p>
    <h2>power</h2>
    <p>{voltage} / {current} / {power}</p>
    <p>energy: {energy}</p>
    <form method="post" action="/api/energy/reset"><button type="submit">reset energy</button></form>
    <h2>vibration</h2>
    <p>{spectrum}</p>
    <h2>tilt</h2>
    <p>{tilt}</p>
    <p style="color: #888;">{messages} messages, {fft} spectrum updates</p>
</body>
</html>"#,
        status_color = status_color,
        status_label = status_label,
        uptime = visual::format_uptime(snap.stats.connection_uptime_seconds),
        error = error,
        temps = temps,
        heat = heat,
        voltage = visual::format_voltage(snap.power.voltage),
        current = visual::format_current(snap.power.current),
        power = visual::format_power(snap.power.power),
        energy = visual::format_energy(snap.energy.total_energy),
        spectrum = spectrum,
        tilt = tilt,
        messages = snap.stats.messages_received,
        fft = snap.stats.fft_updates,
    )
}

/// escape html special characters to prevent xss
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineCommand;
    use tokio::sync::{mpsc, watch};

    fn state_with(
        snap: TelemetrySnapshot,
    ) -> (ServerState, mpsc::UnboundedReceiver<EngineCommand>, watch::Sender<Arc<TelemetrySnapshot>>) {
        let (tx, rx) = watch::channel(Arc::new(snap));
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        (ServerState::new(StatePublisher::new(rx, cmd_tx), VisualConfig::default()), cmd_rx, tx)
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape(r#"<a href="x">&</a>"#), "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;");
    }

    #[tokio::test]
    async fn heat_follows_motor_temperature() {
        let mut snap = TelemetrySnapshot::default();
        snap.temperature.t1 = 47.5;
        let (state, _cmds, _tx) = state_with(snap);

        let Json(heat) = heat_handler(State(state)).await;
        assert_eq!(heat.temperature, 47.5);
        let overlay = heat.overlay.unwrap();
        assert!((overlay.blend_strength - 0.3265625).abs() < 1e-9);
    }

    #[tokio::test]
    async fn api_returns_current_snapshot() {
        let (state, _cmds, tx) = state_with(TelemetrySnapshot::default());
        let mut next = TelemetrySnapshot::default();
        next.stats.messages_received = 9;
        tx.send_replace(Arc::new(next));

        let Json(snap) = api_handler(State(state)).await;
        assert_eq!(snap.stats.messages_received, 9);
    }

    #[tokio::test]
    async fn reset_route_forwards_command() {
        let (state, mut cmds, _tx) = state_with(TelemetrySnapshot::default());
        let Json(body) = reset_energy_handler(State(state)).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(cmds.try_recv(), Ok(EngineCommand::ResetEnergy));
    }

    #[tokio::test]
    async fn page_escapes_connection_error() {
        let mut snap = TelemetrySnapshot::default();
        snap.connection.error = Some("<script>".to_string());
        let (state, _cmds, _tx) = state_with(snap);

        let Html(page) = dashboard_handler(State(state)).await;
        assert!(page.contains("&lt;script&gt;"));
        assert!(!page.contains("<script>"));
        assert!(page.contains("disconnected"));
    }

    #[tokio::test]
    async fn server_stops_on_cancel() {
        let (state, _cmds, _tx) = state_with(TelemetrySnapshot::default());
        let token = CancellationToken::new();
        let server = tokio::spawn(run("127.0.0.1:0", state, token.clone()));
        token.cancel();
        server.await.unwrap().unwrap();
    }
}
