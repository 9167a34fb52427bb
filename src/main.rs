//! Host/frame handshake over in-memory windows.
//!
//! Runs both endpoints of the dashboard channel in one process: the host
//! document targets the frame by selector before it is mounted, waits for
//! the frame's `ready`, pushes a theme, fetches dashboard variables, and
//! finally shows an unanswered request timing out.

use std::collections::BTreeMap;
use std::time::Duration;

use crossframe::frames::{ChangeTheme, DashboardVariables, DocumentTitleChange, Message, MessageType, Theme};
use crossframe::{CrossFrameMessenger, Listener, MemoryWindow, MessengerConfig, MessengerError, TrustedOrigins};
use tracing_subscriber::EnvFilter;

const HOST_ORIGIN: &str = "https://pmm.local";
const FRAME_SELECTOR: &str = "#grafana-iframe";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = MessengerConfig::from_env("document")?;
    let trusted = if config.trusted_origins.is_empty() {
        TrustedOrigins::new([HOST_ORIGIN])
    } else {
        config.trusted_origins()
    };

    let host_window = MemoryWindow::new(HOST_ORIGIN);
    let frame_window = MemoryWindow::new(HOST_ORIGIN);

    // Host: the frame does not exist yet, so target it by selector.
    let host = CrossFrameMessenger::from_config(&config, host_window.clone());
    if config.fallback_selector.is_none() {
        host.set_target_window(None, Some(FRAME_SELECTOR));
    }
    host.register();
    host.add_listener(trusted.listener(MessageType::DocumentTitleChange, |message, _origin| {
        match message.payload_as::<DocumentTitleChange>() {
            Ok(change) => tracing::info!(title = %change.title, "frame title changed"),
            Err(e) => tracing::warn!(error = %e, "bad title payload"),
        }
    }));
    let ready = host.wait_for_message(MessageType::Ready, None);

    // Frame: mounted late, answers variable requests, follows the theme.
    let selector = config.fallback_selector.as_deref().unwrap_or(FRAME_SELECTOR);
    host_window.mount_frame(selector, frame_window.clone());
    let frame = CrossFrameMessenger::new("iframe", frame_window.clone());
    frame.set_target_window(Some(host_window.clone()), None).register();

    let responder = frame.downgrade();
    frame.add_listener(Listener::new(MessageType::DashboardVariables, move |request, _origin| {
        let Some(frame) = responder.upgrade() else {
            return;
        };
        let vars = DashboardVariables {
            variables: BTreeMap::from([
                ("environment".to_owned(), vec!["prod".to_owned()]),
                ("service_name".to_owned(), vec!["mysql-1".to_owned(), "mysql-2".to_owned()]),
            ]),
        };
        if let Err(e) = frame.respond(request, &vars) {
            tracing::warn!(error = %e, "failed to answer variables request");
        }
    }));
    frame.add_listener(Listener::new(MessageType::ChangeTheme, |message, _origin| {
        match message.payload_as::<ChangeTheme>() {
            Ok(change) => tracing::info!(theme = ?change.theme, "frame switched theme"),
            Err(e) => tracing::warn!(error = %e, "bad theme payload"),
        }
    }));

    frame.send_message(Message::new(MessageType::Ready));
    ready.await?;
    tracing::info!("frame ready");

    host.send_message(Message::typed(&ChangeTheme { theme: Theme::Dark })?);
    frame.send_message(Message::typed(&DocumentTitleChange { title: "MySQL Instance Summary".to_owned() })?);

    let vars: DashboardVariables = host.request(None).await?;
    tracing::info!(variables = ?vars.variables, "dashboard variables");

    // With the frame gone quiet, a request runs into its timeout.
    frame.unregister();
    let unanswered = host.send_message_with_result(Message::new(MessageType::DashboardVariables), Some(Duration::from_millis(50)));
    match unanswered.await {
        Err(MessengerError::Timeout { message_type, timeout }) => {
            tracing::info!(%message_type, timeout_ms = timeout.as_millis(), "request timed out as expected");
        }
        other => tracing::warn!(result = ?other, "expected a timeout"),
    }

    host.unregister();
    Ok(())
}
