// Adapter layer and central event loop.
//
// Coordinates chat-bridge events and turn-timer expiries over a single
// `tokio::select!` loop. All session mutation happens here, one event at a
// time, so a command and a timer tick can never interleave on the same room.
// The core signals typed outcomes and errors; this layer alone turns them
// into user-facing text.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::draft::session::{PickOutcome, SessionError, SurveyOutcome};
use crate::gateway::BridgeEvent;
use crate::protocol::{
    Announcement, BridgeMessage, ChatCommand, CommandEnvelope, Outbound, Reply, SummaryOut,
};
use crate::registry::RoomRegistry;
use crate::render;
use crate::timer::TimerExpired;

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// The complete coordinator state: configuration plus every room's session.
pub struct AppState {
    pub config: Config,
    pub registry: RoomRegistry,
}

impl AppState {
    pub fn new(config: Config, registry: RoomRegistry) -> Self {
        AppState { config, registry }
    }
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

/// Run the coordinator event loop.
///
/// Listens on two channels using `tokio::select!`:
/// 1. Bridge events from the gateway (commands, render acks)
/// 2. Turn-timer expiries
///
/// Pushes replies, announcements and summaries through `out_tx`.
pub async fn run(
    mut bridge_rx: mpsc::Receiver<BridgeEvent>,
    mut timer_rx: mpsc::Receiver<TimerExpired>,
    out_tx: mpsc::Sender<Outbound>,
    mut state: AppState,
) -> anyhow::Result<()> {
    info!("Coordinator event loop started");

    loop {
        tokio::select! {
            event = bridge_rx.recv() => {
                match event {
                    Some(BridgeEvent::Connected { addr }) => {
                        info!("Bridge connected from {addr}");
                    }
                    Some(BridgeEvent::Disconnected) => {
                        info!("Bridge disconnected");
                    }
                    Some(BridgeEvent::Message(json)) => {
                        handle_bridge_message(&mut state, &json, &out_tx).await;
                    }
                    None => {
                        info!("Bridge channel closed, shutting down");
                        break;
                    }
                }
            }
            expiry = timer_rx.recv() => {
                match expiry {
                    Some(event) => handle_timer_expired(&mut state, event, &out_tx).await,
                    None => {
                        info!("Timer channel closed, shutting down");
                        break;
                    }
                }
            }
        }
    }

    info!("Coordinator event loop exiting");
    Ok(())
}

// ---------------------------------------------------------------------------
// Bridge message handling
// ---------------------------------------------------------------------------

/// Handle one inbound JSON message from the bridge. Parse failures are
/// logged and dropped; a malformed bridge frame must never take the loop
/// down.
async fn handle_bridge_message(state: &mut AppState, json: &str, out_tx: &mpsc::Sender<Outbound>) {
    let msg: BridgeMessage = match serde_json::from_str(json) {
        Ok(m) => m,
        Err(e) => {
            warn!("Failed to parse bridge message: {e}");
            return;
        }
    };

    match msg {
        BridgeMessage::BridgeConnected(hello) => {
            info!(
                "Bridge identified: {} v{}",
                hello.platform, hello.bridge_version
            );
        }
        BridgeMessage::Command(envelope) => {
            handle_command(state, envelope, out_tx).await;
        }
        BridgeMessage::SummaryRendered(ack) => {
            // Retain the handle so the next summary updates in place. An ack
            // for a room we no longer track is stale; ignore it.
            match state.registry.get_mut(&ack.channel_id) {
                Some(session) => session.last_view_id = Some(ack.view_id),
                None => debug!("Render ack for unknown room {}", ack.channel_id),
            }
        }
    }
}

/// Dispatch one chat command to its room's session and render the result.
async fn handle_command(
    state: &mut AppState,
    envelope: CommandEnvelope,
    out_tx: &mpsc::Sender<Outbound>,
) {
    let channel_id = envelope.channel_id.clone();
    debug!("Command in {channel_id} from {}: {:?}", envelope.issuer, envelope.command);

    match envelope.command {
        ChatCommand::StartDraft { name, emblem_url } => {
            if !is_image_url(&emblem_url) {
                reply(out_tx, &channel_id, invalid_emblem_text(), true).await;
                return;
            }
            state
                .registry
                .get_or_create(&channel_id)
                .start(&name, &emblem_url);
            reply(
                out_tx,
                &channel_id,
                format!(
                    "🚀 Draft started by {}. Waiting for the second commander to /join_draft.",
                    name.trim()
                ),
                false,
            )
            .await;
            send_summary(state, &channel_id, out_tx).await;
        }

        ChatCommand::JoinDraft { name, emblem_url } => {
            if !is_image_url(&emblem_url) {
                reply(out_tx, &channel_id, invalid_emblem_text(), true).await;
                return;
            }
            let result = {
                let session = state.registry.get_or_create(&channel_id);
                session.join(&name, &emblem_url).map(|_| {
                    session
                        .current_party_name()
                        .unwrap_or_default()
                        .to_string()
                })
            };
            match result {
                Ok(first_up) => {
                    reply(
                        out_tx,
                        &channel_id,
                        format!("➕ {} joined! It is {first_up}'s turn.", name.trim()),
                        false,
                    )
                    .await;
                    send_summary(state, &channel_id, out_tx).await;
                }
                Err(e) => reply(out_tx, &channel_id, describe_error(&e), true).await,
            }
        }

        ChatCommand::Pick { option } => {
            let result = state
                .registry
                .get_or_create(&channel_id)
                .pick(&option, &envelope.issuer);
            match result {
                Ok(PickOutcome::Recorded {
                    party,
                    nation,
                    remaining_in_turn,
                }) => {
                    reply(
                        out_tx,
                        &channel_id,
                        format!(
                            "✅ {party} picked {} ({remaining_in_turn} more this turn).",
                            nation.label()
                        ),
                        false,
                    )
                    .await;
                    send_summary(state, &channel_id, out_tx).await;
                }
                Ok(PickOutcome::TurnAdvanced {
                    party,
                    nation,
                    next_party,
                }) => {
                    reply(
                        out_tx,
                        &channel_id,
                        format!("✅ {party} picked {}.", nation.label()),
                        false,
                    )
                    .await;
                    announce(out_tx, &channel_id, format!("➡️ It is {next_party}'s turn.")).await;
                    send_summary(state, &channel_id, out_tx).await;
                }
                Ok(PickOutcome::DraftComplete { party, nation }) => {
                    reply(
                        out_tx,
                        &channel_id,
                        format!("✅ {party} picked {}.", nation.label()),
                        false,
                    )
                    .await;
                    announce(
                        out_tx,
                        &channel_id,
                        "🛡️ Draft complete! Closing question for both commanders: heroes yes \
                         or heroes no. Answer with /survey yes|no."
                            .to_string(),
                    )
                    .await;
                    send_summary(state, &channel_id, out_tx).await;
                }
                Err(e) => reply(out_tx, &channel_id, describe_error(&e), true).await,
            }
        }

        ChatCommand::Survey { choice } => {
            let result = state
                .registry
                .get_or_create(&channel_id)
                .answer_survey(&choice, &envelope.issuer);
            match result {
                Ok(SurveyOutcome::Recorded { party, choice }) => {
                    reply(
                        out_tx,
                        &channel_id,
                        format!("📝 {party} answered: {}.", yes_no(choice)),
                        false,
                    )
                    .await;
                    send_summary(state, &channel_id, out_tx).await;
                }
                Ok(SurveyOutcome::SurveyComplete { party, choice }) => {
                    reply(
                        out_tx,
                        &channel_id,
                        format!("📝 {party} answered: {}.", yes_no(choice)),
                        false,
                    )
                    .await;
                    send_final_recap(state, &channel_id, out_tx).await;
                    announce(
                        out_tx,
                        &channel_id,
                        "🎉 Draft concluded. Use /reset to start a new session in this channel."
                            .to_string(),
                    )
                    .await;
                }
                Err(e) => reply(out_tx, &channel_id, describe_error(&e), true).await,
            }
        }

        ChatCommand::Status => {
            reply(out_tx, &channel_id, "📊 Status refreshed.".to_string(), false).await;
            send_summary(state, &channel_id, out_tx).await;
        }

        ChatCommand::Reset => {
            state.registry.reset(&channel_id);
            reply(
                out_tx,
                &channel_id,
                "🔄 Session reset. Use /start_draft to begin a new draft.".to_string(),
                false,
            )
            .await;
            send_summary(state, &channel_id, out_tx).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Timer expiry handling
// ---------------------------------------------------------------------------

/// Apply a turn-timer expiry, unless it is stale. An event is stale when its
/// room is gone, its generation no longer matches the session's armed timer
/// (reset, re-arm, or completion happened first), or the session has left
/// the drafting phase.
async fn handle_timer_expired(
    state: &mut AppState,
    event: TimerExpired,
    out_tx: &mpsc::Sender<Outbound>,
) {
    let next = {
        let session = match state.registry.get_mut(&event.room_key) {
            Some(s) => s,
            None => {
                debug!("Timer expiry for unknown room {}", event.room_key);
                return;
            }
        };
        if session.timer().generation() != Some(event.generation) {
            debug!(
                "Discarding stale timer expiry for room {} (generation {})",
                event.room_key, event.generation
            );
            return;
        }
        match session.force_advance() {
            Some(next) => next,
            None => {
                debug!(
                    "Timer expiry for room {} ignored: not drafting",
                    event.room_key
                );
                return;
            }
        }
    };

    announce(
        out_tx,
        &event.room_key,
        format!("⏰ Time is up! The turn passes to {next}."),
    )
    .await;
    send_summary(state, &event.room_key, out_tx).await;
}

// ---------------------------------------------------------------------------
// Rendering and validation helpers
// ---------------------------------------------------------------------------

async fn send_summary(state: &mut AppState, channel_id: &str, out_tx: &mpsc::Sender<Outbound>) {
    let preview_limit = state.config.render.preview_limit;
    let session = state.registry.get_or_create(channel_id);
    let summary = render::build_summary(&session.snapshot(preview_limit));
    let update_of = session.last_view_id.clone();
    let _ = out_tx
        .send(Outbound::Summary(SummaryOut {
            channel_id: channel_id.to_string(),
            update_of,
            summary,
        }))
        .await;
}

/// The closing recap is always a fresh message, never an in-place update of
/// the running summary.
async fn send_final_recap(state: &mut AppState, channel_id: &str, out_tx: &mpsc::Sender<Outbound>) {
    let preview_limit = state.config.render.preview_limit;
    let session = state.registry.get_or_create(channel_id);
    let summary = render::build_final_recap(&session.snapshot(preview_limit));
    let _ = out_tx
        .send(Outbound::Summary(SummaryOut {
            channel_id: channel_id.to_string(),
            update_of: None,
            summary,
        }))
        .await;
}

async fn reply(out_tx: &mpsc::Sender<Outbound>, channel_id: &str, text: String, ephemeral: bool) {
    let _ = out_tx
        .send(Outbound::Reply(Reply {
            channel_id: channel_id.to_string(),
            text,
            ephemeral,
        }))
        .await;
}

async fn announce(out_tx: &mpsc::Sender<Outbound>, channel_id: &str, text: String) {
    let _ = out_tx
        .send(Outbound::Announcement(Announcement {
            channel_id: channel_id.to_string(),
            text,
        }))
        .await;
}

/// Emblem references must be direct http(s) image URLs; a query string after
/// the extension is allowed.
pub fn is_image_url(url: &str) -> bool {
    if url.contains(char::is_whitespace) {
        return false;
    }
    let rest = match url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
    {
        Some(rest) if !rest.is_empty() => rest,
        _ => return false,
    };
    let path = rest.split('?').next().unwrap_or(rest).to_ascii_lowercase();
    [".png", ".jpg", ".jpeg", ".gif", ".webp"]
        .iter()
        .any(|ext| path.ends_with(ext))
}

fn invalid_emblem_text() -> String {
    "❌ The emblem must be a direct http(s) image URL (png/jpg/jpeg/gif/webp).".to_string()
}

fn yes_no(choice: bool) -> &'static str {
    if choice {
        "Yes"
    } else {
        "No"
    }
}

/// Turn a session error into the text the issuer sees. The core never
/// formats user-facing messages itself.
fn describe_error(error: &SessionError) -> String {
    use crate::draft::session::Phase;
    match error {
        SessionError::NotInPhase { expected, actual } => match expected {
            Phase::Waiting => {
                "❌ There is no draft waiting for a join. Start one with /start_draft.".to_string()
            }
            Phase::Drafting => {
                "❌ There is no draft in progress. Start with /start_draft and /join_draft."
                    .to_string()
            }
            Phase::Survey => "❌ The closing survey is not open yet. Finish the draft first."
                .to_string(),
            _ => format!("❌ That command is not valid right now ({actual} phase)."),
        },
        SessionError::OptionUnavailable { input } => {
            format!("❌ \"{input}\" is not available or was already taken.")
        }
        SessionError::NotYourTurn { current } => format!("ℹ️ It is {current}'s turn."),
        SessionError::SelectionLimitReached { party } => {
            format!("❌ {party} has already selected 5 nations.")
        }
        SessionError::MissingSecondParty => {
            "❌ Two commanders are needed. Join with /join_draft.".to_string()
        }
        SessionError::InvalidSurveyChoice { .. } => "❌ Answer with yes or no.".to_string(),
        SessionError::UnauthorizedSurveyResponder => {
            "❌ Only the two commanders may answer the closing survey.".to_string()
        }
    }
}
