// Wire protocol between the chat bridge and the coordinator.
//
// The bridge (the process that actually talks to the chat platform) connects
// over the gateway WebSocket and exchanges tagged JSON messages: commands and
// render acks inbound, replies/announcements/summaries outbound. The
// coordinator never sees platform-specific message objects, only this
// protocol.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::render::Summary;

// ---------------------------------------------------------------------------
// Inbound: bridge -> coordinator
// ---------------------------------------------------------------------------

/// Messages received from the chat bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BridgeMessage {
    /// The bridge identifies itself after connecting.
    BridgeConnected(BridgeHello),
    /// A chat command issued in some channel.
    Command(CommandEnvelope),
    /// The bridge rendered (or re-rendered) a summary and reports the handle
    /// to use for future in-place updates of that channel's summary.
    SummaryRendered(RenderAck),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeHello {
    pub platform: String,
    pub bridge_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    /// Room key: one draft session per channel.
    pub channel_id: String,
    /// Display name of the command issuer as resolved by the bridge. This is
    /// the claimant identity for picks and survey answers.
    pub issuer: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    pub command: ChatCommand,
}

/// The chat commands the coordinator understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "args", rename_all = "snake_case")]
pub enum ChatCommand {
    StartDraft { name: String, emblem_url: String },
    JoinDraft { name: String, emblem_url: String },
    Pick { option: String },
    Survey { choice: String },
    Status,
    Reset,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderAck {
    pub channel_id: String,
    /// Opaque rendering handle (e.g. a platform message id).
    pub view_id: String,
}

// ---------------------------------------------------------------------------
// Outbound: coordinator -> bridge
// ---------------------------------------------------------------------------

/// Messages sent to the chat bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outbound {
    /// Direct reply to the command issuer.
    Reply(Reply),
    /// Free-standing channel message (turn changes, expiry notices).
    Announcement(Announcement),
    /// The channel summary. When `update_of` is set the bridge edits that
    /// rendering in place if it can still resolve the handle; otherwise it
    /// posts a fresh one and acks the new handle with
    /// [`BridgeMessage::SummaryRendered`].
    Summary(SummaryOut),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub channel_id: String,
    pub text: String,
    /// Visible only to the issuer (validation failures and the like).
    pub ephemeral: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Announcement {
    pub channel_id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryOut {
    pub channel_id: String,
    #[serde(default)]
    pub update_of: Option<String>,
    pub summary: Summary,
}
