// Summary rendering: turns session snapshots into the embed-shaped documents
// the chat bridge displays.
//
// The bridge owns the actual message formatting for its platform; this module
// only decides content. Field text mirrors the session snapshot and never
// reaches into the core.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::draft::catalog::Nation;
use crate::draft::session::{PartySnapshot, Phase, SessionSnapshot};

/// Title of the running draft summary.
pub const SUMMARY_TITLE: &str = "🎯 Nation Draft";

/// Title of the final recap posted when the session completes.
pub const RECAP_TITLE: &str = "✅ Final Recap — Nation Draft";

/// Placeholder for empty lists and unset names.
const EMPTY: &str = "—";

/// An embed-shaped document: a title, an accent color tag, optional emblem
/// slots, and a list of named fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub title: String,
    pub color: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    pub fields: Vec<SummaryField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

/// Build the running summary for a session snapshot.
pub fn build_summary(snap: &SessionSnapshot) -> Summary {
    let p0 = &snap.parties[0];
    let p1 = &snap.parties[1];

    let mut fields = vec![
        SummaryField {
            name: "Commanders".to_string(),
            value: format!("{} vs {}", name_or_dash(p0), name_or_dash(p1)),
            inline: false,
        },
        SummaryField {
            name: "Turn".to_string(),
            value: turn_line(snap),
            inline: false,
        },
        SummaryField {
            name: "Timer".to_string(),
            value: format_timer(snap),
            inline: false,
        },
        SummaryField {
            name: p0.name.clone().unwrap_or_else(|| "Commander 1".to_string()),
            value: format_selections(&p0.selections),
            inline: true,
        },
        SummaryField {
            name: p1.name.clone().unwrap_or_else(|| "Commander 2".to_string()),
            value: format_selections(&p1.selections),
            inline: true,
        },
    ];

    if matches!(snap.phase, Phase::Survey | Phase::Complete) {
        fields.push(SummaryField {
            name: "Survey".to_string(),
            value: survey_lines(p0, p1),
            inline: false,
        });
    }

    fields.push(SummaryField {
        name: format!("Available (first {})", snap.available_preview.len()),
        value: format_preview(&snap.available_preview),
        inline: false,
    });

    Summary {
        title: SUMMARY_TITLE.to_string(),
        color: "blurple".to_string(),
        thumbnail_url: p0.emblem_url.clone(),
        image_url: p1.emblem_url.clone(),
        fields,
    }
}

/// Build the closing recap: both pick lists plus both survey answers.
pub fn build_final_recap(snap: &SessionSnapshot) -> Summary {
    let p0 = &snap.parties[0];
    let p1 = &snap.parties[1];
    Summary {
        title: RECAP_TITLE.to_string(),
        color: "green".to_string(),
        thumbnail_url: p0.emblem_url.clone(),
        image_url: p1.emblem_url.clone(),
        fields: vec![
            SummaryField {
                name: name_or_dash(p0),
                value: format_selections(&p0.selections),
                inline: true,
            },
            SummaryField {
                name: name_or_dash(p1),
                value: format_selections(&p1.selections),
                inline: true,
            },
            SummaryField {
                name: "Survey".to_string(),
                value: survey_lines(p0, p1),
                inline: false,
            },
        ],
    }
}

/// "🇩🇪 Germania, 🇦🇹 Austria" -- or a dash when nothing is selected yet.
pub fn format_selections(nations: &[Nation]) -> String {
    if nations.is_empty() {
        return EMPTY.to_string();
    }
    nations
        .iter()
        .map(Nation::label)
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_preview(nations: &[Nation]) -> String {
    if nations.is_empty() {
        return EMPTY.to_string();
    }
    nations
        .iter()
        .map(Nation::label)
        .collect::<Vec<_>>()
        .join(" • ")
}

/// Clock line: "29m 59s" while drafting, a dash otherwise.
fn format_timer(snap: &SessionSnapshot) -> String {
    match (snap.phase, snap.time_remaining) {
        (Phase::Drafting, Some(remaining)) => format_remaining(remaining),
        _ => EMPTY.to_string(),
    }
}

fn format_remaining(remaining: Duration) -> String {
    let total = remaining.as_secs();
    format!("⏱ {}m {:02}s", total / 60, total % 60)
}

fn turn_line(snap: &SessionSnapshot) -> String {
    match snap.phase {
        Phase::Drafting => snap.turn_name.clone().unwrap_or_else(|| EMPTY.to_string()),
        Phase::Survey => "Closing question: heroes yes / heroes no".to_string(),
        phase => phase.to_string(),
    }
}

fn survey_lines(p0: &PartySnapshot, p1: &PartySnapshot) -> String {
    format!(
        "• {}: {}\n• {}: {}",
        name_or_dash(p0),
        answer_label(p0.survey_answer),
        name_or_dash(p1),
        answer_label(p1.survey_answer),
    )
}

fn answer_label(answer: Option<bool>) -> &'static str {
    match answer {
        Some(true) => "Yes",
        Some(false) => "No",
        None => EMPTY,
    }
}

fn name_or_dash(party: &PartySnapshot) -> String {
    party.name.clone().unwrap_or_else(|| EMPTY.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::catalog::CATALOG;

    fn party(name: &str, picks: usize, answer: Option<bool>) -> PartySnapshot {
        PartySnapshot {
            name: Some(name.to_string()),
            emblem_url: Some(format!("https://example.com/{name}.png")),
            selections: CATALOG[..picks].to_vec(),
            survey_answer: answer,
        }
    }

    fn drafting_snapshot() -> SessionSnapshot {
        SessionSnapshot {
            phase: Phase::Drafting,
            parties: [party("Alice", 1, None), party("Bob", 0, None)],
            turn_name: Some("Bob".to_string()),
            time_remaining: Some(Duration::from_secs(1799)),
            available_preview: CATALOG[1..11].to_vec(),
            available_total: 19,
        }
    }

    fn field<'a>(summary: &'a Summary, name: &str) -> &'a SummaryField {
        summary
            .fields
            .iter()
            .find(|f| f.name == name)
            .unwrap_or_else(|| panic!("missing field {name}"))
    }

    #[test]
    fn summary_shows_commanders_turn_and_timer() {
        let summary = build_summary(&drafting_snapshot());
        assert_eq!(summary.title, SUMMARY_TITLE);
        assert_eq!(field(&summary, "Commanders").value, "Alice vs Bob");
        assert_eq!(field(&summary, "Turn").value, "Bob");
        assert_eq!(field(&summary, "Timer").value, "⏱ 29m 59s");
        assert_eq!(summary.thumbnail_url.as_deref(), Some("https://example.com/Alice.png"));
        assert_eq!(summary.image_url.as_deref(), Some("https://example.com/Bob.png"));
    }

    #[test]
    fn summary_lists_selections_per_party() {
        let summary = build_summary(&drafting_snapshot());
        assert_eq!(field(&summary, "Alice").value, "🇩🇪 Germania");
        assert!(field(&summary, "Alice").inline);
        assert_eq!(field(&summary, "Bob").value, "—");
    }

    #[test]
    fn summary_preview_is_capped_and_pool_ordered() {
        let summary = build_summary(&drafting_snapshot());
        let preview = field(&summary, "Available (first 10)");
        assert!(preview.value.starts_with("🇦🇹 Austria • 🇫🇷 Francia"));
        assert_eq!(preview.value.matches(" • ").count(), 9);
    }

    #[test]
    fn idle_snapshot_renders_dashes() {
        let snap = SessionSnapshot {
            phase: Phase::Idle,
            parties: [
                PartySnapshot {
                    name: None,
                    emblem_url: None,
                    selections: vec![],
                    survey_answer: None,
                },
                PartySnapshot {
                    name: None,
                    emblem_url: None,
                    selections: vec![],
                    survey_answer: None,
                },
            ],
            turn_name: None,
            time_remaining: None,
            available_preview: CATALOG[..10].to_vec(),
            available_total: 20,
        };
        let summary = build_summary(&snap);
        assert_eq!(field(&summary, "Commanders").value, "— vs —");
        assert_eq!(field(&summary, "Turn").value, "idle");
        assert_eq!(field(&summary, "Timer").value, "—");
        assert_eq!(field(&summary, "Commander 1").value, "—");
    }

    #[test]
    fn survey_phase_adds_answer_lines() {
        let snap = SessionSnapshot {
            phase: Phase::Survey,
            parties: [party("Alice", 5, Some(true)), party("Bob", 5, None)],
            turn_name: None,
            time_remaining: None,
            available_preview: CATALOG[10..20].to_vec(),
            available_total: 10,
        };
        let summary = build_summary(&snap);
        assert_eq!(
            field(&summary, "Turn").value,
            "Closing question: heroes yes / heroes no"
        );
        assert_eq!(field(&summary, "Survey").value, "• Alice: Yes\n• Bob: —");
    }

    #[test]
    fn final_recap_has_both_rosters_and_answers() {
        let snap = SessionSnapshot {
            phase: Phase::Complete,
            parties: [party("Alice", 5, Some(true)), party("Bob", 5, Some(false))],
            turn_name: None,
            time_remaining: None,
            available_preview: CATALOG[10..20].to_vec(),
            available_total: 10,
        };
        let recap = build_final_recap(&snap);
        assert_eq!(recap.title, RECAP_TITLE);
        assert_eq!(recap.color, "green");
        assert_eq!(recap.fields.len(), 3);
        assert_eq!(field(&recap, "Survey").value, "• Alice: Yes\n• Bob: No");
        assert!(field(&recap, "Alice").value.contains("🇹🇷 Impero Ottomano"));
    }

    #[test]
    fn timer_format_pads_seconds() {
        let snap = SessionSnapshot {
            time_remaining: Some(Duration::from_secs(65)),
            ..drafting_snapshot()
        };
        let summary = build_summary(&snap);
        assert_eq!(field(&summary, "Timer").value, "⏱ 1m 05s");
    }
}
