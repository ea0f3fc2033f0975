// Draft session state machine: phases, parties, the shrinking nation pool,
// and turn/quota tracking.
//
// A session reacts to exactly one event at a time (a chat command or a timer
// expiry relayed by the app loop), mutates its state synchronously, and
// reports what happened through a typed outcome or error. All user-facing
// wording lives in the adapter; this module only signals.

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::info;

use crate::timer::{TimerExpired, TurnTimer};

use super::catalog::{Nation, CATALOG};
use super::rules::{self, TurnDecision, OPENING_QUOTA, SELECTIONS_PER_PARTY};

// ---------------------------------------------------------------------------
// Phases and parties
// ---------------------------------------------------------------------------

/// Lifecycle phase of a draft session. The single source of truth for which
/// commands are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Fresh session, no draft started.
    Idle,
    /// Party 0 has started; waiting for party 1 to join.
    Waiting,
    /// Both parties present, picks in progress.
    Drafting,
    /// All nations picked; the closing survey is open.
    Survey,
    /// Survey answered by both parties. Terminal until an explicit reset.
    Complete,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Idle => "idle",
            Phase::Waiting => "waiting",
            Phase::Drafting => "drafting",
            Phase::Survey => "survey",
            Phase::Complete => "complete",
        };
        write!(f, "{s}")
    }
}

/// One of the two competing parties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Party {
    /// Display name, set once when the party enters the draft.
    pub display_name: Option<String>,
    /// Opaque emblem reference (an image URL, validated by the adapter).
    pub emblem_url: Option<String>,
    /// Drafted nations, in pick order. Never exceeds
    /// [`SELECTIONS_PER_PARTY`] entries.
    pub selections: Vec<Nation>,
    /// Closing survey answer; `None` until the party answers.
    pub survey_answer: Option<bool>,
}

// ---------------------------------------------------------------------------
// Errors and outcomes
// ---------------------------------------------------------------------------

/// Validation failures signalled by session operations. All are synchronous
/// and recoverable; the adapter maps them to user-visible messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("command not valid in the {actual} phase (expected {expected})")]
    NotInPhase { expected: Phase, actual: Phase },

    #[error("option \"{input}\" is not available")]
    OptionUnavailable { input: String },

    #[error("it is {current}'s turn")]
    NotYourTurn { current: String },

    #[error("{party} has already reached the selection limit")]
    SelectionLimitReached { party: String },

    #[error("a second party has not joined yet")]
    MissingSecondParty,

    #[error("invalid survey choice \"{input}\"")]
    InvalidSurveyChoice { input: String },

    #[error("responder is not one of the two parties")]
    UnauthorizedSurveyResponder,
}

/// What a successful pick did, so the adapter can announce it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickOutcome {
    /// Pick recorded; the same party has picks left this turn.
    Recorded {
        party: String,
        nation: Nation,
        remaining_in_turn: u32,
    },
    /// Pick recorded and the turn passed to the other party.
    TurnAdvanced {
        party: String,
        nation: Nation,
        next_party: String,
    },
    /// Pick recorded and it completed the draft: the survey is now open.
    DraftComplete { party: String, nation: Nation },
}

/// What a successful survey answer did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurveyOutcome {
    /// Answer recorded; the other party has not answered yet.
    Recorded { party: String, choice: bool },
    /// Answer recorded and both parties have now answered: the session is
    /// complete.
    SurveyComplete { party: String, choice: bool },
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The per-room draft session.
#[derive(Debug)]
pub struct DraftSession {
    pub phase: Phase,
    pub parties: [Party; 2],
    /// Index (0/1) of the party whose turn it is during `Drafting`.
    pub turn_index: usize,
    pub picks_made_this_turn: u32,
    pub picks_quota_this_turn: u32,
    /// Handle of the last rendered summary, reported back by the bridge so
    /// later renders can update it in place.
    pub last_view_id: Option<String>,
    /// Remaining pool, insertion order preserved. Shrinks monotonically
    /// between resets.
    available: Vec<Nation>,
    timer: TurnTimer,
}

impl DraftSession {
    pub fn new(
        room_key: &str,
        turn_duration: Duration,
        timer_tx: mpsc::Sender<TimerExpired>,
    ) -> Self {
        DraftSession {
            phase: Phase::Idle,
            parties: [Party::default(), Party::default()],
            turn_index: 0,
            picks_made_this_turn: 0,
            picks_quota_this_turn: OPENING_QUOTA,
            last_view_id: None,
            available: CATALOG.to_vec(),
            timer: TurnTimer::new(room_key, turn_duration, timer_tx),
        }
    }

    /// The remaining pool, in pool order.
    pub fn available(&self) -> &[Nation] {
        &self.available
    }

    pub fn timer(&self) -> &TurnTimer {
        &self.timer
    }

    /// Stop the turn timer. Called by the registry right before this session
    /// is discarded.
    pub fn cancel_timer(&mut self) {
        self.timer.cancel();
    }

    /// Display name of the party whose turn it is, when known.
    pub fn current_party_name(&self) -> Option<&str> {
        self.parties[self.turn_index].display_name.as_deref()
    }

    fn party_name(&self, index: usize) -> String {
        self.parties[index]
            .display_name
            .clone()
            .unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Start a new draft with `name` as party 0. Legal from any phase: the
    /// whole session state is reset first, so starting over mid-draft is the
    /// same as starting fresh.
    pub fn start(&mut self, name: &str, emblem_url: &str) {
        self.timer.cancel();
        self.parties = [Party::default(), Party::default()];
        self.parties[0].display_name = Some(name.trim().to_string());
        self.parties[0].emblem_url = Some(emblem_url.trim().to_string());
        self.available = CATALOG.to_vec();
        self.turn_index = 0;
        self.picks_made_this_turn = 0;
        self.picks_quota_this_turn = OPENING_QUOTA;
        self.phase = Phase::Waiting;
        info!("Draft started by {}", self.party_name(0));
    }

    /// Join a waiting draft as party 1. Drafting begins immediately: party 0
    /// is on the clock with the opening quota of one pick.
    pub fn join(&mut self, name: &str, emblem_url: &str) -> Result<(), SessionError> {
        if self.phase != Phase::Waiting {
            return Err(SessionError::NotInPhase {
                expected: Phase::Waiting,
                actual: self.phase,
            });
        }
        self.parties[1].display_name = Some(name.trim().to_string());
        self.parties[1].emblem_url = Some(emblem_url.trim().to_string());
        self.phase = Phase::Drafting;
        self.turn_index = 0;
        self.picks_made_this_turn = 0;
        self.picks_quota_this_turn = OPENING_QUOTA;
        self.timer.arm();
        info!(
            "{} joined; drafting begins, {} on the clock",
            self.party_name(1),
            self.party_name(0)
        );
        Ok(())
    }

    /// Record a pick of `option` by `claimant`.
    ///
    /// Guards, in order: phase, both parties present, option available
    /// (case/whitespace-insensitive), claimant is the current party (same
    /// normalization), current party below the selection cap. On success the
    /// completion check runs before the turn-advance rule, so the pick that
    /// fills the second roster ends drafting even mid-quota.
    pub fn pick(&mut self, option: &str, claimant: &str) -> Result<PickOutcome, SessionError> {
        if self.phase != Phase::Drafting {
            return Err(SessionError::NotInPhase {
                expected: Phase::Drafting,
                actual: self.phase,
            });
        }
        if self.parties[0].display_name.is_none() || self.parties[1].display_name.is_none() {
            return Err(SessionError::MissingSecondParty);
        }

        let found = self
            .available
            .iter()
            .position(|n| rules::same_identity(n.name, option));
        let index = match found {
            Some(i) => i,
            None => {
                return Err(SessionError::OptionUnavailable {
                    input: option.trim().to_string(),
                })
            }
        };

        let current = self.party_name(self.turn_index);
        if !rules::same_identity(claimant, &current) {
            return Err(SessionError::NotYourTurn { current });
        }
        if self.parties[self.turn_index].selections.len() >= SELECTIONS_PER_PARTY {
            return Err(SessionError::SelectionLimitReached { party: current });
        }

        let nation = self.available.remove(index);
        self.parties[self.turn_index].selections.push(nation);
        self.picks_made_this_turn += 1;
        info!("{} picked {}", current, nation.name);

        let counts = [
            self.parties[0].selections.len(),
            self.parties[1].selections.len(),
        ];
        match rules::after_pick(counts, self.picks_made_this_turn, self.picks_quota_this_turn) {
            TurnDecision::Complete => {
                self.phase = Phase::Survey;
                self.timer.cancel();
                info!("Draft complete, survey open");
                Ok(PickOutcome::DraftComplete {
                    party: current,
                    nation,
                })
            }
            TurnDecision::Advance => {
                self.advance_turn();
                Ok(PickOutcome::TurnAdvanced {
                    party: current,
                    nation,
                    next_party: self.party_name(self.turn_index),
                })
            }
            TurnDecision::Continue => {
                // The clock resets on every successful pick, not only on
                // turn changes.
                self.timer.arm();
                Ok(PickOutcome::Recorded {
                    party: current,
                    nation,
                    remaining_in_turn: self.picks_quota_this_turn - self.picks_made_this_turn,
                })
            }
        }
    }

    /// Record a closing-survey answer ("yes"/"no", case/whitespace-
    /// insensitive) by `claimant`. Either party may answer in any order;
    /// re-answering before the survey closes overwrites the prior answer.
    pub fn answer_survey(
        &mut self,
        choice: &str,
        claimant: &str,
    ) -> Result<SurveyOutcome, SessionError> {
        if self.phase != Phase::Survey {
            return Err(SessionError::NotInPhase {
                expected: Phase::Survey,
                actual: self.phase,
            });
        }
        let answer = match rules::normalize(choice).as_str() {
            "yes" => true,
            "no" => false,
            _ => {
                return Err(SessionError::InvalidSurveyChoice {
                    input: choice.trim().to_string(),
                })
            }
        };
        let index = self
            .parties
            .iter()
            .position(|p| {
                p.display_name
                    .as_deref()
                    .is_some_and(|n| rules::same_identity(n, claimant))
            })
            .ok_or(SessionError::UnauthorizedSurveyResponder)?;

        self.parties[index].survey_answer = Some(answer);
        let party = self.party_name(index);
        info!("{} answered the survey: {}", party, answer);

        let answers = [
            self.parties[0].survey_answer,
            self.parties[1].survey_answer,
        ];
        if rules::survey_complete(answers) {
            self.phase = Phase::Complete;
            info!("Survey complete, session closed");
            Ok(SurveyOutcome::SurveyComplete {
                party,
                choice: answer,
            })
        } else {
            Ok(SurveyOutcome::Recorded {
                party,
                choice: answer,
            })
        }
    }

    /// Timer-expiry path: pass the turn without a pick. The quota is set to
    /// the standard two, the pick counter resets, and the clock restarts.
    /// A queued expiry may race a user-driven transition, so the phase is
    /// re-checked here; outside `Drafting` this is a no-op.
    ///
    /// Returns the display name of the party now on the clock.
    pub fn force_advance(&mut self) -> Option<String> {
        if self.phase != Phase::Drafting {
            return None;
        }
        self.advance_turn();
        info!(
            "Turn forced over by timer; {} now on the clock",
            self.party_name(self.turn_index)
        );
        Some(self.party_name(self.turn_index))
    }

    fn advance_turn(&mut self) {
        self.picks_quota_this_turn = rules::STANDARD_QUOTA;
        self.turn_index = 1 - self.turn_index;
        self.picks_made_this_turn = 0;
        self.timer.arm();
    }

    // -----------------------------------------------------------------------
    // Snapshot
    // -----------------------------------------------------------------------

    /// Pure view of the session for rendering. Exposes everything a summary
    /// needs without reaching into timer mechanics.
    pub fn snapshot(&self, preview_limit: usize) -> SessionSnapshot {
        let parties = [
            PartySnapshot::from(&self.parties[0]),
            PartySnapshot::from(&self.parties[1]),
        ];
        let turn_name = if self.phase == Phase::Drafting {
            self.current_party_name().map(|s| s.to_string())
        } else {
            None
        };
        SessionSnapshot {
            phase: self.phase,
            parties,
            turn_name,
            time_remaining: self.timer.remaining(),
            available_preview: self
                .available
                .iter()
                .take(preview_limit)
                .copied()
                .collect(),
            available_total: self.available.len(),
        }
    }
}

/// Render-facing view of one party.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartySnapshot {
    pub name: Option<String>,
    pub emblem_url: Option<String>,
    pub selections: Vec<Nation>,
    pub survey_answer: Option<bool>,
}

impl From<&Party> for PartySnapshot {
    fn from(party: &Party) -> Self {
        PartySnapshot {
            name: party.display_name.clone(),
            emblem_url: party.emblem_url.clone(),
            selections: party.selections.clone(),
            survey_answer: party.survey_answer,
        }
    }
}

/// Render-facing view of a whole session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub parties: [PartySnapshot; 2],
    /// Display name of the party on the clock; `None` outside `Drafting`.
    pub turn_name: Option<String>,
    /// Time left on the turn clock; `None` when no clock is running.
    pub time_remaining: Option<Duration>,
    /// First `preview_limit` entries of the remaining pool.
    pub available_preview: Vec<Nation>,
    /// Total size of the remaining pool.
    pub available_total: usize,
}
