//! Daily quota tracking with a transactional reserve/commit/refund guard.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Per-project daily quota counters. Resets to zero when `last_reset_date`
/// falls behind the current calendar day, before any consumption check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuotaState {
    /// Questions generated today.
    pub questions_today: u32,
    /// Explorations run today.
    pub explorations_today: u32,
    /// Calendar day the counters above apply to.
    pub last_reset_date: NaiveDate,
}

impl QuotaState {
    /// A freshly reset state for `today`.
    pub fn new(today: NaiveDate) -> Self {
        Self {
            questions_today: 0,
            explorations_today: 0,
            last_reset_date: today,
        }
    }

    /// Reset counters to zero if `today` is a later calendar day than the
    /// state's `last_reset_date`. Must be called before any consumption
    /// check.
    pub fn roll_to(&mut self, today: NaiveDate) {
        if today > self.last_reset_date {
            self.questions_today = 0;
            self.explorations_today = 0;
            self.last_reset_date = today;
        }
    }
}

/// Which counter a [`QuotaReservation`] is drawn against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaKind {
    /// Question-generation quota.
    Questions,
    /// Exploration-iteration quota.
    Explorations,
}

/// A reserved unit of quota. Reservation increments the counter
/// immediately; the caller must call [`QuotaReservation::commit`] on
/// success. Dropping without committing refunds the reservation — this
/// mirrors the RAII-cleanup idiom `tempfile::TempDir` already models in
/// this workspace's dependencies, applied here to quota accounting
/// instead of filesystem cleanup.
pub struct QuotaReservation<'a> {
    state: &'a mut QuotaState,
    kind: QuotaKind,
    committed: bool,
}

impl<'a> QuotaReservation<'a> {
    fn new(state: &'a mut QuotaState, kind: QuotaKind) -> Self {
        Self {
            state,
            kind,
            committed: false,
        }
    }

    /// Finalize the reservation. The counter stays incremented.
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for QuotaReservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            match self.kind {
                QuotaKind::Questions => {
                    self.state.questions_today = self.state.questions_today.saturating_sub(1);
                }
                QuotaKind::Explorations => {
                    self.state.explorations_today = self.state.explorations_today.saturating_sub(1);
                }
            }
        }
    }
}

/// Error returned when a quota is already exhausted for the day.
#[derive(Debug, thiserror::Error)]
#[error("daily quota exhausted for {kind:?} ({used}/{limit})")]
pub struct QuotaExhausted {
    /// Which quota was exhausted.
    pub kind: QuotaKind,
    /// Units already used today.
    pub used: u32,
    /// The configured daily limit.
    pub limit: u32,
}

/// Reserve one unit of `kind` against `limit`, rolling the state to
/// `today` first. Fails with [`QuotaExhausted`] if already at `limit`.
pub fn reserve(
    state: &mut QuotaState,
    kind: QuotaKind,
    limit: u32,
    today: NaiveDate,
) -> Result<QuotaReservation<'_>, QuotaExhausted> {
    state.roll_to(today);
    let used = match kind {
        QuotaKind::Questions => state.questions_today,
        QuotaKind::Explorations => state.explorations_today,
    };
    if used >= limit {
        return Err(QuotaExhausted { kind, used, limit });
    }
    match kind {
        QuotaKind::Questions => state.questions_today += 1,
        QuotaKind::Explorations => state.explorations_today += 1,
    }
    Ok(QuotaReservation::new(state, kind))
}

/// Today's date in UTC. A thin wrapper so call sites don't reach for
/// `chrono::Utc` directly and so tests can exercise `roll_to` with an
/// explicit date instead.
pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}
