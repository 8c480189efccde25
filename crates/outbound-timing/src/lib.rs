// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Timing model for the Outbound campaign engine.
//!
//! Pure functions that decide *when* mail may go out: the US holiday
//! calendar, per-day sending sessions, cooldown spacing with time-of-day and
//! bounce-rate adjustments, and conversion from UTC to the target local
//! time. Randomness is always passed in as `&mut impl Rng` so callers can
//! seed it.

pub mod cadence;
pub mod calendar;
pub mod clock;
pub mod session;

pub use cadence::{
    HUMAN_COOLDOWN_FLOOR, MIN_COOLDOWN, bounce_slowdown, cooldown_minutes, human_cooldown,
    reply_pause, should_skip, time_of_day_multiplier,
};
pub use calendar::{SendingCalendar, is_holiday, is_sending_day, us_holidays};
pub use clock::{Clock, LocalClock, SystemClock};
pub use session::{Session, SessionPlan, plan_sessions};
