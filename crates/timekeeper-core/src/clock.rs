//! Virtual clock: time-compression state and wall-to-virtual conversion.
//!
//! The virtual clock is the single source of truth for simulated time. It
//! holds the compression state (start timestamp, zip factor, timezone) and
//! the runtime accounting (`init_ts`, `idle_duration_ms`, `pause_ts`), and
//! converts a wall-clock instant into virtual epoch milliseconds.
//!
//! # Design Principles
//!
//! - Pure computation: every operation takes the wall-clock instant as an
//!   argument. No I/O, no timers, no locking.
//! - Guarded transitions return [`ControlRejected`] instead of panicking;
//!   a double pause is routine, not exceptional.
//! - Idle time is excised in wall-clock units, never scaled by the zip
//!   factor: a paused clock does not advance at all.
//! - All arithmetic saturates (no silent overflow).

use chrono::{DateTime, LocalResult, NaiveDateTime, Offset, TimeDelta, TimeZone};
use chrono_tz::Tz;
use timekeeper_types::{ClockProperties, Tic, TimeCommand, TimeStatus};

/// One hour in milliseconds.
pub const HOUR_MS: i64 = 3_600_000;

/// One day in milliseconds.
pub const DAY_MS: i64 = 86_400_000;

/// Start specification selecting pass-through (real time) mode.
pub const ACTUAL_TIME: &str = "actual";

/// Format of local start-date strings (`yyyy-MM-dd HH:mm:ss`).
pub const START_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Start timestamp reported for pass-through mode.
pub const PASS_THROUGH_START: i64 = -1;

/// Errors raised while configuring a clock.
///
/// These are always recovered locally: the clock applies a safe fallback
/// before the error is returned, so the caller only needs to log it.
#[derive(Debug, thiserror::Error)]
pub enum ClockConfigError {
    /// The start date string could not be parsed. The start timestamp
    /// falls back to 0.
    #[error("could not parse start date '{value}': {source}")]
    StartDate {
        /// The rejected input.
        value: String,
        /// The underlying parse error.
        source: chrono::ParseError,
    },

    /// The start date does not map to a representable instant. The start
    /// timestamp falls back to 0.
    #[error("start date '{value}' is out of range")]
    StartOutOfRange {
        /// The rejected input.
        value: String,
    },

    /// The timezone name is not a known IANA zone. The clock falls back
    /// to UTC.
    #[error("unknown timezone '{name}': {reason}")]
    Timezone {
        /// The rejected zone name.
        name: String,
        /// Why the name was rejected.
        reason: String,
    },
}

/// A control call invoked in a state that does not allow it.
///
/// No state is mutated when a call is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ControlRejected {
    /// Pause, resume and stop are meaningless when the clock follows real
    /// time.
    #[error("cannot {command} real time: clock is in pass-through mode")]
    PassThrough {
        /// The rejected command.
        command: TimeCommand,
    },

    /// The current status does not allow the command.
    #[error("cannot {command} while {status}")]
    IllegalState {
        /// The rejected command.
        command: TimeCommand,
        /// Status at the time of the call.
        status: TimeStatus,
    },
}

// ---------------------------------------------------------------------------
// Zip factor
// ---------------------------------------------------------------------------

/// Time compression factor: virtual milliseconds per wall millisecond.
///
/// Always at least 1, since it is also the divisor converting virtual
/// delays into wall delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ZipFactor(u32);

impl ZipFactor {
    /// Real-time speed.
    pub const ONE: Self = Self(1);

    /// Create a factor, coercing 0 to 1.
    pub const fn new(value: u32) -> Self {
        if value == 0 { Self::ONE } else { Self(value) }
    }

    /// Parse a textual factor such as `"x4"`, `"X4"` or `"4"`.
    ///
    /// Anything unparsable, zero or negative coerces to 1.
    pub fn parse(spec: &str) -> Self {
        let trimmed = spec.trim();
        let digits = trimmed
            .strip_prefix('x')
            .or_else(|| trimmed.strip_prefix('X'))
            .unwrap_or(trimmed);
        match digits.trim().parse::<i64>() {
            Ok(value) if value >= 1 => Self(u32::try_from(value).unwrap_or(u32::MAX)),
            _ => Self::ONE,
        }
    }

    /// Convert a numeric factor, truncating any fractional part.
    ///
    /// Non-finite values and values below 1 coerce to 1.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_f64(value: f64) -> Self {
        if !value.is_finite() || value < 1.0 {
            return Self::ONE;
        }
        // `as` saturates at u32::MAX; the value is finite and >= 1 here.
        Self::new(value.trunc() as u32)
    }

    /// The factor as an integer.
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Wall-clock interval between periodic tics: one virtual hour.
    ///
    /// Never below 1 ms, so huge factors still yield a valid period.
    pub fn tic_interval_ms(self) -> u64 {
        3_600_000_u64
            .checked_div(u64::from(self.0))
            .unwrap_or(1)
            .max(1)
    }

    /// Convert a virtual-time duration to the wall-clock duration that
    /// covers it at this speed.
    pub fn to_wall_ms(self, virtual_ms: i64) -> i64 {
        virtual_ms.checked_div(i64::from(self.0)).unwrap_or(virtual_ms)
    }

    /// Convert a wall-clock duration to the virtual duration it produces.
    pub fn to_virtual_ms(self, wall_ms: i64) -> i64 {
        wall_ms.saturating_mul(i64::from(self.0))
    }
}

impl Default for ZipFactor {
    fn default() -> Self {
        Self::ONE
    }
}

impl core::fmt::Display for ZipFactor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "x{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Timezone helpers
// ---------------------------------------------------------------------------

/// Resolve an IANA timezone name.
///
/// # Errors
///
/// Returns [`ClockConfigError::Timezone`] if the name is unknown.
pub fn parse_timezone(name: &str) -> Result<Tz, ClockConfigError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|err| ClockConfigError::Timezone {
            name: name.to_owned(),
            reason: err.to_string(),
        })
}

/// Offset of `tz` at the UTC instant `utc_ms`, in seconds.
pub fn offset_seconds_at(tz: Tz, utc_ms: i64) -> i32 {
    DateTime::from_timestamp_millis(utc_ms).map_or(0, |instant| {
        tz.offset_from_utc_datetime(&instant.naive_utc())
            .fix()
            .local_minus_utc()
    })
}

/// Offset of `tz` at the UTC instant `utc_ms`, truncated toward zero to
/// whole hours.
///
/// Half- and quarter-hour zones lose their fractional part (`+5:30`
/// reports 5). Tic consumers expect whole hours.
pub fn offset_hours_at(tz: Tz, utc_ms: i64) -> i32 {
    offset_seconds_at(tz, utc_ms).checked_div(3600).unwrap_or(0)
}

/// Parse a local `yyyy-MM-dd HH:mm:ss` string in `tz` into UTC epoch
/// milliseconds.
///
/// Ambiguous local times (DST fold) resolve to the earlier instant. Local
/// times inside a DST gap are shifted by the offset in effect at the same
/// wall reading interpreted as UTC.
///
/// # Errors
///
/// Returns [`ClockConfigError::StartDate`] if the string does not match
/// the format, or [`ClockConfigError::StartOutOfRange`] if it cannot be
/// represented.
pub fn parse_local_start(value: &str, tz: Tz) -> Result<i64, ClockConfigError> {
    let naive = NaiveDateTime::parse_from_str(value.trim(), START_DATE_FORMAT).map_err(
        |source| ClockConfigError::StartDate {
            value: value.to_owned(),
            source,
        },
    )?;

    match tz.from_local_datetime(&naive) {
        LocalResult::Single(local) | LocalResult::Ambiguous(local, _) => {
            Ok(local.timestamp_millis())
        }
        LocalResult::None => {
            let offset = tz.offset_from_utc_datetime(&naive).fix().local_minus_utc();
            naive
                .checked_sub_signed(TimeDelta::seconds(i64::from(offset)))
                .map(|utc| utc.and_utc().timestamp_millis())
                .ok_or_else(|| ClockConfigError::StartOutOfRange {
                    value: value.to_owned(),
                })
        }
    }
}

// ---------------------------------------------------------------------------
// Virtual clock
// ---------------------------------------------------------------------------

/// Compression state plus runtime accounting for one clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualClock {
    /// Current mode.
    status: TimeStatus,

    /// Zone used to parse start dates and report offsets.
    timezone: Tz,

    /// Virtual time at `init_ts`; `None` in pass-through mode.
    start_ts: Option<i64>,

    /// Compression factor (forced to 1 in pass-through mode).
    zip: ZipFactor,

    /// Wall-clock ms when the clock last entered `Running` from
    /// `Initialized`.
    init_ts: i64,

    /// Wall-clock ms spent idle since `init_ts`.
    idle_duration_ms: i64,

    /// Wall-clock ms when the clock last left `Running`.
    pause_ts: i64,
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualClock {
    /// A pass-through clock in UTC, status [`TimeStatus::Unknown`].
    pub const fn new() -> Self {
        Self {
            status: TimeStatus::Unknown,
            timezone: Tz::UTC,
            start_ts: None,
            zip: ZipFactor::ONE,
            init_ts: 0,
            idle_duration_ms: 0,
            pause_ts: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Configuration
    // -----------------------------------------------------------------------

    /// Configure start time, compression and timezone from their textual
    /// forms.
    ///
    /// The timezone is applied first because the start date is parsed in
    /// it. The clock is always left usable: on error the relevant fallback
    /// (UTC, start 0) is already applied and the first error is returned
    /// for logging.
    ///
    /// # Errors
    ///
    /// Returns [`ClockConfigError`] describing the first input that needed
    /// a fallback.
    pub fn configure(
        &mut self,
        start_spec: &str,
        zip_spec: &str,
        timezone: &str,
    ) -> Result<(), ClockConfigError> {
        let tz_result = self.set_timezone(timezone);
        let start_result = self.set_start_spec(start_spec);
        self.set_zip(ZipFactor::parse(zip_spec));
        tz_result.and(start_result)
    }

    /// Set the timezone by IANA name, falling back to UTC.
    ///
    /// # Errors
    ///
    /// Returns [`ClockConfigError::Timezone`] if the name is unknown.
    pub fn set_timezone(&mut self, name: &str) -> Result<(), ClockConfigError> {
        match parse_timezone(name) {
            Ok(tz) => {
                self.timezone = tz;
                Ok(())
            }
            Err(err) => {
                self.timezone = Tz::UTC;
                Err(err)
            }
        }
    }

    /// Set the start from its textual form: [`ACTUAL_TIME`] selects
    /// pass-through mode, anything else is a local date in the clock's
    /// timezone.
    ///
    /// # Errors
    ///
    /// Returns [`ClockConfigError::StartDate`] if the date cannot be
    /// parsed; the start timestamp falls back to 0.
    pub fn set_start_spec(&mut self, spec: &str) -> Result<(), ClockConfigError> {
        if spec.trim().eq_ignore_ascii_case(ACTUAL_TIME) {
            self.set_start_timestamp(PASS_THROUGH_START);
            return Ok(());
        }
        match parse_local_start(spec, self.timezone) {
            Ok(start) => {
                self.start_ts = Some(start);
                Ok(())
            }
            Err(err) => {
                self.start_ts = Some(0);
                Err(err)
            }
        }
    }

    /// Set the start as UTC epoch milliseconds; [`PASS_THROUGH_START`]
    /// selects pass-through mode.
    pub fn set_start_timestamp(&mut self, start: i64) {
        if start == PASS_THROUGH_START {
            self.start_ts = None;
            self.zip = ZipFactor::ONE;
        } else {
            self.start_ts = Some(start);
        }
    }

    /// Set the compression factor. Ignored (kept at 1) in pass-through
    /// mode.
    pub fn set_zip(&mut self, zip: ZipFactor) {
        self.zip = if self.is_pass_through() {
            ZipFactor::ONE
        } else {
            zip
        };
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Enter [`TimeStatus::Initialized`] from any state.
    ///
    /// The caller is responsible for cascading into
    /// [`start_time`](Self::start_time) in pass-through mode.
    pub fn init(&mut self, now: i64) -> Tic {
        self.status = TimeStatus::Initialized;
        self.tic(now, TimeCommand::Init)
    }

    /// Start running. Legal only from [`TimeStatus::Initialized`].
    ///
    /// # Errors
    ///
    /// Returns [`ControlRejected::IllegalState`] from any other status.
    pub fn start_time(&mut self, now: i64) -> Result<Tic, ControlRejected> {
        self.require(TimeCommand::Start, &[TimeStatus::Initialized])?;
        self.init_ts = now;
        self.idle_duration_ms = 0;
        self.status = TimeStatus::Running;
        Ok(self.tic(now, TimeCommand::Start))
    }

    /// Pause. Legal only from [`TimeStatus::Running`] outside pass-through
    /// mode.
    ///
    /// # Errors
    ///
    /// Returns [`ControlRejected`] in pass-through mode or from any other
    /// status.
    pub fn pause_time(&mut self, now: i64) -> Result<Tic, ControlRejected> {
        self.require_controllable(TimeCommand::Pause)?;
        self.require(TimeCommand::Pause, &[TimeStatus::Running])?;
        self.pause_ts = now;
        self.status = TimeStatus::Idle;
        Ok(self.tic(now, TimeCommand::Pause))
    }

    /// Resume after a pause, excising the idle interval. Legal only from
    /// [`TimeStatus::Idle`] outside pass-through mode.
    ///
    /// # Errors
    ///
    /// Returns [`ControlRejected`] in pass-through mode or from any other
    /// status.
    pub fn resume_time(&mut self, now: i64) -> Result<Tic, ControlRejected> {
        self.require_controllable(TimeCommand::Resume)?;
        self.require(TimeCommand::Resume, &[TimeStatus::Idle])?;
        self.status = TimeStatus::Running;
        self.idle_duration_ms = self
            .idle_duration_ms
            .saturating_add(now.saturating_sub(self.pause_ts));
        Ok(self.tic(now, TimeCommand::Resume))
    }

    /// Stop. Legal from [`TimeStatus::Running`] or [`TimeStatus::Idle`]
    /// outside pass-through mode.
    ///
    /// Stopping from `Idle` folds the pending idle interval into
    /// `idle_duration_ms` so the frozen reading stays at the pause value.
    ///
    /// # Errors
    ///
    /// Returns [`ControlRejected`] in pass-through mode or from any other
    /// status.
    pub fn stop_time(&mut self, now: i64) -> Result<Tic, ControlRejected> {
        self.require_controllable(TimeCommand::Stop)?;
        self.require(TimeCommand::Stop, &[TimeStatus::Running, TimeStatus::Idle])?;
        if self.status == TimeStatus::Idle {
            self.idle_duration_ms = self
                .idle_duration_ms
                .saturating_add(now.saturating_sub(self.pause_ts));
        }
        self.pause_ts = now;
        self.status = TimeStatus::Stopped;
        Ok(self.tic(now, TimeCommand::Stop))
    }

    fn require_controllable(&self, command: TimeCommand) -> Result<(), ControlRejected> {
        if self.is_pass_through() {
            Err(ControlRejected::PassThrough { command })
        } else {
            Ok(())
        }
    }

    fn require(&self, command: TimeCommand, allowed: &[TimeStatus]) -> Result<(), ControlRejected> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(ControlRejected::IllegalState {
                command,
                status: self.status,
            })
        }
    }

    // -----------------------------------------------------------------------
    // Readings
    // -----------------------------------------------------------------------

    /// Virtual time in epoch milliseconds at wall instant `now`.
    pub fn virtual_time(&self, now: i64) -> i64 {
        let Some(start) = self.start_ts else {
            return now;
        };
        let reference = match self.status {
            TimeStatus::Running => now,
            TimeStatus::Idle | TimeStatus::Stopped => self.pause_ts,
            TimeStatus::Unknown | TimeStatus::Initialized => return start,
        };
        let elapsed = reference
            .saturating_sub(self.init_ts)
            .saturating_sub(self.idle_duration_ms);
        start.saturating_add(self.zip.to_virtual_ms(elapsed))
    }

    /// Timezone offset in whole hours at the current virtual time.
    pub fn timezone_offset_hours(&self, now: i64) -> i32 {
        offset_hours_at(self.timezone, self.virtual_time(now))
    }

    /// Build a tic for the current state.
    pub fn tic(&self, now: i64, command: TimeCommand) -> Tic {
        Tic::new(
            self.virtual_time(now),
            self.zip.get(),
            self.timezone_offset_hours(now),
            self.status,
            command,
        )
    }

    /// Snapshot of start, zip and status.
    pub fn properties(&self) -> ClockProperties {
        ClockProperties {
            start_date: self.start_ts.unwrap_or(PASS_THROUGH_START),
            zip: self.zip.get(),
            status: self.status,
        }
    }

    /// Current status.
    pub const fn status(&self) -> TimeStatus {
        self.status
    }

    /// Current compression factor.
    pub const fn zip(&self) -> ZipFactor {
        self.zip
    }

    /// Configured timezone.
    pub const fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Start timestamp, `None` in pass-through mode.
    pub const fn start_ts(&self) -> Option<i64> {
        self.start_ts
    }

    /// Whether virtual time follows real time.
    pub const fn is_pass_through(&self) -> bool {
        self.start_ts.is_none()
    }

    /// Total wall-clock milliseconds excised by pauses since the last start.
    pub const fn idle_duration_ms(&self) -> i64 {
        self.idle_duration_ms
    }
}
