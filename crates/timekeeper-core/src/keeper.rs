//! The Timekeeper service: one virtual clock with its tic and daylight
//! loops.
//!
//! [`Timekeeper`] owns a [`VirtualClock`], a [`TicScheduler`] and a
//! [`DaylightTracker`] behind a single mutex, and drives them from control
//! calls and timer firings. Everything it observes leaves through the
//! [`EventSink`] as a [`ClockEvent`].
//!
//! # Design Principles
//!
//! - One lock serializes control calls, tic firings and daylight firings.
//!   Events are emitted while it is held, so the sink sees them in
//!   transition order.
//! - Timer callbacks hold a weak reference plus the generation they were
//!   armed in. Every transition bumps the generation, so a firing that
//!   raced a pause or stop finds a stale generation and does nothing.
//! - No operation blocks or awaits; wall time comes from a [`WallClock`].
//! - Many instances can coexist; there is no global state.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use timekeeper_types::{
    ClockEvent, ClockId, ClockProperties, DaylightState, PropertiesUpdate, StartValue, Tic,
    TimeCommand, TimeStatus, ZipValue,
};
use tracing::{debug, info, warn};

use crate::clock::{ClockConfigError, ControlRejected, VirtualClock, ZipFactor};
use crate::config::{ClockSettings, TimekeeperConfig};
use crate::daylight::DaylightTracker;
use crate::sink::EventSink;
use crate::solar::GeoLocation;
use crate::tic::TicScheduler;
use crate::timer::{Scheduler, TimerCallback, TimerFault};
use crate::wall::WallClock;

/// Failure of a control call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimekeeperError {
    /// The call is not legal in the current state. Nothing changed.
    #[error("control rejected: {source}")]
    Rejected {
        /// Why the call was rejected.
        #[from]
        source: ControlRejected,
    },

    /// The timer facility failed; tics or daylight checks may have stopped.
    #[error("timer fault: {source}")]
    Timer {
        /// The underlying timer fault.
        #[from]
        source: TimerFault,
    },
}

struct KeeperState {
    clock: VirtualClock,
    tics: TicScheduler,
    daylight: DaylightTracker,
    generation: u64,
    show_tic: bool,
}

struct Inner {
    id: ClockId,
    state: Mutex<KeeperState>,
    scheduler: Arc<dyn Scheduler>,
    wall: Arc<dyn WallClock>,
    sink: Arc<dyn EventSink>,
}

/// A running clock engine instance. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Timekeeper {
    inner: Arc<Inner>,
}

impl core::fmt::Debug for Timekeeper {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.lock();
        f.debug_struct("Timekeeper")
            .field("id", &self.inner.id)
            .field("status", &state.clock.status())
            .field("zip", &state.clock.zip())
            .finish_non_exhaustive()
    }
}

impl Timekeeper {
    /// Build an instance from configuration. The clock starts in
    /// [`TimeStatus::Unknown`]; call [`start`](Self::start) to bring it up.
    ///
    /// Unparsable start dates and unknown timezones are logged and replaced
    /// by their fallbacks (start 0, UTC).
    pub fn new(
        config: &TimekeeperConfig,
        scheduler: Arc<dyn Scheduler>,
        wall: Arc<dyn WallClock>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let id = ClockId::new();
        let clock = configured_clock(id, &config.clock);
        let state = KeeperState {
            clock,
            tics: TicScheduler::new(),
            daylight: DaylightTracker::new(config.location.geo()),
            generation: 0,
            show_tic: config.clock.show_tic,
        };
        info!(
            clock_id = %id,
            start_ts = state.clock.properties().start_date,
            zip = %state.clock.zip(),
            timezone = %state.clock.timezone(),
            "Timekeeper configured"
        );
        Self {
            inner: Arc::new(Inner {
                id,
                state: Mutex::new(state),
                scheduler,
                wall,
                sink,
            }),
        }
    }

    /// Identifier of this instance.
    pub fn id(&self) -> ClockId {
        self.inner.id
    }

    /// Location used for daylight tracking.
    pub fn location(&self) -> GeoLocation {
        self.lock().daylight.location()
    }

    // -----------------------------------------------------------------------
    // Control
    // -----------------------------------------------------------------------

    /// Host lifecycle hook: initialize a fresh clock, or re-announce the
    /// current state with a [`TimeCommand::CarryOn`] tic if it is already
    /// up.
    ///
    /// # Errors
    ///
    /// Returns [`TimekeeperError`] if initialization fails.
    pub fn start(&self) -> Result<Tic, TimekeeperError> {
        let mut state = self.lock();
        if state.clock.status() == TimeStatus::Unknown {
            return self.init_locked(&mut state);
        }
        let tic = state.clock.tic(self.now(), TimeCommand::CarryOn);
        self.emit(tic.into());
        Ok(tic)
    }

    /// Enter [`TimeStatus::Initialized`], cancelling every timer. In
    /// pass-through mode the clock starts running straight away.
    ///
    /// Returns the `Init` tic.
    ///
    /// # Errors
    ///
    /// Returns [`TimekeeperError::Timer`] if timers cannot be cancelled or
    /// the pass-through start cannot arm them.
    pub fn init(&self) -> Result<Tic, TimekeeperError> {
        let mut state = self.lock();
        self.init_locked(&mut state)
    }

    /// Start running from [`TimeStatus::Initialized`].
    ///
    /// # Errors
    ///
    /// Returns [`TimekeeperError::Rejected`] from any other status.
    pub fn start_time(&self) -> Result<Tic, TimekeeperError> {
        let mut state = self.lock();
        self.start_locked(&mut state)
    }

    /// Pause a running clock, freezing virtual time.
    ///
    /// # Errors
    ///
    /// Returns [`TimekeeperError::Rejected`] in pass-through mode or when
    /// not running.
    pub fn pause_time(&self) -> Result<Tic, TimekeeperError> {
        let mut state = self.lock();
        let result = state.clock.pause_time(self.now());
        self.halt_locked(&mut state, result)
    }

    /// Resume a paused clock from where it was paused.
    ///
    /// # Errors
    ///
    /// Returns [`TimekeeperError::Rejected`] in pass-through mode or when
    /// not paused.
    pub fn resume_time(&self) -> Result<Tic, TimekeeperError> {
        let mut state = self.lock();
        let result = state.clock.resume_time(self.now());
        let tic = self.transition(&state, result)?;
        self.run_locked(&mut state, tic)
    }

    /// Stop a running or paused clock. Only a new init brings it back.
    ///
    /// # Errors
    ///
    /// Returns [`TimekeeperError::Rejected`] in pass-through mode or when
    /// neither running nor paused.
    pub fn stop_time(&self) -> Result<Tic, TimekeeperError> {
        let mut state = self.lock();
        let result = state.clock.stop_time(self.now());
        self.halt_locked(&mut state, result)
    }

    /// Apply a partial property update and re-run init.
    ///
    /// Fields are applied in order timezone, start, zip; absent fields keep
    /// their value. Bad start dates and timezones fall back as in
    /// [`new`](Self::new).
    ///
    /// # Errors
    ///
    /// Returns [`TimekeeperError::Timer`] if the re-init fails.
    pub fn set_properties(
        &self,
        update: &PropertiesUpdate,
    ) -> Result<ClockProperties, TimekeeperError> {
        let mut state = self.lock();
        if let Some(timezone) = &update.timezone {
            log_fallback(self.inner.id, state.clock.set_timezone(timezone));
        }
        match &update.start {
            Some(StartValue::Text(text)) => {
                log_fallback(self.inner.id, state.clock.set_start_spec(text));
            }
            Some(StartValue::Timestamp(start)) => state.clock.set_start_timestamp(*start),
            None => {}
        }
        match &update.zip {
            Some(ZipValue::Text(text)) => state.clock.set_zip(ZipFactor::parse(text)),
            Some(ZipValue::Number(value)) => state.clock.set_zip(ZipFactor::from_f64(*value)),
            None => {}
        }
        info!(
            clock_id = %self.inner.id,
            start_ts = state.clock.properties().start_date,
            zip = %state.clock.zip(),
            timezone = %state.clock.timezone(),
            "Properties updated"
        );
        self.init_locked(&mut state)?;
        Ok(state.clock.properties())
    }

    /// Cancel both loops and close the scheduler. Later control calls that
    /// need a timer fail with [`TimerFault::Closed`].
    pub fn shutdown(&self) {
        let mut state = self.lock();
        state.generation = state.generation.wrapping_add(1);
        if let Err(fault) = state.tics.disarm(self.inner.scheduler.as_ref()) {
            warn!(clock_id = %self.inner.id, error = %fault, "Tic timer not cancelled on shutdown");
        }
        if let Err(fault) = state.daylight.cancel(self.inner.scheduler.as_ref()) {
            warn!(clock_id = %self.inner.id, error = %fault, "Daylight check not cancelled on shutdown");
        }
        self.inner.scheduler.shutdown();
        info!(clock_id = %self.inner.id, "Timekeeper shut down");
    }

    // -----------------------------------------------------------------------
    // Readings
    // -----------------------------------------------------------------------

    /// Current virtual time in epoch milliseconds.
    pub fn time(&self) -> i64 {
        self.lock().clock.virtual_time(self.now())
    }

    /// Timezone offset in whole hours at the current virtual time.
    pub fn timezone_offset_hours(&self) -> i32 {
        self.lock().clock.timezone_offset_hours(self.now())
    }

    /// Current status.
    pub fn status(&self) -> TimeStatus {
        self.lock().clock.status()
    }

    /// Start, zip and status.
    pub fn properties(&self) -> ClockProperties {
        self.lock().clock.properties()
    }

    /// A tic describing the current state, without emitting it.
    pub fn snapshot(&self) -> Tic {
        self.lock().clock.tic(self.now(), TimeCommand::CarryOn)
    }

    /// Day/night knowledge so far.
    pub fn daylight(&self) -> DaylightState {
        let state = self.lock();
        DaylightState {
            is_daytime: state.daylight.is_daytime(),
            next_check_virtual_time: state.daylight.next_check_virtual_ms(),
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn lock(&self) -> MutexGuard<'_, KeeperState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn now(&self) -> i64 {
        self.inner.wall.now_ms()
    }

    fn emit(&self, event: ClockEvent) {
        self.inner.sink.emit(event);
    }

    fn scheduler(&self) -> &dyn Scheduler {
        self.inner.scheduler.as_ref()
    }

    fn init_locked(&self, state: &mut KeeperState) -> Result<Tic, TimekeeperError> {
        state.generation = state.generation.wrapping_add(1);
        state.tics.disarm(self.scheduler())?;
        state.daylight.cancel(self.scheduler())?;

        let tic = state.clock.init(self.now());
        info!(clock_id = %self.inner.id, %tic, "Clock initialized");
        self.emit(tic.into());

        if state.clock.is_pass_through() {
            self.start_locked(state)?;
        }
        Ok(tic)
    }

    fn start_locked(&self, state: &mut KeeperState) -> Result<Tic, TimekeeperError> {
        let result = state.clock.start_time(self.now());
        let tic = self.transition(state, result)?;
        self.run_locked(state, tic)
    }

    /// Log a transition outcome; rejections are returned untouched.
    fn transition(
        &self,
        state: &KeeperState,
        result: Result<Tic, ControlRejected>,
    ) -> Result<Tic, ControlRejected> {
        match result {
            Ok(tic) => {
                info!(clock_id = %self.inner.id, %tic, "Clock transition");
                Ok(tic)
            }
            Err(rejected) => {
                warn!(
                    clock_id = %self.inner.id,
                    status = %state.clock.status(),
                    error = %rejected,
                    "Control call rejected"
                );
                Err(rejected)
            }
        }
    }

    /// Emit a start or resume tic, then arm the tic timer and run an
    /// immediate daylight check.
    fn run_locked(&self, state: &mut KeeperState, tic: Tic) -> Result<Tic, TimekeeperError> {
        state.generation = state.generation.wrapping_add(1);
        self.emit(tic.into());
        let callback = self.tic_callback(state.generation);
        state.tics.arm(self.scheduler(), state.clock.zip(), callback)?;
        self.check_daylight(state)?;
        Ok(tic)
    }

    /// Emit a pause or stop tic and cancel both loops.
    fn halt_locked(
        &self,
        state: &mut KeeperState,
        result: Result<Tic, ControlRejected>,
    ) -> Result<Tic, TimekeeperError> {
        let tic = self.transition(state, result)?;
        state.generation = state.generation.wrapping_add(1);
        self.emit(tic.into());
        state.tics.disarm(self.scheduler())?;
        state.daylight.cancel(self.scheduler())?;
        Ok(tic)
    }

    /// Run one daylight check and arm the next one.
    fn check_daylight(&self, state: &mut KeeperState) -> Result<(), TimerFault> {
        let now = self.now();
        let virtual_now = state.clock.virtual_time(now);
        let offset = state.clock.timezone_offset_hours(now);
        let check = state.daylight.check(virtual_now, offset);

        if let Some(notification) = check.notification.clone() {
            info!(
                clock_id = %self.inner.id,
                is_daytime = check.is_daytime,
                virtual_time = virtual_now,
                "Daylight transition"
            );
            self.emit(notification.into());
        }

        let delay = check.wall_delay(state.clock.zip());
        debug!(
            clock_id = %self.inner.id,
            next_check_virtual_ms = check.next_check_virtual_ms,
            wall_delay_ms = delay.as_millis(),
            "Next daylight check"
        );
        let callback = self.daylight_callback(state.generation);
        state.daylight.schedule(self.scheduler(), delay, callback)?;
        Ok(())
    }

    fn on_tic(&self, generation: u64) {
        let state = self.lock();
        if state.generation != generation || state.clock.status() != TimeStatus::Running {
            return;
        }
        let tic = state.clock.tic(self.now(), TimeCommand::CarryOn);
        if state.show_tic {
            info!(clock_id = %self.inner.id, %tic, "Tic");
        } else {
            debug!(clock_id = %self.inner.id, %tic, "Tic");
        }
        self.emit(tic.into());
    }

    fn on_daylight(&self, generation: u64) {
        let mut state = self.lock();
        if state.generation != generation || state.clock.status() != TimeStatus::Running {
            return;
        }
        state.daylight.fired();
        if let Err(fault) = self.check_daylight(&mut state) {
            warn!(clock_id = %self.inner.id, error = %fault, "Daylight check not rescheduled");
        }
    }

    fn tic_callback(&self, generation: u64) -> TimerCallback {
        let weak = Arc::downgrade(&self.inner);
        Arc::new(move || {
            if let Some(keeper) = upgrade(&weak) {
                keeper.on_tic(generation);
            }
        })
    }

    fn daylight_callback(&self, generation: u64) -> TimerCallback {
        let weak = Arc::downgrade(&self.inner);
        Arc::new(move || {
            if let Some(keeper) = upgrade(&weak) {
                keeper.on_daylight(generation);
            }
        })
    }
}

fn upgrade(weak: &Weak<Inner>) -> Option<Timekeeper> {
    weak.upgrade().map(|inner| Timekeeper { inner })
}

fn configured_clock(id: ClockId, settings: &ClockSettings) -> VirtualClock {
    let mut clock = VirtualClock::new();
    log_fallback(
        id,
        clock.configure(
            &settings.start_date,
            &settings.zip_factor,
            &settings.timezone_name,
        ),
    );
    clock
}

fn log_fallback(id: ClockId, result: Result<(), ClockConfigError>) {
    if let Err(err) = result {
        warn!(clock_id = %id, error = %err, "Clock setting replaced by fallback");
    }
}
