//! End-to-end scenarios for the Timekeeper service.
//!
//! Every scenario runs against a [`ManualScheduler`] and [`ManualClock`],
//! so hours of wall time pass in a single `advance` call and every timer
//! fires at exactly its due instant.

#![allow(
    clippy::unwrap_used,
    clippy::arithmetic_side_effects,
    clippy::indexing_slicing
)]

use std::sync::Arc;

use timekeeper_core::clock::{ControlRejected, HOUR_MS};
use timekeeper_core::config::TimekeeperConfig;
use timekeeper_core::manual::{ManualClock, ManualScheduler};
use timekeeper_core::sink::{EventSink, RecordingSink};
use timekeeper_core::solar::sun_times;
use timekeeper_core::timer::Scheduler;
use timekeeper_core::{Timekeeper, TimekeeperError};
use timekeeper_types::{
    PropertiesUpdate, StartValue, Tic, TimeCommand, TimeStatus, ZipValue,
};

/// 2024-01-01T00:00:00Z.
const NEW_YEAR_2024: i64 = 1_704_067_200_000;

/// 2024-06-21 as days since the Unix epoch.
const MIDSUMMER_2024: i64 = 19_895;

/// Wall-clock reading when every scenario begins.
const WALL_ORIGIN: i64 = 1_700_000_000_000;

struct Harness {
    keeper: Timekeeper,
    scheduler: Arc<ManualScheduler>,
    sink: Arc<RecordingSink>,
}

impl Harness {
    fn new(start: &str, zip: &str) -> Self {
        Self::with_config(start, zip, TimekeeperConfig::default())
    }

    fn in_sydney(start: &str, zip: &str) -> Self {
        let mut config = TimekeeperConfig::default();
        config.location.latitude = -33.87;
        config.location.longitude = 151.21;
        Self::with_config(start, zip, config)
    }

    fn with_config(start: &str, zip: &str, mut config: TimekeeperConfig) -> Self {
        config.clock.start_date = start.to_owned();
        config.clock.zip_factor = zip.to_owned();
        config.clock.timezone_name = "UTC".to_owned();

        let clock = Arc::new(ManualClock::new(WALL_ORIGIN));
        let scheduler = Arc::new(ManualScheduler::new(Arc::clone(&clock)));
        let sink = Arc::new(RecordingSink::new());
        let keeper = Timekeeper::new(
            &config,
            Arc::clone(&scheduler) as Arc<dyn Scheduler>,
            clock,
            Arc::clone(&sink) as Arc<dyn EventSink>,
        );
        Self {
            keeper,
            scheduler,
            sink,
        }
    }

    fn running(start: &str, zip: &str) -> Self {
        let harness = Self::new(start, zip);
        harness.keeper.init().unwrap();
        harness.keeper.start_time().unwrap();
        harness
    }

    fn advance(&self, wall_ms: i64) {
        self.scheduler.advance(wall_ms);
    }

    fn commands(&self) -> Vec<TimeCommand> {
        self.sink.tics().iter().map(Tic::command).collect()
    }
}

#[test]
fn virtual_time_equals_start_right_after_start() {
    for zip in ["x1", "x4", "x60", "x3600"] {
        let harness = Harness::running("2024-01-01 00:00:00", zip);
        assert_eq!(harness.keeper.time(), NEW_YEAR_2024, "zip {zip}");
    }
}

#[test]
fn running_time_advances_by_zip() {
    let harness = Harness::running("2024-01-01 00:00:00", "x60");
    let before = harness.keeper.time();
    harness.advance(12_345);
    assert_eq!(harness.keeper.time() - before, 12_345 * 60);
}

#[test]
fn pause_then_immediate_resume_is_invisible() {
    let harness = Harness::running("2024-01-01 00:00:00", "x4");
    harness.advance(5_000);
    let before = harness.keeper.time();
    harness.keeper.pause_time().unwrap();
    harness.keeper.resume_time().unwrap();
    assert_eq!(harness.keeper.time(), before);
}

#[test]
fn properties_round_trip_preserves_zip() {
    let harness = Harness::running("2024-01-01 00:00:00", "x4");
    let props = harness.keeper.properties();
    let after = harness
        .keeper
        .set_properties(&PropertiesUpdate::from(props))
        .unwrap();
    assert_eq!(after.zip, 4);
    assert_eq!(after.start_date, NEW_YEAR_2024);
    assert_eq!(after.status, TimeStatus::Initialized);
}

#[test]
fn properties_round_trip_in_pass_through_runs_again() {
    let harness = Harness::new("actual", "x1");
    harness.keeper.start().unwrap();
    let props = harness.keeper.properties();
    assert_eq!(props.start_date, -1);

    let after = harness
        .keeper
        .set_properties(&PropertiesUpdate::from(props))
        .unwrap();
    assert_eq!(after.zip, 1);
    assert_eq!(after.status, TimeStatus::Running);
}

#[test]
fn pass_through_follows_wall_clock_and_refuses_control() {
    let harness = Harness::new("actual", "x16");
    harness.keeper.start().unwrap();
    assert_eq!(harness.keeper.time(), WALL_ORIGIN);
    harness.advance(42_000);
    assert_eq!(harness.keeper.time(), WALL_ORIGIN + 42_000);

    for result in [
        harness.keeper.pause_time(),
        harness.keeper.resume_time(),
        harness.keeper.stop_time(),
    ] {
        assert!(matches!(
            result,
            Err(TimekeeperError::Rejected {
                source: ControlRejected::PassThrough { .. }
            })
        ));
    }
    assert_eq!(harness.keeper.status(), TimeStatus::Running);
}

#[test]
fn compressed_clock_emits_carry_on_every_virtual_hour() {
    let harness = Harness::running("2024-01-01 00:00:00", "x4");
    assert_eq!(harness.commands(), vec![TimeCommand::Init, TimeCommand::Start]);

    harness.advance(900);
    assert_eq!(harness.keeper.time(), NEW_YEAR_2024 + 3_600);
    assert_eq!(harness.commands().len(), 2);

    harness.advance(900_000 - 900);
    let tics = harness.sink.tics();
    assert_eq!(tics.len(), 3);
    let carry_on = tics.last().unwrap();
    assert_eq!(carry_on.command(), TimeCommand::CarryOn);
    assert_eq!(carry_on.timestamp(), NEW_YEAR_2024 + HOUR_MS);
    assert_eq!(carry_on.zip(), 4);
    assert_eq!(carry_on.status(), TimeStatus::Running);
}

#[test]
fn idle_time_is_excised_on_resume() {
    let harness = Harness::running("2024-01-01 00:00:00", "x4");
    harness.advance(10_000);
    harness.keeper.pause_time().unwrap();
    let paused_at = harness.keeper.time();

    harness.advance(500);
    assert_eq!(harness.keeper.time(), paused_at);
    harness.keeper.resume_time().unwrap();
    assert_eq!(harness.keeper.time(), paused_at);

    harness.advance(1_000);
    assert_eq!(harness.keeper.time(), paused_at + 4_000);
}

#[test]
fn no_tics_while_paused() {
    let harness = Harness::running("2024-01-01 00:00:00", "x4");
    harness.keeper.pause_time().unwrap();
    harness.advance(24 * HOUR_MS);
    assert_eq!(
        harness.commands(),
        vec![TimeCommand::Init, TimeCommand::Start, TimeCommand::Pause]
    );
}

#[test]
fn sunrise_check_fires_after_half_an_hour_at_double_speed() {
    let harness = Harness::new("actual", "x1");
    let sunrise = sun_times(harness.keeper.location(), MIDSUMMER_2024).sunrise_ms;

    harness
        .keeper
        .set_properties(&PropertiesUpdate {
            timezone: Some("UTC".to_owned()),
            start: Some(StartValue::Timestamp(sunrise - HOUR_MS)),
            zip: Some(ZipValue::Number(2.0)),
        })
        .unwrap();
    harness.keeper.start_time().unwrap();

    let first = harness.sink.daylight();
    assert_eq!(first.len(), 1);
    assert!(!first[0].is_daytime());
    assert_eq!(
        harness.keeper.daylight().next_check_virtual_time,
        Some(sunrise)
    );

    harness.advance(1_800_000 - 1);
    assert_eq!(harness.sink.daylight().len(), 1);

    harness.advance(1);
    let notifications = harness.sink.daylight();
    assert_eq!(notifications.len(), 2);
    let at_sunrise = &notifications[1];
    assert!(at_sunrise.is_daytime());
    assert_eq!(at_sunrise.timestamp, sunrise);
    assert_eq!(harness.keeper.daylight().is_daytime, Some(true));
}

#[test]
fn daylight_chain_keeps_running_for_days() {
    let harness = Harness::running("2024-06-21 00:00:00", "x3600");
    // Ten virtual days at one virtual hour per wall second.
    harness.advance(240_000);
    let notifications = harness.sink.daylight();
    // Initial night flag, then a sunrise and a sunset per day.
    assert_eq!(notifications.len(), 21);
    for pair in notifications.windows(2) {
        assert_ne!(pair[0].is_daytime(), pair[1].is_daytime());
        assert!(pair[0].timestamp < pair[1].timestamp);
    }
}

#[test]
fn morning_ahead_of_the_utc_date_is_daytime_and_waits_for_sunset() {
    // 22:00 UTC is 08:00 the next morning in Sydney.
    let harness = Harness::in_sydney("2024-06-21 22:00:00", "x1");
    harness.keeper.init().unwrap();
    harness.keeper.start_time().unwrap();

    let now = harness.keeper.time();
    let state = harness.keeper.daylight();
    assert_eq!(state.is_daytime, Some(true));
    let next = state.next_check_virtual_time.unwrap();
    assert!(next > now);
    assert_eq!(
        next,
        sun_times(harness.keeper.location(), MIDSUMMER_2024 + 1).sunset_ms
    );

    // The first timer due is the hourly tic, not a re-check.
    assert_eq!(harness.scheduler.advance(1_000), 0);
    assert_eq!(harness.scheduler.next_due(), Some(WALL_ORIGIN + HOUR_MS));
    assert_eq!(harness.sink.daylight().len(), 1);
}

#[test]
fn pausing_suspends_daylight_checks() {
    let harness = Harness::running("2024-06-21 00:00:00", "x3600");
    harness.keeper.pause_time().unwrap();
    harness.advance(1_000);
    assert_eq!(harness.sink.daylight().len(), 1);

    harness.keeper.resume_time().unwrap();
    // Still night, so the immediate check on resume is silent.
    assert_eq!(harness.sink.daylight().len(), 1);
}

#[test]
fn events_arrive_in_transition_order() {
    let harness = Harness::running("2024-01-01 00:00:00", "x4");
    harness.advance(900_000);
    harness.keeper.pause_time().unwrap();
    harness.keeper.resume_time().unwrap();
    harness.advance(900_000);
    harness.keeper.stop_time().unwrap();
    harness.advance(10 * HOUR_MS);

    assert_eq!(
        harness.commands(),
        vec![
            TimeCommand::Init,
            TimeCommand::Start,
            TimeCommand::CarryOn,
            TimeCommand::Pause,
            TimeCommand::Resume,
            TimeCommand::CarryOn,
            TimeCommand::Stop,
        ]
    );
    let stamps: Vec<i64> = harness.sink.tics().iter().map(Tic::timestamp).collect();
    assert!(stamps.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(harness.keeper.time(), NEW_YEAR_2024 + 2 * HOUR_MS);
}

#[test]
fn instances_are_independent() {
    let fast = Harness::running("2024-01-01 00:00:00", "x60");
    let slow = Harness::running("2024-01-01 00:00:00", "x1");
    fast.advance(60_000);
    assert_eq!(fast.keeper.time(), NEW_YEAR_2024 + HOUR_MS);
    assert_eq!(slow.keeper.time(), NEW_YEAR_2024);
    assert_ne!(fast.keeper.id(), slow.keeper.id());
}
