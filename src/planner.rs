//! Translates user intents into coherent register write batches.
//!
//! Program is the outer state (Manual | Weekly | Temporary), mode the inner
//! one; Weekly suppresses direct mode control, so any command that needs a
//! specific mode while the schedule is in charge first moves the program to
//! Temporary (never silently to Manual, which would discard the schedule).
//! Planning is pure: each intent maps to a [`WriteSet`] computed from the
//! program/mode the unit reports right now, and [`Session::command`] applies
//! the whole set, commits once, waits the settle delay, and re-polls so that
//! the observed state is the unit's acknowledgment rather than a local guess.

use crate::client::{self, DeviceClient};
use crate::registers::{Mode, Program};
use crate::snapshot::{ParamTable, Translations};
use crate::state::{self, DeviceState, HvacMode};
use std::time::Duration;
use tracing::{debug, warn};

/// A user action, consumed once per command round trip.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    TurnOn,
    TurnOff,
    SetHvacMode(HvacMode),
    SetPreset(String),
    SetFanPercent(u8),
    SetTemperature(f64),
    SetZone(u8),
}

/// The registers one command will touch. Applied in full, committed once.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct WriteSet {
    pub program: Option<Program>,
    pub mode: Option<Mode>,
    pub power: Option<u8>,
    pub temperature: Option<f64>,
    pub zone: Option<u8>,
}

/// Extract a fan percentage from user input like `"45"` or `"45%"` and clamp
/// it into the supported range. Out-of-range values are coerced, not
/// rejected.
pub fn parse_fan_percent(input: &str) -> Option<u8> {
    let digits: String = input.chars().filter(|c| c.is_ascii_digit()).collect();
    let percent = digits.parse::<u32>().ok()?;
    Some(percent.clamp(12, 100) as u8)
}

fn plan_power(on: bool, program: Option<Program>, mode: Option<Mode>) -> WriteSet {
    let target = if on { Mode::Ventilation } else { Mode::Off };
    let mut writes = WriteSet::default();
    // The program keeps its current authority, so it never needs a write
    // here. Mode is re-asserted under Weekly even when it already matches,
    // since the schedule may alter it autonomously.
    if mode != Some(target) || program == Some(Program::Weekly) {
        writes.mode = Some(target);
    }
    writes
}

fn plan_hvac(target: HvacMode, program: Option<Program>, mode: Option<Mode>) -> Option<WriteSet> {
    match target {
        HvacMode::Off => Some(plan_power(false, program, mode)),
        HvacMode::Auto => {
            // Weekly implies the unit picks the mode itself; forcing a mode
            // register here would fight the schedule.
            let mut writes = WriteSet::default();
            if program != Some(Program::Weekly) {
                writes.program = Some(Program::Weekly);
            }
            Some(writes)
        }
        HvacMode::FanOnly => {
            let mut writes = WriteSet::default();
            if program != Some(Program::Manual) {
                writes.program = Some(Program::Manual);
            }
            if mode != Some(Mode::Ventilation) || program == Some(Program::Weekly) {
                writes.mode = Some(Mode::Ventilation);
            }
            Some(writes)
        }
        HvacMode::Unknown => {
            warn!("cannot request the unknown hvac mode");
            None
        }
    }
}

fn plan_preset(label: &str, program: Option<Program>, mode: Option<Mode>) -> Option<WriteSet> {
    let Some(target) = Mode::from_preset_label(label) else {
        warn!(label, "unrecognized preset");
        return None;
    };
    if target == Mode::Off {
        return Some(plan_power(false, program, mode));
    }
    let mut writes = WriteSet::default();
    if program == Some(Program::Weekly) {
        // A manual preset selection overrides the schedule, but only as a
        // temporary override.
        writes.program = Some(Program::Temporary);
        writes.mode = Some(target);
    } else if mode != Some(target) {
        writes.mode = Some(target);
    }
    Some(writes)
}

fn plan_fan(percent: u8, program: Option<Program>) -> WriteSet {
    let percent = percent.clamp(12, 100);
    WriteSet {
        // A fan-speed override cannot coexist with schedule authority.
        program: (program == Some(Program::Weekly)).then_some(Program::Temporary),
        power: Some(percent),
        ..WriteSet::default()
    }
}

fn plan_temperature(celsius: f64) -> Option<WriteSet> {
    if !(10.0..=40.0).contains(&celsius) {
        warn!(celsius, "requested temperature must be between 10 and 40");
        return None;
    }
    Some(WriteSet { temperature: Some(celsius), ..WriteSet::default() })
}

fn plan_zone(zone: u8) -> Option<WriteSet> {
    if zone > 2 {
        warn!(zone, "the unit knows zones 0 through 2");
        return None;
    }
    Some(WriteSet { zone: Some(zone), ..WriteSet::default() })
}

/// Compute the writes realizing `intent` against the current program/mode.
///
/// `None` means the intent failed validation: it has been logged and zero
/// writes must be issued.
pub fn plan(intent: &Intent, program: Option<Program>, mode: Option<Mode>) -> Option<WriteSet> {
    match intent {
        Intent::TurnOn => Some(plan_power(true, program, mode)),
        Intent::TurnOff => Some(plan_power(false, program, mode)),
        Intent::SetHvacMode(target) => plan_hvac(*target, program, mode),
        Intent::SetPreset(label) => plan_preset(label, program, mode),
        Intent::SetFanPercent(percent) => Some(plan_fan(*percent, program)),
        Intent::SetTemperature(celsius) => plan_temperature(*celsius),
        Intent::SetZone(zone) => plan_zone(*zone),
    }
}

/// One logical device session: owns the interpreted state and serializes the
/// read → decide → write → commit → settle → re-read sequence.
pub struct Session<C> {
    client: C,
    params: ParamTable,
    translations: Translations,
    state: DeviceState,
    settle_delay: Duration,
}

impl<C: DeviceClient> Session<C> {
    /// Fetch the parameter/translation tables and take the first status
    /// read-out.
    pub async fn connect(mut client: C, settle_delay: Duration) -> Result<Self, client::Error> {
        let params = client.get_params().await?;
        let translations = client.get_translations().await?;
        let mut session = Self {
            client,
            params,
            translations,
            state: DeviceState::default(),
            settle_delay,
        };
        session.poll().await?;
        Ok(session)
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    /// Fetch a fresh snapshot and replace the interpreted state wholesale.
    pub async fn poll(&mut self) -> Result<&DeviceState, client::Error> {
        let status = self.client.get_status().await?;
        self.state = state::interpret(
            &self.state,
            status.as_ref(),
            &self.params,
            &self.translations,
        );
        Ok(&self.state)
    }

    /// Execute one command: re-read program/mode, plan, write, commit, wait
    /// the settle delay, and poll back the acknowledged state.
    ///
    /// Intents that fail validation issue zero writes and return the current
    /// state unchanged; only a failed commit surfaces as an error.
    pub async fn command(&mut self, intent: Intent) -> Result<&DeviceState, client::Error> {
        // The schedule can change the mode without user action, so the plan
        // works off a fresh read-out rather than the cached state.
        self.poll().await?;
        let Some(writes) = plan(&intent, self.state.program, self.state.mode) else {
            return Ok(&self.state);
        };
        debug!(?intent, ?writes, "executing command");
        self.apply(&writes);
        self.client.exec().await?;
        tokio::time::sleep(self.settle_delay).await;
        self.poll().await
    }

    fn apply(&mut self, writes: &WriteSet) {
        if let Some(program) = writes.program {
            self.client.set_program(program);
        }
        if let Some(mode) = writes.mode {
            self.client.set_mode(mode);
        }
        if let Some(power) = writes.power {
            self.client.set_power(power);
        }
        if let Some(celsius) = writes.temperature {
            self.client.set_temperature(celsius);
        }
        if let Some(zone) = writes.zone {
            self.client.set_command("H11705", i64::from(zone));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Snapshot;

    #[derive(Debug, PartialEq)]
    enum Write {
        Program(Program),
        Mode(Mode),
        Power(u8),
        Temperature(f64),
        Command(&'static str, i64),
    }

    #[derive(Default)]
    struct MockClient {
        status: Vec<(&'static str, &'static str)>,
        writes: Vec<Write>,
        exec_count: usize,
        poll_count: usize,
        fail_commit: bool,
    }

    impl MockClient {
        fn with_status(status: &[(&'static str, &'static str)]) -> Self {
            Self { status: status.to_vec(), ..Self::default() }
        }
    }

    impl DeviceClient for MockClient {
        async fn get_status(&mut self) -> Result<Option<Snapshot>, client::Error> {
            self.poll_count += 1;
            if self.status.is_empty() {
                return Ok(None);
            }
            Ok(Some(
                self.status
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ))
        }

        async fn get_params(&mut self) -> Result<ParamTable, client::Error> {
            Ok(ParamTable::default())
        }

        async fn get_translations(&mut self) -> Result<Translations, client::Error> {
            Ok(Translations::default())
        }

        fn set_program(&mut self, program: Program) {
            self.writes.push(Write::Program(program));
        }

        fn set_mode(&mut self, mode: Mode) {
            self.writes.push(Write::Mode(mode));
        }

        fn set_power(&mut self, percent: u8) {
            self.writes.push(Write::Power(percent));
        }

        fn set_temperature(&mut self, celsius: f64) {
            self.writes.push(Write::Temperature(celsius));
        }

        fn set_command(&mut self, key: &'static str, value: i64) {
            self.writes.push(Write::Command(key, value));
        }

        async fn exec(&mut self) -> Result<(), client::Error> {
            self.exec_count += 1;
            if self.fail_commit {
                return Err(client::Error::CommitRejected);
            }
            Ok(())
        }
    }

    async fn session(status: &[(&'static str, &'static str)]) -> Session<MockClient> {
        Session::connect(MockClient::with_status(status), Duration::ZERO)
            .await
            .unwrap()
    }

    #[test]
    fn fan_percent_inputs_are_coerced() {
        assert_eq!(parse_fan_percent("45%"), Some(45));
        assert_eq!(parse_fan_percent("45"), Some(45));
        assert_eq!(parse_fan_percent("200"), Some(100));
        assert_eq!(parse_fan_percent("1"), Some(12));
        assert_eq!(parse_fan_percent("auto"), None);
    }

    #[test]
    fn fan_override_displaces_schedule_authority() {
        let writes = plan_fan(50, Some(Program::Weekly));
        assert_eq!(writes.program, Some(Program::Temporary));
        assert_eq!(writes.power, Some(50));
        let writes = plan_fan(200, Some(Program::Manual));
        assert_eq!(writes.program, None);
        assert_eq!(writes.power, Some(100));
    }

    #[test]
    fn turn_off_keeps_program_authority() {
        let writes = plan_power(false, Some(Program::Weekly), Some(Mode::Automatic));
        assert_eq!(writes.program, None);
        assert_eq!(writes.mode, Some(Mode::Off));
    }

    #[test]
    fn weekly_reasserts_mode_even_when_matching() {
        let writes = plan_power(true, Some(Program::Weekly), Some(Mode::Ventilation));
        assert_eq!(writes.mode, Some(Mode::Ventilation));
        let writes = plan_power(true, Some(Program::Manual), Some(Mode::Ventilation));
        assert_eq!(writes.mode, None);
    }

    #[test]
    fn hvac_auto_only_moves_the_program() {
        let writes =
            plan_hvac(HvacMode::Auto, Some(Program::Manual), Some(Mode::Ventilation)).unwrap();
        assert_eq!(writes.program, Some(Program::Weekly));
        assert_eq!(writes.mode, None);
        let writes =
            plan_hvac(HvacMode::Auto, Some(Program::Weekly), Some(Mode::Automatic)).unwrap();
        assert_eq!(writes, WriteSet::default());
    }

    #[test]
    fn hvac_fan_only_targets_manual_ventilation() {
        let writes =
            plan_hvac(HvacMode::FanOnly, Some(Program::Weekly), Some(Mode::Ventilation)).unwrap();
        assert_eq!(writes.program, Some(Program::Manual));
        assert_eq!(writes.mode, Some(Mode::Ventilation));
    }

    #[test]
    fn preset_under_schedule_becomes_temporary() {
        let writes =
            plan_preset("Disbalance", Some(Program::Weekly), Some(Mode::Automatic)).unwrap();
        assert_eq!(writes.program, Some(Program::Temporary));
        assert_eq!(writes.mode, Some(Mode::Disbalance));
    }

    #[test]
    fn preset_off_delegates_to_turn_off() {
        let writes = plan_preset("Off", Some(Program::Manual), Some(Mode::Ventilation)).unwrap();
        assert_eq!(writes.mode, Some(Mode::Off));
        assert_eq!(writes.program, None);
    }

    #[test]
    fn unknown_preset_is_rejected() {
        assert_eq!(plan_preset("Slumber", Some(Program::Manual), None), None);
    }

    #[tokio::test]
    async fn turn_off_under_schedule() {
        let mut session =
            session(&[("H10701", "1"), ("H10705", "1"), ("H10708", "60")]).await;
        session.command(Intent::TurnOff).await.unwrap();
        assert_eq!(session.client.writes, vec![Write::Mode(Mode::Off)]);
        assert_eq!(session.client.exec_count, 1);
    }

    #[tokio::test]
    async fn out_of_range_temperature_issues_nothing() {
        let mut session = session(&[("H10701", "0"), ("H10705", "2")]).await;
        session.command(Intent::SetTemperature(5.0)).await.unwrap();
        assert!(session.client.writes.is_empty());
        assert_eq!(session.client.exec_count, 0);
    }

    #[tokio::test]
    async fn matching_preset_still_commits_and_repolls() {
        let mut session = session(&[("H10701", "0"), ("H10705", "2"), ("H10708", "50")]).await;
        let polls_before = session.client.poll_count;
        session
            .command(Intent::SetPreset("Ventilation".to_string()))
            .await
            .unwrap();
        assert!(session.client.writes.is_empty());
        assert_eq!(session.client.exec_count, 1);
        // One pre-command read, one confirmatory re-poll.
        assert_eq!(session.client.poll_count, polls_before + 2);
    }

    #[tokio::test]
    async fn fan_override_writes_program_then_power() {
        let mut session = session(&[("H10701", "1"), ("H10705", "1")]).await;
        session.command(Intent::SetFanPercent(45)).await.unwrap();
        assert_eq!(
            session.client.writes,
            vec![Write::Program(Program::Temporary), Write::Power(45)]
        );
    }

    #[tokio::test]
    async fn zone_select_goes_through_raw_command() {
        let mut session = session(&[("H10701", "0"), ("H10705", "2")]).await;
        session.command(Intent::SetZone(1)).await.unwrap();
        assert_eq!(session.client.writes, vec![Write::Command("H11705", 1)]);
        session.command(Intent::SetZone(7)).await.unwrap();
        assert_eq!(session.client.writes.len(), 1);
    }

    #[tokio::test]
    async fn commit_failure_surfaces() {
        let mut client = MockClient::with_status(&[("H10701", "0"), ("H10705", "0")]);
        client.fail_commit = true;
        let mut session = Session::connect(client, Duration::ZERO).await.unwrap();
        let result = session.command(Intent::TurnOn).await;
        assert!(matches!(result, Err(client::Error::CommitRejected)));
    }

    #[tokio::test]
    async fn disconnected_unit_degrades_instead_of_failing() {
        let mut session = session(&[]).await;
        let state = session.poll().await.unwrap();
        assert_eq!(state.hvac_mode, HvacMode::Unknown);
    }
}
