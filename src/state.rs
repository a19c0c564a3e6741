//! Turns a raw register snapshot into the interpreted [`DeviceState`].
//!
//! Register keys and scaling differ across firmware generations, so every
//! field resolves through a fallback chain: a primary register with a fixed
//! scale, then a secondary register looked up as a resolved value, and for a
//! couple of temperatures a configuration-register-selected source. One
//! field's fallback never affects another's.

use crate::registers::{Mode, Program};
use crate::snapshot::{ParamTable, Snapshot, Translations};

/// The climate-level operating state derived from (program, mode, fan).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum HvacMode {
    Off,
    Auto,
    FanOnly,
    /// The unit did not return a status read-out (bad credentials, too many
    /// sessions, or the unit is simply gone). This is a display state, not an
    /// error.
    #[default]
    Unknown,
}

impl std::fmt::Display for HvacMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Off => "off",
            Self::Auto => "auto",
            Self::FanOnly => "fan only",
            Self::Unknown => "unknown",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct Temperatures {
    pub outside: Option<f64>,
    pub inside: Option<f64>,
    pub supply: Option<f64>,
    pub exhaust: Option<f64>,
    pub extract: Option<f64>,
}

/// Diagnostic attributes. Every field is independently optional: which of
/// these registers exist varies by model and installed accessories.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct Diagnostics {
    pub co2_ppm: Option<i64>,
    pub filter_change_needed: Option<bool>,
    pub filter_wear_percent: Option<i64>,
    pub zone: Option<u8>,
    pub active_inputs: Vec<&'static str>,
}

/// The interpreted device state, recomputed wholesale on every poll.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct DeviceState {
    pub program: Option<Program>,
    pub mode: Option<Mode>,
    pub hvac_mode: HvacMode,
    pub requested_power: Option<f64>,
    pub requested_temperature: Option<f64>,
    /// The effective fan percentage: live power when the unit reports it,
    /// requested power otherwise.
    pub fan_percent: Option<u8>,
    pub temperatures: Temperatures,
    pub warnings: Vec<String>,
    pub alerts: Vec<String>,
    pub diagnostics: Diagnostics,
}

impl DeviceState {
    pub fn fan_display(&self) -> Option<String> {
        self.fan_percent.map(|percent| format!("{percent}%"))
    }

    pub fn preset_label(&self) -> Option<&'static str> {
        self.mode.map(|mode| mode.label())
    }
}

/// A primary-register-with-scale / secondary-register-resolved-value pair.
struct Chain {
    primary: &'static str,
    scale: f64,
    secondary: Option<&'static str>,
}

impl Chain {
    /// First match wins; an unresolvable chain retains the previous value.
    fn resolve(&self, snapshot: &Snapshot, previous: Option<f64>) -> Option<f64> {
        if let Some(raw) = snapshot.raw(self.primary) {
            return Some(raw as f64 / self.scale);
        }
        self.secondary
            .and_then(|key| snapshot.value(key))
            .or(previous)
    }
}

const SUPPLY: Chain = Chain { primary: "I10200", scale: 10.0, secondary: Some("I10210") };
const EXHAUST: Chain = Chain { primary: "I10201", scale: 10.0, secondary: Some("I10211") };
const EXTRACT: Chain = Chain { primary: "I10204", scale: 10.0, secondary: Some("I10212") };
const REQUESTED_TEMPERATURE: Chain =
    Chain { primary: "H10706", scale: 10.0, secondary: Some("H10710") };
const REQUESTED_POWER: Chain = Chain { primary: "H10708", scale: 1.0, secondary: Some("H10714") };

/// The value `I10202` reports when the configured exterior sensor is not the
/// one actually wired up.
const OUTSIDE_SENTINEL: f64 = 126.0;
/// Raw `H10510` values above this encode negative temperatures by wrapping
/// around the top of the 16-bit range.
const WRAP_THRESHOLD: i64 = 1300;

fn decode_high_resolution_outside(raw: i64) -> f64 {
    if raw > WRAP_THRESHOLD {
        let celsius = (50.0 - (raw as f64 - 65036.0) / 10.0) * -1.0;
        (celsius * 10.0).round() / 10.0
    } else {
        raw as f64 / 10.0
    }
}

fn outside_temperature(snapshot: &Snapshot, previous: Option<f64>) -> Option<f64> {
    if let Some(raw) = snapshot.raw("H10510") {
        return Some(decode_high_resolution_outside(raw));
    }
    if let Some(value) = snapshot.value("I10202") {
        if value == OUTSIDE_SENTINEL {
            let roof = snapshot.raw("H10515") == Some(1);
            let tertiary = if roof { "I10209" } else { "I10206" };
            return snapshot.value(tertiary).or(previous);
        }
        return Some(value);
    }
    previous
}

fn inside_temperature(snapshot: &Snapshot, previous: Option<f64>) -> Option<f64> {
    match snapshot.raw("H10514") {
        Some(1) => snapshot.raw("I10207").map(|raw| raw as f64 / 10.0).or(previous),
        Some(0) => snapshot.raw("I10203").map(|raw| raw as f64 / 10.0).or(previous),
        // Compact units have no wiring register and report through a
        // dedicated sensor register instead.
        None => snapshot.value("I10208").or(previous),
        Some(other) => {
            tracing::warn!(value = other, "unsupported interior sensor configuration");
            previous
        }
    }
}

fn derive_hvac(program: Option<Program>, mode: Option<Mode>, fan_percent: Option<u8>) -> HvacMode {
    // Mode Off always displays as off, whatever the program says.
    if mode == Some(Mode::Off) {
        return HvacMode::Off;
    }
    if fan_percent == Some(0) {
        return HvacMode::Off;
    }
    match program {
        Some(Program::Weekly) => HvacMode::Auto,
        Some(_) => HvacMode::FanOnly,
        None => HvacMode::Unknown,
    }
}

fn active_conditions(
    ids: &[String],
    snapshot: &Snapshot,
    translations: &Translations,
) -> Vec<String> {
    ids.iter()
        .filter(|id| snapshot.text(id) == Some("1"))
        .map(|id| translations.translate(id))
        .collect()
}

fn diagnostics(snapshot: &Snapshot) -> Diagnostics {
    let inputs = [
        ("I10301", "D1"),
        ("I10302", "D2"),
        ("I10303", "D3"),
        ("I10304", "D4"),
    ];
    Diagnostics {
        co2_ppm: snapshot.raw("I10215"),
        filter_change_needed: snapshot.raw("H11002").map(|flag| flag == 1),
        filter_wear_percent: snapshot.raw("H11003"),
        zone: snapshot
            .raw("H11705")
            .and_then(|zone| u8::try_from(zone).ok())
            .filter(|zone| *zone <= 2),
        active_inputs: inputs
            .iter()
            .filter(|(key, _)| snapshot.raw(key) == Some(1))
            .map(|(_, label)| *label)
            .collect(),
    }
}

/// Interpret one status read-out.
///
/// `previous` is consulted only for fields whose registers are missing from
/// this snapshot ("retain last known value"); everything else is recomputed.
/// A `None` status is the disconnected display state, not a failure.
pub fn interpret(
    previous: &DeviceState,
    status: Option<&Snapshot>,
    params: &ParamTable,
    translations: &Translations,
) -> DeviceState {
    let Some(snapshot) = status else {
        let mut next = previous.clone();
        next.hvac_mode = HvacMode::Unknown;
        next.warnings.clear();
        next.alerts.clear();
        return next;
    };

    let program = snapshot.program().or(previous.program);
    let mode = snapshot.mode().or(previous.mode);
    let requested_power = REQUESTED_POWER.resolve(snapshot, previous.requested_power);
    let fan_percent = snapshot
        .raw("H10709")
        .or(requested_power.map(|power| power.round() as i64))
        .and_then(|percent| u8::try_from(percent).ok());

    DeviceState {
        program,
        mode,
        hvac_mode: derive_hvac(program, mode, fan_percent),
        requested_power,
        requested_temperature: REQUESTED_TEMPERATURE
            .resolve(snapshot, previous.requested_temperature),
        fan_percent,
        temperatures: Temperatures {
            outside: outside_temperature(snapshot, previous.temperatures.outside),
            inside: inside_temperature(snapshot, previous.temperatures.inside),
            supply: SUPPLY.resolve(snapshot, previous.temperatures.supply),
            exhaust: EXHAUST.resolve(snapshot, previous.temperatures.exhaust),
            extract: EXTRACT.resolve(snapshot, previous.temperatures.extract),
        },
        warnings: active_conditions(&params.warning, snapshot, translations),
        alerts: active_conditions(&params.alert, snapshot, translations),
        diagnostics: diagnostics(snapshot),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(pairs: &[(&str, &str)]) -> Snapshot {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn interpret_fresh(snap: &Snapshot) -> DeviceState {
        interpret(
            &DeviceState::default(),
            Some(snap),
            &ParamTable::default(),
            &Translations::default(),
        )
    }

    #[test]
    fn schedule_with_automatic_mode() {
        let snap = snapshot(&[
            ("H10705", "1"),
            ("H10701", "1"),
            ("H10706", "215"),
            ("H10714", "60"),
        ]);
        let state = interpret_fresh(&snap);
        assert_eq!(state.program, Some(Program::Weekly));
        assert_eq!(state.mode, Some(Mode::Automatic));
        assert_eq!(state.hvac_mode, HvacMode::Auto);
        assert_eq!(state.requested_temperature, Some(21.5));
        assert_eq!(state.fan_display().as_deref(), Some("60%"));
    }

    #[test]
    fn mode_off_beats_any_program() {
        for program in ["0", "1", "2"] {
            let snap = snapshot(&[("H10705", "0"), ("H10701", program), ("H10708", "60")]);
            assert_eq!(interpret_fresh(&snap).hvac_mode, HvacMode::Off);
        }
    }

    #[test]
    fn zero_fan_percent_forces_off() {
        let snap = snapshot(&[("H10705", "2"), ("H10701", "1"), ("H10708", "0")]);
        assert_eq!(interpret_fresh(&snap).hvac_mode, HvacMode::Off);
    }

    #[test]
    fn manual_running_mode_is_fan_only() {
        let snap = snapshot(&[("H10705", "2"), ("H10701", "0"), ("H10708", "40")]);
        assert_eq!(interpret_fresh(&snap).hvac_mode, HvacMode::FanOnly);
    }

    #[test]
    fn missing_status_degrades_to_unknown() {
        let mut previous = DeviceState::default();
        previous.temperatures.supply = Some(19.5);
        previous.warnings = vec!["Filter clogged".to_string()];
        let state = interpret(
            &previous,
            None,
            &ParamTable::default(),
            &Translations::default(),
        );
        assert_eq!(state.hvac_mode, HvacMode::Unknown);
        assert!(state.warnings.is_empty());
        assert!(state.alerts.is_empty());
        assert_eq!(state.temperatures.supply, Some(19.5));
    }

    #[test]
    fn high_resolution_outside_wraps_below_zero() {
        let snap = snapshot(&[("H10510", "65486")]);
        assert_eq!(interpret_fresh(&snap).temperatures.outside, Some(-5.0));
        let snap = snapshot(&[("H10510", "215")]);
        assert_eq!(interpret_fresh(&snap).temperatures.outside, Some(21.5));
    }

    #[test]
    fn outside_sentinel_selects_tertiary_source() {
        let snap = snapshot(&[("I10202", "1260"), ("H10515", "1"), ("I10209", "31")]);
        assert_eq!(interpret_fresh(&snap).temperatures.outside, Some(3.1));
        // Facade sensor when the flag register reads 0.
        let snap = snapshot(&[("I10202", "1260"), ("H10515", "0"), ("I10206", "42")]);
        assert_eq!(interpret_fresh(&snap).temperatures.outside, Some(4.2));
        // Not the sentinel: the secondary value is used directly.
        let snap = snapshot(&[("I10202", "217")]);
        assert_eq!(interpret_fresh(&snap).temperatures.outside, Some(21.7));
    }

    #[test]
    fn inside_temperature_follows_wiring_register() {
        let snap = snapshot(&[("H10514", "1"), ("I10207", "224"), ("I10203", "180")]);
        assert_eq!(interpret_fresh(&snap).temperatures.inside, Some(22.4));
        let snap = snapshot(&[("H10514", "0"), ("I10207", "224"), ("I10203", "180")]);
        assert_eq!(interpret_fresh(&snap).temperatures.inside, Some(18.0));
        let snap = snapshot(&[("I10208", "201")]);
        assert_eq!(interpret_fresh(&snap).temperatures.inside, Some(20.1));
    }

    #[test]
    fn unsupported_sensor_configuration_retains_previous() {
        let mut previous = DeviceState::default();
        previous.temperatures.inside = Some(21.0);
        let snap = snapshot(&[("H10514", "3"), ("I10207", "224"), ("H10705", "2")]);
        let state = interpret(
            &previous,
            Some(&snap),
            &ParamTable::default(),
            &Translations::default(),
        );
        // The rest of the interpretation still proceeds.
        assert_eq!(state.temperatures.inside, Some(21.0));
        assert_eq!(state.mode, Some(Mode::Ventilation));
    }

    #[test]
    fn live_power_register_takes_display_precedence() {
        let snap = snapshot(&[("H10708", "60"), ("H10709", "55")]);
        let state = interpret_fresh(&snap);
        assert_eq!(state.fan_percent, Some(55));
        assert_eq!(state.requested_power, Some(60.0));
    }

    #[test]
    fn conditions_preserve_param_table_order() {
        let params = ParamTable {
            warning: vec!["H10503".to_string(), "H10501".to_string(), "H10502".to_string()],
            alert: vec!["H10601".to_string()],
        };
        let translations = Translations::new(
            [
                ("H10501".to_string(), "first".to_string()),
                ("H10503".to_string(), "third".to_string()),
                ("H10601".to_string(), "loud".to_string()),
            ]
            .into(),
        );
        let snap = snapshot(&[
            ("H10501", "1"),
            ("H10502", "0"),
            ("H10503", "1"),
            ("H10601", "1"),
        ]);
        let state = interpret(&DeviceState::default(), Some(&snap), &params, &translations);
        assert_eq!(state.warnings, vec!["third".to_string(), "first".to_string()]);
        assert_eq!(state.alerts, vec!["loud".to_string()]);
    }

    #[test]
    fn diagnostics_fields_are_independently_optional() {
        let snap = snapshot(&[
            ("I10215", "730"),
            ("H11002", "1"),
            ("H11705", "2"),
            ("I10301", "1"),
            ("I10304", "1"),
        ]);
        let state = interpret_fresh(&snap);
        assert_eq!(state.diagnostics.co2_ppm, Some(730));
        assert_eq!(state.diagnostics.filter_change_needed, Some(true));
        assert_eq!(state.diagnostics.filter_wear_percent, None);
        assert_eq!(state.diagnostics.zone, Some(2));
        assert_eq!(state.diagnostics.active_inputs, vec!["D1", "D4"]);
    }
}
