pub mod registers {
    use crate::registers::{Access, ACCESS, DATA_TYPES, DESCRIPTIONS, KEYS, MAXIMUM_VALUES, MINIMUM_VALUES};

    /// Search and output the known Atrea registers.
    #[derive(clap::Parser)]
    pub struct Args {
        #[clap(flatten)]
        output: crate::output::Args,
        filter: Option<String>,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error("could not produce the register listing")]
        Output(#[from] crate::output::Error),
    }

    #[derive(serde::Serialize)]
    pub struct RegisterSchema {
        pub key: &'static str,
        pub access: Access,
        pub scale: u8,
        pub minimum: Option<i64>,
        pub maximum: Option<i64>,
        pub description: &'static str,
    }

    impl RegisterSchema {
        pub fn all_registers() -> impl Iterator<Item = Self> {
            use std::iter::zip;
            zip(
                zip(zip(zip(zip(KEYS, ACCESS), DATA_TYPES), MINIMUM_VALUES), MAXIMUM_VALUES),
                DESCRIPTIONS,
            )
            .map(
                |(((((&key, &access), &data_type), &minimum), &maximum), &description)| {
                    RegisterSchema {
                        key,
                        access,
                        scale: data_type.scale(),
                        minimum,
                        maximum,
                        description,
                    }
                },
            )
        }

        pub fn is_match(&self, pattern: &str) -> bool {
            let pattern = pattern.to_uppercase();
            if self.key.contains(&pattern) {
                return true;
            }
            if self.description.to_uppercase().contains(&pattern) {
                return true;
            }
            return false;
        }
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let mut output = args
            .output
            .to_output(&["Key", "Access", "Scale", "Min", "Max", "Description"])?;
        for register in RegisterSchema::all_registers() {
            if let Some(pattern) = &args.filter {
                if !register.is_match(pattern) {
                    continue;
                }
            }
            output.record(
                || {
                    vec![
                        register.key.to_string(),
                        register.access.to_string(),
                        register.scale.to_string(),
                        register.minimum.map(|v| v.to_string()).unwrap_or_default(),
                        register.maximum.map(|v| v.to_string()).unwrap_or_default(),
                        register.description.to_string(),
                    ]
                },
                || &register,
            )?;
        }
        output.commit()?;
        Ok(())
    }
}

pub mod status {
    use crate::state::DeviceState;

    /// Read the unit out once and display the interpreted state.
    #[derive(clap::Parser)]
    pub struct Args {
        #[clap(flatten)]
        pub(super) config: crate::config::Args,
        #[clap(flatten)]
        pub(super) output: crate::output::Args,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error("could not start the async runtime")]
        Runtime(#[source] std::io::Error),
        #[error("could not communicate with the unit")]
        Client(#[from] crate::client::Error),
        #[error("the configured fan mode list is invalid")]
        FanModes(#[from] crate::config::FanModesError),
        #[error("the configured preset list is invalid")]
        Presets(#[from] crate::config::PresetsError),
        #[error("could not produce the status output")]
        Output(#[from] crate::output::Error),
    }

    fn opt<T: std::fmt::Display>(value: Option<T>) -> String {
        value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
    }

    pub(super) fn emit_state(
        state: &DeviceState,
        output: &mut crate::output::Output,
    ) -> Result<(), crate::output::Error> {
        let mut row = |field: &'static str, value: String| {
            output.record(
                || vec![field.to_string(), value.clone()],
                || serde_json::json!({ "field": field, "value": &value }),
            )
        };
        row("hvac mode", state.hvac_mode.to_string())?;
        row("program", opt(state.program))?;
        row("preset", opt(state.preset_label()))?;
        row("icon", opt(state.mode.map(|m| m.icon())))?;
        row("fan", opt(state.fan_display()))?;
        row("requested temperature", opt(state.requested_temperature))?;
        row("requested power", opt(state.requested_power))?;
        row("outside temperature", opt(state.temperatures.outside))?;
        row("inside temperature", opt(state.temperatures.inside))?;
        row("supply air temperature", opt(state.temperatures.supply))?;
        row("exhaust air temperature", opt(state.temperatures.exhaust))?;
        row("extract air temperature", opt(state.temperatures.extract))?;
        row("warnings", state.warnings.join("; "))?;
        row("alerts", state.alerts.join("; "))?;
        row("co2", opt(state.diagnostics.co2_ppm))?;
        row("filter change needed", opt(state.diagnostics.filter_change_needed))?;
        row("filter wear", opt(state.diagnostics.filter_wear_percent))?;
        row("zone", opt(state.diagnostics.zone))?;
        row("active inputs", state.diagnostics.active_inputs.join("; "))?;
        Ok(())
    }

    pub fn run(args: Args) -> Result<(), Error> {
        crate::config::process_fan_modes(&args.config.fan_modes)?;
        crate::config::process_presets(args.config.presets.as_deref())?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(Error::Runtime)?;
        let session = runtime.block_on(args.config.session())?;
        let mut output = args.output.to_output(&["Field", "Value"])?;
        emit_state(session.state(), &mut output)?;
        output.commit()?;
        Ok(())
    }
}

pub mod watch {
    /// Poll the unit periodically and emit the interpreted state after each
    /// read-out.
    #[derive(clap::Parser)]
    pub struct Args {
        #[clap(flatten)]
        config: crate::config::Args,
        #[clap(flatten)]
        output: crate::output::Args,
        /// Poll this often.
        ///
        /// The unit shares one session across all clients; polling much
        /// faster than this tends to push other clients out.
        #[arg(long, default_value = "10s")]
        interval: humantime::Duration,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error("could not start the async runtime")]
        Runtime(#[source] std::io::Error),
        #[error("could not communicate with the unit")]
        Client(#[from] crate::client::Error),
        #[error("could not produce the status output")]
        Output(#[from] crate::output::Error),
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(Error::Runtime)?;
        runtime.block_on(async {
            let mut session = args.config.session().await?;
            loop {
                let mut output = args.output.clone().to_output(&["Field", "Value"])?;
                super::status::emit_state(session.state(), &mut output)?;
                output.commit()?;
                tokio::time::sleep(*args.interval).await;
                session.poll().await?;
            }
        })
    }
}

pub mod set {
    use crate::planner::{parse_fan_percent, Intent};
    use crate::state::HvacMode;

    /// Send one command to the unit and wait for it to take effect.
    #[derive(clap::Parser)]
    pub struct Args {
        #[clap(flatten)]
        config: crate::config::Args,
        #[command(subcommand)]
        action: Action,
    }

    #[derive(clap::Subcommand)]
    pub enum Action {
        /// Start ventilating under the current program authority.
        On,
        /// Stop the unit, keeping the current program authority.
        Off,
        /// Select the climate-level operating mode.
        Hvac {
            #[arg(value_enum)]
            mode: HvacArg,
        },
        /// Activate a preset by its label (see `registers` for mode values).
        Preset { label: String },
        /// Override the fan speed, in percent. A trailing `%` is accepted;
        /// values outside 12..=100 are clamped.
        Fan { percent: String },
        /// Set the requested temperature, in degrees Celsius (10 to 40).
        Temperature { celsius: f64 },
        /// Select the active zone (0, 1 or 2).
        Zone { zone: u8 },
    }

    #[derive(clap::ValueEnum, Clone, Copy)]
    pub enum HvacArg {
        Off,
        Auto,
        FanOnly,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error("could not start the async runtime")]
        Runtime(#[source] std::io::Error),
        #[error("could not communicate with the unit")]
        Client(#[from] crate::client::Error),
        #[error("`{0}` is not a usable fan percentage")]
        BadFanPercent(String),
    }

    fn intent(action: &Action) -> Result<Intent, Error> {
        Ok(match action {
            Action::On => Intent::TurnOn,
            Action::Off => Intent::TurnOff,
            Action::Hvac { mode } => Intent::SetHvacMode(match mode {
                HvacArg::Off => HvacMode::Off,
                HvacArg::Auto => HvacMode::Auto,
                HvacArg::FanOnly => HvacMode::FanOnly,
            }),
            Action::Preset { label } => Intent::SetPreset(label.clone()),
            Action::Fan { percent } => Intent::SetFanPercent(
                parse_fan_percent(percent).ok_or_else(|| Error::BadFanPercent(percent.clone()))?,
            ),
            Action::Temperature { celsius } => Intent::SetTemperature(*celsius),
            Action::Zone { zone } => Intent::SetZone(*zone),
        })
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let intent = intent(&args.action)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(Error::Runtime)?;
        runtime.block_on(async {
            let mut session = args.config.session().await?;
            let state = session.command(intent).await?;
            println!(
                "hvac: {}, program: {}, preset: {}, fan: {}",
                state.hvac_mode,
                state
                    .program
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                state.preset_label().unwrap_or("-"),
                state.fan_display().unwrap_or_else(|| "-".to_string()),
            );
            Ok(())
        })
    }
}
