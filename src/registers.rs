//! The Atrea Duplex register map and the typed operating enums decoded from it.
//!
//! Registers are identified by short alphanumeric keys (`H…` for holding-style
//! parameters, `I…` for measured inputs). The unit reports every value as a
//! decimal string; the table records the fixed scale each register uses so the
//! rest of the crate can ask for resolved values without knowing the layout.

#[derive(Clone, Copy, serde::Serialize, PartialEq, Eq)]
pub struct DataType {
    scale: u8,
}

impl DataType {
    // Convenience aliases for the nicely tabulated `for_each_register` macro
    // definition below.
    pub const RAW: Self = Self { scale: 1 };
    pub const CEL: Self = Self { scale: 10 };

    pub const fn scale(&self) -> u8 {
        self.scale
    }

    pub fn resolve(&self, raw: i64) -> f64 {
        raw as f64 / f64::from(self.scale)
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("1/{}", self.scale))
    }
}

#[derive(Clone, Copy)]
#[repr(transparent)]
pub struct Access(u8);

impl serde::Serialize for Access {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl std::fmt::Display for Access {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(if self.0 & Self::R.0 == 0 { "-" } else { "R" })?;
        f.write_str(if self.0 & Self::W.0 == 0 { "-" } else { "W" })?;
        Ok(())
    }
}

impl Access {
    pub const R: Self = Self(1 << 0);
    pub const W: Self = Self(1 << 1);
    pub const RW: Self = Self(Self::R.0 | Self::W.0);
    const R_: Self = Self::R;

    pub const fn is_writable(&self) -> bool {
        self.0 & Self::W.0 != 0
    }
}

#[derive(Clone, Copy)]
pub struct RegisterIndex(usize);

impl RegisterIndex {
    pub fn from_key(key: &str) -> Option<RegisterIndex> {
        let index = KEYS.iter().position(|v| *v == key);
        index.map(Self)
    }

    pub fn key(&self) -> &'static str {
        KEYS[self.0]
    }

    pub fn data_type(&self) -> DataType {
        DATA_TYPES[self.0]
    }

    pub fn access(&self) -> Access {
        ACCESS[self.0]
    }

    pub fn minimum(&self) -> Option<i64> {
        MINIMUM_VALUES[self.0]
    }

    pub fn maximum(&self) -> Option<i64> {
        MAXIMUM_VALUES[self.0]
    }

    pub fn description(&self) -> &'static str {
        DESCRIPTIONS[self.0]
    }
}

macro_rules! for_each_register {
    ($m:ident) => {
        $m! {
            "H10510": CEL, R_, "Outside temperature, high resolution (wrap-around encoding above 1300)";
            "H10514": RAW, R_, "Interior sensor wiring (1 wall sensor, 0 duct sensor)", min = 0, max = 1;
            "H10515": RAW, R_, "Exterior reference source selection (1 roof sensor, 0 facade sensor)", min = 0, max = 1;
            "H10701": RAW, RW, "Program authority (0 manual, 1 weekly schedule, 2 temporary)", min = 0, max = 2;
            "H10705": RAW, RW, "Operating mode", min = 0, max = 19;
            "H10706": CEL, RW, "Requested temperature", min = 100, max = 400;
            "H10708": RAW, RW, "Requested power", min = 0, max = 100;
            "H10709": RAW, R_, "Live fan power";
            "H10710": CEL, RW, "Requested temperature, temporary program", min = 100, max = 400;
            "H10714": RAW, R_, "Requested power as reported by CP Touch controllers", min = 0, max = 100;
            "H11002": RAW, R_, "Filter change needed", min = 0, max = 1;
            "H11003": RAW, R_, "Filter wear", min = 0, max = 100;
            "H11705": RAW, RW, "Active zone selection", min = 0, max = 2;
            "I10200": CEL, R_, "Supply air temperature";
            "I10201": CEL, R_, "Exhaust air temperature";
            "I10202": CEL, R_, "Outside temperature";
            "I10203": CEL, R_, "Inside (duct) temperature";
            "I10204": CEL, R_, "Extract air temperature";
            "I10206": CEL, R_, "Outside temperature, facade sensor";
            "I10207": CEL, R_, "Inside temperature, wall sensor";
            "I10208": CEL, R_, "Inside temperature on compact units";
            "I10209": CEL, R_, "Outside temperature, roof sensor";
            "I10210": CEL, R_, "Supply air temperature on compact units";
            "I10211": CEL, R_, "Exhaust air temperature on compact units";
            "I10212": CEL, R_, "Extract air temperature on compact units";
            "I10215": RAW, R_, "CO2 concentration, ppm";
            "I10301": RAW, R_, "Digital input D1 active", min = 0, max = 1;
            "I10302": RAW, R_, "Digital input D2 active", min = 0, max = 1;
            "I10303": RAW, R_, "Digital input D3 active", min = 0, max = 1;
            "I10304": RAW, R_, "Digital input D4 active", min = 0, max = 1;
        }
    };
}

macro_rules! none_or {
    () => {
        None
    };
    ($v:literal) => {
        Some($v)
    };
}

macro_rules! define_tables {
    ($($key:literal : $dt:ident, $access:ident, $desc:literal
        $(, min = $min:literal)? $(, max = $max:literal)?;)*) => {
        pub static KEYS: &[&str] = &[$($key),*];
        pub static DATA_TYPES: &[DataType] = &[$(DataType::$dt),*];
        pub static ACCESS: &[Access] = &[$(Access::$access),*];
        pub static MINIMUM_VALUES: &[Option<i64>] = &[$(none_or!($($min)?)),*];
        pub static MAXIMUM_VALUES: &[Option<i64>] = &[$(none_or!($($max)?)),*];
        pub static DESCRIPTIONS: &[&str] = &[$($desc),*];
    };
}

for_each_register!(define_tables);

/// The scheduling authority that controls the unit.
///
/// Read from `H10701`. Whatever holds the program decides whether the user or
/// the weekly schedule picks the operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Program {
    Manual,
    Weekly,
    Temporary,
    /// A program value this crate does not know about. Kept verbatim so it can
    /// be displayed and written back unchanged.
    Unknown(i64),
}

impl Program {
    pub fn from_raw(raw: i64) -> Self {
        match raw {
            0 => Self::Manual,
            1 => Self::Weekly,
            2 => Self::Temporary,
            other => Self::Unknown(other),
        }
    }

    pub fn raw(&self) -> i64 {
        match self {
            Self::Manual => 0,
            Self::Weekly => 1,
            Self::Temporary => 2,
            Self::Unknown(raw) => *raw,
        }
    }
}

impl std::fmt::Display for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Manual => f.write_str("Manual"),
            Self::Weekly => f.write_str("Schedule"),
            Self::Temporary => f.write_str("Temporary"),
            Self::Unknown(raw) => f.write_fmt(format_args!("Unknown ({raw})")),
        }
    }
}

/// The operating mode, read from `H10705`.
///
/// The declaration order matters: preset labels are resolved positionally, so
/// the discriminants double as both the register value and the index into the
/// ordered preset label list.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    serde::Serialize,
    strum::FromRepr,
    strum::IntoStaticStr,
    strum::EnumString,
    strum::VariantNames,
)]
#[repr(u8)]
pub enum Mode {
    Off = 0,
    Automatic = 1,
    Ventilation = 2,
    #[strum(serialize = "Circulation and Ventilation")]
    CirculationAndVentilation = 3,
    Circulation = 4,
    #[strum(serialize = "Night precooling")]
    NightPrecooling = 5,
    Disbalance = 6,
    Overpressure = 7,
    #[strum(serialize = "Periodic ventilation")]
    Periodic = 8,
    Startup = 9,
    Rundown = 10,
    Defrosting = 11,
    External = 12,
    #[strum(serialize = "HP defrosting")]
    HpDefrosting = 13,
    IN1 = 14,
    IN2 = 15,
    D1 = 16,
    D2 = 17,
    D3 = 18,
    D4 = 19,
}

impl Mode {
    /// All preset labels, in register-value order.
    pub fn preset_labels() -> &'static [&'static str] {
        <Self as strum::VariantNames>::VARIANTS
    }

    /// Resolve a preset label to the mode at the same position in the ordered
    /// preset list.
    pub fn from_preset_label(label: &str) -> Option<Self> {
        label.parse().ok()
    }

    pub fn label(&self) -> &'static str {
        self.into()
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Mode::Off => "mdi:fan-off",
            Mode::Automatic => "mdi:fan",
            Mode::Ventilation => "mdi:fan-chevron-up",
            Mode::CirculationAndVentilation => "mdi:fan",
            Mode::Circulation => "mdi:fan-chevron-down",
            Mode::NightPrecooling => "mdi:fan-speed-1",
            Mode::Disbalance => "mdi:fan-speed-2",
            Mode::Overpressure => "mdi:fan-speed-3",
            Mode::Startup => "mdi:chevron-up",
            Mode::Rundown => "mdi:chevron-down",
            Mode::Defrosting => "mdi:car-defrost-rear",
            Mode::HpDefrosting => "mdi:car-defrost-front",
            Mode::External => "mdi:fan-alert",
            Mode::Periodic
            | Mode::IN1
            | Mode::IN2
            | Mode::D1
            | Mode::D2
            | Mode::D3
            | Mode::D4 => "mdi:fan-chevron-up",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
