//! Field declarations for the station configuration.
//!
//! Every persisted field has a fixed capacity (in bytes, including the
//! terminating NUL of the stored record), a semantic kind, a default and the
//! constraints the provisioning form enforces. The declared order of
//! [`FIELDS`] is the order of the persisted record.

use std::fmt;

/// Configuration record version tag. Changing it invalidates stored records.
pub const CONFIG_VERSION: &str = "0.04";

/// Maximum length of the version tag.
pub const CONFIG_VERSION_LEN: usize = 4;

/// Sentinel stored in a flag buffer when the flag is set.
pub const CB_SELECTED_STR: &str = "selected";

pub const STATION_NAME_LENGTH: usize = 21;
pub const AP_PASSWORD_LENGTH: usize = 33;
pub const WIFI_SSID_LENGTH: usize = 33;
pub const WIFI_PASSWORD_LENGTH: usize = 65;
pub const COORDINATE_LENGTH: usize = 10;
pub const TZ_LENGTH: usize = 49;
pub const MQTT_SERVER_LENGTH: usize = 31;
pub const MQTT_PORT_LENGTH: usize = 6;
pub const MQTT_USER_LENGTH: usize = 31;
pub const MQTT_PASS_LENGTH: usize = 31;
pub const BOARD_LENGTH: usize = 3;
pub const NUMBER_LEN: usize = 32;
pub const CHECKBOX_LENGTH: usize = 9;

pub const DEFAULT_STATION_NAME: &str = "My TinyGS";
pub const MQTT_DEFAULT_SERVER: &str = "mqtt.tinygs.com";
pub const MQTT_DEFAULT_PORT: &str = "8883";
pub const DEFAULT_OLED_BRIGHT: &str = "100";

/// Minimum AP password length accepted by the form (WPA2).
pub const MIN_AP_PASSWORD_LEN: usize = 8;

/// Semantic type of a field buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text.
    Text,
    /// Free text that is never echoed back to the form.
    Password,
    /// Decimal number.
    Float,
    /// Integer number.
    Integer,
    /// Integer chosen from a fixed option list (board selector).
    Select,
    /// Checkbox stored as [`CB_SELECTED_STR`] or empty.
    Flag,
}

/// Which part of the device a field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldGroup {
    /// Station identity.
    System,
    /// Credentials used to join the infrastructure network.
    Provisioning,
    /// Station location and time zone.
    Location,
    /// MQTT broker connection.
    Broker,
    /// Board selection and display.
    Board,
    /// Operational flags.
    Flags,
}

impl FieldGroup {
    /// Title shown above the group in the provisioning form.
    pub fn title(self) -> &'static str {
        match self {
            Self::System => "Station",
            Self::Provisioning => "Network",
            Self::Location => "Location",
            Self::Broker => "MQTT credentials",
            Self::Board => "Board config",
            Self::Flags => "Options",
        }
    }
}

/// Identifies a configuration field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldId {
    ThingName,
    ApPassword,
    WifiSsid,
    WifiPassword,
    Latitude,
    Longitude,
    Tz,
    MqttServer,
    MqttPort,
    MqttUser,
    MqttPass,
    Board,
    OledBright,
    AllowTx,
    RemoteTune,
    Telemetry3rd,
    TestMode,
    AutoUpdate,
}

/// Number of configuration fields.
pub const FIELD_COUNT: usize = 18;

impl FieldId {
    /// All fields in record order.
    pub const ALL: [FieldId; FIELD_COUNT] = [
        FieldId::ThingName,
        FieldId::ApPassword,
        FieldId::WifiSsid,
        FieldId::WifiPassword,
        FieldId::Latitude,
        FieldId::Longitude,
        FieldId::Tz,
        FieldId::MqttServer,
        FieldId::MqttPort,
        FieldId::MqttUser,
        FieldId::MqttPass,
        FieldId::Board,
        FieldId::OledBright,
        FieldId::AllowTx,
        FieldId::RemoteTune,
        FieldId::Telemetry3rd,
        FieldId::TestMode,
        FieldId::AutoUpdate,
    ];

    /// Position of this field in the record.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Static declaration of this field.
    pub fn spec(self) -> &'static FieldSpec {
        &FIELDS[self.index()]
    }

    /// Form key of this field.
    pub fn name(self) -> &'static str {
        self.spec().name
    }

    /// Look up a field by its form key.
    pub fn from_name(name: &str) -> Option<Self> {
        FIELDS.iter().find(|spec| spec.name == name).map(|spec| spec.id)
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Static declaration of one configuration field.
#[derive(Debug)]
pub struct FieldSpec {
    pub id: FieldId,
    /// Form key.
    pub name: &'static str,
    /// Human-readable label.
    pub label: &'static str,
    pub kind: FieldKind,
    pub group: FieldGroup,
    /// Buffer size in bytes including the terminating NUL.
    pub capacity: usize,
    pub default: &'static str,
    /// The form must submit a non-empty value.
    pub required: bool,
    /// Inclusive numeric range for `Float`, `Integer` and `Select` fields.
    pub range: Option<(f64, f64)>,
    /// Step hint for numeric inputs.
    pub step: Option<f64>,
}

impl FieldSpec {
    /// Longest text the buffer can hold.
    pub fn max_len(&self) -> usize {
        self.capacity - 1
    }
}

const fn field(
    id: FieldId,
    name: &'static str,
    label: &'static str,
    kind: FieldKind,
    group: FieldGroup,
    capacity: usize,
    default: &'static str,
) -> FieldSpec {
    FieldSpec {
        id,
        name,
        label,
        kind,
        group,
        capacity,
        default,
        required: false,
        range: None,
        step: None,
    }
}

const fn required(mut spec: FieldSpec) -> FieldSpec {
    spec.required = true;
    spec
}

const fn ranged(mut spec: FieldSpec, min: f64, max: f64, step: f64) -> FieldSpec {
    spec.range = Some((min, max));
    spec.step = Some(step);
    spec
}

/// Field declarations in record order.
pub static FIELDS: [FieldSpec; FIELD_COUNT] = [
    required(field(
        FieldId::ThingName,
        "thing_name",
        "Groundstation Name (will be seen on the map)",
        FieldKind::Text,
        FieldGroup::System,
        STATION_NAME_LENGTH,
        DEFAULT_STATION_NAME,
    )),
    field(
        FieldId::ApPassword,
        "ap_password",
        "Password for this dashboard",
        FieldKind::Password,
        FieldGroup::Provisioning,
        AP_PASSWORD_LENGTH,
        "",
    ),
    field(
        FieldId::WifiSsid,
        "wifi_ssid",
        "WiFi SSID",
        FieldKind::Text,
        FieldGroup::Provisioning,
        WIFI_SSID_LENGTH,
        "",
    ),
    field(
        FieldId::WifiPassword,
        "wifi_password",
        "WiFi password",
        FieldKind::Password,
        FieldGroup::Provisioning,
        WIFI_PASSWORD_LENGTH,
        "",
    ),
    required(ranged(
        field(
            FieldId::Latitude,
            "lat",
            "Latitude (will be public)",
            FieldKind::Float,
            FieldGroup::Location,
            COORDINATE_LENGTH,
            "",
        ),
        -90.0,
        90.0,
        0.001,
    )),
    required(ranged(
        field(
            FieldId::Longitude,
            "lng",
            "Longitude (will be public)",
            FieldKind::Float,
            FieldGroup::Location,
            COORDINATE_LENGTH,
            "",
        ),
        -180.0,
        180.0,
        0.001,
    )),
    field(
        FieldId::Tz,
        "tz",
        "Time Zone",
        FieldKind::Text,
        FieldGroup::Location,
        TZ_LENGTH,
        "",
    ),
    required(field(
        FieldId::MqttServer,
        "mqtt_server",
        "Server address",
        FieldKind::Text,
        FieldGroup::Broker,
        MQTT_SERVER_LENGTH,
        MQTT_DEFAULT_SERVER,
    )),
    required(ranged(
        field(
            FieldId::MqttPort,
            "mqtt_port",
            "Server Port",
            FieldKind::Integer,
            FieldGroup::Broker,
            MQTT_PORT_LENGTH,
            MQTT_DEFAULT_PORT,
        ),
        0.0,
        65535.0,
        1.0,
    )),
    required(field(
        FieldId::MqttUser,
        "mqtt_user",
        "MQTT Username",
        FieldKind::Text,
        FieldGroup::Broker,
        MQTT_USER_LENGTH,
        "",
    )),
    required(field(
        FieldId::MqttPass,
        "mqtt_pass",
        "MQTT Password",
        FieldKind::Password,
        FieldGroup::Broker,
        MQTT_PASS_LENGTH,
        "",
    )),
    ranged(
        field(
            FieldId::Board,
            "board",
            "Board type",
            FieldKind::Select,
            FieldGroup::Board,
            BOARD_LENGTH,
            "",
        ),
        0.0,
        (crate::board::NUM_BOARDS - 1) as f64,
        1.0,
    ),
    ranged(
        field(
            FieldId::OledBright,
            "oled_bright",
            "OLED Bright",
            FieldKind::Integer,
            FieldGroup::Board,
            NUMBER_LEN,
            DEFAULT_OLED_BRIGHT,
        ),
        0.0,
        100.0,
        1.0,
    ),
    field(
        FieldId::AllowTx,
        "tx",
        "Enable TX (HAM licence / no preamp)",
        FieldKind::Flag,
        FieldGroup::Flags,
        CHECKBOX_LENGTH,
        CB_SELECTED_STR,
    ),
    field(
        FieldId::RemoteTune,
        "remote_tune",
        "Allow Remote Tuning",
        FieldKind::Flag,
        FieldGroup::Flags,
        CHECKBOX_LENGTH,
        CB_SELECTED_STR,
    ),
    field(
        FieldId::Telemetry3rd,
        "telemetry3rd",
        "Allow third party telemetry (sat owners, satnogs...)",
        FieldKind::Flag,
        FieldGroup::Flags,
        CHECKBOX_LENGTH,
        CB_SELECTED_STR,
    ),
    field(
        FieldId::TestMode,
        "test",
        "Test mode",
        FieldKind::Flag,
        FieldGroup::Flags,
        CHECKBOX_LENGTH,
        "",
    ),
    field(
        FieldId::AutoUpdate,
        "auto_update",
        "Automatic Firmware Update",
        FieldKind::Flag,
        FieldGroup::Flags,
        CHECKBOX_LENGTH,
        CB_SELECTED_STR,
    ),
];

/// Total size of a persisted record in bytes (version tag, fields, CRC32).
pub fn record_len() -> usize {
    CONFIG_VERSION_LEN + FIELDS.iter().map(|spec| spec.capacity).sum::<usize>() + 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_order_matches_ids() {
        for (i, id) in FieldId::ALL.iter().enumerate() {
            assert_eq!(FIELDS[i].id, *id);
            assert_eq!(id.index(), i);
        }
    }

    #[test]
    fn test_defaults_fit_capacity() {
        for spec in FIELDS.iter() {
            assert!(
                spec.default.len() <= spec.max_len(),
                "default of {} exceeds capacity",
                spec.name
            );
        }
    }

    #[test]
    fn test_names_are_unique() {
        for spec in FIELDS.iter() {
            assert_eq!(FieldId::from_name(spec.name), Some(spec.id));
        }
        assert_eq!(FieldId::from_name("bogus"), None);
    }

    #[test]
    fn test_version_tag_fits() {
        assert!(CONFIG_VERSION.len() <= CONFIG_VERSION_LEN);
    }

    #[test]
    fn test_sentinel_fits_checkbox() {
        assert_eq!(CB_SELECTED_STR.len(), CHECKBOX_LENGTH - 1);
    }

    #[test]
    fn test_record_len() {
        let fields: usize = FIELDS.iter().map(|s| s.capacity).sum();
        assert_eq!(record_len(), 4 + fields + 4);
    }
}
