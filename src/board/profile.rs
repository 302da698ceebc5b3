//! Board hardware profiles.
//!
//! Each supported board is described by an immutable [`BoardProfile`]. The
//! profiles are built once into a [`BoardTable`] indexed by [`BoardId`].
//!
//! # Out-of-range policy
//!
//! [`BoardTable::resolve`] rejects an index outside `0..NUM_BOARDS` with
//! [`BoardError::OutOfRange`]. Accessors that must always produce a board
//! (the configuration store) fall back to [`DEFAULT_BOARD`] and log a warning.

use std::fmt;

/// Number of supported boards.
pub const NUM_BOARDS: usize = 10;

/// Board used when the stored selection is out of range.
pub const DEFAULT_BOARD: BoardId = BoardId::HeltecV1;

/// OLED controller I2C address shared by all supported boards.
const OLED_ADDRESS: u8 = 0x3c;

/// Supported board variants, in table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(not(target_os = "espidf"), derive(serde::Serialize))]
pub enum BoardId {
    HeltecV1 = 0,
    HeltecV2,
    TtgoV1,
    TtgoV2,
    TbeamOled,
    Esp32Sx126xXtal,
    TtgoV2Sx126xXtal,
    Esp32Sx126xTcxo1,
    Esp32Sx126xTcxo2,
    TbeamOledV1_0,
}

impl BoardId {
    /// All boards in table order.
    pub const ALL: [BoardId; NUM_BOARDS] = [
        BoardId::HeltecV1,
        BoardId::HeltecV2,
        BoardId::TtgoV1,
        BoardId::TtgoV2,
        BoardId::TbeamOled,
        BoardId::Esp32Sx126xXtal,
        BoardId::TtgoV2Sx126xXtal,
        BoardId::Esp32Sx126xTcxo1,
        BoardId::Esp32Sx126xTcxo2,
        BoardId::TbeamOledV1_0,
    ];

    /// Convert a decoded selector into a board, if in range.
    pub fn from_index(index: i64) -> Option<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i))
            .copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// LoRa radio chip family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(not(target_os = "espidf"), derive(serde::Serialize))]
pub enum RadioFamily {
    Sx127x,
    Sx126x,
}

/// OLED display wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(not(target_os = "espidf"), derive(serde::Serialize))]
pub struct DisplayPins {
    /// I2C address of the display controller.
    pub address: u8,
    pub sda: u8,
    pub scl: u8,
    pub reset: u8,
}

/// Radio wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(not(target_os = "espidf"), derive(serde::Serialize))]
pub struct RadioPins {
    /// Chip select (NSS).
    pub nss: u8,
    pub dio0: u8,
    pub dio1: u8,
    /// Busy line (SX126x only, 0 when unused).
    pub busy: u8,
    pub reset: u8,
    pub miso: u8,
    pub mosi: u8,
    pub sck: u8,
}

/// Immutable description of one supported board.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(not(target_os = "espidf"), derive(serde::Serialize))]
pub struct BoardProfile {
    pub id: BoardId,
    pub display: DisplayPins,
    pub prog_button: u8,
    pub led: u8,
    pub radio_family: RadioFamily,
    pub radio: RadioPins,
    /// TCXO supply voltage; `0.0` for boards with a plain crystal.
    pub tcxo_voltage: f32,
    pub label: &'static str,
}

impl BoardProfile {
    /// Whether the radio is an SX127x.
    pub fn is_sx127x(&self) -> bool {
        self.radio_family == RadioFamily::Sx127x
    }
}

#[allow(clippy::too_many_arguments)]
fn profile(
    id: BoardId,
    (sda, scl, oled_rst): (u8, u8, u8),
    prog_button: u8,
    led: u8,
    radio_family: RadioFamily,
    (nss, dio0, dio1, busy, reset): (u8, u8, u8, u8, u8),
    (miso, mosi, sck): (u8, u8, u8),
    tcxo_voltage: f32,
    label: &'static str,
) -> BoardProfile {
    BoardProfile {
        id,
        display: DisplayPins {
            address: OLED_ADDRESS,
            sda,
            scl,
            reset: oled_rst,
        },
        prog_button,
        led,
        radio_family,
        radio: RadioPins {
            nss,
            dio0,
            dio1,
            busy,
            reset,
            miso,
            mosi,
            sck,
        },
        tcxo_voltage,
        label,
    }
}

/// Immutable table of all board profiles.
#[derive(Debug, Clone)]
pub struct BoardTable {
    boards: [BoardProfile; NUM_BOARDS],
}

impl BoardTable {
    /// Build the table from the compiled-in pin maps.
    pub fn build() -> Self {
        use RadioFamily::{Sx126x, Sx127x};

        Self {
            boards: [
                profile(
                    BoardId::HeltecV1,
                    (4, 15, 16),
                    0,
                    25,
                    Sx127x,
                    (18, 26, 12, 0, 14),
                    (19, 27, 5),
                    0.0,
                    "HELTEC WiFi LoRA 32 V1",
                ),
                profile(
                    BoardId::HeltecV2,
                    (4, 15, 16),
                    0,
                    25,
                    Sx127x,
                    (18, 26, 35, 0, 14),
                    (19, 27, 5),
                    0.0,
                    "HELTEC WiFi LoRA 32 V2",
                ),
                profile(
                    BoardId::TtgoV1,
                    (4, 15, 16),
                    0,
                    2,
                    Sx127x,
                    (18, 26, 0, 0, 14),
                    (19, 27, 5),
                    0.0,
                    "TTGO LoRa 32 v1",
                ),
                profile(
                    BoardId::TtgoV2,
                    (21, 22, 16),
                    0,
                    22,
                    Sx127x,
                    (18, 26, 33, 0, 14),
                    (19, 27, 5),
                    0.0,
                    "TTGO LoRA 32 v2",
                ),
                profile(
                    BoardId::TbeamOled,
                    (21, 22, 16),
                    39,
                    22,
                    Sx127x,
                    (18, 26, 33, 0, 14),
                    (19, 27, 5),
                    0.0,
                    "TTGO T-BEAM + OLED",
                ),
                profile(
                    BoardId::Esp32Sx126xXtal,
                    (21, 22, 16),
                    0,
                    2,
                    Sx126x,
                    (5, 0, 27, 26, 14),
                    (19, 23, 18),
                    0.0,
                    "Custom ESP32 Wroom + SX126x (Crystal)",
                ),
                profile(
                    BoardId::TtgoV2Sx126xXtal,
                    (21, 22, 16),
                    0,
                    22,
                    Sx126x,
                    (18, 0, 33, 32, 14),
                    (19, 27, 5),
                    0.0,
                    "TTGO LoRa 32 V2 Modified with module SX126x (crystal)",
                ),
                profile(
                    BoardId::Esp32Sx126xTcxo1,
                    (21, 22, 16),
                    0,
                    2,
                    Sx126x,
                    (5, 0, 2, 13, 26),
                    (19, 23, 18),
                    1.6,
                    "Custom ESP32 Wroom + SX126x DRF1268T TCXO (5, 2, 26, 13)",
                ),
                profile(
                    BoardId::Esp32Sx126xTcxo2,
                    (21, 22, 16),
                    0,
                    2,
                    Sx126x,
                    (5, 0, 26, 12, 14),
                    (19, 23, 18),
                    1.6,
                    "Custom ESP32 Wroom + SX126x DRF1268T TCXO (5, 26, 14, 12)",
                ),
                profile(
                    BoardId::TbeamOledV1_0,
                    (21, 22, 16),
                    38,
                    22,
                    Sx127x,
                    (18, 26, 33, 0, 23),
                    (19, 27, 5),
                    0.0,
                    "TTGO T-BEAM V1.0 + OLED",
                ),
            ],
        }
    }

    /// Resolve a decoded board selector.
    ///
    /// Indices outside `0..NUM_BOARDS` are rejected.
    pub fn resolve(&self, index: i64) -> Result<&BoardProfile, BoardError> {
        BoardId::from_index(index)
            .map(|id| self.get(id))
            .ok_or(BoardError::OutOfRange { index })
    }

    /// Profile of a known board.
    pub fn get(&self, id: BoardId) -> &BoardProfile {
        &self.boards[id.index()]
    }

    /// Iterate profiles in table order.
    pub fn iter(&self) -> impl Iterator<Item = &BoardProfile> {
        self.boards.iter()
    }

    pub fn len(&self) -> usize {
        self.boards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boards.is_empty()
    }
}

impl Default for BoardTable {
    fn default() -> Self {
        Self::build()
    }
}

/// Board lookup errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardError {
    /// Selector outside `0..NUM_BOARDS`.
    OutOfRange { index: i64 },
}

impl fmt::Display for BoardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange { index } => write!(
                f,
                "board index {} out of range (0..{})",
                index, NUM_BOARDS
            ),
        }
    }
}

impl std::error::Error for BoardError {}
