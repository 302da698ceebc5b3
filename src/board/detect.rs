//! Board auto-detection.
//!
//! On first boot no board is selected. Every supported board wires its OLED
//! to a known I2C bus, so the board is identified by probing each candidate
//! bus for the display controller and picking the first that acknowledges.

use super::profile::{BoardId, BoardTable, DisplayPins};
use log::{debug, info};

/// Access to the display bus for probing.
pub trait DisplayProbe {
    /// Return `true` if a device acknowledges `pins.address` on the bus
    /// formed by `pins.sda` / `pins.scl`.
    fn probe(&mut self, pins: &DisplayPins) -> bool;
}

impl<F> DisplayProbe for F
where
    F: FnMut(&DisplayPins) -> bool,
{
    fn probe(&mut self, pins: &DisplayPins) -> bool {
        self(pins)
    }
}

/// Find the first board whose display answers the probe.
pub fn detect_board(table: &BoardTable, probe: &mut impl DisplayProbe) -> Option<BoardId> {
    for board in table.iter() {
        debug!(
            "[board] Probing 0x{:02x} on SDA {} / SCL {} for {}",
            board.display.address, board.display.sda, board.display.scl, board.label
        );
        if probe.probe(&board.display) {
            info!("[board] Detected {}", board.label);
            return Some(board.id);
        }
    }
    info!("[board] No display answered, board left unselected");
    None
}
