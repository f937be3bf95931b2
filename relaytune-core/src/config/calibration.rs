//! Gain calibration data types
//!
//! Stores autotune results per control loop so they can be persisted to
//! non-volatile storage and loaded on boot.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::types::MAX_LOOPS;
use crate::tuning::{PidGains, UltimateParams};

/// Magic number to identify valid calibration data
pub const CALIBRATION_MAGIC: u32 = 0x5254_4E47; // "RTNG"

/// Current calibration data version
pub const CALIBRATION_VERSION: u8 = 1;

/// Errors when loading or storing calibration data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationError {
    /// Buffer too small or serialization failed
    Encode,
    /// Bytes could not be deserialized
    Decode,
    /// Magic, version or CRC did not match
    Corrupt,
}

/// Gain calibration for a single control loop
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LoopCalibration {
    /// Loop index (0-based)
    pub loop_index: u8,
    /// Whether this calibration slot is valid
    pub valid: bool,
    /// Tuned gains
    pub gains: PidGains,
    /// Ultimate gain from autotune (for reference)
    pub ku: f32,
    /// Ultimate period from autotune in seconds (for reference)
    pub pu: f32,
}

impl LoopCalibration {
    /// Create a calibration entry from hand-entered gains
    pub const fn new(loop_index: u8, gains: PidGains) -> Self {
        Self {
            loop_index,
            valid: true,
            gains,
            ku: 0.0,
            pu: 0.0,
        }
    }

    /// Create from autotune result values
    pub const fn from_autotune(loop_index: u8, gains: PidGains, ultimate: UltimateParams) -> Self {
        Self {
            loop_index,
            valid: true,
            gains,
            ku: ultimate.ku,
            pu: ultimate.pu,
        }
    }

    /// Check if this calibration entry is valid
    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    /// Clear this calibration entry
    pub fn clear(&mut self) {
        self.valid = false;
        self.gains = PidGains::default();
        self.ku = 0.0;
        self.pu = 0.0;
    }
}

/// Complete calibration data stored in non-volatile memory
///
/// Contains calibration for every tuned loop with a header
/// for data validation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CalibrationData {
    /// Magic number for validation
    pub magic: u32,
    /// Data format version
    pub version: u8,
    /// Loop calibrations
    pub loops: [LoopCalibration; MAX_LOOPS],
    /// CRC32 checksum (calculated over magic..loops)
    pub crc: u32,
}

impl Default for CalibrationData {
    fn default() -> Self {
        Self::new()
    }
}

impl CalibrationData {
    /// Create empty calibration data
    pub const fn new() -> Self {
        Self {
            magic: CALIBRATION_MAGIC,
            version: CALIBRATION_VERSION,
            loops: [LoopCalibration {
                loop_index: 0,
                valid: false,
                gains: PidGains {
                    kp: 0.0,
                    ki: 0.0,
                    kd: 0.0,
                },
                ku: 0.0,
                pu: 0.0,
            }; MAX_LOOPS],
            crc: 0,
        }
    }

    /// Check if the header is valid (magic and version match)
    pub fn is_valid(&self) -> bool {
        self.magic == CALIBRATION_MAGIC && self.version == CALIBRATION_VERSION
    }

    /// Get calibration for a specific loop index
    pub fn get(&self, loop_index: u8) -> Option<&LoopCalibration> {
        self.loops
            .iter()
            .find(|l| l.valid && l.loop_index == loop_index)
    }

    /// Set calibration for a loop
    ///
    /// Replaces an existing entry for this loop or uses an empty slot.
    /// Returns false if no slots are available.
    pub fn set(&mut self, calibration: LoopCalibration) -> bool {
        if let Some(slot) = self
            .loops
            .iter_mut()
            .find(|l| l.valid && l.loop_index == calibration.loop_index)
        {
            *slot = calibration;
            return true;
        }

        if let Some(slot) = self.loops.iter_mut().find(|l| !l.valid) {
            *slot = calibration;
            return true;
        }

        false
    }

    /// Clear calibration for a specific loop
    pub fn clear_loop(&mut self, loop_index: u8) {
        for slot in &mut self.loops {
            if slot.loop_index == loop_index {
                slot.clear();
            }
        }
    }

    /// Calculate CRC32 for the data (excluding the crc field itself)
    pub fn calculate_crc(&self) -> u32 {
        let mut crc: u32 = 0xFFFF_FFFF;

        crc = crc32_update(crc, &self.magic.to_le_bytes());
        crc = crc32_update(crc, &[self.version]);

        for entry in &self.loops {
            crc = crc32_update(crc, &[entry.loop_index, entry.valid as u8]);
            crc = crc32_update(crc, &entry.gains.kp.to_le_bytes());
            crc = crc32_update(crc, &entry.gains.ki.to_le_bytes());
            crc = crc32_update(crc, &entry.gains.kd.to_le_bytes());
            crc = crc32_update(crc, &entry.ku.to_le_bytes());
            crc = crc32_update(crc, &entry.pu.to_le_bytes());
        }

        !crc
    }

    /// Update the CRC field
    pub fn update_crc(&mut self) {
        self.crc = self.calculate_crc();
    }

    /// Verify the CRC is correct
    pub fn verify_crc(&self) -> bool {
        self.crc == self.calculate_crc()
    }

    /// Serialize into `buf` with postcard, refreshing the CRC first
    ///
    /// Returns the used prefix of `buf`.
    #[cfg(feature = "serde")]
    pub fn encode<'a>(&mut self, buf: &'a mut [u8]) -> Result<&'a mut [u8], CalibrationError> {
        self.update_crc();
        postcard::to_slice(self, buf).map_err(|_| CalibrationError::Encode)
    }

    /// Deserialize from postcard bytes and validate header and CRC
    #[cfg(feature = "serde")]
    pub fn decode(bytes: &[u8]) -> Result<Self, CalibrationError> {
        let data: Self = postcard::from_bytes(bytes).map_err(|_| CalibrationError::Decode)?;
        if !data.is_valid() || !data.verify_crc() {
            return Err(CalibrationError::Corrupt);
        }
        Ok(data)
    }
}

/// CRC32 update (IEEE 802.3 polynomial, reflected)
fn crc32_update(crc: u32, data: &[u8]) -> u32 {
    const POLY: u32 = 0xEDB8_8320;
    let mut crc = crc;

    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
        }
    }

    crc
}
