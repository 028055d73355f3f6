// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Card number formats used by print-release card readers.
//
// Readers report the card UID as a hex string.  Sites store card numbers in
// whatever form their directory uses, so the reading is re-rendered into the
// site's canonical form before it is looked up.

use serde::{Deserialize, Serialize};

use crate::error::{ProxyPrintError, Result};

/// Radix of the canonical card number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardRadix {
    Hex,
    Decimal,
}

/// Byte order of the raw reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardByteOrder {
    /// First byte read is the least significant.
    Lsb,
    /// First byte read is the most significant.
    Msb,
}

/// How raw card readings are turned into canonical card numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardNumberFormat {
    pub radix: CardRadix,
    pub byte_order: CardByteOrder,
}

impl Default for CardNumberFormat {
    fn default() -> Self {
        Self {
            radix: CardRadix::Hex,
            byte_order: CardByteOrder::Msb,
        }
    }
}

impl CardNumberFormat {
    pub fn new(radix: CardRadix, byte_order: CardByteOrder) -> Self {
        Self { radix, byte_order }
    }

    /// Render a raw hex reading in canonical form.
    ///
    /// Hex output is upper-case with the most significant byte first.
    /// Decimal output supports readings of at most eight bytes.
    pub fn normalize(&self, raw: &str) -> Result<String> {
        let invalid = |why: &str| ProxyPrintError::Config(format!("card number {raw:?}: {why}"));
        let digits: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
        if digits.is_empty() {
            return Err(invalid("empty"));
        }
        if digits.len() % 2 != 0 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid("not a whole number of hex bytes"));
        }

        let mut bytes: Vec<u8> = (0..digits.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&digits[i..i + 2], 16))
            .collect::<std::result::Result<_, _>>()
            .map_err(|_| invalid("not hex"))?;

        if self.byte_order == CardByteOrder::Lsb {
            bytes.reverse();
        }

        match self.radix {
            CardRadix::Hex => Ok(bytes.iter().map(|b| format!("{b:02X}")).collect()),
            CardRadix::Decimal => {
                if bytes.len() > 8 {
                    return Err(invalid("too long for decimal form"));
                }
                let value = bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
                Ok(value.to_string())
            }
        }
    }
}
