use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};

/// Four-character code naming the compression format of a video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FourCc([u8; 4]);

impl FourCc {
    /// Unpack a tag stored as a little-endian `u32` (first character in the low byte).
    pub fn from_u32(value: u32) -> Self {
        Self(value.to_le_bytes())
    }

    /// True when every byte is zero, i.e. the container carries no tag.
    pub fn is_empty(self) -> bool {
        self.0 == [0; 4]
    }
}

impl FromStr for FourCc {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = s.as_bytes();
        if bytes.len() != 4 || !bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            bail!("fourcc must be exactly 4 printable ASCII characters, got {s:?}");
        }
        Ok(Self([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "[{b}]")?;
            }
        }
        Ok(())
    }
}
