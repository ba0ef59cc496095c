use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Browser viewport used for both environments of a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ViewportParseError {
    #[error("Invalid viewport format: expected WIDTHxHEIGHT (e.g., 1280x720)")]
    InvalidFormat,
    #[error("Invalid {axis}: {value}")]
    InvalidNumber { axis: &'static str, value: String },
    #[error("Viewport {0} must be positive")]
    Zero(&'static str),
}

fn parse_axis(axis: &'static str, raw: &str) -> Result<u32, ViewportParseError> {
    let value: u32 = raw
        .trim()
        .parse()
        .map_err(|_| ViewportParseError::InvalidNumber {
            axis,
            value: raw.to_string(),
        })?;
    if value == 0 {
        return Err(ViewportParseError::Zero(axis));
    }
    Ok(value)
}

impl FromStr for Viewport {
    type Err = ViewportParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or(ViewportParseError::InvalidFormat)?;
        if h.contains(['x', 'X']) {
            return Err(ViewportParseError::InvalidFormat);
        }
        Ok(Viewport {
            width: parse_axis("width", w)?,
            height: parse_axis("height", h)?,
        })
    }
}

impl std::fmt::Display for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_width_and_height() {
        let vp: Viewport = " 1920 x 1080 ".parse().unwrap();
        assert_eq!(vp, Viewport { width: 1920, height: 1080 });
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!("1280".parse::<Viewport>(), Err(ViewportParseError::InvalidFormat));
        assert_eq!(
            "1280x720x3".parse::<Viewport>(),
            Err(ViewportParseError::InvalidFormat)
        );
        assert!("abcx720".parse::<Viewport>().is_err());
        assert_eq!("0x720".parse::<Viewport>(), Err(ViewportParseError::Zero("width")));
    }

    #[test]
    fn default_matches_capture_viewport() {
        assert_eq!(Viewport::default().to_string(), "1280x720");
    }
}
