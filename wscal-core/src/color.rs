//! Supported event colors.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CalendarError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SupportedColor {
    Red,
    #[default]
    Blue,
    Green,
    Yellow,
    Orange,
    Purple,
    Pink,
    Indigo,
    Cyan,
    Gray,
}

impl SupportedColor {
    pub const ALL: [SupportedColor; 10] = [
        SupportedColor::Red,
        SupportedColor::Blue,
        SupportedColor::Green,
        SupportedColor::Yellow,
        SupportedColor::Orange,
        SupportedColor::Purple,
        SupportedColor::Pink,
        SupportedColor::Indigo,
        SupportedColor::Cyan,
        SupportedColor::Gray,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SupportedColor::Red => "RED",
            SupportedColor::Blue => "BLUE",
            SupportedColor::Green => "GREEN",
            SupportedColor::Yellow => "YELLOW",
            SupportedColor::Orange => "ORANGE",
            SupportedColor::Purple => "PURPLE",
            SupportedColor::Pink => "PINK",
            SupportedColor::Indigo => "INDIGO",
            SupportedColor::Cyan => "CYAN",
            SupportedColor::Gray => "GRAY",
        }
    }

    /// Map a Google Calendar `colorId` to the closest supported color.
    pub fn from_google_color_id(id: &str) -> Option<Self> {
        let color = match id {
            "1" => SupportedColor::Indigo,  // Lavender
            "2" => SupportedColor::Green,   // Sage
            "3" => SupportedColor::Purple,  // Grape
            "4" => SupportedColor::Pink,    // Flamingo
            "5" => SupportedColor::Yellow,  // Banana
            "6" => SupportedColor::Orange,  // Tangerine
            "7" => SupportedColor::Cyan,    // Peacock
            "8" => SupportedColor::Gray,    // Graphite
            "9" => SupportedColor::Blue,    // Blueberry
            "10" => SupportedColor::Green,  // Basil
            "11" => SupportedColor::Red,    // Tomato
            _ => return None,
        };
        Some(color)
    }

    /// The Google Calendar `colorId` that maps back to this color.
    pub fn google_color_id(&self) -> &'static str {
        match self {
            SupportedColor::Indigo => "1",
            SupportedColor::Purple => "3",
            SupportedColor::Pink => "4",
            SupportedColor::Yellow => "5",
            SupportedColor::Orange => "6",
            SupportedColor::Cyan => "7",
            SupportedColor::Gray => "8",
            SupportedColor::Blue => "9",
            SupportedColor::Green => "10",
            SupportedColor::Red => "11",
        }
    }

    /// Resolve a color reported by the provider: a color name or a Google `colorId`.
    /// Anything unrecognised falls back to the default color.
    pub fn from_provider(value: Option<&str>) -> Self {
        value
            .and_then(|v| {
                v.parse::<Self>()
                    .ok()
                    .or_else(|| Self::from_google_color_id(v.trim()))
            })
            .unwrap_or_default()
    }
}

impl FromStr for SupportedColor {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| CalendarError::Validation(format!("Unsupported color '{s}'")))
    }
}

impl fmt::Display for SupportedColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("red".parse::<SupportedColor>().unwrap(), SupportedColor::Red);
        assert_eq!(" Gray ".parse::<SupportedColor>().unwrap(), SupportedColor::Gray);
        assert!("magenta".parse::<SupportedColor>().is_err());
    }

    #[test]
    fn provider_colors_accept_names_and_google_ids() {
        assert_eq!(SupportedColor::from_provider(Some("PINK")), SupportedColor::Pink);
        assert_eq!(SupportedColor::from_provider(Some("11")), SupportedColor::Red);
        assert_eq!(SupportedColor::from_provider(Some("99")), SupportedColor::Blue);
        assert_eq!(SupportedColor::from_provider(None), SupportedColor::Blue);
    }

    #[test]
    fn google_color_ids_map_back() {
        for color in SupportedColor::ALL {
            assert_eq!(
                SupportedColor::from_google_color_id(color.google_color_id()),
                Some(color)
            );
        }
    }

    #[test]
    fn serializes_as_screaming_case() {
        let json = serde_json::to_string(&SupportedColor::Indigo).unwrap();
        assert_eq!(json, "\"INDIGO\"");
    }
}
