use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::error::AppError;

/// Vertical placement of the overlay text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextPosition {
    Top,
    Center,
    #[default]
    Bottom,
}

impl TextPosition {
    /// Fraction of the surface height where the main line is centered.
    pub fn anchor_fraction(self) -> f32 {
        match self {
            TextPosition::Top => 0.13,
            TextPosition::Center => 0.5,
            TextPosition::Bottom => 0.87,
        }
    }
}

impl Display for TextPosition {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TextPosition::Top => write!(f, "top"),
            TextPosition::Center => write!(f, "center"),
            TextPosition::Bottom => write!(f, "bottom"),
        }
    }
}

impl FromStr for TextPosition {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "top" => Ok(TextPosition::Top),
            "center" | "middle" => Ok(TextPosition::Center),
            "bottom" => Ok(TextPosition::Bottom),
            _ => Err(anyhow::anyhow!("Invalid text position: {}", s)),
        }
    }
}

fn default_color() -> String {
    "#ffffff".to_string()
}

fn default_font_family() -> String {
    "default".to_string()
}

/// Overlay text entered by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSpec {
    #[serde(default)]
    pub name1: String,
    #[serde(default)]
    pub name2: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub position: TextPosition,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_font_family")]
    pub font_family: String,
}

impl TextSpec {
    pub fn new(name1: impl Into<String>, name2: impl Into<String>) -> Self {
        Self {
            name1: name1.into(),
            name2: name2.into(),
            subtitle: None,
            position: TextPosition::default(),
            color: default_color(),
            font_family: default_font_family(),
        }
    }

    pub fn with_subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    pub fn with_position(mut self, position: TextPosition) -> Self {
        self.position = position;
        self
    }

    /// Trims every field and returns `None` when no name was entered,
    /// meaning "no overlay".
    pub fn normalized(self) -> Option<Self> {
        let name1 = self.name1.trim().to_string();
        let name2 = self.name2.trim().to_string();
        if name1.is_empty() && name2.is_empty() {
            return None;
        }
        let subtitle = self
            .subtitle
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Some(Self {
            name1,
            name2,
            subtitle,
            ..self
        })
    }

    /// Parses `color` as `#rgb`, `#rrggbb` or `#rrggbbaa`.
    pub fn rgba(&self) -> Result<[u8; 4], AppError> {
        parse_hex_color(&self.color)
    }
}

pub fn parse_hex_color(value: &str) -> Result<[u8; 4], AppError> {
    let hex = value.trim().trim_start_matches('#');
    let invalid = || AppError::InvalidInput(format!("Invalid color: {}", value));
    let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| invalid());
    if !hex.is_ascii() {
        return Err(invalid());
    }

    match hex.len() {
        3 => {
            let mut out = [255u8; 4];
            for (i, c) in hex.chars().enumerate() {
                let v = c.to_digit(16).ok_or_else(invalid)? as u8;
                out[i] = v * 17;
            }
            Ok(out)
        }
        6 => Ok([
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
            255,
        ]),
        8 => Ok([
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
            channel(&hex[6..8])?,
        ]),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_drops_empty_names() {
        assert!(TextSpec::new("  ", "").normalized().is_none());
        let spec = TextSpec::new(" Ana ", "")
            .with_subtitle("   ")
            .normalized()
            .unwrap();
        assert_eq!(spec.name1, "Ana");
        assert_eq!(spec.subtitle, None);
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#fff").unwrap(), [255, 255, 255, 255]);
        assert_eq!(parse_hex_color("#102030").unwrap(), [16, 32, 48, 255]);
        assert_eq!(parse_hex_color("10203080").unwrap(), [16, 32, 48, 128]);
        assert!(parse_hex_color("#12").is_err());
        assert!(parse_hex_color("#gggggg").is_err());
    }

    #[test]
    fn test_text_position_anchor() {
        assert_eq!(TextPosition::Top.anchor_fraction(), 0.13);
        assert_eq!(TextPosition::Bottom.anchor_fraction(), 0.87);
        assert_eq!(
            "middle".parse::<TextPosition>().unwrap(),
            TextPosition::Center
        );
    }

    #[test]
    fn test_text_spec_deserialize_defaults() {
        let spec: TextSpec = serde_json::from_str(r#"{"name1":"Ana"}"#).unwrap();
        assert_eq!(spec.color, "#ffffff");
        assert_eq!(spec.position, TextPosition::Bottom);
        assert_eq!(spec.name2, "");
    }
}
