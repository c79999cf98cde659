use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Supported print aspect ratios (width : height).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "3:4")]
    ThreeByFour,
    #[serde(rename = "5:7")]
    FiveBySeven,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 2] = [AspectRatio::ThreeByFour, AspectRatio::FiveBySeven];

    /// Width divided by height.
    pub fn value(self) -> f64 {
        match self {
            AspectRatio::ThreeByFour => 3.0 / 4.0,
            AspectRatio::FiveBySeven => 5.0 / 7.0,
        }
    }

    /// Product size label sent to the post-process endpoint.
    pub fn size_label(self) -> &'static str {
        match self {
            AspectRatio::ThreeByFour => "3x4",
            AspectRatio::FiveBySeven => "5x7",
        }
    }
}

impl Display for AspectRatio {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            AspectRatio::ThreeByFour => write!(f, "3:4"),
            AspectRatio::FiveBySeven => write!(f, "5:7"),
        }
    }
}

impl FromStr for AspectRatio {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "3:4" | "3/4" | "3x4" => Ok(AspectRatio::ThreeByFour),
            "5:7" | "5/7" | "5x7" => Ok(AspectRatio::FiveBySeven),
            _ => Err(anyhow::anyhow!("Unsupported aspect ratio: {}", s)),
        }
    }
}

/// A crop rectangle in source-image pixel coordinates.
///
/// `source_width`/`source_height` record the size of the image the crop was
/// made on, so the rectangle can be mapped onto a differently-sized remote
/// result later.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CropSpec {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub source_width: u32,
    pub source_height: u32,
    pub ratio: AspectRatio,
}

impl CropSpec {
    /// Actual width/height ratio of the rectangle.
    pub fn aspect(&self) -> f64 {
        if self.height == 0.0 {
            0.0
        } else {
            self.width / self.height
        }
    }

    /// Whether the rectangle lies inside its source image.
    pub fn is_within_source(&self) -> bool {
        const EPS: f64 = 1e-6;
        self.x >= -EPS
            && self.y >= -EPS
            && self.x + self.width <= self.source_width as f64 + EPS
            && self.y + self.height <= self.source_height as f64 + EPS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_ratio_parse() {
        assert_eq!(
            "3:4".parse::<AspectRatio>().unwrap(),
            AspectRatio::ThreeByFour
        );
        assert_eq!(
            " 5/7 ".parse::<AspectRatio>().unwrap(),
            AspectRatio::FiveBySeven
        );
        assert!("16:9".parse::<AspectRatio>().is_err());
        assert!("4:5".parse::<AspectRatio>().is_err());
        assert!("1:1".parse::<AspectRatio>().is_err());
    }

    #[test]
    fn test_aspect_ratio_display_roundtrips_through_serde() {
        let json = serde_json::to_string(&AspectRatio::FiveBySeven).unwrap();
        assert_eq!(json, "\"5:7\"");
        assert_eq!(AspectRatio::FiveBySeven.to_string(), "5:7");
    }

    #[test]
    fn test_crop_spec_within_source() {
        let crop = CropSpec {
            x: 100.0,
            y: 0.0,
            width: 300.0,
            height: 400.0,
            source_width: 600,
            source_height: 400,
            ratio: AspectRatio::ThreeByFour,
        };
        assert!(crop.is_within_source());
        assert!((crop.aspect() - 0.75).abs() < 1e-9);

        let outside = CropSpec { x: 400.0, ..crop };
        assert!(!outside.is_within_source());
    }
}
