use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Resolution bucket of an image, by long edge in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResolutionTier {
    #[serde(rename = "16K")]
    K16,
    #[serde(rename = "8K")]
    K8,
    #[serde(rename = "6K")]
    K6,
    #[serde(rename = "5K+")]
    K5Plus,
    #[serde(rename = "4K+")]
    K4Plus,
    #[serde(rename = "4K")]
    K4,
    #[serde(rename = "2K")]
    K2,
    #[serde(rename = "FHD")]
    Fhd,
    #[serde(rename = "HD")]
    Hd,
    #[serde(rename = "SD")]
    Sd,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown resolution tier: {0}")]
pub struct UnknownTier(pub String);

impl ResolutionTier {
    /// Highest tier first; a long edge belongs to the first tier it reaches.
    pub const ALL: [ResolutionTier; 10] = [
        ResolutionTier::K16,
        ResolutionTier::K8,
        ResolutionTier::K6,
        ResolutionTier::K5Plus,
        ResolutionTier::K4Plus,
        ResolutionTier::K4,
        ResolutionTier::K2,
        ResolutionTier::Fhd,
        ResolutionTier::Hd,
        ResolutionTier::Sd,
    ];

    pub fn min_edge(&self) -> u32 {
        match self {
            ResolutionTier::K16 => 15360,
            ResolutionTier::K8 => 7680,
            ResolutionTier::K6 => 5760,
            ResolutionTier::K5Plus => 5120,
            ResolutionTier::K4Plus => 4096,
            ResolutionTier::K4 => 3840,
            ResolutionTier::K2 => 2048,
            ResolutionTier::Fhd => 1920,
            ResolutionTier::Hd => 1280,
            ResolutionTier::Sd => 0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ResolutionTier::K16 => "16K",
            ResolutionTier::K8 => "8K",
            ResolutionTier::K6 => "6K",
            ResolutionTier::K5Plus => "5K+",
            ResolutionTier::K4Plus => "4K+",
            ResolutionTier::K4 => "4K",
            ResolutionTier::K2 => "2K",
            ResolutionTier::Fhd => "FHD",
            ResolutionTier::Hd => "HD",
            ResolutionTier::Sd => "SD",
        }
    }

    pub fn for_long_edge(edge: u32) -> Self {
        Self::ALL
            .into_iter()
            .find(|tier| edge >= tier.min_edge())
            .unwrap_or(ResolutionTier::Sd)
    }
}

impl fmt::Display for ResolutionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ResolutionTier {
    type Err = UnknownTier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        // Older settings stored the Chinese labels of the lower tiers.
        match trimmed {
            "超清" => return Ok(ResolutionTier::Fhd),
            "高清" => return Ok(ResolutionTier::Hd),
            "标清" => return Ok(ResolutionTier::Sd),
            _ => {}
        }
        Self::ALL
            .into_iter()
            .find(|tier| tier.label().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownTier(s.to_string()))
    }
}
