use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::GiError;

/// Tunables consumed by the cone tracer. All of them can change between frames
/// without re-voxelizing.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingParams {
    pub indirect_multiplier: f32,
    pub direct_multiplier: f32,
    pub specular_multiplier: f32,
    pub occlusion_multiplier: f32,
    // fraction of the cone diameter advanced per step, < 1 oversamples
    pub cone_step_size: f32,
    pub bump_intensity: f32,
}

impl Default for LightingParams {
    fn default() -> LightingParams {
        LightingParams {
            indirect_multiplier: 1.0,
            direct_multiplier: 1.0,
            specular_multiplier: 1.0,
            occlusion_multiplier: 1.0,
            cone_step_size: 0.5,
            bump_intensity: 1.0,
        }
    }
}

/// Settings for the demo's preview and debug images.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub width: u32,
    pub height: u32,
    pub threads: usize,
    pub debug_mip: f32,
}

impl Default for PreviewConfig {
    fn default() -> PreviewConfig {
        PreviewConfig {
            width: 320,
            height: 240,
            threads: 8,
            debug_mip: 0.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GiConfig {
    // voxels per side of the grid, fixed for the lifetime of a GiSystem
    pub resolution: u32,
    // half-extent of the world cube covered by the grid
    pub scene_scale: f32,
    pub lighting: LightingParams,
    pub preview: PreviewConfig,
}

impl Default for GiConfig {
    fn default() -> GiConfig {
        GiConfig {
            resolution: 64,
            scene_scale: 3000.0,
            lighting: LightingParams::default(),
            preview: PreviewConfig::default(),
        }
    }
}

impl GiConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<GiConfig, GiError> {
        let text = std::fs::read_to_string(path)?;
        GiConfig::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<GiConfig, GiError> {
        let config: GiConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), GiError> {
        if self.resolution == 0 || !self.resolution.is_power_of_two() {
            return Err(GiError::InvalidResolution(self.resolution));
        }
        if !(self.scene_scale.is_finite() && self.scene_scale > 0.0) {
            return Err(GiError::InvalidSceneScale(self.scene_scale));
        }
        self.lighting.validate()?;
        if self.preview.width == 0 || self.preview.height == 0 {
            return Err(GiError::InvalidParameter {
                name: "preview.width/height",
                reason: "preview image must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

impl LightingParams {
    pub fn validate(&self) -> Result<(), GiError> {
        if !(self.cone_step_size.is_finite() && self.cone_step_size > 0.0) {
            return Err(GiError::InvalidParameter {
                name: "cone_step_size",
                reason: format!("{} is not a positive step", self.cone_step_size),
            });
        }
        let multipliers = [
            ("indirect_multiplier", self.indirect_multiplier),
            ("direct_multiplier", self.direct_multiplier),
            ("specular_multiplier", self.specular_multiplier),
            ("occlusion_multiplier", self.occlusion_multiplier),
            ("bump_intensity", self.bump_intensity),
        ];
        for (name, value) in multipliers {
            if !value.is_finite() {
                return Err(GiError::InvalidParameter {
                    name,
                    reason: format!("{value} is not finite"),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_json_gives_defaults() {
        let config = GiConfig::from_json("{}").unwrap();
        assert_eq!(config, GiConfig::default());
    }

    #[test]
    fn partial_lighting_section_keeps_other_defaults() {
        let config =
            GiConfig::from_json(r#"{ "resolution": 32, "lighting": { "cone_step_size": 0.25 } }"#)
                .unwrap();
        assert_eq!(config.resolution, 32);
        assert_eq!(config.lighting.cone_step_size, 0.25);
        assert_eq!(config.lighting.indirect_multiplier, 1.0);
    }

    #[test]
    fn rejects_non_power_of_two_resolution() {
        let err = GiConfig::from_json(r#"{ "resolution": 48 }"#).unwrap_err();
        assert!(matches!(err, GiError::InvalidResolution(48)));
    }

    #[test]
    fn rejects_bad_scale_and_step() {
        let err = GiConfig::from_json(r#"{ "scene_scale": -1.0 }"#).unwrap_err();
        assert!(matches!(err, GiError::InvalidSceneScale(_)));

        let err = GiConfig::from_json(r#"{ "lighting": { "cone_step_size": 0.0 } }"#).unwrap_err();
        assert!(matches!(
            err,
            GiError::InvalidParameter {
                name: "cone_step_size",
                ..
            }
        ));
    }
}
