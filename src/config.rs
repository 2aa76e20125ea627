use std::fs;
use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::ViewerError;
use crate::input::KeyBindings;

/// Complete viewer configuration. Every section falls back to defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ViewerConfig {
    pub window: WindowConfig,
    pub camera: CameraConfig,
    pub car: CarConfig,
    pub projection: ProjectionConfig,
    pub models: ModelConfig,
    pub keys: KeyConfig,
}

impl ViewerConfig {
    /// Reads and validates a JSON configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ViewerError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ViewerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ViewerError> {
        let config: Self = serde_json::from_str(text)
            .map_err(|err| ViewerError::Config(format!("malformed JSON: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ViewerError> {
        let camera = &self.camera;
        if !(camera.move_speed > 0.0) || !(camera.sensitivity > 0.0) {
            return Err(ViewerError::Config(
                "camera move_speed and sensitivity must be positive".into(),
            ));
        }
        if !(camera.pitch_limit > 0.0 && camera.pitch_limit < 90.0) {
            return Err(ViewerError::Config(format!(
                "camera pitch_limit must lie in (0, 90) degrees, got {}",
                camera.pitch_limit
            )));
        }

        let car = &self.car;
        if !car.fixed_step.is_finite() || car.fixed_step <= 0.0 || !car.speed.is_finite() {
            return Err(ViewerError::Config(
                "car fixed_step must be positive and speed finite".into(),
            ));
        }
        if car.wrap_min >= car.wrap_max {
            return Err(ViewerError::Config(format!(
                "car wrap_min ({}) must be below wrap_max ({})",
                car.wrap_min, car.wrap_max
            )));
        }

        let projection = &self.projection;
        if !(projection.near > 0.0) || projection.far <= projection.near {
            return Err(ViewerError::Config(
                "projection requires 0 < near < far".into(),
            ));
        }
        if !(projection.fov_y > 0.0 && projection.fov_y < 180.0) {
            return Err(ViewerError::Config("projection fov_y out of range".into()));
        }

        KeyBindings::from_config(&self.keys)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Scene Viewer".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

/// Initial camera pose and navigation tuning. Angles are in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub move_speed: f32,
    pub sensitivity: f32,
    pub pitch_limit: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 1.8, 10.0),
            yaw: -90.0,
            pitch: 0.0,
            move_speed: 0.2,
            sensitivity: 0.1,
            pitch_limit: 45.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarConfig {
    pub start: Vec3,
    pub speed: f32,
    pub fixed_step: f32,
    pub wrap_min: f32,
    pub wrap_max: f32,
}

impl Default for CarConfig {
    fn default() -> Self {
        Self {
            start: Vec3::new(-50.0, 0.1, 0.0),
            speed: 1.0,
            fixed_step: 0.1,
            wrap_min: -50.0,
            wrap_max: 50.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    /// Vertical field of view in degrees.
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            fov_y: 45.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

/// Where decorative models are fetched from.
///
/// `directory` is a filesystem path natively and a base URL in the browser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub directory: String,
    pub tree: String,
    pub building: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            directory: ".".to_string(),
            tree: "arbol.json".to_string(),
            building: "edificio.json".to_string(),
        }
    }
}

/// Key names, parsed with [`crate::input::KeyCode::from_name`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    pub forward: String,
    pub back: String,
    pub left: String,
    pub right: String,
    pub stop: String,
    pub filled: String,
    pub wireframe: String,
    pub release_pointer: String,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            forward: "W".into(),
            back: "S".into(),
            left: "A".into(),
            right: "D".into(),
            stop: "Space".into(),
            filled: "1".into(),
            wireframe: "2".into(),
            release_pointer: "Escape".into(),
        }
    }
}
