// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Camera layout configuration and the view to camera mapping.
//!
//! The configuration is a JSON document:
//!
//! ```json
//! {
//!   "display": { "width": 1280, "height": 720 },
//!   "cameras": [
//!     { "cameraId": "rear", "function": "reverse,park", "yaw": 180.0, "hflip": true }
//!   ]
//! }
//! ```
//!
//! A camera's `function` may name several views. Each hardware camera is
//! matched against the first entry whose `cameraId` is a substring of the
//! hardware id.

use crate::{
    camera::CameraDesc,
    error::{Error, Result},
    state::ViewState,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs::File, io::BufReader, path::Path};
use tracing::{debug, info, warn};

/// Placement and optics of one camera on the vehicle.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CameraInfo {
    pub camera_id: String,
    pub function: String,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub z: f32,
    #[serde(default)]
    pub yaw: f32,
    #[serde(default)]
    pub pitch: f32,
    #[serde(default)]
    pub roll: f32,
    #[serde(default)]
    pub hfov: f32,
    #[serde(default)]
    pub vfov: f32,
    #[serde(default)]
    pub hflip: bool,
    #[serde(default)]
    pub vflip: bool,
}

impl CameraInfo {
    /// Views this camera serves according to its function string.
    pub fn views(&self) -> Vec<ViewState> {
        let function = self.function.to_ascii_lowercase();
        [
            ("reverse", ViewState::Reverse),
            ("right", ViewState::Right),
            ("left", ViewState::Left),
            ("park", ViewState::Parking),
        ]
        .into_iter()
        .filter(|(keyword, _)| function.contains(keyword))
        .map(|(_, view)| view)
        .collect()
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub cameras: Vec<CameraInfo>,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let config: Config = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        info!(path = %path.display(), cameras = config.cameras.len(), "loaded configuration");
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects a zero sized display and cameras without an id.
    pub fn validate(&self) -> Result<()> {
        if self.display.width == 0 || self.display.height == 0 {
            return Err(Error::Config(format!(
                "display size {}x{} is empty",
                self.display.width, self.display.height
            )));
        }
        if let Some(i) = self.cameras.iter().position(|c| c.camera_id.is_empty()) {
            return Err(Error::Config(format!("camera entry {i} has no cameraId")));
        }
        Ok(())
    }

    /// Four camera layout used when no configuration file is given.
    pub fn surround() -> Self {
        let camera = |id: &str, function: &str, yaw: f32, hflip: bool| CameraInfo {
            camera_id: id.to_string(),
            function: function.to_string(),
            yaw,
            hfov: 170.0,
            vfov: 110.0,
            hflip,
            ..Default::default()
        };
        Self {
            display: DisplayConfig::default(),
            cameras: vec![
                camera("rear", "reverse,park", 180.0, true),
                camera("left", "left,park", 90.0, false),
                camera("right", "right,park", -90.0, false),
                camera("front", "front,park", 0.0, false),
            ],
        }
    }
}

/// A hardware camera paired with its configuration entry.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraEntry {
    pub info: CameraInfo,
    pub desc: CameraDesc,
}

/// Ordered cameras assigned to each view.
#[derive(Clone, Debug, Default)]
pub struct ViewMap {
    views: HashMap<ViewState, Vec<CameraEntry>>,
}

impl ViewMap {
    /// Assigns the cameras reported by the camera service to views.
    pub fn build(config: &Config, cameras: &[CameraDesc]) -> Self {
        let mut map = ViewMap::default();
        for desc in cameras {
            let Some(info) = config
                .cameras
                .iter()
                .find(|info| desc.id.contains(info.camera_id.as_str()))
            else {
                warn!(camera = %desc.id, "no configuration for hardware camera");
                continue;
            };
            for view in info.views() {
                debug!(camera = %desc.id, ?view, "camera assigned");
                map.push(
                    view,
                    CameraEntry {
                        info: info.clone(),
                        desc: desc.clone(),
                    },
                );
            }
        }
        map
    }

    pub fn push(&mut self, view: ViewState, entry: CameraEntry) {
        self.views.entry(view).or_default().push(entry);
    }

    pub fn cameras(&self, view: ViewState) -> &[CameraEntry] {
        self.views.get(&view).map(Vec::as_slice).unwrap_or(&[])
    }
}
