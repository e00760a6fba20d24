// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Error type shared by every component of the view pipeline.
//!
//! Errors fall into three groups which callers treat differently:
//!
//! - **Protocol violations** ([`Error::ProtocolViolation`]) are caller bugs,
//!   such as pulling a second frame from a [`StreamHandler`] before returning
//!   the first. The operation is refused and nothing else changes.
//! - **Transient failures** (camera, display, configuration and stream
//!   errors) degrade the affected feature but the control loop keeps going.
//! - **Fatal failures** ([`Error::is_fatal`]) stop the control loop so the
//!   surrounding process can restart the pipeline.
//!
//! [`StreamHandler`]: crate::stream::StreamHandler

use crate::{image::FourCC, vehicle::StatusCode, vehicle::VehicleProperty};
use thiserror::Error;

/// Convenience alias for results using the pipeline error type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("stream error: {0}")]
    Stream(String),

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("camera error: {0}")]
    Camera(String),

    #[error("display error: {0}")]
    Display(String),

    #[error("vehicle property {property:?} unavailable ({status:?})")]
    Vehicle {
        property: VehicleProperty,
        status: StatusCode,
    },

    #[error("render error: {0}")]
    Render(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported pixel format {0}")]
    UnsupportedFormat(FourCC),
}

impl Error {
    /// Returns true when the control loop cannot safely continue after this
    /// error.
    ///
    /// The gear selection is mandatory for choosing a view and a failed draw
    /// leaves the render state unknown, so both terminate the loop.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Render(_)
                | Error::Vehicle {
                    property: VehicleProperty::GearSelection,
                    ..
                }
        )
    }
}
