// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Vehicle signal contract.
//!
//! Property values follow the vehicle bus encoding: gear selection is a bit
//! flag and the turn signal is a small enumeration.

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum VehicleProperty {
    GearSelection,
    TurnSignalState,
}

/// Status reported by the vehicle bus for a failed read.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StatusCode {
    TryAgain,
    InvalidArg,
    NotAvailable,
    AccessDenied,
    InternalError,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Gear {
    Neutral,
    Reverse,
    Park,
    Drive,
    Other(i32),
}

impl Gear {
    pub const NEUTRAL: i32 = 0x0001;
    pub const REVERSE: i32 = 0x0002;
    pub const PARK: i32 = 0x0004;
    pub const DRIVE: i32 = 0x0008;

    pub fn value(self) -> i32 {
        match self {
            Gear::Neutral => Self::NEUTRAL,
            Gear::Reverse => Self::REVERSE,
            Gear::Park => Self::PARK,
            Gear::Drive => Self::DRIVE,
            Gear::Other(v) => v,
        }
    }
}

impl From<i32> for Gear {
    fn from(value: i32) -> Self {
        match value {
            Self::NEUTRAL => Gear::Neutral,
            Self::REVERSE => Gear::Reverse,
            Self::PARK => Gear::Park,
            Self::DRIVE => Gear::Drive,
            v => Gear::Other(v),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TurnSignal {
    #[default]
    None,
    Right,
    Left,
}

impl TurnSignal {
    pub fn value(self) -> i32 {
        match self {
            TurnSignal::None => 0,
            TurnSignal::Right => 1,
            TurnSignal::Left => 2,
        }
    }
}

impl From<i32> for TurnSignal {
    fn from(value: i32) -> Self {
        match value {
            1 => TurnSignal::Right,
            2 => TurnSignal::Left,
            _ => TurnSignal::None,
        }
    }
}

/// Gear and turn signal read during one control loop tick.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VehicleSnapshot {
    pub gear: Gear,
    pub turn_signal: TurnSignal,
}

impl VehicleSnapshot {
    pub fn new(gear: Gear, turn_signal: TurnSignal) -> Self {
        Self { gear, turn_signal }
    }
}

/// Vehicle bus access. Reads block until the bus answers.
pub trait VehicleSignals: Send + Sync {
    fn get(&self, property: VehicleProperty) -> Result<i32, StatusCode>;
}
