//! World-level simulator messages.
//!
//! Bodies arrive as event-queue JSON. Decoding failures surface as
//! [`WorldError::MalformedMessage`] so the caller can log and carry on.

use super::handle::RegionHandle;
use super::limits::OpenSimExtras;
use super::{WorldError, WorldResult};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::net::{Ipv4Addr, SocketAddr};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SimulatorInfo {
    pub handle: u64,
    #[serde(rename = "IP")]
    pub ip: Ipv4Addr,
    pub port: u16,
    #[serde(default = "default_region_size")]
    pub region_size_x: u32,
    #[serde(default = "default_region_size")]
    pub region_size_y: u32,
}

fn default_region_size() -> u32 {
    crate::utils::math::REGION_WIDTH_METERS
}

impl SimulatorInfo {
    pub fn host(&self) -> SocketAddr {
        SocketAddr::new(self.ip.into(), self.port)
    }

    pub fn region_handle(&self) -> RegionHandle {
        RegionHandle(self.handle)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EnableSimulator {
    pub simulator_info: Vec<SimulatorInfo>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RegionInfo {
    pub sim_name: String,
    #[serde(rename = "RegionID")]
    pub region_id: Uuid,
    #[serde(default)]
    pub region_flags: u32,
    pub water_height: f32,
    #[serde(default)]
    pub sim_access: u8,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RegionHandshake {
    pub region_info: RegionInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CoarseLocation {
    pub x: u8,
    pub y: u8,
    /// Height in units of 4 m
    pub z: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct CoarseAgent {
    #[serde(rename = "AgentID")]
    pub agent_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CoarseLocationUpdate {
    pub location: Vec<CoarseLocation>,
    pub agent_data: Vec<CoarseAgent>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimulatorFeatures {
    #[serde(rename = "OpenSimExtras", default)]
    pub opensim_extras: Option<OpenSimExtras>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SetCapability {
    pub name: String,
    pub url: String,
}

/// A decoded message together with the simulator it came from
#[derive(Debug, Clone, PartialEq)]
pub enum WorldMessage {
    EnableSimulator(EnableSimulator),
    DisableSimulator { host: SocketAddr },
    RegionHandshake { host: SocketAddr, body: RegionHandshake },
    CoarseLocationUpdate { host: SocketAddr, body: CoarseLocationUpdate },
    SimulatorFeatures { host: SocketAddr, body: SimulatorFeatures },
    SetCapability { host: SocketAddr, body: SetCapability },
}

fn decode<T: DeserializeOwned>(name: &str, body: &Value) -> WorldResult<T> {
    T::deserialize(body).map_err(|e| WorldError::MalformedMessage {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

impl WorldMessage {
    /// Decode an event-queue body sent by `sender`
    pub fn decode(name: &str, sender: SocketAddr, body: &Value) -> WorldResult<Self> {
        let message = match name {
            "EnableSimulator" => {
                let body: EnableSimulator = decode(name, body)?;
                if body.simulator_info.is_empty() {
                    return Err(WorldError::MalformedMessage {
                        name: name.to_string(),
                        reason: "empty SimulatorInfo".to_string(),
                    });
                }
                WorldMessage::EnableSimulator(body)
            }
            "DisableSimulator" => WorldMessage::DisableSimulator { host: sender },
            "RegionHandshake" => WorldMessage::RegionHandshake {
                host: sender,
                body: decode(name, body)?,
            },
            "CoarseLocationUpdate" => {
                let body: CoarseLocationUpdate = decode(name, body)?;
                if body.location.len() != body.agent_data.len() {
                    return Err(WorldError::MalformedMessage {
                        name: name.to_string(),
                        reason: format!(
                            "{} locations for {} agents",
                            body.location.len(),
                            body.agent_data.len()
                        ),
                    });
                }
                WorldMessage::CoarseLocationUpdate { host: sender, body }
            }
            "SimulatorFeatures" => WorldMessage::SimulatorFeatures {
                host: sender,
                body: decode(name, body)?,
            },
            "SetCapability" => WorldMessage::SetCapability {
                host: sender,
                body: decode(name, body)?,
            },
            _ => return Err(WorldError::UnknownMessage { name: name.to_string() }),
        };
        Ok(message)
    }

    pub fn name(&self) -> &'static str {
        match self {
            WorldMessage::EnableSimulator(_) => "EnableSimulator",
            WorldMessage::DisableSimulator { .. } => "DisableSimulator",
            WorldMessage::RegionHandshake { .. } => "RegionHandshake",
            WorldMessage::CoarseLocationUpdate { .. } => "CoarseLocationUpdate",
            WorldMessage::SimulatorFeatures { .. } => "SimulatorFeatures",
            WorldMessage::SetCapability { .. } => "SetCapability",
        }
    }
}
