use super::manager::{RemoveOutcome, World};
use super::messages::WorldMessage;
use super::region::{MapAvatar, RegionFlags};
use super::{WorldError, WorldResult};
use glam::Vec3;
use serde_json::Value;
use std::net::SocketAddr;
use tracing::{debug, error, info, warn};

impl World {
    /// Apply one decoded simulator message
    pub fn process_message(&mut self, message: WorldMessage) -> WorldResult<()> {
        match message {
            WorldMessage::EnableSimulator(body) => {
                let mut first_error = None;
                for info in body.simulator_info {
                    let (handle, host) = (info.region_handle(), info.host());
                    let added =
                        self.add_region(handle, host, info.region_size_x, info.region_size_y);
                    if let Err(e) = added {
                        warn!("Skipping simulator {} at {}: {}", host, handle, e);
                        if first_error.is_none() {
                            first_error = Some(e);
                        }
                    }
                }
                if let Some(e) = first_error {
                    return Err(e);
                }
            }
            WorldMessage::DisableSimulator { host } => match self.remove_region(host) {
                RemoveOutcome::Removed => info!("Disabled simulator {}", host),
                RemoveOutcome::NotFound => return Err(WorldError::UnknownHost { host }),
                RemoveOutcome::ForcedDisconnect => {
                    warn!("Simulator {} disabled under the agent", host)
                }
            },
            WorldMessage::RegionHandshake { host, body } => {
                let info = body.region_info;
                let is_agent_region = self.agent_region().map(|r| r.host()) == Some(host);
                let region = self
                    .region_by_host_mut(host)
                    .ok_or(WorldError::UnknownHost { host })?;
                let water_changed = region.water_height() != info.water_height;
                region.apply_handshake(
                    &info.sim_name,
                    info.region_id,
                    RegionFlags::from_bits_truncate(info.region_flags),
                    info.water_height,
                    info.sim_access,
                );
                info!("Region handshake from {}: {} ({})", host, info.sim_name, info.region_id);
                if is_agent_region && water_changed {
                    self.update_water_objects();
                }
            }
            WorldMessage::CoarseLocationUpdate { host, body } => {
                let region = self
                    .region_by_host_mut(host)
                    .ok_or(WorldError::UnknownHost { host })?;
                let avatars = body
                    .location
                    .iter()
                    .zip(body.agent_data.iter())
                    .map(|(loc, agent)| MapAvatar {
                        agent_id: agent.agent_id,
                        position: Vec3::new(
                            f32::from(loc.x),
                            f32::from(loc.y),
                            f32::from(loc.z) * 4.0,
                        ),
                    })
                    .collect();
                region.set_map_avatars(avatars);
            }
            WorldMessage::SimulatorFeatures { host, body } => {
                if self.region_by_host(host).is_none() {
                    return Err(WorldError::UnknownHost { host });
                }
                if let Some(extras) = body.opensim_extras {
                    self.apply_simulator_features(host, &extras);
                }
            }
            WorldMessage::SetCapability { host, body } => {
                let region = self
                    .region_by_host_mut(host)
                    .ok_or(WorldError::UnknownHost { host })?;
                debug!("Capability {} for {}: {}", body.name, host, body.url);
                region.set_capability(body.name, body.url);
            }
        }
        Ok(())
    }

    /// Decode and apply an event-queue message. Failures are logged and the
    /// session carries on.
    pub fn dispatch(&mut self, name: &str, sender: SocketAddr, body: &Value) {
        let result = WorldMessage::decode(name, sender, body)
            .and_then(|message| self.process_message(message));
        match result {
            Ok(()) => debug!("Processed {} from {}", name, sender),
            Err(e @ WorldError::UnknownHost { .. }) => {
                warn!("Dropping {} from {}: {}", name, sender, e)
            }
            Err(e) => error!("Failed to process {} from {}: {}", name, sender, e),
        }
    }
}
