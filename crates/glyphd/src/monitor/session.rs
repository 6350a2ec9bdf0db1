use strum::Display;

use crate::ha::Entity;
use crate::sprite::SpriteKind;

/// Lifecycle of the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    Uninitialized,
    Initializing,
    Active,
    Reconnecting { attempt: u32 },
    TornDown,
}

/// Mutable per-session state. Owned by the monitor task.
#[derive(Debug, Clone, Default)]
pub(crate) struct Session {
    /// The client has a URL and token
    pub configured: bool,
    pub registered: bool,
    pub consecutive_failures: u32,
    pub selected_entity_id: Option<String>,
}

impl Session {
    /// Polling needs credentials and something to poll.
    pub fn can_poll(&self) -> bool {
        self.configured && self.selected_entity_id.is_some()
    }
}

/// Last successfully polled state of the selected entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSnapshot {
    pub entity_id: String,
    pub is_on: bool,
    pub raw_state: String,
}

impl From<&Entity> for DeviceSnapshot {
    fn from(entity: &Entity) -> Self {
        Self {
            entity_id: entity.entity_id.clone(),
            is_on: entity.is_on(),
            raw_state: entity.state.clone(),
        }
    }
}

/// Point-in-time view of the monitor, published after every transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorStatus {
    pub phase: Phase,
    pub configured: bool,
    pub registered: bool,
    pub consecutive_failures: u32,
    pub selected_entity_id: Option<String>,
    pub snapshot: Option<DeviceSnapshot>,
    /// Sprite most recently pushed to the display
    pub displayed: Option<SpriteKind>,
}

impl Default for MonitorStatus {
    fn default() -> Self {
        Self {
            phase: Phase::Uninitialized,
            configured: false,
            registered: false,
            consecutive_failures: 0,
            selected_entity_id: None,
            snapshot: None,
            displayed: None,
        }
    }
}

/// Which sprite to show, given whether polling is failing and the last
/// known state.
pub fn select_sprite(failing: bool, is_on: bool) -> SpriteKind {
    match (failing, is_on) {
        (true, _) => SpriteKind::Error,
        (false, true) => SpriteKind::On,
        (false, false) => SpriteKind::Off,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_sprite() {
        assert_eq!(select_sprite(false, true), SpriteKind::On);
        assert_eq!(select_sprite(false, false), SpriteKind::Off);
        assert_eq!(select_sprite(true, true), SpriteKind::Error);
        assert_eq!(select_sprite(true, false), SpriteKind::Error);
    }

    #[test]
    fn test_snapshot_from_entity() {
        let entity: Entity =
            serde_json::from_str(r#"{"entity_id": "fan.attic", "state": "unavailable"}"#).unwrap();
        let snapshot = DeviceSnapshot::from(&entity);
        assert_eq!(snapshot.entity_id, "fan.attic");
        assert!(!snapshot.is_on);
        assert_eq!(snapshot.raw_state, "unavailable");
    }

    #[test]
    fn test_can_poll() {
        let mut session = Session::default();
        assert!(!session.can_poll());
        session.configured = true;
        assert!(!session.can_poll());
        session.selected_entity_id = Some("light.kitchen".to_string());
        assert!(session.can_poll());
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(Phase::Reconnecting { attempt: 2 }.to_string(), "reconnecting");
        assert_eq!(Phase::TornDown.to_string(), "torn_down");
    }
}
