//! UI callback surface.

use tapparty_client::{Player, Winner};

use crate::GameEvent;

/// Callbacks implemented by the UI.
///
/// Every method defaults to a no-op so a UI only implements what it renders.
/// [`GameObserver::on_event`] routes a [`GameEvent`] to the matching method;
/// override it to receive events as values instead.
pub trait GameObserver: Send {
    /// Route an event to its callback.
    fn on_event(&mut self, event: &GameEvent) {
        match event {
            GameEvent::Connected { connection_id } => self.on_connected(*connection_id),
            GameEvent::Reconnecting { attempt } => self.on_reconnecting(*attempt),
            GameEvent::ConnectFailed { reason } | GameEvent::ConnectionLost { reason } => {
                self.on_connection_lost(reason);
            },
            GameEvent::RoomCreated { room_code } => self.on_room_created(room_code),
            GameEvent::JoinSuccess { room_code, players } => {
                self.on_join_success(room_code, players);
            },
            GameEvent::RoomError { message } => self.on_room_error(message),
            GameEvent::PlayerJoined { connection_id, name, skin_id, ready } => {
                self.on_player_joined(*connection_id, name, *skin_id, *ready);
            },
            GameEvent::PlayerLeft { name } => self.on_player_left(name),
            GameEvent::PlayerInfoUpdate { old_name, new_name, new_skin } => {
                self.on_player_info_update(old_name, new_name, *new_skin);
            },
            GameEvent::GameStarting => self.on_game_starting(),
            GameEvent::TapEvent { connection_id, tap_count } => {
                self.on_tap_event(*connection_id, *tap_count);
            },
            GameEvent::GameStateUpdate { game_ended } => self.on_game_state_update(*game_ended),
            GameEvent::RoundEnded { winner } => self.on_round_ended(winner.as_ref()),
            GameEvent::RoomClosed => self.on_room_closed(),
        }
    }

    /// Relay handshake completed.
    fn on_connected(&mut self, _connection_id: u64) {}

    /// Link lost, reconnect attempt scheduled.
    fn on_reconnecting(&mut self, _attempt: u32) {}

    /// Relay unreachable after all retries.
    fn on_connection_lost(&mut self, _reason: &str) {}

    /// We are hosting `room_code`.
    fn on_room_created(&mut self, _room_code: &str) {}

    /// Relay admitted us to `room_code`.
    fn on_join_success(&mut self, _room_code: &str, _players: &[Player]) {}

    /// Request rejected.
    fn on_room_error(&mut self, _message: &str) {}

    /// A player joined.
    fn on_player_joined(&mut self, _connection_id: u64, _name: &str, _skin_id: u32, _ready: bool) {
    }

    /// A player left.
    fn on_player_left(&mut self, _name: &str) {}

    /// A player changed name or skin.
    fn on_player_info_update(&mut self, _old_name: &str, _new_name: &str, _new_skin: u32) {}

    /// Round is starting.
    fn on_game_starting(&mut self) {}

    /// A tap was counted.
    fn on_tap_event(&mut self, _connection_id: u64, _tap_count: u32) {}

    /// Host round state.
    fn on_game_state_update(&mut self, _game_ended: bool) {}

    /// Round finished.
    fn on_round_ended(&mut self, _winner: Option<&Winner>) {}

    /// Room is gone. Reset to pre-lobby.
    fn on_room_closed(&mut self) {}
}
