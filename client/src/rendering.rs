//! Plain-text rendering of the room for the terminal client

use crate::game::ClientState;
use std::fmt::Write;

/// Draws the local player's stats followed by everyone else in the room.
pub fn render(state: &ClientState) -> String {
    let mut out = String::new();

    let status = if state.joined {
        format!("in room {}", state.room)
    } else {
        "not in a room".to_string()
    };
    let _ = writeln!(out, "== {} ({}) ==", state.name, status);
    if let Some(room) = &state.refused_room {
        let _ = writeln!(out, "room {} is full, cannot join", room);
    }
    let _ = writeln!(
        out,
        "Level: {}  Gear: {}  Power: {}",
        state.me.level,
        state.me.gear,
        state.me.power()
    );

    if state.joined {
        let mut others = state.others().peekable();
        if others.peek().is_none() {
            let _ = writeln!(out, "(nobody else here)");
        }
        for player in others {
            let _ = writeln!(
                out,
                "  {:<16} level {:>3}  gear {:>3}  power {:>3}",
                player.name,
                player.level,
                player.gear,
                player.power()
            );
        }
    }

    if let Some(error) = &state.last_error {
        let _ = writeln!(out, "! {}", error);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::LocalStats;
    use shared::{PlayerStats, ServerMessage};

    #[test]
    fn test_render_lists_others_not_self() {
        let mut state = ClientState::new("me", "lobby", LocalStats::new(2, 3));
        state.apply(&ServerMessage::InitialData {
            players: vec![PlayerStats::new("me", 2, 3), PlayerStats::new("bob", 4, 1)],
        });

        let text = render(&state);

        assert!(text.contains("in room lobby"));
        assert!(text.contains("Power: 5"));
        assert!(text.contains("bob"));
        assert!(!text.lines().any(|line| line.trim_start().starts_with("me ")));
    }

    #[test]
    fn test_render_room_full() {
        let mut state = ClientState::new("me", "lobby", LocalStats::default());
        state.apply(&ServerMessage::RoomFull);

        assert!(render(&state).contains("room lobby is full"));
    }

    #[test]
    fn test_render_refused_switch_stays_in_room() {
        let mut state = ClientState::new("me", "lobby", LocalStats::default());
        state.apply(&ServerMessage::InitialData {
            players: vec![PlayerStats::new("me", 1, 0)],
        });
        state.request_join(Some("cellar".to_string()));
        state.apply(&ServerMessage::RoomFull);

        let text = render(&state);
        assert!(text.contains("in room lobby"));
        assert!(text.contains("room cellar is full"));
    }
}
