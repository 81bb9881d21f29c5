//! Terminal command parsing

/// One line of user input, interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    LevelUp,
    LevelDown,
    GearUp,
    GearDown,
    /// Join the current room, or switch to the given one.
    Join(Option<String>),
    Leave,
    Show,
    Help,
    Quit,
}

pub const HELP: &str = "\
Commands:
  l+ / l-        level up / level down
  g+ / g-        gear up / gear down
  join [room]    join the current room, or another one
  leave          leave the room
  show           print the room
  help           this text
  quit           leave and exit";

/// Parses a command line. Returns `None` for anything unrecognized.
pub fn parse_command(line: &str) -> Option<Command> {
    let mut words = line.split_whitespace();
    let command = words.next()?.to_ascii_lowercase();
    let argument = words.next().map(str::to_string);

    if words.next().is_some() {
        return None;
    }

    let parsed = match (command.as_str(), argument) {
        ("l+" | "+l" | "up", None) => Command::LevelUp,
        ("l-" | "-l" | "down", None) => Command::LevelDown,
        ("g+" | "+g", None) => Command::GearUp,
        ("g-" | "-g", None) => Command::GearDown,
        ("join" | "j", room) => Command::Join(room),
        ("leave", None) => Command::Leave,
        ("show" | "s", None) => Command::Show,
        ("help" | "h" | "?", None) => Command::Help,
        ("quit" | "q" | "exit", None) => Command::Quit,
        _ => return None,
    };

    Some(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stat_commands() {
        assert_eq!(parse_command("l+"), Some(Command::LevelUp));
        assert_eq!(parse_command("  L- "), Some(Command::LevelDown));
        assert_eq!(parse_command("g+"), Some(Command::GearUp));
        assert_eq!(parse_command("-g"), Some(Command::GearDown));
    }

    #[test]
    fn test_join_with_and_without_room() {
        assert_eq!(parse_command("join"), Some(Command::Join(None)));
        assert_eq!(
            parse_command("join cellar"),
            Some(Command::Join(Some("cellar".to_string())))
        );
    }

    #[test]
    fn test_rejects_unknown_and_extra_words() {
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("dance"), None);
        assert_eq!(parse_command("leave now"), None);
        assert_eq!(parse_command("join a b"), None);
    }
}
