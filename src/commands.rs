#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Help,
    New,
    Sessions,
    Resume(String),
    Delete(String),
    Attach(String),
    Quit,
    Unknown(String),
}

pub fn parse_repl_command(input: &str) -> Option<ReplCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let (command, argument) = match trimmed.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (trimmed, ""),
    };

    let parsed = match (command, argument) {
        ("/help", _) => ReplCommand::Help,
        ("/new", _) => ReplCommand::New,
        ("/sessions", _) => ReplCommand::Sessions,
        ("/resume", id) if !id.is_empty() => ReplCommand::Resume(id.to_string()),
        ("/delete", id) if !id.is_empty() => ReplCommand::Delete(id.to_string()),
        ("/attach", path) if !path.is_empty() => ReplCommand::Attach(path.to_string()),
        ("/quit" | "/exit", _) => ReplCommand::Quit,
        _ => ReplCommand::Unknown(trimmed.to_string()),
    };

    Some(parsed)
}

pub const HELP_TEXT: &str = "\
/new                  start a new chat
/sessions             list stored chats, newest first
/resume <id>          continue a stored chat
/delete <id>          delete a stored chat
/attach <file.json>   stage an upload result for the next message
/quit                 exit
Ctrl-C cancels the reply being streamed.";
