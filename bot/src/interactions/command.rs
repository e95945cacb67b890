use super::selection::RestoreSelection;
use crate::error::InteractionError;

/// Characters that mark a chat line as a bot command.
pub const PREFIXES: [char; 3] = ['s', 'S', '!'];

/// A prefixed chat line split into command name and arguments.
///
/// Examples:
///   `!backup create`
///   `sbackup select k3j9x2ab roles,channels`
///   `!maintenance on`
#[derive(Debug, Clone, PartialEq)]
pub struct PrefixMessage {
    pub prefix: char,
    /// Lowercased command name.
    pub name: String,
    pub args: Vec<String>,
}

impl PrefixMessage {
    /// Parse a single chat line. Returns `None` for lines that aren't commands.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let prefix = line.chars().next().filter(|c| PREFIXES.contains(c))?;

        let mut words = line[prefix.len_utf8()..].split_whitespace();
        let name = words.next()?.to_lowercase();
        let args = words.map(str::to_string).collect();

        Some(PrefixMessage { prefix, name, args })
    }
}

/// A command the dispatcher knows how to run.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    BackupCreate,
    BackupList,
    BackupInfo(String),
    BackupDelete(String),
    BackupSelect {
        backup_id: String,
        selection: RestoreSelection,
    },
    /// Confirm a restore with whatever options were selected.
    BackupLoad(String),
    BackupCancel(String),
    MaintenanceOn,
    MaintenanceOff,
    MaintenanceStatus,
    Help,
}

impl Command {
    pub fn from_message(msg: &PrefixMessage) -> Result<Self, InteractionError> {
        let arg = |i: usize| msg.args.get(i).map(|s| s.to_string());
        let sub = msg.args.first().map(|s| s.to_lowercase());

        match msg.name.as_str() {
            "help" => Ok(Command::Help),
            "backup" => match sub.as_deref() {
                Some("create") => Ok(Command::BackupCreate),
                Some("list") => Ok(Command::BackupList),
                Some("info") => Ok(Command::BackupInfo(
                    arg(1).ok_or(InteractionError::MissingArgument("backup id"))?,
                )),
                Some("delete") => Ok(Command::BackupDelete(
                    arg(1).ok_or(InteractionError::MissingArgument("backup id"))?,
                )),
                Some("select") => {
                    let backup_id =
                        arg(1).ok_or(InteractionError::MissingArgument("backup id"))?;
                    let selection = RestoreSelection::from_values(
                        msg.args[2..].iter().flat_map(|a| a.split(',')),
                    )?;
                    Ok(Command::BackupSelect {
                        backup_id,
                        selection,
                    })
                }
                Some("load") => Ok(Command::BackupLoad(
                    arg(1).ok_or(InteractionError::MissingArgument("backup id"))?,
                )),
                Some("cancel") => Ok(Command::BackupCancel(
                    arg(1).ok_or(InteractionError::MissingArgument("backup id"))?,
                )),
                Some(other) => Err(InteractionError::UnknownCommand(format!("backup {other}"))),
                None => Err(InteractionError::MissingArgument("backup subcommand")),
            },
            "maintenance" => match sub.as_deref() {
                Some("on") | Some("enable") => Ok(Command::MaintenanceOn),
                Some("off") | Some("disable") => Ok(Command::MaintenanceOff),
                Some("status") | None => Ok(Command::MaintenanceStatus),
                Some(other) => Err(InteractionError::UnknownCommand(format!(
                    "maintenance {other}"
                ))),
            },
            other => Err(InteractionError::UnknownCommand(other.to_string())),
        }
    }
}
