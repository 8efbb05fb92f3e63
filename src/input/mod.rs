// Keyboard input for the recorder.
//
// crossterm's blocking event read runs on its own thread; recognized keys
// become commands on the controller's queue. The queue is the single
// serialization point, so key events can never interleave with a state
// transition in progress.

use anyhow::{bail, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use tokio::sync::mpsc;
use tracing::debug;

use crate::session::Command;

/// The two configurable control keys
#[derive(Debug, Clone)]
pub struct KeyBindings {
    pub primary: KeyCode,
    pub cancel: KeyCode,
}

impl KeyBindings {
    pub fn from_names(primary: &str, cancel: &str) -> Result<Self> {
        Ok(Self {
            primary: parse_key(primary)?,
            cancel: parse_key(cancel)?,
        })
    }
}

/// Parse a key name from the config file ("space", "delete", "enter",
/// "esc", "backspace", "tab", or a single character).
pub fn parse_key(name: &str) -> Result<KeyCode> {
    let code = match name.to_ascii_lowercase().as_str() {
        "space" => KeyCode::Char(' '),
        "delete" | "del" => KeyCode::Delete,
        "enter" | "return" => KeyCode::Enter,
        "esc" | "escape" => KeyCode::Esc,
        "backspace" => KeyCode::Backspace,
        "tab" => KeyCode::Tab,
        other => {
            let mut chars = other.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => KeyCode::Char(c),
                _ => bail!("unknown key name: '{name}'"),
            }
        }
    };
    Ok(code)
}

/// Blocking key loop; run it on a dedicated thread (`spawn_blocking`).
///
/// Always sends [`Command::Shutdown`] before returning so the controller
/// exits cleanly even if the loop fails.
pub fn listen(bindings: KeyBindings, commands: mpsc::Sender<Command>) -> Result<()> {
    let result = match terminal::enable_raw_mode() {
        Ok(()) => {
            let result = read_loop(&bindings, &commands);
            let _ = terminal::disable_raw_mode();
            result
        }
        Err(e) => Err(e.into()),
    };

    let _ = commands.blocking_send(Command::Shutdown);

    result
}

fn read_loop(bindings: &KeyBindings, commands: &mpsc::Sender<Command>) -> Result<()> {
    loop {
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Ok(());
        }

        if key.code == bindings.primary {
            commands.blocking_send(Command::Primary)?;
        } else if key.code == bindings.cancel {
            commands.blocking_send(Command::Cancel)?;
        } else if key.code == KeyCode::Char('q') || key.code == KeyCode::Esc {
            return Ok(());
        } else {
            debug!("ignoring key {:?}", key.code);
        }
    }
}
