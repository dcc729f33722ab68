use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::Sender;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use log::debug;

/// What the input thread hands the ingestion loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiCommand {
    Quit,
    Key(char),
    Resize,
}

/// Polls the terminal for key presses until `running` is cleared or the loop
/// stops listening.
pub fn spawn_input_handler(running: Arc<AtomicBool>, tx: Sender<UiCommand>) -> JoinHandle<()> {
    thread::spawn(move || {
        while running.load(Ordering::SeqCst) {
            if !event::poll(Duration::from_millis(100)).unwrap_or(false) {
                continue;
            }
            let command = match event::read() {
                Ok(Event::Key(key)) => map_key(key),
                Ok(Event::Resize(..)) => Some(UiCommand::Resize),
                Ok(_) => None,
                Err(e) => {
                    debug!("terminal input error: {}", e);
                    None
                }
            };
            if let Some(command) = command {
                if tx.send(command).is_err() {
                    break;
                }
            }
        }
    })
}

/// Ctrl-C and Ctrl-X quit (raw mode swallows SIGINT); plain characters go
/// through as view keys.
pub fn map_key(key: KeyEvent) -> Option<UiCommand> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    match key.code {
        KeyCode::Char('c') | KeyCode::Char('x') | KeyCode::Char('C') | KeyCode::Char('X')
            if key.modifiers.contains(KeyModifiers::CONTROL) =>
        {
            Some(UiCommand::Quit)
        }
        KeyCode::Char(c) => Some(UiCommand::Key(c)),
        _ => None,
    }
}
