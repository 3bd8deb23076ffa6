use anyhow::Result;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::io::{self, Stdout};
use std::sync::mpsc::Receiver;
use std::time::Duration;
use tracing::debug;

use crate::app::{App, FeedMessage, InputMode, Route};
use crate::ui;

pub fn init_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

pub fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

pub fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    rx: Receiver<FeedMessage>,
) -> Result<()> {
    let tick_rate = Duration::from_millis(50);
    loop {
        while let Ok(message) = rx.try_recv() {
            app.handle_feed(message);
        }

        terminal.draw(|f| ui::ui(f, app))?;

        if event::poll(tick_rate)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if !handle_key(app, key) {
                        debug!("quit requested");
                        app.shutdown();
                        return Ok(());
                    }
                }
                Event::Mouse(mouse) => handle_mouse(app, mouse),
                _ => {}
            }
        }
    }
}

/// Returns false when the app should exit.
pub fn handle_key(app: &mut App, key: KeyEvent) -> bool {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return false;
    }
    match app.input_mode {
        InputMode::Normal => match key.code {
            KeyCode::Char('q') => return false,
            KeyCode::Char('1') => app.switch_to(Route::Live),
            KeyCode::Char('2') => app.switch_to(Route::History),
            KeyCode::Tab | KeyCode::BackTab => app.next_route(),
            KeyCode::Down | KeyCode::Char('j') => app.next_row(),
            KeyCode::Up | KeyCode::Char('k') => app.previous_row(),
            KeyCode::Enter => app.open_detail(),
            KeyCode::Char('r') => app.reload(),
            KeyCode::Char('i') => app.open_status(),
            KeyCode::Char('t') => app.toggle_theme(),
            KeyCode::Char('?') | KeyCode::Char('h') => app.open_help(),
            _ => {}
        },
        InputMode::Help | InputMode::Detail | InputMode::Status => match key.code {
            KeyCode::Char('q') => return false,
            KeyCode::Esc | KeyCode::Enter | KeyCode::Char('?') | KeyCode::Char('h') => {
                app.close_popup()
            }
            _ => {}
        },
    }
    true
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    if app.input_mode != InputMode::Normal {
        return;
    }
    match mouse.kind {
        MouseEventKind::ScrollUp => app.previous_row(),
        MouseEventKind::ScrollDown => app.next_row(),
        MouseEventKind::Down(MouseButton::Left) => {
            if let Some(row) = app.table_row_at(mouse.row) {
                app.select_row(row);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::test_app;
    use crate::testing::{recv_history, FakeSource};
    use std::sync::Arc;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn keys_drive_navigation() {
        let source = Arc::new(FakeSource::default());
        let (mut app, rx) = test_app(source);
        assert!(handle_key(&mut app, press(KeyCode::Char('2'))));
        assert_eq!(app.route, Route::History);
        app.handle_feed(FeedMessage::History(recv_history(&rx)));

        assert!(handle_key(&mut app, press(KeyCode::Tab)));
        assert_eq!(app.route, Route::Live);
        assert!(app.live.is_active());

        assert!(handle_key(&mut app, press(KeyCode::Char('?'))));
        assert_eq!(app.input_mode, InputMode::Help);
        assert!(handle_key(&mut app, press(KeyCode::Char('1'))));
        assert_eq!(app.input_mode, InputMode::Help);
        assert!(handle_key(&mut app, press(KeyCode::Esc)));
        assert_eq!(app.input_mode, InputMode::Normal);

        assert!(!handle_key(&mut app, press(KeyCode::Char('q'))));
        app.shutdown();
    }

    #[test]
    fn ctrl_c_quits_from_popup() {
        let source = Arc::new(FakeSource::default());
        let (mut app, _rx) = test_app(source);
        app.open_help();
        assert!(!handle_key(
            &mut app,
            KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)
        ));
    }
}
