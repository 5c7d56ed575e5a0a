use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use crate::app::{App, FocusPane, InputMode};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string edits.
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
            app.poll_background_tasks().await;
        }
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Quits from any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_key(app, key),
        InputMode::Editing => handle_editing_key(app, key),
    }
}

fn handle_normal_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        KeyCode::Char('i') | KeyCode::Char('/') => {
            app.focus = FocusPane::Input;
            app.input_mode = InputMode::Editing;
        }

        KeyCode::Tab => {
            app.focus = match app.focus {
                FocusPane::Transcript => FocusPane::Suggestions,
                FocusPane::Suggestions => FocusPane::Input,
                FocusPane::Input => FocusPane::Transcript,
            };
        }

        KeyCode::Char('j') | KeyCode::Down => match app.focus {
            FocusPane::Transcript => app.scroll_transcript_down(1),
            FocusPane::Suggestions => app.suggestion_down(),
            FocusPane::Input => {}
        },
        KeyCode::Char('k') | KeyCode::Up => match app.focus {
            FocusPane::Transcript => app.scroll_transcript_up(1),
            FocusPane::Suggestions => app.suggestion_up(),
            FocusPane::Input => {}
        },

        KeyCode::Char('g') => {
            if app.focus == FocusPane::Transcript {
                app.jump_to_top();
            }
        }
        KeyCode::Char('G') => {
            if app.focus == FocusPane::Transcript {
                app.follow_bottom();
            }
        }

        KeyCode::Enter => match app.focus {
            FocusPane::Suggestions => app.use_selected_suggestion(),
            FocusPane::Input => app.input_mode = InputMode::Editing,
            FocusPane::Transcript => {}
        },

        // New chat, as in the original sidebar
        KeyCode::Char('r') => app.reset_conversation(),

        _ => {}
    }
}

fn handle_editing_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            app.submit_input();
        }
        KeyCode::Backspace => {
            if app.input_cursor > 0 {
                app.input_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.input.chars().count();
            if app.input_cursor < char_count {
                let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.input_cursor = app.input_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.input.chars().count();
            app.input_cursor = (app.input_cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.input_cursor = 0;
        }
        KeyCode::End => {
            app.input_cursor = app.input.chars().count();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
            app.input.insert(byte_pos, c);
            app.input_cursor += 1;
        }
        _ => {}
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let x = mouse.column;
    let y = mouse.row;

    // Position-based scrolling: the wheel acts on the pane under the cursor
    let in_transcript = app
        .transcript_area
        .map(|r| point_in_rect(x, y, r))
        .unwrap_or(false);
    let in_suggestions = app
        .suggestions_area
        .map(|r| point_in_rect(x, y, r))
        .unwrap_or(false);

    match mouse.kind {
        MouseEventKind::ScrollDown => {
            if in_transcript {
                app.scroll_transcript_down(3);
            } else if in_suggestions {
                app.suggestion_down();
            }
        }
        MouseEventKind::ScrollUp => {
            if in_transcript {
                app.scroll_transcript_up(3);
            } else if in_suggestions {
                app.suggestion_up();
            }
        }
        _ => {}
    }
}

fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::session::Session;

    fn test_app() -> App {
        let config = Config {
            backend_url: None,
            api_token: Some("test-token".to_string()),
        };
        App::new(
            Session::resolve(&config).expect("token is present"),
            "http://127.0.0.1:1",
        )
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    // ---- cursor math ----

    #[test]
    fn char_to_byte_index_handles_multibyte_text() {
        let text = "maïs über";
        assert_eq!(char_to_byte_index(text, 0), 0);
        assert_eq!(char_to_byte_index(text, 2), 2); // before 'ï' (2 bytes)
        assert_eq!(char_to_byte_index(text, 3), 4); // after it
        assert_eq!(char_to_byte_index(text, 100), text.len());
    }

    // ---- editing mode ----

    #[tokio::test]
    async fn typing_inserts_at_the_cursor() {
        let mut app = test_app();
        app.input_mode = InputMode::Editing;

        for c in "mas".chars() {
            handle_editing_key(&mut app, press(KeyCode::Char(c)));
        }
        handle_editing_key(&mut app, press(KeyCode::Left));
        handle_editing_key(&mut app, press(KeyCode::Char('ï')));

        assert_eq!(app.input, "maïs");
        assert_eq!(app.input_cursor, 3);
    }

    #[tokio::test]
    async fn backspace_removes_the_char_before_the_cursor() {
        let mut app = test_app();
        app.input = "maïs".to_string();
        app.input_cursor = 3; // after 'ï'

        handle_editing_key(&mut app, press(KeyCode::Backspace));
        assert_eq!(app.input, "mas");
        assert_eq!(app.input_cursor, 2);
    }

    #[tokio::test]
    async fn escape_leaves_editing_without_submitting() {
        let mut app = test_app();
        app.input_mode = InputMode::Editing;
        app.input = "draft".to_string();

        handle_editing_key(&mut app, press(KeyCode::Esc));
        assert_eq!(app.input_mode, InputMode::Normal);
        assert_eq!(app.input, "draft");
        assert!(app.pending_reply.is_none());
    }

    // ---- normal mode ----

    #[tokio::test]
    async fn tab_cycles_the_focus_panes() {
        let mut app = test_app();
        app.focus = FocusPane::Transcript;

        handle_normal_key(&mut app, press(KeyCode::Tab));
        assert_eq!(app.focus, FocusPane::Suggestions);
        handle_normal_key(&mut app, press(KeyCode::Tab));
        assert_eq!(app.focus, FocusPane::Input);
        handle_normal_key(&mut app, press(KeyCode::Tab));
        assert_eq!(app.focus, FocusPane::Transcript);
    }

    #[tokio::test]
    async fn enter_on_a_suggestion_fills_the_input() {
        let mut app = test_app();
        app.focus = FocusPane::Suggestions;

        handle_normal_key(&mut app, press(KeyCode::Enter));
        assert_eq!(app.input, crate::app::SUGGESTIONS[0]);
        assert_eq!(app.input_mode, InputMode::Editing);
    }
}
