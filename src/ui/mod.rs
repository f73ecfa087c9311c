use std::io::{Stdout, stdout};
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};

use crate::app::{App, InputMode};
use crate::domain::filter::Filter;
use crate::repo::TodoRepository;
use crate::usecase::dispatch::Dispatcher;
use crate::usecase::request::Request;

/// What the loop should do after a key press.
#[derive(Debug, PartialEq, Eq)]
enum Control {
    Continue,
    Quit,
    Send(Request),
}

impl From<Option<Request>> for Control {
    fn from(request: Option<Request>) -> Self {
        request.map_or(Control::Continue, Control::Send)
    }
}

type Term = Terminal<CrosstermBackend<Stdout>>;

fn setup_terminal() -> Result<Term> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

pub fn run<R: TodoRepository>(
    mut app: App,
    dispatcher: Dispatcher<R>,
    tick_rate: Duration,
) -> Result<()> {
    let mut terminal = setup_terminal()?;
    dispatcher.submit(app.load());

    let mut last_tick = Instant::now();
    let res = loop {
        for outcome in dispatcher.drain() {
            app.apply(outcome);
        }
        app.tick(Instant::now());
        if let Err(e) = terminal.draw(|f| draw(f, &app)) {
            break Err(e.into());
        }

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        match poll_key(timeout) {
            Ok(Some(code)) => match handle_key(&mut app, code) {
                Control::Quit => break Ok(()),
                Control::Send(request) => dispatcher.submit(request),
                Control::Continue => {}
            },
            Ok(None) => {}
            Err(e) => break Err(e),
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }
    };

    cleanup_terminal(&mut terminal)?;
    res
}

/// Shown instead of the list when no user id is configured.
pub fn run_user_warning() -> Result<()> {
    let mut terminal = setup_terminal()?;
    let res = loop {
        if let Err(e) = terminal.draw(draw_user_warning) {
            break Err(e.into());
        }
        match poll_key(Duration::from_millis(250)) {
            Ok(Some(KeyCode::Char('q') | KeyCode::Esc)) => break Ok(()),
            Ok(_) => {}
            Err(e) => break Err(e),
        }
    };
    cleanup_terminal(&mut terminal)?;
    res
}

fn poll_key(timeout: Duration) -> Result<Option<KeyCode>> {
    if event::poll(timeout)?
        && let Event::Key(key) = event::read()?
        && key.kind == KeyEventKind::Press
    {
        return Ok(Some(key.code));
    }
    Ok(None)
}

fn handle_key(app: &mut App, code: KeyCode) -> Control {
    match app.mode {
        InputMode::Normal => match code {
            KeyCode::Char('q') => Control::Quit,
            KeyCode::Char('j') | KeyCode::Down => {
                app.select_next();
                Control::Continue
            }
            KeyCode::Char('k') | KeyCode::Up => {
                app.select_previous();
                Control::Continue
            }
            KeyCode::Char('a') | KeyCode::Char('n') => {
                app.begin_add();
                Control::Continue
            }
            KeyCode::Enter | KeyCode::Char(' ') => {
                let id = app.selected_todo().map(|t| t.id);
                id.and_then(|id| app.toggle(id)).into()
            }
            KeyCode::Char('e') => {
                if let Some(id) = app.selected_todo().map(|t| t.id) {
                    app.begin_edit(id);
                }
                Control::Continue
            }
            KeyCode::Char('d') | KeyCode::Delete => {
                let id = app.selected_todo().map(|t| t.id);
                id.and_then(|id| app.delete(id)).into()
            }
            KeyCode::Char('t') => app.toggle_all().into(),
            KeyCode::Char('c') => app.clear_completed().into(),
            KeyCode::Char('1') => select_filter(app, Filter::All),
            KeyCode::Char('2') => select_filter(app, Filter::Active),
            KeyCode::Char('3') => select_filter(app, Filter::Completed),
            KeyCode::Char('f') => {
                let next = app.filter.next();
                select_filter(app, next)
            }
            KeyCode::Char('x') => {
                app.dismiss_error();
                Control::Continue
            }
            KeyCode::Char('r') => Control::Send(app.load()),
            _ => Control::Continue,
        },
        InputMode::Adding => match code {
            KeyCode::Esc => {
                app.leave_input();
                Control::Continue
            }
            KeyCode::Enter => app.submit_new().into(),
            KeyCode::Backspace => {
                app.pop_query();
                Control::Continue
            }
            KeyCode::Char(c) => {
                app.push_query(c);
                Control::Continue
            }
            _ => Control::Continue,
        },
        InputMode::Editing => match code {
            KeyCode::Esc => {
                app.cancel_edit();
                Control::Continue
            }
            // Tab leaves the field, which commits like Enter.
            KeyCode::Enter | KeyCode::Tab => app.commit_edit().into(),
            KeyCode::Backspace => {
                app.pop_draft();
                Control::Continue
            }
            KeyCode::Char(c) => {
                app.push_draft(c);
                Control::Continue
            }
            _ => Control::Continue,
        },
    }
}

fn select_filter(app: &mut App, filter: Filter) -> Control {
    app.set_filter(filter);
    Control::Continue
}

fn draw(f: &mut ratatui::Frame, app: &App) {
    let size = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(size);

    f.render_widget(render_header(app), chunks[0]);

    let mut list_state = ListState::default();
    let rows = app.visible();
    if !rows.is_empty() {
        list_state.select(Some(app.selected));
    }
    f.render_stateful_widget(render_list(app), chunks[1], &mut list_state);

    f.render_widget(render_footer(app), chunks[2]);
    f.render_widget(render_notice(app), chunks[3]);
}

fn render_header(app: &App) -> Paragraph<'_> {
    let mut spans = Vec::new();
    if !app.todos.is_empty() {
        let style = if app.all_completed() {
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled("❯ ", style));
    }

    let focused = app.mode == InputMode::Adding;
    if app.query.is_empty() && !focused {
        spans.push(Span::styled(
            "What needs to be done?",
            Style::default().fg(Color::DarkGray),
        ));
    } else {
        let style = if app.input_loading {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default().fg(Color::Yellow)
        };
        spans.push(Span::styled(app.query.as_str(), style));
    }
    if focused && !app.input_loading {
        spans.push(Span::raw("█"));
    }
    if app.input_loading {
        spans.push(Span::styled("  ⏳", Style::default().fg(Color::Magenta)));
    }

    let title = if focused {
        "todos (Enter to add / Esc to leave)"
    } else {
        "todos"
    };
    Paragraph::new(Line::from(spans))
        .block(Block::default().title(title).borders(Borders::ALL))
        .wrap(Wrap { trim: true })
}

fn render_list(app: &App) -> List<'_> {
    let items: Vec<ListItem> = app
        .visible()
        .into_iter()
        .enumerate()
        .map(|(idx, todo)| {
            let symbol = if todo.completed { "✔" } else { "•" };
            let editing = app.editing.as_ref().filter(|e| e.id == todo.id);

            let mut line = match editing {
                Some(edit) => vec![
                    Span::raw(format!(" {symbol} ")),
                    Span::styled(edit.draft.as_str(), Style::default().fg(Color::Yellow)),
                    Span::raw("█"),
                ],
                None => vec![Span::raw(format!(" {symbol} {}", todo.title))],
            };
            if app.is_loading(todo) {
                line.push(Span::styled("  ⏳", Style::default().fg(Color::Magenta)));
            }

            let style = if idx == app.selected && editing.is_none() {
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD | Modifier::REVERSED)
            } else if todo.completed {
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::CROSSED_OUT)
            } else {
                Style::default()
            };

            ListItem::new(Line::from(line)).style(style)
        })
        .collect();

    List::new(items)
        .block(
            Block::default()
                .title("j/k move ; a add ; Space toggle ; e edit ; d delete ; t toggle all")
                .borders(Borders::ALL),
        )
        .highlight_symbol("➤ ")
}

fn render_footer(app: &App) -> Paragraph<'_> {
    if app.todos.is_empty() {
        return Paragraph::new("").block(Block::default().borders(Borders::ALL));
    }

    let mut spans = vec![
        Span::styled(
            format!("{} items left", app.active_count()),
            Style::default().fg(Color::Yellow),
        ),
        Span::raw("   "),
    ];
    for filter in Filter::ALL {
        let style = if filter == app.filter {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default()
        };
        spans.push(Span::styled(filter.label(), style));
        spans.push(Span::raw(" "));
    }
    spans.push(Span::raw("  "));
    let clear_style = if app.completed_count() == 0 {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default()
    };
    spans.push(Span::styled("Clear completed", clear_style));

    Paragraph::new(Line::from(spans)).block(
        Block::default()
            .title("1/2/3 filter ; c clear completed")
            .borders(Borders::ALL),
    )
}

fn render_notice(app: &App) -> Paragraph<'_> {
    match app.banner.message() {
        Some(message) => Paragraph::new(Line::from(vec![
            Span::styled(message.text(), Style::default().fg(Color::Red)),
            Span::styled("   (x to dismiss)", Style::default().fg(Color::DarkGray)),
        ]))
        .block(
            Block::default()
                .title("Error")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red)),
        ),
        None => Paragraph::new("q quit ; r reload ; f cycle filter")
            .block(Block::default().borders(Borders::ALL)),
    }
}

fn draw_user_warning(f: &mut ratatui::Frame) {
    let text = vec![
        Line::from(Span::styled(
            "No user id configured",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from("Register on the todo service, then pass your id with"),
        Line::from("  --user-id <ID>   or   export TODOS_USER_ID=<ID>"),
        Line::from(""),
        Line::from("Press q to quit."),
    ];
    f.render_widget(
        Paragraph::new(text)
            .block(Block::default().title("todos").borders(Borders::ALL))
            .wrap(Wrap { trim: false }),
        f.area(),
    );
}

fn cleanup_terminal(terminal: &mut Term) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use ratatui::backend::TestBackend;

    use super::*;
    use crate::domain::notice::ErrorMessage;
    use crate::domain::todo::Todo;
    use crate::usecase::request::{Outcome, UpdateKind};

    fn todo(id: i64, title: &str, completed: bool) -> Todo {
        Todo {
            id,
            user_id: 1,
            title: title.to_string(),
            completed,
        }
    }

    fn loaded(todos: Vec<Todo>) -> App {
        let mut app = App::new(1);
        app.apply(Outcome::Loaded(Ok(todos)));
        app
    }

    fn screen(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 20)).unwrap();
        terminal.draw(|f| draw(f, app)).unwrap();
        let buffer = terminal.backend().buffer();
        buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn typing_and_submitting_sends_add() {
        let mut app = App::new(1);
        assert_eq!(handle_key(&mut app, KeyCode::Char('a')), Control::Continue);
        for c in "milk".chars() {
            handle_key(&mut app, KeyCode::Char(c));
        }
        match handle_key(&mut app, KeyCode::Enter) {
            Control::Send(Request::Add(draft)) => assert_eq!(draft.title, "milk"),
            other => panic!("unexpected control: {other:?}"),
        }
    }

    #[test]
    fn letters_are_text_while_adding() {
        let mut app = App::new(1);
        handle_key(&mut app, KeyCode::Char('n'));
        assert_eq!(handle_key(&mut app, KeyCode::Char('q')), Control::Continue);
        assert_eq!(app.query, "q");
        handle_key(&mut app, KeyCode::Esc);
        assert_eq!(handle_key(&mut app, KeyCode::Char('q')), Control::Quit);
    }

    #[test]
    fn space_toggles_selected_row() {
        let mut app = loaded(vec![todo(1, "a", false), todo(2, "b", false)]);
        handle_key(&mut app, KeyCode::Down);
        assert_eq!(
            handle_key(&mut app, KeyCode::Char(' ')),
            Control::Send(Request::Update {
                todo: todo(2, "b", true),
                kind: UpdateKind::Toggle
            })
        );
    }

    #[test]
    fn edit_then_tab_commits_rename() {
        let mut app = loaded(vec![todo(1, "a", false)]);
        handle_key(&mut app, KeyCode::Char('e'));
        handle_key(&mut app, KeyCode::Char('b'));
        assert_eq!(
            handle_key(&mut app, KeyCode::Tab),
            Control::Send(Request::Update {
                todo: todo(1, "ab", false),
                kind: UpdateKind::Rename
            })
        );
    }

    #[test]
    fn bulk_keys_map_to_bulk_requests() {
        let mut app = loaded(vec![todo(1, "a", true), todo(2, "b", false)]);
        assert_eq!(
            handle_key(&mut app, KeyCode::Char('c')),
            Control::Send(Request::DeleteMany(vec![1]))
        );
        assert!(matches!(
            handle_key(&mut app, KeyCode::Char('t')),
            Control::Send(Request::UpdateMany(_))
        ));
    }

    #[test]
    fn actions_on_empty_list_are_ignored() {
        let mut app = App::new(1);
        assert_eq!(handle_key(&mut app, KeyCode::Char('d')), Control::Continue);
        assert_eq!(handle_key(&mut app, KeyCode::Char('t')), Control::Continue);
        assert_eq!(handle_key(&mut app, KeyCode::Char('c')), Control::Continue);
    }

    #[test]
    fn footer_shows_counter_and_filters() {
        let app = loaded(vec![todo(1, "a", false), todo(2, "b", true), todo(3, "c", false)]);
        let out = screen(&app);
        assert!(out.contains("2 items left"));
        assert!(out.contains("All Active Completed"));
        assert!(out.contains("Clear completed"));
    }

    #[test]
    fn footer_is_hidden_for_empty_collection() {
        let out = screen(&App::new(1));
        assert!(!out.contains("items left"));
        assert!(out.contains("What needs to be done?"));
    }

    #[test]
    fn error_banner_is_rendered_and_dismissable() {
        let mut app = App::new(1);
        app.apply(Outcome::Loaded(Err(crate::repo::ApiError::Transport(
            "down".to_string(),
        ))));
        assert_eq!(app.banner.message(), Some(ErrorMessage::UnableToLoad));
        assert!(screen(&app).contains("Unable to load todos"));

        handle_key(&mut app, KeyCode::Char('x'));
        assert!(!screen(&app).contains("Unable to load todos"));
    }

    #[test]
    fn missing_user_screen_explains_configuration() {
        let mut terminal = Terminal::new(TestBackend::new(80, 12)).unwrap();
        terminal.draw(draw_user_warning).unwrap();
        let buffer = terminal.backend().buffer();
        let out: String = buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n");
        assert!(out.contains("No user id configured"));
        assert!(out.contains("TODOS_USER_ID"));
        assert!(out.contains("Press q to quit."));
    }

    #[test]
    fn pending_rows_show_loader() {
        let mut app = loaded(vec![todo(1, "write docs", false)]);
        assert!(!screen(&app).contains('⏳'));
        app.toggle(1).unwrap();
        assert!(screen(&app).contains('⏳'));
    }
}
