use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tracing_subscriber::EnvFilter;

use dockhand::app::{App, Tab};
use dockhand::cli::{self, Cli};
use dockhand::engine::Supervisor;
use dockhand::history::HistoryLog;
use dockhand::inventory::{Poller, query_snapshot};
use dockhand::ops::OperationRequest;
use dockhand::{config, docker, dockerfile, ui};

const DOCKER_PROGRAM: &str = "docker";

fn main() -> Result<()> {
    let args = Cli::parse();

    if args.scripted() {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dockhand=info")),
            )
            .with_writer(io::stderr)
            .init();
        let code = cli::run(&args)?;
        std::process::exit(code);
    }

    if let Err(e) = docker::ensure_available(DOCKER_PROGRAM) {
        eprintln!("docker is not available: {e:#}");
        eprintln!("install it from https://docs.docker.com/engine/install/ and retry");
        std::process::exit(cli::EXIT_FAILURE);
    }

    // Ensure terminal is restored on panic.
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = restore_terminal();
        original_hook(info);
    }));

    let mut terminal = setup_terminal()?;
    let result = run(&mut terminal, &args);
    restore_terminal()?;
    result
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn restore_terminal() -> Result<()> {
    terminal::disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen)?;
    Ok(())
}

fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, args: &Cli) -> Result<()> {
    let cfg = config::load(&args.config)?;

    let history = HistoryLog::open(&cfg.log_dir).ok().map(Arc::new);
    let supervisor = Supervisor::new(
        DOCKER_PROGRAM,
        Duration::from_secs(cfg.task_timeout_secs),
        history.clone(),
    );
    let events = supervisor.subscribe();
    let poller = Poller::start(
        Duration::from_secs(cfg.poll_interval_secs),
        supervisor.bus(),
        history,
        || query_snapshot(DOCKER_PROGRAM),
    );

    let mut app = App::new(cfg);

    while app.running {
        app.snapshot = poller.latest();
        app.clamp_indices();

        terminal.draw(|frame| ui::draw(frame, &app))?;

        // Poll for input: short timeout while a task streams output, longer
        // when idle to save CPU.
        let poll_timeout = if app.busy {
            Duration::from_millis(50)
        } else {
            Duration::from_millis(200)
        };
        if event::poll(poll_timeout)?
            && let Event::Key(key) = event::read()?
        {
            handle_key(&mut app, &supervisor, key);
        }

        while let Some(event) = events.try_recv() {
            app.apply_event(event);
        }
    }

    Ok(())
}

fn handle_key(app: &mut App, supervisor: &Supervisor, key: KeyEvent) {
    match (key.code, key.modifiers) {
        (KeyCode::Char('c'), KeyModifiers::CONTROL) | (KeyCode::Char('q'), _) => {
            app.running = false;
        }
        (KeyCode::Esc, _) => {
            if let Some(id) = app.active_task {
                supervisor.cancel(id);
                app.note(format!("cancel requested for task {id}"));
            }
        }
        (KeyCode::Tab, _) => app.tab = app.tab.next(),
        (KeyCode::Char('1'), _) => app.tab = Tab::Images,
        (KeyCode::Char('2'), _) => app.tab = Tab::Containers,
        (KeyCode::Down | KeyCode::Char('j'), _) => app.move_selection(1),
        (KeyCode::Up | KeyCode::Char('k'), _) => app.move_selection(-1),

        (KeyCode::Char('b'), _) => submit(app, supervisor, app.build_request()),
        (KeyCode::Char('r'), _) => submit(app, supervisor, app.run_request()),
        (KeyCode::Char('p'), _) => submit(app, supervisor, app.push_request()),
        (KeyCode::Char('s'), _) => submit(app, supervisor, app.stop_request()),
        (KeyCode::Char('d'), _) => submit(app, supervisor, app.remove_request()),
        (KeyCode::Char('c'), _) => submit(app, supervisor, app.commit_request()),
        (KeyCode::Char('g'), _) => generate_dockerfile(app),
        _ => {}
    }
}

fn submit(app: &mut App, supervisor: &Supervisor, request: Option<OperationRequest>) {
    let Some(request) = request else {
        app.note("nothing selected");
        return;
    };
    match supervisor.submit(request) {
        Ok(id) => {
            app.active_task = Some(id);
            app.busy = true;
        }
        Err(e) => app.note(e.to_string()),
    }
}

fn generate_dockerfile(app: &mut App) {
    let content = dockerfile::render(&app.config);
    match dockerfile::save(std::path::Path::new("."), &content) {
        Ok(path) => app.note(format!("wrote {}", path.display())),
        Err(e) => app.note(format!("dockerfile generation failed: {e:#}")),
    }
}
