// livelog-dash
//
// Terminal dashboard for a livelog event channel: structured log table,
// application log, toggle indicators and the base delay.
//
// Build: cargo run --release --bin livelog-dash -- -e tcp://host:5000
// Quit:  q / Esc / Ctrl-C

use clap::Parser;
use crossbeam::channel;
use crossterm::style::{Attribute, Color, ResetColor, SetAttribute, SetForegroundColor};
use crossterm::{cursor, event, style, terminal, ExecutableCommand, QueueableCommand};
use livelog::dashboard::{attach, events, Dashboard};
use livelog::display::IndicatorTarget;
use livelog::render::ToggleState;
use livelog::{Channel, ConnectionError, DashboardConfig, MemorySurface};
use livelog_tools::{fit, init_tracing, strip_markup, ChannelOpts};
use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "livelog-dash", version, about = "Live log dashboard")]
struct Cli {
    #[command(flatten)]
    channel: ChannelOpts,

    #[arg(long = "max-rows", help = "Rows kept in the log table")]
    max_rows: Option<usize>,

    #[arg(long = "fps", help = "UI refresh rate")]
    fps: Option<u32>,

    #[arg(long = "quiet", help = "Suppress footer hint")]
    quiet: bool,
}

fn load_config(cli: &Cli) -> Result<DashboardConfig, livelog::config::ConfigError> {
    let mut config = cli.channel.load_config()?;
    if let Some(rows) = cli.max_rows {
        config.max_rows = rows;
    }
    if let Some(fps) = cli.fps {
        config.fps = fps;
    }
    config.validate()?;
    Ok(config)
}

struct Tui {
    stdout: io::Stdout,
}

impl Tui {
    fn setup() -> io::Result<Self> {
        let mut stdout = io::stdout();
        terminal::enable_raw_mode()?;
        stdout.execute(terminal::EnterAlternateScreen)?;
        stdout.execute(cursor::Hide)?;
        Ok(Self { stdout })
    }

    fn teardown(&mut self) {
        let _ = self.stdout.execute(cursor::Show);
        let _ = self.stdout.execute(terminal::LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
        let _ = self.stdout.flush();
    }

    fn heading(&mut self, text: &str) -> io::Result<()> {
        self.stdout.queue(SetAttribute(Attribute::Bold))?;
        self.stdout.queue(style::Print(text))?;
        self.stdout.queue(SetAttribute(Attribute::Reset))?;
        self.stdout.queue(cursor::MoveToNextLine(1))?;
        Ok(())
    }

    fn draw(
        &mut self,
        header: &str,
        dashboard: &Dashboard<MemorySurface>,
        scalar: &str,
        quiet: bool,
    ) -> io::Result<()> {
        let (cols, lines) = terminal::size()?;
        let width = cols as usize;
        let surface = dashboard.surface();

        self.stdout.queue(cursor::MoveTo(0, 0))?;
        self.stdout
            .queue(terminal::Clear(terminal::ClearType::All))?;

        self.heading(&fit(header, width))?;

        // Indicators and scalar
        for name in dashboard.indicators() {
            let Some(view) = surface.indicator_view(name) else {
                continue;
            };
            let color = if view.has_class(ToggleState::On.class()) {
                Color::Green
            } else {
                Color::DarkGrey
            };
            self.stdout.queue(style::Print(format!("{}: ", name)))?;
            self.stdout.queue(SetForegroundColor(color))?;
            self.stdout.queue(style::Print(format!("{:<4}", view.text())))?;
            self.stdout.queue(ResetColor)?;
        }
        if let Some(text) = surface.scalar_text(scalar) {
            self.stdout
                .queue(style::Print(format!("{}: {}", scalar, text)))?;
        }
        self.stdout.queue(cursor::MoveToNextLine(2))?;

        // Fixed lines: header, status, blank, two section titles, column
        // header, blank separator and footer.
        let free = (lines as usize).saturating_sub(8);
        let table_height = free * 3 / 5;
        let log_height = free - table_height;

        let table = surface.table_pane();
        let count = table.map(|t| t.len()).unwrap_or(0);
        self.heading(&format!(
            "Log ({} of {} rows)",
            count,
            dashboard.structured_log().rows().capacity()
        ))?;
        self.stdout.queue(SetAttribute(Attribute::Underlined))?;
        self.stdout.queue(style::Print(fit(
            &format!("{:<20} {:<24} {:>14}", "time_stamp", "field", "value"),
            width,
        )))?;
        self.stdout.queue(SetAttribute(Attribute::Reset))?;
        self.stdout.queue(cursor::MoveToNextLine(1))?;
        let mut drawn = 0;
        if let Some(table) = table {
            for row in table.visible(table_height) {
                let color = if row.label.is_empty() {
                    Color::Reset
                } else {
                    Color::Cyan
                };
                self.stdout.queue(SetForegroundColor(color))?;
                self.stdout.queue(style::Print(fit(
                    &format!("{:<20} {:<24} {:>14}", row.label, row.field, row.value),
                    width,
                )))?;
                self.stdout.queue(ResetColor)?;
                self.stdout.queue(cursor::MoveToNextLine(1))?;
                drawn += 1;
            }
        }
        if table_height > drawn {
            self.stdout
                .queue(cursor::MoveToNextLine((table_height - drawn) as u16))?;
        }

        self.stdout.queue(cursor::MoveToNextLine(1))?;
        self.heading("Application log")?;
        if let Some(pane) = surface.log_pane() {
            for entry in pane.visible(log_height) {
                self.stdout
                    .queue(style::Print(fit(&strip_markup(entry), width)))?;
                self.stdout.queue(cursor::MoveToNextLine(1))?;
            }
        }

        if !quiet {
            self.stdout.queue(cursor::MoveTo(0, lines.saturating_sub(1)))?;
            self.stdout.queue(SetForegroundColor(Color::DarkGrey))?;
            self.stdout.queue(style::Print(fit(
                "q/Esc quit  +/- delay  r reconnect  PgUp/PgDn scroll  indicator keys toggle",
                width,
            )))?;
            self.stdout.queue(ResetColor)?;
        }

        self.stdout.flush()
    }
}

fn main() {
    let cli = Cli::parse();
    let config = match load_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };
    if let Err(e) = init_tracing(cli.channel.log_file.as_deref(), false) {
        eprintln!("Cannot open log file: {}", e);
        std::process::exit(2);
    }

    let mut link = match Channel::connect_with_timeout(&config.endpoint, config.connect_timeout())
    {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to connect: {}", e);
            std::process::exit(1);
        }
    };

    let mut surface = MemorySurface::new().with_scalar(&config.scalar);
    for name in config.indicator_names() {
        surface = surface.with_indicator(name);
    }
    let dashboard = Rc::new(RefCell::new(Dashboard::new(surface, &config)));
    attach(&dashboard, &mut link);

    let mut tui = match Tui::setup() {
        Ok(t) => t,
        Err(e) => {
            eprintln!("TUI setup failed: {}", e);
            std::process::exit(1);
        }
    };
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let mut t = Tui {
            stdout: io::stdout(),
        };
        t.teardown();
        original_hook(panic_info);
    }));

    // Keyboard handler
    let (key_tx, key_rx) = channel::unbounded();
    std::thread::spawn(move || loop {
        if let Ok(ev) = event::read() {
            if key_tx.send(ev).is_err() {
                break;
            }
        }
    });

    let log_line = |text: &str| {
        if let Err(e) = dashboard.borrow_mut().log_text(text) {
            warn!(error = %e, "app log entry dropped");
        }
    };

    let frame = Duration::from_millis(1000 / config.fps.max(1) as u64);
    let tick = channel::tick(frame);
    let mut link_up = true;
    let page = 10;

    'main: loop {
        crossbeam::select! {
            recv(key_rx) -> ev => {
                use event::{KeyCode, KeyEventKind, KeyModifiers};
                let key = match ev {
                    Ok(event::Event::Key(k)) if k.kind == KeyEventKind::Press => Some(k),
                    _ => None,
                };
                if let Some(k) = key { match k.code {
                    KeyCode::Char('q') | KeyCode::Esc => break 'main,
                    KeyCode::Char('c') if k.modifiers == KeyModifiers::CONTROL => break 'main,
                    KeyCode::Char('+') => {
                        if let Err(e) = link.emit(events::CHANGE_DELAY, "increase") {
                            warn!(error = %e, "change_delay not sent");
                        }
                    }
                    KeyCode::Char('-') => {
                        if let Err(e) = link.emit(events::CHANGE_DELAY, "decrease") {
                            warn!(error = %e, "change_delay not sent");
                        }
                    }
                    KeyCode::Char('r') => match link.reconnect() {
                        Ok(()) => {
                            link_up = true;
                            info!(endpoint = %link.endpoint(), "reconnected");
                        }
                        Err(e) => log_line(&format!("Reconnect failed: {}", e)),
                    },
                    KeyCode::PageUp => {
                        if let Some(t) = dashboard.borrow_mut().surface_mut().table_pane_mut() {
                            t.scroll_up(page);
                        }
                    }
                    KeyCode::PageDown => {
                        if let Some(t) = dashboard.borrow_mut().surface_mut().table_pane_mut() {
                            t.scroll_down(page);
                        }
                    }
                    KeyCode::Char(c) => {
                        if let Some(name) = config.indicator_for_key(c) {
                            if let Err(e) = dashboard.borrow_mut().toggle(name) {
                                warn!(error = %e, "toggle dropped");
                            }
                        }
                    }
                    _ => {}
                } }
            }

            recv(tick) -> _ => {
                match link.dispatch_pending() {
                    Ok(_) => {}
                    Err(ConnectionError::Disconnected) => {
                        if link_up {
                            link_up = false;
                            log_line(&format!(
                                "Disconnected from {}, press r to reconnect",
                                link.endpoint()
                            ));
                        }
                    }
                    Err(e) => warn!(error = %e, "dispatch failed"),
                }

                let state = if link.is_connected() { "connected" } else if link_up { "connecting" } else { "disconnected" };
                let header = format!("livelog-dash  {}  [{}]", link.endpoint(), state);
                if tui.draw(&header, &dashboard.borrow(), &config.scalar, cli.quiet).is_err() {
                    break 'main;
                }
            }
        }
    }

    tui.teardown();
}
