//! The interactive timer loop. One foreground task alternates between a
//! one-second display tick while tracking and reading menu input while
//! stopped. Ctrl+C always persists the current snapshot before the process
//! exits; an interrupted run is a normal exit, not a failure.

use std::time::Duration;

use anyhow::Result;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader, Lines},
    select,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    session::{
        create_tracker,
        history::{HistoryLedger, HistoryLedgerImpl},
        store::{SessionStore, SessionStoreImpl},
        tracker::Tracker,
    },
    utils::{
        clock::{Clock, DefaultClock},
        paths::AppPaths,
        time::format_hms,
    },
};

use super::{report, screen};

const TICK: Duration = Duration::from_secs(1);

/// Observes Ctrl+C and flips the token. The loop itself does the persisting,
/// so nothing here may block or prompt.
async fn detect_shutdown(cancellation: CancellationToken) {
    select! {
        _ = tokio::signal::ctrl_c() => {
            cancellation.cancel();
        },
    };
}

pub async fn run_interactive(paths: &AppPaths, no_autostart: bool) -> Result<()> {
    let mut tracker = create_tracker(paths, DefaultClock)?;

    let recovered = tracker.recover_on_load().await;
    if let Some(gap) = recovered {
        screen::notice(&format!(
            "Session recovered! {} counted while the tool was closed.",
            format_hms(gap)
        ));
    }

    if !no_autostart {
        tracker.start().await;
    }

    let shutdown = CancellationToken::new();
    tokio::spawn(detect_shutdown(shutdown.clone()));

    let mut ui = Ui {
        paths: paths.clone(),
        lines: BufReader::new(tokio::io::stdin()).lines(),
        clock: DefaultClock,
    };

    loop {
        screen::render_frame(
            tracker.elapsed(),
            tracker.is_running(),
            tracker.persistence_degraded(),
        );

        let action = if tracker.is_running() {
            tracker.autosave_tick().await;
            ui.tick_or_shutdown(&shutdown).await
        } else {
            ui.menu_or_shutdown(&shutdown).await?
        };

        match action {
            Action::Tick => {}
            Action::Choice(choice) => match ui.dispatch(&mut tracker, &choice, &shutdown).await? {
                Flow::Continue => {}
                Flow::Exit => return Ok(()),
                Flow::Interrupted => {
                    handle_interrupt(&mut tracker).await;
                    return Ok(());
                }
            },
            Action::Interrupted => {
                handle_interrupt(&mut tracker).await;
                return Ok(());
            }
        }
    }
}

/// The interrupt path: persist whatever is current and leave. A running
/// session stays marked running so recovery keeps counting the gap.
async fn handle_interrupt<S: SessionStore, H: HistoryLedger>(tracker: &mut Tracker<S, H>) {
    tracker.persist_now().await;
    info!("Interrupted, session persisted");
    if tracker.is_running() {
        println!("\nSession saved! Time keeps counting while this is closed.");
        println!("Run codetime again to pick it back up.\n");
    } else {
        println!("\nGoodbye!\n");
    }
}

enum Action {
    Tick,
    Choice(String),
    Interrupted,
}

enum Flow {
    Continue,
    Exit,
    Interrupted,
}

enum Input {
    Line(String),
    Interrupted,
}

struct Ui<R> {
    paths: AppPaths,
    lines: Lines<BufReader<R>>,
    clock: DefaultClock,
}

impl<R: AsyncRead + Unpin> Ui<R> {
    /// While tracking, the screen just refreshes once a second. Input is not
    /// consumed; stopping goes through Ctrl+C or waits for the next stop.
    async fn tick_or_shutdown(&mut self, shutdown: &CancellationToken) -> Action {
        select! {
            _ = shutdown.cancelled() => Action::Interrupted,
            _ = self.clock.sleep(TICK) => Action::Tick,
        }
    }

    /// Every blocking read goes through here, so Ctrl+C stays an exit path at
    /// any prompt, not just the main menu. A closed stdin counts as an
    /// interrupt as well.
    async fn read_line_or_shutdown(&mut self, shutdown: &CancellationToken) -> Result<Input> {
        select! {
            _ = shutdown.cancelled() => Ok(Input::Interrupted),
            line = self.lines.next_line() => {
                match line? {
                    Some(v) => Ok(Input::Line(v)),
                    None => Ok(Input::Interrupted),
                }
            }
        }
    }

    async fn menu_or_shutdown(&mut self, shutdown: &CancellationToken) -> Result<Action> {
        prompt("\nEnter choice: ")?;
        match self.read_line_or_shutdown(shutdown).await? {
            Input::Line(v) => Ok(Action::Choice(v.trim().to_string())),
            Input::Interrupted => Ok(Action::Interrupted),
        }
    }

    async fn dispatch(
        &mut self,
        tracker: &mut Tracker<SessionStoreImpl, HistoryLedgerImpl>,
        choice: &str,
        shutdown: &CancellationToken,
    ) -> Result<Flow> {
        match choice {
            "1" => {
                tracker.start().await;
                screen::notice("Tracking started!");
                self.pause(1).await;
            }
            "2" => {
                tracker.stop().await;
                screen::notice("Session stopped and saved!");
                self.pause(2).await;
            }
            "3" => match report::save_report(&self.paths).await {
                Ok(path) => {
                    screen::notice(&format!("Report saved to: {}", path.display()));
                    self.pause(2).await;
                }
                Err(e) => {
                    screen::warning(&format!("Could not save report: {e}"));
                    self.pause(2).await;
                }
            },
            "4" => {
                screen::clear();
                match report::render_report(&self.paths).await {
                    Ok(report) => println!("{report}"),
                    Err(e) => screen::warning(&format!("Could not read history: {e}")),
                }
                prompt("\nPress Enter to continue...")?;
                if let Input::Interrupted = self.read_line_or_shutdown(shutdown).await? {
                    return Ok(Flow::Interrupted);
                }
            }
            "5" => {
                prompt("Reset current session? (yes/no): ")?;
                let answer = match self.read_line_or_shutdown(shutdown).await? {
                    Input::Line(v) => v,
                    Input::Interrupted => return Ok(Flow::Interrupted),
                };
                if answer.trim().eq_ignore_ascii_case("yes") {
                    tracker.reset().await;
                    screen::notice("Session reset!");
                } else {
                    println!("Aborted.");
                }
                self.pause(1).await;
            }
            "6" => {
                handle_interrupt(tracker).await;
                return Ok(Flow::Exit);
            }
            _ => {
                screen::warning("Invalid choice!");
                self.pause(1).await;
            }
        }
        Ok(Flow::Continue)
    }

    async fn pause(&self, seconds: u64) {
        self.clock.sleep(Duration::from_secs(seconds)).await;
    }
}

fn prompt(text: &str) -> Result<()> {
    use std::io::Write;
    print!("{text}");
    std::io::stdout().flush()?;
    Ok(())
}
