//! Terminal presentation for the interactive timer. Pure output plus one
//! standalone confirmation prompt; no tracking logic lives here.

use ansi_term::Colour;
use anyhow::Result;
use chrono::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::utils::time::format_hms;

const RULE: &str = "============================================================";
const THIN_RULE: &str = "------------------------------------------------------------";

/// Five-row glyphs for the big timer display.
fn glyph(c: char) -> Option<[&'static str; 5]> {
    Some(match c {
        '0' => ["███", "█ █", "█ █", "█ █", "███"],
        '1' => [" █ ", "██ ", " █ ", " █ ", "███"],
        '2' => ["███", "  █", "███", "█  ", "███"],
        '3' => ["███", "  █", "███", "  █", "███"],
        '4' => ["█ █", "█ █", "███", "  █", "  █"],
        '5' => ["███", "█  ", "███", "  █", "███"],
        '6' => ["███", "█  ", "███", "█ █", "███"],
        '7' => ["███", "  █", "  █", "  █", "  █"],
        '8' => ["███", "█ █", "███", "█ █", "███"],
        '9' => ["███", "█ █", "███", "  █", "███"],
        ':' => [" ", "█", " ", "█", " "],
        _ => return None,
    })
}

/// Renders a `HH:MM:SS` string as five lines of block digits.
pub fn big_time_lines(time_str: &str) -> [String; 5] {
    let mut lines: [String; 5] = Default::default();
    for c in time_str.chars() {
        let Some(rows) = glyph(c) else { continue };
        for (line, row) in lines.iter_mut().zip(rows) {
            line.push_str(row);
            line.push_str("  ");
        }
    }
    lines
}

pub fn clear() {
    // ANSI clear + cursor home. Enough for every terminal this targets.
    print!("\x1B[2J\x1B[1;1H");
}

/// Redraws the whole screen: header, big timer, status line, menu.
pub fn render_frame(elapsed: Duration, running: bool, persistence_degraded: bool) {
    clear();

    println!("\n{RULE}");
    println!("          CODING TIME TRACKER");
    println!("{RULE}\n");

    for line in big_time_lines(&format_hms(elapsed)) {
        println!("    {line}");
    }

    println!("\n{THIN_RULE}");
    if running {
        println!(
            "  Status: {} - keep this open, time keeps counting",
            Colour::Green.bold().paint("TRACKING")
        );
    } else {
        println!("  Status: {}", Colour::Red.bold().paint("STOPPED"));
    }
    if persistence_degraded {
        println!(
            "  {}",
            Colour::Yellow.paint("Warning: could not write state to disk, tracking in memory only")
        );
    }
    println!("{THIN_RULE}");

    println!("\nOptions:");
    println!("  [1] Start tracking");
    println!("  [2] Stop & save session");
    println!("  [3] Save report (report.txt)");
    println!("  [4] View report");
    println!("  [5] Reset current session");
    println!("  [6] Exit");
    println!("\nPress Ctrl+C to minimize (session keeps counting across restarts)");
    println!("{RULE}");
}

pub fn notice(message: &str) {
    println!("\n{} {message}", Colour::Green.paint("✓"));
}

pub fn warning(message: &str) {
    println!("\n{} {message}", Colour::Yellow.paint("!"));
}

/// One-off yes/no prompt, used outside the interactive loop.
pub async fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt}");
    use std::io::Write;
    std::io::stdout().flush()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let answer = lines.next_line().await?.unwrap_or_default();
    Ok(answer.trim().eq_ignore_ascii_case("yes"))
}
