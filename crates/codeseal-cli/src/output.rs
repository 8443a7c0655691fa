use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

static JSON_MODE: AtomicBool = AtomicBool::new(false);

pub fn init(json: bool) {
    JSON_MODE.store(json, Ordering::Relaxed);
}

pub fn is_json() -> bool {
    JSON_MODE.load(Ordering::Relaxed)
}

/// Pretty JSON on stdout.
pub fn print<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    println!("{s}");
    Ok(())
}

/// Status of one line of human output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Ok,
    Warn,
    Fail,
}

impl Tone {
    fn color(self) -> Color {
        match self {
            Self::Ok => Color::Blue,
            Self::Warn => Color::Yellow,
            Self::Fail => Color::Red,
        }
    }
}

/// Colored headline on stdout (stderr for failures). No-op in JSON mode.
pub fn headline(tone: Tone, msg: &str) {
    if is_json() {
        return;
    }
    let mut stream = match tone {
        Tone::Fail => stderr(),
        _ => stdout(),
    };
    let _ = stream.set_color(ColorSpec::new().set_fg(Some(tone.color())).set_bold(true));
    let _ = writeln!(stream, "{msg}");
    let _ = stream.reset();
}

/// Indented detail line with a colored marker. No-op in JSON mode.
pub fn item(tone: Tone, msg: &str) {
    if is_json() {
        return;
    }
    let marker = match tone {
        Tone::Ok => "ok",
        Tone::Warn => "--",
        Tone::Fail => "!!",
    };
    let mut stream = stdout();
    let _ = write!(stream, "  ");
    let _ = stream.set_color(ColorSpec::new().set_fg(Some(tone.color())));
    let _ = write!(stream, "{marker}");
    let _ = stream.reset();
    let _ = writeln!(stream, " {msg}");
}

pub fn stdout() -> StandardStream {
    StandardStream::stdout(ColorChoice::Auto)
}

pub fn stderr() -> StandardStream {
    StandardStream::stderr(ColorChoice::Auto)
}
