//! Terminal styling
//!
//! Semantic colors via the [`Stylize`] trait. Color support detection is
//! delegated to `owo-colors` (respects `NO_COLOR`, `CLICOLOR`,
//! `CLICOLOR_FORCE` and TTY detection).
//!
//! | Method        | Color  | Use                                |
//! |---------------|--------|------------------------------------|
//! | `.accent()`   | Cyan   | repository names, PR numbers       |
//! | `.success()`  | Green  | merged, approved, passing          |
//! | `.error()`    | Red    | failures (stderr)                  |
//! | `.warn()`     | Yellow | pending, blocked, missing branches |
//! | `.muted()`    | Dim    | hints, URLs                        |
//! | `.emphasis()` | Bold   | headers                            |

use indicatif::ProgressStyle;
use owo_colors::{OwoColorize, Style};
use std::fmt::{self, Display};
use std::sync::LazyLock;

pub use owo_colors::Stream;

const ACCENT: Style = Style::new().cyan();
const SUCCESS: Style = Style::new().green();
const ERROR: Style = Style::new().red();
const WARN: Style = Style::new().yellow();
const MUTED: Style = Style::new().dimmed();
const EMPHASIS: Style = Style::new().bold();

/// A value with semantic styling applied
#[derive(Clone, Debug)]
pub struct Styled<T> {
    value: T,
    style: Style,
    stream: Stream,
}

impl<T> Styled<T> {
    const fn new(value: T, style: Style, stream: Stream) -> Self {
        Self {
            value,
            style,
            stream,
        }
    }
}

impl<T: Display> Display for Styled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.value
                .if_supports_color(self.stream, |v| v.style(self.style))
        )
    }
}

/// Extension trait for semantic terminal styling
pub trait Stylize: Display {
    /// Cyan, for primary information
    fn accent(&self) -> Styled<&Self> {
        Styled::new(self, ACCENT, Stream::Stdout)
    }

    /// Green, for completed or passing states
    fn success(&self) -> Styled<&Self> {
        Styled::new(self, SUCCESS, Stream::Stdout)
    }

    /// Red, for failures (stderr)
    fn error(&self) -> Styled<&Self> {
        Styled::new(self, ERROR, Stream::Stderr)
    }

    /// Yellow, for states needing attention
    fn warn(&self) -> Styled<&Self> {
        Styled::new(self, WARN, Stream::Stdout)
    }

    /// Dim, for secondary information
    fn muted(&self) -> Styled<&Self> {
        Styled::new(self, MUTED, Stream::Stdout)
    }

    /// Bold, for headers
    fn emphasis(&self) -> Styled<&Self> {
        Styled::new(self, EMPHASIS, Stream::Stdout)
    }
}

impl<T: Display + ?Sized> Stylize for T {}

/// Success checkmark
pub const CHECK: &str = "✓";

/// Failure cross
pub const CROSS: &str = "✗";

/// Pending marker
pub const DOT: &str = "•";

/// Green checkmark
pub const fn check() -> Styled<&'static str> {
    Styled::new(CHECK, SUCCESS, Stream::Stdout)
}

/// Red cross
pub const fn cross() -> Styled<&'static str> {
    Styled::new(CROSS, ERROR, Stream::Stdout)
}

/// Yellow dot
pub const fn pending() -> Styled<&'static str> {
    Styled::new(DOT, WARN, Stream::Stdout)
}

/// Checkmark or cross
pub const fn mark(ok: bool) -> Styled<&'static str> {
    if ok { check() } else { cross() }
}

const fn to_hyperlink_stream(stream: Stream) -> supports_hyperlinks::Stream {
    match stream {
        Stream::Stdout => supports_hyperlinks::Stream::Stdout,
        Stream::Stderr => supports_hyperlinks::Stream::Stderr,
    }
}

/// Clickable URL (OSC 8) where the terminal supports it
pub fn hyperlink_url(stream: Stream, url: &str) -> String {
    if supports_hyperlinks::on(to_hyperlink_stream(stream)) {
        terminal_link::Link::new(url, url).to_string()
    } else {
        url.to_string()
    }
}

static SPINNER: LazyLock<ProgressStyle> = LazyLock::new(|| {
    ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .expect("hardcoded spinner template is valid")
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
});

/// Cyan dots spinner
pub fn spinner_style() -> ProgressStyle {
    SPINNER.clone()
}
