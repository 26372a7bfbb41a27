//! Directive Parser
//!
//! Classifies one command-file line. Structural markers are tried in a fixed
//! order and the permissive motion-command fallback only runs once all of
//! them have failed, so it can never shadow a marker.

use regex::Regex;
use serde::Serialize;
use std::io::{self, BufRead};
use std::sync::LazyLock;

static SLICE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*;\s*<\s*Slice\s*>\s*(\d+|blank)\s*$").expect("slice regex is valid")
});

static DELAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*;\s*<\s*Delay\s*>\s*(\d+)\s*$").expect("delay regex is valid")
});

static SLICE_COUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*;\s*Number\s*of\s*Slices\s*=\s*(\d+)\s*$").expect("slice count regex is valid")
});

static LIFT_SPEED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*;\s*\(?\s*Z\s*Lift\s*Feed\s*Rate\s*=\s*([\d.]+)\s*(?:mm/s)?\s*\)?\s*$")
        .expect("lift speed regex is valid")
});

static LIFT_DISTANCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*;\s*\(?\s*Lift\s*Distance\s*=\s*([\d.]+)\s*(?:mm)?\s*\)?\s*$")
        .expect("lift distance regex is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SliceMarker {
    Blank,
    Index(u32),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Directive {
    Slice(SliceMarker),
    /// Milliseconds.
    Delay(u64),
    SliceCount(u32),
    /// mm/s
    LiftSpeed(f64),
    /// mm
    LiftDistance(f64),
    Motion(String),
    Comment,
}

impl Directive {
    pub fn parse(line: &str) -> Directive {
        if let Some(value) = capture(&SLICE, line) {
            return if value.eq_ignore_ascii_case("blank") {
                Directive::Slice(SliceMarker::Blank)
            } else {
                value
                    .parse()
                    .map_or(Directive::Comment, |index| Directive::Slice(SliceMarker::Index(index)))
            };
        }

        if let Some(value) = capture(&DELAY, line) {
            return value.parse().map_or(Directive::Comment, Directive::Delay);
        }

        if let Some(value) = capture(&SLICE_COUNT, line) {
            return value.parse().map_or(Directive::Comment, Directive::SliceCount);
        }

        if let Some(value) = capture(&LIFT_SPEED, line) {
            return value.parse().map_or(Directive::Comment, Directive::LiftSpeed);
        }

        if let Some(value) = capture(&LIFT_DISTANCE, line) {
            return value.parse().map_or(Directive::Comment, Directive::LiftDistance);
        }

        let command = line.split(';').next().unwrap_or_default().trim();
        if command.is_empty() {
            Directive::Comment
        } else {
            Directive::Motion(command.to_string())
        }
    }
}

fn capture<'a>(pattern: &Regex, line: &'a str) -> Option<&'a str> {
    pattern.captures(line).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// Lazily classifies a command stream, one line at a time.
///
/// Yields `(line number, directive)` with 1-based line numbers. Bytes that
/// aren't valid UTF-8 are replaced, so only real read failures are errors.
pub struct Directives<R> {
    reader: R,
    buf: Vec<u8>,
    line: usize,
}

impl<R: BufRead> Directives<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, buf: vec![], line: 0 }
    }
}

impl<R: BufRead> Iterator for Directives<R> {
    type Item = io::Result<(usize, Directive)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                if self.buf.last() == Some(&b'\n') {
                    self.buf.pop();
                }
                if self.buf.last() == Some(&b'\r') {
                    self.buf.pop();
                }
                self.line += 1;
                let text = String::from_utf8_lossy(&self.buf);
                Some(Ok((self.line, Directive::parse(&text))))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_markers() {
        assert_eq!(Directive::parse("; <Slice> 12"), Directive::Slice(SliceMarker::Index(12)));
        assert_eq!(Directive::parse(";<slice>BLANK"), Directive::Slice(SliceMarker::Blank));
        assert_eq!(Directive::parse("  ; < Slice > Blank  "), Directive::Slice(SliceMarker::Blank));
        assert_eq!(Directive::parse("; <Slice> 0\r"), Directive::Slice(SliceMarker::Index(0)));
    }

    #[test]
    fn declarations() {
        assert_eq!(Directive::parse("; <Delay> 1500"), Directive::Delay(1500));
        assert_eq!(Directive::parse(";Number of Slices = 214"), Directive::SliceCount(214));
        assert_eq!(Directive::parse("; number OF slices=3"), Directive::SliceCount(3));
        assert_eq!(Directive::parse(";(Z Lift Feed Rate = 50.0 mm/s )"), Directive::LiftSpeed(50.0));
        assert_eq!(Directive::parse("; Z Lift Feed Rate = 2.5"), Directive::LiftSpeed(2.5));
        assert_eq!(Directive::parse(";(Lift Distance = 5.0 mm )"), Directive::LiftDistance(5.0));
        assert_eq!(Directive::parse(";lift distance=3"), Directive::LiftDistance(3.0));
    }

    #[test]
    fn motion_commands_strip_comments() {
        assert_eq!(Directive::parse("G1 Z5 F100"), Directive::Motion("G1 Z5 F100".into()));
        assert_eq!(Directive::parse("  M106 S255 ; fan on"), Directive::Motion("M106 S255".into()));
        assert_eq!(Directive::parse("G28\r"), Directive::Motion("G28".into()));
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        assert_eq!(Directive::parse(""), Directive::Comment);
        assert_eq!(Directive::parse("    "), Directive::Comment);
        assert_eq!(Directive::parse(";(****Build Parameters****)"), Directive::Comment);
        assert_eq!(Directive::parse("; <Slice> twelve"), Directive::Comment);
    }

    #[test]
    fn unparseable_numbers_are_ignored() {
        assert_eq!(Directive::parse("; Lift Distance = 1.2.3"), Directive::Comment);
        assert_eq!(Directive::parse("; <Delay> 99999999999999999999999"), Directive::Comment);
    }

    #[test]
    fn markers_win_over_motion_fallback() {
        // Every marker line is also non-empty text; none may become motion.
        for line in ["; <Slice> 1", "; <Delay> 5", "; Number of Slices = 1"] {
            assert!(!matches!(Directive::parse(line), Directive::Motion(_)), "{line}");
        }
    }

    #[test]
    fn stream_numbers_lines() {
        let input = "; Number of Slices = 1\r\nG28\n\n; <Slice> 0\n";
        let parsed: Vec<_> = Directives::new(input.as_bytes()).map(|r| r.unwrap()).collect();
        assert_eq!(parsed, vec![
            (1, Directive::SliceCount(1)),
            (2, Directive::Motion("G28".into())),
            (3, Directive::Comment),
            (4, Directive::Slice(SliceMarker::Index(0))),
        ]);
    }

    #[test]
    fn stream_tolerates_invalid_utf8() {
        let input: &[u8] = b"; Resin temp 25\xB0C\nG1 Z5 ; \xFF\xFE\n; <Slice> 0";
        let parsed: Vec<_> = Directives::new(input).map(|r| r.unwrap()).collect();
        assert_eq!(parsed, vec![
            (1, Directive::Comment),
            (2, Directive::Motion("G1 Z5".into())),
            (3, Directive::Slice(SliceMarker::Index(0))),
        ]);
    }
}
