use std::io::{BufRead, Lines};
use tracing::error;
use zwatch_core::{InvalidInput, ValueSource};

/// One value per line from any buffered reader.
///
/// Blank lines are ignored. Lines that are not numbers come back as
/// `InvalidInput::Unparsable` so the monitor's policy decides their fate.
pub struct LineSource<R> {
    lines: Lines<R>,
    line_no: u64,
}

impl<R: BufRead> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }

    /// Number of lines consumed so far, blank ones included.
    pub fn line_no(&self) -> u64 {
        self.line_no
    }
}

impl<R: BufRead> ValueSource for LineSource<R> {
    fn next_value(&mut self) -> Option<Result<f64, InvalidInput>> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => {
                    error!(line = self.line_no + 1, error = %e, "Input read failed, ending stream.");
                    return None;
                }
            };
            self.line_no += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            return Some(
                trimmed
                    .parse::<f64>()
                    .map_err(|_| InvalidInput::Unparsable(trimmed.to_string())),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parses_lines() {
        let mut source = LineSource::new(Cursor::new("1.5\n\n  -2\nabc\n1e3\n"));

        assert_eq!(source.next_value(), Some(Ok(1.5)));
        assert_eq!(source.next_value(), Some(Ok(-2.0)));
        assert_eq!(
            source.next_value(),
            Some(Err(InvalidInput::Unparsable("abc".to_string())))
        );
        assert_eq!(source.next_value(), Some(Ok(1000.0)));
        assert_eq!(source.next_value(), None);
        assert_eq!(source.line_no(), 5);
    }

    #[test]
    fn test_non_finite_text_reaches_detector() {
        // "NaN" parses as a float; the detector is the one that rejects it
        let mut source = LineSource::new(Cursor::new("NaN\ninf\n"));
        assert!(matches!(source.next_value(), Some(Ok(v)) if v.is_nan()));
        assert_eq!(source.next_value(), Some(Ok(f64::INFINITY)));
    }
}
