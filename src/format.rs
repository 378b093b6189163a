use crossterm::style::{Color, Stylize};
use itertools::Itertools;
use unicode_width::UnicodeWidthStr;

/// Placeholder printed for a time or difference that was not recorded.
pub const MISSING: &str = "????";

/// Most decimal places a time is ever printed with.
pub const MAX_DECIMAL_PLACES: usize = 6;

/// Formats a number of seconds as `S.d`, `M:SS.d` or `H:MM:SS.d`.
///
/// Non-finite values print as `NA`. With `show_plus`, non-negative values get
/// a leading `+` so differences read naturally. `decimals` is capped at
/// [`MAX_DECIMAL_PLACES`].
pub fn make_time_string(seconds: f64, decimals: usize, show_plus: bool) -> String {
    if !seconds.is_finite() {
        return "NA".to_string();
    }
    let decimals = decimals.min(MAX_DECIMAL_PLACES);

    let units_per_second = 10u64.pow(decimals as u32);
    let total_units = (seconds.abs() * units_per_second as f64).round() as u64;

    let sign = if seconds < 0.0 && total_units > 0 {
        "-"
    } else if show_plus {
        "+"
    } else {
        ""
    };

    let units_per_minute = 60 * units_per_second;
    let units_per_hour = 60 * units_per_minute;
    let hours = total_units / units_per_hour;
    let minutes = (total_units % units_per_hour) / units_per_minute;
    let second_units = total_units % units_per_minute;
    let secs = second_units as f64 / units_per_second as f64;

    let padded_width = if decimals > 0 { 3 + decimals } else { 2 };

    if hours > 0 {
        format!("{sign}{hours}:{minutes:02}:{secs:0padded_width$.decimals$}")
    } else if minutes > 0 {
        format!("{sign}{minutes}:{secs:0padded_width$.decimals$}")
    } else {
        format!("{sign}{secs:.decimals$}")
    }
}

/// Like [`make_time_string`] but prints [`MISSING`] for an unrecorded time.
pub fn time_or_missing(seconds: f64, decimals: usize) -> String {
    if seconds.is_nan() {
        MISSING.to_string()
    } else {
        make_time_string(seconds, decimals, false)
    }
}

/// Wraps `text` in terminal escape codes for a bold, colored rendering.
pub fn paint_bold(text: &str, color: Color) -> String {
    format!("{}", text.with(color).bold())
}

/// Lays out a left-aligned plain text table with one header row.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let columns = headers.len();
    let widths: Vec<usize> = (0..columns)
        .map(|column| {
            rows.iter()
                .filter_map(|row| row.get(column))
                .chain(std::iter::once(&headers[column]))
                .map(|cell| cell.width())
                .max()
                .unwrap_or(0)
        })
        .collect();

    let render_row = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| {
                let padding = width.saturating_sub(cell.width());
                format!("{cell}{}", " ".repeat(padding))
            })
            .join("  ")
            .trim_end()
            .to_string()
    };

    std::iter::once(render_row(headers))
        .chain(std::iter::once(
            widths.iter().map(|&width| "-".repeat(width)).join("  "),
        ))
        .chain(rows.iter().map(|row| render_row(row)))
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_time_string() {
        assert_eq!(make_time_string(12.63, 1, false), "12.6");
        assert_eq!(make_time_string(-123.4, 1, false), "-2:03.4");
        assert_eq!(make_time_string(7583.03, 1, true), "+2:06:23.0");
        assert_eq!(make_time_string(f64::INFINITY, 1, false), "NA");
        assert_eq!(make_time_string(f64::NAN, 1, true), "NA");
    }

    #[test]
    fn test_make_time_string_rounds_across_minute() {
        assert_eq!(make_time_string(59.96, 1, false), "1:00.0");
        assert_eq!(make_time_string(61.0, 0, false), "1:01");
        assert_eq!(make_time_string(3.14159, 3, false), "3.142");
    }

    #[test]
    fn test_make_time_string_signs() {
        assert_eq!(make_time_string(2.0, 1, true), "+2.0");
        assert_eq!(make_time_string(-0.01, 1, true), "+0.0");
        assert_eq!(make_time_string(-0.5, 1, true), "-0.5");
    }

    #[test]
    fn test_make_time_string_caps_decimal_places() {
        assert_eq!(make_time_string(1.5, 25, false), "1.500000");
        assert_eq!(make_time_string(90.0, usize::MAX, true), "+1:30.000000");
    }

    #[test]
    fn test_time_or_missing() {
        assert_eq!(time_or_missing(f64::NAN, 1), MISSING);
        assert_eq!(time_or_missing(4.25, 2), "4.25");
    }

    #[test]
    fn test_paint_bold_keeps_text() {
        let painted = paint_bold("12.0", Color::Green);
        assert!(painted.contains("12.0"));
    }

    #[test]
    fn test_render_table_aligns_columns() {
        let table = render_table(
            &["segment".to_string(), "min".to_string()],
            &[
                vec!["a".to_string(), "1.0".to_string()],
                vec!["longer".to_string(), "12.0".to_string()],
            ],
        );
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "segment  min");
        assert_eq!(lines[1], "-------  ----");
        assert_eq!(lines[2], "a        1.0");
        assert_eq!(lines[3], "longer   12.0");
    }
}
