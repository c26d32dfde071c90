use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn create_cyan_header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(*label).fg(TableColor::Cyan))
        .collect()
}

/// Formats seconds as `1h 02m`, `4m 05s` or `12s`.
pub fn format_duration(seconds: f64) -> String {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let total = seconds.max(0.0).round() as u64;
    let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}h {minutes:02}m")
    } else if minutes > 0 {
        format!("{minutes}m {secs:02}s")
    } else {
        format!("{secs}s")
    }
}

/// Percent change cell: red for significant regressions, green for
/// significant improvements, dim otherwise.
pub fn color_coded_change_cell(percent: f64, significant: bool) -> Cell {
    let text = format!("{percent:+.1}%");
    match (significant, percent > 0.0) {
        (true, true) => Cell::new(text).fg(TableColor::Red),
        (true, false) => Cell::new(text).fg(TableColor::Green),
        (false, _) => Cell::new(text).fg(TableColor::DarkGrey),
    }
}

pub fn color_coded_p_value_cell(p_value: f64, significance: f64) -> Cell {
    let text = if p_value < 0.001 {
        "<0.001".to_string()
    } else {
        format!("{p_value:.3}")
    };
    if p_value < significance {
        Cell::new(text).fg(TableColor::Yellow)
    } else {
        Cell::new(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(12.4), "12s");
        assert_eq!(format_duration(245.0), "4m 05s");
        assert_eq!(format_duration(3720.0), "1h 02m");
        assert_eq!(format_duration(-3.0), "0s");
    }
}
