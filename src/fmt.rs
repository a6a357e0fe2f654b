const DESC_TRUNC_LEN: usize = 30;

/// Format a float as a dollar amount with thousands separators: $1,234.56
pub fn money(val: f64) -> String {
    let negative = val < 0.0 && (val * 100.0).round() != 0.0;
    let cents = format!("{:.2}", val.abs());
    let (int_part, dec_part) = cents.split_once('.').unwrap_or((&cents, "00"));

    let mut with_commas = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    let with_commas: String = with_commas.chars().rev().collect();

    if negative {
        format!("-${with_commas}.{dec_part}")
    } else {
        format!("${with_commas}.{dec_part}")
    }
}

/// Whole-dollar rendering used by the debt table: 1,235
pub fn whole(val: f64) -> String {
    let s = money(val.round());
    s.trim_end_matches(".00").replacen('$', "", 1)
}

pub fn format_bytes(bytes: u64) -> String {
    match bytes {
        b if b >= 1024 * 1024 => format!("{:.1} MB", b as f64 / (1024.0 * 1024.0)),
        b if b >= 1024 => format!("{:.1} KB", b as f64 / 1024.0),
        b => format!("{b} B"),
    }
}

pub fn trunc_desc(description: &str) -> String {
    if description.chars().count() <= DESC_TRUNC_LEN {
        description.to_string()
    } else {
        let head: String = description.chars().take(DESC_TRUNC_LEN).collect();
        format!("{head}...")
    }
}
