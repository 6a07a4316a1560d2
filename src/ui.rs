use colored::Colorize;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print a step indicator
pub fn step(num: usize, total: usize, msg: &str) {
    println!("{} {}", format!("[{num}/{total}]").blue().bold(), msg);
}

/// Print a line of a change list: `+` added, `-` removed, `~` modified
pub fn change(sign: char, msg: &str) {
    let sign = match sign {
        '+' => "+".green(),
        '-' => "-".red(),
        _ => "~".yellow(),
    };
    println!("  {sign} {msg}");
}

/// Print an ID/NAME table
pub fn table(rows: &[(String, String)]) {
    let width = id_width(rows);
    println!("{}", format!("{:<width$}  NAME", "ID").bold());
    for (id, name) in rows {
        println!("{id:<width$}  {name}");
    }
}

fn id_width(rows: &[(String, String)]) -> usize {
    rows.iter()
        .map(|(id, _)| id.chars().count())
        .max()
        .unwrap_or(0)
        .max("ID".len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_width() {
        assert_eq!(id_width(&[]), 2);
        let rows = vec![
            ("c-1:p-1".to_string(), "a".to_string()),
            ("c-1:p-123".to_string(), "b".to_string()),
        ];
        assert_eq!(id_width(&rows), 9);
    }
}
