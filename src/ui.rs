use colored::Colorize;
use lifecycle::ApplyResult;

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

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// One-line outcome of an install or uninstall.
pub fn apply_result(label: &str, result: &ApplyResult) {
    match result {
        ApplyResult::Installed | ApplyResult::Removed => println!("  {} {}", "✓".green(), label),
        ApplyResult::Rejected { reason } => {
            println!("  {} {} {}", "○".dimmed(), label, format!("(skipped: {reason})").dimmed());
        }
        ApplyResult::Failed { error } => {
            println!("  {} {}: {}", "✗".red(), label, error);
        }
    }
}

/// `count noun` with a naive plural.
pub fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plural() {
        assert_eq!(plural(0, "package"), "0 packages");
        assert_eq!(plural(1, "package"), "1 package");
        assert_eq!(plural(3, "action"), "3 actions");
    }
}
