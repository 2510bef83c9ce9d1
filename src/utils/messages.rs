/// Pure functions for formatting error and success messages (Discord-agnostic)

/// Format a validation error message with emoji
pub fn format_error(message: &str) -> String {
    format!("❌ {}", message)
}

/// Format a success message with emoji
pub fn format_success(message: &str) -> String {
    format!("✅ {}", message)
}

/// Format a warning message with emoji
pub fn format_warning(message: &str) -> String {
    format!("⚠️ {}", message)
}

/// Build an apologetic message for an infrastructure failure
pub fn build_apology() -> String {
    format_error("Something went wrong on my end. Please try again later.")
}
