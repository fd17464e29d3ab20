//! Number and text formatting utilities.
//!
//! Shared by the scan summary and the CSV writer so both present counts and
//! name lists the same way.

/// Formats a number with comma separators for thousands.
///
/// # Examples
///
/// ```
/// use vault_inventory::utils::format::format_number;
///
/// assert_eq!(format_number(1234), "1,234");
/// assert_eq!(format_number(1234567), "1,234,567");
/// assert_eq!(format_number(42), "42");
/// ```
pub fn format_number(n: usize) -> String {
    let digits = n.to_string();
    let mut result = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// Joins names for a single CSV cell.
///
/// ```
/// use vault_inventory::utils::format::join_names;
///
/// assert_eq!(join_names(&["app".to_string(), "ops (root)".to_string()]), "app,ops (root)");
/// ```
pub fn join_names(names: &[String]) -> String {
    names.join(",")
}
