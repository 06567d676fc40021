//! Text rendering helpers for human-friendly error and diagnostic output.
//!
//! Formats dependency chains and registry listings for error messages
//! and the container's `describe` output.

use std::fmt::Write;

/// Renders a dependency chain as a single readable line.
///
/// # Examples
/// ```
/// use mawrid_support::rendering::render_chain;
///
/// let chain = vec!["Greeter", "UserService", "Database"];
/// assert_eq!(render_chain(&chain), "Greeter → UserService → Database");
/// ```
pub fn render_chain(chain: &[impl AsRef<str>]) -> String {
    chain
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(" → ")
}

/// One registry entry for [`render_binding_table`].
#[derive(Debug, Clone)]
pub struct BindingRow {
    /// Scope level name, e.g. `app`.
    pub scope: String,
    /// What kind of binding this is, e.g. `factory`, `alias`, `context`.
    pub kind: String,
    /// Rendered key of the binding.
    pub key: String,
}

/// Renders registry entries as an aligned listing:
///
/// ```text
/// [app]     factory  Database
/// [app]     factory  UserService
/// [request] context  RequestId
/// ```
pub fn render_binding_table(rows: &[BindingRow]) -> String {
    let scope_width = rows.iter().map(|r| r.scope.len() + 2).max().unwrap_or(0);
    let kind_width = rows.iter().map(|r| r.kind.len()).max().unwrap_or(0);

    let mut out = String::new();
    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = write!(
            out,
            "{:<scope_width$} {:<kind_width$}  {}",
            format!("[{}]", row.scope),
            row.kind,
            row.key,
        );
    }
    out
}
