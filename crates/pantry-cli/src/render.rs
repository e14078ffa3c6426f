//! Plain-text inventory rendering

use chrono::NaiveDate;
use pantry_core::{InventoryItem, SubmitOutcome};
use std::fmt::Write;

const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

/// Inventory as an aligned table; expired dates are marked
pub(crate) fn inventory_table(items: &[&InventoryItem], today: NaiveDate, color: bool) -> String {
    if items.is_empty() {
        return "No items found.\n".to_string();
    }

    let name_width = items
        .iter()
        .map(|i| i.name.as_str().chars().count())
        .max()
        .unwrap_or(0)
        .max("NAME".len());
    let category_width = items
        .iter()
        .map(|i| i.category_label().chars().count())
        .max()
        .unwrap_or(0)
        .max("CATEGORY".len());

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<name_width$}  {:>8}  {:<9}  {:<category_width$}  EXPIRES",
        "NAME", "QTY", "UNIT", "CATEGORY"
    );
    for item in items {
        let _ = writeln!(
            out,
            "{:<name_width$}  {:>8}  {:<9}  {:<category_width$}  {}",
            item.name.as_str(),
            item.quantity.to_string(),
            item.unit.as_str(),
            item.category_label(),
            expiry_cell(item, today, color),
        );
    }
    out
}

fn expiry_cell(item: &InventoryItem, today: NaiveDate, color: bool) -> String {
    let Some(date) = item.expiry_date.as_deref() else {
        return "-".to_string();
    };
    match (item.is_expired(today), color) {
        (false, _) => date.to_string(),
        (true, true) => format!("{RED}{date}{RESET}"),
        (true, false) => format!("{date} (expired)"),
    }
}

/// One-line summary of a submission
pub(crate) fn submit_summary(outcome: &SubmitOutcome) -> String {
    let item = &outcome.item;
    let verb = if outcome.merged { "Updated" } else { "Added" };
    let mut line = format!("{verb} {}: {} {}", item.name, item.quantity, item.unit);
    if outcome.image_uploaded {
        line.push_str(" (image uploaded)");
    }
    line
}
