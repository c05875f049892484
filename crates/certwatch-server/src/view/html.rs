use chrono::{DateTime, Utc};

use super::{StatusRow, UrgencySummary};

const TEMPLATE: &str = include_str!("../../templates/dashboard.html");

/// Renders the status page for already-ordered rows.
pub fn render_dashboard(rows: &[StatusRow], generated_at: DateTime<Utc>) -> String {
    let summary = UrgencySummary::from_rows(rows);
    let table_rows = build_table_rows(rows);

    // Row markup goes in last so host-controlled text is never re-scanned for
    // placeholders.
    TEMPLATE
        .replace("{{critical_count}}", &summary.critical.to_string())
        .replace("{{warning_count}}", &summary.warning.to_string())
        .replace("{{healthy_count}}", &summary.healthy.to_string())
        .replace(
            "{{generated_at}}",
            &generated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        )
        .replace("{{table_rows}}", &table_rows)
}

fn build_table_rows(rows: &[StatusRow]) -> String {
    if rows.is_empty() {
        return "<tr><td colspan=\"4\" class=\"empty\">No certificates observed yet</td></tr>"
            .to_string();
    }

    let mut html = String::new();
    for row in rows {
        let obs = &row.observation;
        html.push_str(&format!(
            "<tr class=\"{class}\">\
              <td>{domain}</td>\
              <td>{expiry}</td>\
              <td>{days}</td>\
              <td>{checked}</td>\
            </tr>\n",
            class = row.urgency.css_class(),
            domain = html_escape(&obs.domain),
            expiry = obs.expiry_date.format("%Y-%m-%d"),
            days = obs.days_left,
            checked = obs.last_checked.format("%Y-%m-%d %H:%M:%S"),
        ));
    }
    html
}

pub(crate) fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
