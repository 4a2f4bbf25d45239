// HTML drift and data summary reports
//
// Self-contained pages with inline styles, so a saved report opens anywhere.

use std::collections::BTreeMap;
use std::fmt::Write;

use super::aggregator::DriftSummary;
use super::reference::ReferenceDataset;
use super::stats::ColumnStats;
use crate::predictions::{FeatureVector, PredictionRecord};

const STYLE: &str = "body{font-family:sans-serif;margin:2em;color:#222}\
table{border-collapse:collapse;margin:1em 0}\
th,td{border:1px solid #ccc;padding:4px 10px;text-align:right}\
th{background:#f3f3f3}td.name{text-align:left}\
.drift{color:#b00020;font-weight:bold}.ok{color:#1b7f3b}";

/// Escape text for HTML element and attribute content
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title>\
         <style>{style}</style></head><body>\n<h1>{title}</h1>\n{body}</body></html>\n",
        title = escape_html(title),
        style = STYLE,
    )
}

/// Error page served in place of a report
pub fn error_page(message: &str) -> String {
    page(
        "Report unavailable",
        &format!("<p class=\"drift\">{}</p>\n", escape_html(message)),
    )
}

/// Dataset verdict plus one row per monitored column
pub fn drift_report_html(summary: &DriftSummary) -> String {
    let mut body = String::new();

    let verdict = if summary.dataset_drift_detected {
        "<span class=\"drift\">Dataset drift detected</span>"
    } else {
        "<span class=\"ok\">No dataset drift</span>"
    };
    let _ = writeln!(body, "<p>{}</p>", verdict);
    let _ = writeln!(
        body,
        "<p>Drifted columns: {} of {} (share {:.3}). Reference rows: {}. Current rows: {}.</p>",
        summary.drifted_columns_count,
        summary.columns.len(),
        summary.drift_share,
        summary.reference_rows,
        summary.num_rows
    );
    let _ = writeln!(
        body,
        "<p>Computed at {}</p>",
        summary.computed_at.to_rfc3339()
    );

    body.push_str(
        "<table>\n<tr><th>Column</th><th>Test</th><th>Statistic</th>\
         <th>p-value</th><th>Threshold</th><th>Drift</th></tr>\n",
    );
    for column in &summary.columns {
        let flag = if column.drift_detected {
            "<span class=\"drift\">yes</span>"
        } else {
            "<span class=\"ok\">no</span>"
        };
        let _ = writeln!(
            body,
            "<tr><td class=\"name\">{}</td><td>{}</td><td>{:.4}</td><td>{:.4e}</td><td>{}</td><td>{}</td></tr>",
            escape_html(&column.column_name),
            escape_html(&column.stat_test),
            column.statistic,
            column.p_value,
            column.threshold,
            flag
        );
    }
    body.push_str("</table>\n");

    body.push_str("<h2>Predicted classes (current window)</h2>\n");
    body.push_str(&distribution_table(&summary.class_distribution));

    page("Data Drift Report", &body)
}

/// Per-column descriptive statistics for both windows plus class counts
pub fn summary_report_html(reference: &ReferenceDataset, current: &[PredictionRecord]) -> String {
    let mut body = String::new();
    let _ = writeln!(
        body,
        "<p>Reference rows: {}. Current rows: {}.</p>",
        reference.len(),
        current.len()
    );

    body.push_str(
        "<table>\n<tr><th>Column</th><th>Dataset</th><th>Count</th><th>Mean</th><th>Std</th>\
         <th>Min</th><th>25%</th><th>50%</th><th>75%</th><th>Max</th></tr>\n",
    );
    for name in FeatureVector::NAMES {
        let reference_values = reference.column(name).unwrap_or_default();
        let current_values: Vec<f64> = current.iter().filter_map(|r| r.features.get(name)).collect();
        for (label, values) in [("reference", &reference_values), ("current", &current_values)] {
            body.push_str(&stats_row(name, label, ColumnStats::describe(values)));
        }
    }
    body.push_str("</table>\n");

    let mut current_classes = BTreeMap::new();
    for record in current {
        *current_classes
            .entry(record.prediction_name.clone())
            .or_insert(0u64) += 1;
    }
    body.push_str("<h2>Reference classes</h2>\n");
    body.push_str(&distribution_table(&reference.class_distribution()));
    body.push_str("<h2>Predicted classes (current window)</h2>\n");
    body.push_str(&distribution_table(&current_classes));

    page("Data Summary Report", &body)
}

fn stats_row(column: &str, dataset: &str, stats: Option<ColumnStats>) -> String {
    match stats {
        Some(s) => format!(
            "<tr><td class=\"name\">{}</td><td class=\"name\">{}</td><td>{}</td>\
             <td>{:.3}</td><td>{:.3}</td><td>{:.3}</td><td>{:.3}</td><td>{:.3}</td>\
             <td>{:.3}</td><td>{:.3}</td></tr>\n",
            column, dataset, s.count, s.mean, s.std, s.min, s.p25, s.median, s.p75, s.max
        ),
        None => format!(
            "<tr><td class=\"name\">{}</td><td class=\"name\">{}</td><td>0</td>\
             <td colspan=\"7\">no data</td></tr>\n",
            column, dataset
        ),
    }
}

fn distribution_table(distribution: &BTreeMap<String, u64>) -> String {
    let mut table = String::from("<table>\n<tr><th>Class</th><th>Count</th></tr>\n");
    for (class, count) in distribution {
        let _ = writeln!(
            table,
            "<tr><td class=\"name\">{}</td><td>{}</td></tr>",
            escape_html(class),
            count
        );
    }
    table.push_str("</table>\n");
    table
}
