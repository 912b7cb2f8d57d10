//! Rendering of predictions: terminal text, JSON and the HTML page.

use crate::error::ServingResult;
use crate::features::{Feature, FieldKind};
use crate::form::InputForm;
use crate::importance::{FeatureImportance, ImportanceMethod};
use crate::predictor::Prediction;
use serde::Serialize;
use std::fmt::Write as _;
use std::io::Write;

/// Page and app title.
pub const APP_TITLE: &str = "Telecom Churn Prediction App";
/// Heading above the chart.
pub const IMPORTANCE_HEADING: &str = "Feature Importance Analysis";
/// Chart title.
pub const CHART_TITLE: &str = "Feature Importance in Churn Prediction";

const BAR: char = '█';

/// Default chart width in characters.
pub const DEFAULT_CHART_WIDTH: usize = 40;

/// Render a prediction for a terminal.
pub fn render_text<W: Write>(
    writer: &mut W,
    prediction: &Prediction,
    chart_width: usize,
) -> ServingResult<()> {
    writeln!(writer, "{}", prediction.message())?;
    if let Some(p) = prediction.probability {
        writeln!(writer, "Churn probability: {:.1}%", p * 100.0)?;
    }
    if let Some(chart) = &prediction.importance {
        writeln!(writer)?;
        writeln!(writer, "{IMPORTANCE_HEADING}")?;
        writeln!(writer, "{}", text_chart(chart, chart_width))?;
    }
    Ok(())
}

fn method_note(method: ImportanceMethod) -> Option<&'static str> {
    match method {
        ImportanceMethod::Placeholder => Some("(illustrative random values, not derived from the model)"),
        ImportanceMethod::Occlusion => Some("(change in churn probability when reset to baseline)"),
        _ => None,
    }
}

/// Horizontal bar chart, longest bar first.
pub fn text_chart(chart: &FeatureImportance, width: usize) -> String {
    let label_width = chart
        .entries
        .iter()
        .map(|e| e.feature.chart_label().chars().count())
        .max()
        .unwrap_or(0);
    let max = chart.max_value();

    let mut out = String::new();
    let _ = writeln!(out, "{CHART_TITLE}");
    if let Some(note) = method_note(chart.method) {
        let _ = writeln!(out, "{note}");
    }
    for (i, entry) in chart.entries.iter().enumerate() {
        let len = bar_len(entry.value, max, width);
        let _ = write!(
            out,
            "{:<label_width$} | {:<width$} {:.4}",
            entry.feature.chart_label(),
            BAR.to_string().repeat(len),
            entry.value,
        );
        if i + 1 < chart.entries.len() {
            out.push('\n');
        }
    }
    out
}

fn bar_len(value: f64, max: f64, width: usize) -> usize {
    if max <= 0.0 || !value.is_finite() || value <= 0.0 {
        return 0;
    }
    ((value / max) * width as f64).round().clamp(0.0, width as f64) as usize
}

#[derive(Serialize)]
struct JsonPrediction<'a> {
    label: i64,
    churn: bool,
    message: &'a str,
    probability: Option<f64>,
    importance: Option<&'a FeatureImportance>,
}

/// JSON form of a prediction.
pub fn to_json(prediction: &Prediction) -> serde_json::Value {
    serde_json::to_value(JsonPrediction {
        label: prediction.label,
        churn: prediction.outcome.is_churn(),
        message: prediction.message(),
        probability: prediction.probability,
        importance: prediction.importance.as_ref(),
    })
    .unwrap_or(serde_json::Value::Null)
}

/// Write a prediction as pretty JSON.
pub fn render_json<W: Write>(writer: &mut W, prediction: &Prediction) -> ServingResult<()> {
    serde_json::to_writer_pretty(&mut *writer, &to_json(prediction))?;
    writeln!(writer)?;
    Ok(())
}

/// What the message panel of the page shows.
#[derive(Debug, Clone, Copy)]
pub enum PagePanel<'a> {
    /// Nothing submitted yet.
    Idle,
    /// A prediction to display.
    Predicted(&'a Prediction),
    /// The submission was rejected.
    Error(&'a str),
}

/// Escape text for HTML element content and attribute values.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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

fn html_control(out: &mut String, form: &InputForm, feature: Feature) {
    let key = feature.key();
    let label = escape_html(feature.label());
    let _ = write!(out, r#"<label for="{key}">{label}</label>"#);
    match feature.kind() {
        FieldKind::Flag => {
            let current = form.value(feature) as u8;
            let _ = write!(out, r#"<select id="{key}" name="{key}">"#);
            for option in [0u8, 1] {
                let selected = if option == current { " selected" } else { "" };
                let _ = write!(out, r#"<option value="{option}"{selected}>{option}</option>"#);
            }
            out.push_str("</select>");
        }
        FieldKind::Count => {
            let _ = write!(
                out,
                r#"<input type="number" id="{key}" name="{key}" min="0" step="1" value="{}">"#,
                form.display_value(feature)
            );
        }
        FieldKind::Amount => {
            let _ = write!(
                out,
                r#"<input type="number" id="{key}" name="{key}" min="0" step="0.01" value="{}">"#,
                form.display_value(feature)
            );
        }
    }
}

fn html_chart(out: &mut String, chart: &FeatureImportance) {
    let max = chart.max_value();
    let _ = write!(out, "<h3>{}</h3>", escape_html(IMPORTANCE_HEADING));
    let _ = write!(out, r#"<figure class="chart"><figcaption>{}</figcaption>"#, escape_html(CHART_TITLE));
    if let Some(note) = method_note(chart.method) {
        let _ = write!(out, r#"<p class="note">{}</p>"#, escape_html(note));
    }
    for entry in &chart.entries {
        let pct = if max > 0.0 { (entry.value / max * 100.0).clamp(0.0, 100.0) } else { 0.0 };
        let _ = write!(
            out,
            r#"<div class="row"><span class="name">{}</span><span class="track"><span class="bar" style="width:{pct:.1}%"></span></span><span class="val">{:.4}</span></div>"#,
            escape_html(entry.feature.chart_label()),
            entry.value
        );
    }
    out.push_str("</figure>");
}

const STYLE: &str = "body{font-family:sans-serif;margin:0;display:flex}\
aside{width:320px;padding:16px;background:#f0f2f6;min-height:100vh}\
aside label{display:block;margin-top:8px;font-size:14px}\
aside input,aside select{width:100%;padding:4px}\
aside button{margin-top:16px;width:100%;padding:8px}\
main{flex:1;padding:0 24px}\
.header{background-color:#f63350;padding:10px}\
.header h2{color:white;text-align:center}\
.msg{padding:12px;border-radius:4px;margin:16px 0}\
.msg.error{background:#fde2e4;color:#8a1c24}\
.msg.success{background:#dff5e3;color:#1b5e20}\
.chart .row{display:flex;align-items:center;margin:2px 0}\
.chart .name{width:220px;text-align:right;padding-right:8px;font-size:13px}\
.chart .track{flex:1;background:#eee}\
.chart .bar{display:block;height:14px;background:skyblue}\
.chart .val{width:70px;padding-left:8px;font-size:12px}\
.note{font-size:12px;color:#666}";

/// The single page: sidebar form, message panel and chart.
pub fn render_html(form: &InputForm, panel: PagePanel<'_>) -> String {
    let mut out = String::with_capacity(8 * 1024);
    let _ = write!(
        out,
        r#"<!DOCTYPE html><html lang="en"><head><meta charset="utf-8"><title>Telecom Churn Prediction</title><style>{STYLE}</style></head><body>"#
    );
    out.push_str(r#"<aside><h3>User Input Features</h3><form method="post" action="/">"#);
    for feature in Feature::ALL {
        html_control(&mut out, form, feature);
    }
    out.push_str(r#"<button type="submit">Predict Churn</button></form></aside>"#);

    let _ = write!(
        out,
        r#"<main><div class="header"><h2>{}</h2></div>"#,
        escape_html(APP_TITLE)
    );
    match panel {
        PagePanel::Idle => {}
        PagePanel::Error(msg) => {
            let _ = write!(out, r#"<div class="msg error">{}</div>"#, escape_html(msg));
        }
        PagePanel::Predicted(prediction) => {
            let class = if prediction.outcome.is_churn() { "error" } else { "success" };
            let _ = write!(
                out,
                r#"<div class="msg {class}">{}</div>"#,
                escape_html(prediction.message())
            );
            if let Some(chart) = &prediction.importance {
                html_chart(&mut out, chart);
            }
        }
    }
    out.push_str("</main></body></html>");
    out
}
