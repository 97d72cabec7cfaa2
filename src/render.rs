//! HTML rendering of session views

use crate::config::PageConfig;
use crate::form::FieldSpec;
use crate::session::{Submission, View};
use crate::types::prediction::PredictionResult;
use std::collections::HashMap;
use std::fmt::Write;

const STYLE: &str = r#"
body { margin: 0; font-family: sans-serif; min-height: 100vh;
       background: linear-gradient(135deg, #f9f9d2, #fceabb, #ffd194); }
.layout { display: flex; min-height: 100vh; }
aside { width: 260px; padding: 80px 20px 20px; color: white;
        background: linear-gradient(180deg, #2f2f2f, #4a4a4a, #5c5c5c); }
.sidebar-box { background-color: rgba(255, 255, 255, 0.1); border-radius: 15px; padding: 15px;
               box-shadow: 0 4px 8px rgba(0,0,0,0.2); font-size: 15px; line-height: 1.6; }
.sidebar-box h3 { color: #facc15; }
.sidebar-box hr { margin: 10px 0; border: 1px solid #facc15; }
main { flex: 1; max-width: 720px; margin: 0 auto; padding: 40px 20px; }
label { display: block; margin-top: 12px; }
input[type=number], input[type=text] { width: 100%; padding: 6px; }
button.primary { background-color: #22c55e; color: white; border: none; border-radius: 8px;
                 padding: 8px 16px; margin-top: 16px; }
.warning { background: #fef9c3; padding: 10px; border-radius: 6px; }
.error { background: #fee2e2; padding: 10px; border-radius: 6px; }
.success { background: #dcfce7; padding: 10px; border-radius: 6px; }
.go-back { position: fixed; bottom: 20px; right: 20px; }
footer { margin-top: 40px; color: #555; font-size: 13px; }
"#;

/// Escape text for use in HTML content and attribute values
pub fn escape(text: &str) -> String {
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

/// Render a full page for `view`
pub fn page(view: &View, config: &PageConfig) -> String {
    let body = match view {
        View::NameGate { warning } => name_gate(config, warning.as_deref()),
        View::Form {
            username,
            fields,
            values,
            submission,
        } => form(config, username, fields, values, submission),
    };

    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\
         <div class=\"layout\">\n{sidebar}\n<main>\n{body}\n<hr>\n<footer>{footer}</footer>\n</main>\n</div>\n\
         </body>\n</html>\n",
        title = escape(&config.title),
        sidebar = sidebar(config),
        footer = escape(&config.footer),
    )
}

fn sidebar(config: &PageConfig) -> String {
    format!(
        "<aside><div class=\"sidebar-box\">\
         <h3>{title}</h3>\
         <p><strong>Developed by:</strong> {developer}</p>\
         <p><strong>Institute:</strong> {institute}</p>\
         <p><strong>Email:</strong> {email}</p>\
         <hr>\
         <p>This app predicts the risk of diabetes based on user inputs.</p>\
         <p><strong>Not a medical diagnosis.</strong></p>\
         </div></aside>",
        title = escape(&config.title),
        developer = escape(&config.developer),
        institute = escape(&config.institute),
        email = escape(&config.email),
    )
}

fn name_gate(config: &PageConfig, warning: Option<&str>) -> String {
    let mut html = format!("<h1>{}</h1>\n", escape(&config.title));
    html.push_str(
        "<form method=\"post\" action=\"/name\">\
         <label for=\"name\">Please enter your name:</label>\
         <input type=\"text\" id=\"name\" name=\"name\">\
         <button class=\"primary\" type=\"submit\">Submit</button>\
         </form>\n",
    );
    if let Some(warning) = warning {
        let _ = writeln!(html, "<p class=\"warning\">{}</p>", escape(warning));
    }
    html
}

fn form(
    config: &PageConfig,
    username: &str,
    fields: &[FieldSpec],
    values: &HashMap<String, String>,
    submission: &Submission,
) -> String {
    let mut html = String::new();
    let _ = writeln!(
        html,
        "<h1>Hi! {}, Welcome to {}</h1>\n\
         <p>Enter your health parameters below to check your diabetes risk.</p>\n\
         <h2>Enter Your Details:</h2>",
        escape(username),
        escape(&config.title)
    );

    html.push_str("<form method=\"post\" action=\"/predict\">\n");
    for field in fields {
        let value = values
            .get(&field.name)
            .cloned()
            .unwrap_or_else(|| field.default.to_string());
        let _ = writeln!(
            html,
            "<label>{name}<input type=\"number\" name=\"{name}\" min=\"{min}\" max=\"{max}\" \
             step=\"{step}\" value=\"{value}\" required></label>",
            name = escape(&field.name),
            min = field.min,
            max = field.max,
            step = field.step,
            value = escape(&value),
        );
    }
    html.push_str("<button class=\"primary\" type=\"submit\">Predict</button>\n</form>\n");

    match submission {
        Submission::None => {}
        Submission::Scored(result) => html.push_str(&result_block(result)),
        Submission::Rejected(e) => {
            let _ = writeln!(html, "<p class=\"warning\">{}</p>", escape(&e.to_string()));
        }
        Submission::Failed(e) => {
            let _ = writeln!(
                html,
                "<p class=\"error\">Prediction failed: {}</p>",
                escape(&e.to_string())
            );
        }
    }

    html.push_str(
        "<form class=\"go-back\" method=\"post\" action=\"/reset\">\
         <button type=\"submit\">Go Back</button></form>\n",
    );
    html
}

/// Probability line plus the outcome message block
pub fn result_block(result: &PredictionResult) -> String {
    let outcome = result.outcome();
    let class = if result.is_positive() { "error" } else { "success" };

    let mut html = String::from("<section class=\"result\">\n<h2>Prediction Results</h2>\n");
    let _ = writeln!(
        html,
        "<p><strong>Diabetes Risk Probability:</strong> <code>{}</code></p>",
        result.formatted_percentage()
    );
    let _ = writeln!(html, "<p class=\"{class}\">{}</p>", escape(outcome.headline()));

    if let Some(title) = outcome.advice_title() {
        let _ = writeln!(html, "<h3>{}</h3>", escape(title));
        html.push_str("<ul>\n");
        for line in outcome.advice() {
            let _ = writeln!(html, "<li>{}</li>", escape(line));
        }
        html.push_str("</ul>\n");
    } else {
        for line in outcome.advice() {
            let _ = writeln!(html, "<p>{}</p>", escape(line));
        }
    }

    html.push_str("</section>\n");
    html
}
