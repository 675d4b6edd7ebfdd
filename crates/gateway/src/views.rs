//! HTML pages for the unit admin

use crate::flash::Flash;
use crate::forms::{FieldError, UnitInput};
use std::fmt::Write;
use unitforge_common::Unit;

/// Field values and errors of a unit form being (re)displayed
#[derive(Debug, Clone, Default)]
pub struct UnitForm {
    pub name: String,
    pub shortcut: String,
    pub code: String,
    pub errors: Vec<FieldError>,
}

impl UnitForm {
    pub fn from_input(input: &UnitInput, errors: Vec<FieldError>) -> Self {
        Self {
            name: input.name.clone(),
            shortcut: input.shortcut.clone(),
            code: input.code.clone().unwrap_or_default(),
            errors,
        }
    }

    pub fn from_unit(unit: &Unit) -> Self {
        Self {
            name: unit.name.clone(),
            shortcut: unit.shortcut.clone(),
            code: unit.code.clone(),
            errors: Vec::new(),
        }
    }

    fn error_for(&self, field: &str) -> String {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| format!(r#"<span class="field-error">{}</span>"#, escape(&e.message)))
            .unwrap_or_default()
    }
}

pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
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

fn layout(title: &str, flash: Option<&Flash>, body: &str) -> String {
    let flash = flash
        .map(|f| {
            format!(
                r#"<div class="flash flash-{}">{}</div>"#,
                f.level.as_str(),
                escape(&f.message)
            )
        })
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title} | UnitForge</title>
</head>
<body>
<h1>{title}</h1>
{flash}
{body}
</body>
</html>
"#,
        title = escape(title),
    )
}

fn text_input(form: &UnitForm, field: &str, label: &str, value: &str, required: bool) -> String {
    format!(
        r#"<label>{label} <input type="text" name="{field}" value="{value}" maxlength="255"{req}></label>{error}"#,
        value = escape(value),
        req = if required { " required" } else { "" },
        error = form.error_for(field),
    )
}

/// Grid of all units with the create form below it
pub fn unit_list(units: &[Unit], flash: Option<&Flash>, form: &UnitForm) -> String {
    let mut body = String::new();

    body.push_str(
        r#"<form method="post" action="/admin/units/install"><button type="submit">Install starter units</button></form>"#,
    );
    body.push_str("\n<table class=\"grid\">\n<thead><tr><th>Code</th><th>Name</th><th>Shortcut</th><th>Default</th><th></th></tr></thead>\n<tbody>\n");

    if units.is_empty() {
        body.push_str("<tr><td colspan=\"5\">No units yet.</td></tr>\n");
    }

    for unit in units {
        let default = if unit.is_default {
            r#"<strong class="default">default</strong>"#.to_string()
        } else {
            format!(
                r#"<form method="post" action="/admin/units/{id}/default"><button type="submit">Set default</button></form>"#,
                id = unit.id
            )
        };

        // fmt::Write on String never fails
        let _ = writeln!(
            body,
            r#"<tr><td>{code}</td><td><a href="/admin/units/{id}">{name}</a></td><td>{shortcut}</td><td>{default}</td><td><a href="/admin/units/{id}">Edit</a> <form method="post" action="/admin/units/{id}/delete" onsubmit="return confirm('Delete unit {js_name}?')"><button type="submit">Delete</button></form></td></tr>"#,
            code = escape(&unit.code),
            id = unit.id,
            name = escape(&unit.name),
            shortcut = escape(&unit.shortcut),
            js_name = escape(&unit.name.replace('\\', "\\\\").replace('\'', "\\'")),
        );
    }
    body.push_str("</tbody>\n</table>\n");

    let _ = write!(
        body,
        r#"<h2>New unit</h2>
<form method="post" action="/admin/units">
{name}
{shortcut}
{code}
<button type="submit">Create</button>
</form>"#,
        name = text_input(form, "name", "Name", &form.name, true),
        shortcut = text_input(form, "shortcut", "Shortcut", &form.shortcut, true),
        code = text_input(form, "code", "Code (optional)", &form.code, false),
    );

    layout("Units", flash, &body)
}

/// One unit with its edit form
pub fn unit_detail(unit: &Unit, flash: Option<&Flash>, form: &UnitForm) -> String {
    let body = format!(
        r#"<p><a href="/admin/units">Back to units</a></p>
<dl>
<dt>Code</dt><dd>{code}</dd>
<dt>Default</dt><dd>{default}</dd>
<dt>Created</dt><dd>{created}</dd>
<dt>Updated</dt><dd>{updated}</dd>
</dl>
<h2>Edit</h2>
<form method="post" action="/admin/units/{id}">
{name}
{shortcut}
<button type="submit">Save</button>
</form>"#,
        code = escape(&unit.code),
        default = if unit.is_default { "yes" } else { "no" },
        created = unit.created_at.format("%Y-%m-%d %H:%M"),
        updated = unit.updated_at.format("%Y-%m-%d %H:%M"),
        id = unit.id,
        name = text_input(form, "name", "Name", &form.name, true),
        shortcut = text_input(form, "shortcut", "Shortcut", &form.shortcut, true),
    );

    layout(&unit.name, flash, &body)
}

/// Bare page for failures that leave nothing else to show
pub fn error_page(flash: &Flash) -> String {
    layout(
        "Units",
        Some(flash),
        r#"<p><a href="/admin/units">Back to units</a></p>"#,
    )
}
