//! HTML views.
//!
//! Templates are compiled into the binary and rendered with minijinja;
//! `.html` templates are auto-escaped.

use axum::response::Html;
use minijinja::{Environment, context};
use modhub_core::ModuleRecord;
use serde::Serialize;

use crate::error::ServerError;

const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../../templates/base.html")),
    ("dashboard.html", include_str!("../../templates/dashboard.html")),
    ("add_module.html", include_str!("../../templates/add_module.html")),
    ("module_mng.html", include_str!("../../templates/module_mng.html")),
];

/// Row shown in the dashboard and management tables.
#[derive(Debug, Serialize)]
pub struct ModuleRow {
    pub id: i64,
    pub module_name: String,
    pub uploaded_time: String,
    pub filename: String,
    pub file_size: String,
    pub extracted_files: Vec<String>,
}

impl From<ModuleRecord> for ModuleRow {
    fn from(record: ModuleRecord) -> Self {
        Self {
            id: record.id,
            module_name: record.module_name,
            uploaded_time: record.uploaded_time.format("%Y-%m-%d %H:%M:%S").to_string(),
            filename: record.filename,
            file_size: human_size(record.file_size),
            extracted_files: record.extracted_files,
        }
    }
}

fn human_size(bytes: i64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

#[derive(Debug)]
pub struct Views {
    env: Environment<'static>,
}

impl Views {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        for &(name, source) in TEMPLATES {
            env.add_template(name, source)?;
        }
        Ok(Self { env })
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> Result<Html<String>, ServerError> {
        let template = self.env.get_template(name)?;
        Ok(Html(template.render(ctx)?))
    }

    pub fn dashboard(&self, modules: Vec<ModuleRecord>) -> Result<Html<String>, ServerError> {
        let modules: Vec<ModuleRow> = modules.into_iter().map(ModuleRow::from).collect();
        self.render("dashboard.html", context! { modules })
    }

    pub fn add_module(&self) -> Result<Html<String>, ServerError> {
        self.render("add_module.html", context! {})
    }

    pub fn module_management(&self, modules: Vec<ModuleRecord>) -> Result<Html<String>, ServerError> {
        let modules: Vec<ModuleRow> = modules.into_iter().map(ModuleRow::from).collect();
        self.render("module_mng.html", context! { modules })
    }
}
