//! Format strings rendered against the variables of one invocation.

use anyhow::{Result, anyhow};
use minijinja::Environment;
use serde::Serialize;
use time::OffsetDateTime;
use time::macros::format_description;

use crate::domain::model::Variables;

/// Renders user-authored format strings (`{{ value }}`, `{{ date }}`, any bound variable).
pub struct Formatter {
    env: Environment<'static>,
}

impl Formatter {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_keep_trailing_newline(true);
        Self { env }
    }

    /// Render `source` with the bound variables plus `date` and `time` of the current moment.
    pub fn format(&self, source: &str, variables: &Variables) -> Result<String> {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        self.format_at(source, variables, now)
    }

    fn format_at(&self, source: &str, variables: &Variables, now: OffsetDateTime) -> Result<String> {
        let date = now
            .format(format_description!("[year]-[month]-[day]"))
            .map_err(|err| anyhow!("failed to format date: {err}"))?;
        let time = now
            .format(format_description!("[hour]:[minute]"))
            .map_err(|err| anyhow!("failed to format time: {err}"))?;

        let context = FormatContext {
            date,
            time,
            variables,
        };
        self.env
            .render_str(source, context)
            .map_err(|err| anyhow!("failed to render format '{source}': {err}"))
    }
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct FormatContext<'a> {
    date: String,
    time: String,
    #[serde(flatten)]
    variables: &'a Variables,
}
