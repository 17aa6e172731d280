use std::io::Write;

use log::{debug, info};
use regex::Regex;

use super::dialect::SqlDialect;
use super::extractor::ViewStatement;
use super::script::{ScriptProvider, SqlScript};
use super::ViewHandler;
use crate::error::SiteAdminError;

/// Strips every recognised create/drop view statement from a schema's scripts
/// and saves the scripts that changed, in place.
pub struct ViewClearer {
    schema: String,
    pattern: Regex,
    script_lines: usize,
}

impl ViewClearer {
    pub fn new(schema: &str, dialect: &SqlDialect) -> Result<Self, SiteAdminError> {
        Ok(Self {
            schema: schema.to_string(),
            pattern: dialect.statement_regex()?,
            script_lines: 0,
        })
    }

    /// Returns the cleared text and the number of statements removed
    pub fn clear(&self, contents: &str) -> (String, usize) {
        let mut removed = 0;
        let mut cleared = String::with_capacity(contents.len());
        let mut last = 0;

        for caps in self.pattern.captures_iter(contents) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            if ViewStatement::from_captures(&caps).is_none() {
                continue;
            }
            cleared.push_str(&contents[last..whole.start()]);
            last = whole.end();
            removed += 1;
        }
        cleared.push_str(&contents[last..]);

        (cleared, removed)
    }

    fn clear_script(
        &mut self,
        provider: &dyn ScriptProvider,
        script: &SqlScript,
        out: &mut dyn Write,
    ) -> Result<(), SiteAdminError> {
        self.script_lines += script.line_count();

        let (cleared, removed) = self.clear(&script.contents);
        if removed == 0 {
            debug!("No view statements in '{}'", script.description);
            return Ok(());
        }

        provider.save_script(&script.description, &cleared, true)?;
        info!(
            "Removed {} view statements from '{}'",
            removed, script.description
        );
        writeln!(out, "{}: removed {} view statements", script.description, removed)?;
        Ok(())
    }
}

impl ViewHandler for ViewClearer {
    fn handle(
        &mut self,
        provider: &dyn ScriptProvider,
        out: &mut dyn Write,
    ) -> Result<(), SiteAdminError> {
        let scripts = provider.scripts(&self.schema)?;
        for script in &scripts {
            self.clear_script(provider, script, out)?;
        }
        Ok(())
    }

    fn script_lines(&self) -> usize {
        self.script_lines
    }
}
