use std::fmt;
use std::io::Write;

use log::{info, Level};
use logging_timer::timer;
use regex::{Captures, Regex};

use super::dialect::{
    SqlDialect, CREATE_SCHEMA, CREATE_VIEW, DROP_NAMES, HELPER_SCHEMA, HELPER_VIEW,
};
use super::ordered_map::AccessOrderedMap;
use super::script::{ScriptProvider, SqlScript};
use super::ViewHandler;
use crate::error::SiteAdminError;

const OBSOLETE_BANNER: &str = "-- Obsolete views: created by earlier scripts and dropped by later ones.\n\
-- Keep these drops so that upgrades from older installations remove them.";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ViewKind {
    Create,
    Drop,
}

/// A schema-qualified view name, in the case it was written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewName {
    pub schema: String,
    pub view: String,
}

impl ViewName {
    pub fn new(schema: &str, view: &str) -> Self {
        Self {
            schema: schema.to_string(),
            view: view.to_string(),
        }
    }

    /// Case-insensitive identity: lowercase `schema.view`
    pub fn key(&self) -> String {
        format!("{}.{}", self.schema, self.view).to_lowercase()
    }
}

impl fmt::Display for ViewName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.view)
    }
}

/// One recognised statement. For a create, `raw_text` is the matched SQL;
/// for a drop it is the canonical `schema.view` reference.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewStatement {
    pub name: ViewName,
    pub kind: ViewKind,
    pub raw_text: String,
}

impl ViewStatement {
    /// Classify one match of [`SqlDialect::statement_regex`]. A drop yields one
    /// statement per listed view. A match that names a view starting with an
    /// underscore is not recognised at all.
    pub(crate) fn from_captures(caps: &Captures<'_>) -> Option<Vec<Self>> {
        let group = |schema: &str, view: &str| {
            caps.name(schema)
                .zip(caps.name(view))
                .map(|(s, v)| ViewName::new(s.as_str(), v.as_str()))
        };

        if let Some(name) = group(CREATE_SCHEMA, CREATE_VIEW) {
            let raw_text = caps.get(0)?.as_str().to_string();
            return Some(vec![ViewStatement {
                name,
                kind: ViewKind::Create,
                raw_text,
            }]);
        }

        let names = match caps.name(DROP_NAMES) {
            Some(list) => Self::parse_name_list(list.as_str())?,
            None => vec![group(HELPER_SCHEMA, HELPER_VIEW)?],
        };

        Some(
            names
                .into_iter()
                .map(|name| ViewStatement {
                    raw_text: name.to_string(),
                    name,
                    kind: ViewKind::Drop,
                })
                .collect(),
        )
    }

    /// `core.a, core.b` as names; `None` if any name is private
    fn parse_name_list(list: &str) -> Option<Vec<ViewName>> {
        list.split(',')
            .map(|item| {
                let (schema, view) = item.trim().split_once('.')?;
                if view.starts_with('_') {
                    return None;
                }
                Some(ViewName::new(schema, view))
            })
            .collect()
    }
}

/// Final view state of one schema after every script was applied
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ViewExtraction {
    /// Created at some point, dropped later and never recreated
    pub obsolete_drops: Vec<ViewName>,
    /// Current views, last created first
    pub current_drops: Vec<ViewName>,
    /// Current views' create statements, in creation order
    pub creates: Vec<ViewStatement>,
}

impl ViewExtraction {
    pub fn drop_script(&self, dialect: &SqlDialect) -> String {
        let mut out = String::new();

        if !self.obsolete_drops.is_empty() {
            out.push_str(OBSOLETE_BANNER);
            out.push('\n');
            for name in &self.obsolete_drops {
                out.push_str(&dialect.render_drop(&name.schema, &name.view));
                out.push('\n');
            }
            out.push('\n');
        }

        for name in &self.current_drops {
            out.push_str(&dialect.render_drop(&name.schema, &name.view));
            out.push('\n');
        }

        out
    }

    pub fn create_script(&self) -> String {
        let mut out = String::new();
        for statement in &self.creates {
            out.push_str(&statement.raw_text);
            out.push_str("\n\n");
        }
        out
    }

    /// Drops of obsolete views, then drops of current views, then creates
    pub fn script(&self, dialect: &SqlDialect) -> String {
        let mut out = self.drop_script(dialect);
        if !out.is_empty() && !self.creates.is_empty() {
            out.push('\n');
        }
        out.push_str(&self.create_script());
        out
    }
}

/// Tracks create and drop statements across a schema's ordered scripts.
///
/// A view key lives in at most one of the two maps: a drop evicts the view's
/// create and a create evicts its pending drop.
pub struct ViewExtractor {
    schema: String,
    dialect: &'static SqlDialect,
    pattern: Regex,
    emit_drop: bool,
    emit_create: bool,
    create_statements: AccessOrderedMap<ViewStatement>,
    drop_statements: AccessOrderedMap<ViewStatement>,
    script_lines: usize,
}

impl ViewExtractor {
    pub fn new(
        schema: &str,
        dialect: &'static SqlDialect,
        emit_drop: bool,
        emit_create: bool,
    ) -> Result<Self, SiteAdminError> {
        Ok(Self {
            schema: schema.to_string(),
            dialect,
            pattern: dialect.statement_regex()?,
            emit_drop,
            emit_create,
            create_statements: AccessOrderedMap::new(),
            drop_statements: AccessOrderedMap::new(),
            script_lines: 0,
        })
    }

    /// Apply one script's statements in order of appearance
    pub fn scan(&mut self, script: &SqlScript) {
        self.script_lines += script.line_count();

        for caps in self.pattern.captures_iter(&script.contents) {
            let Some(statements) = ViewStatement::from_captures(&caps) else {
                continue;
            };
            for statement in statements {
                let key = statement.name.key();
                match statement.kind {
                    ViewKind::Create => {
                        self.drop_statements.remove(&key);
                        self.create_statements.insert(key, statement);
                    }
                    ViewKind::Drop => {
                        self.create_statements.remove(&key);
                        self.drop_statements.insert(key, statement);
                    }
                }
            }
        }
    }

    /// Produce the consolidated result and reset the accumulated state
    pub fn finish(&mut self) -> ViewExtraction {
        let create_statements = std::mem::take(&mut self.create_statements);
        let mut drop_statements = std::mem::take(&mut self.drop_statements);

        let mut current_drops = Vec::with_capacity(create_statements.len());
        for (key, statement) in create_statements.iter().rev() {
            current_drops.push(statement.name.clone());
            // The view exists now, so a standing drop entry is not obsolete
            drop_statements.remove(key);
        }

        ViewExtraction {
            obsolete_drops: drop_statements
                .iter()
                .map(|(_, s)| s.name.clone())
                .collect(),
            current_drops,
            creates: create_statements.iter().map(|(_, s)| s.clone()).collect(),
        }
    }

    /// Scan every script in order and produce the consolidated result
    pub fn extract(mut self, scripts: &[SqlScript]) -> ViewExtraction {
        let _tmr = timer!(Level::Trace; "ViewExtractor::extract", "{} scripts", scripts.len());
        for script in scripts {
            self.scan(script);
        }
        self.finish()
    }
}

impl ViewHandler for ViewExtractor {
    fn handle(
        &mut self,
        provider: &dyn ScriptProvider,
        out: &mut dyn Write,
    ) -> Result<(), SiteAdminError> {
        let scripts = provider.scripts(&self.schema)?;
        for script in &scripts {
            self.scan(script);
        }

        let extraction = self.finish();
        info!(
            "Schema '{}': {} current views, {} obsolete views",
            self.schema,
            extraction.creates.len(),
            extraction.obsolete_drops.len()
        );

        if self.emit_drop {
            let file_name = format!("{}-drop.sql", self.schema);
            provider.save_script(&file_name, &extraction.drop_script(self.dialect), true)?;
            writeln!(
                out,
                "{}: {} drop statements ({} obsolete)",
                file_name,
                extraction.current_drops.len() + extraction.obsolete_drops.len(),
                extraction.obsolete_drops.len()
            )?;
        }

        if self.emit_create {
            let file_name = format!("{}-create.sql", self.schema);
            provider.save_script(&file_name, &extraction.create_script(), true)?;
            writeln!(out, "{}: {} create statements", file_name, extraction.creates.len())?;
        }

        Ok(())
    }

    fn script_lines(&self) -> usize {
        self.script_lines
    }
}
