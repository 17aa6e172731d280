mod clearer;
mod dialect;
mod extractor;
mod ordered_map;
mod script;

use std::io::Write;

pub use clearer::ViewClearer;
pub use dialect::{DialectKind, SqlDialect, POSTGRESQL, SQL_SERVER};
pub use extractor::{ViewExtraction, ViewExtractor, ViewKind, ViewName, ViewStatement};
pub use ordered_map::AccessOrderedMap;
pub use script::{FileScriptProvider, ScriptProvider, SqlScript};

use crate::error::SiteAdminError;

/// A pass over one schema's migration scripts
pub trait ViewHandler {
    /// Process the schema's scripts, writing a human-readable report to `out`
    fn handle(&mut self, provider: &dyn ScriptProvider, out: &mut dyn Write)
        -> Result<(), SiteAdminError>;

    /// Total lines of script text processed so far
    fn script_lines(&self) -> usize;
}

/// Which pass to run over each schema
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ViewAction {
    Extract { drop: bool, create: bool },
    Clear,
}

impl ViewAction {
    fn handler(
        &self,
        schema: &str,
        dialect: &'static SqlDialect,
    ) -> Result<Box<dyn ViewHandler>, SiteAdminError> {
        Ok(match *self {
            ViewAction::Extract { drop, create } => {
                Box::new(ViewExtractor::new(schema, dialect, drop, create)?)
            }
            ViewAction::Clear => Box::new(ViewClearer::new(schema, dialect)?),
        })
    }
}

/// Run `action` over each of `schemas` (every schema the provider knows when
/// empty). Returns the total number of script lines processed.
pub fn process_schemas(
    provider: &dyn ScriptProvider,
    schemas: &[String],
    dialect: &'static SqlDialect,
    action: ViewAction,
    out: &mut dyn Write,
) -> Result<usize, SiteAdminError> {
    let schemas = if schemas.is_empty() {
        provider.schema_names()?
    } else {
        schemas.to_vec()
    };

    let mut total_lines = 0;
    for schema in &schemas {
        let mut handler = action.handler(schema, dialect)?;
        handler.handle(provider, out)?;
        total_lines += handler.script_lines();
    }

    writeln!(out, "Total lines processed: {}", total_lines)?;
    Ok(total_lines)
}
