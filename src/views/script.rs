use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::SiteAdminError;

/// `<schema>-<from>-<to>.sql`, e.g. `core-12.30-12.31.sql`
static SCRIPT_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<schema>.+)-(?P<from>\d+(?:\.\d+)?)-(?P<to>\d+(?:\.\d+)?)\.sql$")
        .expect("script name pattern is valid")
});

/// One migration script, held purely as text
#[derive(Debug, Clone, PartialEq)]
pub struct SqlScript {
    pub description: String,
    pub contents: String,
}

impl SqlScript {
    pub fn new(description: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            contents: contents.into(),
        }
    }

    pub fn line_count(&self) -> usize {
        self.contents.lines().count()
    }
}

/// Source and sink of SQL migration scripts
pub trait ScriptProvider {
    /// Every schema that has at least one script
    fn schema_names(&self) -> Result<Vec<String>, SiteAdminError>;

    /// A schema's scripts in upgrade order, oldest first
    fn scripts(&self, schema: &str) -> Result<Vec<SqlScript>, SiteAdminError>;

    /// Write `contents` to `filename`. Fails if the file exists and `overwrite` is false.
    fn save_script(&self, filename: &str, contents: &str, overwrite: bool)
        -> Result<(), SiteAdminError>;
}

#[derive(Debug, Clone, PartialEq)]
struct ScriptFile {
    schema: String,
    from: f64,
    to: f64,
    file_name: String,
}

impl ScriptFile {
    fn parse(file_name: &str) -> Option<Self> {
        let caps = SCRIPT_NAME.captures(file_name)?;
        Some(ScriptFile {
            schema: caps["schema"].to_string(),
            from: caps["from"].parse().ok()?,
            to: caps["to"].parse().ok()?,
            file_name: file_name.to_string(),
        })
    }

    fn upgrade_order(a: &ScriptFile, b: &ScriptFile) -> Ordering {
        a.from
            .total_cmp(&b.from)
            .then(a.to.total_cmp(&b.to))
            .then_with(|| a.file_name.cmp(&b.file_name))
    }
}

/// Scripts stored as `<schema>-<from>-<to>.sql` files in one directory.
///
/// Scripts are ordered by from-version, then to-version. Saved scripts go to
/// `output_dir`, which defaults to the script directory.
pub struct FileScriptProvider {
    script_dir: PathBuf,
    output_dir: PathBuf,
}

impl FileScriptProvider {
    pub fn new(script_dir: &Path) -> Result<Self, SiteAdminError> {
        if !script_dir.is_dir() {
            return Err(SiteAdminError::Validation(format!(
                "Script directory '{}' does not exist or is not a directory",
                script_dir.display()
            )));
        }
        Ok(Self {
            script_dir: script_dir.to_path_buf(),
            output_dir: script_dir.to_path_buf(),
        })
    }

    pub fn with_output_dir(mut self, output_dir: &Path) -> Self {
        self.output_dir = output_dir.to_path_buf();
        self
    }

    pub fn script_dir(&self) -> &Path {
        &self.script_dir
    }

    fn script_files(&self) -> Result<Vec<ScriptFile>, SiteAdminError> {
        let entries = fs::read_dir(&self.script_dir)
            .map_err(|e| SiteAdminError::at_path(&self.script_dir, e))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| SiteAdminError::at_path(&self.script_dir, e))?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            match ScriptFile::parse(file_name) {
                Some(script_file) => files.push(script_file),
                None => debug!("Skipping non-script file '{}'", file_name),
            }
        }

        Ok(files)
    }
}

impl ScriptProvider for FileScriptProvider {
    fn schema_names(&self) -> Result<Vec<String>, SiteAdminError> {
        let names: BTreeSet<String> = self
            .script_files()?
            .into_iter()
            .map(|f| f.schema)
            .collect();
        Ok(names.into_iter().collect())
    }

    fn scripts(&self, schema: &str) -> Result<Vec<SqlScript>, SiteAdminError> {
        let mut files: Vec<ScriptFile> = self
            .script_files()?
            .into_iter()
            .filter(|f| f.schema.eq_ignore_ascii_case(schema))
            .collect();
        files.sort_by(ScriptFile::upgrade_order);

        files
            .into_iter()
            .map(|f| {
                let path = self.script_dir.join(&f.file_name);
                let contents =
                    fs::read_to_string(&path).map_err(|e| SiteAdminError::at_path(&path, e))?;
                Ok(SqlScript::new(f.file_name, contents))
            })
            .collect()
    }

    fn save_script(
        &self,
        filename: &str,
        contents: &str,
        overwrite: bool,
    ) -> Result<(), SiteAdminError> {
        let path = self.output_dir.join(filename);
        if path.exists() && !overwrite {
            return Err(SiteAdminError::Validation(format!(
                "Script '{}' already exists",
                path.display()
            )));
        }
        fs::create_dir_all(&self.output_dir)
            .map_err(|e| SiteAdminError::at_path(&self.output_dir, e))?;
        fs::write(&path, contents).map_err(|e| SiteAdminError::at_path(&path, e))?;
        info!("Saved script '{}'", path.display());
        Ok(())
    }
}
