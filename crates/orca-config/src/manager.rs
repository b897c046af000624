//! The on-disk configuration directory.
//!
//! [`ConfigManager`] owns one directory holding the files listed in
//! [`ConfigFile`]. It bootstraps defaults, gates on `format_version`, backs
//! files up before replacing them, and imports or exports the whole set as
//! a directory or zip archive.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use zip::ZipArchive;
use zip::write::{SimpleFileOptions, ZipWriter};

use orca_model::ColumnSchema;

use crate::error::{ConfigError, Result};
use crate::file::ConfigFile;
use crate::loaders::{CueConfig, parse_column_map};
use crate::paths;
use crate::validator::{SchemaValidator, type_name};

/// Key holding the integer format version of a JSON configuration file.
pub const FORMAT_VERSION_KEY: &str = "format_version";

const BACKUP_TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";
const ZIP_MAGIC: [&[u8; 4]; 2] = [b"PK\x03\x04", b"PK\x05\x06"];
const STAGING_SUFFIX: &str = ".import";

/// Contents read from an import source, keyed by the file they replace.
type Staged = BTreeMap<ConfigFile, Vec<u8>>;

#[derive(Debug, Clone)]
pub struct ConfigManager {
    dir: PathBuf,
    validator: SchemaValidator,
}

impl ConfigManager {
    /// Manager over an explicit configuration directory.
    ///
    /// The directory is created lazily by the first write.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            dir: dir.into(),
            validator: SchemaValidator::bundled()?,
        })
    }

    /// Manager over [`paths::default_config_dir`].
    pub fn from_default_location() -> Result<Self> {
        let dir = paths::default_config_dir().ok_or_else(|| ConfigError::ConfigLoad {
            file: paths::CONFIG_DIR_NAME.to_string(),
            message: format!(
                "could not determine a configuration directory; set {}",
                paths::CONFIG_DIR_ENV_VAR
            ),
        })?;
        Self::new(dir)
    }

    pub fn config_dir(&self) -> &Path {
        &self.dir
    }

    pub fn validator(&self) -> &SchemaValidator {
        &self.validator
    }

    pub fn config_path(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }

    fn create_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(ConfigError::io("create directory", &self.dir))
    }

    fn write_default(&self, file: ConfigFile) -> Result<PathBuf> {
        self.create_dir()?;
        let path = self.config_path(file.filename());
        fs::write(&path, file.default_contents()).map_err(ConfigError::io("write", &path))?;
        Ok(path)
    }

    /// Path of `file`, installing the bundled default if it is missing.
    pub fn ensure_config(&self, file: ConfigFile) -> Result<PathBuf> {
        let path = self.config_path(file.filename());
        if path.is_file() {
            return Ok(path);
        }
        tracing::info!(path = %path.display(), "Installing default configuration");
        self.write_default(file)
    }

    /// Write every bundled default into the directory, overwriting what is there.
    pub fn initialize_configs(&self) -> Result<()> {
        for file in ConfigFile::ALL {
            self.write_default(file)?;
        }
        tracing::info!(dir = %self.dir.display(), "Initialized default configuration");
        Ok(())
    }

    /// Back up every file, then install the bundled defaults.
    ///
    /// Returns the backups that were made.
    pub fn restore_default_configs(&self) -> Result<Vec<PathBuf>> {
        let mut backups = Vec::new();
        for file in ConfigFile::ALL {
            backups.extend(self.backup_config(file.filename())?);
            self.write_default(file)?;
        }
        tracing::info!(
            dir = %self.dir.display(),
            backups = backups.len(),
            "Restored default configuration"
        );
        Ok(backups)
    }

    fn read_text(&self, filename: &str) -> Result<String> {
        let path = self.config_path(filename);
        fs::read_to_string(&path).map_err(ConfigError::io("read", &path))
    }

    /// Parse a JSON file from the directory.
    pub fn read_json(&self, filename: &str) -> Result<Value> {
        let text = self.read_text(filename)?;
        serde_json::from_str(&text).map_err(|e| ConfigError::ConfigLoad {
            file: filename.to_string(),
            message: e.to_string(),
        })
    }

    /// `format_version` of a file in the directory.
    ///
    /// Absent in a JSON object, or for a non-object document, means 0. CSV
    /// files cannot carry a version and are always 0.
    pub fn format_version(&self, filename: &str) -> Result<i64> {
        match Path::new(filename).extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Ok(0),
            Some(ext) if ext.eq_ignore_ascii_case("json") => {
                let document = self.read_json(filename)?;
                match document.get(FORMAT_VERSION_KEY) {
                    None => Ok(0),
                    Some(raw) => integral(raw).ok_or_else(|| ConfigError::ConfigLoad {
                        file: filename.to_string(),
                        message: format!(
                            "Invalid format version: {raw} ({} found, integer expected)",
                            type_name(raw)
                        ),
                    }),
                }
            }
            _ => Err(ConfigError::ConfigLoad {
                file: filename.to_string(),
                message: "unsupported configuration file extension".to_string(),
            }),
        }
    }

    pub fn is_at_least_version(&self, filename: &str, min_version: i64) -> Result<bool> {
        Ok(self.format_version(filename)? >= min_version)
    }

    /// Installed files whose format version is older than the bundled one.
    ///
    /// Missing files are not outdated; [`ensure_config`](Self::ensure_config)
    /// installs them.
    pub fn outdated_configs(&self) -> Result<Vec<ConfigFile>> {
        let mut outdated = Vec::new();
        for file in ConfigFile::ALL {
            if !self.config_path(file.filename()).is_file() {
                continue;
            }
            if !self.is_at_least_version(file.filename(), file.format_version())? {
                outdated.push(file);
            }
        }
        Ok(outdated)
    }

    /// Back up each outdated file and install the bundled default in its place.
    pub fn upgrade_outdated_configs(&self) -> Result<Vec<ConfigFile>> {
        let outdated = self.outdated_configs()?;
        for file in &outdated {
            self.backup_config(file.filename())?;
            self.write_default(*file)?;
            tracing::info!(file = %file, "Upgraded outdated configuration");
        }
        Ok(outdated)
    }

    /// Rename `filename` to `<stem>-<timestamp>.<ext>.bak`.
    ///
    /// Returns `None` without error when the file does not exist. An existing
    /// backup with the same timestamp is never overwritten.
    pub fn backup_config(&self, filename: &str) -> Result<Option<PathBuf>> {
        let path = self.config_path(filename);
        if !path.exists() {
            return Ok(None);
        }
        let name = Path::new(filename);
        let stem = name
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = name
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        let timestamp = chrono::Local::now().format(BACKUP_TIMESTAMP_FORMAT);

        let mut backup = self.config_path(&format!("{stem}-{timestamp}.{ext}.bak"));
        let mut counter = 1;
        while backup.exists() {
            backup = self.config_path(&format!("{stem}-{timestamp}-{counter}.{ext}.bak"));
            counter += 1;
        }

        fs::rename(&path, &backup).map_err(ConfigError::io("back up", &path))?;
        tracing::info!(
            path = %path.display(),
            backup = %backup.display(),
            "Backed up configuration"
        );
        Ok(Some(backup))
    }

    /// Validate one installed file. The column map is parsed instead.
    pub fn validate_config(&self, file: ConfigFile) -> Result<()> {
        let text = self.read_text(file.filename())?;
        self.check_contents(file, text.as_bytes())
    }

    /// Validate every installed file, stopping at the first failure.
    pub fn validate_all_configs(&self) -> Result<()> {
        for file in ConfigFile::ALL {
            self.validate_config(file)?;
        }
        Ok(())
    }

    /// Load `file`, installing the default if needed, and validate it.
    pub fn load_validated(&self, file: ConfigFile) -> Result<Value> {
        self.ensure_config(file)?;
        let text = self.read_text(file.filename())?;
        match file.schema_filename() {
            Some(schema) => self.validator.validate_text(&text, schema, file.filename()),
            None => Err(ConfigError::ConfigLoad {
                file: file.filename().to_string(),
                message: "not a JSON configuration file".to_string(),
            }),
        }
    }

    /// Column schema from `CSV-Columns.csv`.
    pub fn load_column_schema(&self) -> Result<ColumnSchema> {
        self.ensure_config(ConfigFile::ColumnMap)?;
        let text = self.read_text(ConfigFile::ColumnMap.filename())?;
        parse_column_map(&text, ConfigFile::ColumnMap.filename())
    }

    pub fn load_cue_config(&self) -> Result<CueConfig> {
        let document = self.load_validated(ConfigFile::CueConfig)?;
        CueConfig::from_value(document, ConfigFile::CueConfig.filename())
    }

    fn check_contents(&self, file: ConfigFile, bytes: &[u8]) -> Result<()> {
        let text = std::str::from_utf8(bytes).map_err(|e| ConfigError::ConfigLoad {
            file: file.filename().to_string(),
            message: e.to_string(),
        })?;
        match file.schema_filename() {
            Some(schema) => self
                .validator
                .validate_text(text, schema, file.filename())
                .map(drop),
            None => parse_column_map(text, file.filename()).map(drop),
        }
    }

    /// Replace the configuration with the files in `source`.
    ///
    /// `source` is a directory or a zip archive whose entries are matched by
    /// base name. Every schema-backed file must be present. Everything is
    /// validated before anything is installed, so a failure leaves the
    /// directory untouched. Replaced files are backed up.
    pub fn copy_new_configs_to_preferences_directory(
        &self,
        source: &Path,
    ) -> Result<Vec<ConfigFile>> {
        let staged = if source.is_dir() {
            read_directory_source(source)?
        } else if is_zip_file(source)? {
            read_zip_source(source)?
        } else {
            return Err(ConfigError::InvalidInput {
                path: source.to_path_buf(),
                reason: "not a directory or zip archive".to_string(),
            });
        };

        let missing: Vec<String> = ConfigFile::ALL
            .into_iter()
            .filter(|file| file.is_required_for_import() && !staged.contains_key(file))
            .map(|file| file.filename().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingConfigFiles { missing });
        }

        for (file, bytes) in &staged {
            self.check_contents(*file, bytes)?;
        }

        self.install(&staged)?;
        tracing::info!(
            source = %source.display(),
            dir = %self.dir.display(),
            files = staged.len(),
            "Imported configuration"
        );
        Ok(staged.into_keys().collect())
    }

    /// Stage every file beside its target, then back up and swap each in.
    fn install(&self, staged: &Staged) -> Result<()> {
        self.create_dir()?;
        let mut temps = Vec::with_capacity(staged.len());
        for (file, bytes) in staged {
            let temp = self.config_path(&format!(".{}{STAGING_SUFFIX}", file.filename()));
            if let Err(e) = fs::write(&temp, bytes) {
                discard(temps.iter().map(|(_, written)| written));
                discard([&temp]);
                return Err(ConfigError::io("write", &temp)(e));
            }
            temps.push((*file, temp));
        }
        self.swap_in(temps)
    }

    /// Back up and replace each target with its staged copy, in order.
    ///
    /// On failure the staged copies not yet swapped in are removed.
    fn swap_in(&self, temps: Vec<(ConfigFile, PathBuf)>) -> Result<()> {
        let mut pending = temps.into_iter();
        while let Some((file, temp)) = pending.next() {
            let target = self.config_path(file.filename());
            let swapped = self.backup_config(file.filename()).and_then(|_| {
                fs::rename(&temp, &target).map_err(ConfigError::io("install", &target))
            });
            if let Err(e) = swapped {
                discard([&temp]);
                discard(pending.as_slice().iter().map(|(_, rest)| rest));
                tracing::warn!(file = %file, error = %e, "Configuration import stopped part way");
                return Err(e);
            }
        }
        Ok(())
    }

    /// Write every configuration file as a top-level entry of a zip archive.
    ///
    /// A `.zip` extension is appended when missing; the final path is
    /// returned. Missing files are exported as their bundled defaults.
    pub fn export_configs_from_preferences_directory(&self, archive: &Path) -> Result<PathBuf> {
        let output = ensure_zip_extension(archive);
        let mut contents = Vec::with_capacity(ConfigFile::ALL.len());
        for file in ConfigFile::ALL {
            let path = self.ensure_config(file)?;
            let bytes = fs::read(&path).map_err(ConfigError::io("read", &path))?;
            contents.push((file, bytes));
        }

        let handle = File::create(&output).map_err(ConfigError::io("create", &output))?;
        let mut zip = ZipWriter::new(handle);
        let options = SimpleFileOptions::default();
        for (file, bytes) in &contents {
            zip.start_file(file.filename(), options)
                .map_err(ConfigError::archive(&output))?;
            zip.write_all(bytes)
                .map_err(ConfigError::io("write", &output))?;
        }
        zip.finish().map_err(ConfigError::archive(&output))?;

        tracing::info!(archive = %output.display(), files = contents.len(), "Exported configuration");
        Ok(output)
    }
}

/// Remove staging files, ignoring ones already gone.
fn discard<'a>(paths: impl IntoIterator<Item = &'a PathBuf>) {
    for path in paths {
        let _ = fs::remove_file(path);
    }
}

/// Integer value of `raw`, accepting numbers without a fractional part.
fn integral(raw: &Value) -> Option<i64> {
    raw.as_i64().or_else(|| {
        raw.as_f64()
            .filter(|n| n.fract() == 0.0 && n.abs() < i64::MAX as f64)
            .map(|n| n as i64)
    })
}

fn read_directory_source(source: &Path) -> Result<Staged> {
    let mut staged = Staged::new();
    for file in ConfigFile::ALL {
        let path = source.join(file.filename());
        if path.is_file() {
            let bytes = fs::read(&path).map_err(ConfigError::io("read", &path))?;
            staged.insert(file, bytes);
        }
    }
    Ok(staged)
}

fn read_zip_source(source: &Path) -> Result<Staged> {
    let handle = File::open(source).map_err(ConfigError::io("open", source))?;
    let mut archive = ZipArchive::new(handle).map_err(ConfigError::archive(source))?;
    let mut staged = Staged::new();
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(ConfigError::archive(source))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let Some(file) = Path::new(&name)
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(ConfigFile::from_filename)
        else {
            continue;
        };
        let mut bytes = Vec::new();
        entry
            .read_to_end(&mut bytes)
            .map_err(ConfigError::io("read", source))?;
        staged.insert(file, bytes);
    }
    Ok(staged)
}

/// True when `path` is a regular file starting with a zip signature.
fn is_zip_file(path: &Path) -> Result<bool> {
    if !path.is_file() {
        return Ok(false);
    }
    let mut magic = [0u8; 4];
    let mut handle = File::open(path).map_err(ConfigError::io("open", path))?;
    match handle.read_exact(&mut magic) {
        Ok(()) => Ok(ZIP_MAGIC.iter().any(|signature| **signature == magic)),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(ConfigError::io("read", path)(e)),
    }
}

fn ensure_zip_extension(path: &Path) -> PathBuf {
    let has_zip = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
    if has_zip {
        return path.to_path_buf();
    }
    let mut name = path.as_os_str().to_owned();
    name.push(".zip");
    PathBuf::from(name)
}
