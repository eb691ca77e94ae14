//! JSON script files: the generated or hand-edited steps plus the generator
//! settings that produced them.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use crate::action::{check_wait, Action, Script};
use crate::error::{AutomatorError, Result};
use crate::generator::{SettingsForm, SETTING_KEYS};

/// A decoded script file.
#[derive(Clone, Debug, Default)]
pub struct ScriptFile {
    pub timestamp: Option<String>,
    pub settings: SettingsForm,
    pub script: Script,
}

#[derive(Serialize)]
struct OutgoingDocument<'a> {
    timestamp: String,
    settings: Map<String, Value>,
    steps: &'a [Action],
}

#[derive(Deserialize)]
struct IncomingDocument {
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    settings: Map<String, Value>,
    #[serde(default)]
    steps: Vec<Action>,
}

fn stored_settings(form: &SettingsForm) -> Map<String, Value> {
    SETTING_KEYS
        .iter()
        .map(|&key| (key.to_owned(), Value::String(form.get(key).unwrap_or_default().to_owned())))
        .collect()
}

/// `video_course_script_YYYYMMDD_HHMMSS.json`
pub fn default_file_name(at: DateTime<Local>) -> String {
    format!("video_course_script_{}.json", at.format("%Y%m%d_%H%M%S"))
}

/// Writes `script` and `settings` to `path`. Empty scripts, and settings that
/// [`load`] would refuse, are rejected before anything is written.
pub fn save(path: &Path, script: &Script, settings: &SettingsForm) -> Result<()> {
    if script.is_empty() {
        return Err(AutomatorError::NoStepsAvailable);
    }
    settings.check()?;
    let doc = OutgoingDocument {
        timestamp: Local::now().to_rfc3339(),
        settings: stored_settings(settings),
        steps: script.actions(),
    };
    let text = serde_json::to_string_pretty(&doc).map_err(|source| AutomatorError::Parse { path: path.to_owned(), source })?;
    fs::write(path, text).map_err(|source| AutomatorError::Io { path: path.to_owned(), source })?;
    tracing::info!(path = %path.display(), steps = script.len(), "script saved");
    Ok(())
}

/// Saves under [`default_file_name`] inside `dir` and returns the path used.
pub fn save_timestamped(dir: &Path, script: &Script, settings: &SettingsForm) -> Result<PathBuf> {
    let path = dir.join(default_file_name(Local::now()));
    save(&path, script, settings)?;
    Ok(path)
}

/// Reads a script file. Nothing is returned unless the whole file decodes and validates.
pub fn load(path: &Path) -> Result<ScriptFile> {
    let text = fs::read_to_string(path).map_err(|source| AutomatorError::Io { path: path.to_owned(), source })?;
    let doc: IncomingDocument =
        serde_json::from_str(&text).map_err(|source| AutomatorError::Parse { path: path.to_owned(), source })?;

    for (i, step) in doc.steps.iter().enumerate() {
        check_wait(&format!("wait of step {}", i + 1), step.wait_seconds)?;
    }

    let mut settings = SettingsForm::default();
    for (key, value) in &doc.settings {
        let text = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Null => continue,
            other => return Err(AutomatorError::invalid(format!("setting {key}: unexpected value {other}"))),
        };
        if !settings.set(key, &text)? {
            tracing::debug!(key = %key, "ignoring unknown setting");
        }
    }

    tracing::info!(path = %path.display(), steps = doc.steps.len(), "script loaded");
    Ok(ScriptFile { timestamp: doc.timestamp, settings, script: Script::from(doc.steps) })
}
