use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use crate::app_dirs::AppDirs;
use crate::policy::DEFAULT_HARD_PICK_PROBABILITY;
use crate::speech::ListenSettings;

/// An external program plus arguments.
///
/// Arguments may contain `{name}` placeholders that are filled in per call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Build the command, substituting `vars`.
    ///
    /// When `trailing` is given and no argument used the `{text}` placeholder,
    /// it is appended as the final argument.
    pub fn command(&self, vars: &[(&str, &str)], trailing: Option<&str>) -> Command {
        let mut used_text = false;
        let args: Vec<String> = self
            .args
            .iter()
            .map(|arg| {
                if arg.contains("{text}") {
                    used_text = true;
                }
                vars.iter().fold(arg.clone(), |acc, (name, value)| {
                    acc.replace(&format!("{{{name}}}"), value)
                })
            })
            .collect();

        let mut command = Command::new(&self.program);
        command.args(&args);
        if let (Some(text), false) = (trailing, used_text) {
            command.arg(text);
        }
        command
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub language: String,
    pub hard_pick_probability: f64,
    pub feedback_delay_ms: u64,
    pub listen_timeout_secs: f64,
    pub calibration_secs: f64,
    pub speech_command: Option<CommandSpec>,
    pub recognizer_command: Option<CommandSpec>,
    pub profiles_path: Option<PathBuf>,
    pub last_user: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            language: "fr".to_string(),
            hard_pick_probability: DEFAULT_HARD_PICK_PROBABILITY,
            feedback_delay_ms: 1500,
            listen_timeout_secs: 5.0,
            calibration_secs: 0.5,
            speech_command: None,
            recognizer_command: None,
            profiles_path: None,
            last_user: None,
        }
    }
}

const MAX_FEEDBACK_DELAY: Duration = Duration::from_secs(60);
const MAX_LISTEN: Duration = Duration::from_secs(600);

/// `secs` as a duration, or `default` when it is not a usable listen time
fn listen_duration(field: &str, secs: f64, default: Duration) -> Duration {
    match Duration::try_from_secs_f64(secs.max(0.0)) {
        Ok(duration) if duration <= MAX_LISTEN => duration,
        _ => {
            log::warn!("{field} = {secs} is out of range, using {default:?}");
            default
        }
    }
}

impl Config {
    pub fn feedback_delay(&self) -> Duration {
        let delay = Duration::from_millis(self.feedback_delay_ms);
        if delay > MAX_FEEDBACK_DELAY {
            log::warn!(
                "feedback_delay_ms = {} is too long, capping at {MAX_FEEDBACK_DELAY:?}",
                self.feedback_delay_ms
            );
            return MAX_FEEDBACK_DELAY;
        }
        delay
    }

    pub fn listen_settings(&self) -> ListenSettings {
        let defaults = ListenSettings::default();
        ListenSettings {
            timeout: listen_duration("listen_timeout_secs", self.listen_timeout_secs, defaults.timeout),
            calibration: listen_duration("calibration_secs", self.calibration_secs, defaults.calibration),
            language: self.language.clone(),
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = AppDirs::config_path().unwrap_or_else(|| PathBuf::from("abc_tutor_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        match fs::read(&self.path) {
            Ok(bytes) => match serde_json::from_slice::<Config>(&bytes) {
                Ok(cfg) => cfg,
                Err(e) => {
                    log::warn!(
                        "ignoring unreadable config {}: {e}",
                        self.path.display()
                    );
                    Config::default()
                }
            },
            Err(_) => Config::default(),
        }
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, data)
    }
}
