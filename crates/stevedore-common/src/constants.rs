//! System-wide constants and default paths.

use std::path::PathBuf;
use std::sync::OnceLock;

/// Default base directory for Stevedore data when running as root.
pub const SYSTEM_DATA_DIR: &str = "/var/lib/stevedore";

/// Default run directory (attach sockets, exit files) for the system location.
pub const SYSTEM_RUN_DIR: &str = "/run/stevedore";

/// Returns the data directory, preferring `$HOME/.stevedore` when it can be
/// created, falling back to `/var/lib/stevedore`.
fn resolve_data_dir() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        let user_dir = PathBuf::from(home).join(".stevedore");
        if std::fs::create_dir_all(&user_dir).is_ok() {
            return user_dir;
        }
    }
    PathBuf::from(SYSTEM_DATA_DIR)
}

static DATA_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the resolved data directory for this session.
pub fn data_dir() -> &'static PathBuf {
    DATA_DIR.get_or_init(resolve_data_dir)
}

/// Returns the run directory matching [`data_dir`].
pub fn run_dir() -> PathBuf {
    let data = data_dir();
    if data.as_path() == std::path::Path::new(SYSTEM_DATA_DIR) {
        PathBuf::from(SYSTEM_RUN_DIR)
    } else {
        data.join("run")
    }
}

/// Returns the default state file path.
pub fn default_state_file() -> PathBuf {
    data_dir().join("state.json")
}

/// Returns the default configuration file path.
pub fn default_config_file() -> PathBuf {
    data_dir().join("config.json")
}

/// Returns the default container store root.
pub fn default_storage_root() -> PathBuf {
    data_dir().join("storage")
}

/// Returns the default directory holding per-container attach sockets.
pub fn default_attach_socket_dir() -> PathBuf {
    run_dir().join("attach")
}

/// Returns the default directory where the monitor writes exit status files.
pub fn default_exits_dir() -> PathBuf {
    run_dir().join("exits")
}

/// Runtime binary looked up on `PATH` when none is configured.
pub const DEFAULT_RUNTIME: &str = "runc";

/// Fallback runtime path when `runc` is not on `PATH`.
pub const DEFAULT_RUNTIME_PATH: &str = "/usr/bin/runc";

/// Name of the attach socket inside `<attach_socket_dir>/<id>/`.
pub const ATTACH_SOCKET_NAME: &str = "attach";

/// Name of the monitor control file inside the bundle directory.
pub const CONTROL_FILE_NAME: &str = "ctl";

/// Default detach key sequence (ctrl-p ctrl-q).
pub const DEFAULT_DETACH_KEYS: &str = "ctrl-p,ctrl-q";

/// Default grace period for the forced stop performed by remove.
pub const DEFAULT_STOP_TIMEOUT_SECS: u64 = 10;

/// How long to wait for a container to die after `SIGKILL`.
pub const KILL_TIMEOUT_SECS: u64 = 10;

/// Interval between runtime status polls while waiting for a stop.
pub const STOP_POLL_INTERVAL_MS: u64 = 100;

/// Default stop signal when the container does not declare one.
pub const DEFAULT_STOP_SIGNAL: &str = "SIGTERM";

/// Prefix for names generated for containers registered without one.
pub const GENERATED_NAME_PREFIX: &str = "ctr-";

/// Application name used in CLI output and state files.
pub const APP_NAME: &str = "stevedore";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "stv";
