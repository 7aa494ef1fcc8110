/// Name of the environment variable containing the path to the compile configuration file.
/// If not set, defaults to
///  (1) on Linux and macOS: `$XDG_CONFIG_HOME/ssair/compile.toml` or `$HOME/.config/ssair/compile.toml`
///  (2) on Windows: `%APPDATA%\ssair\compile.toml`
pub const ENV_CONFIG_PATH: &str = "SSA_CONFIG_PATH";

/// Directory and file name of the default configuration.
pub const CONFIG_DIR_NAME: &str = "ssair";
pub const CONFIG_FILE_NAME: &str = "compile.toml";

/// Magic bytes heading every encoded program snapshot.
pub const SNAPSHOT_MAGIC_BYTES: [u8; 8] = *b"\0SSAIR\0\0";

/// Name of the top-level function every session compiles into.
pub const MAIN_FUNCTION_NAME: &str = "main";
