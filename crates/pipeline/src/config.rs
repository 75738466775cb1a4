use std::path::PathBuf;

/// Default source version when a pack's manifest gives none.
pub const DEFAULT_SOURCE_VERSION: &str = "1.19";

/// Where packs live on disk.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Canonical store root (default: `./uploads`).
    pub upload_dir: PathBuf,
    /// Parent directory for per-conversion scratch directories. `None` uses
    /// the system temp directory.
    pub scratch_dir: Option<PathBuf>,
}

/// Conversion orchestration settings.
#[derive(Debug, Clone)]
pub struct ConversionConfig {
    /// Source version used when the pack has no usable metadata.
    pub default_source_version: String,
    /// Reject a new job while another for the same pack and target version
    /// is still pending or in progress.
    pub reject_duplicate_active: bool,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            default_source_version: DEFAULT_SOURCE_VERSION.to_string(),
            reject_duplicate_active: false,
        }
    }
}

/// External converter program invocation.
#[derive(Debug, Clone)]
pub struct ConverterConfig {
    /// Executable to run (default: `java`).
    pub program: PathBuf,
    /// Arguments placed before the conversion arguments, e.g.
    /// `-jar ResourcePackConverter.jar`.
    pub args: Vec<String>,
}

/// Pipeline configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub storage: StorageConfig,
    pub conversion: ConversionConfig,
    pub converter: ConverterConfig,
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl PipelineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                             | Default                  |
    /// |-------------------------------------|--------------------------|
    /// | `UPLOAD_DIR`                        | `./uploads`              |
    /// | `SCRATCH_DIR`                       | system temp dir          |
    /// | `CONVERSION_DEFAULT_SOURCE_VERSION` | `1.19`                   |
    /// | `CONVERSION_REJECT_DUPLICATES`      | `false`                  |
    /// | `CONVERTER_PROGRAM`                 | `java`                   |
    /// | `CONVERTER_ARGS`                    | (empty)                  |
    pub fn from_env() -> Self {
        let upload_dir = env_non_empty("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./uploads"));

        let scratch_dir = env_non_empty("SCRATCH_DIR").map(PathBuf::from);

        let default_source_version = env_non_empty("CONVERSION_DEFAULT_SOURCE_VERSION")
            .unwrap_or_else(|| DEFAULT_SOURCE_VERSION.to_string());

        let program = env_non_empty("CONVERTER_PROGRAM")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("java"));

        let args = std::env::var("CONVERTER_ARGS")
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_string)
            .collect();

        Self {
            storage: StorageConfig {
                upload_dir,
                scratch_dir,
            },
            conversion: ConversionConfig {
                default_source_version,
                reject_duplicate_active: env_flag("CONVERSION_REJECT_DUPLICATES"),
            },
            converter: ConverterConfig { program, args },
        }
    }
}
