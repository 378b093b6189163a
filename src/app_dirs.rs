use directories::ProjectDirs;
use std::path::PathBuf;

const APP_NAME: &str = "splitr";

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    fn project() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", APP_NAME)
    }

    pub fn config_path() -> PathBuf {
        Self::project()
            .map(|proj_dirs| proj_dirs.config_dir().join("config.json"))
            .unwrap_or_else(|| PathBuf::from("splitr_config.json"))
    }

    /// Where task directories live unless the config says otherwise.
    pub fn data_dir() -> PathBuf {
        if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home).join(".local").join("share").join(APP_NAME)
        } else {
            Self::project()
                .map(|proj_dirs| proj_dirs.data_local_dir().to_path_buf())
                .unwrap_or_else(|| PathBuf::from("splitr_data"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_end_in_app_name() {
        assert!(AppDirs::data_dir().ends_with(APP_NAME) || AppDirs::data_dir().ends_with("splitr_data"));
        assert!(AppDirs::config_path().ends_with("config.json") || AppDirs::config_path().ends_with("splitr_config.json"));
    }
}
