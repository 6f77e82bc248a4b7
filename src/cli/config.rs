use crate::cli::run::{load_runtime_properties, RunError};
use crate::config::{default_config_paths, FilesystemProbe, PropertyValidator};
use std::fs;
use std::path::PathBuf;

const SAMPLE_PROPERTIES: &str = include_str!("../../samples/sample-properties.yml");

pub fn init(stdout: bool) -> Result<(), Box<dyn std::error::Error>> {
    if stdout {
        print!("{}", SAMPLE_PROPERTIES);
        return Ok(());
    }

    // First default location whose directory can be created
    let config_path = default_config_paths()
        .into_iter()
        .find(|path| path.parent().is_some_and(|parent| fs::create_dir_all(parent).is_ok()))
        .ok_or("no writable location for the properties file")?;

    if config_path.exists() {
        return Err(format!(
            "properties file already exists at {}; remove it first or use --stdout",
            config_path.display()
        )
        .into());
    }

    fs::write(&config_path, SAMPLE_PROPERTIES)?;

    println!("Properties file written to {}", config_path.display());
    Ok(())
}

/// Run the property validator and report the verdict
pub async fn validate(config_path: Option<PathBuf>, overrides: &[String]) -> Result<(), RunError> {
    let properties = load_runtime_properties(config_path, overrides)?;
    let report = PropertyValidator::new(&FilesystemProbe).validate(&properties).await;

    if report.is_valid() {
        println!("Properties are valid");
        Ok(())
    } else {
        Err(RunError::InvalidProperties(report.failures))
    }
}
