//! Calibration profile files on disk
//!
//! Profiles are INI files, one section per device. Keys outside any section
//! are rejected. Comments are not carried over when a file is rewritten.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use ini::Ini;
use log::{debug, info};
use ninedof_core::{Calibration, Profile};

/// Copy every section of `ini` into a [`Profile`].
fn profile_from_ini(ini: &Ini) -> Result<Profile> {
    let mut profile = Profile::new();
    for (section, properties) in ini.iter() {
        match section {
            Some(section) => {
                for (key, value) in properties.iter() {
                    profile.set(section, key, value);
                }
            }
            None => {
                if let Some((key, _)) = properties.iter().next() {
                    return Err(anyhow!("key `{key}` outside of any section"));
                }
            }
        }
    }
    Ok(profile)
}

fn ini_from_profile(profile: &Profile) -> Ini {
    let mut ini = Ini::new();
    for section in profile.sections() {
        for (key, value) in profile.entries(section) {
            ini.with_section(Some(section)).set(key, value);
        }
    }
    ini
}

/// Read the profile at `path`. A missing file is an empty profile, so every
/// sensor starts uncalibrated.
pub fn load_profile(path: &Path) -> Result<Profile> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!("{} not found, using identity calibration", path.display());
            return Ok(Profile::new());
        }
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()));
        }
    };

    let ini = Ini::load_from_str(&text)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    profile_from_ini(&ini).with_context(|| format!("invalid profile {}", path.display()))
}

/// Calibration of `section` from the profile at `path`
pub fn load_calibration(path: &Path, section: &str) -> Result<Calibration> {
    let profile = load_profile(path)?;
    Calibration::from_profile(&profile, section).map_err(|e| anyhow!("{}: {e}", path.display()))
}

/// Store `calibration` under `section`, keeping every other section and key
/// already in the file.
pub fn save_calibration(path: &Path, section: &str, calibration: &Calibration) -> Result<()> {
    let mut profile = load_profile(path)?;
    calibration.write_to(&mut profile, section);

    ini_from_profile(&profile)
        .write_to_file(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!("saved [{section}] calibration to {}", path.display());
    Ok(())
}
