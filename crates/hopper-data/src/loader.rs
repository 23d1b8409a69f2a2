//! Resolution pipeline: reads data files, validates them, and builds the
//! item registry and engine settings.
//!
//! Provides format detection (RON/JSON/TOML), file discovery, and the
//! deserialization helpers the pipeline is built from.

use crate::schema::{ItemData, SettingsData, StartingData, TrackLevelData, UpgradesData};
use hopper_core::error::HopperError;
use hopper_core::fixed::{Fixed64, checked_f64_to_fixed64};
use hopper_core::registry::{ItemRoles, Registry, RegistryBuilder, RegistryError};
use hopper_core::settings::{Settings, StartingValues};
use hopper_core::upgrade::{UpgradeError, UpgradeKind, UpgradeTrack, UpgradeTracks};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that stop configuration loading altogether. Problems confined to
/// one upgrade track are reported through [`HopperData::disabled`] instead.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files share a base name but differ in format.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    #[error("invalid value for '{key}' in {file}: {detail}")]
    InvalidValue {
        file: PathBuf,
        key: &'static str,
        detail: String,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

const EXTENSIONS: [(&str, Format); 3] = [
    ("ron", Format::Ron),
    ("toml", Format::Toml),
    ("json", Format::Json),
];

/// Detect the format of a file from its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    let ext = path.extension().and_then(|e| e.to_str());
    EXTENSIONS
        .iter()
        .find(|(name, _)| Some(*name) == ext)
        .map(|(_, format)| *format)
        .ok_or_else(|| DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        })
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Find `{base_name}.ron`, `.toml`, or `.json` in `dir`. `Ok(None)` if none
/// exists; `ConflictingFormats` if more than one does.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;
    for (ext, _) in EXTENSIONS {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if !candidate.exists() {
            continue;
        }
        if let Some(existing) = found {
            return Err(DataLoadError::ConflictingFormats {
                a: existing,
                b: candidate,
            });
        }
        found = Some(candidate);
    }
    Ok(found)
}

/// Like [`find_data_file`], but a missing file is an error.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

fn parse_error(path: &Path, detail: impl ToString) -> DataLoadError {
    DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: detail.to_string(),
    }
}

/// Read a file and deserialize it according to its extension.
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(path, e)),
    }
}

/// Deserialize a list. TOML has no top-level arrays, so TOML files hold the
/// list under `toml_key`; RON and JSON files are the list itself.
pub fn deserialize_list<T: DeserializeOwned>(
    path: &Path,
    toml_key: &str,
) -> Result<Vec<T>, DataLoadError> {
    if detect_format(path)? != Format::Toml {
        return deserialize_file(path);
    }
    let mut table: toml::Table = deserialize_file(path)?;
    let array = table
        .remove(toml_key)
        .ok_or_else(|| parse_error(path, format!("missing key '{toml_key}' in TOML file")))?;
    array.try_into().map_err(|e: toml::de::Error| parse_error(path, e))
}

/// `DuplicateName` if `name` was already seen.
pub fn check_duplicate(
    seen: &mut HashSet<String>,
    name: &str,
    file: &Path,
) -> Result<(), DataLoadError> {
    if seen.insert(name.to_string()) {
        Ok(())
    } else {
        Err(DataLoadError::DuplicateName {
            file: file.to_path_buf(),
            name: name.to_string(),
        })
    }
}

// ===========================================================================
// Pipeline
// ===========================================================================

/// Everything a host needs to construct an engine.
#[derive(Debug)]
pub struct HopperData {
    pub registry: Registry,
    pub settings: Settings,
    /// One `ConfigurationInvalid` per upgrade track that was disabled.
    pub disabled: Vec<HopperError>,
}

/// Load `items.*` and `settings.*` from `dir`.
///
/// Errors in a single upgrade track disable that track and are returned in
/// [`HopperData::disabled`]; anything else fails the load.
pub fn load_hopper_data(dir: &Path) -> Result<HopperData, DataLoadError> {
    let items_path = require_data_file(dir, "items")?;
    let items: Vec<ItemData> = deserialize_list(&items_path, "items")?;
    let registry = build_registry(&items, &items_path)?;

    let settings_path = require_data_file(dir, "settings")?;
    let data: SettingsData = deserialize_file(&settings_path)?;
    let starting = resolve_starting(&data.starting, &settings_path)?;

    let (tracks, mut disabled) = resolve_tracks(&data.upgrades);
    let mut settings = Settings::new(starting, tracks);
    settings.drop_to_inventory = data.drop_to_inventory;
    settings.disabled_hooks = data.disabled_hooks.into_iter().collect();

    let (settings, missing) = settings.validated();
    disabled.extend(missing.into_iter().map(HopperError::from));

    tracing::info!(
        items = registry.item_count(),
        disabled_tracks = disabled.len(),
        dir = %dir.display(),
        "hopper data loaded"
    );
    Ok(HopperData {
        registry,
        settings,
        disabled,
    })
}

fn build_registry(items: &[ItemData], path: &Path) -> Result<Registry, DataLoadError> {
    let mut seen = HashSet::new();
    let mut builder = RegistryBuilder::new();
    for item in items {
        check_duplicate(&mut seen, &item.name, path)?;
        let roles = item.roles.iter().fold(ItemRoles::NONE, |roles, role| roles.with(*role));
        builder.register_item(&item.name, item.max_stack_size, roles);
    }
    Ok(builder.build()?)
}

fn seconds(value: f64, key: &'static str, path: &Path) -> Result<Fixed64, DataLoadError> {
    match checked_f64_to_fixed64(value) {
        Some(v) if v > Fixed64::ZERO => Ok(v),
        _ => Err(DataLoadError::InvalidValue {
            file: path.to_path_buf(),
            key,
            detail: format!("{value} is not a positive number of seconds"),
        }),
    }
}

fn resolve_starting(data: &StartingData, path: &Path) -> Result<StartingValues, DataLoadError> {
    Ok(StartingValues {
        transfer_speed: seconds(data.transfer_speed, "transfer_speed", path)?,
        transfer_amount: data.transfer_amount,
        suction_speed: seconds(data.suction_speed, "suction_speed", path)?,
        suction_amount: data.suction_amount,
        suction_range: data.suction_range,
        link_capacity: data.max_containers,
    })
}

fn invalid_level(kind: UpgradeKind, level: &TrackLevelData, reason: &'static str) -> UpgradeError {
    UpgradeError::InvalidLevel {
        kind,
        level: level.level.to_string(),
        reason,
    }
}

fn price(kind: UpgradeKind, level: &TrackLevelData) -> Result<Fixed64, UpgradeError> {
    checked_f64_to_fixed64(level.price)
        .ok_or_else(|| invalid_level(kind, level, "price is not a representable number"))
}

fn speed_track(
    kind: UpgradeKind,
    levels: &[TrackLevelData],
) -> Result<UpgradeTrack<Fixed64>, UpgradeError> {
    let entries = levels
        .iter()
        .map(|l| match checked_f64_to_fixed64(l.level) {
            Some(level) if level > Fixed64::ZERO => Ok((level, price(kind, l)?)),
            _ => Err(invalid_level(kind, l, "level must be a positive number of seconds")),
        })
        .collect::<Result<Vec<_>, _>>()?;
    UpgradeTrack::new(kind, entries)
}

fn count_track(
    kind: UpgradeKind,
    levels: &[TrackLevelData],
) -> Result<UpgradeTrack<u32>, UpgradeError> {
    let entries = levels
        .iter()
        .map(|l| {
            let whole = l.level.fract() == 0.0 && l.level >= 0.0 && l.level <= f64::from(u32::MAX);
            if whole {
                Ok((l.level as u32, price(kind, l)?))
            } else {
                Err(invalid_level(kind, l, "level must be a whole non-negative number"))
            }
        })
        .collect::<Result<Vec<_>, _>>()?;
    UpgradeTrack::new(kind, entries)
}

fn keep<K: Ord>(
    disabled: &mut Vec<HopperError>,
    result: Result<UpgradeTrack<K>, UpgradeError>,
) -> Option<UpgradeTrack<K>> {
    match result {
        Ok(track) => Some(track),
        Err(error) => {
            tracing::warn!(%error, "upgrade track disabled");
            disabled.push(HopperError::from(error));
            None
        }
    }
}

/// Build each track, disabling the ones that fail.
fn resolve_tracks(data: &UpgradesData) -> (UpgradeTracks, Vec<HopperError>) {
    use UpgradeKind::*;
    let mut disabled = Vec::new();
    let d = &mut disabled;
    let tracks = UpgradeTracks {
        transfer_speed: keep(d, speed_track(TransferSpeed, &data.transfer_speed)),
        suction_speed: keep(d, speed_track(SuctionSpeed, &data.suction_speed)),
        transfer_amount: keep(d, count_track(TransferAmount, &data.transfer_amount)),
        suction_amount: keep(d, count_track(SuctionAmount, &data.suction_amount)),
        suction_range: keep(d, count_track(SuctionRange, &data.suction_range)),
        link_capacity: keep(d, count_track(LinkCapacity, &data.max_containers)),
    };
    (tracks, disabled)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Create a temporary directory with a unique name for test isolation.
    fn make_test_dir(suffix: &str) -> PathBuf {
        let name = format!("hopper_data_test_{suffix}_{}", std::process::id());
        let dir = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn cleanup(dir: &Path) {
        let _ = fs::remove_dir_all(dir);
    }

    const ITEMS_RON: &str = r#"[
        (name: "cobblestone"),
        (name: "coal", roles: [fuel]),
        (name: "bucket", max_stack_size: 16, roles: [empty_bucket]),
    ]"#;

    const SETTINGS_RON: &str = r#"(
        starting: (transfer_speed: 1.0, max_containers: 1),
        upgrades: (
            transfer_speed: [(level: 1.0, price: 0.0), (level: 0.5, price: 100.0)],
            transfer_amount: [(level: 1.0, price: 0.0), (level: 8.0, price: 50.0)],
            suction_speed: [(level: 1.0, price: 0.0)],
            suction_amount: [(level: 1.0, price: 0.0)],
            suction_range: [(level: 1.0, price: 0.0), (level: 3.0, price: 75.0)],
            max_containers: [(level: 1.0, price: 0.0), (level: 2.0, price: 10.0)],
        ),
        drop_to_inventory: true,
        disabled_hooks: ["stacking"],
    )"#;

    // -----------------------------------------------------------------------
    // Format detection and discovery
    // -----------------------------------------------------------------------

    #[test]
    fn detect_formats() {
        assert_eq!(detect_format(Path::new("items.ron")).unwrap(), Format::Ron);
        assert_eq!(detect_format(Path::new("items.toml")).unwrap(), Format::Toml);
        assert_eq!(detect_format(Path::new("items.json")).unwrap(), Format::Json);
        assert!(matches!(
            detect_format(Path::new("items.yaml")),
            Err(DataLoadError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            detect_format(Path::new("items")),
            Err(DataLoadError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn find_data_file_conflict() {
        let dir = make_test_dir("find_conflict");
        fs::write(dir.join("items.ron"), "[]").unwrap();
        fs::write(dir.join("items.json"), "[]").unwrap();

        assert!(matches!(
            find_data_file(&dir, "items"),
            Err(DataLoadError::ConflictingFormats { .. })
        ));
        assert!(find_data_file(&dir, "settings").unwrap().is_none());
        assert!(matches!(
            require_data_file(&dir, "settings"),
            Err(DataLoadError::MissingRequired { .. })
        ));

        cleanup(&dir);
    }

    #[test]
    fn deserialize_list_toml_uses_key() {
        let dir = make_test_dir("list_toml");
        let path = dir.join("items.toml");
        fs::write(&path, "[[items]]\nname = \"coal\"\nroles = [\"fuel\"]\n").unwrap();

        let items: Vec<ItemData> = deserialize_list(&path, "items").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "coal");

        fs::write(&path, "foo = \"bar\"").unwrap();
        let result: Result<Vec<ItemData>, _> = deserialize_list(&path, "items");
        assert!(matches!(result, Err(DataLoadError::Parse { .. })));

        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // Pipeline
    // -----------------------------------------------------------------------

    #[test]
    fn load_full_configuration() {
        let dir = make_test_dir("load_full");
        fs::write(dir.join("items.ron"), ITEMS_RON).unwrap();
        fs::write(dir.join("settings.ron"), SETTINGS_RON).unwrap();

        let data = load_hopper_data(&dir).unwrap();
        assert!(data.disabled.is_empty());
        assert_eq!(data.registry.item_count(), 3);
        assert_eq!(data.registry.max_stack_size(data.registry.item_id("bucket").unwrap()), 16);
        assert!(data.settings.drop_to_inventory);
        assert!(!data.settings.hook_enabled("stacking"));
        let amounts = data.settings.tracks.transfer_amount.as_ref().unwrap();
        assert_eq!(amounts.best(), Some(8));

        cleanup(&dir);
    }

    #[test]
    fn invalid_track_is_disabled_not_fatal() {
        let dir = make_test_dir("load_invalid_track");
        fs::write(dir.join("items.json"), r#"[{"name": "coal"}]"#).unwrap();
        fs::write(
            dir.join("settings.json"),
            r#"{
                "upgrades": {
                    "transfer_amount": [{"level": 1, "price": -5}],
                    "suction_range": [{"level": 2, "price": 0}],
                    "transfer_speed": [{"level": 1.0, "price": 0}]
                }
            }"#,
        )
        .unwrap();

        let data = load_hopper_data(&dir).unwrap();
        let tracks = &data.settings.tracks;
        assert!(tracks.transfer_amount.is_none());
        // Range 2 does not contain the starting range 1.
        assert!(tracks.suction_range.is_none());
        assert!(tracks.transfer_speed.is_some());
        // Empty tracks are disabled too.
        assert!(tracks.suction_speed.is_none());
        assert!(
            data.disabled
                .iter()
                .all(|e| matches!(e, HopperError::ConfigurationInvalid(_)))
        );

        cleanup(&dir);
    }

    #[test]
    fn bad_levels_name_the_real_cause() {
        let level = |level: f64, price: f64| TrackLevelData { level, price };

        let err = speed_track(UpgradeKind::SuctionSpeed, &[level(0.0, 10.0)]).unwrap_err();
        assert!(matches!(err, UpgradeError::InvalidLevel { kind: UpgradeKind::SuctionSpeed, .. }));
        assert!(err.to_string().contains("positive number of seconds"));
        assert!(!err.to_string().contains("negative price"));

        let err = count_track(UpgradeKind::SuctionRange, &[level(1.5, 0.0)]).unwrap_err();
        assert!(err.to_string().contains("whole non-negative number"));

        let err = count_track(UpgradeKind::SuctionRange, &[level(1.0, f64::NAN)]).unwrap_err();
        assert!(err.to_string().contains("price is not a representable number"));

        // A real negative price keeps its own error.
        let err = count_track(UpgradeKind::SuctionRange, &[level(1.0, -5.0)]).unwrap_err();
        assert!(matches!(err, UpgradeError::NegativePrice { .. }));
    }

    #[test]
    fn duplicate_item_is_fatal() {
        let dir = make_test_dir("load_duplicate");
        fs::write(dir.join("items.ron"), r#"[(name: "coal"), (name: "coal")]"#).unwrap();
        fs::write(dir.join("settings.ron"), "()").unwrap();

        assert!(matches!(
            load_hopper_data(&dir),
            Err(DataLoadError::DuplicateName { ref name, .. }) if name == "coal"
        ));

        cleanup(&dir);
    }

    #[test]
    fn non_positive_starting_speed_is_fatal() {
        let dir = make_test_dir("load_bad_speed");
        fs::write(dir.join("items.ron"), "[]").unwrap();
        fs::write(dir.join("settings.toml"), "[starting]\nsuction_speed = 0.0\n").unwrap();

        assert!(matches!(
            load_hopper_data(&dir),
            Err(DataLoadError::InvalidValue { key: "suction_speed", .. })
        ));

        cleanup(&dir);
    }

    #[test]
    fn error_display_messages() {
        let e = DataLoadError::MissingRequired {
            file: "items".to_string(),
            dir: PathBuf::from("/data"),
        };
        assert!(e.to_string().contains("items"));
        assert!(e.to_string().contains("/data"));

        let e = DataLoadError::InvalidValue {
            file: PathBuf::from("settings.ron"),
            key: "transfer_speed",
            detail: "-1 is not a positive number of seconds".to_string(),
        };
        assert!(e.to_string().contains("transfer_speed"));
    }
}
