use super::*;
use proptest::prelude::*;

fn arb_path() -> impl Strategy<Value = PathBuf> {
    "[a-z]{1,8}(/[a-z]{1,8}){0,2}\\.db".prop_map(PathBuf::from)
}

/// Generates an arbitrary Config
fn arb_config() -> impl Strategy<Value = Config> {
    (
        arb_path(),
        any::<bool>(),
        any::<bool>(),
        any::<u32>(),
        0.01f64..0.99,
        1i32..36_500,
        prop::option::of(arb_path()),
    )
        .prop_map(
            |(database_path, read_only, allow_destructive_recreate, backup_count, desired_retention, max_interval_days, log_dir)| Config {
                database_path,
                read_only,
                allow_destructive_recreate,
                backup_count,
                desired_retention,
                max_interval_days,
                log_dir,
            },
        )
}

/// Generates an arbitrary ConfigUpdate
fn arb_config_update() -> impl Strategy<Value = ConfigUpdate> {
    (
        prop::option::of(arb_path()),
        prop::option::of(any::<bool>()),
        prop::option::of(any::<bool>()),
        prop::option::of(any::<u32>()),
        prop::option::of(0.01f64..0.99),
        prop::option::of(1i32..36_500),
        prop::option::of(arb_path()),
    )
        .prop_map(
            |(database_path, read_only, allow_destructive_recreate, backup_count, desired_retention, max_interval_days, log_dir)| ConfigUpdate {
                database_path,
                read_only,
                allow_destructive_recreate,
                backup_count,
                desired_retention,
                max_interval_days,
                log_dir,
            },
        )
}

proptest! {
    /// An empty update leaves the config unchanged
    #[test]
    fn prop_empty_update_is_identity(config in arb_config()) {
        prop_assert_eq!(config.clone().apply_update(ConfigUpdate::default()), config);
    }

    /// Every set field of an update wins, every unset field keeps its value
    #[test]
    fn prop_update_fields_take_precedence(config in arb_config(), update in arb_config_update()) {
        let merged = config.clone().apply_update(update.clone());
        prop_assert_eq!(&merged.database_path, update.database_path.as_ref().unwrap_or(&config.database_path));
        prop_assert_eq!(merged.read_only, update.read_only.unwrap_or(config.read_only));
        prop_assert_eq!(
            merged.allow_destructive_recreate,
            update.allow_destructive_recreate.unwrap_or(config.allow_destructive_recreate)
        );
        prop_assert_eq!(merged.backup_count, update.backup_count.unwrap_or(config.backup_count));
        prop_assert_eq!(merged.desired_retention, update.desired_retention.unwrap_or(config.desired_retention));
        prop_assert_eq!(merged.max_interval_days, update.max_interval_days.unwrap_or(config.max_interval_days));
        prop_assert_eq!(merged.log_dir, update.log_dir.or(config.log_dir));
    }

    /// Applying the same update twice is the same as applying it once
    #[test]
    fn prop_apply_update_is_idempotent(config in arb_config(), update in arb_config_update()) {
        let once = config.clone().apply_update(update.clone());
        let twice = once.clone().apply_update(update);
        prop_assert_eq!(once, twice);
    }

    /// Configs built from valid ranges always yield a valid engine config
    #[test]
    fn prop_fsrs_config_is_valid(config in arb_config()) {
        prop_assert!(config.fsrs_config().validate().is_ok());
    }
}
