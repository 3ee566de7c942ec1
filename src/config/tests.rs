use super::*;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("info".to_string());
    raw.render.mermaid_cli_path = Some(PathBuf::from("/opt/mmdc"));

    let overrides = DumpOverrides {
        log_level: Some("debug".to_string()),
        render: RenderOverrides {
            mermaid_cli_path: Some(PathBuf::from("/usr/local/bin/mmdc")),
            ..Default::default()
        },
        ..Default::default()
    };

    raw.apply_dump_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(
        settings.render.mermaid_cli_path,
        PathBuf::from("/usr/local/bin/mmdc")
    );
}

#[test]
fn defaults_apply_when_nothing_is_configured() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.logging.level, LevelFilter::WARN);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
    assert_eq!(
        settings.render.mermaid_cli_path,
        PathBuf::from(DEFAULT_MERMAID_CLI_PATH)
    );
    assert_eq!(
        settings.render.mermaid_cache_dir,
        PathBuf::from(DEFAULT_MERMAID_CACHE_DIR)
    );
    assert_eq!(settings.render.mermaid_theme, DEFAULT_MERMAID_THEME);
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = DumpOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_dump_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn rejects_invalid_log_level() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("loud".to_string());

    let err = Settings::from_raw(raw).expect_err("invalid level");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "logging.level",
            ..
        }
    ));
}

#[test]
fn rejects_empty_cache_dir() {
    let mut raw = RawSettings::default();
    raw.render.mermaid_cache_dir = Some(PathBuf::new());

    let err = Settings::from_raw(raw).expect_err("empty cache dir");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "render.mermaid_cache_dir",
            ..
        }
    ));
}

#[test]
fn theme_is_normalised_and_validated() {
    let mut raw = RawSettings::default();
    raw.render.mermaid_theme = Some(" Forest ".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.render.mermaid_theme, "forest");

    let mut raw = RawSettings::default();
    raw.render.mermaid_theme = Some("neon".to_string());
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn parse_dump_arguments() {
    let args = CliArgs::parse_from([
        "render_dump",
        "--hydrate",
        "--no-sanitize",
        "--render-mermaid-theme",
        "neutral",
        "--log-json",
        "true",
        "notes.md",
    ]);

    assert_eq!(args.input, PathBuf::from("notes.md"));
    assert!(args.hydrate);
    assert!(args.no_sanitize);
    assert!(!args.standalone);
    assert_eq!(
        args.overrides.render.mermaid_theme.as_deref(),
        Some("neutral")
    );
    assert_eq!(args.overrides.log_json, Some(true));
}
