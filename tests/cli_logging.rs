use idcard_check::cli::log_directives;

#[test]
fn flag_beats_env_and_config() {
    assert_eq!(log_directives(Some("debug"), Some("warn"), "info"), "debug");
}

#[test]
fn env_beats_config_without_flag() {
    assert_eq!(log_directives(None, Some("idcard_check=trace"), "info"), "idcard_check=trace");
}

#[test]
fn config_is_the_fallback() {
    assert_eq!(log_directives(None, None, "warn"), "warn");
}

#[test]
fn blank_sources_fall_through() {
    assert_eq!(log_directives(Some("  "), Some(""), "error"), "error");
    assert_eq!(log_directives(Some(""), Some("debug"), "info"), "debug");
}
