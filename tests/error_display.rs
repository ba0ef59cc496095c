use vrc_lib::{ErrorCategory, VrcError};

#[test]
fn config_error_display_includes_message() {
    let err = VrcError::Config("missing viewport".to_string());

    assert_eq!(format!("{}", err), "Configuration error: missing viewport");
}

#[test]
fn io_error_display_wraps_source() {
    let io_err = std::io::Error::other("disk full");
    let err: VrcError = io_err.into();
    let rendered = format!("{}", err);

    assert!(rendered.starts_with("IO error: "));
    assert!(rendered.contains("disk full"));
}

#[test]
fn browser_helper_uses_message() {
    let err = VrcError::browser("helper exited");

    assert_eq!(format!("{}", err), "Browser error: helper exited");
}

#[test]
fn timeouts_are_retryable_and_other_errors_are_not() {
    assert!(VrcError::timeout("navigation").is_timeout());
    assert!(VrcError::browser("page.goto: Timeout 30000ms exceeded").is_timeout());
    assert!(!VrcError::browser("net::ERR_NAME_NOT_RESOLVED").is_timeout());
    assert!(!VrcError::Config("bad".into()).is_timeout());
}

#[test]
fn missing_origin_payload_suggests_env_vars() {
    let payload = VrcError::Config("PROD_WEBSITE_URL is not set".into()).to_payload();

    assert_eq!(payload.category, ErrorCategory::Config);
    assert!(payload
        .remediation
        .as_deref()
        .unwrap_or_default()
        .contains("MIGRATED_WEBSITE_URL"));
}

#[test]
fn missing_playwright_payload_suggests_install() {
    let payload = VrcError::browser("playwright npm package is missing").to_payload();

    assert_eq!(payload.category, ErrorCategory::Browser);
    assert!(payload
        .remediation
        .as_deref()
        .unwrap_or_default()
        .contains("npm install playwright"));
}
