//! Configuration precedence: defaults, then the TOML file, then
//! `CITIES_ENDPOINT`. Kept to a single test so nothing else in this binary
//! observes the environment change.

use std::io::Write;

use cities_core::{ServiceConfig, SoapVersion, DEFAULT_ENDPOINT, ENDPOINT_ENV};
use tempfile::NamedTempFile;

#[test]
fn environment_endpoint_beats_file_endpoint() {
    assert_eq!(ENDPOINT_ENV, "CITIES_ENDPOINT");

    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
endpoint = "http://127.0.0.1:3000/globalweather.asmx"
soap_version = "1.1"
"#
    )
    .unwrap();

    std::env::remove_var(ENDPOINT_ENV);
    assert_eq!(ServiceConfig::load(None).unwrap().endpoint, DEFAULT_ENDPOINT);
    let from_file = ServiceConfig::load(Some(file.path())).unwrap();
    assert_eq!(from_file.endpoint, "http://127.0.0.1:3000/globalweather.asmx");

    std::env::set_var(ENDPOINT_ENV, "https://override.example.com/globalweather.asmx");
    let overridden = ServiceConfig::load(Some(file.path()));
    let defaults = ServiceConfig::load(None);
    std::env::set_var(ENDPOINT_ENV, "not a url");
    let invalid = ServiceConfig::load(None);
    std::env::remove_var(ENDPOINT_ENV);

    let overridden = overridden.unwrap();
    assert_eq!(overridden.endpoint, "https://override.example.com/globalweather.asmx");
    assert_eq!(overridden.soap_version, SoapVersion::V11);
    assert_eq!(
        defaults.unwrap().endpoint,
        "https://override.example.com/globalweather.asmx"
    );
    assert!(invalid.is_err());
}
