use std::fs;
use std::path::Path;

use rompipe::{canonicalize_or_current, infer_project_name, parse_address_arg};
use tempfile::tempdir;

// Both cases live in one test because they change the process working directory.
#[test]
fn canonicalize_or_current_resolves_against_cwd() {
    let original = std::env::current_dir().expect("cwd");
    let tmp = tempdir().expect("tempdir");
    let subdir = tmp.path().join("nested");
    fs::create_dir_all(&subdir).expect("create nested");
    std::env::set_current_dir(tmp.path()).expect("chdir tmp");

    let result = canonicalize_or_current(".").expect("canonicalize").canonicalize().expect("canon");
    assert_eq!(result, tmp.path().canonicalize().expect("canon tmp"));

    let result = canonicalize_or_current("nested").expect("canonicalize nested");
    assert_eq!(result, subdir.canonicalize().expect("canonicalize subdir"));

    let result = canonicalize_or_current("not-yet").expect("missing path");
    assert!(result.is_absolute());
    assert!(result.ends_with("not-yet"));

    std::env::set_current_dir(original).expect("restore cwd");
}

#[test]
fn infer_project_name_uses_last_path_component() {
    assert_eq!(infer_project_name(Path::new("/tmp/smb-port")), "smb-port");
    assert_eq!(infer_project_name(Path::new("relative/zelda")), "zelda");
}

#[test]
fn infer_project_name_falls_back_when_missing() {
    assert_eq!(infer_project_name(Path::new("/")), "unnamed-project");
}

#[test]
fn parse_address_arg_accepts_listing_forms() {
    assert_eq!(parse_address_arg("$2002"), Ok(0x2002));
    assert_eq!(parse_address_arg("0x4016"), Ok(0x4016));
    assert_eq!(parse_address_arg(" C000 "), Ok(0xC000));
    assert!(parse_address_arg("$200").is_err());
    assert!(parse_address_arg("0x12345").is_err());
    assert!(parse_address_arg("nope").unwrap_err().contains("invalid address"));
}
