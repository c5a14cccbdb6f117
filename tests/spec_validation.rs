//! Unit tests for server spec construction and validation.

#[path = "common/test_constants.rs"]
mod test_constants;

use test_constants::DEFAULT_COMMERCIAL_TYPE;

use eskadra::{ServerSpec, SpecError};

#[test]
fn build_rejects_empty_name() {
    let error = ServerSpec::builder()
        .commercial_type(DEFAULT_COMMERCIAL_TYPE)
        .image_id("img-1")
        .build()
        .expect_err("validation should fail");
    assert_eq!(error, SpecError::MissingField(String::from("name")));
}

#[test]
fn build_rejects_other_missing_fields() {
    let base = ServerSpec::builder()
        .name("web-1")
        .commercial_type(DEFAULT_COMMERCIAL_TYPE)
        .image_id("img-1")
        .build()
        .expect("baseline spec should be valid");

    let cases = [
        (
            "commercial_type",
            ServerSpec {
                commercial_type: String::new(),
                ..base.clone()
            },
        ),
        (
            "image_id",
            ServerSpec {
                image_id: String::new(),
                ..base.clone()
            },
        ),
    ];

    for (field, spec) in cases {
        let error = spec.validate().expect_err("validation should fail");
        assert_eq!(error, SpecError::MissingField(field.to_owned()));
    }
}

#[test]
fn build_trims_string_inputs() {
    let spec = ServerSpec::builder()
        .name("  web-1  ")
        .commercial_type(format!(" {DEFAULT_COMMERCIAL_TYPE} "))
        .image_id(" img-1 ")
        .tags(["  db ", "cache"])
        .build()
        .expect("spec should build");

    assert_eq!(spec.name, "web-1");
    assert_eq!(spec.commercial_type, DEFAULT_COMMERCIAL_TYPE);
    assert_eq!(spec.image_id, "img-1");
    assert_eq!(spec.tags, [String::from("db"), String::from("cache")]);
}

#[test]
fn whitespace_only_name_is_rejected() {
    let error = ServerSpec::builder()
        .name("   ")
        .commercial_type(DEFAULT_COMMERCIAL_TYPE)
        .image_id("img-1")
        .build()
        .expect_err("validation should fail");
    assert_eq!(error, SpecError::MissingField(String::from("name")));
}
