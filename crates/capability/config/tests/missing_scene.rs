use sgbind_config::AppConfig;

#[test]
fn missing_scene_file_is_an_error() {
    std::env::remove_var("SGBIND_SCENE_FILE");
    let err = AppConfig::from_env().expect_err("must fail");
    assert!(err.to_string().contains("SGBIND_SCENE_FILE"));
}
