use sgbind_config::AppConfig;

#[test]
fn load_config_from_env() {
    std::env::set_var("SGBIND_SCENE_FILE", "/tmp/scene.json");
    std::env::set_var("SGBIND_DEFAULT_TIMEOUT_MS", "2500");
    std::env::set_var("SGBIND_STRICT_VARIABLES", "off");
    std::env::set_var("SGBIND_VAR_BROKER_HOST", "broker.example");

    let config = AppConfig::from_env().expect("config");
    assert_eq!(config.scene_file, "/tmp/scene.json");
    assert_eq!(config.default_timeout_ms, 2500);
    assert_eq!(config.default_retry_count, 3);
    assert_eq!(config.stream_buffer_capacity, 32);
    assert!(!config.strict_variables);
    assert!(config
        .global_vars
        .iter()
        .any(|(name, value)| name == "broker_host" && value == "broker.example"));
}
