use super::*;

#[test]
fn parses_command_and_artifact_paths() {
    let env = Environment::from_pairs([
            ("COMMAND", "./run-tests.sh"),
            ("ARTIFACT_PATHS", "llamas.txt, dist/**/*.tar.gz"),
    ]);
    let config = AgentConfig::from_environment(&env);
    assert_eq!(config.command.as_deref(), Some("./run-tests.sh"));
    assert_eq!(config.artifact_paths, vec!["llamas.txt", "dist/**/*.tar.gz"]);
    assert!(config.has_artifacts());
}

#[test]
fn empty_artifact_paths_means_no_artifacts() {
    let env = Environment::new();
    let config = AgentConfig::from_environment(&env);
    assert!(!config.has_artifacts());
}

#[test]
fn parses_git_booleans_and_lists() {
    let env = Environment::from_pairs([
            ("CLEAN_CHECKOUT", "true"),
            ("GIT_SPARSE_CHECKOUT", "true"),
            ("GIT_SPARSE_CHECKOUT_PATHS", "a/,b/"),
            ("GIT_CLONE_DEPTH", "1"),
    ]);
    let config = AgentConfig::from_environment(&env);
    assert!(config.git.clean_checkout);
    assert!(config.git.sparse_checkout);
    assert_eq!(config.git.sparse_checkout_paths, vec!["a/", "b/"]);
    assert_eq!(config.git.clone_depth, Some(1));
}

#[test]
fn submodules_default_to_enabled() {
    let env = Environment::new();
    let config = AgentConfig::from_environment(&env);
    assert!(config.git.submodules);
}

#[test]
fn parses_docker_compose_file_list_colon_separated() {
    let env = Environment::from_pairs([("DOCKER_COMPOSE_FILE", "a.yml:b.yml")]);
    let config = AgentConfig::from_environment(&env);
    assert_eq!(config.docker.compose_file, vec!["a.yml", "b.yml"]);
}

#[test]
fn parses_plugins_json_array_of_single_key_maps() {
    let env = Environment::from_pairs([(
        "PLUGINS",
        r#"[{"https://github.com/org/plugin.git#v1": {"flag": true}}]"#,
    )]);
    let config = AgentConfig::from_environment(&env);
    assert_eq!(config.plugins.len(), 1);
    assert_eq!(config.plugins[0].source_ref, "https://github.com/org/plugin.git#v1");
}

#[test]
fn malformed_plugins_json_yields_no_plugins_rather_than_panicking() {
    let env = Environment::from_pairs([("PLUGINS", "not json")]);
    let config = AgentConfig::from_environment(&env);
    assert!(config.plugins.is_empty());
}
