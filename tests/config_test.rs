use network_announcer::{RelayConfig, RelayRuntime};
use std::fs;
use tempfile::TempDir;

const CONFIG: &str = r#"{
  "reddit": {
    "username": "ImagesOfNetwork",
    "password": "hunter2",
    "client_id": "abc",
    "client_secret": "def"
  },
  "network": {
    "name": "ImagesOf",
    "multireddit_owner": "amici_ursi",
    "stream_multireddits": ["imagesofthestates", "imagesofcanada"],
    "modlog_multireddits": ["imagesofthestates"]
  },
  "github": { "owner": "amici-ursi", "repo": "ImagesOfNetwork" },
  "discord": {
    "token": "bot-token",
    "channels": {
      "inbox": "100", "false_positive": "101", "code_events": "102",
      "stream_posts": "103", "mod_actions": "104", "stats": "105"
    }
  },
  "schedule": { "run_interval_secs": 60, "stats_interval_secs": 600 }
}"#;

#[test]
fn test_load_explicit_path_and_assemble() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("announcer.json");
    fs::write(&path, CONFIG).unwrap();

    let config = RelayConfig::load(Some(&path)).unwrap();
    assert!(config.validate().is_ok());
    assert_eq!(config.run_interval().as_secs(), 60);
    assert_eq!(config.github.as_ref().unwrap().repository(), "amici-ursi/ImagesOfNetwork");

    let runtime = RelayRuntime::from_config(&config, true).unwrap();
    assert_eq!(
        runtime.scheduler.source_ids(),
        vec![
            "inbox",
            "stream:imagesofthestates",
            "stream:imagesofcanada",
            "code-events:amici-ursi/ImagesOfNetwork",
            "modlog:amici_ursi/imagesofthestates",
        ]
    );
}

#[test]
fn test_load_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    assert!(RelayConfig::load(Some(&dir.path().join("nope.json"))).is_err());
}
