use std::time::Duration;
use std::{env, fs};

use lightwave_sts::config::LoadError;
use lightwave_sts::config::loader::load_config;

const CONFIG: &str = r#"
[server]
host = "127.0.0.1"
port = 9443

[logging]
level = "debug"

[oidc]
public_endpoint = "sts.example.com"
authorization_code_lifetime = "30s"
session_lifetime = "2h"

[[tenants]]
name = "acme"

[tenants.signer]
serial_number = "0A01"
private_key_path = "acme.pem"

[tenants.policy]
max_bearer_token_lifetime = "15m"

[[tenants.clients]]
client_id = "app1"
redirect_uris = ["https://app/cb"]
post_logout_redirect_uris = ["https://app/bye"]
logout_uri = "https://app/logout"

[[tenants.users]]
username = "alice"
password_hash = "$argon2id$v=19$m=1024,t=1,p=1$c2FsdHNhbHQ$ZmFrZWhhc2hmYWtlaGFzaA"
groups = ["acme\\Users"]
"#;

#[test]
fn test_config_parsing_and_env_overrides() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("lightwave-sts.toml");
    fs::write(&path, CONFIG).expect("write toml");

    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.server.port, 9443);
    assert_eq!(cfg.logging.level, "debug");
    assert_eq!(cfg.oidc.authorization_code_lifetime, Duration::from_secs(30));
    assert_eq!(cfg.oidc.session_lifetime, Duration::from_secs(2 * 3600));
    // Unset values keep their defaults.
    assert_eq!(cfg.oidc.reaper_interval, Duration::from_secs(30));

    let tenant = &cfg.tenants[0];
    assert_eq!(tenant.name, "acme");
    assert_eq!(
        tenant.policy.max_bearer_token_lifetime,
        Duration::from_secs(15 * 60)
    );
    assert_eq!(tenant.clients[0].logout_uri.as_deref(), Some("https://app/logout"));
    assert_eq!(tenant.users[0].groups, vec!["acme\\Users".to_string()]);

    // Env override wins over the file
    unsafe {
        env::set_var("LIGHTWAVE_STS__SERVER__PORT", "9555");
    }
    let cfg_env = load_config(path.to_str()).expect("should parse config with env overrides");
    assert_eq!(cfg_env.server.port, 9555);
    unsafe {
        env::remove_var("LIGHTWAVE_STS__SERVER__PORT");
    }
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = tempfile::tempdir().expect("tmp dir");

    let path = dir.path().join("scheme.toml");
    fs::write(
        &path,
        "[oidc]\npublic_endpoint = \"https://sts.example.com\"\n",
    )
    .expect("write toml");
    let err = load_config(path.to_str()).expect_err("expected validation error");
    assert!(matches!(err, LoadError::Invalid(_)));
    assert!(err.to_string().contains("host[:port]"));

    let path = dir.path().join("hash.toml");
    fs::write(&path, CONFIG.replace("$argon2id$v=19$m=1024,t=1,p=1$c2FsdHNhbHQ$ZmFrZWhhc2hmYWtlaGFzaA", "secret"))
        .expect("write toml");
    let err = load_config(path.to_str()).expect_err("expected validation error");
    assert!(err.to_string().contains("PHC"));

    let path = dir.path().join("syntax.toml");
    fs::write(&path, "[server]\nport = \"not a port\"\n").expect("write toml");
    let err = load_config(path.to_str()).expect_err("expected build error");
    assert!(matches!(err, LoadError::Build(_)));
}

#[test]
fn test_config_round_trips_through_toml() {
    let cfg = load_config_from_str(CONFIG);
    let rendered = toml::to_string(&cfg).expect("serialize");

    let reloaded = load_config_from_str(&rendered);
    assert_eq!(reloaded.tenants[0].clients[0].client_id, "app1");
    assert_eq!(
        reloaded.oidc.authorization_code_lifetime,
        cfg.oidc.authorization_code_lifetime
    );
    assert_eq!(reloaded.tenants[0].policy, cfg.tenants[0].policy);
}

fn load_config_from_str(content: &str) -> lightwave_sts::StsConfig {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("lightwave-sts.toml");
    fs::write(&path, content).expect("write toml");
    load_config(path.to_str()).expect("should parse config")
}
