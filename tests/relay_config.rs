// tests/relay_config.rs
use headline_relay::config::{AppConfig, RateLimitBy, TransportConfig};
use std::{env, fs};

const SAMPLE: &str = r#"
poll_interval_secs = 30
headline_slots = 8

[[feeds]]
category = "本港新聞"
url = "https://rthk.hk/rthk/news/rss/c_expressnews_clocal.xml"

[[feeds]]
category = "財經新聞"
url = "https://rthk.hk/rthk/news/rss/c_expressnews_cfinance.xml"

[debounce]
min_interval_secs = 120
rate_limit_by = "success"

[transport]
kind = "rfcomm"
device = "/dev/rfcomm0"

[server]
bind = "127.0.0.1:5050"
"#;

fn clear_env() {
    for k in [
        "HEADLINES_CONFIG_PATH",
        "POLL_INTERVAL_SECS",
        "PUSH_MIN_INTERVAL_SECS",
        "BIND_ADDR",
    ] {
        env::remove_var(k);
    }
}

#[serial_test::serial]
#[test]
fn load_from_explicit_path() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("headlines.toml");
    fs::write(&p, SAMPLE).unwrap();

    let cfg = AppConfig::load_from(&p).unwrap();
    assert_eq!(cfg.poll_interval_secs, 30);
    assert_eq!(cfg.headline_slots, 8);
    let cats: Vec<&str> = cfg.feeds.iter().map(|f| f.category.as_str()).collect();
    assert_eq!(cats, vec!["本港新聞", "財經新聞"]);
    assert_eq!(cfg.debounce.min_interval_secs, 120);
    assert_eq!(cfg.debounce.rate_limit_by, RateLimitBy::Success);
    assert_eq!(
        cfg.transport,
        TransportConfig::Rfcomm {
            device: "/dev/rfcomm0".into()
        }
    );
    assert_eq!(cfg.server.socket_addr().unwrap().port(), 5050);
}

#[serial_test::serial]
#[test]
fn default_uses_env_then_fallbacks() {
    // Isolate CWD so the repo's own config/ is not picked up.
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    clear_env();

    // 1) Nothing on disk → built-in defaults
    let cfg = AppConfig::load_default().unwrap();
    assert_eq!(cfg.feeds.len(), 4);
    assert_eq!(cfg.transport, TransportConfig::Log);

    // 2) ./config/headlines.toml
    let cfg_dir = tmp.path().join("config");
    fs::create_dir_all(&cfg_dir).unwrap();
    fs::write(cfg_dir.join("headlines.toml"), SAMPLE).unwrap();
    let cfg = AppConfig::load_default().unwrap();
    assert_eq!(cfg.feeds.len(), 2);

    // 3) Env overrides win over the file
    env::set_var("POLL_INTERVAL_SECS", "15");
    env::set_var("PUSH_MIN_INTERVAL_SECS", "600");
    env::set_var("BIND_ADDR", "127.0.0.1:6060");
    let cfg = AppConfig::load_default().unwrap();
    assert_eq!(cfg.poll_interval_secs, 15);
    assert_eq!(cfg.debounce.min_interval_secs, 600);
    assert_eq!(cfg.server.bind, "127.0.0.1:6060");

    // 4) Garbage override is an error, not a silent default
    env::set_var("POLL_INTERVAL_SECS", "soon");
    assert!(AppConfig::load_default().is_err());

    // 5) Explicit path that does not exist is an error
    clear_env();
    env::set_var("HEADLINES_CONFIG_PATH", tmp.path().join("missing.toml"));
    assert!(AppConfig::load_default().is_err());

    clear_env();
    env::set_current_dir(&old).unwrap();
}
