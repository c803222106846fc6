use std::{collections::HashMap, fs};

#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: String,
    pub public_url: Option<String>,
    pub jitsi_domain: String,
    pub app_name: String,
    pub start_audio_muted: bool,
    pub start_video_muted: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".into(),
            public_url: None,
            jitsi_domain: "meet.jit.si".into(),
            app_name: "Meetings".into(),
            start_audio_muted: false,
            start_video_muted: false,
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("server.toml") {
        apply_file_settings(&mut settings, &raw);
    }

    if let Ok(v) = std::env::var("SERVER_BIND") {
        settings.bind_addr = v;
    }
    if let Ok(v) = std::env::var("APP__BIND_ADDR") {
        settings.bind_addr = v;
    }

    if let Ok(v) = std::env::var("SERVER_PUBLIC_URL") {
        settings.public_url = Some(v);
    }

    if let Ok(v) = std::env::var("JITSI_DOMAIN") {
        settings.jitsi_domain = v;
    }
    if let Ok(v) = std::env::var("APP__JITSI_DOMAIN") {
        settings.jitsi_domain = v;
    }

    if let Ok(v) = std::env::var("APP__APP_NAME") {
        settings.app_name = v;
    }

    if let Ok(v) = std::env::var("APP__START_AUDIO_MUTED") {
        if let Ok(parsed) = v.parse::<bool>() {
            settings.start_audio_muted = parsed;
        }
    }
    if let Ok(v) = std::env::var("APP__START_VIDEO_MUTED") {
        if let Ok(parsed) = v.parse::<bool>() {
            settings.start_video_muted = parsed;
        }
    }

    settings.jitsi_domain = normalize_domain(&settings.jitsi_domain);
    settings
}

fn apply_file_settings(settings: &mut Settings, raw: &str) {
    let Ok(file_cfg) = toml::from_str::<HashMap<String, toml::Value>>(raw) else {
        return;
    };

    if let Some(v) = file_cfg.get("bind_addr").and_then(toml::Value::as_str) {
        settings.bind_addr = v.to_string();
    }
    if let Some(v) = file_cfg.get("public_url").and_then(toml::Value::as_str) {
        settings.public_url = Some(v.to_string());
    }
    if let Some(v) = file_cfg.get("jitsi_domain").and_then(toml::Value::as_str) {
        settings.jitsi_domain = v.to_string();
    }
    if let Some(v) = file_cfg.get("app_name").and_then(toml::Value::as_str) {
        settings.app_name = v.to_string();
    }
    if let Some(v) = file_cfg
        .get("start_audio_muted")
        .and_then(toml::Value::as_bool)
    {
        settings.start_audio_muted = v;
    }
    if let Some(v) = file_cfg
        .get("start_video_muted")
        .and_then(toml::Value::as_bool)
    {
        settings.start_video_muted = v;
    }
}

/// Accepts a bare host, a pasted URL, or a host with a trailing slash; the
/// widget loader only ever wants the host part.
fn normalize_domain(raw: &str) -> String {
    let raw = raw.trim();
    let raw = raw
        .strip_prefix("https://")
        .or_else(|| raw.strip_prefix("http://"))
        .unwrap_or(raw);
    let raw = raw.trim_end_matches('/');

    if raw.is_empty() {
        Settings::default().jitsi_domain
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
