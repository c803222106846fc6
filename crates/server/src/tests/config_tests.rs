use super::{apply_file_settings, normalize_domain, Settings};

#[test]
fn defaults_point_at_the_public_instance() {
    let settings = Settings::default();
    assert_eq!(settings.bind_addr, "127.0.0.1:8080");
    assert_eq!(settings.jitsi_domain, "meet.jit.si");
    assert_eq!(settings.app_name, "Meetings");
    assert!(settings.public_url.is_none());
    assert!(!settings.start_audio_muted);
    assert!(!settings.start_video_muted);
}

#[test]
fn file_settings_override_defaults() {
    let mut settings = Settings::default();
    apply_file_settings(
        &mut settings,
        r#"
bind_addr = "0.0.0.0:9090"
jitsi_domain = "meet.example.org"
app_name = "Team Meetings"
start_audio_muted = true
"#,
    );

    assert_eq!(settings.bind_addr, "0.0.0.0:9090");
    assert_eq!(settings.jitsi_domain, "meet.example.org");
    assert_eq!(settings.app_name, "Team Meetings");
    assert!(settings.start_audio_muted);
    assert!(!settings.start_video_muted);
}

#[test]
fn malformed_file_settings_are_ignored() {
    let mut settings = Settings::default();
    apply_file_settings(&mut settings, "bind_addr = [not toml");
    assert_eq!(settings.bind_addr, "127.0.0.1:8080");
}

#[test]
fn wrongly_typed_file_settings_are_ignored() {
    let mut settings = Settings::default();
    apply_file_settings(&mut settings, "start_audio_muted = \"yes\"");
    assert!(!settings.start_audio_muted);
}

#[test]
fn normalize_domain_strips_scheme_and_trailing_slash() {
    assert_eq!(normalize_domain("https://meet.example.org/"), "meet.example.org");
    assert_eq!(normalize_domain("http://meet.example.org"), "meet.example.org");
    assert_eq!(normalize_domain("  meet.example.org  "), "meet.example.org");
}

#[test]
fn normalize_domain_falls_back_to_the_default_when_empty() {
    assert_eq!(normalize_domain("   "), Settings::default().jitsi_domain);
    assert_eq!(normalize_domain("https:///"), Settings::default().jitsi_domain);
}
