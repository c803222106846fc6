//! Server-rendered pages: the join form and the meeting shell.

use meeting_core::{view, ConnectionState};
use shared::domain::{MeetingParameters, StartMuted};

use crate::config::Settings;

/// Element id the widget mounts under. The meeting page renders the
/// container and the controller points the embedding script at it.
pub(crate) const MOUNT_ELEMENT_ID: &str = "meeting-root";

const STATUS_ELEMENT_ID: &str = "meeting-status";

pub(crate) fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

pub(crate) fn join_page(
    settings: &Settings,
    error: Option<&str>,
    room: &str,
    display_name: &str,
    start_muted: StartMuted,
) -> String {
    let app_name = escape_html(&settings.app_name);
    let error_html = error
        .map(|message| format!("<p class=\"error\">{}</p>\n  ", escape_html(message)))
        .unwrap_or_default();
    let audio_checked = if start_muted.audio { " checked" } else { "" };
    let video_checked = if start_muted.video { " checked" } else { "" };

    format!(
        "<!doctype html>\n\
         <html lang=\"en\">\n\
         <head>\n\
         <meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{app_name} - join a meeting</title>\n\
         <link rel=\"stylesheet\" href=\"/static/app.css\">\n\
         </head>\n\
         <body>\n\
         <main class=\"join\">\n\
         <h1>{app_name}</h1>\n\
         {error_html}<form method=\"post\" action=\"/join\">\n\
         <label for=\"room\">Room</label>\n\
         <input id=\"room\" name=\"room\" value=\"{room}\" maxlength=\"64\" required>\n\
         <label for=\"display_name\">Display name</label>\n\
         <input id=\"display_name\" name=\"display_name\" value=\"{display_name}\" maxlength=\"48\" required>\n\
         <label class=\"checkbox\"><input type=\"checkbox\" name=\"audio_muted\"{audio_checked}> Join with microphone muted</label>\n\
         <label class=\"checkbox\"><input type=\"checkbox\" name=\"video_muted\"{video_checked}> Join with camera off</label>\n\
         <button type=\"submit\">Join</button>\n\
         </form>\n\
         </main>\n\
         <script src=\"/static/join.js\" defer></script>\n\
         </body>\n\
         </html>\n",
        room = escape_html(room),
        display_name = escape_html(display_name),
    )
}

pub(crate) fn meeting_page(settings: &Settings, params: &MeetingParameters) -> String {
    let app_name = escape_html(&settings.app_name);
    let room = escape_html(params.room.as_str());
    let initial_status = view::status_line(ConnectionState::Connecting).unwrap_or_default();

    format!(
        "<!doctype html>\n\
         <html lang=\"en\">\n\
         <head>\n\
         <meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{room} - {app_name}</title>\n\
         <link rel=\"stylesheet\" href=\"/static/app.css\">\n\
         </head>\n\
         <body>\n\
         <main class=\"meeting\">\n\
         <p id=\"{STATUS_ELEMENT_ID}\">{initial_status}</p>\n\
         <div id=\"{MOUNT_ELEMENT_ID}\"></div>\n\
         </main>\n\
         <script src=\"/static/bridge.js\" defer></script>\n\
         </body>\n\
         </html>\n",
    )
}

#[cfg(test)]
mod tests {
    use shared::domain::{DisplayName, RoomName};

    use super::*;

    #[test]
    fn escape_html_neutralizes_markup() {
        assert_eq!(
            escape_html("<b>\"quoted\" & 'single'</b>"),
            "&lt;b&gt;&quot;quoted&quot; &amp; &#39;single&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn join_page_prefills_fields_and_renders_the_error() {
        let page = join_page(
            &Settings::default(),
            Some("room name cannot be empty"),
            "demo",
            "Sam <Carter>",
            StartMuted {
                audio: true,
                video: false,
            },
        );
        assert!(page.contains("room name cannot be empty"));
        assert!(page.contains("value=\"demo\""));
        assert!(page.contains("value=\"Sam &lt;Carter&gt;\""));
        assert!(page.contains("name=\"audio_muted\" checked"));
        assert!(page.contains("name=\"video_muted\">"));
    }

    #[test]
    fn meeting_page_renders_mount_container_and_initial_status() {
        let params = MeetingParameters {
            room: RoomName::parse("design-review").expect("room"),
            display_name: DisplayName::parse("Sam").expect("name"),
            domain: "meet.jit.si".to_string(),
            start_muted: StartMuted::default(),
        };
        let page = meeting_page(&Settings::default(), &params);
        assert!(page.contains("id=\"meeting-root\""));
        assert!(page.contains("Connecting to the meeting..."));
        assert!(page.contains("/static/bridge.js"));
        assert!(page.contains("<title>design-review - Meetings</title>"));
    }
}
