/// Static translation lookup for user-facing reply fragments.
///
/// Locales arrive as Discord interaction locale tags ("fr", "en-US", ...).
/// Anything without a translation falls back to English.

/// Translate a message key for the given locale
pub fn translate(locale: Option<&str>, key: &str) -> &'static str {
    let lang = locale
        .and_then(|l| l.split('-').next())
        .unwrap_or("en");

    match lang {
        "fr" => french(key).unwrap_or_else(|| english(key)),
        _ => english(key),
    }
}

fn english(key: &str) -> &'static str {
    match key {
        "dm_sent" => "Direct message delivered!",
        "reminder_scheduled" => "Reminder scheduled for",
        "voice_joined" => "Joined",
        "voice_left" => "Left the voice channel.",
        "voice_not_connected" => "I'm not in a voice channel here.",
        "playing" => "Now playing",
        _ => key,
    }
}

fn french(key: &str) -> Option<&'static str> {
    match key {
        "dm_sent" => Some("Message privé envoyé !"),
        "reminder_scheduled" => Some("Rappel programmé pour"),
        "voice_joined" => Some("Connecté à"),
        "voice_left" => Some("Salon vocal quitté."),
        "voice_not_connected" => Some("Je ne suis pas dans un salon vocal ici."),
        "playing" => Some("Lecture de"),
        _ => None,
    }
}
