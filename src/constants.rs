use std::time::Duration;

/// How often the delivery worker scans the store for due messages
pub const DELIVERY_INTERVAL: Duration = Duration::from_secs(60);

/// How long a voice connection may take to finish its readiness handshake
pub const JOIN_READY_TIMEOUT: Duration = Duration::from_secs(15);

/// Audio container extensions the player accepts
pub const SUPPORTED_AUDIO_EXTENSIONS: [&str; 3] = ["opus", "ogg", "oga"];

/// Default path of the scheduled-message store file
pub const DEFAULT_SCHEDULE_FILE: &str = "scheduled_messages.json";

/// Default bind address for the status HTTP service
pub const DEFAULT_STATUS_ADDR: &str = "127.0.0.1:8080";

/// Log directive for the application
pub const LOG_DIRECTIVE: &str = "lyrebot_rs=info";

/// Compliments handed out by the /compliment command
pub const COMPLIMENTS: [&str; 12] = [
    "you make the server a better place!",
    "your taste in music is impeccable.",
    "you ask the best questions.",
    "talking to you is the highlight of the channel.",
    "you have a great sense of humor!",
    "you always know what to say.",
    "the voice chat lights up when you join.",
    "you're the kind of person bots dream of meeting.",
    "your patience is legendary.",
    "you make even Mondays bearable.",
    "you're doing great. Keep it up!",
    "ten out of ten, would chat again.",
];
