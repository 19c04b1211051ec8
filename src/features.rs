//! Static vocabulary between human-authored button names and canonical feature codes.
//!
//! Button names arriving in discovery payloads are free text ("Volume Up", "VOLUME_UP",
//! "volume_up"). They are canonicalized (uppercase, spaces to underscores) before being
//! looked up. A name without an entry is not an error: the caller exposes it as a custom
//! feature only.

use std::fmt;
use std::str::FromStr;

macro_rules! feature_codes {
    ($($variant:ident => $code:literal),+ $(,)?) => {
        /// Canonical, integration-agnostic remote-control action.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum FeatureCode {
            $($variant),+
        }

        impl FeatureCode {
            #[cfg(test)]
            pub const ALL: &'static [FeatureCode] = &[$(FeatureCode::$variant),+];

            /// Wire/host representation, e.g. `VOLUME_UP`.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(FeatureCode::$variant => $code),+
                }
            }
        }

        impl FromStr for FeatureCode {
            type Err = UnknownFeature;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($code => Ok(FeatureCode::$variant),)+
                    other => Err(UnknownFeature(other.to_string())),
                }
            }
        }
    };
}

feature_codes! {
    // playback transport
    Play => "PLAY",
    Pause => "PAUSE",
    PlayPause => "PLAYPAUSE",
    Stop => "STOP",
    Forward => "FORWARD",
    Backward => "BACKWARD",
    Next => "NEXT",
    Previous => "PREVIOUS",
    Record => "RECORD",
    Recordings => "RECORDINGS",
    Live => "LIVE",
    Info => "INFO",
    Guide => "GUIDE",
    // navigation
    CursorUp => "CURSOR_UP",
    CursorDown => "CURSOR_DOWN",
    CursorLeft => "CURSOR_LEFT",
    CursorRight => "CURSOR_RIGHT",
    CursorOk => "CURSOR_OK",
    Back => "BACK",
    Home => "HOME",
    Menu => "MENU",
    Exit => "EXIT",
    App => "APP",
    // numeric keypad
    Digit0 => "DIGIT_0",
    Digit1 => "DIGIT_1",
    Digit2 => "DIGIT_2",
    Digit3 => "DIGIT_3",
    Digit4 => "DIGIT_4",
    Digit5 => "DIGIT_5",
    Digit6 => "DIGIT_6",
    Digit7 => "DIGIT_7",
    Digit8 => "DIGIT_8",
    Digit9 => "DIGIT_9",
    Digit10 => "DIGIT_10",
    Digit10Plus => "DIGIT_10PLUS",
    Digit11 => "DIGIT_11",
    Digit12 => "DIGIT_12",
    DigitSeparator => "DIGIT_SEPARATOR",
    DigitEnter => "DIGIT_ENTER",
    // volume
    VolumeUp => "VOLUME_UP",
    VolumeDown => "VOLUME_DOWN",
    MuteToggle => "MUTE_TOGGLE",
    // channels
    ChannelUp => "CHANNEL_UP",
    ChannelDown => "CHANNEL_DOWN",
    ChannelPrevious => "CHANNEL_PREVIOUS",
    ChannelSearch => "CHANNEL_SEARCH",
    Favorite => "FAVORITE",
    // input / output selection
    InputSource => "INPUT_SOURCE",
    InputHdmi1 => "INPUT_HDMI1",
    InputHdmi2 => "INPUT_HDMI2",
    InputHdmi3 => "INPUT_HDMI3",
    InputHdmi4 => "INPUT_HDMI4",
    InputAv => "INPUT_AV",
    InputTv => "INPUT_TV",
    OutputHdmi1 => "OUTPUT_HDMI1",
    OutputHdmi2 => "OUTPUT_HDMI2",
    OutputAudio => "OUTPUT_AUDIO",
    // color function keys
    FunctionRed => "FUNCTION_RED",
    FunctionGreen => "FUNCTION_GREEN",
    FunctionYellow => "FUNCTION_YELLOW",
    FunctionBlue => "FUNCTION_BLUE",
    FunctionOrange => "FUNCTION_ORANGE",
    // power transitions
    PowerOn => "POWER_ON",
    PowerOff => "POWER_OFF",
    PowerToggle => "POWER_TOGGLE",
    // misc
    Subtitles => "SUBTITLES",
    Settings => "SETTINGS",
}

impl fmt::Display for FeatureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown feature code: {0}")]
pub struct UnknownFeature(pub String);

/// Canonical button name -> feature code. Each code appears exactly once so the
/// inverse lookup is well-defined.
const VOCABULARY: &[(&str, FeatureCode)] = &[
    ("PLAY", FeatureCode::Play),
    ("PAUSE", FeatureCode::Pause),
    ("PLAYPAUSE", FeatureCode::PlayPause),
    ("STOP", FeatureCode::Stop),
    ("FORWARD", FeatureCode::Forward),
    ("BACKWARD", FeatureCode::Backward),
    ("NEXT", FeatureCode::Next),
    ("PREVIOUS", FeatureCode::Previous),
    ("RECORD", FeatureCode::Record),
    ("RECORDINGS", FeatureCode::Recordings),
    ("LIVE", FeatureCode::Live),
    ("INFO", FeatureCode::Info),
    ("GUIDE", FeatureCode::Guide),
    ("UP", FeatureCode::CursorUp),
    ("DOWN", FeatureCode::CursorDown),
    ("LEFT", FeatureCode::CursorLeft),
    ("RIGHT", FeatureCode::CursorRight),
    ("OK", FeatureCode::CursorOk),
    ("BACK", FeatureCode::Back),
    ("HOME", FeatureCode::Home),
    ("MENU", FeatureCode::Menu),
    ("EXIT", FeatureCode::Exit),
    ("APP", FeatureCode::App),
    ("DIGIT_0", FeatureCode::Digit0),
    ("DIGIT_1", FeatureCode::Digit1),
    ("DIGIT_2", FeatureCode::Digit2),
    ("DIGIT_3", FeatureCode::Digit3),
    ("DIGIT_4", FeatureCode::Digit4),
    ("DIGIT_5", FeatureCode::Digit5),
    ("DIGIT_6", FeatureCode::Digit6),
    ("DIGIT_7", FeatureCode::Digit7),
    ("DIGIT_8", FeatureCode::Digit8),
    ("DIGIT_9", FeatureCode::Digit9),
    ("DIGIT_10", FeatureCode::Digit10),
    ("DIGIT_10PLUS", FeatureCode::Digit10Plus),
    ("DIGIT_11", FeatureCode::Digit11),
    ("DIGIT_12", FeatureCode::Digit12),
    ("DIGIT_SEPARATOR", FeatureCode::DigitSeparator),
    ("DIGIT_ENTER", FeatureCode::DigitEnter),
    ("VOLUME_UP", FeatureCode::VolumeUp),
    ("VOLUME_DOWN", FeatureCode::VolumeDown),
    ("MUTE", FeatureCode::MuteToggle),
    ("CHANNEL_UP", FeatureCode::ChannelUp),
    ("CHANNEL_DOWN", FeatureCode::ChannelDown),
    ("CHANNEL_PREVIOUS", FeatureCode::ChannelPrevious),
    ("CHANNEL_SEARCH", FeatureCode::ChannelSearch),
    ("FAVORITE", FeatureCode::Favorite),
    ("SOURCE", FeatureCode::InputSource),
    ("INPUT_HDMI1", FeatureCode::InputHdmi1),
    ("INPUT_HDMI2", FeatureCode::InputHdmi2),
    ("INPUT_HDMI3", FeatureCode::InputHdmi3),
    ("INPUT_HDMI4", FeatureCode::InputHdmi4),
    ("INPUT_AV", FeatureCode::InputAv),
    ("INPUT_TV", FeatureCode::InputTv),
    ("OUTPUT_HDMI1", FeatureCode::OutputHdmi1),
    ("OUTPUT_HDMI2", FeatureCode::OutputHdmi2),
    ("OUTPUT_AUDIO", FeatureCode::OutputAudio),
    ("RED", FeatureCode::FunctionRed),
    ("GREEN", FeatureCode::FunctionGreen),
    ("YELLOW", FeatureCode::FunctionYellow),
    ("BLUE", FeatureCode::FunctionBlue),
    ("ORANGE", FeatureCode::FunctionOrange),
    ("POWERON", FeatureCode::PowerOn),
    ("POWEROFF", FeatureCode::PowerOff),
    ("POWER", FeatureCode::PowerToggle),
    ("SUBTITLES", FeatureCode::Subtitles),
    ("SETTINGS", FeatureCode::Settings),
];

/// Uppercase, spaces replaced with underscores.
pub fn canonicalize(button_name: &str) -> String {
    button_name.to_uppercase().replace(' ', "_")
}

pub fn to_feature_code(button_name: &str) -> Option<FeatureCode> {
    let canonical = canonicalize(button_name);
    VOCABULARY
        .iter()
        .find(|(name, _)| *name == canonical)
        .map(|(_, code)| *code)
}

pub fn to_button_name(code: FeatureCode) -> Option<&'static str> {
    VOCABULARY
        .iter()
        .find(|(_, c)| *c == code)
        .map(|(name, _)| *name)
}
