//! Maps Slack reaction shortcodes onto emoji.
//!
//! Slack shortcode coverage is open-ended, so the lookup degrades in steps:
//! exact key, key with "face" appended, prefix, curated aliases for the
//! irregular shortcodes, and finally the original name verbatim.

use log::warn;

/// Emoji keyed by normalized name (lowercase, underscores stripped).
const EMOJI: &[(&str, &str)] = &[
    ("airplane", "✈️"),
    ("alarmclock", "⏰"),
    ("angryface", "😠"),
    ("anguishedface", "😧"),
    ("astonishedface", "😲"),
    ("balloon", "🎈"),
    ("beamingfacewithsmilingeyes", "😁"),
    ("bell", "🔔"),
    ("bicycle", "🚲"),
    ("birthdaycake", "🎂"),
    ("bomb", "💣"),
    ("books", "📚"),
    ("bottlewithpoppingcork", "🍾"),
    ("brain", "🧠"),
    ("briefcase", "💼"),
    ("brokenheart", "💔"),
    ("bug", "🐛"),
    ("calendar", "📆"),
    ("camera", "📷"),
    ("chartdecreasing", "📉"),
    ("chartincreasing", "📈"),
    ("checkmarkbutton", "✅"),
    ("cherryblossom", "🌸"),
    ("christmastree", "🎄"),
    ("clappinghands", "👏"),
    ("clinkingglasses", "🥂"),
    ("coffee", "☕"),
    ("collision", "💥"),
    ("confettiball", "🎊"),
    ("confusedface", "😕"),
    ("construction", "🚧"),
    ("cryingface", "😢"),
    ("dizzyface", "😵"),
    ("dog", "🐶"),
    ("droplet", "💧"),
    ("eyes", "👀"),
    ("facepalm", "🤦"),
    ("facescreaminginfear", "😱"),
    ("facewithrollingeyes", "🙄"),
    ("facewithtearsofjoy", "😂"),
    ("fire", "🔥"),
    ("fireworks", "🎆"),
    ("fist", "✊"),
    ("flexedbiceps", "💪"),
    ("foldedhands", "🙏"),
    ("fourleafclover", "🍀"),
    ("ghost", "👻"),
    ("gift", "🎁"),
    ("glowingstar", "🌟"),
    ("grimacingface", "😬"),
    ("grinningface", "😀"),
    ("grinningfacewithbigeyes", "😃"),
    ("grinningfacewithsmilingeyes", "😄"),
    ("grinningfacewithsweat", "😅"),
    ("grinningsquintingface", "😆"),
    ("growingheart", "💗"),
    ("heart", "❤️"),
    ("heavycheckmark", "✔️"),
    ("highvoltage", "⚡"),
    ("hourglass", "⌛"),
    ("house", "🏠"),
    ("huggingface", "🤗"),
    ("hundredpoints", "💯"),
    ("keyboard", "⌨️"),
    ("kissingface", "😗"),
    ("laptop", "💻"),
    ("lightbulb", "💡"),
    ("link", "🔗"),
    ("loudlycryingface", "😭"),
    ("magnifyingglass", "🔍"),
    ("medal", "🏅"),
    ("megaphone", "📣"),
    ("memo", "📝"),
    ("microphone", "🎤"),
    ("moneybag", "💰"),
    ("nerdface", "🤓"),
    ("neutralface", "😐"),
    ("okhand", "👌"),
    ("package", "📦"),
    ("partypopper", "🎉"),
    ("pensiveface", "😔"),
    ("pizza", "🍕"),
    ("pointup", "☝️"),
    ("poutingface", "😡"),
    ("raisedhand", "✋"),
    ("raisinghands", "🙌"),
    ("relievedface", "😌"),
    ("robot", "🤖"),
    ("rocket", "🚀"),
    ("rollingonthefloorlaughing", "🤣"),
    ("seenoevilmonkey", "🙈"),
    ("skull", "💀"),
    ("sleepingface", "😴"),
    ("slightlysmilingface", "🙂"),
    ("smilingface", "☺️"),
    ("smilingfacewithhearteyes", "😍"),
    ("smilingfacewithsmilingeyes", "😊"),
    ("smilingfacewithsunglasses", "😎"),
    ("snowflake", "❄️"),
    ("sparkles", "✨"),
    ("speechballoon", "💬"),
    ("star", "⭐"),
    ("starstruck", "🤩"),
    ("sun", "☀️"),
    ("thinkingface", "🤔"),
    ("thumbsdown", "👎"),
    ("thumbsup", "👍"),
    ("trophy", "🏆"),
    ("turtle", "🐢"),
    ("umbrella", "☂️"),
    ("upsidedownface", "🙃"),
    ("wavinghand", "👋"),
    ("wineglass", "🍷"),
    ("winkingface", "😉"),
    ("zanyface", "🤪"),
    ("zzz", "💤"),
];

/// Irregular Slack shortcodes that no normalization rule reaches.
const ALIASES: &[(&str, &str)] = &[
    ("+1", "thumbsup"),
    ("-1", "thumbsdown"),
    ("100", "hundredpoints"),
    ("blush", "smilingfacewithsmilingeyes"),
    ("boom", "collision"),
    ("champagne", "bottlewithpoppingcork"),
    ("cry", "cryingface"),
    ("grin", "beamingfacewithsmilingeyes"),
    ("hearteyes", "smilingfacewithhearteyes"),
    ("hugs", "huggingface"),
    ("joy", "facewithtearsofjoy"),
    ("laughing", "grinningsquintingface"),
    ("mag", "magnifyingglass"),
    ("muscle", "flexedbiceps"),
    ("pray", "foldedhands"),
    ("raisedhands", "raisinghands"),
    ("rofl", "rollingonthefloorlaughing"),
    ("rolleyes", "facewithrollingeyes"),
    ("scream", "facescreaminginfear"),
    ("smile", "grinningfacewithsmilingeyes"),
    ("smiley", "grinningfacewithbigeyes"),
    ("sob", "loudlycryingface"),
    ("star-struck", "starstruck"),
    ("sunglasses", "smilingfacewithsunglasses"),
    ("sweatsmile", "grinningfacewithsweat"),
    ("tada", "partypopper"),
    ("wave", "wavinghand"),
    ("white-check-mark", "checkmarkbutton"),
    ("whitecheckmark", "checkmarkbutton"),
    ("zap", "highvoltage"),
];

fn normalize(name: &str) -> String {
    name.to_ascii_lowercase().replace('_', "")
}

fn glyph(key: &str) -> Option<&'static str> {
    EMOJI.iter().find(|(k, _)| *k == key).map(|(_, g)| *g)
}

/// Best-effort mapping from a Slack shortcode to an emoji. Unknown names
/// come back verbatim with a warning rather than failing the reaction.
pub fn map_shortcode(name: &str) -> String {
    let key = normalize(name);
    if !key.is_empty() {
        if let Some(g) = glyph(&key) {
            return g.to_string();
        }
        let with_face = format!("{key}face");
        if let Some(g) = glyph(&with_face) {
            return g.to_string();
        }
        if let Some((_, g)) = EMOJI.iter().find(|(k, _)| k.starts_with(key.as_str())) {
            return (*g).to_string();
        }
        if let Some((_, target)) = ALIASES.iter().find(|(a, _)| *a == key) {
            if let Some(g) = glyph(target) {
                return g.to_string();
            }
        }
    }
    warn!("no emoji mapping for '{name}', keeping the original shortcode");
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plus_one_maps_to_thumbs_up() {
        assert_eq!(map_shortcode("+1"), "👍");
    }

    #[test]
    fn minus_one_maps_to_thumbs_down() {
        assert_eq!(map_shortcode("-1"), "👎");
    }

    #[test]
    fn exact_match_after_underscore_stripping() {
        assert_eq!(map_shortcode("alarm_clock"), "⏰");
        assert_eq!(map_shortcode("point_up"), "☝️");
    }

    #[test]
    fn face_suffix_variant_is_tried() {
        assert_eq!(map_shortcode("thinking"), "🤔");
        assert_eq!(map_shortcode("nerd"), "🤓");
    }

    #[test]
    fn prefix_match_covers_longer_canonical_names() {
        assert_eq!(map_shortcode("clap"), "👏");
        assert_eq!(map_shortcode("wink"), "😉");
    }

    #[test]
    fn curated_aliases_cover_irregular_shortcodes() {
        assert_eq!(map_shortcode("tada"), "🎉");
        assert_eq!(map_shortcode("sob"), "😭");
    }

    #[test]
    fn unknown_shortcode_maps_to_itself() {
        assert_eq!(map_shortcode("zzz_unknown"), "zzz_unknown");
    }
}
