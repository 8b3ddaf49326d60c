use regex::Regex;
use std::sync::LazyLock;

/// Combining marks used for zalgo text. Variation selectors are kept since emoji rely on them.
static ZALGO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\p{Mn}\p{Me}--[\x{FE00}-\x{FE0F}\x{E0100}-\x{E01EF}]]")
        .expect("zalgo pattern is valid")
});

static INVISIBLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\x{00AD}\x{034F}\x{061C}\x{115F}\x{1160}\x{17B4}\x{17B5}\x{180E}\x{200B}-\x{200F}\x{202A}-\x{202E}\x{2060}-\x{2064}\x{206A}-\x{206F}\x{3164}\x{FEFF}\x{FFA0}]")
        .expect("invisible pattern is valid")
});

/// Remove zalgo and invisible characters that could be used to sneak content past the filters.
pub fn clean_input(text: &str, keep_newlines: bool) -> String {
    let content = ZALGO_RE.replace_all(text, "");
    let content = INVISIBLE_RE.replace_all(&content, "");

    if keep_newlines {
        content.into_owned()
    } else {
        content.replace('\n', "")
    }
}
