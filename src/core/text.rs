// src/core/text.rs

use encoding_rs::{Encoding, UTF_8};
use std::borrow::Cow;

/// Looks up an encoding by label (`utf-8`, `shift_jis`, `euc-jp`, `latin1`, ...).
pub fn lookup(label: &str) -> Option<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
}

/// Decodes `bytes` strictly with the encoding named by `label`, then with UTF-8.
/// Returns `None` when neither succeeds. Unknown labels go straight to the fallback.
pub fn decode_with_fallback<'a>(bytes: &'a [u8], label: &str) -> Option<Cow<'a, str>> {
    lookup(label)
        .into_iter()
        .chain(std::iter::once(UTF_8))
        .find_map(|encoding| encoding.decode_without_bom_handling_and_without_replacement(bytes))
}

/// Encodes `text` for handing to an external program. Unmappable characters become
/// numeric character references; an unknown label encodes as UTF-8.
pub fn encode_lossy<'a>(text: &'a str, label: &str) -> Cow<'a, [u8]> {
    let encoding = lookup(label).unwrap_or(UTF_8);
    let (bytes, _, _) = encoding.encode(text);
    bytes
}
