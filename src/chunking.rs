//! Splits replies to fit the messaging platform's per-message limit.
//!
//! Lengths are counted in characters, not bytes, so multi-byte text is never
//! cut inside a code point.

/// Hard cap on a single outbound text message.
pub const MAX_MESSAGE_CHARS: usize = 320;
/// Target chunk length once a reply exceeds [`MAX_MESSAGE_CHARS`].
pub const CHUNK_TARGET_CHARS: usize = 300;

/// Splits `text` for delivery. Anything within the platform cap is returned
/// whole; longer text goes through [`chunk_string`] with the target length.
pub fn split_response(text: &str) -> Vec<String> {
    if text.chars().count() <= MAX_MESSAGE_CHARS {
        return vec![text.to_string()];
    }
    chunk_string(text, CHUNK_TARGET_CHARS)
}

/// Cuts `text` into pieces of roughly `len` characters, ending each piece just
/// after a space where one exists.
///
/// The cursor jumps `len` characters past the last cut. A space under the
/// cursor ends the chunk right after it. Otherwise the window between the last
/// cut and the cursor is searched backwards for a space, and if none exists
/// the cursor creeps forward one character and tries again. A word longer than
/// `len` therefore stays whole and ends up in one oversized chunk.
///
/// Concatenating the result always reproduces `text`. The trailing piece is
/// pushed even when it is empty.
pub fn chunk_string(text: &str, len: usize) -> Vec<String> {
    let len = len.max(1);
    let chars: Vec<char> = text.chars().collect();
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .collect();
    let slice = |from: usize, to: usize| text[offsets[from]..offsets[to]].to_string();

    let mut output = Vec::new();
    let mut prev = 0;
    let mut curr = len;

    while curr < chars.len() {
        let at_space = chars[curr] == ' ';
        curr += 1;

        if at_space {
            output.push(slice(prev, curr));
            prev = curr;
            curr += len;
            continue;
        }

        let mut back = curr;
        while back > prev {
            if chars[back - 1] == ' ' {
                output.push(slice(prev, back));
                prev = back;
                curr = back + len;
                break;
            }
            back -= 1;
        }
    }

    output.push(slice(prev, chars.len()));
    output
}
