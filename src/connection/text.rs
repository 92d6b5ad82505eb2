use std::borrow::Cow;
use utf8::DecodeError;

// Decodes a text payload, substituting U+FFFD for malformed sequences
// instead of failing the message. Valid input borrows.
pub(crate) fn text_lossy(input: &[u8]) -> Cow<'_, str> {
    match utf8::decode(input) {
        Ok(valid) => Cow::Borrowed(valid),
        Err(_) => {
            let mut text = String::with_capacity(input.len());
            let mut rest = input;
            loop {
                match utf8::decode(rest) {
                    Ok(valid) => {
                        text.push_str(valid);
                        break;
                    }
                    Err(DecodeError::Invalid {
                        valid_prefix,
                        remaining_input,
                        ..
                    }) => {
                        text.push_str(valid_prefix);
                        text.push_str(utf8::REPLACEMENT_CHARACTER);
                        rest = remaining_input;
                    }
                    Err(DecodeError::Incomplete { valid_prefix, .. }) => {
                        text.push_str(valid_prefix);
                        text.push_str(utf8::REPLACEMENT_CHARACTER);
                        break;
                    }
                }
            }
            Cow::Owned(text)
        }
    }
}
