//! Channel name predicate.

/// Extension trait for checking whether a token names a channel.
pub trait ChannelExt {
    /// Check if this string is a plausible IRC channel name.
    ///
    /// Channel names start with `#` or `&`, are at most 50 characters and
    /// contain no space, comma, BEL or NUL.
    fn is_channel_name(&self) -> bool;
}

impl ChannelExt for str {
    fn is_channel_name(&self) -> bool {
        let mut chars = self.chars();
        match chars.next() {
            Some('#' | '&') => {}
            _ => return false,
        }

        if self.chars().count() > 50 {
            return false;
        }

        chars.all(|c| !matches!(c, ' ' | ',' | '\x07' | '\0'))
    }
}

impl ChannelExt for String {
    fn is_channel_name(&self) -> bool {
        self.as_str().is_channel_name()
    }
}
