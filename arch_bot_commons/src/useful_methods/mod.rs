use teloxide::types::{Location, Message};

pub trait MessageStuff {
    /// Text of the message, or its caption if it's a media message.
    fn text_full(&self) -> Option<&str>;
    /// Location attached to the message, either directly or as part of a venue.
    fn location_full(&self) -> Option<&Location>;
    /// Title of the venue, if this message is one. Handy as a description
    /// for the location it carries.
    fn venue_title(&self) -> Option<&str>;
}

impl MessageStuff for Message {
    fn text_full(&self) -> Option<&str> {
        self.text().or_else(|| self.caption())
    }
    fn location_full(&self) -> Option<&Location> {
        self.location()
            .or_else(|| self.venue().map(|venue| &venue.location))
    }
    fn venue_title(&self) -> Option<&str> {
        self.venue().map(|venue| venue.title.as_str())
    }
}
