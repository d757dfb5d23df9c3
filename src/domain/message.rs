use crate::error::{AppError, Result};
use uuid::Uuid;

/// Preview text shown for messages that carry only an image.
pub(crate) const IMAGE_PLACEHOLDER: &str = "[image]";

#[derive(Debug, Clone)]
pub struct Message {
    pub(crate) id: i64,
    pub(crate) room_id: i64,
    pub(crate) sender_id: Uuid,
    pub(crate) content: Option<String>,
    pub(crate) image_ref: Option<String>,
    pub(crate) sent_at: i64,
    pub(crate) is_read: bool,
}

/// A validated message payload: trimmed, bounded, and never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBody {
    pub(crate) content: Option<String>,
    pub(crate) image_ref: Option<String>,
}

impl MessageBody {
    /// Validates raw client input. Whitespace-only parts count as absent.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` when both parts are empty after trimming
    /// or the text exceeds `max_chars`.
    pub fn new(content: Option<String>, image_ref: Option<String>, max_chars: usize) -> Result<Self> {
        let content = content.map(|c| c.trim().to_owned()).filter(|c| !c.is_empty());
        let image_ref = image_ref.map(|r| r.trim().to_owned()).filter(|r| !r.is_empty());

        if content.is_none() && image_ref.is_none() {
            return Err(AppError::BadRequest("Message must carry text or an image".to_owned()));
        }

        if let Some(text) = &content
            && text.chars().count() > max_chars
        {
            return Err(AppError::BadRequest(format!("Message exceeds {max_chars} characters")));
        }

        Ok(Self { content, image_ref })
    }

    /// Renders the room-list snippet: text truncated to `max_chars` on a
    /// character boundary, or a placeholder for image-only messages.
    #[must_use]
    pub fn preview(&self, max_chars: usize) -> String {
        self.content.as_deref().map_or_else(
            || IMAGE_PLACEHOLDER.to_owned(),
            |text| {
                if text.chars().count() > max_chars {
                    text.chars().take(max_chars).collect()
                } else {
                    text.to_owned()
                }
            },
        )
    }
}
