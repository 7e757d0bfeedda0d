use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec::Validate;
use crate::{ids, theme};

// Persisted field names are camelCase; the layout is shared with the web client.

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub enrollment_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

fn present(v: &Option<String>) -> Option<&str> {
    v.as_deref().filter(|s| !s.trim().is_empty())
}

impl ClassRecord {
    /// Name to show; blank names fall back to `"Class " + id prefix`.
    pub fn display_name(&self) -> String {
        match present(&self.name) {
            Some(n) => n.to_string(),
            None => format!("Class {}", self.id.chars().take(6).collect::<String>()),
        }
    }

    pub fn display_color(&self) -> String {
        match present(&self.color) {
            Some(c) => c.to_string(),
            None => theme::default_color(&self.display_name()).to_string(),
        }
    }

    pub fn display_text_color(&self) -> String {
        present(&self.text_color).unwrap_or(theme::DEFAULT_TEXT_COLOR).to_string()
    }

    pub fn display_cover(&self) -> String {
        match present(&self.cover_image) {
            Some(url) => url.to_string(),
            None => theme::placeholder_cover(&self.id),
        }
    }
}

impl Validate for ClassRecord {
    fn is_valid(&self) -> bool {
        !self.id.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClass {
    pub name: String,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub room: Option<String>,
    #[serde(default)]
    pub teacher_name: Option<String>,
}

/// Partial class edit. `None` leaves a field alone; a blank string unsets it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClass {
    pub name: Option<String>,
    pub section: Option<String>,
    pub teacher_name: Option<String>,
    pub subject: Option<String>,
    pub room: Option<String>,
    pub color: Option<String>,
    pub text_color: Option<String>,
    pub cover_image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub content: String,
    pub author_id: String,
    pub author_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_private: Option<bool>,
}

impl Validate for Comment {
    fn is_valid(&self) -> bool {
        !self.id.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub id: String,
    pub class_id: String,
    pub content: String,
    pub author_id: String,
    pub author_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

impl Validate for Announcement {
    fn is_valid(&self) -> bool {
        !self.id.is_empty() && self.comments.is_valid()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAnnouncement {
    pub class_id: String,
    pub content: String,
    pub author_id: String,
    pub author_name: String,
    #[serde(default)]
    pub author_avatar: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Announcement {
    pub fn from_new(new: NewAnnouncement) -> Self {
        Announcement {
            id: ids::new_record_id(),
            class_id: new.class_id,
            content: new.content,
            author_id: new.author_id,
            author_name: new.author_name,
            author_avatar: new.author_avatar,
            created_at: Utc::now(),
            updated_at: None,
            attachments: new.attachments,
            comments: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub content: String,
    pub author_id: String,
    pub author_name: String,
    #[serde(default)]
    pub author_avatar: Option<String>,
    #[serde(default)]
    pub is_private: Option<bool>,
}

impl Comment {
    pub fn from_new(new: NewComment) -> Self {
        Comment {
            id: ids::new_record_id(),
            content: new.content,
            author_id: new.author_id,
            author_name: new.author_name,
            author_avatar: new.author_avatar,
            created_at: Utc::now(),
            updated_at: None,
            is_private: new.is_private,
        }
    }
}
