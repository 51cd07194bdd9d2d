use serde::{Deserialize, Serialize};

/// Address book entry, persisted in the `contacts` collection
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lid: Option<String>,
    /// Name as saved in the address book
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Name the contact set for themselves
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Contact {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_img_url(mut self, url: impl Into<String>) -> Self {
        self.img_url = Some(url.into());
        self
    }

    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.notify.as_deref())
            .or(self.verified_name.as_deref())
            .unwrap_or(&self.id)
    }
}

/// How a contact's profile picture changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImgUrlUpdate {
    /// Picture changed; the new URL has to be fetched
    Changed,
    Removed,
    Set(String),
}

/// Partial contact update
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactUpdate {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img_url: Option<ImgUrlUpdate>,
}

impl ContactUpdate {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Apply everything except a `Changed` picture, which needs a fetch
    pub fn apply(&self, contact: &mut Contact) {
        if let Some(ref name) = self.name {
            contact.name = Some(name.clone());
        }
        if let Some(ref notify) = self.notify {
            contact.notify = Some(notify.clone());
        }
        if let Some(ref verified) = self.verified_name {
            contact.verified_name = Some(verified.clone());
        }
        if let Some(ref status) = self.status {
            contact.status = Some(status.clone());
        }
        match self.img_url {
            Some(ImgUrlUpdate::Set(ref url)) => contact.img_url = Some(url.clone()),
            Some(ImgUrlUpdate::Removed) => contact.img_url = None,
            Some(ImgUrlUpdate::Changed) | None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_fallbacks() {
        let mut contact = Contact::new("a@s.whatsapp.net");
        assert_eq!(contact.display_name(), "a@s.whatsapp.net");

        contact.notify = Some("Andi".to_string());
        assert_eq!(contact.display_name(), "Andi");

        contact.name = Some("Andi Kantor".to_string());
        assert_eq!(contact.display_name(), "Andi Kantor");
    }

    #[test]
    fn test_update_removes_picture() {
        let mut contact = Contact::new("a@s.whatsapp.net").with_img_url("https://pps/a.jpg");
        let mut update = ContactUpdate::new("a@s.whatsapp.net");
        update.img_url = Some(ImgUrlUpdate::Removed);
        update.status = Some("busy".to_string());
        update.apply(&mut contact);

        assert_eq!(contact.img_url, None);
        assert_eq!(contact.status.as_deref(), Some("busy"));
    }
}
