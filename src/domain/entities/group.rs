use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupParticipant {
    pub id: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub is_super_admin: bool,
}

impl GroupParticipant {
    pub fn member(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_admin: false,
            is_super_admin: false,
        }
    }
}

/// Group information, held in memory only
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMetadata {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc_owner: Option<String>,
    /// Only admins may edit group info
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restrict: Option<bool>,
    /// Only admins may send messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub announce: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(default)]
    pub participants: Vec<GroupParticipant>,
}

impl GroupMetadata {
    pub fn new(id: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            subject: subject.into(),
            ..Default::default()
        }
    }

    pub fn with_participants(mut self, ids: &[&str]) -> Self {
        self.participants = ids.iter().map(|id| GroupParticipant::member(*id)).collect();
        self
    }

    /// Apply a participant change
    pub fn apply_participants(&mut self, participants: &[String], action: ParticipantAction) {
        match action {
            ParticipantAction::Add => {
                for id in participants {
                    if !self.participants.iter().any(|p| &p.id == id) {
                        self.participants.push(GroupParticipant::member(id.clone()));
                    }
                }
            }
            ParticipantAction::Promote | ParticipantAction::Demote => {
                let is_admin = action == ParticipantAction::Promote;
                for participant in self.participants.iter_mut() {
                    if participants.contains(&participant.id) {
                        participant.is_admin = is_admin;
                    }
                }
            }
            ParticipantAction::Remove => {
                self.participants.retain(|p| !participants.contains(&p.id));
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantAction {
    Add,
    Remove,
    Promote,
    Demote,
}

/// Partial group update
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMetadataUpdate {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc_owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restrict: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub announce: Option<bool>,
}

impl GroupMetadataUpdate {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn apply(&self, metadata: &mut GroupMetadata) {
        if let Some(ref owner) = self.owner {
            metadata.owner = Some(owner.clone());
        }
        if let Some(ref subject) = self.subject {
            metadata.subject = subject.clone();
        }
        if let Some(ref subject_owner) = self.subject_owner {
            metadata.subject_owner = Some(subject_owner.clone());
        }
        if let Some(ts) = self.subject_time {
            metadata.subject_time = Some(ts);
        }
        if let Some(ref desc) = self.desc {
            metadata.desc = Some(desc.clone());
        }
        if let Some(ref desc_owner) = self.desc_owner {
            metadata.desc_owner = Some(desc_owner.clone());
        }
        if let Some(restrict) = self.restrict {
            metadata.restrict = Some(restrict);
        }
        if let Some(announce) = self.announce {
            metadata.announce = Some(announce);
        }
    }
}
