use crate::error::ContentError;
use crate::model::{Element, Guid};

/// A persisted domain object as seen by the migration engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainObjectDto {
    /// Identity, stable for the lifetime of the record
    pub guid: Guid,
    /// Class name in the schema version the repository currently represents
    pub class_name: String,
    /// Owning record, if any
    pub owner: Option<Guid>,
    /// Field data
    pub content: Element,
}

impl DomainObjectDto {
    pub fn new(guid: Guid, class_name: impl Into<String>, content: Element) -> Self {
        Self {
            guid,
            class_name: class_name.into(),
            owner: None,
            content,
        }
    }

    /// Build a record from raw XML content as stored in a project file.
    pub fn from_raw(
        guid: Guid,
        class_name: impl Into<String>,
        raw_content: &str,
    ) -> Result<Self, ContentError> {
        Ok(Self::new(guid, class_name, Element::parse(raw_content)?))
    }

    pub fn with_owner(mut self, owner: Guid) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn raw_content(&self) -> Result<String, ContentError> {
        self.content.to_xml_string()
    }

    /// Text of a direct field element of the content, if present.
    pub fn field_text(&self, field: &str) -> Option<String> {
        self.content.child(field).map(Element::text)
    }

    fn apply(&mut self, update: DtoUpdate) {
        if let Some(class_name) = update.class_name {
            self.class_name = class_name;
        }
        if let Some(content) = update.content {
            self.content = content;
        }
        if let Some(owner) = update.owner {
            self.owner = owner;
        }
    }
}

/// In-place change to a live record. Fields left as `None` are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DtoUpdate {
    pub class_name: Option<String>,
    pub content: Option<Element>,
    pub owner: Option<Option<Guid>>,
}

impl DtoUpdate {
    pub fn class_name(class_name: impl Into<String>) -> Self {
        Self {
            class_name: Some(class_name.into()),
            ..Self::default()
        }
    }

    pub fn content(content: Element) -> Self {
        Self {
            content: Some(content),
            ..Self::default()
        }
    }

    pub fn with_class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    pub fn with_content(mut self, content: Element) -> Self {
        self.content = Some(content);
        self
    }

    pub fn with_owner(mut self, owner: Option<Guid>) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.class_name.is_none() && self.content.is_none() && self.owner.is_none()
    }

    pub(crate) fn apply_to(self, dto: &mut DomainObjectDto) {
        dto.apply(self);
    }
}
