use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::StepError;
use crate::logic::step::MigrationStep;
use crate::model::{DtoUpdate, Element, Guid};
use crate::store::traits::DtoRepository;

/// A generic record transformation that can be described in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepAction {
    /// Rename a class. The content root element is renamed along with it
    /// when it carries the old class name.
    RenameClass { from: String, to: String },
    /// Remove every live instance of a class.
    RemoveClass { class: String },
    /// Rename direct field elements of a class's content.
    RenameField { class: String, from: String, to: String },
    /// Drop direct field elements of a class's content.
    RemoveField { class: String, field: String },
    /// Set an attribute on the content root, or on a field when one is named.
    SetAttribute {
        class: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        field: Option<String>,
        name: String,
        value: String,
    },
    /// Rewrite field text through a lookup table; unmapped values stay as-is.
    MapFieldValues {
        class: String,
        field: String,
        values: BTreeMap<String, String>,
    },
}

/// Configuration form of a declarative migration step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    /// Version the step upgrades from
    pub version: u32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub actions: Vec<StepAction>,
}

/// Migration step that runs a list of `StepAction`s in order.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclarativeStep {
    source_version: u32,
    description: String,
    actions: Vec<StepAction>,
}

impl DeclarativeStep {
    pub fn new(source_version: u32, description: impl Into<String>, actions: Vec<StepAction>) -> Self {
        Self {
            source_version,
            description: description.into(),
            actions,
        }
    }

    pub fn actions(&self) -> &[StepAction] {
        &self.actions
    }
}

impl From<StepDefinition> for DeclarativeStep {
    fn from(definition: StepDefinition) -> Self {
        let description = definition
            .description
            .unwrap_or_else(|| format!("declarative step {}", definition.version));
        Self::new(definition.version, description, definition.actions)
    }
}

impl MigrationStep for DeclarativeStep {
    fn source_version(&self) -> u32 {
        self.source_version
    }

    fn apply(&self, repository: &mut dyn DtoRepository) -> Result<(), StepError> {
        for action in &self.actions {
            let touched = apply_action(action, repository)?;
            log::debug!("{:?} touched {} records", action, touched);
        }
        Ok(())
    }

    fn description(&self) -> &str {
        &self.description
    }
}

fn guids_of_class(repository: &dyn DtoRepository, class: &str) -> Vec<Guid> {
    repository
        .instances_of_class(class)
        .into_iter()
        .map(|dto| dto.guid.clone())
        .collect()
}

/// Rewrite the content of every live instance of `class`. The closure reports
/// whether it changed anything; untouched records are not replaced.
fn rewrite_content<F>(
    repository: &mut dyn DtoRepository,
    class: &str,
    mut rewrite: F,
) -> Result<usize, StepError>
where
    F: FnMut(&mut Element) -> bool,
{
    let mut touched = 0;
    for guid in guids_of_class(repository, class) {
        let mut content = repository.get(&guid)?.content.clone();
        if rewrite(&mut content) {
            repository.replace(&guid, DtoUpdate::content(content))?;
            touched += 1;
        }
    }
    Ok(touched)
}

fn apply_action(action: &StepAction, repository: &mut dyn DtoRepository) -> Result<usize, StepError> {
    match action {
        StepAction::RenameClass { from, to } => {
            let guids = guids_of_class(repository, from);
            for guid in &guids {
                let dto = repository.get(guid)?;
                let mut update = DtoUpdate::class_name(to.as_str());
                if dto.content.name == *from {
                    let mut content = dto.content.clone();
                    content.name = to.clone();
                    update = update.with_content(content);
                }
                repository.replace(guid, update)?;
            }
            if let Some(superclass) = repository.class_hierarchy().superclass(from).map(str::to_string) {
                repository.register_class(to, &superclass);
            }
            Ok(guids.len())
        }
        StepAction::RemoveClass { class } => {
            let guids = guids_of_class(repository, class);
            for guid in &guids {
                repository.remove(guid)?;
            }
            Ok(guids.len())
        }
        StepAction::RenameField { class, from, to } => rewrite_content(repository, class, |content| {
            let mut renamed = false;
            for field in content.elements_mut().filter(|field| field.name == *from) {
                field.name = to.clone();
                renamed = true;
            }
            renamed
        }),
        StepAction::RemoveField { class, field } => {
            rewrite_content(repository, class, |content| content.remove_children(field) > 0)
        }
        StepAction::SetAttribute {
            class,
            field,
            name,
            value,
        } => rewrite_content(repository, class, |content| {
            let target = match field {
                Some(field) => match content.child_mut(field) {
                    Some(target) => target,
                    None => return false,
                },
                None => content,
            };
            if target.attr(name) == Some(value.as_str()) {
                return false;
            }
            target.set_attr(name.as_str(), value.as_str());
            true
        }),
        StepAction::MapFieldValues {
            class,
            field,
            values,
        } => rewrite_content(repository, class, |content| {
            let mut changed = false;
            for target in content.elements_mut().filter(|element| element.name == *field) {
                if let Some(mapped) = values.get(&target.text()) {
                    target.set_text(mapped.as_str());
                    changed = true;
                }
            }
            changed
        }),
    }
}
