use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use crate::error::ProjectError;
use crate::model::{ClassHierarchy, DomainObjectDto, Element, Guid};
use crate::store::memory::MemoryDtoRepository;
use crate::store::traits::DtoRepository;

pub const PROJECT_ELEMENT: &str = "project";
pub const RECORD_ELEMENT: &str = "rt";

/// A version-tagged project document: the envelope around the persisted
/// object graph.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectFile {
    pub version: u32,
    pub records: Vec<DomainObjectDto>,
}

impl ProjectFile {
    pub fn new(version: u32, records: Vec<DomainObjectDto>) -> Self {
        Self { version, records }
    }

    /// Read a project file from disk, transparently handling gzip.
    pub fn read(path: &Path) -> Result<Self, ProjectError> {
        let bytes = fs::read(path)?;
        let decompressed = decompress_data(&bytes)?;
        let text = String::from_utf8(decompressed)
            .map_err(|e| ProjectError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        let project = Self::parse(&text)?;
        log::info!(
            "Read {} records at version {} from {}",
            project.records.len(),
            project.version,
            path.display()
        );
        Ok(project)
    }

    pub fn parse(xml: &str) -> Result<Self, ProjectError> {
        let root = Element::parse(xml)?;
        if root.name != PROJECT_ELEMENT {
            return Err(ProjectError::UnexpectedElement {
                expected: PROJECT_ELEMENT.to_string(),
                found: root.name,
            });
        }
        let version_text = required_attr(&root, "version")?;
        let version = version_text
            .trim()
            .parse::<u32>()
            .map_err(|_| ProjectError::InvalidVersion(version_text.to_string()))?;

        let mut records = Vec::new();
        for rt in root.elements() {
            if rt.name != RECORD_ELEMENT {
                return Err(ProjectError::UnexpectedElement {
                    expected: RECORD_ELEMENT.to_string(),
                    found: rt.name.clone(),
                });
            }
            records.push(parse_record(rt)?);
        }

        Ok(Self { version, records })
    }

    pub fn to_xml_string(&self) -> Result<String, ProjectError> {
        let mut root = Element::new(PROJECT_ELEMENT).with_attr("version", self.version.to_string());
        for dto in &self.records {
            let mut rt = Element::new(RECORD_ELEMENT)
                .with_attr("guid", dto.guid.to_string())
                .with_attr("class", dto.class_name.as_str());
            if let Some(owner) = &dto.owner {
                rt.set_attr("ownerguid", owner.to_string());
            }
            rt.push_child(dto.content.clone());
            root.push_child(rt);
        }
        Ok(root.to_document_string()?)
    }

    /// Write the project to disk, gzip-compressed when `compress` is set.
    pub fn write(&self, path: &Path, compress: bool) -> Result<(), ProjectError> {
        let xml = self.to_xml_string()?;
        let bytes = if compress {
            compress_data(xml.as_bytes())?
        } else {
            xml.into_bytes()
        };
        fs::write(path, bytes)?;
        log::info!(
            "Wrote {} records at version {} to {}",
            self.records.len(),
            self.version,
            path.display()
        );
        Ok(())
    }

    /// Load the records into a fresh repository for a migration pass.
    pub fn into_repository(
        self,
        hierarchy: ClassHierarchy,
    ) -> Result<(MemoryDtoRepository, u32), ProjectError> {
        let repository = MemoryDtoRepository::from_records(self.records, hierarchy)?;
        Ok((repository, self.version))
    }

    /// Snapshot the live records of a repository at the given version.
    pub fn from_repository(repository: &dyn DtoRepository, version: u32) -> Self {
        Self {
            version,
            records: repository.all_live().into_iter().cloned().collect(),
        }
    }
}

fn parse_record(rt: &Element) -> Result<DomainObjectDto, ProjectError> {
    let guid_text = required_attr(rt, "guid")?;
    let guid = Guid::parse(guid_text).ok_or_else(|| ProjectError::InvalidGuid(guid_text.to_string()))?;
    let class_name = required_attr(rt, "class")?;
    let owner = match rt.attr("ownerguid") {
        Some(text) => Some(Guid::parse(text).ok_or_else(|| ProjectError::InvalidGuid(text.to_string()))?),
        None => None,
    };

    let mut contents = rt.elements();
    let content = match (contents.next(), contents.next()) {
        (Some(content), None) => content.clone(),
        _ => {
            return Err(ProjectError::InvalidRecordContent {
                guid,
                found: rt.elements().count(),
            })
        }
    };

    Ok(DomainObjectDto {
        guid,
        class_name: class_name.to_string(),
        owner,
        content,
    })
}

fn required_attr<'a>(element: &'a Element, attribute: &str) -> Result<&'a str, ProjectError> {
    element.attr(attribute).ok_or_else(|| ProjectError::MissingAttribute {
        element: element.name.clone(),
        attribute: attribute.to_string(),
    })
}

/// Decompress gzip data
fn decompress_data(data: &[u8]) -> Result<Vec<u8>, ProjectError> {
    // Check if data is gzip-compressed by looking for gzip magic bytes (1f 8b)
    if data.len() >= 2 && data[0] == 0x1f && data[1] == 0x8b {
        let mut decoder = GzDecoder::new(data);
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed)?;
        Ok(decompressed)
    } else {
        Ok(data.to_vec())
    }
}

/// Compress data using gzip
fn compress_data(data: &[u8]) -> Result<Vec<u8>, ProjectError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}
