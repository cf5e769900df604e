//! Sidecar descriptors
//!
//! One XML document per asset, written beside the organised file. A
//! sidecar carries everything needed to reconstruct hub identity and
//! canonical values on disaster recovery; the great inhale walks the data
//! root and rebuilds the catalogue from these alone.

use crate::models::MediaType;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Suffix appended to the media file name
pub const SIDECAR_SUFFIX: &str = ".curator.xml";

#[derive(Debug, Error)]
pub enum SidecarError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed sidecar: {0}")]
    Malformed(String),
}

/// Catalogue facts persisted beside the media file
#[derive(Debug, Clone, PartialEq)]
pub struct SidecarDoc {
    pub asset_id: Uuid,
    pub content_hash: String,
    pub hub_id: Uuid,
    pub hub_name: String,
    pub work_id: Uuid,
    pub media_type: MediaType,
    pub edition_id: Uuid,
    pub format_label: Option<String>,
    /// Canonical (key, value) pairs for the edition
    pub canonical_values: Vec<(String, String)>,
}

/// Sidecar path for a media file
pub fn sidecar_path_for(media_path: &Path) -> PathBuf {
    let mut os = media_path.as_os_str().to_os_string();
    os.push(SIDECAR_SUFFIX);
    PathBuf::from(os)
}

/// Whether a path looks like a sidecar document
pub fn is_sidecar(path: &Path) -> bool {
    path.to_string_lossy().ends_with(SIDECAR_SUFFIX)
}

/// Serialize a sidecar document to XML
pub fn to_xml(doc: &SidecarDoc) -> Result<Vec<u8>, SidecarError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new("curator-asset");
    root.push_attribute(("version", "1"));
    writer.write_event(Event::Start(root))?;

    write_text_element(&mut writer, "asset-id", &doc.asset_id.to_string())?;
    write_text_element(&mut writer, "content-hash", &doc.content_hash)?;
    write_text_element(&mut writer, "hub-id", &doc.hub_id.to_string())?;
    write_text_element(&mut writer, "hub-name", &doc.hub_name)?;
    write_text_element(&mut writer, "work-id", &doc.work_id.to_string())?;
    write_text_element(&mut writer, "media-type", doc.media_type.as_str())?;
    write_text_element(&mut writer, "edition-id", &doc.edition_id.to_string())?;
    if let Some(label) = &doc.format_label {
        write_text_element(&mut writer, "format-label", label)?;
    }

    writer.write_event(Event::Start(BytesStart::new("canonical")))?;
    for (key, value) in &doc.canonical_values {
        let mut element = BytesStart::new("value");
        element.push_attribute(("key", key.as_str()));
        writer.write_event(Event::Start(element))?;
        writer.write_event(Event::Text(BytesText::new(value)))?;
        writer.write_event(Event::End(BytesEnd::new("value")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("canonical")))?;

    writer.write_event(Event::End(BytesEnd::new("curator-asset")))?;

    Ok(writer.into_inner().into_inner())
}

fn write_text_element(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    name: &str,
    text: &str,
) -> Result<(), SidecarError> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Parse a sidecar document from XML
pub fn from_xml(raw: &str) -> Result<SidecarDoc, SidecarError> {
    let mut reader = Reader::from_str(raw);
    reader.trim_text(true);

    let mut asset_id = None;
    let mut content_hash = None;
    let mut hub_id = None;
    let mut hub_name = None;
    let mut work_id = None;
    let mut media_type = MediaType::Unknown;
    let mut edition_id = None;
    let mut format_label = None;
    let mut canonical_values = Vec::new();

    let mut current: Option<String> = None;
    let mut current_key: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) => {
                let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
                if name == "value" {
                    for attribute in element.attributes().flatten() {
                        if attribute.key.as_ref() == b"key" {
                            current_key = Some(
                                String::from_utf8_lossy(&attribute.value).into_owned(),
                            );
                        }
                    }
                }
                current = Some(name);
            }
            Ok(Event::Text(text)) => {
                let value = text
                    .unescape()
                    .map_err(|e| SidecarError::Malformed(e.to_string()))?
                    .into_owned();

                match current.as_deref() {
                    Some("asset-id") => asset_id = Some(parse_uuid(&value)?),
                    Some("content-hash") => content_hash = Some(value),
                    Some("hub-id") => hub_id = Some(parse_uuid(&value)?),
                    Some("hub-name") => hub_name = Some(value),
                    Some("work-id") => work_id = Some(parse_uuid(&value)?),
                    Some("media-type") => media_type = MediaType::parse(&value),
                    Some("edition-id") => edition_id = Some(parse_uuid(&value)?),
                    Some("format-label") => format_label = Some(value),
                    Some("value") => {
                        if let Some(key) = current_key.take() {
                            canonical_values.push((key, value));
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::End(_)) => current = None,
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(SidecarError::Malformed(e.to_string())),
        }
    }

    Ok(SidecarDoc {
        asset_id: asset_id.ok_or_else(|| missing("asset-id"))?,
        content_hash: content_hash.ok_or_else(|| missing("content-hash"))?,
        hub_id: hub_id.ok_or_else(|| missing("hub-id"))?,
        hub_name: hub_name.ok_or_else(|| missing("hub-name"))?,
        work_id: work_id.ok_or_else(|| missing("work-id"))?,
        media_type,
        edition_id: edition_id.ok_or_else(|| missing("edition-id"))?,
        format_label,
        canonical_values,
    })
}

/// Write the sidecar next to its media file
pub async fn write_sidecar(media_path: &Path, doc: &SidecarDoc) -> Result<PathBuf, SidecarError> {
    let path = sidecar_path_for(media_path);
    let xml = to_xml(doc)?;
    tokio::fs::write(&path, xml).await?;
    Ok(path)
}

/// Read a sidecar document from disk
pub async fn read_sidecar(path: &Path) -> Result<SidecarDoc, SidecarError> {
    let raw = tokio::fs::read_to_string(path).await?;
    from_xml(&raw)
}

fn parse_uuid(raw: &str) -> Result<Uuid, SidecarError> {
    Uuid::parse_str(raw).map_err(|e| SidecarError::Malformed(format!("bad UUID '{raw}': {e}")))
}

fn missing(field: &str) -> SidecarError {
    SidecarError::Malformed(format!("missing element <{field}>"))
}
