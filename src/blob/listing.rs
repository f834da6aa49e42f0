//! Parsing for the List Blobs XML response.

use anyhow::{Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;

/// One blob entry from a listing page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlobItem {
    /// Blob path relative to the container.
    pub name: String,
    /// `Content-Type` property, when set.
    pub content_type: Option<String>,
    /// `Content-Length` property in bytes.
    pub content_length: u64,
    /// True for hierarchical-namespace directory markers.
    pub is_directory: bool,
}

/// One page of a container listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlobPage {
    /// Blobs on this page, in service order.
    pub blobs: Vec<BlobItem>,
    /// Continuation marker for the next page, absent on the last page.
    pub next_marker: Option<String>,
}

/// Parses an `EnumerationResults` document.
pub fn parse_blob_page(xml: &str) -> Result<BlobPage> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut page = BlobPage::default();
    let mut path: Vec<String> = Vec::new();
    let mut current: Option<BlobItem> = None;

    loop {
        let event = reader
            .read_event()
            .with_context(|| format!("invalid blob listing XML at byte {}", reader.buffer_position()))?;
        match event {
            Event::Start(tag) => {
                let name = String::from_utf8_lossy(tag.name().as_ref()).into_owned();
                if name == "Blob" {
                    current = Some(BlobItem::default());
                }
                path.push(name);
            }
            Event::End(_) => {
                if path.pop().as_deref() == Some("Blob") {
                    if let Some(blob) = current.take() {
                        page.blobs.push(blob);
                    }
                }
            }
            Event::Text(text) => {
                let value = text.unescape().context("invalid escape in blob listing")?;
                apply_value(&path, &value, &mut current, &mut page)?;
            }
            Event::CData(data) => {
                let raw = data.into_inner();
                let value = String::from_utf8_lossy(&raw);
                apply_value(&path, &value, &mut current, &mut page)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(page)
}

fn apply_value(
    path: &[String],
    value: &str,
    current: &mut Option<BlobItem>,
    page: &mut BlobPage,
) -> Result<()> {
    let tail: Vec<&str> = path.iter().rev().take(3).map(String::as_str).collect();
    match (tail.as_slice(), current.as_mut()) {
        (["Name", "Blob", ..], Some(blob)) => blob.name = value.to_string(),
        (["Content-Type", "Properties", "Blob"], Some(blob)) => {
            blob.content_type = Some(value.to_string()).filter(|v| !v.is_empty());
        }
        (["Content-Length", "Properties", "Blob"], Some(blob)) => {
            blob.content_length = value
                .trim()
                .parse()
                .with_context(|| format!("invalid Content-Length {value:?} for blob {}", blob.name))?;
        }
        (["hdi_isfolder", "Metadata", "Blob"], Some(blob)) => {
            blob.is_directory = value.trim().eq_ignore_ascii_case("true");
        }
        (["NextMarker", "EnumerationResults", ..], None) => {
            page.next_marker = Some(value.to_string()).filter(|v| !v.is_empty());
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PAGE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<EnumerationResults ServiceEndpoint="https://acct.blob.core.windows.net/" ContainerName="docs">
  <Blobs>
    <Blob>
      <Name>guidelines/lupus &amp; nephritis.pdf</Name>
      <Properties>
        <Content-Length>2048</Content-Length>
        <Content-Type>application/pdf</Content-Type>
      </Properties>
      <Metadata />
    </Blob>
    <Blob>
      <Name>guidelines</Name>
      <Properties>
        <Content-Length>0</Content-Length>
        <Content-Type />
      </Properties>
      <Metadata>
        <hdi_isfolder>true</hdi_isfolder>
      </Metadata>
    </Blob>
  </Blobs>
  <NextMarker>2!96!MDAwMDE2</NextMarker>
</EnumerationResults>"#;

    #[test]
    fn parses_blobs_and_marker() {
        let page = parse_blob_page(PAGE).expect("parse");
        assert_eq!(
            page.blobs,
            vec![
                BlobItem {
                    name: "guidelines/lupus & nephritis.pdf".into(),
                    content_type: Some("application/pdf".into()),
                    content_length: 2048,
                    is_directory: false,
                },
                BlobItem {
                    name: "guidelines".into(),
                    content_type: None,
                    content_length: 0,
                    is_directory: true,
                },
            ]
        );
        assert_eq!(page.next_marker.as_deref(), Some("2!96!MDAwMDE2"));
    }

    #[test]
    fn empty_marker_ends_listing() {
        let xml = r#"<EnumerationResults><Blobs /><NextMarker /></EnumerationResults>"#;
        let page = parse_blob_page(xml).expect("parse");
        assert!(page.blobs.is_empty());
        assert_eq!(page.next_marker, None);
    }

    #[test]
    fn bad_content_length_is_an_error() {
        let xml = r#"<EnumerationResults><Blobs><Blob><Name>a.pdf</Name>
            <Properties><Content-Length>lots</Content-Length></Properties>
            </Blob></Blobs></EnumerationResults>"#;
        let err = parse_blob_page(xml).unwrap_err();
        assert!(err.to_string().contains("invalid Content-Length \"lots\" for blob a.pdf"));
    }
}
