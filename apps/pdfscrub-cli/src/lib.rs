//! Command implementations behind the `pdfscrub` binary
//!
//! The CLI replays an edit log (as saved by the web editor) onto a PDF and
//! writes the flattened copy, without a browser in the loop.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Serialize;

use pdfscrub_core::edits::EditLog;
use pdfscrub_core::{
    BlankPageRenderer, DocumentInfo, EditKind, EditorSession, FontBook, PageRenderer, ScrubConfig,
};

/// Load `path`, or the defaults when no config file was given
pub fn load_config(path: Option<&Path>) -> Result<ScrubConfig> {
    match path {
        Some(path) => ScrubConfig::from_file(path),
        None => Ok(ScrubConfig::default()),
    }
}

/// Parse a `FAMILY=PATH` font argument
pub fn parse_font_arg(arg: &str) -> Result<(String, PathBuf), String> {
    let (family, path) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected FAMILY=PATH, got '{}'", arg))?;
    let family = family.trim();
    if family.is_empty() || path.is_empty() {
        return Err(format!("expected FAMILY=PATH, got '{}'", arg));
    }
    Ok((family.to_string(), PathBuf::from(path)))
}

fn open_session(config: &ScrubConfig, input: &Path) -> Result<EditorSession> {
    let bytes =
        fs::read(input).with_context(|| format!("Failed to read PDF: {}", input.display()))?;
    let name = input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document.pdf");

    let mut session = EditorSession::new(config);
    session
        .open(name, None, bytes)
        .with_context(|| format!("Failed to open {}", input.display()))?;
    Ok(session)
}

fn read_edits(path: &Path) -> Result<EditLog> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read edits: {}", path.display()))?;
    EditLog::from_json(&json).with_context(|| format!("Invalid edit log: {}", path.display()))
}

/// Replay `edits` onto the session. A bad page number rejects the whole log.
fn apply_edits(session: &mut EditorSession, edits: &EditLog) -> Result<()> {
    let ids = session
        .add_edits(edits)
        .context("Edit log cannot be applied")?;
    tracing::debug!(edits = ids.len(), "Edit log applied");
    Ok(())
}

pub fn document_info(config: &ScrubConfig, input: &Path) -> Result<DocumentInfo> {
    let session = open_session(config, input)?;
    session
        .info()
        .cloned()
        .context("Document closed unexpectedly")
}

/// Counts reported by `check-edits`
#[derive(Debug, Default, Serialize, PartialEq)]
pub struct EditSummary {
    pub total: usize,
    pub blur: usize,
    pub erase: usize,
    pub text: usize,
    /// Edits per page, pages without edits omitted
    pub pages: BTreeMap<u32, usize>,
}

/// Validate an edit log against a document without rendering anything
pub fn check_edits(config: &ScrubConfig, input: &Path, edits: &Path) -> Result<EditSummary> {
    let mut session = open_session(config, input)?;
    let log = read_edits(edits)?;
    apply_edits(&mut session, &log)?;

    let mut summary = EditSummary::default();
    for edit in session.edits().edits() {
        summary.total += 1;
        match edit.kind() {
            EditKind::Blur => summary.blur += 1,
            EditKind::Erase => summary.erase += 1,
            EditKind::Text => summary.text += 1,
        }
        *summary.pages.entry(edit.page()).or_default() += 1;
    }
    Ok(summary)
}

/// Inputs of one `export` run
#[derive(Debug, Clone, Default)]
pub struct ExportRequest {
    pub input: PathBuf,
    pub edits: Option<PathBuf>,
    /// Defaults to `<stem>_edited.pdf` next to the input
    pub output: Option<PathBuf>,
    pub zoom: Option<f64>,
    /// Extra `(family, path)` fonts for text edits
    pub fonts: Vec<(String, PathBuf)>,
    /// Directory holding the PDFium library
    pub pdfium_dir: Option<String>,
    /// Export the edits over blank pages instead of the page content
    pub blank_pages: bool,
}

/// Flatten the input with its edits. Returns the path written.
pub async fn export(
    config: &ScrubConfig,
    request: &ExportRequest,
    progress: &mut dyn FnMut(u32, u32),
) -> Result<PathBuf> {
    let mut session = open_session(config, &request.input)?;
    if let Some(zoom) = request.zoom {
        session.set_zoom(zoom)?;
    }
    if let Some(edits) = &request.edits {
        apply_edits(&mut session, &read_edits(edits)?)?;
    }

    let mut fonts = config.font_book();
    register_fonts(&mut fonts, &request.fonts)?;

    let output = match &request.output {
        Some(path) => path.clone(),
        None => request
            .input
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(session.export_file_name()),
    };
    if output == request.input {
        bail!("Refusing to overwrite the input file {}", output.display());
    }

    let renderer = page_renderer(&session, request)?;
    let bytes = session
        .export(renderer.as_ref(), &fonts, progress)
        .await
        .context("Export failed")?;

    fs::write(&output, &bytes)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    tracing::info!(output = %output.display(), bytes = bytes.len(), "Wrote flattened PDF");
    Ok(output)
}

#[cfg(feature = "pdfium")]
fn page_renderer(session: &EditorSession, request: &ExportRequest) -> Result<Box<dyn PageRenderer>> {
    if request.blank_pages {
        return Ok(Box::new(BlankPageRenderer::new(session.page_count())));
    }
    let document = session.document().context("No document loaded")?;
    let renderer = pdfscrub_core::PdfiumRenderer::new(
        document.bytes().to_vec(),
        request.pdfium_dir.as_deref(),
    )?;
    Ok(Box::new(renderer))
}

#[cfg(not(feature = "pdfium"))]
fn page_renderer(session: &EditorSession, request: &ExportRequest) -> Result<Box<dyn PageRenderer>> {
    if !request.blank_pages {
        bail!(
            "This build cannot rasterize PDF pages; rebuild with `--features pdfium` \
             or pass --blank-pages to export the edits over blank pages"
        );
    }
    if request.pdfium_dir.is_some() {
        tracing::warn!("--pdfium-dir ignored: built without the pdfium feature");
    }
    Ok(Box::new(BlankPageRenderer::new(session.page_count())))
}

fn register_fonts(book: &mut FontBook, files: &[(String, PathBuf)]) -> Result<()> {
    for (family, path) in files {
        let bytes = fs::read(path)
            .with_context(|| format!("Failed to read font: {}", path.display()))?;
        book.register(family, bytes)
            .with_context(|| format!("Unusable font: {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Document, Object, Stream};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn write_pdf(dir: &TempDir, name: &str, pages: usize) -> PathBuf {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let kids: Vec<Object> = (0..pages)
            .map(|_| {
                let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
                doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                    "Contents" => content_id,
                })
                .into()
            })
            .collect();
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Count" => pages as i64,
                "Kids" => kids,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let path = dir.path().join(name);
        doc.save(&path).unwrap();
        path
    }

    fn write_edits(dir: &TempDir, json: &str) -> PathBuf {
        let path = dir.path().join("edits.json");
        fs::write(&path, json).unwrap();
        path
    }

    const TWO_EDITS: &str = r#"{"edits": [
        {"type": "Erase", "id": 1, "page": 1, "region": {"x": 10, "y": 780, "width": 100, "height": 20}},
        {"type": "Blur", "id": 2, "page": 2, "region": {"x": 50, "y": 400, "width": 80, "height": 40}}
    ]}"#;

    #[test]
    fn test_parse_font_arg() {
        assert_eq!(
            parse_font_arg("Arial=/fonts/arial.ttf").unwrap(),
            ("Arial".to_string(), PathBuf::from("/fonts/arial.ttf"))
        );
        assert!(parse_font_arg("Arial").is_err());
        assert!(parse_font_arg("=/fonts/a.ttf").is_err());
        assert!(parse_font_arg("Arial=").is_err());
    }

    #[test]
    fn test_document_info() {
        let dir = TempDir::new().unwrap();
        let input = write_pdf(&dir, "report.pdf", 3);
        let info = document_info(&ScrubConfig::default(), &input).unwrap();
        assert_eq!(info.name, "report.pdf");
        assert_eq!(info.page_count, 3);
    }

    #[test]
    fn test_document_info_rejects_non_pdf() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("notes.pdf");
        fs::write(&input, b"just some text").unwrap();
        assert!(document_info(&ScrubConfig::default(), &input).is_err());
    }

    #[test]
    fn test_check_edits_counts_by_kind_and_page() {
        let dir = TempDir::new().unwrap();
        let input = write_pdf(&dir, "report.pdf", 2);
        let edits = write_edits(&dir, TWO_EDITS);

        let summary = check_edits(&ScrubConfig::default(), &input, &edits).unwrap();
        assert_eq!(
            summary,
            EditSummary {
                total: 2,
                blur: 1,
                erase: 1,
                text: 0,
                pages: BTreeMap::from([(1, 1), (2, 1)]),
            }
        );
    }

    #[test]
    fn test_check_edits_rejects_page_out_of_range() {
        let dir = TempDir::new().unwrap();
        let input = write_pdf(&dir, "single.pdf", 1);
        let edits = write_edits(&dir, TWO_EDITS);

        let err = check_edits(&ScrubConfig::default(), &input, &edits).unwrap_err();
        assert!(format!("{:#}", err).contains("out of range"));
    }

    #[tokio::test]
    async fn test_export_writes_next_to_input() {
        let dir = TempDir::new().unwrap();
        let input = write_pdf(&dir, "report.pdf", 2);
        let edits = write_edits(&dir, TWO_EDITS);
        let request = ExportRequest {
            input: input.clone(),
            edits: Some(edits),
            blank_pages: true,
            ..ExportRequest::default()
        };

        let mut calls = Vec::new();
        let output = export(&ScrubConfig::default(), &request, &mut |done, total| {
            calls.push((done, total))
        })
        .await
        .unwrap();

        assert_eq!(output, dir.path().join("report_edited.pdf"));
        assert_eq!(calls, vec![(1, 2), (2, 2)]);
        let doc = Document::load(&output).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[tokio::test]
    async fn test_export_refuses_to_overwrite_input() {
        let dir = TempDir::new().unwrap();
        let input = write_pdf(&dir, "report.pdf", 1);
        let request = ExportRequest {
            input: input.clone(),
            output: Some(input.clone()),
            blank_pages: true,
            ..ExportRequest::default()
        };

        let err = export(&ScrubConfig::default(), &request, &mut |_, _| {})
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Refusing to overwrite"));
    }

    #[tokio::test]
    async fn test_export_rejects_bad_log_without_writing() {
        let dir = TempDir::new().unwrap();
        let input = write_pdf(&dir, "single.pdf", 1);
        let edits = write_edits(&dir, TWO_EDITS);
        let request = ExportRequest {
            input,
            edits: Some(edits),
            blank_pages: true,
            ..ExportRequest::default()
        };

        let err = export(&ScrubConfig::default(), &request, &mut |_, _| {})
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("out of range"));
        assert!(!dir.path().join("single_edited.pdf").exists());
    }

    #[cfg(not(feature = "pdfium"))]
    #[tokio::test]
    async fn test_export_without_rasterizer_needs_blank_pages() {
        let dir = TempDir::new().unwrap();
        let input = write_pdf(&dir, "report.pdf", 1);
        let request = ExportRequest {
            input,
            ..ExportRequest::default()
        };

        let err = export(&ScrubConfig::default(), &request, &mut |_, _| {})
            .await
            .unwrap_err();
        assert!(err.to_string().contains("--blank-pages"));
        assert!(!dir.path().join("report_edited.pdf").exists());
    }

    #[test]
    fn test_register_fonts_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.ttf");
        fs::write(&path, b"not a font").unwrap();

        let mut book = FontBook::new();
        let err = register_fonts(&mut book, &[("Broken".to_string(), path)]).unwrap_err();
        assert!(err.to_string().contains("Unusable font"));
        assert!(!book.has_registered_fonts());
        assert!(register_fonts(&mut book, &[("Gone".to_string(), dir.path().join("gone.ttf"))]).is_err());
    }
}
