//! Upload-time Bates allocation.
//!
//! The page count used to size a document's range is an estimate. With the
//! default [`PageCountStrategy::FileSize`] it is `file_size / page_size`,
//! which overcounts small scanned images and undercounts compressed PDFs.

use std::panic;
use std::str::FromStr;
use std::time::Duration;

use chrono::Utc;
use diesel::prelude::*;
use diesel::PgConnection;
use pdfium_render::prelude::*;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bates::allocate;
use crate::db::set_local_timeout;
use crate::error::{BatesError, BatesResult};
use crate::models::{Case, Document, NewDocument};
use crate::schema::{cases, documents};

pub const DEFAULT_PAGE_SIZE_BYTES: i64 = 50_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageCountStrategy {
    /// `max(1, file_size / page_size)` for every file.
    FileSize,
    /// Real page count for PDFs, one page for images, file size otherwise.
    Pdf,
}

impl FromStr for PageCountStrategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "size" | "file-size" => Ok(Self::FileSize),
            "pdf" => Ok(Self::Pdf),
            other => Err(format!("unknown page count strategy '{other}'")),
        }
    }
}

pub fn estimate_pages_from_size(file_size: i64, page_size_bytes: i64) -> i64 {
    let page_size = page_size_bytes.max(1);
    (file_size.max(0) / page_size).max(1)
}

pub fn estimate_page_count(
    strategy: PageCountStrategy,
    bytes: &[u8],
    mime_type: Option<&str>,
    page_size_bytes: i64,
) -> i64 {
    let by_size = estimate_pages_from_size(bytes.len() as i64, page_size_bytes);
    if strategy == PageCountStrategy::FileSize {
        return by_size;
    }

    let mime = mime_type.unwrap_or_default().to_ascii_lowercase();
    if mime.starts_with("image/") {
        return 1;
    }
    if mime == "application/pdf" {
        match count_pdf_pages(bytes) {
            Ok(pages) if pages > 0 => return pages,
            Ok(_) => {}
            Err(err) => {
                warn!(error = %err, "pdf page count failed; falling back to file size estimate")
            }
        }
    }
    by_size
}

fn count_pdf_pages(bytes: &[u8]) -> Result<i64, String> {
    let pdfium = panic::catch_unwind(Pdfium::default)
        .map_err(|_| "failed to initialize PDFium".to_string())?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|err| format!("load pdf: {err}"))?;
    Ok(i64::from(document.pages().len()))
}

/// A stored upload waiting for its document row.
#[derive(Debug, Clone)]
pub struct IntakeRequest {
    pub document_id: Uuid,
    pub case_id: Uuid,
    pub name: String,
    pub mime_type: Option<String>,
    pub file_size: i64,
    pub checksum: String,
    pub storage_key: String,
    pub page_count: i64,
    pub auto_bates: bool,
}

/// Inserts the document and, when numbering applies, stamps its Bates range
/// and advances the case counter in the same transaction.
pub fn register_document(
    conn: &mut PgConnection,
    request: IntakeRequest,
    timeout: Duration,
) -> BatesResult<Document> {
    if request.page_count < 1 {
        return Err(BatesError::invalid("page count must be at least 1"));
    }
    let page_count = i32::try_from(request.page_count)
        .map_err(|_| BatesError::invalid("page count exceeds supported range"))?;

    conn.build_transaction()
        .read_write()
        .run::<_, BatesError, _>(|conn| {
            set_local_timeout(conn, timeout)?;

            let case: Case = cases::table
                .find(request.case_id)
                .for_update()
                .first(conn)
                .optional()?
                .ok_or(BatesError::NotFound("case"))?;

            let allocation = match (&case.bates_prefix, request.auto_bates) {
                (Some(prefix), true) => Some(allocate(
                    case.current_bates_number,
                    prefix,
                    request.page_count,
                )?),
                (None, true) => {
                    debug!(case_id = %case.id, "case has no bates prefix; skipping allocation");
                    None
                }
                (_, false) => None,
            };

            if let Some(allocation) = &allocation {
                let advanced = diesel::update(
                    cases::table
                        .filter(cases::id.eq(case.id))
                        .filter(cases::current_bates_number.eq(case.current_bates_number)),
                )
                .set((
                    cases::current_bates_number.eq(allocation.new_high_water_mark),
                    cases::updated_at.eq(Utc::now().naive_utc()),
                ))
                .execute(conn)?;

                if advanced != 1 {
                    return Err(BatesError::Conflict(format!(
                        "bates counter for case {} changed during allocation",
                        case.id
                    )));
                }
            }

            let new_document = NewDocument {
                id: request.document_id,
                case_id: case.id,
                name: request.name.clone(),
                mime_type: request.mime_type.clone(),
                file_size: request.file_size,
                checksum: request.checksum.clone(),
                storage_key: request.storage_key.clone(),
                page_count,
                bates_start: allocation.as_ref().map(|a| a.start_label.clone()),
                bates_end: allocation.as_ref().map(|a| a.end_label.clone()),
                bates_start_number: allocation.as_ref().map(|a| a.start_number),
                bates_end_number: allocation.as_ref().map(|a| a.end_number),
            };
            diesel::insert_into(documents::table)
                .values(&new_document)
                .execute(conn)?;

            let document: Document = documents::table.find(request.document_id).first(conn)?;

            if let Some(allocation) = &allocation {
                info!(
                    case_id = %case.id,
                    document_id = %document.id,
                    bates_start = %allocation.start_label,
                    bates_end = %allocation.end_label,
                    pages = request.page_count,
                    "assigned intake bates range"
                );
            }

            Ok(document)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_estimate_floors_and_clamps_to_one_page() {
        assert_eq!(estimate_pages_from_size(150_000, 50_000), 3);
        assert_eq!(estimate_pages_from_size(40_000, 50_000), 1);
        assert_eq!(estimate_pages_from_size(0, 50_000), 1);
        assert_eq!(estimate_pages_from_size(149_999, 50_000), 2);
    }

    #[test]
    fn size_strategy_ignores_content_type() {
        let bytes = vec![0u8; 120_000];
        let pages = estimate_page_count(
            PageCountStrategy::FileSize,
            &bytes,
            Some("image/png"),
            DEFAULT_PAGE_SIZE_BYTES,
        );
        assert_eq!(pages, 2);
    }

    #[test]
    fn pdf_strategy_counts_images_as_single_page() {
        let bytes = vec![0u8; 500_000];
        let pages = estimate_page_count(
            PageCountStrategy::Pdf,
            &bytes,
            Some("image/jpeg"),
            DEFAULT_PAGE_SIZE_BYTES,
        );
        assert_eq!(pages, 1);
    }

    #[test]
    fn pdf_strategy_uses_size_for_other_formats() {
        let bytes = vec![0u8; 260_000];
        let pages = estimate_page_count(
            PageCountStrategy::Pdf,
            &bytes,
            Some("text/plain"),
            DEFAULT_PAGE_SIZE_BYTES,
        );
        assert_eq!(pages, 5);
    }

    #[test]
    fn parses_strategy_names() {
        assert_eq!(
            "size".parse::<PageCountStrategy>(),
            Ok(PageCountStrategy::FileSize)
        );
        assert_eq!("PDF".parse::<PageCountStrategy>(), Ok(PageCountStrategy::Pdf));
        assert!("ocr".parse::<PageCountStrategy>().is_err());
    }
}
