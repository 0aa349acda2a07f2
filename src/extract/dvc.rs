//! Record extractor for the national public-service portal.
//!
//! A detail page carries the procedure title in its heading, a modal
//! popup with the flat metadata block and the legal-basis table, and a
//! series of heading-introduced body sections. Everything below the
//! title is optional: absent pieces resolve to empty defaults.

use async_trait::async_trait;
use tracing::debug;

use super::{FieldOutcome, RecordExtractor};
use crate::error::ExtractError;
use crate::models::{Citation, ItemReference, ProcedureMeta, ProcedureSections, Record};
use crate::session::{wait_clickable, wait_visible, ElementHandle, Locator, PageSession, WaitPolicy};

const TITLE: &str = "h1.main-title.-none";
const DETAIL_LINK: &str = "a.url[data-toggle='modal']";
const POPUP: &str = "#popupChitietTTHC";
const POPUP_CLOSE: &str = "div.close span.icon-close";
const INFO_ROW: &str = "div.info-row";
const INFO_CELL: &str = ":scope > div";
const CITATION_ROWS: &str = "table tbody tr";

// Popup rows located by their label text rather than position.
const LABEL_APPLICANTS: &str = "Đối tượng thực hiện";
const LABEL_IMPLEMENTING_AGENCY: &str = "Cơ quan thực hiện";
const LABEL_AUTHORIZED_AGENCY: &str = "Cơ quan có thẩm quyền";
const LABEL_RESULT: &str = "Kết quả thực hiện";
const LABEL_LEGAL_BASIS: &str = "Căn cứ pháp lý";

// Body section headings.
const SECTION_PROCESS: &str = "Trình tự thực hiện";
const SECTION_METHODS: &str = "Cách thức thực hiện";
const SECTION_DOSSIER: &str = "Thành phần hồ sơ";
const SECTION_REQUIREMENTS: &str = "Yêu cầu, điều kiện thực hiện";

// Dossier sub-item titles.
const ITEM_TO_SUBMIT: &str = "Giấy tờ phải nộp";
const ITEM_TO_PRESENT: &str = "Giấy tờ phải xuất trình";
const ITEM_NOTES: &str = "Lưu ý";

/// Extractor for procedure detail pages.
pub struct DvcExtractor {
    waits: WaitPolicy,
}

impl DvcExtractor {
    pub fn new(waits: WaitPolicy) -> Self {
        Self { waits }
    }

    /// Harvest the metadata popup. Field-scoped: any missing piece
    /// leaves its default in place.
    async fn harvest_popup(&self, session: &dyn PageSession, record: &mut Record) {
        let link = match wait_clickable(session, &Locator::css(DETAIL_LINK), self.waits).await {
            Ok(link) => link,
            Err(e) => {
                debug!(url = %record.source_url, "detail popup link unavailable: {}", e);
                return;
            }
        };
        if let Err(e) = link.click().await {
            debug!(url = %record.source_url, "detail popup link click failed: {}", e);
            return;
        }

        let popup = match wait_visible(session, &Locator::css(POPUP), self.waits).await {
            Ok(popup) => popup,
            Err(e) => {
                debug!(url = %record.source_url, "detail popup never appeared: {}", e);
                return;
            }
        };

        let rows = popup.find_all(INFO_ROW).await.unwrap_or_default();
        record.metadata = read_meta(&rows).await;
        record.citations = read_citations(&rows).await;

        self.dismiss_popup(session, popup.as_ref()).await;
    }

    /// Close the popup, best effort. The worker continues either way.
    async fn dismiss_popup(&self, session: &dyn PageSession, popup: &dyn ElementHandle) {
        if let Ok(Some(button)) = popup.find_one(POPUP_CLOSE).await {
            if button.click().await.is_ok() {
                return;
            }
        }
        if let Err(e) = session.press_key("Escape").await {
            debug!("popup dismissal fallback failed: {}", e);
        }
    }

    /// Harvest the heading-introduced body sections.
    async fn harvest_sections(&self, session: &dyn PageSession, sections: &mut ProcedureSections) {
        sections.process_steps = section_text(
            session,
            &[Locator::xpath(heading_sibling(SECTION_PROCESS, "div"))],
        )
        .await
        .into_text();

        sections.submission_methods = section_text(
            session,
            &[Locator::xpath(heading_sibling(SECTION_METHODS, "table"))],
        )
        .await
        .into_text();

        sections.dossier_components = section_text(
            session,
            &[Locator::xpath(format!(
                "//h2[contains(text(), '{SECTION_DOSSIER}')]/following-sibling::div[@class='list-expand']"
            ))],
        )
        .await
        .into_text();

        self.harvest_dossier_items(session, sections).await;

        sections.implementing_agency = section_text(
            session,
            &[
                Locator::xpath(titled_article(LABEL_IMPLEMENTING_AGENCY, "article")),
                Locator::xpath(heading_sibling_article(LABEL_IMPLEMENTING_AGENCY)),
            ],
        )
        .await
        .into_text();

        sections.requirements = section_text(
            session,
            &[
                Locator::xpath(titled_article("Yêu cầu, điều kiện", "article cls-requires")),
                Locator::xpath(heading_sibling_article(SECTION_REQUIREMENTS)),
            ],
        )
        .await
        .into_text();
    }

    /// The dossier block nests titled items; three of them are lifted
    /// into their own fields.
    async fn harvest_dossier_items(
        &self,
        session: &dyn PageSession,
        sections: &mut ProcedureSections,
    ) {
        let items = session
            .find_all(&Locator::xpath(format!(
                "//h2[contains(text(), '{SECTION_DOSSIER}')]/following-sibling::div[@class='list-expand']/div[@class='item']"
            )))
            .await
            .unwrap_or_default();

        for item in &items {
            let title = match item.find_one("div.title").await {
                Ok(Some(el)) => el.text().await.unwrap_or_default(),
                _ => continue,
            };
            let content = match item.find_one("div.content").await {
                Ok(Some(el)) => FieldOutcome::from(el.text().await.ok()),
                _ => FieldOutcome::Default,
            };

            if title.contains(ITEM_TO_SUBMIT) {
                sections.documents_to_submit = content.into_text();
            } else if title.contains(ITEM_TO_PRESENT) {
                sections.documents_to_present = content.into_text();
            } else if title.contains(ITEM_NOTES) {
                sections.notes = content.into_text();
            }
        }
    }
}

#[async_trait]
impl RecordExtractor for DvcExtractor {
    async fn extract(
        &self,
        session: &mut dyn PageSession,
        item: &ItemReference,
    ) -> Result<Record, ExtractError> {
        session
            .open(item.url())
            .await
            .map_err(|e| ExtractError::ItemUnavailable(format!("open failed: {e}")))?;

        // The title is the one mandatory piece: a page that never
        // renders it is abandoned whole.
        let title_el = wait_visible(session, &Locator::css(TITLE), self.waits)
            .await
            .map_err(|_| ExtractError::ItemUnavailable("title never rendered".to_string()))?;
        let title = title_el.text().await.unwrap_or_default();

        let mut record = Record::new(title, item.url());
        self.harvest_popup(&*session, &mut record).await;

        let mut sections = ProcedureSections::default();
        self.harvest_sections(&*session, &mut sections).await;
        record.sections = sections;

        Ok(record)
    }
}

/// Read the flat metadata block from the popup's info rows.
///
/// The first rows have fixed positions; the rest move around between
/// procedures and are matched by label.
async fn read_meta(rows: &[Box<dyn ElementHandle>]) -> ProcedureMeta {
    let mut meta = ProcedureMeta::default();

    meta.procedure_code = row_value_at(rows, 0).await.into_text();
    meta.decision_number = row_value_at(rows, 1).await.into_text();
    meta.implementation_level = row_value_at(rows, 3).await.into_text();
    meta.procedure_type = row_value_at(rows, 4).await.into_text();
    meta.sector = row_value_at(rows, 5).await.into_text();

    meta.applicants = row_value_by_label(rows, LABEL_APPLICANTS).await.into_text();
    meta.implementing_agency = row_value_by_label(rows, LABEL_IMPLEMENTING_AGENCY)
        .await
        .into_text();
    meta.authorized_agency = row_value_by_label(rows, LABEL_AUTHORIZED_AGENCY)
        .await
        .into_text();
    meta.result = row_value_by_label(rows, LABEL_RESULT).await.into_text();

    meta
}

/// Read the legal-basis table. Rows with fewer than three cells are
/// skipped; the issuing agency cell is optional.
async fn read_citations(rows: &[Box<dyn ElementHandle>]) -> Vec<Citation> {
    let mut citations = Vec::new();

    for row in rows {
        if !row_label(row.as_ref()).await.contains(LABEL_LEGAL_BASIS) {
            continue;
        }
        let table_rows = row.find_all(CITATION_ROWS).await.unwrap_or_default();
        for table_row in &table_rows {
            let cells = table_row.find_all("td").await.unwrap_or_default();
            if cells.len() < 3 {
                continue;
            }
            citations.push(Citation {
                doc_number: cell_text(&cells, 0).await,
                doc_title: cell_text(&cells, 1).await,
                doc_date: cell_text(&cells, 2).await,
                issuing_agency: cell_text(&cells, 3).await,
            });
        }
    }

    citations
}

async fn cell_text(cells: &[Box<dyn ElementHandle>], index: usize) -> String {
    match cells.get(index) {
        Some(cell) => cell.text().await.unwrap_or_default(),
        None => String::new(),
    }
}

/// Label text of an info row (its first cell).
async fn row_label(row: &dyn ElementHandle) -> String {
    match row.find_all(INFO_CELL).await {
        Ok(cells) => match cells.first() {
            Some(cell) => cell.text().await.unwrap_or_default(),
            None => String::new(),
        },
        Err(_) => String::new(),
    }
}

/// Value text of an info row (its second cell).
async fn row_value(row: &dyn ElementHandle) -> FieldOutcome {
    match row.find_all(INFO_CELL).await {
        Ok(cells) => match cells.get(1) {
            Some(cell) => FieldOutcome::from(cell.text().await.ok()),
            None => FieldOutcome::Default,
        },
        Err(_) => FieldOutcome::Default,
    }
}

async fn row_value_at(rows: &[Box<dyn ElementHandle>], index: usize) -> FieldOutcome {
    match rows.get(index) {
        Some(row) => row_value(row.as_ref()).await,
        None => FieldOutcome::Default,
    }
}

async fn row_value_by_label(rows: &[Box<dyn ElementHandle>], label: &str) -> FieldOutcome {
    for row in rows {
        if row_label(row.as_ref()).await.contains(label) {
            return row_value(row.as_ref()).await;
        }
    }
    FieldOutcome::Default
}

/// First candidate locator that yields non-empty text wins.
async fn section_text(session: &dyn PageSession, candidates: &[Locator]) -> FieldOutcome {
    for locator in candidates {
        if let Ok(Some(element)) = session.find_one(locator).await {
            if let Ok(text) = element.text().await {
                if !text.is_empty() {
                    return FieldOutcome::Present(text);
                }
            }
        }
    }
    FieldOutcome::Default
}

fn heading_sibling(heading: &str, sibling: &str) -> String {
    format!("//h2[contains(text(), '{heading}')]/following-sibling::{sibling}")
}

fn heading_sibling_article(heading: &str) -> String {
    format!("//h2[contains(text(), '{heading}')]/following-sibling::div[@class='article']")
}

fn titled_article(title: &str, article_class: &str) -> String {
    format!(
        "//div[contains(@class, 'item')]/div[contains(@class, 'title') and contains(text(), '{title}')]\
         /following-sibling::div[@class='content']/div[@class='{article_class}']"
    )
}
