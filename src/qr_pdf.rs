//! Printable QR sheets.
//!
//! Export is split in two: [`plan_layout`] decides where every header line,
//! bitmap and label goes (pure, top-left origin, millimetres) and
//! [`render_pdf`] draws a plan with whatever bitmaps are available. Cells
//! whose bitmap is missing are skipped and counted.

use chrono::{DateTime, Local};
use printpdf::{
    BuiltinFont, ColorBits, ColorSpace, Image, ImageTransform, ImageXObject, IndirectFontRef,
    Mm, PdfDocument, PdfLayerReference, Px,
};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::batches::BatchSummary;
use crate::format::{export_timestamp, format_amount, format_date, format_decimal, short_hash};
use crate::models::{Order, QrRecord};
use crate::qr_render::{canvas_id, QrBitmapSource};

pub const PAGE_WIDTH_MM: f64 = 210.0;
pub const PAGE_HEIGHT_MM: f64 = 297.0;
pub const MARGIN_MM: f64 = 14.0;
/// Top of the first grid row; the header band sits above it.
pub const HEADER_OFFSET_MM: f64 = 54.0;

const TITLE_PT: f64 = 16.0;
const HEADER_PT: f64 = 10.0;
const LABEL_PT: f64 = 8.0;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("{0}")]
    NoQrs(String),

    #[error("Failed to generate PDF: {0}")]
    Pdf(String),

    #[error("Failed to write PDF: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Grid presets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GridPreset {
    /// 4 × 6 small codes with labels underneath.
    #[default]
    LabelSheet,
    /// 2 × 4 large codes with labels to the right.
    DetailCard,
}

impl GridPreset {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().replace('_', "-").as_str() {
            "label-sheet" | "label" | "labels" => Some(GridPreset::LabelSheet),
            "detail-card" | "detail" | "cards" => Some(GridPreset::DetailCard),
            _ => None,
        }
    }

    pub fn columns(self) -> usize {
        match self {
            GridPreset::LabelSheet => 4,
            GridPreset::DetailCard => 2,
        }
    }

    pub fn rows(self) -> usize {
        match self {
            GridPreset::LabelSheet => 6,
            GridPreset::DetailCard => 4,
        }
    }

    pub fn per_page(self) -> usize {
        self.columns() * self.rows()
    }

    pub fn qr_size_mm(self) -> f64 {
        match self {
            GridPreset::LabelSheet => 28.0,
            GridPreset::DetailCard => 40.0,
        }
    }

    fn labels_beside(self) -> bool {
        matches!(self, GridPreset::DetailCard)
    }

    fn column_pitch(self) -> f64 {
        let usable = PAGE_WIDTH_MM - MARGIN_MM * 2.0;
        let cols = self.columns() as f64;
        if self.labels_beside() {
            usable / cols
        } else {
            let spacing = (usable - self.qr_size_mm() * cols) / (cols - 1.0).max(1.0);
            self.qr_size_mm() + spacing
        }
    }

    fn row_pitch(self) -> f64 {
        (PAGE_HEIGHT_MM - HEADER_OFFSET_MM - MARGIN_MM) / self.rows() as f64
    }
}

// ---------------------------------------------------------------------------
// Headers
// ---------------------------------------------------------------------------

/// What is being exported; drives the header block and the file name.
#[derive(Debug, Clone)]
pub enum ExportHeader {
    Order(Order),
    Batch(BatchSummary),
}

impl ExportHeader {
    fn title(&self) -> String {
        match self {
            ExportHeader::Order(order) => format!(
                "QR Order #{} - INR {}",
                short_hash(order.id.as_deref().unwrap_or_default(), 8),
                opt_amount(order.cashback_amount)
            ),
            ExportHeader::Batch(batch) => {
                format!("QR Batch - INR {}", opt_amount(batch.cashback_amount))
            }
        }
    }

    fn detail_lines(&self) -> Vec<String> {
        match self {
            ExportHeader::Order(order) => {
                let per_qr = order.per_qr_price();
                vec![
                    format!(
                        "Campaign: {}",
                        order.campaign_title.as_deref().unwrap_or("Campaign")
                    ),
                    format!(
                        "Quantity: {}",
                        order.quantity.map(|q| q.to_string()).unwrap_or_default()
                    ),
                    format!("Date: {}", format_date(order.created_at.as_ref())),
                    format!(
                        "QR price: INR {}/QR | Print cost: INR {}",
                        format_decimal(per_qr),
                        format_decimal(order.print_cost.unwrap_or(0.0))
                    ),
                ]
            }
            ExportHeader::Batch(batch) => vec![
                format!("Campaign: {}", batch.campaign_title),
                format!("Brand: {}", batch.brand_name),
                format!("Vendor: {}", batch.vendor_label),
                format!(
                    "QRs: {} | Active: {} | Redeemed: {}",
                    batch.total, batch.active, batch.redeemed
                ),
            ],
        }
    }

    /// Header block redrawn at the top of every page.
    pub fn lines(&self) -> Vec<TextLine> {
        let mut lines = vec![TextLine::new(self.title(), MARGIN_MM, 18.0, TITLE_PT)];
        for (i, text) in self.detail_lines().into_iter().enumerate() {
            lines.push(TextLine::new(text, MARGIN_MM, 26.0 + 6.0 * i as f64, HEADER_PT));
        }
        lines
    }

    pub fn file_name(&self, now: DateTime<Local>) -> String {
        let ts = export_timestamp(now);
        match self {
            ExportHeader::Order(order) => format!(
                "order-{}-{ts}.pdf",
                file_component(&short_hash(order.id.as_deref().unwrap_or("unknown"), 8))
            ),
            ExportHeader::Batch(batch) => format!(
                "qr-batch-{}-{}-{ts}.pdf",
                file_component(&short_hash(
                    batch.campaign_id.as_deref().unwrap_or("unknown"),
                    8
                )),
                batch
                    .cashback_amount
                    .map(format_decimal)
                    .unwrap_or_else(|| "na".to_string())
            ),
        }
    }

    fn empty_message(&self) -> &'static str {
        match self {
            ExportHeader::Order(_) => "No QRs found for this order.",
            ExportHeader::Batch(_) => "No QRs found.",
        }
    }

    fn success_message(&self) -> &'static str {
        match self {
            ExportHeader::Order(_) => "Order PDF downloaded successfully.",
            ExportHeader::Batch(_) => "PDF downloaded successfully.",
        }
    }
}

fn opt_amount(value: Option<f64>) -> String {
    format_amount(value.map(Value::from).as_ref())
}

/// Keep file names portable.
pub(crate) fn file_component(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '-' })
        .collect()
}

// ---------------------------------------------------------------------------
// Layout plan
// ---------------------------------------------------------------------------

/// One line of text; `y` is the baseline measured from the page top.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextLine {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub size_pt: f64,
}

impl TextLine {
    fn new(text: impl Into<String>, x: f64, y: f64, size_pt: f64) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            size_pt,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellPlan {
    /// Position of the record in the exported list.
    pub index: usize,
    pub canvas_id: String,
    /// Top-left corner of the bitmap.
    pub x: f64,
    pub y: f64,
    pub size: f64,
    pub hash_label: TextLine,
    pub amount_label: TextLine,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PagePlan {
    pub header_lines: Vec<TextLine>,
    pub cells: Vec<CellPlan>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutPlan {
    pub preset: GridPreset,
    pub pages: Vec<PagePlan>,
}

impl LayoutPlan {
    pub fn cell_count(&self) -> usize {
        self.pages.iter().map(|p| p.cells.len()).sum()
    }
}

pub fn plan_layout(records: &[QrRecord], preset: GridPreset, header: &ExportHeader) -> LayoutPlan {
    let header_lines = header.lines();
    let per_page = preset.per_page();
    let size = preset.qr_size_mm();
    let col_pitch = preset.column_pitch();
    let row_pitch = preset.row_pitch();

    let pages = records
        .chunks(per_page)
        .enumerate()
        .map(|(page_no, chunk)| {
            let cells = chunk
                .iter()
                .enumerate()
                .map(|(local, qr)| {
                    let col = local % preset.columns();
                    let row = local / preset.columns();
                    let x = MARGIN_MM + col as f64 * col_pitch;
                    let y = HEADER_OFFSET_MM + row as f64 * row_pitch;

                    let hash_text = short_hash(&qr.unique_hash, 8);
                    let amount_text = format!("INR {}", opt_amount(qr.cashback_amount));
                    let (hash_label, amount_label) = if preset.labels_beside() {
                        let lx = x + size + 4.0;
                        (
                            TextLine::new(hash_text, lx, y + 8.0, LABEL_PT),
                            TextLine::new(amount_text, lx, y + 14.0, LABEL_PT),
                        )
                    } else {
                        (
                            TextLine::new(hash_text, x, y + size + 4.0, LABEL_PT),
                            TextLine::new(amount_text, x, y + size + 8.0, LABEL_PT),
                        )
                    };

                    CellPlan {
                        index: page_no * per_page + local,
                        canvas_id: canvas_id(&qr.unique_hash),
                        x,
                        y,
                        size,
                        hash_label,
                        amount_label,
                    }
                })
                .collect();
            PagePlan {
                header_lines: header_lines.clone(),
                cells,
            }
        })
        .collect();

    LayoutPlan { preset, pages }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn draw_text(layer: &PdfLayerReference, font: &IndirectFontRef, line: &TextLine) {
    layer.use_text(
        line.text.clone(),
        line.size_pt,
        Mm(line.x),
        Mm(PAGE_HEIGHT_MM - line.y),
        font,
    );
}

/// Draw `plan` into a PDF. Returns the document bytes and the number of
/// cells skipped for lack of a bitmap.
pub fn render_pdf(
    plan: &LayoutPlan,
    bitmaps: &dyn QrBitmapSource,
    title: &str,
) -> Result<(Vec<u8>, usize), ExportError> {
    let (doc, first_page, first_layer) =
        PdfDocument::new(title, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| ExportError::Pdf(e.to_string()))?;

    let mut skipped = 0usize;
    for (page_no, page) in plan.pages.iter().enumerate() {
        let layer = if page_no == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (p, l) = doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
            doc.get_page(p).get_layer(l)
        };

        for line in &page.header_lines {
            draw_text(&layer, &font, line);
        }

        for cell in &page.cells {
            let Some(bitmap) = bitmaps.bitmap(&cell.canvas_id) else {
                skipped += 1;
                continue;
            };
            if bitmap.width() == 0 || bitmap.height() == 0 {
                warn!(canvas_id = %cell.canvas_id, "empty QR bitmap");
                skipped += 1;
                continue;
            }

            let image = Image::from(ImageXObject {
                width: Px(bitmap.width() as usize),
                height: Px(bitmap.height() as usize),
                color_space: ColorSpace::Greyscale,
                bits_per_component: ColorBits::Bit8,
                interpolate: false,
                image_data: bitmap.as_raw().clone(),
                image_filter: None,
                clipping_bbox: None,
            });
            // Pick the dpi that makes the bitmap exactly `size` mm wide.
            let dpi = bitmap.width() as f64 * 25.4 / cell.size;
            image.add_to_layer(
                layer.clone(),
                ImageTransform {
                    translate_x: Some(Mm(cell.x)),
                    translate_y: Some(Mm(PAGE_HEIGHT_MM - cell.y - cell.size)),
                    dpi: Some(dpi),
                    ..Default::default()
                },
            );

            draw_text(&layer, &font, &cell.hash_label);
            draw_text(&layer, &font, &cell.amount_label);
        }
    }

    let bytes = doc
        .save_to_bytes()
        .map_err(|e| ExportError::Pdf(e.to_string()))?;
    Ok((bytes, skipped))
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ExportOutcome {
    pub path: PathBuf,
    pub exported: usize,
    pub skipped: usize,
    pub message: String,
}

pub fn status_message(header: &ExportHeader, skipped: usize) -> String {
    if skipped > 0 {
        format!("Downloaded PDF. {skipped} QRs skipped (not rendered).")
    } else {
        header.success_message().to_string()
    }
}

/// Plan, render and write one export. Nothing is written for an empty list.
pub fn export_qr_pdf(
    records: &[QrRecord],
    header: &ExportHeader,
    preset: GridPreset,
    bitmaps: &dyn QrBitmapSource,
    out_dir: &Path,
    now: DateTime<Local>,
) -> Result<ExportOutcome, ExportError> {
    if records.is_empty() {
        return Err(ExportError::NoQrs(header.empty_message().to_string()));
    }

    let plan = plan_layout(records, preset, header);
    let (bytes, skipped) = render_pdf(&plan, bitmaps, &header.title())?;

    std::fs::create_dir_all(out_dir)?;
    let path = out_dir.join(header.file_name(now));
    std::fs::write(&path, bytes)?;

    let exported = plan.cell_count() - skipped;
    info!(
        path = %path.display(),
        pages = plan.pages.len(),
        exported,
        skipped,
        "QR PDF exported"
    );
    Ok(ExportOutcome {
        path,
        exported,
        skipped,
        message: status_message(header, skipped),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use image::{GrayImage, Luma};
    use std::collections::HashMap;

    fn qr(hash: &str) -> QrRecord {
        QrRecord {
            unique_hash: hash.to_string(),
            cashback_amount: Some(10.0),
            ..Default::default()
        }
    }

    fn records(n: usize) -> Vec<QrRecord> {
        (0..n).map(|i| qr(&format!("hash{i:04}abcdef"))).collect()
    }

    fn order_header() -> ExportHeader {
        ExportHeader::Order(Order {
            id: Some("0a1b2c3d4e5f".into()),
            campaign_title: Some("Diwali".into()),
            quantity: Some(30),
            cashback_amount: Some(25.0),
            print_cost: Some(60.0),
            created_at: Some(serde_json::json!("2024-01-14")),
            ..Default::default()
        })
    }

    fn bitmaps_for(records: &[QrRecord]) -> HashMap<String, GrayImage> {
        records
            .iter()
            .map(|r| (canvas_id(&r.unique_hash), GrayImage::from_pixel(8, 8, Luma([0u8]))))
            .collect()
    }

    fn fixed_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 1, 15, 9, 30, 0).unwrap()
    }

    #[test]
    fn order_header_lines_match_print_layout() {
        let lines = order_header().lines();
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "QR Order #0a1b2c3d - INR 25.00",
                "Campaign: Diwali",
                "Quantity: 30",
                "Date: Jan 14, 2024",
                "QR price: INR 2.00/QR | Print cost: INR 60.00",
            ]
        );
        assert_eq!(lines[0].y, 18.0);
        assert_eq!(lines[4].y, 44.0);
    }

    #[test]
    fn plan_paginates_and_repeats_header() {
        let recs = records(30);
        let plan = plan_layout(&recs, GridPreset::LabelSheet, &order_header());
        assert_eq!(plan.pages.len(), 2);
        assert_eq!(plan.pages[0].cells.len(), 24);
        assert_eq!(plan.pages[1].cells.len(), 6);
        assert_eq!(plan.pages[0].header_lines, plan.pages[1].header_lines);
        assert_eq!(plan.pages[1].cells[0].index, 24);
        assert_eq!(plan.pages[1].cells[0].x, MARGIN_MM);
        assert_eq!(plan.pages[1].cells[0].y, HEADER_OFFSET_MM);

        let first = &plan.pages[0].cells[0];
        assert_eq!(first.hash_label.text, "hash0000");
        assert_eq!(first.amount_label.text, "INR 10.00");
    }

    #[test]
    fn no_cell_leaves_the_printable_area() {
        for preset in [GridPreset::LabelSheet, GridPreset::DetailCard] {
            let recs = records(preset.per_page());
            let plan = plan_layout(&recs, preset, &order_header());
            for cell in &plan.pages[0].cells {
                assert!(cell.x >= MARGIN_MM, "{preset:?} x {}", cell.x);
                assert!(cell.y >= HEADER_OFFSET_MM);
                assert!(cell.x + cell.size <= PAGE_WIDTH_MM - MARGIN_MM + 1e-9);
                assert!(cell.amount_label.y <= PAGE_HEIGHT_MM - MARGIN_MM);
                assert!(cell.hash_label.x < PAGE_WIDTH_MM - MARGIN_MM);
            }
        }
    }

    #[test]
    fn detail_card_puts_labels_beside_the_code() {
        let recs = records(1);
        let plan = plan_layout(&recs, GridPreset::DetailCard, &order_header());
        let cell = &plan.pages[0].cells[0];
        assert_eq!(cell.size, 40.0);
        assert!(cell.hash_label.x > cell.x + cell.size);
        assert!(cell.amount_label.y < cell.y + cell.size);
    }

    #[test]
    fn missing_bitmaps_are_counted_not_fatal() {
        let recs = records(10);
        let mut bitmaps = bitmaps_for(&recs);
        for r in &recs[2..5] {
            bitmaps.remove(&canvas_id(&r.unique_hash));
        }

        let dir = tempfile::tempdir().unwrap();
        let outcome = export_qr_pdf(
            &recs,
            &order_header(),
            GridPreset::LabelSheet,
            &bitmaps,
            dir.path(),
            fixed_now(),
        )
        .expect("export should succeed");

        assert_eq!(outcome.skipped, 3);
        assert_eq!(outcome.exported, 7);
        assert_eq!(
            outcome.message,
            "Downloaded PDF. 3 QRs skipped (not rendered)."
        );
        assert_eq!(
            outcome.path.file_name().and_then(|n| n.to_str()),
            Some("order-0a1b2c3d-2024-01-15-09-30.pdf")
        );
        let bytes = std::fs::read(&outcome.path).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn full_render_reports_success() {
        let recs = records(3);
        let bitmaps = bitmaps_for(&recs);
        let dir = tempfile::tempdir().unwrap();
        let outcome = export_qr_pdf(
            &recs,
            &order_header(),
            GridPreset::DetailCard,
            &bitmaps,
            dir.path(),
            fixed_now(),
        )
        .unwrap();
        assert_eq!(outcome.skipped, 0);
        assert_eq!(outcome.message, "Order PDF downloaded successfully.");
    }

    #[test]
    fn empty_export_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let bitmaps: HashMap<String, GrayImage> = HashMap::new();
        let err = export_qr_pdf(
            &[],
            &order_header(),
            GridPreset::LabelSheet,
            &bitmaps,
            dir.path(),
            fixed_now(),
        )
        .expect_err("empty export must fail");
        assert_eq!(err.to_string(), "No QRs found for this order.");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn batch_file_name_uses_campaign_and_amount() {
        let recs: Vec<QrRecord> = serde_json::from_value(serde_json::json!([
            { "uniqueHash": "a1", "cashbackAmount": 5, "status": "active", "campaignId": "camp-12345678",
              "Campaign": { "title": "Summer", "Brand": { "name": "Acme", "Vendor": { "businessName": "Acme Foods" } } } },
            { "uniqueHash": "a2", "cashbackAmount": 5, "status": "active", "campaignId": "camp-12345678" },
            { "uniqueHash": "a3", "cashbackAmount": 5, "status": "pending", "campaignId": "camp-12345678" },
            { "uniqueHash": "a4", "cashbackAmount": 5, "status": "redeemed", "campaignId": "camp-12345678" }
        ]))
        .unwrap();
        let batch = crate::batches::group_batches(&recs).remove(0);
        let header = ExportHeader::Batch(batch);
        assert_eq!(
            header.file_name(fixed_now()),
            "qr-batch-camp-123-5.00-2024-01-15-09-30.pdf"
        );
        let lines = header.lines();
        assert_eq!(lines[0].text, "QR Batch - INR 5.00");
        assert_eq!(lines[1].text, "Campaign: Summer");
        assert_eq!(
            lines.last().map(|l| l.text.as_str()),
            Some("QRs: 4 | Active: 3 | Redeemed: 1")
        );
    }

    #[test]
    fn preset_parsing() {
        assert_eq!(GridPreset::parse("label-sheet"), Some(GridPreset::LabelSheet));
        assert_eq!(GridPreset::parse("DETAIL_CARD"), Some(GridPreset::DetailCard));
        assert_eq!(GridPreset::parse("poster"), None);
    }
}
