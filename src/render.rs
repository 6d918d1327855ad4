//! Page layout for the printable reports.
//!
//! The renderer produces a positioned page model (points, origin top-left);
//! turning it into PDF bytes is the consumer's job. Pagination rules:
//!
//! - a table row that would cross the bottom margin starts a new page, and
//!   the table header is repeated at the top of that page;
//! - the signature block is placed after the last row, on a new page when the
//!   space left is less than its fixed height.

use serde::Serialize;

use crate::calc::{
    self, count_above_threshold, linear_percentage, ordinal_percentage, CourseReport,
};
use crate::categories::FEEDBACK_CATEGORIES;
use crate::config::PageGeometry;
use crate::model::{AnswerRecord, Course, FormType, ScopeKey};

pub const MISSING: &str = "-";
pub const SIGNATURE_LABELS: &[&str] = &["Class Advisor", "Head of Department"];

/// Rough average glyph width at body size; used only to wrap cell text.
const AVG_CHAR_WIDTH: f64 = 5.0;
const MAX_CELL_LINES: usize = 2;
const SAMPLE_VALUE_COLUMN_WIDTH: f64 = 60.0;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub filename: String,
    pub title: String,
    pub page_width: f64,
    pub page_height: f64,
    pub columns: Vec<Column>,
    pub pages: Vec<Page>,
}

impl Document {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub label: String,
    pub x: f64,
    pub width: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub number: usize,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    pub x: f64,
    pub width: f64,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaEntry {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Block {
    HeaderBand {
        y: f64,
        height: f64,
        title: String,
        subtitle: String,
    },
    Metadata {
        y: f64,
        height: f64,
        entries: Vec<MetaEntry>,
    },
    TableHeader {
        y: f64,
        height: f64,
        cells: Vec<Cell>,
    },
    #[serde(rename_all = "camelCase")]
    Row {
        y: f64,
        height: f64,
        index: usize,
        shaded: bool,
        cells: Vec<Cell>,
    },
    SectionTitle {
        y: f64,
        height: f64,
        text: String,
    },
    Signature {
        y: f64,
        height: f64,
        labels: Vec<String>,
    },
}

#[cfg(test)]
impl Block {
    pub fn y(&self) -> f64 {
        match self {
            Block::HeaderBand { y, .. }
            | Block::Metadata { y, .. }
            | Block::TableHeader { y, .. }
            | Block::Row { y, .. }
            | Block::SectionTitle { y, .. }
            | Block::Signature { y, .. } => *y,
        }
    }

    pub fn height(&self) -> f64 {
        match self {
            Block::HeaderBand { height, .. }
            | Block::Metadata { height, .. }
            | Block::TableHeader { height, .. }
            | Block::Row { height, .. }
            | Block::SectionTitle { height, .. }
            | Block::Signature { height, .. } => *height,
        }
    }
}

struct Cursor<'a> {
    geo: &'a PageGeometry,
    pages: Vec<Page>,
    y: f64,
}

impl<'a> Cursor<'a> {
    fn new(geo: &'a PageGeometry) -> Self {
        Self {
            geo,
            pages: vec![Page {
                number: 1,
                blocks: Vec::new(),
            }],
            y: geo.margin_top,
        }
    }

    fn fits(&self, height: f64) -> bool {
        self.y + height <= self.geo.content_bottom()
    }

    fn at_page_top(&self) -> bool {
        self.y <= self.geo.margin_top
    }

    fn break_page(&mut self) {
        let number = self.pages.len() + 1;
        self.pages.push(Page {
            number,
            blocks: Vec::new(),
        });
        self.y = self.geo.margin_top;
    }

    /// Starts a new page unless `height` fits here. A block taller than a
    /// whole page is still placed at the top of a fresh page.
    fn ensure(&mut self, height: f64) {
        if !self.fits(height) && !self.at_page_top() {
            self.break_page();
        }
    }

    fn place(&mut self, height: f64, make: impl FnOnce(f64) -> Block) {
        let block = make(self.y);
        if let Some(page) = self.pages.last_mut() {
            page.blocks.push(block);
        }
        self.y += height;
    }

    fn finish(self) -> Vec<Page> {
        self.pages
    }
}

/// Course column first, then `data_columns` equal-width columns filling the
/// rest of the content width.
pub fn plan_columns(geo: &PageGeometry, course_label: &str, data_labels: &[String]) -> Vec<Column> {
    let mut cols = Vec::with_capacity(data_labels.len() + 1);
    let course_width = geo.course_column_width.min(geo.content_width());
    cols.push(Column {
        label: course_label.to_string(),
        x: geo.margin_left,
        width: course_width,
    });
    if data_labels.is_empty() {
        return cols;
    }
    let width = (geo.content_width() - course_width) / data_labels.len() as f64;
    for (i, label) in data_labels.iter().enumerate() {
        cols.push(Column {
            label: label.clone(),
            x: geo.margin_left + course_width + width * i as f64,
            width,
        });
    }
    cols
}

/// Greedy word wrap to the column width, at most two lines; overflow is
/// cut with an ellipsis.
pub fn wrap_text(text: &str, width: f64) -> Vec<String> {
    let max_chars = ((width / AVG_CHAR_WIDTH).floor() as usize).max(4);
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut truncated = false;
    for word in text.split_whitespace() {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed <= max_chars {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
            continue;
        }
        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if lines.len() == MAX_CELL_LINES {
            truncated = true;
            break;
        }
        if word.chars().count() > max_chars {
            current = word.chars().take(max_chars).collect();
            lines.push(std::mem::take(&mut current));
            if lines.len() == MAX_CELL_LINES {
                truncated = true;
                break;
            }
        } else {
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        if lines.len() < MAX_CELL_LINES {
            lines.push(current);
        } else {
            truncated = true;
        }
    }
    if truncated {
        if let Some(last) = lines.last_mut() {
            let keep = max_chars.saturating_sub(3);
            let mut cut: String = last.chars().take(keep).collect();
            cut.push_str("...");
            *last = cut;
        }
    }
    lines
}

fn cells(columns: &[Column], contents: Vec<Vec<String>>) -> Vec<Cell> {
    columns
        .iter()
        .zip(contents)
        .map(|(c, lines)| Cell {
            x: c.x,
            width: c.width,
            lines,
        })
        .collect()
}

fn header_cells(columns: &[Column]) -> Vec<Cell> {
    let contents = columns
        .iter()
        .map(|c| wrap_text(&c.label, c.width))
        .collect();
    cells(columns, contents)
}

/// Places the table header and rows, repeating the header after each
/// overflow page break.
fn place_table(cursor: &mut Cursor<'_>, columns: &[Column], rows: Vec<Vec<Vec<String>>>) {
    let geo = cursor.geo;
    cursor.ensure(geo.table_header_height + geo.row_height);
    place_table_header(cursor, columns);
    // A header always keeps at least one row on its page.
    let mut rows_under_header = 0;
    for (index, contents) in rows.into_iter().enumerate() {
        if !cursor.fits(geo.row_height) && rows_under_header > 0 {
            cursor.break_page();
            place_table_header(cursor, columns);
            rows_under_header = 0;
        }
        rows_under_header += 1;
        let row_cells = cells(columns, contents);
        cursor.place(geo.row_height, |y| Block::Row {
            y,
            height: geo.row_height,
            index,
            shaded: index % 2 == 1,
            cells: row_cells,
        });
    }
}

fn place_table_header(cursor: &mut Cursor<'_>, columns: &[Column]) {
    let height = cursor.geo.table_header_height;
    let hdr = header_cells(columns);
    cursor.place(height, |y| Block::TableHeader {
        y,
        height,
        cells: hdr,
    });
}

fn place_signature(cursor: &mut Cursor<'_>) {
    let height = cursor.geo.signature_height;
    cursor.ensure(height);
    cursor.place(height, |y| Block::Signature {
        y,
        height,
        labels: SIGNATURE_LABELS.iter().map(|s| s.to_string()).collect(),
    });
}

fn place_preamble(cursor: &mut Cursor<'_>, title: &str, subtitle: &str, entries: Vec<MetaEntry>) {
    let geo = cursor.geo;
    cursor.place(geo.header_band_height, |y| Block::HeaderBand {
        y,
        height: geo.header_band_height,
        title: title.to_string(),
        subtitle: subtitle.to_string(),
    });
    cursor.place(geo.metadata_height, |y| Block::Metadata {
        y,
        height: geo.metadata_height,
        entries,
    });
}

fn meta(label: &str, value: impl Into<String>) -> MetaEntry {
    MetaEntry {
        label: label.to_string(),
        value: value.into(),
    }
}

fn format_percent(x: f64) -> String {
    format!("{}%", calc::round_half_up(x, 0) as i64)
}

pub fn report_filename(scope: &ScopeKey, kind: FormType) -> String {
    format!(
        "{}_{}_Sem{}_{}_Report.pdf",
        scope.dept_code(),
        scope.year(),
        scope.semester(),
        kind.as_str()
    )
}

pub fn samples_filename(course_code: &str, kind: FormType) -> String {
    format!("course_{}_{}_samples.pdf", course_code, kind.as_str())
}

/// Number of survey data columns: the largest question count of any course.
pub fn survey_column_count(reports: &[CourseReport]) -> usize {
    reports
        .iter()
        .map(|r| r.survey.question_stats.len())
        .max()
        .unwrap_or(0)
}

fn course_cell(r: &CourseReport) -> Vec<String> {
    vec![r.course_code.clone(), r.course_name.clone()]
}

fn feedback_row(r: &CourseReport) -> Vec<Vec<String>> {
    let mut row = vec![course_cell(r)];
    for cat in FEEDBACK_CATEGORIES {
        let stat = r.feedback.categories.iter().find(|c| c.id == cat.id);
        match stat {
            Some(s) if s.member_count > 0 => row.push(vec![
                format_percent(linear_percentage(s.average)),
                format!("{:.2}", calc::round_half_up(s.average, 2)),
            ]),
            _ => row.push(vec![MISSING.to_string()]),
        }
    }
    row
}

fn survey_row(r: &CourseReport, columns: usize) -> Vec<Vec<String>> {
    let mut row = vec![course_cell(r)];
    for i in 0..columns {
        match r.survey.question_stats.get(i) {
            Some(s) if s.count > 0 => {
                let above = count_above_threshold(&s.distribution);
                let share = f64::from(above) / f64::from(s.count) * 100.0;
                row.push(vec![
                    format_percent(ordinal_percentage(s.average)),
                    format!("(≥60%: {})", format_percent(share)),
                ]);
            }
            _ => row.push(vec![MISSING.to_string()]),
        }
    }
    row
}

/// Lays out the scope report for `kind`.
pub fn render(
    scope: &ScopeKey,
    reports: &[CourseReport],
    kind: FormType,
    geo: &PageGeometry,
    generated_at: &str,
) -> Document {
    let (title, labels, rows): (&str, Vec<String>, Vec<Vec<Vec<String>>>) = match kind {
        FormType::Feedback => (
            "Feedback Analysis (By Category)",
            FEEDBACK_CATEGORIES.iter().map(|c| c.name.to_string()).collect(),
            reports.iter().map(feedback_row).collect(),
        ),
        FormType::Survey => {
            let n = survey_column_count(reports);
            (
                "Survey Analysis (Course Outcomes)",
                (1..=n).map(|i| format!("CO{i}")).collect(),
                reports.iter().map(|r| survey_row(r, n)).collect(),
            )
        }
    };
    let columns = plan_columns(geo, "Course", &labels);

    let mut cursor = Cursor::new(geo);
    place_preamble(
        &mut cursor,
        title,
        &format!(
            "{} - {} - Semester {}",
            scope.dept_code(),
            scope.year(),
            scope.semester()
        ),
        vec![
            meta("Department", scope.dept_code()),
            meta("Year", scope.year().to_string()),
            meta("Semester", scope.semester().to_string()),
            meta("Courses", reports.len().to_string()),
            meta("Generated", generated_at),
        ],
    );
    place_table(&mut cursor, &columns, rows);
    place_signature(&mut cursor);

    Document {
        filename: report_filename(scope, kind),
        title: title.to_string(),
        page_width: geo.page_width,
        page_height: geo.page_height,
        columns,
        pages: cursor.finish(),
    }
}

/// Lays out sampled raw responses: one titled block per response listing
/// each configured question and the value given.
pub fn render_samples(
    course: &Course,
    kind: FormType,
    total_responses: usize,
    samples: &[AnswerRecord],
    geo: &PageGeometry,
    generated_at: &str,
) -> Document {
    let title = format!("{} {} samples", course.course_code, kind.as_str());
    let value_width = SAMPLE_VALUE_COLUMN_WIDTH.min(geo.content_width());
    let columns = vec![
        Column {
            label: "Question".to_string(),
            x: geo.margin_left,
            width: geo.content_width() - value_width,
        },
        Column {
            label: "Value".to_string(),
            x: geo.margin_left + geo.content_width() - value_width,
            width: value_width,
        },
    ];
    let questions = course.questions(kind);

    let mut cursor = Cursor::new(geo);
    place_preamble(
        &mut cursor,
        &title,
        &course.course_name,
        vec![
            meta("Course", course.course_code.as_str()),
            meta("Form", kind.as_str()),
            meta("Responses", total_responses.to_string()),
            meta("Sampled", samples.len().to_string()),
            meta("Generated", generated_at),
        ],
    );

    for (i, record) in samples.iter().enumerate() {
        cursor.ensure(geo.table_header_height + geo.row_height);
        let text = format!("Response {} - submitted {}", i + 1, record.submitted_at);
        cursor.place(geo.table_header_height, |y| Block::SectionTitle {
            y,
            height: geo.table_header_height,
            text,
        });

        let mut rows: Vec<Vec<Vec<String>>> = questions
            .iter()
            .map(|q| {
                let value = record
                    .answers
                    .iter()
                    .find(|a| a.question_id == q.question_id)
                    .map(|a| a.value.to_string())
                    .unwrap_or_else(|| MISSING.to_string());
                vec![
                    wrap_text(&format!("{}. {}", q.question_id, q.text), columns[0].width),
                    vec![value],
                ]
            })
            .collect();
        if kind == FormType::Feedback {
            let rec = record
                .recommendation
                .clone()
                .unwrap_or_else(|| MISSING.to_string());
            rows.push(vec![
                wrap_text(&format!("Recommendation: {rec}"), columns[0].width),
                vec![String::new()],
            ]);
        }

        for (index, contents) in rows.into_iter().enumerate() {
            if index > 0 {
                cursor.ensure(geo.row_height);
            }
            let row_cells = cells(&columns, contents);
            cursor.place(geo.row_height, |y| Block::Row {
                y,
                height: geo.row_height,
                index,
                shaded: index % 2 == 1,
                cells: row_cells,
            });
        }
    }

    Document {
        filename: samples_filename(&course.course_code, kind),
        title,
        page_width: geo.page_width,
        page_height: geo.page_height,
        columns,
        pages: cursor.finish(),
    }
}
