use crate::markup::escape_html;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableWidth {
    Full,
    ThreeQuarters,
    Half,
    Quarter,
    Auto,
}

impl TableWidth {
    pub fn as_css(self) -> &'static str {
        match self {
            TableWidth::Full => "100%",
            TableWidth::ThreeQuarters => "75%",
            TableWidth::Half => "50%",
            TableWidth::Quarter => "25%",
            TableWidth::Auto => "auto",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSpec {
    pub rows: usize,
    pub columns: usize,
    pub width: TableWidth,
    pub header_row: bool,
    pub borders: bool,
}

impl TableSpec {
    pub const MAX_ROWS: usize = 20;
    pub const MAX_COLUMNS: usize = 10;

    pub fn new(rows: usize, columns: usize) -> Self {
        Self {
            rows,
            columns,
            ..Self::default()
        }
    }
}

impl Default for TableSpec {
    fn default() -> Self {
        Self {
            rows: 3,
            columns: 3,
            width: TableWidth::Full,
            header_row: true,
            borders: true,
        }
    }
}

/// Structural content inserted at the caret as a single undoable step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Insertion {
    Link { url: String, text: Option<String> },
    Image { url: String, alt: Option<String> },
    Table(TableSpec),
    HorizontalRule,
    Tab,
    PasteText(String),
    /// Pasted markup, inserted as given. Sanitizing belongs to the surface.
    PasteHtml(String),
}

impl Insertion {
    pub fn to_markup(&self) -> String {
        match self {
            Insertion::Link { url, text } => {
                let label = text.as_deref().filter(|t| !t.is_empty()).unwrap_or(url);
                format!(
                    "<a href=\"{}\" target=\"_blank\">{}</a>",
                    escape_html(url),
                    escape_html(label)
                )
            }
            Insertion::Image { url, alt } => {
                let alt = alt.as_deref().filter(|a| !a.is_empty()).unwrap_or("Image");
                format!(
                    "<img src=\"{}\" alt=\"{}\" style=\"max-width: 100%; height: auto;\">",
                    escape_html(url),
                    escape_html(alt)
                )
            }
            Insertion::Table(spec) => table_markup(spec),
            Insertion::HorizontalRule => "<hr>".to_string(),
            Insertion::Tab => "&nbsp;&nbsp;&nbsp;&nbsp;".to_string(),
            Insertion::PasteText(text) => escape_html(text),
            Insertion::PasteHtml(markup) => markup.clone(),
        }
    }
}

fn table_markup(spec: &TableSpec) -> String {
    let rows = spec.rows.clamp(1, TableSpec::MAX_ROWS);
    let columns = spec.columns.clamp(1, TableSpec::MAX_COLUMNS);
    let border = if spec.borders {
        "border: 1px solid #ddd;"
    } else {
        "border: none;"
    };

    let mut html = format!(
        "<table style=\"width: {}; border-collapse: collapse; margin: 1rem 0; {border}\">",
        spec.width.as_css()
    );
    for row in 0..rows {
        html.push_str("<tr>");
        let header = spec.header_row && row == 0;
        let (tag, extra) = if header {
            ("th", " background: #f5f5f5; font-weight: bold;")
        } else {
            ("td", "")
        };
        for _ in 0..columns {
            html.push_str(&format!(
                "<{tag} style=\"{border} padding: 8px; text-align: left;{extra}\">&nbsp;</{tag}>"
            ));
        }
        html.push_str("</tr>");
    }
    html.push_str("</table><p>&nbsp;</p>");
    html
}
