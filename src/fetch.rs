use crate::error::{EtlError, Result};
use crate::types::RawTable;
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::debug;

/// Retrieves the first table on a page. One attempt per call; every failure is a
/// `EtlError::Fetch` the driver treats as a page-level failure.
#[async_trait]
pub trait TableFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<RawTable>;
}

/// Extracts the first `<table>` of an HTML document.
pub struct TableParser {
    table: Selector,
    row: Selector,
    header_cell: Selector,
    cell: Selector,
    grouped_int: Regex,
}

impl TableParser {
    pub fn new() -> Result<Self> {
        let css = |s: &str| {
            Selector::parse(s).map_err(|e| EtlError::Config(format!("selector '{}': {}", s, e)))
        };
        Ok(Self {
            table: css("table")?,
            row: css("tr")?,
            header_cell: css("th")?,
            cell: css("th, td")?,
            grouped_int: Regex::new(r"^\d{1,3}(,\d{3})+$")
                .map_err(|e| EtlError::Config(e.to_string()))?,
        })
    }

    /// Header row is the first row holding `<th>` cells, else the first row.
    /// Blank header cells become `Unnamed: <index>`; blank data cells become `None`.
    pub fn parse(&self, html: &str) -> std::result::Result<RawTable, String> {
        let document = Html::parse_document(html);
        let table = document
            .select(&self.table)
            .next()
            .ok_or_else(|| "no table found on page".to_string())?;

        let rows: Vec<ElementRef> = table.select(&self.row).collect();
        let header_idx = rows
            .iter()
            .position(|r| r.select(&self.header_cell).next().is_some())
            .unwrap_or(0);
        let header_row = rows
            .get(header_idx)
            .ok_or_else(|| "table has no rows".to_string())?;

        let headers: Vec<String> = header_row
            .select(&self.cell)
            .enumerate()
            .map(|(i, c)| match cell_text(&c) {
                Some(text) => text,
                None => format!("Unnamed: {}", i),
            })
            .collect();
        if headers.is_empty() {
            return Err("table header row has no cells".to_string());
        }

        let width = headers.len();
        let mut data = Vec::with_capacity(rows.len().saturating_sub(header_idx + 1));
        for row in rows.iter().skip(header_idx + 1) {
            let mut cells: Vec<Option<String>> = row
                .select(&self.cell)
                .map(|c| cell_text(&c).map(|t| self.strip_grouping(t)))
                .collect();
            if cells.iter().all(Option::is_none) {
                continue;
            }
            cells.resize(width, None);
            data.push(cells);
        }

        Ok(RawTable::new(headers, data))
    }

    /// `120,000` -> `120000`, the way the source's numeric columns read.
    fn strip_grouping(&self, text: String) -> String {
        if self.grouped_int.is_match(&text) {
            text.replace(',', "")
        } else {
            text
        }
    }
}

fn cell_text(cell: &ElementRef) -> Option<String> {
    let text = cell.text().collect::<Vec<_>>().join(" ");
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

/// HTTP-backed fetcher with a per-request timeout.
pub struct HtmlTableFetcher {
    client: Client,
    parser: TableParser,
}

impl HtmlTableFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EtlError::Config(format!("building http client: {}", e)))?;
        Ok(Self {
            client,
            parser: TableParser::new()?,
        })
    }
}

#[async_trait]
impl TableFetcher for HtmlTableFetcher {
    async fn fetch(&self, url: &str) -> Result<RawTable> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| EtlError::fetch(url, e))?;

        if !response.status().is_success() {
            return Err(EtlError::fetch(
                url,
                format!("request failed with status: {}", response.status()),
            ));
        }

        let html = response.text().await.map_err(|e| EtlError::fetch(url, e))?;
        let table = self.parser.parse(&html).map_err(|e| EtlError::fetch(url, e))?;
        debug!(
            "Fetched table with {} columns and {} rows from {}",
            table.headers.len(),
            table.row_count(),
            url
        );
        Ok(table)
    }
}
