//! Recovered-text report, per-document statistics and the batch summary.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use crate::classify::MarkKind;

/// Text found beneath a removed mark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveredSpan {
    /// 1-based page number.
    pub page: u32,
    pub text: String,
    /// `[x0, y0, x1, y1]` in page space.
    pub bbox: [f64; 4],
}

/// Every span recovered from one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnredactionReport {
    pub original_file: String,
    pub spans: Vec<RecoveredSpan>,
}

impl UnredactionReport {
    pub fn new(original_file: impl Into<String>) -> Self {
        Self {
            original_file: original_file.into(),
            spans: Vec::new(),
        }
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Counts of what was removed or could not be processed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub black_img: u32,
    pub white_img: u32,
    pub black_vec: u32,
    pub white_vec: u32,
    pub annots: u32,
    pub pages: u32,
    pub unreadable_pages: u32,
    pub undecodable_images: u32,
    /// Pages rebuilt without some content that could not be interpreted.
    pub incomplete_content: u32,
}

impl Statistics {
    pub fn record(&mut self, kind: MarkKind) {
        match kind {
            MarkKind::BlackImage => self.black_img += 1,
            MarkKind::WhiteImage => self.white_img += 1,
            MarkKind::BlackVector => self.black_vec += 1,
            MarkKind::WhiteVector => self.white_vec += 1,
        }
    }

    pub fn merge(&mut self, other: &Statistics) {
        self.black_img += other.black_img;
        self.white_img += other.white_img;
        self.black_vec += other.black_vec;
        self.white_vec += other.white_vec;
        self.annots += other.annots;
        self.pages += other.pages;
        self.unreadable_pages += other.unreadable_pages;
        self.undecodable_images += other.undecodable_images;
        self.incomplete_content += other.incomplete_content;
    }

    /// Total marks removed, annotations included.
    pub fn removed(&self) -> u32 {
        self.black_img + self.white_img + self.black_vec + self.white_vec + self.annots
    }
}

/// One line of the batch summary.
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsRow {
    pub filename: String,
    pub statistics: Statistics,
}

pub const SUMMARY_HEADER: &str = "Filename,Black_Images,White_Images,Black_Vectors,White_Vectors,Annotations";

fn csv_field(value: &str) -> String {
    if value.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Writes the summary table, header first, one row per document.
pub fn write_summary_csv<W: Write>(mut writer: W, rows: &[StatisticsRow]) -> io::Result<()> {
    writeln!(writer, "{}", SUMMARY_HEADER)?;
    for row in rows {
        let s = &row.statistics;
        writeln!(
            writer,
            "{},{},{},{},{},{}",
            csv_field(&row.filename),
            s.black_img,
            s.white_img,
            s.black_vec,
            s.white_vec,
            s.annots
        )?;
    }
    writer.flush()
}
