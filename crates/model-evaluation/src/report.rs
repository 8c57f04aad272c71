//! Plain-text Confusion Matrix Reports

use crate::accuracy::AccuracyStats;
use crate::confusion::{ConfusionMatrix, Normalization};

/// Shown in place of an empty label value
const UNDEFINED: &str = "*UNDEFINED*";

fn display_name(label: &str) -> &str {
    if label.is_empty() {
        UNDEFINED
    } else {
        label
    }
}

fn percent(v: f64) -> String {
    format!("{:.3}", 100.0 * v)
}

fn csv_field(text: &str) -> String {
    if text.contains(&[',', '"', '\n'][..]) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}

impl ConfusionMatrix {
    /// Per-label F1, precision and recall (percent) plus averaged rows
    pub fn format_stats(&self) -> String {
        let mut rows: Vec<[String; 5]> = Vec::new();
        for label in self.real_labels() {
            let count = self.row_count(label).unwrap_or(0);
            let Ok(bm) = self.binary_matrix(label) else {
                continue;
            };
            rows.push([
                display_name(label).to_string(),
                count.to_string(),
                percent(bm.f1_score()),
                percent(bm.precision()),
                percent(bm.recall()),
            ]);
        }
        let averaged = |name: &str, stats: &AccuracyStats| {
            [
                name.to_string(),
                self.total_samples().to_string(),
                percent(stats.f1.mean()),
                percent(stats.precision.mean()),
                percent(stats.recall.mean()),
            ]
        };
        rows.push(averaged("Micro-averaged", self.micro()));
        rows.push(averaged("Macro-averaged", self.macro_stats()));

        let header = ["Label", "Count", "F1", "Precision", "Recall"].map(String::from);
        let mut widths = [0usize; 5];
        for row in std::iter::once(&header).chain(rows.iter()) {
            for (w, cell) in widths.iter_mut().zip(row) {
                *w = (*w).max(cell.len());
            }
        }

        let line = |row: &[String; 5]| {
            let cells: Vec<String> = row
                .iter()
                .zip(widths)
                .enumerate()
                .map(|(i, (cell, w))| if i == 0 { format!("{:<w$}", cell) } else { format!("{:>w$}", cell) })
                .collect();
            format!("{}\n", cells.join(" | "))
        };

        let mut out = line(&header);
        for row in &rows {
            out.push_str(&line(row));
        }
        out
    }

    /// Count matrix with real values as rows, the diagonal marked `* n *`
    pub fn format_counts(&self) -> String {
        self.format_matrix(|real, predicted| self.count(real, predicted).to_string())
    }

    /// Percent matrix under the given normalization
    pub fn format_percents(&self, normalization: Normalization) -> String {
        let percents = self.percents(normalization);
        self.format_matrix(|real, predicted| {
            let v = percents
                .get(real)
                .and_then(|row| row.get(predicted))
                .copied()
                .unwrap_or(0.0);
            format!("{:.3}", v)
        })
    }

    /// Count matrix as CSV, first column the real value
    pub fn format_counts_csv(&self) -> String {
        let columns = self.predicted_labels();
        let mut out = csv_field(self.label_name());
        for c in &columns {
            out.push(',');
            out.push_str(&csv_field(display_name(c)));
        }
        out.push('\n');
        for real in self.real_labels() {
            out.push_str(&csv_field(display_name(real)));
            for c in &columns {
                out.push_str(&format!(",{}", self.count(real, c)));
            }
            out.push('\n');
        }
        out
    }

    fn format_matrix(&self, cell: impl Fn(&str, &str) -> String) -> String {
        let rows = self.real_labels();
        let columns = self.predicted_labels();
        let cells: Vec<Vec<String>> = rows
            .iter()
            .map(|r| {
                columns
                    .iter()
                    .map(|c| {
                        let v = cell(*r, *c);
                        if r == c {
                            format!("* {} *", v)
                        } else {
                            v
                        }
                    })
                    .collect()
            })
            .collect();

        let row_width = rows
            .iter()
            .map(|r| display_name(r).len())
            .chain(std::iter::once(self.label_name().len()))
            .max()
            .unwrap_or(0);
        let col_width = columns
            .iter()
            .map(|c| display_name(c).len())
            .chain(cells.iter().flatten().map(String::len))
            .max()
            .unwrap_or(0);

        let mut out = format!("{:rw$} | Predicted\n", "", rw = row_width);
        out.push_str(&format!("{:<rw$} |", self.label_name(), rw = row_width));
        for c in &columns {
            out.push_str(&format!(" {:>cw$}", display_name(c), cw = col_width));
        }
        out.push('\n');
        for (r, row) in rows.iter().zip(&cells) {
            out.push_str(&format!("{:<rw$} |", display_name(r), rw = row_width));
            for v in row {
                out.push_str(&format!(" {:>cw$}", v, cw = col_width));
            }
            out.push('\n');
        }
        out
    }
}
