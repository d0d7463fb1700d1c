//! ラベル付きテキストCSVの読み込み
//!
//! 1行目は常にヘッダーとして読み飛ばす。各行は最後の区切り文字で
//! テキストとラベルに分割するため、テキスト側には区切り文字を含めてよい。

use crate::ml::encode_text;
use anyhow::{Context, Result};
use csv::ReaderBuilder;
use std::path::Path;

/// エンコード済みの学習サンプル
#[derive(Clone, Debug, PartialEq)]
pub struct TextSample {
    pub features: Vec<f32>,
    pub label: usize,
}

/// CSV読み込み結果
#[derive(Debug, Default)]
pub struct LabeledRows {
    /// ファイル内の順序を保ったサンプル
    pub samples: Vec<TextSample>,
    /// クラスIDごとの件数（語彙と同じ順序）
    pub class_counts: Vec<usize>,
    /// 未知ラベルでスキップした行数
    pub unknown_label_rows: usize,
    /// 区切り文字が無い・デコードできない行数
    pub malformed_rows: usize,
}

impl LabeledRows {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// 前後の引用符と空白を取り除く
fn clean_field(field: &str) -> &str {
    field.trim_matches(|c: char| c == '"' || c.is_whitespace())
}

/// ラベル付きCSVを読み込み、テキストをエンコードする
///
/// - 語彙に無いラベルの行は警告を出してスキップ
/// - 区切り文字の無い行は黙ってスキップ
/// - I/Oエラーのみ致命的
pub fn load_labeled_csv(
    path: &Path,
    vocabulary: &[String],
    input_length: usize,
    delimiter: u8,
) -> Result<LabeledRows> {
    // 引用符を解釈せずに区切り文字ごとに分割し、最後のフィールドをラベルとする
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .quoting(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;

    let separator = (delimiter as char).to_string();
    let mut rows = LabeledRows {
        class_counts: vec![0; vocabulary.len()],
        ..Default::default()
    };

    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) if e.is_io_error() => {
                return Err(e).with_context(|| format!("Failed to read CSV file: {}", path.display()));
            }
            Err(e) => {
                tracing::warn!("読み込めない行をスキップします: {}", e);
                rows.malformed_rows += 1;
                continue;
            }
        };

        if record.len() < 2 {
            tracing::debug!("区切り文字が無い行をスキップします: {:?}", record.position().map(|p| p.line()));
            rows.malformed_rows += 1;
            continue;
        }

        let last = record.len() - 1;
        let label = clean_field(&record[last]);
        let text = record.iter().take(last).collect::<Vec<_>>().join(&separator);

        let Some(label_index) = vocabulary.iter().position(|l| l == label) else {
            let line = record.iter().collect::<Vec<_>>().join(&separator);
            tracing::warn!("未知のラベルが見つかりました: '{}' (行: {})", label, line);
            rows.unknown_label_rows += 1;
            continue;
        };

        rows.samples.push(TextSample {
            features: encode_text(clean_field(&text), input_length),
            label: label_index,
        });
        rows.class_counts[label_index] += 1;
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn labels() -> Vec<String> {
        vec!["POSITIVE".to_string(), "NEUTRAL".to_string(), "NEGATIVE".to_string()]
    }

    fn write_csv(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_skip_semantics() {
        let (_dir, path) = write_csv(
            "text,label\n\
             I love this,POSITIVE\n\
             what is this,SURPRISED\n\
             no delimiter here\n",
        );

        let rows = load_labeled_csv(&path, &labels(), 100, b',').unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.samples[0].label, 0);
        assert_eq!(rows.samples[0].features, encode_text("I love this", 100));
        assert_eq!(rows.unknown_label_rows, 1);
        assert_eq!(rows.malformed_rows, 1);
        assert_eq!(rows.class_counts, vec![1, 0, 0]);
    }

    #[test]
    fn test_header_always_skipped() {
        // ヘッダーが有効な行に見えても読み飛ばす
        let (_dir, path) = write_csv("great day,POSITIVE\nbad day,NEGATIVE\n");

        let rows = load_labeled_csv(&path, &labels(), 10, b',').unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.samples[0].label, 2);
    }

    #[test]
    fn test_split_at_last_delimiter_and_strip_quotes() {
        let (_dir, path) = write_csv(
            "text,label\n\
             \"well, it was fine\" , \"NEUTRAL\"\n",
        );

        let rows = load_labeled_csv(&path, &labels(), 30, b',').unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.samples[0].label, 1);
        assert_eq!(rows.samples[0].features, encode_text("well, it was fine", 30));
    }

    #[test]
    fn test_preserves_file_order_and_counts() {
        let (_dir, path) = write_csv(
            "text;label\n\
             a;NEGATIVE\n\
             b;POSITIVE\n\
             c;NEGATIVE\n\
             d;NEUTRAL\n",
        );

        let rows = load_labeled_csv(&path, &labels(), 4, b';').unwrap();
        let order: Vec<usize> = rows.samples.iter().map(|s| s.label).collect();
        assert_eq!(order, vec![2, 0, 2, 1]);
        assert_eq!(rows.class_counts, vec![1, 1, 2]);
    }

    #[test]
    fn test_crlf_line_endings() {
        let (_dir, path) = write_csv("text,label\r\nhello,POSITIVE\r\n");

        let rows = load_labeled_csv(&path, &labels(), 8, b',').unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.samples[0].features, encode_text("hello", 8));
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_labeled_csv(&dir.path().join("missing.csv"), &labels(), 10, b',');
        assert!(result.is_err());
    }
}
