//! テキストを固定長の数値ベクトルに変換するエンコーダ
//!
//! 学習（データセット読み込み）と推論で同じ関数を使うこと。
//! 文字位置ごとに1スロットを割り当て、文字コード / 255 を値とします。
//!
//! - 文字数はUTF-16コード単位で数える
//! - 255を超える文字コードは1.0に飽和する（非Latin-1文字の情報は失われる）
//! - 短いテキストは0.0で埋め、長いテキストは切り捨てる

/// テキストを長さ `max_length` のベクトルにエンコード
///
/// 純粋関数で、同じ入力には常に同じベクトルを返します。
pub fn encode_text(text: &str, max_length: usize) -> Vec<f32> {
    let mut encoded = vec![0.0f32; max_length];

    for (slot, code) in encoded.iter_mut().zip(text.encode_utf16()) {
        *slot = (code as f32 / 255.0).min(1.0);
    }

    encoded
}
