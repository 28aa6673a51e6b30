//! Fixed extraction instruction sent with every document.
//!
//! Keys in the example object must match [`sanpai_core::ReportField::key`].

pub const EXTRACTION_PROMPT: &str = r#"この資料は産業廃棄物の処理計画書または実施状況報告書です。
資料内の表（特に別紙の内訳表）から、前年度の「実績」のデータだけを抽出してください。

抽出ルール:
1. 「計画」「目標」の数値は無視し、「実績」「現状」欄の数値だけを使うこと。
2. 対象年度は実績値が対象とする年度とすること（例: 提出日が令和6年5月なら令和5年度）。
3. 合計行は出力せず、廃棄物の種類ごとに1件ずつ出力すること。
4. 文書種類はすべて「報告書」とすること。
5. 提出日は表紙の記載どおりに抽出すること。
6. 数量はトン単位の数値で出力し、記載がない場合は 0 とすること。

出力は次の形式の JSON 配列のみとし、該当データがなければ [] を返してください。

[
  {
    "提出日": "令和6年5月21日",
    "対象年度": "令和5年度",
    "文書種類": "報告書",
    "業種": "建設業",
    "排出事業者名": "株式会社〇〇",
    "住所": "福岡市中央区〇〇1-2-3",
    "廃棄物の種類": "がれき類",
    "⑩全処理委託量_ton": 100.5,
    "⑪優良認定処理業者への処理委託量_ton": 0,
    "⑫再生利用業者への処理委託量_ton": 100.5,
    "⑬熱回収認定業者への処理委託量_ton": 0,
    "⑭熱回収認定業者以外の熱回収を行う業者への処理委託量_ton": 0,
    "自治体名": "福岡市",
    "備考": ""
  }
]"#;

/// Instruction for the spreadsheet fallback: the prompt followed by the
/// rendered sheet text.
#[must_use]
pub fn spreadsheet_prompt(sheet_text: &str) -> String {
    format!("{EXTRACTION_PROMPT}\n\n以下はExcelファイルの内容です。\n\n{sheet_text}")
}
