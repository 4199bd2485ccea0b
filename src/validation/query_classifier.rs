use crate::models::QueryKind;

/// Leading keywords checked in order; the first prefix match decides the kind
const KEYWORDS: [(&str, QueryKind); 8] = [
    ("select", QueryKind::Select),
    ("insert", QueryKind::Insert),
    ("update", QueryKind::Update),
    ("delete", QueryKind::Delete),
    ("create", QueryKind::Create),
    ("drop", QueryKind::Drop),
    ("alter", QueryKind::Alter),
    ("truncate", QueryKind::Truncate),
];

/// Keyword classification of SQL text. This is not a parser: it never rejects
/// a statement and only decides whether execution should hand rows back.
pub struct QueryClassifier;

impl QueryClassifier {
    pub fn classify(sql: &str) -> QueryKind {
        let normalized = sql.trim().to_lowercase();

        KEYWORDS
            .iter()
            .find(|(keyword, _)| normalized.starts_with(keyword))
            .map(|(_, kind)| *kind)
            .unwrap_or(QueryKind::Other)
    }
}
